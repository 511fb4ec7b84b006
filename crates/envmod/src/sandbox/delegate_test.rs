// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use std::cell::RefCell;

use rstest::rstest;
use tempfile::TempDir;

use super::*;

/// Replays a canned output and records the invocations.
struct ScriptedBackend {
    output: DelegatedOutput,
    calls: RefCell<Vec<Vec<String>>>,
}

impl ScriptedBackend {
    fn new(stdout: &str, stderr: &str, status: i32) -> Self {
        Self {
            output: DelegatedOutput {
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                status: Some(status),
            },
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl Backend for ScriptedBackend {
    fn run(&self, shell: &str, subcommand: &str, args: &[String]) -> crate::Result<DelegatedOutput> {
        let mut call = vec![shell.to_string(), subcommand.to_string()];
        call.extend(args.iter().cloned());
        self.calls.borrow_mut().push(call);
        Ok(self.output.clone())
    }
}

fn legacy_module(tmp: &TempDir) -> Module {
    let path = tmp.path().join("legacy");
    std::fs::write(&path, "#%Module1.0\nsetenv FOO bar\n").unwrap();
    Module::from_file("legacy", &path, Some(tmp.path())).unwrap()
}

fn set(name: &str, value: &str) -> Intent {
    Intent::SetEnv {
        name: name.to_string(),
        value: value.to_string(),
    }
}

#[rstest]
fn test_parse_export_forms() {
    let output = "\
export FOO=bar;
BAZ='with space'; export BAZ;
export QUOTED=\"a \\\"b\\\" c\" OTHER=x;
unset GONE;
echo ignored;
";
    assert_eq!(
        parse_assignments(output),
        vec![
            set("FOO", "bar"),
            set("BAZ", "with space"),
            set("QUOTED", "a \"b\" c"),
            set("OTHER", "x"),
            Intent::UnsetEnv {
                name: "GONE".to_string()
            },
        ]
    );
}

#[rstest]
fn test_parse_keeps_semicolons_inside_quotes() {
    assert_eq!(
        parse_assignments("export A='x;y'; export B=\"1;2\";"),
        vec![set("A", "x;y"), set("B", "1;2")]
    );
}

#[rstest]
fn test_parse_drops_loaded_set_variables() {
    let output = "export LOADEDMODULES=legacy; export _LMFILES_=/m/legacy; export FOO=bar;";
    assert_eq!(parse_assignments(output), vec![set("FOO", "bar")]);
}

#[rstest]
fn test_delegate_load_parses_stdout() {
    let tmp = TempDir::new().unwrap();
    let module = legacy_module(&tmp);
    let backend = ScriptedBackend::new("export FOO=bar;\n", "", 0);

    let execution = delegate(&backend, &module, Mode::Load, Shell::Fish).unwrap();
    assert_eq!(execution.intents, vec![set("FOO", "bar")]);

    let calls = backend.calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0][0], "sh", "load output is always requested in POSIX syntax");
    assert_eq!(calls[0][1], "load");
    assert_eq!(
        calls[0][2],
        module.realpath.display().to_string(),
        "the definition file is passed, not the catalog name"
    );
}

#[rstest]
fn test_delegate_stderr_is_fatal_when_loading() {
    let tmp = TempDir::new().unwrap();
    let module = legacy_module(&tmp);
    let backend = ScriptedBackend::new("export FOO=bar;", "ERROR: something broke\n", 0);

    match delegate(&backend, &module, Mode::Load, Shell::Bash) {
        Err(crate::Error::DelegatedBackend { module, message }) => {
            assert_eq!(module, "legacy");
            assert_eq!(message, "ERROR: something broke");
        }
        other => panic!("Expected DelegatedBackend, got: {:?}", other),
    }
}

#[rstest]
fn test_delegate_nonzero_status_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let module = legacy_module(&tmp);
    let backend = ScriptedBackend::new("", "", 3);
    let result = delegate(&backend, &module, Mode::Unload, Shell::Bash);
    assert!(matches!(result, Err(crate::Error::DelegatedBackend { .. })));
}

#[rstest]
fn test_delegate_help_is_verbatim() {
    let tmp = TempDir::new().unwrap();
    let module = legacy_module(&tmp);
    let backend = ScriptedBackend::new("Legacy module help\n", "diagnostic chatter\n", 0);

    let execution = delegate(&backend, &module, Mode::Help, Shell::Zsh).unwrap();
    assert!(execution.intents.is_empty());
    assert_eq!(execution.output.as_deref(), Some("Legacy module help\n"));
    assert_eq!(backend.calls.borrow()[0][0], "zsh");
}
