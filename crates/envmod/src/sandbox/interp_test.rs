// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use tempfile::TempDir;

use super::*;
use crate::environment::Platform;
use crate::sandbox::parser::parse;

fn execute(body: &str, mode: Mode, state: &ShellState) -> crate::Result<Execution> {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("tool.py");
    std::fs::write(&path, body).unwrap();
    let module = Module::from_file("tool", &path, Some(tmp.path())).unwrap();
    let program = parse(body).expect("definition should parse");
    run(&program, &module, mode, state)
}

fn linux() -> ShellState {
    ShellState::new(Platform::Linux)
}

fn set(name: &str, value: &str) -> Intent {
    Intent::SetEnv {
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[rstest]
fn test_setenv_produces_intent() {
    let execution = execute("setenv(\"SALAMI\", \"/opt/1\")\n", Mode::Load, &linux()).unwrap();
    assert_eq!(execution.intents, vec![set("SALAMI", "/opt/1")]);
    assert!(execution.skipped.is_none());
}

#[rstest]
fn test_unload_mode_inverts_intents() {
    let body = "\
setenv(\"A\", \"1\")
unsetenv(\"B\")
prepend_path(\"PATH\", \"/opt/bin\")
load(\"dep\")
family(\"compiler\")
";
    let execution = execute(body, Mode::Unload, &linux()).unwrap();
    assert_eq!(
        execution.intents,
        vec![
            Intent::UnsetEnv {
                name: "A".to_string()
            },
            Intent::RetractPath {
                name: "PATH".to_string(),
                values: strings(&["/opt/bin"]),
            },
            Intent::UnloadModule {
                name: "dep".to_string()
            },
            Intent::Family {
                tag: "compiler".to_string()
            },
        ]
    );
}

#[rstest]
fn test_help_mode_records_intents_unchanged() {
    let execution = execute("setenv(\"A\", \"1\")\n", Mode::Help, &linux()).unwrap();
    assert_eq!(execution.intents, vec![set("A", "1")]);
}

#[rstest]
fn test_getenv_observes_earlier_intents() {
    let state = ShellState::from_vars([("P", "/b")], Platform::Linux);
    let body = "\
prepend_path(\"P\", \"/a\")
setenv(\"SEEN\", getenv(\"P\"))
";
    let execution = execute(body, Mode::Load, &state).unwrap();
    assert_eq!(execution.intents[1], set("SEEN", "/a:/b"));
    assert_eq!(state.get("P"), Some("/b"), "caller state is untouched");
}

#[rstest]
#[case::default_argument("setenv(\"X\", getenv(\"MISSING\", \"fallback\"))\n", "fallback")]
#[case::keyword_default("setenv(\"X\", getenv(\"MISSING\", default=\"kw\"))\n", "kw")]
#[case::or_operator("setenv(\"X\", getenv(\"MISSING\") or \"either\")\n", "either")]
#[case::concatenation("root = \"/opt\"\nsetenv(\"X\", root + \"/bin\")\n", "/opt/bin")]
#[case::membership("if \"b\" in [\"a\", \"b\"]:\n    setenv(\"X\", \"yes\")\n", "yes")]
fn test_expressions(#[case] body: &str, #[case] expected: &str) {
    let execution = execute(body, Mode::Load, &linux()).unwrap();
    assert_eq!(execution.intents, vec![set("X", expected)]);
}

#[rstest]
#[case(Platform::Darwin, "mac")]
#[case(Platform::Linux, "linux")]
#[case(Platform::Windows, "other")]
fn test_platform_conditionals(#[case] platform: Platform, #[case] expected: &str) {
    let body = "\
if platform == \"darwin\":
    setenv(\"OS\", \"mac\")
elif platform == \"linux\":
    setenv(\"OS\", \"linux\")
else:
    setenv(\"OS\", \"other\")
";
    let execution = execute(body, Mode::Load, &ShellState::new(platform)).unwrap();
    assert_eq!(execution.intents, vec![set("OS", expected)]);
}

#[rstest]
fn test_skip_discards_intents() {
    let body = "\
setenv(\"A\", \"1\")
if platform != \"plan9\":
    skip(\"plan9 only\")
setenv(\"B\", \"1\")
";
    let execution = execute(body, Mode::Load, &linux()).unwrap();
    assert!(execution.intents.is_empty());
    assert_eq!(execution.skipped.as_deref(), Some("plan9 only"));
}

#[rstest]
fn test_skip_without_reason_names_platform() {
    let execution = execute("skip()\n", Mode::Load, &linux()).unwrap();
    assert_eq!(execution.skipped.as_deref(), Some("not applicable on linux"));
}

#[rstest]
fn test_error_aborts_load() {
    let result = execute("setenv(\"A\", \"1\")\nerror(\"broken\")\n", Mode::Load, &linux());
    match result {
        Err(crate::Error::ModuleError { path, message }) => {
            assert!(path.ends_with("tool.py"));
            assert_eq!(message, "broken");
        }
        other => panic!("Expected ModuleError, got: {:?}", other),
    }
}

#[rstest]
fn test_error_is_a_warning_when_unloading() {
    let execution =
        execute("setenv(\"A\", \"1\")\nerror(\"broken\")\n", Mode::Unload, &linux()).unwrap();
    assert_eq!(execution.intents.len(), 1);
}

#[rstest]
#[case::whatis(Mode::Whatis)]
#[case::help(Mode::Help)]
fn test_error_stops_description_but_keeps_bindings(#[case] mode: Mode) {
    let body = "\
whatis = \"windows-only tool\"
prepend_path(\"PATH\", \"/opt/win\")
if platform != \"windows\":
    error(\"unsupported platform\")
setenv(\"A\", \"1\")
description = \"never bound\"
";
    let execution = execute(body, mode, &linux()).unwrap();
    assert_eq!(execution.whatis.as_deref(), Some("windows-only tool"));
    assert_eq!(execution.description, None);
    assert_eq!(execution.error.as_deref(), Some("unsupported platform"));
    assert_eq!(
        execution.intents,
        vec![Intent::PrependPath {
            name: "PATH".to_string(),
            values: strings(&["/opt/win"]),
        }]
    );
}

#[rstest]
fn test_warn_continues() {
    let execution = execute("warn(\"careful\")\nsetenv(\"A\", \"1\")\n", Mode::Load, &linux())
        .unwrap();
    assert_eq!(execution.intents, vec![set("A", "1")]);
}

#[rstest]
fn test_description_and_whatis_bindings() {
    let body = "\
description = \"A compiler\"
whatis = \"gcc: \" + \"the GNU compiler\"
";
    let execution = execute(body, Mode::Whatis, &linux()).unwrap();
    assert_eq!(execution.description.as_deref(), Some("A compiler"));
    assert_eq!(execution.whatis.as_deref(), Some("gcc: the GNU compiler"));
}

#[rstest]
fn test_variadic_paths_flatten_lists() {
    let body = "append_path(\"P\", [\"/a\", \"/b\"], \"/c\")\n";
    let execution = execute(body, Mode::Load, &linux()).unwrap();
    assert_eq!(
        execution.intents,
        vec![Intent::AppendPath {
            name: "P".to_string(),
            values: strings(&["/a", "/b", "/c"]),
        }]
    );
}

#[rstest]
fn test_prereq_with_fallback() {
    let body = "prereq(\"mpi\", fallback=\"openmpi/4.1\")\nconflict(\"mvapich\", \"intelmpi\")\n";
    let execution = execute(body, Mode::Load, &linux()).unwrap();
    assert_eq!(
        execution.intents,
        vec![
            Intent::Prereq {
                name: "mpi".to_string(),
                fallback: Some("openmpi/4.1".to_string()),
            },
            Intent::Conflict {
                name: "mvapich".to_string()
            },
            Intent::Conflict {
                name: "intelmpi".to_string()
            },
        ]
    );
}

#[rstest]
#[case::unknown_function("pass\nos_system(\"rm -rf /\")\n", 2)]
#[case::undefined_name("setenv(\"A\", missing)\n", 1)]
#[case::wrong_type("setenv(\"A\", [\"x\"])\n", 1)]
#[case::too_many_arguments("unsetenv(\"A\", \"B\")\n", 1)]
#[case::missing_argument("setenv(\"A\")\n", 1)]
#[case::unknown_keyword("prereq(\"a\", other=\"b\")\n", 1)]
#[case::skip_in_expression("x = skip()\n", 1)]
#[case::bad_concatenation("setenv(\"A\", \"x\" + None)\n", 1)]
fn test_execution_errors_carry_line(#[case] body: &str, #[case] expected_line: usize) {
    match execute(body, Mode::Load, &linux()) {
        Err(crate::Error::SandboxExecution { line, .. }) => assert_eq!(line, expected_line),
        other => panic!("Expected SandboxExecution, got: {:?}", other),
    }
}
