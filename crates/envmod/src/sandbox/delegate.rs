// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Delegation of legacy module definitions to an external module command.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::Execution;
use crate::environment::Shell;
use crate::intent::{Intent, Mode};
use crate::module::Module;
use crate::{LOADED_FILES_VAR, LOADED_MODULES_VAR};

#[cfg(test)]
#[path = "./delegate_test.rs"]
mod delegate_test;

/// Shell dialect requested from the backend when its output is parsed.
const PARSED_SHELL: Shell = Shell::Sh;

/// Captured result of one backend invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelegatedOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, None when terminated by a signal.
    pub status: Option<i32>,
}

impl DelegatedOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// An external program that evaluates delegated definitions.
pub trait Backend {
    /// Run `<program> <shell> <subcommand> <args...>`.
    fn run(&self, shell: &str, subcommand: &str, args: &[String]) -> crate::Result<DelegatedOutput>;
}

/// The configured module-command executable.
#[derive(Debug, Clone)]
pub struct ModuleCmd {
    program: PathBuf,
}

impl ModuleCmd {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Backend for ModuleCmd {
    fn run(&self, shell: &str, subcommand: &str, args: &[String]) -> crate::Result<DelegatedOutput> {
        tracing::debug!(
            "Running {:?} {shell} {subcommand} {}",
            self.program,
            args.join(" ")
        );
        let output = Command::new(&self.program)
            .arg(shell)
            .arg(subcommand)
            .args(args)
            .output()
            .map_err(|e| crate::Error::ReadFailed {
                path: self.program.clone(),
                error: e,
            })?;
        Ok(DelegatedOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: output.status.code(),
        })
    }
}

/// Forward a module operation to the backend.
///
/// Load and unload output is parsed into intents; help and whatis output
/// is kept verbatim.
pub fn delegate(
    backend: &dyn Backend,
    module: &Module,
    mode: Mode,
    shell: Shell,
) -> crate::Result<Execution> {
    // The module command resolves names against its own MODULEPATH, which
    // may differ from ours; the resolved file names exactly this definition.
    let request = vec![module.realpath.display().to_string()];
    let shell = if mode.is_effective() { PARSED_SHELL } else { shell };
    let output = backend.run(shell.name(), mode.as_str(), &request)?;

    if !mode.is_effective() {
        if !output.stderr.trim().is_empty() {
            tracing::debug!("{}: {}", module.fullname, output.stderr.trim());
        }
        return Ok(Execution {
            output: Some(output.stdout),
            ..Default::default()
        });
    }

    if !output.stderr.trim().is_empty() {
        return Err(crate::Error::DelegatedBackend {
            module: module.fullname.clone(),
            message: output.stderr.trim().to_string(),
        });
    }
    if !output.success() {
        return Err(crate::Error::DelegatedBackend {
            module: module.fullname.clone(),
            message: match output.status {
                Some(code) => format!("exited with status {code}"),
                None => "terminated by a signal".to_string(),
            },
        });
    }
    Ok(Execution {
        intents: parse_assignments(&output.stdout),
        ..Default::default()
    })
}

/// Parse POSIX shell output into variable intents.
///
/// Understands `export NAME=value`, `NAME=value`, and `unset NAME`, with
/// single- or double-quoted values. Other statements are ignored, as are
/// assignments to the loaded-set variables.
pub fn parse_assignments(output: &str) -> Vec<Intent> {
    let mut intents = Vec::new();
    for statement in split_statements(output) {
        let words = split_words(&statement);
        let Some((first, rest)) = words.split_first() else {
            continue;
        };
        match first.as_str() {
            "export" => {
                for word in rest {
                    if let Some(intent) = assignment(word) {
                        intents.push(intent);
                    }
                }
            }
            "unset" => {
                for name in rest.iter().take_while(|w| !w.starts_with('-')) {
                    intents.push(Intent::UnsetEnv { name: name.clone() });
                }
            }
            _ => match assignment(first) {
                Some(intent) if rest.is_empty() => intents.push(intent),
                _ => tracing::trace!("Ignoring delegated statement: {statement}"),
            },
        }
    }
    intents.retain(|intent| match intent {
        Intent::SetEnv { name, .. } | Intent::UnsetEnv { name } => {
            name != LOADED_MODULES_VAR && name != LOADED_FILES_VAR
        }
        _ => true,
    });
    intents
}

fn assignment(word: &str) -> Option<Intent> {
    let (name, value) = word.split_once('=')?;
    let valid = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then(|| Intent::SetEnv {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Split on unquoted `;` and newlines.
fn split_statements(output: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in output.chars() {
        if escaped {
            escaped = false;
        } else if quote == Some('\'') {
            if c == '\'' {
                quote = None;
            }
        } else if c == '\\' {
            escaped = true;
        } else if let Some(q) = quote {
            if c == q {
                quote = None;
            }
        } else if c == '\'' || c == '"' {
            quote = Some(c);
        } else if c == ';' || c == '\n' {
            if !current.trim().is_empty() {
                statements.push(current.trim().to_string());
            }
            current.clear();
            continue;
        }
        current.push(c);
    }
    if !current.trim().is_empty() {
        statements.push(current.trim().to_string());
    }
    statements
}

/// Split one statement into words, removing quotes and escapes.
fn split_words(statement: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = statement.chars();
    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                current.extend(chars.by_ref().take_while(|c| *c != '\''));
            }
            '"' => {
                in_word = true;
                while let Some(c) = chars.next() {
                    match c {
                        '"' => break,
                        '\\' => {
                            if let Some(next) = chars.next() {
                                if !matches!(next, '"' | '\\' | '$' | '`') {
                                    current.push('\\');
                                }
                                current.push(next);
                            }
                        }
                        other => current.push(other),
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            other => {
                in_word = true;
                current.push(other);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}
