// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! In-memory shell state and the shell code that reproduces its changes.
//!
//! A [`ShellState`] starts from a baseline snapshot of the invoking
//! shell's variables. Every mutation is recorded on top of that baseline
//! (removals are kept as tombstones) so that [`ShellState::render`] can
//! emit only the statements needed to move the real shell to the new
//! state.

use std::collections::HashMap;
use std::fmt::Write;
use std::path::Path;
use std::str::FromStr;

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::intent::Intent;

#[cfg(test)]
#[path = "./environment_test.rs"]
mod environment_test;

/// Matches positional-parameter references such as `$1`, `$@` or `${2}`.
static POSITIONAL_PARAMETER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$(?:[0-9@*#]|\{[0-9@*#])").expect("valid positional regex"));

const DARWIN_LIBRARY_PATH: &str = "DYLD_LIBRARY_PATH";
const LIBRARY_PATH: &str = "LD_LIBRARY_PATH";

/// Operating system family the module is evaluated for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    Linux,
    Darwin,
    Windows,
    Other(String),
}

impl Platform {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => Self::Linux,
            "macos" => Self::Darwin,
            "windows" => Self::Windows,
            other => Self::Other(other.to_string()),
        }
    }

    /// Identifier exposed to module definitions as `platform`.
    pub fn identifier(&self) -> &str {
        match self {
            Self::Linux => "linux",
            Self::Darwin => "darwin",
            Self::Windows => "windows",
            Self::Other(name) => name,
        }
    }

    pub fn path_separator(&self) -> char {
        match self {
            Self::Windows => ';',
            _ => ':',
        }
    }
}

/// Target shell syntax for rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Bash,
    Zsh,
    Sh,
    Ksh,
    Fish,
}

impl Shell {
    /// Guess the shell from a path such as the value of `$SHELL`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        path.as_ref()
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.parse().ok())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Bash => "bash",
            Self::Zsh => "zsh",
            Self::Sh => "sh",
            Self::Ksh => "ksh",
            Self::Fish => "fish",
        }
    }
}

impl FromStr for Shell {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "bash" => Ok(Self::Bash),
            "zsh" => Ok(Self::Zsh),
            "sh" | "dash" => Ok(Self::Sh),
            "ksh" => Ok(Self::Ksh),
            "fish" => Ok(Self::Fish),
            other => Err(crate::Error::UnsupportedShell(other.to_string())),
        }
    }
}

/// One statement-level difference between the baseline and current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Set { name: String, value: String },
    Unset { name: String },
    Alias { name: String, body: String },
    Unalias { name: String },
    Function { name: String, body: String },
    UnsetFunction { name: String },
}

/// Variables, aliases and shell functions of the invoking shell.
#[derive(Debug, Clone)]
pub struct ShellState {
    platform: Platform,
    baseline: HashMap<String, String>,
    variables: IndexMap<String, Option<String>>,
    aliases: IndexMap<String, Option<String>>,
    functions: IndexMap<String, Option<String>>,
    path_variables: IndexSet<String>,
}

impl ShellState {
    /// Create a state with an empty baseline.
    pub fn new(platform: Platform) -> Self {
        Self::from_vars(std::iter::empty::<(String, String)>(), platform)
    }

    /// Create a state whose baseline is the given variables.
    pub fn from_vars<I, K, V>(vars: I, platform: Platform) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            platform,
            baseline: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            variables: IndexMap::new(),
            aliases: IndexMap::new(),
            functions: IndexMap::new(),
            path_variables: IndexSet::new(),
        }
    }

    /// Snapshot the real process environment as the baseline.
    ///
    /// This is the only place the process environment is read.
    pub fn from_process_env() -> Self {
        Self::from_vars(std::env::vars(), Platform::current())
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Current value of a variable, falling back to the baseline.
    pub fn get(&self, name: &str) -> Option<&str> {
        match self.variables.get(name) {
            Some(value) => value.as_deref(),
            None => self.baseline.get(name).map(String::as_str),
        }
    }

    /// Value the variable had when this invocation started.
    pub fn baseline(&self, name: &str) -> Option<&str> {
        self.baseline.get(name).map(String::as_str)
    }

    pub fn set<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        self.variables.insert(name.into(), Some(value.into()));
    }

    /// Record the variable as removed.
    pub fn unset<N: Into<String>>(&mut self, name: N) {
        self.variables.insert(name.into(), None);
    }

    /// Split a list-valued variable on the platform separator.
    pub fn get_list(&self, name: &str) -> Vec<String> {
        let separator = self.platform.path_separator();
        self.get(name)
            .map(|value| {
                value
                    .split(separator)
                    .filter(|entry| !entry.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Store a list-valued variable; an empty list removes it.
    pub fn set_list<N: Into<String>>(&mut self, name: N, entries: &[String]) {
        if entries.is_empty() {
            self.unset(name);
        } else {
            let joined = entries.join(&self.platform.path_separator().to_string());
            self.set(name, joined);
        }
    }

    fn path_target(&self, name: &str) -> String {
        if self.platform == Platform::Darwin && name == LIBRARY_PATH {
            DARWIN_LIBRARY_PATH.to_string()
        } else {
            name.to_string()
        }
    }

    fn split_values(&self, values: &[String]) -> Vec<String> {
        let separator = self.platform.path_separator();
        values
            .iter()
            .flat_map(|value| value.split(separator))
            .filter(|entry| !entry.is_empty())
            .map(String::from)
            .unique()
            .collect()
    }

    /// Insert entries at the front, moving any existing occurrences.
    pub fn prepend_path(&mut self, name: &str, values: &[String]) {
        let target = self.path_target(name);
        let added = self.split_values(values);
        let mut entries = added.clone();
        entries.extend(
            self.get_list(&target)
                .into_iter()
                .filter(|entry| !added.contains(entry)),
        );
        self.path_variables.insert(target.clone());
        self.set_list(target, &entries);
    }

    /// Insert entries at the back, moving any existing occurrences.
    pub fn append_path(&mut self, name: &str, values: &[String]) {
        let target = self.path_target(name);
        let added = self.split_values(values);
        let mut entries: Vec<String> = self
            .get_list(&target)
            .into_iter()
            .filter(|entry| !added.contains(entry))
            .collect();
        entries.extend(added);
        self.path_variables.insert(target.clone());
        self.set_list(target, &entries);
    }

    pub fn remove_path(&mut self, name: &str, values: &[String]) {
        let target = self.path_target(name);
        let removed = self.split_values(values);
        let entries: Vec<String> = self
            .get_list(&target)
            .into_iter()
            .filter(|entry| !removed.contains(entry))
            .collect();
        self.path_variables.insert(target.clone());
        self.set_list(target, &entries);
    }

    /// Remove only the first occurrence of each value.
    pub fn retract_path(&mut self, name: &str, values: &[String]) {
        let target = self.path_target(name);
        let mut entries = self.get_list(&target);
        for value in self.split_values(values) {
            if let Some(index) = entries.iter().position(|entry| *entry == value) {
                entries.remove(index);
            }
        }
        self.path_variables.insert(target.clone());
        self.set_list(target, &entries);
    }

    /// Define a shell command, as an alias or function depending on the body.
    pub fn define_command<N: Into<String>, B: Into<String>>(&mut self, name: N, body: B) {
        let name = name.into();
        let body = body.into();
        if is_function_body(&body) {
            self.functions.insert(name, Some(body));
        } else {
            self.aliases.insert(name, Some(body));
        }
    }

    pub fn remove_alias(&mut self, name: &str, body: Option<&str>) {
        match body {
            Some(body) if is_function_body(body) => self.functions.insert(name.into(), None),
            _ => self.aliases.insert(name.into(), None),
        };
    }

    pub fn remove_function(&mut self, name: &str, body: Option<&str>) {
        match body {
            Some(body) if !is_function_body(body) => self.aliases.insert(name.into(), None),
            _ => self.functions.insert(name.into(), None),
        };
    }

    pub fn alias(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).and_then(|body| body.as_deref())
    }

    pub fn function(&self, name: &str) -> Option<&str> {
        self.functions.get(name).and_then(|body| body.as_deref())
    }

    /// Apply a shell-level intent.
    ///
    /// Returns false for intents that are not shell mutations (module
    /// requests and policies), leaving the state untouched.
    pub fn apply(&mut self, intent: &Intent) -> bool {
        match intent {
            Intent::SetEnv { name, value } => self.set(name, value),
            Intent::UnsetEnv { name } => self.unset(name),
            Intent::PrependPath { name, values } => self.prepend_path(name, values),
            Intent::AppendPath { name, values } => self.append_path(name, values),
            Intent::RemovePath { name, values } => self.remove_path(name, values),
            Intent::RetractPath { name, values } => self.retract_path(name, values),
            Intent::SetAlias { name, body } | Intent::SetFunction { name, body } => {
                self.define_command(name, body)
            }
            Intent::UnsetAlias { name, body } => self.remove_alias(name, body.as_deref()),
            Intent::UnsetFunction { name, body } => self.remove_function(name, body.as_deref()),
            _ => return false,
        }
        true
    }

    /// Remove duplicate entries from list-valued path variables, and
    /// optionally entries that do not exist on disk.
    pub fn sanitize(&mut self, prune_missing: bool) {
        let names: Vec<String> = self.path_variables.iter().cloned().collect();
        for name in names {
            if self.get(&name).is_none() {
                continue;
            }
            let entries: Vec<String> = self
                .get_list(&name)
                .into_iter()
                .unique()
                .filter(|entry| !prune_missing || Path::new(entry).exists())
                .collect();
            self.set_list(name, &entries);
        }
    }

    /// Differences between the baseline and the current state.
    pub fn diff(&self) -> Vec<Change> {
        let mut changes = Vec::new();
        for (name, value) in &self.variables {
            match (value, self.baseline.get(name)) {
                (Some(value), Some(old)) if value == old => {}
                (Some(value), _) => changes.push(Change::Set {
                    name: name.clone(),
                    value: value.clone(),
                }),
                (None, Some(_)) => changes.push(Change::Unset { name: name.clone() }),
                (None, None) => {}
            }
        }
        // aliases and functions cannot be observed from the environment,
        // so every touched entry is emitted
        for (name, body) in &self.aliases {
            changes.push(match body {
                Some(body) => Change::Alias {
                    name: name.clone(),
                    body: body.clone(),
                },
                None => Change::Unalias { name: name.clone() },
            });
        }
        for (name, body) in &self.functions {
            changes.push(match body {
                Some(body) => Change::Function {
                    name: name.clone(),
                    body: body.clone(),
                },
                None => Change::UnsetFunction { name: name.clone() },
            });
        }
        changes
    }

    /// Render the minimal shell code for the given shell.
    pub fn render(&self, shell: Shell) -> String {
        let mut script = String::new();
        for change in self.diff() {
            let _ = match shell {
                Shell::Fish => self.write_fish(&mut script, &change),
                _ => write_posix(&mut script, shell, &change),
            };
        }
        script
    }

    fn write_fish(&self, out: &mut String, change: &Change) -> std::fmt::Result {
        match change {
            Change::Set { name, value } if self.path_variables.contains(name) => {
                let entries = value
                    .split(self.platform.path_separator())
                    .map(fish_quote)
                    .join(" ");
                writeln!(out, "set -gx {name} {entries};")
            }
            Change::Set { name, value } => writeln!(out, "set -gx {name} {};", fish_quote(value)),
            Change::Unset { name } => writeln!(out, "set -e {name};"),
            Change::Alias { name, body } => writeln!(out, "alias {name} {};", fish_quote(body)),
            Change::Unalias { name } | Change::UnsetFunction { name } => {
                writeln!(out, "functions -e {name};")
            }
            Change::Function { name, body } => writeln!(out, "function {name}; {body}; end;"),
        }
    }
}

fn write_posix(out: &mut String, shell: Shell, change: &Change) -> std::fmt::Result {
    match change {
        Change::Set { name, value } => writeln!(out, "export {name}={};", posix_quote(value)),
        Change::Unset { name } => writeln!(out, "unset {name};"),
        Change::Alias { name, body } => writeln!(out, "alias {name}={};", posix_quote(body)),
        Change::Unalias { name } => writeln!(out, "unalias {name} 2>/dev/null || true;"),
        Change::Function { name, body } => {
            writeln!(out, "{name}() {{\n    {body}\n}};")?;
            if shell == Shell::Bash {
                writeln!(out, "export -f {name};")?;
            }
            Ok(())
        }
        Change::UnsetFunction { name } => writeln!(out, "unset -f {name} 2>/dev/null || true;"),
    }
}

/// Whether a command body references positional parameters.
pub fn is_function_body(body: &str) -> bool {
    POSITIONAL_PARAMETER.is_match(body)
}

/// Single-quote a value for POSIX shells.
pub fn posix_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn fish_quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', r"\\").replace('\'', r"\'"))
}
