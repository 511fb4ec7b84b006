// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Requested shell-state mutations produced by module definitions.

use std::fmt;

#[cfg(test)]
#[path = "./intent_test.rs"]
mod intent_test;

/// The operation a module definition is executed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Load,
    Unload,
    Help,
    Whatis,
}

impl Mode {
    /// Subcommand name understood by the delegated module command.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Unload => "unload",
            Self::Help => "help",
            Self::Whatis => "whatis",
        }
    }

    /// Whether intents should be applied to the shell state.
    pub fn is_effective(&self) -> bool {
        matches!(self, Self::Load | Self::Unload)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single requested mutation, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    SetEnv { name: String, value: String },
    UnsetEnv { name: String },
    PrependPath { name: String, values: Vec<String> },
    AppendPath { name: String, values: Vec<String> },
    RemovePath { name: String, values: Vec<String> },
    /// Undo of a prepend or append: drops the first occurrence of each value.
    RetractPath { name: String, values: Vec<String> },
    SetAlias { name: String, body: String },
    /// The body, when known, decides whether an alias or function is removed.
    UnsetAlias { name: String, body: Option<String> },
    SetFunction { name: String, body: String },
    UnsetFunction { name: String, body: Option<String> },
    AddModulePath { path: String },
    RemoveModulePath { path: String },
    LoadModule { name: String },
    UnloadModule { name: String },
    SwapModules { from: String, to: String },
    Prereq { name: String, fallback: Option<String> },
    Conflict { name: String },
    Family { tag: String },
}

impl Intent {
    /// Map a declared intent to what it means for the given mode.
    ///
    /// Unloading reverses the additive operations and drops the
    /// subtractive ones. Policy intents pass through unchanged.
    pub fn for_mode(self, mode: Mode) -> Option<Self> {
        if mode != Mode::Unload {
            return Some(self);
        }
        match self {
            Self::SetEnv { name, .. } => Some(Self::UnsetEnv { name }),
            Self::PrependPath { name, values } | Self::AppendPath { name, values } => {
                Some(Self::RetractPath { name, values })
            }
            Self::SetAlias { name, body } => Some(Self::UnsetAlias {
                name,
                body: Some(body),
            }),
            Self::SetFunction { name, body } => Some(Self::UnsetFunction {
                name,
                body: Some(body),
            }),
            Self::AddModulePath { path } => Some(Self::RemoveModulePath { path }),
            Self::LoadModule { name } => Some(Self::UnloadModule { name }),
            Self::UnsetEnv { .. }
            | Self::RemovePath { .. }
            | Self::RetractPath { .. }
            | Self::UnsetAlias { .. }
            | Self::UnsetFunction { .. }
            | Self::RemoveModulePath { .. }
            | Self::UnloadModule { .. }
            | Self::SwapModules { .. } => None,
            policy @ (Self::Prereq { .. } | Self::Conflict { .. } | Self::Family { .. }) => {
                Some(policy)
            }
        }
    }
}

impl Intent {
    /// Variable changed by an environment or path-list intent.
    pub fn variable(&self) -> Option<&str> {
        match self {
            Self::SetEnv { name, .. }
            | Self::UnsetEnv { name }
            | Self::PrependPath { name, .. }
            | Self::AppendPath { name, .. }
            | Self::RemovePath { name, .. }
            | Self::RetractPath { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetEnv { name, value } => write!(f, "setenv {name} {value}"),
            Self::UnsetEnv { name } => write!(f, "unsetenv {name}"),
            Self::PrependPath { name, values } => {
                write!(f, "prepend-path {name} {}", values.join(" "))
            }
            Self::AppendPath { name, values } => {
                write!(f, "append-path {name} {}", values.join(" "))
            }
            Self::RemovePath { name, values } | Self::RetractPath { name, values } => {
                write!(f, "remove-path {name} {}", values.join(" "))
            }
            Self::SetAlias { name, body } => write!(f, "set-alias {name} {body}"),
            Self::UnsetAlias { name, .. } => write!(f, "unset-alias {name}"),
            Self::SetFunction { name, body } => write!(f, "set-function {name} {body}"),
            Self::UnsetFunction { name, .. } => write!(f, "unset-function {name}"),
            Self::AddModulePath { path } => write!(f, "use {path}"),
            Self::RemoveModulePath { path } => write!(f, "unuse {path}"),
            Self::LoadModule { name } => write!(f, "load {name}"),
            Self::UnloadModule { name } => write!(f, "unload {name}"),
            Self::SwapModules { from, to } => write!(f, "swap {from} {to}"),
            Self::Prereq {
                name,
                fallback: Some(fallback),
            } => write!(f, "prereq {name} (fallback {fallback})"),
            Self::Prereq { name, fallback: None } => write!(f, "prereq {name}"),
            Self::Conflict { name } => write!(f, "conflict {name}"),
            Self::Family { tag } => write!(f, "family {tag}"),
        }
    }
}
