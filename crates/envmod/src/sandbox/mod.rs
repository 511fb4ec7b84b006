// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Execution of module definitions.
//!
//! Native definitions are parsed and interpreted; delegated definitions
//! are forwarded to an external module command. Either way the result is
//! an ordered list of intents. Nothing here mutates the caller's shell
//! state.

mod delegate;
mod interp;
mod parser;

use crate::environment::{Shell, ShellState};
use crate::intent::{Intent, Mode};
use crate::module::{Module, ModuleKind};

pub use delegate::{parse_assignments, Backend, DelegatedOutput, ModuleCmd};
pub use interp::Value;
pub use parser::{parse, ParseError, Program};


/// Outcome of executing one definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Execution {
    /// Intents in declaration order, already mapped through the mode.
    pub intents: Vec<Intent>,
    pub description: Option<String>,
    pub whatis: Option<String>,
    /// Set when the definition skipped itself; no intents are produced.
    pub skipped: Option<String>,
    /// Verbatim backend output for delegated help and whatis.
    pub output: Option<String>,
    /// Message of an `error()` that stopped a help or whatis execution.
    pub error: Option<String>,
}

/// Runs definitions of either kind.
pub struct Sandbox {
    shell: Shell,
    backend: Option<Box<dyn Backend>>,
}

impl Sandbox {
    pub fn new(shell: Shell) -> Self {
        Self {
            shell,
            backend: None,
        }
    }

    /// Use the given backend for delegated definitions.
    pub fn with_backend(mut self, backend: Box<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn shell(&self) -> Shell {
        self.shell
    }

    /// Execute a definition against a read-only view of the shell state.
    pub fn execute(
        &self,
        module: &Module,
        mode: Mode,
        state: &ShellState,
    ) -> crate::Result<Execution> {
        tracing::debug!("Executing {} ({mode})", module.fullname);
        match module.kind {
            ModuleKind::Native => execute_native(module, mode, state),
            ModuleKind::Delegated => {
                let backend = self
                    .backend
                    .as_deref()
                    .ok_or_else(|| crate::Error::DelegatedBackendMissing(module.realpath.clone()))?;
                delegate::delegate(backend, module, mode, self.shell)
            }
        }
    }
}

/// Parse and interpret a native definition.
pub fn execute_native(
    module: &Module,
    mode: Mode,
    state: &ShellState,
) -> crate::Result<Execution> {
    let source =
        std::fs::read_to_string(&module.path).map_err(|e| crate::Error::ReadFailed {
            path: module.path.clone(),
            error: e,
        })?;
    let program = parser::parse(&source).map_err(|e| crate::Error::SandboxExecution {
        path: module.realpath.clone(),
        line: e.line,
        message: e.message,
    })?;
    interp::run(&program, module, mode, state)
}
