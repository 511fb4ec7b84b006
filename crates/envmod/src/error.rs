// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for envmod operations.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience Result type with envmod Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during envmod operations.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Name resolved to nothing on the search path
    #[error("Unknown module: {name}")]
    #[diagnostic(
        code(envmod::unknown_module),
        help("{}", suggestion_message(similar))
    )]
    UnknownModule { name: String, similar: Vec<String> },

    /// File was requested explicitly but is not a module definition
    #[error("Not a module definition: {0:?}")]
    #[diagnostic(
        code(envmod::not_a_module),
        help("Native modules end in .py or start with '#%envmod'; delegated modules start with '#%Module'")
    )]
    NotAModuleDefinition(PathBuf),

    /// Parse or evaluation failure inside a native definition
    #[error("Failed to execute {path:?} (line {line}): {message}")]
    #[diagnostic(code(envmod::sandbox_execution))]
    SandboxExecution {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// The definition called `error()`
    #[error("Module {path:?} raised an error: {message}")]
    #[diagnostic(code(envmod::module_error))]
    ModuleError { path: PathBuf, message: String },

    /// A prerequisite is not loaded and could not be loaded implicitly
    #[error("Module '{module}' requires '{required}' to be loaded")]
    #[diagnostic(
        code(envmod::prerequisite_unmet),
        help("Load '{required}' first, or pass --force to load it automatically")
    )]
    PrerequisiteUnmet { module: String, required: String },

    /// A conflicting module is loaded
    #[error("Module '{module}' conflicts with loaded module '{loaded}'")]
    #[diagnostic(
        code(envmod::conflict_detected),
        help("Unload '{loaded}' first, or pass --force to unload it automatically")
    )]
    ConflictDetected { module: String, loaded: String },

    /// The paired loaded-list variables disagree
    #[error(
        "Inconsistent loaded state: {names_var} lists {names} module(s) but {paths_var} lists {paths} file(s)"
    )]
    #[diagnostic(
        code(envmod::inconsistent_loaded_state),
        help("The environment was modified outside of envmod; run 'envmod purge' in a fresh shell")
    )]
    InconsistentLoadedState {
        names_var: &'static str,
        names: usize,
        paths_var: &'static str,
        paths: usize,
    },

    /// The delegated module-command binary reported an error
    #[error("Delegated module command failed for {module}: {message}")]
    #[diagnostic(code(envmod::delegated_backend))]
    DelegatedBackend { module: String, message: String },

    /// A delegated module was used but no module-command binary is configured
    #[error("No module command configured to handle delegated module {0:?}")]
    #[diagnostic(
        code(envmod::delegated_backend_missing),
        help("Set ENVMOD_MODULECMD or 'modulecmd' in the envmod config file")
    )]
    DelegatedBackendMissing(PathBuf),

    /// A module requested itself while still being processed
    #[error("Cyclic module dependency: {}", .0.join(" -> "))]
    #[diagnostic(
        code(envmod::cyclic_dependency),
        help("Remove the circular load/prereq between these modules")
    )]
    CyclicModuleDependency(Vec<String>),

    /// Module is not currently loaded
    #[error("Module is not loaded: {0}")]
    #[diagnostic(code(envmod::not_loaded))]
    NotLoaded(String),

    /// Search path entry does not exist (strict mode)
    #[error("Module search path is not a directory: {0:?}")]
    #[diagnostic(code(envmod::search_path_missing))]
    SearchPathMissing(PathBuf),

    /// Unknown target shell
    #[error("Unsupported shell: {0}")]
    #[diagnostic(
        code(envmod::unsupported_shell),
        help("Supported shells are: bash, zsh, sh, ksh, fish")
    )]
    UnsupportedShell(String),

    /// Invalid YAML in the config file
    #[error("Invalid config file {path:?}: {error}")]
    #[diagnostic(
        code(envmod::invalid_config),
        help("Check YAML syntax and ensure 'api: envmod/v0' is present")
    )]
    InvalidConfig {
        path: PathBuf,
        #[source]
        error: serde_yaml::Error,
    },

    /// Failed to read file
    #[error("Failed to read file: {path:?}")]
    #[diagnostic(code(envmod::read_failed))]
    ReadFailed {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// IO error passthrough
    #[error(transparent)]
    #[diagnostic(code(envmod::io_error))]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn unknown_module<S: Into<String>>(name: S) -> Self {
        Self::UnknownModule {
            name: name.into(),
            similar: Vec::new(),
        }
    }
}

fn suggestion_message(similar: &[String]) -> String {
    if similar.is_empty() {
        "Check the module name with 'envmod avail'".to_string()
    } else {
        format!("Did you mean one of: {}?", similar.join(", "))
    }
}
