// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! envmod - Environment Module Manager
//!
//! This crate provides the core library for discovering environment
//! modules, executing their definitions, and computing the shell code
//! that moves the invoking shell to the requested state.
//!
//! # Overview
//!
//! Modules live on a search path (`MODULEPATH`). Each is either a native
//! definition, interpreted by a closed sandbox, or a legacy definition
//! delegated to an external module command. Loading a module executes its
//! definition into an ordered list of intents, applies them to an
//! in-memory shell state, and records it in the loaded-set. The state is
//! finally rendered as the minimal set of shell statements.
//!
//! # Example
//!
//! ```python
//! # gcc/9.1.py
//! description = "GNU Compiler Collection"
//! family("compiler")
//! prepend_path("PATH", "/opt/gcc/9.1/bin")
//! if platform == "darwin":
//!     prepend_path("LD_LIBRARY_PATH", "/opt/gcc/9.1/lib")
//! setenv("CC", "gcc")
//! ```

pub mod config;
pub mod discovery;
pub mod environment;
pub mod error;
pub mod intent;
pub mod loaded;
pub mod manager;
pub mod module;
pub mod policy;
pub mod sandbox;

pub use config::{ApiVersion, Config};
pub use discovery::{scan, Catalog, DiscoveryOptions};
pub use environment::{Platform, Shell, ShellState};
pub use error::{Error, Result};
pub use intent::{Intent, Mode};
pub use loaded::{LoadedModule, LoadedSet};
pub use manager::{ManagerOptions, ModuleManager, ModuleReport};
pub use module::{Module, ModuleKind, ModuleName};
pub use sandbox::{Backend, DelegatedOutput, Execution, ModuleCmd, Sandbox};

/// Variable listing the full names of loaded modules.
pub const LOADED_MODULES_VAR: &str = "LOADEDMODULES";

/// Variable listing the definition files of loaded modules, paired
/// entry-by-entry with [`LOADED_MODULES_VAR`].
pub const LOADED_FILES_VAR: &str = "_LMFILES_";

/// Module search path.
pub const MODULEPATH_VAR: &str = "MODULEPATH";

/// Prefix of the variables recording family occupants.
pub const FAMILY_VAR_PREFIX: &str = "MODULE_FAMILY_";
