// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! The loaded-set, read from and written to the paired shell variables.
//!
//! Loaded status is never stored anywhere else: every query re-reads
//! [`LOADED_MODULES_VAR`] and [`LOADED_FILES_VAR`] from the shell state.

use std::path::PathBuf;

use crate::environment::ShellState;
use crate::module::{Module, ModuleName};
use crate::{LOADED_FILES_VAR, LOADED_MODULES_VAR};

#[cfg(test)]
#[path = "./loaded_test.rs"]
mod loaded_test;

/// One entry of the loaded-set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModule {
    pub fullname: String,
    pub path: PathBuf,
}

impl LoadedModule {
    pub fn parsed_name(&self) -> ModuleName {
        ModuleName::parse(self.fullname.as_str())
    }

    pub fn matches(&self, request: &str) -> bool {
        self.parsed_name().matches(request)
    }
}

/// Loaded modules in load order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedSet {
    entries: Vec<LoadedModule>,
}

impl LoadedSet {
    /// Read the loaded-set, failing if the paired lists disagree in length.
    pub fn read(state: &ShellState) -> crate::Result<Self> {
        let names = state.get_list(LOADED_MODULES_VAR);
        let paths = state.get_list(LOADED_FILES_VAR);
        if names.len() != paths.len() {
            return Err(crate::Error::InconsistentLoadedState {
                names_var: LOADED_MODULES_VAR,
                names: names.len(),
                paths_var: LOADED_FILES_VAR,
                paths: paths.len(),
            });
        }
        let entries = names
            .into_iter()
            .zip(paths)
            .map(|(fullname, path)| LoadedModule {
                fullname,
                path: PathBuf::from(path),
            })
            .collect();
        Ok(Self { entries })
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &LoadedModule> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn fullnames(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.fullname.as_str()).collect()
    }

    pub fn contains(&self, module: &Module) -> bool {
        self.entries.iter().any(|e| e.fullname == module.fullname)
    }

    /// First loaded module matching the request by full name, bare name
    /// or family, preferring an exact full-name match.
    pub fn find(&self, request: &str) -> Option<&LoadedModule> {
        self.entries
            .iter()
            .find(|e| e.fullname == request)
            .or_else(|| self.entries.iter().find(|e| e.matches(request)))
    }

    /// Append a module to both lists. Hidden modules are never recorded.
    pub fn record(state: &mut ShellState, module: &Module) -> crate::Result<()> {
        if module.hidden {
            return Ok(());
        }
        let mut current = Self::read(state)?;
        current.entries.retain(|e| e.fullname != module.fullname);
        current.entries.push(LoadedModule {
            fullname: module.fullname.clone(),
            path: module.realpath.clone(),
        });
        current.write(state);
        Ok(())
    }

    /// Remove a module from both lists.
    pub fn forget(state: &mut ShellState, fullname: &str) -> crate::Result<()> {
        let mut current = Self::read(state)?;
        let before = current.len();
        current.entries.retain(|e| e.fullname != fullname);
        if current.len() != before {
            current.write(state);
        }
        Ok(())
    }

    fn write(&self, state: &mut ShellState) {
        let names: Vec<String> = self.entries.iter().map(|e| e.fullname.clone()).collect();
        let paths: Vec<String> = self
            .entries
            .iter()
            .map(|e| e.path.display().to_string())
            .collect();
        state.set_list(LOADED_MODULES_VAR, &names);
        state.set_list(LOADED_FILES_VAR, &paths);
    }
}
