// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Prerequisite, conflict, family and version exclusivity decisions.
//!
//! The functions here only decide; the orchestrator carries out the
//! resulting loads and unloads.

use crate::environment::ShellState;
use crate::loaded::{LoadedModule, LoadedSet};
use crate::module::Module;
use crate::FAMILY_VAR_PREFIX;

#[cfg(test)]
#[path = "./policy_test.rs"]
mod policy_test;

/// What to do about a `prereq()` when loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrereqAction {
    Satisfied,
    /// Load this module to satisfy the prerequisite.
    Load(String),
    Unmet,
}

/// A prerequisite matches the loaded-set by full name, bare name or
/// family. Force loads the prerequisite itself, before any fallback.
pub fn prereq_action(
    loaded: &LoadedSet,
    name: &str,
    fallback: Option<&str>,
    force: bool,
) -> PrereqAction {
    if loaded.find(name).is_some() {
        PrereqAction::Satisfied
    } else if force {
        PrereqAction::Load(name.to_string())
    } else if let Some(fallback) = fallback {
        PrereqAction::Load(fallback.to_string())
    } else {
        PrereqAction::Unmet
    }
}

/// What to do about a `conflict()` when loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictAction {
    Clear,
    /// Unload this loaded module first.
    Unload(String),
    /// Fail, naming the loaded module.
    Conflicts(String),
}

pub fn conflict_action(
    loaded: &LoadedSet,
    name: &str,
    module: &Module,
    force: bool,
) -> ConflictAction {
    let found = loaded
        .iter()
        .find(|entry| entry.fullname != module.fullname && entry.matches(name));
    match found {
        None => ConflictAction::Clear,
        Some(entry) if force => ConflictAction::Unload(entry.fullname.clone()),
        Some(entry) => ConflictAction::Conflicts(entry.fullname.clone()),
    }
}

/// A loaded module with the same bare name but a different version.
pub fn version_rival<'a>(loaded: &'a LoadedSet, module: &Module) -> Option<&'a LoadedModule> {
    module.version.as_ref()?;
    loaded.iter().find(|entry| {
        let parsed = entry.parsed_name();
        parsed.version.is_some() && parsed.name == module.name && entry.fullname != module.fullname
    })
}

/// The three derived variables of a family tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyVars {
    /// Holds the bare name of the occupant.
    pub family: String,
    pub version: String,
    /// Holds the full name of the occupant.
    pub name: String,
}

impl FamilyVars {
    pub fn new(tag: &str) -> Self {
        let tag: String = tag
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        let family = format!("{FAMILY_VAR_PREFIX}{tag}");
        Self {
            version: format!("{family}_VERSION"),
            name: format!("{family}_NAME"),
            family,
        }
    }

    /// Full name of the module currently occupying the family.
    pub fn occupant<'a>(&self, state: &'a ShellState) -> Option<&'a str> {
        state.get(&self.name).or_else(|| state.get(&self.family))
    }

    pub fn claim(&self, state: &mut ShellState, module: &Module) {
        state.set(&self.family, &module.name);
        state.set(&self.name, &module.fullname);
        match &module.version {
            Some(version) => state.set(&self.version, version),
            None => state.unset(&self.version),
        }
    }

    /// Clear the variables if the module owns the family.
    pub fn release(&self, state: &mut ShellState, module: &Module) {
        let owned = self
            .occupant(state)
            .is_none_or(|occupant| occupant == module.fullname || occupant == module.name);
        if owned {
            state.unset(&self.family);
            state.unset(&self.version);
            state.unset(&self.name);
        }
    }
}
