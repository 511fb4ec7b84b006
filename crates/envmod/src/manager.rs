// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Load/unload orchestration.
//!
//! A [`ModuleManager`] owns the shell state for one invocation. Each
//! operation resolves a module, executes its definition, applies the
//! resulting intents in order (consulting the policies as prerequisite,
//! conflict and family intents are reached) and finally updates the
//! loaded-set. Module requests made by a definition re-enter the manager
//! depth-first before the remaining intents are applied.

use std::fmt::Write;
use std::path::PathBuf;

use crate::config::Config;
use crate::discovery::{self, Catalog, DiscoveryOptions};
use crate::environment::{Shell, ShellState};
use crate::intent::{Intent, Mode};
use crate::loaded::{LoadedModule, LoadedSet};
use crate::module::{Module, ModuleName};
use crate::policy::{self, ConflictAction, FamilyVars, PrereqAction};
use crate::sandbox::{Execution, ModuleCmd, Sandbox};
use crate::MODULEPATH_VAR;

#[cfg(test)]
#[path = "./manager_test.rs"]
mod manager_test;

/// Options for the manager.
#[derive(Debug, Clone, Default)]
pub struct ManagerOptions {
    /// Resolve conflicts and unmet prerequisites by unloading/loading,
    /// and reload modules that are already loaded.
    pub force: bool,
    /// Fail when a search-path entry is not a directory.
    pub strict_modulepath: bool,
    /// Drop nonexistent entries from path variables before rendering.
    pub prune_missing_paths: bool,
    /// Search paths consulted after `MODULEPATH`.
    pub modulepath: Vec<PathBuf>,
}

/// Result of a help or whatis request.
#[derive(Debug, Clone)]
pub struct ModuleReport {
    pub module: Module,
    pub execution: Execution,
}

impl ModuleReport {
    /// One-line summary.
    pub fn whatis_line(&self) -> String {
        if let Some(output) = &self.execution.output {
            return output.trim().to_string();
        }
        let text = self
            .execution
            .whatis
            .as_deref()
            .or(self.execution.description.as_deref())
            .unwrap_or("");
        format!("{}: {}", self.module.fullname, text)
    }

    /// Multi-line description of what loading the module does.
    pub fn help_text(&self) -> String {
        if let Some(output) = &self.execution.output {
            return output.clone();
        }
        let mut text = String::new();
        let _ = writeln!(text, "Module: {}", self.module.fullname);
        let _ = writeln!(text, "Path: {}", self.module.realpath.display());
        if let Some(description) = &self.execution.description {
            let _ = writeln!(text, "\n{description}");
        }
        if let Some(reason) = &self.execution.skipped {
            let _ = writeln!(text, "\nSkipped: {reason}");
        }
        if let Some(message) = &self.execution.error {
            let _ = writeln!(text, "\nError: {message}");
        }
        let sections: [(&str, fn(&Intent) -> bool); 3] = [
            ("Prerequisites", |i| matches!(i, Intent::Prereq { .. })),
            ("Conflicts", |i| {
                matches!(i, Intent::Conflict { .. } | Intent::Family { .. })
            }),
            ("Effects", |i| {
                !matches!(
                    i,
                    Intent::Prereq { .. } | Intent::Conflict { .. } | Intent::Family { .. }
                )
            }),
        ];
        for (title, filter) in sections {
            let mut intents = self.execution.intents.iter().filter(|&i| filter(i)).peekable();
            if intents.peek().is_none() {
                continue;
            }
            let _ = writeln!(text, "\n{title}:");
            for intent in intents {
                let _ = writeln!(text, "  {intent}");
            }
        }
        text
    }
}

/// Orchestrates module operations over one shell state.
pub struct ModuleManager {
    state: ShellState,
    catalog: Catalog,
    sandbox: Sandbox,
    options: ManagerOptions,
    in_flight: Vec<(Mode, String)>,
}

impl ModuleManager {
    /// Create a manager, validating the loaded-set and scanning the
    /// search path.
    pub fn new(state: ShellState, sandbox: Sandbox, options: ManagerOptions) -> crate::Result<Self> {
        LoadedSet::read(&state)?;
        let mut manager = Self {
            state,
            catalog: Catalog::default(),
            sandbox,
            options,
            in_flight: Vec::new(),
        };
        manager.rescan()?;
        Ok(manager)
    }

    /// Create a manager from the configuration, delegating legacy
    /// definitions to the configured module command.
    pub fn from_config(
        state: ShellState,
        config: &Config,
        shell: Shell,
        force: bool,
    ) -> crate::Result<Self> {
        let mut sandbox = Sandbox::new(shell);
        if let Some(modulecmd) = &config.modulecmd {
            sandbox = sandbox.with_backend(Box::new(ModuleCmd::new(modulecmd)));
        }
        let options = ManagerOptions {
            force,
            strict_modulepath: config.strict_modulepath,
            prune_missing_paths: config.prune_missing_paths,
            modulepath: config.modulepath.clone(),
        };
        Self::new(state, sandbox, options)
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    pub fn into_state(self) -> ShellState {
        self.state
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn loaded(&self) -> crate::Result<LoadedSet> {
        LoadedSet::read(&self.state)
    }

    /// Catalog modules grouped by the search-path directory they came from.
    pub fn avail(&self) -> Vec<(PathBuf, Vec<&Module>)> {
        self.catalog
            .search_paths()
            .iter()
            .map(|path| (path.clone(), self.catalog.modules_in(path).collect()))
            .collect()
    }

    /// Load a module by name or path.
    pub fn load(&mut self, request: &str) -> crate::Result<()> {
        let module = self.catalog.resolve(request)?;
        self.load_module(&module)
    }

    /// Unload a module. Unloading a module that is not loaded does nothing.
    pub fn unload(&mut self, request: &str) -> crate::Result<()> {
        // a module still being loaded has not been recorded yet
        if let Some(start) = self.loading(request, None) {
            return Err(self.cycle(start));
        }
        let loaded = self.loaded()?;
        let module = match loaded.find(request) {
            Some(entry) => match self.module_for(entry) {
                Some(module) => module,
                None => {
                    tracing::warn!(
                        "Definition of {} is gone from {:?}, forgetting it",
                        entry.fullname,
                        entry.path
                    );
                    return LoadedSet::forget(&mut self.state, &entry.fullname);
                }
            },
            // hidden modules are never recorded, so they cannot be found
            // in the loaded-set
            None => match self.catalog.get(request) {
                Ok(Some(module)) if module.hidden => module,
                _ => {
                    tracing::info!("{request} is not loaded");
                    return Ok(());
                }
            },
        };
        self.unload_module(&module)
    }

    /// Unload one module and load another in its place.
    pub fn swap(&mut self, from: &str, to: &str) -> crate::Result<()> {
        if self.loaded()?.find(from).is_none() {
            return Err(crate::Error::NotLoaded(from.to_string()));
        }
        let target = self.catalog.resolve(to)?;
        self.unload(from)?;
        self.load_module(&target)
    }

    /// Unload every loaded module in reverse load order.
    pub fn purge(&mut self) -> crate::Result<()> {
        let fullnames: Vec<String> = self
            .loaded()?
            .iter()
            .rev()
            .map(|entry| entry.fullname.clone())
            .collect();
        for fullname in fullnames {
            self.unload(&fullname)?;
        }
        Ok(())
    }

    pub fn help(&self, request: &str) -> crate::Result<ModuleReport> {
        self.report(request, Mode::Help)
    }

    pub fn whatis(&self, request: &str) -> crate::Result<ModuleReport> {
        self.report(request, Mode::Whatis)
    }

    fn report(&self, request: &str, mode: Mode) -> crate::Result<ModuleReport> {
        let module = self.catalog.resolve(request)?;
        let execution = self.sandbox.execute(&module, mode, &self.state)?;
        Ok(ModuleReport { module, execution })
    }

    /// Shell code moving the invoking shell to the current state.
    pub fn render(&mut self, shell: Shell) -> String {
        self.state.sanitize(self.options.prune_missing_paths);
        self.state.render(shell)
    }

    fn search_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .state
            .get_list(MODULEPATH_VAR)
            .into_iter()
            .map(PathBuf::from)
            .collect();
        for extra in &self.options.modulepath {
            if !paths.contains(extra) {
                paths.push(extra.clone());
            }
        }
        paths
    }

    fn rescan(&mut self) -> crate::Result<()> {
        let options = DiscoveryOptions {
            strict: self.options.strict_modulepath,
        };
        self.catalog = discovery::scan(&self.search_paths(), &options)?;
        Ok(())
    }

    /// Definition of a loaded-set entry: the catalog entry at the recorded
    /// path, else the recorded file itself.
    fn module_for(&self, entry: &LoadedModule) -> Option<Module> {
        if let Some(module) = self.catalog.by_realpath(&entry.path) {
            return Some(module.clone());
        }
        Module::from_file(&entry.fullname, &entry.path, None)
    }

    /// Track a request in flight. Returns false when the module is already
    /// being unloaded further up the stack.
    fn enter(&mut self, mode: Mode, module: &Module) -> crate::Result<bool> {
        let position = self
            .in_flight
            .iter()
            .position(|(m, name)| *m == mode && *name == module.fullname);
        match (position, mode) {
            (None, _) => {
                self.in_flight.push((mode, module.fullname.clone()));
                Ok(true)
            }
            (Some(_), Mode::Unload) => Ok(false),
            (Some(start), _) => Err(self.cycle(start)),
        }
    }

    /// Position of an in-flight load matching the request, ignoring `except`.
    fn loading(&self, request: &str, except: Option<&Module>) -> Option<usize> {
        self.in_flight.iter().position(|(mode, fullname)| {
            *mode == Mode::Load
                && except.is_none_or(|m| m.fullname != *fullname)
                && ModuleName::parse(fullname.as_str()).matches(request)
        })
    }

    /// The request chain from `start`, closed back onto its first module.
    fn cycle(&self, start: usize) -> crate::Error {
        let mut chain: Vec<String> = self.in_flight[start..]
            .iter()
            .map(|(_, name)| name.clone())
            .collect();
        chain.push(self.in_flight[start].1.clone());
        crate::Error::CyclicModuleDependency(chain)
    }

    fn load_module(&mut self, module: &Module) -> crate::Result<()> {
        if self.loaded()?.contains(module) {
            if !self.options.force {
                tracing::info!("{} is already loaded", module.fullname);
                return Ok(());
            }
            self.unload_module(module)?;
        }
        self.enter(Mode::Load, module)?;
        let result = self.load_entered(module);
        self.in_flight.pop();
        result
    }

    fn load_entered(&mut self, module: &Module) -> crate::Result<()> {
        let rival = policy::version_rival(&self.loaded()?, module).map(|r| r.fullname.clone());
        if let Some(rival) = rival {
            tracing::info!("Unloading {rival} before loading {}", module.fullname);
            self.unload(&rival)?;
        }

        let execution = self.sandbox.execute(module, Mode::Load, &self.state)?;
        if execution.skipped.is_some() {
            return Ok(());
        }
        for intent in execution.intents {
            self.apply(module, Mode::Load, intent)?;
        }
        LoadedSet::record(&mut self.state, module)?;
        tracing::debug!("Loaded {}", module.fullname);
        Ok(())
    }

    fn unload_module(&mut self, module: &Module) -> crate::Result<()> {
        if !self.enter(Mode::Unload, module)? {
            tracing::debug!("{} is already being unloaded", module.fullname);
            return Ok(());
        }
        let result = self.unload_entered(module);
        self.in_flight.pop();
        result
    }

    fn unload_entered(&mut self, module: &Module) -> crate::Result<()> {
        let execution = self.sandbox.execute(module, Mode::Unload, &self.state)?;
        for intent in execution.intents {
            self.apply(module, Mode::Unload, intent)?;
        }
        LoadedSet::forget(&mut self.state, &module.fullname)?;
        tracing::debug!("Unloaded {}", module.fullname);
        Ok(())
    }

    /// Apply one intent produced by `module`'s definition.
    fn apply(&mut self, module: &Module, mode: Mode, intent: Intent) -> crate::Result<()> {
        tracing::debug!("{}: {intent}", module.fullname);
        match intent {
            Intent::AddModulePath { path } => {
                self.state.prepend_path(MODULEPATH_VAR, &[path]);
                self.rescan()?;
            }
            Intent::RemoveModulePath { path } => {
                self.state.remove_path(MODULEPATH_VAR, &[path]);
                self.rescan()?;
            }
            Intent::LoadModule { name } => self.load(&name)?,
            Intent::UnloadModule { name } => self.unload(&name)?,
            Intent::SwapModules { from, to } => self.swap(&from, &to)?,
            Intent::Prereq { name, fallback } if mode == Mode::Load => {
                let loaded = self.loaded()?;
                match policy::prereq_action(&loaded, &name, fallback.as_deref(), self.options.force) {
                    PrereqAction::Satisfied => {}
                    PrereqAction::Load(request) => {
                        tracing::info!("Loading {request} required by {}", module.fullname);
                        self.load(&request)?;
                    }
                    PrereqAction::Unmet => {
                        return Err(crate::Error::PrerequisiteUnmet {
                            module: module.fullname.clone(),
                            required: name,
                        });
                    }
                }
            }
            Intent::Conflict { name } if mode == Mode::Load => {
                if let Some(start) = self.loading(&name, Some(module)) {
                    return Err(self.cycle(start));
                }
                let loaded = self.loaded()?;
                match policy::conflict_action(&loaded, &name, module, self.options.force) {
                    ConflictAction::Clear => {}
                    ConflictAction::Unload(request) => {
                        tracing::info!("Unloading {request} which conflicts with {}", module.fullname);
                        self.unload(&request)?;
                    }
                    ConflictAction::Conflicts(loaded) => {
                        return Err(crate::Error::ConflictDetected {
                            module: module.fullname.clone(),
                            loaded,
                        });
                    }
                }
            }
            Intent::Prereq { .. } | Intent::Conflict { .. } => {}
            Intent::Family { tag } => {
                let vars = FamilyVars::new(&tag);
                if mode == Mode::Load {
                    let occupant = vars
                        .occupant(&self.state)
                        .filter(|o| *o != module.fullname && *o != module.name)
                        .map(String::from);
                    if let Some(occupant) = occupant {
                        tracing::info!("Unloading {occupant} from family {tag}");
                        self.unload(&occupant)?;
                    }
                    vars.claim(&mut self.state, module);
                } else {
                    vars.release(&mut self.state, module);
                }
            }
            shell_intent => {
                let search_path_changed = shell_intent.variable() == Some(MODULEPATH_VAR);
                self.state.apply(&shell_intent);
                if search_path_changed {
                    self.rescan()?;
                }
            }
        }
        Ok(())
    }
}
