// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Discovery of module definitions on the module search path.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::module::{module_name_for_file, Module, ModuleName};

#[cfg(test)]
#[path = "./discovery_test.rs"]
mod discovery_test;

/// Name of the symlink selecting the default version of a module.
pub const DEFAULT_LINK: &str = "default";

/// Options for discovery behavior.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    /// Fail when a search-path entry is not a directory.
    pub strict: bool,
}

/// Ordered catalog of the modules available on the search path.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    search_paths: Vec<PathBuf>,
    modules: IndexMap<String, Module>,
}

/// Scan search-path directories in order.
///
/// Files directly inside a directory are unversioned modules; one level of
/// subdirectories holds `family/version` modules. When the same full name
/// appears in several directories the earliest directory wins.
pub fn scan<P: AsRef<Path>>(search_paths: &[P], options: &DiscoveryOptions) -> crate::Result<Catalog> {
    let mut catalog = Catalog::default();
    let mut explicit_defaults: HashMap<String, String> = HashMap::new();

    for search_path in search_paths {
        let search_path = search_path.as_ref();
        if !search_path.is_dir() {
            if options.strict {
                return Err(crate::Error::SearchPathMissing(search_path.to_path_buf()));
            }
            tracing::warn!("Skipping module path that is not a directory: {search_path:?}");
            continue;
        }
        catalog.search_paths.push(search_path.to_path_buf());

        for entry in sorted_entries(search_path)? {
            let Some(entry_name) = entry.file_name().and_then(|n| n.to_str()).map(String::from)
            else {
                continue;
            };
            if entry.is_dir() {
                if let Some(default) = scan_family(&mut catalog, search_path, &entry, &entry_name)? {
                    let name = ModuleName::parse(&default).name;
                    explicit_defaults.entry(name).or_insert(default);
                }
            } else if let Some(fullname) = module_name_for_file(&entry) {
                catalog.insert(&fullname, &entry, search_path);
            }
        }
    }

    catalog.mark_defaults(&explicit_defaults);
    tracing::debug!(
        "Discovered {} module(s) in {} search path(s)",
        catalog.modules.len(),
        catalog.search_paths.len()
    );
    Ok(catalog)
}

/// Scan one family directory, returning the fullname its default link
/// points to, if any.
fn scan_family(
    catalog: &mut Catalog,
    search_path: &Path,
    dir: &Path,
    family: &str,
) -> crate::Result<Option<String>> {
    let mut default = None;
    for entry in sorted_entries(dir)? {
        let Some(leaf) = module_name_for_file(&entry) else {
            continue;
        };
        if leaf == DEFAULT_LINK {
            default = default_link_target(&entry).map(|target| format!("{family}/{target}"));
            continue;
        }
        catalog.insert(&format!("{family}/{leaf}"), &entry, search_path);
    }
    Ok(default)
}

/// Version name a `default` symlink points at.
fn default_link_target(link: &Path) -> Option<String> {
    if !link.is_symlink() || !link.is_file() {
        return None;
    }
    let target = std::fs::read_link(link).ok()?;
    module_name_for_file(&target)
}

fn sorted_entries(dir: &Path) -> crate::Result<Vec<PathBuf>> {
    let read = std::fs::read_dir(dir).map_err(|e| crate::Error::ReadFailed {
        path: dir.to_path_buf(),
        error: e,
    })?;
    let mut entries = Vec::new();
    for entry in read {
        entries.push(entry?.path());
    }
    entries.sort();
    Ok(entries)
}

impl Catalog {
    fn insert(&mut self, fullname: &str, path: &Path, search_path: &Path) {
        if let Some(existing) = self.modules.get(fullname) {
            tracing::debug!(
                "Module {fullname} in {search_path:?} is shadowed by {:?}",
                existing.search_path
            );
            return;
        }
        match Module::from_file(fullname, path, Some(search_path)) {
            Some(module) => {
                self.modules.insert(fullname.to_string(), module);
            }
            None => tracing::trace!("Skipping non-module file {path:?}"),
        }
    }

    /// One default per versioned name: the first explicit `default` link,
    /// otherwise the lexicographically greatest version.
    fn mark_defaults(&mut self, explicit: &HashMap<String, String>) {
        let mut best: HashMap<String, String> = HashMap::new();
        for module in self.modules.values() {
            let Some(version) = &module.version else {
                continue;
            };
            let current = best.entry(module.name.clone()).or_insert_with(|| module.fullname.clone());
            if self.modules[current.as_str()].version.as_deref() < Some(version.as_str()) {
                *current = module.fullname.clone();
            }
        }
        for (name, fullname) in explicit {
            if self.modules.contains_key(fullname) {
                best.insert(name.clone(), fullname.clone());
            }
        }
        let defaults: HashSet<String> = best.into_values().collect();
        for module in self.modules.values_mut() {
            module.is_default = defaults.contains(&module.fullname);
        }
    }

    /// Directories that were scanned, in precedence order.
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// All modules in discovery order.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    /// Modules found in one search-path directory.
    pub fn modules_in<'a>(&'a self, search_path: &'a Path) -> impl Iterator<Item = &'a Module> + 'a {
        self.modules
            .values()
            .filter(move |m| m.search_path.as_deref() == Some(search_path))
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Catalog entry whose definition lives at the given canonical path.
    pub fn by_realpath(&self, realpath: &Path) -> Option<&Module> {
        self.modules.values().find(|m| m.realpath == realpath)
    }

    /// Resolve a request to a module.
    ///
    /// Resolution order: an explicit filesystem path, an exact full name,
    /// an unambiguous bare name, then the default among same-named modules.
    pub fn get(&self, request: &str) -> crate::Result<Option<Module>> {
        if looks_like_path(request) {
            let path = Path::new(request);
            if path.is_file() {
                return Module::from_path(path).map(Some);
            }
        }
        if let Some(module) = self.modules.get(request) {
            return Ok(Some(module.clone()));
        }
        let named: Vec<&Module> = self.modules.values().filter(|m| m.name == request).collect();
        if let [only] = named.as_slice() {
            return Ok(Some((*only).clone()));
        }
        Ok(named.into_iter().find(|m| m.is_default).cloned())
    }

    /// Like [`Catalog::get`], but an unmatched request is an error.
    pub fn resolve(&self, request: &str) -> crate::Result<Module> {
        self.get(request)?.ok_or_else(|| crate::Error::UnknownModule {
            name: request.to_string(),
            similar: self.similar(request),
        })
    }

    fn similar(&self, request: &str) -> Vec<String> {
        let needle = request.to_lowercase();
        self.modules
            .values()
            .filter(|m| !m.hidden && m.fullname.to_lowercase().contains(&needle))
            .map(|m| m.fullname.clone())
            .take(5)
            .collect()
    }
}

/// Requests naming a file rather than a catalog entry.
fn looks_like_path(request: &str) -> bool {
    let path = Path::new(request);
    path.is_absolute()
        || request.starts_with("./")
        || request.starts_with("../")
        || request.ends_with(&format!(".{}", crate::module::NATIVE_EXTENSION))
}
