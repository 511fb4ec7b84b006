// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Module identity and definition-format detection.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[cfg(test)]
#[path = "./module_test.rs"]
mod module_test;

/// File extension recognized as a native definition.
pub const NATIVE_EXTENSION: &str = "py";

/// First-line signature of a native definition without the extension.
pub const NATIVE_SIGNATURE: &str = "#%envmod";

/// First-line magic marker of a delegated (legacy) definition.
pub const DELEGATED_MAGIC: &str = "#%Module";

/// How a module definition is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// Parsed and interpreted by the envmod sandbox.
    Native,
    /// Forwarded to an external module-command binary.
    Delegated,
}

impl ModuleKind {
    /// Classify a file, returning None when it is not a module definition.
    pub fn detect(path: &Path) -> Option<Self> {
        if !path.is_file() {
            return None;
        }
        let first_line = read_first_line(path).unwrap_or_default();
        if first_line.starts_with(DELEGATED_MAGIC) {
            return Some(Self::Delegated);
        }
        let has_extension = path
            .extension()
            .is_some_and(|ext| ext == NATIVE_EXTENSION);
        if has_extension || first_line.starts_with(NATIVE_SIGNATURE) {
            return Some(Self::Native);
        }
        None
    }
}

fn read_first_line(path: &Path) -> std::io::Result<String> {
    let file = std::fs::File::open(path)?;
    let mut line = String::new();
    BufReader::new(file).read_line(&mut line)?;
    Ok(line.trim_end().to_string())
}

/// Decomposed module name.
///
/// `gcc/9.1` has name `gcc`, version `9.1` and family `gcc`;
/// `tools/git` has name `tools/git`, no version, and family `tools`;
/// `git` has name `git` and neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleName {
    pub name: String,
    pub fullname: String,
    pub version: Option<String>,
    pub family: Option<String>,
}

impl ModuleName {
    pub fn parse<S: Into<String>>(fullname: S) -> Self {
        let fullname = fullname.into();
        let (family, leaf) = match fullname.rsplit_once('/') {
            Some((parent, leaf)) => (Some(parent.to_string()), leaf),
            None => (None, fullname.as_str()),
        };
        let version = family
            .as_ref()
            .filter(|_| is_version(leaf))
            .map(|_| leaf.to_string());
        let name = match (&version, &family) {
            (Some(_), Some(family)) => family.clone(),
            _ => fullname.clone(),
        };
        Self {
            name,
            fullname,
            version,
            family,
        }
    }

    /// Whether a request string refers to this module by fullname,
    /// bare name, or directory family.
    pub fn matches(&self, request: &str) -> bool {
        self.fullname == request
            || self.name == request
            || self.family.as_deref() == Some(request)
    }

    pub fn is_hidden(&self) -> bool {
        self.fullname.split('/').any(|segment| segment.starts_with('.'))
    }
}

/// A version segment begins with a digit.
pub fn is_version(segment: &str) -> bool {
    segment.chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// A module found on the search path (or addressed directly by path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    pub fullname: String,
    pub version: Option<String>,
    /// Directory component preceding the leaf name.
    pub family: Option<String>,
    pub kind: ModuleKind,
    /// Location as found during the scan.
    pub path: PathBuf,
    /// Canonical location, recorded in the loaded-path list.
    pub realpath: PathBuf,
    /// Search-path directory the module was found in.
    pub search_path: Option<PathBuf>,
    pub hidden: bool,
    pub is_default: bool,
}

impl Module {
    /// Build a module from a definition file and its catalog name.
    ///
    /// Returns None when the file is not a recognizable definition.
    pub fn from_file(fullname: &str, path: &Path, search_path: Option<&Path>) -> Option<Self> {
        let kind = ModuleKind::detect(path)?;
        let parsed = ModuleName::parse(fullname);
        let realpath = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        Some(Self {
            hidden: parsed.is_hidden(),
            name: parsed.name,
            fullname: parsed.fullname,
            version: parsed.version,
            family: parsed.family,
            kind,
            path: path.to_path_buf(),
            realpath,
            search_path: search_path.map(Path::to_path_buf),
            is_default: false,
        })
    }

    /// Build a module addressed directly by a filesystem path.
    pub fn from_path(path: &Path) -> crate::Result<Self> {
        let leaf = module_name_for_file(path)
            .ok_or_else(|| crate::Error::NotAModuleDefinition(path.to_path_buf()))?;
        // a versioned file keeps its family directory in the name
        let parent = path
            .parent()
            .and_then(Path::file_name)
            .and_then(|name| name.to_str());
        let fullname = match parent {
            Some(parent) if is_version(&leaf) => format!("{parent}/{leaf}"),
            _ => leaf,
        };
        Self::from_file(&fullname, path, None)
            .ok_or_else(|| crate::Error::NotAModuleDefinition(path.to_path_buf()))
    }

    pub fn parsed_name(&self) -> ModuleName {
        ModuleName {
            name: self.name.clone(),
            fullname: self.fullname.clone(),
            version: self.version.clone(),
            family: self.family.clone(),
        }
    }

    pub fn matches(&self, request: &str) -> bool {
        self.parsed_name().matches(request)
    }
}

/// Catalog name for a definition file: the file name without the
/// native extension.
pub fn module_name_for_file(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let suffix = format!(".{NATIVE_EXTENSION}");
    let name = file_name.strip_suffix(&suffix).unwrap_or(file_name);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
