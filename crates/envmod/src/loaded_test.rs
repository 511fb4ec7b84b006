// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use rstest::rstest;
use tempfile::TempDir;

use super::*;
use crate::environment::Platform;

fn module_at(dir: &Path, fullname: &str) -> Module {
    let path = dir.join(format!("{}.py", fullname.replace('/', "_")));
    std::fs::write(&path, "pass\n").unwrap();
    Module::from_file(fullname, &path, Some(dir)).unwrap()
}

#[rstest]
fn test_unequal_lists_are_inconsistent() {
    let state = ShellState::from_vars(
        [(LOADED_MODULES_VAR, "a:b"), (LOADED_FILES_VAR, "/m/a.py")],
        Platform::Linux,
    );
    match LoadedSet::read(&state) {
        Err(crate::Error::InconsistentLoadedState { names, paths, .. }) => {
            assert_eq!(names, 2);
            assert_eq!(paths, 1);
        }
        other => panic!("Expected InconsistentLoadedState, got: {:?}", other),
    }
}

#[rstest]
fn test_read_pairs_entries() {
    let state = ShellState::from_vars(
        [
            (LOADED_MODULES_VAR, "gcc/9.1:git"),
            (LOADED_FILES_VAR, "/m/gcc/9.1.py:/m/git.py"),
        ],
        Platform::Linux,
    );
    let loaded = LoadedSet::read(&state).unwrap();
    assert_eq!(loaded.fullnames(), vec!["gcc/9.1", "git"]);
    assert_eq!(loaded.find("gcc").unwrap().fullname, "gcc/9.1");
    assert_eq!(
        loaded.find("git").unwrap().path,
        PathBuf::from("/m/git.py")
    );
    assert!(loaded.find("python").is_none());
}

#[rstest]
fn test_record_and_forget_round_trip() {
    let tmp = TempDir::new().unwrap();
    let module = module_at(tmp.path(), "tool");
    let mut state = ShellState::new(Platform::Linux);

    LoadedSet::record(&mut state, &module).unwrap();
    let loaded = LoadedSet::read(&state).unwrap();
    assert_eq!(loaded.fullnames(), vec!["tool"]);
    assert!(loaded.contains(&module));

    LoadedSet::forget(&mut state, "tool").unwrap();
    assert!(LoadedSet::read(&state).unwrap().is_empty());
    assert_eq!(state.get(LOADED_MODULES_VAR), None);
    assert!(state.diff().is_empty());
}

#[rstest]
fn test_hidden_modules_are_not_recorded() {
    let tmp = TempDir::new().unwrap();
    let module = module_at(tmp.path(), ".hidden");
    let mut state = ShellState::new(Platform::Linux);

    LoadedSet::record(&mut state, &module).unwrap();
    assert!(LoadedSet::read(&state).unwrap().is_empty());
}
