// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;
use crate::environment::Platform;
use crate::{LOADED_FILES_VAR, LOADED_MODULES_VAR};

#[fixture]
fn loaded() -> LoadedSet {
    let state = ShellState::from_vars(
        [
            (LOADED_MODULES_VAR, "gcc/9.1:tools/git"),
            (LOADED_FILES_VAR, "/m/gcc/9.1.py:/m/tools/git.py"),
        ],
        Platform::Linux,
    );
    LoadedSet::read(&state).unwrap()
}

fn module(dir: &Path, fullname: &str) -> Module {
    let path = dir.join(format!("{}.py", fullname.replace('/', "_")));
    std::fs::write(&path, "pass\n").unwrap();
    Module::from_file(fullname, &path, Some(dir)).unwrap()
}

#[rstest]
#[case::by_family("gcc", None, false, PrereqAction::Satisfied)]
#[case::by_fullname("gcc/9.1", None, false, PrereqAction::Satisfied)]
#[case::by_directory_family("tools", None, false, PrereqAction::Satisfied)]
#[case::unmet("mpi", None, false, PrereqAction::Unmet)]
#[case::fallback("mpi", Some("openmpi"), false, PrereqAction::Load("openmpi".into()))]
#[case::force_beats_fallback("mpi", Some("openmpi"), true, PrereqAction::Load("mpi".into()))]
fn test_prereq_action(
    loaded: LoadedSet,
    #[case] name: &str,
    #[case] fallback: Option<&str>,
    #[case] force: bool,
    #[case] expected: PrereqAction,
) {
    assert_eq!(prereq_action(&loaded, name, fallback, force), expected);
}

#[rstest]
fn test_conflict_action(loaded: LoadedSet) {
    let tmp = TempDir::new().unwrap();
    let clang = module(tmp.path(), "clang/15");

    assert_eq!(
        conflict_action(&loaded, "gcc", &clang, false),
        ConflictAction::Conflicts("gcc/9.1".into())
    );
    assert_eq!(
        conflict_action(&loaded, "gcc", &clang, true),
        ConflictAction::Unload("gcc/9.1".into())
    );
    assert_eq!(
        conflict_action(&loaded, "intel", &clang, false),
        ConflictAction::Clear
    );
}

#[rstest]
fn test_conflict_ignores_the_module_itself(loaded: LoadedSet) {
    let tmp = TempDir::new().unwrap();
    let gcc = module(tmp.path(), "gcc/9.1");
    assert_eq!(
        conflict_action(&loaded, "gcc", &gcc, false),
        ConflictAction::Clear
    );
}

#[rstest]
fn test_version_rival(loaded: LoadedSet) {
    let tmp = TempDir::new().unwrap();
    let newer = module(tmp.path(), "gcc/10.2");
    let same = module(tmp.path(), "gcc/9.1");
    let other = module(tmp.path(), "python/3.11");
    let git = module(tmp.path(), "tools/git");

    assert_eq!(
        version_rival(&loaded, &newer).map(|m| m.fullname.as_str()),
        Some("gcc/9.1")
    );
    assert!(version_rival(&loaded, &same).is_none());
    assert!(version_rival(&loaded, &other).is_none());
    assert!(version_rival(&loaded, &git).is_none(), "unversioned names are not rivals");
}

#[rstest]
fn test_family_variables() {
    let vars = FamilyVars::new("compiler-suite");
    assert_eq!(vars.family, "MODULE_FAMILY_COMPILER_SUITE");
    assert_eq!(vars.version, "MODULE_FAMILY_COMPILER_SUITE_VERSION");
    assert_eq!(vars.name, "MODULE_FAMILY_COMPILER_SUITE_NAME");
}

#[rstest]
fn test_family_claim_and_release() {
    let tmp = TempDir::new().unwrap();
    let gcc = module(tmp.path(), "gcc/9.1");
    let clang = module(tmp.path(), "clang/15");
    let vars = FamilyVars::new("compiler");
    let mut state = ShellState::new(Platform::Linux);

    vars.claim(&mut state, &gcc);
    assert_eq!(state.get("MODULE_FAMILY_COMPILER"), Some("gcc"));
    assert_eq!(state.get("MODULE_FAMILY_COMPILER_VERSION"), Some("9.1"));
    assert_eq!(vars.occupant(&state), Some("gcc/9.1"));

    vars.release(&mut state, &clang);
    assert_eq!(vars.occupant(&state), Some("gcc/9.1"), "only the owner releases");

    vars.release(&mut state, &gcc);
    assert_eq!(vars.occupant(&state), None);
    assert!(state.diff().is_empty());
}
