// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;

use super::*;

fn values(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[rstest]
fn test_load_mode_keeps_intents() {
    let intent = Intent::SetEnv {
        name: "FOO".into(),
        value: "bar".into(),
    };
    assert_eq!(intent.clone().for_mode(Mode::Load), Some(intent.clone()));
    assert_eq!(intent.clone().for_mode(Mode::Help), Some(intent));
}

#[rstest]
fn test_unload_reverses_additive_operations() {
    let set = Intent::SetEnv {
        name: "FOO".into(),
        value: "bar".into(),
    };
    assert_eq!(
        set.for_mode(Mode::Unload),
        Some(Intent::UnsetEnv { name: "FOO".into() })
    );

    let prepend = Intent::PrependPath {
        name: "PATH".into(),
        values: values(&["/opt/bin"]),
    };
    assert_eq!(
        prepend.for_mode(Mode::Unload),
        Some(Intent::RetractPath {
            name: "PATH".into(),
            values: values(&["/opt/bin"]),
        })
    );

    let alias = Intent::SetAlias {
        name: "ll".into(),
        body: "ls -l".into(),
    };
    assert_eq!(
        alias.for_mode(Mode::Unload),
        Some(Intent::UnsetAlias {
            name: "ll".into(),
            body: Some("ls -l".into()),
        })
    );

    let load = Intent::LoadModule { name: "dep".into() };
    assert_eq!(
        load.for_mode(Mode::Unload),
        Some(Intent::UnloadModule { name: "dep".into() })
    );
}

#[rstest]
#[case(Intent::UnsetEnv { name: "FOO".into() })]
#[case(Intent::RemovePath { name: "PATH".into(), values: vec!["/x".into()] })]
#[case(Intent::RetractPath { name: "PATH".into(), values: vec!["/x".into()] })]
#[case(Intent::UnloadModule { name: "dep".into() })]
#[case(Intent::SwapModules { from: "a".into(), to: "b".into() })]
fn test_unload_drops_subtractive_operations(#[case] intent: Intent) {
    assert_eq!(intent.for_mode(Mode::Unload), None);
}

#[rstest]
#[case(Intent::Family { tag: "compiler".into() })]
#[case(Intent::Conflict { name: "other".into() })]
#[case(Intent::Prereq { name: "base".into(), fallback: None })]
fn test_unload_passes_policies_through(#[case] intent: Intent) {
    assert_eq!(intent.clone().for_mode(Mode::Unload), Some(intent));
}

#[rstest]
#[case(Intent::SetEnv { name: "A".into(), value: "1".into() }, Some("A"))]
#[case(Intent::RetractPath { name: "P".into(), values: vec!["/x".into()] }, Some("P"))]
#[case(Intent::AddModulePath { path: "/m".into() }, None)]
#[case(Intent::LoadModule { name: "dep".into() }, None)]
fn test_variable_names_env_and_path_targets(#[case] intent: Intent, #[case] expected: Option<&str>) {
    assert_eq!(intent.variable(), expected);
}
