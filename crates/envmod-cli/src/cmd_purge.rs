// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `envmod purge` command.

use clap::Args;
use miette::Result;

use crate::GlobalFlags;

/// Unload all loaded modules
#[derive(Debug, Args)]
pub struct CmdPurge {}

impl CmdPurge {
    pub fn run(&mut self, global: &GlobalFlags) -> Result<i32> {
        let mut session = global.session()?;
        session.manager.purge()?;
        session.emit()
    }
}
