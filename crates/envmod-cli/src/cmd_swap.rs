// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `envmod swap` command.

use clap::Args;
use miette::Result;

use crate::GlobalFlags;

/// Unload one module and load another
#[derive(Debug, Args)]
pub struct CmdSwap {
    /// Loaded module to unload
    from: String,

    /// Module to load in its place
    to: String,
}

impl CmdSwap {
    pub fn run(&mut self, global: &GlobalFlags) -> Result<i32> {
        let mut session = global.session()?;
        session.manager.swap(&self.from, &self.to)?;
        session.emit()
    }
}
