// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `envmod unload` command.

use clap::Args;
use miette::Result;

use crate::GlobalFlags;

/// Unload modules
#[derive(Debug, Args)]
pub struct CmdUnload {
    /// Loaded module names
    #[clap(required = true)]
    names: Vec<String>,
}

impl CmdUnload {
    pub fn run(&mut self, global: &GlobalFlags) -> Result<i32> {
        let mut session = global.session()?;
        for name in &self.names {
            session.manager.unload(name)?;
        }
        session.emit()
    }
}
