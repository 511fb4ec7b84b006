// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `envmod load` command.

use clap::Args;
use miette::Result;

use crate::GlobalFlags;

/// Load modules
#[derive(Debug, Args)]
pub struct CmdLoad {
    /// Module names, or paths to module definitions
    #[clap(required = true)]
    names: Vec<String>,
}

impl CmdLoad {
    pub fn run(&mut self, global: &GlobalFlags) -> Result<i32> {
        let mut session = global.session()?;
        for name in &self.names {
            session.manager.load(name)?;
        }
        session.emit()
    }
}
