// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `envmod help` command.

use clap::Args;
use colored::Colorize;
use miette::Result;

use crate::GlobalFlags;

/// Describe what modules do
#[derive(Debug, Args)]
pub struct CmdHelp {
    /// Module names, or paths to module definitions
    #[clap(required = true)]
    names: Vec<String>,
}

impl CmdHelp {
    pub fn run(&mut self, global: &GlobalFlags) -> Result<i32> {
        let session = global.session()?;
        for (i, name) in self.names.iter().enumerate() {
            let report = session.manager.help(name)?;
            if i > 0 {
                eprintln!();
            }
            eprintln!("{}", format!("---- {} ----", report.module.fullname).bold());
            eprint!("{}", report.help_text());
        }
        Ok(0)
    }
}
