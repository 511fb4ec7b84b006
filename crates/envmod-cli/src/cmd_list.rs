// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `envmod list` command.

use clap::Args;
use colored::Colorize;
use miette::Result;

use crate::GlobalFlags;

/// List loaded modules
#[derive(Debug, Args)]
pub struct CmdList {
    /// One module per line, without decoration
    #[clap(short, long)]
    terse: bool,
}

impl CmdList {
    pub fn run(&mut self, global: &GlobalFlags) -> Result<i32> {
        let session = global.session()?;
        let loaded = session.manager.loaded()?;

        if self.terse {
            for entry in loaded.iter() {
                eprintln!("{}", entry.fullname);
            }
            return Ok(0);
        }

        if loaded.is_empty() {
            eprintln!("{}", "No modules loaded".dimmed());
            return Ok(0);
        }

        eprintln!("{}", "Currently Loaded Modules:".bold());
        for (i, entry) in loaded.iter().enumerate() {
            eprintln!(
                "  {}) {}  {}",
                i + 1,
                entry.fullname.green(),
                entry.path.display().to_string().dimmed()
            );
        }
        Ok(0)
    }
}
