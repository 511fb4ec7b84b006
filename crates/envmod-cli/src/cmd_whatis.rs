// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `envmod whatis` command.

use clap::Args;
use miette::Result;

use crate::GlobalFlags;

/// Show one-line module descriptions
#[derive(Debug, Args)]
pub struct CmdWhatis {
    /// Module names; all visible modules when omitted
    names: Vec<String>,
}

impl CmdWhatis {
    pub fn run(&mut self, global: &GlobalFlags) -> Result<i32> {
        let session = global.session()?;
        let names: Vec<String> = if self.names.is_empty() {
            session
                .manager
                .catalog()
                .modules()
                .filter(|m| !m.hidden)
                .map(|m| m.fullname.clone())
                .collect()
        } else {
            self.names.clone()
        };

        for name in names {
            let report = session.manager.whatis(&name)?;
            eprintln!("{}", report.whatis_line());
        }
        Ok(0)
    }
}
