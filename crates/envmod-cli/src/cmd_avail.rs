// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `envmod avail` command.

use clap::Args;
use colored::Colorize;
use miette::Result;

use crate::GlobalFlags;

/// List available modules
#[derive(Debug, Args)]
pub struct CmdAvail {
    /// Only list modules whose name contains this text
    pattern: Option<String>,

    /// One module per line, without decoration
    #[clap(short, long)]
    terse: bool,
}

impl CmdAvail {
    pub fn run(&mut self, global: &GlobalFlags) -> Result<i32> {
        let session = global.session()?;
        let loaded = session.manager.loaded()?;

        for (search_path, modules) in session.manager.avail() {
            let modules: Vec<_> = modules
                .into_iter()
                .filter(|m| !m.hidden)
                .filter(|m| {
                    self.pattern
                        .as_deref()
                        .is_none_or(|p| m.fullname.contains(p))
                })
                .collect();

            if self.terse {
                eprintln!("{}:", search_path.display());
                for module in modules {
                    eprintln!("{}", module.fullname);
                }
                continue;
            }

            eprintln!(
                "{}",
                format!("---- {} ----", search_path.display()).bold().blue()
            );
            if modules.is_empty() {
                eprintln!("  {}", "(none)".dimmed());
            }
            for module in modules {
                let mut marks = Vec::new();
                if module.is_default {
                    marks.push("D".yellow().to_string());
                }
                if loaded.contains(module) {
                    marks.push("L".green().to_string());
                }
                let marks = if marks.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", marks.join(","))
                };
                eprintln!("  {}{}", module.fullname.cyan(), marks);
            }
            eprintln!();
        }

        if !self.terse {
            eprintln!("  {}: default, {}: loaded", "D".yellow(), "L".green());
        }
        Ok(0)
    }
}
