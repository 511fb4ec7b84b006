// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `envmod init` command.

use clap::Args;
use envmod::Shell;
use miette::Result;

use crate::GlobalFlags;

/// Print the shell function that wraps envmod
///
/// Add `eval "$(envmod init bash)"` to a shell startup file so that
/// `module load ...` changes the current shell.
#[derive(Debug, Args)]
pub struct CmdInit {
    /// Shell to initialize; taken from --shell or $SHELL when omitted
    shell: Option<String>,
}

impl CmdInit {
    pub fn run(&mut self, global: &GlobalFlags) -> Result<i32> {
        let shell = match self.shell.as_ref().or(global.shell.as_ref()) {
            Some(name) => name.parse::<Shell>()?,
            None => std::env::var_os("SHELL")
                .and_then(Shell::from_path)
                .unwrap_or(Shell::Bash),
        };
        let exe = std::env::current_exe()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "envmod".to_string());

        print!("{}", wrapper(shell, &exe));
        Ok(0)
    }
}

fn wrapper(shell: Shell, exe: &str) -> String {
    let quoted = envmod::environment::posix_quote(exe);
    match shell {
        Shell::Fish => format!(
            "function module\n    command {quoted} --shell fish $argv | source\nend\n"
        ),
        _ => format!(
            "module() {{\n    eval \"$(command {quoted} --shell {} \"$@\")\"\n}}\n",
            shell.name()
        ),
    }
}
