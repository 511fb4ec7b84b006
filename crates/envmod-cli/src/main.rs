// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! envmod - Environment Module Manager CLI
//!
//! Shell code is written to stdout for the calling shell to evaluate;
//! everything meant for a person goes to stderr.

use clap::{Parser, Subcommand};
use envmod::{Config, ModuleManager, Shell, ShellState};
use miette::Result;

mod cmd_avail;
mod cmd_help;
mod cmd_init;
mod cmd_list;
mod cmd_load;
mod cmd_purge;
mod cmd_swap;
mod cmd_unload;
mod cmd_whatis;

use cmd_avail::CmdAvail;
use cmd_help::CmdHelp;
use cmd_init::CmdInit;
use cmd_list::CmdList;
use cmd_load::CmdLoad;
use cmd_purge::CmdPurge;
use cmd_swap::CmdSwap;
use cmd_unload::CmdUnload;
use cmd_whatis::CmdWhatis;

#[derive(Parser)]
#[clap(
    name = "envmod",
    about = "Environment Module Manager",
    version,
    long_about = "Load and unload environment modules by emitting shell code for the calling shell"
)]
struct Opt {
    #[clap(flatten)]
    logging: Logging,

    #[clap(flatten)]
    global: GlobalFlags,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Parser)]
struct Logging {
    /// Increase verbosity (-v, -vv, -vvv)
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[clap(short, long, global = true)]
    quiet: bool,
}

#[derive(Parser, Clone, Debug, Default)]
pub struct GlobalFlags {
    /// Shell syntax to emit: bash, zsh, sh, ksh or fish
    #[clap(long, global = true)]
    pub shell: Option<String>,

    /// Unload conflicts and load prerequisites instead of failing
    #[clap(short, long, global = true, env = "ENVMOD_FORCE")]
    pub force: bool,
}

/// Everything a command needs for one invocation.
pub struct Session {
    pub manager: ModuleManager,
    pub shell: Shell,
}

impl GlobalFlags {
    /// Snapshot the process environment and build the manager.
    pub fn session(&self) -> Result<Session> {
        let state = ShellState::from_process_env();
        let config = Config::discover(&state)?;
        let shell = match &self.shell {
            Some(name) => name.parse::<Shell>()?,
            None => config.target_shell(&state)?,
        };
        let manager = ModuleManager::from_config(state, &config, shell, self.force)?;
        Ok(Session { manager, shell })
    }
}

impl Session {
    /// Write the accumulated changes as shell code.
    pub fn emit(mut self) -> Result<i32> {
        print!("{}", self.manager.render(self.shell));
        Ok(0)
    }
}

#[derive(Subcommand)]
enum Command {
    /// List available modules
    Avail(CmdAvail),

    /// List loaded modules
    List(CmdList),

    /// Load modules
    Load(CmdLoad),

    /// Unload modules
    Unload(CmdUnload),

    /// Unload one module and load another
    Swap(CmdSwap),

    /// Unload all loaded modules
    Purge(CmdPurge),

    /// Describe what modules do
    Help(CmdHelp),

    /// Show one-line module descriptions
    Whatis(CmdWhatis),

    /// Print the shell function that wraps envmod
    Init(CmdInit),
}

impl Opt {
    fn run(self) -> Result<i32> {
        // Setup logging
        let log_level = match (self.logging.quiet, self.logging.verbose) {
            (true, _) => tracing::Level::ERROR,
            (false, 0) => tracing::Level::WARN,
            (false, 1) => tracing::Level::INFO,
            (false, 2) => tracing::Level::DEBUG,
            (false, _) => tracing::Level::TRACE,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .init();

        // Dispatch to command
        match self.cmd {
            Command::Avail(mut cmd) => cmd.run(&self.global),
            Command::List(mut cmd) => cmd.run(&self.global),
            Command::Load(mut cmd) => cmd.run(&self.global),
            Command::Unload(mut cmd) => cmd.run(&self.global),
            Command::Swap(mut cmd) => cmd.run(&self.global),
            Command::Purge(mut cmd) => cmd.run(&self.global),
            Command::Help(mut cmd) => cmd.run(&self.global),
            Command::Whatis(mut cmd) => cmd.run(&self.global),
            Command::Init(mut cmd) => cmd.run(&self.global),
        }
    }
}

fn main() -> Result<()> {
    let opt = Opt::parse();
    let code = opt.run()?;
    std::process::exit(code);
}
