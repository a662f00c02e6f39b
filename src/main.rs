mod cli;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;
use imapbox::{MailboxSession, config::Config, logging};
use log::warn;

use crate::cli::Command;

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// Config file, defaults to $XDG_CONFIG_HOME/imapbox/config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load_from_file(args.config.as_deref())?;
    logging::init(Some(config.host().as_str()));
    let options = config.session_options()?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()
        .context("cannot build tokio runtime")?;

    rt.block_on(async {
        let mut session = MailboxSession::connect(&options).await?;
        let result = cli::run(args.command, &mut session).await;
        if let Err(e) = session.logout().await {
            warn!("logout failed: {e}");
        }
        result
    })
}
