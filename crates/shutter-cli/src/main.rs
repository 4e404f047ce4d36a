mod commands;
mod config;

use clap::Parser;
use shutter_logging::ShutterSubscriberBuilder;
use shutter_storage::ArtifactStore;
use tokio::io::AsyncWriteExt;

use crate::config::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries command output and fetched plaintext
    let _log_guard = ShutterSubscriberBuilder::new()
        .with_level(&cli.log_level)
        .with_pretty(cli.pretty)
        .init();

    let config = cli.store_config()?;
    let mut stdout = tokio::io::stdout();

    match cli.command {
        Command::Keygen => {
            commands::keygen(&config, &mut stdout).await?;
        }
        Command::Ingest { file, id } => {
            let store = ArtifactStore::open(config).await?;
            commands::ingest(&store, &file, id, &mut stdout).await?;
        }
        Command::Fetch { id, out: Some(path) } => {
            let store = ArtifactStore::open(config).await?;
            let mut file = tokio::fs::File::create(&path).await?;
            let written = commands::fetch(&store, id, &mut file).await?;
            file.sync_all().await?;
            eprintln!("wrote {} bytes to {}", written, path.display());
        }
        Command::Fetch { id, out: None } => {
            let store = ArtifactStore::open(config).await?;
            commands::fetch(&store, id, &mut stdout).await?;
        }
        Command::Stat { id } => {
            let store = ArtifactStore::open(config).await?;
            commands::stat(&store, id, &mut stdout).await?;
        }
        Command::List => {
            let store = ArtifactStore::open(config).await?;
            commands::list(&store, &mut stdout).await?;
        }
        Command::Delete { id } => {
            let store = ArtifactStore::open(config).await?;
            commands::delete(&store, id, &mut stdout).await?;
        }
    }

    stdout.flush().await?;
    Ok(())
}
