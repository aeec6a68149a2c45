use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use deck_launcher::{
    config::DEFAULT_CONFIG_FILE,
    device::{describe_decks, MirajazzDeck},
    input::ShellRunner,
    DeckError,
};

#[derive(Parser, Debug)]
#[command(name = "deck-launcher")]
#[command(about = "Launch shell commands from the keys of an AJAZZ / Mirabox deck")]
#[command(version)]
struct Cli {
    /// List connected decks with their serial numbers and exit
    #[arg(long)]
    list: bool,

    /// Key configuration file
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE, conflicts_with = "list")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Launched commands are never awaited; let the kernel reap them
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGCHLD, libc::SIG_IGN);
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let result = if cli.list {
        list_devices().await
    } else {
        deck_launcher::run(
            &cli.config,
            MirajazzDeck::enumerate(),
            ShellRunner,
            termination(),
        )
        .await
        .map_err(Into::into)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("The program encountered an error: {:#}", e);
            let code = e
                .downcast_ref::<DeckError>()
                .map(DeckError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

async fn list_devices() -> Result<()> {
    let decks = MirajazzDeck::enumerate().await?;
    if decks.is_empty() {
        println!("No deck device was detected.");
        return Ok(());
    }

    describe_decks(&decks, |line| println!("{}", line)).await?;
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn termination() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => tokio::select! {
                _ = ctrl_c() => {}
                _ = sigterm.recv() => info!("Received SIGTERM"),
            },
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C"),
        Err(e) => {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
