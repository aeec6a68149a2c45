//! Bind a key deck to a JSON file of labels, icons and shell commands.
//!
//! - [`config`]: loading, validation and per-key lookups
//! - [`display`]: compositing key images in the device's native format
//! - [`device`]: transport seam, the mirajazz backend and device selection
//! - [`input`]: the event dispatcher and command launching

pub mod config;
pub mod device;
pub mod display;
pub mod error;
pub mod input;

pub use config::{ConfigItem, ConfigModel, KeyCommand};
pub use error::DeckError;
pub use input::{DispatcherState, EventDispatcher};

use std::future::Future;
use std::path::Path;
use tracing::info;

use device::{select, Deck};
use display::KeyRenderer;
use error::Result;
use input::CommandRunner;

/// Run the launcher until an exit key is pressed or `shutdown` completes.
///
/// The configuration is loaded, validated and its font parsed before
/// `candidates` is awaited, so a bad configuration never reaches a device.
/// The selected deck is always reset and closed before returning.
pub async fn run<D, R>(
    config_path: &Path,
    candidates: impl Future<Output = Result<Vec<D>>>,
    runner: R,
    shutdown: impl Future<Output = ()>,
) -> Result<()>
where
    D: Deck,
    R: CommandRunner,
{
    let config = ConfigModel::load(config_path)?;
    config.validate()?;
    let renderer = KeyRenderer::from_config(&config)?;

    let decks = candidates.await?;
    info!("Found {} deck(s)", decks.len());

    let deck = select(decks, config.serial_number()).await?;
    let mut dispatcher = EventDispatcher::new(config, deck, renderer, runner);

    let result = tokio::select! {
        result = dispatcher.run() => result,
        _ = shutdown => {
            info!("Shutting down...");
            Ok(())
        }
    };

    // Always release the device
    dispatcher.shutdown().await;
    result
}
