//! Choosing the one deck a run drives.

use tracing::{debug, info, warn};

use super::deck::Deck;
use crate::error::{DeckError, Result};

/// Pick the deck to drive.
///
/// With `wanted_serial`, each candidate is opened just long enough to read
/// its serial number; the first exact match is returned. Every candidate,
/// the returned one included, is left closed.
pub async fn select<D: Deck>(candidates: Vec<D>, wanted_serial: Option<&str>) -> Result<D> {
    let Some(wanted) = wanted_serial else {
        return candidates.into_iter().next().ok_or(DeckError::NoDevice);
    };

    let mut connected = Vec::with_capacity(candidates.len());

    for deck in candidates {
        deck.open().await?;
        let serial = deck.serial_number().await;
        deck.close().await?;

        match serial {
            Ok(serial) if serial == wanted => {
                info!(
                    "Selected {} with serial number '{}'",
                    deck.deck_type(),
                    serial
                );
                return Ok(deck);
            }
            Ok(serial) => {
                debug!("Skipping deck '{}'", serial);
                connected.push(serial);
            }
            Err(e) => {
                warn!("Could not read serial number of {}: {}", deck.id(), e);
                connected.push(format!("<unknown {}>", deck.id()));
            }
        }
    }

    Err(DeckError::DeviceNotFound {
        wanted: wanted.to_string(),
        connected,
    })
}

/// One line per deck for `--list`, handed to `emit` as soon as it is known.
///
/// Each deck is opened, reset and closed. The first failure stops the
/// listing; lines for the decks before it have already been emitted.
pub async fn describe_decks<D: Deck>(decks: &[D], mut emit: impl FnMut(String)) -> Result<()> {
    for (index, deck) in decks.iter().enumerate() {
        deck.open().await?;
        let described = async {
            deck.reset().await?;
            let serial = deck.serial_number().await?;
            Ok::<_, DeckError>(format!(
                "#{}.: Device type: {}, device id: {}, serial number: {}",
                index,
                deck.deck_type(),
                deck.id(),
                serial
            ))
        }
        .await;
        deck.close().await?;
        emit(described?);
    }

    Ok(())
}
