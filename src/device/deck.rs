//! Transport seam between the launcher and a physical key deck.

use mirajazz::types::ImageFormat;
use std::sync::Arc;

use crate::error::Result;

/// A key state change reported by a deck
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// Serial number of the reporting deck
    pub serial: String,
    pub key: u8,
    pub pressed: bool,
}

/// Invoked by the transport on its own listener task for every key change.
pub type KeyCallback = Arc<dyn Fn(KeyEvent) + Send + Sync>;

/// Operations the launcher needs from a deck.
///
/// Handles are shared (`&self`); implementations keep their connection state
/// behind interior mutability. `serial_number` is only available while open.
#[allow(async_fn_in_trait)]
pub trait Deck {
    /// Human readable model name
    fn deck_type(&self) -> &str;

    /// Transport identifier (USB vendor/product pair)
    fn id(&self) -> String;

    fn key_count(&self) -> u8;

    /// Geometry and encoding of key images, as mirajazz converts them
    fn key_format(&self) -> ImageFormat;

    async fn open(&self) -> Result<()>;

    /// Release the handle. Closing a closed deck is a no-op.
    async fn close(&self) -> Result<()>;

    /// Clear all key images
    async fn reset(&self) -> Result<()>;

    async fn serial_number(&self) -> Result<String>;

    /// Upload an already-encoded key image
    async fn set_key_image(&self, key: u8, bitmap: &[u8]) -> Result<()>;

    /// Commit uploaded images, for transports that buffer them
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn set_brightness(&self, percent: u8) -> Result<()>;

    /// Register the key callback; replaces any previous one.
    fn set_key_callback(&self, callback: KeyCallback) -> Result<()>;
}
