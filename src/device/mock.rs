//! In-memory deck used by tests

use mirajazz::types::{ImageFormat, ImageMirroring, ImageMode, ImageRotation};
use std::fmt;
use std::sync::{Arc, Mutex};

use super::deck::{Deck, KeyCallback, KeyEvent};
use crate::error::{DeckError, Result};

pub const MOCK_FORMAT: ImageFormat = ImageFormat {
    mode: ImageMode::BMP,
    size: (72, 72),
    rotation: ImageRotation::Rot0,
    mirror: ImageMirroring::None,
};

#[derive(Default)]
struct MockState {
    open: bool,
    calls: Vec<String>,
    images: Vec<(u8, Vec<u8>)>,
    callback: Option<KeyCallback>,
}

/// Records every transport call. Clones share state.
#[derive(Clone)]
pub struct MockDeck {
    serial: String,
    key_count: u8,
    fail_open: bool,
    pending: Vec<KeyEvent>,
    state: Arc<Mutex<MockState>>,
}

impl fmt::Debug for MockDeck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockDeck")
            .field("serial", &self.serial)
            .field("key_count", &self.key_count)
            .field("open", &self.is_open())
            .finish()
    }
}

impl MockDeck {
    pub fn new(serial: &str) -> Self {
        Self {
            serial: serial.to_string(),
            key_count: 6,
            fail_open: false,
            pending: Vec::new(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Events delivered through the callback as soon as it is registered
    pub fn with_pending_events(mut self, events: Vec<KeyEvent>) -> Self {
        self.pending = events;
        self
    }

    /// A deck whose `open` always fails
    pub fn unreachable(serial: &str) -> Self {
        Self {
            fail_open: true,
            ..Self::new(serial)
        }
    }

    pub fn press(&self, key: u8) -> KeyEvent {
        KeyEvent {
            serial: self.serial.clone(),
            key,
            pressed: true,
        }
    }

    pub fn release(&self, key: u8) -> KeyEvent {
        KeyEvent {
            serial: self.serial.clone(),
            key,
            pressed: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().unwrap().open
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn images(&self) -> Vec<(u8, Vec<u8>)> {
        self.state.lock().unwrap().images.clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.state.lock().unwrap().calls.push(call.into());
    }

    fn require_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(DeckError::Device(format!("{} is not open", self.serial)))
        }
    }
}

impl Deck for MockDeck {
    fn deck_type(&self) -> &str {
        "Mock Deck"
    }

    fn id(&self) -> String {
        format!("mock:{}", self.serial)
    }

    fn key_count(&self) -> u8 {
        self.key_count
    }

    fn key_format(&self) -> ImageFormat {
        MOCK_FORMAT
    }

    async fn open(&self) -> Result<()> {
        self.record("open");
        if self.fail_open {
            let message = format!("{} cannot be opened", self.serial);
            return Err(DeckError::Device(message));
        }
        self.state.lock().unwrap().open = true;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.record("close");
        let mut state = self.state.lock().unwrap();
        state.open = false;
        state.callback = None;
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        self.require_open()?;
        self.record("reset");
        Ok(())
    }

    async fn serial_number(&self) -> Result<String> {
        self.require_open()?;
        Ok(self.serial.clone())
    }

    async fn set_key_image(&self, key: u8, bitmap: &[u8]) -> Result<()> {
        self.require_open()?;
        self.record(format!("image:{}", key));
        self.state
            .lock()
            .unwrap()
            .images
            .push((key, bitmap.to_vec()));
        Ok(())
    }

    async fn set_brightness(&self, percent: u8) -> Result<()> {
        self.require_open()?;
        self.record(format!("brightness:{}", percent));
        Ok(())
    }

    fn set_key_callback(&self, callback: KeyCallback) -> Result<()> {
        self.require_open()?;
        self.record("callback");
        for event in &self.pending {
            callback(event.clone());
        }
        self.state.lock().unwrap().callback = Some(callback);
        Ok(())
    }
}
