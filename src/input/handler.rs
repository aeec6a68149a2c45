use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::command::CommandRunner;
use crate::config::{ConfigModel, KeyCommand};
use crate::device::{Deck, KeyEvent};
use crate::display::KeyRenderer;
use crate::error::{DeckError, Result};

/// Lifecycle of the driven deck
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Nothing opened yet
    Idle,
    /// Open, painted, receiving key events
    Active,
    /// Reset and closed; terminal
    Closed,
}

/// Drives one deck: paints its keys and routes presses to commands.
///
/// The key callback registered with the transport only forwards events into a
/// channel. All handling, including the final reset and close, happens on the
/// task that calls [`EventDispatcher::run`], so closing never overlaps an
/// event being handled.
pub struct EventDispatcher<D: Deck, R: CommandRunner> {
    config: ConfigModel,
    deck: D,
    renderer: KeyRenderer,
    runner: R,
    state: DispatcherState,
    active_serial: String,
    events: Option<mpsc::UnboundedReceiver<KeyEvent>>,
}

impl<D: Deck, R: CommandRunner> EventDispatcher<D, R> {
    pub fn new(config: ConfigModel, deck: D, renderer: KeyRenderer, runner: R) -> Self {
        Self {
            config,
            deck,
            renderer,
            runner,
            state: DispatcherState::Idle,
            active_serial: String::new(),
            events: None,
        }
    }

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    /// Activate the deck and handle key events until an exit key is pressed
    pub async fn run(&mut self) -> Result<()> {
        self.activate().await?;
        info!("Running - press a key bound to \"(exit)\" to stop");

        while self.state == DispatcherState::Active {
            let event = match self.events.as_mut() {
                Some(events) => events.recv().await,
                None => None,
            };

            match event {
                Some(event) => self.handle_event(event).await?,
                None => {
                    self.close().await?;
                    return Err(DeckError::Device(
                        "The device stopped reporting key events".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Open, reset and configure the deck, register the key callback and
    /// paint every key
    pub async fn activate(&mut self) -> Result<()> {
        match self.state {
            DispatcherState::Idle => {}
            DispatcherState::Active => return Ok(()),
            DispatcherState::Closed => {
                return Err(DeckError::Device(
                    "The device has already been released".to_string(),
                ))
            }
        }

        self.deck.open().await?;
        self.state = DispatcherState::Active;

        self.deck.reset().await?;
        self.deck.set_brightness(self.config.brightness()).await?;
        self.active_serial = self.deck.serial_number().await?;
        info!(
            "Opened '{}' device (serial number: '{}')",
            self.deck.deck_type(),
            self.active_serial
        );

        let (tx, rx) = mpsc::unbounded_channel();
        self.deck.set_key_callback(Arc::new(move |event: KeyEvent| {
            // The receiver is gone once the dispatcher has closed
            let _ = tx.send(event);
        }))?;
        self.events = Some(rx);

        self.paint_all_keys().await
    }

    /// Render and upload the image of every physical key, bound or not
    async fn paint_all_keys(&self) -> Result<()> {
        let format = self.deck.key_format();

        for key in 0..self.deck.key_count() {
            let label = self.config.label_for_key(key);
            let icon = self.config.icon_for_key(key);
            let bitmap = self.renderer.render_key(label, icon, format).await?;

            if let Err(e) = self.deck.set_key_image(key, &bitmap).await {
                warn!("Failed to set image for key {}: {}", key, e);
            }
        }

        if let Err(e) = self.deck.flush().await {
            warn!("Failed to flush key images: {}", e);
        }

        debug!("Painted {} keys", self.deck.key_count());
        Ok(())
    }

    /// Handle one key event
    pub async fn handle_event(&mut self, event: KeyEvent) -> Result<()> {
        if self.state != DispatcherState::Active {
            debug!("Ignoring key {} while {:?}", event.key, self.state);
            return Ok(());
        }

        if event.serial != self.active_serial {
            info!(
                "A key on a different device ('{}') has been pressed",
                event.serial
            );
            return Ok(());
        }

        if !event.pressed {
            debug!("Key {} released", event.key);
            return Ok(());
        }

        info!("Key '{}' on deck '{}' pressed", event.key, event.serial);

        match self.config.command_for_key(event.key).cloned() {
            Some(KeyCommand::Exit) => {
                info!("Exit requested, releasing the device");
                self.close().await?;
            }
            Some(KeyCommand::Run(command)) => {
                if let Err(e) = self.runner.launch(&command) {
                    warn!("Failed to run command '{}': {}", command, e);
                }
            }
            None => {
                info!("No command is defined for key '{}'", event.key);
            }
        }

        Ok(())
    }

    /// Reset and close the deck. Only the first call after activation
    /// touches the device.
    async fn close(&mut self) -> Result<()> {
        if self.state != DispatcherState::Active {
            return Ok(());
        }

        self.state = DispatcherState::Closed;
        self.events = None;

        let reset = self.deck.reset().await;
        let closed = self.deck.close().await;
        info!("Device released");
        reset.and(closed)
    }

    /// Release the device after external termination
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.close().await {
            warn!("Failed to release the device: {}", e);
        }
    }
}
