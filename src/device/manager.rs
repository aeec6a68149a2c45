use mirajazz::{
    device::{list_devices, Device},
    types::ImageFormat,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::deck::{Deck, KeyCallback, KeyEvent};
use super::protocol::*;
use crate::error::{DeckError, Result};

/// How long one HID read waits before releasing the device lock
const POLL_TIMEOUT: Duration = Duration::from_millis(20);

type SharedDevice = Arc<AsyncMutex<Device>>;

#[derive(Default)]
struct Connection {
    device: Option<SharedDevice>,
    listener: Option<JoinHandle<()>>,
}

/// AJAZZ AKP05E / Mirabox N4 deck driven through mirajazz
pub struct MirajazzDeck {
    serial: String,
    connection: Mutex<Connection>,
}

impl MirajazzDeck {
    /// List every connected AKP05E, ordered by serial number
    pub async fn enumerate() -> Result<Vec<Self>> {
        let devices = list_devices(&[VENDOR_ID])
            .await
            .map_err(|e| DeckError::Device(format!("Failed to enumerate devices: {}", e)))?;

        let mut serials: Vec<String> = devices
            .into_iter()
            .filter(|(vid, pid, _)| *vid == VENDOR_ID && *pid == PRODUCT_ID)
            .map(|(_, _, serial)| serial)
            .collect();
        serials.sort();

        debug!("Enumerated {} compatible device(s)", serials.len());

        Ok(serials
            .into_iter()
            .map(|serial| Self {
                serial,
                connection: Mutex::new(Connection::default()),
            })
            .collect())
    }

    fn connection(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| DeckError::Device("device state lock poisoned".to_string()))
    }

    fn device(&self) -> Result<SharedDevice> {
        self.connection()?
            .device
            .clone()
            .ok_or_else(|| DeckError::Device(format!("Device {} is not open", self.serial)))
    }

    /// Poll input reports and forward each key change to the callback.
    ///
    /// Reports are read raw so every press and release keeps its own key
    /// index. The device must have been initialised (reset) before.
    async fn listen(device: SharedDevice, serial: String, callback: KeyCallback) {
        loop {
            let report = {
                let device = device.lock().await;
                device
                    .read_data_with_timeout(INPUT_REPORT_LENGTH, POLL_TIMEOUT)
                    .await
            };

            match report {
                Ok(Some(data)) => {
                    // Encoders and the touch strip are not bound to commands
                    if let Some((key, pressed)) = decode_key_report(&data) {
                        debug!(
                            "Key {} {}",
                            key,
                            if pressed { "pressed" } else { "released" }
                        );
                        callback(KeyEvent {
                            serial: serial.clone(),
                            key,
                            pressed,
                        });
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    let error_str = e.to_string();
                    if error_str.contains("Disconnected") {
                        warn!("Device {} disconnected", serial);
                        break;
                    }
                    warn!("Error reading device input: {}", e);
                }
            }

            tokio::task::yield_now().await;
        }
    }
}

impl Deck for MirajazzDeck {
    fn deck_type(&self) -> &str {
        DEVICE_NAME
    }

    fn id(&self) -> String {
        format!("{:04x}:{:04x}", VENDOR_ID, PRODUCT_ID)
    }

    fn key_count(&self) -> u8 {
        KEY_COUNT
    }

    fn key_format(&self) -> ImageFormat {
        KEY_FORMAT
    }

    async fn open(&self) -> Result<()> {
        if self.connection()?.device.is_some() {
            return Ok(());
        }

        debug!("Opening device {}", self.serial);

        // v2 protocol (1024-byte packets), reports both press and release
        let device = Device::connect(
            VENDOR_ID,
            PRODUCT_ID,
            self.serial.clone(),
            true,
            true,
            BUTTON_COUNT as usize,
            ENCODER_COUNT as usize,
        )
        .await
        .map_err(|e| DeckError::Device(format!("Failed to connect to device: {}", e)))?;

        self.connection()?.device = Some(Arc::new(AsyncMutex::new(device)));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut connection = self.connection()?;
        if let Some(listener) = connection.listener.take() {
            listener.abort();
        }
        // Dropping the handle releases the HID connection
        if connection.device.take().is_some() {
            debug!("Closed device {}", self.serial);
        }
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        debug!("Resetting device");
        let device = self.device()?;
        let device = device.lock().await;
        device
            .reset()
            .await
            .map_err(|e| DeckError::Device(format!("Failed to reset device: {}", e)))
    }

    async fn serial_number(&self) -> Result<String> {
        self.device()?;
        Ok(self.serial.clone())
    }

    async fn set_key_image(&self, key: u8, bitmap: &[u8]) -> Result<()> {
        if key >= KEY_COUNT {
            return Err(DeckError::Device(format!("Invalid key index: {}", key)));
        }

        let device = self.device()?;
        let device = device.lock().await;
        device
            .write_image(key_to_display_key(key), bitmap)
            .await
            .map_err(|e| DeckError::Device(format!("Failed to set key image: {}", e)))
    }

    async fn flush(&self) -> Result<()> {
        let device = self.device()?;
        let device = device.lock().await;
        device
            .flush()
            .await
            .map_err(|e| DeckError::Device(format!("Failed to flush images: {}", e)))
    }

    async fn set_brightness(&self, percent: u8) -> Result<()> {
        let percent = percent.min(100);
        debug!("Setting brightness to {}%", percent);
        let device = self.device()?;
        let device = device.lock().await;
        device
            .set_brightness(percent)
            .await
            .map_err(|e| DeckError::Device(format!("Failed to set brightness: {}", e)))
    }

    fn set_key_callback(&self, callback: KeyCallback) -> Result<()> {
        let mut connection = self.connection()?;
        let device = connection
            .device
            .clone()
            .ok_or_else(|| DeckError::Device(format!("Device {} is not open", self.serial)))?;

        if let Some(previous) = connection.listener.take() {
            previous.abort();
        }

        info!("Listening for key events on {}", self.serial);
        connection.listener = Some(tokio::spawn(Self::listen(
            device,
            self.serial.clone(),
            callback,
        )));
        Ok(())
    }
}
