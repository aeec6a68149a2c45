//! Key configuration: loading, validation and per-key lookups.
//!
//! The file is JSON. Required-vs-default resolution happens once in
//! [`ConfigModel::load`]; the resulting model is immutable.

use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{DeckError, Result};

/// Command value that releases the device and stops the run.
pub const EXIT_COMMAND: &str = "(exit)";

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

pub const DEFAULT_FONT_SIZE: u32 = 14;
pub const DEFAULT_BRIGHTNESS: u8 = 30;

/// What a key does when pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyCommand {
    /// Reset and close the device, then stop.
    Exit,
    /// Shell command line, launched fire-and-forget.
    Run(String),
}

impl KeyCommand {
    fn parse(command: String) -> Self {
        if command == EXIT_COMMAND {
            KeyCommand::Exit
        } else {
            KeyCommand::Run(command)
        }
    }
}

/// A single physical key binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigItem {
    pub key_id: i64,
    pub text: String,
    pub image: Option<PathBuf>,
    pub command: KeyCommand,
}

/// Validated-on-demand, read-only key configuration.
#[derive(Debug, Clone)]
pub struct ConfigModel {
    items: Vec<ConfigItem>,
    serial_number: Option<String>,
    font: PathBuf,
    font_size: u32,
    brightness: u8,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    serialnumber: Option<String>,
    font: Option<String>,
    #[serde(rename = "fontSize")]
    font_size: Option<u32>,
    brightness: Option<u32>,
    keys: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct RawConfigItem {
    #[serde(rename = "keyId")]
    key_id: Option<i64>,
    text: Option<String>,
    image: Option<String>,
    command: Option<String>,
}

impl ConfigModel {
    /// Load the configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DeckError::ConfigFormat(format!(
                "could not find configuration file '{}'",
                path.display()
            )));
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            DeckError::ConfigFormat(format!("could not read '{}': {}", path.display(), e))
        })?;

        let config = Self::from_json_str(&contents)?;
        info!(
            "Loaded {} key binding(s) from {}",
            config.items.len(),
            path.display()
        );
        Ok(config)
    }

    /// Parse an in-memory JSON document
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let document: Value =
            serde_json::from_str(contents).map_err(|e| DeckError::ConfigFormat(e.to_string()))?;

        if !document.is_object() {
            return Err(DeckError::ConfigSchema(
                "the root element must be an object".to_string(),
            ));
        }

        let raw: RawConfig =
            serde_json::from_value(document).map_err(|e| DeckError::ConfigSchema(e.to_string()))?;

        let (keys, font) = match (raw.keys, raw.font) {
            (Some(keys), Some(font)) => (keys, font),
            _ => {
                return Err(DeckError::ConfigSchema(
                    "the root object must contain the keys 'keys' and 'font'".to_string(),
                ))
            }
        };

        let items = keys
            .into_iter()
            .enumerate()
            .map(|(index, value)| parse_item(index, value))
            .collect::<Result<Vec<_>>>()?;

        let serial_number = match raw.serialnumber {
            Some(serial) => Some(serial),
            None => {
                warn!("Could not find key 'serialnumber', the first connected deck will be used");
                None
            }
        };

        let font_size = raw.font_size.unwrap_or(DEFAULT_FONT_SIZE);
        let brightness = raw
            .brightness
            .map(|b| b.min(100) as u8)
            .unwrap_or(DEFAULT_BRIGHTNESS);

        Ok(Self {
            items,
            serial_number,
            font: PathBuf::from(font),
            font_size,
            brightness,
        })
    }

    /// Check that every referenced resource exists.
    ///
    /// Must run before any device is opened. Commands that do not point at an
    /// existing program only produce a warning, since they may carry arguments
    /// or rely on shell features.
    pub fn validate(&self) -> Result<()> {
        if self.font.as_os_str().is_empty() {
            return Err(DeckError::validation(
                "font",
                "",
                "no font is set, add \"font\": \"<path to font>\" to the root element",
            ));
        }

        if !self.font.exists() {
            return Err(DeckError::validation(
                "font",
                self.font.display().to_string(),
                "the font file does not exist",
            ));
        }

        for item in &self.items {
            if let KeyCommand::Run(command) = &item.command {
                if !command_program_exists(command) {
                    warn!(
                        "The command '{}' for key {} does not point to a valid file (this might be because of added arguments)",
                        command, item.key_id
                    );
                }
            }

            if let Some(image) = &item.image {
                if !image.exists() {
                    return Err(DeckError::validation(
                        format!("keys[keyId={}].image", item.key_id),
                        image.display().to_string(),
                        "the image file does not exist",
                    ));
                }
            }
        }

        debug!("Configuration validated");
        Ok(())
    }

    /// First item bound to `index`
    pub fn item_for_key(&self, index: u8) -> Option<&ConfigItem> {
        self.items
            .iter()
            .find(|item| item.key_id == i64::from(index))
    }

    /// Label for `index`, empty when unbound
    pub fn label_for_key(&self, index: u8) -> &str {
        self.item_for_key(index)
            .map(|item| item.text.as_str())
            .unwrap_or("")
    }

    pub fn icon_for_key(&self, index: u8) -> Option<&Path> {
        self.item_for_key(index)
            .and_then(|item| item.image.as_deref())
    }

    pub fn command_for_key(&self, index: u8) -> Option<&KeyCommand> {
        self.item_for_key(index).map(|item| &item.command)
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.serial_number.as_deref()
    }

    pub fn font(&self) -> &Path {
        &self.font
    }

    pub fn font_size(&self) -> u32 {
        self.font_size
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }
}

fn parse_item(index: usize, value: Value) -> Result<ConfigItem> {
    if !value.is_object() {
        return Err(DeckError::ConfigSchema(format!(
            "key entry #{} must be an object",
            index
        )));
    }

    let source = value.to_string();
    let raw: RawConfigItem = serde_json::from_value(value)
        .map_err(|e| DeckError::ConfigSchema(format!("key entry #{}: {}", index, e)))?;

    let (key_id, command) = match (raw.key_id, raw.command) {
        (Some(key_id), Some(command)) => (key_id, command),
        _ => {
            return Err(DeckError::ConfigSchema(format!(
                "the configuration item '{}' is missing at least one of the following keys: keyId, command",
                source
            )))
        }
    };

    let text = raw.text.unwrap_or_else(|| {
        warn!(
            "Could not find key 'text' for keyId {}, using an empty label",
            key_id
        );
        String::new()
    });

    let image = match raw.image {
        Some(image) if image.is_empty() => None,
        Some(image) => Some(PathBuf::from(image)),
        None => {
            warn!(
                "Could not find key 'image' for keyId {}, no icon is shown",
                key_id
            );
            None
        }
    };

    Ok(ConfigItem {
        key_id,
        text,
        image,
        command: KeyCommand::parse(command),
    })
}

/// Whether the program part of a command line resolves to a file, directly
/// or through `PATH`.
fn command_program_exists(command: &str) -> bool {
    let Some(program) = command.split_whitespace().next() else {
        return false;
    };

    let path = Path::new(program);
    if path.is_file() {
        return true;
    }
    if path.components().count() > 1 {
        return false;
    }

    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}
