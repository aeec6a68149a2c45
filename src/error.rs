use thiserror::Error;

/// Errors that end a run.
///
/// Everything here is fatal: it propagates to `main`, is logged once and
/// turned into a process exit code. Non-fatal problems are logged where they
/// happen and never reach this type.
#[derive(Debug, Error)]
pub enum DeckError {
    /// The configuration source is missing, unreadable or not valid JSON.
    #[error("There is a problem with the format of the configuration file: {0}")]
    ConfigFormat(String),

    /// A required key is missing or a key has the wrong type.
    #[error("The configuration does not match the expected schema: {0}")]
    ConfigSchema(String),

    /// A referenced resource does not exist or a value is unusable.
    #[error("Invalid configuration value for '{field}' ('{value}'): {reason}")]
    ConfigValidation {
        field: String,
        value: String,
        reason: String,
    },

    /// A serial number was configured but no connected deck reports it.
    #[error(
        "The configuration refers to deck '{wanted}' but that device is not connected. \
         Connected devices: '{}'. Check the connected devices with '--list'.",
        .connected.join(", ")
    )]
    DeviceNotFound {
        wanted: String,
        connected: Vec<String>,
    },

    /// Enumeration returned nothing.
    #[error("No deck device was detected")]
    NoDevice,

    /// Transport failure while talking to the deck.
    #[error("Device error: {0}")]
    Device(String),

    /// Icon or font could not be decoded while rendering a key.
    #[error("Render error: {0}")]
    Render(String),
}

impl DeckError {
    /// Process exit code for this error.
    ///
    /// `0` is success and `2` is reserved for command line usage errors
    /// (clap's convention).
    pub fn exit_code(&self) -> u8 {
        match self {
            DeckError::ConfigFormat(_)
            | DeckError::ConfigSchema(_)
            | DeckError::ConfigValidation { .. } => 1,
            DeckError::DeviceNotFound { .. } | DeckError::NoDevice | DeckError::Device(_) => 3,
            DeckError::Render(_) => 4,
        }
    }

    pub(crate) fn validation(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        DeckError::ConfigValidation {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DeckError>;
