//! AKP05E / Mirabox N4 constants
//!
//! Display index mapping (for image uploads):
//!   - Top row (5 keys):    display keys 10-14
//!   - Bottom row (5 keys): display keys 5-9
//!
//! Input mapping (key presses):
//!   - Top row:    IDs 1-5  (0x01-0x05) → logical keys 0-4
//!   - Bottom row: IDs 6-10 (0x06-0x0a) → logical keys 5-9

use mirajazz::types::{ImageFormat, ImageMirroring, ImageMode, ImageRotation};

/// Key image dimensions (112x112 square LCD keys)
pub const KEY_WIDTH: usize = 112;
pub const KEY_HEIGHT: usize = 112;

/// Logical keys exposed to the configuration
pub const KEY_COUNT: u8 = 10;

/// Addressable displays reported by the HID layer (10 keys + strip slots)
pub const BUTTON_COUNT: u8 = 15;

/// Number of rotary encoders (not bound to commands)
pub const ENCODER_COUNT: u8 = 4;

/// USB Vendor ID for AJAZZ/Mirabox (HOTSPOTEKUSB)
pub const VENDOR_ID: u16 = 0x0300;

/// USB Product ID for AKP05E/N4
pub const PRODUCT_ID: u16 = 0x3004;

pub const DEVICE_NAME: &str = "AJAZZ AKP05E";

/// Native key image format: 112x112 JPEG, rotated 180°
pub const KEY_FORMAT: ImageFormat = ImageFormat {
    mode: ImageMode::JPEG,
    size: (KEY_WIDTH, KEY_HEIGHT),
    rotation: ImageRotation::Rot180,
    mirror: ImageMirroring::None,
};

/// Convert logical key index (0-9) to device display key
///
/// - Top row (keys 0-4) → display keys 10-14
/// - Bottom row (keys 5-9) → display keys 5-9
#[inline]
pub fn key_to_display_key(key: u8) -> u8 {
    if key < 5 {
        key + 10
    } else {
        key
    }
}

/// Convert a raw HID input ID to a logical key index
#[inline]
pub fn input_id_to_key(input_id: u8) -> Option<u8> {
    match input_id {
        0x01..=0x0a => Some(input_id - 1),
        _ => None,
    }
}

/// Bytes read per HID input report
pub const INPUT_REPORT_LENGTH: usize = 512;

const INPUT_ID_OFFSET: usize = 9;
const INPUT_STATE_OFFSET: usize = 10;

/// Decode one input report into `(logical key, pressed)`.
///
/// A report describes a single key, so keys held down are not affected by
/// reports for other keys. Empty reports and non-key inputs (encoders,
/// strip) yield `None`.
pub fn decode_key_report(report: &[u8]) -> Option<(u8, bool)> {
    if report.len() <= INPUT_STATE_OFFSET || report[0] == 0 {
        return None;
    }
    let key = input_id_to_key(report[INPUT_ID_OFFSET])?;
    Some((key, report[INPUT_STATE_OFFSET] != 0))
}
