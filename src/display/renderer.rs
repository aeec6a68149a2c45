use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use mirajazz::images::convert_image_with_format;
use mirajazz::types::ImageFormat;
use rusttype::{Font, Scale};
use std::path::Path;
use tracing::debug;

use crate::config::ConfigModel;
use crate::error::{DeckError, Result};

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Height of the band at the bottom of a key reserved for the label
pub const LABEL_BAND: u32 = 20;

/// Bottom margin kept free when a key has an icon but no label
pub const ICON_ONLY_BOTTOM_MARGIN: u32 = 5;

/// Horizontal margin, per side, when a key has an icon but no label
pub const ICON_ONLY_SIDE_MARGIN: u32 = 1;

/// Renders key images from label + icon
pub struct KeyRenderer {
    font: Option<Font<'static>>,
    font_size: f32,
}

impl KeyRenderer {
    pub fn new(font: Option<Font<'static>>, font_size: f32) -> Self {
        Self { font, font_size }
    }

    /// Load the configured font once, before any device I/O
    pub fn from_config(config: &ConfigModel) -> Result<Self> {
        let path = config.font();
        let data = std::fs::read(path).map_err(|e| {
            DeckError::Render(format!("Failed to read font '{}': {}", path.display(), e))
        })?;
        let font = Font::try_from_vec(data)
            .ok_or_else(|| DeckError::Render(format!("Failed to load font '{}'", path.display())))?;

        debug!("Loaded font {}", path.display());
        Ok(Self::new(Some(font), config.font_size() as f32))
    }

    /// Native bitmap for a key: composed at the format's size, then rotated,
    /// mirrored and encoded by mirajazz
    pub async fn render_key(
        &self,
        label: &str,
        icon: Option<&Path>,
        format: ImageFormat,
    ) -> Result<Vec<u8>> {
        let (width, height) = format.size;
        let image = self.compose(label, icon, width as u32, height as u32)?;

        convert_image_with_format(format, DynamicImage::ImageRgba8(image))
            .await
            .map_err(|e| DeckError::Render(format!("Failed to encode key image: {}", e)))
    }

    /// Composite icon and label onto a black canvas.
    ///
    /// The icon is shrunk (never enlarged) to fit above the label band,
    /// centred horizontally and anchored to the top edge.
    pub fn compose(
        &self,
        label: &str,
        icon: Option<&Path>,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage> {
        let mut image = RgbaImage::from_pixel(width, height, BLACK);
        let has_label = !label.is_empty();

        if let Some(path) = icon.filter(|path| path.exists()) {
            let icon = image::open(path)
                .map_err(|e| {
                    DeckError::Render(format!("Failed to decode icon '{}': {}", path.display(), e))
                })?
                .to_rgba8();

            let (max_width, max_height) = icon_area(width, height, has_label);
            let (icon_width, icon_height) =
                fit_within(icon.width(), icon.height(), max_width, max_height);

            let icon = if (icon_width, icon_height) == icon.dimensions() {
                icon
            } else {
                imageops::resize(&icon, icon_width, icon_height, FilterType::Lanczos3)
            };

            let x = (i64::from(width) - i64::from(icon.width())) / 2;
            imageops::overlay(&mut image, &icon, x, 0);
        }

        if has_label {
            let font = self
                .font
                .as_ref()
                .ok_or_else(|| DeckError::Render("No font loaded for key label".to_string()))?;
            let label_width = text_width(font, label, self.font_size);
            let x = (width as i32 - label_width) / 2;
            let y = height as i32 - LABEL_BAND as i32;
            draw_text(&mut image, font, label, x, y, self.font_size, WHITE);
        }

        Ok(image)
    }
}

/// Space available to the icon on a `width`x`height` key
pub fn icon_area(width: u32, height: u32, has_label: bool) -> (u32, u32) {
    if has_label {
        (width, height.saturating_sub(LABEL_BAND))
    } else {
        (
            width.saturating_sub(2 * ICON_ONLY_SIDE_MARGIN),
            height.saturating_sub(ICON_ONLY_BOTTOM_MARGIN),
        )
    }
}

/// Largest size with the same aspect ratio that fits the bounds, never larger
/// than the original
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let scale = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    let scaled_width = ((width as f64 * scale).round() as u32).clamp(1, max_width.max(1));
    let scaled_height = ((height as f64 * scale).round() as u32).clamp(1, max_height.max(1));
    (scaled_width, scaled_height)
}

/// Draw text onto an image, `y` being the top of the text box
pub fn draw_text(
    image: &mut RgbaImage,
    font: &Font,
    text: &str,
    x: i32,
    y: i32,
    scale: f32,
    color: Rgba<u8>,
) {
    let scale = Scale::uniform(scale);
    let v_metrics = font.v_metrics(scale);
    let offset = rusttype::point(x as f32, y as f32 + v_metrics.ascent);

    for glyph in font.layout(text, scale, offset) {
        if let Some(bb) = glyph.pixel_bounding_box() {
            glyph.draw(|gx, gy, v| {
                let px = bb.min.x + gx as i32;
                let py = bb.min.y + gy as i32;

                if px >= 0 && px < image.width() as i32 && py >= 0 && py < image.height() as i32 {
                    let pixel = image.get_pixel_mut(px as u32, py as u32);
                    // Alpha blend
                    let alpha = v;
                    pixel[0] = ((1.0 - alpha) * pixel[0] as f32 + alpha * color[0] as f32) as u8;
                    pixel[1] = ((1.0 - alpha) * pixel[1] as f32 + alpha * color[1] as f32) as u8;
                    pixel[2] = ((1.0 - alpha) * pixel[2] as f32 + alpha * color[2] as f32) as u8;
                }
            });
        }
    }
}

/// Calculate text width
pub fn text_width(font: &Font, text: &str, scale: f32) -> i32 {
    let scale = Scale::uniform(scale);
    let mut width = 0.0;

    for glyph in font.layout(text, scale, rusttype::point(0.0, 0.0)) {
        if let Some(bb) = glyph.pixel_bounding_box() {
            width = bb.max.x as f32;
        } else {
            width += glyph.unpositioned().h_metrics().advance_width;
        }
    }

    width as i32
}

/// First readable TrueType font among common system locations
#[cfg(test)]
pub(crate) fn system_font_path() -> Option<&'static str> {
    const SYSTEM_FONTS: &[&str] = &[
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/Library/Fonts/Arial.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
    ];

    SYSTEM_FONTS.iter().copied().find(|path| {
        std::fs::read(path)
            .ok()
            .and_then(Font::try_from_vec)
            .is_some()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::MOCK_FORMAT;
    use crate::device::KEY_FORMAT;
    use std::path::PathBuf;

    fn system_font() -> Option<Font<'static>> {
        system_font_path()
            .and_then(|path| std::fs::read(path).ok())
            .and_then(Font::try_from_vec)
    }

    fn write_icon(dir: &Path, width: u32, height: u32) -> PathBuf {
        let path = dir.join(format!("icon_{}x{}.png", width, height));
        RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 255]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_fit_within_downscales_large_icon() {
        let (max_width, max_height) = icon_area(72, 72, true);
        assert_eq!((max_width, max_height), (72, 52));

        let (w, h) = fit_within(500, 500, max_width, max_height);
        assert!(w <= 72 && h <= 52);
        assert_eq!((w, h), (52, 52));
    }

    #[test]
    fn test_fit_within_never_enlarges() {
        assert_eq!(fit_within(16, 16, 70, 67), (16, 16));
    }

    #[test]
    fn test_fit_within_keeps_aspect_ratio() {
        let (max_width, max_height) = icon_area(72, 72, false);
        assert_eq!((max_width, max_height), (70, 67));
        assert_eq!(fit_within(200, 100, max_width, max_height), (70, 35));
    }

    #[test]
    fn test_blank_key_is_black() {
        let renderer = KeyRenderer::new(None, 14.0);
        let image = renderer.compose("", None, 72, 72).unwrap();
        assert!(image.pixels().all(|p| *p == BLACK));
    }

    #[test]
    fn test_missing_icon_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = KeyRenderer::new(None, 14.0);
        let image = renderer
            .compose("", Some(&dir.path().join("gone.png")), 72, 72)
            .unwrap();
        assert!(image.pixels().all(|p| *p == BLACK));
    }

    #[test]
    fn test_icon_is_top_anchored_and_centred() {
        let dir = tempfile::tempdir().unwrap();
        let icon = write_icon(dir.path(), 500, 500);
        let renderer = KeyRenderer::new(None, 14.0);

        // No label: icon shrinks to 67x67, centred with (72 - 67) / 2 = 2 px on the left
        let image = renderer.compose("", Some(&icon), 72, 72).unwrap();
        assert_eq!(image.get_pixel(36, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(image.get_pixel(36, 66), &Rgba([255, 0, 0, 255]));
        assert_eq!(image.get_pixel(36, 67), &BLACK);
        assert_eq!(image.get_pixel(1, 10), &BLACK);
        assert_eq!(image.get_pixel(2, 10), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_small_icon_is_not_enlarged() {
        let dir = tempfile::tempdir().unwrap();
        let icon = write_icon(dir.path(), 10, 10);
        let renderer = KeyRenderer::new(None, 14.0);

        let image = renderer.compose("", Some(&icon), 72, 72).unwrap();
        let red = image
            .pixels()
            .filter(|p| **p == Rgba([255, 0, 0, 255]))
            .count();
        assert_eq!(red, 100);
        assert_eq!(image.get_pixel(31, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(image.get_pixel(30, 0), &BLACK);
    }

    #[test]
    fn test_corrupt_icon_is_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let icon = dir.path().join("broken.png");
        std::fs::write(&icon, b"definitely not a png").unwrap();

        let renderer = KeyRenderer::new(None, 14.0);
        let err = renderer.compose("", Some(&icon), 72, 72).unwrap_err();
        assert!(matches!(err, DeckError::Render(_)));
    }

    #[test]
    fn test_label_without_font_is_render_error() {
        let renderer = KeyRenderer::new(None, 14.0);
        let err = renderer.compose("Term", None, 72, 72).unwrap_err();
        assert!(matches!(err, DeckError::Render(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rendering_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let icon = write_icon(dir.path(), 300, 120);
        let renderer = KeyRenderer::new(system_font(), 14.0);
        let label = if renderer.font.is_some() { "Term" } else { "" };

        for format in [MOCK_FORMAT, KEY_FORMAT] {
            let first = renderer.render_key(label, Some(&icon), format).await;
            let second = renderer.render_key(label, Some(&icon), format).await;
            assert_eq!(first.unwrap(), second.unwrap());
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_render_key_uses_native_encoding() {
        let renderer = KeyRenderer::new(None, 14.0);

        let bmp = renderer.render_key("", None, MOCK_FORMAT).await.unwrap();
        assert_eq!(&bmp[..2], b"BM");
        let decoded = image::load_from_memory(&bmp).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (72, 72));

        let jpeg = renderer.render_key("", None, KEY_FORMAT).await.unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (112, 112));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_render_key_rotates_for_the_device() {
        let dir = tempfile::tempdir().unwrap();
        let icon = write_icon(dir.path(), 10, 10);
        let renderer = KeyRenderer::new(None, 14.0);
        let rotated_bmp = ImageFormat {
            mode: mirajazz::types::ImageMode::BMP,
            ..KEY_FORMAT
        };

        let bytes = renderer.render_key("", Some(&icon), rotated_bmp).await;
        let bytes = bytes.unwrap();
        let image = image::load_from_memory(&bytes).unwrap().to_rgb8();

        // Icon is top-centred, so after a half turn it sits at the bottom
        assert_eq!(image.get_pixel(56, 111), &image::Rgb([255, 0, 0]));
        assert_eq!(image.get_pixel(56, 0), &image::Rgb([0, 0, 0]));
    }

    #[test]
    fn test_label_occupies_bottom_band() {
        let Some(font) = system_font() else {
            return;
        };
        let renderer = KeyRenderer::new(Some(font), 14.0);

        let image = renderer.compose("Term", None, 72, 72).unwrap();
        let lit: Vec<(u32, u32)> = image
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] > 128)
            .map(|(x, y, _)| (x, y))
            .collect();

        assert!(!lit.is_empty());
        assert!(lit.iter().all(|&(_, y)| y >= 72 - LABEL_BAND));
        let min_x = lit.iter().map(|&(x, _)| x).min().unwrap();
        let max_x = lit.iter().map(|&(x, _)| x).max().unwrap();
        assert!((min_x as i32 - (71 - max_x as i32)).abs() <= 3);
    }
}
