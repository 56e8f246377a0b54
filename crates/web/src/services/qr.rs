//! QR codes for join and pass links.

use qrcode::QrCode;
use qrcode::render::svg;

/// Minimum rendered edge in pixels.
const QR_MIN_SIZE: u32 = 240;

/// Errors rendering a QR code.
#[derive(Debug, thiserror::Error)]
pub enum QrError {
    #[error("QR encoding failed: {0}")]
    Encode(String),
}

/// A scannable code plus the link it encodes.
#[derive(Debug, Clone)]
pub struct QrCard {
    /// Inline `<svg>` markup.
    pub svg: String,
    /// The encoded URL, shown as selectable text.
    pub url: String,
}

/// Render `url` as an inline SVG QR code.
///
/// Returns `Ok(None)` for an empty URL.
///
/// # Errors
///
/// Returns `QrError::Encode` if the URL is too long to encode.
pub fn render(url: &str) -> Result<Option<QrCard>, QrError> {
    let url = url.trim();
    if url.is_empty() {
        return Ok(None);
    }
    let code = QrCode::new(url.as_bytes()).map_err(|e| QrError::Encode(e.to_string()))?;
    let image = code
        .render::<svg::Color<'_>>()
        .min_dimensions(QR_MIN_SIZE, QR_MIN_SIZE)
        .quiet_zone(true)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build();

    // Inline markup cannot carry the XML declaration.
    let svg = image
        .find("<svg")
        .map_or(image.as_str(), |start| &image[start..])
        .to_owned();

    Ok(Some(QrCard {
        svg,
        url: url.to_owned(),
    }))
}
