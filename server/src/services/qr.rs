use qrcode::render::svg;
use qrcode::{EcLevel, QrCode};

use crate::utils::error::AppError;

/// Renders `data` as a standalone SVG QR code.
pub fn render_svg(data: &str) -> Result<String, AppError> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::M)
        .map_err(|e| AppError::InternalServerError(format!("QR encoding failed: {e}")))?;

    Ok(code
        .render::<svg::Color<'_>>()
        .min_dimensions(300, 300)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build())
}
