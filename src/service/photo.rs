use crate::config::PhotoConfig;
use crate::error::app_error::AppError;
use crate::store::files::sanitize_filename;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{GenericImageView, RgbImage};

/// Name under which the photo for `qr_filename` is stored.
pub fn photo_filename(qr_filename: &str) -> String {
    let safe = sanitize_filename(qr_filename);
    let stem = safe.rsplit_once('.').map_or(safe.as_str(), |(stem, _)| stem);
    format!("{stem}.jpg")
}

/// Decodes an uploaded image and re-encodes it as JPEG within the configured
/// byte budget. Blocking; run it on the blocking pool.
pub fn compress_photo(bytes: &[u8], config: &PhotoConfig) -> Result<Vec<u8>, AppError> {
    let mut decoded = image::load_from_memory(bytes).map_err(AppError::InvalidImage)?;

    let (width, height) = decoded.dimensions();
    let max_dimension = config.max_dimension.max(1);
    if width > max_dimension || height > max_dimension {
        decoded = decoded.resize(max_dimension, max_dimension, FilterType::Lanczos3);
    }

    let rgb = decoded.to_rgb8();
    let (encoded, quality) = encode_with_budget(config, |quality| encode_jpeg(&rgb, quality))?;

    if encoded.len() > config.max_bytes {
        tracing::warn!(size = encoded.len(), quality, "photo still above size budget at minimum quality");
    }
    Ok(encoded)
}

fn encode_jpeg(rgb: &RgbImage, quality: u8) -> Result<Vec<u8>, AppError> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode_image(rgb)
        .map_err(|e| AppError::image("Failed to encode photo", e))?;
    Ok(buffer)
}

/// Steps quality down from `initial_quality` until the output fits
/// `max_bytes` or `min_quality` is reached; the floor result is accepted
/// whatever its size.
pub(crate) fn encode_with_budget<E>(config: &PhotoConfig, mut encode: impl FnMut(u8) -> Result<Vec<u8>, E>) -> Result<(Vec<u8>, u8), E> {
    let floor = config.min_quality.clamp(1, 100);
    let step = config.quality_step.max(1);
    let mut quality = config.initial_quality.clamp(floor, 100);

    loop {
        let encoded = encode(quality)?;
        if encoded.len() <= config.max_bytes || quality <= floor {
            return Ok((encoded, quality));
        }
        quality = quality.saturating_sub(step).max(floor);
    }
}
