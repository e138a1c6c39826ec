use crate::error::app_error::AppError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Decodes a base64 payload, accepting an optional `data:<mime>;base64,` prefix
/// as produced by browsers.
pub fn decode_base64(field: &'static str, data: &str) -> Result<Vec<u8>, AppError> {
    let encoded = match data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };
    STANDARD.decode(encoded.trim()).map_err(|e| AppError::encoding(field, e))
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
