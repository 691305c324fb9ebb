use super::error::KifuError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Turns raw record bytes into the canonical text the parser expects.
///
/// Only UTF-8 (with or without a BOM) is accepted; Shift_JIS records must be
/// transcoded before they reach this crate.
pub fn decode_to_canonical(bytes: &[u8]) -> Result<String, KifuError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    Ok(std::str::from_utf8(bytes)?.to_string())
}
