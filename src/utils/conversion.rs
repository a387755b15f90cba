// ============================================
// Hex Encoding
// ============================================

/// Normalize a hex string to the wire form: lowercase, no 0x prefix.
pub fn normalize_hex(value: &str) -> String {
    let trimmed = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    trimmed.to_ascii_lowercase()
}
