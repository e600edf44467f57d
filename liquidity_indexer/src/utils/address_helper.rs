use alloy::primitives::Address;

/// Normalizes an account or market identifier.
///
/// Identifiers that parse as 20-byte hex addresses are rendered lowercase with a
/// `0x` prefix so that checksummed and non-checksummed spellings map to the same
/// key. Anything else is kept verbatim.
pub fn normalize_id(id: &str) -> String {
    let id = id.trim();
    match id.parse::<Address>() {
        Ok(address) => format!("{:#x}", address),
        Err(_) => id.to_string(),
    }
}
