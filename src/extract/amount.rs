//! Quantity normalization for part rows
//!
//! The catalog prints quantities zero-padded ("007") and uses `X` when the
//! amount is not applicable or varies between configurations.

/// Normalizes a raw amount cell
///
/// Trims the text and strips leading zeros one at a time. An empty result
/// or the `X`/`x` sentinel means "no amount".
///
/// # Returns
///
/// * `Ok(Some(n))` - A quantity
/// * `Ok(None)` - Not applicable
/// * `Err(String)` - The cell is not a non-negative integer
///
/// # Example
///
/// ```
/// use partsouq_harvester::extract::normalize_amount;
///
/// assert_eq!(normalize_amount("007"), Ok(Some(7)));
/// assert_eq!(normalize_amount("X"), Ok(None));
/// ```
pub fn normalize_amount(raw: &str) -> Result<Option<u32>, String> {
    let mut value = raw.trim();
    while let Some(rest) = value.strip_prefix('0') {
        value = rest;
    }

    if value.is_empty() || value.eq_ignore_ascii_case("x") {
        return Ok(None);
    }

    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid amount '{}'", raw.trim()));
    }

    value
        .parse::<u32>()
        .map(Some)
        .map_err(|e| format!("invalid amount '{}': {}", raw.trim(), e))
}
