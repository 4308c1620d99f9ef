//! Text normalization for group and member labels.
//!
//! Every label that is compared across runs goes through [`normalize`]:
//!
//! 1. leading byte-order marks are stripped,
//! 2. surrounding whitespace is trimmed,
//! 3. the result is put in Unicode canonical composition form (NFC).
//!
//! An empty result means "absent". Callers must drop such labels instead of
//! storing them as keys; [`normalize_non_empty`] does that filtering.

use unicode_normalization::{is_nfc_quick, IsNormalized, UnicodeNormalization};

/// Unicode byte-order mark (U+FEFF).
pub const BYTE_ORDER_MARK: char = '\u{feff}';

/// Returns the canonical form of `text`.
///
/// Idempotent: `normalize(&normalize(x)) == normalize(x)`.
#[must_use]
pub fn normalize(text: &str) -> String {
    // A BOM may be followed by whitespace and another BOM (concatenated
    // exports). Strip until neither is left at the front so the function
    // stays idempotent.
    let stripped = text
        .trim_start_matches(|c: char| c == BYTE_ORDER_MARK || c.is_whitespace())
        .trim_end();

    // NFC composition can never introduce leading/trailing whitespace or a
    // BOM, so trimming before composing is enough.
    match is_nfc_quick(stripped.chars()) {
        IsNormalized::Yes => stripped.to_string(),
        _ => stripped.nfc().collect(),
    }
}

/// Normalizes `text`, returning `None` when nothing is left.
#[must_use]
pub fn normalize_non_empty(text: &str) -> Option<String> {
    let normalized = normalize(text);
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}
