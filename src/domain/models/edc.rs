//! EDC name normalization and EDC-to-PJM-zone mapping.
//!
//! The upstream views spell some distribution companies inconsistently
//! ("Met-Ed" vs "Met Ed", "Pike County Light" vs the full name). Fetchers
//! normalize names at ingest so grouping and filtering never split one EDC
//! into two.

/// Canonicalize an EDC name, combining known duplicates.
pub fn normalize_edc(name: &str) -> &str {
    match name {
        "Met-Ed" => "Met Ed",
        "Pike County Light" => "Pike County Light and Power",
        other => other,
    }
}

/// Map an EDC name to its PJM zone, if one is known.
///
/// Accepts both raw and normalized spellings. Pike County is served through
/// the PPL zone.
pub fn edc_zone(edc: &str) -> Option<&'static str> {
    match edc {
        "West Penn Power" => Some("APS"),
        "Duquesne Light" => Some("DUQ"),
        "Met Ed" | "Met-Ed" => Some("METED"),
        "PECO Energy" => Some("PECO"),
        "Penelec" => Some("PENELEC"),
        "PPL Electric Utilities" => Some("PPL"),
        "Pike County Light and Power" | "Pike County Light" => Some("PPL"),
        _ => None,
    }
}
