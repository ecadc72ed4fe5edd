//! IBAN normalization and validation
//!
//! Validation checks, in order: country code known, length per country,
//! mod-97 checksum. `normalize` is idempotent and validation is invariant
//! under it.

use crate::error::{Result, SepaError};

/// Registered IBAN lengths by country code
const COUNTRY_LENGTHS: &[(&str, usize)] = &[
    ("AT", 20),
    ("BE", 16),
    ("CH", 21),
    ("DE", 22),
    ("DK", 18),
    ("EE", 20),
    ("ES", 24),
    ("FI", 18),
    ("FR", 27),
    ("GB", 22),
    ("IE", 22),
    ("IT", 27),
    ("LT", 20),
    ("LU", 20),
    ("LV", 21),
    ("NL", 18),
    ("NO", 15),
    ("PL", 28),
    ("PT", 25),
    ("SE", 24),
];

/// Uppercase and strip spaces
pub fn normalize(iban: &str) -> String {
    iban.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Registered length for a country code
pub fn country_length(country: &str) -> Option<usize> {
    COUNTRY_LENGTHS
        .iter()
        .find(|(code, _)| *code == country)
        .map(|(_, len)| *len)
}

/// Validate an IBAN
pub fn validate(iban: &str) -> Result<()> {
    let normalized = normalize(iban);
    let invalid = || SepaError::InvalidIban(iban.to_string());

    if normalized.len() < 4 || !normalized.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid());
    }

    let country = &normalized[..2];
    if !country.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(invalid());
    }

    let expected_len = country_length(country).ok_or_else(invalid)?;
    if normalized.len() != expected_len {
        return Err(invalid());
    }

    if checksum(&normalized) != 1 {
        return Err(invalid());
    }

    Ok(())
}

/// Mod-97 checksum over the rearranged IBAN (first four chars moved to the
/// end, letters mapped A=10..Z=35). Valid IBANs yield 1.
fn checksum(normalized: &str) -> u32 {
    let rearranged = format!("{}{}", &normalized[4..], &normalized[..4]);

    let mut remainder: u32 = 0;
    for c in rearranged.chars() {
        let value = if c.is_ascii_digit() {
            c as u32 - '0' as u32
        } else {
            c as u32 - 'A' as u32 + 10
        };
        // Letters contribute two digits, numbers one.
        let multiplier = if value >= 10 { 100 } else { 10 };
        remainder = (remainder * multiplier + value) % 97;
    }

    remainder
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_valid_ibans() {
        assert!(validate("DE89370400440532013000").is_ok());
        assert!(validate("FR1420041010050500013M02606").is_ok());
        assert!(validate("GB29NWBK60161331926819").is_ok());
        assert!(validate("NO9386011117947").is_ok());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raw = "de89 3704 0044 0532 0130 00";
        let once = normalize(raw);
        assert_eq!(once, "DE89370400440532013000");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_validation_invariant_under_normalize() {
        let raw = "de89 3704 0044 0532 0130 00";
        assert!(validate(raw).is_ok());
        assert!(validate(&normalize(raw)).is_ok());
    }

    #[test]
    fn test_wrong_length_for_country() {
        // German IBANs are 22 chars; drop one digit.
        assert!(validate("DE8937040044053201300").is_err());
    }

    #[test]
    fn test_bad_checksum() {
        assert!(validate("DE89370400440532013001").is_err());
    }

    #[test]
    fn test_unknown_country() {
        assert!(validate("XX89370400440532013000").is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(validate("").is_err());
        assert!(validate("DE").is_err());
        assert!(validate("DE89-3704-0044").is_err());
    }
}
