//! Luhn checksum validation for order numbers.

/// Returns `true` when `digits` is a non-empty string of ASCII digits whose
/// Luhn checksum is congruent to zero mod 10.
///
/// Any non-digit character, including a leading `+`/`-` or whitespace,
/// disqualifies the input. An empty string is not valid.
pub fn is_valid(digits: &str) -> bool {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let sum: u32 = digits
        .chars()
        .rev()
        .enumerate()
        .map(|(i, c)| {
            let d = c.to_digit(10).expect("filtered to ascii digits above");
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();

    sum % 10 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_valid_numbers() {
        assert!(is_valid("12345678903"));
        assert!(is_valid("2377225624"));
        assert!(is_valid("4561261212345467"));
    }

    #[test]
    fn rejects_bad_checksum() {
        assert!(!is_valid("12345678904"));
    }

    #[test]
    fn rejects_non_digit_and_empty() {
        assert!(!is_valid(""));
        assert!(!is_valid("123abc"));
        assert!(!is_valid("-123"));
        assert!(!is_valid(" 123"));
    }

    #[test]
    fn single_digit_zero_is_valid() {
        assert!(is_valid("0"));
    }

    proptest::proptest! {
        #[test]
        fn appending_a_computed_check_digit_is_always_valid(base in "[0-9]{1,30}") {
            let check = check_digit_for(&base);
            let candidate = format!("{base}{check}");
            proptest::prop_assert!(is_valid(&candidate));
        }
    }

    /// Computes the check digit that makes `base + digit` Luhn-valid.
    /// Test-only helper grounding the canonical Luhn property from the spec.
    fn check_digit_for(base: &str) -> u32 {
        let sum: u32 = base
            .chars()
            .rev()
            .enumerate()
            .map(|(i, c)| {
                let d = c.to_digit(10).unwrap();
                // the appended digit sits at position 0 (even), so existing
                // digits shift one position to the left, i.e. parity flips.
                if i % 2 == 0 {
                    let doubled = d * 2;
                    if doubled > 9 {
                        doubled - 9
                    } else {
                        doubled
                    }
                } else {
                    d
                }
            })
            .sum();
        (10 - (sum % 10)) % 10
    }
}
