//! Human-readable quotation numbers: `COT-<year>-<sequence>`, zero-padded
//! to 4 digits, sequence restarting each calendar year per tenant.

const NUMBER_PREFIX: &str = "COT";

/// Prefix shared by every number issued in `year`, e.g. `COT-2026-`.
pub fn year_prefix(year: i32) -> String {
    format!("{NUMBER_PREFIX}-{year}-")
}

/// Format a number for `year` and `sequence`. Sequences beyond 9999 simply
/// grow the string, there is no overflow handling.
pub fn format_number(year: i32, sequence: u32) -> String {
    format!("{NUMBER_PREFIX}-{year}-{sequence:04}")
}

/// Parse the trailing sequence out of a number issued in `year`. Returns
/// `None` for numbers from other years or with a malformed tail.
pub fn parse_sequence(number: &str, year: i32) -> Option<u32> {
    let tail = number.strip_prefix(&year_prefix(year))?;
    tail.parse::<u32>().ok()
}

/// Next number in sequence given the most recently issued number for the
/// tenant, if any. A missing or foreign-year last number restarts at 1.
pub fn next_number(last: Option<&str>, year: i32) -> String {
    let next = last.and_then(|number| parse_sequence(number, year)).map_or(1, |seq| seq + 1);
    format_number(year, next)
}

#[cfg(test)]
mod tests {
    use super::{format_number, next_number, parse_sequence, year_prefix};

    #[test]
    fn formats_with_four_digit_padding() {
        assert_eq!(format_number(2024, 7), "COT-2024-0007");
        assert_eq!(format_number(2026, 1234), "COT-2026-1234");
    }

    #[test]
    fn sequences_past_9999_grow_the_string() {
        assert_eq!(format_number(2026, 10_000), "COT-2026-10000");
        assert_eq!(parse_sequence("COT-2026-10000", 2026), Some(10_000));
    }

    #[test]
    fn first_number_of_a_year_starts_at_one() {
        assert_eq!(next_number(None, 2026), "COT-2026-0001");
    }

    #[test]
    fn increments_the_last_issued_number() {
        assert_eq!(next_number(Some("COT-2026-0007"), 2026), "COT-2026-0008");
    }

    #[test]
    fn a_previous_year_number_restarts_the_sequence() {
        assert_eq!(next_number(Some("COT-2025-0412"), 2026), "COT-2026-0001");
    }

    #[test]
    fn malformed_tails_are_ignored() {
        assert_eq!(parse_sequence("COT-2026-00x7", 2026), None);
        assert_eq!(next_number(Some("COT-2026-"), 2026), "COT-2026-0001");
    }

    #[test]
    fn prefix_matches_formatted_numbers() {
        assert!(format_number(2026, 42).starts_with(&year_prefix(2026)));
    }
}
