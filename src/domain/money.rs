use std::fmt;

/// Money is represented as integer thousandths of a unit to avoid
/// floating-point precision issues. 1 unit = 1000 millis, so 2.5 = 2500.
pub type Millis = i64;

/// Scale factor between whole units and stored millis.
pub const MILLIS_PER_UNIT: i64 = 1000;

/// Format millis as a human-readable decimal string.
/// Example: 2500 -> "2.500", -1250 -> "-1.250"
pub fn format_millis(millis: Millis) -> String {
    let sign = if millis < 0 { "-" } else { "" };
    let abs_millis = millis.abs();
    let units = abs_millis / MILLIS_PER_UNIT;
    let remainder = abs_millis % MILLIS_PER_UNIT;
    format!("{}{}.{:03}", sign, units, remainder)
}

/// Parse a non-negative decimal string into millis.
/// Digits beyond the third decimal place are truncated, never rounded.
/// Example: "2.500" -> 2500, "2.5" -> 2500, "100" -> 100000
pub fn parse_millis(input: &str) -> Result<Millis, ParseMillisError> {
    let input = input.trim();
    if input.starts_with('-') {
        return Err(ParseMillisError::Negative);
    }

    let parts: Vec<&str> = input.split('.').collect();
    match parts.len() {
        1 => {
            // No decimal point, treat as whole units
            let units = parse_digits(parts[0])?;
            units
                .checked_mul(MILLIS_PER_UNIT)
                .ok_or(ParseMillisError::InvalidFormat)
        }
        2 => {
            if parts[0].is_empty() && parts[1].is_empty() {
                return Err(ParseMillisError::InvalidFormat);
            }
            let units: i64 = if parts[0].is_empty() {
                0
            } else {
                parse_digits(parts[0])?
            };

            // Handle decimal part - pad or truncate to 3 digits
            let decimal_str = parts[1];
            let decimal_millis: i64 = match decimal_str.len() {
                0 => 0,
                1 => parse_digits(decimal_str)? * 100,
                2 => parse_digits(decimal_str)? * 10,
                3 => parse_digits(decimal_str)?,
                _ => {
                    // Validate the whole tail before byte-slicing it, so the
                    // cut can never land inside a multi-byte character.
                    if !decimal_str.bytes().all(|b| b.is_ascii_digit()) {
                        return Err(ParseMillisError::InvalidFormat);
                    }
                    parse_digits(&decimal_str[..3])?
                }
            };

            units
                .checked_mul(MILLIS_PER_UNIT)
                .and_then(|m| m.checked_add(decimal_millis))
                .ok_or(ParseMillisError::InvalidFormat)
        }
        _ => Err(ParseMillisError::InvalidFormat),
    }
}

/// Parse a run of ASCII digits. Unlike `str::parse`, rejects signs and
/// whitespace outright.
fn parse_digits(s: &str) -> Result<i64, ParseMillisError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseMillisError::InvalidFormat);
    }
    s.parse().map_err(|_| ParseMillisError::InvalidFormat)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseMillisError {
    InvalidFormat,
    Negative,
}

impl fmt::Display for ParseMillisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseMillisError::InvalidFormat => write!(f, "invalid amount format"),
            ParseMillisError::Negative => write!(f, "amount must not be negative"),
        }
    }
}

impl std::error::Error for ParseMillisError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(2500), "2.500");
        assert_eq!(format_millis(1000), "1.000");
        assert_eq!(format_millis(5), "0.005");
        assert_eq!(format_millis(0), "0.000");
        assert_eq!(format_millis(1000000), "1000.000");
        assert_eq!(format_millis(-1250), "-1.250");
        assert_eq!(format_millis(-1), "-0.001");
    }

    #[test]
    fn test_parse_millis() {
        assert_eq!(parse_millis("2.500"), Ok(2500));
        assert_eq!(parse_millis("2.5"), Ok(2500));
        assert_eq!(parse_millis("2.50"), Ok(2500));
        assert_eq!(parse_millis("100"), Ok(100000));
        assert_eq!(parse_millis("0"), Ok(0));
        assert_eq!(parse_millis("0.001"), Ok(1));
        assert_eq!(parse_millis(".750"), Ok(750));
        assert_eq!(parse_millis("7."), Ok(7000));
        assert_eq!(parse_millis(" 3.141 "), Ok(3141));
    }

    #[test]
    fn test_parse_millis_truncates() {
        assert_eq!(parse_millis("2.5009"), Ok(2500));
        assert_eq!(parse_millis("0.0019"), Ok(1));
        assert_eq!(parse_millis("1.99999"), Ok(1999));
        assert_eq!(parse_millis("1.2345678901234567890123"), Ok(1234));
        assert!(parse_millis("1.12é45").is_err());
    }

    #[test]
    fn test_parse_millis_rejects_negative() {
        assert_eq!(parse_millis("-5"), Err(ParseMillisError::Negative));
        assert_eq!(parse_millis("-0.001"), Err(ParseMillisError::Negative));
    }

    #[test]
    fn test_parse_millis_invalid() {
        assert!(parse_millis("").is_err());
        assert!(parse_millis("abc").is_err());
        assert!(parse_millis("12.34.56").is_err());
        assert!(parse_millis("1,5").is_err());
        assert!(parse_millis("2e3").is_err());
        assert!(parse_millis("+2.5").is_err());
        assert!(parse_millis(".").is_err());
    }
}
