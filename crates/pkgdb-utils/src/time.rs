use std::time::Duration;

/// Parses a duration string such as `7d`, `12h` or `1d1h1m1s`.
///
/// Units are `s`, `m`, `h` and `d`. Returns `None` on a malformed string, a trailing
/// number without unit, or overflow. An empty string is a zero duration.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use pkgdb_utils::time::parse_duration;
///
/// assert_eq!(parse_duration("1h30m"), Some(Duration::from_secs(90 * 60)));
/// assert_eq!(parse_duration("7x"), None);
/// ```
pub fn parse_duration(input: &str) -> Option<Duration> {
    let mut total: u64 = 0;
    let mut chars = input.trim().chars().peekable();

    while chars.peek().is_some() {
        let mut number: u64 = 0;
        let mut digits = 0;
        while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
            number = number.checked_mul(10)?.checked_add(u64::from(digit))?;
            digits += 1;
            chars.next();
        }

        if digits == 0 {
            return None;
        }

        let seconds = match chars.next()? {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 24 * 60 * 60,
            _ => return None,
        };

        total = total.checked_add(number.checked_mul(seconds)?)?;
    }

    Some(Duration::from_secs(total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1s"), Some(Duration::from_secs(1)));
        assert_eq!(parse_duration("1m"), Some(Duration::from_secs(60)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("7d"), Some(Duration::from_secs(7 * 86400)));
        assert_eq!(
            parse_duration("1d1h1m1s"),
            Some(Duration::from_secs(86400 + 3600 + 60 + 1))
        );
        assert_eq!(parse_duration(""), Some(Duration::ZERO));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert_eq!(parse_duration("1d1"), None);
        assert_eq!(parse_duration("1w"), None);
        assert_eq!(parse_duration("fail"), None);
        assert_eq!(parse_duration("99999999999999999999d"), None);
    }
}
