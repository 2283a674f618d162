//! Units formatting and conversion utilities
//!
//! Human-readable work counts and round durations for the CLI.

/// Format a work count with a metric suffix
///
/// # Examples
/// ```
/// use scalebench::util::units::format_count;
///
/// assert_eq!(format_count(950), "950");
/// assert_eq!(format_count(50_000), "50k");
/// assert_eq!(format_count(5_000_000), "5M");
/// assert_eq!(format_count(1_500_000), "1.5M");
/// ```
pub fn format_count(count: u64) -> String {
    const UNITS: &[(u64, &str)] = &[(1_000, "k"), (1_000_000, "M"), (1_000_000_000, "G")];

    let Some(mut index) = UNITS.iter().rposition(|&(scale, _)| count >= scale) else {
        return count.to_string();
    };

    loop {
        let (scale, suffix) = UNITS[index];
        if count % scale == 0 {
            return format!("{}{}", count / scale, suffix);
        }
        // Rounding to one decimal may carry into the next suffix.
        let tenths = (count as f64 * 10.0 / scale as f64).round();
        if tenths >= 10_000.0 && index + 1 < UNITS.len() {
            index += 1;
            continue;
        }
        return format!("{:.1}{}", tenths / 10.0, suffix);
    }
}

/// Parse a work count such as `50000`, `50k`, `5M` or `1.5G`
///
/// # Examples
/// ```
/// use scalebench::util::units::parse_count;
///
/// assert_eq!(parse_count("50000").unwrap(), 50_000);
/// assert_eq!(parse_count("50k").unwrap(), 50_000);
/// assert_eq!(parse_count("1.5M").unwrap(), 1_500_000);
/// ```
pub fn parse_count(input: &str) -> Result<u64, String> {
    let input = input.trim().replace('_', "");
    if input.is_empty() {
        return Err("Empty count".to_string());
    }

    let split_pos = input
        .char_indices()
        .find(|(_, c)| c.is_alphabetic())
        .map(|(i, _)| i)
        .unwrap_or(input.len());
    let (number_part, unit_part) = input.split_at(split_pos);

    let multiplier = match unit_part.to_lowercase().as_str() {
        "" => 1u64,
        "k" => 1_000,
        "m" => 1_000_000,
        "g" => 1_000_000_000,
        other => return Err(format!("Unknown count suffix: {}", other)),
    };

    if let Ok(whole) = number_part.parse::<u64>() {
        return whole
            .checked_mul(multiplier)
            .ok_or_else(|| format!("Count too large: {}", input));
    }

    let number: f64 = number_part
        .parse()
        .map_err(|_| format!("Invalid number: {}", number_part))?;
    if number < 0.0 {
        return Err("Count cannot be negative".to_string());
    }
    Ok((number * multiplier as f64).round() as u64)
}

/// Format milliseconds with a unit that keeps a few significant digits
///
/// # Examples
/// ```
/// use scalebench::util::units::format_millis;
///
/// assert_eq!(format_millis(0.25), "250.0 us");
/// assert_eq!(format_millis(12.5), "12.50 ms");
/// assert_eq!(format_millis(2500.0), "2.50 s");
/// ```
pub fn format_millis(millis: f64) -> String {
    if millis < 1.0 {
        format!("{:.1} us", millis * 1000.0)
    } else if millis < 1000.0 {
        format!("{:.2} ms", millis)
    } else {
        format!("{:.2} s", millis / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(10_000), "10k");
        assert_eq!(format_count(80_000_000), "80M");
        assert_eq!(format_count(2_500), "2.5k");
        assert_eq!(format_count(999_999), "1.0M");
        assert_eq!(format_count(999_950), "1.0M");
        assert_eq!(format_count(999_949), "999.9k");
        assert_eq!(format_count(999_999_999), "1.0G");
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("10000").unwrap(), 10_000);
        assert_eq!(parse_count("10_000").unwrap(), 10_000);
        assert_eq!(parse_count(" 5M ").unwrap(), 5_000_000);
        assert_eq!(parse_count("2K").unwrap(), 2_000);
        assert_eq!(parse_count("0.5k").unwrap(), 500);
        assert!(parse_count("").is_err());
        assert!(parse_count("12x").is_err());
        assert!(parse_count("abc").is_err());
        assert!(parse_count("-5").is_err());
    }

    #[test]
    fn test_count_roundtrip_for_preset_sizes() {
        for count in [50_000u64, 500_000, 5_000_000, 50_000_000, 10_000, 1_600_000] {
            assert_eq!(parse_count(&format_count(count)).unwrap(), count);
        }
    }

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(999.0), "999.00 ms");
        assert_eq!(format_millis(1000.0), "1.00 s");
    }
}
