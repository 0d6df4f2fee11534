use std::sync::LazyLock;

use regex::Regex;

static NON_NUMERIC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^0-9.]").unwrap());

/// Locale-tolerant text → number conversion used for every numeric field.
///
/// Commas become periods; when several periods remain only the first two
/// dot-delimited segments survive (`"1.234.567"` → `1.234`); every other
/// non-digit character is dropped. Empty or unparsable input yields
/// `default`.
pub fn parse_numeric(raw: &str, default: f64) -> f64 {
    let dotted = raw.replace(',', ".");
    let parts: Vec<&str> = dotted.split('.').collect();
    let kept = if parts.len() > 2 {
        format!("{}.{}", parts[0], parts[1])
    } else {
        dotted.clone()
    };
    let cleaned = NON_NUMERIC_RE.replace_all(&kept, "");
    if cleaned.is_empty() {
        return default;
    }
    cleaned.parse::<f64>().unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn keeps_only_first_two_dot_segments() {
        assert_eq!(parse_numeric("1.234.567", 0.0), 1.234);
    }

    #[test]
    fn empty_and_garbage_fall_back_to_default() {
        assert_eq!(parse_numeric("", 7.0), 7.0);
        assert_eq!(parse_numeric("abc", 7.0), 7.0);
        assert_eq!(parse_numeric("kW", 0.0), 0.0);
        // A lone separator survives stripping but is not a number.
        assert_eq!(parse_numeric(" , ", 3.0), 3.0);
        assert_eq!(parse_numeric("..", 3.0), 3.0);
    }

    #[test]
    fn comma_decimal_with_units() {
        assert!(close(parse_numeric("24,50 €/kW", 0.0), 24.5));
        assert!(close(parse_numeric("1 140,00 €/kW", 0.0), 1140.0));
        assert!(close(parse_numeric("Iš viso: 1 250 kW", 0.0), 1250.0));
        assert!(close(parse_numeric("62.5%", 0.0), 62.5));
    }

    #[test]
    fn formatted_values_survive_noise() {
        let values = [0.0, 0.5, 1.0, 12.75, 99.99, 1140.0, 23456.5];
        for d in values {
            let period = format!("€ {} kW", d);
            let comma = format!("~{}~ EUR", d.to_string().replace('.', ","));
            let spaced = format!("Kaina: {} €/kW", d);
            for raw in [&period, &comma, &spaced] {
                let parsed = parse_numeric(raw, -1.0);
                assert!(close(parsed, d), "{:?} parsed as {}", raw, parsed);
            }
        }
    }

    #[test]
    fn never_panics_on_odd_input() {
        for raw in ["%", "—", "1,2,3,4", ".5", "5.", "١٢٣", "∞", "-12"] {
            let _ = parse_numeric(raw, 0.0);
        }
        assert_eq!(parse_numeric("-12", 0.0), 12.0);
        assert_eq!(parse_numeric(".5", 0.0), 0.5);
    }
}
