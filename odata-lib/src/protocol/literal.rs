//! Lexical helpers shared by both protocol versions

use chrono::DateTime;
use chrono::NaiveDateTime;
use chrono::SecondsFormat;
use chrono::TimeDelta;
use chrono::Utc;

/// Quotes a string literal, doubling embedded single quotes.
pub fn escape_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Formats a floating point literal so it always reads as a float.
pub fn format_float(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    let s = n.to_string();
    if s.contains('.') || s.contains('e') || s.contains('E') {
        s
    } else {
        format!("{}.0", s)
    }
}

/// Formats an instant as an ISO 8601 timestamp in UTC.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Formats a local date/time without offset.
pub fn format_local_datetime(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

/// Formats a duration as an ISO 8601 duration (`P1DT2H3M4.5S`).
pub fn format_duration(d: &TimeDelta) -> String {
    let negative = *d < TimeDelta::zero();
    let d = d.abs();
    let days = d.num_days();
    let hours = d.num_hours() % 24;
    let minutes = d.num_minutes() % 60;
    let seconds = d.num_seconds() % 60;
    let nanos = d.subsec_nanos();

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push('P');
    if days > 0 {
        out.push_str(&format!("{}D", days));
    }
    out.push('T');
    if hours > 0 {
        out.push_str(&format!("{}H", hours));
    }
    if minutes > 0 {
        out.push_str(&format!("{}M", minutes));
    }
    if seconds > 0 || nanos > 0 || (days == 0 && hours == 0 && minutes == 0) {
        if nanos > 0 {
            let fraction = format!("{:09}", nanos);
            out.push_str(&format!("{}.{}S", seconds, fraction.trim_end_matches('0')));
        } else {
            out.push_str(&format!("{}S", seconds));
        }
    }
    if out.ends_with('T') {
        out.pop();
    }
    out
}

/// Parses an ISO 8601 duration (`-P1DT2H3M4.5S`).
pub fn parse_duration(s: &str) -> Option<TimeDelta> {
    let (negative, rest) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let rest = rest.strip_prefix('P')?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, t),
        None => (rest, ""),
    };

    let mut total = TimeDelta::zero();
    let mut number = String::new();
    for c in date_part.chars() {
        match c {
            'D' => {
                total += TimeDelta::try_days(number.parse().ok()?)?;
                number.clear();
            }
            c if c.is_ascii_digit() => number.push(c),
            _ => return None,
        }
    }
    if !number.is_empty() {
        return None;
    }
    for c in time_part.chars() {
        match c {
            'H' => {
                total += TimeDelta::try_hours(number.parse().ok()?)?;
                number.clear();
            }
            'M' => {
                total += TimeDelta::try_minutes(number.parse().ok()?)?;
                number.clear();
            }
            'S' => {
                let seconds: f64 = number.parse().ok()?;
                let whole = seconds.trunc() as i64;
                let nanos = ((seconds - seconds.trunc()) * 1e9).round() as i64;
                total += TimeDelta::try_seconds(whole)? + TimeDelta::nanoseconds(nanos);
                number.clear();
            }
            c if c.is_ascii_digit() || c == '.' => number.push(c),
            _ => return None,
        }
    }
    if !number.is_empty() {
        return None;
    }
    Some(if negative { -total } else { total })
}

/// Uppercase hex encoding used by legacy binary literals.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

/// Decodes a hex string.
pub fn from_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

/// Characters left as-is when escaping URI components; OData syntax relies on them.
const KEEP: &str = "-_.~$();=,/':@*";

/// Separators that must be escaped inside a quoted string literal.
const LITERAL_ESCAPED: &str = "/;=,";

/// Percent-escapes a URI component, keeping OData punctuation readable.
///
/// Applied exactly once to each formatted clause value and key segment.
/// Inside `'...'` literals the path and option separators are escaped too.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut quoted = false;
    for c in s.chars() {
        if c == '\'' {
            quoted = !quoted;
        }
        let keep = c.is_ascii_alphanumeric()
            || (KEEP.contains(c) && !(quoted && LITERAL_ESCAPED.contains(c)));
        if keep {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            out.push_str(&urlencoding::encode(c.encode_utf8(&mut buf)));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_string_doubles_quotes() {
        assert_eq!(escape_string("O'Brien"), "'O''Brien'");
    }

    #[test]
    fn test_escape_separators_inside_literals() {
        assert_eq!(escape("'a/b'"), "'a%2Fb'");
        assert_eq!(
            escape("Name eq 'x;y=z,w' and Id eq 1"),
            "Name%20eq%20'x%3By%3Dz%2Cw'%20and%20Id%20eq%201"
        );
        assert_eq!(escape("'it''s/here'"), "'it''s%2Fhere'");
        assert_eq!(escape("OrderID=1,ProductID=2"), "OrderID=1,ProductID=2");
        assert_eq!(escape("'a&b?c#d'"), "'a%26b%3Fc%23d'");
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(1.5), "1.5");
        assert_eq!(format_float(f64::NAN), "NaN");
    }

    #[test]
    fn test_duration_round_trip() {
        let d = TimeDelta::days(1) + TimeDelta::hours(2) + TimeDelta::milliseconds(4500);
        assert_eq!(format_duration(&d), "P1DT2H4.5S");
        assert_eq!(parse_duration("P1DT2H4.5S"), Some(d));
        assert_eq!(format_duration(&TimeDelta::zero()), "PT0S");
        assert_eq!(parse_duration("-PT30M"), Some(-TimeDelta::minutes(30)));
        assert_eq!(parse_duration("P1X"), None);
    }

    #[test]
    fn test_hex() {
        assert_eq!(to_hex(&[0x0a, 0xff]), "0AFF");
        assert_eq!(from_hex("0aff"), Some(vec![0x0a, 0xff]));
        assert_eq!(from_hex("0af"), None);
    }

    #[test]
    fn test_escape_once() {
        assert_eq!(escape("ProductID ne 1"), "ProductID%20ne%201");
        assert_eq!(escape("Name eq 'A&B'"), "Name%20eq%20'A%26B'");
        assert_eq!(escape("50%"), "50%25");
        assert_eq!(escape("Orders($top=1)"), "Orders($top=1)");
    }
}
