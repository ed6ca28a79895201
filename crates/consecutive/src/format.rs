use crate::error::CounterError;
use chrono::{DateTime, Datelike, Utc};

/// Render a format template against a numeric value.
///
/// Supported tokens: `{PREFIX}`, `{VALUE}`, `{VALUE:N}` (zero-pad to N
/// digits), `{YEAR}`, `{MONTH}`, `{DAY}`. Rendering is a pure function of
/// its inputs, so applying it twice to the same value yields the same
/// string.
pub fn render(template: &str, numeric: i64, prefix: Option<&str>, at: DateTime<Utc>) -> String {
    let mut out = String::with_capacity(template.len() + 8);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let Some(close) = tail.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let token = &tail[..close];
        match expand(token, numeric, prefix, at) {
            Some(expanded) => out.push_str(&expanded),
            None => {
                out.push('{');
                out.push_str(token);
                out.push('}');
            }
        }
        rest = &tail[close + 1..];
    }
    out.push_str(rest);
    out
}

fn expand(token: &str, numeric: i64, prefix: Option<&str>, at: DateTime<Utc>) -> Option<String> {
    match token {
        "PREFIX" => Some(prefix.unwrap_or_default().to_string()),
        "VALUE" => Some(numeric.to_string()),
        "YEAR" => Some(format!("{:04}", at.year())),
        "MONTH" => Some(format!("{:02}", at.month())),
        "DAY" => Some(format!("{:02}", at.day())),
        _ => {
            let width: usize = token.strip_prefix("VALUE:")?.parse().ok()?;
            Some(format!("{numeric:0width$}"))
        }
    }
}

/// Check a template for unknown or malformed tokens.
pub fn validate(template: &str) -> Result<(), CounterError> {
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let tail = &rest[open + 1..];
        let Some(close) = tail.find('}') else {
            return Err(CounterError::InvalidFormat(format!(
                "unclosed token in '{template}'"
            )));
        };
        let token = &tail[..close];
        let known = matches!(token, "PREFIX" | "VALUE" | "YEAR" | "MONTH" | "DAY")
            || token
                .strip_prefix("VALUE:")
                .is_some_and(|n| n.parse::<usize>().is_ok());
        if !known {
            return Err(CounterError::InvalidFormat(format!(
                "unknown token '{{{token}}}' in '{template}'"
            )));
        }
        rest = &tail[close + 1..];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap()
    }

    #[test]
    fn renders_padded_values_and_dates() {
        assert_eq!(render("ORD-{VALUE:6}", 11, None, at()), "ORD-000011");
        assert_eq!(
            render("{PREFIX}{YEAR}{MONTH}{DAY}-{VALUE}", 5, Some("FAC"), at()),
            "FAC20240307-5"
        );
        assert_eq!(render("{VALUE}", 42, None, at()), "42");
    }

    #[test]
    fn rendering_is_idempotent_per_value() {
        let first = render("ORD-{VALUE:6}", 123, None, at());
        let second = render("ORD-{VALUE:6}", 123, None, at());
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_tokens_fail_validation_but_render_verbatim() {
        assert!(validate("ORD-{VALUE:6}").is_ok());
        assert!(validate("{PREFIX}{VALUE}").is_ok());
        assert!(validate("{BOGUS}").is_err());
        assert!(validate("{VALUE:x}").is_err());
        assert!(validate("{VALUE").is_err());
        assert_eq!(render("{BOGUS}-{VALUE}", 1, None, at()), "{BOGUS}-1");
    }
}
