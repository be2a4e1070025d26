use chrono::{DateTime, Local};

pub const DEFAULT_DATE_FORMAT: &str = "yyyy-MM-dd";
pub const DEFAULT_TIME_FORMAT: &str = "HH:mm:ss";
pub const DEFAULT_DATETIME_FORMAT: &str = "yyyy-MM-dd HH:mm:ss";

/// Render `when` using a Qt-style date/time format string.
///
/// Snippet data is authored against the original tool's Qt token
/// language (`yyyy`, `MM`, `dd`, ...), so the tokens are converted to
/// chrono's strftime specifiers rather than exposed directly.
pub fn format(when: DateTime<Local>, qt_format: &str) -> String {
    when.format(&qt_to_strftime(qt_format)).to_string()
}

fn qt_to_strftime(qt_format: &str) -> String {
    // Longest token first so e.g. "MM" is not read as two "M"s.
    const TOKENS: &[(&str, &str)] = &[
        ("yyyy", "%Y"),
        ("yy", "%y"),
        ("MMMM", "%B"),
        ("MMM", "%b"),
        ("MM", "%m"),
        ("M", "%-m"),
        ("dddd", "%A"),
        ("ddd", "%a"),
        ("dd", "%d"),
        ("d", "%-d"),
        ("HH", "%H"),
        ("H", "%-H"),
        ("hh", "%I"),
        ("h", "%-I"),
        ("mm", "%M"),
        ("m", "%-M"),
        ("ss", "%S"),
        ("s", "%-S"),
        ("AP", "%p"),
        ("A", "%p"),
        ("ap", "%P"),
        ("a", "%P"),
    ];

    let mut out = String::with_capacity(qt_format.len() + 8);
    let mut rest = qt_format;
    'outer: while !rest.is_empty() {
        // Single-quoted runs are literal; a doubled quote is a quote.
        if let Some(after) = rest.strip_prefix("''") {
            out.push('\'');
            rest = after;
            continue;
        }
        if let Some(stripped) = rest.strip_prefix('\'') {
            let mut scan = stripped;
            loop {
                match scan.find('\'') {
                    Some(end) => {
                        push_literal(&mut out, &scan[..end]);
                        let after = &scan[end + 1..];
                        if let Some(next) = after.strip_prefix('\'') {
                            out.push('\'');
                            scan = next;
                        } else {
                            scan = after;
                            break;
                        }
                    }
                    None => {
                        push_literal(&mut out, scan);
                        scan = "";
                        break;
                    }
                }
            }
            rest = scan;
            continue;
        }
        for (token, spec) in TOKENS {
            if let Some(after) = rest.strip_prefix(token) {
                out.push_str(spec);
                rest = after;
                continue 'outer;
            }
        }
        let c = rest.chars().next().unwrap_or_default();
        push_char(&mut out, c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

fn push_literal(out: &mut String, literal: &str) {
    for c in literal.chars() {
        push_char(out, c);
    }
}

fn push_char(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 1, 9, 5, 7).unwrap()
    }

    #[test]
    fn iso_date_tokens() {
        assert_eq!(format(fixed(), "yyyy-MM-dd"), "2024-03-01");
    }

    #[test]
    fn time_tokens_with_and_without_padding() {
        assert_eq!(format(fixed(), "HH:mm:ss"), "09:05:07");
        assert_eq!(format(fixed(), "H:m:s"), "9:5:7");
    }

    #[test]
    fn quoted_runs_are_literal() {
        assert_eq!(format(fixed(), "'on' yyyy"), "on 2024");
        assert_eq!(format(fixed(), "'yyyy'"), "yyyy");
    }

    #[test]
    fn doubled_quote_is_a_literal_quote() {
        assert_eq!(format(fixed(), "'it''s' dd"), "it's 01");
    }

    #[test]
    fn percent_signs_survive() {
        assert_eq!(format(fixed(), "100% dd"), "100% 01");
    }
}
