//! Well-known string formats.

use std::sync::OnceLock;

use regex::Regex;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, PrimitiveDateTime, Time};

use formweave_core::StringFormat;

static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
static URL: OnceLock<Option<Regex>> = OnceLock::new();
static UUID: OnceLock<Option<Regex>> = OnceLock::new();

fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

pub fn is_email(s: &str) -> bool {
    compiled(&EMAIL, r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").is_some_and(|re| re.is_match(s))
}

pub fn is_url(s: &str) -> bool {
    compiled(&URL, r"^https?://[^\s/$.?#][^\s]*$").is_some_and(|re| re.is_match(s))
}

/// Seven to fifteen digits once every non-digit is stripped.
pub fn is_phone(s: &str) -> bool {
    let digits = s.chars().filter(char::is_ascii_digit).count();
    (7..=15).contains(&digits)
}

pub fn is_uuid(s: &str) -> bool {
    compiled(
        &UUID,
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
    )
    .is_some_and(|re| re.is_match(s))
}

/// `YYYY-MM-DD`.
pub fn is_date(s: &str) -> bool {
    Date::parse(s, format_description!("[year]-[month]-[day]")).is_ok()
}

/// `HH:MM` or `HH:MM:SS`.
pub fn is_time(s: &str) -> bool {
    Time::parse(s, format_description!("[hour]:[minute]")).is_ok()
        || Time::parse(s, format_description!("[hour]:[minute]:[second]")).is_ok()
}

/// RFC 3339, or a local `YYYY-MM-DDTHH:MM[:SS]` as produced by browser inputs.
pub fn is_datetime(s: &str) -> bool {
    time::OffsetDateTime::parse(s, &Rfc3339).is_ok()
        || PrimitiveDateTime::parse(s, format_description!("[year]-[month]-[day]T[hour]:[minute]"))
            .is_ok()
        || PrimitiveDateTime::parse(
            s,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        )
        .is_ok()
}

pub fn matches_format(format: StringFormat, s: &str) -> bool {
    match format {
        StringFormat::Email => is_email(s),
        StringFormat::Url => is_url(s),
        StringFormat::Phone => is_phone(s),
        StringFormat::Uuid => is_uuid(s),
        StringFormat::Date => is_date(s),
        StringFormat::Time => is_time(s),
        StringFormat::DateTime => is_datetime(s),
    }
}

/// Catalog key of the message for a failed format check.
pub fn message_key(format: StringFormat) -> &'static str {
    match format {
        StringFormat::Email => "validation.invalid_email",
        StringFormat::Url => "validation.invalid_url",
        StringFormat::Phone => "validation.invalid_phone",
        StringFormat::Uuid => "validation.invalid_uuid",
        StringFormat::Date => "validation.invalid_date",
        StringFormat::Time => "validation.invalid_time",
        StringFormat::DateTime => "validation.invalid_datetime",
    }
}

/// Whether a MIME type or file name satisfies one `accept` entry
/// (`image/*`, `application/pdf`, `.pdf`).
pub fn accepts(pattern: &str, mime: Option<&str>, name: Option<&str>) -> bool {
    let pattern = pattern.trim().to_ascii_lowercase();
    if let Some(ext) = pattern.strip_prefix('.') {
        return name.is_some_and(|n| {
            n.to_ascii_lowercase()
                .rsplit_once('.')
                .is_some_and(|(_, e)| e == ext)
        });
    }
    let Some(mime) = mime.map(str::to_ascii_lowercase) else {
        return false;
    };
    match pattern.strip_suffix("/*") {
        Some(family) => mime.split('/').next() == Some(family),
        None => mime == pattern,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails() {
        assert!(is_email("ada@example.com"));
        assert!(!is_email("ada@example"));
        assert!(!is_email("not an email"));
    }

    #[test]
    fn phones_count_digits_only() {
        assert!(is_phone("+1 (555) 010-0199"));
        assert!(!is_phone("12345"));
        assert!(!is_phone("1234567890123456"));
    }

    #[test]
    fn urls_need_a_scheme() {
        assert!(is_url("https://example.com/a?b=c"));
        assert!(!is_url("example.com"));
        assert!(!is_url("ftp://example.com"));
    }

    #[test]
    fn dates_and_times() {
        assert!(is_date("2024-02-29"));
        assert!(!is_date("2023-02-29"));
        assert!(is_time("23:59"));
        assert!(!is_time("24:00"));
        assert!(is_datetime("2024-01-01T10:00:00Z"));
        assert!(is_datetime("2024-01-01T10:00"));
        assert!(!is_datetime("2024-01-01"));
    }

    #[test]
    fn accept_patterns() {
        assert!(accepts("image/*", Some("image/png"), None));
        assert!(accepts(".PDF", None, Some("report.pdf")));
        assert!(accepts("application/pdf", Some("application/pdf"), None));
        assert!(!accepts("image/*", Some("text/plain"), Some("a.txt")));
    }
}
