use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

/// One captured request.
///
/// Records are immutable once built. The handler that read the body
/// creates the record and hands ownership to the history ingestion queue;
/// readers only ever see clones taken from a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub uri: String,
    pub payload_size: u64,
    /// Lowercase hex SHA-256 of exactly `payload_size` body bytes.
    pub payload_hash: String,
    /// Raw body as text when payload retention is on, empty otherwise.
    pub payload: String,
}

impl RequestRecord {
    /// Build a record stamped with the current wall-clock time.
    pub fn new(
        method: impl Into<String>,
        uri: impl Into<String>,
        payload_size: u64,
        payload_hash: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            method: method.into(),
            uri: uri.into(),
            payload_size,
            payload_hash: payload_hash.into(),
            payload: payload.into(),
        }
    }
}

/// Text layout used by the inspection endpoint:
///
/// ```text
/// <rfc3339> <method> <uri> <size> <hash>
/// \t<payload>
/// --
/// ```
///
/// The timestamp is always rendered in UTC (`Z` suffix), to whole seconds.
impl fmt::Display for RequestRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}\n\t{}\n--\n",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.method,
            self.uri,
            self.payload_size,
            self.payload_hash,
            self.payload,
        )
    }
}

/// Render a newest-first snapshot, one record per block.
///
/// Every block is followed by a blank line, matching line-oriented
/// printing of each record.
pub fn render_history(records: &[RequestRecord]) -> String {
    let mut output = String::new();
    for record in records {
        output.push_str(&record.to_string());
        output.push('\n');
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_record(payload: &str) -> RequestRecord {
        RequestRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap(),
            method: "POST".to_string(),
            uri: "/orders?id=7".to_string(),
            payload_size: 5,
            payload_hash: "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
                .to_string(),
            payload: payload.to_string(),
        }
    }

    #[test]
    fn test_display_layout() {
        let text = fixed_record("hello").to_string();
        assert_eq!(
            text,
            "2024-03-09T14:05:07Z POST /orders?id=7 5 \
             2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824\n\thello\n--\n"
        );
    }

    #[test]
    fn test_display_without_payload() {
        let text = fixed_record("").to_string();
        assert!(text.ends_with("\n\t\n--\n"));
    }

    #[test]
    fn test_render_history_keeps_order() {
        let first = fixed_record("first");
        let second = fixed_record("second");
        let rendered = render_history(&[first.clone(), second.clone()]);

        assert_eq!(rendered, format!("{}\n{}\n", first, second));
        assert!(rendered.find("first").unwrap() < rendered.find("second").unwrap());
    }

    #[test]
    fn test_render_empty_history() {
        assert_eq!(render_history(&[]), "");
    }
}
