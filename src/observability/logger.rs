//! Structured JSON logger
//!
//! Every log line is a single JSON object with the event name first,
//! then the severity, then the remaining fields sorted by key. Lines are
//! written synchronously so log order matches event order.

use std::fmt;
use std::io::{self, Write};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Diagnostic detail
    Debug = 0,
    /// Normal operations
    Info = 1,
    /// Recoverable issues
    Warn = 2,
    /// Operation failures
    Error = 3,
}

impl Severity {
    /// String representation used in log output
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Maximum length of a logged payload excerpt
const MAX_PAYLOAD_CHARS: usize = 256;

/// Truncate a payload for logging, keeping enough context to reproduce
pub fn excerpt(payload: &str) -> String {
    if payload.chars().count() <= MAX_PAYLOAD_CHARS {
        payload.to_string()
    } else {
        let head: String = payload.chars().take(MAX_PAYLOAD_CHARS).collect();
        format!("{}...", head)
    }
}

/// Synchronous structured logger
pub struct Logger;

impl Logger {
    /// Log an event; fields are emitted in deterministic (sorted) order
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if severity >= Severity::Error {
            Self::write_line(severity, event, fields, &mut io::stderr());
        } else {
            Self::write_line(severity, event, fields, &mut io::stdout());
        }
    }

    /// Log at INFO level
    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    /// Log at WARN level
    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    /// Log at ERROR level
    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }

    fn write_line<W: Write>(
        severity: Severity,
        event: &str,
        fields: &[(&str, &str)],
        writer: &mut W,
    ) {
        let mut line = String::with_capacity(128);
        line.push('{');
        line.push_str("\"event\":");
        line.push_str(&json_string(event));
        line.push_str(",\"severity\":\"");
        line.push_str(severity.as_str());
        line.push('"');

        let mut sorted: Vec<&(&str, &str)> = fields.iter().collect();
        sorted.sort_by_key(|(k, _)| *k);
        for (key, value) in sorted {
            line.push(',');
            line.push_str(&json_string(key));
            line.push(':');
            line.push_str(&json_string(value));
        }

        line.push('}');
        line.push('\n');

        // One write call per line so concurrent writers do not interleave
        let _ = writer.write_all(line.as_bytes());
        let _ = writer.flush();
    }
}

/// Render a string as a JSON string literal
fn json_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let mut buffer = Vec::new();
        Logger::write_line(severity, event, fields, &mut buffer);
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_line_is_valid_json() {
        let line = render(Severity::Info, "query_received", &[("user", "alice")]);
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["event"], "query_received");
        assert_eq!(parsed["severity"], "INFO");
        assert_eq!(parsed["user"], "alice");
    }

    #[test]
    fn test_fields_sorted() {
        let line = render(Severity::Warn, "e", &[("zeta", "1"), ("alpha", "2")]);
        let alpha = line.find("alpha").unwrap();
        let zeta = line.find("zeta").unwrap();
        assert!(alpha < zeta);
    }

    #[test]
    fn test_escaping() {
        let line = render(Severity::Info, "e", &[("payload", "a\"b\nc")]);
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["payload"], "a\"b\nc");
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "x".repeat(1000);
        let short = excerpt(&long);
        assert!(short.chars().count() <= MAX_PAYLOAD_CHARS + 3);
        assert!(short.ends_with("..."));
        assert_eq!(excerpt("small"), "small");
    }
}
