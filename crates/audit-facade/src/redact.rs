//! Redaction of headers and bodies before an event leaves the process.

use std::collections::{BTreeMap, HashSet};

use axum::http::HeaderMap;
use regex::Regex;

use crate::config::HttpAuditSettings;

pub const REDACTED: &str = "██REDACTED██";

#[derive(Debug, Clone)]
pub struct AuditRedactor {
    headers: HashSet<String>,
    fields: Vec<Regex>,
    max_body_bytes: usize,
}

impl AuditRedactor {
    pub fn new(settings: &HttpAuditSettings) -> Self {
        let headers = settings
            .redact_headers
            .iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        // Names are escaped before compiling.
        let fields = settings
            .redact_json_fields
            .iter()
            .filter(|f| !f.is_empty())
            .filter_map(|f| {
                Regex::new(&format!(
                    r#"("{}"\s*:\s*")(?:[^"\\]|\\.)*(")"#,
                    regex::escape(f)
                ))
                .ok()
            })
            .collect();
        Self {
            headers,
            fields,
            max_body_bytes: settings.max_body_bytes,
        }
    }

    /// First value of every header, sensitive ones masked. Non-UTF-8 values are skipped.
    pub fn redact_headers(&self, headers: &HeaderMap) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for name in headers.keys() {
            let key = name.as_str().to_string();
            if self.headers.contains(&key) {
                out.insert(key, REDACTED.to_string());
                continue;
            }
            if let Some(v) = headers.get(name).and_then(|v| v.to_str().ok()) {
                out.insert(key, v.to_string());
            }
        }
        out
    }

    /// Truncate to the byte budget, then mask configured JSON string fields.
    pub fn redact_body(&self, body: Option<&str>) -> Option<String> {
        let body = body?;
        let mut s = truncate(body, self.max_body_bytes).to_string();
        for re in &self.fields {
            s = re
                .replace_all(&s, format!("${{1}}{REDACTED}${{2}}").as_str())
                .into_owned();
        }
        Some(s)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use axum::http::HeaderValue;

    use super::*;

    fn redactor(max: usize) -> AuditRedactor {
        AuditRedactor::new(&HttpAuditSettings {
            max_body_bytes: max,
            ..Default::default()
        })
    }

    #[test]
    fn masks_sensitive_headers_case_insensitively() {
        let mut h = HeaderMap::new();
        h.insert("Authorization", HeaderValue::from_static("Bearer abc"));
        h.insert("X-Api-Key", HeaderValue::from_static("k"));
        h.insert("accept", HeaderValue::from_static("application/json"));
        let out = redactor(4096).redact_headers(&h);
        assert_eq!(out["authorization"], REDACTED);
        assert_eq!(out["x-api-key"], REDACTED);
        assert_eq!(out["accept"], "application/json");
    }

    #[test]
    fn keeps_first_header_value() {
        let mut h = HeaderMap::new();
        h.append("x-tag", HeaderValue::from_static("one"));
        h.append("x-tag", HeaderValue::from_static("two"));
        assert_eq!(redactor(4096).redact_headers(&h)["x-tag"], "one");
    }

    #[test]
    fn masks_json_fields_including_escaped_quotes() {
        let body = r#"{"user":"bob","password":"p\"w","nested":{"token" : "t1"}}"#;
        let out = redactor(4096).redact_body(Some(body)).unwrap();
        assert_eq!(
            out,
            format!(r#"{{"user":"bob","password":"{REDACTED}","nested":{{"token" : "{REDACTED}"}}}}"#)
        );
    }

    #[test]
    fn truncates_on_char_boundary() {
        // "é" is two bytes; a 2-byte budget must not split it.
        let out = redactor(2).redact_body(Some("aé")).unwrap();
        assert_eq!(out, "a");
    }

    #[test]
    fn absent_body_stays_absent() {
        assert!(redactor(16).redact_body(None).is_none());
    }
}
