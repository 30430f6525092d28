//! Business action resolution for incoming requests.
//!
//! Priority: Content-Type vendor token > first Accept vendor token >
//! explicit action header > computed `METHOD path`.

use std::sync::OnceLock;

use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderMap, Method};
use regex::Regex;

/// Action resolved for one request, with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAction {
    pub name: String,
    /// Taken from a `vnd.` media type (Content-Type or Accept).
    pub vendor_supplied: bool,
    /// Taken from the explicit action header.
    pub header_supplied: bool,
}

fn vendor_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bvnd\.([^+;,\s]+)").ok())
        .as_ref()
}

/// Vendor token of a single media type, lower-cased.
///
/// `application/vnd.sjp.delete-financial-means+json` -> `sjp.delete-financial-means`
pub fn extract_vendor_action(media_type: &str) -> Option<String> {
    vendor_re()?
        .captures(media_type)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
}

/// First vendor token of a comma-separated media type list (e.g. `Accept`).
pub fn extract_first_vendor_from_header_list(header: &str) -> Option<String> {
    header.split(',').find_map(extract_vendor_action)
}

pub fn resolve(
    method: &Method,
    headers: &HeaderMap,
    action_header: Option<&str>,
    path: &str,
) -> ResolvedAction {
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    if let Some(name) = content_type.and_then(extract_vendor_action) {
        return ResolvedAction {
            name,
            vendor_supplied: true,
            header_supplied: false,
        };
    }

    let accept = headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(extract_first_vendor_from_header_list);
    if let Some(name) = accept {
        return ResolvedAction {
            name,
            vendor_supplied: true,
            header_supplied: false,
        };
    }

    let explicit = action_header
        .and_then(|h| headers.get(h))
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if let Some(name) = explicit {
        return ResolvedAction {
            name: name.to_string(),
            vendor_supplied: false,
            header_supplied: true,
        };
    }

    ResolvedAction {
        name: format!("{} {}", method.as_str(), path),
        vendor_supplied: false,
        header_supplied: false,
    }
}
