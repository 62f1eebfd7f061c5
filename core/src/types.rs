//! Small value types carried by a request.
//!
//! # Design
//! Only the name and value of a cookie ever reach the wire when a client
//! attaches cookies to an outgoing request, so `Cookie` carries nothing
//! else. It derives serde so cookie jars can be loaded from JSON.
//!
//! Both parts are sanitized when rendered: names keep only token
//! characters, values drop `"`, `;`, `\` and anything outside printable
//! ASCII, and a value containing a space or comma is double-quoted. A
//! single `Cookie` therefore always renders as exactly one pair.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A request cookie, rendered as `name=value` in the `Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", sanitize_name(&self.name), sanitize_value(&self.value))
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

fn sanitize_name(name: &str) -> String {
    name.chars().filter(|&c| is_token_char(c)).collect()
}

fn sanitize_value(value: &str) -> String {
    let value: String = value
        .chars()
        .filter(|&c| (' '..'\x7f').contains(&c) && !matches!(c, '"' | ';' | '\\'))
        .collect();
    if value.contains([' ', ',']) {
        format!("\"{value}\"")
    } else {
        value
    }
}

/// Append `cookies` to an existing `Cookie` header value, `"; "`-separated.
pub(crate) fn join_cookies(existing: Option<&str>, cookies: &[Cookie]) -> String {
    let mut out = existing.unwrap_or_default().to_string();
    for cookie in cookies {
        if !out.is_empty() {
            out.push_str("; ");
        }
        out.push_str(&cookie.to_string());
    }
    out
}
