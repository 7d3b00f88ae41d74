// src/fetch/urls.rs

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::PathBuf;
use url::Url;

use crate::dates::DateToken;
use crate::error::ConfigError;

const PLACEHOLDER: &str = "{}";

static BRACE_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[^{}]*\}").expect("brace group regex should compile"));

/// Where a rendered source lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Http,
    File,
}

/// A URL pattern with exactly one `{}` slot for the date token.
/// Validated once when the configuration is loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlTemplate {
    pattern: String,
    prefix: String,
    suffix: String,
    kind: SourceKind,
}

impl UrlTemplate {
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidTemplate {
            pattern: pattern.to_string(),
            reason,
        };

        for m in BRACE_GROUP.find_iter(pattern) {
            if m.as_str() != PLACEHOLDER {
                return Err(invalid(format!(
                    "unsupported placeholder `{}`; use `{{}}`",
                    m.as_str()
                )));
            }
        }
        let slots = pattern.matches(PLACEHOLDER).count();
        if slots != 1 {
            return Err(invalid(format!(
                "expected exactly one `{{}}` placeholder, found {slots}"
            )));
        }
        let (prefix, suffix) = pattern
            .split_once(PLACEHOLDER)
            .ok_or_else(|| invalid("missing `{}` placeholder".into()))?;
        if prefix.contains(['{', '}']) || suffix.contains(['{', '}']) {
            return Err(invalid("unbalanced brace".into()));
        }

        let kind = source_kind(pattern).map_err(invalid)?;
        let template = Self {
            pattern: pattern.to_string(),
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            kind,
        };

        // a rendered sample must be addressable
        let sample = format!("{prefix}1970-01-01{suffix}");
        match kind {
            SourceKind::Http => {
                Url::parse(&sample).map_err(|e| invalid(format!("not a valid URL: {e}")))?;
            }
            SourceKind::File if sample.starts_with("file://") => {
                Url::parse(&sample)
                    .ok()
                    .and_then(|u| u.to_file_path().ok())
                    .ok_or_else(|| invalid("not a valid file URL".into()))?;
            }
            SourceKind::File => {}
        }

        Ok(template)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Substitute `token` into the slot.
    pub fn render(&self, token: &DateToken) -> SourceUrl {
        let text = format!("{}{}{}", self.prefix, token.as_str(), self.suffix);
        match self.kind {
            SourceKind::Http => SourceUrl::Http(text),
            SourceKind::File => {
                let path = if text.starts_with("file://") {
                    Url::parse(&text)
                        .ok()
                        .and_then(|u| u.to_file_path().ok())
                        .unwrap_or_else(|| PathBuf::from(&text))
                } else {
                    PathBuf::from(&text)
                };
                SourceUrl::File(path)
            }
        }
    }
}

fn source_kind(pattern: &str) -> Result<SourceKind, String> {
    let lower = pattern.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Ok(SourceKind::Http)
    } else if lower.starts_with("file://") {
        Ok(SourceKind::File)
    } else if let Some((scheme, _)) = pattern.split_once("://") {
        Err(format!("unsupported scheme `{scheme}`"))
    } else {
        Ok(SourceKind::File)
    }
}

/// One day's concrete source address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceUrl {
    Http(String),
    File(PathBuf),
}

impl fmt::Display for SourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceUrl::Http(u) => f.write_str(u),
            SourceUrl::File(p) => write!(f, "{}", p.display()),
        }
    }
}
