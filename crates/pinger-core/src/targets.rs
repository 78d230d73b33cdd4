//! Parsing of the comma-separated target and webhook lists.

use std::fmt;

use serde::{Serialize, Serializer};
use tracing::warn;
use url::Url;

/// A target URL that parsed as a well-formed absolute URL.
///
/// Keeps the string exactly as configured so logs and reports show what the
/// operator wrote rather than the normalized form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetUrl {
    raw: String,
    parsed: Url,
}

impl TargetUrl {
    pub fn parse(raw: &str) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(raw)?;
        Ok(Self {
            raw: raw.to_string(),
            parsed,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> &Url {
        &self.parsed
    }
}

impl fmt::Display for TargetUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for TargetUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

/// Splits a comma-separated list, trimming entries and dropping empty ones.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolves the configured target list into validated URLs, in configured order.
///
/// Malformed entries are logged and skipped. An empty result is not an error;
/// callers decide what to do when nothing is left to probe.
pub fn resolve_targets(raw: &str) -> Vec<TargetUrl> {
    split_list(raw)
        .into_iter()
        .filter_map(|entry| match TargetUrl::parse(&entry) {
            Ok(target) => Some(target),
            Err(e) => {
                warn!(url = %entry, error = %e, "Invalid URL skipped");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(targets: &[TargetUrl]) -> Vec<&str> {
        targets.iter().map(TargetUrl::as_str).collect()
    }

    #[test]
    fn split_trims_and_drops_empty_segments() {
        assert_eq!(
            split_list(" https://a.test , ,https://b.test,,"),
            vec!["https://a.test", "https://b.test"]
        );
    }

    #[test]
    fn split_empty_input() {
        assert!(split_list("").is_empty());
        assert!(split_list(" , ,").is_empty());
    }

    #[test]
    fn resolve_drops_malformed_and_keeps_order() {
        let targets = resolve_targets("https://a.test,not-a-url,https://b.test");
        assert_eq!(strings(&targets), vec!["https://a.test", "https://b.test"]);
    }

    #[test]
    fn resolve_all_invalid_is_empty() {
        assert!(resolve_targets("nope, also nope ,://broken").is_empty());
        assert!(resolve_targets("").is_empty());
    }

    #[test]
    fn resolve_keeps_duplicates_by_position() {
        let targets = resolve_targets("https://a.test,https://b.test,https://a.test");
        assert_eq!(
            strings(&targets),
            vec!["https://a.test", "https://b.test", "https://a.test"]
        );
    }

    #[test]
    fn target_display_is_raw_string() {
        let t = TargetUrl::parse("https://a.test").unwrap();
        assert_eq!(t.to_string(), "https://a.test");
        assert_eq!(t.url().as_str(), "https://a.test/");
    }
}
