//! Source credibility filter
//!
//! Classifies candidate URLs by host against deny/allow domain patterns.
//! Built once from configuration and shared read-only across every
//! concurrent evaluation.
//!
//! Pattern syntax:
//! - `example.com` matches that host exactly
//! - `*.example.com` (or `.example.com`) matches the domain and any subdomain
//!
//! A leading `www.` is ignored on hosts and on exact patterns alike, so
//! `www.example.com` and `example.com` name the same site.

use factcheck_common::config::FilterConfig;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
enum DomainPattern {
    Exact(String),
    Suffix(String),
}

impl DomainPattern {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().trim_end_matches('.').to_ascii_lowercase();
        if let Some(rest) = raw.strip_prefix("*.").or_else(|| raw.strip_prefix('.')) {
            return (!rest.is_empty()).then(|| DomainPattern::Suffix(rest.to_string()));
        }
        let raw = raw.strip_prefix("www.").map(str::to_string).unwrap_or(raw);
        (!raw.is_empty()).then_some(DomainPattern::Exact(raw))
    }

    fn matches(&self, host: &str) -> bool {
        match self {
            DomainPattern::Exact(domain) => host == domain,
            DomainPattern::Suffix(domain) => {
                host == domain
                    || (host.len() > domain.len()
                        && host.ends_with(domain.as_str())
                        && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
            }
        }
    }
}

/// Filter verdict for one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceClass {
    /// Not a parseable http(s) URL with a host
    Invalid,
    /// Host is on the deny list, or off the allow list in allow-only mode
    Denied,
    /// Host is on the allow list
    Trusted,
    /// Accepted without a credibility signal either way
    Neutral,
}

impl SourceClass {
    pub fn is_accepted(self) -> bool {
        matches!(self, SourceClass::Trusted | SourceClass::Neutral)
    }
}

/// Domain-based source filter
#[derive(Debug, Clone, Default)]
pub struct SourceFilter {
    deny: Vec<DomainPattern>,
    allow: Vec<DomainPattern>,
    allow_only: bool,
}

impl SourceFilter {
    pub fn new<D, A>(deny: D, allow: A, allow_only: bool) -> Self
    where
        D: IntoIterator,
        D::Item: AsRef<str>,
        A: IntoIterator,
        A::Item: AsRef<str>,
    {
        Self {
            deny: deny.into_iter().filter_map(|p| DomainPattern::parse(p.as_ref())).collect(),
            allow: allow.into_iter().filter_map(|p| DomainPattern::parse(p.as_ref())).collect(),
            allow_only,
        }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(&config.deny, &config.allow, config.allow_only)
    }

    /// Classify a candidate URL. Never panics; malformed input is `Invalid`.
    pub fn classify(&self, candidate_url: &str) -> SourceClass {
        let Some(host) = host_of(candidate_url) else {
            return SourceClass::Invalid;
        };

        if self.deny.iter().any(|p| p.matches(&host)) {
            return SourceClass::Denied;
        }

        if self.allow.iter().any(|p| p.matches(&host)) {
            SourceClass::Trusted
        } else if self.allow_only {
            SourceClass::Denied
        } else {
            SourceClass::Neutral
        }
    }

    pub fn accept(&self, candidate_url: &str) -> bool {
        self.classify(candidate_url).is_accepted()
    }
}

/// Lower-cased host of an http(s) URL, without a leading `www.` or
/// trailing dot
fn host_of(candidate_url: &str) -> Option<String> {
    let url = Url::parse(candidate_url.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.trim_end_matches('.').to_ascii_lowercase();
    let host = host.strip_prefix("www.").map(str::to_string).unwrap_or(host);
    (!host.is_empty()).then_some(host)
}

/// Canonical form used to detect duplicate candidates across queries.
///
/// Drops the fragment, `www.`, default ports, trailing slashes and
/// `utm_*` tracking parameters. Unparseable input falls back to its
/// trimmed lower-cased text.
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw.trim()) else {
        return raw.trim().to_ascii_lowercase();
    };

    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !k.starts_with("utm_"))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    let host = url
        .host_str()
        .map(|h| h.trim_start_matches("www.").to_ascii_lowercase())
        .unwrap_or_default();
    let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
    let path = url.path().trim_end_matches('/');
    let query = url.query().map(|q| format!("?{q}")).unwrap_or_default();

    format!("{}://{}{}{}{}", url.scheme(), host, port, path, query)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> SourceFilter {
        SourceFilter::new(
            ["*.blogspot.com", "rumors.example"],
            ["*.gov", "britannica.com"],
            false,
        )
    }

    #[test]
    fn test_denied_suffix_and_exact() {
        let f = filter();
        assert_eq!(f.classify("https://someone.blogspot.com/post/1"), SourceClass::Denied);
        assert_eq!(f.classify("https://blogspot.com/"), SourceClass::Denied);
        assert_eq!(f.classify("http://rumors.example/eiffel"), SourceClass::Denied);
        assert!(!f.accept("https://www.rumors.example/x"));
    }

    #[test]
    fn test_exact_pattern_does_not_match_subdomain() {
        let f = filter();
        assert!(f.accept("https://news.rumors.example/x"));
    }

    #[test]
    fn test_www_exact_pattern_matches_site() {
        let f = SourceFilter::new(["www.rumors.example"], ["WWW.Britannica.com"], false);
        assert_eq!(f.classify("https://www.rumors.example/x"), SourceClass::Denied);
        assert_eq!(f.classify("https://rumors.example/x"), SourceClass::Denied);
        assert_eq!(f.classify("https://www.britannica.com/a"), SourceClass::Trusted);
        assert_eq!(f.classify("https://news.rumors.example/x"), SourceClass::Neutral);
    }

    #[test]
    fn test_suffix_requires_label_boundary() {
        let f = filter();
        assert!(f.accept("https://notblogspot.com/x"));
    }

    #[test]
    fn test_allow_list_marks_trusted() {
        let f = filter();
        assert_eq!(f.classify("https://www.nasa.gov/eiffel"), SourceClass::Trusted);
        assert_eq!(f.classify("https://www.britannica.com/topic/Eiffel-Tower"), SourceClass::Trusted);
        assert_eq!(f.classify("https://en.wikipedia.org/wiki/Eiffel_Tower"), SourceClass::Neutral);
    }

    #[test]
    fn test_allow_only_rejects_unlisted() {
        let f = SourceFilter::new(Vec::<String>::new(), ["britannica.com"], true);
        assert!(f.accept("https://britannica.com/a"));
        assert!(!f.accept("https://en.wikipedia.org/wiki/Paris"));
    }

    #[test]
    fn test_malformed_urls_are_rejected() {
        let f = filter();
        for bad in ["", "not a url", "ftp://files.example.org/a", "mailto:x@y.z", "https://"] {
            assert_eq!(f.classify(bad), SourceClass::Invalid, "{bad}");
            assert!(!f.accept(bad));
        }
    }

    #[test]
    fn test_deny_wins_over_allow() {
        let f = SourceFilter::new(["spam.gov"], ["*.gov"], false);
        assert!(!f.accept("https://spam.gov/a"));
        assert!(f.accept("https://nasa.gov/a"));
    }

    #[test]
    fn test_normalize_url_collapses_variants() {
        let a = normalize_url("https://www.Example.org/page/?utm_source=x#top");
        let b = normalize_url("https://example.org/page");
        assert_eq!(a, b);

        let c = normalize_url("https://example.org/page?id=2&utm_medium=y");
        assert_eq!(c, "https://example.org/page?id=2");
        assert_eq!(normalize_url("  Not A Url "), "not a url");
    }
}
