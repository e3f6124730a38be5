use crate::config::CrawlOptions;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Links to assets are never followed
const ASSET_PATTERN: &str =
    r"(?i)\.(jpg|jpeg|png|gif|webp|css|js|ico|woff|woff2|ttf|eot|svg|pdf|zip|gz|mp3|mp4)$";

/// Caller-supplied predicate deciding whether a discovered URL is followed
#[derive(Clone)]
pub struct UrlPredicate(Arc<dyn Fn(&Url) -> bool + Send + Sync>);

impl UrlPredicate {
    pub fn new(predicate: impl Fn(&Url) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    pub fn accepts(&self, url: &Url) -> bool {
        (self.0)(url)
    }
}

impl fmt::Debug for UrlPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UrlPredicate(..)")
    }
}

/// URL filter that uses regex patterns and scope rules to determine which URLs to crawl
#[derive(Debug)]
pub struct UrlFilter {
    /// Host of the start URL (None when external links are allowed)
    required_host: Option<String>,
    /// Path prefix restriction
    required_path_prefix: Option<String>,
    include_regexes: Vec<Regex>,
    exclude_regexes: Vec<Regex>,
    predicate: Option<UrlPredicate>,
}

impl UrlFilter {
    /// Build the filter for a crawl starting at `start_url`
    pub fn new(
        start_url: &Url,
        options: &CrawlOptions,
        predicate: Option<UrlPredicate>,
    ) -> Result<Self, regex::Error> {
        let include_regexes = compile(&options.include_patterns)?;

        let mut exclude_regexes = vec![Regex::new(ASSET_PATTERN)?];
        exclude_regexes.extend(compile(&options.exclude_patterns)?);

        let required_host = if options.allow_external {
            None
        } else {
            start_url.host_str().map(str::to_string)
        };
        let required_path_prefix = if options.stay_under_start_path {
            Some(directory_of(start_url.path()).to_string())
        } else {
            None
        };

        Ok(Self {
            required_host,
            required_path_prefix,
            include_regexes,
            exclude_regexes,
            predicate,
        })
    }

    /// Determine if a URL should be crawled based on all filtering rules
    pub fn should_crawl(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }

        if !self.is_in_domain_scope(url) || !self.is_in_path_scope(url) {
            return false;
        }

        // Exclusions take precedence over inclusions
        let url_str = url.as_str();
        if self.exclude_regexes.iter().any(|re| re.is_match(url_str)) {
            return false;
        }

        if !self.include_regexes.is_empty()
            && !self.include_regexes.iter().any(|re| re.is_match(url_str))
        {
            return false;
        }

        self.predicate
            .as_ref()
            .is_none_or(|predicate| predicate.accepts(url))
    }

    /// Same host as the start URL, or one of its subdomains
    fn is_in_domain_scope(&self, url: &Url) -> bool {
        let Some(required) = &self.required_host else {
            return true;
        };
        match url.host_str() {
            Some(host) => {
                host == required
                    || host
                        .strip_suffix(required.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            }
            None => false,
        }
    }

    fn is_in_path_scope(&self, url: &Url) -> bool {
        match &self.required_path_prefix {
            Some(prefix) => url.path().starts_with(prefix.as_str()),
            None => true,
        }
    }

    /// Create a normalized version of the URL (fragment removed)
    pub fn normalize_url(&self, url: &Url) -> Url {
        let mut normalized = url.clone();
        normalized.set_fragment(None);
        normalized
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>, regex::Error> {
    patterns.iter().map(|pattern| Regex::new(pattern)).collect()
}

/// `/docs/intro` -> `/docs/`, `/docs/` -> `/docs/`
fn directory_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..=idx],
        None => "/",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn filter_with(options: CrawlOptions, predicate: Option<UrlPredicate>) -> UrlFilter {
        UrlFilter::new(&url("https://example.com/docs/intro"), &options, predicate).unwrap()
    }

    #[test]
    fn test_default_filter() {
        let filter = filter_with(CrawlOptions::default(), None);

        // Same host is allowed, subdomains too
        assert!(filter.should_crawl(&url("https://example.com/blog/post")));
        assert!(filter.should_crawl(&url("https://docs.example.com/page")));

        // Other hosts and look-alikes are rejected
        assert!(!filter.should_crawl(&url("https://other.com/page")));
        assert!(!filter.should_crawl(&url("https://notexample.com/page")));

        // Assets are never followed
        assert!(!filter.should_crawl(&url("https://example.com/logo.PNG")));
        assert!(!filter.should_crawl(&url("https://example.com/app.js")));

        // Non-web schemes are rejected
        assert!(!filter.should_crawl(&url("mailto:someone@example.com")));
    }

    #[test]
    fn test_allow_external() {
        let options = CrawlOptions {
            allow_external: true,
            ..CrawlOptions::default()
        };
        let filter = filter_with(options, None);
        assert!(filter.should_crawl(&url("https://other.com/page")));
    }

    #[test]
    fn test_path_restriction() {
        let options = CrawlOptions {
            stay_under_start_path: true,
            ..CrawlOptions::default()
        };
        let filter = filter_with(options, None);

        assert!(filter.should_crawl(&url("https://example.com/docs/page")));
        assert!(!filter.should_crawl(&url("https://example.com/blog/post")));
    }

    #[test]
    fn test_regex_patterns() {
        let options = CrawlOptions {
            include_patterns: vec![r"/docs/.*\.html$".to_string()],
            exclude_patterns: vec![r"/docs/draft/".to_string()],
            ..CrawlOptions::default()
        };
        let filter = filter_with(options, None);

        // Matching include pattern should be allowed
        assert!(filter.should_crawl(&url("https://example.com/docs/page.html")));

        // Non-matching include pattern should be excluded
        assert!(!filter.should_crawl(&url("https://example.com/docs/page.txt")));

        // Matching exclude pattern should be excluded even if it matches include
        assert!(!filter.should_crawl(&url("https://example.com/docs/draft/page.html")));
    }

    #[test]
    fn test_invalid_regex() {
        let options = CrawlOptions {
            exclude_patterns: vec!["(".to_string()],
            ..CrawlOptions::default()
        };
        assert!(UrlFilter::new(&url("https://example.com/"), &options, None).is_err());
    }

    #[test]
    fn test_predicate_is_applied_last() {
        let predicate = UrlPredicate::new(|u: &Url| !u.path().contains("skip"));
        let filter = filter_with(CrawlOptions::default(), Some(predicate));

        assert!(filter.should_crawl(&url("https://example.com/keep")));
        assert!(!filter.should_crawl(&url("https://example.com/skip-me")));
        assert!(!filter.should_crawl(&url("https://other.com/keep")));
    }

    #[test]
    fn test_normalize_url() {
        let filter = filter_with(CrawlOptions::default(), None);
        let normalized = filter.normalize_url(&url("https://example.com/page#section"));
        assert_eq!(normalized.as_str(), "https://example.com/page");
    }
}
