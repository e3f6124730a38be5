use crate::error::{Result, SlurpError};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Page loading backend used by the crawler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Plain HTTP requests
    #[default]
    Http,
    /// A WebDriver session (renders scripts before reading the page source)
    WebDriver,
}

/// Options recognized by the crawler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlOptions {
    /// Maximum number of concurrent requests
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Maximum number of sites downloaded at once by multi-site runs
    #[serde(default = "default_max_parallel_sites")]
    pub max_parallel_sites: usize,

    /// Whether to allow crawling external domains/sites
    #[serde(default)]
    pub allow_external: bool,

    /// Only follow links below the path of the start URL
    #[serde(default)]
    pub stay_under_start_path: bool,

    /// Regex patterns for URLs to include
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Regex patterns for URLs to exclude
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Page loading backend
    #[serde(default)]
    pub engine: Engine,

    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Timeout for a single page load
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout for a whole crawl
    #[serde(default)]
    pub total_timeout_secs: Option<u64>,

    /// User-Agent header sent by the HTTP engine
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Options for engines that are not modelled above. The HTTP engine reads
    /// `headers` (an object of header name to value).
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            max_parallel_sites: default_max_parallel_sites(),
            allow_external: false,
            stay_under_start_path: false,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            engine: Engine::default(),
            webdriver_url: default_webdriver_url(),
            request_timeout_secs: default_request_timeout_secs(),
            total_timeout_secs: None,
            user_agent: default_user_agent(),
            extra: BTreeMap::new(),
        }
    }
}

/// Process-wide settings, resolved once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Root directory downloaded pages are stored under
    #[serde(default = "paths::default_rootdir")]
    pub root_dir: PathBuf,

    /// Default crawler options
    #[serde(default)]
    pub crawl: CrawlOptions,
}

impl Settings {
    /// Create settings with an explicit root directory
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            crawl: CrawlOptions::default(),
        }
    }

    /// Resolve settings from the environment (`SITE_SLURP_ROOTDIR`,
    /// `WEBDRIVER_URL`)
    pub fn from_env() -> Self {
        let mut settings = Self::new(paths::default_rootdir());
        settings.apply_env();
        settings
    }

    /// Load settings from a JSON file, then apply the environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path.as_ref())?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let mut settings = Self::from_json(&contents)?;
        settings.apply_env();
        Ok(settings)
    }

    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SlurpError::Config(e.to_string()))
    }

    fn apply_env(&mut self) {
        // Override the WebDriver URL with an environment variable if provided
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                self.crawl.webdriver_url = webdriver_url;
            }
        }
    }
}

/// Default value for max_concurrency
fn default_max_concurrency() -> usize {
    5
}

fn default_max_parallel_sites() -> usize {
    4
}

/// Default value for webdriver_url
fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("site-slurp/", env!("CARGO_PKG_VERSION")).to_string()
}
