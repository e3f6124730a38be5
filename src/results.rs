use crate::error::SlurpError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A page returned by the crawler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedPage {
    /// URL the page was served from (after redirects)
    pub url: String,

    /// Number of link hops from the start URL
    pub depth: usize,

    /// Raw body
    pub content: Vec<u8>,
}

impl FetchedPage {
    pub fn new(url: impl Into<String>, depth: usize, content: impl Into<Vec<u8>>) -> Self {
        Self {
            url: url.into(),
            depth,
            content: content.into(),
        }
    }
}

/// A page that could not be fetched or saved
#[derive(Debug)]
pub struct PageFailure {
    pub url: String,
    pub depth: usize,
    pub error: SlurpError,
}

/// One element of the sequence a crawl produces
pub type FetchOutcome = Result<FetchedPage, PageFailure>;

/// A page written to disk by the site downloader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPage {
    pub source_url: String,
    pub file_path: PathBuf,
    pub depth_at_discovery: usize,
}

/// Everything one download run produced
#[derive(Debug)]
pub struct SiteArchive {
    /// Start URL of the run
    pub start_url: String,

    /// Root directory pages were stored under
    pub root_dir: PathBuf,

    /// Directory holding this site's pages
    pub site_dir: PathBuf,

    /// Saved pages, in the order they arrived
    pub pages: Vec<SavedPage>,

    /// Pages that failed
    pub failures: Vec<PageFailure>,
}

impl SiteArchive {
    /// Saved pages ordered by discovery depth, then file path
    pub fn ordered_pages(&self) -> Vec<&SavedPage> {
        let mut pages: Vec<&SavedPage> = self.pages.iter().collect();
        pages.sort_by(|a, b| {
            a.depth_at_discovery
                .cmp(&b.depth_at_discovery)
                .then_with(|| a.file_path.cmp(&b.file_path))
        });
        pages
    }
}
