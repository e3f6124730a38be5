mod download_tests;

use crate::crawlers::{CrawlRequest, PageFetcher};
use crate::error::{Result, SlurpError};
use crate::results::{FetchOutcome, FetchedPage, PageFailure};
use crate::{Settings, Slurper};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// One element a stubbed crawl yields
#[derive(Clone)]
pub(crate) enum StubPage {
    Page {
        url: &'static str,
        depth: usize,
        body: &'static str,
    },
    Failure {
        url: &'static str,
        depth: usize,
    },
}

pub(crate) fn page(url: &'static str, depth: usize, body: &'static str) -> StubPage {
    StubPage::Page { url, depth, body }
}

pub(crate) fn failure(url: &'static str, depth: usize) -> StubPage {
    StubPage::Failure { url, depth }
}

/// Fetcher serving fixed crawl results per start URL. Unknown start URLs
/// fail as unreachable. Sites marked as stalled never end their crawl.
#[derive(Default)]
pub(crate) struct StubFetcher {
    sites: HashMap<String, Vec<StubPage>>,
    stalled: HashSet<String>,
}

impl StubFetcher {
    pub(crate) fn with_site(mut self, start_url: &str, pages: Vec<StubPage>) -> Self {
        self.sites.insert(start_url.to_string(), pages);
        self
    }

    /// Keep the crawl of `start_url` open after its pages are sent
    pub(crate) fn stalled(mut self, start_url: &str) -> Self {
        self.stalled.insert(start_url.to_string());
        self
    }
}

impl PageFetcher for StubFetcher {
    async fn fetch(&self, request: &CrawlRequest) -> Result<mpsc::Receiver<FetchOutcome>> {
        let Some(pages) = self.sites.get(request.start_url.as_str()) else {
            return Err(SlurpError::fetch(
                request.start_url.as_str(),
                "connection refused",
            ));
        };

        let (tx, rx) = mpsc::channel(pages.len().max(1));
        for stub in pages {
            let outcome = match stub.clone() {
                StubPage::Page { url, depth, body } if depth <= request.depth => {
                    Ok(FetchedPage::new(url, depth, body))
                }
                StubPage::Failure { url, depth } if depth <= request.depth => Err(PageFailure {
                    url: url.to_string(),
                    depth,
                    error: SlurpError::HttpStatus {
                        url: url.to_string(),
                        status: 500,
                    },
                }),
                _ => continue,
            };
            tx.send(outcome).await.expect("receiver is alive");
        }
        if self.stalled.contains(request.start_url.as_str()) {
            tokio::spawn(async move { tx.closed().await });
        }
        Ok(rx)
    }
}

pub(crate) fn slurper(root: &Path, fetcher: StubFetcher) -> Slurper<StubFetcher> {
    Slurper::new(Settings::new(root)).with_fetcher(fetcher)
}

/// Every file under `dir`, sorted
pub(crate) fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}
