use crate::config::{CrawlOptions, Engine};
use crate::crawlers::loader::{HttpLoader, WebDriverLoader};
use crate::crawlers::web;
use crate::error::Result;
use crate::filter::UrlPredicate;
use crate::results::FetchOutcome;
use std::future::Future;
use tokio::sync::mpsc;
use url::Url;

/// What a crawl is asked to do
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    /// URL to start crawling from
    pub start_url: Url,

    /// Maximum number of link hops followed from the start URL
    pub depth: usize,

    /// Extra predicate a discovered link must satisfy to be followed
    pub filter: Option<UrlPredicate>,

    /// Crawler options
    pub options: CrawlOptions,
}

/// A crawling engine.
///
/// `fetch` yields the start page and every page reachable within
/// `request.depth` hops as a finite sequence of outcomes. The sequence ends
/// when the returned receiver yields `None`; it cannot be restarted.
pub trait PageFetcher: Send + Sync {
    fn fetch(
        &self,
        request: &CrawlRequest,
    ) -> impl Future<Output = Result<mpsc::Receiver<FetchOutcome>>> + Send;
}

/// The default fetcher, loading pages with the engine named in the request
#[derive(Debug, Default, Clone, Copy)]
pub struct WebCrawler;

impl PageFetcher for WebCrawler {
    async fn fetch(&self, request: &CrawlRequest) -> Result<mpsc::Receiver<FetchOutcome>> {
        match request.options.engine {
            Engine::Http => web::start(request, HttpLoader::new(&request.options)?),
            Engine::WebDriver => {
                ::log::info!(
                    "Loading pages through the WebDriver server at {}",
                    request.options.webdriver_url
                );
                web::start(request, WebDriverLoader::new(&request.options.webdriver_url))
            }
        }
    }
}
