//! Crawl websites into local files and turn them into Markdown.
//!
//! ```no_run
//! use site_slurp::{MarkdownOptions, MarkdownOutput, Settings, Slurper};
//!
//! # async fn run() -> site_slurp::Result<()> {
//! let slurper = Slurper::new(Settings::from_env());
//! if let MarkdownOutput::Text(markdown) = slurper
//!     .markdown_of_site("https://example.com/docs/", &MarkdownOptions::default())
//!     .await?
//! {
//!     println!("{markdown}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crawlers;
pub mod download;
pub mod error;
pub mod filter;
pub mod markdown;
pub mod parsers;
pub mod paths;
pub mod results;

#[cfg(test)]
mod tests;

pub use config::{CrawlOptions, Engine, Settings};
pub use crawlers::{CrawlRequest, PageFetcher, WebCrawler};
pub use download::{DownloadOptions, DownloadRequest, UrlToPath};
pub use error::{Result, SlurpError};
pub use filter::UrlPredicate;
pub use markdown::{Html2Md, MarkdownConverter, MarkdownOptions, MarkdownOutput};
pub use results::{FetchOutcome, FetchedPage, PageFailure, SavedPage, SiteArchive};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Entry point tying settings, a crawling engine and a Markdown converter
/// together
#[derive(Debug, Clone)]
pub struct Slurper<F = WebCrawler, C = Html2Md> {
    settings: Settings,
    fetcher: F,
    converter: C,
}

impl Slurper {
    /// A slurper using the web crawler and `html2md`
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            fetcher: WebCrawler,
            converter: Html2Md,
        }
    }
}

impl<F: PageFetcher, C: MarkdownConverter> Slurper<F, C> {
    /// Replace the crawling engine
    pub fn with_fetcher<G: PageFetcher>(self, fetcher: G) -> Slurper<G, C> {
        Slurper {
            settings: self.settings,
            fetcher,
            converter: self.converter,
        }
    }

    /// Replace the Markdown converter
    pub fn with_converter<D: MarkdownConverter>(self, converter: D) -> Slurper<F, D> {
        Slurper {
            settings: self.settings,
            fetcher: self.fetcher,
            converter,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Download a site; returns the directory its pages were saved under
    pub async fn download_site(&self, url: &str, options: &DownloadOptions) -> Result<PathBuf> {
        download::download_site(&self.fetcher, &self.settings, url, options).await
    }

    /// Download a site; returns every saved page and failure
    pub async fn download_site_archive(
        &self,
        url: &str,
        options: &DownloadOptions,
    ) -> Result<SiteArchive> {
        let request = DownloadRequest::new(url, options, &self.settings)?;
        download::download_site_archive(&self.fetcher, &request).await
    }

    /// Download several sites; each URL maps to its directory or its error
    pub async fn scrape_multiple_sites(
        &self,
        urls: &[String],
        options: &DownloadOptions,
    ) -> BTreeMap<String, Result<PathBuf>> {
        download::scrape_multiple_sites(&self.fetcher, &self.settings, urls, options).await
    }

    /// Download a site and convert it to one Markdown document
    pub async fn markdown_of_site(
        &self,
        url: &str,
        options: &MarkdownOptions,
    ) -> Result<MarkdownOutput> {
        markdown::markdown_of_site(&self.fetcher, &self.converter, &self.settings, url, options)
            .await
    }

    /// Write the Markdown of each `(name, url)` to `<save_dir>/<name>.md`
    pub async fn markdown_of_multiple_sites(
        &self,
        named_urls: &[(String, String)],
        save_dir: &Path,
        options: &MarkdownOptions,
    ) -> Result<BTreeMap<String, Result<PathBuf>>> {
        markdown::markdown_of_multiple_sites(
            &self.fetcher,
            &self.converter,
            &self.settings,
            named_urls,
            save_dir,
            options,
        )
        .await
    }

    /// Convert an existing directory of saved pages
    pub fn markdown_of_directory(&self, dir: &Path) -> Result<String> {
        markdown::markdown_of_directory(&self.converter, dir)
    }
}
