//! Downloading sites to local files.

use crate::config::{CrawlOptions, Settings};
use crate::crawlers::{CrawlRequest, PageFetcher};
use crate::error::{Result, SlurpError};
use crate::filter::UrlPredicate;
use crate::paths;
use crate::results::{FetchedPage, PageFailure, SavedPage, SiteArchive};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// Caller-supplied mapping of a page URL to the file it is saved to
#[derive(Clone)]
pub struct UrlToPath(Arc<dyn Fn(&Url, &Path) -> PathBuf + Send + Sync>);

impl UrlToPath {
    pub fn new(mapping: impl Fn(&Url, &Path) -> PathBuf + Send + Sync + 'static) -> Self {
        Self(Arc::new(mapping))
    }

    pub fn resolve(&self, url: &Url, root_dir: &Path) -> PathBuf {
        (self.0)(url, root_dir)
    }
}

impl fmt::Debug for UrlToPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UrlToPath(..)")
    }
}

/// Options of a site download
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Maximum number of link hops followed from the start URL
    pub depth: usize,

    /// File path mapping (defaults to [`paths::url_to_filepath`])
    pub url_to_filepath: Option<UrlToPath>,

    /// Extra predicate a link must satisfy to be followed
    pub filter: Option<UrlPredicate>,

    /// Create directories that do not exist yet
    pub mk_missing_dirs: bool,

    /// Root directory (defaults to the settings' root directory)
    pub rootdir: Option<PathBuf>,

    /// Crawler options (defaults to the settings' crawler options)
    pub crawl: Option<CrawlOptions>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            depth: 1,
            url_to_filepath: None,
            filter: None,
            mk_missing_dirs: true,
            rootdir: None,
            crawl: None,
        }
    }
}

impl DownloadOptions {
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_rootdir(mut self, rootdir: impl Into<PathBuf>) -> Self {
        self.rootdir = Some(rootdir.into());
        self
    }

    pub fn with_filter(mut self, filter: UrlPredicate) -> Self {
        self.filter = Some(filter);
        self
    }

    /// The crawler options in effect under `settings`
    pub fn crawl_options<'a>(&'a self, settings: &'a Settings) -> &'a CrawlOptions {
        self.crawl.as_ref().unwrap_or(&settings.crawl)
    }
}

/// A validated download, fixed once built
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub crawl: CrawlRequest,
    pub root_dir: PathBuf,
    pub url_to_filepath: Option<UrlToPath>,
    pub mk_missing_dirs: bool,
}

impl DownloadRequest {
    pub fn new(start_url: &str, options: &DownloadOptions, settings: &Settings) -> Result<Self> {
        Ok(Self {
            crawl: CrawlRequest {
                start_url: parse_start_url(start_url)?,
                depth: options.depth,
                filter: options.filter.clone(),
                options: options.crawl_options(settings).clone(),
            },
            root_dir: options
                .rootdir
                .clone()
                .unwrap_or_else(|| settings.root_dir.clone()),
            url_to_filepath: options.url_to_filepath.clone(),
            mk_missing_dirs: options.mk_missing_dirs,
        })
    }

    /// Where the page at `url` is saved
    pub fn filepath_for(&self, url: &Url) -> PathBuf {
        match &self.url_to_filepath {
            Some(mapping) => mapping.resolve(url, &self.root_dir),
            None => paths::url_to_filepath(url, &self.root_dir),
        }
    }

    /// Directory reported for `pages`.
    ///
    /// Under the default mapping this is the site directory the pages were
    /// saved in, which follows redirects (`http` to `https`, another host).
    /// The root directory is returned under a custom mapping or when the
    /// pages span several site directories.
    pub fn site_dir(&self, pages: &[SavedPage]) -> PathBuf {
        if self.url_to_filepath.is_some() {
            return self.root_dir.clone();
        }

        let mut dirs = pages
            .iter()
            .filter_map(|page| Url::parse(&page.source_url).ok())
            .map(|url| paths::site_directory(&url, &self.root_dir))
            .collect::<BTreeSet<_>>()
            .into_iter();
        match (dirs.next(), dirs.next()) {
            (Some(dir), None) => dir,
            (Some(_), Some(_)) => self.root_dir.clone(),
            (None, _) => paths::site_directory(&self.crawl.start_url, &self.root_dir),
        }
    }
}

/// Parse a start URL, accepting only http(s)
pub fn parse_start_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| SlurpError::InvalidArgument(format!("invalid URL {url:?}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed),
        _ => Err(SlurpError::InvalidArgument(format!(
            "URL {url:?} is not an http(s) URL"
        ))),
    }
}

/// Check a depth given as a signed number
pub fn validate_depth(depth: i64) -> Result<usize> {
    usize::try_from(depth)
        .map_err(|_| SlurpError::InvalidArgument(format!("depth must be >= 0, got {depth}")))
}

/// Download a site and return the directory its pages were saved under
pub async fn download_site<F: PageFetcher>(
    fetcher: &F,
    settings: &Settings,
    start_url: &str,
    options: &DownloadOptions,
) -> Result<PathBuf> {
    let request = DownloadRequest::new(start_url, options, settings)?;
    download_site_archive(fetcher, &request)
        .await
        .map(|archive| archive.site_dir)
}

/// Download a site and return what was saved.
///
/// Pages that fail to load or save are logged and collected in
/// [`SiteArchive::failures`]. The run only fails when nothing was saved and
/// some page failed; the error of the shallowest failed page is returned.
pub async fn download_site_archive<F: PageFetcher>(
    fetcher: &F,
    request: &DownloadRequest,
) -> Result<SiteArchive> {
    if !request.mk_missing_dirs && !request.root_dir.is_dir() {
        return Err(SlurpError::MissingDirectory(request.root_dir.clone()));
    }

    let mut rx = fetcher.fetch(&request.crawl).await?;

    let mut archive = SiteArchive {
        start_url: request.crawl.start_url.to_string(),
        root_dir: request.root_dir.clone(),
        site_dir: request.root_dir.clone(),
        pages: Vec::new(),
        failures: Vec::new(),
    };

    let deadline = request
        .crawl
        .options
        .total_timeout_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));

    loop {
        let next = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(next) => next,
                Err(_) => {
                    ::log::warn!(
                        "Total timeout reached for {}, keeping {} pages",
                        archive.start_url,
                        archive.pages.len()
                    );
                    break;
                }
            },
            None => rx.recv().await,
        };
        let Some(outcome) = next else { break };

        match outcome {
            Ok(page) => match save_page(request, &page).await {
                Ok(saved) => {
                    ::log::info!("Downloaded {} to {}", saved.source_url, saved.file_path.display());
                    record(&mut archive.pages, saved);
                }
                Err(error) => {
                    ::log::warn!("Could not save {}: {}", page.url, error);
                    archive.failures.push(PageFailure {
                        url: page.url,
                        depth: page.depth,
                        error,
                    });
                }
            },
            Err(failure) => {
                ::log::warn!("Skipping {}: {}", failure.url, failure.error);
                archive.failures.push(failure);
            }
        }
    }

    archive.site_dir = request.site_dir(&archive.pages);
    ::log::info!(
        "Finished {}: {} pages saved, {} failed",
        archive.start_url,
        archive.pages.len(),
        archive.failures.len()
    );

    if archive.pages.is_empty() && !archive.failures.is_empty() {
        archive.failures.sort_by_key(|f| f.depth);
        return Err(archive.failures.swap_remove(0).error);
    }

    Ok(archive)
}

/// Writes a page to its file, overwriting any previous content
async fn save_page(request: &DownloadRequest, page: &FetchedPage) -> Result<SavedPage> {
    let url = Url::parse(&page.url)
        .map_err(|e| SlurpError::InvalidArgument(format!("invalid page URL {}: {e}", page.url)))?;
    let file_path = request.filepath_for(&url);

    if let Some(dir) = file_path.parent() {
        if request.mk_missing_dirs {
            tokio::fs::create_dir_all(dir).await?;
        } else if !dir.is_dir() {
            return Err(SlurpError::MissingDirectory(dir.to_path_buf()));
        }
    }

    tokio::fs::write(&file_path, &page.content).await?;

    Ok(SavedPage {
        source_url: page.url.clone(),
        file_path,
        depth_at_discovery: page.depth,
    })
}

/// A later page saved to the same file replaces the earlier entry
fn record(pages: &mut Vec<SavedPage>, saved: SavedPage) {
    match pages.iter_mut().find(|p| p.file_path == saved.file_path) {
        Some(existing) => *existing = saved,
        None => pages.push(saved),
    }
}

/// Download several sites, `max_parallel_sites` at a time.
///
/// Every URL gets an entry: the site directory, or the error that stopped
/// its download.
pub async fn scrape_multiple_sites<F: PageFetcher>(
    fetcher: &F,
    settings: &Settings,
    urls: &[String],
    options: &DownloadOptions,
) -> BTreeMap<String, Result<PathBuf>> {
    let parallel = options.crawl_options(settings).max_parallel_sites.max(1);

    stream::iter(urls.iter().cloned())
        .map(|url| async move {
            let result = download_site(fetcher, settings, &url, options).await;
            if let Err(e) = &result {
                ::log::error!("Error scraping {}: {}", url, e);
            }
            (url, result)
        })
        .buffer_unordered(parallel)
        .collect()
        .await
}
