use crate::crawlers::crawler::CrawlRequest;
use crate::crawlers::loader::PageLoader;
use crate::error::{Result, SlurpError};
use crate::filter::UrlFilter;
use crate::parsers::{ContentKind, html};
use crate::results::{FetchOutcome, FetchedPage, PageFailure};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::time::timeout;
use url::Url;

/// Outcomes waiting for the consumer before workers block
const RESULT_BUFFER: usize = 256;

enum Job {
    Visit { url: Url, depth: usize },
    Stop,
}

/// State shared by the workers of one crawl
struct CrawlState<L> {
    loader: L,
    url_filter: UrlFilter,
    max_depth: usize,
    request_timeout: Duration,
    num_workers: usize,
    crawl_tx: mpsc::UnboundedSender<Job>,
    crawl_rx: Mutex<mpsc::UnboundedReceiver<Job>>,
    /// Normalized URLs that were queued or loaded
    visited: Mutex<HashSet<String>>,
    /// Jobs queued or in progress
    pending: AtomicUsize,
}

/// Starts a crawl and returns a receiver that yields an outcome per page.
///
/// The start page is always loaded; links are followed while the depth of
/// the page they appear on is below `request.depth`. Each page is loaded at
/// most once. The receiver closes when no job is left.
pub fn start<L: PageLoader>(
    request: &CrawlRequest,
    loader: L,
) -> Result<mpsc::Receiver<FetchOutcome>> {
    ::log::info!(
        "Starting web crawler for: {} (depth {})",
        request.start_url,
        request.depth
    );

    let url_filter = UrlFilter::new(&request.start_url, &request.options, request.filter.clone())
        .map_err(|e| SlurpError::InvalidArgument(format!("invalid URL pattern: {e}")))?;
    let start_url = url_filter.normalize_url(&request.start_url);

    let num_workers = request.options.max_concurrency.max(1);
    let (crawl_tx, crawl_rx) = mpsc::unbounded_channel();
    let (result_tx, result_rx) = mpsc::channel(RESULT_BUFFER);

    let state = Arc::new(CrawlState {
        loader,
        url_filter,
        max_depth: request.depth,
        request_timeout: Duration::from_secs(request.options.request_timeout_secs),
        num_workers,
        crawl_tx,
        crawl_rx: Mutex::new(crawl_rx),
        visited: Mutex::new(HashSet::from([start_url.to_string()])),
        pending: AtomicUsize::new(1),
    });

    // Queue the initial URL
    state
        .crawl_tx
        .send(Job::Visit {
            url: start_url,
            depth: 0,
        })
        .map_err(|_| SlurpError::fetch(request.start_url.as_str(), "crawl queue closed"))?;

    spawn_workers(state, result_tx);

    Ok(result_rx)
}

/// Spawns the workers and a task that releases the loader once all are done
fn spawn_workers<L: PageLoader>(state: Arc<CrawlState<L>>, result_tx: mpsc::Sender<FetchOutcome>) {
    let handles: Vec<_> = (0..state.num_workers)
        .map(|worker_id| {
            ::log::trace!("Spawning worker {}", worker_id);
            tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&state),
                result_tx.clone(),
            ))
        })
        .collect();

    tokio::spawn(async move {
        futures::future::join_all(handles).await;
        ::log::debug!("All {} crawl workers have completed", state.num_workers);
        state.loader.shutdown().await;
        // Dropping the last sender closes the result channel
        drop(result_tx);
    });
}

async fn worker_loop<L: PageLoader>(
    worker_id: usize,
    state: Arc<CrawlState<L>>,
    result_tx: mpsc::Sender<FetchOutcome>,
) {
    ::log::debug!("Worker {} starting processing loop", worker_id);

    loop {
        let job = state.crawl_rx.lock().await.recv().await;
        let (url, depth) = match job {
            Some(Job::Visit { url, depth }) => (url, depth),
            Some(Job::Stop) | None => break,
        };

        // Once the consumer is gone, drain the queue without loading
        if !result_tx.is_closed() {
            if let Some(outcome) = visit(worker_id, &state, url, depth, &result_tx).await {
                if result_tx.send(outcome).await.is_err() {
                    ::log::debug!("Worker {}: result receiver dropped", worker_id);
                }
            }
        }

        finish_job(&state);
    }

    ::log::debug!("Worker {} completed processing loop", worker_id);
}

/// Marks a job done; the last one stops every worker
fn finish_job<L>(state: &CrawlState<L>) {
    if state.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
        ::log::debug!("Crawl queue drained, stopping {} workers", state.num_workers);
        for _ in 0..state.num_workers {
            let _ = state.crawl_tx.send(Job::Stop);
        }
    }
}

/// Loads one page and queues its links. Returns `None` when the page
/// redirected to a URL that was already visited.
async fn visit<L: PageLoader>(
    worker_id: usize,
    state: &CrawlState<L>,
    url: Url,
    depth: usize,
    result_tx: &mpsc::Sender<FetchOutcome>,
) -> Option<FetchOutcome> {
    ::log::debug!("Worker {} loading {} (depth {})", worker_id, url, depth);

    let loaded = match timeout(state.request_timeout, state.loader.load(&url)).await {
        Ok(Ok(page)) => page,
        Ok(Err(error)) => {
            ::log::warn!("Failed to load {}: {}", url, error);
            return Some(Err(PageFailure {
                url: url.to_string(),
                depth,
                error,
            }));
        }
        Err(_) => {
            ::log::warn!("Timeout loading {}", url);
            return Some(Err(PageFailure {
                url: url.to_string(),
                depth,
                error: SlurpError::fetch(url.as_str(), "timed out"),
            }));
        }
    };

    let final_url = state.url_filter.normalize_url(&loaded.url);
    if final_url != url && !state.visited.lock().await.insert(final_url.to_string()) {
        ::log::debug!("{} redirected to already visited {}", url, final_url);
        return None;
    }

    let kind = ContentKind::classify(final_url.as_str(), loaded.content_type.as_deref());
    if depth < state.max_depth && kind.should_extract_links() && !result_tx.is_closed() {
        let links = html::extract_links(&String::from_utf8_lossy(&loaded.body));
        ::log::info!("Found {} links in {}", links.len(), final_url);
        queue_links(state, &final_url, links, depth + 1).await;
    }

    Some(Ok(FetchedPage::new(final_url.as_str(), depth, loaded.body)))
}

/// Resolves, filters and queues links not seen before
async fn queue_links<L>(state: &CrawlState<L>, base: &Url, links: Vec<String>, depth: usize) {
    for link in links {
        let Ok(resolved) = base.join(&link) else {
            ::log::trace!("Unresolvable link {} on {}", link, base);
            continue;
        };

        if !state.url_filter.should_crawl(&resolved) {
            ::log::debug!("URL filter rejected: {}", resolved);
            continue;
        }

        let normalized = state.url_filter.normalize_url(&resolved);
        if !state.visited.lock().await.insert(normalized.to_string()) {
            ::log::trace!("Skipping already queued link: {}", normalized);
            continue;
        }

        state.pending.fetch_add(1, Ordering::SeqCst);
        ::log::debug!("Queuing link for crawling: {}", normalized);
        if state
            .crawl_tx
            .send(Job::Visit {
                url: normalized,
                depth,
            })
            .is_err()
        {
            state.pending.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
