pub mod crawler;
pub mod loader;
pub mod web;

pub use crawler::{CrawlRequest, PageFetcher, WebCrawler};
pub use loader::{HttpLoader, LoadedPage, PageLoader, WebDriverLoader};
