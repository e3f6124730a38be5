use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use site_slurp::{CrawlOptions, Engine};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "site-slurp")]
#[command(about = "Crawl websites into local files and turn them into Markdown")]
#[command(version)]
pub struct Args {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// JSON settings file (root_dir, crawl options)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download a site and print it as one Markdown document
    MarkdownOfSite {
        url: String,

        /// Link hops to follow from the start URL
        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        depth: i64,

        /// Write the Markdown to this file (or into this directory)
        #[arg(short, long)]
        save: Option<PathBuf>,

        /// Keep the downloaded pages in this existing directory
        #[arg(long)]
        slurp_dir: Option<PathBuf>,

        /// Drop repeated blocks of at least this many lines
        #[arg(long)]
        dedup_block: Option<usize>,

        #[command(flatten)]
        crawl: CrawlArgs,
    },

    /// Download a site and print the directory it was saved under
    DownloadSite {
        url: String,

        /// Link hops to follow from the start URL
        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        depth: i64,

        /// Root directory to save pages under
        #[arg(long)]
        root_dir: Option<PathBuf>,

        /// Fail instead of creating missing directories
        #[arg(long)]
        no_mkdirs: bool,

        #[command(flatten)]
        crawl: CrawlArgs,
    },

    /// Download several sites, continuing past failures
    ScrapeMultipleSites {
        #[arg(required = true)]
        urls: Vec<String>,

        /// Link hops to follow from each start URL
        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        depth: i64,

        /// Root directory to save pages under
        #[arg(long, conflicts_with = "markdown_dir")]
        root_dir: Option<PathBuf>,

        /// Write one Markdown file per site into this directory instead;
        /// pages are then downloaded to temporary directories
        #[arg(long)]
        markdown_dir: Option<PathBuf>,

        #[command(flatten)]
        crawl: CrawlArgs,
    },
}

/// Overrides of the configured crawler options
#[derive(ClapArgs, Debug, Default)]
pub struct CrawlArgs {
    /// Pages loaded concurrently per site
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Sites crawled at the same time
    #[arg(long)]
    pub parallel_sites: Option<usize>,

    /// Only follow URLs matching this regex (repeatable)
    #[arg(long)]
    pub include: Vec<String>,

    /// Never follow URLs matching this regex (repeatable)
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Follow links to other hosts
    #[arg(long)]
    pub allow_external: bool,

    /// Only follow links under the start URL's directory
    #[arg(long)]
    pub stay_under_path: bool,

    /// Page loading backend
    #[arg(long, value_enum)]
    pub engine: Option<EngineArg>,

    /// WebDriver endpoint (webdriver engine only)
    #[arg(long)]
    pub webdriver_url: Option<String>,

    /// Per-page timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Timeout in seconds for a whole site
    #[arg(long)]
    pub total_timeout: Option<u64>,

    #[arg(long)]
    pub user_agent: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum EngineArg {
    Http,
    Webdriver,
}

impl From<EngineArg> for Engine {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Http => Engine::Http,
            EngineArg::Webdriver => Engine::WebDriver,
        }
    }
}

impl CrawlArgs {
    /// Apply the flags that were given on top of `options`
    pub fn apply(self, options: &mut CrawlOptions) {
        if let Some(concurrency) = self.concurrency {
            options.max_concurrency = concurrency;
        }
        if let Some(parallel_sites) = self.parallel_sites {
            options.max_parallel_sites = parallel_sites;
        }
        options.include_patterns.extend(self.include);
        options.exclude_patterns.extend(self.exclude);
        options.allow_external |= self.allow_external;
        options.stay_under_start_path |= self.stay_under_path;
        if let Some(engine) = self.engine {
            options.engine = engine.into();
        }
        if let Some(webdriver_url) = self.webdriver_url {
            options.webdriver_url = webdriver_url;
        }
        if let Some(timeout) = self.timeout {
            options.request_timeout_secs = timeout;
        }
        if self.total_timeout.is_some() {
            options.total_timeout_secs = self.total_timeout;
        }
        if let Some(user_agent) = self.user_agent {
            options.user_agent = user_agent;
        }
    }
}
