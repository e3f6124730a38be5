//! Converting downloaded pages into one Markdown document.

use crate::config::Settings;
use crate::crawlers::PageFetcher;
use crate::download::{self, DownloadOptions, DownloadRequest};
use crate::error::{Result, SlurpError};
use crate::parsers::html;
use crate::paths;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Converts one HTML document to Markdown
pub trait MarkdownConverter: Send + Sync {
    fn convert(&self, html: &str) -> Result<String>;
}

/// Converter backed by `html2md`, with headings written in ATX style
#[derive(Debug, Default, Clone, Copy)]
pub struct Html2Md;

impl MarkdownConverter for Html2Md {
    fn convert(&self, html: &str) -> Result<String> {
        Ok(setext_to_atx(&html2md::parse_html(html)))
    }
}

impl<F> MarkdownConverter for F
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    fn convert(&self, html: &str) -> Result<String> {
        self(html)
    }
}

/// Options of [`markdown_of_site`]
#[derive(Debug, Clone, Default)]
pub struct MarkdownOptions {
    /// How the site is downloaded. The root directory is replaced by the
    /// slurp directory.
    pub download: DownloadOptions,

    /// Where to write the Markdown. An existing directory gets a file named
    /// after the URL.
    pub save_filepath: Option<PathBuf>,

    /// Keep the downloaded pages in this existing directory instead of a
    /// temporary one
    pub dir_to_save_page_slurps: Option<PathBuf>,

    /// Remove repeated blocks of at least this many lines
    pub deduplicate_min_block_size: Option<usize>,
}

/// Result of [`markdown_of_site`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkdownOutput {
    /// The Markdown itself
    Text(String),
    /// The file the Markdown was written to
    Saved(PathBuf),
}

/// A block of lines dropped by [`deduplicate_lines`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovedBlock {
    /// Index of the first removed line in the input
    pub start_line: usize,
    /// Number of consecutive lines removed
    pub len: usize,
}

/// Download a site and convert its pages to one Markdown document.
///
/// Pages are ordered by discovery depth, then file path, each preceded by a
/// `<!-- page: <url> -->` marker. Pages that cannot be converted are
/// skipped and noted in their marker.
pub async fn markdown_of_site<F, C>(
    fetcher: &F,
    converter: &C,
    settings: &Settings,
    url: &str,
    options: &MarkdownOptions,
) -> Result<MarkdownOutput>
where
    F: PageFetcher,
    C: MarkdownConverter,
{
    let start_url = download::parse_start_url(url)?;
    let save_path = options
        .save_filepath
        .as_deref()
        .map(|path| resolve_save_path(path, start_url.as_str()));

    // The temporary directory is removed when `_tmp_dir` drops, on every path out
    let (slurp_dir, _tmp_dir) = match &options.dir_to_save_page_slurps {
        Some(dir) => {
            if !dir.is_dir() {
                return Err(SlurpError::MissingDirectory(dir.clone()));
            }
            (dir.clone(), None)
        }
        None => {
            let tmp = tempfile::Builder::new().prefix("site_slurp_").tempdir()?;
            (tmp.path().to_path_buf(), Some(tmp))
        }
    };
    ::log::debug!("Saving page slurps of {} under {}", start_url, slurp_dir.display());

    let download_options = DownloadOptions {
        rootdir: Some(slurp_dir),
        ..options.download.clone()
    };
    let request = DownloadRequest::new(start_url.as_str(), &download_options, settings)?;
    let archive = download::download_site_archive(fetcher, &request).await?;

    if archive.pages.is_empty() {
        return Err(SlurpError::EmptyResult(start_url.to_string()));
    }

    let mut pages = Vec::with_capacity(archive.pages.len());
    for page in archive.ordered_pages() {
        let content = tokio::fs::read(&page.file_path).await.map_err(SlurpError::from);
        pages.push((page.source_url.clone(), content));
    }

    let mut markdown = combine_pages(converter, pages);
    if let Some(min_block_size) = options.deduplicate_min_block_size {
        let (deduplicated, removed) = deduplicate_lines(&markdown, min_block_size);
        ::log::info!("Removed {} repeated blocks", removed.len());
        markdown = deduplicated;
    }

    match save_path {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(dir).await?;
            }
            tokio::fs::write(&path, &markdown).await?;
            ::log::info!("Saved Markdown of {} to {}", start_url, path.display());
            Ok(MarkdownOutput::Saved(path))
        }
        None => Ok(MarkdownOutput::Text(markdown)),
    }
}

/// Convert every file under an existing slurp directory, in path order.
/// Markers carry the file path relative to `dir`.
pub fn markdown_of_directory<C: MarkdownConverter>(converter: &C, dir: &Path) -> Result<String> {
    if !dir.is_dir() {
        return Err(SlurpError::MissingDirectory(dir.to_path_buf()));
    }

    let mut pages = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| SlurpError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let label = entry
            .path()
            .strip_prefix(dir)
            .unwrap_or(entry.path())
            .display()
            .to_string();
        pages.push((label, std::fs::read(entry.path()).map_err(SlurpError::from)));
    }

    if pages.is_empty() {
        return Err(SlurpError::EmptyResult(dir.display().to_string()));
    }
    Ok(combine_pages(converter, pages))
}

/// Write the Markdown of each named site to `<save_dir>/<name>.md`.
///
/// Every name gets an entry: the file written, or the error for that site.
pub async fn markdown_of_multiple_sites<F, C>(
    fetcher: &F,
    converter: &C,
    settings: &Settings,
    named_urls: &[(String, String)],
    save_dir: &Path,
    options: &MarkdownOptions,
) -> Result<BTreeMap<String, Result<PathBuf>>>
where
    F: PageFetcher,
    C: MarkdownConverter,
{
    if !save_dir.is_dir() {
        return Err(SlurpError::MissingDirectory(save_dir.to_path_buf()));
    }
    let parallel = options
        .download
        .crawl_options(settings)
        .max_parallel_sites
        .max(1);

    let outcomes = stream::iter(named_urls.iter().cloned())
        .map(|(name, url)| async move {
            ::log::info!("Scraping {} ({})...", name, url);
            let site_options = MarkdownOptions {
                save_filepath: Some(save_dir.join(format!("{name}.md"))),
                dir_to_save_page_slurps: None,
                ..options.clone()
            };
            let result = markdown_of_site(fetcher, converter, settings, &url, &site_options)
                .await
                .and_then(|output| match output {
                    MarkdownOutput::Saved(path) => Ok(path),
                    MarkdownOutput::Text(_) => Err(SlurpError::Config(
                        "Markdown was not saved".to_string(),
                    )),
                });
            if let Err(e) = &result {
                ::log::error!("Error scraping {} ({}): {}", name, url, e);
            }
            (name, result)
        })
        .buffer_unordered(parallel)
        .collect()
        .await;

    Ok(outcomes)
}

/// Joins converted pages, each behind a marker naming its source
pub fn combine_pages<C, I>(converter: &C, pages: I) -> String
where
    C: MarkdownConverter,
    I: IntoIterator<Item = (String, Result<Vec<u8>>)>,
{
    let mut fragments = Vec::new();
    for (source, content) in pages {
        match content.and_then(|bytes| render_page(converter, &source, &bytes)) {
            Ok(markdown) => {
                fragments.push(format!("<!-- page: {} -->\n\n{}", source, markdown.trim()));
            }
            Err(e) => {
                ::log::warn!("Skipping {}: {}", source, e);
                fragments.push(format!("<!-- page: {} (skipped: {}) -->", source, e));
            }
        }
    }

    let mut combined = fragments.join("\n\n");
    combined.push('\n');
    combined
}

fn render_page<C: MarkdownConverter>(converter: &C, source: &str, content: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(content).map_err(|e| SlurpError::Conversion {
        url: source.to_string(),
        reason: e.to_string(),
    })?;

    if html::is_html_content(content) {
        converter.convert(text)
    } else {
        Ok(text.to_string())
    }
}

/// Remove blocks of at least `min_block_size` lines that already appeared
/// earlier in the text. Blocks made only of blank lines are kept.
pub fn deduplicate_lines(text: &str, min_block_size: usize) -> (String, Vec<RemovedBlock>) {
    let size = min_block_size.max(1);
    let lines: Vec<&str> = text.lines().collect();

    let mut seen: HashSet<&[&str]> = HashSet::new();
    let mut registered = 0;
    let mut kept = Vec::with_capacity(lines.len());
    let mut removed: Vec<RemovedBlock> = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        // Only windows lying entirely before `i` count as earlier text
        while registered + size <= i {
            seen.insert(&lines[registered..registered + size]);
            registered += 1;
        }

        if i + size <= lines.len() {
            let window = &lines[i..i + size];
            if window.iter().any(|line| !line.trim().is_empty()) && seen.contains(window) {
                match removed.last_mut() {
                    Some(last) if last.start_line + last.len == i => last.len += size,
                    _ => removed.push(RemovedBlock {
                        start_line: i,
                        len: size,
                    }),
                }
                i += size;
                continue;
            }
        }

        kept.push(lines[i]);
        i += 1;
    }

    let mut result = kept.join("\n");
    if text.ends_with('\n') && !result.is_empty() {
        result.push('\n');
    }
    (result, removed)
}

/// Rewrite setext headings (`Title` over `===` or `---`) as `#`/`##` headings
fn setext_to_atx(markdown: &str) -> String {
    let lines: Vec<&str> = markdown.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut in_fence = false;

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
        }

        let starts_paragraph = i == 0 || lines[i - 1].trim().is_empty();
        let level = lines.get(i + 1).and_then(|next| setext_level(next));
        if let Some(level) = level {
            if !in_fence && starts_paragraph && is_heading_text(line) {
                out.push(format!("{} {}", "#".repeat(level), line.trim()));
                i += 2;
                continue;
            }
        }

        out.push(line.to_string());
        i += 1;
    }

    out.join("\n")
}

fn setext_level(line: &str) -> Option<usize> {
    let underline = line.trim();
    if !underline.is_empty() && underline.chars().all(|c| c == '=') {
        Some(1)
    } else if underline.len() >= 3 && underline.chars().all(|c| c == '-') {
        Some(2)
    } else {
        None
    }
}

fn is_heading_text(line: &str) -> bool {
    !line.trim().is_empty()
        && !line.starts_with("    ")
        && !line
            .trim_start()
            .starts_with(['#', '>', '-', '*', '+', '|', '<'])
}

/// Expand a leading `~`, and give directories a file name derived from `url`
fn resolve_save_path(path: &Path, url: &str) -> PathBuf {
    let path = match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    };
    if path.is_dir() {
        path.join(format!("{}.md", paths::url_to_filename(url)))
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html2md_headings_are_atx() {
        let markdown = Html2Md.convert("<h1>Hi</h1><h2>There</h2><p>text</p>").unwrap();
        assert!(markdown.contains("# Hi"), "{markdown}");
        assert!(markdown.contains("## There"), "{markdown}");
        assert!(markdown.contains("text"));
    }

    #[test]
    fn test_setext_to_atx() {
        let input = "Title\n=====\n\nSub\n---\n\npara\nline\n---\n\n```\ncode\n---\n```";
        let output = setext_to_atx(input);
        assert_eq!(
            output,
            "# Title\n\n## Sub\n\npara\nline\n---\n\n```\ncode\n---\n```"
        );
    }

    #[test]
    fn test_combine_pages_marks_and_skips() {
        let converter = |html: &str| -> Result<String> { Ok(html.to_uppercase()) };
        let pages = vec![
            ("https://e.com/".to_string(), Ok(b"<p>one</p>".to_vec())),
            ("https://e.com/bad".to_string(), Ok(vec![0xff, 0xfe])),
            ("https://e.com/notes.txt".to_string(), Ok(b"plain notes".to_vec())),
            (
                "https://e.com/gone".to_string(),
                Err(SlurpError::MissingDirectory(PathBuf::from("/nope"))),
            ),
        ];

        let combined = combine_pages(&converter, pages);
        let expected_start = "<!-- page: https://e.com/ -->\n\n<P>ONE</P>\n\n<!-- page: https://e.com/bad (skipped: ";
        assert!(combined.starts_with(expected_start), "{combined}");
        assert!(combined.contains("<!-- page: https://e.com/notes.txt -->\n\nplain notes"));
        assert!(combined.contains("<!-- page: https://e.com/gone (skipped: Directory not found: /nope) -->"));
        assert!(combined.ends_with('\n'));
    }

    #[test]
    fn test_conversion_failure_is_noted() {
        let converter = |_: &str| -> Result<String> {
            Err(SlurpError::Conversion {
                url: "x".to_string(),
                reason: "boom".to_string(),
            })
        };
        let combined = combine_pages(&converter, vec![("p".to_string(), Ok(b"<p>x</p>".to_vec()))]);
        assert_eq!(
            combined,
            "<!-- page: p (skipped: Failed to convert x to Markdown: boom) -->\n"
        );
    }

    #[test]
    fn test_deduplicate_lines() {
        let text = "nav1\nnav2\nnav3\nA\nnav1\nnav2\nnav3\nB\n";
        let (deduplicated, removed) = deduplicate_lines(text, 3);
        assert_eq!(deduplicated, "nav1\nnav2\nnav3\nA\nB\n");
        assert_eq!(
            removed,
            vec![RemovedBlock {
                start_line: 4,
                len: 3
            }]
        );
    }

    #[test]
    fn test_deduplicate_lines_merges_adjacent_blocks_and_keeps_blank_runs() {
        let text = "a\nb\nc\nd\n\n\nx\n\n\na\nb\nc\nd";
        let (deduplicated, removed) = deduplicate_lines(text, 2);
        assert_eq!(deduplicated, "a\nb\nc\nd\n\n\nx\n\n");
        assert_eq!(
            removed,
            vec![RemovedBlock {
                start_line: 9,
                len: 4
            }]
        );
    }

    #[test]
    fn test_deduplicate_lines_without_repeats() {
        let (deduplicated, removed) = deduplicate_lines("one\ntwo\nthree", 2);
        assert_eq!(deduplicated, "one\ntwo\nthree");
        assert!(removed.is_empty());
    }

    #[test]
    fn test_resolve_save_path() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            resolve_save_path(dir.path(), "https://e.com/docs/"),
            dir.path().join("e.com__docs.md")
        );
        let file = dir.path().join("out.md");
        assert_eq!(resolve_save_path(&file, "https://e.com/"), file);
    }

    #[test]
    fn test_markdown_of_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("b")).unwrap();
        std::fs::write(dir.path().join("b/page.html"), "<h1>Second</h1>").unwrap();
        std::fs::write(dir.path().join("a.html"), "<h1>First</h1>").unwrap();

        let markdown = markdown_of_directory(&Html2Md, dir.path()).unwrap();
        let first = markdown.find("# First").unwrap();
        let second = markdown.find("# Second").unwrap();
        assert!(first < second);
        assert!(markdown.contains("<!-- page: a.html -->"));
    }

    #[test]
    fn test_markdown_of_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            markdown_of_directory(&Html2Md, dir.path()),
            Err(SlurpError::EmptyResult(_))
        ));
        assert!(matches!(
            markdown_of_directory(&Html2Md, &dir.path().join("missing")),
            Err(SlurpError::MissingDirectory(_))
        ));
    }
}
