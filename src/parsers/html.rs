use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)<(html|head|body|title|meta|link|script|style|div|span|p|a|img|table|tr|td|ul|ol|li|h1|h2|h3|h4|h5|h6|br|hr|!--)",
    )
    .expect("HTML tag pattern is valid")
});

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("link selector is valid"));

/// Extracts the `href` of every anchor, as written in the document
pub fn extract_links(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);

    let links = doc
        .select(&LINK_SELECTOR)
        .filter_map(|e| e.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty() && !href.starts_with('#'))
        .map(str::to_string)
        .collect::<Vec<String>>();

    ::log::debug!("HTML parser found {} links", links.len());
    if !links.is_empty() {
        ::log::trace!(
            "First few links: {:?}",
            links.iter().take(5).collect::<Vec<_>>()
        );
    }

    links
}

/// Check whether content looks like HTML (contains a common HTML tag)
pub fn is_html_content(content: &[u8]) -> bool {
    HTML_TAG.is_match(&String::from_utf8_lossy(content))
}
