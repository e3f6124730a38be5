pub mod html;


/// Kind of content a fetched page holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// HTML, parsed for links
    Html,
    /// Plain text or data files, never parsed for links
    Text,
    /// Anything else
    Other,
}

impl ContentKind {
    /// Classify a page from its Content-Type header, falling back to the URL
    pub fn classify(url: &str, content_type: Option<&str>) -> Self {
        if let Some(content_type) = content_type {
            let mime = content_type
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            if mime == "text/html" || mime == "application/xhtml+xml" {
                return ContentKind::Html;
            }
            if mime.starts_with("text/") || mime.ends_with("json") || mime.ends_with("yaml") {
                return ContentKind::Text;
            }
            if !mime.is_empty() {
                return ContentKind::Other;
            }
        }
        Self::from_url(url)
    }

    /// Determines the kind based on the URL alone
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
        if path.ends_with(".txt")
            || path.ends_with(".md")
            || path.ends_with(".yaml")
            || path.ends_with(".yml")
            || path.contains("/_sources/")
        {
            ::log::debug!("Classifying as Text: {}", url);
            ContentKind::Text
        } else if [".jpg", ".jpeg", ".png", ".gif", ".css", ".js", ".pdf"]
            .iter()
            .any(|ext| path.ends_with(ext))
        {
            ::log::debug!("Classifying as Other: {}", url);
            ContentKind::Other
        } else {
            ContentKind::Html
        }
    }

    /// Returns if links should be extracted from this kind of page
    pub fn should_extract_links(&self) -> bool {
        matches!(self, ContentKind::Html)
    }
}
