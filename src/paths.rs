//! Mapping of URLs to local paths and resolution of the default storage root.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variable selecting the default root directory
pub const ROOTDIR_ENV_VAR: &str = "SITE_SLURP_ROOTDIR";

/// Bytes kept verbatim in path components; everything else is percent-encoded.
/// `+` and `~` are always encoded, which leaves them free as markers.
const COMPONENT_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'.').remove(b'-').remove(b'_');

const MAX_COMPONENT_LEN: usize = 120;
const SHORTENED_PREFIX_LEN: usize = 64;

/// Suffix of every page file, so a page never shares a name with a directory
const PAGE_SUFFIX: &str = "+.html";

/// Convert a URL to the local file path its page is stored at.
///
/// Layout: `<root>/<scheme>/<host>[+<port>]/<segment>/.../<last>[+<query>]+.html`.
/// Components are percent-encoded, so the mapping is injective: `/a`
/// becomes the file `a+.html` while `/a/b` lives in the directory `a`, and
/// `/a/` becomes `a/+.html`. The fragment is ignored.
pub fn url_to_filepath(url: &Url, root_dir: &Path) -> PathBuf {
    let mut path = site_directory(url, root_dir);

    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.collect())
        .unwrap_or_default();
    let (last, dirs) = match segments.split_last() {
        Some((last, dirs)) => (*last, dirs),
        None => ("", &[][..]),
    };

    for dir in dirs {
        path.push(encode_dir_segment(dir));
    }

    let mut leaf = encode_component(last);
    if let Some(query) = url.query() {
        leaf.push('+');
        leaf.push_str(&encode_component(query));
    }
    path.push(format!("{}{}", shorten(leaf), PAGE_SUFFIX));
    path
}

/// The directory holding every page of the site `url` belongs to
pub fn site_directory(url: &Url, root_dir: &Path) -> PathBuf {
    let mut host = encode_component(url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        // `+` is always encoded in hosts, so `a:8080` and `a_8080` stay apart
        host.push('+');
        host.push_str(&port.to_string());
    }
    root_dir.join(encode_component(url.scheme())).join(host)
}

/// Resolve the default root directory from `SITE_SLURP_ROOTDIR`, falling
/// back to `<data dir>/site-slurp/data`.
pub fn default_rootdir() -> PathBuf {
    rootdir_from(std::env::var_os(ROOTDIR_ENV_VAR))
}

fn rootdir_from(value: Option<OsString>) -> PathBuf {
    match value {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("site-slurp")
            .join("data"),
    }
}

/// Convert a URL to a flat file name (no scheme, slashes as `__`)
pub fn url_to_filename(url: &str) -> String {
    let url = url.strip_suffix('/').unwrap_or(url);
    let name = url
        .replace("https://", "")
        .replace("http://", "")
        .replace('/', "__")
        .replace([':', '?', '&', '=', '#', '%', '*', '"', '<', '>', '|', '\\'], "_");

    // Limit filename length
    name.chars().take(100).collect()
}

fn encode_dir_segment(segment: &str) -> String {
    match segment {
        // `%` alone is never produced by encoding
        "" => "%".to_string(),
        "." | ".." => segment.replace('.', "%2E"),
        _ => shorten(encode_component(segment)),
    }
}

fn encode_component(raw: &str) -> String {
    utf8_percent_encode(raw, COMPONENT_SET).to_string()
}

/// Keep long components within file system limits. The digest keeps
/// distinct components distinct.
fn shorten(component: String) -> String {
    if component.len() <= MAX_COMPONENT_LEN {
        return component;
    }
    // Encoded components are ASCII, so any byte index is a char boundary
    let digest = Sha256::digest(component.as_bytes());
    format!("{}~{:x}", &component[..SHORTENED_PREFIX_LEN], digest)
}
