use super::{StubFetcher, failure, files_under, page, slurper};
use crate::download::validate_depth;
use crate::error::SlurpError;
use crate::paths::url_to_filepath;
use crate::{CrawlOptions, DownloadOptions, UrlToPath};
use url::Url;

fn docs_site() -> StubFetcher {
    StubFetcher::default().with_site(
        "https://e.com/",
        vec![
            page("https://e.com/", 0, "<h1>Home</h1>"),
            page("https://e.com/guide/", 1, "<h1>Guide</h1>"),
            page("https://e.com/guide/install", 2, "<h1>Install</h1>"),
        ],
    )
}

#[cfg(test)]
mod download_site_tests {
    use super::*;

    #[tokio::test]
    async fn test_one_file_per_page_within_depth() {
        let root = tempfile::tempdir().unwrap();
        let slurper = slurper(root.path(), docs_site());

        for depth in 0..=2 {
            let options = DownloadOptions::default().with_depth(depth);
            let site_dir = slurper.download_site("https://e.com", &options).await.unwrap();
            assert_eq!(site_dir, root.path().join("https").join("e.com"));
            assert_eq!(files_under(&site_dir).len(), depth + 1);
        }

        let install = url_to_filepath(
            &Url::parse("https://e.com/guide/install").unwrap(),
            root.path(),
        );
        assert_eq!(std::fs::read_to_string(install).unwrap(), "<h1>Install</h1>");
    }

    #[tokio::test]
    async fn test_saved_pages_match_fetched_content() {
        let root = tempfile::tempdir().unwrap();
        let slurper = slurper(root.path(), docs_site());
        let archive = slurper
            .download_site_archive("https://e.com/", &DownloadOptions::default())
            .await
            .unwrap();

        assert_eq!(archive.pages.len(), 2);
        assert!(archive.failures.is_empty());
        for saved in &archive.pages {
            let expected = if saved.depth_at_discovery == 0 {
                "<h1>Home</h1>"
            } else {
                "<h1>Guide</h1>"
            };
            assert_eq!(std::fs::read_to_string(&saved.file_path).unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_repeated_download_overwrites() {
        let root = tempfile::tempdir().unwrap();
        let slurper = slurper(root.path(), docs_site());
        let options = DownloadOptions::default();

        let first = slurper.download_site_archive("https://e.com/", &options).await.unwrap();
        let files_after_first = files_under(root.path());
        let second = slurper.download_site_archive("https://e.com/", &options).await.unwrap();

        assert_eq!(first.pages, second.pages);
        assert_eq!(files_under(root.path()), files_after_first);
        for saved in &second.pages {
            assert!(saved.file_path.is_file());
        }
    }

    #[tokio::test]
    async fn test_page_failures_do_not_abort_run() {
        let root = tempfile::tempdir().unwrap();
        let fetcher = StubFetcher::default().with_site(
            "https://e.com/",
            vec![
                page("https://e.com/", 0, "<p>home</p>"),
                failure("https://e.com/broken", 1),
                page("https://e.com/ok", 1, "<p>ok</p>"),
            ],
        );
        let archive = slurper(root.path(), fetcher)
            .download_site_archive("https://e.com/", &DownloadOptions::default())
            .await
            .unwrap();

        assert_eq!(archive.pages.len(), 2);
        assert_eq!(archive.failures.len(), 1);
        assert_eq!(archive.failures[0].url, "https://e.com/broken");
    }

    #[tokio::test]
    async fn test_every_page_failing_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let fetcher = StubFetcher::default().with_site(
            "https://e.com/",
            vec![failure("https://e.com/", 0)],
        );
        let err = slurper(root.path(), fetcher)
            .download_site("https://e.com/", &DownloadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SlurpError::HttpStatus { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_unreachable_site_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let err = slurper(root.path(), StubFetcher::default())
            .download_site("https://nowhere.example/", &DownloadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SlurpError::Fetch { .. }));
    }
}

#[cfg(test)]
mod redirect_tests {
    use super::*;

    #[tokio::test]
    async fn test_redirected_start_page_reports_final_site_dir() {
        let root = tempfile::tempdir().unwrap();
        let fetcher = StubFetcher::default().with_site(
            "http://e.com/",
            vec![
                page("https://e.com/", 0, "<p>home</p>"),
                page("https://e.com/a", 1, "<p>alpha</p>"),
            ],
        );

        let site_dir = slurper(root.path(), fetcher)
            .download_site("http://e.com/", &DownloadOptions::default())
            .await
            .unwrap();

        assert_eq!(site_dir, root.path().join("https").join("e.com"));
        assert_eq!(files_under(&site_dir).len(), 2);
        assert_eq!(files_under(root.path()), files_under(&site_dir));
    }

    #[tokio::test]
    async fn test_pages_on_several_sites_report_root() {
        let root = tempfile::tempdir().unwrap();
        let fetcher = StubFetcher::default().with_site(
            "https://e.com/",
            vec![
                page("https://e.com/", 0, "<p>home</p>"),
                page("https://docs.e.com/guide", 1, "<p>guide</p>"),
            ],
        );

        let dir = slurper(root.path(), fetcher)
            .download_site("https://e.com/", &DownloadOptions::default())
            .await
            .unwrap();
        assert_eq!(dir, root.path());
    }
}

#[cfg(test)]
mod total_timeout_tests {
    use super::*;

    #[tokio::test]
    async fn test_total_timeout_keeps_saved_pages() {
        let root = tempfile::tempdir().unwrap();
        let fetcher = StubFetcher::default()
            .with_site(
                "https://e.com/",
                vec![
                    page("https://e.com/", 0, "<p>home</p>"),
                    page("https://e.com/a", 1, "<p>alpha</p>"),
                ],
            )
            .stalled("https://e.com/");
        let options = DownloadOptions {
            crawl: Some(CrawlOptions {
                total_timeout_secs: Some(1),
                ..CrawlOptions::default()
            }),
            ..DownloadOptions::default()
        };

        let archive = slurper(root.path(), fetcher)
            .download_site_archive("https://e.com/", &options)
            .await
            .unwrap();

        assert_eq!(archive.pages.len(), 2);
        assert!(archive.failures.is_empty());
        assert_eq!(files_under(root.path()).len(), 2);
    }
}

#[cfg(test)]
mod directory_tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_root_without_mkdirs() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("absent");
        let options = DownloadOptions {
            mk_missing_dirs: false,
            ..DownloadOptions::default().with_rootdir(&missing)
        };

        let err = slurper(root.path(), docs_site())
            .download_site("https://e.com/", &options)
            .await
            .unwrap_err();
        assert!(matches!(err, SlurpError::MissingDirectory(dir) if dir == missing));
    }

    #[tokio::test]
    async fn test_missing_page_directory_without_mkdirs() {
        let root = tempfile::tempdir().unwrap();
        let options = DownloadOptions {
            mk_missing_dirs: false,
            ..DownloadOptions::default().with_depth(0)
        };

        let err = slurper(root.path(), docs_site())
            .download_site("https://e.com/", &options)
            .await
            .unwrap_err();
        assert!(matches!(err, SlurpError::MissingDirectory(_)));
        assert!(files_under(root.path()).is_empty());
    }

    #[tokio::test]
    async fn test_custom_path_mapping() {
        let root = tempfile::tempdir().unwrap();
        let options = DownloadOptions {
            url_to_filepath: Some(UrlToPath::new(|url: &Url, root: &std::path::Path| {
                let name = url.path().trim_matches('/').replace('/', "_");
                root.join(format!("{}.html", if name.is_empty() { "index" } else { &name }))
            })),
            ..DownloadOptions::default().with_depth(2)
        };

        let dir = slurper(root.path(), docs_site())
            .download_site("https://e.com/", &options)
            .await
            .unwrap();

        assert_eq!(dir, root.path());
        assert_eq!(
            files_under(root.path()),
            vec![
                root.path().join("guide.html"),
                root.path().join("guide_install.html"),
                root.path().join("index.html"),
            ]
        );
    }
}

#[cfg(test)]
mod validation_tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_urls_are_rejected() {
        let root = tempfile::tempdir().unwrap();
        let slurper = slurper(root.path(), docs_site());
        for url in ["not a url", "ftp://e.com/", "file:///etc/passwd"] {
            let err = slurper
                .download_site(url, &DownloadOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, SlurpError::InvalidArgument(_)), "{url}");
        }
    }

    #[test]
    fn test_validate_depth() {
        assert_eq!(validate_depth(0).unwrap(), 0);
        assert_eq!(validate_depth(3).unwrap(), 3);
        assert!(matches!(validate_depth(-1), Err(SlurpError::InvalidArgument(_))));
    }
}
