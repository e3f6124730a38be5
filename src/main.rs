use clap::Parser;
use site_slurp::paths::url_to_filename;
use site_slurp::{
    DownloadOptions, MarkdownOptions, MarkdownOutput, Result, Settings, Slurper, download,
};
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::ExitCode;

mod args;
use args::{Args, Command};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = match args.verbose {
        0 => "error",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let mut settings = match &args.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::from_env(),
    };

    match args.command {
        Command::MarkdownOfSite {
            url,
            depth,
            save,
            slurp_dir,
            dedup_block,
            crawl,
        } => {
            let depth = download::validate_depth(depth)?;
            crawl.apply(&mut settings.crawl);
            let options = MarkdownOptions {
                download: DownloadOptions::default().with_depth(depth),
                save_filepath: save,
                dir_to_save_page_slurps: slurp_dir,
                deduplicate_min_block_size: dedup_block,
            };

            match Slurper::new(settings).markdown_of_site(&url, &options).await? {
                MarkdownOutput::Text(markdown) => print!("{markdown}"),
                MarkdownOutput::Saved(path) => println!("{}", path.display()),
            }
        }

        Command::DownloadSite {
            url,
            depth,
            root_dir,
            no_mkdirs,
            crawl,
        } => {
            let depth = download::validate_depth(depth)?;
            crawl.apply(&mut settings.crawl);
            let options = DownloadOptions {
                mk_missing_dirs: !no_mkdirs,
                rootdir: root_dir,
                ..DownloadOptions::default().with_depth(depth)
            };

            let site_dir = Slurper::new(settings).download_site(&url, &options).await?;
            println!("{}", site_dir.display());
        }

        Command::ScrapeMultipleSites {
            urls,
            depth,
            root_dir,
            markdown_dir,
            crawl,
        } => {
            let depth = download::validate_depth(depth)?;
            crawl.apply(&mut settings.crawl);
            let download_options = DownloadOptions {
                rootdir: root_dir,
                ..DownloadOptions::default().with_depth(depth)
            };
            let slurper = Slurper::new(settings);

            let results: Vec<(String, Result<PathBuf>)> = match markdown_dir {
                Some(dir) => {
                    let named = name_sites(&urls);
                    let options = MarkdownOptions {
                        download: download_options,
                        ..MarkdownOptions::default()
                    };
                    let mut by_name = slurper
                        .markdown_of_multiple_sites(&named, &dir, &options)
                        .await?;
                    named
                        .into_iter()
                        .filter_map(|(name, url)| by_name.remove(&name).map(|result| (url, result)))
                        .collect()
                }
                None => slurper
                    .scrape_multiple_sites(&urls, &download_options)
                    .await
                    .into_iter()
                    .collect(),
            };
            print_results(results);
        }
    }

    Ok(())
}

/// One `url<TAB>path` or `url<TAB>error: message` line per site
fn print_results(results: Vec<(String, Result<PathBuf>)>) {
    for (url, result) in results {
        match result {
            Ok(path) => println!("{}\t{}", url, path.display()),
            Err(e) => println!("{url}\terror: {e}"),
        }
    }
}

/// Name each site after its URL; clashing names get `_2`, `_3`, ... so no two
/// sites share a Markdown file
fn name_sites(urls: &[String]) -> Vec<(String, String)> {
    let mut taken = HashSet::new();
    urls.iter()
        .map(|url| {
            let base = url_to_filename(url);
            let mut name = base.clone();
            let mut n = 1;
            while !taken.insert(name.clone()) {
                n += 1;
                name = format!("{base}_{n}");
            }
            (name, url.clone())
        })
        .collect()
}
