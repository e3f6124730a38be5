use crate::config::CrawlOptions;
use crate::error::{Result, SlurpError};
use fantoccini::{Client, ClientBuilder};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

/// A single page as loaded from the web
#[derive(Debug, Clone)]
pub struct LoadedPage {
    /// Final URL, after redirects
    pub url: Url,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Loads one page. Failures (network errors, non-2xx statuses) are
/// returned as errors.
pub trait PageLoader: Send + Sync + 'static {
    fn load(&self, url: &Url) -> impl Future<Output = Result<LoadedPage>> + Send;

    /// Release any resources once the crawl is over
    fn shutdown(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// Loads pages with plain HTTP requests
#[derive(Debug, Clone)]
pub struct HttpLoader {
    client: reqwest::Client,
}

impl HttpLoader {
    pub fn new(options: &CrawlOptions) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (key, value) in &options.extra {
            if key == "headers" {
                headers.extend(parse_headers(value)?);
            } else {
                ::log::debug!("Ignoring unrecognized crawl option: {}", key);
            }
        }

        let client = reqwest::Client::builder()
            .user_agent(options.user_agent.as_str())
            .timeout(Duration::from_secs(options.request_timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| SlurpError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

impl PageLoader for HttpLoader {
    async fn load(&self, url: &Url) -> Result<LoadedPage> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| SlurpError::fetch(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SlurpError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| SlurpError::fetch(url.as_str(), e))?;

        Ok(LoadedPage {
            url: final_url,
            content_type,
            body: body.to_vec(),
        })
    }
}

/// `{"Header-Name": "value", ...}` to a header map
fn parse_headers(value: &serde_json::Value) -> Result<HeaderMap> {
    let object = value
        .as_object()
        .ok_or_else(|| SlurpError::Config("`headers` must be an object".to_string()))?;

    let mut headers = HeaderMap::new();
    for (name, value) in object {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| SlurpError::Config(format!("invalid header name {name:?}: {e}")))?;
        let value = value
            .as_str()
            .ok_or_else(|| SlurpError::Config(format!("header {name} must be a string")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| SlurpError::Config(format!("invalid value for header {name}: {e}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// Loads pages through WebDriver sessions, so scripts run before the source
/// is read. Sessions are opened lazily and reused.
pub struct WebDriverLoader {
    webdriver_url: String,
    idle: Mutex<Vec<Client>>,
}

impl WebDriverLoader {
    pub fn new(webdriver_url: &str) -> Self {
        Self {
            webdriver_url: webdriver_url.to_string(),
            idle: Mutex::new(Vec::new()),
        }
    }

    async fn session(&self) -> Result<Client> {
        if let Some(client) = self.idle.lock().await.pop() {
            return Ok(client);
        }
        connect_to_webdriver(&self.webdriver_url).await
    }
}

impl PageLoader for WebDriverLoader {
    async fn load(&self, url: &Url) -> Result<LoadedPage> {
        let mut client = self.session().await?;

        let mut result = navigate(&client, url).await;
        if let Err(NavigationError::SessionLost) = result {
            // One reconnect, then give up on this page
            ::log::warn!("Lost WebDriver session while loading {}, reconnecting", url);
            client = connect_to_webdriver(&self.webdriver_url).await?;
            result = navigate(&client, url).await;
        }

        match result {
            Ok(page) => {
                self.idle.lock().await.push(client);
                Ok(page)
            }
            Err(NavigationError::SessionLost) => {
                Err(SlurpError::fetch(url.as_str(), "WebDriver session lost"))
            }
            Err(NavigationError::Command(error)) => {
                self.idle.lock().await.push(client);
                Err(SlurpError::fetch(url.as_str(), error))
            }
        }
    }

    async fn shutdown(&self) {
        let clients: Vec<Client> = self.idle.lock().await.drain(..).collect();
        for client in clients {
            if let Err(e) = client.close().await {
                ::log::warn!("Failed to close WebDriver session: {}", e);
            }
        }
    }
}

enum NavigationError {
    SessionLost,
    Command(fantoccini::error::CmdError),
}

impl From<fantoccini::error::CmdError> for NavigationError {
    fn from(error: fantoccini::error::CmdError) -> Self {
        if error.to_string().contains("Unable to find session") {
            NavigationError::SessionLost
        } else {
            NavigationError::Command(error)
        }
    }
}

async fn navigate(client: &Client, url: &Url) -> std::result::Result<LoadedPage, NavigationError> {
    client.goto(url.as_str()).await?;
    let source = client.source().await?;
    let final_url = client.current_url().await.unwrap_or_else(|_| url.clone());

    Ok(LoadedPage {
        url: final_url,
        content_type: None,
        body: source.into_bytes(),
    })
}

/// Connects to the WebDriver instance, trying common local endpoints when
/// the configured one is unreachable
async fn connect_to_webdriver(webdriver_url: &str) -> Result<Client> {
    match ClientBuilder::native().connect(webdriver_url).await {
        Ok(client) => {
            ::log::debug!("Connected to WebDriver at {}", webdriver_url);
            return Ok(client);
        }
        Err(e) => {
            ::log::error!("Failed to connect to WebDriver at {}: {}", webdriver_url, e);
        }
    }

    let fallback_urls = [
        "http://localhost:9515", // ChromeDriver default
        "http://localhost:4444", // geckodriver / Selenium default
        "http://127.0.0.1:4444",
    ];

    for url in fallback_urls.iter().filter(|url| **url != webdriver_url) {
        ::log::info!("Trying fallback WebDriver URL: {}", url);
        if let Ok(client) = ClientBuilder::native().connect(url).await {
            ::log::debug!("Connected to fallback WebDriver at {}", url);
            return Ok(client);
        }
    }

    Err(SlurpError::fetch(
        webdriver_url,
        "no WebDriver server reachable; start one or set WEBDRIVER_URL",
    ))
}
