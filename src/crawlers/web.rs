use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder};
use tokio::sync::Mutex;

use crate::crawlers::{PageError, PageLoader, PageSource};

/// Common local WebDriver addresses tried when the configured one is unreachable
const FALLBACK_WEBDRIVER_URLS: [&str; 4] = [
    "http://localhost:9515", // ChromeDriver default
    "http://localhost:4723", // Appium default
    "http://localhost:9222", // Chrome debug port default
    "http://127.0.0.1:4444",
];

pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";

/// A page loaded in a browser driven over WebDriver
pub struct WebDriverPage {
    client: Client,
}

impl WebDriverPage {
    /// Connect to a WebDriver server, falling back to common local ports
    pub async fn connect(webdriver_url: &str) -> Result<Client, PageError> {
        match ClientBuilder::native().connect(webdriver_url).await {
            Ok(client) => {
                ::log::debug!("Connected to WebDriver at {}", webdriver_url);
                return Ok(client);
            }
            Err(e) => {
                ::log::error!("Failed to connect to WebDriver at {}: {}", webdriver_url, e);
            }
        }

        for url in FALLBACK_WEBDRIVER_URLS {
            if url == webdriver_url {
                continue;
            }

            ::log::info!("Trying fallback WebDriver URL: {}", url);
            if let Ok(client) = ClientBuilder::native().connect(url).await {
                ::log::debug!("Connected to fallback WebDriver at {}", url);
                return Ok(client);
            }
        }

        Err(PageError::WebDriver(format!(
            "no WebDriver server reachable at {} or the usual local ports",
            webdriver_url
        )))
    }

    /// Navigate the browser to `url`
    pub async fn open(client: Client, url: &str) -> Result<Self, PageError> {
        client.goto(url).await.map_err(|e| {
            if e.to_string().contains("Unable to find session") {
                ::log::warn!("Lost WebDriver session while opening {}", url);
            }
            PageError::WebDriver(format!("navigation to {} failed: {}", url, e))
        })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageSource for WebDriverPage {
    async fn is_ready(&self) -> bool {
        match self
            .client
            .execute("return document.readyState;", Vec::new())
            .await
        {
            Ok(state) => state.as_str() == Some("complete"),
            Err(e) => {
                ::log::debug!("readyState check failed: {}", e);
                false
            }
        }
    }

    async fn url(&self) -> Result<String, PageError> {
        self.client
            .current_url()
            .await
            .map(|url| url.to_string())
            .map_err(|e| PageError::WebDriver(e.to_string()))
    }

    async fn html(&self) -> Result<String, PageError> {
        self.client
            .source()
            .await
            .map_err(|e| PageError::WebDriver(e.to_string()))
    }
}

/// Loads pages in one shared WebDriver session, connecting on first use
pub struct WebDriverLoader {
    webdriver_url: String,
    client: Mutex<Option<Client>>,
}

impl WebDriverLoader {
    pub fn new(webdriver_url: impl Into<String>) -> Self {
        Self {
            webdriver_url: webdriver_url.into(),
            client: Mutex::new(None),
        }
    }

    /// End the shared session, if one was opened
    pub async fn shutdown(&self) {
        if let Some(client) = self.client.lock().await.take() {
            if let Err(e) = client.close().await {
                ::log::warn!("Failed to close WebDriver session: {}", e);
            }
        }
    }
}

#[async_trait]
impl PageLoader for WebDriverLoader {
    async fn load(&self, url: &str) -> Result<Box<dyn PageSource>, PageError> {
        let client = {
            let mut slot = self.client.lock().await;
            match slot.as_ref() {
                Some(client) => client.clone(),
                None => {
                    let client = WebDriverPage::connect(&self.webdriver_url).await?;
                    *slot = Some(client.clone());
                    client
                }
            }
        };

        match WebDriverPage::open(client, url).await {
            Ok(page) => Ok(Box::new(page)),
            Err(e) => {
                // Reconnect on the next load in case the session died
                self.client.lock().await.take();
                Err(e)
            }
        }
    }
}
