use crate::driver::{DriverBackend, DriverHandle};
use crate::error::{Result, ScanError};
use crate::parser;
use crate::proxy::ProxyConfig;
use crate::result::SearchResult;
use crate::retry::{RetryPolicy, retry};
use crate::webdriver::{self, KEY_ENTER, Locator, Session, UNEXPECTED_ALERT};
use reqwest::Client;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

pub const RADAR_URL: &str = "https://www.immuniweb.com/radar/";

const SEARCH_BOX_ID: &str = "phishsearch-domain";
const RESULT_SECTION_IDS: [&str; 4] = [
    "potential-cybersquatting",
    "potential-typosquatting",
    "phishing-container",
    "social-networks",
];
const CYBER_EXPAND_XPATH: &str =
    "/html/body/div[3]/main/div[3]/div[5]/div/div[3]/div[2]/div[1]/div[2]/div/div/i";
const TYPO_EXPAND_XPATH: &str =
    "/html/body/div[3]/main/div[3]/div[5]/div/div[4]/div[2]/div[1]/div[2]/div/div/i";

/// Wait limits for the different stages of a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTimings {
    pub search_box: Duration,
    pub result_sections: Duration,
    pub expand_buttons: Duration,
    /// Pause after each expander click while the list loads.
    pub list_settle: Duration,
    pub poll_interval: Duration,
}

impl Default for SearchTimings {
    fn default() -> Self {
        Self {
            search_box: Duration::from_secs(20),
            result_sections: Duration::from_secs(30),
            expand_buttons: Duration::from_secs(3),
            list_settle: Duration::from_secs(10),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Runs domain lookups against ImmuniWeb Radar through a WebDriver browser.
pub struct RadarSearcher {
    client: Client,
    backend: DriverBackend,
    base_url: String,
    proxy: Option<ProxyConfig>,
    headless: bool,
    keep_open: bool,
    timings: SearchTimings,
    retry_policy: RetryPolicy,
}

impl RadarSearcher {
    pub fn new(backend: DriverBackend) -> Self {
        Self {
            client: Client::new(),
            backend,
            base_url: RADAR_URL.to_string(),
            proxy: None,
            headless: false,
            keep_open: false,
            timings: SearchTimings::default(),
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_proxy(mut self, proxy: Option<ProxyConfig>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Leave the browser open after the lookup, for debugging.
    pub fn with_keep_open(mut self, keep_open: bool) -> Self {
        self.keep_open = keep_open;
        self
    }

    pub fn with_timings(mut self, timings: SearchTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Look up one domain, re-running the whole browser session on timeouts.
    pub async fn search(&self, domain: &str) -> Result<SearchResult> {
        let label = format!("Search for {}", domain);
        retry(&self.retry_policy, &label, |_| self.search_once(domain)).await
    }

    async fn search_once(&self, domain: &str) -> Result<SearchResult> {
        info!("Searching {} @ {}...", domain, self.base_url);

        let driver = DriverHandle::start(&self.backend, &self.client, self.keep_open).await?;
        let capabilities = self.capabilities();

        let session = match Session::create(&self.client, driver.endpoint(), capabilities).await {
            Ok(session) => session.with_poll_interval(self.timings.poll_interval),
            Err(e) => {
                let _ = driver.shutdown().await;
                return Err(e);
            }
        };

        let outcome = self.drive(&session, domain).await;

        if self.keep_open {
            debug!("Keeping webdriver open for search: {}!", domain);
            driver.detach();
        } else {
            debug!("Closing WebDriver session for search: {}.", domain);
            if let Err(e) = session.quit().await {
                warn!("Failed to close WebDriver session for {}: {}", domain, e);
            }
            if let Err(e) = driver.shutdown().await {
                warn!("Failed to stop WebDriver for {}: {}", domain, e);
            }
        }

        let (search_id, html) = outcome?;
        let mut result = SearchResult::new(domain.to_string());
        result.search_id = search_id;
        result.results = parser::parse_results_page(&html, domain)?;
        Ok(result)
    }

    fn capabilities(&self) -> serde_json::Value {
        let prefs = match &self.proxy {
            Some(proxy) => {
                debug!("Using proxy: {}", proxy);
                proxy.firefox_prefs()
            }
            None => serde_json::Map::new(),
        };
        webdriver::firefox_capabilities(prefs, self.headless)
    }

    /// Submit the search and expand both squatting lists. Returns the search
    /// id and the final page source.
    async fn drive(&self, session: &Session, domain: &str) -> Result<(Option<String>, String)> {
        session.navigate(&self.base_url).await?;

        let search_box = session
            .wait_for_clickable(&Locator::id(SEARCH_BOX_ID), self.timings.search_box)
            .await
            .map_err(|e| match e.webdriver_code() {
                Some(UNEXPECTED_ALERT) => ScanError::ProxyConnection(e.to_string()),
                _ => e,
            })?;

        session.click(&search_box).await?;
        session.send_keys(&search_box, domain).await?;
        session.send_keys(&search_box, KEY_ENTER).await?;

        for section in RESULT_SECTION_IDS {
            if let Err(e) = session
                .wait_for_clickable(&Locator::id(section), self.timings.result_sections)
                .await
            {
                error!("Could not find the elements. Proxy issue? {}", e);
                return Err(e);
            }
        }

        let mut expanders = Vec::with_capacity(2);
        for xpath in [CYBER_EXPAND_XPATH, TYPO_EXPAND_XPATH] {
            match session
                .wait_for_clickable(&Locator::xpath(xpath), self.timings.expand_buttons)
                .await
            {
                Ok(button) => expanders.push(button),
                Err(e) => {
                    warn!(
                        "Could not find expansion button for {}. Likely a locked IP. Retrying the request...",
                        domain
                    );
                    return Err(e);
                }
            }
        }

        for button in &expanders {
            session.click(button).await?;
            sleep(self.timings.list_settle).await;
        }

        let current_url = session.current_url().await?;
        let search_id = parser::extract_search_id(&current_url);
        match &search_id {
            Some(id) => debug!("Got our id: {}", id),
            None => debug!("No search id in {}", current_url),
        }

        let html = session.page_source().await?;
        Ok((search_id, html))
    }
}
