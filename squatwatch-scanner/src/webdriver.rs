//! Minimal W3C WebDriver client.
//!
//! Only the commands a Radar lookup needs are covered: session lifecycle,
//! navigation, element lookup and interaction, and reading the page source.

use crate::error::{Result, ScanError};
use reqwest::{Client, Method};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, trace};
use url::Url;

/// Key under which W3C drivers return element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// WebDriver code for a missing element.
pub const NO_SUCH_ELEMENT: &str = "no such element";
/// WebDriver code for an element that went away between lookup and use.
pub const STALE_ELEMENT: &str = "stale element reference";
/// WebDriver code for a modal dialog blocking the page.
pub const UNEXPECTED_ALERT: &str = "unexpected alert open";

/// The Enter key in WebDriver's key encoding.
pub const KEY_ENTER: &str = "\u{E007}";

/// How to find an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Id(String),
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn id(id: &str) -> Self {
        Locator::Id(id.to_string())
    }

    pub fn xpath(path: &str) -> Self {
        Locator::XPath(path.to_string())
    }

    fn strategy(&self) -> (&'static str, String) {
        match self {
            Locator::Id(id) => ("css selector", format!("#{}", id)),
            Locator::Css(css) => ("css selector", css.clone()),
            Locator::XPath(path) => ("xpath", path.clone()),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Locator::Id(id) => format!("#{}", id),
            Locator::Css(css) => css.clone(),
            Locator::XPath(path) => path.clone(),
        }
    }
}

/// An element reference handed out by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub id: String,
}

/// A live browser session on a WebDriver endpoint.
pub struct Session {
    client: Client,
    endpoint: Url,
    session_id: String,
    poll_interval: Duration,
}

impl Session {
    /// Open a new session with the given `capabilities.alwaysMatch` object.
    pub async fn create(client: &Client, endpoint: &Url, capabilities: Value) -> Result<Self> {
        let body = json!({ "capabilities": { "alwaysMatch": capabilities } });
        let value = send(client, Method::POST, join(endpoint, "session")?, Some(body)).await?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| ScanError::ParseError("new session response has no sessionId".into()))?
            .to_string();

        debug!("Opened WebDriver session {}", session_id);

        Ok(Self {
            client: client.clone(),
            endpoint: endpoint.clone(),
            session_id,
            poll_interval: Duration::from_millis(500),
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn id(&self) -> &str {
        &self.session_id
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = join(&self.endpoint, &format!("session/{}/{}", self.session_id, path))?;
        send(&self.client, method, url, body).await
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        self.command(Method::POST, "url", Some(json!({ "url": url }))).await?;
        Ok(())
    }

    pub async fn current_url(&self) -> Result<String> {
        let value = self.command(Method::GET, "url", None).await?;
        as_string(value, "current url")
    }

    pub async fn page_source(&self) -> Result<String> {
        let value = self.command(Method::GET, "source", None).await?;
        as_string(value, "page source")
    }

    pub async fn find_element(&self, locator: &Locator) -> Result<Element> {
        let (using, value) = locator.strategy();
        let found = self
            .command(Method::POST, "element", Some(json!({ "using": using, "value": value })))
            .await?;

        found
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(|id| Element { id: id.to_string() })
            .ok_or_else(|| ScanError::ParseError(format!("no element reference for {}", locator.describe())))
    }

    pub async fn is_displayed(&self, element: &Element) -> Result<bool> {
        let value = self
            .command(Method::GET, &format!("element/{}/displayed", element.id), None)
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    pub async fn is_enabled(&self, element: &Element) -> Result<bool> {
        let value = self
            .command(Method::GET, &format!("element/{}/enabled", element.id), None)
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    pub async fn click(&self, element: &Element) -> Result<()> {
        self.command(Method::POST, &format!("element/{}/click", element.id), Some(json!({})))
            .await?;
        Ok(())
    }

    pub async fn send_keys(&self, element: &Element, text: &str) -> Result<()> {
        self.command(
            Method::POST,
            &format!("element/{}/value", element.id),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    /// Poll until the element exists, is displayed and is enabled.
    ///
    /// Missing and stale elements keep the poll going; any other driver
    /// error ends it immediately.
    pub async fn wait_for_clickable(&self, locator: &Locator, timeout: Duration) -> Result<Element> {
        let deadline = Instant::now() + timeout;

        loop {
            match self.clickable(locator).await {
                Ok(Some(element)) => return Ok(element),
                Ok(None) => trace!("{} present but not clickable yet", locator.describe()),
                Err(e) if is_transient(&e) => {
                    trace!("{} not present yet ({})", locator.describe(), e);
                }
                Err(e) => return Err(e),
            }

            if Instant::now() >= deadline {
                return Err(ScanError::ElementTimeout {
                    what: locator.describe(),
                    seconds: timeout.as_secs(),
                });
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn clickable(&self, locator: &Locator) -> Result<Option<Element>> {
        let element = self.find_element(locator).await?;
        if self.is_displayed(&element).await? && self.is_enabled(&element).await? {
            Ok(Some(element))
        } else {
            Ok(None)
        }
    }

    /// End the session, closing the browser.
    pub async fn quit(self) -> Result<()> {
        let url = join(&self.endpoint, &format!("session/{}", self.session_id))?;
        send(&self.client, Method::DELETE, url, None).await?;
        debug!("Closed WebDriver session {}", self.session_id);
        Ok(())
    }
}

/// Ask the driver whether it can accept a new session.
pub async fn is_ready(client: &Client, endpoint: &Url) -> Result<bool> {
    let value = send(client, Method::GET, join(endpoint, "status")?, None).await?;
    Ok(value.get("ready").and_then(Value::as_bool).unwrap_or(false))
}

/// Capabilities for a Firefox session, with optional proxy preferences.
pub fn firefox_capabilities(prefs: serde_json::Map<String, Value>, headless: bool) -> Value {
    let mut options = json!({ "prefs": Value::Object(prefs) });
    if headless {
        options["args"] = json!(["-headless"]);
    }
    json!({
        "browserName": "firefox",
        "moz:firefoxOptions": options,
    })
}

/// Element went away or is not there yet; the page is still rendering.
fn is_transient(error: &ScanError) -> bool {
    matches!(error.webdriver_code(), Some(NO_SUCH_ELEMENT | STALE_ELEMENT))
}

fn join(endpoint: &Url, path: &str) -> Result<Url> {
    // Keep any base path of a remote endpoint (e.g. `/wd/hub/`).
    let mut base = endpoint.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path)
        .map_err(|e| ScanError::InvalidUrl(format!("{}{}: {}", endpoint, path, e)))
}

async fn send(client: &Client, method: Method, url: Url, body: Option<Value>) -> Result<Value> {
    trace!("WebDriver {} {}", method, url);
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.send().await?;
    let status = response.status();
    let payload: Value = response.json().await?;
    let value = payload.get("value").cloned().unwrap_or(Value::Null);

    if let Some(error) = value.get("error").and_then(Value::as_str) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(ScanError::WebDriver {
            error: error.to_string(),
            message,
        });
    }

    if !status.is_success() {
        return Err(ScanError::WebDriver {
            error: format!("http {}", status.as_u16()),
            message: payload.to_string(),
        });
    }

    Ok(value)
}

fn as_string(value: Value, what: &str) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(ScanError::ParseError(format!("expected {} string, got {}", what, other))),
    }
}
