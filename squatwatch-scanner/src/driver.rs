// Locating and launching the WebDriver endpoint a lookup talks to

use crate::error::{Result, ScanError};
use crate::webdriver;
use reqwest::Client;
use std::ffi::OsStr;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::{Instant, sleep};
use tracing::{debug, info};
use url::Url;

pub const GECKODRIVER: &str = "geckodriver";

/// Where WebDriver sessions come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverBackend {
    /// Spawn a private geckodriver per lookup.
    Gecko(PathBuf),
    /// Use an already running WebDriver server.
    Remote(Url),
}

impl DriverBackend {
    /// Find geckodriver on `$PATH`.
    pub fn locate_gecko() -> Result<Self> {
        let search_path = std::env::var_os("PATH").unwrap_or_default();
        Self::locate_gecko_in(search_path)
    }

    /// Find geckodriver on the given `PATH`-style search list.
    pub fn locate_gecko_in<P: AsRef<OsStr>>(search_path: P) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let path = which::which_in(GECKODRIVER, Some(search_path), cwd)
            .map_err(|_| ScanError::DriverNotFound(GECKODRIVER.to_string()))?;
        debug!("Using {}", path.display());
        Ok(DriverBackend::Gecko(path))
    }
}

/// A running WebDriver endpoint. A spawned geckodriver is killed on drop
/// unless it was detached.
pub struct DriverHandle {
    endpoint: Url,
    process: Option<Child>,
}

impl DriverHandle {
    pub async fn start(backend: &DriverBackend, client: &Client, keep_open: bool) -> Result<Self> {
        match backend {
            DriverBackend::Remote(endpoint) => Ok(Self {
                endpoint: endpoint.clone(),
                process: None,
            }),
            DriverBackend::Gecko(binary) => spawn_gecko(binary, client, keep_open).await,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Stop a spawned driver. Remote endpoints are left alone.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(mut child) = self.process.take() {
            child.kill().await?;
            debug!("Stopped {} at {}", GECKODRIVER, self.endpoint);
        }
        Ok(())
    }

    /// Leave a spawned driver running after this handle is gone.
    pub fn detach(mut self) {
        if let Some(child) = self.process.take() {
            info!(
                "Leaving {} (pid {:?}) running at {}",
                GECKODRIVER,
                child.id(),
                self.endpoint
            );
        }
    }
}

async fn spawn_gecko(binary: &Path, client: &Client, keep_open: bool) -> Result<DriverHandle> {
    let port = free_port()?;
    let endpoint = Url::parse(&format!("http://127.0.0.1:{}/", port))
        .map_err(|e| ScanError::InvalidUrl(e.to_string()))?;

    debug!("Starting {} on port {}", binary.display(), port);
    let child = Command::new(binary)
        .arg("--port")
        .arg(port.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(!keep_open)
        .spawn()
        .map_err(|e| ScanError::DriverStartup(format!("{}: {}", binary.display(), e)))?;

    let handle = DriverHandle {
        endpoint,
        process: Some(child),
    };
    wait_until_ready(client, handle.endpoint(), Duration::from_secs(15)).await?;
    Ok(handle)
}

async fn wait_until_ready(client: &Client, endpoint: &Url, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(true) = webdriver::is_ready(client, endpoint).await {
            debug!("WebDriver ready at {}", endpoint);
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(ScanError::DriverStartup(format!(
                "no ready status from {} after {}s",
                endpoint,
                timeout.as_secs()
            )));
        }
        sleep(Duration::from_millis(100)).await;
    }
}

fn free_port() -> Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}
