use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use squatwatch_scanner::{RadarSearcher, SearchResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Options for configuring a batch of lookups
pub struct SearchOptions {
    pub domains: Vec<String>,
    pub threads: usize,
    pub show_progress_bars: bool,
}

/// Callback for reporting search progress
pub type SearchProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// A lookup that gave up without results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFailure {
    pub domain: String,
    pub reason: String,
}

/// Everything a batch produced. Results arrive in completion order.
#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub failures: Vec<SearchFailure>,
}

impl SearchOutcome {
    pub fn total_records(&self) -> usize {
        self.results.iter().map(|r| r.results.len()).sum()
    }
}

/// Look up every domain, running at most `threads` browser sessions at once.
///
/// A failed domain is recorded and skipped. A fatal error (bad proxy, no
/// driver) stops the batch and is returned as `Err` once the lookups already
/// running have finished and closed their browsers.
pub async fn execute_search(
    searcher: &RadarSearcher,
    options: SearchOptions,
    progress_callback: Option<SearchProgressCallback>,
) -> Result<SearchOutcome, String> {
    let SearchOptions {
        domains,
        threads,
        show_progress_bars,
    } = options;

    if domains.is_empty() {
        return Err("No domains to search".to_string());
    }

    let total = domains.len();
    let progress_bar = if show_progress_bars && total > 1 {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .map_err(|e| e.to_string())?,
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Searching {} domains...", total));
        Some(pb)
    } else {
        None
    };

    // Set once a fatal error comes back. Lookups not yet started are skipped,
    // while in-flight ones run to completion so their sessions get closed.
    let aborted = AtomicBool::new(false);
    let aborted = &aborted;

    let mut lookups = stream::iter(domains)
        .map(|domain| async move {
            if aborted.load(Ordering::SeqCst) {
                return (domain, None);
            }
            let result = searcher.search(&domain).await;
            (domain, Some(result))
        })
        .buffer_unordered(threads.max(1));

    let mut outcome = SearchOutcome::default();
    let mut fatal: Option<String> = None;
    let mut done = 0;

    while let Some((domain, result)) = lookups.next().await {
        done += 1;
        let Some(result) = result else {
            debug!("Skipped {} after abort", domain);
            continue;
        };

        match result {
            Ok(found) => {
                if let Some(ref callback) = progress_callback {
                    callback(format!(
                        "[{}/{}] {}: {} squatting domains",
                        done,
                        total,
                        domain,
                        found.results.len()
                    ));
                }
                outcome.results.push(found);
            }
            Err(e) if e.is_fatal() => {
                error!("Aborting search at {}: {}", domain, e);
                aborted.store(true, Ordering::SeqCst);
                if let Some(ref pb) = progress_bar {
                    pb.set_message("Aborting, waiting for running lookups to close...");
                }
                fatal.get_or_insert_with(|| e.to_string());
            }
            Err(e) => {
                warn!("Search for {} failed: {}", domain, e);
                if let Some(ref callback) = progress_callback {
                    callback(format!("[{}/{}] [!] {} failed: {}", done, total, domain, e));
                }
                outcome.failures.push(SearchFailure {
                    domain,
                    reason: e.to_string(),
                });
            }
        }

        if let Some(ref pb) = progress_bar {
            if fatal.is_none() {
                pb.set_message(format!("Searched {}/{} domains", done, total));
            }
        }
    }

    if let Some(reason) = fatal {
        if let Some(ref pb) = progress_bar {
            pb.finish_and_clear();
        }
        return Err(reason);
    }

    if let Some(ref pb) = progress_bar {
        pb.finish_with_message(format!(
            "Search complete! {} domains, {} squatting domains found",
            total,
            outcome.total_records()
        ));
    }

    Ok(outcome)
}
