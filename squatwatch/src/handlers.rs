use anyhow::Context;
use clap::ArgMatches;
use colored::Colorize;
use squatwatch_core::report::{
    generate_csv_report, generate_json_report, generate_text_report, report_timestamp,
    save_report,
};
use squatwatch_core::search::{SearchOptions, SearchProgressCallback, execute_search};
use squatwatch_scanner::{DriverBackend, ProxyConfig, RadarSearcher, SearchResult};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use url::Url;

/// Everything a search run needs, pulled out of the parsed command line.
#[derive(Debug, Clone)]
pub struct SearchArgs {
    pub domain: Option<String>,
    pub input_list: Option<PathBuf>,
    pub proxy: Option<ProxyConfig>,
    pub csv_out: Option<PathBuf>,
    pub json_out: Option<PathBuf>,
    pub keep_open: bool,
    pub threads: usize,
    pub headless: bool,
    pub webdriver_url: Option<Url>,
}

impl SearchArgs {
    pub fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            domain: matches.get_one::<String>("domain").cloned(),
            input_list: matches.get_one::<PathBuf>("input-list").cloned(),
            proxy: matches.get_one::<ProxyConfig>("proxy").cloned(),
            csv_out: matches.get_one::<String>("csv-out").map(|p| expand_path(p)),
            json_out: matches.get_one::<String>("json-out").map(|p| expand_path(p)),
            keep_open: matches.get_flag("x"),
            threads: *matches.get_one::<usize>("threads").unwrap_or(&4),
            headless: matches.get_flag("headless"),
            webdriver_url: matches.get_one::<Url>("webdriver-url").cloned(),
        }
    }
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Tracing filter for a `-v` count: info, then debug for our crates, then
/// debug everywhere, then trace.
pub fn log_filter(verbosity: u8) -> String {
    match verbosity {
        0 => "info".to_string(),
        1 => "info,squatwatch=debug,squatwatch_core=debug,squatwatch_scanner=debug".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Pick the tracing filter: a valid, non-empty `RUST_LOG` wins over `-v`.
pub fn env_filter(verbosity: u8, rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .map(str::trim)
        .filter(|directives| !directives.is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(log_filter(verbosity)))
}

/// Install the fmt subscriber.
pub fn init_logging(verbosity: u8) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = env_filter(verbosity, rust_log.as_deref());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

// Helper functions for search handler

/// Load domains from either a list file or a single domain argument
pub fn load_domains_from_source(
    domain: Option<&String>,
    input_list: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(list_path) = input_list {
        load_domains_from_file(list_path)
    } else if let Some(domain) = domain {
        parse_domain_line(domain)
            .map(|d| vec![d])
            .ok_or_else(|| format!("Invalid domain '{}'", domain))
    } else {
        Err("Must supply either the -d or -iL options.".to_string())
    }
}

/// Load and normalize domains from a file, skipping blanks, comments and duplicates
pub fn load_domains_from_file(path: &PathBuf) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read input list {}: {}", path.display(), e))?;

    let mut domains: Vec<String> = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_domain_line(line) {
            Some(domain) if !domains.contains(&domain) => domains.push(domain),
            Some(_) => {}
            None => eprintln!("⚠️  Skipping invalid domain '{}'", line),
        }
    }

    if domains.is_empty() {
        return Err(format!("No valid domains found in {}", path.display()));
    }

    Ok(domains)
}

/// Reduce a line to a bare host name: scheme, port and path are dropped and
/// the result is lowercased.
pub fn parse_domain_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let candidate = if line.contains("://") {
        line.to_string()
    } else {
        format!("http://{}", line)
    };

    let url = Url::parse(&candidate).ok()?;
    let host = url.host_str()?.trim_end_matches('.').to_lowercase();

    if host.contains('.') { Some(host) } else { None }
}

fn build_searcher(args: &SearchArgs) -> Result<RadarSearcher, String> {
    let backend = match &args.webdriver_url {
        Some(url) => DriverBackend::Remote(url.clone()),
        None => DriverBackend::locate_gecko().map_err(|e| e.to_string())?,
    };

    Ok(RadarSearcher::new(backend)
        .with_proxy(args.proxy.clone())
        .with_headless(args.headless)
        .with_keep_open(args.keep_open))
}

/// Write the requested CSV/JSON exports.
pub fn write_outputs(
    results: &[SearchResult],
    csv_out: Option<&PathBuf>,
    json_out: Option<&PathBuf>,
) -> anyhow::Result<()> {
    if let Some(path) = csv_out {
        info!("Dumping results to csv...");
        let csv = generate_csv_report(results).context("Failed to build csv report")?;
        save_report(&csv, path).with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if let Some(path) = json_out {
        info!("Dumping results to json...");
        let json = generate_json_report(results, &report_timestamp())
            .context("Failed to build json report")?;
        save_report(&json, path).with_context(|| format!("Failed to write {}", path.display()))?;
    }

    Ok(())
}

pub async fn handle_search(matches: &ArgMatches) {
    let args = SearchArgs::from_matches(matches);

    let domains = match load_domains_from_source(args.domain.as_ref(), args.input_list.as_ref()) {
        Ok(domains) => domains,
        Err(e) => {
            eprintln!("✗ {}", e);
            std::process::exit(1);
        }
    };

    let searcher = match build_searcher(&args) {
        Ok(searcher) => searcher,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    println!("\n{} Searching {} domain(s)", "→".blue(), domains.len());
    if domains.len() > 1 {
        println!("Workers: {}", args.threads);
    }
    if let Some(ref proxy) = args.proxy {
        println!("Proxy: {}", proxy);
    }
    println!();

    let options = SearchOptions {
        domains,
        threads: args.threads,
        show_progress_bars: true,
    };

    let progress_callback: SearchProgressCallback = Arc::new(|msg: String| {
        println!("{}", msg);
    });

    let outcome = match execute_search(&searcher, options, Some(progress_callback)).await {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("{} Search failed: {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    for failure in &outcome.failures {
        eprintln!(
            "{} {}: {}",
            "✗".red().bold(),
            failure.domain.bright_white(),
            failure.reason
        );
    }

    if outcome.results.is_empty() {
        eprintln!("{} No lookups succeeded", "✗".red().bold());
        std::process::exit(1);
    }

    println!("\n{} Search complete!\n", "✓".green().bold());
    print!("{}", generate_text_report(&outcome.results));

    if let Err(e) = write_outputs(
        &outcome.results,
        args.csv_out.as_ref(),
        args.json_out.as_ref(),
    ) {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }

    for path in args.csv_out.iter().chain(args.json_out.iter()) {
        println!("{} Wrote {}", "✓".green().bold(), path.display());
    }
}
