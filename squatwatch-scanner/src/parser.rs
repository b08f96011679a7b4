// Extraction of squatting rows from a rendered Radar results page

use crate::error::{Result, ScanError};
use crate::result::{SquatKind, SquatRecord};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

const ROW_SELECTOR: &str = "tr.mutator_true.row_score.row_score_";
const DOMAIN_BASE: &str = "span.pull-left.label.label-part-of-url.http.full-width-mutator";
/// Later entries win when a row carries more than one.
const DOMAIN_STATES: [&str; 4] = [
    ".status_active.mutation-malicious",
    ".status_inactive.mutation-malicious",
    ".status_active.mutation-legitimate",
    ".status_inactive.mutation-legitimate",
];
const SERVER_INFO_SELECTOR: &str = "div.vcenter";
const WEB_SERVER_SELECTOR: &str = "i.fa.fa-globe";
const EMAIL_SERVER_SELECTOR: &str = "i.fa.fa-envelope";
const COUNTRY_SELECTOR: &str = "span.pull-left.label.label-info.countrycode";
const IP_SELECTOR: &str = "span.label.label-gray.pull-left";
const REGISTRY_SELECTOR: &str = "span.label.label-gray.registrar_popover";
const PHISHING_SELECTOR: &str = "div#search-block1 div.new-alert__description";
const NO_PHISHING_TEXT: &str = "No phishing websites found";

/// What the phishing block of a results page says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhishingStatus {
    Clear,
    Listed(String),
    Missing,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScanError::ParseError(format!("bad selector '{}': {}", css, e)))
}

struct RowSelectors {
    domains: Vec<Selector>,
    server_info: Selector,
    web_server: Selector,
    email_server: Selector,
    country: Selector,
    ip: Selector,
    registry: Selector,
}

impl RowSelectors {
    fn new() -> Result<Self> {
        let domains = DOMAIN_STATES
            .iter()
            .map(|state| selector(&format!("{}{}", DOMAIN_BASE, state)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            domains,
            server_info: selector(SERVER_INFO_SELECTOR)?,
            web_server: selector(WEB_SERVER_SELECTOR)?,
            email_server: selector(EMAIL_SERVER_SELECTOR)?,
            country: selector(COUNTRY_SELECTOR)?,
            ip: selector(IP_SELECTOR)?,
            registry: selector(REGISTRY_SELECTOR)?,
        })
    }
}

/// Parse both squatting tables out of a full results page.
///
/// Cybersquatting rows come first, then typosquatting rows.
pub fn parse_results_page(html: &str, search_domain: &str) -> Result<Vec<SquatRecord>> {
    let document = Html::parse_document(html);

    match phishing_status(&document)? {
        PhishingStatus::Clear => {
            debug!("Found no potential phishing websites for {}.", search_domain)
        }
        PhishingStatus::Listed(text) => warn!(
            "Radar lists potential phishing websites for {} ({}); phishing rows are not extracted",
            search_domain, text
        ),
        PhishingStatus::Missing => {
            debug!("No phishing block on the results page for {}", search_domain)
        }
    }

    let mut records = parse_squats(&document, search_domain, SquatKind::CyberSquatting)?;
    records.extend(parse_squats(&document, search_domain, SquatKind::TypoSquatting)?);
    Ok(records)
}

/// Parse the rows of one squatting table. Rows without a domain are dropped.
pub fn parse_squats(
    document: &Html,
    search_domain: &str,
    kind: SquatKind,
) -> Result<Vec<SquatRecord>> {
    let table_selector = selector(&format!("table#{}", kind.table_id()))?;
    let Some(table) = document.select(&table_selector).next() else {
        warn!("Found no {} table for {}.", kind, search_domain);
        return Ok(Vec::new());
    };

    let row_selector = selector(ROW_SELECTOR)?;
    let selectors = RowSelectors::new()?;
    let mut records = Vec::new();

    for row in table.select(&row_selector) {
        match parse_row(row, &selectors) {
            Some(record) => {
                debug!("Found result for search: {:?}", record);
                records.push(record);
            }
            None => warn!("Unknown domain type @ {}: {}", kind, search_domain),
        }
    }

    if records.is_empty() {
        warn!("Found no results for {} domains for {}.", kind, search_domain);
    } else {
        info!(
            "Extracted a total of {} {} domains for {}.",
            records.len(),
            kind,
            search_domain
        );
    }

    Ok(records)
}

fn parse_row(row: ElementRef, selectors: &RowSelectors) -> Option<SquatRecord> {
    let domain = selectors
        .domains
        .iter()
        .filter_map(|sel| row.select(sel).next())
        .last()
        .map(|span| squash_whitespace(&element_text(span)))
        .filter(|d| !d.is_empty())?;

    let mut record = SquatRecord::new(domain);

    if let Some(server_info) = row.select(&selectors.server_info).next() {
        record.web_server = server_info.select(&selectors.web_server).next().is_some();
        record.email_server = server_info.select(&selectors.email_server).next().is_some();
    }

    record.country_code = row
        .select(&selectors.country)
        .next()
        .and_then(|cc| cc.value().attr("data-content"))
        .map(str::to_string);

    record.ip = row
        .select(&selectors.ip)
        .next()
        .map(|ip| element_text(ip).trim().to_string())
        .filter(|ip| !ip.is_empty());

    // The "created" column only carries the registration date; the full
    // registry record lives in the popover content.
    if let Some(raw) = row
        .select(&selectors.registry)
        .next()
        .and_then(|r| r.value().attr("data-content"))
    {
        record.registry_info = parse_registry_info(raw);
    }

    Some(record)
}

/// Split registrar popover content (`Key: value<br>Key: value`) into a map.
pub fn parse_registry_info(raw: &str) -> BTreeMap<String, String> {
    raw.split("<br>")
        .filter_map(|entry| entry.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

pub fn phishing_status(document: &Html) -> Result<PhishingStatus> {
    let phishing_selector = selector(PHISHING_SELECTOR)?;
    Ok(match document.select(&phishing_selector).next() {
        Some(description) => {
            let text = element_text(description).trim().to_string();
            if text == NO_PHISHING_TEXT {
                PhishingStatus::Clear
            } else {
                PhishingStatus::Listed(text)
            }
        }
        None => PhishingStatus::Missing,
    })
}

/// The search id is whatever sits between the first and second `=` of the
/// results URL.
pub fn extract_search_id(url: &str) -> Option<String> {
    url.split('=')
        .nth(1)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn element_text(element: ElementRef) -> String {
    element.text().collect()
}

fn squash_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}
