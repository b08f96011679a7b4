use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One squatting domain found for a searched domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SquatRecord {
    pub domain: String,
    pub country_code: Option<String>,
    pub ip: Option<String>,
    pub web_server: bool,
    pub email_server: bool,
    pub registry_info: BTreeMap<String, String>,
}

impl SquatRecord {
    pub fn new(domain: String) -> Self {
        Self {
            domain,
            country_code: None,
            ip: None,
            web_server: false,
            email_server: false,
            registry_info: BTreeMap::new(),
        }
    }
}

/// All records returned by one Radar lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub domain: String,
    pub search_id: Option<String>,
    pub results: Vec<SquatRecord>,
}

impl SearchResult {
    pub fn new(domain: String) -> Self {
        Self {
            domain,
            search_id: None,
            results: Vec::new(),
        }
    }
}

/// Which Radar result table a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SquatKind {
    CyberSquatting,
    TypoSquatting,
}

impl SquatKind {
    /// Id of the results table on the Radar page
    pub fn table_id(&self) -> &'static str {
        match self {
            SquatKind::CyberSquatting => "results4",
            SquatKind::TypoSquatting => "results2",
        }
    }
}

impl fmt::Display for SquatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SquatKind::CyberSquatting => write!(f, "CyberSquatting"),
            SquatKind::TypoSquatting => write!(f, "TypoSquatting"),
        }
    }
}
