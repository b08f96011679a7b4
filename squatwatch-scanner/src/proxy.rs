use crate::error::{Result, ScanError};
use serde_json::{Map, Value, json};
use std::fmt;
use std::str::FromStr;

/// An upstream proxy given as `scheme://host:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl ProxyConfig {
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || ScanError::InvalidProxy(raw.to_string());

        let (scheme, rest) = raw.split_once("://").ok_or_else(invalid)?;
        let rest = rest.trim_end_matches('/');
        let (host, port) = rest.rsplit_once(':').ok_or_else(invalid)?;
        let port: u16 = port.parse().map_err(|_| invalid())?;

        if scheme.is_empty() || host.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            scheme: scheme.to_lowercase(),
            host: host.to_string(),
            port,
        })
    }

    pub fn is_socks(&self) -> bool {
        self.socks_version().is_some()
    }

    fn socks_version(&self) -> Option<u8> {
        match self.scheme.as_str() {
            "socks4" => Some(4),
            "socks5" => Some(5),
            _ => None,
        }
    }

    /// Firefox `about:config` preferences that route traffic through this proxy.
    pub fn firefox_prefs(&self) -> Map<String, Value> {
        let mut prefs = Map::new();
        prefs.insert("network.proxy.type".into(), json!(1));

        if let Some(version) = self.socks_version() {
            prefs.insert("network.proxy.socks".into(), json!(self.host));
            prefs.insert("network.proxy.socks_port".into(), json!(self.port));
            prefs.insert("network.proxy.socks_version".into(), json!(version));
        } else {
            for protocol in ["http", "https", "ssl", "ftp"] {
                prefs.insert(format!("network.proxy.{}", protocol), json!(self.host));
                prefs.insert(format!("network.proxy.{}_port", protocol), json!(self.port));
            }
        }

        prefs
    }
}

impl FromStr for ProxyConfig {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_socks5() {
        let proxy = ProxyConfig::parse("socks5://127.0.0.1:9050").unwrap();
        assert_eq!(proxy.scheme, "socks5");
        assert_eq!(proxy.host, "127.0.0.1");
        assert_eq!(proxy.port, 9050);
        assert!(proxy.is_socks());
    }

    #[test]
    fn test_parse_normalizes_scheme_and_trailing_slash() {
        let proxy = ProxyConfig::parse("HTTP://proxy.local:3128/").unwrap();
        assert_eq!(proxy.scheme, "http");
        assert_eq!(proxy.host, "proxy.local");
        assert_eq!(proxy.port, 3128);
        assert_eq!(proxy.to_string(), "http://proxy.local:3128");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for raw in ["127.0.0.1:9050", "socks5://127.0.0.1", "socks5://:9050", "http://host:notaport", "http://host:70000"] {
            assert!(
                matches!(ProxyConfig::parse(raw), Err(ScanError::InvalidProxy(_))),
                "{} should be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_socks_prefs() {
        let prefs = ProxyConfig::parse("socks4://10.0.0.1:1080").unwrap().firefox_prefs();
        assert_eq!(prefs["network.proxy.type"], json!(1));
        assert_eq!(prefs["network.proxy.socks"], json!("10.0.0.1"));
        assert_eq!(prefs["network.proxy.socks_port"], json!(1080));
        assert_eq!(prefs["network.proxy.socks_version"], json!(4));
        assert!(!prefs.contains_key("network.proxy.http"));
    }

    #[test]
    fn test_http_prefs_cover_every_protocol() {
        let prefs = ProxyConfig::parse("http://proxy.local:8080").unwrap().firefox_prefs();
        for protocol in ["http", "https", "ssl", "ftp"] {
            assert_eq!(prefs[&format!("network.proxy.{}", protocol)], json!("proxy.local"));
            assert_eq!(prefs[&format!("network.proxy.{}_port", protocol)], json!(8080));
        }
        assert!(!prefs.contains_key("network.proxy.socks"));
    }
}
