//! Detector configuration. Every field has a default; a missing or invalid
//! file yields the defaults.

use crate::model::{LoadOptions, FORMAT_VERSION};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Ensemble artifact to load at startup
    pub artifact_path: PathBuf,
    /// Tried when the primary artifact is missing or rejected
    pub fallback_artifact_path: Option<PathBuf>,
    /// Highest artifact format version accepted
    pub format_version: u32,
    /// Reject artifacts whose schema names features the extractor never produces
    pub strict_schema: bool,
    /// Risk banding thresholds
    pub risk: RiskConfig,
    /// Explanation rule limits
    pub explain: ExplainConfig,
    /// Batch scoring
    pub batch: BatchConfig,
    /// Hosts (and their subdomains) that are never flagged
    pub trusted_domains: Vec<String>,
    /// Brands whose look-alike hosts are flagged
    pub brands: Vec<Brand>,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Probability at or above this is high risk (0.0–1.0)
    pub high_threshold: f64,
    /// Probability at or above this is medium risk
    pub medium_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainConfig {
    pub max_url_length: f64,
    pub max_subdomain_level: f64,
    pub max_special_chars: f64,
    pub max_domain_hyphens: f64,
}

/// A brand name and the domains that legitimately carry it. The first
/// domain is the one reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brand {
    pub name: String,
    pub domains: Vec<String>,
}

impl Brand {
    fn new(name: &str, domains: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            domains: domains.iter().map(|d| d.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Worker threads for batch scoring; 0 uses the global rayon pool
    pub workers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            artifact_path: PathBuf::from("model.json"),
            fallback_artifact_path: None,
            format_version: FORMAT_VERSION,
            strict_schema: false,
            risk: RiskConfig::default(),
            explain: ExplainConfig::default(),
            batch: BatchConfig::default(),
            trusted_domains: default_trusted_domains(),
            brands: default_brands(),
            log: LogConfig::default(),
        }
    }
}

const TRUSTED_DOMAINS: &[&str] = &[
    "google.com", "youtube.com", "facebook.com", "instagram.com", "twitter.com",
    "amazon.com", "netflix.com", "microsoft.com", "apple.com", "linkedin.com",
    "github.com", "wikipedia.org", "reddit.com", "twitch.tv", "spotify.com",
    "yandex.ru", "mail.ru", "vk.com", "ok.ru", "rambler.ru",
    "avito.ru", "ozon.ru", "wildberries.ru", "sberbank.ru", "gosuslugi.ru",
    "mos.ru", "rbc.ru", "lenta.ru", "kinopoisk.ru", "ria.ru",
    "ivi.ru", "2gis.ru", "hh.ru", "drom.ru", "auto.ru",
];

fn default_trusted_domains() -> Vec<String> {
    TRUSTED_DOMAINS.iter().map(|d| d.to_string()).collect()
}

fn default_brands() -> Vec<Brand> {
    vec![
        Brand::new("google", &["google.com", "google.ru"]),
        Brand::new("yandex", &["yandex.ru", "yandex.com"]),
        Brand::new("sberbank", &["sberbank.ru", "sber.ru"]),
        Brand::new("vkontakte", &["vk.com", "vkontakte.ru"]),
        Brand::new("mail", &["mail.ru"]),
        Brand::new("facebook", &["facebook.com", "fb.com"]),
        Brand::new("instagram", &["instagram.com"]),
        Brand::new("twitter", &["twitter.com"]),
        Brand::new("gosuslugi", &["gosuslugi.ru"]),
        Brand::new("alfabank", &["alfabank.ru"]),
        Brand::new("tinkoff", &["tinkoff.ru"]),
    ]
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            high_threshold: 0.8,
            medium_threshold: 0.5,
        }
    }
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            max_url_length: 100.0,
            max_subdomain_level: 3.0,
            max_special_chars: 5.0,
            max_domain_hyphens: 2.0,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl DetectorConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(path) {
                if let Ok(c) = serde_json::from_str::<DetectorConfig>(&data) {
                    return c;
                }
            }
        }
        Self::default()
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            max_format_version: self.format_version,
            strict_schema: self.strict_schema,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let c: DetectorConfig =
            serde_json::from_str(r#"{"trusted_domains": ["google.com"], "risk": {"high_threshold": 0.9}}"#)
                .unwrap();
        assert_eq!(c.trusted_domains, vec!["google.com".to_string()]);
        assert_eq!(c.risk.high_threshold, 0.9);
        assert_eq!(c.risk.medium_threshold, 0.5);
        assert_eq!(c.explain, ExplainConfig::default());
        assert_eq!(c.batch.workers, 0);
        assert_eq!(c.brands, default_brands());
    }

    #[test]
    fn defaults_ship_allowlist_and_brands() {
        let c = DetectorConfig::default();
        assert_eq!(c.trusted_domains.len(), 35);
        assert!(c.trusted_domains.iter().any(|d| d == "sberbank.ru"));
        let google = c.brands.iter().find(|b| b.name == "google").unwrap();
        assert_eq!(google.domains[0], "google.com");

        let empty: DetectorConfig =
            serde_json::from_str(r#"{"trusted_domains": [], "brands": []}"#).unwrap();
        assert!(empty.trusted_domains.is_empty());
        assert!(empty.brands.is_empty());
    }

    #[test]
    fn missing_or_invalid_file_falls_back() {
        assert_eq!(
            DetectorConfig::load(Path::new("/nonexistent/phishtree.json")),
            DetectorConfig::default()
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(DetectorConfig::load(&path), DetectorConfig::default());
    }

    #[test]
    fn load_options_follow_config() {
        let c = DetectorConfig {
            strict_schema: true,
            ..DetectorConfig::default()
        };
        let opts = c.load_options();
        assert!(opts.strict_schema);
        assert_eq!(opts.max_format_version, FORMAT_VERSION);
    }
}
