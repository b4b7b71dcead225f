//! Lexical URL features: computed from the URL string alone, no network access.

use super::{ExtractionFailure, FeatureVector, NETWORK_CONSTANTS};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use url::Url;

const SPECIAL_CHARS: &[char] = &[
    '!', '$', '%', '^', '&', '*', '(', ')', '+', '=', '|', '/', '\\', '{', '}', '[', ']', ':',
    ';', '"', '\'', '<', '>', '?', '#',
];

struct Patterns {
    ipv4: Regex,
    cyrillic: Regex,
    redirect_param: Regex,
    suspicious_words: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        ipv4: Regex::new(r"[0-9]+\.[0-9]+\.[0-9]+\.[0-9]+").expect("ipv4 regex must compile"),
        cyrillic: Regex::new(r"[а-яА-Я]").expect("cyrillic regex must compile"),
        redirect_param: Regex::new(
            r"(?i)[?&](redirect|url|link|goto|return|returnurl|returnto|return_url)=",
        )
        .expect("redirect regex must compile"),
        suspicious_words: Regex::new(
            r"(?i)login|signin|account|password|secure|update|bank|confirm|verify|ebay|paypal|sign-in",
        )
        .expect("keyword regex must compile"),
    })
}

/// Parse like a browser does; retry with `http://` for scheme-less input.
fn parse_lenient(raw: &str) -> Result<Url, ExtractionFailure> {
    Url::parse(raw)
        .or_else(|_| Url::parse(&format!("http://{raw}")))
        .map_err(|e| ExtractionFailure {
            url: raw.to_string(),
            reason: e.to_string(),
        })
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn ratio(count: u32, len: u32) -> f64 {
    if len == 0 {
        0.0
    } else {
        f64::from(count) / f64::from(len)
    }
}

/// Typed lexical profile of one URL, in canonical schema order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UrlFeatures {
    /// Length of the raw input in UTF-16 code units, as browsers count it.
    pub url_length: u32,
    pub domain_dot_count: u32,
    pub domain_length: u32,
    pub has_ip: bool,
    pub has_at_symbol: bool,
    pub subdomain_count: u32,
    pub path_length: u32,
    pub query_param_count: u32,
    pub has_cyrillic: bool,
    pub is_https: bool,
    pub has_tilde: bool,
    pub has_underscore: bool,
    pub special_char_count: u32,
    pub domain_digit_count: u32,
    pub has_redirect_param: bool,
    pub tld_length: u32,
    pub has_suspicious_words: bool,
    pub has_port: bool,
    pub domain_hyphen_count: u32,
}

impl UrlFeatures {
    pub fn from_url(raw: &str) -> Result<Self, ExtractionFailure> {
        let parsed = parse_lenient(raw)?;
        let p = patterns();
        let domain = parsed.host_str().unwrap_or("");

        let count_in = |s: &str, c: char| s.chars().filter(|&x| x == c).count() as u32;
        let utf16_len = |s: &str| s.encode_utf16().count() as u32;

        Ok(Self {
            url_length: utf16_len(raw),
            domain_dot_count: count_in(domain, '.'),
            domain_length: utf16_len(domain),
            has_ip: p.ipv4.is_match(domain),
            has_at_symbol: raw.contains('@'),
            subdomain_count: domain.split('.').count() as u32 - 1,
            path_length: utf16_len(parsed.path()),
            query_param_count: parsed.query_pairs().count() as u32,
            has_cyrillic: p.cyrillic.is_match(raw),
            is_https: parsed.scheme() == "https",
            has_tilde: raw.contains('~'),
            has_underscore: raw.contains('_'),
            special_char_count: raw.chars().filter(|c| SPECIAL_CHARS.contains(c)).count() as u32,
            domain_digit_count: domain.chars().filter(char::is_ascii_digit).count() as u32,
            has_redirect_param: p.redirect_param.is_match(raw),
            tld_length: domain.rsplit('.').next().map(utf16_len).unwrap_or(0),
            has_suspicious_words: p.suspicious_words.is_match(raw),
            has_port: parsed.port().is_some(),
            domain_hyphen_count: count_in(domain, '-'),
        })
    }

    /// Encode to the named numeric vector the ensemble consumes.
    pub fn to_vector(&self) -> FeatureVector {
        let lexical = [
            ("url_length", f64::from(self.url_length)),
            ("domain_dot_count", f64::from(self.domain_dot_count)),
            ("domain_length", f64::from(self.domain_length)),
            ("has_ip", flag(self.has_ip)),
            ("has_at_symbol", flag(self.has_at_symbol)),
            ("subdomain_count", f64::from(self.subdomain_count)),
            ("path_length", f64::from(self.path_length)),
            ("query_param_count", f64::from(self.query_param_count)),
            ("has_cyrillic", flag(self.has_cyrillic)),
            ("is_https", flag(self.is_https)),
            ("has_tilde", flag(self.has_tilde)),
            ("has_underscore", flag(self.has_underscore)),
            ("special_char_count", f64::from(self.special_char_count)),
            ("domain_digit_count", f64::from(self.domain_digit_count)),
            (
                "domain_digit_ratio",
                ratio(self.domain_digit_count, self.domain_length),
            ),
            ("has_redirect_param", flag(self.has_redirect_param)),
            ("tld_length", f64::from(self.tld_length)),
            ("has_suspicious_words", flag(self.has_suspicious_words)),
            ("subdomain_level", f64::from(self.subdomain_count)),
            ("has_port", flag(self.has_port)),
            ("domain_hyphen_count", f64::from(self.domain_hyphen_count)),
            (
                "domain_hyphen_ratio",
                ratio(self.domain_hyphen_count, self.domain_length),
            ),
        ];
        lexical.into_iter().chain(NETWORK_CONSTANTS).collect()
    }
}

/// Lower-cased host of `url`, parsed the same way extraction parses it.
pub fn hostname(url: &str) -> Result<String, ExtractionFailure> {
    let parsed = parse_lenient(url)?;
    Ok(parsed.host_str().unwrap_or("").to_ascii_lowercase())
}

/// URL → feature vector. Pure and deterministic.
pub fn extract(url: &str) -> Result<FeatureVector, ExtractionFailure> {
    UrlFeatures::from_url(url).map(|f| f.to_vector())
}
