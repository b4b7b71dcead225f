//! Look-alike host check against a table of well-known brands.

use crate::config::Brand;

/// Edit distance at or below this is a typo of the brand domain.
const MAX_EDIT_DISTANCE: usize = 2;
/// Edit distance relative to the longer name below this is a typo.
const MAX_EDIT_RATIO: f64 = 0.2;
/// Hosts whose length differs more than this are never compared.
const MAX_LENGTH_GAP: usize = 3;

/// A host that imitates a brand it does not belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Imitation {
    pub brand: String,
    /// Legitimate domain the host imitates
    pub domain: String,
}

#[derive(Debug, Clone, Default)]
pub struct BrandChecker {
    brands: Vec<Brand>,
}

impl BrandChecker {
    /// Names and domains are lowercased; brands without a name or a domain
    /// are dropped.
    pub fn new(brands: &[Brand]) -> Self {
        let brands = brands
            .iter()
            .map(|b| Brand {
                name: b.name.trim().to_ascii_lowercase(),
                domains: b
                    .domains
                    .iter()
                    .map(|d| d.trim_start_matches('.').to_ascii_lowercase())
                    .filter(|d| !d.is_empty())
                    .collect(),
            })
            .filter(|b| !b.name.is_empty() && !b.domains.is_empty())
            .collect();
        Self { brands }
    }

    pub fn is_empty(&self) -> bool {
        self.brands.is_empty()
    }

    /// Brand the host imitates, if any. A host on, or under, any brand
    /// domain is legitimate.
    pub fn check(&self, host: &str) -> Option<Imitation> {
        let host = host.to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        let legitimate = self
            .brands
            .iter()
            .flat_map(|b| &b.domains)
            .any(|d| is_within(host, d));
        if legitimate {
            return None;
        }
        self.brands.iter().find_map(|brand| {
            let imitated = host.contains(brand.name.as_str())
                || brand.domains.iter().any(|d| is_typo_of(host, d));
            imitated.then(|| Imitation {
                brand: brand.name.clone(),
                domain: brand.domains[0].clone(),
            })
        })
    }
}

fn is_within(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn is_typo_of(host: &str, domain: &str) -> bool {
    let (a, b) = (host.chars().count(), domain.chars().count());
    if a.abs_diff(b) > MAX_LENGTH_GAP {
        return false;
    }
    let distance = strsim::levenshtein(host, domain);
    distance <= MAX_EDIT_DISTANCE || (distance as f64) / (a.max(b) as f64) < MAX_EDIT_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorConfig;

    fn checker() -> BrandChecker {
        BrandChecker::new(&DetectorConfig::default().brands)
    }

    #[test]
    fn digit_swapped_host_imitates_google() {
        let hit = checker().check("g00gle.com").unwrap();
        assert_eq!(hit.brand, "google");
        assert_eq!(hit.domain, "google.com");
        assert_eq!(checker().check("WWW.GOOGLR.COM").unwrap().domain, "google.com");
    }

    #[test]
    fn brand_name_in_foreign_host_is_imitation() {
        let hit = checker().check("sberbank-secure.xyz").unwrap();
        assert_eq!(hit.brand, "sberbank");
        assert_eq!(hit.domain, "sberbank.ru");
        assert_eq!(checker().check("login.tinkoff.example.com").unwrap().domain, "tinkoff.ru");
    }

    #[test]
    fn brand_domains_and_subdomains_are_legitimate() {
        let c = checker();
        for host in ["online.sberbank.ru", "sberbank.ru", "www.google.com", "mail.google.com", "fb.com"] {
            assert_eq!(c.check(host), None, "{host}");
        }
    }

    #[test]
    fn unrelated_hosts_pass() {
        let c = checker();
        for host in ["example.com", "site7.example.com", "192.168.1.1", "10.0.0.3", "rust-lang.org"] {
            assert_eq!(c.check(host), None, "{host}");
        }
    }

    #[test]
    fn blank_entries_are_dropped() {
        let c = BrandChecker::new(&[
            Brand { name: String::new(), domains: vec!["x.com".into()] },
            Brand { name: "acme".into(), domains: vec![] },
        ]);
        assert!(c.is_empty());
        assert_eq!(c.check("anything.com"), None);
    }
}
