use crate::config::DEFAULT_ALLOWED_SUFFIXES;
use std::collections::HashSet;
use std::net::IpAddr;
use url::Url;

/// Second-level public suffixes recognised besides the configured family
const COMMON_MULTI_LABEL_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "gov.uk", "com.br", "net.br", "org.br", "gov.br", "com.au",
    "net.au", "org.au", "co.jp", "co.nz", "com.es", "com.mx", "com.ar", "co.za", "com.cn",
    "com.tr", "co.in",
];

/// A host split into its subdomain, domain and public suffix
///
/// `shop.loja.com.pt` splits into `shop` / `loja` / `com.pt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainParts {
    pub subdomain: String,
    pub domain: String,
    pub suffix: String,
}

impl DomainParts {
    /// The registrable domain (`loja.com.pt`), if the host has one
    pub fn registrable(&self) -> Option<String> {
        match (self.domain.is_empty(), self.suffix.is_empty()) {
            (true, _) => None,
            (false, true) => Some(self.domain.clone()),
            (false, false) => Some(format!("{}.{}", self.domain, self.suffix)),
        }
    }

    /// The fully-qualified domain, all three parts joined
    pub fn fqdn(&self) -> String {
        [&self.subdomain, &self.domain, &self.suffix]
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| part.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Capability: split a host into subdomain, domain and public suffix
pub trait SuffixResolver: Send + Sync {
    fn split(&self, host: &str) -> Option<DomainParts>;
}

/// Static public-suffix table
///
/// The longest listed suffix wins; when nothing listed matches, the last label
/// is the suffix. IP addresses have no suffix and the whole address is the
/// domain.
#[derive(Debug, Clone)]
pub struct SuffixList {
    suffixes: HashSet<String>,
}

impl SuffixList {
    /// Builds a table from `extra` plus the built-in second-level suffixes
    pub fn new<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let suffixes = COMMON_MULTI_LABEL_SUFFIXES
            .iter()
            .map(|s| s.to_string())
            .chain(extra.into_iter().map(|s| s.as_ref().to_lowercase()))
            .collect();
        Self { suffixes }
    }
}

impl Default for SuffixList {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_SUFFIXES.iter().copied())
    }
}

impl SuffixResolver for SuffixList {
    fn split(&self, host: &str) -> Option<DomainParts> {
        let host = host.trim_end_matches('.').to_lowercase();
        if host.is_empty() {
            return None;
        }

        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if bare.parse::<IpAddr>().is_ok() {
            return Some(DomainParts {
                subdomain: String::new(),
                domain: host,
                suffix: String::new(),
            });
        }

        let labels: Vec<&str> = host.split('.').collect();
        let suffix_start = (0..labels.len())
            .find(|&i| self.suffixes.contains(&labels[i..].join(".")))
            .unwrap_or(labels.len() - 1);

        let (domain, subdomain) = if suffix_start == 0 {
            (String::new(), String::new())
        } else {
            (
                labels[suffix_start - 1].to_string(),
                labels[..suffix_start - 1].join("."),
            )
        };

        Some(DomainParts {
            subdomain,
            domain,
            suffix: labels[suffix_start..].join("."),
        })
    }
}

/// Returns the network location (`host[:port]`) of a URL, lowercased
///
/// # Examples
///
/// ```
/// use url::Url;
/// use cctld_crawler::url::netloc;
///
/// let url = Url::parse("https://Loja.PT:8443/path").unwrap();
/// assert_eq!(netloc(&url), Some("loja.pt:8443".to_string()));
/// ```
pub fn netloc(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(host: &str) -> DomainParts {
        SuffixList::default().split(host).unwrap()
    }

    #[test]
    fn test_split_single_label_suffix() {
        let parts = split("shop.example.pt");
        assert_eq!(parts.subdomain, "shop");
        assert_eq!(parts.domain, "example");
        assert_eq!(parts.suffix, "pt");
        assert_eq!(parts.registrable(), Some("example.pt".to_string()));
    }

    #[test]
    fn test_split_second_level_suffix() {
        let parts = split("www.loja.com.pt");
        assert_eq!(parts.subdomain, "www");
        assert_eq!(parts.domain, "loja");
        assert_eq!(parts.suffix, "com.pt");
        assert_eq!(parts.fqdn(), "www.loja.com.pt");
    }

    #[test]
    fn test_split_foreign_host_with_family_subdomain() {
        let parts = split("pt.trustpilot.com");
        assert_eq!(parts.subdomain, "pt");
        assert_eq!(parts.domain, "trustpilot");
        assert_eq!(parts.suffix, "com");
    }

    #[test]
    fn test_split_builtin_multi_label_suffix() {
        let parts = split("news.bbc.co.uk");
        assert_eq!(parts.domain, "bbc");
        assert_eq!(parts.suffix, "co.uk");
    }

    #[test]
    fn test_split_bare_suffix_has_no_registrable_domain() {
        let parts = split("com.pt");
        assert_eq!(parts.domain, "");
        assert_eq!(parts.suffix, "com.pt");
        assert_eq!(parts.registrable(), None);
    }

    #[test]
    fn test_split_ip_address() {
        let parts = split("127.0.0.1");
        assert_eq!(parts.domain, "127.0.0.1");
        assert_eq!(parts.suffix, "");
        assert_eq!(parts.registrable(), Some("127.0.0.1".to_string()));
    }

    #[test]
    fn test_split_is_case_insensitive() {
        assert_eq!(split("Shop.EXAMPLE.Pt."), split("shop.example.pt"));
    }

    #[test]
    fn test_split_empty_host() {
        assert!(SuffixList::default().split("").is_none());
    }

    #[test]
    fn test_netloc_without_port() {
        let url = Url::parse("http://a.pt/x").unwrap();
        assert_eq!(netloc(&url), Some("a.pt".to_string()));
    }
}
