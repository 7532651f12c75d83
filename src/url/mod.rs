//! URL handling module
//!
//! This module resolves hrefs found on pages into absolute URLs, splits hosts
//! into subdomain / domain / suffix, and decides which URLs belong to the crawl.

mod domain;
mod normalize;

use crate::config::FilterConfig;
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

pub use domain::{netloc, DomainParts, SuffixList, SuffixResolver};
pub use normalize::{path_extension, resolve_reference};

/// Decides whether a discovered URL is eligible for the crawl
///
/// A URL is admitted when its path extension is allowed and at least one of
/// these holds:
///
/// 1. Its public suffix is an allowed suffix (`loja.com.pt`)
/// 2. Its whole subdomain is an allowed suffix (`pt.trustpilot.com`)
/// 3. Its registrable domain matches an allowed site (`portal-sites.net`)
///
/// Allowed sites accept the `*.` wildcard form, which also matches the bare
/// domain.
pub struct DomainFilter {
    suffixes: HashSet<String>,
    extensions: HashSet<String>,
    sites: Vec<String>,
    resolver: Arc<dyn SuffixResolver>,
}

impl DomainFilter {
    /// Creates a filter using a [`SuffixList`] built from the configured suffixes
    pub fn new(config: &FilterConfig) -> Self {
        let resolver = Arc::new(SuffixList::new(&config.allowed_suffixes));
        Self::with_resolver(config, resolver)
    }

    /// Creates a filter backed by a custom suffix resolver
    pub fn with_resolver(config: &FilterConfig, resolver: Arc<dyn SuffixResolver>) -> Self {
        Self {
            suffixes: lowercase_set(&config.allowed_suffixes),
            extensions: lowercase_set(&config.allowed_extensions),
            sites: config.allowed_sites.iter().map(|s| s.to_lowercase()).collect(),
            resolver,
        }
    }

    /// Resolves an href against its origin page, discarding unusable references
    pub fn resolve(&self, href: &str, origin: Option<&Url>) -> Option<Url> {
        resolve_reference(href, origin).ok()
    }

    /// Resolves `href` against `origin` and checks it against the filter
    ///
    /// Unparseable input, in either argument, yields `false`.
    pub fn admit(&self, href: &str, origin: &str) -> bool {
        let origin = Url::parse(origin).ok();
        self.resolve(href, origin.as_ref())
            .map_or(false, |url| self.admit_url(&url))
    }

    /// Checks an already-resolved URL against the filter
    pub fn admit_url(&self, url: &Url) -> bool {
        if !self.extensions.contains(&path_extension(url)) {
            return false;
        }

        let Some(parts) = url.host_str().and_then(|host| self.resolver.split(host)) else {
            return false;
        };

        if self.suffixes.contains(&parts.suffix) || self.suffixes.contains(&parts.subdomain) {
            return true;
        }

        match parts.registrable() {
            Some(registrable) => self
                .sites
                .iter()
                .any(|pattern| site_matches(pattern, &registrable)),
            None => false,
        }
    }

    /// Splits a URL's host with this filter's resolver
    pub fn domain_parts(&self, url: &Url) -> Option<DomainParts> {
        url.host_str().and_then(|host| self.resolver.split(host))
    }
}

impl std::fmt::Debug for DomainFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainFilter")
            .field("suffixes", &self.suffixes)
            .field("extensions", &self.extensions)
            .field("sites", &self.sites)
            .finish_non_exhaustive()
    }
}

fn lowercase_set(values: &[String]) -> HashSet<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}

/// `portal-sites.net` matches only itself; `*.portal-sites.net` also matches
/// any domain ending in `.portal-sites.net`
fn site_matches(pattern: &str, domain: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            domain == base
                || domain
                    .strip_suffix(base)
                    .map_or(false, |head| head.ends_with('.'))
        }
        None => domain == pattern,
    }
}
