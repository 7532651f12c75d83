use serde::Deserialize;

/// Seeds used when the configuration does not name any
pub const DEFAULT_SEEDS: &[&str] = &[
    "https://melhores-sites.pt/melhores-sites-portugal.html",
    "https://pt.trustpilot.com/categories",
    "https://portal-sites.net/",
];

/// The `.pt` family and its second-level variants
pub const DEFAULT_ALLOWED_SUFFIXES: &[&str] = &[
    "pt", "net.pt", "gov.pt", "org.pt", "edu.pt", "int.pt", "publ.pt", "com.pt", "nome.pt",
];

/// File extensions treated as HTML; the empty string stands for directory-style paths
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[".html", ""];

/// Directory and aggregator sites outside the family that are still crawled
pub const DEFAULT_ALLOWED_SITES: &[&str] = &["portal-sites.net"];

/// Shopping-cart phrases that flag a page as e-commerce
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "add to cart",
    "add to bag",
    "add to basket",
    "adicionar à cesta",
    "adicionar ao cesto",
    "adicionar ao carrinho",
    "adicionar",
    "juntar ao carrinho",
    "carrinho",
    "comprar",
];

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub filter: FilterConfig,
    pub classifier: ClassifierConfig,
    pub termination: TerminationConfig,
    pub output: OutputConfig,
}

/// Fetch stage configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Initial URLs, enqueued without passing the domain filter
    pub seeds: Vec<String>,

    /// Number of fetch workers, i.e. the cap on concurrent requests
    pub max_concurrent_fetches: u32,

    /// Attempts per URL before it is recorded as an error and dropped
    pub tries: u32,

    /// Fixed delay between attempts (milliseconds)
    pub retry_backoff_ms: u64,

    /// Per-request timeout (seconds)
    pub request_timeout_secs: u64,

    /// Delay later requests to a host that sent Retry-After or X-RateLimit-Limit
    pub honor_rate_limit_headers: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            seeds: to_strings(DEFAULT_SEEDS),
            max_concurrent_fetches: 103,
            tries: 5,
            retry_backoff_ms: 3000,
            request_timeout_secs: 30,
            honor_rate_limit_headers: false,
        }
    }
}

/// Domain filter configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FilterConfig {
    /// Public suffixes (or whole subdomains) that belong to the crawl family
    pub allowed_suffixes: Vec<String>,

    /// Path extensions that are fetched
    pub allowed_extensions: Vec<String>,

    /// Registrable domains admitted regardless of suffix (`*.` wildcards allowed)
    pub allowed_sites: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            allowed_suffixes: to_strings(DEFAULT_ALLOWED_SUFFIXES),
            allowed_extensions: to_strings(DEFAULT_ALLOWED_EXTENSIONS),
            allowed_sites: to_strings(DEFAULT_ALLOWED_SITES),
        }
    }
}

/// Classifier configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ClassifierConfig {
    /// Heuristic keywords, matched against whole visible text nodes
    pub keywords: Vec<String>,

    /// Keep the raw HTML of every first-seen structure
    pub store_raw_html: bool,

    /// Buffered page records written per gateway flush
    pub flush_batch_size: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            keywords: to_strings(DEFAULT_KEYWORDS),
            store_raw_html: true,
            flush_batch_size: 50,
        }
    }
}

/// Termination coordinator timings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TerminationConfig {
    /// How long the pipeline must stay idle before draining (milliseconds)
    pub observation_interval_ms: u64,

    /// Time between two observations (milliseconds)
    pub poll_interval_ms: u64,

    /// How long a stage may take to acknowledge shutdown (milliseconds)
    pub ack_timeout_ms: u64,
}

impl Default for TerminationConfig {
    fn default() -> Self {
        Self {
            observation_interval_ms: 10_000,
            poll_interval_ms: 1_000,
            ack_timeout_ms: 30_000,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "./crawl.db".to_string(),
        }
    }
}
