use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Longest accepted per-request timeout, in seconds
pub const MAX_REQUEST_TIMEOUT_SECONDS: f64 = 3600.0;

/// Longest accepted single backoff sleep, in seconds
pub const MAX_BACKOFF_SECONDS: f64 = 3600.0;

/// Converts seconds to a Duration, clamped to `[0, ceiling]`
///
/// Negative and NaN inputs become zero; anything too large for a Duration
/// becomes `ceiling`.
pub fn bounded_secs(secs: f64, ceiling: f64) -> Duration {
    let ceiling = Duration::from_secs_f64(ceiling);
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) => duration.min(ceiling),
        Err(_) if secs > 0.0 => ceiling,
        Err(_) => Duration::ZERO,
    }
}

/// Main configuration structure for Harvest-Relay
///
/// Every section has defaults, so an empty file yields a runnable config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
}

/// Scheduler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestConfig {
    /// Maximum number of fetch attempts in flight process-wide
    #[serde(rename = "max-concurrency", default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Retries allowed after the first attempt of a candidate
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Multiplier (seconds) applied to the attempt number when backing off
    #[serde(rename = "backoff-factor", default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Optional wall-clock budget for a single batch
    #[serde(rename = "batch-deadline-seconds", default)]
    pub batch_deadline_seconds: Option<u64>,
}

impl HarvestConfig {
    /// Returns the batch deadline as a Duration, if configured
    pub fn batch_deadline(&self) -> Option<Duration> {
        self.batch_deadline_seconds.map(Duration::from_secs)
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            max_retries: default_max_retries(),
            backoff_factor: default_backoff_factor(),
            batch_deadline_seconds: None,
        }
    }
}

/// Request shape shared by every fetch attempt
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    #[serde(
        rename = "request-timeout-seconds",
        default = "default_request_timeout_seconds"
    )]
    pub request_timeout_seconds: f64,

    /// User agents rotated across attempts
    #[serde(rename = "user-agent-pool", default = "default_user_agent_pool")]
    pub user_agent_pool: Vec<String>,

    /// Fixed headers sent with every request (User-Agent is added per attempt)
    #[serde(rename = "header-template", default = "default_header_template")]
    pub header_template: BTreeMap<String, String>,
}

impl HttpConfig {
    /// Returns the per-request timeout as a Duration
    ///
    /// Clamped to `MAX_REQUEST_TIMEOUT_SECONDS` so an unvalidated config
    /// cannot produce an unrepresentable timeout.
    pub fn request_timeout(&self) -> Duration {
        bounded_secs(self.request_timeout_seconds, MAX_REQUEST_TIMEOUT_SECONDS)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: default_request_timeout_seconds(),
            user_agent_pool: default_user_agent_pool(),
            header_template: default_header_template(),
        }
    }
}

/// Input configuration
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// JSON record files, read in order
    #[serde(default)]
    pub files: Vec<String>,

    /// Maximum number of candidate groups per batch
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum number of candidate URLs kept for one group
    #[serde(rename = "max-urls-per-group", default = "default_max_urls_per_group")]
    pub max_urls_per_group: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            batch_size: default_batch_size(),
            max_urls_per_group: default_max_urls_per_group(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving `result_<n>.json` and `faulty_<n>.json`
    #[serde(default = "default_output_directory")]
    pub directory: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
        }
    }
}

/// Which extractor runs on successful responses
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ExtractorConfig {
    /// Text of the first element matching a CSS selector
    Heading {
        #[serde(default = "default_heading_selector")]
        selector: String,
    },

    /// Fields of the `react_data` object embedded in a script block
    EmbeddedData {
        /// Keys to keep; empty keeps every key
        #[serde(default = "default_embedded_keys")]
        keys: Vec<String>,
    },
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self::Heading {
            selector: default_heading_selector(),
        }
    }
}

fn default_max_concurrency() -> usize {
    20
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_request_timeout_seconds() -> f64 {
    10.0
}

fn default_batch_size() -> usize {
    1000
}

fn default_max_urls_per_group() -> usize {
    100
}

fn default_output_directory() -> String {
    "output".to_string()
}

fn default_heading_selector() -> String {
    "h1.page-title".to_string()
}

fn default_user_agent_pool() -> Vec<String> {
    [
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_5) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/13.1.1 Safari/605.1.15",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/83.0.4103.116 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/83.0.4103.97 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:77.0) Gecko/20100101 Firefox/77.0",
        "Mozilla/5.0 (X11; Linux i686; rv:124.0) Gecko/20100101 Firefox/124.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4_1) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36 OPR/109.0.0.0",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36 Edg/123.0.2420.81",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36 OPR/109.0.0.0",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_header_template() -> BTreeMap<String, String> {
    [
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7",
        ),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("Accept-Encoding", "gzip, deflate, br"),
        ("Connection", "keep-alive"),
        ("Upgrade-Insecure-Requests", "1"),
        ("DNT", "1"),
        ("Referer", "https://glamira.vn/"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_embedded_keys() -> Vec<String> {
    [
        "product_id",
        "name",
        "sku",
        "attribute_set_id",
        "attribute_set",
        "type_id",
        "price",
        "min_price",
        "max_price",
        "min_price_format",
        "max_price_format",
        "gold_weight",
        "none_metal_weight",
        "fixed_silver_weight",
        "material_design",
        "qty",
        "collection",
        "collection_id",
        "product_type",
        "product_type_value",
        "category",
        "category_name",
        "store_code",
        "show_popup_quantity_eternity",
        "visible_contents",
        "gender",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
