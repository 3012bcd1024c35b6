use crate::transport::RetryConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::LazyLock;
use url::Url;

/// The Measurement Protocol collection endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://www.google-analytics.com/collect";

#[derive(Clone, Deserialize, Debug, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum PropertyStoreType {
    Filesystem {
        path: PathBuf,
    },
    Memory,
    /// Per-user file under the XDG config directory.
    #[default]
    User,
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Config {
    /// Process-wide default used when a hit carries no `tid`.
    pub tracking_id: Option<String>,
    #[serde(default = "default_endpoint")]
    pub endpoint: Url,
    #[serde(default)]
    pub property_store: PropertyStoreType,
    /// Delivery is a single attempt unless retries are configured.
    pub retry: Option<RetryConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tracking_id: None,
            endpoint: default_endpoint(),
            property_store: PropertyStoreType::default(),
            retry: None,
        }
    }
}

impl Config {
    pub fn settings(&self) -> Settings {
        Settings {
            tracking_id: self.tracking_id.clone(),
        }
    }
}

/// Process-level defaults consulted by the normalizer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Settings {
    pub tracking_id: Option<String>,
}

impl Settings {
    pub fn with_tracking_id<S: Into<String>>(tracking_id: S) -> Self {
        Settings {
            tracking_id: Some(tracking_id.into()),
        }
    }
}

// DEFAULT_ENDPOINT is a fixed, well-formed absolute URL, so the parse cannot fail.
static DEFAULT_ENDPOINT_URL: LazyLock<Url> =
    LazyLock::new(|| Url::parse(DEFAULT_ENDPOINT).expect("default endpoint is a valid URL"));

pub(crate) fn default_endpoint() -> Url {
    DEFAULT_ENDPOINT_URL.clone()
}
