use crate::client_id::ClientIdManager;
use crate::config::{Config, Settings, default_endpoint};
use crate::errors::Result;
use crate::metrics_defs::{
    HIT_SEND_DURATION, HITS_FAILED, HITS_SENT, TRACKING_URLS_BUILT, counter, histogram,
};
use crate::normalizer::{DispatchMode, ParameterNormalizer};
use crate::params::ParameterSet;
use crate::property_store::get_store;
use crate::transport::{DirectTransport, HitTransport, RetryingTransport};
use std::sync::Arc;
use std::time::Instant;
use url::{Url, form_urlencoded};

/// Sends hits to the collection endpoint or renders them as tracking URLs.
#[derive(Clone)]
pub struct Tracker {
    normalizer: ParameterNormalizer,
    transport: Arc<dyn HitTransport>,
    endpoint: Url,
}

impl Tracker {
    /// A tracker delivering to the default endpoint with a single attempt per hit.
    pub fn new(settings: Settings, client_ids: ClientIdManager) -> Self {
        Tracker {
            normalizer: ParameterNormalizer::new(settings, client_ids),
            transport: Arc::new(DirectTransport::new()),
            endpoint: default_endpoint(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let store = get_store(&config.property_store)?;
        let client_ids = ClientIdManager::with_store(store);

        let transport: Arc<dyn HitTransport> = match &config.retry {
            Some(retry) => Arc::new(RetryingTransport::new(DirectTransport::new(), retry.clone())),
            None => Arc::new(DirectTransport::new()),
        };

        Ok(Tracker::new(config.settings(), client_ids)
            .with_transport(transport)
            .with_endpoint(config.endpoint.clone()))
    }

    pub fn with_transport(mut self, transport: Arc<dyn HitTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn client_ids(&self) -> &ClientIdManager {
        self.normalizer.client_ids()
    }

    /// Normalizes the hit for server-side delivery and posts it once through
    /// the configured transport. Transport errors are returned unchanged.
    pub async fn submit_event(&self, parameters: &ParameterSet) -> Result<()> {
        let params = self.normalizer.normalize(parameters, DispatchMode::HttpPost)?;

        let start = Instant::now();
        let result = self
            .transport
            .post_form(&self.endpoint, &params.to_pairs())
            .await;
        histogram!(HIT_SEND_DURATION).record(start.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                counter!(HITS_SENT).increment(1);
                Ok(())
            }
            Err(err) => {
                counter!(HITS_FAILED).increment(1);
                Err(err.into())
            }
        }
    }

    /// Renders the hit as a GET URL against the collection endpoint. No I/O
    /// besides resolving the client identifier.
    pub fn build_tracking_url(&self, parameters: &ParameterSet) -> Result<String> {
        let params = self
            .normalizer
            .normalize(parameters, DispatchMode::TrackingUrl)?;

        counter!(TRACKING_URLS_BUILT).increment(1);

        Ok(format!("{}?{}", self.endpoint, serialize_query(&params)))
    }

    /// A 1x1 `<img>` tag for HTML email bodies, with the tracking URL
    /// entity-escaped for use inside the attribute.
    pub fn build_tracking_image_tag(&self, parameters: &ParameterSet) -> Result<String> {
        let url = self.build_tracking_url(parameters)?;
        Ok(format!(
            r#"<img src="{}" width="1" height="1" alt="" />"#,
            escape_attribute(&url)
        ))
    }
}

/// Joins parameters with `&`. Empty values are written as a bare key.
///
/// Keys and values use `application/x-www-form-urlencoded` escaping, so a
/// space becomes `+` rather than `%20`.
pub fn serialize_query(params: &ParameterSet) -> String {
    params
        .iter()
        .map(|(key, value)| {
            let key: String = form_urlencoded::byte_serialize(key.as_bytes()).collect();
            if value.is_empty() {
                key
            } else {
                let value = value.to_string();
                let value: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
                format!("{key}={value}")
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn escape_attribute(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
