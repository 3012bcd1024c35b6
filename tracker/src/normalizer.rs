use crate::client_id::ClientIdManager;
use crate::config::Settings;
use crate::errors::{Result, TrackerError};
use crate::params::{ParamValue, ParameterSet};
use rand::Rng;

pub const PROTOCOL_VERSION: &str = "1";
pub const DEFAULT_HIT_TYPE: &str = "event";
pub const POST_DATA_SOURCE: &str = "urlFetch";

// Upper bound (exclusive) of the cache buster.
const CACHE_BUSTER_RANGE: i64 = 100_000_000;

/// How a normalized hit will leave the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchMode {
    /// Sent from this server; adds `ds` and forces IP anonymization.
    HttpPost,
    /// Rendered into a GET URL fetched later by the end user's client.
    TrackingUrl,
}

/// Fills in the protocol fields every hit must carry.
#[derive(Clone)]
pub struct ParameterNormalizer {
    settings: Settings,
    client_ids: ClientIdManager,
}

impl ParameterNormalizer {
    pub fn new(settings: Settings, client_ids: ClientIdManager) -> Self {
        ParameterNormalizer {
            settings,
            client_ids,
        }
    }

    pub fn client_ids(&self) -> &ClientIdManager {
        &self.client_ids
    }

    /// Returns a normalized copy of `parameters`; the input is left untouched.
    ///
    /// Fails with [`TrackerError::Configuration`] before touching the property
    /// store if neither the hit nor the settings provide a tracking ID.
    pub fn normalize(&self, parameters: &ParameterSet, mode: DispatchMode) -> Result<ParameterSet> {
        let mut params = parameters.clone();

        if !params.contains_key("tid") {
            let tid = self
                .settings
                .tracking_id
                .as_deref()
                .ok_or(TrackerError::Configuration)?;
            params.insert("tid", tid);
        }

        params.insert("cid", self.client_ids.client_id()?);

        params.insert_if_absent("t", DEFAULT_HIT_TYPE);

        if params.get("t").and_then(ParamValue::as_str) == Some(DEFAULT_HIT_TYPE) {
            // Reporting hides events without a label.
            params.insert_if_absent("el", "");
        }

        params.insert("v", PROTOCOL_VERSION);
        params.insert("z", cache_buster());

        if mode == DispatchMode::HttpPost {
            params.insert_if_absent("ds", POST_DATA_SOURCE);
            params.insert("aip", "1");
        }

        tracing::debug!(?mode, params = params.len(), "Normalized hit parameters");

        Ok(params)
    }
}

fn cache_buster() -> i64 {
    rand::thread_rng().gen_range(0..CACHE_BUSTER_RANGE)
}
