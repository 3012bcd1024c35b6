//! Server-side Measurement Protocol client.
//!
//! Hits are normalized with the protocol fields the collection endpoint
//! requires and either posted directly ([`Tracker::submit_event`]) or rendered
//! as a GET tracking URL ([`Tracker::build_tracking_url`]) for contexts like
//! email where the end user's client fetches it later.

pub mod client_id;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod metrics_defs;
pub mod normalizer;
pub mod params;
pub mod property_store;
pub mod transport;

pub use client_id::ClientIdManager;
pub use config::{Config, Settings};
pub use dispatcher::Tracker;
pub use errors::{TrackerError, TransportError};
pub use normalizer::{DispatchMode, ParameterNormalizer};
pub use params::{ParamValue, ParameterSet};
pub use property_store::{PropertyStore, StoreError};
