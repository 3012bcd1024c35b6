//! Metrics definitions for the tracker.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
}

#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub description: &'static str,
}

macro_rules! counter {
    ($def:expr) => {
        metrics::counter!($def.name)
    };
}

macro_rules! histogram {
    ($def:expr) => {
        metrics::histogram!($def.name)
    };
}

pub(crate) use counter;
pub(crate) use histogram;

pub const HITS_SENT: MetricDef = MetricDef {
    name: "tracker.hits.sent",
    metric_type: MetricType::Counter,
    description: "Number of hits accepted by the collection endpoint",
};

pub const HITS_FAILED: MetricDef = MetricDef {
    name: "tracker.hits.failed",
    metric_type: MetricType::Counter,
    description: "Number of hits that could not be delivered",
};

pub const HITS_RETRIED: MetricDef = MetricDef {
    name: "tracker.hits.retried",
    metric_type: MetricType::Counter,
    description: "Number of additional delivery attempts made by the retrying transport",
};

pub const HIT_SEND_DURATION: MetricDef = MetricDef {
    name: "tracker.hits.send_duration",
    metric_type: MetricType::Histogram,
    description: "Time to deliver a hit in seconds, including retries",
};

pub const TRACKING_URLS_BUILT: MetricDef = MetricDef {
    name: "tracker.tracking_urls.built",
    metric_type: MetricType::Counter,
    description: "Number of tracking URLs rendered",
};

pub const CLIENT_ID_CREATED: MetricDef = MetricDef {
    name: "tracker.client_id.created",
    metric_type: MetricType::Counter,
    description: "Number of client identifiers generated and persisted",
};

pub const ALL_METRICS: &[MetricDef] = &[
    HITS_SENT,
    HITS_FAILED,
    HITS_RETRIED,
    HIT_SEND_DURATION,
    TRACKING_URLS_BUILT,
    CLIENT_ID_CREATED,
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn metric_names_are_unique() {
        let names: HashSet<&str> = ALL_METRICS.iter().map(|m| m.name).collect();
        assert_eq!(names.len(), ALL_METRICS.len());
        assert!(ALL_METRICS.iter().all(|m| m.name.starts_with("tracker.")));
    }
}
