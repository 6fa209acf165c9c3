use std::collections::BTreeMap;

/// A single metric observation.
///
/// Points are flat: a metric name, a set of tags, a timestamp in whole seconds since the Unix epoch, and
/// a value. Each point becomes exactly one time series, carrying exactly one sample, when it is written.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricPoint {
    /// Name of the metric.
    ///
    /// Must match `[a-zA-Z_:][a-zA-Z0-9_:]*`, otherwise the batch containing the point is rejected.
    pub metric: String,

    /// Tags attached to the point.
    ///
    /// Tags whose key does not match `[a-zA-Z_][a-zA-Z0-9_]*` are dropped during conversion.
    pub tags: BTreeMap<String, String>,

    /// Timestamp, in seconds since the Unix epoch.
    pub time: i64,

    /// Value of the observation.
    pub value: f64,
}

impl MetricPoint {
    /// Creates a new `MetricPoint` with no tags.
    pub fn new<N>(metric: N, time: i64, value: f64) -> Self
    where
        N: Into<String>,
    {
        Self { metric: metric.into(), tags: BTreeMap::new(), time, value }
    }

    /// Creates a new `MetricPoint` from all of its parts.
    pub fn from_parts<N, I, K, V>(metric: N, tags: I, time: i64, value: f64) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let tags = tags.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { metric: metric.into(), tags, time, value }
    }

    /// Adds a tag to the point, replacing any existing tag with the same key.
    #[must_use]
    pub fn with_tag<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Returns `true` if `name` is a valid Prometheus metric name.
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Returns `true` if `name` is a valid Prometheus label name.
pub fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
