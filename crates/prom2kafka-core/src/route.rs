// Router: Record -> destination topic and partition key
//
// Pure and deterministic in the record's metric name (and, for the label key
// policy, one label). The override table is fixed at construction.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::record::Record;

/// Topic used when nothing is configured.
pub const DEFAULT_TOPIC: &str = "metrics";

/// Placeholder replaced by the metric name in per-metric templates.
pub const METRIC_PLACEHOLDER: &str = "{metric}";

/// Longest topic name Kafka accepts.
pub const MAX_TOPIC_LEN: usize = 249;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicStrategy {
    /// Every record goes to one topic.
    Static { topic: String },
    /// `{metric}` in the template is replaced by the sanitised metric name.
    PerMetric { template: String },
}

impl Default for TopicStrategy {
    fn default() -> Self {
        TopicStrategy::Static {
            topic: DEFAULT_TOPIC.to_string(),
        }
    }
}

/// Which value becomes the message key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionKeyPolicy {
    #[default]
    MetricName,
    None,
    /// Value of the named label, falling back to the metric name when absent.
    Label(String),
}

#[derive(Debug, Clone)]
enum Resolved {
    Static(Arc<str>),
    PerMetric(String),
}

#[derive(Debug, Clone)]
pub struct Router {
    strategy: Resolved,
    overrides: HashMap<String, Arc<str>>,
    partition_key: PartitionKeyPolicy,
}

impl Default for Router {
    fn default() -> Self {
        Router::new(
            TopicStrategy::default(),
            HashMap::new(),
            PartitionKeyPolicy::default(),
        )
    }
}

impl Router {
    pub fn new(
        strategy: TopicStrategy,
        overrides: HashMap<String, String>,
        partition_key: PartitionKeyPolicy,
    ) -> Self {
        let strategy = match strategy {
            TopicStrategy::Static { topic } => Resolved::Static(Arc::from(topic)),
            TopicStrategy::PerMetric { template } => Resolved::PerMetric(template),
        };
        Self {
            strategy,
            overrides: overrides
                .into_iter()
                .map(|(metric, topic)| (metric, Arc::from(topic)))
                .collect(),
            partition_key,
        }
    }

    /// Destination topic for `record`.
    pub fn route(&self, record: &Record) -> Arc<str> {
        if let Some(topic) = self.overrides.get(record.name()) {
            return topic.clone();
        }
        match &self.strategy {
            Resolved::Static(topic) => topic.clone(),
            Resolved::PerMetric(template) => {
                let topic = template.replace(METRIC_PLACEHOLDER, &sanitize_topic(record.name()));
                Arc::from(truncate(&topic))
            }
        }
    }

    /// Partition-affinity key for `record`, if the policy assigns one.
    pub fn partition_key<'r>(&self, record: &'r Record) -> Option<&'r str> {
        match &self.partition_key {
            PartitionKeyPolicy::MetricName => Some(record.name()),
            PartitionKeyPolicy::None => None,
            PartitionKeyPolicy::Label(label) => {
                Some(record.label(label).unwrap_or_else(|| record.name()))
            }
        }
    }
}

/// Replace characters Kafka does not allow in topic names with `_` and cap
/// the length.
pub fn sanitize_topic(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if is_topic_char(c) { c } else { '_' })
        .collect();
    truncate(&cleaned).to_string()
}

fn truncate(s: &str) -> &str {
    // Templates may contain non-ASCII text.
    if s.len() <= MAX_TOPIC_LEN {
        return s;
    }
    let mut end = MAX_TOPIC_LEN;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn is_topic_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-'
}

/// Check a topic name against Kafka's naming rules.
pub fn validate_topic(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("topic name is empty".to_string());
    }
    if name == "." || name == ".." {
        return Err(format!("topic name '{}' is reserved", name));
    }
    if name.len() > MAX_TOPIC_LEN {
        return Err(format!(
            "topic name is {} characters, maximum is {}",
            name.len(),
            MAX_TOPIC_LEN
        ));
    }
    if let Some(c) = name.chars().find(|c| !is_topic_char(*c)) {
        return Err(format!("topic name '{}' contains illegal character '{}'", name, c));
    }
    Ok(())
}
