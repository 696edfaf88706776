//! Status choices offered to vendors, cached per tracker.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use agroshop_core::OrderStatus;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::{ApiClient, paths};

/// A status a vendor can pick, with its display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChoice {
    /// Status value.
    pub value: OrderStatus,
    /// Display label.
    pub label: String,
}

impl From<OrderStatus> for StatusChoice {
    fn from(value: OrderStatus) -> Self {
        Self {
            value,
            label: value.label().to_string(),
        }
    }
}

/// Accepted wire shapes for `/status-choices/`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChoicesPayload {
    /// `{"PENDING": "Pending", ...}`
    Map(BTreeMap<String, String>),
    /// `[["PENDING", "Pending"], ...]`
    Pairs(Vec<(String, String)>),
    /// `[{"value": "PENDING", "label": "Pending"}, ...]`
    Objects(Vec<RawChoice>),
}

#[derive(Debug, Deserialize)]
struct RawChoice {
    value: String,
    label: String,
}

impl ChoicesPayload {
    /// Known statuses in lifecycle order; unknown values are dropped.
    fn into_choices(self) -> Vec<StatusChoice> {
        let pairs: Vec<(String, String)> = match self {
            Self::Map(map) => map.into_iter().collect(),
            Self::Pairs(pairs) => pairs,
            Self::Objects(objects) => objects.into_iter().map(|c| (c.value, c.label)).collect(),
        };

        let mut choices: Vec<StatusChoice> = pairs
            .into_iter()
            .filter_map(|(value, label)| match value.parse::<OrderStatus>() {
                Ok(value) => Some(StatusChoice { value, label }),
                Err(_) => {
                    debug!(value = %value, "ignoring unknown status choice");
                    None
                }
            })
            .collect();
        choices.sort_by_key(|choice| choice.value);
        choices.dedup_by_key(|choice| choice.value);
        choices
    }
}

/// Every status with its built-in label.
pub(crate) fn builtin_choices() -> Vec<StatusChoice> {
    OrderStatus::ALL.into_iter().map(StatusChoice::from).collect()
}

const CACHE_KEY: &str = "status-choices";

/// TTL cache in front of `/status-choices/`.
#[derive(Clone)]
pub(crate) struct ChoicesCache {
    cache: Cache<&'static str, Arc<Vec<StatusChoice>>>,
}

impl ChoicesCache {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
        }
    }

    /// Cached choices, fetching on a miss. Falls back to the built-in list
    /// (uncached) when the endpoint fails or returns nothing usable.
    pub(crate) async fn get(&self, api: &ApiClient) -> Arc<Vec<StatusChoice>> {
        if let Some(choices) = self.cache.get(CACHE_KEY).await {
            return choices;
        }

        match api.get::<ChoicesPayload>(paths::STATUS_CHOICES).await {
            Ok(payload) => {
                let choices = payload.into_choices();
                if choices.is_empty() {
                    warn!("status choices endpoint returned no known statuses, using built-in list");
                    return Arc::new(builtin_choices());
                }
                let choices = Arc::new(choices);
                self.cache.insert(CACHE_KEY, Arc::clone(&choices)).await;
                choices
            }
            Err(err) => {
                warn!(error = %err, "failed to fetch status choices, using built-in list");
                Arc::new(builtin_choices())
            }
        }
    }

    pub(crate) async fn invalidate(&self) {
        self.cache.invalidate(CACHE_KEY).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Vec<StatusChoice> {
        serde_json::from_str::<ChoicesPayload>(json)
            .unwrap()
            .into_choices()
    }

    #[test]
    fn test_map_payload() {
        let choices = parse(r#"{"SHIPPED": "Shipped", "PENDING": "Pending"}"#);
        assert_eq!(choices.len(), 2);
        assert_eq!(choices[0].value, OrderStatus::Pending);
        assert_eq!(choices[1].label, "Shipped");
    }

    #[test]
    fn test_pairs_payload() {
        let choices = parse(r#"[["PAID", "Paid"], ["DELIVERED", "Delivered"]]"#);
        assert_eq!(
            choices.iter().map(|c| c.value).collect::<Vec<_>>(),
            vec![OrderStatus::Paid, OrderStatus::Delivered]
        );
    }

    #[test]
    fn test_objects_payload_drops_unknown() {
        let choices = parse(
            r#"[{"value": "PROCESSING", "label": "In progress"}, {"value": "LOST", "label": "Lost"}]"#,
        );
        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].label, "In progress");
    }

    #[test]
    fn test_builtin_choices_cover_all_statuses() {
        let choices = builtin_choices();
        assert_eq!(choices.len(), 6);
        assert_eq!(choices[5].value, OrderStatus::Cancelled);
        assert_eq!(choices[5].label, "Cancelled");
    }
}
