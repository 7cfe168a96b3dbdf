//! Service property maps.

use std::collections::BTreeMap;

use serde_json::Value;

/// Property map attached to a service registration. Keys are unique.
pub type Properties = BTreeMap<String, Value>;

/// Set by the registry: the registration's [`ServiceId`](crate::ServiceId).
pub const SERVICE_ID: &str = "service.id";

/// Optional integer; higher ranks sort first in lookups.
pub const SERVICE_RANKING: &str = "service.ranking";

/// Set by the registry: the interface name the service was published under.
pub const OBJECT_CLASS: &str = "objectclass";

/// Reads `service.ranking`, defaulting to `0` when absent or not an integer.
pub fn ranking_of(properties: &Properties) -> i64 {
    properties
        .get(SERVICE_RANKING)
        .and_then(Value::as_i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ranking_defaults_to_zero() {
        let mut props = Properties::new();
        assert_eq!(ranking_of(&props), 0);
        props.insert(SERVICE_RANKING.into(), json!("high"));
        assert_eq!(ranking_of(&props), 0);
        props.insert(SERVICE_RANKING.into(), json!(-3));
        assert_eq!(ranking_of(&props), -3);
    }
}
