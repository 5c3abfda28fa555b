use crate::utils::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Key under which the router keeps the port forwarding rule list.
pub const RULES_CONFIG_KEY: &str = "rules-config";

/// One parsed input line: `key=value` tokens keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// 1-based line number in the source text.
    pub line: usize,
    pub data: HashMap<String, String>,
}

impl Record {
    pub fn new(line: usize) -> Self {
        Self {
            line,
            data: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }
}

/// A single remote rule as delivered by the router.
///
/// The router's serializer does not guarantee string-typed values, so an entry
/// is classified once on arrival and normalized through [`RuleEntry::normalize`]
/// whenever it has to be compared.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleEntry {
    /// Every value is already a string.
    StringEntry(BTreeMap<String, String>),
    /// An object holding at least one non-string value.
    MixedEntry(Map<String, Value>),
    /// Anything that is not an object. Never matches, written back verbatim.
    Opaque(Value),
}

impl RuleEntry {
    /// Canonical string-valued view of the entry, or `None` when some value
    /// cannot be coerced (null, nested array/object) or the entry is not an object.
    pub fn normalize(&self) -> Option<BTreeMap<String, String>> {
        match self {
            RuleEntry::StringEntry(fields) => Some(fields.clone()),
            RuleEntry::MixedEntry(fields) => fields
                .iter()
                .map(|(key, value)| coerce_scalar(value).map(|v| (key.clone(), v)))
                .collect(),
            RuleEntry::Opaque(_) => None,
        }
    }

    pub fn is_matchable(&self) -> bool {
        self.normalize().is_some()
    }
}

fn coerce_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

impl From<Value> for RuleEntry {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) if fields.values().all(Value::is_string) => {
                let strings = fields
                    .into_iter()
                    .filter_map(|(key, value)| match value {
                        Value::String(s) => Some((key, s)),
                        _ => None,
                    })
                    .collect();
                RuleEntry::StringEntry(strings)
            }
            Value::Object(fields) => RuleEntry::MixedEntry(fields),
            other => RuleEntry::Opaque(other),
        }
    }
}

impl From<RuleEntry> for Value {
    fn from(entry: RuleEntry) -> Self {
        match entry {
            RuleEntry::StringEntry(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, Value::String(value)))
                    .collect(),
            ),
            RuleEntry::MixedEntry(fields) => Value::Object(fields),
            RuleEntry::Opaque(value) => value,
        }
    }
}

/// State of the `rules-config` field of a fetched feature.
#[derive(Debug, Clone, PartialEq)]
pub enum RulesConfig {
    /// The router has not populated the collection yet (absent or null).
    NotReady,
    Ready(Vec<RuleEntry>),
}

/// Envelope returned by the router for one configurable subsystem.
///
/// Only the `rules-config` key of the data section is interpreted; every other
/// key is carried through to the commit untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub data: Map<String, Value>,
}

impl Feature {
    pub fn new(data: Map<String, Value>) -> Self {
        Self { data }
    }

    /// 從路由器回傳的 FEATURE 物件建立；`data` 必須是物件
    pub fn from_envelope(envelope: Value) -> Result<Self> {
        match envelope {
            Value::Object(mut fields) => match fields.remove("data") {
                Some(Value::Object(data)) => Ok(Self { data }),
                Some(other) => Err(SyncError::MalformedResponseError {
                    message: format!("feature data is not an object: {}", other),
                }),
                None => Err(SyncError::MalformedResponseError {
                    message: "feature envelope has no data section".to_string(),
                }),
            },
            other => Err(SyncError::MalformedResponseError {
                message: format!("feature envelope is not an object: {}", other),
            }),
        }
    }

    pub fn rules_config(&self) -> Result<RulesConfig> {
        match self.data.get(RULES_CONFIG_KEY) {
            None | Some(Value::Null) => Ok(RulesConfig::NotReady),
            Some(Value::Array(items)) => Ok(RulesConfig::Ready(
                items.iter().cloned().map(RuleEntry::from).collect(),
            )),
            // 路由器清空規則後會把欄位序列化成空字串
            Some(Value::String(s)) if s.is_empty() => Ok(RulesConfig::Ready(Vec::new())),
            Some(other) => Err(SyncError::MalformedResponseError {
                message: format!("unexpected {} shape: {}", RULES_CONFIG_KEY, other),
            }),
        }
    }

    pub fn set_rules(&mut self, rules: Vec<RuleEntry>) {
        let items = rules.into_iter().map(Value::from).collect();
        self.data
            .insert(RULES_CONFIG_KEY.to_string(), Value::Array(items));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_entry_classification() {
        let strings = RuleEntry::from(json!({"protocol": "tcp", "original-port": "80"}));
        let mixed = RuleEntry::from(json!({"protocol": "tcp", "original-port": 80}));
        let opaque = RuleEntry::from(json!("tcp/80"));

        assert!(matches!(strings, RuleEntry::StringEntry(_)));
        assert!(matches!(mixed, RuleEntry::MixedEntry(_)));
        assert!(matches!(opaque, RuleEntry::Opaque(_)));
    }

    #[test]
    fn test_mixed_entry_normalizes_scalars() {
        let entry = RuleEntry::from(json!({
            "original-port": 80,
            "forward-to-port": "8080",
            "enabled": true
        }));

        let fields = entry.normalize().unwrap();
        assert_eq!(fields.get("original-port").unwrap(), "80");
        assert_eq!(fields.get("forward-to-port").unwrap(), "8080");
        assert_eq!(fields.get("enabled").unwrap(), "true");
    }

    #[test]
    fn test_nested_or_null_values_are_unmatchable() {
        let nested = RuleEntry::from(json!({"original-port": {"from": 80}}));
        let null = RuleEntry::from(json!({"original-port": null}));

        assert!(!nested.is_matchable());
        assert!(!null.is_matchable());
        assert!(!RuleEntry::from(json!(42)).is_matchable());
    }

    #[test]
    fn test_unmatchable_entry_round_trips_verbatim() {
        let raw = json!({"original-port": [80, 81], "protocol": "tcp"});
        let entry = RuleEntry::from(raw.clone());
        assert_eq!(Value::from(entry), raw);
    }

    #[test]
    fn test_rules_config_states() {
        let absent = Feature::new(Map::new());
        assert_eq!(absent.rules_config().unwrap(), RulesConfig::NotReady);

        let null = Feature::from_envelope(json!({"data": {"rules-config": null}})).unwrap();
        assert_eq!(null.rules_config().unwrap(), RulesConfig::NotReady);

        let empty_string = Feature::from_envelope(json!({"data": {"rules-config": ""}})).unwrap();
        assert_eq!(empty_string.rules_config().unwrap(), RulesConfig::Ready(vec![]));

        let empty_list = Feature::from_envelope(json!({"data": {"rules-config": []}})).unwrap();
        assert_eq!(empty_list.rules_config().unwrap(), RulesConfig::Ready(vec![]));

        let bogus = Feature::from_envelope(json!({"data": {"rules-config": 7}})).unwrap();
        assert!(matches!(
            bogus.rules_config(),
            Err(SyncError::MalformedResponseError { .. })
        ));
    }

    #[test]
    fn test_from_envelope_rejects_missing_data() {
        assert!(Feature::from_envelope(json!({"success": "1"})).is_err());
        assert!(Feature::from_envelope(json!({"data": "nope"})).is_err());
        assert!(Feature::from_envelope(json!([])).is_err());
    }

    #[test]
    fn test_set_rules_keeps_other_keys() {
        let mut feature = Feature::from_envelope(json!({
            "data": {"wan": "eth0", "rules-config": []}
        }))
        .unwrap();

        feature.set_rules(vec![RuleEntry::from(json!({"protocol": "udp"}))]);

        assert_eq!(feature.data["wan"], json!("eth0"));
        assert_eq!(feature.data[RULES_CONFIG_KEY], json!([{"protocol": "udp"}]));
    }
}
