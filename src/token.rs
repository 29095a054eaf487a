//! Color token data owned by the host configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque, stable token identifier (unique within one configuration)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TokenId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A single user-configurable color entry with a persisted rank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorToken {
    /// Sort key; need not be contiguous or zero-based
    pub order: u32,

    /// Color in `rgba(r,g,b,a)` form
    pub rgba: String,

    /// Soft-delete flag
    #[serde(default)]
    pub deleted: bool,

    /// Host fields this crate does not interpret (name, group...)
    /// Kept so a save writes them back untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ColorToken {
    pub fn new(order: u32, rgba: impl Into<String>) -> Self {
        Self {
            order,
            rgba: rgba.into(),
            deleted: false,
            extra: serde_json::Map::new(),
        }
    }

    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }
}

/// Token id → token; iteration order carries no meaning, `order` does
pub type OrderedItemMap = BTreeMap<TokenId, ColorToken>;

/// Setting value as stored by the host: the token map nested under `default`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenSettings {
    #[serde(default)]
    pub default: OrderedItemMap,
}

impl TokenSettings {
    pub fn new(tokens: OrderedItemMap) -> Self {
        Self { default: tokens }
    }

    pub fn tokens(&self) -> &OrderedItemMap {
        &self.default
    }

    pub fn tokens_mut(&mut self) -> &mut OrderedItemMap {
        &mut self.default
    }
}

impl FromIterator<(TokenId, ColorToken)> for TokenSettings {
    fn from_iter<I: IntoIterator<Item = (TokenId, ColorToken)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_parse_host_envelope() {
        let json = r#"{
            "default": {
                "a": { "order": 1, "rgba": "rgba(1,2,3,1)", "deleted": false, "name": "Primary" },
                "b": { "order": 0, "rgba": "rgba(4,5,6,1)", "deleted": true }
            }
        }"#;

        let settings: TokenSettings = serde_json::from_str(json).unwrap();
        let a = &settings.tokens()[&TokenId::from("a")];
        assert_eq!(a.order, 1);
        assert!(!a.deleted);
        assert_eq!(a.extra.get("name"), Some(&serde_json::json!("Primary")));
        assert!(settings.tokens()[&TokenId::from("b")].deleted);
    }

    #[test]
    fn test_unknown_fields_survive_write_back() {
        let json = r#"{"default":{"a":{"order":0,"rgba":"rgba(0,0,0,1)","deleted":false,"group":"brand"}}}"#;
        let settings: TokenSettings = serde_json::from_str(json).unwrap();
        let value = serde_json::to_value(&settings).unwrap();
        assert_eq!(value["default"]["a"]["group"], "brand");
    }

    #[test]
    fn test_missing_deleted_defaults_to_false() {
        let token: ColorToken = serde_json::from_str(r#"{"order":3,"rgba":"rgba(9,9,9,1)"}"#).unwrap();
        assert!(!token.deleted);
        assert_eq!(token.order, 3);
    }
}
