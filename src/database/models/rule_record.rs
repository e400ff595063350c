//! Per-chat rules record.

use mongodb::bson::{doc, Bson, Document};
use serde::{Deserialize, Serialize};

/// Rules stored for one chat. The chat id doubles as the document `_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    /// Telegram chat ID
    #[serde(rename = "_id")]
    pub chat_id: i64,

    /// The rules text (supports newlines and formatting)
    #[serde(default)]
    pub rules: String,

    /// Whether rules are delivered in PM (true) or in the group (false)
    #[serde(default)]
    pub privrules: bool,
}

impl RuleRecord {
    pub const RULES: &'static str = "rules";
    pub const PRIVRULES: &'static str = "privrules";

    /// Create a default record for a chat.
    pub fn new(chat_id: i64) -> Self {
        Self {
            chat_id,
            rules: String::new(),
            privrules: false,
        }
    }

    /// Check if rules text is set. Same test as the store's with-rules count.
    pub fn has_rules(&self) -> bool {
        !self.rules.is_empty()
    }

    /// Same field values under another chat id.
    pub fn rekeyed(&self, chat_id: i64) -> Self {
        Self {
            chat_id,
            ..self.clone()
        }
    }

    /// Fields every stored record is expected to carry, with their defaults.
    pub fn expected_fields() -> [(&'static str, Bson); 2] {
        [
            (Self::PRIVRULES, Bson::Boolean(false)),
            (Self::RULES, Bson::String(String::new())),
        ]
    }

    /// Filter selecting the record of `chat_id`.
    pub fn id_filter(chat_id: i64) -> Document {
        doc! { "_id": chat_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson;

    #[test]
    fn test_serializes_chat_id_as_document_id() {
        let record = RuleRecord {
            chat_id: -100123,
            rules: "no spam".into(),
            privrules: true,
        };

        let doc = bson::to_document(&record).unwrap();
        assert_eq!(doc, doc! { "_id": -100123_i64, "rules": "no spam", "privrules": true });
    }

    #[test]
    fn test_missing_fields_decode_as_defaults() {
        let record: RuleRecord = bson::from_document(doc! { "_id": 42_i64 }).unwrap();
        assert_eq!(record, RuleRecord::new(42));
    }

    #[test]
    fn test_has_rules_means_non_empty() {
        let mut record = RuleRecord::new(1);
        assert!(!record.has_rules());

        record.rules = "  \n".into();
        assert!(record.has_rules());

        record.rules = "1. be kind".into();
        assert!(record.has_rules());
    }

    #[test]
    fn test_rekeyed_keeps_fields() {
        let record = RuleRecord {
            chat_id: 1,
            rules: "x".into(),
            privrules: true,
        };
        let moved = record.rekeyed(2);

        assert_eq!(moved.chat_id, 2);
        assert_eq!(moved.rules, "x");
        assert!(moved.privrules);
    }
}
