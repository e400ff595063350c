//! Database model exports.

pub mod rule_record;

pub use rule_record::RuleRecord;
