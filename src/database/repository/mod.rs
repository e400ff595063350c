//! Repository module - data access layer.

mod rules_repository;

pub use rules_repository::{
    ChatRules, RepairReport, RulesStats, RulesStore, RULES_COLLECTION,
};
