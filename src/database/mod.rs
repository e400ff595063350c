//! Database module exports.

mod collection;
mod error;
mod memory;
mod models;
mod mongo;
mod repository;

pub use collection::DocumentCollection;
pub use error::{Result, RulesError};
pub use memory::{MemoryCollection, OpCounts};
pub use models::*;
pub use mongo::{Database, MongoCollection};
pub use repository::{ChatRules, RepairReport, RulesStats, RulesStore, RULES_COLLECTION};
