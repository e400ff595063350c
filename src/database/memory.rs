//! In-process document collection.
//!
//! Mirrors the subset of MongoDB semantics the rules store relies on, so
//! tests and local runs need no server. Every operation is counted, and the
//! collection can be switched offline to exercise failure paths.

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document};
use parking_lot::Mutex;

use super::collection::DocumentCollection;
use super::error::{Result, RulesError};

/// Number of operations performed, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpCounts {
    pub finds: u64,
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
    pub counts: u64,
}

impl OpCounts {
    /// Operations that modified (or tried to modify) the collection.
    pub fn writes(&self) -> u64 {
        self.inserts + self.updates + self.deletes
    }
}

#[derive(Debug, Default)]
struct State {
    docs: Vec<Document>,
    ops: OpCounts,
    offline: bool,
}

/// Thread-safe in-memory [`DocumentCollection`].
#[derive(Debug, Default)]
pub struct MemoryCollection {
    state: Mutex<State>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the collection with raw documents, bypassing the op counters.
    pub fn with_documents(docs: impl IntoIterator<Item = Document>) -> Self {
        Self {
            state: Mutex::new(State {
                docs: docs.into_iter().collect(),
                ..Default::default()
            }),
        }
    }

    /// Operation counters since creation or the last [`reset_ops`](Self::reset_ops).
    pub fn ops(&self) -> OpCounts {
        self.state.lock().ops
    }

    pub fn reset_ops(&self) {
        self.state.lock().ops = OpCounts::default();
    }

    /// Simulate an unreachable backend: every operation fails while set.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Copy of the stored documents, in insertion order.
    pub fn snapshot(&self) -> Vec<Document> {
        self.state.lock().docs.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl State {
    fn check_online(&self) -> Result<()> {
        if self.offline {
            return Err(RulesError::Unavailable("memory collection is offline".into()));
        }
        Ok(())
    }

    fn position(&self, filter: &Document) -> Option<usize> {
        self.docs.iter().position(|doc| matches_filter(doc, filter))
    }
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    async fn find_one(&self, filter: Document) -> Result<Option<Document>> {
        let mut state = self.state.lock();
        state.check_online()?;
        state.ops.finds += 1;
        Ok(state.position(&filter).map(|i| state.docs[i].clone()))
    }

    async fn find_all(&self) -> Result<Vec<Document>> {
        let mut state = self.state.lock();
        state.check_online()?;
        state.ops.finds += 1;
        Ok(state.docs.clone())
    }

    async fn insert_one(&self, mut doc: Document) -> Result<()> {
        let mut state = self.state.lock();
        state.check_online()?;
        state.ops.inserts += 1;

        let id = match doc.get("_id") {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                doc.insert("_id", id.clone());
                id
            }
        };

        let taken = state
            .docs
            .iter()
            .any(|existing| existing.get("_id").is_some_and(|other| bson_eq(other, &id)));
        if taken {
            return Err(RulesError::DuplicateKey(id.to_string()));
        }

        state.docs.push(doc);
        Ok(())
    }

    async fn update(&self, filter: Document, fields: Document) -> Result<bool> {
        let mut state = self.state.lock();
        state.check_online()?;
        state.ops.updates += 1;

        let Some(i) = state.position(&filter) else {
            return Ok(false);
        };
        let target = &mut state.docs[i];
        for (key, value) in fields {
            target.insert(key, value);
        }
        Ok(true)
    }

    async fn delete_one(&self, filter: Document) -> Result<bool> {
        let mut state = self.state.lock();
        state.check_online()?;
        state.ops.deletes += 1;

        match state.position(&filter) {
            Some(i) => {
                state.docs.remove(i);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count(&self, filter: Document) -> Result<u64> {
        let mut state = self.state.lock();
        state.check_online()?;
        state.ops.counts += 1;
        Ok(state
            .docs
            .iter()
            .filter(|doc| matches_filter(doc, &filter))
            .count() as u64)
    }
}

/// Evaluate a filter document against `doc`.
fn matches_filter(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, condition)| {
        let value = doc.get(key);
        match condition {
            Bson::Document(ops) if is_operator_doc(ops) => {
                ops.iter().all(|(op, arg)| apply_operator(value, op, arg))
            }
            literal => value.is_some_and(|v| bson_eq(v, literal)),
        }
    })
}

fn is_operator_doc(doc: &Document) -> bool {
    !doc.is_empty() && doc.keys().all(|k| k.starts_with('$'))
}

fn apply_operator(value: Option<&Bson>, op: &str, arg: &Bson) -> bool {
    match op {
        "$eq" => value.is_some_and(|v| bson_eq(v, arg)),
        "$ne" => !value.is_some_and(|v| bson_eq(v, arg)),
        "$exists" => value.is_some() == is_truthy(arg),
        _ => false,
    }
}

/// Equality with MongoDB's cross-width numeric comparison. Integers compare
/// exactly; doubles only come in when one side is a double.
fn bson_eq(a: &Bson, b: &Bson) -> bool {
    if let (Some(x), Some(y)) = (as_integer(a), as_integer(b)) {
        return x == y;
    }
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn as_integer(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        _ => None,
    }
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Null => false,
        other => as_number(other).is_none_or(|n| n != 0.0),
    }
}
