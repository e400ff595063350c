//! Rules store with create-on-first-access records.
//!
//! Every operation that touches the collection or the record cache runs
//! under one store-wide lock, so at most one store operation executes at a
//! time per store instance. Public methods take the lock exactly once and
//! delegate to lock-free helpers.

use std::sync::Arc;

use mongodb::bson::{self, doc, Bson, Document};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{CacheConfig, TypedCache};
use crate::database::collection::DocumentCollection;
use crate::database::error::{Result, RulesError};
use crate::database::models::RuleRecord;
use crate::database::Database;

/// Default collection name.
pub const RULES_COLLECTION: &str = "rules";

/// Outcome of a repair pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Documents inspected.
    pub scanned: usize,
    /// Fields written with their default value.
    pub backfilled: usize,
}

/// Aggregate counts over all records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RulesStats {
    pub total: u64,
    pub with_rules: u64,
    pub private: u64,
    pub group: u64,
}

struct StoreInner {
    collection: Arc<dyn DocumentCollection>,
    cache: Option<TypedCache<i64, RuleRecord>>,
    lock: Mutex<()>,
}

/// Per-chat rules storage.
///
/// Cheap to clone; clones share the collection, cache and lock.
#[derive(Clone)]
pub struct RulesStore {
    inner: Arc<StoreInner>,
}

impl RulesStore {
    /// Build a store over `collection` and run the repair pass once.
    ///
    /// `cache` enables the read-through record cache; `None` or a zero
    /// capacity disables it.
    pub async fn new(
        collection: Arc<dyn DocumentCollection>,
        cache: Option<CacheConfig>,
    ) -> Result<Self> {
        let store = Self {
            inner: Arc::new(StoreInner {
                collection,
                cache: TypedCache::maybe_new("rules_records", cache.as_ref()),
                lock: Mutex::new(()),
            }),
        };

        info!("Starting rules database repair...");
        let report = store.repair().await?;
        info!(
            "Rules repair done: scanned {} record(s), backfilled {} field(s)",
            report.scanned, report.backfilled
        );

        Ok(store)
    }

    /// Build a MongoDB-backed store on the named collection.
    pub async fn connect(
        db: &Database,
        collection: &str,
        cache: Option<CacheConfig>,
    ) -> Result<Self> {
        Self::new(Arc::new(db.documents(collection)), cache).await
    }

    /// Open the rules of a chat, creating a default record on first access.
    pub async fn open(&self, chat_id: i64) -> Result<ChatRules> {
        let _guard = self.inner.lock.lock().await;

        let record = match self.load(chat_id).await? {
            Some(record) => record,
            None => {
                let record = RuleRecord::new(chat_id);
                self.inner
                    .collection
                    .insert_one(bson::to_document(&record)?)
                    .await?;
                self.cache_put(&record);
                info!("Initialized rules document for chat {}", chat_id);
                record
            }
        };

        Ok(ChatRules {
            store: self.clone(),
            record,
        })
    }

    /// Look up the record of a chat without creating one.
    pub async fn get(&self, chat_id: i64) -> Result<Option<RuleRecord>> {
        let _guard = self.inner.lock.lock().await;
        self.load(chat_id).await
    }

    /// Delete the record of a chat without opening it first.
    ///
    /// Returns whether a record was removed; a chat without one is left
    /// untouched.
    pub async fn clear(&self, chat_id: i64) -> Result<bool> {
        let _guard = self.inner.lock.lock().await;

        self.cache_drop(chat_id);
        let deleted = self
            .inner
            .collection
            .delete_one(RuleRecord::id_filter(chat_id))
            .await?;
        debug!("Cleared rules for chat {}: {}", chat_id, deleted);
        Ok(deleted)
    }

    /// Move the record of `old_id` to `new_id`.
    ///
    /// Inserts the copy before deleting the original. The two writes are not
    /// atomic: if the delete fails both records remain, and nothing is rolled
    /// back.
    ///
    /// # Errors
    /// [`RulesError::NotFound`] if `old_id` has no record; nothing is written.
    pub async fn migrate_chat(&self, old_id: i64, new_id: i64) -> Result<()> {
        let _guard = self.inner.lock.lock().await;

        let record = self
            .find_record(old_id)
            .await?
            .ok_or(RulesError::NotFound(old_id))?;

        if old_id == new_id {
            return Ok(());
        }

        let moved = record.rekeyed(new_id);
        self.inner
            .collection
            .insert_one(bson::to_document(&moved)?)
            .await?;
        self.cache_put(&moved);

        self.cache_drop(old_id);
        self.inner
            .collection
            .delete_one(RuleRecord::id_filter(old_id))
            .await?;

        info!("Migrated rules from chat {} to {}", old_id, new_id);
        Ok(())
    }

    /// Number of chats with non-empty rules text.
    pub async fn count_with_rules(&self) -> Result<u64> {
        self.count(with_rules_filter()).await
    }

    /// Number of chats delivering rules in PM.
    pub async fn count_privrules_chats(&self) -> Result<u64> {
        self.count(doc! { "privrules": true }).await
    }

    /// Number of chats posting rules in the group.
    pub async fn count_grouprules_chats(&self) -> Result<u64> {
        self.count(doc! { "privrules": false }).await
    }

    /// Number of chat records.
    pub async fn count_chats(&self) -> Result<u64> {
        self.count(Document::new()).await
    }

    /// All aggregate counts, taken under a single lock acquisition.
    pub async fn stats(&self) -> Result<RulesStats> {
        let _guard = self.inner.lock.lock().await;
        let collection = &self.inner.collection;

        Ok(RulesStats {
            total: collection.count(Document::new()).await?,
            with_rules: collection.count(with_rules_filter()).await?,
            private: collection.count(doc! { "privrules": true }).await?,
            group: collection.count(doc! { "privrules": false }).await?,
        })
    }

    /// Every stored record.
    pub async fn load_all(&self) -> Result<Vec<RuleRecord>> {
        let _guard = self.inner.lock.lock().await;

        let docs = self.inner.collection.find_all().await?;
        docs.into_iter()
            .map(|d| bson::from_document(d).map_err(RulesError::from))
            .collect()
    }

    /// Backfill expected fields missing from stored documents.
    ///
    /// Idempotent: once every document carries every field, no writes are
    /// issued.
    pub async fn repair(&self) -> Result<RepairReport> {
        let _guard = self.inner.lock.lock().await;

        let docs = self.inner.collection.find_all().await?;
        let mut report = RepairReport {
            scanned: docs.len(),
            backfilled: 0,
        };

        for data in &docs {
            let id = data.get("_id").cloned().unwrap_or(Bson::Null);

            for (key, default) in RuleRecord::expected_fields() {
                if data.contains_key(key) {
                    continue;
                }

                warn!(
                    "Repairing rules database - setting '{}: {}' for {}",
                    key, default, id
                );
                self.inner
                    .collection
                    .update(doc! { "_id": id.clone() }, field(key, default))
                    .await?;
                report.backfilled += 1;
            }

            match id {
                Bson::Int64(chat_id) => self.cache_drop(chat_id),
                Bson::Int32(chat_id) => self.cache_drop(chat_id.into()),
                _ => {}
            }
        }

        Ok(report)
    }

    async fn count(&self, filter: Document) -> Result<u64> {
        let _guard = self.inner.lock.lock().await;
        self.inner.collection.count(filter).await
    }

    /// Cache, then collection. Caller holds the lock.
    async fn load(&self, chat_id: i64) -> Result<Option<RuleRecord>> {
        if let Some(cache) = &self.inner.cache
            && let Some(record) = cache.get(&chat_id)
        {
            return Ok(Some(record));
        }

        let record = self.find_record(chat_id).await?;
        if let Some(r) = &record {
            self.cache_put(r);
        }
        Ok(record)
    }

    /// Collection only. Caller holds the lock.
    async fn find_record(&self, chat_id: i64) -> Result<Option<RuleRecord>> {
        let found = self
            .inner
            .collection
            .find_one(RuleRecord::id_filter(chat_id))
            .await?;
        Ok(found.map(bson::from_document::<RuleRecord>).transpose()?)
    }

    /// Point update of one field. Caller holds the lock.
    ///
    /// A record deleted behind the accessor's back is `NotFound`.
    async fn write_field(&self, chat_id: i64, key: &str, value: Bson) -> Result<()> {
        let matched = self
            .inner
            .collection
            .update(RuleRecord::id_filter(chat_id), field(key, value))
            .await?;
        if !matched {
            return Err(RulesError::NotFound(chat_id));
        }
        debug!("Updated {} for chat {}", key, chat_id);
        Ok(())
    }

    fn cache_put(&self, record: &RuleRecord) {
        if let Some(cache) = &self.inner.cache {
            cache.insert(record.chat_id, record.clone());
        }
    }

    fn cache_drop(&self, chat_id: i64) {
        if let Some(cache) = &self.inner.cache {
            cache.invalidate(&chat_id);
        }
    }
}

/// Records whose rules text is present and non-empty.
fn with_rules_filter() -> Document {
    doc! { "rules": { "$exists": true, "$ne": "" } }
}

fn field(key: &str, value: Bson) -> Document {
    let mut doc = Document::new();
    doc.insert(key, value);
    doc
}

impl std::fmt::Debug for RulesStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RulesStore")
            .field("cache", &self.inner.cache)
            .finish_non_exhaustive()
    }
}

/// Accessor bound to one chat's record.
///
/// Getters read the snapshot taken when the chat was opened (or last
/// written through this accessor); they never touch the database.
#[derive(Debug, Clone)]
pub struct ChatRules {
    store: RulesStore,
    record: RuleRecord,
}

impl ChatRules {
    pub fn chat_id(&self) -> i64 {
        self.record.chat_id
    }

    pub fn rules(&self) -> &str {
        &self.record.rules
    }

    pub fn privrules(&self) -> bool {
        self.record.privrules
    }

    pub fn record(&self) -> &RuleRecord {
        &self.record
    }

    /// Replace the rules text.
    ///
    /// The snapshot only changes once the write succeeded. Fails with
    /// [`RulesError::NotFound`] if the record was cleared in the meantime.
    ///
    /// The cached record is dropped rather than overwritten: another accessor
    /// may have written the other field since this snapshot was taken.
    pub async fn set_rules(&mut self, rules: impl Into<String>) -> Result<()> {
        let rules = rules.into();
        let _guard = self.store.inner.lock.lock().await;

        self.store
            .write_field(self.record.chat_id, RuleRecord::RULES, Bson::String(rules.clone()))
            .await?;
        self.record.rules = rules;
        self.store.cache_drop(self.record.chat_id);
        Ok(())
    }

    /// Set whether rules are delivered in PM.
    pub async fn set_privrules(&mut self, privrules: bool) -> Result<()> {
        let _guard = self.store.inner.lock.lock().await;

        self.store
            .write_field(self.record.chat_id, RuleRecord::PRIVRULES, Bson::Boolean(privrules))
            .await?;
        self.record.privrules = privrules;
        self.store.cache_drop(self.record.chat_id);
        Ok(())
    }

    /// Delete the chat's record. The next [`RulesStore::open`] starts from a
    /// fresh default record.
    ///
    /// Returns whether a record was removed.
    pub async fn clear(self) -> Result<bool> {
        self.store.clear(self.record.chat_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryCollection;

    async fn store_with(col: &Arc<MemoryCollection>, cache: Option<CacheConfig>) -> RulesStore {
        let store = RulesStore::new(col.clone(), cache).await.unwrap();
        col.reset_ops();
        store
    }

    async fn memory_store() -> (Arc<MemoryCollection>, RulesStore) {
        let col = Arc::new(MemoryCollection::new());
        let store = store_with(&col, Some(CacheConfig::lazy_load())).await;
        (col, store)
    }

    #[tokio::test]
    async fn test_first_open_creates_default_record_once() {
        let (col, store) = memory_store().await;

        let chat = store.open(-1001).await.unwrap();
        assert_eq!(chat.rules(), "");
        assert!(!chat.privrules());
        assert_eq!(col.ops().inserts, 1);

        store.open(-1001).await.unwrap();
        assert_eq!(col.ops().inserts, 1);
        assert_eq!(
            col.snapshot(),
            vec![doc! { "_id": -1001_i64, "rules": "", "privrules": false }]
        );
    }

    #[tokio::test]
    async fn test_second_open_without_cache_reads_existing_record() {
        let col = Arc::new(MemoryCollection::new());
        let store = store_with(&col, None).await;

        store.open(5).await.unwrap().set_rules("keep it civil").await.unwrap();
        let again = store.open(5).await.unwrap();

        assert_eq!(again.rules(), "keep it civil");
        assert_eq!(col.ops().inserts, 1);
    }

    #[tokio::test]
    async fn test_set_rules_round_trips_any_text() {
        let (col, store) = memory_store().await;
        let mut chat = store.open(7).await.unwrap();

        for text in ["", "1. no spam\n2. no ads", ".*[a-z]+$ (^_^) \\d{3}"] {
            chat.set_rules(text).await.unwrap();
            assert_eq!(chat.rules(), text);

            let stored = col.find_one(RuleRecord::id_filter(7)).await.unwrap().unwrap();
            assert_eq!(stored.get_str("rules").unwrap(), text);
        }
    }

    #[tokio::test]
    async fn test_privrules_toggle() {
        let (_col, store) = memory_store().await;
        let mut chat = store.open(8).await.unwrap();

        chat.set_privrules(true).await.unwrap();
        assert!(chat.privrules());

        chat.set_privrules(false).await.unwrap();
        assert!(!chat.privrules());
        assert!(!store.open(8).await.unwrap().privrules());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_snapshot_unchanged() {
        let (col, store) = memory_store().await;
        let mut chat = store.open(9).await.unwrap();
        chat.set_rules("original").await.unwrap();

        col.set_offline(true);
        let err = chat.set_rules("lost").await.unwrap_err();
        assert!(matches!(err, RulesError::Unavailable(_)));
        assert!(chat.set_privrules(true).await.is_err());
        assert_eq!(chat.rules(), "original");
        assert!(!chat.privrules());

        col.set_offline(false);
        assert_eq!(store.open(9).await.unwrap().rules(), "original");
    }

    #[tokio::test]
    async fn test_clear_then_open_recreates_default() {
        let (col, store) = memory_store().await;
        let mut chat = store.open(10).await.unwrap();
        chat.set_rules("strict").await.unwrap();
        chat.set_privrules(true).await.unwrap();

        assert!(chat.clear().await.unwrap());
        assert!(col.is_empty());
        assert_eq!(store.get(10).await.unwrap(), None);

        let fresh = store.open(10).await.unwrap();
        assert_eq!(fresh.record(), &RuleRecord::new(10));
    }

    #[tokio::test]
    async fn test_clear_unknown_chat_writes_nothing() {
        let (col, store) = memory_store().await;

        assert!(!store.clear(12).await.unwrap());
        assert_eq!(col.ops().inserts, 0);
        assert!(col.is_empty());

        store.open(12).await.unwrap().set_rules("x").await.unwrap();
        assert!(store.clear(12).await.unwrap());
        assert_eq!(store.get(12).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_through_stale_accessor_is_not_found() {
        let (col, store) = memory_store().await;
        let mut stale = store.open(11).await.unwrap();
        store.open(11).await.unwrap().clear().await.unwrap();

        let err = stale.set_rules("too late").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(stale.rules(), "");
        assert!(col.is_empty());
        assert_eq!(store.get(11).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sibling_accessors_keep_both_writes() {
        let (col, store) = memory_store().await;
        let mut a = store.open(50).await.unwrap();
        let mut b = store.open(50).await.unwrap();

        b.set_privrules(true).await.unwrap();
        a.set_rules("hello").await.unwrap();

        let stored: RuleRecord = bson::from_document(
            col.find_one(RuleRecord::id_filter(50)).await.unwrap().unwrap(),
        )
        .unwrap();
        let reopened = store.open(50).await.unwrap();
        assert_eq!(reopened.record(), &stored);
        assert_eq!(reopened.rules(), "hello");
        assert!(reopened.privrules());

        a.set_privrules(false).await.unwrap();
        b.set_rules("bye").await.unwrap();
        let reopened = store.open(50).await.unwrap();
        assert_eq!(reopened.rules(), "bye");
        assert!(!reopened.privrules());
    }

    #[tokio::test]
    async fn test_migrate_moves_fields_and_deletes_source() {
        let (_col, store) = memory_store().await;
        let mut chat = store.open(-100).await.unwrap();
        chat.set_rules("x").await.unwrap();
        chat.set_privrules(true).await.unwrap();

        store.migrate_chat(-100, -1000100).await.unwrap();

        let moved = store.open(-1000100).await.unwrap();
        assert_eq!(moved.rules(), "x");
        assert!(moved.privrules());

        assert_eq!(store.get(-100).await.unwrap(), None);
        let old = store.open(-100).await.unwrap();
        assert_eq!(old.record(), &RuleRecord::new(-100));
    }

    #[tokio::test]
    async fn test_migrate_missing_chat_is_not_found() {
        let (col, store) = memory_store().await;

        let err = store.migrate_chat(1, 2).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(col.ops().writes(), 0);
        assert!(col.is_empty());
    }

    #[tokio::test]
    async fn test_migrate_onto_existing_chat_keeps_source() {
        let (col, store) = memory_store().await;
        store.open(1).await.unwrap().set_rules("one").await.unwrap();
        store.open(2).await.unwrap();

        let err = store.migrate_chat(1, 2).await.unwrap_err();
        assert!(matches!(err, RulesError::DuplicateKey(_)));
        assert_eq!(col.len(), 2);
        assert_eq!(store.get(1).await.unwrap().unwrap().rules, "one");
    }

    #[tokio::test]
    async fn test_counts_partition_records() {
        let (_col, store) = memory_store().await;

        let mut a = store.open(1).await.unwrap();
        a.set_rules("a").await.unwrap();
        a.set_privrules(true).await.unwrap();
        store.open(2).await.unwrap().set_rules("b").await.unwrap();
        store.open(3).await.unwrap();

        assert_eq!(store.count_with_rules().await.unwrap(), 2);
        assert_eq!(store.count_privrules_chats().await.unwrap(), 1);
        assert_eq!(store.count_grouprules_chats().await.unwrap(), 2);
        assert_eq!(
            store.count_privrules_chats().await.unwrap()
                + store.count_grouprules_chats().await.unwrap(),
            store.count_chats().await.unwrap()
        );

        let stats = store.stats().await.unwrap();
        assert_eq!(
            stats,
            RulesStats {
                total: 3,
                with_rules: 2,
                private: 1,
                group: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_count_with_rules_agrees_with_has_rules() {
        let (_col, store) = memory_store().await;
        store.open(1).await.unwrap();
        store.open(2).await.unwrap().set_rules(" \n").await.unwrap();
        store.open(3).await.unwrap().set_rules("no spam").await.unwrap();

        let with_rules = store
            .load_all()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.has_rules())
            .count() as u64;
        assert_eq!(with_rules, 2);
        assert_eq!(store.count_with_rules().await.unwrap(), with_rules);
    }

    #[tokio::test]
    async fn test_load_all_returns_every_record() {
        let (_col, store) = memory_store().await;
        store.open(1).await.unwrap();
        store.open(2).await.unwrap().set_rules("two").await.unwrap();

        let mut all = store.load_all().await.unwrap();
        all.sort_by_key(|r| r.chat_id);

        assert_eq!(all.len(), 2);
        assert_eq!(all[1].rules, "two");
    }

    #[tokio::test]
    async fn test_repair_backfills_missing_fields_once() {
        let col = Arc::new(MemoryCollection::with_documents([
            doc! { "_id": 1_i64, "rules": "keep me" },
            doc! { "_id": 2_i64 },
            doc! { "_id": 3_i64, "rules": "", "privrules": true },
        ]));

        // construction runs the first pass
        let store = RulesStore::new(col.clone(), None).await.unwrap();
        assert_eq!(col.ops().updates, 3);

        let docs = col.snapshot();
        assert_eq!(docs[0], doc! { "_id": 1_i64, "rules": "keep me", "privrules": false });
        assert_eq!(docs[1], doc! { "_id": 2_i64, "privrules": false, "rules": "" });
        assert_eq!(docs[2], doc! { "_id": 3_i64, "rules": "", "privrules": true });

        col.reset_ops();
        let report = store.repair().await.unwrap();
        assert_eq!(report, RepairReport { scanned: 3, backfilled: 0 });
        assert_eq!(col.ops().writes(), 0);
    }

    #[tokio::test]
    async fn test_repair_refreshes_cached_records() {
        let col = Arc::new(MemoryCollection::new());
        let store = store_with(&col, Some(CacheConfig::lazy_load())).await;
        store.open(4).await.unwrap();

        // written behind the store's back; repair drops cached copies
        col.update(RuleRecord::id_filter(4), doc! { "rules": "external" })
            .await
            .unwrap();
        store.repair().await.unwrap();

        assert_eq!(store.open(4).await.unwrap().rules(), "external");
    }

    #[tokio::test]
    async fn test_backend_failure_propagates_from_new() {
        let col = Arc::new(MemoryCollection::new());
        col.set_offline(true);

        let result = RulesStore::new(col.clone(), None).await;
        assert!(matches!(result, Err(RulesError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_concurrent_first_opens_insert_once() {
        let (col, store) = memory_store().await;

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.open(77).await.map(|c| c.chat_id()) })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 77);
        }
        assert_eq!(col.ops().inserts, 1);
        assert_eq!(col.len(), 1);
    }
}
