//! MongoDB database wrapper.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::{options::ClientOptions, Client, Collection};
use tracing::{debug, info};

use super::collection::DocumentCollection;
use super::error::Result;

/// Database wrapper for MongoDB operations.
#[derive(Debug, Clone)]
pub struct Database {
    db: mongodb::Database,
}

impl Database {
    /// Connect to MongoDB with the given URI and database name.
    ///
    /// # Arguments
    /// * `uri` - MongoDB connection string
    /// * `db_name` - Database name to use
    ///
    /// # Errors
    /// Returns error if connection fails.
    pub async fn connect(uri: &str, db_name: &str) -> anyhow::Result<Self> {
        let options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(options)?;

        // Ping the database to verify connection
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        info!("Successfully connected to MongoDB");

        Ok(Self {
            db: client.database(db_name),
        })
    }

    /// Get an untyped document collection.
    pub fn documents(&self, name: &str) -> MongoCollection {
        MongoCollection::new(self.db.collection(name))
    }
}

/// [`DocumentCollection`] over a live MongoDB collection.
#[derive(Debug, Clone)]
pub struct MongoCollection {
    inner: Collection<Document>,
}

impl MongoCollection {
    pub fn new(inner: Collection<Document>) -> Self {
        Self { inner }
    }

    /// Collection name on the server.
    pub fn name(&self) -> &str {
        self.inner.name()
    }
}

#[async_trait]
impl DocumentCollection for MongoCollection {
    async fn find_one(&self, filter: Document) -> Result<Option<Document>> {
        Ok(self.inner.find_one(filter).await?)
    }

    async fn find_all(&self) -> Result<Vec<Document>> {
        let cursor = self.inner.find(doc! {}).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_one(&self, doc: Document) -> Result<()> {
        self.inner.insert_one(doc).await?;
        Ok(())
    }

    async fn update(&self, filter: Document, fields: Document) -> Result<bool> {
        let result = self
            .inner
            .update_one(filter, doc! { "$set": fields })
            .await?;
        debug!("{}: matched {} document(s) on update", self.name(), result.matched_count);
        Ok(result.matched_count > 0)
    }

    async fn delete_one(&self, filter: Document) -> Result<bool> {
        let result = self.inner.delete_one(filter).await?;
        Ok(result.deleted_count > 0)
    }

    async fn count(&self, filter: Document) -> Result<u64> {
        Ok(self.inner.count_documents(filter).await?)
    }
}
