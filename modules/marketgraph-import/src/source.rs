// MongoDB-backed document source.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use mongodb::bson::{doc, Bson, Document as BsonDocument};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use tracing::info;

use crate::traits::{DocumentSource, DocumentStream};

const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(5);

pub struct MongoSource {
    client: Client,
    collection: Collection<BsonDocument>,
    db_name: String,
}

impl MongoSource {
    /// Connect and ping. A failed ping is an error so the caller can retry.
    pub async fn connect(uri: &str, db_name: &str, collection: &str) -> Result<Self, mongodb::error::Error> {
        let mut options = ClientOptions::parse(uri).await?;
        options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);
        options.app_name = Some("marketgraph-import".to_string());
        let client = Client::with_options(options)?;

        client.database("admin").run_command(doc! { "ping": 1 }).await?;
        info!(db = db_name, collection, "Connected to MongoDB");

        let collection = client.database(db_name).collection::<BsonDocument>(collection);
        Ok(Self {
            client,
            collection,
            db_name: db_name.to_string(),
        })
    }
}

#[async_trait]
impl DocumentSource for MongoSource {
    fn describe(&self) -> String {
        format!("{}.{}", self.db_name, self.collection.name())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.collection.count_documents(doc! {}).await?)
    }

    async fn documents(&self) -> Result<DocumentStream> {
        let cursor = self.collection.find(doc! {}).await?;
        // Relaxed Extended JSON keeps ObjectIds and non-finite doubles boxed
        // ({"$oid": ..}, {"$numberDouble": "NaN"}) for the normalizer.
        let stream = cursor
            .map_ok(|d| Bson::Document(d).into_relaxed_extjson())
            .map_err(anyhow::Error::from)
            .boxed();
        Ok(stream)
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
        info!("MongoDB connection closed");
    }
}
