//! MongoDB database wrapper.

use mongodb::bson::doc;
use mongodb::{options::ClientOptions, Client, Collection};
use tracing::info;

/// Handle to the bot's MongoDB database.
#[derive(Debug, Clone)]
pub struct Database {
    db: mongodb::Database,
}

impl Database {
    /// Connect to MongoDB with the given URI and database name.
    ///
    /// # Errors
    /// Returns error if the URI is invalid or the server does not answer a ping.
    pub async fn connect(uri: &str, db_name: &str) -> anyhow::Result<Self> {
        let mut options = ClientOptions::parse(uri).await?;
        options.app_name.get_or_insert_with(|| "vidfetch".to_string());
        let client = Client::with_options(options)?;

        // Ping the database to verify connection
        client.database("admin").run_command(doc! { "ping": 1 }).await?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            db: client.database(db_name),
        })
    }

    /// Get a typed collection from the database.
    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }
}
