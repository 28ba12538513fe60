//! MongoDB test infrastructure
//!
//! Provides a `TestMongo` helper backed by a single-node replica set, so
//! multi-document transactions work exactly as in production.

use mongodb::{Client, Database};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::mongo::Mongo;

/// Test MongoDB wrapper that ensures proper cleanup
///
/// The container is automatically stopped and removed when this struct is dropped.
///
/// # Example
///
/// ```no_run
/// use test_utils::TestMongo;
///
/// # async fn example() {
/// let mongo = TestMongo::new().await;
/// let db = mongo.database("linkage_test");
/// # }
/// ```
pub struct TestMongo {
    #[allow(dead_code)]
    container: ContainerAsync<Mongo>,
    client: Client,
    pub connection_string: String,
}

impl TestMongo {
    /// Start a single-node replica set (`rs0`) on MongoDB 7.
    pub async fn new() -> Self {
        let container = Mongo::repl_set()
            .with_tag("7.0")
            .start()
            .await
            .expect("Failed to start MongoDB container");

        let host_port = container
            .get_host_port_ipv4(27017)
            .await
            .expect("Failed to get MongoDB port");

        // The replica set advertises its in-container hostname
        let connection_string = format!("mongodb://127.0.0.1:{}/?directConnection=true", host_port);

        let client = Client::with_uri_str(&connection_string)
            .await
            .expect("Failed to create MongoDB client");

        tracing::info!(port = host_port, "Test MongoDB ready (7.0 replica set)");

        Self {
            container,
            client,
            connection_string,
        }
    }

    pub fn client(&self) -> Client {
        self.client.clone()
    }

    /// A database handle; use a distinct name per test.
    pub fn database(&self, name: &str) -> Database {
        self.client.database(name)
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

impl Drop for TestMongo {
    fn drop(&mut self) {
        tracing::debug!("Cleaning up test MongoDB container");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_mongo_supports_transactions() {
        let mongo = TestMongo::new().await;
        let db = mongo.database("test_utils_tx");
        let coll = db.collection::<mongodb::bson::Document>("probe");
        coll.insert_one(doc! { "seed": 1 }).await.unwrap();

        let mut session = mongo.client().start_session().await.unwrap();
        session.start_transaction().await.unwrap();
        coll.insert_one(doc! { "seed": 2 })
            .session(&mut session)
            .await
            .unwrap();
        session.abort_transaction().await.unwrap();

        let count = coll.count_documents(doc! {}).await.unwrap();
        assert_eq!(count, 1);
    }
}
