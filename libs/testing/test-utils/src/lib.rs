//! Shared test utilities for the linkage backend
//!
//! - `TestMongo`: MongoDB replica-set container with automatic cleanup (feature: "mongo")
//! - `TestDataBuilder`: deterministic ids, names and hardware identifiers
//! - `assertions`: custom assertion helpers
//!
//! # Usage
//!
//! ```rust,no_run
//! use test_utils::{TestMongo, TestDataBuilder};
//!
//! #[tokio::test]
//! async fn my_mongo_test() {
//!     let mongo = TestMongo::new().await;
//!     let builder = TestDataBuilder::from_test_name("my_test");
//!
//!     let db = mongo.database(&builder.name("db", "main"));
//!     let owner = builder.user_id();
//!     let identifier = builder.device_identifier(1);
//! }
//! ```

use uuid::Uuid;

#[cfg(feature = "mongo")]
mod mongo;

#[cfg(feature = "mongo")]
pub use mongo::TestMongo;

/// Builder for test data with deterministic randomization
///
/// This ensures tests are reproducible by using seeded data.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_bind_device");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// The primary user of the test.
    pub fn user_id(&self) -> Uuid {
        self.user(0)
    }

    /// The `n`th distinct user of the test; `user(0) == user_id()`.
    pub fn user(&self, n: u8) -> Uuid {
        let bytes = self.seed.to_le_bytes();
        let mut uuid_bytes = [0u8; 16];
        uuid_bytes[..8].copy_from_slice(&bytes);
        uuid_bytes[8..16].copy_from_slice(&bytes);
        uuid_bytes[15] ^= n;
        Uuid::from_bytes(uuid_bytes)
    }

    /// Hardware identifier unique per test and index, e.g. `TRR-1a2b3c-0001`.
    pub fn device_identifier(&self, n: u16) -> String {
        format!("TRR-{:06x}-{:04}", self.seed & 0xff_ffff, n)
    }

    /// Generate a unique name for testing
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("my_test");
    /// let name = builder.name("terrarium", "main");
    /// assert!(name.starts_with("test-terrarium-"));
    /// ```
    pub fn name(&self, prefix: &str, suffix: &str) -> String {
        format!("test-{}-{}-{}", prefix, self.seed, suffix)
    }
}

/// Test assertion helpers
pub mod assertions {
    use uuid::Uuid;

    pub fn assert_uuid_eq(actual: Uuid, expected: Uuid, context: &str) {
        assert_eq!(
            actual, expected,
            "{}: expected UUID {}, got {}",
            context, expected, actual
        );
    }

    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }
}
