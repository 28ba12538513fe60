use mongodb::{Client, bson::doc};
use std::fmt;
use std::time::Instant;

/// Result of a timed `ping`.
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    /// Driver error text when unhealthy.
    pub message: Option<String>,
    pub response_time_ms: u64,
}

/// Shape of the deployment the client is connected to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topology {
    Standalone,
    ReplicaSet(String),
    Sharded,
}

impl Topology {
    pub fn supports_transactions(&self) -> bool {
        !matches!(self, Topology::Standalone)
    }

    fn from_hello(reply: &mongodb::bson::Document) -> Self {
        if let Ok(name) = reply.get_str("setName") {
            Topology::ReplicaSet(name.to_string())
        } else if matches!(reply.get_str("msg"), Ok("isdbgrid")) {
            Topology::Sharded
        } else {
            Topology::Standalone
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topology::Standalone => write!(f, "standalone"),
            Topology::ReplicaSet(name) => write!(f, "replica set '{}'", name),
            Topology::Sharded => write!(f, "sharded cluster"),
        }
    }
}

/// Ask the server what kind of deployment it belongs to.
pub async fn topology(client: &Client) -> Result<Topology, mongodb::error::Error> {
    let reply = client
        .database("admin")
        .run_command(doc! { "hello": 1 })
        .await?;
    Ok(Topology::from_hello(&reply))
}

/// `true` when the server answers `ping`.
pub async fn check_health(client: &Client) -> bool {
    client
        .database("admin")
        .run_command(doc! { "ping": 1 })
        .await
        .is_ok()
}

/// Like [`check_health`], with latency and the failure reason.
pub async fn check_health_detailed(client: &Client) -> HealthStatus {
    let start = Instant::now();
    let result = client
        .database("admin")
        .run_command(doc! { "ping": 1 })
        .await;
    let response_time_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(_) => HealthStatus {
            healthy: true,
            message: None,
            response_time_ms,
        },
        Err(e) => HealthStatus {
            healthy: false,
            message: Some(e.to_string()),
            response_time_ms,
        },
    }
}
