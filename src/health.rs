//! Service health probes.

use serde::Serialize;
use sqlx::PgPool;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::warn;

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

/// Database probe result; the store is this engine's only hard dependency.
#[derive(Debug, Serialize, Clone)]
pub struct DatabaseHealth {
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub database: DatabaseHealth,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Clone)]
pub struct HealthChecker {
    pool: PgPool,
    probe_timeout: Duration,
}

impl HealthChecker {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            probe_timeout: Duration::from_secs(5),
        }
    }

    pub async fn check_health(&self) -> HealthStatus {
        let started = Instant::now();
        let probe = timeout(
            self.probe_timeout,
            sqlx::query("SELECT 1").fetch_one(&self.pool),
        )
        .await;

        let database = match probe {
            Ok(Ok(_)) => DatabaseHealth {
                reachable: true,
                latency_ms: Some(started.elapsed().as_millis()),
                error: None,
            },
            Ok(Err(e)) => {
                warn!(error = %e, "database health probe failed");
                DatabaseHealth {
                    reachable: false,
                    latency_ms: None,
                    error: Some(e.to_string()),
                }
            }
            Err(_) => {
                warn!("database health probe timed out");
                DatabaseHealth {
                    reachable: false,
                    latency_ms: None,
                    error: Some("timeout".to_string()),
                }
            }
        };

        HealthStatus {
            status: if database.reachable {
                HealthState::Healthy
            } else {
                HealthState::Unhealthy
            },
            database,
            timestamp: chrono::Utc::now(),
        }
    }
}
