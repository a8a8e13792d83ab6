//! Docker container management for integration tests.
//!
//! One PostgreSQL container is started on first use and shared by every test
//! in the process. Each test opens its own pool against it, so connections
//! never outlive the runtime of the test that created them.
//!
//! ```rust,ignore
//! use crate::test_containers::postgres_container;
//!
//! let info = postgres_container().await?;
//! // Connect using info.host / info.port...
//! ```

use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Connection details of a running test database
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    /// Host address (typically 127.0.0.1)
    pub host: String,
    /// Port number (randomly assigned by testcontainers)
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

struct PostgresContainer {
    #[allow(dead_code)]
    inner: ContainerAsync<Postgres>,
    info: ContainerInfo,
}

static POSTGRES_CONTAINER: OnceCell<PostgresContainer> = OnceCell::const_new();

/// Get or start the PostgreSQL test container.
///
/// Concurrent callers wait for the same startup; later calls return the
/// cached details immediately.
pub async fn postgres_container() -> anyhow::Result<ContainerInfo> {
    let container = POSTGRES_CONTAINER.get_or_try_init(start_postgres).await?;
    Ok(container.info.clone())
}

async fn start_postgres() -> anyhow::Result<PostgresContainer> {
    tracing::info!("starting PostgreSQL test container");

    let inner = Postgres::default()
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("failed to start postgres container: {}", e))?;

    let port = inner
        .get_host_port_ipv4(5432)
        .await
        .map_err(|e| anyhow::anyhow!("failed to get postgres port: {}", e))?;

    // testcontainers-modules Postgres defaults: postgres user/password with "postgres" database
    let info = ContainerInfo {
        host: "127.0.0.1".to_string(),
        port,
        database: "postgres".to_string(),
        username: "postgres".to_string(),
        password: "postgres".to_string(),
    };

    tracing::info!(port, "PostgreSQL test container started");
    Ok(PostgresContainer { inner, info })
}
