//! HTTP server command
//!
//! Builds the connection pool and runs the products server until shutdown.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use pgstream_server::db::{create_pool_with_options, PoolSettings, DEFAULT_BATCH_SIZE};
use pgstream_server::http::{run_server, ServerConfig};
use pgstream_server::StreamOptions;

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Interface to bind to
    #[arg(long, env = "PGSTREAM_HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, short = 'p', env = "PORT", default_value_t = 3030)]
    pub port: u16,

    /// Database connection string (falls back to DATABASE_URL)
    #[arg(long, env = "POSTGRES_URI")]
    pub database_url: Option<String>,

    /// Maximum pooled database connections
    #[arg(long, env = "PG_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    /// Seconds a request may wait for a free connection
    #[arg(long, default_value_t = 30)]
    pub acquire_timeout_secs: u64,

    /// Delay before each streamed row, in milliseconds (0 disables)
    #[arg(long, env = "ROW_DELAY_MS", default_value_t = 10)]
    pub row_delay_ms: u64,

    /// Rows fetched from the cursor per round trip
    #[arg(long, env = "CURSOR_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: u32,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,
}

impl ServeArgs {
    fn database_url(&self) -> Result<String> {
        self.database_url
            .clone()
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .context("Database URL not set. Set via --database-url, POSTGRES_URI, or DATABASE_URL")
    }

    fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.max_connections,
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
        }
    }

    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind_addr: SocketAddr::new(self.host, self.port),
            cors_permissive: self.cors_permissive,
            stream: StreamOptions {
                row_delay: Duration::from_millis(self.row_delay_ms),
            },
            batch_size: self.batch_size,
        }
    }
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let database_url = args.database_url()?;
    let config = args.server_config();

    tracing::info!("Starting pgstream server on {}", config.bind_addr);

    let pool = create_pool_with_options(&database_url, args.pool_settings())
        .await
        .context("Failed to create database pool")?;

    run_server(pool, config).await.context("Server error")?;

    Ok(())
}
