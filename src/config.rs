//! Command line / environment configuration for the binaries

use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::filters::DEFAULT_LIMIT;
use crate::import::OnInvalid;

pub const DEFAULT_DB_PATH: &str = "data/townapi.db";

#[derive(Parser, Debug, Clone)]
#[command(name = "townapi")]
#[command(about = "Read-only REST API over French towns and their administrative divisions")]
pub struct ServerArgs {
    /// Address to bind
    #[arg(long, env = "TOWNAPI_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "TOWNAPI_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Path to the SurrealDB database
    #[arg(long, env = "TOWNAPI_DB_PATH", default_value = DEFAULT_DB_PATH)]
    pub db_path: String,

    /// Page size for /towns when the request gives no limit
    #[arg(long, env = "TOWNAPI_DEFAULT_LIMIT", default_value_t = DEFAULT_LIMIT)]
    pub default_limit: u32,
}

impl ServerArgs {
    pub fn addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "import_towns")]
#[command(about = "Import the towns CSV into the database")]
pub struct ImportArgs {
    /// CSV file with region/department/district/town columns
    #[arg(long, default_value = "data/towns.csv")]
    pub csv: PathBuf,

    /// Path to the SurrealDB database
    #[arg(long, env = "TOWNAPI_DB_PATH", default_value = DEFAULT_DB_PATH)]
    pub db_path: String,

    /// Keep going past invalid or already-imported rows
    #[arg(long)]
    pub skip_invalid: bool,

    /// Validate the file against an in-memory database, leaving db_path alone
    #[arg(long)]
    pub dry_run: bool,
}

impl ImportArgs {
    pub fn on_invalid(&self) -> OnInvalid {
        if self.skip_invalid {
            OnInvalid::Skip
        } else {
            OnInvalid::Abort
        }
    }
}

/// Console logging, filtered by `RUST_LOG` (default `info`)
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .init();
}
