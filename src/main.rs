//! REST API server for French towns and their administrative divisions
//!
//! Usage:
//!   ./target/release/townapi [--host HOST] [--port PORT] [--db-path PATH] [--default-limit N]
//!
//! REST endpoints:
//!   GET /health                     - Health check
//!   GET /stats                      - Row counts per level
//!   GET /towns                      - Towns (limit, offset, ordering, filters)
//!   GET /aggs/regions               - Population aggregates per region
//!   GET /aggs/departments           - ... per department
//!   GET /aggs/districts             - ... per district
//!   GET /aggs/towns                 - ... per town

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use townapi::{
    api::{self, TownService},
    config::{self, ServerArgs},
    db,
};
use tracing::info;

fn print_banner(args: &ServerArgs) {
    println!("============================================================");
    println!("                 FRENCH TOWNS API SERVER");
    println!("============================================================");
    println!();
    println!("  Listen:   http://{}:{}/", args.host, args.port);
    println!("  Database: {}", args.db_path);
    println!();
    println!("REST Endpoints:");
    println!("  GET /health                 Health check");
    println!("  GET /stats                  Row counts");
    println!("  GET /towns                  Town listing");
    println!("  GET /aggs/regions           Region aggregates");
    println!("  GET /aggs/departments       Department aggregates");
    println!("  GET /aggs/districts         District aggregates");
    println!("  GET /aggs/towns             Town aggregates");
    println!();
    println!("============================================================");
}

#[tokio::main]
async fn main() -> Result<()> {
    config::init_logging();

    let args = ServerArgs::parse();
    print_banner(&args);

    let db = db::connect(&args.db_path).await?;
    db::init_schema(&db).await?;
    info!("Connected to SurrealDB at {}", args.db_path);

    let service = Arc::new(TownService::new(db, args.default_limit));
    let app = api::create_router(service);

    let addr = args.addr()?;
    info!("Starting REST server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
