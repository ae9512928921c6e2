use anyhow::Result;
use clap::Parser;
use townapi::{
    config::{self, ImportArgs},
    db, import,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    config::init_logging();
    let args = ImportArgs::parse();

    let db = if args.dry_run {
        info!("Dry run: importing into an in-memory database");
        db::connect_in_memory().await?
    } else {
        info!("Connecting to SurrealDB at {}", args.db_path);
        db::connect(&args.db_path).await?
    };

    info!("Initializing schema...");
    db::init_schema(&db).await?;

    info!("Reading CSV from {:?}", args.csv);
    let records = import::read_records_from_path(&args.csv)?;
    info!("Parsed {} records from CSV", records.len());

    let summary = import::import_records(&db, &records, args.on_invalid()).await?;
    info!(
        "Import complete: {} towns imported, {} rows skipped",
        summary.imported, summary.skipped
    );

    let totals = db::table_counts(&db).await?;
    info!("Database totals:");
    info!("  Regions:     {}", totals.regions);
    info!("  Departments: {}", totals.departments);
    info!("  Districts:   {}", totals.districts);
    info!("  Towns:       {}", totals.towns);

    Ok(())
}
