use surrealdb::engine::local::{Db, Mem, RocksDb};
use surrealdb::Surreal;
use tracing::debug;

use crate::error::Result;

pub type DbConn = Surreal<Db>;

const NAMESPACE: &str = "townapi";
const DATABASE: &str = "fr";

/// Initialize database connection with RocksDB backend
pub async fn connect(path: &str) -> Result<DbConn> {
    let db = Surreal::new::<RocksDb>(path).await?;
    db.use_ns(NAMESPACE).use_db(DATABASE).await?;
    Ok(db)
}

/// Throwaway database living only as long as the handle (tests, dry runs)
pub async fn connect_in_memory() -> Result<DbConn> {
    let db = Surreal::new::<Mem>(()).await?;
    db.use_ns(NAMESPACE).use_db(DATABASE).await?;
    Ok(db)
}

/// Initialize database schema.
///
/// Record ids are built from the natural keys (`district:['2A', 3]`), so a
/// second CREATE of the same entity fails instead of duplicating it.
pub async fn init_schema(db: &DbConn) -> Result<()> {
    db.query(
        r#"
        -- region:<code>
        DEFINE TABLE IF NOT EXISTS region SCHEMAFULL;
        DEFINE FIELD IF NOT EXISTS code ON region TYPE int;
        DEFINE FIELD IF NOT EXISTS name ON region TYPE string;

        -- department:<code>
        DEFINE TABLE IF NOT EXISTS department SCHEMAFULL;
        DEFINE FIELD IF NOT EXISTS code ON department TYPE string;
        DEFINE FIELD IF NOT EXISTS region ON department TYPE record<region>;
        DEFINE FIELD IF NOT EXISTS region_code ON department TYPE int;
        DEFINE INDEX IF NOT EXISTS idx_department_region ON department FIELDS region_code;

        -- district:[<department_code>, <code>]
        DEFINE TABLE IF NOT EXISTS district SCHEMAFULL;
        DEFINE FIELD IF NOT EXISTS code ON district TYPE int;
        DEFINE FIELD IF NOT EXISTS department ON district TYPE record<department>;
        DEFINE FIELD IF NOT EXISTS department_code ON district TYPE string;
        DEFINE FIELD IF NOT EXISTS region_code ON district TYPE int;
        DEFINE INDEX IF NOT EXISTS idx_district_department ON district FIELDS department_code;
        DEFINE INDEX IF NOT EXISTS idx_district_region ON district FIELDS region_code;

        -- town:[<department_code>, <district_code>, <code>]
        DEFINE TABLE IF NOT EXISTS town SCHEMAFULL;
        DEFINE FIELD IF NOT EXISTS code ON town TYPE int;
        DEFINE FIELD IF NOT EXISTS name ON town TYPE string;
        DEFINE FIELD IF NOT EXISTS population ON town TYPE int;
        DEFINE FIELD IF NOT EXISTS district ON town TYPE record<district>;
        DEFINE FIELD IF NOT EXISTS district_code ON town TYPE int;
        DEFINE FIELD IF NOT EXISTS department_code ON town TYPE string;
        DEFINE FIELD IF NOT EXISTS region_code ON town TYPE int;
        -- insertion counter, default listing order
        DEFINE FIELD IF NOT EXISTS seq ON town TYPE int;
        DEFINE INDEX IF NOT EXISTS idx_town_seq ON town FIELDS seq;
        DEFINE INDEX IF NOT EXISTS idx_town_population ON town FIELDS population;
        DEFINE INDEX IF NOT EXISTS idx_town_district ON town FIELDS district_code;
        DEFINE INDEX IF NOT EXISTS idx_town_department ON town FIELDS department_code;
        DEFINE INDEX IF NOT EXISTS idx_town_region ON town FIELDS region_code;
        "#,
    )
    .await?
    .check()?;

    Ok(())
}

/// Remove a region with all of its departments, districts and towns
pub async fn delete_region(db: &DbConn, code: u8) -> Result<()> {
    debug!("Deleting region {} and descendants", code);
    db.query(
        r#"
        BEGIN TRANSACTION;
        DELETE town WHERE region_code = $code;
        DELETE district WHERE region_code = $code;
        DELETE department WHERE region_code = $code;
        DELETE type::thing("region", $code);
        COMMIT TRANSACTION;
        "#,
    )
    .bind(("code", code))
    .await?
    .check()?;

    Ok(())
}

/// Remove a department with all of its districts and towns
pub async fn delete_department(db: &DbConn, code: &str) -> Result<()> {
    debug!("Deleting department {} and descendants", code);
    db.query(
        r#"
        BEGIN TRANSACTION;
        DELETE town WHERE department_code = $code;
        DELETE district WHERE department_code = $code;
        DELETE type::thing("department", $code);
        COMMIT TRANSACTION;
        "#,
    )
    .bind(("code", code.to_string()))
    .await?
    .check()?;

    Ok(())
}

/// Remove a district and its towns
pub async fn delete_district(db: &DbConn, department_code: &str, code: u16) -> Result<()> {
    debug!("Deleting district {}/{} and descendants", department_code, code);
    db.query(
        r#"
        BEGIN TRANSACTION;
        DELETE town WHERE department_code = $department_code AND district_code = $code;
        DELETE type::thing("district", [$department_code, $code]);
        COMMIT TRANSACTION;
        "#,
    )
    .bind(("department_code", department_code.to_string()))
    .bind(("code", code))
    .await?
    .check()?;

    Ok(())
}

/// Row counts for each level of the hierarchy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub regions: i64,
    pub departments: i64,
    pub districts: i64,
    pub towns: i64,
}

pub async fn table_counts(db: &DbConn) -> Result<TableCounts> {
    let mut response = db
        .query(
            r#"
            SELECT count() FROM region GROUP ALL;
            SELECT count() FROM department GROUP ALL;
            SELECT count() FROM district GROUP ALL;
            SELECT count() FROM town GROUP ALL;
            "#,
        )
        .await?;

    let regions: Option<i64> = response.take((0, "count"))?;
    let departments: Option<i64> = response.take((1, "count"))?;
    let districts: Option<i64> = response.take((2, "count"))?;
    let towns: Option<i64> = response.take((3, "count"))?;

    Ok(TableCounts {
        regions: regions.unwrap_or(0),
        departments: departments.unwrap_or(0),
        districts: districts.unwrap_or(0),
        towns: towns.unwrap_or(0),
    })
}
