//! Bulk import of the towns CSV
//!
//! Each row gets-or-creates its Region → Department → District chain and
//! creates the Town leaf. Ancestors are looked up by code; only the ones
//! created by this row are validated.

use std::io;
use std::path::Path;

use csv::ReaderBuilder;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::db::DbConn;
use crate::error::{Error, Result};
use crate::models::{CsvRecord, Department, District, ImportRow, Region, Town};

const MAX_REPORTED_ERRORS: usize = 5;
const PROGRESS_EVERY: usize = 5000;

/// What to do with a row that fails validation or already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnInvalid {
    /// Stop the import at the first bad row
    #[default]
    Abort,
    /// Log the row and carry on
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

pub fn read_records<R: io::Read>(reader: R) -> Result<Vec<CsvRecord>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let records = reader.deserialize().collect::<std::result::Result<Vec<CsvRecord>, _>>()?;
    Ok(records)
}

pub fn read_records_from_path(path: &Path) -> Result<Vec<CsvRecord>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let records = reader.deserialize().collect::<std::result::Result<Vec<CsvRecord>, _>>()?;
    Ok(records)
}

pub async fn import_records(
    db: &DbConn,
    records: &[CsvRecord],
    on_invalid: OnInvalid,
) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();
    let mut seq = next_seq(db).await?;

    for (i, record) in records.iter().enumerate() {
        // header is line 1
        let line = i + 2;
        let result = match record.to_import_row() {
            Ok(row) => save_town_and_parents(db, &row, seq).await,
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(()) => {
                seq += 1;
                summary.imported += 1;
                debug!("Successfully added {}", record.town_name);
            }
            Err(e @ (Error::Validation(_) | Error::DuplicateTown { .. }))
                if on_invalid == OnInvalid::Skip =>
            {
                if summary.skipped < MAX_REPORTED_ERRORS {
                    warn!("Skipping line {}: {}", line, e);
                }
                summary.skipped += 1;
            }
            Err(e) => {
                error!("Import aborted at line {}: {}", line, e);
                return Err(e);
            }
        }

        if (i + 1) % PROGRESS_EVERY == 0 {
            info!("Processed {}/{} records...", i + 1, records.len());
        }
    }

    Ok(summary)
}

/// The `seq` the next imported town gets
pub async fn next_seq(db: &DbConn) -> Result<i64> {
    let last: Vec<i64> = db
        .query("SELECT VALUE seq FROM town ORDER BY seq DESC LIMIT 1")
        .await?
        .take(0)?;
    Ok(last.first().map_or(0, |seq| seq + 1))
}

#[derive(Debug, Deserialize)]
struct RegionCodeRow {
    region_code: i64,
}

/// Ancestors missing from the store, validated and ready to create
#[derive(Debug, Default)]
struct NewAncestors {
    region: Option<Region>,
    department: Option<Department>,
    district: Option<District>,
}

const CREATE_REGION: &str = r#"
    CREATE type::thing("region", $region_code) SET code = $region_code, name = $region_name;
"#;

const CREATE_DEPARTMENT: &str = r#"
    CREATE type::thing("department", $department_code) SET
        code = $department_code,
        region = type::thing("region", $region_code),
        region_code = $region_code;
"#;

const CREATE_DISTRICT: &str = r#"
    CREATE type::thing("district", [$department_code, $district_code]) SET
        code = $district_code,
        department = type::thing("department", $department_code),
        department_code = $department_code,
        region_code = $region_code;
"#;

const CREATE_TOWN: &str = r#"
    CREATE type::thing("town", [$department_code, $district_code, $code]) SET
        code = $code,
        name = $name,
        population = $population,
        district = type::thing("district", [$department_code, $district_code]),
        district_code = $district_code,
        department_code = $department_code,
        region_code = $region_code,
        seq = $seq;
"#;

/// Add a town under `seq` along with any of its missing ancestors.
///
/// Everything is looked up and validated first and the writes go out in a
/// single transaction, so a rejected row leaves the store untouched.
/// Existing ancestors are not re-validated.
pub async fn save_town_and_parents(db: &DbConn, row: &ImportRow, seq: i64) -> Result<()> {
    let mut town = Town::new(row)?;

    let mut response = db
        .query(
            r#"
            SELECT region_code FROM type::thing("district", [$department_code, $district_code]);
            SELECT region_code FROM type::thing("department", $department_code);
            SELECT code AS region_code FROM type::thing("region", $region_code);
            SELECT VALUE code FROM type::thing("town", [$department_code, $district_code, $code]);
            "#,
        )
        .bind(("department_code", town.department_code.clone()))
        .bind(("district_code", town.district_code))
        .bind(("region_code", row.region_code))
        .bind(("code", town.code))
        .await?;
    let district: Option<RegionCodeRow> = response.take(0)?;
    let department: Option<RegionCodeRow> = response.take(1)?;
    let region: Option<RegionCodeRow> = response.take(2)?;
    let existing: Vec<i64> = response.take(3)?;

    if !existing.is_empty() {
        return Err(Error::DuplicateTown {
            department_code: town.department_code,
            district_code: town.district_code,
            code: town.code,
        });
    }

    let mut new = NewAncestors::default();
    let district_exists = district.is_some();
    town.region_code = match (district, department) {
        (Some(stored), _) => {
            stored_region_code(stored, row.region_code, "district", &row.department_code)
        }
        (None, Some(stored)) => {
            stored_region_code(stored, row.region_code, "department", &row.department_code)
        }
        (None, None) => {
            if region.is_none() {
                new.region = Some(Region::new(row.region_code, &row.region_name)?);
            }
            new.department = Some(Department::new(&row.department_code, row.region_code)?);
            row.region_code
        }
    };
    if !district_exists {
        new.district = Some(District {
            code: town.district_code,
            department_code: town.department_code.clone(),
            region_code: town.region_code,
        });
    }

    let mut sql = String::from("BEGIN TRANSACTION;");
    if new.region.is_some() {
        sql.push_str(CREATE_REGION);
    }
    if new.department.is_some() {
        sql.push_str(CREATE_DEPARTMENT);
    }
    if new.district.is_some() {
        sql.push_str(CREATE_DISTRICT);
    }
    sql.push_str(CREATE_TOWN);
    sql.push_str("COMMIT TRANSACTION;");

    db.query(sql)
        .bind(("region_code", town.region_code))
        .bind(("region_name", new.region.as_ref().map(|r| r.name.clone())))
        .bind(("department_code", town.department_code.clone()))
        .bind(("district_code", town.district_code))
        .bind(("code", town.code))
        .bind(("name", town.name.clone()))
        .bind(("population", town.population))
        .bind(("seq", seq))
        .await?
        .check()?;

    if let Some(region) = &new.region {
        debug!("Created region {} ({})", region.code, region.name);
    }
    if let Some(department) = &new.department {
        debug!("Created department {}", department.code);
    }
    if let Some(district) = &new.district {
        debug!("Created district {}/{}", district.department_code, district.code);
    }
    Ok(())
}

fn stored_region_code(existing: RegionCodeRow, requested: u8, table: &str, code: &str) -> u8 {
    match u8::try_from(existing.region_code) {
        Ok(stored) => {
            if stored != requested {
                warn!(
                    "{} {} belongs to region {}, ignoring region {} from input",
                    table, code, stored, requested
                );
            }
            stored
        }
        Err(_) => requested,
    }
}
