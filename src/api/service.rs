//! Shared business logic for the towns API
//!
//! Handlers only parse and render; every database access goes through here.

use serde::Deserialize;
use tracing::debug;

use super::aggregation::{self, Aggregate, Level};
use super::filters::{order_clause, Filter, TownQuery};
use crate::db::{self, DbConn, TableCounts};
use crate::error::Result;

// ============================================================================
// Data Structures
// ============================================================================

/// A town joined with its ancestors' codes and region name
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TownRow {
    pub code: i64,
    pub name: String,
    pub population: i64,
    pub district_code: i64,
    pub department_code: String,
    pub region_code: i64,
    pub region_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TownPage {
    /// Matching towns before pagination
    pub count: i64,
    pub results: Vec<TownRow>,
}

// ============================================================================
// Town Service
// ============================================================================

pub struct TownService {
    db: DbConn,
    default_limit: u32,
}

impl TownService {
    pub fn new(db: DbConn, default_limit: u32) -> Self {
        Self { db, default_limit }
    }

    pub fn default_limit(&self) -> u32 {
        self.default_limit
    }

    pub async fn list_towns(&self, query: &TownQuery) -> Result<TownPage> {
        let where_clause = query.filter.where_clause(Level::Town);
        let sql = format!(
            r#"
            -- grouped counts over index lookups drop all but one condition
            SELECT count() FROM town WITH NOINDEX{where_sql} GROUP ALL;
            SELECT
                code,
                name,
                population,
                district_code,
                department_code,
                region_code,
                district.department.region.name AS region_name,
                seq
            FROM town{where_sql}{order_sql}{page_sql};
            "#,
            where_sql = where_clause.sql(),
            order_sql = order_clause(&query.ordering),
            page_sql = query.page.sql(),
        );
        debug!("Listing towns: {:?}", query);

        let mut response = where_clause.bind(self.db.query(sql)).await?;
        let count: Option<i64> = response.take((0, "count"))?;
        let results: Vec<TownRow> = response.take(1)?;

        Ok(TownPage {
            count: count.unwrap_or(0),
            results,
        })
    }

    pub async fn aggregate(&self, level: Level, filter: &Filter) -> Result<Vec<Aggregate>> {
        debug!("Aggregating {} with {:?}", level, filter);
        aggregation::aggregate(&self.db, level, filter).await
    }

    pub async fn get_stats(&self) -> Result<TableCounts> {
        db::table_counts(&self.db).await
    }
}
