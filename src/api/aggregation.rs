//! Population aggregates per hierarchy level
//!
//! One code path serves all four levels: identity rows come from the
//! level's own table, population statistics from a single grouped query
//! over `town`, and the two are joined here. A node with no towns still
//! shows up, with `town_count = 0` and no min/max/avg.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use super::filters::Filter;
use crate::codes::compare_department_codes;
use crate::db::DbConn;
use crate::error::{QueryError, Result};

/// Level of the administrative hierarchy, largest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Region,
    Department,
    District,
    Town,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::Region, Level::Department, Level::District, Level::Town];

    pub fn table(self) -> &'static str {
        match self {
            Level::Region => "region",
            Level::Department => "department",
            Level::District => "district",
            Level::Town => "town",
        }
    }

    /// Identity columns, renamed to the names used by the town table
    fn identity_projection(self) -> &'static str {
        match self {
            Level::Region => "code AS region_code, name AS region_name",
            Level::Department => "code AS department_code, region_code",
            Level::District => "code AS district_code, department_code, region_code",
            Level::Town => {
                "code AS town_code, name AS town_name, population, \
                 district_code, department_code, region_code"
            }
        }
    }

    /// Town columns identifying a node of this level
    fn group_by(self) -> &'static str {
        match self {
            Level::Region => "region_code",
            Level::Department => "department_code",
            Level::District | Level::Town => "department_code, district_code",
        }
    }
}

impl FromStr for Level {
    type Err = QueryError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "regions" => Ok(Level::Region),
            "departments" => Ok(Level::Department),
            "districts" => Ok(Level::District),
            "towns" => Ok(Level::Town),
            other => Err(QueryError::UnknownLevel(other.to_string())),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Region => "regions",
            Level::Department => "departments",
            Level::District => "districts",
            Level::Town => "towns",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Data Structures
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
struct NodeRow {
    region_code: Option<i64>,
    region_name: Option<String>,
    department_code: Option<String>,
    district_code: Option<i64>,
    town_code: Option<i64>,
    town_name: Option<String>,
    population: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
struct StatsRow {
    region_code: Option<i64>,
    department_code: Option<String>,
    district_code: Option<i64>,
    min_population: Option<i64>,
    max_population: Option<i64>,
    avg_population: Option<f64>,
    town_count: i64,
}

type GroupKey = (Option<i64>, Option<String>, Option<i64>);

fn group_key(
    level: Level,
    region_code: Option<i64>,
    department_code: &Option<String>,
    district_code: Option<i64>,
) -> GroupKey {
    match level {
        Level::Region => (region_code, None, None),
        Level::Department => (None, department_code.clone(), None),
        Level::District | Level::Town => (None, department_code.clone(), district_code),
    }
}

/// Population summary over the towns under one node
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationStats {
    pub min_population: Option<i64>,
    pub max_population: Option<i64>,
    pub avg_population: Option<f64>,
    pub town_count: i64,
}

impl PopulationStats {
    /// A node without towns
    pub const EMPTY: PopulationStats = PopulationStats {
        min_population: None,
        max_population: None,
        avg_population: None,
        town_count: 0,
    };

    /// A town summarises itself
    pub fn single(population: i64) -> Self {
        Self {
            min_population: Some(population),
            max_population: Some(population),
            avg_population: Some(population as f64),
            town_count: 1,
        }
    }
}

impl From<StatsRow> for PopulationStats {
    fn from(row: StatsRow) -> Self {
        if row.town_count == 0 {
            return Self::EMPTY;
        }
        Self {
            min_population: row.min_population,
            max_population: row.max_population,
            avg_population: row.avg_population,
            town_count: row.town_count,
        }
    }
}

/// One node of `level` with its identity, ancestors and statistics.
/// Fields below the node's level are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub level: Level,
    pub region_code: Option<i64>,
    pub region_name: Option<String>,
    pub department_code: Option<String>,
    pub district_code: Option<i64>,
    pub town_code: Option<i64>,
    pub town_name: Option<String>,
    pub stats: PopulationStats,
}

impl Aggregate {
    fn from_node(level: Level, node: NodeRow, stats: PopulationStats) -> Self {
        Self {
            level,
            region_code: node.region_code,
            region_name: node.region_name,
            department_code: node.department_code,
            district_code: node.district_code,
            town_code: node.town_code,
            town_name: node.town_name,
            stats,
        }
    }

    fn cmp_position(&self, other: &Self) -> Ordering {
        match self.level {
            Level::Region => self.region_code.cmp(&other.region_code),
            _ => compare_department_codes(
                self.department_code.as_deref().unwrap_or(""),
                other.department_code.as_deref().unwrap_or(""),
            )
            .then(self.district_code.cmp(&other.district_code))
            .then(self.town_code.cmp(&other.town_code)),
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Aggregate town populations for every node of `level` matching `filter`.
///
/// Results are in natural code order.
pub async fn aggregate(db: &DbConn, level: Level, filter: &Filter) -> Result<Vec<Aggregate>> {
    let nodes_where = filter.where_clause(level);
    let nodes_sql = format!(
        "SELECT {} FROM {}{}",
        level.identity_projection(),
        level.table(),
        nodes_where.sql()
    );
    let nodes: Vec<NodeRow> = nodes_where.bind(db.query(nodes_sql)).await?.take(0)?;

    let mut aggregates: Vec<Aggregate> = if level == Level::Town {
        nodes
            .into_iter()
            .map(|node| {
                let stats = PopulationStats::single(node.population.unwrap_or(0));
                Aggregate::from_node(level, node, stats)
            })
            .collect()
    } else {
        let mut stats = population_stats(db, level, filter).await?;
        nodes
            .into_iter()
            .map(|node| {
                let key = group_key(
                    level,
                    node.region_code,
                    &node.department_code,
                    node.district_code,
                );
                let stats = stats.remove(&key).unwrap_or(PopulationStats::EMPTY);
                Aggregate::from_node(level, node, stats)
            })
            .collect()
    };

    aggregates.sort_by(|a, b| a.cmp_position(b));
    Ok(aggregates)
}

/// min/max/mean/count of town populations grouped by `level`
async fn population_stats(
    db: &DbConn,
    level: Level,
    filter: &Filter,
) -> Result<HashMap<GroupKey, PopulationStats>> {
    let towns_where = filter.where_clause(Level::Town);
    let group_by = level.group_by();
    let sql = format!(
        r#"
        SELECT
            {group_by},
            math::min(population) AS min_population,
            math::max(population) AS max_population,
            math::mean(population) AS avg_population,
            count() AS town_count
        FROM town WITH NOINDEX{where_sql}
        GROUP BY {group_by}
        "#,
        where_sql = towns_where.sql(),
    );
    let rows: Vec<StatsRow> = towns_where.bind(db.query(sql)).await?.take(0)?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let key = group_key(level, row.region_code, &row.department_code, row.district_code);
            (key, PopulationStats::from(row))
        })
        .collect())
}
