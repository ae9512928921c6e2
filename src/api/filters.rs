//! Query-string parsing: filters, ordering and pagination
//!
//! Everything here is turned into typed values before it reaches SurrealQL.
//! Filter values are bound as parameters; ordering columns come from a
//! fixed list.

use std::str::FromStr;

use serde::Deserialize;
use surrealdb::engine::local::Db;
use surrealdb::method::Query;

use super::aggregation::Level;
use crate::codes::{DepartmentCode, RegionCode};
use crate::error::QueryError;

pub const DEFAULT_LIMIT: u32 = 100;

// ============================================================================
// Raw query parameters
// ============================================================================

/// `/towns` query string. Unknown keys are dropped by the deserializer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TownParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub ordering: Option<String>,
    pub region_code: Option<String>,
    pub department_code: Option<String>,
    pub district_code: Option<String>,
    pub population: Option<String>,
    pub min_population: Option<String>,
    pub max_population: Option<String>,
}

/// `/aggs/{level}` query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AggParams {
    pub region_code: Option<String>,
    pub department_code: Option<String>,
    pub district_code: Option<String>,
}

/// A fully parsed `/towns` request
#[derive(Debug, Clone, PartialEq)]
pub struct TownQuery {
    pub filter: Filter,
    pub ordering: Vec<OrderBy>,
    pub page: Page,
}

impl TownParams {
    pub fn parse(&self, default_limit: u32) -> Result<TownQuery, QueryError> {
        let filter = Filter {
            region_code: parse_param("region_code", &self.region_code)?,
            department_code: parse_param("department_code", &self.department_code)?,
            district_code: parse_param("district_code", &self.district_code)?,
            population: parse_param("population", &self.population)?,
            min_population: parse_param("min_population", &self.min_population)?,
            max_population: parse_param("max_population", &self.max_population)?,
        };

        Ok(TownQuery {
            filter,
            ordering: parse_ordering(self.ordering.as_deref())?,
            page: Page::from_params(&self.limit, &self.offset, default_limit)?,
        })
    }
}

impl AggParams {
    /// Only the ancestor codes meaningful for `level` are read; the rest are
    /// ignored without being validated.
    pub fn parse(&self, level: Level) -> Result<Filter, QueryError> {
        let mut filter = Filter {
            region_code: parse_param("region_code", &self.region_code)?,
            ..Filter::default()
        };
        if level >= Level::District {
            filter.department_code = parse_param("department_code", &self.department_code)?;
        }
        if level == Level::Town {
            filter.district_code = parse_param("district_code", &self.district_code)?;
        }
        Ok(filter)
    }
}

/// Blank values count as "not given"
fn parse_param<T: FromStr>(
    param: &'static str,
    raw: &Option<String>,
) -> Result<Option<T>, QueryError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| QueryError::InvalidParameter {
                param,
                value: value.to_string(),
            }),
    }
}

// ============================================================================
// Filter
// ============================================================================

/// Conjunction of equality / bound predicates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub region_code: Option<RegionCode>,
    pub department_code: Option<DepartmentCode>,
    pub district_code: Option<u16>,
    pub population: Option<u32>,
    pub min_population: Option<u32>,
    pub max_population: Option<u32>,
}

impl Filter {
    /// Predicates against the table backing `table`.
    ///
    /// Every table carries its ancestors' codes, so the same filter applies
    /// to any of them; a table's own code lives in its `code` column.
    pub fn where_clause(&self, table: Level) -> WhereClause {
        let mut clause = WhereClause::default();

        if let Some(code) = self.region_code {
            clause.push(column(table, "region_code"), "=", "region_code", code.value());
        }
        if let Some(code) = &self.department_code {
            clause.push(
                column(table, "department_code"),
                "=",
                "department_code",
                code.as_str(),
            );
        }
        if let Some(code) = self.district_code {
            clause.push(column(table, "district_code"), "=", "district_code", code);
        }
        if let Some(population) = self.population {
            clause.push("population", "=", "population", population);
        }
        if let Some(min) = self.min_population {
            clause.push("population", ">=", "min_population", min);
        }
        if let Some(max) = self.max_population {
            clause.push("population", "<=", "max_population", max);
        }

        clause
    }
}

fn column(table: Level, field: &'static str) -> &'static str {
    match (table, field) {
        (Level::Region, "region_code")
        | (Level::Department, "department_code")
        | (Level::District, "district_code") => "code",
        _ => field,
    }
}

/// A WHERE clause plus the parameters it references
#[derive(Debug, Clone, Default)]
pub struct WhereClause {
    conditions: Vec<String>,
    bindings: Vec<(&'static str, serde_json::Value)>,
}

impl WhereClause {
    fn push(
        &mut self,
        column: &str,
        op: &str,
        param: &'static str,
        value: impl Into<serde_json::Value>,
    ) {
        self.conditions.push(format!("{} {} ${}", column, op, param));
        self.bindings.push((param, value.into()));
    }

    /// `""` or `" WHERE a = $a AND ..."`
    pub fn sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn bind<'r>(&self, query: Query<'r, Db>) -> Query<'r, Db> {
        self.bindings
            .iter()
            .cloned()
            .fold(query, |query, binding| query.bind(binding))
    }
}

// ============================================================================
// Ordering
// ============================================================================

/// Fields of a town record that can be sorted on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TownField {
    TownCode,
    TownName,
    Population,
    DistrictCode,
    DepartmentCode,
    RegionCode,
    RegionName,
}

impl TownField {
    /// Column in the listing projection
    pub fn column(self) -> &'static str {
        match self {
            TownField::TownCode => "code",
            TownField::TownName => "name",
            TownField::Population => "population",
            TownField::DistrictCode => "district_code",
            TownField::DepartmentCode => "department_code",
            TownField::RegionCode => "region_code",
            TownField::RegionName => "region_name",
        }
    }
}

impl FromStr for TownField {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "town_code" => Ok(TownField::TownCode),
            "town_name" => Ok(TownField::TownName),
            "population" => Ok(TownField::Population),
            "district_code" => Ok(TownField::DistrictCode),
            "department_code" => Ok(TownField::DepartmentCode),
            "region_code" => Ok(TownField::RegionCode),
            "region_name" => Ok(TownField::RegionName),
            other => Err(QueryError::UnknownOrderingField(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub field: TownField,
    pub descending: bool,
}

impl FromStr for OrderBy {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.strip_prefix('-') {
            Some(name) => Ok(OrderBy { field: name.parse()?, descending: true }),
            None => Ok(OrderBy { field: s.parse()?, descending: false }),
        }
    }
}

/// `ordering=population` / `ordering=-population,town_name`
pub fn parse_ordering(raw: Option<&str>) -> Result<Vec<OrderBy>, QueryError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Vec::new()),
        Some(raw) => raw.split(',').map(str::parse).collect(),
    }
}

/// Insertion order breaks ties, and is the whole order when none is asked for
pub fn order_clause(ordering: &[OrderBy]) -> String {
    let mut terms: Vec<String> = ordering
        .iter()
        .map(|o| format!("{} {}", o.field.column(), if o.descending { "DESC" } else { "ASC" }))
        .collect();
    terms.push("seq ASC".to_string());
    format!(" ORDER BY {}", terms.join(", "))
}

// ============================================================================
// Pagination
// ============================================================================

/// Limit/offset window over the listing.
///
/// Both are `u32` so any accepted value is a valid SurrealQL integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub fn from_params(
        limit: &Option<String>,
        offset: &Option<String>,
        default_limit: u32,
    ) -> Result<Self, QueryError> {
        let limit = parse_param::<u32>("limit", limit)?.unwrap_or(default_limit);
        if limit == 0 {
            return Err(QueryError::InvalidParameter {
                param: "limit",
                value: "0".to_string(),
            });
        }
        let offset = parse_param::<u32>("offset", offset)?.unwrap_or(0);
        Ok(Page { limit, offset })
    }

    pub fn sql(&self) -> String {
        format!(" LIMIT {} START {}", self.limit, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> TownParams {
        let mut p = TownParams::default();
        for (k, v) in pairs {
            let v = Some(v.to_string());
            match *k {
                "limit" => p.limit = v,
                "offset" => p.offset = v,
                "ordering" => p.ordering = v,
                "region_code" => p.region_code = v,
                "department_code" => p.department_code = v,
                "district_code" => p.district_code = v,
                "population" => p.population = v,
                "min_population" => p.min_population = v,
                "max_population" => p.max_population = v,
                _ => unreachable!(),
            }
        }
        p
    }

    #[test]
    fn test_defaults() {
        let query = TownParams::default().parse(DEFAULT_LIMIT).unwrap();
        assert_eq!(query.filter, Filter::default());
        assert!(query.ordering.is_empty());
        assert_eq!(query.page, Page { limit: 100, offset: 0 });
        assert_eq!(query.filter.where_clause(Level::Town).sql(), "");
    }

    #[test]
    fn test_town_filter_parsing() {
        let query = params(&[
            ("region_code", "84"),
            ("department_code", "2A"),
            ("district_code", "3"),
            ("min_population", "100"),
            ("max_population", "5000"),
            ("limit", "20"),
            ("offset", "40"),
        ])
        .parse(DEFAULT_LIMIT)
        .unwrap();

        assert_eq!(query.filter.region_code, Some(RegionCode::new(84).unwrap()));
        assert_eq!(query.filter.department_code.as_ref().map(|d| d.as_str()), Some("2A"));
        assert_eq!(query.filter.district_code, Some(3));
        assert_eq!(query.filter.min_population, Some(100));
        assert_eq!(query.filter.max_population, Some(5000));
        assert_eq!(query.page, Page { limit: 20, offset: 40 });
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let query = params(&[("region_code", ""), ("population", " ")])
            .parse(DEFAULT_LIMIT)
            .unwrap();
        assert_eq!(query.filter, Filter::default());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let cases = [
            ("region_code", "7", "region_code"),
            ("region_code", "north", "region_code"),
            ("department_code", "2C", "department_code"),
            ("district_code", "two", "district_code"),
            ("population", "-1", "population"),
            ("min_population", "lots", "min_population"),
            ("limit", "abc", "limit"),
            ("limit", "0", "limit"),
            ("offset", "-5", "offset"),
            ("limit", "18446744073709551615", "limit"),
            ("offset", "18446744073709551615", "offset"),
            ("limit", "4294967296", "limit"),
        ];
        for (key, value, expected) in cases {
            match params(&[(key, value)]).parse(DEFAULT_LIMIT) {
                Err(QueryError::InvalidParameter { param, .. }) => assert_eq!(param, expected),
                other => panic!("{key}={value} gave {other:?}"),
            }
        }
    }

    #[test]
    fn test_region_code_two_digit_form() {
        let one = params(&[("region_code", "01")]).parse(DEFAULT_LIMIT).unwrap();
        let two = params(&[("region_code", "1")]).parse(DEFAULT_LIMIT).unwrap();
        assert_eq!(one.filter, two.filter);
    }

    #[test]
    fn test_agg_params_ignore_keys_outside_level() {
        let raw = AggParams {
            region_code: Some("84".to_string()),
            department_code: Some("not a code".to_string()),
            district_code: Some("nope".to_string()),
        };

        // department/district are not recognised here so their junk is ignored
        let regions = raw.parse(Level::Region).unwrap();
        assert_eq!(regions.department_code, None);
        assert_eq!(regions.district_code, None);
        assert!(raw.parse(Level::Department).is_ok());

        assert!(matches!(
            raw.parse(Level::District),
            Err(QueryError::InvalidParameter { param: "department_code", .. })
        ));
    }

    #[test]
    fn test_agg_params_for_towns() {
        let raw = AggParams {
            region_code: Some("84".to_string()),
            department_code: Some("1".to_string()),
            district_code: Some("2".to_string()),
        };
        let filter = raw.parse(Level::Town).unwrap();
        assert_eq!(filter.district_code, Some(2));

        let filter = raw.parse(Level::Department).unwrap();
        assert_eq!(filter.department_code, None);
        assert_eq!(filter.district_code, None);
    }

    #[test]
    fn test_where_clause_columns() {
        let filter = Filter {
            region_code: Some(RegionCode::new(84).unwrap()),
            department_code: Some(DepartmentCode::new("1").unwrap()),
            ..Filter::default()
        };

        assert_eq!(
            filter.where_clause(Level::Town).sql(),
            " WHERE region_code = $region_code AND department_code = $department_code"
        );
        assert_eq!(
            filter.where_clause(Level::District).sql(),
            " WHERE region_code = $region_code AND department_code = $department_code"
        );
        assert_eq!(
            filter.where_clause(Level::Department).sql(),
            " WHERE region_code = $region_code AND code = $department_code"
        );
        let regions = Filter {
            region_code: Some(RegionCode::new(84).unwrap()),
            ..Filter::default()
        };
        assert_eq!(regions.where_clause(Level::Region).sql(), " WHERE code = $region_code");
    }

    #[test]
    fn test_population_bounds() {
        let filter = Filter {
            min_population: Some(10),
            max_population: Some(20),
            ..Filter::default()
        };
        assert_eq!(
            filter.where_clause(Level::Town).sql(),
            " WHERE population >= $min_population AND population <= $max_population"
        );
    }

    #[test]
    fn test_ordering() {
        let ordering = parse_ordering(Some("-population,town_name")).unwrap();
        assert_eq!(
            ordering,
            vec![
                OrderBy { field: TownField::Population, descending: true },
                OrderBy { field: TownField::TownName, descending: false },
            ]
        );
        assert_eq!(
            order_clause(&ordering),
            " ORDER BY population DESC, name ASC, seq ASC"
        );
        assert_eq!(order_clause(&[]), " ORDER BY seq ASC");
        assert!(parse_ordering(None).unwrap().is_empty());
        assert_eq!(
            parse_ordering(Some("-elevation")),
            Err(QueryError::UnknownOrderingField("elevation".to_string()))
        );
    }

    #[test]
    fn test_page_sql() {
        assert_eq!(Page { limit: 5, offset: 10 }.sql(), " LIMIT 5 START 10");
    }
}
