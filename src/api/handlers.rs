//! REST API handlers for the towns API
//!
//! Response types flatten each entity and its ancestors into a single
//! JSON object. Codes are always rendered as strings.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use super::aggregation::{Aggregate, Level};
use super::filters::{AggParams, TownParams};
use super::service::{TownPage, TownRow, TownService};
use crate::codes::format_region_code;
use crate::db::TableCounts;
use crate::error::{Error, QueryError};

// ============================================================================
// Response Types (JSON-serializable versions)
// ============================================================================

#[derive(Debug, Serialize)]
pub struct TownResponse {
    pub town_code: String,
    pub town_name: String,
    pub population: i64,
    pub district_code: String,
    pub department_code: String,
    pub region_code: String,
    pub region_name: String,
}

impl From<TownRow> for TownResponse {
    fn from(t: TownRow) -> Self {
        Self {
            town_code: t.code.to_string(),
            town_name: t.name,
            population: t.population,
            district_code: t.district_code.to_string(),
            department_code: t.department_code,
            region_code: format_region_code(t.region_code),
            region_name: t.region_name.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TownListResponse {
    pub count: i64,
    pub results: Vec<TownResponse>,
}

impl From<TownPage> for TownListResponse {
    fn from(page: TownPage) -> Self {
        Self {
            count: page.count,
            results: page.results.into_iter().map(TownResponse::from).collect(),
        }
    }
}

/// Aggregate record for any level. Only the identity and ancestor fields
/// relevant to the level are emitted.
#[derive(Debug, Serialize)]
pub struct AggResponse {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub min_population: Option<i64>,
    pub max_population: Option<i64>,
    pub avg_population: Option<f64>,
    pub town_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district_code: Option<String>,
}

impl From<Aggregate> for AggResponse {
    fn from(a: Aggregate) -> Self {
        let region_code = a.region_code.map(format_region_code);
        let district_code = a.district_code.map(|c| c.to_string());

        let (code, name) = match a.level {
            Level::Region => (region_code.clone(), Some(a.region_name.unwrap_or_default())),
            Level::Department => (a.department_code.clone(), None),
            Level::District => (district_code.clone(), None),
            Level::Town => (
                a.town_code.map(|c| c.to_string()),
                Some(a.town_name.unwrap_or_default()),
            ),
        };

        Self {
            code: code.unwrap_or_default(),
            name,
            min_population: a.stats.min_population,
            max_population: a.stats.max_population,
            avg_population: a.stats.avg_population.map(|avg| (avg * 100.0).round() / 100.0),
            town_count: a.stats.town_count,
            region_code: region_code.filter(|_| a.level > Level::Region),
            department_code: a.department_code.filter(|_| a.level > Level::Department),
            district_code: district_code.filter(|_| a.level > Level::District),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub regions: i64,
    pub departments: i64,
    pub districts: i64,
    pub towns: i64,
}

impl From<TableCounts> for StatsResponse {
    fn from(c: TableCounts) -> Self {
        Self {
            regions: c.regions,
            departments: c.departments,
            districts: c.districts,
            towns: c.towns,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(e: Error) -> ApiError {
    let status = match &e {
        Error::Query(QueryError::UnknownLevel(_)) => StatusCode::NOT_FOUND,
        Error::Query(_) | Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::DuplicateTown { .. } => StatusCode::CONFLICT,
        Error::Database(_) | Error::Csv(_) => {
            error!("Request failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ErrorResponse { error: e.to_string() }))
}

// ============================================================================
// Handlers
// ============================================================================

pub type AppState = Arc<TownService>;

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// GET /stats
pub async fn get_stats(State(service): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    match service.get_stats().await {
        Ok(counts) => Ok(Json(StatsResponse::from(counts))),
        Err(e) => Err(error_response(e)),
    }
}

/// GET /towns
pub async fn list_towns(
    State(service): State<AppState>,
    Query(params): Query<TownParams>,
) -> Result<Json<TownListResponse>, ApiError> {
    let query = params
        .parse(service.default_limit())
        .map_err(|e| error_response(e.into()))?;

    match service.list_towns(&query).await {
        Ok(page) => Ok(Json(TownListResponse::from(page))),
        Err(e) => Err(error_response(e)),
    }
}

/// GET /aggs/:level
pub async fn get_aggregates(
    State(service): State<AppState>,
    Path(level): Path<String>,
    Query(params): Query<AggParams>,
) -> Result<Json<Vec<AggResponse>>, ApiError> {
    let level: Level = level.parse().map_err(|e: QueryError| error_response(e.into()))?;
    let filter = params.parse(level).map_err(|e| error_response(e.into()))?;

    match service.aggregate(level, &filter).await {
        Ok(aggregates) => Ok(Json(aggregates.into_iter().map(AggResponse::from).collect())),
        Err(e) => Err(error_response(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::aggregation::PopulationStats;

    fn aggregate(level: Level) -> Aggregate {
        Aggregate {
            level,
            region_code: Some(84),
            region_name: Some("Auvergne-Rhône-Alpes".to_string()),
            department_code: Some("1".to_string()),
            district_code: Some(2),
            town_code: Some(1),
            town_name: Some("L' Abergement-Clémenciat".to_string()),
            stats: PopulationStats {
                min_population: Some(69),
                max_population: Some(42937),
                avg_population: Some(1668.4567),
                town_count: 218,
            },
        }
    }

    #[test]
    fn test_town_response_is_flat() {
        let row = TownRow {
            code: 1,
            name: "L' Abergement-Clémenciat".to_string(),
            population: 785,
            district_code: 2,
            department_code: "1".to_string(),
            region_code: 4,
            region_name: Some("La Réunion".to_string()),
        };
        let json = serde_json::to_value(TownResponse::from(row)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "town_code": "1",
                "town_name": "L' Abergement-Clémenciat",
                "population": 785,
                "district_code": "2",
                "department_code": "1",
                "region_code": "04",
                "region_name": "La Réunion"
            })
        );
    }

    #[test]
    fn test_region_agg_shape() {
        let json = serde_json::to_value(AggResponse::from(aggregate(Level::Region))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "code": "84",
                "name": "Auvergne-Rhône-Alpes",
                "min_population": 69,
                "max_population": 42937,
                "avg_population": 1668.46,
                "town_count": 218
            })
        );
    }

    #[test]
    fn test_district_agg_shape() {
        let json = serde_json::to_value(AggResponse::from(aggregate(Level::District))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "code": "2",
                "min_population": 69,
                "max_population": 42937,
                "avg_population": 1668.46,
                "town_count": 218,
                "region_code": "84",
                "department_code": "1"
            })
        );
    }

    #[test]
    fn test_town_agg_shape() {
        let mut town = aggregate(Level::Town);
        town.stats = PopulationStats::single(785);
        let json = serde_json::to_value(AggResponse::from(town)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "code": "1",
                "name": "L' Abergement-Clémenciat",
                "min_population": 785,
                "max_population": 785,
                "avg_population": 785.0,
                "town_count": 1,
                "region_code": "84",
                "department_code": "1",
                "district_code": "2"
            })
        );
    }

    #[test]
    fn test_empty_node_renders_nulls() {
        let mut department = aggregate(Level::Department);
        department.stats = PopulationStats::EMPTY;
        let json = serde_json::to_value(AggResponse::from(department)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "code": "1",
                "min_population": null,
                "max_population": null,
                "avg_population": null,
                "town_count": 0,
                "region_code": "84"
            })
        );
    }

    #[test]
    fn test_error_statuses() {
        let (status, _) = error_response(QueryError::UnknownLevel("x".to_string()).into());
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, Json(body)) = error_response(
            QueryError::InvalidParameter { param: "limit", value: "x".to_string() }.into(),
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Invalid value 'x' for parameter 'limit'");
    }
}
