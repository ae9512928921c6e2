//! REST API over the towns dataset
//!
//!   GET /towns              paginated, filterable, orderable town listing
//!   GET /aggs/:level        population aggregates per region/department/district/town
//!   GET /stats              row counts
//!   GET /health             health check

pub mod aggregation;
pub mod filters;
pub mod handlers;
pub mod service;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use service::TownService;

pub fn create_router(service: Arc<TownService>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/stats", get(handlers::get_stats))
        // trailing slashes are accepted too
        .route("/towns", get(handlers::list_towns))
        .route("/towns/", get(handlers::list_towns))
        .route("/aggs/:level", get(handlers::get_aggregates))
        .route("/aggs/:level/", get(handlers::get_aggregates))
        .with_state(service)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::aggregation::tests::scenario_db;
    use crate::api::filters::DEFAULT_LIMIT;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    async fn app() -> Router {
        create_router(Arc::new(TownService::new(scenario_db().await, DEFAULT_LIMIT)))
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let app = app().await;
        let (status, body) = get(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_towns_listing() {
        let app = app().await;
        let (status, body) = get(&app, "/towns").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 100);
        assert_eq!(body["results"].as_array().unwrap().len(), 100);
        assert_eq!(
            body["results"][12],
            serde_json::json!({
                "town_code": "12",
                "town_name": "Town 12",
                "population": 12,
                "district_code": "1",
                "department_code": "2",
                "region_code": "02",
                "region_name": "Region 02"
            })
        );
    }

    #[tokio::test]
    async fn test_towns_pagination_and_filters() {
        let app = app().await;
        let (status, body) =
            get(&app, "/towns/?limit=2&offset=1&ordering=-population&min_population=50&region_code=05").await;
        assert_eq!(status, StatusCode::OK);
        // region 05 holds towns 40..49, none of which reach 50
        assert_eq!(body["count"], 0);

        let (_, body) = get(&app, "/towns?limit=2&offset=1&ordering=-population&region_code=05").await;
        assert_eq!(body["count"], 10);
        let names: Vec<&str> = body["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["town_name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Town 48", "Town 47"]);
    }

    #[tokio::test]
    async fn test_unknown_params_are_ignored() {
        let app = app().await;
        let (status, body) = get(&app, "/towns?colour=blue&limit=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 100);
    }

    #[tokio::test]
    async fn test_bad_params_are_client_errors() {
        let app = app().await;
        for uri in [
            "/towns?region_code=6",
            "/towns?district_code=abc",
            "/towns?limit=-1",
            "/towns?limit=18446744073709551615",
            "/towns?offset=18446744073709551615",
            "/towns?ordering=elevation",
            "/aggs/districts?department_code=XYZ",
        ] {
            let (status, body) = get(&app, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(body["error"].is_string(), "{uri}");
        }
    }

    #[tokio::test]
    async fn test_aggregate_endpoints() {
        let app = app().await;

        let (status, body) = get(&app, "/aggs/regions").await;
        assert_eq!(status, StatusCode::OK);
        let regions = body.as_array().unwrap();
        assert_eq!(regions.len(), 10);
        assert_eq!(regions[0]["code"], "01");
        assert_eq!(regions[0]["town_count"], 10);
        assert_eq!(regions[0]["max_population"], 9);

        let (_, body) = get(&app, "/aggs/departments/").await;
        let departments = body.as_array().unwrap();
        assert_eq!(departments.len(), 20);
        assert_eq!(departments[0]["town_count"], 5);
        assert_eq!(departments[0]["max_population"], 4);
        assert_eq!(departments[0]["region_code"], "01");

        let (_, body) = get(&app, "/aggs/districts?region_code=1&department_code=1").await;
        let districts = body.as_array().unwrap();
        assert_eq!(districts.len(), 2);
        assert_eq!(districts[0]["department_code"], "1");
        assert_eq!(districts[0]["town_count"], 2);

        let (_, body) = get(&app, "/aggs/towns?department_code=19&district_code=1").await;
        let towns = body.as_array().unwrap();
        assert_eq!(towns.len(), 3);
        assert_eq!(towns[2]["code"], "99");
        assert_eq!(towns[2]["avg_population"], 99.0);
        assert_eq!(towns[2]["district_code"], "1");
    }

    #[tokio::test]
    async fn test_unrecognised_agg_filters_are_ignored() {
        let app = app().await;
        let (status, body) = get(&app, "/aggs/regions?district_code=zzz&department_code=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_unknown_level() {
        let app = app().await;
        let (status, body) = get(&app, "/aggs/cantons").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("cantons"));
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let app = app().await;
        let (status, body) = get(&app, "/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!({"regions": 10, "departments": 20, "districts": 40, "towns": 100})
        );
    }
}
