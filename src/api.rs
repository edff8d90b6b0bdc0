//! # API Server Module
//!
//! ## Purpose
//! Thin REST adapter over the pricing engine. Parses query parameters,
//! validates them, and serializes engine results; all pricing logic lives
//! below this layer.
//!
//! ## Endpoints
//! - `GET /summary`: per-region (or per-geography) average price summary
//! - `GET /cheapest`: top-N cheapest regions ranking
//! - `GET /health`: liveness and basic engine stats
//!
//! Query parameters are camelCase (`tenantId`, `currency`, `groupBy`, `topN`).
//! Validation failures map to 400, upstream source failures to 502, anything
//! else to 500, always with a structured JSON error body.

use crate::engine::{CheapestParams, SummaryParams};
use crate::errors::{PricingError, Result};
use crate::models::{Currency, GroupBy};
use crate::{AppState, TenantContext};
use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Default ranking depth for `/cheapest`
const DEFAULT_TOP_N: usize = 10;

/// REST API server wrapping the pricing engine
pub struct ApiServer {
    app_state: AppState,
}

/// Query parameters for `GET /summary`
#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    #[serde(rename = "tenantId")]
    pub tenant_id: Option<String>,
    pub currency: Option<String>,
    #[serde(rename = "groupBy")]
    pub group_by: Option<String>,
}

/// Query parameters for `GET /cheapest`
#[derive(Debug, Deserialize)]
pub struct CheapestQuery {
    #[serde(rename = "tenantId")]
    pub tenant_id: Option<String>,
    pub currency: Option<String>,
    /// Values below 1 are clamped to 1 (documented behavior, not silent
    /// correction of a malformed value)
    #[serde(rename = "topN")]
    pub top_n: Option<i64>,
}

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    region_count: usize,
    summary_cache_keys: usize,
}

/// Structured error body
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    category: &'static str,
}

fn parse_currency(raw: &Option<String>) -> Result<Currency> {
    match raw {
        Some(code) => code.parse(),
        None => Ok(Currency::default()),
    }
}

fn parse_group_by(raw: &Option<String>) -> Result<GroupBy> {
    match raw {
        Some(value) => value.parse(),
        None => Ok(GroupBy::default()),
    }
}

fn error_response(err: &PricingError) -> HttpResponse {
    let body = ErrorResponse {
        error: err.to_string(),
        category: err.category(),
    };
    match err.category() {
        "validation" => HttpResponse::BadRequest().json(body),
        "source" => HttpResponse::BadGateway().json(body),
        _ => HttpResponse::InternalServerError().json(body),
    }
}

async fn summary_handler(
    state: web::Data<AppState>,
    query: web::Query<SummaryQuery>,
) -> HttpResponse {
    let currency = match parse_currency(&query.currency) {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };
    let group_by = match parse_group_by(&query.group_by) {
        Ok(g) => g,
        Err(e) => return error_response(&e),
    };

    let params = SummaryParams {
        tenant: TenantContext::new(query.tenant_id.clone()),
        currency,
        group_by,
    };
    match state.engine.summary(params).await {
        Ok(result) => HttpResponse::Ok().json(&*result),
        Err(e) => error_response(&e),
    }
}

async fn cheapest_handler(
    state: web::Data<AppState>,
    query: web::Query<CheapestQuery>,
) -> HttpResponse {
    let currency = match parse_currency(&query.currency) {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };
    let top_n = query.top_n.unwrap_or(DEFAULT_TOP_N as i64).max(1) as usize;

    let params = CheapestParams {
        tenant: TenantContext::new(query.tenant_id.clone()),
        currency,
        top_n,
    };
    match state.engine.cheapest(params).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(e) => error_response(&e),
    }
}

async fn health_handler(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        region_count: state.engine.region_count(),
        summary_cache_keys: state.engine.summary_cache_size(),
    })
}

/// Route table, shared between the server and handler tests
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/summary", web::get().to(summary_handler))
        .route("/cheapest", web::get().to(cheapest_handler))
        .route("/health", web::get().to(health_handler));
}

impl ApiServer {
    pub fn new(app_state: AppState) -> Self {
        Self { app_state }
    }

    /// Run the API server until shutdown
    pub async fn run(self) -> Result<()> {
        let config = self.app_state.config.clone();
        let bind_addr = format!("{}:{}", config.server.host, config.server.port);
        info!("Starting API server on {}", bind_addr);

        let app_state = self.app_state;
        let server = HttpServer::new(move || {
            let cors = if app_state.config.server.enable_cors {
                Cors::permissive()
            } else {
                Cors::default()
            };
            App::new()
                .wrap(cors)
                .app_data(web::Data::new(app_state.clone()))
                .configure(configure_routes)
        })
        .bind(&bind_addr)
        .map_err(|e| PricingError::Internal {
            message: format!("Failed to bind server to {}: {}", bind_addr, e),
        })?
        .run();
        server.await.map_err(|e| PricingError::Internal {
            message: format!("Server error: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, Config};
    use crate::currency::StaticFxProvider;
    use crate::engine::PricingEngine;
    use crate::geography::GeographyIndex;
    use crate::sources::testing::MockSource;
    use actix_web::{test, App};
    use std::sync::Arc;

    fn test_state() -> AppState {
        let live = MockSource::new("live")
            .with_region("eastus", &[("Standard_B2s", Some(0.05)), ("Standard_D2s_v5", Some(0.15))])
            .with_region("westus", &[("Standard_B2s", Some(0.20))]);
        let engine = PricingEngine::new(
            Arc::new(GeographyIndex::embedded().unwrap()),
            Arc::new(MockSource::new("store")),
            Arc::new(live),
            Arc::new(StaticFxProvider::new()),
            &CacheConfig::default(),
        );
        AppState {
            config: Arc::new(Config::default()),
            engine: Arc::new(engine),
        }
    }

    #[actix_web::test]
    async fn summary_endpoint_returns_camel_case_rows() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/summary").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["currency"], "USD");
        assert_eq!(body["groupBy"], "region");
        assert_eq!(body["dataSource"], "live");
        assert!(body["rows"].as_array().unwrap().len() > 0);
        assert!(body["rows"][0].get("regionId").is_some());
        assert!(body.get("timestampUtc").is_some());
    }

    #[actix_web::test]
    async fn invalid_currency_is_rejected_with_400() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/summary?currency=DOGE")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn cheapest_endpoint_clamps_top_n() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/cheapest?topN=-3")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        let rows = body["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["rank"], 1);
        assert_eq!(rows[0]["deltaPct"], 0.0);
    }
}
