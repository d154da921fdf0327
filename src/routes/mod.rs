use std::any::Any;

use axum::http::HeaderValue;
use axum::{
    extract::Request,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use serde::Serialize;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::{auth::AuthenticatedUser, error::AppError, state::AppState};

pub mod auth;
pub mod companies;
pub mod contacts;
pub mod health;
pub mod matching;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Envelope for list endpoints: the full filtered count, never the page size.
#[derive(Serialize)]
pub struct ListEnvelope<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: i64,
}

/// Envelope for link management responses.
#[derive(Serialize)]
pub struct LinkEnvelope<T> {
    pub message: &'static str,
    pub data: T,
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/me", get(auth::me));

    let contacts_routes = Router::new()
        .route("/", get(contacts::list_contacts).post(contacts::create_contact))
        .route("/stats", get(contacts::contact_stats))
        .route(
            "/:id",
            get(contacts::get_contact)
                .put(contacts::update_contact)
                .delete(contacts::delete_contact),
        )
        .route("/cpf/:cpf", get(contacts::get_contact_by_cpf))
        .route(
            "/:contact_id/companies/:company_id",
            post(contacts::link_company).delete(contacts::unlink_company),
        );

    let companies_routes = Router::new()
        .route(
            "/",
            get(companies::list_companies).post(companies::create_company),
        )
        .route("/stats", get(companies::company_stats))
        .route(
            "/:id",
            get(companies::get_company)
                .put(companies::update_company)
                .delete(companies::delete_company),
        )
        .route("/cnpj/:cnpj", get(companies::get_company_by_cnpj));

    let matching_routes = Router::new()
        .route(
            "/company/:company_id/contacts",
            get(matching::company_contacts),
        )
        .route(
            "/contact/:contact_id/companies",
            get(matching::contact_companies),
        )
        .route("/best-matches", get(matching::best_matches))
        .route("/links", post(matching::create_link))
        .route(
            "/links/:company_id/:contact_id",
            delete(matching::remove_link),
        );

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/contacts", contacts_routes)
        .nest("/api/companies", companies_routes)
        .nest("/api/matching", matching_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors)
        .layer(middleware::from_fn(attach_correlation_id))
}

/// Every response carries a correlation id, propagated from the request
/// header or freshly generated. Outermost layer, so panics and rejections
/// are tagged too.
async fn attach_correlation_id(request: Request, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

/// Boundary for anything that slipped past the error type: a panic becomes
/// a 500 envelope instead of a dropped connection.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(text) = err.downcast_ref::<String>() {
        text.clone()
    } else if let Some(text) = err.downcast_ref::<&str>() {
        (*text).to_string()
    } else {
        "unexpected panic".to_string()
    };
    tracing::error!(message = %message, "handler panicked");
    AppError::internal(message).into_response()
}
