use axum::extract::{rejection::JsonRejection, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::models::Company;
use crate::repository::{ListParams, Stats};
use crate::routes::ListEnvelope;
use crate::state::AppState;
use crate::validation;

const NOT_FOUND: &str = "company not found";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyListQuery {
    pub page: Option<u64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub kyc_score_min: Option<i32>,
    pub kyc_score_max: Option<i32>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl CompanyListQuery {
    fn into_params(self) -> ListParams {
        ListParams {
            page: self.page.unwrap_or(1),
            limit: self.limit.unwrap_or(10),
            status: self.status,
            risk_level: None,
            kyc_score_min: self.kyc_score_min,
            kyc_score_max: self.kyc_score_max,
            search: self.search,
            sort_by: self.sort_by,
            sort_order: self.sort_order,
        }
    }
}

pub async fn create_company(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<Company>> {
    let Json(body) = payload.map_err(|err| AppError::invalid_json(err.body_text()))?;

    let errors = validation::company_create(&body);
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    let company: Company = serde_json::from_value(body)
        .map_err(|err| AppError::bad_request("invalid document").with_message(err.to_string()))?;
    let created = state.companies().create(company).await?;
    Ok(Json(created))
}

pub async fn list_companies(
    State(state): State<AppState>,
    Query(query): Query<CompanyListQuery>,
) -> AppResult<Json<ListEnvelope<Company>>> {
    let params = query.into_params();
    let page = state.companies().list(&params).await?;
    Ok(Json(ListEnvelope {
        items: page.items,
        total: page.total,
        page: params.page(),
        limit: params.limit(),
    }))
}

pub async fn company_stats(State(state): State<AppState>) -> AppResult<Json<Stats>> {
    Ok(Json(state.companies().stats().await?))
}

pub async fn get_company(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Company>> {
    let company = state
        .companies()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| AppError::not_found(NOT_FOUND))?;
    Ok(Json(company))
}

pub async fn get_company_by_cnpj(
    State(state): State<AppState>,
    Path(cnpj): Path<String>,
) -> AppResult<Json<Company>> {
    let company = state
        .companies()
        .get_by_cnpj(&cnpj)
        .await?
        .ok_or_else(|| AppError::not_found(NOT_FOUND))?;
    Ok(Json(company))
}

pub async fn update_company(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<Company>> {
    let Json(body) = payload.map_err(|err| AppError::invalid_json(err.body_text()))?;

    let errors = validation::company_update(&body);
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    let company: Company = serde_json::from_value(body)
        .map_err(|err| AppError::bad_request("invalid document").with_message(err.to_string()))?;
    let updated = state
        .companies()
        .update(&id, company)
        .await?
        .ok_or_else(|| AppError::not_found(NOT_FOUND))?;
    Ok(Json(updated))
}

pub async fn delete_company(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    if state.companies().delete(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(NOT_FOUND))
    }
}
