use axum::extract::{rejection::JsonRejection, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::models::{Contact, LinkRole};
use crate::repository::{ListParams, Stats};
use crate::routes::{LinkEnvelope, ListEnvelope};
use crate::state::AppState;
use crate::validation;

const NOT_FOUND: &str = "contact not found";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactListQuery {
    pub page: Option<u64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub risk_level: Option<String>,
    pub kyc_score_min: Option<i32>,
    pub kyc_score_max: Option<i32>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl ContactListQuery {
    fn into_params(self) -> ListParams {
        ListParams {
            page: self.page.unwrap_or(1),
            limit: self.limit.unwrap_or(10),
            status: self.status,
            risk_level: self.risk_level,
            kyc_score_min: self.kyc_score_min,
            kyc_score_max: self.kyc_score_max,
            search: self.search,
            sort_by: self.sort_by,
            sort_order: self.sort_order,
        }
    }
}

#[derive(Deserialize)]
pub struct LinkRequestBody {
    pub role: Option<LinkRole>,
}

/// Parse into a schema-less tree, run the validation gate, and only then map
/// into the typed entity. The typed step is never the validator.
pub async fn create_contact(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<Contact>> {
    let Json(body) = payload.map_err(|err| AppError::invalid_json(err.body_text()))?;

    let errors = validation::contact_create(&body);
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    let contact: Contact = serde_json::from_value(body)
        .map_err(|err| AppError::bad_request("invalid document").with_message(err.to_string()))?;
    let created = state.contacts().create(contact).await?;
    Ok(Json(created))
}

pub async fn list_contacts(
    State(state): State<AppState>,
    Query(query): Query<ContactListQuery>,
) -> AppResult<Json<ListEnvelope<Contact>>> {
    let params = query.into_params();
    let page = state.contacts().list(&params).await?;
    Ok(Json(ListEnvelope {
        items: page.items,
        total: page.total,
        page: params.page(),
        limit: params.limit(),
    }))
}

pub async fn contact_stats(State(state): State<AppState>) -> AppResult<Json<Stats>> {
    Ok(Json(state.contacts().stats().await?))
}

pub async fn get_contact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Contact>> {
    let contact = state
        .contacts()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| AppError::not_found(NOT_FOUND))?;
    Ok(Json(contact))
}

pub async fn get_contact_by_cpf(
    State(state): State<AppState>,
    Path(cpf): Path<String>,
) -> AppResult<Json<Contact>> {
    let contact = state
        .contacts()
        .get_by_cpf(&cpf)
        .await?
        .ok_or_else(|| AppError::not_found(NOT_FOUND))?;
    Ok(Json(contact))
}

pub async fn update_contact(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<Contact>> {
    let Json(body) = payload.map_err(|err| AppError::invalid_json(err.body_text()))?;

    let errors = validation::contact_update(&body);
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    let contact: Contact = serde_json::from_value(body)
        .map_err(|err| AppError::bad_request("invalid document").with_message(err.to_string()))?;
    let updated = state
        .contacts()
        .update(&id, contact)
        .await?
        .ok_or_else(|| AppError::not_found(NOT_FOUND))?;
    Ok(Json(updated))
}

pub async fn delete_contact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    if state.contacts().delete(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(NOT_FOUND))
    }
}

pub async fn link_company(
    State(state): State<AppState>,
    Path((contact_id, company_id)): Path<(String, String)>,
    body: Option<Json<LinkRequestBody>>,
) -> AppResult<Json<LinkEnvelope<Contact>>> {
    let role = body.and_then(|Json(b)| b.role).unwrap_or_default();
    let updated = state
        .contacts()
        .link(&contact_id, &company_id, role)
        .await?
        .ok_or_else(|| AppError::not_found(NOT_FOUND))?;
    Ok(Json(LinkEnvelope {
        message: "link created",
        data: updated,
    }))
}

pub async fn unlink_company(
    State(state): State<AppState>,
    Path((contact_id, company_id)): Path<(String, String)>,
) -> AppResult<Json<LinkEnvelope<Contact>>> {
    let updated = state
        .contacts()
        .unlink(&contact_id, &company_id)
        .await?
        .ok_or_else(|| AppError::not_found(NOT_FOUND))?;
    Ok(Json(LinkEnvelope {
        message: "link removed",
        data: updated,
    }))
}
