//! Derived views over the contact → company link set. Nothing here is
//! stored; every request recomputes from the embedded references.

use axum::extract::{rejection::JsonRejection, Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::models::{Company, Contact, LinkRole};
use crate::routes::{LinkEnvelope, ListEnvelope};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkRequest {
    pub contact_id: String,
    pub company_id: String,
    pub role: Option<LinkRole>,
}

pub async fn company_contacts(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
) -> AppResult<Json<ListEnvelope<Contact>>> {
    let items = state.contacts().linked_to_company(&company_id).await?;
    let total = items.len() as u64;
    Ok(Json(ListEnvelope {
        items,
        total,
        page: 1,
        limit: 100,
    }))
}

pub async fn contact_companies(
    State(state): State<AppState>,
    Path(contact_id): Path<String>,
) -> AppResult<Json<ListEnvelope<Company>>> {
    let contact = state
        .contacts()
        .get_by_id(&contact_id)
        .await?
        .ok_or_else(|| AppError::not_found("contact not found"))?;

    let companies = state.companies();
    let mut items = Vec::new();
    for link in &contact.linked_companies {
        // Links are not referentially enforced; dangling ids are skipped.
        if let Some(company) = companies.get_by_id(&link.company_id).await? {
            items.push(company);
        }
    }
    let total = items.len() as u64;
    Ok(Json(ListEnvelope {
        items,
        total,
        page: 1,
        limit: 100,
    }))
}

/// Extension point: the ranking algorithm is intentionally undefined, so
/// the view is an empty page until one exists.
pub async fn best_matches() -> Json<Value> {
    Json(json!({ "items": [], "total": 0 }))
}

pub async fn create_link(
    State(state): State<AppState>,
    payload: Result<Json<CreateLinkRequest>, JsonRejection>,
) -> AppResult<Json<LinkEnvelope<Contact>>> {
    let Json(body) = payload.map_err(|err| AppError::invalid_json(err.body_text()))?;
    let updated = state
        .contacts()
        .link(
            &body.contact_id,
            &body.company_id,
            body.role.unwrap_or_default(),
        )
        .await?
        .ok_or_else(|| AppError::not_found("contact not found"))?;
    Ok(Json(LinkEnvelope {
        message: "link created",
        data: updated,
    }))
}

pub async fn remove_link(
    State(state): State<AppState>,
    Path((company_id, contact_id)): Path<(String, String)>,
) -> AppResult<Json<LinkEnvelope<Contact>>> {
    let updated = state
        .contacts()
        .unlink(&contact_id, &company_id)
        .await?
        .ok_or_else(|| AppError::not_found("contact not found"))?;
    Ok(Json(LinkEnvelope {
        message: "link removed",
        data: updated,
    }))
}
