use std::sync::Arc;

use chrono::Utc;
use mongodb::bson::{doc, from_document, to_document};

use crate::models::{Company, ContactStatus};
use crate::store::{Collection, DocumentStore, StoreResult};

use super::{build_list_filter, build_sort, status_breakdown, ListPage, ListParams, Stats};

const SEARCH_FIELDS: [&str; 2] = ["identification.legalName", "identification.cnpj"];

#[derive(Clone)]
pub struct CompanyRepository {
    store: Arc<dyn DocumentStore>,
}

impl CompanyRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, mut company: Company) -> StoreResult<Company> {
        company.id = None;
        company.created_at = Some(Utc::now());
        company.updated_at = None;
        let doc = to_document(&company)?;
        let stored = self.store.insert(Collection::Companies, doc).await?;
        Ok(from_document(stored)?)
    }

    pub async fn list(&self, params: &ListParams) -> StoreResult<ListPage<Company>> {
        let filter = build_list_filter(params, SEARCH_FIELDS);
        let sort = build_sort(params.sort_by.as_deref(), params.sort_order.as_deref());
        let (docs, total) = self
            .store
            .query(
                Collection::Companies,
                filter,
                sort,
                params.skip(),
                params.limit(),
            )
            .await?;
        let items = docs
            .into_iter()
            .map(|doc| from_document(doc).map_err(Into::into))
            .collect::<StoreResult<Vec<Company>>>()?;
        Ok(ListPage { items, total })
    }

    pub async fn get_by_id(&self, id: &str) -> StoreResult<Option<Company>> {
        let found = self.store.find_by_id(Collection::Companies, id).await?;
        found.map(|doc| from_document(doc).map_err(Into::into)).transpose()
    }

    pub async fn get_by_cnpj(&self, cnpj: &str) -> StoreResult<Option<Company>> {
        let found = self
            .store
            .find_one(Collection::Companies, doc! {"identification.cnpj": cnpj})
            .await?;
        found.map(|doc| from_document(doc).map_err(Into::into)).transpose()
    }

    /// Full-document replace. The path id wins over any id in the payload;
    /// `createdAt` survives the replace and `updatedAt` moves to now.
    pub async fn update(&self, id: &str, mut company: Company) -> StoreResult<Option<Company>> {
        let Some(existing) = self.get_by_id(id).await? else {
            return Ok(None);
        };
        company.id = Some(id.to_string());
        company.created_at = existing.created_at;
        company.updated_at = Some(Utc::now());
        let doc = to_document(&company)?;
        let replaced = self.store.replace(Collection::Companies, id, doc).await?;
        replaced
            .map(|doc| from_document(doc).map_err(Into::into))
            .transpose()
    }

    pub async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.store.delete(Collection::Companies, id).await
    }

    pub async fn stats(&self) -> StoreResult<Stats> {
        // Company profiles are still free-form; the known contact statuses
        // cover the values onboarding writes today.
        let statuses: Vec<&str> = ContactStatus::ALL.iter().map(|s| s.as_str()).collect();
        status_breakdown(self.store.as_ref(), Collection::Companies, &statuses).await
    }
}
