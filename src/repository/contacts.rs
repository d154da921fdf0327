use std::sync::Arc;

use chrono::Utc;
use mongodb::bson::{doc, from_document, to_document};

use crate::models::{Contact, ContactStatus, LinkRole, LinkedCompanyRef};
use crate::store::{parse_store_id, Collection, DocumentStore, StoreResult};

use super::{build_list_filter, build_sort, status_breakdown, ListPage, ListParams, Stats};

const SEARCH_FIELDS: [&str; 2] = ["personalInfo.fullName", "personalInfo.cpf"];
const LINKS_FIELD: &str = "linkedCompanies";

#[derive(Clone)]
pub struct ContactRepository {
    store: Arc<dyn DocumentStore>,
}

impl ContactRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Persists a new contact. Callers run the validation gate first; the
    /// repository owns the timestamps.
    pub async fn create(&self, mut contact: Contact) -> StoreResult<Contact> {
        contact.id = None;
        contact.created_at = Some(Utc::now());
        contact.updated_at = None;
        let doc = to_document(&contact)?;
        let stored = self.store.insert(Collection::Contacts, doc).await?;
        Ok(from_document(stored)?)
    }

    pub async fn list(&self, params: &ListParams) -> StoreResult<ListPage<Contact>> {
        let filter = build_list_filter(params, SEARCH_FIELDS);
        let sort = build_sort(params.sort_by.as_deref(), params.sort_order.as_deref());
        let (docs, total) = self
            .store
            .query(
                Collection::Contacts,
                filter,
                sort,
                params.skip(),
                params.limit(),
            )
            .await?;
        let items = docs
            .into_iter()
            .map(|doc| from_document(doc).map_err(Into::into))
            .collect::<StoreResult<Vec<Contact>>>()?;
        Ok(ListPage { items, total })
    }

    pub async fn get_by_id(&self, id: &str) -> StoreResult<Option<Contact>> {
        let found = self.store.find_by_id(Collection::Contacts, id).await?;
        found.map(|doc| from_document(doc).map_err(Into::into)).transpose()
    }

    pub async fn get_by_cpf(&self, cpf: &str) -> StoreResult<Option<Contact>> {
        let found = self
            .store
            .find_one(Collection::Contacts, doc! {"personalInfo.cpf": cpf})
            .await?;
        found.map(|doc| from_document(doc).map_err(Into::into)).transpose()
    }

    /// Full-document replace. The path id wins over any id in the payload;
    /// `createdAt` survives the replace and `updatedAt` moves to now.
    pub async fn update(&self, id: &str, mut contact: Contact) -> StoreResult<Option<Contact>> {
        let Some(existing) = self.get_by_id(id).await? else {
            return Ok(None);
        };
        contact.id = Some(id.to_string());
        contact.created_at = existing.created_at;
        contact.updated_at = Some(Utc::now());
        let doc = to_document(&contact)?;
        let replaced = self.store.replace(Collection::Contacts, id, doc).await?;
        replaced
            .map(|doc| from_document(doc).map_err(Into::into))
            .transpose()
    }

    pub async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.store.delete(Collection::Contacts, id).await
    }

    /// Adds a company reference to the contact's link set. Re-linking an
    /// already linked company leaves the existing entry untouched.
    pub async fn link(
        &self,
        contact_id: &str,
        company_id: &str,
        role: LinkRole,
    ) -> StoreResult<Option<Contact>> {
        if parse_store_id(company_id).is_none() {
            return Ok(None);
        }
        let element = to_document(&LinkedCompanyRef {
            company_id: company_id.to_string(),
            role,
            added_at: Utc::now(),
        })?;
        let updated = self
            .store
            .add_to_set(
                Collection::Contacts,
                contact_id,
                LINKS_FIELD,
                "companyId",
                element,
            )
            .await?;
        updated
            .map(|doc| from_document(doc).map_err(Into::into))
            .transpose()
    }

    /// Removes any link to `company_id` regardless of role. A never-linked
    /// pair is a no-op that still returns the contact.
    pub async fn unlink(&self, contact_id: &str, company_id: &str) -> StoreResult<Option<Contact>> {
        if parse_store_id(company_id).is_none() {
            return Ok(None);
        }
        let updated = self
            .store
            .pull_where(
                Collection::Contacts,
                contact_id,
                LINKS_FIELD,
                doc! {"companyId": company_id},
            )
            .await?;
        updated
            .map(|doc| from_document(doc).map_err(Into::into))
            .transpose()
    }

    /// Contacts linked to the given company, newest first. A derived view,
    /// recomputed per request.
    pub async fn linked_to_company(&self, company_id: &str) -> StoreResult<Vec<Contact>> {
        if parse_store_id(company_id).is_none() {
            return Ok(Vec::new());
        }
        let filter = doc! {"linkedCompanies.companyId": company_id};
        let (docs, _) = self
            .store
            .query(Collection::Contacts, filter, build_sort(None, None), 0, 100)
            .await?;
        docs.into_iter()
            .map(|doc| from_document(doc).map_err(Into::into))
            .collect()
    }

    pub async fn stats(&self) -> StoreResult<Stats> {
        let statuses: Vec<&str> = ContactStatus::ALL.iter().map(|s| s.as_str()).collect();
        status_breakdown(self.store.as_ref(), Collection::Contacts, &statuses).await
    }
}
