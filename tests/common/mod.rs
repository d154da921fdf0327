// Shared by every integration binary; not all of them use every helper.
#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{ensure, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use mongodb::bson::{oid::ObjectId, Bson, Document};
use serde::Serialize;
use tokio::sync::Mutex;
use tower::util::ServiceExt;

use crm_backend::auth::credentials::{CredentialRecord, StaticCredentialStore};
use crm_backend::auth::jwt::JwtService;
use crm_backend::auth::password::hash_password;
use crm_backend::config::AppConfig;
use crm_backend::routes;
use crm_backend::state::AppState;
use crm_backend::store::{
    from_store_document, parse_store_id, to_store_document, Collection, DocumentStore, StoreError,
    StoreResult,
};

pub const TEST_EMAIL: &str = "admin@crm.local";
pub const TEST_PASSWORD: &str = "integration-secret";

// Mirrors the unique sparse indexes the Mongo adapter creates at connect.
const UNIQUE_KEYS: &[(&str, &str)] = &[
    ("contacts", "personalInfo.cpf"),
    ("companies", "identification.cnpj"),
];

/// In-memory stand-in for the document store, covering exactly the filter
/// and update operators the repositories emit.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<&'static str, Vec<Document>>>,
}

impl MemoryStore {
    fn unique_violation(
        existing: &[Document],
        collection: Collection,
        candidate: &Document,
        skip_id: Option<ObjectId>,
    ) -> Option<String> {
        for (name, path) in UNIQUE_KEYS {
            if *name != collection.name() {
                continue;
            }
            let Some(value) = first_value(candidate, path) else {
                continue;
            };
            let clash = existing.iter().any(|doc| {
                if skip_id.is_some() && doc.get_object_id("_id").ok() == skip_id {
                    return false;
                }
                first_value(doc, path).as_ref() == Some(&value)
            });
            if clash {
                return Some(path.to_string());
            }
        }
        None
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: Collection, doc: Document) -> StoreResult<Document> {
        let mut guard = self.collections.lock().await;
        let docs = guard.entry(collection.name()).or_default();
        if let Some(path) = Self::unique_violation(docs, collection, &doc, None) {
            return Err(StoreError::DuplicateKey(path));
        }
        let stored = to_store_document(doc, ObjectId::new());
        docs.push(stored.clone());
        Ok(from_store_document(stored))
    }

    async fn find_by_id(&self, collection: Collection, id: &str) -> StoreResult<Option<Document>> {
        let Some(oid) = parse_store_id(id) else {
            return Ok(None);
        };
        let guard = self.collections.lock().await;
        let found = guard
            .get(collection.name())
            .and_then(|docs| docs.iter().find(|doc| has_id(doc, oid)).cloned());
        Ok(found.map(from_store_document))
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: Document,
    ) -> StoreResult<Option<Document>> {
        let guard = self.collections.lock().await;
        let found = guard
            .get(collection.name())
            .and_then(|docs| docs.iter().find(|doc| matches_filter(doc, &filter)).cloned());
        Ok(found.map(from_store_document))
    }

    async fn query(
        &self,
        collection: Collection,
        filter: Document,
        sort: Document,
        skip: u64,
        limit: i64,
    ) -> StoreResult<(Vec<Document>, u64)> {
        let guard = self.collections.lock().await;
        let mut matches: Vec<Document> = guard
            .get(collection.name())
            .map(|docs| {
                docs.iter()
                    .filter(|doc| matches_filter(doc, &filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let total = matches.len() as u64;

        if let Some((field, direction)) = sort.iter().next() {
            let descending = matches!(direction, Bson::Int32(d) if *d < 0)
                || matches!(direction, Bson::Int64(d) if *d < 0);
            matches.sort_by(|a, b| {
                let ordering = compare_values(
                    first_value(a, field).as_ref(),
                    first_value(b, field).as_ref(),
                );
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        let page: Vec<Document> = matches
            .into_iter()
            .skip(skip as usize)
            .take(limit.max(0) as usize)
            .map(from_store_document)
            .collect();
        Ok((page, total))
    }

    async fn replace(
        &self,
        collection: Collection,
        id: &str,
        doc: Document,
    ) -> StoreResult<Option<Document>> {
        let Some(oid) = parse_store_id(id) else {
            return Ok(None);
        };
        let mut guard = self.collections.lock().await;
        let docs = guard.entry(collection.name()).or_default();
        if let Some(path) = Self::unique_violation(docs, collection, &doc, Some(oid)) {
            return Err(StoreError::DuplicateKey(path));
        }
        let Some(slot) = docs.iter_mut().find(|doc| has_id(doc, oid)) else {
            return Ok(None);
        };
        *slot = to_store_document(doc, oid);
        Ok(Some(from_store_document(slot.clone())))
    }

    async fn delete(&self, collection: Collection, id: &str) -> StoreResult<bool> {
        let Some(oid) = parse_store_id(id) else {
            return Ok(false);
        };
        let mut guard = self.collections.lock().await;
        let docs = guard.entry(collection.name()).or_default();
        let before = docs.len();
        docs.retain(|doc| !has_id(doc, oid));
        Ok(docs.len() < before)
    }

    async fn add_to_set(
        &self,
        collection: Collection,
        id: &str,
        array_field: &str,
        key_field: &str,
        element: Document,
    ) -> StoreResult<Option<Document>> {
        let Some(oid) = parse_store_id(id) else {
            return Ok(None);
        };
        let key_value = element
            .get(key_field)
            .cloned()
            .ok_or_else(|| StoreError::Mapping(format!("element missing key field {key_field}")))?;

        let mut guard = self.collections.lock().await;
        let docs = guard.entry(collection.name()).or_default();
        let Some(slot) = docs.iter_mut().find(|doc| has_id(doc, oid)) else {
            return Ok(None);
        };

        if !matches!(slot.get(array_field), Some(Bson::Array(_))) {
            slot.insert(array_field, Bson::Array(Vec::new()));
        }
        if let Some(Bson::Array(entries)) = slot.get_mut(array_field) {
            let already_present = entries.iter().any(|entry| {
                entry
                    .as_document()
                    .and_then(|doc| doc.get(key_field))
                    .map(|value| value == &key_value)
                    .unwrap_or(false)
            });
            if !already_present {
                entries.push(Bson::Document(element));
            }
        }
        Ok(Some(from_store_document(slot.clone())))
    }

    async fn pull_where(
        &self,
        collection: Collection,
        id: &str,
        array_field: &str,
        predicate: Document,
    ) -> StoreResult<Option<Document>> {
        let Some(oid) = parse_store_id(id) else {
            return Ok(None);
        };
        let mut guard = self.collections.lock().await;
        let docs = guard.entry(collection.name()).or_default();
        let Some(slot) = docs.iter_mut().find(|doc| has_id(doc, oid)) else {
            return Ok(None);
        };
        if let Some(Bson::Array(entries)) = slot.get_mut(array_field) {
            entries.retain(|entry| {
                entry
                    .as_document()
                    .map(|doc| !matches_entry(doc, &predicate))
                    .unwrap_or(true)
            });
        }
        Ok(Some(from_store_document(slot.clone())))
    }
}

fn has_id(doc: &Document, oid: ObjectId) -> bool {
    doc.get_object_id("_id").ok() == Some(oid)
}

fn matches_entry(entry: &Document, predicate: &Document) -> bool {
    predicate
        .iter()
        .all(|(key, expected)| entry.get(key) == Some(expected))
}

fn matches_filter(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, condition)| match key.as_str() {
        "$and" => as_clauses(condition)
            .iter()
            .all(|clause| matches_filter(doc, clause)),
        "$or" => as_clauses(condition)
            .iter()
            .any(|clause| matches_filter(doc, clause)),
        path => {
            let values = resolve_path(doc, path);
            matches_condition(&values, condition)
        }
    })
}

fn as_clauses(condition: &Bson) -> Vec<Document> {
    match condition {
        Bson::Array(items) => items
            .iter()
            .filter_map(|item| item.as_document().cloned())
            .collect(),
        _ => Vec::new(),
    }
}

fn first_value(doc: &Document, path: &str) -> Option<Bson> {
    resolve_path(doc, path).into_iter().next()
}

/// Dotted-path lookup with the store's array semantics: an array along the
/// path matches if any element does.
fn resolve_path(doc: &Document, path: &str) -> Vec<Bson> {
    let mut values = Vec::new();
    let segments: Vec<&str> = path.split('.').collect();
    collect_values(&Bson::Document(doc.clone()), &segments, &mut values);
    values
}

fn collect_values(value: &Bson, segments: &[&str], out: &mut Vec<Bson>) {
    if segments.is_empty() {
        out.push(value.clone());
        return;
    }
    match value {
        Bson::Document(doc) => {
            if let Some(next) = doc.get(segments[0]) {
                collect_values(next, &segments[1..], out);
            }
        }
        Bson::Array(items) => {
            for item in items {
                collect_values(item, segments, out);
            }
        }
        _ => {}
    }
}

fn matches_condition(values: &[Bson], condition: &Bson) -> bool {
    match condition {
        Bson::Document(operators)
            if operators.keys().any(|key| key.starts_with('$')) =>
        {
            operators.iter().all(|(op, operand)| match op.as_str() {
                "$gte" => values.iter().any(|value| {
                    compare_values(Some(value), Some(operand)) != Ordering::Less
                }),
                "$lte" => values.iter().any(|value| {
                    compare_values(Some(value), Some(operand)) != Ordering::Greater
                }),
                "$ne" => values.iter().all(|value| value != operand),
                _ => false,
            })
        }
        Bson::RegularExpression(regex) => {
            // The repositories only emit escaped literal patterns with the
            // `i` option, so a case-insensitive substring check is exact.
            let needle = regex.pattern.replace('\\', "").to_lowercase();
            values.iter().any(|value| {
                value
                    .as_str()
                    .map(|text| text.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            })
        }
        expected => values.iter().any(|value| value == expected),
    }
}

fn compare_values(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match (as_f64(a), as_f64(b)) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => match (a.as_str(), b.as_str()) {
                (Some(a), Some(b)) => a.cmp(b),
                _ => Ordering::Equal,
            },
        },
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

pub struct TestApp {
    router: Router,
}

impl TestApp {
    pub fn new() -> Result<Self> {
        let config = AppConfig {
            mongodb_uri: "mongodb://localhost:27017".to_string(),
            mongodb_db: "crm-test".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret-at-least-16-bytes".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            jwt_expiry_hours: 24,
            jwt_refresh_grace_days: 7,
            seed_password: TEST_PASSWORD.to_string(),
            cors_allowed_origin: None,
        };

        let store = Arc::new(MemoryStore::default());
        let credentials = Arc::new(StaticCredentialStore::new(vec![CredentialRecord {
            id: "1".to_string(),
            email: TEST_EMAIL.to_string(),
            password_hash: hash_password(TEST_PASSWORD)?,
            role: "ADMIN".to_string(),
            name: "Administrator".to_string(),
        }]));
        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(store, config, credentials, jwt);
        let router = routes::create_router(state);

        Ok(Self { router })
    }

    pub async fn login_token(&self) -> Result<String> {
        #[derive(Serialize)]
        struct LoginPayload<'a> {
            email: &'a str,
            password: &'a str,
        }

        let response = self
            .post_json(
                "/api/auth/login",
                &LoginPayload {
                    email: TEST_EMAIL,
                    password: TEST_PASSWORD,
                },
                None,
            )
            .await?;
        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        let body = body_to_json(response).await?;
        Ok(body["token"].as_str().unwrap_or_default().to_string())
    }

    pub async fn oneshot(&self, request: Request<Body>) -> Result<Response> {
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        token: Option<&str>,
    ) -> Result<Response> {
        let mut builder = Request::builder().method(method).uri(path);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body.unwrap_or_default()))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<Response> {
        self.request(
            Method::POST,
            path,
            Some(serde_json::to_vec(payload)?),
            token,
        )
        .await
    }

    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<Response> {
        self.request(Method::PUT, path, Some(serde_json::to_vec(payload)?), token)
            .await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<Response> {
        self.request(Method::GET, path, None, token).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<Response> {
        self.request(Method::DELETE, path, None, token).await
    }
}

pub async fn body_to_json(response: Response) -> Result<serde_json::Value> {
    let bytes = response.into_body().collect().await?.to_bytes();
    Ok(serde_json::from_slice(&bytes)?)
}
