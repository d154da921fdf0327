//! Translation of domain query parameters into store-level filter and sort
//! expressions, shared by both entity repositories.

pub mod companies;
pub mod contacts;

use std::collections::BTreeMap;

use mongodb::bson::{doc, Bson, Document, Regex};
use serde::Serialize;

use crate::store::{Collection, DocumentStore, StoreResult};

pub use companies::CompanyRepository;
pub use contacts::ContactRepository;

pub const DEFAULT_SORT_FIELD: &str = "createdAt";

/// Domain-level listing parameters. Absent filters impose no constraint.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub page: u64,
    pub limit: i64,
    pub status: Option<String>,
    pub risk_level: Option<String>,
    pub kyc_score_min: Option<i32>,
    pub kyc_score_max: Option<i32>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl ListParams {
    // Page and limit are clamped to 1; no upper bound is imposed.
    pub fn page(&self) -> u64 {
        self.page.max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.max(1)
    }

    pub fn skip(&self) -> u64 {
        (self.page() - 1) * self.limit() as u64
    }
}

#[derive(Debug)]
pub struct ListPage<T> {
    pub items: Vec<T>,
    pub total: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
}

/// ANDs every present filter; free-text search is a case-insensitive literal
/// substring match ORed across `search_fields`.
fn build_list_filter(params: &ListParams, search_fields: [&str; 2]) -> Document {
    let mut clauses: Vec<Document> = Vec::new();

    if let Some(status) = non_blank(params.status.as_deref()) {
        clauses.push(field_filter("profile.status", Bson::from(status)));
    }
    if let Some(risk_level) = non_blank(params.risk_level.as_deref()) {
        clauses.push(field_filter("profile.riskLevel", Bson::from(risk_level)));
    }
    if let Some(min) = params.kyc_score_min {
        clauses.push(field_filter("profile.kycScore", doc! {"$gte": min}.into()));
    }
    if let Some(max) = params.kyc_score_max {
        clauses.push(field_filter("profile.kycScore", doc! {"$lte": max}.into()));
    }
    if let Some(search) = non_blank(params.search.as_deref()) {
        let regex = Bson::RegularExpression(Regex {
            pattern: regex_escape(search),
            options: "i".to_string(),
        });
        let alternatives: Vec<Document> = search_fields
            .iter()
            .map(|field| field_filter(field, regex.clone()))
            .collect();
        clauses.push(doc! {"$or": alternatives});
    }

    if clauses.is_empty() {
        Document::new()
    } else {
        doc! {"$and": clauses}
    }
}

/// `asc` (case-insensitive) sorts ascending; anything else, including an
/// absent value, sorts descending.
fn build_sort(sort_by: Option<&str>, sort_order: Option<&str>) -> Document {
    let field = non_blank(sort_by).unwrap_or(DEFAULT_SORT_FIELD);
    let direction = match sort_order {
        Some(order) if order.eq_ignore_ascii_case("asc") => 1,
        _ => -1,
    };
    let mut sort = Document::new();
    sort.insert(field, direction);
    sort
}

fn field_filter(field: &str, condition: Bson) -> Document {
    let mut filter = Document::new();
    filter.insert(field, condition);
    filter
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn regex_escape(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(
            ch,
            '.' | '^' | '$' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '\\'
        ) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Per-status counts through count-only queries, plus an `unknown` bucket
/// for documents outside the known set.
async fn status_breakdown(
    store: &dyn DocumentStore,
    collection: Collection,
    statuses: &[&str],
) -> StoreResult<Stats> {
    let sort = build_sort(None, None);
    let (_, total) = store
        .query(collection, Document::new(), sort.clone(), 0, 1)
        .await?;

    let mut by_status = BTreeMap::new();
    let mut counted = 0;
    for status in statuses {
        let filter = field_filter("profile.status", Bson::from(*status));
        let (_, count) = store.query(collection, filter, sort.clone(), 0, 1).await?;
        if count > 0 {
            by_status.insert(status.to_string(), count);
        }
        counted += count;
    }
    if total > counted {
        by_status.insert("unknown".to_string(), total - counted);
    }

    Ok(Stats { total, by_status })
}
