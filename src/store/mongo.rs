use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{
    ClientOptions, FindOneAndReplaceOptions, FindOneAndUpdateOptions, FindOptions, IndexOptions,
    ReturnDocument,
};
use mongodb::{Client, Database, IndexModel};

use super::{
    from_store_document, parse_store_id, to_store_document, Collection, DocumentStore, StoreError,
    StoreResult,
};

const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(10);

// Natural keys enforced by unique sparse indexes at connect time.
const UNIQUE_KEYS: &[(Collection, &str)] = &[
    (Collection::Contacts, "personalInfo.cpf"),
    (Collection::Companies, "identification.cnpj"),
];

pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, db_name: &str) -> StoreResult<Self> {
        let mut options = ClientOptions::parse(uri).await?;
        options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);
        let client = Client::with_options(options)?;
        let store = Self {
            db: client.database(db_name),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> StoreResult<()> {
        for (collection, field) in UNIQUE_KEYS {
            let mut keys = Document::new();
            keys.insert(*field, 1);
            let model = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().unique(true).sparse(true).build())
                .build();
            self.collection(*collection).create_index(model, None).await?;
        }
        Ok(())
    }

    fn collection(&self, collection: Collection) -> mongodb::Collection<Document> {
        self.db.collection::<Document>(collection.name())
    }
}

fn map_driver_error(err: mongodb::error::Error) -> StoreError {
    if let Some(field) = duplicate_key_field(&err) {
        return StoreError::DuplicateKey(field);
    }
    StoreError::Driver(err)
}

fn duplicate_key_field(err: &mongodb::error::Error) -> Option<String> {
    let message = match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == 11000 => {
            write.message.clone()
        }
        ErrorKind::Command(command) if command.code == 11000 => command.message.clone(),
        _ => return None,
    };
    let field = UNIQUE_KEYS
        .iter()
        .map(|(_, field)| *field)
        .find(|field| message.contains(field))
        .unwrap_or("natural key");
    Some(field.to_string())
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn insert(&self, collection: Collection, doc: Document) -> StoreResult<Document> {
        let id = ObjectId::new();
        let stored = to_store_document(doc, id);
        self.collection(collection)
            .insert_one(stored.clone(), None)
            .await
            .map_err(map_driver_error)?;
        Ok(from_store_document(stored))
    }

    async fn find_by_id(&self, collection: Collection, id: &str) -> StoreResult<Option<Document>> {
        let Some(oid) = parse_store_id(id) else {
            return Ok(None);
        };
        let found = self
            .collection(collection)
            .find_one(doc! {"_id": oid}, None)
            .await?;
        Ok(found.map(from_store_document))
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: Document,
    ) -> StoreResult<Option<Document>> {
        let found = self.collection(collection).find_one(filter, None).await?;
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
        let handle = self.collection(collection);
        let total = handle.count_documents(filter.clone(), None).await?;
        let options = FindOptions::builder()
            .sort(sort)
            .skip(skip)
            .limit(limit)
            .build();
        let items: Vec<Document> = handle.find(filter, options).await?.try_collect().await?;
        Ok((items.into_iter().map(from_store_document).collect(), total))
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
        let replacement = to_store_document(doc, oid);
        let options = FindOneAndReplaceOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let replaced = self
            .collection(collection)
            .find_one_and_replace(doc! {"_id": oid}, replacement, options)
            .await
            .map_err(map_driver_error)?;
        Ok(replaced.map(from_store_document))
    }

    async fn delete(&self, collection: Collection, id: &str) -> StoreResult<bool> {
        let Some(oid) = parse_store_id(id) else {
            return Ok(false);
        };
        let result = self
            .collection(collection)
            .delete_one(doc! {"_id": oid}, None)
            .await?;
        Ok(result.deleted_count > 0)
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

        // Guarded push: matches only while no entry carries the same key, so
        // a concurrent or repeated add cannot produce duplicates.
        let mut guard = Document::new();
        guard.insert("_id", oid);
        guard.insert(format!("{array_field}.{key_field}"), doc! {"$ne": key_value});

        let mut push = Document::new();
        push.insert(array_field, element);
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let pushed = self
            .collection(collection)
            .find_one_and_update(guard, doc! {"$push": push}, options)
            .await?;

        match pushed {
            Some(updated) => Ok(Some(from_store_document(updated))),
            // Either the document is missing or the entry already exists;
            // a plain lookup distinguishes the two.
            None => self.find_by_id(collection, id).await,
        }
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
        let mut pull = Document::new();
        pull.insert(array_field, predicate);
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let updated = self
            .collection(collection)
            .find_one_and_update(doc! {"_id": oid}, doc! {"$pull": pull}, options)
            .await?;
        Ok(updated.map(from_store_document))
    }
}
