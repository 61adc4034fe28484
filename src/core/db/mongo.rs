/// MongoDB Adapter
///
/// Wraps the official async driver. Records cross the boundary as relaxed
/// extended JSON, so ObjectIds read back as `{"$oid": "..."}` and can be
/// written the same way.

use super::schema::{FieldSampler, IndexSchema, SchemaReport, SAMPLE_SIZE};
use super::{DatabaseAdapter, RecordId};
use crate::config::MongoConfig;
use crate::core::record::validate_collection_name;
use crate::core::{Backend, PolydbError, Record, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::{Client, Collection, Database, IndexModel};
use serde_json::Value;
use tracing::debug;

/// Collection seeded when a new database is created, since MongoDB only
/// materializes a database once it holds data.
pub const INITIAL_COLLECTION: &str = "initialCollection";

pub struct MongoAdapter {
    client: Client,
    db: Database,
}

impl MongoAdapter {
    pub async fn connect(config: &MongoConfig, database: &str) -> Result<Self> {
        let name = database.trim();
        if name.is_empty() {
            return Err(PolydbError::Config("no MongoDB database selected".to_string()));
        }
        debug!("Connecting to MongoDB database {}", name);
        let client = Client::with_uri_str(&config.uri).await?;
        let db = client.database(name);
        Ok(MongoAdapter { client, db })
    }

    /// Creates a database by writing a marker document into it.
    pub async fn create_database(config: &MongoConfig, name: &str) -> Result<()> {
        let adapter = MongoAdapter::connect(config, name).await?;
        adapter
            .db
            .collection::<Document>(INITIAL_COLLECTION)
            .insert_one(doc! { "init": true })
            .await?;
        adapter.client.shutdown().await;
        Ok(())
    }

    fn collection(&self, name: &str) -> Result<Collection<Document>> {
        Ok(self.db.collection::<Document>(validate_collection_name(name)?))
    }

    async fn require_collection(&self, name: &str) -> Result<Collection<Document>> {
        let collection = self.collection(name)?;
        let names = self.db.list_collection_names().await?;
        if !names.iter().any(|n| n == name) {
            return Err(PolydbError::NotFound {
                noun: "collection",
                name: name.to_string(),
            });
        }
        Ok(collection)
    }
}

#[async_trait]
impl DatabaseAdapter for MongoAdapter {
    fn backend(&self) -> Backend {
        Backend::Mongodb
    }

    async fn list_collections(&mut self) -> Result<Vec<String>> {
        let mut names = self.db.list_collection_names().await?;
        names.sort();
        Ok(names)
    }

    async fn create_collection(&mut self, name: &str, _definition: &str) -> Result<()> {
        let name = validate_collection_name(name)?;
        self.db.create_collection(name).await?;
        Ok(())
    }

    async fn insert(&mut self, collection: &str, record: &Record) -> Result<()> {
        let document = to_document(record)?;
        self.collection(collection)?.insert_one(document).await?;
        Ok(())
    }

    async fn insert_many(&mut self, collection: &str, records: &[Record]) -> Result<u64> {
        let collection = self.collection(collection)?;
        if records.is_empty() {
            return Ok(0);
        }
        let documents = records.iter().map(to_document).collect::<Result<Vec<_>>>()?;
        let result = collection.insert_many(documents).await?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn find_all(&mut self, collection: &str) -> Result<Vec<Record>> {
        let cursor = self.collection(collection)?.find(doc! {}).await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        documents.into_iter().map(to_record).collect()
    }

    async fn update(&mut self, collection: &str, id: &str, changes: &Record) -> Result<u64> {
        let mut set = to_document(changes)?;
        set.remove("_id");
        if set.is_empty() {
            return Err(PolydbError::InvalidRecord("no fields to update".to_string()));
        }
        let result = self
            .collection(collection)?
            .update_one(id_filter(id), doc! { "$set": set })
            .await?;
        Ok(result.matched_count)
    }

    async fn delete(&mut self, collection: &str, id: &str) -> Result<u64> {
        let result = self.collection(collection)?.delete_one(id_filter(id)).await?;
        Ok(result.deleted_count)
    }

    async fn describe(&mut self, collection: &str) -> Result<SchemaReport> {
        let coll = self.require_collection(collection).await?;

        let cursor = coll.find(doc! {}).limit(SAMPLE_SIZE).await?;
        let sample: Vec<Document> = cursor.try_collect().await?;
        if sample.is_empty() {
            return Err(PolydbError::EmptyCollection(collection.to_string()));
        }

        let mut sampler = FieldSampler::new();
        for document in &sample {
            sampler.observe(document.iter().map(|(k, v)| (k.as_str(), bson_type_name(v))));
        }
        let sampled = sampler.documents();

        let models: Vec<IndexModel> = coll.list_indexes().await?.try_collect().await?;
        let indexes = models.iter().map(index_schema).collect();

        Ok(SchemaReport {
            collection: collection.to_string(),
            backend: Backend::Mongodb,
            fields: sampler.finish("_id"),
            indexes,
            sampled_documents: Some(sampled),
        })
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.client.shutdown().await;
        Ok(())
    }
}

/// Converts a record to a BSON document, honoring extended JSON wrappers.
pub(crate) fn to_document(record: &Record) -> Result<Document> {
    match Bson::try_from(Value::Object(record.clone())) {
        Ok(Bson::Document(document)) => Ok(document),
        Ok(other) => Err(PolydbError::Conversion(format!(
            "record must be a document, got {:?}",
            other.element_type()
        ))),
        Err(e) => Err(PolydbError::Conversion(e.to_string())),
    }
}

/// Converts a BSON document to a record in relaxed extended JSON.
pub(crate) fn to_record(document: Document) -> Result<Record> {
    match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(map) => Ok(map),
        other => Err(PolydbError::Conversion(format!("expected an object, got {}", other))),
    }
}

/// Matches `_id` against every form the typed identifier could take.
pub(crate) fn id_filter(id: &str) -> Document {
    let id = id.trim();
    let mut candidates: Vec<Bson> = Vec::new();
    if let Ok(oid) = ObjectId::parse_str(id) {
        candidates.push(Bson::ObjectId(oid));
    }
    candidates.push(Bson::String(id.to_string()));
    if let RecordId::Integer(n) = RecordId::parse(id) {
        if let Ok(small) = i32::try_from(n) {
            candidates.push(Bson::Int32(small));
        }
        candidates.push(Bson::Int64(n));
    }
    doc! { "_id": { "$in": candidates } }
}

/// MongoDB's `$type` alias for a value; `None` for null.
pub(crate) fn bson_type_name(value: &Bson) -> Option<&'static str> {
    let name = match value {
        Bson::Null | Bson::Undefined => return None,
        Bson::Double(_) => "double",
        Bson::String(_) => "string",
        Bson::Document(_) => "object",
        Bson::Array(_) => "array",
        Bson::Binary(_) => "binData",
        Bson::ObjectId(_) => "objectId",
        Bson::Boolean(_) => "bool",
        Bson::DateTime(_) => "date",
        Bson::RegularExpression(_) => "regex",
        Bson::JavaScriptCode(_) | Bson::JavaScriptCodeWithScope(_) => "javascript",
        Bson::Int32(_) => "int",
        Bson::Int64(_) => "long",
        Bson::Timestamp(_) => "timestamp",
        Bson::Decimal128(_) => "decimal",
        _ => "unknown",
    };
    Some(name)
}

fn index_schema(model: &IndexModel) -> IndexSchema {
    let options = model.options.as_ref();
    let columns: Vec<String> = model.keys.keys().cloned().collect();
    IndexSchema {
        name: options
            .and_then(|o| o.name.clone())
            .unwrap_or_else(|| columns.join("_")),
        unique: options.and_then(|o| o.unique).unwrap_or(false),
        columns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::parse_record;
    use mongodb::options::IndexOptions;
    use serde_json::json;

    #[test]
    fn test_to_document_plain_values() {
        let record = parse_record(r#"{"name": "Alice", "age": 30, "tags": ["a", "b"]}"#).unwrap();
        let document = to_document(&record).unwrap();
        assert_eq!(document.get_str("name").unwrap(), "Alice");
        assert!(matches!(document.get("age"), Some(Bson::Int32(30)) | Some(Bson::Int64(30))));
        assert_eq!(document.get_array("tags").unwrap().len(), 2);
    }

    #[test]
    fn test_to_document_extended_json_oid() {
        let record = parse_record(r#"{"_id": {"$oid": "64b7f0c2a1e4b5c6d7e8f901"}, "n": 1}"#).unwrap();
        let document = to_document(&record).unwrap();
        assert!(matches!(document.get("_id"), Some(Bson::ObjectId(_))));
    }

    #[test]
    fn test_to_record_relaxed() {
        let oid = ObjectId::parse_str("64b7f0c2a1e4b5c6d7e8f901").unwrap();
        let record = to_record(doc! { "_id": oid, "count": 3_i64, "ok": true }).unwrap();
        assert_eq!(record["_id"], json!({"$oid": "64b7f0c2a1e4b5c6d7e8f901"}));
        assert_eq!(record["count"], json!(3));
        assert_eq!(record["ok"], json!(true));
    }

    #[test]
    fn test_id_filter_candidates() {
        let filter = id_filter("64b7f0c2a1e4b5c6d7e8f901");
        let candidates = filter.get_document("_id").unwrap().get_array("$in").unwrap();
        assert_eq!(candidates.len(), 2);
        assert!(matches!(candidates[0], Bson::ObjectId(_)));

        let filter = id_filter("42");
        let candidates = filter.get_document("_id").unwrap().get_array("$in").unwrap();
        assert_eq!(
            candidates,
            &vec![Bson::String("42".to_string()), Bson::Int32(42), Bson::Int64(42)]
        );

        let filter = id_filter("alice");
        let candidates = filter.get_document("_id").unwrap().get_array("$in").unwrap();
        assert_eq!(candidates, &vec![Bson::String("alice".to_string())]);
    }

    #[test]
    fn test_bson_type_names() {
        assert_eq!(bson_type_name(&Bson::Null), None);
        assert_eq!(bson_type_name(&Bson::Int32(1)), Some("int"));
        assert_eq!(bson_type_name(&Bson::String("x".into())), Some("string"));
        assert_eq!(bson_type_name(&Bson::Document(doc! {})), Some("object"));
        assert_eq!(bson_type_name(&Bson::ObjectId(ObjectId::new())), Some("objectId"));
    }

    #[test]
    fn test_index_schema() {
        let model = IndexModel::builder()
            .keys(doc! { "email": 1, "created": -1 })
            .options(IndexOptions::builder().name("email_created".to_string()).unique(true).build())
            .build();
        let index = index_schema(&model);
        assert_eq!(index.name, "email_created");
        assert_eq!(index.columns, vec!["email", "created"]);
        assert!(index.unique);

        let unnamed = IndexModel::builder().keys(doc! { "_id": 1 }).build();
        let index = index_schema(&unnamed);
        assert_eq!(index.name, "_id");
        assert!(!index.unique);
    }
}
