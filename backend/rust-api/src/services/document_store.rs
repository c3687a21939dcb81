use async_trait::async_trait;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::{Collection, Database};
use uuid::Uuid;

use crate::error::{Result, TriviaError};
use crate::metrics::track_db_operation;
use crate::models::{Direction, QuestionDocument, ViewRow};

/// Name of the view that orders questions by their random sort key.
pub const RANDOM_VIEW: &str = "randSearch";

/// Abstract document database holding the question documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn retrieve_by_id(&self, id: &str) -> Result<Option<QuestionDocument>>;

    /// Rows of `view` starting at `start_key` and walking in `direction`.
    async fn query_ordered(
        &self,
        view: &str,
        direction: Direction,
        start_key: f64,
    ) -> Result<Vec<ViewRow>>;

    /// Stores the answer counters of `document` if `revision` is still current and
    /// returns the new revision. Other fields are left as stored.
    async fn update_by_id(
        &self,
        id: &str,
        revision: &str,
        document: QuestionDocument,
    ) -> Result<String>;

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Revision reported for documents that were seeded without a `_rev`.
pub const BASE_REVISION: &str = "0-";

/// Revision tokens look like `<generation>-<random>`; the generation grows by one per write.
pub fn next_revision(current: &str) -> String {
    let generation = current
        .split('-')
        .next()
        .and_then(|prefix| prefix.parse::<u64>().ok())
        .unwrap_or(0);
    format!("{}-{}", generation + 1, Uuid::new_v4().simple())
}

pub struct MongoDocumentStore {
    database: Database,
    collection: Collection<Document>,
    collection_name: String,
}

impl MongoDocumentStore {
    pub fn new(database: Database, collection_name: &str) -> Self {
        Self {
            collection: database.collection::<Document>(collection_name),
            database,
            collection_name: collection_name.to_string(),
        }
    }

    fn sort_field(view: &str) -> Result<&'static str> {
        match view {
            RANDOM_VIEW => Ok("rand"),
            other => Err(TriviaError::Store(format!("Unknown view: {}", other))),
        }
    }
}

fn id_filter(id: &str) -> Bson {
    match ObjectId::parse_str(id) {
        Ok(object_id) => Bson::ObjectId(object_id),
        Err(_) => Bson::String(id.to_string()),
    }
}

fn to_question(mut document: Document) -> Result<QuestionDocument> {
    let id = match document.get("_id") {
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(Bson::String(value)) => value.clone(),
        _ => {
            return Err(TriviaError::Store(
                "Question has unsupported _id type".to_string(),
            ))
        }
    };
    document.insert("_id", id);
    if !document.contains_key("_rev") {
        document.insert("_rev", BASE_REVISION);
    }

    QuestionDocument::from_value(Bson::Document(document).into_relaxed_extjson())
        .ok_or_else(|| TriviaError::Store("Question document is not an object".to_string()))
}

fn revision_filter(id: &str, revision: &str) -> Document {
    if revision == BASE_REVISION {
        doc! { "_id": id_filter(id), "_rev": { "$exists": false } }
    } else {
        doc! { "_id": id_filter(id), "_rev": revision }
    }
}

/// Counters small enough for Int32 stay Int32, matching how they are usually seeded.
fn counter_value(count: u64) -> Bson {
    match i32::try_from(count) {
        Ok(small) => Bson::Int32(small),
        Err(_) => Bson::Int64(i64::try_from(count).unwrap_or(i64::MAX)),
    }
}

fn counter_update(id: &str, document: &QuestionDocument, new_revision: &str) -> Result<Document> {
    let (Some(times_attempted), Some(times_correct)) =
        (document.times_attempted(), document.times_correct())
    else {
        return Err(TriviaError::Validation(format!(
            "Question {} has no answer counters",
            id
        )));
    };

    Ok(doc! {
        "$set": {
            "timesAttempted": counter_value(times_attempted),
            "timesCorrect": counter_value(times_correct),
            "_rev": new_revision,
        }
    })
}

fn to_row(document: Document, sort_field: &str) -> Result<ViewRow> {
    let key = match document.get(sort_field) {
        Some(Bson::Double(value)) => *value,
        Some(Bson::Int32(value)) => f64::from(*value),
        Some(Bson::Int64(value)) => *value as f64,
        _ => {
            return Err(TriviaError::Store(format!(
                "Question is missing numeric {} key",
                sort_field
            )))
        }
    };
    let value = to_question(document)?;
    let id = value
        .id()
        .map(str::to_string)
        .ok_or_else(|| TriviaError::Store("Question has no _id".to_string()))?;

    Ok(ViewRow { id, key, value })
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn retrieve_by_id(&self, id: &str) -> Result<Option<QuestionDocument>> {
        let found = track_db_operation("find_one", &self.collection_name, async {
            self.collection.find_one(doc! { "_id": id_filter(id) }).await
        })
        .await
        .map_err(|e| {
            tracing::error!("Error reading document {} from database: {}", id, e);
            TriviaError::from(e)
        })?;

        found.map(to_question).transpose()
    }

    async fn query_ordered(
        &self,
        view: &str,
        direction: Direction,
        start_key: f64,
    ) -> Result<Vec<ViewRow>> {
        let field = Self::sort_field(view)?;
        let (filter, sort) = match direction {
            Direction::Ascending => (
                doc! { field: { "$gte": start_key } },
                doc! { field: 1, "_id": 1 },
            ),
            Direction::Descending => (
                doc! { field: { "$lte": start_key } },
                doc! { field: -1, "_id": -1 },
            ),
        };

        let documents = track_db_operation("find", &self.collection_name, async {
            let mut cursor = self.collection.find(filter).sort(sort).await?;
            let mut documents = Vec::new();
            while cursor.advance().await? {
                documents.push(cursor.deserialize_current()?);
            }
            Ok::<_, mongodb::error::Error>(documents)
        })
        .await
        .map_err(|e| {
            tracing::error!("Error reading documents from view {}: {}", view, e);
            TriviaError::from(e)
        })?;

        documents
            .into_iter()
            .map(|document| to_row(document, field))
            .collect()
    }

    async fn update_by_id(
        &self,
        id: &str,
        revision: &str,
        document: QuestionDocument,
    ) -> Result<String> {
        let new_revision = next_revision(revision);
        let update = counter_update(id, &document, &new_revision)?;

        let result = track_db_operation("update_one", &self.collection_name, async {
            self.collection
                .update_one(revision_filter(id, revision), update)
                .await
        })
        .await
        .map_err(|e| {
            tracing::error!("Error updating document {} in database: {}", id, e);
            TriviaError::from(e)
        })?;

        if result.matched_count == 0 {
            return match self.retrieve_by_id(id).await? {
                Some(_) => Err(TriviaError::Conflict(format!(
                    "Question {} no longer at revision {}",
                    id, revision
                ))),
                None => Err(TriviaError::NotFound(format!("Question {}", id))),
            };
        }

        Ok(new_revision)
    }

    async fn ping(&self) -> Result<()> {
        self.database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}
