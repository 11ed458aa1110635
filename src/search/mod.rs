//! Tantivy-based volunteer directory search.
//!
//! Indexes name, username and email with field boosting so that name hits
//! rank first.

use std::path::Path;
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, BoostQuery, Occur, QueryParser};
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::Volunteer;

const BOOST_NAME: f32 = 10.0;
const BOOST_USERNAME: f32 = 6.0;
const BOOST_EMAIL: f32 = 3.0;

/// A matching volunteer id with its relevance score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub volunteer_id: String,
    pub score: f32,
}

struct SearchFields {
    volunteer_id: Field,
    name: Field,
    username: Field,
    email: Field,
}

/// Full-text index over the volunteer directory.
pub struct VolunteerIndex {
    index: Index,
    reader: IndexReader,
    writer: Arc<RwLock<IndexWriter>>,
    fields: SearchFields,
}

impl VolunteerIndex {
    /// Create or open an index at the specified path.
    pub fn open(index_path: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(index_path)
            .map_err(|e| AppError::Search(format!("Failed to create index directory: {}", e)))?;

        let (schema, fields) = build_schema();
        let index = Index::open_in_dir(index_path)
            .or_else(|_| Index::create_in_dir(index_path, schema))
            .map_err(|e| AppError::Search(format!("Failed to open/create index: {}", e)))?;

        Self::with_index(index, fields)
    }

    /// An index that lives only as long as the process.
    pub fn in_memory() -> Result<Self, AppError> {
        let (schema, fields) = build_schema();
        Self::with_index(Index::create_in_ram(schema), fields)
    }

    fn with_index(index: Index, fields: SearchFields) -> Result<Self, AppError> {
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| AppError::Search(format!("Failed to create reader: {}", e)))?;

        let writer = index
            .writer_with_num_threads(1, 20_000_000)
            .map_err(|e| AppError::Search(format!("Failed to create writer: {}", e)))?;

        Ok(Self {
            index,
            reader,
            writer: Arc::new(RwLock::new(writer)),
            fields,
        })
    }

    /// Replace the whole index with the given volunteers.
    pub async fn rebuild(&self, volunteers: &[Volunteer]) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_all_documents()?;
        for volunteer in volunteers {
            writer.add_document(self.create_document(volunteer))?;
        }
        writer.commit()?;
        self.reader.reload()?;

        tracing::info!("Search index rebuilt with {} volunteers", volunteers.len());
        Ok(())
    }

    /// Add or refresh one volunteer.
    pub async fn index_volunteer(&self, volunteer: &Volunteer) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        let term = tantivy::Term::from_field_text(self.fields.volunteer_id, &volunteer.id);
        writer.delete_term(term);
        writer.add_document(self.create_document(volunteer))?;
        writer.commit()?;

        self.reader.reload()?;
        Ok(())
    }

    pub async fn remove_volunteer(&self, volunteer_id: &str) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        let term = tantivy::Term::from_field_text(self.fields.volunteer_id, volunteer_id);
        writer.delete_term(term);
        writer.commit()?;

        self.reader.reload()?;
        Ok(())
    }

    /// Search for volunteers matching the query, best match first.
    ///
    /// Malformed query syntax is parsed leniently instead of failing.
    pub fn search(&self, query_str: &str, limit: usize) -> Result<Vec<SearchResult>, AppError> {
        if query_str.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();

        let field_queries = [
            (self.fields.name, BOOST_NAME),
            (self.fields.username, BOOST_USERNAME),
            (self.fields.email, BOOST_EMAIL),
        ];
        let subqueries: Vec<(Occur, Box<dyn tantivy::query::Query>)> = field_queries
            .into_iter()
            .map(|(field, boost)| {
                let parser = QueryParser::for_index(&self.index, vec![field]);
                let (query, _errors) = parser.parse_query_lenient(query_str);
                let boosted: Box<dyn tantivy::query::Query> =
                    Box::new(BoostQuery::new(query, boost));
                (Occur::Should, boosted)
            })
            .collect();
        let combined_query = BooleanQuery::new(subqueries);

        let top_docs = searcher
            .search(&combined_query, &TopDocs::with_limit(limit))
            .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;

        let results = top_docs
            .into_iter()
            .filter_map(|(score, doc_address)| {
                let doc: TantivyDocument = searcher.doc(doc_address).ok()?;
                let volunteer_id = doc
                    .get_first(self.fields.volunteer_id)?
                    .as_str()?
                    .to_string();
                Some(SearchResult {
                    volunteer_id,
                    score,
                })
            })
            .collect();

        Ok(results)
    }

    fn create_document(&self, volunteer: &Volunteer) -> TantivyDocument {
        doc!(
            self.fields.volunteer_id => volunteer.id.clone(),
            self.fields.name => volunteer.name.clone(),
            self.fields.username => volunteer.username.clone(),
            self.fields.email => volunteer.email.clone()
        )
    }
}

fn build_schema() -> (Schema, SearchFields) {
    let mut schema_builder = Schema::builder();
    // STRING keeps the id untokenized so deletes by term hit it
    let volunteer_id = schema_builder.add_text_field("volunteer_id", STRING | STORED);
    let name = schema_builder.add_text_field("name", TEXT);
    let username = schema_builder.add_text_field("username", TEXT);
    let email = schema_builder.add_text_field("email", TEXT);
    let schema = schema_builder.build();

    (
        schema,
        SearchFields {
            volunteer_id,
            name,
            username,
            email,
        },
    )
}
