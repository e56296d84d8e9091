mod seed;

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use helpdesk_core::config::is_valid_table_name;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use thiserror::Error;

pub use seed::{import_articles, load_seed_file};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub question: String,
    #[serde(default)]
    pub answer: Option<String>,
}

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("knowledge table {0} does not exist")]
    UnknownTable(String),
    #[error("invalid knowledge table name {0:?}")]
    InvalidTableName(String),
    #[error("knowledge query failed: {0}")]
    Query(#[from] sqlx::Error),
}

/// Result of a point read. `EmptyArticle` means the key exists but carries no
/// answer.
#[derive(Debug)]
pub enum LookupOutcome {
    Answer(String),
    EmptyArticle,
    NotFound,
    Failed(KnowledgeError),
}

pub trait KnowledgeStore: Send + Sync {
    async fn lookup(&self, table: &str, question: &str) -> LookupOutcome;
}

pub trait KnowledgeAdmin: Send + Sync {
    async fn ensure_table(&self, table: &str) -> Result<()>;
    async fn put_article(&self, table: &str, article: Article) -> Result<()>;
    async fn list_articles(&self, table: &str) -> Result<Vec<Article>>;
}

#[derive(Clone, Default)]
pub struct MemoryKnowledgeStore {
    tables: Arc<RwLock<HashMap<String, BTreeMap<String, Option<String>>>>>,
}

impl MemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_articles(table: &str, articles: impl IntoIterator<Item = Article>) -> Self {
        let store = Self::new();
        {
            let mut tables = store.tables.write();
            let entries = tables.entry(table.to_string()).or_default();
            for article in articles {
                entries.insert(article.question, article.answer);
            }
        }
        store
    }
}

impl KnowledgeStore for MemoryKnowledgeStore {
    async fn lookup(&self, table: &str, question: &str) -> LookupOutcome {
        let tables = self.tables.read();
        let Some(entries) = tables.get(table) else {
            return LookupOutcome::Failed(KnowledgeError::UnknownTable(table.to_string()));
        };

        match entries.get(question) {
            Some(Some(answer)) => LookupOutcome::Answer(answer.clone()),
            Some(None) => LookupOutcome::EmptyArticle,
            None => LookupOutcome::NotFound,
        }
    }
}

impl KnowledgeAdmin for MemoryKnowledgeStore {
    async fn ensure_table(&self, table: &str) -> Result<()> {
        self.tables.write().entry(table.to_string()).or_default();
        Ok(())
    }

    async fn put_article(&self, table: &str, article: Article) -> Result<()> {
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .insert(article.question, article.answer);
        Ok(())
    }

    async fn list_articles(&self, table: &str) -> Result<Vec<Article>> {
        let tables = self.tables.read();
        let entries = tables
            .get(table)
            .ok_or_else(|| KnowledgeError::UnknownTable(table.to_string()))?;

        Ok(entries
            .iter()
            .map(|(question, answer)| Article {
                question: question.clone(),
                answer: answer.clone(),
            })
            .collect())
    }
}

#[derive(Clone)]
pub struct SqliteKnowledgeStore {
    pool: SqlitePool,
}

impl SqliteKnowledgeStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid sqlite url {}", database_url))?
            .create_if_missing(true);

        // every connection to an in-memory database is a separate database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("failed connecting to sqlite at {}", database_url))?;

        Ok(Self { pool })
    }

    async fn fetch_answer(
        &self,
        table: &str,
        question: &str,
    ) -> Result<Option<Option<String>>, KnowledgeError> {
        let table = quoted_table(table)?;
        let row = sqlx::query(&format!(
            "SELECT answer FROM {table} WHERE question = ?1"
        ))
        .bind(question)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row.try_get::<Option<String>, _>("answer")?)),
            None => Ok(None),
        }
    }
}

impl KnowledgeStore for SqliteKnowledgeStore {
    async fn lookup(&self, table: &str, question: &str) -> LookupOutcome {
        match self.fetch_answer(table, question).await {
            Ok(Some(Some(answer))) => LookupOutcome::Answer(answer),
            Ok(Some(None)) => LookupOutcome::EmptyArticle,
            Ok(None) => LookupOutcome::NotFound,
            Err(error) => LookupOutcome::Failed(error),
        }
    }
}

impl KnowledgeAdmin for SqliteKnowledgeStore {
    async fn ensure_table(&self, table: &str) -> Result<()> {
        let table = quoted_table(table)?;
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
              question TEXT PRIMARY KEY,
              answer TEXT
            );
            "#
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn put_article(&self, table: &str, article: Article) -> Result<()> {
        let table = quoted_table(table)?;
        sqlx::query(&format!(
            r#"
            INSERT INTO {table} (question, answer)
            VALUES (?1, ?2)
            ON CONFLICT(question) DO UPDATE SET
              answer=excluded.answer
            "#
        ))
        .bind(&article.question)
        .bind(&article.answer)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_articles(&self, table: &str) -> Result<Vec<Article>> {
        let table = quoted_table(table)?;
        let rows = sqlx::query(&format!(
            "SELECT question, answer FROM {table} ORDER BY question"
        ))
        .fetch_all(&self.pool)
        .await?;

        let articles = rows
            .into_iter()
            .map(|row| Article {
                question: row.get("question"),
                answer: row.get("answer"),
            })
            .collect();

        Ok(articles)
    }
}

/// Table names come from configuration, so they are checked before being
/// spliced into SQL.
fn quoted_table(table: &str) -> Result<String, KnowledgeError> {
    if !is_valid_table_name(table) {
        return Err(KnowledgeError::InvalidTableName(table.to_string()));
    }
    Ok(format!("\"{}\"", table))
}

#[derive(Clone)]
pub enum KnowledgeBase {
    Memory(MemoryKnowledgeStore),
    Sqlite(SqliteKnowledgeStore),
}

impl KnowledgeBase {
    pub fn memory() -> Self {
        Self::Memory(MemoryKnowledgeStore::new())
    }

    pub async fn sqlite(database_url: &str) -> Result<Self> {
        let sqlite = SqliteKnowledgeStore::connect(database_url).await?;
        Ok(Self::Sqlite(sqlite))
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            KnowledgeBase::Memory(_) => "memory",
            KnowledgeBase::Sqlite(_) => "sqlite",
        }
    }
}

impl KnowledgeStore for KnowledgeBase {
    async fn lookup(&self, table: &str, question: &str) -> LookupOutcome {
        match self {
            KnowledgeBase::Memory(store) => store.lookup(table, question).await,
            KnowledgeBase::Sqlite(store) => store.lookup(table, question).await,
        }
    }
}

impl KnowledgeAdmin for KnowledgeBase {
    async fn ensure_table(&self, table: &str) -> Result<()> {
        match self {
            KnowledgeBase::Memory(store) => store.ensure_table(table).await,
            KnowledgeBase::Sqlite(store) => store.ensure_table(table).await,
        }
    }

    async fn put_article(&self, table: &str, article: Article) -> Result<()> {
        match self {
            KnowledgeBase::Memory(store) => store.put_article(table, article).await,
            KnowledgeBase::Sqlite(store) => store.put_article(table, article).await,
        }
    }

    async fn list_articles(&self, table: &str) -> Result<Vec<Article>> {
        match self {
            KnowledgeBase::Memory(store) => store.list_articles(table).await,
            KnowledgeBase::Sqlite(store) => store.list_articles(table).await,
        }
    }
}
