use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::{Article, KnowledgeAdmin};

/// Reads a JSON array of `{ "question": ..., "answer": ... }` objects.
pub fn load_seed_file(path: impl AsRef<Path>) -> Result<Vec<Article>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed reading seed file {}", path.display()))?;
    let articles: Vec<Article> = serde_json::from_str(&raw)
        .with_context(|| format!("seed file {} is not a list of articles", path.display()))?;
    Ok(articles)
}

pub async fn import_articles<S>(store: &S, table: &str, articles: Vec<Article>) -> Result<usize>
where
    S: KnowledgeAdmin,
{
    store.ensure_table(table).await?;

    let mut imported = 0_usize;
    for article in articles {
        if article.question.trim().is_empty() {
            continue;
        }
        store.put_article(table, article).await?;
        imported += 1;
    }

    info!(table = %table, imported, "knowledge articles imported");
    Ok(imported)
}
