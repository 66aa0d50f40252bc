// src/sink/postgres.rs
//
// Postgres-backed `Sink`: a JSONB document store. Generalizes the
// teacher's `database/postgres.rs` (which persisted bug-bounty watchlist
// matches) into a bulk `(collection, document)` sink keyed by the
// certificate fingerprint, using the same connection-string cleanup and
// `sqlx::QueryBuilder` bulk-insert idiom.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, QueryBuilder};
use tracing::info;
use url::Url;

use crate::cert::CertificateRecord;

use super::Sink;

pub struct PostgresSink {
    pool: PgPool,
}

impl PostgresSink {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let cleaned = clean_connection_string(database_url);
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(&cleaned)
            .await
            .context("failed to connect to sink database")?;
        Ok(Self { pool })
    }

    /// Creates the document table if absent. Every collection this sink
    /// is asked to index into lands in the same table, namespaced by a
    /// `collection` column, keeping the schema static regardless of how
    /// many logical collections the caller uses.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                body JSONB NOT NULL,
                inserted_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (collection, fingerprint)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create documents table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS documents_inserted_at_idx ON documents (inserted_at)",
        )
        .execute(&self.pool)
        .await
        .context("failed to create documents index")?;

        info!("sink schema ready");
        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Sink for PostgresSink {
    async fn bulk_index(
        &self,
        collection: &str,
        records: &[CertificateRecord],
    ) -> Result<(usize, usize)> {
        if records.is_empty() {
            return Ok((0, 0));
        }

        let mut success = 0usize;
        let mut failed = 0usize;

        // sqlx's Postgres bind limit (65535 params / 3 per row) bounds how
        // many rows one statement can carry; chunk defensively.
        for chunk in records.chunks(1000) {
            let mut builder: QueryBuilder<sqlx::Postgres> =
                QueryBuilder::new("INSERT INTO documents (collection, fingerprint, body) ");
            builder.push_values(chunk, |mut row, record| {
                let body = serde_json::to_value(record).unwrap_or(serde_json::Value::Null);
                row.push_bind(collection)
                    .push_bind(record.fingerprint.clone())
                    .push_bind(body);
            });
            builder.push(
                " ON CONFLICT (collection, fingerprint) DO NOTHING",
            );

            match builder.build().execute(&self.pool).await {
                Ok(result) => {
                    success += result.rows_affected() as usize;
                    failed += chunk.len() - result.rows_affected() as usize;
                }
                Err(err) => {
                    return Err(err).context("bulk insert failed");
                }
            }
        }

        Ok((success, failed))
    }
}

/// Strips the `channel_binding` query parameter some managed Postgres
/// providers append, which older `sqlx`/`tokio-postgres` versions choke
/// on — mirrors the teacher's `clean_connection_string`, which parses with
/// `url::Url` rather than slicing the raw string.
fn clean_connection_string(database_url: &str) -> String {
    let Ok(mut parsed) = Url::parse(database_url) else {
        return database_url.to_string();
    };

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| key != "channel_binding")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed
            .query_pairs_mut()
            .clear()
            .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
    parsed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_connection_string_strips_channel_binding() {
        let url = "postgres://u:p@host/db?sslmode=require&channel_binding=require";
        assert_eq!(
            clean_connection_string(url),
            "postgres://u:p@host/db?sslmode=require"
        );
    }

    #[test]
    fn clean_connection_string_leaves_plain_url_untouched() {
        let url = "postgres://u:p@host/db";
        assert_eq!(clean_connection_string(url), url);
    }
}
