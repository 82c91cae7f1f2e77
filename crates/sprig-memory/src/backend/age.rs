//! PostgreSQL + Apache AGE backend over sqlx.

use async_trait::async_trait;
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgPool, PgPoolOptions, PgTypeInfo};
use sqlx::{Encode, Postgres, Row, Transaction, Type};
use tracing::debug;

use super::GraphBackend;
use crate::error::Result;
use crate::query::Statement;

/// Default pool size; every statement holds a connection for one transaction.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Graph backend talking to PostgreSQL with the AGE extension.
#[derive(Debug, Clone)]
pub struct AgeBackend {
    pool: PgPool,
}

impl AgeBackend {
    /// Connect a new pool to `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect(database_url)
            .await?;
        debug!("Connected AGE backend pool");
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("LOAD 'age'").execute(&mut *tx).await?;
        sqlx::query(r#"SET search_path = ag_catalog, "$user", public"#)
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }
}

#[async_trait]
impl GraphBackend for AgeBackend {
    async fn graph_exists(&self, graph: &str) -> Result<bool> {
        let mut tx = self.begin().await?;
        let count: i64 =
            sqlx::query_scalar("SELECT count(*) FROM ag_catalog.ag_graph WHERE name = $1::name")
                .bind(graph)
                .fetch_one(&mut *tx)
                .await?;
        tx.commit().await?;
        Ok(count > 0)
    }

    async fn create_graph(&self, graph: &str) -> Result<()> {
        let mut tx = self.begin().await?;
        sqlx::query("SELECT create_graph($1::name)")
            .bind(graph)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn cypher(&self, graph: &str, statement: &Statement) -> Result<Vec<String>> {
        let sql = cypher_sql(graph, statement.cypher());
        let params = AgtypeParam(serde_json::to_string(&statement.params)?);

        let mut tx = self.begin().await?;
        let rows = sqlx::query(&sql).bind(params).fetch_all(&mut *tx).await?;
        tx.commit().await?;

        let mut values = Vec::with_capacity(rows.len());
        for row in &rows {
            let value: Option<String> = row.try_get(0)?;
            values.push(value.unwrap_or_else(|| "null".to_string()));
        }
        Ok(values)
    }

    fn name(&self) -> &str {
        "age"
    }
}

/// Build the SQL wrapper around a Cypher body.
///
/// Only the validated graph name is substituted; the body is dollar-quoted and
/// all values arrive through `$1`.
fn cypher_sql(graph: &str, cypher: &str) -> String {
    format!(
        "SELECT result::text FROM cypher('{}', {}, $1) AS (result agtype)",
        graph,
        dollar_quote(cypher)
    )
}

/// Dollar-quote `body` with a tag that does not occur inside it.
fn dollar_quote(body: &str) -> String {
    let mut tag = "$q$".to_string();
    let mut counter = 0;
    while body.contains(&tag) {
        counter += 1;
        tag = format!("$q{}$", counter);
    }
    format!("{tag}{body}{tag}")
}

/// JSON parameter map bound as an `agtype` value.
struct AgtypeParam(String);

impl Type<Postgres> for AgtypeParam {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("agtype")
    }
}

impl Encode<'_, Postgres> for AgtypeParam {
    fn encode_by_ref(
        &self,
        buf: &mut PgArgumentBuffer,
    ) -> std::result::Result<IsNull, BoxDynError> {
        // Binary agtype: format version byte followed by the JSON text.
        buf.push(1);
        buf.extend_from_slice(self.0.as_bytes());
        Ok(IsNull::No)
    }
}
