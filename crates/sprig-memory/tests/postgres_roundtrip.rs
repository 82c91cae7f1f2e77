//! Round trip against a live PostgreSQL + AGE database.
//!
//! Skipped unless `SPRIG_TEST_DATABASE_URL` points at a database with the
//! `age` extension installed. Each run works in a fresh graph and drops it
//! afterwards.

use std::sync::Arc;

use serial_test::serial;
use sprig_llm::LocalEmbedder;
use sprig_memory::{
    AgeBackend, ClusterInsert, GraphStore, NodeLabel, QueryExecutor, RelationType,
    RetrievalEngine,
};
use sqlx::postgres::PgPoolOptions;

const DATABASE_URL_VAR: &str = "SPRIG_TEST_DATABASE_URL";

async fn drop_graph(pool: &sqlx::PgPool, graph: &str) {
    let Ok(mut conn) = pool.acquire().await else {
        return;
    };
    let _ = sqlx::query("LOAD 'age'").execute(&mut *conn).await;
    let _ = sqlx::query(r#"SET search_path = ag_catalog, "$user", public"#)
        .execute(&mut *conn)
        .await;
    let _ = sqlx::query("SELECT drop_graph($1::name, true)")
        .bind(graph)
        .execute(&mut *conn)
        .await;
}

#[tokio::test]
#[serial]
async fn test_age_roundtrip() {
    let Ok(url) = std::env::var(DATABASE_URL_VAR) else {
        eprintln!("{DATABASE_URL_VAR} not set; skipping");
        return;
    };

    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .unwrap();
    let graph = format!("sprig_test_{}", uuid::Uuid::new_v4().simple());
    let backend = Arc::new(AgeBackend::from_pool(pool.clone()));
    let store = Arc::new(GraphStore::new(QueryExecutor::new(backend), graph.clone()));

    store.ensure_graph().await.unwrap();
    store.ensure_graph().await.unwrap();

    let embedder = LocalEmbedder::default();
    let inserted = store
        .insert_cluster_topic_detail(
            ClusterInsert::new("testing", "unit test summary", "unit test detail", "it")
                .with_embeddings(
                    embedder.embed_sync("unit test summary"),
                    embedder.embed_sync("unit test detail"),
                ),
        )
        .await
        .unwrap();
    assert_eq!(inserted.domain.label, "Testing");

    let again = store.create_domain("Testing").await.unwrap();
    assert_eq!(again.id, inserted.domain.id);

    let insight = store.create_insight("Writes tests first", None).await.unwrap();
    assert!(
        store
            .link_insight_to_topic(&insight.id, &inserted.topic.id)
            .await
            .unwrap()
    );
    assert!(
        store
            .link_insight_to_detail(&insight.id, &inserted.detail.id)
            .await
            .unwrap()
    );
    assert!(!store.link_insight_to_topic("missing", &inserted.topic.id).await.unwrap());

    let engine = RetrievalEngine::new(store.clone(), Arc::new(embedder));
    let records = engine.retrieve("unit test", 5).await.unwrap();
    assert!(
        records
            .iter()
            .any(|r| r.details.iter().any(|d| d.text == "unit test detail"))
    );
    assert_eq!(records[0].insights.len(), 1);

    assert_eq!(
        store.resolve_detail_id("unit test detail").await.unwrap(),
        Some(inserted.detail.id.clone())
    );
    assert!(store.mark_detail_processed(&inserted.detail.id).await.unwrap());
    assert!(!store.mark_detail_processed(&inserted.detail.id).await.unwrap());
    assert!(store.list_pending_details(10).await.unwrap().is_empty());

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.node_count(NodeLabel::Detail), 1);
    assert_eq!(stats.edge_count(RelationType::HasInsight), 1);

    drop_graph(&pool, &graph).await;
    pool.close().await;
}
