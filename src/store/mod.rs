//! Versioned relationship persistence.
//!
//! `replace_scope` atomically supersedes the current relationship set for a
//! scope: one transaction deactivates every current row, then upserts the
//! new candidates. Keys that stop being produced stay in the table with
//! `is_current = 0`; re-running with identical candidates converges to the
//! same rows without growing history.

use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::catalog::Scope;
use crate::db::Db;
use crate::error::Result;
use crate::matcher::{RelationshipCandidate, RelationshipType};

/// Stable identifier for a relationship key within its scope.
///
/// SHA256 of the scoped (source, target, column_name) key, so the same
/// inference always lands on the same row.
pub fn relationship_id(
    scope: &Scope,
    source_table_id: i64,
    target_table_id: i64,
    column_name: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(scope.server_name.as_bytes());
    hasher.update(b"|");
    hasher.update(scope.database_name.as_bytes());
    hasher.update(b"|");
    hasher.update(scope.schema_name.as_bytes());
    hasher.update(b"|");
    hasher.update(source_table_id.to_le_bytes());
    hasher.update(target_table_id.to_le_bytes());
    hasher.update(column_name.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The persisted, versioned form of a candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub relationship_id: String,
    pub server_name: String,
    pub database_name: String,
    pub schema_name: String,
    pub source_table_id: i64,
    pub target_table_id: i64,
    pub source_column_id: i64,
    pub target_column_id: i64,
    pub column_name: String,
    pub relationship_type: RelationshipType,
    pub confidence_score: f64,
    pub description: Option<String>,
    pub source_tag: Option<String>,
    pub is_current: bool,
    pub date_created: String,
    pub date_updated: String,
}

/// Store facade over the relationship table.
pub struct RelationshipStore<'a> {
    db: &'a Db,
}

impl<'a> RelationshipStore<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Replace the current relationship set for a scope.
    ///
    /// Deactivate and upsert run inside one transaction: a failure partway
    /// through rolls back and leaves the previous current set untouched.
    /// Returns the number of current relationships after the replace, which
    /// can be lower than the candidate count when several candidates share
    /// one (source, target, column_name) key and coalesce onto a single row.
    pub async fn replace_scope(
        &self,
        scope: &Scope,
        candidates: &[RelationshipCandidate],
    ) -> Result<usize> {
        let scope = scope.clone();
        let candidates = candidates.to_vec();
        self.db
            .with_connection(move |conn| {
                let now = Utc::now().to_rfc3339();
                let tx = conn.transaction()?;
                deactivate_scope(&tx, &scope, &now)?;
                for candidate in &candidates {
                    upsert_candidate(&tx, &scope, candidate, &now)?;
                }
                let current: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM table_relationships \
                     WHERE server_name = ?1 AND database_name = ?2 AND schema_name = ?3 \
                       AND is_current = 1",
                    params![scope.server_name, scope.database_name, scope.schema_name],
                    |row| row.get(0),
                )?;
                tx.commit()?;
                log::info!(
                    "Replaced relationship set for scope {}: {} current",
                    scope,
                    current
                );
                Ok(current as usize)
            })
            .await
    }

    /// Rehydrate the current relationship set for a scope, in a stable order.
    pub async fn current_relationships(&self, scope: &Scope) -> Result<Vec<RelationshipRecord>> {
        let scope = scope.clone();
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT relationship_id, server_name, database_name, schema_name, \
                            source_table_id, target_table_id, source_column_id, \
                            target_column_id, column_name, relationship_type, \
                            confidence_score, description, source_tag, is_current, \
                            date_created, date_updated \
                     FROM table_relationships \
                     WHERE server_name = ?1 AND database_name = ?2 AND schema_name = ?3 \
                       AND is_current = 1 \
                     ORDER BY source_table_id, target_table_id, column_name",
                )?;
                let rows = stmt.query_map(
                    params![scope.server_name, scope.database_name, scope.schema_name],
                    map_record,
                )?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
    }
}

fn deactivate_scope(conn: &Connection, scope: &Scope, now: &str) -> Result<()> {
    let deactivated = conn.execute(
        "UPDATE table_relationships \
         SET is_current = 0, date_updated = ?4 \
         WHERE server_name = ?1 AND database_name = ?2 AND schema_name = ?3 \
           AND is_current = 1",
        params![
            scope.server_name,
            scope.database_name,
            scope.schema_name,
            now
        ],
    )?;
    log::debug!("Deactivated {} relationships in scope {}", deactivated, scope);
    Ok(())
}

fn upsert_candidate(
    conn: &Connection,
    scope: &Scope,
    candidate: &RelationshipCandidate,
    now: &str,
) -> Result<()> {
    let id = relationship_id(
        scope,
        candidate.source_table_id,
        candidate.target_table_id,
        &candidate.column_name,
    );
    conn.execute(
        r#"
        INSERT INTO table_relationships (
            relationship_id, server_name, database_name, schema_name,
            source_table_id, target_table_id, source_column_id, target_column_id,
            column_name, relationship_type, confidence_score, description,
            source_tag, is_current, date_created, date_updated
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 1, ?14, ?14)
        ON CONFLICT(relationship_id) DO UPDATE SET
            source_column_id = excluded.source_column_id,
            target_column_id = excluded.target_column_id,
            relationship_type = excluded.relationship_type,
            confidence_score = excluded.confidence_score,
            description = excluded.description,
            source_tag = excluded.source_tag,
            is_current = 1,
            date_updated = excluded.date_updated
        "#,
        params![
            id,
            scope.server_name,
            scope.database_name,
            scope.schema_name,
            candidate.source_table_id,
            candidate.target_table_id,
            candidate.source_column_id,
            candidate.target_column_id,
            candidate.column_name,
            candidate.relationship_type.as_str(),
            candidate.confidence_score,
            candidate.description,
            candidate.source_tag,
            now,
        ],
    )?;
    Ok(())
}

fn map_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<RelationshipRecord> {
    let type_str: String = row.get(9)?;
    let relationship_type = RelationshipType::from_str(&type_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(RelationshipRecord {
        relationship_id: row.get(0)?,
        server_name: row.get(1)?,
        database_name: row.get(2)?,
        schema_name: row.get(3)?,
        source_table_id: row.get(4)?,
        target_table_id: row.get(5)?,
        source_column_id: row.get(6)?,
        target_column_id: row.get(7)?,
        column_name: row.get(8)?,
        relationship_type,
        confidence_score: row.get(10)?,
        description: row.get(11)?,
        source_tag: row.get(12)?,
        is_current: row.get::<_, i64>(13)? != 0,
        date_created: row.get(14)?,
        date_updated: row.get(15)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrate;
    use tempfile::TempDir;

    async fn setup_db() -> (Db, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Db::new(&db_path);
        db.with_connection(|conn| migrate::run_migrations(conn))
            .await
            .unwrap();
        (db, temp_dir)
    }

    fn test_scope() -> Scope {
        Scope::new("srv", "db", "dbo")
    }

    fn candidate(source: i64, target: i64, column: &str, confidence: f64) -> RelationshipCandidate {
        RelationshipCandidate {
            source_table_id: source,
            target_table_id: target,
            source_column_id: source * 10,
            target_column_id: target * 10,
            column_name: column.to_string(),
            relationship_type: RelationshipType::NameMatch,
            confidence_score: confidence,
            description: format!("Tables {source} and {target} share column {column}"),
            schema_name: "dbo".to_string(),
            database_name: "db".to_string(),
            server_name: "srv".to_string(),
            source_tag: "column_match:exact".to_string(),
        }
    }

    async fn total_rows(db: &Db) -> i64 {
        db.with_connection(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM table_relationships", [], |row| {
                row.get(0)
            })?)
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_replace_persists_current_set() {
        let (db, _temp) = setup_db().await;
        let store = RelationshipStore::new(&db);
        let scope = test_scope();

        let candidates = vec![candidate(1, 2, "cust_id", 0.6), candidate(2, 1, "cust_id", 0.6)];
        let count = store.replace_scope(&scope, &candidates).await.unwrap();
        assert_eq!(count, 2);

        let current = store.current_relationships(&scope).await.unwrap();
        assert_eq!(current.len(), 2);
        assert!(current.iter().all(|r| r.is_current));
        assert_eq!(current[0].source_table_id, 1);
        assert_eq!(current[1].source_table_id, 2);
    }

    #[tokio::test]
    async fn test_replace_is_idempotent() {
        let (db, _temp) = setup_db().await;
        let store = RelationshipStore::new(&db);
        let scope = test_scope();

        let candidates = vec![candidate(1, 2, "cust_id", 0.6), candidate(2, 1, "cust_id", 0.6)];
        store.replace_scope(&scope, &candidates).await.unwrap();
        store.replace_scope(&scope, &candidates).await.unwrap();
        store.replace_scope(&scope, &candidates).await.unwrap();

        assert_eq!(total_rows(&db).await, 2);
        let current = store.current_relationships(&scope).await.unwrap();
        assert_eq!(current.len(), 2);
    }

    #[tokio::test]
    async fn test_absent_keys_stay_deactivated() {
        let (db, _temp) = setup_db().await;
        let store = RelationshipStore::new(&db);
        let scope = test_scope();

        let first = vec![candidate(1, 2, "cust_id", 0.6), candidate(3, 4, "sku", 0.6)];
        store.replace_scope(&scope, &first).await.unwrap();

        let second = vec![candidate(1, 2, "cust_id", 0.6)];
        store.replace_scope(&scope, &second).await.unwrap();

        let current = store.current_relationships(&scope).await.unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].column_name, "cust_id");

        // Superseded row is retained, not deleted
        assert_eq!(total_rows(&db).await, 2);
    }

    #[tokio::test]
    async fn test_key_reactivated_without_duplicate() {
        let (db, _temp) = setup_db().await;
        let store = RelationshipStore::new(&db);
        let scope = test_scope();

        let candidates = vec![candidate(1, 2, "cust_id", 0.6)];
        store.replace_scope(&scope, &candidates).await.unwrap();
        store.replace_scope(&scope, &[]).await.unwrap();
        assert!(store.current_relationships(&scope).await.unwrap().is_empty());

        store.replace_scope(&scope, &candidates).await.unwrap();
        let current = store.current_relationships(&scope).await.unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(total_rows(&db).await, 1);
    }

    #[tokio::test]
    async fn test_upsert_updates_fields_in_place() {
        let (db, _temp) = setup_db().await;
        let store = RelationshipStore::new(&db);
        let scope = test_scope();

        store
            .replace_scope(&scope, &[candidate(1, 2, "cust_id", 0.6)])
            .await
            .unwrap();

        let mut updated = candidate(1, 2, "cust_id", 0.95);
        updated.relationship_type = RelationshipType::FkSemantic;
        store.replace_scope(&scope, &[updated]).await.unwrap();

        let current = store.current_relationships(&scope).await.unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].confidence_score, 0.95);
        assert_eq!(current[0].relationship_type, RelationshipType::FkSemantic);
        assert_eq!(total_rows(&db).await, 1);
    }

    #[tokio::test]
    async fn test_scopes_are_isolated() {
        let (db, _temp) = setup_db().await;
        let store = RelationshipStore::new(&db);
        let scope_a = Scope::new("srv", "db", "sales");
        let scope_b = Scope::new("srv", "db", "hr");

        let mut for_a = candidate(1, 2, "cust_id", 0.6);
        for_a.schema_name = "sales".to_string();
        let mut for_b = candidate(5, 6, "emp_id", 0.6);
        for_b.schema_name = "hr".to_string();

        store.replace_scope(&scope_a, &[for_a]).await.unwrap();
        store.replace_scope(&scope_b, &[for_b]).await.unwrap();

        // Replacing scope_a with an empty set must not touch scope_b
        store.replace_scope(&scope_a, &[]).await.unwrap();
        assert!(store.current_relationships(&scope_a).await.unwrap().is_empty());
        assert_eq!(store.current_relationships(&scope_b).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_count_matches_rows_when_candidates_share_key() {
        use crate::catalog::{ClassificationIndex, ColumnOccurrence};
        use crate::matcher::{match_candidates, AliasMap, MatchingMode, TableFilter};

        let (db, _temp) = setup_db().await;
        let store = RelationshipStore::new(&db);
        let scope = test_scope();

        // Table 1 carries two columns named cust_id, so the matcher emits
        // four candidates but only two distinct (source, target, column) keys.
        let occurrences = vec![
            ColumnOccurrence {
                table_id: 1,
                column_id: 10,
                schema_name: "dbo".to_string(),
                table_name: "orders".to_string(),
                column_name: "cust_id".to_string(),
            },
            ColumnOccurrence {
                table_id: 1,
                column_id: 11,
                schema_name: "dbo".to_string(),
                table_name: "orders".to_string(),
                column_name: "cust_id".to_string(),
            },
            ColumnOccurrence {
                table_id: 2,
                column_id: 20,
                schema_name: "dbo".to_string(),
                table_name: "customers".to_string(),
                column_name: "cust_id".to_string(),
            },
        ];
        let candidates = match_candidates(
            &scope,
            &occurrences,
            &ClassificationIndex::default(),
            &TableFilter::allow_all(),
            &AliasMap::default(),
            MatchingMode::Exact,
        );
        assert_eq!(candidates.len(), 4);

        let current = store.replace_scope(&scope, &candidates).await.unwrap();
        assert_eq!(current, 2);
        assert_eq!(
            store.current_relationships(&scope).await.unwrap().len(),
            current
        );
        assert_eq!(total_rows(&db).await, 2);
    }

    #[tokio::test]
    async fn test_matched_candidates_round_trip() {
        use crate::catalog::{Classification, ClassificationIndex, ColumnOccurrence};
        use crate::graph::DirectedSchemaGraph;
        use crate::matcher::{match_candidates, AliasMap, MatchingMode, TableFilter};

        let (db, _temp) = setup_db().await;
        let store = RelationshipStore::new(&db);
        let scope = test_scope();

        let occurrences = vec![
            ColumnOccurrence {
                table_id: 1,
                column_id: 10,
                schema_name: "dbo".to_string(),
                table_name: "orders".to_string(),
                column_name: "cust_id".to_string(),
            },
            ColumnOccurrence {
                table_id: 2,
                column_id: 20,
                schema_name: "dbo".to_string(),
                table_name: "customers".to_string(),
                column_name: "cust_id".to_string(),
            },
        ];
        let classifications: ClassificationIndex = [
            (10, Classification::ForeignKey),
            (20, Classification::PrimaryKey),
        ]
        .into_iter()
        .collect();

        let candidates = match_candidates(
            &scope,
            &occurrences,
            &classifications,
            &TableFilter::allow_all(),
            &AliasMap::default(),
            MatchingMode::Exact,
        );
        store.replace_scope(&scope, &candidates).await.unwrap();

        let current = store.current_relationships(&scope).await.unwrap();
        assert_eq!(current.len(), 2);
        assert!(current
            .iter()
            .all(|r| r.relationship_type == RelationshipType::FkSemantic));

        let graph = DirectedSchemaGraph::build(&current);
        assert_eq!(graph.edge_weight(1, 2), Some(0.95));
        assert_eq!(graph.edge_weight(2, 1), Some(0.95));
        assert_eq!(graph.edge_kind(1, 2), Some("fk_semantic"));
    }

    #[test]
    fn test_relationship_id_is_stable() {
        let scope = test_scope();
        let a = relationship_id(&scope, 1, 2, "cust_id");
        let b = relationship_id(&scope, 1, 2, "cust_id");
        let mirrored = relationship_id(&scope, 2, 1, "cust_id");
        assert_eq!(a, b);
        assert_ne!(a, mirrored);
        assert_eq!(a.len(), 64);
    }
}
