//! Catalog inputs: column occurrences and column classifications.
//!
//! Both tables are populated by the external schema crawler / classifier
//! before an inference run; this module only reads scoped snapshots of them.

use std::collections::HashMap;
use std::fmt;

use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::db::Db;
use crate::error::Result;

/// A (server, database, schema) triple delimiting one inference run.
///
/// Runs targeting different scopes never touch the same relationship keys;
/// concurrent runs against the same scope must be serialized by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub server_name: String,
    pub database_name: String,
    pub schema_name: String,
}

impl Scope {
    pub fn new(server: &str, database: &str, schema: &str) -> Self {
        Self {
            server_name: server.to_string(),
            database_name: database.to_string(),
            schema_name: schema.to_string(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.server_name, self.database_name, self.schema_name
        )
    }
}

/// One row per (column_name, table) pairing observed by the crawler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnOccurrence {
    pub table_id: i64,
    pub column_id: i64,
    pub schema_name: String,
    pub table_name: String,
    pub column_name: String,
}

/// Semantic label attached to a column by the external classification step.
///
/// Absence of an entry means "unclassified": not excluded from matching, but
/// not privileged either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    PrimaryKey,
    ForeignKey,
    Identifier,
    Timestamp,
    Attribute,
    Code,
    Measure,
    Other(String),
}

impl Classification {
    pub fn from_label(label: &str) -> Self {
        match label {
            "PRIMARY_KEY" => Classification::PrimaryKey,
            "FOREIGN_KEY" => Classification::ForeignKey,
            "IDENTIFIER" => Classification::Identifier,
            "TIMESTAMP" => Classification::Timestamp,
            "ATTRIBUTE" => Classification::Attribute,
            "CODE" => Classification::Code,
            "MEASURE" => Classification::Measure,
            other => Classification::Other(other.to_string()),
        }
    }

    /// Key-like classifications that signal a structural relationship.
    pub fn is_key_like(&self) -> bool {
        matches!(
            self,
            Classification::PrimaryKey | Classification::ForeignKey | Classification::Identifier
        )
    }

    /// Timestamps and plain attributes carry no structural signal; column
    /// name collisions between them (created_at, name, ...) are noise.
    pub fn is_excluded(&self) -> bool {
        matches!(self, Classification::Timestamp | Classification::Attribute)
    }
}

/// Read-only lookup from column_id to its classification.
#[derive(Debug, Clone, Default)]
pub struct ClassificationIndex {
    by_column: HashMap<i64, Classification>,
}

impl ClassificationIndex {
    pub fn new(by_column: HashMap<i64, Classification>) -> Self {
        Self { by_column }
    }

    pub fn get(&self, column_id: i64) -> Option<&Classification> {
        self.by_column.get(&column_id)
    }

    pub fn len(&self) -> usize {
        self.by_column.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_column.is_empty()
    }
}

impl FromIterator<(i64, Classification)> for ClassificationIndex {
    fn from_iter<T: IntoIterator<Item = (i64, Classification)>>(iter: T) -> Self {
        Self {
            by_column: iter.into_iter().collect(),
        }
    }
}

/// Fetch the column-occurrence snapshot for a scope.
pub async fn fetch_column_occurrences(db: &Db, scope: &Scope) -> Result<Vec<ColumnOccurrence>> {
    let scope = scope.clone();
    db.with_connection(move |conn| {
        let mut stmt = conn.prepare(
            "SELECT table_id, column_id, schema_name, table_name, column_name \
             FROM column_occurrences \
             WHERE server_name = ?1 AND database_name = ?2 AND schema_name = ?3 \
             ORDER BY column_name, table_id",
        )?;
        let rows = stmt.query_map(
            params![scope.server_name, scope.database_name, scope.schema_name],
            |row| {
                Ok(ColumnOccurrence {
                    table_id: row.get(0)?,
                    column_id: row.get(1)?,
                    schema_name: row.get(2)?,
                    table_name: row.get(3)?,
                    column_name: row.get(4)?,
                })
            },
        )?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    })
    .await
}

/// Fetch the classification snapshot for a scope.
pub async fn fetch_column_classifications(db: &Db, scope: &Scope) -> Result<ClassificationIndex> {
    let scope = scope.clone();
    db.with_connection(move |conn| {
        let mut stmt = conn.prepare(
            "SELECT column_id, classification \
             FROM column_classifications \
             WHERE server_name = ?1 AND database_name = ?2 AND schema_name = ?3",
        )?;
        let rows = stmt.query_map(
            params![scope.server_name, scope.database_name, scope.schema_name],
            |row| {
                let column_id: i64 = row.get(0)?;
                let label: String = row.get(1)?;
                Ok((column_id, Classification::from_label(&label)))
            },
        )?;
        let mut index = HashMap::new();
        for row in rows {
            let (column_id, classification) = row?;
            index.insert(column_id, classification);
        }
        Ok(ClassificationIndex::new(index))
    })
    .await
}
