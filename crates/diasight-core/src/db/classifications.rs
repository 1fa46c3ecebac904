//! Classification database operations.

use diasight_classifier::RiskClass;
use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{now_timestamp, Classification};

impl Database {
    /// Persist a classification for a record and return it with its store id.
    pub fn insert_classification(
        &self,
        record_id: &str,
        risk_class: RiskClass,
    ) -> DbResult<Classification> {
        let created_at = now_timestamp();
        self.conn.execute(
            r#"
            INSERT INTO classifications (record_id, risk_class, created_at)
            VALUES (?1, ?2, ?3)
            "#,
            params![record_id, risk_class.label(), created_at],
        )?;

        Ok(Classification {
            classification_id: self.conn.last_insert_rowid(),
            record_id: record_id.to_string(),
            risk_class,
            created_at,
        })
    }

    /// Most recent classification for a record.
    pub fn latest_classification(&self, record_id: &str) -> DbResult<Option<Classification>> {
        self.conn
            .query_row(
                r#"
                SELECT classification_id, record_id, risk_class, created_at
                FROM classifications
                WHERE record_id = ?
                ORDER BY julianday(created_at) DESC, created_at DESC, classification_id DESC
                LIMIT 1
                "#,
                [record_id],
                |row| {
                    Ok(ClassificationRow {
                        classification_id: row.get(0)?,
                        record_id: row.get(1)?,
                        risk_class: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// All classifications for a record, most recent first.
    pub fn list_classifications(&self, record_id: &str) -> DbResult<Vec<Classification>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT classification_id, record_id, risk_class, created_at
            FROM classifications
            WHERE record_id = ?
            ORDER BY julianday(created_at) DESC, created_at DESC, classification_id DESC
            "#,
        )?;

        let rows = stmt.query_map([record_id], |row| {
            Ok(ClassificationRow {
                classification_id: row.get(0)?,
                record_id: row.get(1)?,
                risk_class: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;

        let mut classifications = Vec::new();
        for row in rows {
            classifications.push(row?.try_into()?);
        }
        Ok(classifications)
    }

    /// Count all classifications.
    pub fn count_classifications(&self) -> DbResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM classifications", [], |row| row.get(0))?;
        Ok(count)
    }
}

struct ClassificationRow {
    classification_id: i64,
    record_id: String,
    risk_class: String,
    created_at: String,
}

impl TryFrom<ClassificationRow> for Classification {
    type Error = DbError;

    fn try_from(row: ClassificationRow) -> Result<Self, Self::Error> {
        let risk_class = RiskClass::parse(&row.risk_class).ok_or_else(|| {
            DbError::Constraint(format!(
                "classification {} has unknown label '{}'",
                row.classification_id, row.risk_class
            ))
        })?;
        Ok(Classification {
            classification_id: row.classification_id,
            record_id: row.record_id,
            risk_class,
            created_at: row.created_at,
        })
    }
}
