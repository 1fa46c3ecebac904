//! Feature record database operations.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{FeatureRecord, FieldValue, Sex};

/// Column list shared by every feature record query, in [`FeatureRecordRow`] order.
pub(crate) const RECORD_COLUMNS: &str = "record_id, created_by, age, sex, duration, sbp, dbp, \
     hbp, hba1c, ldl, hdl, cholesterol, triglycerides, urea, bun, egfr, ucr, uric, alt, ast, \
     created_at";

/// Number of columns in [`RECORD_COLUMNS`].
pub(crate) const RECORD_COLUMN_COUNT: usize = 21;

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            FieldValue::Number(n) => n.to_sql(),
            FieldValue::Text(text) => text.to_sql(),
        }
    }
}

impl FromSql for FieldValue {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(i) => Ok(FieldValue::Number(i as f64)),
            ValueRef::Real(f) => Ok(FieldValue::Number(f)),
            ValueRef::Text(_) => String::column_result(value).map(FieldValue::Text),
            ValueRef::Null | ValueRef::Blob(_) => Err(FromSqlError::InvalidType),
        }
    }
}

impl Database {
    /// Insert a new feature record. Records are never updated afterwards.
    pub fn insert_feature_record(&self, record: &FeatureRecord) -> DbResult<()> {
        let placeholders = (1..=RECORD_COLUMN_COUNT)
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        self.conn.execute(
            &format!(
                "INSERT INTO feature_records ({}) VALUES ({})",
                RECORD_COLUMNS, placeholders
            ),
            params![
                record.record_id,
                record.created_by,
                record.age,
                record.sex.code(),
                record.duration,
                record.sbp,
                record.dbp,
                record.hbp,
                record.hba1c,
                record.ldl,
                record.hdl,
                record.cholesterol,
                record.triglycerides,
                record.urea,
                record.bun,
                record.egfr,
                record.ucr,
                record.uric,
                record.alt,
                record.ast,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    /// Get a feature record by ID.
    pub fn get_feature_record(&self, record_id: &str) -> DbResult<Option<FeatureRecord>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM feature_records WHERE record_id = ?",
                    RECORD_COLUMNS
                ),
                [record_id],
                |row| FeatureRecordRow::read(row, 0),
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Records created before `created_before` that have no classification,
    /// oldest first.
    pub fn list_unclassified_records(&self, created_before: &str) -> DbResult<Vec<FeatureRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM feature_records f
             WHERE julianday(f.created_at) < julianday(?1)
               AND NOT EXISTS (
                   SELECT 1 FROM classifications c WHERE c.record_id = f.record_id
               )
             ORDER BY julianday(f.created_at) ASC, f.created_at ASC",
            RECORD_COLUMNS
        ))?;

        let rows = stmt.query_map([created_before], |row| FeatureRecordRow::read(row, 0))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.try_into()?);
        }
        Ok(records)
    }

    /// Count all feature records.
    pub fn count_feature_records(&self) -> DbResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM feature_records", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Intermediate row struct for database reads.
pub(crate) struct FeatureRecordRow {
    record_id: String,
    created_by: String,
    age: f64,
    sex: i64,
    optional: [Option<FieldValue>; 16],
    created_at: String,
}

impl FeatureRecordRow {
    /// Read [`RECORD_COLUMNS`] starting at column `offset`.
    pub(crate) fn read(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        let mut optional: [Option<FieldValue>; 16] = Default::default();
        for (i, slot) in optional.iter_mut().enumerate() {
            *slot = row.get(offset + 4 + i)?;
        }
        Ok(Self {
            record_id: row.get(offset)?,
            created_by: row.get(offset + 1)?,
            age: row.get(offset + 2)?,
            sex: row.get(offset + 3)?,
            optional,
            created_at: row.get(offset + 20)?,
        })
    }

    /// Like [`read`](Self::read), but `None` when a LEFT JOIN found no record.
    pub(crate) fn read_joined(row: &Row<'_>, offset: usize) -> rusqlite::Result<Option<Self>> {
        let record_id: Option<String> = row.get(offset)?;
        match record_id {
            Some(_) => Self::read(row, offset).map(Some),
            None => Ok(None),
        }
    }
}

impl TryFrom<FeatureRecordRow> for FeatureRecord {
    type Error = DbError;

    fn try_from(row: FeatureRecordRow) -> Result<Self, Self::Error> {
        let sex = Sex::from_code(row.sex as f64).ok_or_else(|| {
            DbError::Constraint(format!("record {} has invalid sex code {}", row.record_id, row.sex))
        })?;
        let [duration, sbp, dbp, hbp, hba1c, ldl, hdl, cholesterol, triglycerides, urea, bun, egfr, ucr, uric, alt, ast] =
            row.optional;

        Ok(FeatureRecord {
            record_id: row.record_id,
            created_by: row.created_by,
            age: row.age,
            sex,
            duration,
            sbp,
            dbp,
            hbp,
            hba1c,
            ldl,
            hdl,
            cholesterol,
            triglycerides,
            urea,
            bun,
            egfr,
            ucr,
            uric,
            alt,
            ast,
            created_at: row.created_at,
        })
    }
}
