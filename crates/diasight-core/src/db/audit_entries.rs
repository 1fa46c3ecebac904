//! Audit entry database operations.

use rusqlite::{params, OptionalExtension};
use tracing::{debug, warn};

use super::feature_records::{FeatureRecordRow, RECORD_COLUMNS};
use super::{Database, DbError, DbResult};
use crate::models::{AuditAction, AuditEntry, Classification, FeatureRecord, NewAuditEntry};

/// One audit entry with its optional joins, exactly as stored.
///
/// Every joined part may be absent; legacy rows may also carry values the
/// current model would reject, so labels and actions stay raw strings here.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRow {
    pub audit_id: i64,
    pub record_id: String,
    pub clinician_id: String,
    pub action: Option<String>,
    pub created_at: String,
    /// Classification reference stored on the audit entry
    pub entry_classification_id: Option<i64>,
    /// Denormalized label stored on the audit entry
    pub entry_label: Option<String>,
    pub lab_snapshot: Option<String>,
    /// Latest classification row for the record, if any
    pub classification_id: Option<i64>,
    pub classification_label: Option<String>,
    pub clinician_first_name: Option<String>,
    pub clinician_last_name: Option<String>,
    pub record: Option<FeatureRecord>,
}

impl Database {
    /// Insert an audit entry and return its store id.
    pub fn insert_audit_entry(&self, entry: &NewAuditEntry) -> DbResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO audit_entries (
                record_id, classification_id, risk_class, clinician_id,
                action, lab_snapshot, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                entry.record_id,
                entry.classification_id,
                entry.risk_class,
                entry.clinician_id,
                entry.action.as_str(),
                entry.lab_snapshot,
                entry.created_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Attach a classification to the record's audit entry.
    ///
    /// Updates the most recent entry for the record; when there is none
    /// (the earlier insert failed) a fresh entry is created with the
    /// reference already attached. Returns the audit id either way.
    pub fn attach_or_insert_classification(
        &self,
        record_id: &str,
        clinician_id: &str,
        classification: &Classification,
        action: AuditAction,
    ) -> DbResult<i64> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT audit_id FROM audit_entries WHERE record_id = ? ORDER BY audit_id DESC LIMIT 1",
                [record_id],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(audit_id) = existing {
            let updated = self.conn.execute(
                r#"
                UPDATE audit_entries SET
                    classification_id = ?2,
                    risk_class = ?3,
                    action = ?4
                WHERE audit_id = ?1
                "#,
                params![
                    audit_id,
                    classification.classification_id,
                    classification.label(),
                    action.as_str(),
                ],
            )?;
            if updated > 0 {
                return Ok(audit_id);
            }
        }

        debug!(record_id, "No audit entry to update, inserting");
        let mut entry = NewAuditEntry::created(record_id, clinician_id);
        entry.classification_id = Some(classification.classification_id);
        entry.risk_class = Some(classification.label().to_string());
        entry.action = action;
        self.insert_audit_entry(&entry)
    }

    /// Get an audit entry by ID.
    pub fn get_audit_entry(&self, audit_id: i64) -> DbResult<Option<AuditEntry>> {
        self.conn
            .query_row(
                r#"
                SELECT audit_id, record_id, classification_id, risk_class,
                       clinician_id, action, lab_snapshot, created_at
                FROM audit_entries
                WHERE audit_id = ?
                "#,
                [audit_id],
                |row| {
                    Ok(AuditEntryRow {
                        audit_id: row.get(0)?,
                        record_id: row.get(1)?,
                        classification_id: row.get(2)?,
                        risk_class: row.get(3)?,
                        clinician_id: row.get(4)?,
                        action: row.get(5)?,
                        lab_snapshot: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                },
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// All audit entries for a record, oldest first.
    pub fn list_audit_entries_for_record(&self, record_id: &str) -> DbResult<Vec<AuditEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT audit_id, record_id, classification_id, risk_class,
                   clinician_id, action, lab_snapshot, created_at
            FROM audit_entries
            WHERE record_id = ?
            ORDER BY julianday(created_at) ASC, created_at ASC, audit_id ASC
            "#,
        )?;

        let rows = stmt.query_map([record_id], |row| {
            Ok(AuditEntryRow {
                audit_id: row.get(0)?,
                record_id: row.get(1)?,
                classification_id: row.get(2)?,
                risk_class: row.get(3)?,
                clinician_id: row.get(4)?,
                action: row.get(5)?,
                lab_snapshot: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.try_into()?);
        }
        Ok(entries)
    }

    /// Count all audit entries.
    pub fn count_audit_entries(&self) -> DbResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM audit_entries", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Audit entries joined with their latest classification, clinician and
    /// feature record, most recent first. `clinician_id` restricts to one
    /// owner.
    ///
    /// Ordering is by the parsed instant, so RFC 3339 values with other
    /// precisions or offsets still sort chronologically. Unparseable
    /// timestamps sort last.
    pub fn query_audit_rows(&self, clinician_id: Option<&str>) -> DbResult<Vec<AuditRow>> {
        let record_columns = RECORD_COLUMNS
            .split(',')
            .map(|column| format!("f.{}", column.trim()))
            .collect::<Vec<_>>()
            .join(", ");

        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT a.audit_id, a.record_id, a.clinician_id, a.action, a.created_at,
                   a.classification_id, a.risk_class, a.lab_snapshot,
                   c.classification_id, c.risk_class,
                   d.first_name, d.last_name,
                   {}
            FROM audit_entries a
            LEFT JOIN classifications c ON c.classification_id = (
                SELECT c2.classification_id FROM classifications c2
                WHERE c2.record_id = a.record_id
                ORDER BY julianday(c2.created_at) DESC, c2.created_at DESC,
                         c2.classification_id DESC
                LIMIT 1
            )
            LEFT JOIN clinicians d ON d.clinician_id = a.clinician_id
            LEFT JOIN feature_records f ON f.record_id = a.record_id
            WHERE (?1 IS NULL OR a.clinician_id = ?1)
            ORDER BY julianday(a.created_at) DESC, a.created_at DESC, a.audit_id DESC
            "#,
            record_columns
        ))?;

        let rows = stmt.query_map([clinician_id], |row| {
            Ok((
                AuditRow {
                    audit_id: row.get(0)?,
                    record_id: row.get(1)?,
                    clinician_id: row.get(2)?,
                    action: row.get(3)?,
                    created_at: row.get(4)?,
                    entry_classification_id: row.get(5)?,
                    entry_label: row.get(6)?,
                    lab_snapshot: row.get(7)?,
                    classification_id: row.get(8)?,
                    classification_label: row.get(9)?,
                    clinician_first_name: row.get(10)?,
                    clinician_last_name: row.get(11)?,
                    record: None,
                },
                // kept as a Result: a bad joined record must not fail the entry
                FeatureRecordRow::read_joined(row, 12),
            ))
        })?;

        let mut audit_rows = Vec::new();
        for row in rows {
            let (mut audit_row, record_row) = row?;
            let record = record_row
                .map_err(DbError::from)
                .and_then(|record_row| record_row.map(FeatureRecord::try_from).transpose());
            audit_row.record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!(audit_id = audit_row.audit_id, error = %e, "Unreadable joined feature record");
                    None
                }
            };
            audit_rows.push(audit_row);
        }
        debug!(rows = audit_rows.len(), "Queried audit rows");
        Ok(audit_rows)
    }
}

struct AuditEntryRow {
    audit_id: i64,
    record_id: String,
    classification_id: Option<i64>,
    risk_class: Option<String>,
    clinician_id: String,
    action: String,
    lab_snapshot: Option<String>,
    created_at: String,
}

impl TryFrom<AuditEntryRow> for AuditEntry {
    type Error = DbError;

    fn try_from(row: AuditEntryRow) -> Result<Self, Self::Error> {
        let action = AuditAction::parse(&row.action).ok_or_else(|| {
            DbError::Constraint(format!(
                "audit entry {} has unknown action '{}'",
                row.audit_id, row.action
            ))
        })?;
        Ok(AuditEntry {
            audit_id: row.audit_id,
            record_id: row.record_id,
            classification_id: row.classification_id,
            risk_class: row.risk_class,
            clinician_id: row.clinician_id,
            action,
            lab_snapshot: row.lab_snapshot,
            created_at: row.created_at,
        })
    }
}
