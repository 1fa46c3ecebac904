//! SQLite schema definition.

/// Complete database schema for DiaSight.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Clinicians
-- ============================================================================

CREATE TABLE IF NOT EXISTS clinicians (
    clinician_id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,                   -- trimmed, lowercase
    password_hash TEXT NOT NULL,                  -- SHA-256 hex
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    specialization TEXT,
    created_at TEXT NOT NULL
);

-- ============================================================================
-- Feature Records (immutable, one per assessment)
-- ============================================================================

-- Optional markers are declared without a type so that a rare verbatim
-- text entry is stored as-is next to numeric values.
CREATE TABLE IF NOT EXISTS feature_records (
    record_id TEXT PRIMARY KEY,                   -- client-generated UUID
    created_by TEXT NOT NULL,
    age REAL NOT NULL,
    sex INTEGER NOT NULL CHECK (sex IN (1, 2)),
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
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_feature_records_created_by ON feature_records(created_by);
CREATE INDEX IF NOT EXISTS idx_feature_records_created_at ON feature_records(created_at);

-- ============================================================================
-- Classifications (no uniqueness on record_id; readers prefer the latest)
-- ============================================================================

CREATE TABLE IF NOT EXISTS classifications (
    classification_id INTEGER PRIMARY KEY AUTOINCREMENT,
    record_id TEXT NOT NULL REFERENCES feature_records(record_id),
    risk_class TEXT NOT NULL,                     -- canonical label
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_classifications_record ON classifications(record_id, created_at);

-- ============================================================================
-- Audit Entries (no foreign keys; joins are resolved by the reader)
-- ============================================================================

CREATE TABLE IF NOT EXISTS audit_entries (
    audit_id INTEGER PRIMARY KEY AUTOINCREMENT,
    record_id TEXT NOT NULL,
    classification_id INTEGER,                    -- NULL until classified
    risk_class TEXT,                              -- denormalized label
    clinician_id TEXT NOT NULL,
    action TEXT NOT NULL DEFAULT 'CREATE',
    lab_snapshot TEXT,                            -- legacy JSON object of lab inputs
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_entries_record ON audit_entries(record_id);
CREATE INDEX IF NOT EXISTS idx_audit_entries_clinician ON audit_entries(clinician_id, created_at);
CREATE INDEX IF NOT EXISTS idx_audit_entries_created_at ON audit_entries(created_at);

-- ============================================================================
-- Session State (key-value)
-- ============================================================================

CREATE TABLE IF NOT EXISTS session_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
