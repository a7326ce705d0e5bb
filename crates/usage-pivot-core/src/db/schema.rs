//! SQLite schema definition.

/// Complete database schema for usage drafts and committed cells.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Usage Drafts (Staging Area - replaced wholesale on every save)
-- ============================================================================

CREATE TABLE IF NOT EXISTS usage_drafts (
    draft_id TEXT PRIMARY KEY,
    requisition_id TEXT NOT NULL UNIQUE,         -- one draft per requisition
    facility_id TEXT NOT NULL,
    fingerprint TEXT NOT NULL,                   -- SHA-256 of canonical cell set
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS usage_draft_sections (
    draft_id TEXT NOT NULL REFERENCES usage_drafts(draft_id) ON DELETE CASCADE,
    category TEXT NOT NULL,
    state TEXT NOT NULL CHECK (state IN ('disabled', 'empty', 'populated')),
    PRIMARY KEY (draft_id, category)
);

CREATE TABLE IF NOT EXISTS usage_draft_cells (
    id TEXT PRIMARY KEY,
    draft_id TEXT NOT NULL REFERENCES usage_drafts(draft_id) ON DELETE CASCADE,
    category TEXT NOT NULL,
    key_path TEXT NOT NULL,                      -- JSON array of strings
    value INTEGER,
    source_id TEXT,                              -- committed cell this derives from
    position INTEGER NOT NULL                    -- order within the section
);

CREATE INDEX IF NOT EXISTS idx_draft_cells_draft ON usage_draft_cells(draft_id, category);

-- ============================================================================
-- Committed Usage Cells
-- ============================================================================

CREATE TABLE IF NOT EXISTS usage_cells (
    id TEXT PRIMARY KEY,
    requisition_id TEXT NOT NULL,
    category TEXT NOT NULL,
    key_path TEXT NOT NULL,                      -- JSON array of strings
    value INTEGER,
    position INTEGER NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (requisition_id, category, key_path)
);

CREATE INDEX IF NOT EXISTS idx_usage_cells_requisition ON usage_cells(requisition_id, category);
"#;
