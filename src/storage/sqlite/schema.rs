//! Declarative schema: tables, constraints, indices, and triggers.
//!
//! Applied idempotently on backend construction with `CREATE TABLE IF NOT
//! EXISTS` / `CREATE INDEX IF NOT EXISTS`; there is no external migration
//! runner, since the schema is fixed at this crate's version and there is no
//! prior released schema to migrate from.

/// Full DDL, executed as one batch.
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS nodes (
    id            TEXT PRIMARY KEY,
    type          TEXT NOT NULL CHECK (type IN ('entity', 'fact', 'experience', 'decision', 'snippet')),
    subtype       TEXT,
    content       TEXT NOT NULL,
    embedding     BLOB,
    tier          TEXT NOT NULL CHECK (tier IN ('task', 'session', 'longterm', 'archive')) DEFAULT 'task',
    confidence    REAL NOT NULL CHECK (confidence >= 0.0 AND confidence <= 1.0) DEFAULT 1.0,
    access_count  INTEGER NOT NULL DEFAULT 0,
    last_accessed TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    provenance    TEXT NOT NULL DEFAULT 'null',
    metadata      TEXT NOT NULL DEFAULT 'null'
);

CREATE TABLE IF NOT EXISTS hyperedges (
    id         TEXT PRIMARY KEY,
    type       TEXT NOT NULL CHECK (type IN (
                   'relation', 'composition', 'causation', 'context',
                   'spawns', 'considers', 'chooses', 'rejects',
                   'implements', 'produces', 'informs'
               )),
    label      TEXT NOT NULL,
    weight     REAL NOT NULL CHECK (weight >= 0.0) DEFAULT 1.0,
    created_at TEXT NOT NULL,
    metadata   TEXT NOT NULL DEFAULT 'null'
);

CREATE TABLE IF NOT EXISTS membership (
    hyperedge_id TEXT NOT NULL REFERENCES hyperedges(id) ON DELETE CASCADE,
    node_id      TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    role         TEXT NOT NULL CHECK (role IN ('subject', 'object', 'context', 'participant')),
    position     INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (hyperedge_id, node_id, role)
);

CREATE TABLE IF NOT EXISTS evolution_log (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp      TEXT NOT NULL,
    operation      TEXT NOT NULL CHECK (operation IN ('create', 'consolidate', 'promote', 'decay', 'prune', 'archive')),
    affected_nodes TEXT NOT NULL DEFAULT '[]',
    from_tier      TEXT,
    to_tier        TEXT,
    reasoning      TEXT,
    metadata       TEXT NOT NULL DEFAULT 'null'
);

-- The following tables support decision-trace reasoning workflows above the
-- hypergraph schema (spawned sub-goals, considered/chosen/rejected options,
-- retrieval feedback); the workflow logic that populates them is external to
-- this crate and not implemented here.

CREATE TABLE IF NOT EXISTS decisions (
    node_id      TEXT PRIMARY KEY REFERENCES nodes(id) ON DELETE CASCADE,
    question     TEXT,
    chosen_id    TEXT REFERENCES nodes(id) ON DELETE SET NULL,
    rationale    TEXT,
    decided_at   TEXT
);

CREATE TABLE IF NOT EXISTS retrieval_outcomes (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    node_id     TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    query       TEXT NOT NULL,
    was_useful  INTEGER,
    recorded_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS proposals (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    node_id     TEXT REFERENCES nodes(id) ON DELETE CASCADE,
    kind        TEXT NOT NULL,
    payload     TEXT NOT NULL DEFAULT 'null',
    status      TEXT NOT NULL DEFAULT 'pending',
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS projects (
    id         TEXT PRIMARY KEY,
    path       TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS node_projects (
    node_id    TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    PRIMARY KEY (node_id, project_id)
);

CREATE INDEX IF NOT EXISTS idx_nodes_tier ON nodes(tier);
CREATE INDEX IF NOT EXISTS idx_nodes_type_subtype ON nodes(type, subtype);
CREATE INDEX IF NOT EXISTS idx_nodes_last_accessed ON nodes(last_accessed);
CREATE INDEX IF NOT EXISTS idx_nodes_created_at ON nodes(created_at);
CREATE INDEX IF NOT EXISTS idx_nodes_confidence ON nodes(confidence);

CREATE INDEX IF NOT EXISTS idx_hyperedges_type ON hyperedges(type);
CREATE INDEX IF NOT EXISTS idx_hyperedges_weight ON hyperedges(weight);

CREATE INDEX IF NOT EXISTS idx_membership_node_id ON membership(node_id);
CREATE INDEX IF NOT EXISTS idx_membership_hyperedge_id ON membership(hyperedge_id);
CREATE INDEX IF NOT EXISTS idx_membership_role ON membership(role);

CREATE INDEX IF NOT EXISTS idx_evolution_operation ON evolution_log(operation);
CREATE INDEX IF NOT EXISTS idx_evolution_timestamp ON evolution_log(timestamp);

CREATE INDEX IF NOT EXISTS idx_retrieval_outcomes_node_id ON retrieval_outcomes(node_id);
CREATE INDEX IF NOT EXISTS idx_proposals_status ON proposals(status);
CREATE INDEX IF NOT EXISTS idx_node_projects_project_id ON node_projects(project_id);

CREATE TRIGGER IF NOT EXISTS trg_nodes_updated_at
AFTER UPDATE ON nodes
FOR EACH ROW WHEN NEW.updated_at = OLD.updated_at
BEGIN
    UPDATE nodes SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = NEW.id;
END;

CREATE TRIGGER IF NOT EXISTS trg_nodes_last_accessed
AFTER UPDATE OF access_count ON nodes
FOR EACH ROW WHEN NEW.access_count > OLD.access_count
BEGIN
    UPDATE nodes SET last_accessed = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = NEW.id;
END;
";

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_applies_cleanly() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'", [], |row| row.get(0))
            .unwrap();
        assert!(count >= 9);
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn.execute_batch(SCHEMA).unwrap();
    }
}
