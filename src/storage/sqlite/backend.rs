//! `SQLite`-backed [`Backend`] implementation.

use super::connection::{acquire_lock, configure_connection};
use super::schema::SCHEMA;
use crate::models::{
    Direction, EvolutionEntry, EvolutionOperation, Hyperedge, HyperedgeFilter, HyperedgeId,
    HyperedgeType, Membership, Node, NodeFilter, NodeId, NodeType, PreferenceScope, Role,
    SearchOptions, SearchResult, Tier,
};
use crate::storage::{Backend, BackendStats};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, Row, params};
use std::sync::Mutex;

fn to_rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::OperationFailed {
            operation: "parse_timestamp".to_string(),
            cause: e.to_string(),
        })
}

fn sql_error(operation: &str, err: rusqlite::Error) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: err.to_string(),
    }
}

/// A durable [`Backend`] implementation backed by an embedded `SQLite`
/// database, guarded by a single [`Mutex`] and configured for WAL
/// journaling. See [`crate::storage::sqlite::connection::configure_connection`]
/// for the concurrency rationale.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Opens (creating if absent) a file-backed database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be opened or the schema
    /// fails to apply.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| sql_error("open", e))?;
        Self::from_connection(conn)
    }

    /// Opens a private, process-local in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be opened or the schema
    /// fails to apply.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| sql_error("open_in_memory", e))?;
        Self::from_connection(conn)
    }

    /// Opens a connection against the shared in-memory URI returned by
    /// [`crate::storage::sqlite::dsn::in_memory`], so multiple connections
    /// within the same process observe the same database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be opened or the schema
    /// fails to apply.
    pub fn open_shared_memory() -> Result<Self> {
        let uri = super::dsn::in_memory();
        let conn = Connection::open_with_flags(
            uri,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_URI,
        )
        .map_err(|e| sql_error("open_shared_memory", e))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        configure_connection(&conn).map_err(|e| sql_error("configure_connection", e))?;
        conn.execute_batch(SCHEMA).map_err(|e| sql_error("apply_schema", e))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn node_from_row(row: &Row<'_>) -> rusqlite::Result<Node> {
        let node_type: String = row.get("type")?;
        let tier: String = row.get("tier")?;
        let last_accessed: Option<String> = row.get("last_accessed")?;
        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;
        let provenance: String = row.get("provenance")?;
        let metadata: String = row.get("metadata")?;
        let id: String = row.get("id")?;

        Ok(Node {
            id: NodeId::from_string(id),
            node_type: NodeType::parse(&node_type).unwrap_or(NodeType::Entity),
            subtype: row.get("subtype")?,
            content: row.get("content")?,
            embedding: row.get("embedding")?,
            tier: Tier::parse(&tier).unwrap_or_default(),
            confidence: row.get("confidence")?,
            access_count: row.get::<_, i64>("access_count")?.max(0) as u64,
            last_accessed: last_accessed.and_then(|s| parse_ts(&s).ok()),
            created_at: parse_ts(&created_at).unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            updated_at: parse_ts(&updated_at).unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            provenance: serde_json::from_str(&provenance).unwrap_or(serde_json::Value::Null),
            metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
        })
    }

    fn hyperedge_from_row(row: &Row<'_>) -> rusqlite::Result<Hyperedge> {
        let edge_type: String = row.get("type")?;
        let created_at: String = row.get("created_at")?;
        let metadata: String = row.get("metadata")?;
        let id: String = row.get("id")?;

        Ok(Hyperedge {
            id: HyperedgeId::from_string(id),
            edge_type: HyperedgeType::parse(&edge_type).unwrap_or(HyperedgeType::Relation),
            label: row.get("label")?,
            weight: row.get("weight")?,
            created_at: parse_ts(&created_at).unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
        })
    }

    fn membership_from_row(row: &Row<'_>) -> rusqlite::Result<Membership> {
        let hyperedge_id: String = row.get("hyperedge_id")?;
        let node_id: String = row.get("node_id")?;
        let role: String = row.get("role")?;
        Ok(Membership {
            hyperedge_id: HyperedgeId::from_string(hyperedge_id),
            node_id: NodeId::from_string(node_id),
            role: Role::parse(&role).unwrap_or(Role::Participant),
            position: row.get("position")?,
        })
    }

    fn evolution_from_row(row: &Row<'_>) -> rusqlite::Result<EvolutionEntry> {
        let timestamp: String = row.get("timestamp")?;
        let operation: String = row.get("operation")?;
        let affected_nodes: String = row.get("affected_nodes")?;
        let from_tier: Option<String> = row.get("from_tier")?;
        let to_tier: Option<String> = row.get("to_tier")?;
        let metadata: String = row.get("metadata")?;
        let affected: Vec<String> = serde_json::from_str(&affected_nodes).unwrap_or_default();

        Ok(EvolutionEntry {
            id: row.get("id")?,
            timestamp: parse_ts(&timestamp).unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            operation: EvolutionOperation::parse(&operation).unwrap_or(EvolutionOperation::Create),
            affected_nodes: affected.into_iter().map(NodeId::from_string).collect(),
            from_tier: from_tier.and_then(|s| Tier::parse(&s)),
            to_tier: to_tier.and_then(|s| Tier::parse(&s)),
            reasoning: row.get("reasoning")?,
            metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
        })
    }

    fn node_filter_clause(filter: &NodeFilter, params: &mut Vec<Box<dyn rusqlite::ToSql>>) -> String {
        let mut clauses = vec!["1=1".to_string()];
        if !filter.types.is_empty() {
            let placeholders = filter.types.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            clauses.push(format!("type IN ({placeholders})"));
            for t in &filter.types {
                params.push(Box::new(t.as_str().to_string()));
            }
        }
        if !filter.subtypes.is_empty() {
            let placeholders = filter.subtypes.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            clauses.push(format!("subtype IN ({placeholders})"));
            for s in &filter.subtypes {
                params.push(Box::new(s.clone()));
            }
        }
        if !filter.tiers.is_empty() {
            let placeholders = filter.tiers.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            clauses.push(format!("tier IN ({placeholders})"));
            for t in &filter.tiers {
                params.push(Box::new(t.as_str().to_string()));
            }
        }
        if let Some(min) = filter.min_confidence {
            clauses.push("confidence >= ?".to_string());
            params.push(Box::new(min));
        }
        clauses.join(" AND ")
    }
}

impl Backend for SqliteBackend {
    fn create_node(&self, mut node: Node) -> Result<Node> {
        let conn = acquire_lock(&self.conn);
        if node.id.is_unset() {
            node.id = NodeId::new();
        }
        let now = crate::now();
        if node.created_at == DateTime::<Utc>::UNIX_EPOCH {
            node.created_at = now;
        }
        if node.updated_at == DateTime::<Utc>::UNIX_EPOCH {
            node.updated_at = now;
        }
        if node.confidence == 0.0 {
            node.confidence = 1.0;
        }
        node.validate()?;

        conn.execute(
            "INSERT INTO nodes (id, type, subtype, content, embedding, tier, confidence, access_count, last_accessed, created_at, updated_at, provenance, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                node.id.as_str(),
                node.node_type.as_str(),
                node.subtype,
                node.content,
                node.embedding,
                node.tier.as_str(),
                node.confidence,
                node.access_count as i64,
                node.last_accessed.map(to_rfc3339),
                to_rfc3339(node.created_at),
                to_rfc3339(node.updated_at),
                node.provenance.to_string(),
                node.metadata.to_string(),
            ],
        )
        .map_err(|e| sql_error("create_node", e))?;
        Ok(node)
    }

    fn get_node(&self, id: &NodeId) -> Result<Node> {
        let conn = acquire_lock(&self.conn);
        conn.query_row("SELECT * FROM nodes WHERE id = ?1", params![id.as_str()], Self::node_from_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Error::not_found("node", id.to_string()),
                other => sql_error("get_node", other),
            })
    }

    fn update_node(&self, mut node: Node) -> Result<Node> {
        let conn = acquire_lock(&self.conn);
        let existing = conn
            .query_row("SELECT * FROM nodes WHERE id = ?1", params![node.id.as_str()], Self::node_from_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Error::not_found("node", node.id.to_string()),
                other => sql_error("update_node", other),
            })?;
        node.created_at = existing.created_at;
        node.updated_at = crate::now();
        node.validate()?;

        conn.execute(
            "UPDATE nodes SET type = ?2, subtype = ?3, content = ?4, embedding = ?5, tier = ?6, confidence = ?7,
                 access_count = ?8, last_accessed = ?9, updated_at = ?10, provenance = ?11, metadata = ?12
             WHERE id = ?1",
            params![
                node.id.as_str(),
                node.node_type.as_str(),
                node.subtype,
                node.content,
                node.embedding,
                node.tier.as_str(),
                node.confidence,
                node.access_count as i64,
                node.last_accessed.map(to_rfc3339),
                to_rfc3339(node.updated_at),
                node.provenance.to_string(),
                node.metadata.to_string(),
            ],
        )
        .map_err(|e| sql_error("update_node", e))?;
        Ok(node)
    }

    fn delete_node(&self, id: &NodeId) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        let affected = conn
            .execute("DELETE FROM nodes WHERE id = ?1", params![id.as_str()])
            .map_err(|e| sql_error("delete_node", e))?;
        if affected == 0 {
            return Err(Error::not_found("node", id.to_string()));
        }
        Ok(())
    }

    fn list_nodes(&self, filter: &NodeFilter) -> Result<Vec<Node>> {
        let conn = acquire_lock(&self.conn);
        let mut sql_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        let clause = Self::node_filter_clause(filter, &mut sql_params);
        let mut sql = format!("SELECT * FROM nodes WHERE {clause} ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = filter.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        let mut stmt = conn.prepare(&sql).map_err(|e| sql_error("list_nodes", e))?;
        let refs: Vec<&dyn rusqlite::ToSql> = sql_params.iter().map(std::convert::AsRef::as_ref).collect();
        let rows = stmt
            .query_map(refs.as_slice(), Self::node_from_row)
            .map_err(|e| sql_error("list_nodes", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| sql_error("list_nodes", e))
    }

    fn count_nodes(&self, filter: &NodeFilter) -> Result<usize> {
        let conn = acquire_lock(&self.conn);
        let mut sql_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        let clause = Self::node_filter_clause(filter, &mut sql_params);
        let sql = format!("SELECT COUNT(*) FROM nodes WHERE {clause}");
        let refs: Vec<&dyn rusqlite::ToSql> = sql_params.iter().map(std::convert::AsRef::as_ref).collect();
        let count: i64 = conn
            .query_row(&sql, refs.as_slice(), |row| row.get(0))
            .map_err(|e| sql_error("count_nodes", e))?;
        Ok(count.max(0) as usize)
    }

    fn increment_access(&self, id: &NodeId) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        let affected = conn
            .execute(
                "UPDATE nodes SET access_count = access_count + 1, last_accessed = ?2 WHERE id = ?1",
                params![id.as_str(), to_rfc3339(crate::now())],
            )
            .map_err(|e| sql_error("increment_access", e))?;
        if affected == 0 {
            return Err(Error::not_found("node", id.to_string()));
        }
        Ok(())
    }

    fn create_hyperedge(&self, mut edge: Hyperedge) -> Result<Hyperedge> {
        let conn = acquire_lock(&self.conn);
        if edge.id.is_unset() {
            edge.id = HyperedgeId::new();
        }
        if edge.created_at == DateTime::<Utc>::UNIX_EPOCH {
            edge.created_at = crate::now();
        }
        edge.validate()?;
        conn.execute(
            "INSERT INTO hyperedges (id, type, label, weight, created_at, metadata) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                edge.id.as_str(),
                edge.edge_type.as_str(),
                edge.label,
                edge.weight,
                to_rfc3339(edge.created_at),
                edge.metadata.to_string(),
            ],
        )
        .map_err(|e| sql_error("create_hyperedge", e))?;
        Ok(edge)
    }

    fn get_hyperedge(&self, id: &HyperedgeId) -> Result<Hyperedge> {
        let conn = acquire_lock(&self.conn);
        conn.query_row("SELECT * FROM hyperedges WHERE id = ?1", params![id.as_str()], Self::hyperedge_from_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Error::not_found("hyperedge", id.to_string()),
                other => sql_error("get_hyperedge", other),
            })
    }

    fn update_hyperedge(&self, mut edge: Hyperedge) -> Result<Hyperedge> {
        let conn = acquire_lock(&self.conn);
        let existing = conn
            .query_row(
                "SELECT * FROM hyperedges WHERE id = ?1",
                params![edge.id.as_str()],
                Self::hyperedge_from_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Error::not_found("hyperedge", edge.id.to_string()),
                other => sql_error("update_hyperedge", other),
            })?;
        edge.created_at = existing.created_at;
        edge.validate()?;
        conn.execute(
            "UPDATE hyperedges SET type = ?2, label = ?3, weight = ?4, metadata = ?5 WHERE id = ?1",
            params![edge.id.as_str(), edge.edge_type.as_str(), edge.label, edge.weight, edge.metadata.to_string()],
        )
        .map_err(|e| sql_error("update_hyperedge", e))?;
        Ok(edge)
    }

    fn delete_hyperedge(&self, id: &HyperedgeId) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        let affected = conn
            .execute("DELETE FROM hyperedges WHERE id = ?1", params![id.as_str()])
            .map_err(|e| sql_error("delete_hyperedge", e))?;
        if affected == 0 {
            return Err(Error::not_found("hyperedge", id.to_string()));
        }
        Ok(())
    }

    fn list_hyperedges(&self, filter: &HyperedgeFilter) -> Result<Vec<Hyperedge>> {
        let conn = acquire_lock(&self.conn);
        let mut clauses = vec!["1=1".to_string()];
        let mut sql_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if !filter.types.is_empty() {
            let placeholders = filter.types.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            clauses.push(format!("type IN ({placeholders})"));
            for t in &filter.types {
                sql_params.push(Box::new(t.as_str().to_string()));
            }
        }
        if let Some(min) = filter.min_weight {
            clauses.push("weight >= ?".to_string());
            sql_params.push(Box::new(min));
        }
        let mut sql = format!("SELECT * FROM hyperedges WHERE {}", clauses.join(" AND "));
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        let mut stmt = conn.prepare(&sql).map_err(|e| sql_error("list_hyperedges", e))?;
        let refs: Vec<&dyn rusqlite::ToSql> = sql_params.iter().map(std::convert::AsRef::as_ref).collect();
        let rows = stmt
            .query_map(refs.as_slice(), Self::hyperedge_from_row)
            .map_err(|e| sql_error("list_hyperedges", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| sql_error("list_hyperedges", e))
    }

    fn add_membership(&self, membership: Membership) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "INSERT INTO membership (hyperedge_id, node_id, role, position) VALUES (?1, ?2, ?3, ?4)",
            params![
                membership.hyperedge_id.as_str(),
                membership.node_id.as_str(),
                membership.role.as_str(),
                membership.position,
            ],
        )
        .map_err(|e| sql_error("add_membership", e))?;
        Ok(())
    }

    fn remove_membership(&self, hyperedge_id: &HyperedgeId, node_id: &NodeId, role: Role) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        let affected = conn
            .execute(
                "DELETE FROM membership WHERE hyperedge_id = ?1 AND node_id = ?2 AND role = ?3",
                params![hyperedge_id.as_str(), node_id.as_str(), role.as_str()],
            )
            .map_err(|e| sql_error("remove_membership", e))?;
        if affected == 0 {
            return Err(Error::not_found("membership", format!("{hyperedge_id}/{node_id}/{role}")));
        }
        Ok(())
    }

    fn get_members(&self, hyperedge_id: &HyperedgeId) -> Result<Vec<Membership>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare("SELECT * FROM membership WHERE hyperedge_id = ?1 ORDER BY position")
            .map_err(|e| sql_error("get_members", e))?;
        let rows = stmt
            .query_map(params![hyperedge_id.as_str()], Self::membership_from_row)
            .map_err(|e| sql_error("get_members", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| sql_error("get_members", e))
    }

    fn get_member_nodes(&self, hyperedge_id: &HyperedgeId) -> Result<Vec<Node>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare(
                "SELECT n.* FROM nodes n
                 JOIN membership m ON m.node_id = n.id
                 WHERE m.hyperedge_id = ?1
                 ORDER BY m.position",
            )
            .map_err(|e| sql_error("get_member_nodes", e))?;
        let rows = stmt
            .query_map(params![hyperedge_id.as_str()], Self::node_from_row)
            .map_err(|e| sql_error("get_member_nodes", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| sql_error("get_member_nodes", e))
    }

    fn get_node_hyperedges(&self, node_id: &NodeId) -> Result<Vec<Hyperedge>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT h.* FROM hyperedges h
                 JOIN membership m ON m.hyperedge_id = h.id
                 WHERE m.node_id = ?1",
            )
            .map_err(|e| sql_error("get_node_hyperedges", e))?;
        let rows = stmt
            .query_map(params![node_id.as_str()], Self::hyperedge_from_row)
            .map_err(|e| sql_error("get_node_hyperedges", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| sql_error("get_node_hyperedges", e))
    }

    fn search_by_content(&self, query: &str, opts: &SearchOptions) -> Result<Vec<SearchResult>> {
        let conn = acquire_lock(&self.conn);
        let mut clauses = vec!["tier != 'archive'".to_string()];
        let mut sql_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if !opts.types.is_empty() {
            let placeholders = opts.types.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            clauses.push(format!("type IN ({placeholders})"));
            for t in &opts.types {
                sql_params.push(Box::new(t.as_str().to_string()));
            }
        }
        if !opts.tiers.is_empty() {
            let placeholders = opts.tiers.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            clauses.push(format!("tier IN ({placeholders})"));
            for t in &opts.tiers {
                sql_params.push(Box::new(t.as_str().to_string()));
            }
        }
        if !opts.subtypes.is_empty() {
            let placeholders = opts.subtypes.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            clauses.push(format!("subtype IN ({placeholders})"));
            for s in &opts.subtypes {
                sql_params.push(Box::new(s.clone()));
            }
        }
        if let Some(min) = opts.min_confidence {
            clauses.push("confidence >= ?".to_string());
            sql_params.push(Box::new(min));
        }
        let sql = format!(
            "SELECT * FROM nodes WHERE {} ORDER BY access_count DESC, updated_at DESC",
            clauses.join(" AND ")
        );
        let mut stmt = conn.prepare(&sql).map_err(|e| sql_error("search_by_content", e))?;
        let refs: Vec<&dyn rusqlite::ToSql> = sql_params.iter().map(std::convert::AsRef::as_ref).collect();
        let rows = stmt
            .query_map(refs.as_slice(), Self::node_from_row)
            .map_err(|e| sql_error("search_by_content", e))?;
        let needle = query.to_lowercase();
        let mut results = Vec::new();
        for row in rows {
            let node = row.map_err(|e| sql_error("search_by_content", e))?;
            let count = if needle.is_empty() {
                0
            } else {
                node.content.to_lowercase().matches(&needle).count()
            };
            if count > 0 {
                results.push(SearchResult::new(node, count as f32));
            }
        }
        if opts.limit > 0 {
            results.truncate(opts.limit);
        }
        Ok(results)
    }

    fn recent_nodes(&self, limit: usize) -> Result<Vec<Node>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare("SELECT * FROM nodes WHERE tier != 'archive' ORDER BY created_at DESC LIMIT ?1")
            .map_err(|e| sql_error("recent_nodes", e))?;
        let rows = stmt
            .query_map(params![limit as i64], Self::node_from_row)
            .map_err(|e| sql_error("recent_nodes", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| sql_error("recent_nodes", e))
    }

    fn immediate_neighbors(&self, node_id: &NodeId, direction: Direction) -> Result<Vec<(Node, Hyperedge)>> {
        let conn = acquire_lock(&self.conn);
        let role_filter = match direction {
            Direction::Outgoing => "m_self.role = 'subject' AND m_other.role = 'object'",
            Direction::Incoming => "m_self.role = 'object' AND m_other.role = 'subject'",
            Direction::Both => "1=1",
        };
        let sql = format!(
            "SELECT DISTINCT n.*, h.id AS edge_id, h.type AS edge_type, h.label AS edge_label,
                    h.weight AS edge_weight, h.created_at AS edge_created_at, h.metadata AS edge_metadata
             FROM membership m_self
             JOIN membership m_other ON m_other.hyperedge_id = m_self.hyperedge_id AND m_other.node_id != m_self.node_id
             JOIN nodes n ON n.id = m_other.node_id
             JOIN hyperedges h ON h.id = m_self.hyperedge_id
             WHERE m_self.node_id = ?1 AND n.tier != 'archive' AND ({role_filter})"
        );
        let mut stmt = conn.prepare(&sql).map_err(|e| sql_error("immediate_neighbors", e))?;
        let rows = stmt
            .query_map(params![node_id.as_str()], |row| {
                let node = Self::node_from_row(row)?;
                let edge_type: String = row.get("edge_type")?;
                let edge_created_at: String = row.get("edge_created_at")?;
                let edge_metadata: String = row.get("edge_metadata")?;
                let edge_id: String = row.get("edge_id")?;
                let edge = Hyperedge {
                    id: HyperedgeId::from_string(edge_id),
                    edge_type: HyperedgeType::parse(&edge_type).unwrap_or(HyperedgeType::Relation),
                    label: row.get("edge_label")?,
                    weight: row.get("edge_weight")?,
                    created_at: parse_ts(&edge_created_at).unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
                    metadata: serde_json::from_str(&edge_metadata).unwrap_or(serde_json::Value::Null),
                };
                Ok((node, edge))
            })
            .map_err(|e| sql_error("immediate_neighbors", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| sql_error("immediate_neighbors", e))
    }

    fn record_evolution(&self, mut entry: EvolutionEntry) -> Result<EvolutionEntry> {
        let conn = acquire_lock(&self.conn);
        if entry.timestamp == DateTime::<Utc>::UNIX_EPOCH {
            entry.timestamp = crate::now();
        }
        let affected: Vec<String> = entry.affected_nodes.iter().map(ToString::to_string).collect();
        conn.execute(
            "INSERT INTO evolution_log (timestamp, operation, affected_nodes, from_tier, to_tier, reasoning, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                to_rfc3339(entry.timestamp),
                entry.operation.as_str(),
                serde_json::to_string(&affected).unwrap_or_else(|_| "[]".to_string()),
                entry.from_tier.map(Tier::as_str),
                entry.to_tier.map(Tier::as_str),
                entry.reasoning,
                entry.metadata.to_string(),
            ],
        )
        .map_err(|e| sql_error("record_evolution", e))?;
        entry.id = Some(conn.last_insert_rowid());
        Ok(entry)
    }

    fn list_evolution(&self, operation: Option<EvolutionOperation>, limit: usize) -> Result<Vec<EvolutionEntry>> {
        let conn = acquire_lock(&self.conn);
        let (sql, op_str);
        let mut stmt;
        let rows = if let Some(op) = operation {
            op_str = op.as_str().to_string();
            sql = "SELECT * FROM evolution_log WHERE operation = ?1 ORDER BY timestamp DESC LIMIT ?2";
            stmt = conn.prepare(sql).map_err(|e| sql_error("list_evolution", e))?;
            stmt.query_map(params![op_str, limit as i64], Self::evolution_from_row)
                .map_err(|e| sql_error("list_evolution", e))?
                .collect::<rusqlite::Result<Vec<_>>>()
        } else {
            sql = "SELECT * FROM evolution_log ORDER BY timestamp DESC LIMIT ?1";
            stmt = conn.prepare(sql).map_err(|e| sql_error("list_evolution", e))?;
            stmt.query_map(params![limit as i64], Self::evolution_from_row)
                .map_err(|e| sql_error("list_evolution", e))?
                .collect::<rusqlite::Result<Vec<_>>>()
        };
        rows.map_err(|e| sql_error("list_evolution", e))
    }

    fn find_preference(&self, key: &str, scope: PreferenceScope, scope_value: Option<&str>) -> Result<Option<Node>> {
        let conn = acquire_lock(&self.conn);
        let sql = "SELECT * FROM nodes
                    WHERE subtype = 'user_preference'
                      AND json_extract(metadata, '$.key') = ?1
                      AND json_extract(metadata, '$.scope') = ?2
                      AND (json_extract(metadata, '$.scope_value') IS ?3)";
        let mut stmt = conn.prepare(sql).map_err(|e| sql_error("find_preference", e))?;
        let mut rows = stmt
            .query_map(params![key, scope.as_str(), scope_value], Self::node_from_row)
            .map_err(|e| sql_error("find_preference", e))?;
        match rows.next() {
            Some(row) => Ok(Some(row.map_err(|e| sql_error("find_preference", e))?)),
            None => Ok(None),
        }
    }

    fn stats(&self) -> Result<BackendStats> {
        let conn = acquire_lock(&self.conn);
        let mut stats = BackendStats::new();
        stats.node_count = conn
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get::<_, i64>(0))
            .map_err(|e| sql_error("stats", e))? as usize;
        stats.hyperedge_count = conn
            .query_row("SELECT COUNT(*) FROM hyperedges", [], |row| row.get::<_, i64>(0))
            .map_err(|e| sql_error("stats", e))? as usize;
        stats.membership_count = conn
            .query_row("SELECT COUNT(*) FROM membership", [], |row| row.get::<_, i64>(0))
            .map_err(|e| sql_error("stats", e))? as usize;

        let mut tier_stmt = conn
            .prepare("SELECT tier, COUNT(*) FROM nodes GROUP BY tier")
            .map_err(|e| sql_error("stats", e))?;
        let tier_rows = tier_stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(|e| sql_error("stats", e))?;
        for row in tier_rows {
            let (tier, count) = row.map_err(|e| sql_error("stats", e))?;
            stats.nodes_by_tier.insert(tier, count as usize);
        }

        let mut type_stmt = conn
            .prepare("SELECT type, COUNT(*) FROM nodes GROUP BY type")
            .map_err(|e| sql_error("stats", e))?;
        let type_rows = type_stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(|e| sql_error("stats", e))?;
        for row in type_rows {
            let (node_type, count) = row.map_err(|e| sql_error("stats", e))?;
            stats.nodes_by_type.insert(node_type, count as usize);
        }

        Ok(stats)
    }

    fn with_tx(&self, f: &mut dyn FnMut() -> Result<()>) -> Result<()> {
        {
            let conn = acquire_lock(&self.conn);
            conn.execute_batch("BEGIN IMMEDIATE").map_err(|e| sql_error("with_tx_begin", e))?;
        }
        match f() {
            Ok(()) => {
                let conn = acquire_lock(&self.conn);
                conn.execute_batch("COMMIT").map_err(|e| sql_error("with_tx_commit", e))?;
                Ok(())
            }
            Err(err) => {
                let conn = acquire_lock(&self.conn);
                let _ = conn.execute_batch("ROLLBACK");
                Err(err)
            }
        }
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConnectOptions, NodeType};

    fn backend() -> SqliteBackend {
        SqliteBackend::open_in_memory().unwrap()
    }

    #[test]
    fn test_create_and_get_node() {
        let b = backend();
        let created = b.create_node(Node::new(NodeType::Fact, "hello")).unwrap();
        let fetched = b.get_node(&created.id).unwrap();
        assert_eq!(fetched.content, "hello");
        assert!((fetched.confidence - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_get_missing_node_is_not_found() {
        let b = backend();
        let err = b.get_node(&NodeId::new()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete_node_cascades_membership() {
        let b = backend();
        let a = b.create_node(Node::new(NodeType::Entity, "a")).unwrap();
        let c = b.create_node(Node::new(NodeType::Entity, "c")).unwrap();
        let edge = b.create_relation("relates to", &a.id, &c.id).unwrap();
        b.delete_node(&a.id).unwrap();
        assert!(b.get_members(&edge.id).unwrap().is_empty());
    }

    #[test]
    fn test_list_nodes_filters_by_type() {
        let b = backend();
        b.create_node(Node::new(NodeType::Fact, "f1")).unwrap();
        b.create_node(Node::new(NodeType::Entity, "e1")).unwrap();
        let filter = NodeFilter::new().with_type(NodeType::Fact);
        let results = b.list_nodes(&filter).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].node_type, NodeType::Fact);
    }

    #[test]
    fn test_search_excludes_archived() {
        let b = backend();
        b.create_node(Node::new(NodeType::Fact, "if err != nil return err").with_tier(Tier::Archive)).unwrap();
        b.create_node(Node::new(NodeType::Fact, "if err != nil return err")).unwrap();
        let results = b.search_by_content("if err", &SearchOptions::new()).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_get_connected_both_directions() {
        let b = backend();
        let a = b.create_node(Node::new(NodeType::Entity, "a")).unwrap();
        let c = b.create_node(Node::new(NodeType::Entity, "c")).unwrap();
        b.create_relation("relates to", &a.id, &c.id).unwrap();
        let opts = ConnectOptions::new().with_direction(Direction::Outgoing);
        let from_a = b.get_connected(&a.id, &opts).unwrap();
        assert_eq!(from_a.len(), 1);
        let from_c = b.get_connected(&c.id, &opts).unwrap();
        assert!(from_c.is_empty());
    }

    #[test]
    fn test_find_preference_roundtrip() {
        let b = backend();
        let node = Node::new(NodeType::Decision, "tabs=true")
            .with_subtype("user_preference")
            .with_metadata(serde_json::json!({"key": "tabs", "value": true, "scope": "global"}));
        b.create_node(node).unwrap();
        let found = b.find_preference("tabs", PreferenceScope::Global, None).unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn test_with_tx_rolls_back_on_error() {
        let b = backend();
        let a = b.create_node(Node::new(NodeType::Entity, "a")).unwrap();
        let before = b.count_nodes(&NodeFilter::new()).unwrap();
        let result = b.with_tx(&mut || {
            b.create_node(Node::new(NodeType::Entity, "doomed"))?;
            Err(Error::InvalidInput("rollback please".to_string()))
        });
        assert!(result.is_err());
        let after = b.count_nodes(&NodeFilter::new()).unwrap();
        assert_eq!(before, after);
        let _ = a;
    }

    #[test]
    fn test_evolution_log_filters_by_operation() {
        let b = backend();
        b.record_evolution(EvolutionEntry::new(EvolutionOperation::Create)).unwrap();
        b.record_evolution(EvolutionEntry::new(EvolutionOperation::Decay)).unwrap();
        let created = b.list_evolution(Some(EvolutionOperation::Create), 10).unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].operation, EvolutionOperation::Create);
    }
}
