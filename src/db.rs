use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::{EngagementError, Result};
use crate::metrics::MetricsCollector;
use crate::models::{
    BehaviorGroup, DirectConversation, Documentation, DocumentationPhaseLink, InstagramComment,
    InteractionHistoryEntry, NewInteraction, Phase, Unit,
};
use crate::schema::{
    behavior_groups, direct_conversations, documentation, documentation_phase_links, instagram_comments,
    interaction_history, phases, placeholders, units,
};
use crate::store::RecordStore;

// Type alias for the database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// SQLite-backed record store used by the live data source
pub struct SqliteStore {
    pool: DbPool,
    metrics: MetricsCollector,
}

impl SqliteStore {
    /// Create a connection pool on `database_url` and run the migrations
    pub fn open(database_url: &str, max_connections: u32) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = Path::new(database_url).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(database_url)
            .with_init(|conn| conn.busy_timeout(Duration::from_secs(5)));
        let pool = Pool::builder().max_size(max_connections).build(manager)?;

        let conn = pool.get()?;
        Self::run_migrations(&conn)?;
        info!(database_url, max_connections, "Record store ready");

        Ok(Self {
            pool,
            metrics: MetricsCollector::default(),
        })
    }

    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(include_str!("../migrations/2026-10-01-000000_create_tables/up.sql"))?;
        Ok(())
    }

    /// Run blocking database work on the blocking thread pool
    async fn run<T, F>(&self, operation: &'static str, work: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        let start = Instant::now();
        let result = tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            work(&conn)
        })
        .await
        .map_err(|e| EngagementError::Storage(format!("database task failed: {e}")))?;

        let elapsed = start.elapsed();
        debug!(operation, duration_ms = elapsed.as_millis() as u64, "Database operation");
        self.metrics.record_db_operation(operation, elapsed, result.is_ok());
        result
    }
}

fn parsed_column<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = EngagementError>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn json_column<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_json_column<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        serde_json::from_str(&raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn map_unit(row: &Row) -> rusqlite::Result<Unit> {
    Ok(Unit {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        location: row.get(3)?,
        current_phase_id: row.get(4)?,
        status: parsed_column(row, 5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn map_phase(row: &Row) -> rusqlite::Result<Phase> {
    Ok(Phase {
        id: row.get(0)?,
        name: row.get(1)?,
        order: row.get(2)?,
        color: row.get(3)?,
        active: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn map_behavior_group(row: &Row) -> rusqlite::Result<BehaviorGroup> {
    Ok(BehaviorGroup {
        id: row.get(0)?,
        phase_id: row.get(1)?,
        description: row.get(2)?,
        may_respond: row.get(3)?,
        active: row.get(4)?,
        default_reply: row.get(5)?,
        scope: json_column(row, 6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn map_documentation(row: &Row) -> rusqlite::Result<Documentation> {
    Ok(Documentation {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        kind: parsed_column(row, 3)?,
        active: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn map_link(row: &Row) -> rusqlite::Result<DocumentationPhaseLink> {
    Ok(DocumentationPhaseLink {
        id: row.get(0)?,
        phase_id: row.get(1)?,
        documentation_id: row.get(2)?,
        priority: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn map_interaction(row: &Row) -> rusqlite::Result<InteractionHistoryEntry> {
    let latency: i64 = row.get(7)?;
    Ok(InteractionHistoryEntry {
        id: row.get(0)?,
        unit_id: row.get(1)?,
        user_id: row.get(2)?,
        query: row.get(3)?,
        response: row.get(4)?,
        phase_id: row.get(5)?,
        success: row.get(6)?,
        latency_ms: u64::try_from(latency).unwrap_or_default(),
        confidence: row.get(8)?,
        sources: json_column(row, 9)?,
        created_at: row.get(10)?,
    })
}

fn map_comment(row: &Row) -> rusqlite::Result<InstagramComment> {
    let classification: Option<String> = row.get(5)?;
    let classification = classification
        .map(|raw| {
            raw.parse()
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))
        })
        .transpose()?;

    Ok(InstagramComment {
        id: row.get(0)?,
        unit_id: row.get(1)?,
        content: row.get(2)?,
        author: row.get(3)?,
        commented_at: row.get(4)?,
        classification,
        confidence: row.get(6)?,
        justification: row.get(7)?,
        suggested_response: row.get(8)?,
        should_respond: row.get(9)?,
        should_delete: row.get(10)?,
        processed_at: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn map_conversation(row: &Row) -> rusqlite::Result<DirectConversation> {
    Ok(DirectConversation {
        id: row.get(0)?,
        unit_id: row.get(1)?,
        external_user_id: row.get(2)?,
        display_name: row.get(3)?,
        messages: json_column(row, 4)?,
        unread_count: row.get(5)?,
        total_count: row.get(6)?,
        status: parsed_column(row, 7)?,
        metadata: json_column(row, 8)?,
        ai_suggestions: optional_json_column(row, 9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// Prefix every column of a column list with a table alias
fn qualified(alias: &str, columns: &str) -> String {
    columns
        .split(',')
        .map(|column| format!("{alias}.{}", column.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn upsert_sql(table: &str, columns: &str) -> String {
    format!(
        "INSERT OR REPLACE INTO {table} ({columns}) VALUES ({})",
        placeholders(columns)
    )
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn get_unit(&self, id: &str) -> Result<Option<Unit>> {
        let id = id.to_string();
        self.run("get_unit", move |conn| {
            let sql = format!("SELECT {} FROM {} WHERE id = ?1", units::COLUMNS, units::TABLE);
            Ok(conn.query_row(&sql, params![id], map_unit).optional()?)
        })
        .await
    }

    async fn list_units(&self) -> Result<Vec<Unit>> {
        self.run("list_units", |conn| {
            let sql = format!(
                "SELECT {} FROM {} ORDER BY created_at DESC, id ASC",
                units::COLUMNS,
                units::TABLE
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], map_unit)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn save_unit(&self, unit: &Unit) -> Result<()> {
        let unit = unit.clone();
        self.run("save_unit", move |conn| {
            conn.execute(
                &upsert_sql(units::TABLE, units::COLUMNS),
                params![
                    unit.id,
                    unit.name,
                    unit.code,
                    unit.location,
                    unit.current_phase_id,
                    unit.status.as_str(),
                    unit.created_at,
                    unit.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_phase(&self, id: &str) -> Result<Option<Phase>> {
        let id = id.to_string();
        self.run("get_phase", move |conn| {
            let sql = format!("SELECT {} FROM {} WHERE id = ?1", phases::COLUMNS, phases::TABLE);
            Ok(conn.query_row(&sql, params![id], map_phase).optional()?)
        })
        .await
    }

    async fn list_phases(&self) -> Result<Vec<Phase>> {
        self.run("list_phases", |conn| {
            let sql = format!(
                "SELECT {} FROM {} ORDER BY order_index ASC, id ASC",
                phases::COLUMNS,
                phases::TABLE
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], map_phase)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn save_phase(&self, phase: &Phase) -> Result<()> {
        let phase = phase.clone();
        self.run("save_phase", move |conn| {
            conn.execute(
                &upsert_sql(phases::TABLE, phases::COLUMNS),
                params![
                    phase.id,
                    phase.name,
                    phase.order,
                    phase.color,
                    phase.active,
                    phase.created_at,
                    phase.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn behavior_groups_for_phase(&self, phase_id: &str) -> Result<Vec<BehaviorGroup>> {
        let phase_id = phase_id.to_string();
        self.run("behavior_groups_for_phase", move |conn| {
            let sql = format!(
                "SELECT {} FROM {} WHERE phase_id = ?1 ORDER BY id ASC",
                behavior_groups::COLUMNS,
                behavior_groups::TABLE
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![phase_id], map_behavior_group)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn save_behavior_group(&self, group: &BehaviorGroup) -> Result<()> {
        let group = group.clone();
        let scope = serde_json::to_string(&group.scope)?;
        self.run("save_behavior_group", move |conn| {
            conn.execute(
                &upsert_sql(behavior_groups::TABLE, behavior_groups::COLUMNS),
                params![
                    group.id,
                    group.phase_id,
                    group.description,
                    group.may_respond,
                    group.active,
                    group.default_reply,
                    scope,
                    group.created_at,
                    group.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn documentation_for_phase(&self, phase_id: &str) -> Result<Vec<Documentation>> {
        let phase_id = phase_id.to_string();
        self.run("documentation_for_phase", move |conn| {
            let sql = format!(
                "SELECT {} FROM {} d JOIN {} l ON l.documentation_id = d.id \
                 WHERE l.phase_id = ?1 ORDER BY l.priority ASC, d.id ASC",
                qualified("d", documentation::COLUMNS),
                documentation::TABLE,
                documentation_phase_links::TABLE
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![phase_id], map_documentation)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn documentation_links_for_phase(&self, phase_id: &str) -> Result<Vec<DocumentationPhaseLink>> {
        let phase_id = phase_id.to_string();
        self.run("documentation_links_for_phase", move |conn| {
            let sql = format!(
                "SELECT {} FROM {} WHERE phase_id = ?1 ORDER BY priority ASC, id ASC",
                documentation_phase_links::COLUMNS,
                documentation_phase_links::TABLE
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![phase_id], map_link)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn save_documentation(&self, doc: &Documentation) -> Result<()> {
        let doc = doc.clone();
        self.run("save_documentation", move |conn| {
            conn.execute(
                &upsert_sql(documentation::TABLE, documentation::COLUMNS),
                params![
                    doc.id,
                    doc.title,
                    doc.content,
                    doc.kind.as_str(),
                    doc.active,
                    doc.created_at,
                    doc.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn save_documentation_link(&self, link: &DocumentationPhaseLink) -> Result<()> {
        let link = link.clone();
        self.run("save_documentation_link", move |conn| {
            conn.execute(
                &upsert_sql(documentation_phase_links::TABLE, documentation_phase_links::COLUMNS),
                params![link.id, link.phase_id, link.documentation_id, link.priority, link.created_at],
            )?;
            Ok(())
        })
        .await
    }

    async fn recent_interactions(&self, unit_id: &str, limit: usize) -> Result<Vec<InteractionHistoryEntry>> {
        let unit_id = unit_id.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.run("recent_interactions", move |conn| {
            // rowid breaks ties between entries written within the same instant
            let sql = format!(
                "SELECT {} FROM {} WHERE unit_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
                interaction_history::COLUMNS,
                interaction_history::TABLE
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![unit_id, limit], map_interaction)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn append_interaction(&self, interaction: NewInteraction) -> Result<InteractionHistoryEntry> {
        let entry = interaction.into_entry();
        let sources = serde_json::to_string(&entry.sources)?;
        self.run("append_interaction", move |conn| {
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                interaction_history::TABLE,
                interaction_history::COLUMNS,
                placeholders(interaction_history::COLUMNS)
            );
            conn.execute(
                &sql,
                params![
                    entry.id,
                    entry.unit_id,
                    entry.user_id,
                    entry.query,
                    entry.response,
                    entry.phase_id,
                    entry.success,
                    i64::try_from(entry.latency_ms).unwrap_or(i64::MAX),
                    entry.confidence,
                    sources,
                    entry.created_at,
                ],
            )?;
            Ok(entry)
        })
        .await
    }

    async fn get_comment(&self, id: &str) -> Result<Option<InstagramComment>> {
        let id = id.to_string();
        self.run("get_comment", move |conn| {
            let sql = format!(
                "SELECT {} FROM {} WHERE id = ?1",
                instagram_comments::COLUMNS,
                instagram_comments::TABLE
            );
            Ok(conn.query_row(&sql, params![id], map_comment).optional()?)
        })
        .await
    }

    async fn comments_for_unit(&self, unit_id: &str) -> Result<Vec<InstagramComment>> {
        let unit_id = unit_id.to_string();
        self.run("comments_for_unit", move |conn| {
            let sql = format!(
                "SELECT {} FROM {} WHERE unit_id = ?1 ORDER BY commented_at DESC, id ASC",
                instagram_comments::COLUMNS,
                instagram_comments::TABLE
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![unit_id], map_comment)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn save_comment(&self, comment: &InstagramComment) -> Result<()> {
        let comment = comment.clone();
        self.run("save_comment", move |conn| {
            conn.execute(
                &upsert_sql(instagram_comments::TABLE, instagram_comments::COLUMNS),
                params![
                    comment.id,
                    comment.unit_id,
                    comment.content,
                    comment.author,
                    comment.commented_at,
                    comment.classification.map(|c| c.as_str()),
                    comment.confidence,
                    comment.justification,
                    comment.suggested_response,
                    comment.should_respond,
                    comment.should_delete,
                    comment.processed_at,
                    comment.created_at,
                    comment.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<DirectConversation>> {
        let id = id.to_string();
        self.run("get_conversation", move |conn| {
            let sql = format!(
                "SELECT {} FROM {} WHERE id = ?1",
                direct_conversations::COLUMNS,
                direct_conversations::TABLE
            );
            Ok(conn.query_row(&sql, params![id], map_conversation).optional()?)
        })
        .await
    }

    async fn conversations_for_unit(&self, unit_id: &str) -> Result<Vec<DirectConversation>> {
        let unit_id = unit_id.to_string();
        self.run("conversations_for_unit", move |conn| {
            let sql = format!(
                "SELECT {} FROM {} WHERE unit_id = ?1 ORDER BY updated_at DESC, id ASC",
                direct_conversations::COLUMNS,
                direct_conversations::TABLE
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![unit_id], map_conversation)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn save_conversation(&self, conversation: &DirectConversation) -> Result<()> {
        let conversation = conversation.clone();
        let messages = serde_json::to_string(&conversation.messages)?;
        let metadata = serde_json::to_string(&conversation.metadata)?;
        let suggestions = conversation
            .ai_suggestions
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.run("save_conversation", move |conn| {
            conn.execute(
                &upsert_sql(direct_conversations::TABLE, direct_conversations::COLUMNS),
                params![
                    conversation.id,
                    conversation.unit_id,
                    conversation.external_user_id,
                    conversation.display_name,
                    messages,
                    conversation.unread_count,
                    conversation.total_count,
                    conversation.status.as_str(),
                    metadata,
                    suggestions,
                    conversation.created_at,
                    conversation.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn qualified_prefixes_every_column() {
        assert_eq!(qualified("d", "id, title"), "d.id, d.title");
    }

    #[tokio::test]
    async fn open_creates_parent_directories() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("engagement.db");
        let store = SqliteStore::open(path.to_str().expect("utf-8 path"), 2).expect("open");
        assert!(store.list_units().await.expect("list").is_empty());
        assert!(path.exists());
    }
}
