//! Agent memory tools.
//!
//! Memories live in `ai_memories` and are always read back through
//! `SchemaCompatibility`, so handlers work on logical rows whatever the
//! backend. Matching, ranking, statistics and expiry are evaluated here rather
//! than in SQL so every backend (the mock included) answers the same way.
//!
//! `retrieve_memories` is not read-only: each memory it returns has its recall
//! counter incremented and its last-recalled time set.

use crate::db::DataLink;
use crate::error::{DbError, DbResult};
use crate::models::{Memory, Row, STORE_TIMESTAMP_FORMAT, now_timestamp, parse_timestamp};
use crate::tools::provider::ToolProvider;
use chrono::Local;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::collections::HashMap;
use tracing::{debug, info};

const MEMORY_TABLE: &str = "ai_memories";

/// Tags reported by `get_memory_stats`.
const TOP_TAG_COUNT: usize = 5;

fn default_memory_limit() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct StoreMemoryInput {
    #[serde(alias = "agentName")]
    pub agent_name: String,
    #[serde(alias = "memoryLabel")]
    pub memory_label: String,
    #[serde(alias = "memoryContent")]
    pub memory_content: String,
    /// Space-separated tags
    #[serde(alias = "relatedToTags")]
    pub related_to_tags: String,
    /// Expiry timestamp (ISO 8601); omit to keep forever
    #[serde(default, alias = "purgeAfter")]
    pub purge_after: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RetrieveMemoriesInput {
    #[serde(alias = "agentName")]
    pub agent_name: String,
    /// Space-separated tags; a memory matches when any tag occurs in its tag string
    #[serde(alias = "relatedToTags")]
    pub related_to_tags: String,
    /// Default: 10
    #[serde(default = "default_memory_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchMemoriesInput {
    #[serde(alias = "agentName")]
    pub agent_name: String,
    /// Matched case-insensitively against label and content
    #[serde(alias = "searchText")]
    pub search_text: String,
    /// Default: 10
    #[serde(default = "default_memory_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UpdateMemoryInput {
    #[serde(alias = "memoryId")]
    pub memory_id: i64,
    #[serde(alias = "memoryContent")]
    pub memory_content: String,
    /// Replaces the tag string when present
    #[serde(default, alias = "relatedToTags")]
    pub related_to_tags: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DeleteMemoryInput {
    #[serde(alias = "memoryId")]
    pub memory_id: i64,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AgentInput {
    #[serde(alias = "agentName")]
    pub agent_name: String,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct PurgeMemoriesInput {
    /// Only purge this agent's memories. Default: every agent
    #[serde(default, alias = "agentName")]
    pub agent_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreMemoryOutput {
    pub memory_id: Option<i64>,
    pub agent: String,
    pub stored: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateMemoryOutput {
    pub memory_id: i64,
    pub updated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteMemoryOutput {
    pub memory_id: i64,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryStatsOutput {
    pub total_memories: usize,
    pub avg_recalls: f64,
    pub max_recalls: i64,
    pub unused_memories: usize,
    /// `[tag, count]` pairs, most frequent first, ties by tag
    pub top_tags: Vec<(String, usize)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurgeOutput {
    pub purged: u64,
    pub memory_ids: Vec<i64>,
}

impl MemoryStatsOutput {
    fn from_memories(memories: &[Memory]) -> Self {
        let total = memories.len();
        let recalls: i64 = memories.iter().map(|m| m.times_recalled).sum();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for tag in memories.iter().flat_map(Memory::tags) {
            *counts.entry(tag).or_default() += 1;
        }
        let mut top_tags: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(tag, count)| (tag.to_string(), count))
            .collect();
        top_tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_tags.truncate(TOP_TAG_COUNT);

        Self {
            total_memories: total,
            avg_recalls: if total == 0 {
                0.0
            } else {
                recalls as f64 / total as f64
            },
            max_recalls: memories.iter().map(|m| m.times_recalled).max().unwrap_or(0),
            unused_memories: memories.iter().filter(|m| m.times_recalled == 0).count(),
            top_tags,
        }
    }
}

impl<L: DataLink> ToolProvider<L> {
    fn memory_field(&self, logical: &'static str) -> &'static str {
        self.compat.field_name(MEMORY_TABLE, logical)
    }

    fn literal(&self, value: &str) -> String {
        self.link.escape(&JsonValue::from(value), true)
    }

    /// Memories as logical entities, in store order. `None` loads every agent.
    async fn load_memories(&self, agent: Option<&str>) -> DbResult<Vec<Memory>> {
        let filter = agent.map(|a| format!("{} = {}", self.memory_field("agent"), self.literal(a)));
        let sql = self
            .compat
            .build_select(MEMORY_TABLE, &[], filter.as_deref(), None, None);
        let rows = self.link.query(&sql).await?;
        self.compat
            .rows_to_logical(MEMORY_TABLE, rows)
            .iter()
            .map(Memory::from_row)
            .collect()
    }

    /// `WHERE Memory_ID = <id>` in physical names.
    fn memory_id_filter(&self, memory_id: i64) -> String {
        format!("{} = {}", self.memory_field("memory_id"), memory_id)
    }

    pub async fn store_memory(&self, input: StoreMemoryInput) -> DbResult<StoreMemoryOutput> {
        let purge_after = match input.purge_after.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                parse_timestamp(raw)
                    .ok_or_else(|| {
                        DbError::invalid_input(format!("Invalid purge_after timestamp: {}", raw))
                    })?
                    .format(STORE_TIMESTAMP_FORMAT)
                    .to_string(),
            ),
        };

        let mut logical = match json!({
            "agent": input.agent_name,
            "first_posted": now_timestamp(),
            "times_recalled": 0,
            "memory_label": input.memory_label,
            "memory": input.memory_content,
            "related_to": input.related_to_tags,
        }) {
            JsonValue::Object(map) => map,
            _ => Row::new(),
        };
        if let Some(purge_after) = purge_after {
            logical.insert("purge_after".into(), purge_after.into());
        }

        let row = self.compat.row_from_logical(MEMORY_TABLE, logical);
        let memory_id = self
            .link
            .insert_returning(
                self.compat.table_name(MEMORY_TABLE),
                &row,
                self.memory_field("memory_id"),
            )
            .await?;

        info!(agent = %input.agent_name, memory_id = ?memory_id, "memory stored");
        Ok(StoreMemoryOutput {
            memory_id,
            agent: input.agent_name,
            stored: true,
        })
    }

    /// Matching memories, best ranked first, with their counters already bumped.
    pub async fn retrieve_memories(&self, input: RetrieveMemoriesInput) -> DbResult<Vec<Memory>> {
        let tags: Vec<String> = input
            .related_to_tags
            .split_whitespace()
            .map(String::from)
            .collect();
        if tags.is_empty() {
            return Ok(Vec::new());
        }

        let mut matches: Vec<Memory> = self
            .load_memories(Some(&input.agent_name))
            .await?
            .into_iter()
            .filter(|m| m.matches_any_tag(&tags))
            .collect();
        matches.sort_by(Memory::recall_order);
        matches.truncate(input.limit as usize);

        let recalled_at = now_timestamp();
        let times_recalled = self.memory_field("times_recalled");
        for memory in &mut matches {
            let sql = format!(
                "UPDATE {} SET {} = COALESCE({}, 0) + 1, {} = {} WHERE {}",
                self.compat.table_name(MEMORY_TABLE),
                times_recalled,
                times_recalled,
                self.memory_field("last_recalled"),
                self.literal(&recalled_at),
                self.memory_id_filter(memory.memory_id)
            );
            self.link.execute(&sql).await?;
            memory.times_recalled += 1;
            memory.last_recalled = Some(recalled_at.clone());
        }
        debug!(agent = %input.agent_name, recalled = matches.len(), "memories recalled");
        Ok(matches)
    }

    /// Label or content matches, in store order. Does not touch recall counters.
    pub async fn search_memories(&self, input: SearchMemoriesInput) -> DbResult<Vec<Memory>> {
        Ok(self
            .load_memories(Some(&input.agent_name))
            .await?
            .into_iter()
            .filter(|m| m.mentions(&input.search_text))
            .take(input.limit as usize)
            .collect())
    }

    pub async fn update_memory(&self, input: UpdateMemoryInput) -> DbResult<UpdateMemoryOutput> {
        let mut assignments = vec![format!(
            "{} = {}",
            self.memory_field("memory"),
            self.literal(&input.memory_content)
        )];
        if let Some(tags) = &input.related_to_tags {
            assignments.push(format!("{} = {}", self.memory_field("related_to"), self.literal(tags)));
        }
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            self.compat.table_name(MEMORY_TABLE),
            assignments.join(", "),
            self.memory_id_filter(input.memory_id)
        );
        if self.link.execute(&sql).await? == 0 {
            return Err(DbError::invalid_input(format!("Memory {} not found", input.memory_id)));
        }
        Ok(UpdateMemoryOutput {
            memory_id: input.memory_id,
            updated: true,
        })
    }

    pub async fn delete_memory(&self, input: DeleteMemoryInput) -> DbResult<DeleteMemoryOutput> {
        let sql = format!(
            "DELETE FROM {} WHERE {}",
            self.compat.table_name(MEMORY_TABLE),
            self.memory_id_filter(input.memory_id)
        );
        if self.link.execute(&sql).await? == 0 {
            return Err(DbError::invalid_input(format!("Memory {} not found", input.memory_id)));
        }
        info!(memory_id = input.memory_id, "memory deleted");
        Ok(DeleteMemoryOutput {
            memory_id: input.memory_id,
            deleted: true,
        })
    }

    pub async fn get_memory_stats(&self, input: AgentInput) -> DbResult<MemoryStatsOutput> {
        let memories = self.load_memories(Some(&input.agent_name)).await?;
        Ok(MemoryStatsOutput::from_memories(&memories))
    }

    /// Delete memories whose `purge_after` has passed.
    pub async fn purge_expired_memories(&self, input: PurgeMemoriesInput) -> DbResult<PurgeOutput> {
        let now = Local::now().naive_local();
        let memory_ids: Vec<i64> = self
            .load_memories(input.agent_name.as_deref())
            .await?
            .into_iter()
            .filter(|m| m.is_expired(now))
            .map(|m| m.memory_id)
            .collect();
        if memory_ids.is_empty() {
            return Ok(PurgeOutput {
                purged: 0,
                memory_ids,
            });
        }

        let id_list = memory_ids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "DELETE FROM {} WHERE {} IN ({})",
            self.compat.table_name(MEMORY_TABLE),
            self.memory_field("memory_id"),
            id_list
        );
        let purged = self.link.execute(&sql).await?;
        info!(purged, "expired memories purged");
        Ok(PurgeOutput { purged, memory_ids })
    }
}
