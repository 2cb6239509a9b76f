//! Integration tests for the tool registry contract.
//!
//! Every tool is driven through `ToolProvider::execute_tool` against the
//! seeded mock backend and checked for the `{success, data | error}` shape.

use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use triai_mcp_server::db::{Backend, BackendKind, LinkOptions};
use triai_mcp_server::{ToolEnvelope, ToolKind, ToolProvider};

fn provider() -> ToolProvider<Backend> {
    let backend = Backend::open(BackendKind::Mock, None, LinkOptions::default()).unwrap();
    ToolProvider::new(Arc::new(backend), "DataAnalyst").with_home_alias("TriAI_Main")
}

async fn ok(provider: &ToolProvider<Backend>, tool: &str, params: JsonValue) -> JsonValue {
    let envelope = provider.execute_tool(tool, params).await;
    assert!(
        envelope.success,
        "{} should succeed, got: {:?}",
        tool, envelope.error
    );
    assert!(envelope.error.is_none());
    envelope.data.expect("success carries data")
}

fn names(rows: &JsonValue, key: &str) -> Vec<String> {
    rows.as_array()
        .unwrap()
        .iter()
        .map(|row| row[key].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_connect_to_database() {
    let data = ok(
        &provider(),
        "connect_to_database",
        json!({"server_instance": "localhost", "database_name": "TriAI_Main"}),
    )
    .await;
    assert_eq!(data["connected"], true);
    assert_eq!(data["server"], "localhost");
    assert_eq!(data["database"], "TriAI_Main");
    assert!(data.get("error").is_none());
}

#[tokio::test]
async fn test_list_databases() {
    let data = ok(&provider(), "list_databases", json!({"server_instance": "localhost"})).await;
    let databases: Vec<&str> = data
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(databases, vec!["TriAI_Main", "SalesDB", "CustomerDB", "InventoryDB"]);
}

#[tokio::test]
async fn test_get_schema_info_all_types() {
    let data = ok(&provider(), "get_schema_info", json!({"database_name": "TriAI_Main"})).await;
    let tables = names(&data["tables"], "name");
    assert!(tables.contains(&"AI_Agents".to_string()));
    assert!(tables.contains(&"AI_Memories".to_string()));
    assert!(tables.contains(&"Members".to_string()));
    assert_eq!(names(&data["views"], "name"), vec!["vw_ActiveAgents", "vw_RecentMessages"]);
    assert_eq!(data["views"][0]["type"], "VIEW");
    assert_eq!(
        names(&data["procedures"], "name"),
        vec!["sp_GetAgentStats", "sp_CleanupOldMemories"]
    );
}

#[tokio::test]
async fn test_get_schema_info_restricted_types() {
    let data = ok(
        &provider(),
        "get_schema_info",
        json!({"databaseName": "TriAI_Main", "objectTypes": ["views"]}),
    )
    .await;
    assert!(data.get("tables").is_none_or(JsonValue::is_null));
    assert!(data.get("procedures").is_none_or(JsonValue::is_null));
    assert_eq!(data["views"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_describe_table_with_sample() {
    let data = ok(
        &provider(),
        "describe_table",
        json!({
            "database_name": "TriAI_Main",
            "table_name": "AI_Memories",
            "include_sample_data": true
        }),
    )
    .await;
    assert_eq!(data["table_name"], "AI_Memories");
    let columns = names(&data["columns"], "name");
    assert_eq!(columns.len(), 9);
    assert_eq!(columns[0], "Memory_ID");
    assert!(columns.contains(&"Related_To".to_string()));
    assert_eq!(data["sample_data"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_describe_table_without_sample() {
    let data = ok(
        &provider(),
        "describe_table",
        json!({"database_name": "TriAI_Main", "table_name": "dbo.AI_Agents"}),
    )
    .await;
    assert_eq!(data["columns"].as_array().unwrap().len(), 7);
    assert!(data.get("sample_data").is_none_or(JsonValue::is_null));
}

#[tokio::test]
async fn test_get_table_relationships() {
    let p = provider();
    let all = ok(&p, "get_table_relationships", json!({"database_name": "TriAI_Main"})).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let filtered = ok(
        &p,
        "get_table_relationships",
        json!({"database_name": "TriAI_Main", "table_name": "AI_Memories"}),
    )
    .await;
    assert_eq!(filtered.as_array().unwrap().len(), 1);
    assert_eq!(filtered[0]["parent_table"], "AI_Agents");
    assert_eq!(filtered[0]["child_table"], "AI_Memories");
    assert_eq!(filtered[0]["constraint_name"], "FK_Memories_Agent");
}

#[tokio::test]
async fn test_get_table_dependencies() {
    let data = ok(
        &provider(),
        "get_table_dependencies",
        json!({"database_name": "TriAI_Main", "table_name": "AI_Agents"}),
    )
    .await;
    assert_eq!(names(&data, "dependent_object"), vec!["vw_ActiveAgents"]);
    assert_eq!(data[0]["dependency_type"], "VIEW");
}

#[tokio::test]
async fn test_execute_query_and_history() {
    let p = provider();
    let data = ok(
        &p,
        "execute_query",
        json!({"database_name": "TriAI_Main", "sql_query": "SELECT * FROM Branches"}),
    )
    .await;
    assert_eq!(data["row_count"], 3);
    assert_eq!(data["results"].as_array().unwrap().len(), 3);
    assert_eq!(data["query"], "SELECT * FROM Branches LIMIT 1000");

    let history = ok(&p, "get_query_history", json!({"agent_name": "DataAnalyst"})).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["sql_query"], "SELECT * FROM Branches LIMIT 1000");
    assert_eq!(history[0]["row_count"], 3);
}

#[tokio::test]
async fn test_execute_query_respects_caller_limit() {
    let p = provider();
    let data = ok(
        &p,
        "execute_query",
        json!({"database_name": "TriAI_Main", "sql_query": "SELECT * FROM AI_Agents LIMIT 3"}),
    )
    .await;
    assert_eq!(data["query"], "SELECT * FROM AI_Agents LIMIT 3");
    let rows = data["results"].as_array().unwrap();
    assert!(rows.len() <= 3);
    for row in rows {
        let logical = p
            .compat()
            .row_to_logical("ai_agents", row.as_object().unwrap().clone());
        assert!(logical.get("agent").is_some_and(JsonValue::is_string));
    }
}

#[tokio::test]
async fn test_execute_query_soft_rejection() {
    let envelope = provider()
        .execute_tool(
            "execute_query",
            json!({"database_name": "TriAI_Main", "sql_query": "WITH x AS (SELECT 1) SELECT * FROM x"}),
        )
        .await;
    assert_eq!(
        envelope.to_json(),
        json!({"success": false, "error": "Only SELECT queries are allowed"})
    );
}

#[tokio::test]
async fn test_validate_sql() {
    let p = provider();
    let good = ok(&p, "validate_sql", json!({"sql_query": "SELECT * FROM AI_Agents"})).await;
    assert_eq!(good["valid"], true);
    assert_eq!(good["issues"], json!([]));

    let bad = ok(&p, "validate_sql", json!({"sqlQuery": "DELETE FROM AI_Agents WHERE (1 = 1"})).await;
    assert_eq!(bad["valid"], false);
    assert!(bad["issues"].as_array().unwrap().len() >= 2);
}

#[tokio::test]
async fn test_get_query_history_seeded() {
    let data = ok(
        &provider(),
        "get_query_history",
        json!({"agent_name": "LoanAnalyst", "limit": 5}),
    )
    .await;
    let ids: Vec<i64> = data
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["query_id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 5]);
}

#[tokio::test]
async fn test_check_permissions() {
    let p = provider();
    let select = ok(
        &p,
        "check_permissions",
        json!({"database_name": "TriAI_Main", "object_name": "Members", "operation": "select"}),
    )
    .await;
    assert_eq!(select["permitted"], true);

    let drop = ok(
        &p,
        "check_permissions",
        json!({"database_name": "TriAI_Main", "object_name": "Members", "operation": "DROP"}),
    )
    .await;
    assert_eq!(drop["permitted"], false);
    assert!(drop["reason"].as_str().unwrap().contains("Only SELECT"));
}

#[tokio::test]
async fn test_sample_table_projection() {
    let data = ok(
        &provider(),
        "sample_table",
        json!({
            "database_name": "TriAI_Main",
            "table_name": "Members",
            "row_count": 3,
            "columns": ["First_Name", "Credit_Score"]
        }),
    )
    .await;
    let rows = data.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    for row in rows {
        assert_eq!(row.as_object().unwrap().len(), 2);
    }
    assert_eq!(rows[0]["First_Name"], "Sarah");
}

#[tokio::test]
async fn test_get_column_stats() {
    let data = ok(
        &provider(),
        "get_column_stats",
        json!({"database_name": "TriAI_Main", "table_name": "Members", "column_name": "Credit_Score"}),
    )
    .await;
    assert_eq!(data["total_rows"], 9);
    assert_eq!(data["non_null_count"], 9);
    assert_eq!(data["null_count"], 0);
    assert_eq!(data["unique_values"], 9);
    assert_eq!(data["min_value"], 658);
    assert_eq!(data["max_value"], 798);
}

#[tokio::test]
async fn test_memory_tools_round() {
    let p = provider();
    let stored = ok(
        &p,
        "store_memory",
        json!({
            "agent_name": "DataAnalyst",
            "memory_label": "Quarterly Sales",
            "memory_content": "Sales team wants quarter over quarter growth",
            "related_to_tags": "sales analysis quarterly"
        }),
    )
    .await;
    assert_eq!(stored["stored"], true);
    let id = stored["memory_id"].as_i64().unwrap();
    assert_eq!(id, 6);

    let recalled = ok(
        &p,
        "retrieve_memories",
        json!({"agent_name": "DataAnalyst", "related_to_tags": "quarterly"}),
    )
    .await;
    assert_eq!(recalled[0]["memory_id"], id);
    assert_eq!(recalled[0]["times_recalled"], 1);

    let found = ok(
        &p,
        "search_memories",
        json!({"agent_name": "DataAnalyst", "search_text": "growth"}),
    )
    .await;
    assert_eq!(found.as_array().unwrap().len(), 1);

    let updated = ok(
        &p,
        "update_memory",
        json!({"memory_id": id, "memory_content": "Growth by region", "related_to_tags": "sales region"}),
    )
    .await;
    assert_eq!(updated["updated"], true);

    let stats = ok(&p, "get_memory_stats", json!({"agent_name": "DataAnalyst"})).await;
    assert_eq!(stats["total_memories"], 1);
    assert_eq!(stats["max_recalls"], 1);
    assert_eq!(stats["top_tags"], json!([["region", 1], ["sales", 1]]));

    let deleted = ok(&p, "delete_memory", json!({"memory_id": id})).await;
    assert_eq!(deleted["deleted"], true);

    let envelope = p.execute_tool("delete_memory", json!({"memory_id": id})).await;
    assert!(!envelope.success);
    assert_eq!(envelope.error.unwrap(), format!("Memory {} not found", id));
}

#[tokio::test]
async fn test_purge_expired_memories_without_params() {
    let data = ok(&provider(), "purge_expired_memories", JsonValue::Null).await;
    assert_eq!(data["purged"], 0);
    assert_eq!(data["memory_ids"], json!([]));
}

#[tokio::test]
async fn test_stats_for_unknown_agent_keep_shape() {
    let data = ok(&provider(), "get_memory_stats", json!({"agent_name": "Nobody"})).await;
    assert_eq!(data["total_memories"], 0);
    assert_eq!(data["avg_recalls"], 0.0);
    assert_eq!(data["top_tags"], json!([]));
}

#[tokio::test]
async fn test_unknown_tool_lists_registry() {
    let envelope = provider().execute_tool("Execute_Query", json!({})).await;
    assert!(!envelope.success);
    assert!(envelope.data.is_none());
    assert_eq!(envelope.error.as_deref(), Some("Unknown tool: Execute_Query"));
    let available = envelope.available_tools.unwrap();
    assert_eq!(available.len(), ToolKind::ALL.len());
    assert_eq!(available[0], "connect_to_database");
}

#[tokio::test]
async fn test_invalid_params_for_every_tool_needing_input() {
    let p = provider();
    for kind in ToolKind::ALL {
        if kind == ToolKind::PurgeExpiredMemories {
            continue;
        }
        let envelope = p.execute_tool(kind.as_str(), json!({"unexpected": 1})).await;
        assert!(!envelope.success, "{} should reject empty params", kind);
        let error = envelope.error.unwrap();
        assert!(
            error.starts_with(&format!("Invalid parameters for {}", kind)),
            "unexpected error for {}: {}",
            kind,
            error
        );
    }
}

#[tokio::test]
async fn test_envelope_has_exactly_one_payload() {
    let p = provider();
    let calls = [
        ("list_databases", json!({"server_instance": "x"})),
        ("check_permissions", json!({"database_name": "x", "object_name": "y", "operation": "UPDATE"})),
        ("update_memory", json!({"memory_id": 404, "memory_content": "x"})),
        ("no_such_tool", json!({})),
    ];
    for (tool, params) in calls {
        let envelope: ToolEnvelope = p.execute_tool(tool, params).await;
        assert_ne!(envelope.data.is_some(), envelope.error.is_some(), "{}", tool);
        assert_eq!(envelope.success, envelope.data.is_some(), "{}", tool);
    }
}
