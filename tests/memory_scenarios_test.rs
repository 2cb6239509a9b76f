//! Integration tests for agent memory behaviour across calls.

use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use triai_mcp_server::db::{DataLink, LinkOptions, MockLink};
use triai_mcp_server::tools::{
    AgentInput, PurgeMemoriesInput, RetrieveMemoriesInput, SearchMemoriesInput, StoreMemoryInput,
};
use triai_mcp_server::ToolProvider;

fn provider() -> ToolProvider<MockLink> {
    ToolProvider::new(Arc::new(MockLink::new(LinkOptions::default())), "system")
}

fn sales_memory() -> StoreMemoryInput {
    StoreMemoryInput {
        agent_name: "DataAnalyst".into(),
        memory_label: "Quarterly Sales".into(),
        memory_content: "Quarterly sales analysis grouped by region".into(),
        related_to_tags: "sales analysis quarterly".into(),
        purge_after: None,
    }
}

fn recall(agent: &str, tags: &str) -> RetrieveMemoriesInput {
    RetrieveMemoriesInput {
        agent_name: agent.into(),
        related_to_tags: tags.into(),
        limit: 10,
    }
}

#[tokio::test]
async fn test_store_then_retrieve_increments_once() {
    let p = provider();
    let stored = p.store_memory(sales_memory()).await.unwrap();
    let id = stored.memory_id.unwrap();

    let recalled = p.retrieve_memories(recall("DataAnalyst", "sales")).await.unwrap();
    assert_eq!(recalled.len(), 1);
    assert_eq!(recalled[0].memory_id, id);
    assert_eq!(recalled[0].times_recalled, 1);
    assert_eq!(recalled[0].memory_label, "Quarterly Sales");
}

#[tokio::test]
async fn test_repeated_recall_is_monotonic() {
    let p = provider();
    let mut last = 0;
    for _ in 0..5 {
        let recalled = p.retrieve_memories(recall("LoanAnalyst", "loans")).await.unwrap();
        let auto_loans = recalled.iter().find(|m| m.memory_id == 1).unwrap();
        assert!(auto_loans.times_recalled > last);
        last = auto_loans.times_recalled;
    }
    // Seeded at 5, recalled five times.
    assert_eq!(last, 10);
}

#[tokio::test]
async fn test_recall_ranks_by_times_recalled() {
    let p = provider();
    // Both LoanAnalyst memories mention "credit" or "auto"; id 1 starts at 5 recalls, id 5 at 2.
    let recalled = p
        .retrieve_memories(recall("LoanAnalyst", "auto credit"))
        .await
        .unwrap();
    let ids: Vec<i64> = recalled.iter().map(|m| m.memory_id).collect();
    assert_eq!(ids, vec![1, 5]);
}

#[tokio::test]
async fn test_recall_limit_applies_before_increment() {
    let p = provider();
    let limited = RetrieveMemoriesInput {
        limit: 1,
        ..recall("LoanAnalyst", "auto credit")
    };
    let recalled = p.retrieve_memories(limited).await.unwrap();
    assert_eq!(recalled.len(), 1);

    let stats = p
        .get_memory_stats(AgentInput {
            agent_name: "LoanAnalyst".into(),
        })
        .await
        .unwrap();
    // 5 + 1 for the recalled memory, 2 untouched.
    assert_eq!(stats.max_recalls, 6);
    assert!((stats.avg_recalls - 4.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_memories_are_scoped_to_agent() {
    let p = provider();
    p.store_memory(sales_memory()).await.unwrap();

    let other = p.retrieve_memories(recall("LoanAnalyst", "sales")).await.unwrap();
    assert!(other.is_empty());

    let found = p
        .search_memories(SearchMemoriesInput {
            agent_name: "ComplianceBot".into(),
            search_text: "quarterly".into(),
            limit: 10,
        })
        .await
        .unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn test_search_leaves_counters_alone() {
    let p = provider();
    let before = p
        .get_memory_stats(AgentInput {
            agent_name: "ComplianceBot".into(),
        })
        .await
        .unwrap();
    let found = p
        .search_memories(SearchMemoriesInput {
            agent_name: "ComplianceBot".into(),
            search_text: "bsa".into(),
            limit: 10,
        })
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    let after = p
        .get_memory_stats(AgentInput {
            agent_name: "ComplianceBot".into(),
        })
        .await
        .unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_store_normalizes_purge_after() {
    let p = provider();
    let input = StoreMemoryInput {
        purge_after: Some("2030-06-01 08:30:00".into()),
        ..sales_memory()
    };
    p.store_memory(input).await.unwrap();
    let found = p
        .search_memories(SearchMemoriesInput {
            agent_name: "DataAnalyst".into(),
            search_text: "quarterly".into(),
            limit: 10,
        })
        .await
        .unwrap();
    assert_eq!(found[0].purge_after.as_deref(), Some("2030-06-01T08:30:00.000"));
}

#[tokio::test]
async fn test_purge_is_scoped_by_agent() {
    let p = provider();
    let expired = |agent: &str| StoreMemoryInput {
        agent_name: agent.into(),
        purge_after: Some("2001-01-01T00:00:00".into()),
        ..sales_memory()
    };
    p.store_memory(expired("DataAnalyst")).await.unwrap();
    p.store_memory(expired("LoanAnalyst")).await.unwrap();

    let out = p
        .purge_expired_memories(PurgeMemoriesInput {
            agent_name: Some("DataAnalyst".into()),
        })
        .await
        .unwrap();
    assert_eq!(out.purged, 1);

    let rest = p
        .purge_expired_memories(PurgeMemoriesInput::default())
        .await
        .unwrap();
    assert_eq!(rest.purged, 1);
    assert_eq!(p.link().row_count("AI_Memories"), 5);
}

#[tokio::test]
async fn test_retrieve_through_registry_reports_new_counters() {
    let p = provider();
    let first = p
        .execute_tool(
            "retrieve_memories",
            json!({"agentName": "MemberServices", "relatedToTags": "branches"}),
        )
        .await;
    let second = p
        .execute_tool(
            "retrieve_memories",
            json!({"agent_name": "MemberServices", "related_to_tags": "branches"}),
        )
        .await;
    let count = |value: &Option<JsonValue>| value.as_ref().unwrap()[0]["times_recalled"].as_i64().unwrap();
    assert_eq!(count(&first.data), 4);
    assert_eq!(count(&second.data), 5);
}

#[tokio::test]
async fn test_memory_with_null_counters_is_still_served() {
    let p = provider();
    p.link()
        .execute(
            "INSERT INTO AI_Memories (Agent, Memory_Label, Memory, Related_To, Times_Recalled) \
             VALUES ('DataAnalyst', NULL, 'Imported from the legacy store', 'legacy import', NULL)",
        )
        .await
        .unwrap();

    let stats = p
        .get_memory_stats(AgentInput {
            agent_name: "DataAnalyst".into(),
        })
        .await
        .unwrap();
    assert_eq!(stats.total_memories, 1);
    assert_eq!(stats.unused_memories, 1);

    let found = p
        .search_memories(SearchMemoriesInput {
            agent_name: "DataAnalyst".into(),
            search_text: "legacy".into(),
            limit: 10,
        })
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].times_recalled, 0);
    assert_eq!(found[0].memory_label, "");

    let recalled = p.retrieve_memories(recall("DataAnalyst", "legacy")).await.unwrap();
    assert_eq!(recalled[0].times_recalled, 1);
    let recalled = p.retrieve_memories(recall("DataAnalyst", "legacy")).await.unwrap();
    assert_eq!(recalled[0].times_recalled, 2);

    let rows = p
        .link()
        .query("SELECT Times_Recalled FROM AI_Memories WHERE Agent = 'DataAnalyst'")
        .await
        .unwrap();
    assert_eq!(rows[0]["Times_Recalled"], 2);
}

#[tokio::test]
async fn test_concurrent_stores_get_their_own_ids() {
    let p = provider();
    let second = StoreMemoryInput {
        memory_label: "Second Pass".into(),
        ..sales_memory()
    };
    let (first, second) = tokio::join!(p.store_memory(sales_memory()), p.store_memory(second));
    let first = first.unwrap().memory_id.unwrap();
    let second = second.unwrap().memory_id.unwrap();
    assert_ne!(first, second);

    let found = p
        .search_memories(SearchMemoriesInput {
            agent_name: "DataAnalyst".into(),
            search_text: "second pass".into(),
            limit: 10,
        })
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].memory_id, second);
}
