// Copyright (c) 2025 - Cowboy AI, Inc.
//! Reconciliation Integration Tests
//!
//! Tests verify:
//! - Pull-merge converges the sink's machine set onto the source's
//! - A second pull-merge run performs zero writes
//! - Last-write-wins at whole-second granularity, shared records included
//! - MAC index entries follow a machine's current MACs
//! - Push-merge copies raw records and MAC index entries, fail-fast

mod fixtures;

use chrono::Duration;
use pretty_assertions::assert_eq;

use cim_inventory::domain::{InventoryId, Machine, Network, NodeMacIndexEntry, System};
use cim_inventory::errors::InventoryError;
use cim_inventory::reconcile::{copy_updated_nodes, update_from_inventory_store};

use fixtures::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn test_pull_merge_converges_machine_sets() {
    init_tracing();
    let (source, _) = memory_store("source");
    let (sink, _) = memory_store("sink");

    seed(
        &source,
        &[
            machine_fixture("m-1", 1, at(0)),
            machine_fixture("m-2", 2, at(0)),
        ],
    )
    .await;
    seed(&sink, &[machine_fixture("m-3", 3, at(0))]).await;

    let report = copy_updated_nodes(&source, &sink).await.unwrap();

    assert_eq!(report.written, 2);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.unchanged, 0);
    assert_eq!(machine_ids(&sink).await, machine_ids(&source).await);

    // The deleted machine's index entry goes with it.
    assert!(sink.machine_by_mac(&mac(3)).await.unwrap_err().is_not_found());
    assert_eq!(
        sink.machine_by_mac(&mac(1)).await.unwrap().inventory_id,
        InventoryId::new("m-1")
    );
}

#[tokio::test]
async fn test_pull_merge_into_empty_sink_recomposes() {
    let (source, _) = memory_store("source");
    let (sink, _) = memory_store("sink");
    seed(&source, &[machine_fixture("m-1", 1, at(5))]).await;

    copy_updated_nodes(&source, &sink).await.unwrap();

    let copied = sink.resolve(&InventoryId::new("m-1")).await.unwrap();
    let original = source.resolve(&InventoryId::new("m-1")).await.unwrap();
    assert_eq!(copied, original);
}

#[tokio::test]
async fn test_second_pull_merge_writes_nothing() {
    let (source, _) = memory_store("source");
    let (sink, sink_backend) = memory_store("sink");
    seed(
        &source,
        &[
            machine_fixture("m-1", 1, at(0)),
            machine_fixture("m-2", 2, at(10)),
        ],
    )
    .await;

    let first = copy_updated_nodes(&source, &sink).await.unwrap();
    assert_eq!(first.written, 2);

    let writes_after_first = sink_backend.write_count();
    let second = copy_updated_nodes(&source, &sink).await.unwrap();

    assert!(second.is_noop());
    assert_eq!(second.unchanged, 2);
    assert_eq!(sink_backend.write_count(), writes_after_first);
    assert_ne!(first.run_id, second.run_id);
}

#[tokio::test]
async fn test_stale_sink_copy_is_replaced() {
    let (source, _) = memory_store("source");
    let (sink, _) = memory_store("sink");

    let mut fresh = machine_fixture("m-1", 1, at(100));
    fresh.tags.insert("rebuilt".to_string());
    seed(&source, &[fresh]).await;
    seed(&sink, &[machine_fixture("m-1", 1, at(0))]).await;

    let report = copy_updated_nodes(&source, &sink).await.unwrap();
    assert_eq!(report.written, 1);

    let machine: Machine = sink.get("m-1").await.unwrap();
    assert!(machine.tags.contains("rebuilt"));
    assert_eq!(machine.last_updated, at(100));
}

#[tokio::test]
async fn test_newer_sink_copy_is_kept() {
    let (source, _) = memory_store("source");
    let (sink, _) = memory_store("sink");

    seed(&source, &[machine_fixture("m-1", 1, at(0))]).await;
    let mut local = machine_fixture("m-1", 1, at(100));
    local.tags.insert("local-edit".to_string());
    seed(&sink, &[local]).await;

    let report = copy_updated_nodes(&source, &sink).await.unwrap();
    assert_eq!(report.written, 0);
    assert_eq!(report.unchanged, 1);

    let machine: Machine = sink.get("m-1").await.unwrap();
    assert!(machine.tags.contains("local-edit"));
}

#[tokio::test]
async fn test_sub_second_differences_compare_equal() {
    let (source, _) = memory_store("source");
    let (sink, _) = memory_store("sink");

    seed(&source, &[machine_fixture("m-1", 1, at(0) + Duration::milliseconds(900))]).await;
    seed(&sink, &[machine_fixture("m-1", 1, at(0))]).await;

    let report = copy_updated_nodes(&source, &sink).await.unwrap();
    assert_eq!(report.written, 0);
    assert_eq!(report.unchanged, 1);
}

#[tokio::test]
async fn test_system_change_marks_machine_stale() {
    let (source, _) = memory_store("source");
    let (sink, _) = memory_store("sink");
    seed(&source, &[machine_fixture("m-1", 1, at(0))]).await;
    seed(&sink, &[machine_fixture("m-1", 1, at(0))]).await;

    let mut system = system_fixture();
    system.roles.insert("gateway".to_string());
    system.last_updated = at(60);
    source.put(&system).await.unwrap();

    let report = copy_updated_nodes(&source, &sink).await.unwrap();
    assert_eq!(report.written, 1);

    let copied: System = sink.get(SYSTEM_NAME).await.unwrap();
    assert!(copied.has_role("gateway"));
}

#[tokio::test]
async fn test_newer_sink_system_survives_pull_merge() {
    let (source, _) = memory_store("source");
    let (sink, _) = memory_store("sink");
    seed(&source, &[machine_fixture("m-1", 1, at(100))]).await;
    seed(&sink, &[machine_fixture("m-2", 2, at(0))]).await;

    let mut local = system_fixture();
    local.roles.insert("gateway".to_string());
    local.last_updated = at(500);
    sink.put(&local).await.unwrap();

    let report = copy_updated_nodes(&source, &sink).await.unwrap();
    assert_eq!(report.written, 1);

    let system: System = sink.get(SYSTEM_NAME).await.unwrap();
    assert_eq!(system.last_updated, at(500));
    assert!(system.has_role("gateway"));

    // m-1 now composes against the sink's newer system.
    let copied = sink.resolve(&InventoryId::new("m-1")).await.unwrap();
    assert_eq!(copied.last_updated, at(500));
}

#[tokio::test]
async fn test_older_sink_network_is_replaced_on_pull_merge() {
    let (source, _) = memory_store("source");
    let (sink, _) = memory_store("sink");
    seed(&source, &[machine_fixture("m-1", 1, at(0))]).await;

    let mut network = mgmt_network();
    network.domain = Some("mgmt.dc1.example.net".to_string());
    network.last_updated = at(30);
    source.put(&network).await.unwrap();
    seed(&sink, &[]).await;

    copy_updated_nodes(&source, &sink).await.unwrap();

    let copied: Network = sink.get(MGMT_NETWORK).await.unwrap();
    assert_eq!(copied, network);
}

#[tokio::test]
async fn test_pull_merge_drops_index_entries_for_removed_macs() {
    let (source, _) = memory_store("source");
    let (sink, _) = memory_store("sink");
    seed(&source, &[machine_fixture("m-1", 1, at(0))]).await;
    update_from_inventory_store(&source, &sink).await.unwrap();

    let mut rewired = machine_fixture("m-1", 1, at(100));
    rewired.network_interfaces.get_mut("mgmt").unwrap().mac = vec![mac(7)];
    source.write_machine(&rewired).await.unwrap();
    assert!(source.machine_by_mac(&mac(1)).await.unwrap_err().is_not_found());

    let report = copy_updated_nodes(&source, &sink).await.unwrap();
    assert_eq!(report.written, 1);

    assert!(sink.machine_by_mac(&mac(1)).await.unwrap_err().is_not_found());
    assert_eq!(
        sink.machine_by_mac(&mac(7)).await.unwrap().inventory_id,
        InventoryId::new("m-1")
    );
}

#[tokio::test]
async fn test_reclaimed_mac_keeps_new_owner() {
    let (store, _) = memory_store("source");
    seed(&store, &[machine_fixture("m-1", 1, at(0))]).await;

    // m-2 takes over m-1's NIC before m-1 is updated.
    let mut taker = machine_fixture("m-2", 2, at(10));
    taker.network_interfaces.get_mut("mgmt").unwrap().mac = vec![mac(1)];
    store.write_machine(&taker).await.unwrap();

    let mut moved = machine_fixture("m-1", 1, at(20));
    moved.network_interfaces.get_mut("mgmt").unwrap().mac = vec![mac(5)];
    store.write_machine(&moved).await.unwrap();

    assert_eq!(
        store.machine_by_mac(&mac(1)).await.unwrap().inventory_id,
        InventoryId::new("m-2")
    );
    assert_eq!(
        store.machine_by_mac(&mac(5)).await.unwrap().inventory_id,
        InventoryId::new("m-1")
    );
}

#[tokio::test]
async fn test_invalid_source_machine_is_neither_written_nor_deleted() {
    let (source, _) = memory_store("source");
    let (sink, _) = memory_store("sink");

    let mut broken = machine_fixture("m-1", 1, at(100));
    broken.environment = "staging".to_string();
    seed(&source, &[broken]).await;
    seed(&sink, &[machine_fixture("m-1", 1, at(0))]).await;

    let report = copy_updated_nodes(&source, &sink).await.unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(report.written, 0);
    assert_eq!(report.deleted, 0);

    let kept: Machine = sink.get("m-1").await.unwrap();
    assert_eq!(kept.environment, ENVIRONMENT);
}

#[tokio::test]
async fn test_push_merge_copies_raw_records_and_index() {
    let (source, _) = memory_store("source");
    let (sink, _) = memory_store("sink");

    let mut machine = machine_fixture("m-1", 1, at(42));
    machine
        .network_interfaces
        .get_mut("mgmt")
        .unwrap()
        .mac
        .push(mac(200));
    seed(&source, &[machine]).await;
    seed(&sink, &[machine_fixture("m-9", 9, at(0))]).await;

    let report = update_from_inventory_store(&source, &sink).await.unwrap();

    // 1 system + 2 networks + 1 machine
    assert_eq!(report.written, 4);
    assert_eq!(report.deleted, 0);

    // No delete phase.
    assert!(machine_ids(&sink).await.contains("m-9"));

    for n in [1, 200] {
        let entry: NodeMacIndexEntry = sink.get(&mac(n).to_string()).await.unwrap();
        assert_eq!(entry.inventory_id, InventoryId::new("m-1"));
        assert_eq!(entry.last_updated, at(42));
    }
}

#[tokio::test]
async fn test_push_merge_aborts_on_first_failure() {
    let (source, _) = memory_store("source");
    let (sink, sink_backend) = memory_store("sink");
    seed(&source, &[machine_fixture("m-1", 1, at(0))]).await;
    sink_backend.fail_writes_to("inventory_network").await;

    let err = update_from_inventory_store(&source, &sink).await.unwrap_err();
    assert!(matches!(err, InventoryError::Store(_)));

    // Systems went first; machines were never reached.
    assert!(sink.exists::<System>(SYSTEM_NAME).await.unwrap());
    assert!(machine_ids(&sink).await.is_empty());
}

#[tokio::test]
async fn test_push_then_pull_is_noop() {
    let (source, _) = memory_store("source");
    let (sink, sink_backend) = memory_store("sink");
    seed(
        &source,
        &[
            machine_fixture("m-1", 1, at(0)),
            machine_fixture("m-2", 2, at(0)),
        ],
    )
    .await;

    update_from_inventory_store(&source, &sink).await.unwrap();
    let writes = sink_backend.write_count();

    let report = copy_updated_nodes(&source, &sink).await.unwrap();
    assert!(report.is_noop());
    assert_eq!(sink_backend.write_count(), writes);
}
