// Copyright (c) 2025 - Cowboy AI, Inc.
//! Push-merge: wholesale copy of raw records

use tracing::{debug, info, info_span, Instrument};

use super::SyncReport;
use crate::domain::{Machine, Network, System};
use crate::errors::InventoryResult;
use crate::store::InventoryStore;

/// Copy every raw record of `source` into `sink`
///
/// Order is Systems, then Networks, then Machines, so a reader of the sink
/// never sees a machine before the records it references. Each machine also
/// gets one MAC index entry per MAC, stamped with the machine's timestamp.
///
/// Nothing is deleted from the sink. The first failure aborts the remaining
/// writes and is returned.
pub async fn update_from_inventory_store(
    source: &InventoryStore,
    sink: &InventoryStore,
) -> InventoryResult<SyncReport> {
    let mut report = SyncReport::new();
    let span = info_span!(
        "push_merge",
        run_id = %report.run_id,
        source = %source.name(),
        sink = %sink.name()
    );

    push(source, sink, &mut report).instrument(span).await?;
    Ok(report)
}

async fn push(
    source: &InventoryStore,
    sink: &InventoryStore,
    report: &mut SyncReport,
) -> InventoryResult<()> {
    let systems: Vec<System> = source.fetch_all().await?;
    for system in &systems {
        sink.put(system).await?;
        report.written += 1;
    }
    debug!(count = systems.len(), "Systems pushed");

    let networks: Vec<Network> = source.fetch_all().await?;
    for network in &networks {
        sink.put(network).await?;
        report.written += 1;
    }
    debug!(count = networks.len(), "Networks pushed");

    let machines: Vec<Machine> = source.fetch_all().await?;
    for machine in &machines {
        sink.write_machine(machine).await?;
        report.written += 1;
    }
    debug!(count = machines.len(), "Machines pushed");

    info!(written = report.written, "Push-merge complete");
    Ok(())
}
