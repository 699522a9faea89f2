// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pull-merge: last-write-wins copy of resolved machines

use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, info_span, Instrument};

use super::SyncReport;
use crate::domain::InventoryId;
use crate::errors::InventoryResult;
use crate::store::InventoryStore;

/// Bring `sink` up to date with `source`
///
/// A source machine is written when the sink lacks it or holds a copy whose
/// resolved `last_updated` is strictly earlier (in whole seconds). Sink
/// machines whose identity the source does not have are deleted. Source
/// machines that fail composition are skipped: neither written nor deleted.
///
/// The first store error aborts the run; writes already made stay.
pub async fn copy_updated_nodes(
    source: &InventoryStore,
    sink: &InventoryStore,
) -> InventoryResult<SyncReport> {
    let mut report = SyncReport::new();
    let span = info_span!(
        "pull_merge",
        run_id = %report.run_id,
        source = %source.name(),
        sink = %sink.name()
    );

    merge(source, sink, &mut report).instrument(span).await?;
    Ok(report)
}

async fn merge(
    source: &InventoryStore,
    sink: &InventoryStore,
    report: &mut SyncReport,
) -> InventoryResult<()> {
    let source_batch = source.resolve_all().await?;
    let sink_batch = sink.resolve_all().await?;

    let sink_times: HashMap<&InventoryId, i64> = sink_batch
        .machines
        .iter()
        .map(|m| (m.inventory_id(), m.last_updated.timestamp()))
        .collect();

    for resolved in &source_batch.machines {
        let id = resolved.inventory_id();
        match sink_times.get(id) {
            Some(sink_time) if *sink_time >= resolved.last_updated.timestamp() => {
                report.unchanged += 1;
            }
            current => {
                debug!(
                    inventory_id = %id,
                    sink_time = ?current,
                    source_time = resolved.last_updated.timestamp(),
                    "Copying machine"
                );
                sink.write_resolved(resolved).await?;
                report.written += 1;
            }
        }
    }

    report.skipped = source_batch.invalid.len();

    let keep: BTreeSet<&InventoryId> = source_batch
        .machines
        .iter()
        .map(|m| m.inventory_id())
        .chain(source_batch.invalid.iter().map(|(id, _)| id))
        .collect();

    let sink_ids: BTreeSet<&InventoryId> = sink_batch
        .machines
        .iter()
        .map(|m| m.inventory_id())
        .chain(sink_batch.invalid.iter().map(|(id, _)| id))
        .collect();

    for id in sink_ids.difference(&keep) {
        debug!(inventory_id = %id, "Removing machine absent from source");
        sink.remove_machine(id).await?;
        report.deleted += 1;
    }

    info!(
        written = report.written,
        deleted = report.deleted,
        unchanged = report.unchanged,
        skipped = report.skipped,
        "Pull-merge complete"
    );
    Ok(())
}
