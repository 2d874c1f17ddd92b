//! BDD scenarios for scanning and pruning zombie volumes.

use rstest_bdd_macros::scenario;

use super::test_helpers::{PruneContext, prune_context};

#[scenario(
    path = "tests/features/prune.feature",
    name = "Scan reads every page of the inventory"
)]
fn scenario_scan_reads_every_page(prune_context: PruneContext) {
    let _ = prune_context;
}

#[scenario(
    path = "tests/features/prune.feature",
    name = "Attached and busy volumes are not zombies"
)]
fn scenario_attached_volumes_are_ignored(prune_context: PruneContext) {
    let _ = prune_context;
}

#[scenario(
    path = "tests/features/prune.feature",
    name = "One failing delete leaves the rest of the batch intact"
)]
fn scenario_batch_isolation(prune_context: PruneContext) {
    let _ = prune_context;
}

#[scenario(
    path = "tests/features/prune.feature",
    name = "A volume attached after listing is kept"
)]
fn scenario_raced_attachment_is_kept(prune_context: PruneContext) {
    let _ = prune_context;
}

#[scenario(
    path = "tests/features/prune.feature",
    name = "A volume removed out of band counts as deleted"
)]
fn scenario_out_of_band_removal(prune_context: PruneContext) {
    let _ = prune_context;
}

#[scenario(
    path = "tests/features/prune.feature",
    name = "Pruning twice finds nothing the second time"
)]
fn scenario_second_prune_is_empty(prune_context: PruneContext) {
    let _ = prune_context;
}

#[scenario(
    path = "tests/features/prune.feature",
    name = "Deletes stay within the concurrency bound"
)]
fn scenario_concurrency_bound(prune_context: PruneContext) {
    let _ = prune_context;
}
