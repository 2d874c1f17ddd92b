//! BDD step definitions for scan and prune behaviour.

use std::time::Duration;

use autoprune::test_support::{attached_volume, available_volume};
use autoprune::{Action, PruneItemError, Response, VolumeDescriptor, VolumeState};
use rstest_bdd_macros::{given, then, when};

use super::test_helpers::{Fault, MAX_CONCURRENCY, PruneContext, as_usize, block_on};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("an inventory of {count:u32} available volumes of {size:u32} GiB served {page:u32} per page")]
fn inventory_of_available_volumes(
    mut prune_context: PruneContext,
    count: u32,
    size: u32,
    page: u32,
) -> PruneContext {
    prune_context.volumes = (1..=count)
        .map(|n| available_volume(&format!("vol-{n}"), u64::from(size)))
        .collect();
    prune_context.page_size = as_usize(page);
    prune_context
}

#[given("an attached volume \"{id}\"")]
fn attached_volume_in_inventory(mut prune_context: PruneContext, id: String) -> PruneContext {
    prune_context
        .volumes
        .push(attached_volume(id.trim(), 100, "srv-1"));
    prune_context
}

#[given("a volume \"{id}\" that is still being created")]
fn creating_volume_in_inventory(mut prune_context: PruneContext, id: String) -> PruneContext {
    prune_context.volumes.push(VolumeDescriptor::new(
        id.trim(),
        100,
        VolumeState::Creating,
        "fr-par-1",
    ));
    prune_context
}

#[given("the provider refuses to delete \"{id}\"")]
fn provider_refuses_delete(mut prune_context: PruneContext, id: String) -> PruneContext {
    prune_context
        .faults
        .push(Fault::RefuseDelete(id.trim().to_owned()));
    prune_context
}

#[given("\"{id}\" becomes attached after listing")]
fn volume_becomes_attached(mut prune_context: PruneContext, id: String) -> PruneContext {
    prune_context
        .faults
        .push(Fault::RaceAttach(id.trim().to_owned()));
    prune_context
}

#[given("\"{id}\" is removed out of band")]
fn volume_removed_out_of_band(mut prune_context: PruneContext, id: String) -> PruneContext {
    prune_context.faults.push(Fault::Vanish(id.trim().to_owned()));
    prune_context
}

#[given("each delete takes {millis:u32} milliseconds")]
fn deletes_are_slow(mut prune_context: PruneContext, millis: u32) -> PruneContext {
    prune_context.delete_delay = Some(Duration::from_millis(u64::from(millis)));
    prune_context
}

#[when("I scan for zombie volumes")]
fn run_scan(mut prune_context: PruneContext) -> PruneContext {
    let handler = prune_context.handler();
    match block_on(handler.handle(Action::Scan)) {
        Ok(Response::Scan(scan)) => prune_context.scans.push(scan),
        other => panic!("expected a scan response, got {other:?}"),
    }
    prune_context
}

#[when("I prune zombie volumes")]
fn run_prune(mut prune_context: PruneContext) -> PruneContext {
    let handler = prune_context.handler();
    match block_on(handler.handle(Action::Delete)) {
        Ok(Response::Delete(delete)) => prune_context.prunes.push(delete),
        other => panic!("expected a delete response, got {other:?}"),
    }
    prune_context
}

#[then("the scan reports {count:u32} zombies worth \"{savings}\" per month")]
fn scan_reports_zombies(
    prune_context: &PruneContext,
    count: u32,
    savings: String,
) -> Result<(), StepError> {
    let Some(scan) = prune_context.scans.last() else {
        return Err(StepError::Assertion(String::from("missing scan response")));
    };
    let estimated = scan.estimated_monthly_savings().to_string();
    if scan.total_count() == as_usize(count) && estimated == savings.trim() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} zombies worth {savings}, got {} worth {estimated}",
            scan.total_count()
        )))
    }
}

#[then("the inventory was listed in {pages:u32} pages")]
fn inventory_listed_in_pages(prune_context: &PruneContext, pages: u32) -> Result<(), StepError> {
    let calls = prune_context
        .provider
        .as_ref()
        .map_or(0, autoprune::test_support::FakeProvider::list_calls);
    if calls == as_usize(pages) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {pages} listing calls, got {calls}"
        )))
    }
}

#[then("{succeeded:u32} of {attempted:u32} deletions succeed reclaiming \"{savings}\" per month")]
fn deletions_succeed(
    prune_context: &PruneContext,
    succeeded: u32,
    attempted: u32,
    savings: String,
) -> Result<(), StepError> {
    let Some(delete) = prune_context.prunes.last() else {
        return Err(StepError::Assertion(String::from("missing delete response")));
    };
    let realized = delete.realized_monthly_savings().to_string();
    if delete.succeeded() == as_usize(succeeded)
        && delete.attempted() == as_usize(attempted)
        && realized == savings.trim()
    {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {succeeded} of {attempted} reclaiming {savings}, got: {}",
            delete.message()
        )))
    }
}

#[then("only \"{id}\" remains in the inventory")]
fn only_volume_remains(prune_context: &PruneContext, id: String) -> Result<(), StepError> {
    let remaining = prune_context
        .provider
        .as_ref()
        .map(autoprune::test_support::FakeProvider::remaining_ids)
        .unwrap_or_default();
    if remaining == vec![id.trim().to_owned()] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected only {id} to remain, got {remaining:?}"
        )))
    }
}

#[then("\"{id}\" is reported as in use")]
fn volume_reported_in_use(prune_context: &PruneContext, id: String) -> Result<(), StepError> {
    let entry = prune_context
        .prunes
        .last()
        .and_then(|delete| {
            delete
                .entries()
                .iter()
                .find(|entry| entry.result.id() == id.trim())
        })
        .ok_or_else(|| StepError::Assertion(format!("missing entry for {id}")))?;
    if matches!(entry.result.error(), Some(PruneItemError::InUse { .. })) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {id} to be in use, got {:?}",
            entry.result
        )))
    }
}

#[then("\"{id}\" is reported as already deleted")]
fn volume_reported_already_deleted(
    prune_context: &PruneContext,
    id: String,
) -> Result<(), StepError> {
    let entry = prune_context
        .prunes
        .last()
        .and_then(|delete| {
            delete
                .entries()
                .iter()
                .find(|entry| entry.result.id() == id.trim())
        })
        .ok_or_else(|| StepError::Assertion(format!("missing entry for {id}")))?;
    if entry.result.succeeded() && entry.result.was_already_deleted() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {id} to be already deleted, got {:?}",
            entry.result
        )))
    }
}

#[then("the last prune attempted {attempted:u32} deletions")]
fn last_prune_attempted(prune_context: &PruneContext, attempted: u32) -> Result<(), StepError> {
    let runs = prune_context.prunes.len();
    let Some(delete) = prune_context.prunes.last() else {
        return Err(StepError::Assertion(String::from("missing delete response")));
    };
    if runs >= 2 && delete.attempted() == as_usize(attempted) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected a repeated prune attempting {attempted}, got {runs} run(s) and {}",
            delete.message()
        )))
    }
}

#[then("no more than {bound:u32} deletes ran at once")]
fn concurrency_stayed_bounded(prune_context: &PruneContext, bound: u32) -> Result<(), StepError> {
    let peak = prune_context
        .provider
        .as_ref()
        .map_or(0, autoprune::test_support::FakeProvider::max_in_flight);
    if peak <= as_usize(bound) && as_usize(bound) == MAX_CONCURRENCY {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected at most {bound} deletes in flight, saw {peak}"
        )))
    }
}

#[then("the results keep listing order")]
fn results_keep_listing_order(prune_context: &PruneContext) -> Result<(), StepError> {
    let Some(delete) = prune_context.prunes.last() else {
        return Err(StepError::Assertion(String::from("missing delete response")));
    };
    let listed: Vec<&str> = prune_context
        .volumes
        .iter()
        .map(|volume| volume.id.as_str())
        .collect();
    let pruned: Vec<&str> = delete
        .entries()
        .iter()
        .map(|entry| entry.candidate.id())
        .collect();
    if pruned == listed {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected listing order {listed:?}, got {pruned:?}"
        )))
    }
}
