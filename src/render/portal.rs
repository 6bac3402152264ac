//! Per-frame portal traversal.
//!
//! Starting from the sector the player is in, replay its compiled geometry
//! and recurse through every portal edge until the depth budget runs out.
//! There is no visited set: a cycle such as two rooms porting into each
//! other is walked again on every hop until the budget is spent. The depth
//! buffer hides rooms that end up drawn behind nearer walls.

use super::backend::RenderBackend;
use crate::world::cache::World;
use crate::world::sector::SectorId;
use crate::world::store::SectorStore;

/// Deepest portal walk drawn. Larger budgets are clamped to this so the
/// recursion stays shallow.
pub const MAX_DRAW_DEPTH: i32 = 64;

/// Draw `root` and everything reachable within `depth` portal hops.
///
/// Returns the number of compiled sector lists submitted. A negative depth
/// or an unknown sector draws nothing.
pub fn draw_visible<B: RenderBackend + ?Sized>(
    store: &SectorStore,
    world: &World,
    backend: &mut B,
    root: SectorId,
    depth: i32,
) -> usize {
    walk(store, world, backend, root, depth.min(MAX_DRAW_DEPTH))
}

fn walk<B: RenderBackend + ?Sized>(
    store: &SectorStore,
    world: &World,
    backend: &mut B,
    root: SectorId,
    depth: i32,
) -> usize {
    if depth < 0 {
        return 0;
    }
    let Ok(sector) = store.get_sector(root) else {
        log::trace!("portal into missing sector {root}");
        return 0;
    };

    let mut submitted = 0;
    match world.compiled(root) {
        Some(compiled) => {
            backend.call_list(compiled.list);
            submitted += 1;
        }
        None => log::trace!("sector {root} has no compiled geometry"),
    }

    if depth > 0 {
        for dest in sector.portals() {
            submitted += walk(store, world, backend, dest, depth - 1);
        }
    }
    submitted
}
