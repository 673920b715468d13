// ── State store ──
//
// `reconcile` holds the pure mutation rules, `view_store` the published
// value, and `actor` the single-writer task that ties them together.

mod actor;
mod reconcile;
mod view_store;

pub use actor::Reconciler;
pub use reconcile::{Mutation, Origin, Patch, apply};
pub use view_store::ViewStore;
