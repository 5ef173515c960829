//! Change records and the reconciliation that turns two AI outputs into a
//! commit-ready changeset

mod file_change;
mod filler;
mod plan;

pub use file_change::{ChangeStatus, FileChange};
pub use filler::{
    reconcile, DropReason, DroppedChange, FilledChangeset, FilledGroup, Reconciliation,
    CHANGES_KEY, CONTENT_KEY, LEGACY_CONTENT_KEY, PATH_KEY, RATIONALE_KEY, SUMMARY_KEY,
};
pub use plan::BranchChangeset;
