//! Permit status state machine.
//!
//! ```text
//! Pending Review --approve--> Approved
//! Approved | Work In Progress --after photo--> Work Done (Pending Close)
//! Work Done (Pending Close) --close--> Closed
//! ```
//!
//! `Work In Progress` is accepted wherever `Approved` is, but no action
//! currently moves a permit into it.

use serde::Serialize;

use super::domain::PermitStatus;

/// Operations that touch a permit's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PermitAction {
    Approve,
    RecordProgress,
    SubmitCompletion,
    Close,
}

impl PermitAction {
    pub const fn label(self) -> &'static str {
        match self {
            PermitAction::Approve => "approve",
            PermitAction::RecordProgress => "upload progress photo",
            PermitAction::SubmitCompletion => "submit completion photo",
            PermitAction::Close => "verify and close",
        }
    }

    /// Reviewer actions stamp the approver name and date on the permit.
    pub const fn records_reviewer(self) -> bool {
        matches!(self, PermitAction::Approve | PermitAction::Close)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot {} while the permit is {}", .action.label(), .from.label())]
pub struct TransitionError {
    pub from: PermitStatus,
    pub action: PermitAction,
}

impl PermitStatus {
    /// Status the permit holds after `action`, or the rejection when the
    /// action is out of order.
    pub fn apply(self, action: PermitAction) -> Result<PermitStatus, TransitionError> {
        use PermitAction::*;
        use PermitStatus::*;

        match (self, action) {
            (PendingReview, Approve) => Ok(Approved),
            (Approved | WorkInProgress, RecordProgress) => Ok(self),
            (Approved | WorkInProgress, SubmitCompletion) => Ok(WorkDone),
            (WorkDone, Close) => Ok(Closed),
            (from, action) => Err(TransitionError { from, action }),
        }
    }
}
