//! Permit-to-work lifecycle: contractor submissions with photo evidence,
//! reviewer approval and close-out, and printable reports.

pub mod access;
pub mod domain;
pub mod export;
pub mod lifecycle;
pub mod report;
pub mod repository;
pub mod router;
pub mod service;
pub mod store;
pub mod views;

#[cfg(test)]
mod tests;

pub use access::{AccessError, AccessGate, Role};
pub use domain::{
    NewPermit, Permit, PermitId, PermitStatus, PermitSubmission, Photo, PhotoId, PhotoStage,
    UnknownLabel, WorkType,
};
pub use lifecycle::{PermitAction, TransitionError};
pub use report::{render_report, report_file_name, RenderedReport, ReportError, ReportLayout};
pub use repository::{PermitRepository, RepositoryError, StatusUpdate};
pub use router::{permit_router, ACCESS_CODE_HEADER};
pub use service::{PermitService, PermitServiceError};
pub use store::SqlitePermitStore;
pub use views::{PermitView, PhotoView, ReviewRequest, SubmitPermitRequest};
