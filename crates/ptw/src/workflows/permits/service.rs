use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

use super::domain::{
    NewPermit, Permit, PermitId, PermitStatus, PermitSubmission, Photo, PhotoStage,
};
use super::export::write_permits_csv;
use super::lifecycle::{PermitAction, TransitionError};
use super::report::{render_report, RenderedReport, ReportError};
use super::repository::{PermitRepository, RepositoryError, StatusUpdate};

/// Lifecycle engine on top of a record store.
///
/// Transitions on the same permit are serialized: the permit lock is held
/// from the status read until the new status is written.
pub struct PermitService<R> {
    repository: Arc<R>,
    locks: PermitLocks,
}

impl<R> PermitService<R>
where
    R: PermitRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            locks: PermitLocks::default(),
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    #[cfg(test)]
    pub(crate) fn locked_permits(&self) -> usize {
        self.locks.len()
    }

    /// Open a permit in `Pending Review` and attach its "before" photo.
    pub fn submit(&self, submission: PermitSubmission) -> Result<Permit, PermitServiceError> {
        let PermitSubmission {
            permit,
            before_photo,
        } = submission;
        let permit = validate_submission(permit)?;
        require_photo(&before_photo, PhotoStage::Before)?;

        let (permit_id, _) =
            self.repository
                .create_permit_with_photo(&permit, PhotoStage::Before, &before_photo)?;

        info!(
            permit_id = %permit_id,
            contractor = %permit.contractor_name,
            work_type = permit.work_type.label(),
            "permit submitted"
        );
        self.get(permit_id)
    }

    /// Attach a progress photo to a permit whose work is underway.
    pub fn add_during_photo(
        &self,
        permit_id: PermitId,
        image: &[u8],
    ) -> Result<Photo, PermitServiceError> {
        require_photo(image, PhotoStage::During)?;
        self.locks.serialize(permit_id, || {
            let permit = self.get(permit_id)?;
            permit.status.apply(PermitAction::RecordProgress)?;
            let photo = self
                .repository
                .add_photo(permit_id, PhotoStage::During, image)?;

            info!(permit_id = %permit_id, photo_id = photo.id.0, "progress photo recorded");
            Ok(photo)
        })
    }

    /// Reviewer sign-off that lets work start.
    pub fn approve(&self, permit_id: PermitId, approver: &str) -> Result<Permit, PermitServiceError> {
        self.reviewer_transition(permit_id, PermitAction::Approve, approver)
    }

    /// Attach the "after" photo and hand the permit back for closing.
    pub fn record_after_photo(
        &self,
        permit_id: PermitId,
        image: &[u8],
    ) -> Result<Permit, PermitServiceError> {
        require_photo(image, PhotoStage::After)?;
        self.locks.serialize(permit_id, || {
            let permit = self.get(permit_id)?;
            let next = permit.status.apply(PermitAction::SubmitCompletion)?;
            let update = StatusUpdate {
                permit_id,
                expected: permit.status,
                status: next,
                approver: None,
            };
            self.repository
                .add_photo_with_status(&update, PhotoStage::After, image)?;

            info!(permit_id = %permit_id, status = next.label(), "completion photo recorded");
            self.get(permit_id)
        })
    }

    /// Reviewer verification that ends the permit.
    pub fn close(&self, permit_id: PermitId, approver: &str) -> Result<Permit, PermitServiceError> {
        self.reviewer_transition(permit_id, PermitAction::Close, approver)
    }

    fn reviewer_transition(
        &self,
        permit_id: PermitId,
        action: PermitAction,
        approver: &str,
    ) -> Result<Permit, PermitServiceError> {
        let approver = approver.trim();
        if approver.is_empty() {
            return Err(PermitServiceError::InvalidInput(
                "approver name is required".to_string(),
            ));
        }

        self.locks.serialize(permit_id, || {
            let permit = self.get(permit_id)?;
            let next = permit.status.apply(action)?;
            self.repository.update_status(&StatusUpdate {
                permit_id,
                expected: permit.status,
                status: next,
                approver: action.records_reviewer().then(|| approver.to_string()),
            })?;

            info!(
                permit_id = %permit_id,
                action = action.label(),
                approver,
                status = next.label(),
                "permit transitioned"
            );
            self.get(permit_id)
        })
    }

    pub fn get(&self, permit_id: PermitId) -> Result<Permit, PermitServiceError> {
        self.repository
            .get_permit(permit_id)?
            .ok_or(PermitServiceError::NotFound(permit_id))
    }

    /// Master record: every permit in insertion order.
    pub fn list(&self) -> Result<Vec<Permit>, PermitServiceError> {
        Ok(self.repository.list_permits()?)
    }

    /// Permits a contractor can still upload evidence for.
    pub fn active_permits(&self) -> Result<Vec<Permit>, PermitServiceError> {
        self.filtered(PermitStatus::is_active)
    }

    /// Permits waiting on a reviewer to approve or close them.
    pub fn review_queue(&self) -> Result<Vec<Permit>, PermitServiceError> {
        self.filtered(PermitStatus::awaits_reviewer)
    }

    fn filtered(&self, keep: fn(PermitStatus) -> bool) -> Result<Vec<Permit>, PermitServiceError> {
        Ok(self
            .repository
            .list_permits()?
            .into_iter()
            .filter(|permit| keep(permit.status))
            .collect())
    }

    pub fn photos(&self, permit_id: PermitId) -> Result<Vec<Photo>, PermitServiceError> {
        self.get(permit_id)?;
        Ok(self.repository.list_photos(permit_id)?)
    }

    pub fn generate_report(&self, permit_id: PermitId) -> Result<RenderedReport, PermitServiceError> {
        let permit = self.get(permit_id)?;
        let photos = self.repository.list_photos(permit_id)?;
        let report = render_report(&permit, &photos)?;

        info!(
            permit_id = %permit_id,
            photos = photos.len(),
            pages = report.page_count,
            bytes = report.bytes.len(),
            "permit report generated"
        );
        Ok(report)
    }

    pub fn export_csv(&self) -> Result<Vec<u8>, PermitServiceError> {
        let permits = self.repository.list_permits()?;
        let mut buffer = Vec::new();
        write_permits_csv(&permits, &mut buffer)?;
        Ok(buffer)
    }
}

fn validate_submission(permit: NewPermit) -> Result<NewPermit, PermitServiceError> {
    let contractor_name = permit.contractor_name.trim().to_string();
    let location = permit.location.trim().to_string();

    if contractor_name.is_empty() {
        return Err(PermitServiceError::InvalidInput(
            "contractor name is required".to_string(),
        ));
    }
    if location.is_empty() {
        return Err(PermitServiceError::InvalidInput(
            "location is required".to_string(),
        ));
    }

    Ok(NewPermit {
        contractor_name,
        location,
        description: permit.description.trim().to_string(),
        work_type: permit.work_type,
    })
}

fn require_photo(image: &[u8], stage: PhotoStage) -> Result<(), PermitServiceError> {
    if image.is_empty() {
        return Err(PermitServiceError::InvalidInput(format!(
            "{} photo is required",
            stage.label()
        )));
    }
    Ok(())
}

/// One mutex per permit id with a call in flight.
///
/// Entries are created on first use and removed when the last caller
/// holding one lets go, so the map never outgrows the concurrent callers.
#[derive(Default)]
struct PermitLocks {
    locks: Mutex<HashMap<PermitId, Arc<Mutex<()>>>>,
}

impl PermitLocks {
    fn serialize<T>(&self, permit_id: PermitId, work: impl FnOnce() -> T) -> T {
        let lease = self.checkout(permit_id);
        let _guard = lease.lock.lock().unwrap_or_else(PoisonError::into_inner);
        work()
    }

    fn checkout(&self, permit_id: PermitId) -> PermitLease<'_> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = locks.entry(permit_id).or_default().clone();
        PermitLease {
            owner: self,
            permit_id,
            lock,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

struct PermitLease<'a> {
    owner: &'a PermitLocks,
    permit_id: PermitId,
    lock: Arc<Mutex<()>>,
}

impl Drop for PermitLease<'_> {
    fn drop(&mut self) {
        let mut locks = self
            .owner
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // The map and this lease hold one reference each; any more are waiters.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.permit_id);
        }
    }
}

/// Error raised by the permit service.
#[derive(Debug, thiserror::Error)]
pub enum PermitServiceError {
    #[error("permit #{0} not found")]
    NotFound(PermitId),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("export failed: {0}")]
    Export(#[from] csv::Error),
    #[error("permit task interrupted: {0}")]
    Interrupted(String),
}
