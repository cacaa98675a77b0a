use super::domain::{NewPermit, Permit, PermitId, PermitStatus, Photo, PhotoStage};

/// Status change requested by the lifecycle engine.
///
/// `expected` is the status the caller validated against; stores apply the
/// change only while the permit still holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub permit_id: PermitId,
    pub expected: PermitStatus,
    pub status: PermitStatus,
    pub approver: Option<String>,
}

/// Storage abstraction so the service module can be exercised in isolation.
pub trait PermitRepository: Send + Sync {
    fn create_permit(&self, permit: &NewPermit) -> Result<PermitId, RepositoryError>;
    /// Insert the permit and its first photo together; neither row is kept if
    /// either insert fails.
    fn create_permit_with_photo(
        &self,
        permit: &NewPermit,
        stage: PhotoStage,
        image: &[u8],
    ) -> Result<(PermitId, Photo), RepositoryError>;
    fn add_photo(
        &self,
        permit_id: PermitId,
        stage: PhotoStage,
        image: &[u8],
    ) -> Result<Photo, RepositoryError>;
    /// Insert a photo and apply `update` as one unit; a rejected update
    /// discards the photo.
    fn add_photo_with_status(
        &self,
        update: &StatusUpdate,
        stage: PhotoStage,
        image: &[u8],
    ) -> Result<Photo, RepositoryError>;
    fn list_permits(&self) -> Result<Vec<Permit>, RepositoryError>;
    fn list_photos(&self, permit_id: PermitId) -> Result<Vec<Photo>, RepositoryError>;
    fn update_status(&self, update: &StatusUpdate) -> Result<(), RepositoryError>;
    fn get_permit(&self, permit_id: PermitId) -> Result<Option<Permit>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("permit not found")]
    NotFound,
    #[error("permit status changed concurrently")]
    Conflict,
    #[error("photo payload is empty")]
    EmptyImage,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}
