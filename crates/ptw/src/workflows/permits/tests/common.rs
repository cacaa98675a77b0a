use std::io::Cursor;
use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::workflows::permits::access::AccessGate;
use crate::workflows::permits::domain::{
    NewPermit, Permit, PermitId, PermitSubmission, Photo, PhotoStage, WorkType,
};
use crate::workflows::permits::repository::{PermitRepository, RepositoryError, StatusUpdate};
use crate::workflows::permits::router::permit_router;
use crate::workflows::permits::service::PermitService;
use crate::workflows::permits::store::SqlitePermitStore;

pub(super) const ACCESS_CODE: &str = "KISWIRE2026";

pub(super) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([210, 90, 30]));
    let mut cursor = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut cursor, image::ImageOutputFormat::Png)
        .expect("png encodes");
    cursor.into_inner()
}

pub(super) fn new_permit() -> NewPermit {
    NewPermit {
        contractor_name: "Acme Co".to_string(),
        work_type: WorkType::HotWork,
        location: "Bay 3".to_string(),
        description: "Welding job".to_string(),
    }
}

pub(super) fn submission() -> PermitSubmission {
    PermitSubmission {
        permit: new_permit(),
        before_photo: png_bytes(4, 3),
    }
}

pub(super) fn store() -> Arc<SqlitePermitStore> {
    Arc::new(SqlitePermitStore::open_in_memory().expect("in-memory store opens"))
}

pub(super) fn build_service() -> (PermitService<SqlitePermitStore>, Arc<SqlitePermitStore>) {
    let store = store();
    (PermitService::new(store.clone()), store)
}

/// Make every photo insert fail, as a full disk or broken blob write would.
pub(super) fn reject_photo_inserts(store: &SqlitePermitStore) {
    store
        .connection()
        .expect("connection")
        .execute_batch(
            "CREATE TRIGGER reject_photos BEFORE INSERT ON photos
             BEGIN SELECT RAISE(ABORT, 'photo storage full'); END;",
        )
        .expect("trigger installs");
}

pub(super) fn gate() -> Arc<AccessGate> {
    Arc::new(AccessGate::new(ACCESS_CODE))
}

pub(super) fn approved_permit(service: &PermitService<SqlitePermitStore>) -> Permit {
    let permit = service.submit(submission()).expect("submission accepted");
    service
        .approve(permit.id, "J. Lee")
        .expect("pending permit approves")
}

pub(super) fn work_done_permit(service: &PermitService<SqlitePermitStore>) -> Permit {
    let permit = approved_permit(service);
    service
        .record_after_photo(permit.id, &png_bytes(2, 2))
        .expect("approved permit accepts after photo")
}

pub(super) fn permit_router_with_service(service: PermitService<SqlitePermitStore>) -> axum::Router {
    permit_router(Arc::new(service), gate())
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) struct UnavailableRepository;

impl PermitRepository for UnavailableRepository {
    fn create_permit(&self, _permit: &NewPermit) -> Result<PermitId, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn create_permit_with_photo(
        &self,
        _permit: &NewPermit,
        _stage: PhotoStage,
        _image: &[u8],
    ) -> Result<(PermitId, Photo), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn add_photo(
        &self,
        _permit_id: PermitId,
        _stage: PhotoStage,
        _image: &[u8],
    ) -> Result<Photo, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn add_photo_with_status(
        &self,
        _update: &StatusUpdate,
        _stage: PhotoStage,
        _image: &[u8],
    ) -> Result<Photo, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list_permits(&self) -> Result<Vec<Permit>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list_photos(&self, _permit_id: PermitId) -> Result<Vec<Photo>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_status(&self, _update: &StatusUpdate) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn get_permit(&self, _permit_id: PermitId) -> Result<Option<Permit>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Every call panics, standing in for a bug deep inside a storage backend.
pub(super) struct PanickingRepository;

impl PermitRepository for PanickingRepository {
    fn create_permit(&self, _permit: &NewPermit) -> Result<PermitId, RepositoryError> {
        panic!("storage backend bug")
    }

    fn create_permit_with_photo(
        &self,
        _permit: &NewPermit,
        _stage: PhotoStage,
        _image: &[u8],
    ) -> Result<(PermitId, Photo), RepositoryError> {
        panic!("storage backend bug")
    }

    fn add_photo(
        &self,
        _permit_id: PermitId,
        _stage: PhotoStage,
        _image: &[u8],
    ) -> Result<Photo, RepositoryError> {
        panic!("storage backend bug")
    }

    fn add_photo_with_status(
        &self,
        _update: &StatusUpdate,
        _stage: PhotoStage,
        _image: &[u8],
    ) -> Result<Photo, RepositoryError> {
        panic!("storage backend bug")
    }

    fn list_permits(&self) -> Result<Vec<Permit>, RepositoryError> {
        panic!("storage backend bug")
    }

    fn list_photos(&self, _permit_id: PermitId) -> Result<Vec<Photo>, RepositoryError> {
        panic!("storage backend bug")
    }

    fn update_status(&self, _update: &StatusUpdate) -> Result<(), RepositoryError> {
        panic!("storage backend bug")
    }

    fn get_permit(&self, _permit_id: PermitId) -> Result<Option<Permit>, RepositoryError> {
        panic!("storage backend bug")
    }
}
