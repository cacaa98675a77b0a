use std::io::Cursor;
use std::sync::Arc;

use ptw::workflows::permits::{
    NewPermit, PermitId, PermitService, PermitServiceError, PermitStatus, PermitSubmission,
    PhotoStage, SqlitePermitStore, WorkType,
};

fn jpeg_bytes() -> Vec<u8> {
    let image = image::RgbImage::from_pixel(12, 9, image::Rgb([40, 120, 200]));
    let mut cursor = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut cursor, image::ImageOutputFormat::Jpeg(85))
        .expect("jpeg encodes");
    cursor.into_inner()
}

fn submission(contractor: &str, work_type: WorkType) -> PermitSubmission {
    PermitSubmission {
        permit: NewPermit {
            contractor_name: contractor.to_string(),
            work_type,
            location: "Bay 3".to_string(),
            description: "Welding job".to_string(),
        },
        before_photo: jpeg_bytes(),
    }
}

#[test]
fn permit_walks_from_submission_to_closed_report() {
    let store = Arc::new(SqlitePermitStore::open_in_memory().expect("store opens"));
    let service = PermitService::new(store);

    let permit = service
        .submit(submission("Acme Co", WorkType::HotWork))
        .expect("submitted");
    assert_eq!(permit.status, PermitStatus::PendingReview);

    service.approve(permit.id, "J. Lee").expect("approved");
    service
        .add_during_photo(permit.id, &jpeg_bytes())
        .expect("progress recorded");
    service
        .record_after_photo(permit.id, &jpeg_bytes())
        .expect("completion recorded");
    let closed = service.close(permit.id, "K. Tan").expect("closed");

    assert_eq!(closed.status, PermitStatus::Closed);
    assert_eq!(closed.approver_name.as_deref(), Some("K. Tan"));

    let report = service.generate_report(permit.id).expect("report renders");
    assert_eq!(report.file_name, "Permit_Report_1.pdf");
    assert!(report.bytes.starts_with(b"%PDF"));

    match service.approve(permit.id, "J. Lee") {
        Err(PermitServiceError::InvalidTransition(_)) => {}
        other => panic!("closed permit must not re-open, got {other:?}"),
    }
}

#[test]
fn records_survive_reopening_the_database() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("ptw_database.db");

    let permit_id = {
        let store = Arc::new(SqlitePermitStore::open(&path).expect("store opens"));
        let service = PermitService::new(store);
        let permit = service
            .submit(submission("Northwind", WorkType::ConfinedSpace))
            .expect("submitted");
        service.approve(permit.id, "J. Lee").expect("approved");
        permit.id
    };

    let store = Arc::new(SqlitePermitStore::open(&path).expect("store reopens"));
    let service = PermitService::new(store);

    let permit = service.get(permit_id).expect("permit persisted");
    assert_eq!(permit.status, PermitStatus::Approved);
    assert_eq!(permit.work_type, WorkType::ConfinedSpace);
    assert_eq!(permit.approver_name.as_deref(), Some("J. Lee"));

    let photos = service.photos(permit_id).expect("photos persisted");
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].stage, PhotoStage::Before);
    assert_eq!(photos[0].image_data, jpeg_bytes());

    let next = service
        .submit(submission("Northwind", WorkType::Lifting))
        .expect("submitted after reopen");
    assert_eq!(next.id, PermitId(permit_id.0 + 1));
}

#[test]
fn export_reflects_the_master_record() {
    let store = Arc::new(SqlitePermitStore::open_in_memory().expect("store opens"));
    let service = PermitService::new(store);
    service
        .submit(submission("Acme Co", WorkType::Height))
        .expect("submitted");
    service
        .submit(submission("Globex", WorkType::Electrical))
        .expect("submitted");

    let csv = String::from_utf8(service.export_csv().expect("export")).expect("utf8");
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("id,contractor_name,work_type,location,description,status,request_date,approval_date,approver_name")
    );
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].starts_with("1,Acme Co,Height,Bay 3"));
    assert!(rows[1].starts_with("2,Globex,Electrical,Bay 3"));
}
