use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::access::Role;
use super::domain::{Permit, PermitId, PermitStatus, Photo, PhotoId, PhotoStage, WorkType};

/// JSON body for a new permit. `before_photo` carries the image as base64.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitPermitRequest {
    pub contractor_name: String,
    pub work_type: WorkType,
    pub location: String,
    #[serde(default)]
    pub description: String,
    pub before_photo: String,
}

/// JSON body for approve and close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub role: Role,
    #[serde(default)]
    pub approver_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermitView {
    pub id: PermitId,
    pub contractor_name: String,
    pub work_type: WorkType,
    pub work_type_label: String,
    pub location: String,
    pub description: String,
    pub status: PermitStatus,
    pub status_label: String,
    pub request_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_name: Option<String>,
}

impl From<Permit> for PermitView {
    fn from(permit: Permit) -> Self {
        Self {
            id: permit.id,
            work_type_label: permit.work_type.label().to_string(),
            status_label: permit.status.label().to_string(),
            contractor_name: permit.contractor_name,
            work_type: permit.work_type,
            location: permit.location,
            description: permit.description,
            status: permit.status,
            request_date: permit.request_date,
            approval_date: permit.approval_date,
            approver_name: permit.approver_name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoView {
    pub id: PhotoId,
    pub stage: PhotoStage,
    pub stage_label: String,
    pub timestamp: DateTime<Utc>,
    pub size_bytes: usize,
    pub image_base64: String,
}

impl From<Photo> for PhotoView {
    fn from(photo: Photo) -> Self {
        Self {
            id: photo.id,
            stage: photo.stage,
            stage_label: photo.stage.label().to_string(),
            timestamp: photo.timestamp,
            size_bytes: photo.image_data.len(),
            image_base64: STANDARD.encode(&photo.image_data),
        }
    }
}

pub fn decode_photo_payload(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(encoded.trim())
}
