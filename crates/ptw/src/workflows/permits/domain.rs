use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned by the record store when a permit is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermitId(pub i64);

impl fmt::Display for PermitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoId(pub i64);

/// Category of hazardous work a permit authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkType {
    HotWork,
    Height,
    ConfinedSpace,
    Electrical,
    Lifting,
}

impl WorkType {
    pub const fn ordered() -> [WorkType; 5] {
        [
            WorkType::HotWork,
            WorkType::Height,
            WorkType::ConfinedSpace,
            WorkType::Electrical,
            WorkType::Lifting,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            WorkType::HotWork => "Hot Work",
            WorkType::Height => "Height",
            WorkType::ConfinedSpace => "Confined Space",
            WorkType::Electrical => "Electrical",
            WorkType::Lifting => "Lifting",
        }
    }

    const fn key(self) -> &'static str {
        match self {
            WorkType::HotWork => "hot_work",
            WorkType::Height => "height",
            WorkType::ConfinedSpace => "confined_space",
            WorkType::Electrical => "electrical",
            WorkType::Lifting => "lifting",
        }
    }
}

/// Position of a permit in its approval lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermitStatus {
    PendingReview,
    Approved,
    WorkInProgress,
    WorkDone,
    Closed,
}

impl PermitStatus {
    pub const fn ordered() -> [PermitStatus; 5] {
        [
            PermitStatus::PendingReview,
            PermitStatus::Approved,
            PermitStatus::WorkInProgress,
            PermitStatus::WorkDone,
            PermitStatus::Closed,
        ]
    }

    /// Label persisted in the `permits.status` column and printed on reports.
    pub const fn label(self) -> &'static str {
        match self {
            PermitStatus::PendingReview => "Pending Review",
            PermitStatus::Approved => "Approved",
            PermitStatus::WorkInProgress => "Work In Progress",
            PermitStatus::WorkDone => "Work Done (Pending Close)",
            PermitStatus::Closed => "Closed",
        }
    }

    const fn key(self) -> &'static str {
        match self {
            PermitStatus::PendingReview => "pending_review",
            PermitStatus::Approved => "approved",
            PermitStatus::WorkInProgress => "work_in_progress",
            PermitStatus::WorkDone => "work_done",
            PermitStatus::Closed => "closed",
        }
    }

    /// Contractors may still upload progress evidence for these permits.
    pub const fn is_active(self) -> bool {
        matches!(self, PermitStatus::Approved | PermitStatus::WorkInProgress)
    }

    /// A reviewer has to act before the permit can move on.
    pub const fn awaits_reviewer(self) -> bool {
        matches!(self, PermitStatus::PendingReview | PermitStatus::WorkDone)
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, PermitStatus::Closed)
    }
}

/// Checkpoint at which a photo was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoStage {
    Before,
    During,
    After,
}

impl PhotoStage {
    pub const fn ordered() -> [PhotoStage; 3] {
        [PhotoStage::Before, PhotoStage::During, PhotoStage::After]
    }

    pub const fn label(self) -> &'static str {
        match self {
            PhotoStage::Before => "Before",
            PhotoStage::During => "During",
            PhotoStage::After => "After",
        }
    }

    const fn key(self) -> &'static str {
        match self {
            PhotoStage::Before => "before",
            PhotoStage::During => "during",
            PhotoStage::After => "after",
        }
    }
}

/// Raised when a stored or user supplied label matches no known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognised {kind} '{value}'")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! label_from_str {
    ($ty:ident, $kind:literal) => {
        impl FromStr for $ty {
            type Err = UnknownLabel;

            /// Accepts the display label ("Hot Work") or the snake_case key ("hot_work").
            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                let trimmed = raw.trim();
                $ty::ordered()
                    .into_iter()
                    .find(|variant| {
                        variant.label().eq_ignore_ascii_case(trimmed)
                            || variant.key().eq_ignore_ascii_case(trimmed)
                    })
                    .ok_or_else(|| UnknownLabel {
                        kind: $kind,
                        value: raw.to_string(),
                    })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

label_from_str!(WorkType, "work type");
label_from_str!(PermitStatus, "permit status");
label_from_str!(PhotoStage, "photo stage");

/// Fields captured when a contractor opens a permit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPermit {
    pub contractor_name: String,
    pub work_type: WorkType,
    pub location: String,
    pub description: String,
}

/// A contractor's application together with the mandatory "before" evidence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermitSubmission {
    pub permit: NewPermit,
    pub before_photo: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permit {
    pub id: PermitId,
    pub contractor_name: String,
    pub work_type: WorkType,
    pub location: String,
    pub description: String,
    pub status: PermitStatus,
    pub request_date: DateTime<Utc>,
    pub approval_date: Option<DateTime<Utc>>,
    pub approver_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub id: PhotoId,
    pub permit_id: PermitId,
    pub stage: PhotoStage,
    pub image_data: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_back_to_variants() {
        for status in PermitStatus::ordered() {
            assert_eq!(status.label().parse::<PermitStatus>(), Ok(status));
        }
        assert_eq!("confined_space".parse::<WorkType>(), Ok(WorkType::ConfinedSpace));
        assert_eq!(" hot work ".parse::<WorkType>(), Ok(WorkType::HotWork));
        assert_eq!("AFTER".parse::<PhotoStage>(), Ok(PhotoStage::After));
    }

    #[test]
    fn unknown_labels_name_their_kind() {
        let err = "Scaffolding".parse::<WorkType>().unwrap_err();
        assert_eq!(err.to_string(), "unrecognised work type 'Scaffolding'");
    }

    #[test]
    fn queues_partition_open_statuses() {
        let active: Vec<_> = PermitStatus::ordered()
            .into_iter()
            .filter(|status| status.is_active())
            .collect();
        let review: Vec<_> = PermitStatus::ordered()
            .into_iter()
            .filter(|status| status.awaits_reviewer())
            .collect();

        assert_eq!(active, [PermitStatus::Approved, PermitStatus::WorkInProgress]);
        assert_eq!(review, [PermitStatus::PendingReview, PermitStatus::WorkDone]);
        assert!(PermitStatus::Closed.is_terminal());
    }
}
