use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

/// Who is driving the workflow. Only reviewers need the shared access code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Contractor,
    SafetyOfficer,
    ProjectManager,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Contractor => "Contractor",
            Role::SafetyOfficer => "Safety Officer (SHO)",
            Role::ProjectManager => "Project Manager (PIC)",
        }
    }

    pub const fn is_reviewer(self) -> bool {
        matches!(self, Role::SafetyOfficer | Role::ProjectManager)
    }

    /// Name recorded on approve/close. Falls back to the role label when the
    /// reviewer did not give one.
    pub fn approver_name(self, explicit: Option<&str>) -> String {
        match explicit.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.label().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("{} area requires an access code", .0.label())]
    MissingCode(Role),
    #[error("wrong access code for {}", .0.label())]
    InvalidCode(Role),
    #[error("{} cannot perform reviewer actions", .0.label())]
    NotReviewer(Role),
}

/// Single shared-secret check in front of reviewer operations.
#[derive(Clone)]
pub struct AccessGate {
    access_code: String,
}

impl AccessGate {
    pub fn new(access_code: impl Into<String>) -> Self {
        Self {
            access_code: access_code.into(),
        }
    }

    /// Contractors pass unconditionally; reviewers must present the code.
    pub fn authorize(&self, role: Role, presented: Option<&str>) -> Result<(), AccessError> {
        if !role.is_reviewer() {
            return Ok(());
        }

        match presented.map(str::trim).filter(|code| !code.is_empty()) {
            None => Err(AccessError::MissingCode(role)),
            Some(code) if self.matches(code) => Ok(()),
            Some(_) => {
                tracing::warn!(role = role.label(), "rejected reviewer access code");
                Err(AccessError::InvalidCode(role))
            }
        }
    }

    /// Gate for reviewer-only actions such as approve and close.
    pub fn authorize_reviewer(
        &self,
        role: Role,
        presented: Option<&str>,
    ) -> Result<(), AccessError> {
        if !role.is_reviewer() {
            return Err(AccessError::NotReviewer(role));
        }
        self.authorize(role, presented)
    }

    fn matches(&self, presented: &str) -> bool {
        !self.access_code.is_empty()
            && bool::from(self.access_code.as_bytes().ct_eq(presented.as_bytes()))
    }
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate")
            .field("access_code", &"<redacted>")
            .finish()
    }
}
