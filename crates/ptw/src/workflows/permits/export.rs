//! Master record export of the full permit table.

use std::io::Write;

use serde::Serialize;

use super::domain::Permit;
use super::report::format_timestamp;

const HEADER: [&str; 9] = [
    "id",
    "contractor_name",
    "work_type",
    "location",
    "description",
    "status",
    "request_date",
    "approval_date",
    "approver_name",
];

#[derive(Debug, Serialize)]
struct PermitCsvRow<'a> {
    id: i64,
    contractor_name: &'a str,
    work_type: &'static str,
    location: &'a str,
    description: &'a str,
    status: &'static str,
    request_date: String,
    approval_date: Option<String>,
    approver_name: Option<&'a str>,
}

impl<'a> From<&'a Permit> for PermitCsvRow<'a> {
    fn from(permit: &'a Permit) -> Self {
        Self {
            id: permit.id.0,
            contractor_name: &permit.contractor_name,
            work_type: permit.work_type.label(),
            location: &permit.location,
            description: &permit.description,
            status: permit.status.label(),
            request_date: format_timestamp(&permit.request_date),
            approval_date: permit.approval_date.as_ref().map(format_timestamp),
            approver_name: permit.approver_name.as_deref(),
        }
    }
}

/// Write one header row plus one row per permit, in the order given.
pub fn write_permits_csv<W: Write>(permits: &[Permit], writer: W) -> Result<(), csv::Error> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv.write_record(HEADER)?;
    for permit in permits {
        csv.serialize(PermitCsvRow::from(permit))?;
    }
    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::permits::domain::{PermitId, PermitStatus, WorkType};
    use chrono::{TimeZone, Utc};

    #[test]
    fn rows_use_display_labels_and_blank_optional_columns() {
        let permit = Permit {
            id: PermitId(7),
            contractor_name: "Acme Co".to_string(),
            work_type: WorkType::ConfinedSpace,
            location: "Tank 2".to_string(),
            description: "Inspect, then clean".to_string(),
            status: PermitStatus::PendingReview,
            request_date: Utc.with_ymd_and_hms(2026, 1, 5, 8, 30, 0).unwrap(),
            approval_date: None,
            approver_name: None,
        };

        let mut buffer = Vec::new();
        write_permits_csv(&[permit], &mut buffer).expect("csv written");
        let output = String::from_utf8(buffer).expect("utf8");
        let mut lines = output.lines();

        assert_eq!(
            lines.next(),
            Some("id,contractor_name,work_type,location,description,status,request_date,approval_date,approver_name")
        );
        assert_eq!(
            lines.next(),
            Some("7,Acme Co,Confined Space,Tank 2,\"Inspect, then clean\",Pending Review,2026-01-05 08:30:00 UTC,,")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn empty_table_still_writes_the_header() {
        let mut buffer = Vec::new();
        write_permits_csv(&[], &mut buffer).expect("csv written");
        assert_eq!(
            String::from_utf8(buffer).expect("utf8"),
            "id,contractor_name,work_type,location,description,status,request_date,approval_date,approver_name\n"
        );
    }
}
