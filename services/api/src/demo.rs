use clap::Args;
use ptw::error::AppError;
use ptw::workflows::permits::{
    NewPermit, PermitService, PermitSubmission, Role, SqlitePermitStore, WorkType,
};
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Contractor name used for the demo permit
    #[arg(long, default_value = "Demo Contractor")]
    pub(crate) contractor: String,
    /// Directory to write the generated PDF report into
    #[arg(long)]
    pub(crate) output_dir: Option<PathBuf>,
    /// Skip printing the CSV master record at the end
    #[arg(long)]
    pub(crate) skip_export: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    write_demo(args, &mut std::io::stdout())
}

pub(crate) fn write_demo(args: DemoArgs, out: &mut impl Write) -> Result<(), AppError> {
    let DemoArgs {
        contractor,
        output_dir,
        skip_export,
    } = args;

    let store = Arc::new(SqlitePermitStore::open_in_memory()?);
    let service = PermitService::new(store);

    writeln!(out, "Permit-to-work demo (in-memory database)")?;

    let permit = service.submit(PermitSubmission {
        permit: NewPermit {
            contractor_name: contractor,
            work_type: WorkType::HotWork,
            location: "Bay 3".to_string(),
            description: "Cut and re-weld handrail bracket".to_string(),
        },
        before_photo: demo_photo([180, 180, 180])?,
    })?;
    writeln!(
        out,
        "1. {} submitted permit #{} for {} at {} on {} -> {}",
        permit.contractor_name,
        permit.id,
        permit.work_type,
        permit.location,
        permit.request_date.format("%Y-%m-%d %H:%M"),
        permit.status
    )?;

    match service.record_after_photo(permit.id, &demo_photo([60, 160, 60])?) {
        Ok(_) => writeln!(out, "2. Completion photo accepted before approval (unexpected)")?,
        Err(err) => writeln!(out, "2. Completion photo before approval refused: {err}")?,
    }

    let approver = Role::SafetyOfficer.approver_name(None);
    let permit = service.approve(permit.id, &approver)?;
    writeln!(out, "3. {approver} approved -> {}", permit.status)?;

    let photo = service.add_during_photo(permit.id, &demo_photo([200, 120, 40])?)?;
    writeln!(
        out,
        "4. Progress photo #{} recorded ({} bytes)",
        photo.id.0,
        photo.image_data.len()
    )?;

    let permit = service.record_after_photo(permit.id, &demo_photo([60, 160, 60])?)?;
    writeln!(out, "5. Completion photo recorded -> {}", permit.status)?;

    let closer = Role::ProjectManager.approver_name(None);
    let permit = service.close(permit.id, &closer)?;
    writeln!(out, "6. {closer} verified and closed -> {}", permit.status)?;

    let report = service.generate_report(permit.id)?;
    match output_dir {
        Some(dir) => {
            let path = dir.join(&report.file_name);
            std::fs::write(&path, &report.bytes)?;
            writeln!(
                out,
                "7. Report written to {} ({} page(s), {} bytes)",
                path.display(),
                report.page_count,
                report.bytes.len()
            )?;
        }
        None => writeln!(
            out,
            "7. Report {} rendered ({} page(s), {} bytes)",
            report.file_name,
            report.page_count,
            report.bytes.len()
        )?,
    }

    if !skip_export {
        writeln!(out, "\nMaster record")?;
        out.write_all(&service.export_csv()?)?;
    }

    Ok(())
}

fn demo_photo(color: [u8; 3]) -> Result<Vec<u8>, AppError> {
    let image = image::RgbImage::from_pixel(64, 48, image::Rgb(color));
    let mut cursor = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut cursor, image::ImageOutputFormat::Png)
        .map_err(|err| AppError::InvalidInput(format!("demo photo could not be encoded: {err}")))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_output(args: DemoArgs) -> String {
        let mut out = Vec::new();
        write_demo(args, &mut out).expect("demo runs");
        String::from_utf8(out).expect("utf8 output")
    }

    #[test]
    fn demo_walks_the_full_lifecycle() {
        let output = demo_output(DemoArgs {
            contractor: "Acme Co".to_string(),
            ..DemoArgs::default()
        });

        assert!(output.contains("Acme Co submitted permit #1 for Hot Work at Bay 3"));
        assert!(output.contains(
            "refused: cannot submit completion photo while the permit is Pending Review"
        ));
        assert!(output.contains("Safety Officer (SHO) approved -> Approved"));
        assert!(output.contains("-> Work Done (Pending Close)"));
        assert!(output.contains("Project Manager (PIC) verified and closed -> Closed"));
        assert!(output.contains("Report Permit_Report_1.pdf rendered"));
        assert!(output.contains("1,Acme Co,Hot Work,Bay 3"));
    }

    #[test]
    fn demo_can_write_the_report() {
        let dir = tempfile::tempdir().expect("temp dir");
        let output = demo_output(DemoArgs {
            contractor: "Acme Co".to_string(),
            output_dir: Some(dir.path().to_path_buf()),
            skip_export: true,
        });

        let bytes = std::fs::read(dir.path().join("Permit_Report_1.pdf")).expect("report written");
        assert!(bytes.starts_with(b"%PDF"));
        assert!(!output.contains("Master record"));
    }
}
