use crate::infra::{open_store, read_photo};
use clap::{Args, Subcommand, ValueEnum};
use ptw::config::AppConfig;
use ptw::error::AppError;
use ptw::telemetry::{self, LogTarget};
use ptw::workflows::permits::{
    report_file_name, AccessGate, NewPermit, Permit, PermitId, PermitService, PermitSubmission,
    PermitView, Role, SqlitePermitStore, WorkType,
};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub(crate) enum PermitCommand {
    /// Submit a new permit together with its "before" photo
    Submit(SubmitArgs),
    /// List permits (reviewers see everything, contractors only active work)
    List(ListArgs),
    /// Write the master record as CSV
    Export(ExportArgs),
    /// Attach a progress photo to an approved permit
    During(PhotoArgs),
    /// Attach the "after" photo and hand the permit back for closing
    Finish(PhotoArgs),
    /// Approve a permit that is pending review
    Approve(ReviewArgs),
    /// Verify a finished permit and close it
    Close(ReviewArgs),
    /// Render the PDF report for a permit
    Report(ReportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct StoreArgs {
    /// Override PTW_DATABASE_PATH
    #[arg(long)]
    pub(crate) database: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct AccessArgs {
    /// Shared reviewer access code
    #[arg(long)]
    pub(crate) access_code: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct SubmitArgs {
    #[arg(long)]
    pub(crate) contractor: String,
    /// Hot Work, Height, Confined Space, Electrical or Lifting
    #[arg(long)]
    pub(crate) work_type: WorkType,
    #[arg(long)]
    pub(crate) location: String,
    #[arg(long, default_value = "")]
    pub(crate) description: String,
    /// JPG or PNG taken before work starts
    #[arg(long)]
    pub(crate) photo: PathBuf,
    #[command(flatten)]
    pub(crate) store: StoreArgs,
}

#[derive(Args, Debug)]
pub(crate) struct ListArgs {
    /// Only permits that are approved or in progress
    #[arg(long, conflicts_with = "review_queue")]
    pub(crate) active: bool,
    /// Only permits waiting on a reviewer
    #[arg(long)]
    pub(crate) review_queue: bool,
    /// Print JSON instead of a table
    #[arg(long)]
    pub(crate) json: bool,
    #[command(flatten)]
    pub(crate) access: AccessArgs,
    #[command(flatten)]
    pub(crate) store: StoreArgs,
}

#[derive(Args, Debug)]
pub(crate) struct ExportArgs {
    /// Destination file; stdout when omitted
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    #[command(flatten)]
    pub(crate) access: AccessArgs,
    #[command(flatten)]
    pub(crate) store: StoreArgs,
}

#[derive(Args, Debug)]
pub(crate) struct PhotoArgs {
    pub(crate) permit_id: i64,
    #[arg(long)]
    pub(crate) photo: PathBuf,
    #[command(flatten)]
    pub(crate) store: StoreArgs,
}

#[derive(Args, Debug)]
pub(crate) struct ReviewArgs {
    pub(crate) permit_id: i64,
    #[arg(long, value_enum)]
    pub(crate) role: RoleArg,
    /// Name recorded on the permit; defaults to the role title
    #[arg(long)]
    pub(crate) approver: Option<String>,
    #[command(flatten)]
    pub(crate) access: AccessArgs,
    #[command(flatten)]
    pub(crate) store: StoreArgs,
}

#[derive(Args, Debug)]
pub(crate) struct ReportArgs {
    pub(crate) permit_id: i64,
    /// Destination file; defaults to Permit_Report_<id>.pdf in the current directory
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    #[command(flatten)]
    pub(crate) access: AccessArgs,
    #[command(flatten)]
    pub(crate) store: StoreArgs,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RoleArg {
    Contractor,
    SafetyOfficer,
    ProjectManager,
}

impl From<RoleArg> for Role {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::Contractor => Role::Contractor,
            RoleArg::SafetyOfficer => Role::SafetyOfficer,
            RoleArg::ProjectManager => Role::ProjectManager,
        }
    }
}

pub(crate) fn run_permit_command(command: PermitCommand) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init_with_target(&config.telemetry, LogTarget::Stderr)?;
    execute(command, &config, &mut std::io::stdout())
}

pub(crate) fn execute(
    command: PermitCommand,
    config: &AppConfig,
    out: &mut impl Write,
) -> Result<(), AppError> {
    let gate = AccessGate::new(config.access.access_code.clone());

    match command {
        PermitCommand::Submit(args) => {
            let before_photo = read_photo(&args.photo)?;
            let service = open_service(config, &args.store)?;
            let permit = service.submit(PermitSubmission {
                permit: NewPermit {
                    contractor_name: args.contractor,
                    work_type: args.work_type,
                    location: args.location,
                    description: args.description,
                },
                before_photo,
            })?;
            writeln!(
                out,
                "Permit #{} submitted for {} ({})",
                permit.id, permit.contractor_name, permit.status
            )?;
        }
        PermitCommand::List(args) => {
            let service = open_service(config, &args.store)?;
            let permits = if args.active {
                service.active_permits()?
            } else {
                gate.authorize(Role::SafetyOfficer, args.access.access_code.as_deref())?;
                if args.review_queue {
                    service.review_queue()?
                } else {
                    service.list()?
                }
            };
            print_permits(out, permits, args.json)?;
        }
        PermitCommand::Export(args) => {
            gate.authorize(Role::SafetyOfficer, args.access.access_code.as_deref())?;
            let csv = open_service(config, &args.store)?.export_csv()?;
            match args.output {
                Some(path) => {
                    std::fs::write(&path, &csv)?;
                    writeln!(out, "Master record written to {}", path.display())?;
                }
                None => out.write_all(&csv)?,
            }
        }
        PermitCommand::During(args) => {
            let image = read_photo(&args.photo)?;
            let photo = open_service(config, &args.store)?
                .add_during_photo(PermitId(args.permit_id), &image)?;
            writeln!(
                out,
                "Progress photo #{} recorded for permit #{}",
                photo.id.0, photo.permit_id
            )?;
        }
        PermitCommand::Finish(args) => {
            let image = read_photo(&args.photo)?;
            let permit = open_service(config, &args.store)?
                .record_after_photo(PermitId(args.permit_id), &image)?;
            writeln!(out, "Permit #{} is now {}", permit.id, permit.status)?;
        }
        PermitCommand::Approve(args) => {
            let approver = reviewer(&gate, &args)?;
            let permit = open_service(config, &args.store)?
                .approve(PermitId(args.permit_id), &approver)?;
            writeln!(out, "Permit #{} approved by {}", permit.id, approver)?;
        }
        PermitCommand::Close(args) => {
            let approver = reviewer(&gate, &args)?;
            let permit = open_service(config, &args.store)?
                .close(PermitId(args.permit_id), &approver)?;
            writeln!(out, "Permit #{} closed by {}", permit.id, approver)?;
        }
        PermitCommand::Report(args) => {
            gate.authorize(Role::SafetyOfficer, args.access.access_code.as_deref())?;
            let permit_id = PermitId(args.permit_id);
            let report = open_service(config, &args.store)?.generate_report(permit_id)?;
            let path = args
                .output
                .unwrap_or_else(|| PathBuf::from(report_file_name(permit_id)));
            std::fs::write(&path, &report.bytes)?;
            writeln!(
                out,
                "Report for permit #{} written to {} ({} page(s), {} bytes)",
                permit_id,
                path.display(),
                report.page_count,
                report.bytes.len()
            )?;
        }
    }

    Ok(())
}

fn open_service(
    config: &AppConfig,
    store: &StoreArgs,
) -> Result<PermitService<SqlitePermitStore>, AppError> {
    let database: Option<&Path> = store.database.as_deref();
    Ok(PermitService::new(open_store(config, database)?))
}

/// Approver name to record once the role and code check out.
fn reviewer(gate: &AccessGate, args: &ReviewArgs) -> Result<String, AppError> {
    let role = Role::from(args.role);
    gate.authorize_reviewer(role, args.access.access_code.as_deref())?;
    Ok(role.approver_name(args.approver.as_deref()))
}

fn print_permits(out: &mut impl Write, permits: Vec<Permit>, json: bool) -> Result<(), AppError> {
    if json {
        let views: Vec<PermitView> = permits.into_iter().map(PermitView::from).collect();
        let rendered = serde_json::to_string_pretty(&views).map_err(std::io::Error::from)?;
        writeln!(out, "{rendered}")?;
        return Ok(());
    }

    if permits.is_empty() {
        writeln!(out, "No permits found.")?;
        return Ok(());
    }
    for permit in permits {
        writeln!(
            out,
            "#{:<5} {:<26} {:<15} {} @ {}",
            permit.id.0,
            permit.status.label(),
            permit.work_type.label(),
            permit.contractor_name,
            permit.location
        )?;
    }
    Ok(())
}
