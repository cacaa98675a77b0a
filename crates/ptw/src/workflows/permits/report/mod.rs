//! Printable permit report: a title block, the permit detail table and one
//! section per attached photo.

mod layout;
mod pdf;

pub use layout::{
    detail_rows, format_timestamp, wrap_text, FontWeight, ReportElement, ReportLayout, ReportPage,
    NOT_APPROVED, NO_PHOTOS, PAGE_HEIGHT_MM, PAGE_WIDTH_MM, UNREADABLE_PHOTO,
};

use super::domain::{Permit, PermitId, Photo};

/// Finished document ready to be downloaded.
#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub file_name: String,
    pub page_count: usize,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("pdf rendering failed: {0}")]
    Pdf(String),
}

/// Deterministic download name for a permit's report.
pub fn report_file_name(permit_id: PermitId) -> String {
    format!("Permit_Report_{permit_id}.pdf")
}

pub fn render_report(permit: &Permit, photos: &[Photo]) -> Result<RenderedReport, ReportError> {
    let layout = ReportLayout::build(permit, photos);
    let bytes = pdf::render(&layout)?;
    Ok(RenderedReport {
        file_name: report_file_name(permit.id),
        page_count: layout.pages().len(),
        bytes,
    })
}
