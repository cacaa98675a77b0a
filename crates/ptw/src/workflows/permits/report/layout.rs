//! Fixed A4 layout of a permit report, computed independently of the PDF
//! backend so pagination and placeholders can be inspected directly.
//!
//! All coordinates are millimetres measured from the top-left corner of the
//! page.

use chrono::{DateTime, Utc};
use image::DynamicImage;
use tracing::warn;

use super::super::domain::{Permit, Photo};

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;

const MARGIN_MM: f32 = 10.0;
const CONTENT_BOTTOM_MM: f32 = PAGE_HEIGHT_MM - 20.0;
const ROW_HEIGHT_MM: f32 = 10.0;
const LINE_HEIGHT_MM: f32 = 5.0;
const CELL_PADDING_MM: f32 = 2.5;
const LABEL_WIDTH_MM: f32 = 50.0;
const VALUE_WIDTH_MM: f32 = 140.0;
const PHOTO_WIDTH_MM: f32 = 100.0;

const PT_TO_MM: f32 = 0.3528;
// Average Helvetica glyph advance as a fraction of the font size.
const AVG_GLYPH_EM: f32 = 0.5;

const TITLE_SIZE_PT: f32 = 16.0;
const HEADING_SIZE_PT: f32 = 14.0;
const CAPTION_SIZE_PT: f32 = 11.0;
const BODY_SIZE_PT: f32 = 10.0;

pub const NOT_APPROVED: &str = "N/A";
pub const NO_PHOTOS: &str = "No photos attached.";
pub const UNREADABLE_PHOTO: &str = "[Error loading image]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Regular,
    Bold,
}

#[derive(Debug, Clone)]
pub enum ReportElement {
    Text {
        x_mm: f32,
        baseline_mm: f32,
        size_pt: f32,
        weight: FontWeight,
        text: String,
    },
    /// Bordered table cell.
    Cell {
        x_mm: f32,
        top_mm: f32,
        width_mm: f32,
        height_mm: f32,
    },
    Image {
        x_mm: f32,
        top_mm: f32,
        width_mm: f32,
        height_mm: f32,
        image: DynamicImage,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ReportPage {
    elements: Vec<ReportElement>,
}

impl ReportPage {
    pub fn elements(&self) -> &[ReportElement] {
        &self.elements
    }
}

#[derive(Debug, Clone)]
pub struct ReportLayout {
    title: String,
    pages: Vec<ReportPage>,
}

impl ReportLayout {
    pub fn build(permit: &Permit, photos: &[Photo]) -> Self {
        let title = format!("Permit to Work Report - #{}", permit.id);
        let mut cursor = LayoutCursor::new();

        cursor.title(&title);
        cursor.advance(ROW_HEIGHT_MM);

        for (label, value) in detail_rows(permit) {
            cursor.detail_row(label, &value);
        }
        cursor.advance(ROW_HEIGHT_MM);

        cursor.ensure_space(ROW_HEIGHT_MM);
        cursor.text_row(
            "Site Photos & Evidence",
            HEADING_SIZE_PT,
            FontWeight::Bold,
        );
        cursor.advance(CELL_PADDING_MM * 2.0);

        if photos.is_empty() {
            cursor.ensure_space(ROW_HEIGHT_MM);
            cursor.text_row(NO_PHOTOS, CAPTION_SIZE_PT, FontWeight::Regular);
        }
        for photo in photos {
            cursor.photo(photo);
            cursor.advance(ROW_HEIGHT_MM);
        }

        Self {
            title,
            pages: cursor.finish(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn pages(&self) -> &[ReportPage] {
        &self.pages
    }

    /// Every text fragment in reading order, across all pages.
    pub fn text_lines(&self) -> impl Iterator<Item = &str> + '_ {
        self.pages
            .iter()
            .flat_map(|page| page.elements.iter())
            .filter_map(|element| match element {
                ReportElement::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
    }

    pub fn image_count(&self) -> usize {
        self.pages
            .iter()
            .flat_map(|page| page.elements.iter())
            .filter(|element| matches!(element, ReportElement::Image { .. }))
            .count()
    }
}

/// Key/value rows printed under the title, in their fixed order.
pub fn detail_rows(permit: &Permit) -> [(&'static str, String); 7] {
    let approver = permit
        .approver_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(NOT_APPROVED);

    [
        ("Contractor Name", permit.contractor_name.clone()),
        ("Work Type", permit.work_type.label().to_string()),
        ("Location", permit.location.clone()),
        ("Status", permit.status.label().to_string()),
        ("Requested Date", format_timestamp(&permit.request_date)),
        ("Approved By", approver.to_string()),
        ("Description", permit.description.clone()),
    ]
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

struct LayoutCursor {
    pages: Vec<ReportPage>,
    y: f32,
}

impl LayoutCursor {
    fn new() -> Self {
        Self {
            pages: vec![ReportPage::default()],
            y: MARGIN_MM,
        }
    }

    fn finish(self) -> Vec<ReportPage> {
        self.pages
    }

    fn push(&mut self, element: ReportElement) {
        if let Some(page) = self.pages.last_mut() {
            page.elements.push(element);
        }
    }

    fn advance(&mut self, height: f32) {
        self.y += height;
    }

    fn at_page_top(&self) -> bool {
        (self.y - MARGIN_MM).abs() < f32::EPSILON
    }

    fn new_page(&mut self) {
        self.pages.push(ReportPage::default());
        self.y = MARGIN_MM;
    }

    /// Start a new page unless `height` still fits above the bottom margin.
    fn ensure_space(&mut self, height: f32) {
        if self.y + height > CONTENT_BOTTOM_MM && !self.at_page_top() {
            self.new_page();
        }
    }

    fn title(&mut self, title: &str) {
        let text = pdf_safe(title);
        let width = text_width_mm(&text, TITLE_SIZE_PT);
        let x_mm = ((PAGE_WIDTH_MM - width) / 2.0).max(MARGIN_MM);
        self.push(ReportElement::Text {
            x_mm,
            baseline_mm: row_baseline(self.y, TITLE_SIZE_PT),
            size_pt: TITLE_SIZE_PT,
            weight: FontWeight::Bold,
            text,
        });
        self.advance(ROW_HEIGHT_MM);
    }

    fn text_row(&mut self, text: &str, size_pt: f32, weight: FontWeight) {
        self.push(ReportElement::Text {
            x_mm: MARGIN_MM,
            baseline_mm: row_baseline(self.y, size_pt),
            size_pt,
            weight,
            text: pdf_safe(text),
        });
        self.advance(ROW_HEIGHT_MM);
    }

    /// Number of value lines a table row can hold before the bottom margin.
    fn lines_that_fit(&self) -> usize {
        let available = CONTENT_BOTTOM_MM - self.y;
        if available < ROW_HEIGHT_MM {
            return 0;
        }
        ((available - 2.0 * CELL_PADDING_MM) / LINE_HEIGHT_MM).floor() as usize
    }

    /// Table row whose value wraps inside its cell. Rows taller than the
    /// remaining page continue on the next one with a "(cont.)" label.
    fn detail_row(&mut self, label: &str, value: &str) {
        let lines = wrap_text(&pdf_safe(value), max_chars(VALUE_WIDTH_MM, BODY_SIZE_PT));
        let full_page_lines = {
            let available = CONTENT_BOTTOM_MM - MARGIN_MM;
            ((available - 2.0 * CELL_PADDING_MM) / LINE_HEIGHT_MM).floor() as usize
        };

        let mut remaining = lines.as_slice();
        let mut row_label = label.to_string();
        while !remaining.is_empty() {
            let fit = self.lines_that_fit();
            let would_split = fit < remaining.len() && remaining.len() <= full_page_lines;
            if fit == 0 || (would_split && !self.at_page_top()) {
                self.new_page();
                continue;
            }

            let take = fit.min(remaining.len());
            self.table_cells(&row_label, &remaining[..take]);
            remaining = &remaining[take..];
            row_label = format!("{label} (cont.)");
        }
    }

    fn table_cells(&mut self, label: &str, lines: &[String]) {
        let height = (lines.len() as f32 * LINE_HEIGHT_MM + 2.0 * CELL_PADDING_MM)
            .max(ROW_HEIGHT_MM);
        let top = self.y;

        self.push(ReportElement::Cell {
            x_mm: MARGIN_MM,
            top_mm: top,
            width_mm: LABEL_WIDTH_MM,
            height_mm: height,
        });
        self.push(ReportElement::Cell {
            x_mm: MARGIN_MM + LABEL_WIDTH_MM,
            top_mm: top,
            width_mm: VALUE_WIDTH_MM,
            height_mm: height,
        });
        self.push(ReportElement::Text {
            x_mm: MARGIN_MM + CELL_PADDING_MM,
            baseline_mm: line_baseline(top, 0, BODY_SIZE_PT),
            size_pt: BODY_SIZE_PT,
            weight: FontWeight::Bold,
            text: pdf_safe(&format!("{label}:")),
        });
        for (index, line) in lines.iter().enumerate() {
            self.push(ReportElement::Text {
                x_mm: MARGIN_MM + LABEL_WIDTH_MM + CELL_PADDING_MM,
                baseline_mm: line_baseline(top, index, BODY_SIZE_PT),
                size_pt: BODY_SIZE_PT,
                weight: FontWeight::Regular,
                text: line.clone(),
            });
        }

        self.advance(height);
    }

    /// Caption followed by the scaled image, kept together on one page. An
    /// undecodable payload is replaced by a placeholder line.
    fn photo(&mut self, photo: &Photo) {
        let caption = format!(
            "Stage: {} (Taken: {})",
            photo.stage.label(),
            format_timestamp(&photo.timestamp)
        );

        match decode_photo(photo) {
            Some(image) => {
                let (width_mm, height_mm) = fit_photo(image.width(), image.height());
                self.ensure_space(ROW_HEIGHT_MM + height_mm);
                self.text_row(&caption, CAPTION_SIZE_PT, FontWeight::Bold);
                self.push(ReportElement::Image {
                    x_mm: MARGIN_MM,
                    top_mm: self.y,
                    width_mm,
                    height_mm,
                    image,
                });
                self.advance(height_mm);
            }
            None => {
                self.ensure_space(2.0 * ROW_HEIGHT_MM);
                self.text_row(&caption, CAPTION_SIZE_PT, FontWeight::Bold);
                self.text_row(UNREADABLE_PHOTO, BODY_SIZE_PT, FontWeight::Regular);
            }
        }
    }
}

fn decode_photo(photo: &Photo) -> Option<DynamicImage> {
    match image::load_from_memory(&photo.image_data) {
        Ok(image) if image.width() > 0 && image.height() > 0 => Some(image),
        Ok(_) => {
            warn!(permit_id = %photo.permit_id, photo_id = photo.id.0, "photo has no pixels");
            None
        }
        Err(err) => {
            warn!(
                permit_id = %photo.permit_id,
                photo_id = photo.id.0,
                error = %err,
                "photo could not be decoded for report"
            );
            None
        }
    }
}

/// Scale to the standard photo width, shrinking further when the result
/// would not fit under a caption on an empty page.
fn fit_photo(width_px: u32, height_px: u32) -> (f32, f32) {
    let max_height = CONTENT_BOTTOM_MM - MARGIN_MM - ROW_HEIGHT_MM;
    let width = PHOTO_WIDTH_MM;
    let height = width * height_px as f32 / width_px as f32;
    if height > max_height {
        (width * max_height / height, max_height)
    } else {
        (width, height)
    }
}

fn row_baseline(top: f32, size_pt: f32) -> f32 {
    top + ROW_HEIGHT_MM / 2.0 + size_pt * PT_TO_MM * 0.35
}

fn line_baseline(top: f32, line: usize, size_pt: f32) -> f32 {
    top + CELL_PADDING_MM
        + LINE_HEIGHT_MM * line as f32
        + LINE_HEIGHT_MM / 2.0
        + size_pt * PT_TO_MM * 0.35
}

fn text_width_mm(text: &str, size_pt: f32) -> f32 {
    text.chars().count() as f32 * size_pt * PT_TO_MM * AVG_GLYPH_EM
}

fn max_chars(width_mm: f32, size_pt: f32) -> usize {
    let usable = width_mm - 2.0 * CELL_PADDING_MM;
    ((usable / (size_pt * PT_TO_MM * AVG_GLYPH_EM)).floor() as usize).max(1)
}

/// Built-in PDF fonts only cover Latin-1; anything else prints as '?'.
fn pdf_safe(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\t' => ' ',
            '\n' => '\n',
            c if c.is_control() => ' ',
            c if (c as u32) <= 0xFF => c,
            _ => '?',
        })
        .collect()
}

/// Greedy word wrap. Explicit newlines start a new line and words longer
/// than a line are split. Always yields at least one line.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut current = String::new();
        let mut current_len = 0;

        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if current_len > 0 {
                    lines.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let rest = word.split_off(max_chars);
                lines.push(word.into_iter().collect());
                word = rest;
            }

            let needed = if current_len == 0 {
                word.len()
            } else {
                current_len + 1 + word.len()
            };
            if needed > max_chars && current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.extend(word.iter());
            current_len += word.len();
        }

        lines.push(current);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_text_respects_width_and_newlines() {
        let lines = wrap_text("replace flange gasket\nthen pressure test", 10);
        assert_eq!(lines, ["replace", "flange", "gasket", "then", "pressure", "test"]);

        let lines = wrap_text("hot work on level two", 12);
        assert_eq!(lines, ["hot work on", "level two"]);
    }

    #[test]
    fn wrap_text_splits_oversized_words() {
        let lines = wrap_text("abcdefghij", 4);
        assert_eq!(lines, ["abcd", "efgh", "ij"]);
    }

    #[test]
    fn wrap_text_keeps_empty_values_as_one_line() {
        assert_eq!(wrap_text("", 20), [""]);
    }

    #[test]
    fn pdf_safe_replaces_characters_outside_latin1() {
        assert_eq!(pdf_safe("Café\t✓"), "Café ?");
    }

    #[test]
    fn tall_photos_shrink_to_fit_a_page() {
        let (width, height) = fit_photo(100, 1000);
        assert!(height <= CONTENT_BOTTOM_MM - MARGIN_MM - ROW_HEIGHT_MM);
        assert!(width < PHOTO_WIDTH_MM);

        let (width, height) = fit_photo(400, 300);
        assert_eq!(width, PHOTO_WIDTH_MM);
        assert!((height - 75.0).abs() < 0.01);
    }
}
