use image::DynamicImage;
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfLayerReference, Point,
};

use super::layout::{FontWeight, ReportElement, ReportLayout, PAGE_HEIGHT_MM, PAGE_WIDTH_MM};
use super::ReportError;

const LAYER_NAME: &str = "content";
const BORDER_THICKNESS_PT: f32 = 0.3;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

impl Fonts {
    fn for_weight(&self, weight: FontWeight) -> &IndirectFontRef {
        match weight {
            FontWeight::Regular => &self.regular,
            FontWeight::Bold => &self.bold,
        }
    }
}

/// Draw every page of the layout and serialize the document.
pub(crate) fn render(layout: &ReportLayout) -> Result<Vec<u8>, ReportError> {
    let (doc, first_page, first_layer) = PdfDocument::new(
        layout.title(),
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        LAYER_NAME,
    );
    let fonts = Fonts {
        regular: doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(pdf_error)?,
    };

    for (index, page) in layout.pages().iter().enumerate() {
        let (page_index, layer_index) = if index == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), LAYER_NAME)
        };
        let canvas = doc.get_page(page_index).get_layer(layer_index);
        canvas.set_outline_thickness(BORDER_THICKNESS_PT);

        for element in page.elements() {
            draw(&canvas, &fonts, element);
        }
    }

    doc.save_to_bytes().map_err(pdf_error)
}

fn draw(canvas: &PdfLayerReference, fonts: &Fonts, element: &ReportElement) {
    match element {
        ReportElement::Text {
            x_mm,
            baseline_mm,
            size_pt,
            weight,
            text,
        } => {
            canvas.use_text(
                text.as_str(),
                *size_pt,
                Mm(*x_mm),
                Mm(flip(*baseline_mm)),
                fonts.for_weight(*weight),
            );
        }
        ReportElement::Cell {
            x_mm,
            top_mm,
            width_mm,
            height_mm,
        } => {
            let left = Mm(*x_mm);
            let right = Mm(x_mm + width_mm);
            let top = Mm(flip(*top_mm));
            let bottom = Mm(flip(top_mm + height_mm));
            canvas.add_line(Line {
                points: vec![
                    (Point::new(left, top), false),
                    (Point::new(right, top), false),
                    (Point::new(right, bottom), false),
                    (Point::new(left, bottom), false),
                ],
                is_closed: true,
            });
        }
        ReportElement::Image {
            x_mm,
            top_mm,
            width_mm,
            height_mm,
            image,
        } => {
            // Flatten alpha so the embedded XObject is plain RGB.
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            let dpi = rgb.width() as f32 * 25.4 / width_mm;
            Image::from_dynamic_image(&rgb).add_to_layer(
                canvas.clone(),
                ImageTransform {
                    translate_x: Some(Mm(*x_mm)),
                    translate_y: Some(Mm(flip(top_mm + height_mm))),
                    dpi: Some(dpi),
                    ..Default::default()
                },
            );
        }
    }
}

/// Layout measures from the top edge, PDF user space from the bottom.
fn flip(from_top_mm: f32) -> f32 {
    PAGE_HEIGHT_MM - from_top_mm
}

fn pdf_error(err: impl std::fmt::Display) -> ReportError {
    ReportError::Pdf(err.to_string())
}
