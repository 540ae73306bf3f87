/// Minimal PDF 1.4 writer for sheet layouts
///
/// Only what the sheets need: the built-in Helvetica faces (WinAnsi encoded,
/// so Spanish accents survive) and JPEG images passed through as DCTDecode
/// XObjects. No compression, no font embedding.

use std::io::Write;

use super::document::{DocumentRenderer, RenderError, SheetDocument};
use super::layout::{self, Item, Page, SheetLayout, PAGE_HEIGHT_MM, PAGE_WIDTH_MM};

const PT_PER_MM: f32 = 72.0 / 25.4;

const CATALOG_ID: usize = 1;
const PAGES_ID: usize = 2;
const FONT_REGULAR_ID: usize = 3;
const FONT_BOLD_ID: usize = 4;
const FIRST_PAGE_OBJECT_ID: usize = 5;

/// Renders sheets to PDF bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfRenderer;

impl DocumentRenderer for PdfRenderer {
    fn render(&self, doc: &SheetDocument) -> Result<Vec<u8>, RenderError> {
        let layout = layout::layout(doc);
        write_pdf(&layout).map_err(|e| RenderError::Document {
            serial: doc.serial.clone(),
            reason: e.to_string(),
        })
    }

    fn mime(&self) -> &'static str {
        "application/pdf"
    }
}

/// Object ids assigned to one page
struct PagePlan {
    page_id: usize,
    content_id: usize,
    image_ids: Vec<usize>,
}

/// Byte sink that remembers where each object starts
struct PdfWriter {
    out: Vec<u8>,
    offsets: Vec<usize>,
}

impl PdfWriter {
    fn new(object_count: usize) -> Self {
        Self {
            out: Vec::new(),
            // index 0 is the free-list head
            offsets: vec![0; object_count + 1],
        }
    }

    fn header(&mut self) -> std::io::Result<()> {
        // Binary marker comment so transfer tools treat the file as binary
        self.out.write_all(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n")
    }

    fn object(&mut self, id: usize, dict: &str) -> std::io::Result<()> {
        self.offsets[id] = self.out.len();
        write!(self.out, "{} 0 obj\n{}\nendobj\n", id, dict)
    }

    fn stream(&mut self, id: usize, dict_entries: &str, data: &[u8]) -> std::io::Result<()> {
        self.offsets[id] = self.out.len();
        write!(
            self.out,
            "{} 0 obj\n<< {} /Length {} >>\nstream\n",
            id,
            dict_entries,
            data.len()
        )?;
        self.out.write_all(data)?;
        self.out.write_all(b"\nendstream\nendobj\n")
    }

    fn finish(mut self) -> std::io::Result<Vec<u8>> {
        let xref_offset = self.out.len();
        let size = self.offsets.len();
        write!(self.out, "xref\n0 {}\n0000000000 65535 f \n", size)?;
        for offset in &self.offsets[1..] {
            write!(self.out, "{:010} 00000 n \n", offset)?;
        }
        write!(
            self.out,
            "trailer\n<< /Size {} /Root {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            size, CATALOG_ID, xref_offset
        )?;
        Ok(self.out)
    }
}

/// Serialize a laid-out sheet
pub fn write_pdf(layout: &SheetLayout) -> std::io::Result<Vec<u8>> {
    let mut next_id = FIRST_PAGE_OBJECT_ID;
    let plans: Vec<PagePlan> = layout
        .pages
        .iter()
        .map(|page| {
            let page_id = next_id;
            let content_id = next_id + 1;
            next_id += 2;
            let image_ids = page
                .images()
                .map(|_| {
                    let id = next_id;
                    next_id += 1;
                    id
                })
                .collect();
            PagePlan {
                page_id,
                content_id,
                image_ids,
            }
        })
        .collect();

    let mut pdf = PdfWriter::new(next_id - 1);
    pdf.header()?;

    pdf.object(
        CATALOG_ID,
        &format!("<< /Type /Catalog /Pages {} 0 R >>", PAGES_ID),
    )?;

    let kids: Vec<String> = plans.iter().map(|p| format!("{} 0 R", p.page_id)).collect();
    pdf.object(
        PAGES_ID,
        &format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            plans.len()
        ),
    )?;

    pdf.object(
        FONT_REGULAR_ID,
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
    )?;
    pdf.object(
        FONT_BOLD_ID,
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>",
    )?;

    for (page, plan) in layout.pages.iter().zip(&plans) {
        let xobjects: Vec<String> = plan
            .image_ids
            .iter()
            .enumerate()
            .map(|(i, id)| format!("/Im{} {} 0 R", i + 1, id))
            .collect();

        pdf.object(
            plan.page_id,
            &format!(
                "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {:.2} {:.2}] \
                 /Resources << /Font << /F1 {} 0 R /F2 {} 0 R >> /XObject << {} >> >> \
                 /Contents {} 0 R >>",
                PAGES_ID,
                PAGE_WIDTH_MM * PT_PER_MM,
                PAGE_HEIGHT_MM * PT_PER_MM,
                FONT_REGULAR_ID,
                FONT_BOLD_ID,
                xobjects.join(" "),
                plan.content_id
            ),
        )?;

        pdf.stream(plan.content_id, "", &content_stream(page)?)?;

        let jpegs = page.items.iter().filter_map(|item| match item {
            Item::Image { jpeg, .. } => Some(jpeg),
            Item::Text { .. } => None,
        });
        for (jpeg, id) in jpegs.zip(&plan.image_ids) {
            pdf.stream(
                *id,
                &format!(
                    "/Type /XObject /Subtype /Image /Width {} /Height {} \
                     /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter /DCTDecode",
                    jpeg.width_px, jpeg.height_px
                ),
                &jpeg.data,
            )?;
        }
    }

    pdf.finish()
}

/// Drawing operators for one page, converting from top-left millimetres
fn content_stream(page: &Page) -> std::io::Result<Vec<u8>> {
    let page_h = PAGE_HEIGHT_MM * PT_PER_MM;
    let mut out = Vec::new();
    let mut image_index = 0;

    for item in &page.items {
        match item {
            Item::Text {
                x,
                y,
                size,
                bold,
                text,
            } => {
                let font = if *bold { "F2" } else { "F1" };
                write!(
                    out,
                    "BT /{} {:.1} Tf {:.2} {:.2} Td (",
                    font,
                    size,
                    x * PT_PER_MM,
                    page_h - y * PT_PER_MM
                )?;
                out.extend_from_slice(&encode_text(text));
                out.extend_from_slice(b") Tj ET\n");
            }
            Item::Image { x, y, w, h, .. } => {
                image_index += 1;
                write!(
                    out,
                    "q {:.2} 0 0 {:.2} {:.2} {:.2} cm /Im{} Do Q\n",
                    w * PT_PER_MM,
                    h * PT_PER_MM,
                    x * PT_PER_MM,
                    page_h - (y + h) * PT_PER_MM,
                    image_index
                )?;
            }
        }
    }
    Ok(out)
}

/// WinAnsi bytes for a PDF literal string, with `(`, `)` and `\` escaped.
/// Characters outside Latin-1 become `?`.
fn encode_text(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push(b'\\');
                out.push(c as u8);
            }
            c if c.is_control() => out.push(b' '),
            c if (c as u32) < 0x80 => out.push(c as u8),
            c if (0xA0..=0xFF).contains(&(c as u32)) => out.push(c as u32 as u8),
            _ => out.push(b'?'),
        }
    }
    out
}
