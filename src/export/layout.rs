/// Page layout for inspection sheets
///
/// Positions are in millimetres on an A4 page with the origin at the top-left
/// corner. Text `y` is the baseline, image `y` is the top edge. Content that
/// would cross the bottom margin moves to a fresh page.

use tracing::warn;

use super::document::SheetDocument;
use crate::photo;

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 10.0;

const TITLE_SIZE: f32 = 16.0;
const FIELD_SIZE: f32 = 12.0;
const CAPTION_SIZE: f32 = 11.0;
const TITLE_ADVANCE: f32 = 10.0;
const LINE_ADVANCE: f32 = 8.0;
const CAPTION_ADVANCE: f32 = 6.0;
const PHOTO_GAP: f32 = 6.0;

/// Bounding box photos are scaled into (aspect preserved)
const PHOTO_BOX_W: f32 = 120.0;
const PHOTO_BOX_H: f32 = 90.0;

/// Helvetica at 12pt fits roughly this many characters across the usable width
const WRAP_COLUMNS: usize = 80;

/// A JPEG ready to be embedded as-is
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedJpeg {
    pub width_px: u32,
    pub height_px: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Text {
        x: f32,
        y: f32,
        size: f32,
        bold: bool,
        text: String,
    },
    Image {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        jpeg: EmbeddedJpeg,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Item>,
}

impl Page {
    pub fn images(&self) -> impl Iterator<Item = (f32, f32, f32, f32)> + '_ {
        self.items.iter().filter_map(|item| match item {
            Item::Image { x, y, w, h, .. } => Some((*x, *y, *w, *h)),
            Item::Text { .. } => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetLayout {
    pub pages: Vec<Page>,
    /// Photos that could not be decoded and were left out
    pub skipped_images: Vec<String>,
}

/// Tracks the write position and opens pages as needed
struct Cursor {
    pages: Vec<Page>,
    y: f32,
}

impl Cursor {
    fn new() -> Self {
        Self {
            pages: vec![Page::default()],
            y: MARGIN_MM,
        }
    }

    fn bottom() -> f32 {
        PAGE_HEIGHT_MM - MARGIN_MM
    }

    /// Start a new page unless `height` still fits below the cursor
    fn reserve(&mut self, height: f32) {
        if self.y + height > Self::bottom() && !self.page_is_empty() {
            self.pages.push(Page::default());
            self.y = MARGIN_MM;
        }
    }

    fn page_is_empty(&self) -> bool {
        self.pages.last().map_or(true, |p| p.items.is_empty())
    }

    fn push(&mut self, item: Item) {
        if let Some(page) = self.pages.last_mut() {
            page.items.push(item);
        }
    }

    fn text(&mut self, text: String, size: f32, bold: bool, advance: f32) {
        self.reserve(0.0);
        self.push(Item::Text {
            x: MARGIN_MM,
            y: self.y,
            size,
            bold,
            text,
        });
        self.y += advance;
    }
}

/// Lay out a sheet: title, labelled fields, then each photo with its caption
pub fn layout(doc: &SheetDocument) -> SheetLayout {
    let mut cursor = Cursor::new();
    let mut skipped_images = Vec::new();

    cursor.text(doc.title.clone(), TITLE_SIZE, true, TITLE_ADVANCE);

    for (label, value) in &doc.fields {
        let lines = wrap(&format!("{}: {}", label, value), WRAP_COLUMNS);
        for line in lines {
            cursor.text(line, FIELD_SIZE, false, LINE_ADVANCE);
        }
    }

    for image in &doc.images {
        let jpeg = match embed(&image.photo) {
            Ok(jpeg) => jpeg,
            Err(e) => {
                warn!("⚠️  Omitting photo '{}': {}", image.caption, e);
                skipped_images.push(image.caption.clone());
                continue;
            }
        };

        let (w, h) = fit(jpeg.width_px, jpeg.height_px, PHOTO_BOX_W, PHOTO_BOX_H);
        cursor.reserve(CAPTION_ADVANCE + h);
        cursor.text(image.caption.clone(), CAPTION_SIZE, true, CAPTION_ADVANCE);
        cursor.push(Item::Image {
            x: MARGIN_MM,
            y: cursor.y,
            w,
            h,
            jpeg,
        });
        cursor.y += h + PHOTO_GAP;
    }

    SheetLayout {
        pages: cursor.pages,
        skipped_images,
    }
}

/// Decode and re-encode so the PDF always gets a baseline RGB JPEG
fn embed(photo: &photo::Photo) -> Result<EmbeddedJpeg, photo::PhotoError> {
    let img = photo.decode()?;
    let data = photo::encode_jpeg(&img)?;
    Ok(EmbeddedJpeg {
        width_px: img.width(),
        height_px: img.height(),
        data,
    })
}

/// Scale `w_px` x `h_px` to fit inside `box_w` x `box_h`
fn fit(w_px: u32, h_px: u32, box_w: f32, box_h: f32) -> (f32, f32) {
    if w_px == 0 || h_px == 0 {
        return (box_w, box_h);
    }
    let (w, h) = (w_px as f32, h_px as f32);
    let scale = (box_w / w).min(box_h / h);
    (w * scale, h * scale)
}

/// Greedy word wrap on character count. Explicit newlines are kept and words
/// longer than a line are hard-split.
fn wrap(text: &str, columns: usize) -> Vec<String> {
    let columns = columns.max(1);
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        let words = paragraph.split_whitespace().flat_map(|word| {
            let chars: Vec<char> = word.chars().collect();
            chars
                .chunks(columns)
                .map(|chunk| chunk.iter().collect::<String>())
                .collect::<Vec<_>>()
        });
        for word in words {
            let word = word.as_str();
            let needed = if line.is_empty() {
                word.chars().count()
            } else {
                line.chars().count() + 1 + word.chars().count()
            };
            if needed > columns && !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        lines.push(line);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
