///! PDF reader
///!
///! Opening reads the file once, checks its structure with the `pdf` crate
///! and hands the same bytes to Pdfium, which is bound once per process.
///! The loaded document lives until `close`, so pages are rendered without
///! touching the file again.
use image::RgbaImage;
use pdf::file::FileOptions;
use pdfium_render::prelude::{PdfBitmapFormat, PdfDocument, PdfRenderConfig, Pdfium};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::{check_index, BookFormat, Content, DocumentReader, DocumentSummary};
use crate::archive::corrupt;
use crate::image_processor::{create_cover_from_image, CoverConfig};
use crate::utils::error::{DocumentError, Result};

/// Environment variable naming an explicit Pdfium library file
pub const PDFIUM_LIBRARY_ENV: &str = "LIBRESHELF_PDFIUM_LIB";

static PDFIUM: OnceLock<std::result::Result<Pdfium, String>> = OnceLock::new();

struct OpenPdf {
    path: PathBuf,
    page_count: usize,
    // None when no Pdfium library could be bound
    document: Option<PdfDocument<'static>>,
}

enum State {
    Closed,
    Open(OpenPdf),
}

/// PDF reader holding at most one open document
pub struct PdfReader {
    state: State,
}

impl Default for PdfReader {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfReader {
    pub fn new() -> Self {
        Self {
            state: State::Closed,
        }
    }

    fn document(&self) -> Result<&OpenPdf> {
        match &self.state {
            State::Open(doc) => Ok(doc),
            State::Closed => Err(DocumentError::NotOpen),
        }
    }

    fn load(path: &Path) -> Result<OpenPdf> {
        let bytes = std::fs::read(path)?;

        let file = FileOptions::cached()
            .load(bytes.clone())
            .map_err(|e| corrupt(format!("Invalid PDF {:?}: {}", path, e)))?;
        let mut page_count = file.num_pages() as usize;

        let document = match pdfium() {
            Ok(pdfium) => {
                let document = pdfium
                    .load_pdf_from_byte_vec(bytes, None)
                    .map_err(|e| corrupt(format!("Pdfium rejected {:?}: {}", path, e)))?;
                page_count = document.pages().len() as usize;
                Some(document)
            }
            Err(e) => {
                tracing::debug!("Opening {:?} without a renderer: {}", path, e);
                None
            }
        };

        Ok(OpenPdf {
            path: path.to_path_buf(),
            page_count,
            document,
        })
    }

    /// Render one page at `scale` (1.0 = 72 dpi)
    ///
    /// An out-of-range index yields `Ok(None)` rather than an error. A
    /// non-positive or non-finite scale is treated as 1.0.
    pub fn render_page(&self, index: usize, scale: f32) -> Result<Option<RgbaImage>> {
        let doc = self.document()?;
        if index >= doc.page_count {
            tracing::debug!("Page {} requested, document has {}", index, doc.page_count);
            return Ok(None);
        }

        doc.render(index, normalize_scale(scale)).map(Some)
    }

    /// Thumbnail of the first page, flattened on white
    pub fn cover(&self, config: &CoverConfig) -> Result<RgbaImage> {
        let doc = self.document()?;
        check_index(0, doc.page_count)?;

        let page = doc.render(0, 1.0)?;
        create_cover_from_image(page, config)
    }
}

impl DocumentReader for PdfReader {
    fn format(&self) -> BookFormat {
        BookFormat::Pdf
    }

    fn open(&mut self, path: &Path) -> Result<DocumentSummary> {
        self.close();

        let doc = Self::load(path)?;
        let unit_count = doc.page_count;
        tracing::info!("Opened PDF {:?}: {} pages", path, unit_count);

        self.state = State::Open(doc);
        Ok(DocumentSummary {
            format: BookFormat::Pdf,
            path: path.to_path_buf(),
            unit_count,
        })
    }

    fn unit_count(&self) -> Result<usize> {
        Ok(self.document()?.page_count)
    }

    fn fetch(&self, index: usize) -> Result<Content> {
        let doc = self.document()?;
        check_index(index, doc.page_count)?;

        doc.render(index, 1.0).map(Content::Image)
    }

    fn close(&mut self) {
        if let State::Open(doc) = std::mem::replace(&mut self.state, State::Closed) {
            tracing::debug!("Closed PDF {:?}", doc.path);
        }
    }

    fn is_open(&self) -> bool {
        matches!(self.state, State::Open(_))
    }
}

fn normalize_scale(scale: f32) -> f32 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}

fn pdfium() -> Result<&'static Pdfium> {
    PDFIUM
        .get_or_init(|| {
            let bound = bind_pdfium();
            if let Err(msg) = &bound {
                tracing::warn!("Pdfium unavailable: {}", msg);
            }
            bound
        })
        .as_ref()
        .map_err(|msg| DocumentError::Render(msg.clone()))
}

fn bind_pdfium() -> std::result::Result<Pdfium, String> {
    if let Ok(path) = std::env::var(PDFIUM_LIBRARY_ENV) {
        let bindings = Pdfium::bind_to_library(&path)
            .map_err(|e| format!("Failed to load Pdfium from {}={}: {}", PDFIUM_LIBRARY_ENV, path, e))?;
        return Ok(Pdfium::new(bindings));
    }

    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        let candidate = Pdfium::pdfium_platform_library_name_at_path(&dir);
        if let Ok(bindings) = Pdfium::bind_to_library(&candidate) {
            return Ok(Pdfium::new(bindings));
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        format!(
            "Pdfium library not found ({}); install it system-wide or set {}",
            e, PDFIUM_LIBRARY_ENV
        )
    })?;
    Ok(Pdfium::new(bindings))
}

fn render_error(what: &str, e: impl std::fmt::Display) -> DocumentError {
    DocumentError::Render(format!("{}: {}", what, e))
}

impl OpenPdf {
    fn render(&self, index: usize, scale: f32) -> Result<RgbaImage> {
        let document = match &self.document {
            Some(document) => document,
            None => {
                // Report the cached binding failure
                pdfium()?;
                return Err(DocumentError::Render("No PDF renderer loaded".to_string()));
            }
        };

        let page_index =
            u16::try_from(index).map_err(|_| render_error("Page index out of range", index))?;
        let page = document
            .pages()
            .get(page_index)
            .map_err(|e| render_error("Failed to get page", e))?;

        let config = PdfRenderConfig::new()
            .scale_page_by_factor(scale)
            .render_form_data(false)
            .use_grayscale_rendering(false)
            .set_reverse_byte_order(false)
            .set_format(PdfBitmapFormat::BGRA);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| render_error("Failed to render page", e))?;

        let width = bitmap.width().max(0) as u32;
        let height = bitmap.height().max(0) as u32;
        let img = bgra_to_rgba(&bitmap.as_raw_bytes(), width, height)?;

        tracing::debug!(
            "Rendered page {} of {:?} at {}x: {}x{}",
            index,
            self.path,
            scale,
            width,
            height
        );
        Ok(img)
    }
}

/// Convert a (possibly padded) BGRA buffer into a tightly packed RGBA image
fn bgra_to_rgba(src: &[u8], width: u32, height: u32) -> Result<RgbaImage> {
    let (w, h) = (width as usize, height as usize);
    let stride = if h == 0 { 0 } else { src.len() / h };
    if stride < w * 4 {
        return Err(DocumentError::Render(format!(
            "Bitmap buffer too small: {} bytes for {}x{}",
            src.len(),
            width,
            height
        )));
    }

    let mut pixels = Vec::with_capacity(w * h * 4);
    for row in src.chunks(stride.max(1)).take(h) {
        for px in row[..w * 4].chunks_exact(4) {
            pixels.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
        }
    }

    RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| DocumentError::Render("Failed to build page image".to_string()))
}
