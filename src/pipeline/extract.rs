//! PDF page extraction: validate the document and rasterise pages via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto a dedicated thread pool
//! thread designed for blocking operations, preventing the Tokio worker
//! threads from stalling during CPU-heavy rendering.
//!
//! ## Why cap pixels, not DPI?
//!
//! Page sizes vary wildly: an A0 poster at 300 DPI would produce a
//! 14,000 × 20,000 px image. `max_pixels` caps the longest edge regardless
//! of physical size, keeping memory bounded while the DPI field still
//! records the nominal working resolution for downstream heuristics.

use crate::error::{ConvertError, PageError};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One page of the source PDF rendered to a raster image.
///
/// Produced here, consumed (and discarded) by the recognition stage.
/// Never mutated after creation.
pub struct PageImage {
    /// 1-based page number in the source document.
    pub page_number: u32,
    /// The rendered raster.
    pub image: DynamicImage,
    /// Raster width in pixels.
    pub width: u32,
    /// Raster height in pixels.
    pub height: u32,
    /// Nominal render resolution in dots per inch.
    pub dpi: u32,
}

/// Opens a PDF, validates it, and renders individual pages.
///
/// `open` fails fast on anything that makes the whole conversion pointless:
/// missing file, wrong magic bytes, corrupt structure, zero pages. Rendering
/// itself is per-page and reports [`PageError`] so one bad page cannot sink
/// the document.
pub struct PageExtractor {
    path: PathBuf,
    page_count: u32,
}

impl PageExtractor {
    /// Open and validate a PDF document.
    ///
    /// # Errors
    /// * [`ConvertError::FileNotFound`] / [`ConvertError::PermissionDenied`]
    ///   for filesystem problems
    /// * [`ConvertError::NotAPdf`] when the magic bytes are wrong
    /// * [`ConvertError::CorruptPdf`] when pdfium rejects the structure
    /// * [`ConvertError::EmptyDocument`] for a valid PDF with zero pages
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let path = path.as_ref().to_path_buf();

        validate_file(&path)?;

        let count_path = path.clone();
        let page_count = tokio::task::spawn_blocking(move || page_count_blocking(&count_path))
            .await
            .map_err(|e| ConvertError::Internal(format!("page-count task panicked: {e}")))??;

        if page_count == 0 {
            return Err(ConvertError::EmptyDocument { path });
        }

        info!("PDF validated: {} pages in {}", page_count, path.display());
        Ok(Self { path, page_count })
    }

    /// Number of pages in the document (≥ 1 once `open` succeeded).
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Render one page (1-based) to a raster at `dpi`, capped at
    /// `max_pixels` on the longest edge.
    ///
    /// Idempotent and order-independent: callers may render pages in any
    /// order, though the orchestrator always goes 1..N.
    pub async fn render_page(
        &self,
        page_number: u32,
        dpi: u32,
        max_pixels: u32,
    ) -> Result<PageImage, PageError> {
        if page_number == 0 || page_number > self.page_count {
            return Err(PageError::RenderFailed {
                page: page_number,
                detail: format!(
                    "page out of range (document has {} pages)",
                    self.page_count
                ),
            });
        }

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || render_page_blocking(&path, page_number, dpi, max_pixels))
            .await
            .map_err(|e| PageError::RenderFailed {
                page: page_number,
                detail: format!("render task panicked: {e}"),
            })?
    }
}

/// Filesystem-level checks plus the `%PDF` magic probe.
fn validate_file(path: &Path) -> Result<(), ConvertError> {
    let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => ConvertError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ConvertError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;
    if !metadata.is_file() {
        return Err(ConvertError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut magic = [0u8; 4];
    let mut file = std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => ConvertError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ConvertError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;
    file.read_exact(&mut magic).map_err(|_| ConvertError::NotAPdf {
        path: path.to_path_buf(),
        magic,
    })?;
    if &magic != b"%PDF" {
        return Err(ConvertError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

/// Blocking page count via pdfium; also validates the PDF structure.
fn page_count_blocking(path: &Path) -> Result<u32, ConvertError> {
    let pdfium = Pdfium::default();
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| ConvertError::CorruptPdf {
            path: path.to_path_buf(),
            detail: format!("{e:?}"),
        })?;
    Ok(document.pages().len() as u32)
}

/// Blocking implementation of page rendering.
fn render_page_blocking(
    path: &Path,
    page_number: u32,
    dpi: u32,
    max_pixels: u32,
) -> Result<PageImage, PageError> {
    let fail = |detail: String| PageError::RenderFailed {
        page: page_number,
        detail,
    };

    let pdfium = Pdfium::default();
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| fail(format!("{e:?}")))?;
    let pages = document.pages();
    let page = pages
        .get((page_number - 1) as u16)
        .map_err(|e| fail(format!("{e:?}")))?;

    // Physical page size at the requested DPI, then the pixel cap.
    let target_w = (page.width().value / 72.0 * dpi as f32).round().max(1.0) as u32;
    let target_h = (page.height().value / 72.0 * dpi as f32).round().max(1.0) as u32;
    let longest = target_w.max(target_h);
    let scale = if longest > max_pixels {
        max_pixels as f32 / longest as f32
    } else {
        1.0
    };

    let render_config = PdfRenderConfig::new()
        .set_target_width(((target_w as f32 * scale) as i32).max(1))
        .set_maximum_height(((target_h as f32 * scale) as i32).max(1));

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| fail(format!("{e:?}")))?;
    let image = bitmap.as_image();

    debug!(
        "Rendered page {} → {}x{} px at {} dpi",
        page_number,
        image.width(),
        image.height(),
        dpi
    );

    Ok(PageImage {
        page_number,
        width: image.width(),
        height: image.height(),
        dpi,
        image,
    })
}
