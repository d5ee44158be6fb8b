//! Input resolution: load and validate the page images of an invoice.
//!
//! Rasterising a PDF is the caller's job; this module only accepts images.
//! Every page is sniffed by its magic bytes before anything is uploaded, so
//! a mislabelled or non-image file fails fast with an input error rather
//! than burning an upload and a model round on garbage.

use crate::error::InvoiceError;
use image::ImageFormat;
use std::path::Path;
use tracing::debug;

/// One page of the invoice, ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// Display name sent with the upload (usually the file name).
    pub name: String,
    /// Declared MIME type, e.g. `image/png`.
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl PageImage {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Build a page whose MIME type is taken from its content.
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Result<Self, InvoiceError> {
        let name = name.into();
        let mime = detect_mime(&data).ok_or_else(|| InvoiceError::NotAnImage { name: name.clone() })?;
        Ok(Self::new(name, mime, data))
    }
}

/// MIME type of a supported image format, sniffed from its magic bytes.
pub fn detect_mime(data: &[u8]) -> Option<&'static str> {
    match image::guess_format(data).ok()? {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        _ => None,
    }
}

/// Read a page image from disk.
pub async fn load_page(path: &Path) -> Result<PageImage, InvoiceError> {
    let data = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => InvoiceError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => InvoiceError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let page = PageImage::from_bytes(name, data)?;
    debug!("Loaded page '{}' ({}, {} bytes)", page.name, page.mime_type, page.data.len());
    Ok(page)
}

/// Load several pages, preserving order.
pub async fn load_pages<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<PageImage>, InvoiceError> {
    let mut pages = Vec::with_capacity(paths.len());
    for p in paths {
        pages.push(load_page(p.as_ref()).await?);
    }
    Ok(pages)
}

/// Check every page before any network call is made.
pub fn validate_pages(pages: &[PageImage]) -> Result<(), InvoiceError> {
    if pages.is_empty() {
        return Err(InvoiceError::NoPages);
    }
    for page in pages {
        let detected = detect_mime(&page.data).ok_or_else(|| InvoiceError::NotAnImage {
            name: page.name.clone(),
        })?;
        if !page.mime_type.eq_ignore_ascii_case(detected) {
            return Err(InvoiceError::ContentTypeMismatch {
                name: page.name.clone(),
                declared: page.mime_type.clone(),
                detected: detected.to_string(),
            });
        }
    }
    Ok(())
}
