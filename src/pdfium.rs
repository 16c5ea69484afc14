//! Binding to the pdfium shared library.
//!
//! pdfium is loaded at runtime. `PDFIUM_LIB_PATH` may point either at the
//! library file itself or at the directory that contains it; without it the
//! platform loader's search path is used.

use crate::error::DocRouteError;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::debug;

/// Environment variable naming an explicit pdfium library location.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Bind pdfium, honouring `PDFIUM_LIB_PATH`.
pub fn bind() -> Result<Pdfium, DocRouteError> {
    let bindings = match std::env::var_os(PDFIUM_LIB_PATH_ENV) {
        Some(raw) if !raw.is_empty() => {
            let path = Path::new(&raw);
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(path)
            } else {
                path.to_path_buf()
            };
            debug!("Binding pdfium from {}", lib.display());
            Pdfium::bind_to_library(&lib).map_err(|e| {
                DocRouteError::PdfiumBindingFailed(format!("{}: {:?}", lib.display(), e))
            })?
        }
        _ => Pdfium::bind_to_system_library()
            .map_err(|e| DocRouteError::PdfiumBindingFailed(format!("{:?}", e)))?,
    };

    Ok(Pdfium::new(bindings))
}
