//! File and entry names produced by the persistence layer.

use crate::settings::ExportFormat;

const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Replace every char outside `[A-Za-z0-9._-]` with `_`.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Archive path of the image behind layer `layer` of page `page`.
#[must_use]
pub fn image_entry_path(page: usize, layer: usize, file_name: &str) -> String {
    let name = if file_name.is_empty() {
        "image".to_owned()
    } else {
        sanitize_file_name(file_name)
    };
    format!("images/p{page}_{layer}_{name}.png")
}

/// `{product}_project_{YYYYMMDD}_{HHMMSS}.zip`
#[must_use]
pub fn project_file_name(product: &str, at: chrono::NaiveDateTime) -> String {
    format!("{product}_project_{}.zip", at.format(STAMP_FORMAT))
}

/// `{product}_exported_{YYYYMMDD}_{HHMMSS}.{png|jpg}`
#[must_use]
pub fn export_file_name(product: &str, at: chrono::NaiveDateTime, format: ExportFormat) -> String {
    format!(
        "{product}_exported_{}.{}",
        at.format(STAMP_FORMAT),
        format.extension()
    )
}
