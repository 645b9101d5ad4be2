//! # Project archive
//!
//! A portable ZIP file holding the whole session. `project.json` is the manifest, with one
//! [`PageRecord`] per page and the global settings. Image layers refer to PNG entries under
//! `images/` by path. For the benefit of single-page readers, the manifest's top-level page
//! fields repeat the first page.

use std::io::{Cursor, Read, Seek, Write};

use crate::payload::{is_data_url, PayloadKey, PayloadTable};
use crate::pages::Page;
use crate::settings::Settings;

use super::naming::image_entry_path;
use super::records::{LayerKindRecord, PageRecord};
use super::Session;

pub const MANIFEST_PATH: &str = "project.json";
pub const ARCHIVE_VERSION: u32 = 1;

#[derive(thiserror::Error, Debug)]
pub enum ArchiveError {
    #[error("not a readable archive: {0}")]
    Container(#[from] zip::result::ZipError),
    #[error("archive has no {MANIFEST_PATH}")]
    MissingManifest,
    #[error("unsupported archive version {0}")]
    UnsupportedVersion(String),
    #[error("malformed manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("re-encoding image: {0}")]
    Encode(#[from] image::ImageError),
}

/// An image the manifest refers to but the archive lacks. The layer is skipped.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[error("page {page}, layer {layer}: {path} is missing from the archive")]
pub struct MissingAsset {
    pub page: usize,
    pub layer: usize,
    pub path: String,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<PageRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_page: Option<usize>,
    /// Copy of the first page.
    #[serde(flatten)]
    pub first: PageRecord,
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug)]
pub struct ImportedProject {
    pub session: Session,
    pub warnings: Vec<MissingAsset>,
}

fn is_png(bytes: &[u8]) -> bool {
    matches!(image::guess_format(bytes), Ok(image::ImageFormat::Png))
}

fn to_png(bytes: &[u8]) -> Result<Vec<u8>, image::ImageError> {
    let image = image::load_from_memory(bytes)?;
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, image::ImageFormat::Png)?;
    Ok(out.into_inner())
}

/// Write the session as an archive into `writer`, returning it once finished.
///
/// PNG sources are stored byte for byte, anything else is re-encoded to PNG. Image entries
/// are stored uncompressed, the manifest is deflated. A layer whose bytes are unavailable is
/// left out with a warning.
pub fn write_archive<W: Write + Seek>(session: &Session, writer: W) -> Result<W, ArchiveError> {
    let mut zip = zip::ZipWriter::new(writer);
    let stored = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);

    let mut records = Vec::with_capacity(session.pages.len());
    for (page_index, page) in session.pages.iter().enumerate() {
        let mut record = page.record.clone();
        let mut kept = Vec::with_capacity(record.images.len());
        for (layer_index, mut layer) in std::mem::take(&mut record.images).into_iter().enumerate()
        {
            if let LayerKindRecord::Image(image) = &mut layer.kind {
                if !is_data_url(&image.src) {
                    let Some(bytes) = page.payloads.get(image.src.as_str()) else {
                        log::warn!(
                            "page {page_index} layer {layer_index}: no data for {}, left out",
                            image.src
                        );
                        continue;
                    };
                    let path = image_entry_path(page_index, layer_index, &image.file_name);
                    zip.start_file(path.as_str(), stored)?;
                    if is_png(bytes) {
                        zip.write_all(bytes)?;
                    } else {
                        zip.write_all(&to_png(bytes)?)?;
                    }
                    image.src = path;
                }
            }
            kept.push(layer);
        }
        record.images = kept;
        records.push(record);
    }

    let manifest = Manifest {
        version: ARCHIVE_VERSION,
        first: records.first().cloned().unwrap_or_default(),
        pages: Some(records),
        current_page: Some(session.current_page),
        settings: session.settings.clone(),
    };
    zip.start_file(MANIFEST_PATH, zip::write::SimpleFileOptions::default())?;
    zip.write_all(&serde_json::to_vec_pretty(&manifest)?)?;
    Ok(zip.finish()?)
}

/// Read an archive back into a session. Image entries become payloads keyed by content.
pub fn read_archive<R: Read + Seek>(reader: R) -> Result<ImportedProject, ArchiveError> {
    let mut zip = zip::ZipArchive::new(reader)?;
    let manifest = {
        let mut file = match zip.by_name(MANIFEST_PATH) {
            Ok(file) => file,
            Err(zip::result::ZipError::FileNotFound) => return Err(ArchiveError::MissingManifest),
            Err(err) => return Err(err.into()),
        };
        let mut text = String::new();
        file.read_to_string(&mut text)?;
        text
    };
    let value: serde_json::Value = serde_json::from_str(&manifest)?;
    match value.get("version") {
        Some(version) if version.as_u64() == Some(u64::from(ARCHIVE_VERSION)) => (),
        Some(version) => return Err(ArchiveError::UnsupportedVersion(version.to_string())),
        None => return Err(ArchiveError::UnsupportedVersion("(none)".to_owned())),
    }
    let manifest: Manifest = serde_json::from_value(value)?;

    let records = match manifest.pages {
        Some(pages) if !pages.is_empty() => pages,
        _ => vec![manifest.first],
    };
    let mut warnings = Vec::new();
    let mut pages = Vec::with_capacity(records.len());
    for (page_index, mut record) in records.into_iter().enumerate() {
        let mut payloads = PayloadTable::new();
        let mut kept = Vec::with_capacity(record.images.len());
        for (layer_index, mut layer) in std::mem::take(&mut record.images).into_iter().enumerate()
        {
            if let LayerKindRecord::Image(image) = &mut layer.kind {
                if !is_data_url(&image.src) {
                    let mut file = match zip.by_name(&image.src) {
                        Ok(file) => file,
                        Err(zip::result::ZipError::FileNotFound) => {
                            let missing = MissingAsset {
                                page: page_index,
                                layer: layer_index,
                                path: image.src.clone(),
                            };
                            log::warn!("{missing}");
                            warnings.push(missing);
                            continue;
                        }
                        Err(err) => return Err(err.into()),
                    };
                    let mut bytes = Vec::new();
                    file.read_to_end(&mut bytes)?;
                    let key = PayloadKey::of_bytes(&bytes);
                    image.src = key.to_string();
                    payloads.insert(key, bytes.into());
                }
            }
            kept.push(layer);
        }
        record.images = kept;
        pages.push(Page { record, payloads });
    }
    let current_page = manifest
        .current_page
        .unwrap_or(0)
        .min(pages.len().saturating_sub(1));
    Ok(ImportedProject {
        session: Session {
            pages,
            current_page,
            settings: manifest.settings,
        },
        warnings,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::Axis;
    use crate::state::LayerStore;
    use crate::util::test::png_bytes;

    fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 10]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut out, image::ImageFormat::Jpeg)
            .unwrap();
        out.into_inner()
    }
    fn page_of(store: &LayerStore) -> Page {
        Page {
            record: store.page_record(),
            payloads: store.payloads(),
        }
    }
    fn archive_with(manifest: &str, entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file(MANIFEST_PATH, options).unwrap();
        zip.write_all(manifest.as_bytes()).unwrap();
        for (path, bytes) in entries {
            zip.start_file(*path, options).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn round_trip() {
        let mut first = LayerStore::default();
        first.add_image(png_bytes(4, 3), "photo one.png").unwrap();
        first.add_text(Some("Greetings"));
        let group = first.create_group();
        let text = first.layers()[0].id();
        first.set_group(text, Some(group));

        let mut second = LayerStore::default();
        second.add_image(jpeg_bytes(8, 8), "scan.jpg").unwrap();

        let mut settings = Settings::default();
        settings.set_correction(Axis::X, 1.2);
        let session = Session {
            pages: vec![page_of(&first), page_of(&second)],
            current_page: 1,
            settings,
        };
        let bytes = write_archive(&session, Cursor::new(Vec::new()))
            .unwrap()
            .into_inner();

        let mut zip = zip::ZipArchive::new(Cursor::new(bytes.clone())).unwrap();
        assert!(zip.by_name("images/p0_1_photo_one.png.png").is_ok());
        assert!(zip.by_name("images/p1_0_scan.jpg.png").is_ok());

        let imported = read_archive(Cursor::new(bytes)).unwrap();
        assert!(imported.warnings.is_empty());
        let restored = imported.session;
        assert_eq!(restored.current_page, 1);
        assert_eq!(restored.settings, session.settings);
        // PNG bytes are kept as-is, so the first page comes back identical.
        assert_eq!(restored.pages[0], session.pages[0]);

        let mut reloaded = LayerStore::default();
        let report = reloaded.load_page(&restored.pages[1].record, &restored.pages[1].payloads);
        assert_eq!(report.loaded, 1);
        let image = reloaded.layers()[0].as_image().unwrap();
        assert_eq!(image.format(), image::ImageFormat::Png);
        assert_eq!(image.size(), [8, 8]);
        assert_eq!(image.file_name(), "scan.jpg");
    }
    #[test]
    fn missing_image_skipped() {
        let png = png_bytes(2, 2);
        let manifest = r#"{
            "version": 1,
            "images": [
                {"type": "image", "src": "images/p0_0_a.png.png", "fileName": "a.png"},
                {"type": "image", "src": "images/p0_1_b.png.png", "fileName": "b.png"}
            ],
            "groups": [],
            "groupCounter": 0,
            "textCounter": 0,
            "settings": {}
        }"#;
        let bytes = archive_with(manifest, &[("images/p0_0_a.png.png", &png)]);
        let imported = read_archive(Cursor::new(bytes)).unwrap();
        assert_eq!(
            imported.warnings,
            vec![MissingAsset {
                page: 0,
                layer: 1,
                path: "images/p0_1_b.png.png".to_owned(),
            }]
        );
        let page = &imported.session.pages[0];
        let mut store = LayerStore::default();
        let report = store.load_page(&page.record, &page.payloads);
        assert_eq!(report.loaded, 1);
        assert_eq!(store.layers()[0].name, "a.png");
    }
    #[test]
    fn malformed_archives() {
        assert!(matches!(
            read_archive(Cursor::new(b"not a zip".to_vec())),
            Err(ArchiveError::Container(_))
        ));

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("other.txt", zip::write::SimpleFileOptions::default())
            .unwrap();
        let no_manifest = zip.finish().unwrap().into_inner();
        assert!(matches!(
            read_archive(Cursor::new(no_manifest)),
            Err(ArchiveError::MissingManifest)
        ));

        let future = archive_with(r#"{"version": 2}"#, &[]);
        assert!(matches!(
            read_archive(Cursor::new(future)),
            Err(ArchiveError::UnsupportedVersion(v)) if v == "2"
        ));
        let unversioned = archive_with(r#"{"images": []}"#, &[]);
        assert!(matches!(
            read_archive(Cursor::new(unversioned)),
            Err(ArchiveError::UnsupportedVersion(_))
        ));
        let broken = archive_with("{ nope", &[]);
        assert!(matches!(
            read_archive(Cursor::new(broken)),
            Err(ArchiveError::Manifest(_))
        ));
    }
    #[test]
    fn single_page_manifest() {
        let manifest = r##"{
            "version": 1,
            "images": [{"type": "text", "text": "only"}],
            "textCounter": 1,
            "settings": {"markColor": "#ff0000"}
        }"##;
        let imported = read_archive(Cursor::new(archive_with(manifest, &[]))).unwrap();
        let session = imported.session;
        assert_eq!(session.pages.len(), 1);
        assert_eq!(session.current_page, 0);
        assert_eq!(session.pages[0].record.images.len(), 1);
        assert_eq!(session.pages[0].record.text_counter, 1);
        assert_eq!(session.settings.mark_color.to_hex(), "#ff0000");
    }
}
