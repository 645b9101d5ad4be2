//! End-to-end scenarios through the public API.

use std::io::{Cursor, Write};
use std::time::Instant;

use cardsmith_core::history::HistoryManager;
use cardsmith_core::persist::archive::read_archive;
use cardsmith_core::persist::autosave::{self, KeyValueStore, MemoryStore, StoreName};
use cardsmith_core::state::LayerId;
use cardsmith_core::{Editor, LayerStore};

fn png(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 120, 200, 255]));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}
fn ids(store: &LayerStore) -> Vec<LayerId> {
    store.layers().iter().map(|layer| layer.id()).collect()
}

#[test]
fn grouping_two_images() {
    let mut store = LayerStore::default();
    let a = store.add_image(png(4, 4), "a.png").unwrap();
    assert_eq!(ids(&store), vec![a]);
    let b = store.add_image(png(4, 4), "b.png").unwrap();
    // New layers go in front.
    assert_eq!(ids(&store), vec![b, a]);

    let group = store.create_group();
    store.set_group(a, Some(group));
    assert_eq!(ids(&store), vec![b, a]);
    assert_eq!(store.layer(a).unwrap().group(), Some(group));
    assert!(store.groups_are_contiguous());

    store.set_group(b, Some(group));
    assert_eq!(ids(&store), vec![b, a]);
    assert_eq!(store.members(group).count(), 2);
    assert!(store.groups_are_contiguous());
}

#[test]
fn grouping_around_an_interloper() {
    let mut store = LayerStore::default();
    let a = store.add_image(png(2, 2), "a.png").unwrap();
    let x = store.add_text(Some("x"));
    let b = store.add_image(png(2, 2), "b.png").unwrap();
    assert_eq!(ids(&store), vec![b, x, a]);

    let group = store.create_group();
    store.set_group(a, Some(group));
    store.set_group(b, Some(group));
    // b joins directly in front of a, x keeps its place relative to both.
    assert_eq!(ids(&store), vec![x, b, a]);
    assert!(store.groups_are_contiguous());
}

#[test]
fn counters_never_repeat() {
    let mut store = LayerStore::default();
    let mut seen = Vec::new();
    for round in 0..10 {
        let group = store.create_group();
        assert!(!seen.contains(&group));
        seen.push(group);
        if round % 3 == 0 {
            store.delete_group(group);
        }
    }
    let first = store.add_text(None);
    store.remove_layer(first);
    store.add_text(None);
    assert_eq!(store.text_counter(), 2);
    assert_eq!(store.layers()[0].name, "Text 2");
}

#[test]
fn history_keeps_twenty() {
    let mut store = LayerStore::default();
    let mut history = HistoryManager::default();
    for step in 0..25 {
        store.add_image(png(1, 1 + step), "step.png").unwrap();
        // Only the newest image stays, so each snapshot holds exactly one.
        for old in ids(&store).into_iter().skip(1) {
            store.remove_layer(old);
        }
        let snapshot = history.capture(&store);
        history.push(snapshot);
    }
    assert_eq!(history.undo_len(), 20);
    assert_eq!(history.payload_count(), 20);

    let first_key = {
        let mut probe = LayerStore::default();
        probe.add_image(png(1, 1), "probe.png").unwrap();
        probe.layers()[0].as_image().unwrap().key().clone()
    };
    assert!(history.resolve(first_key.as_str()).is_none());
}

#[test]
fn legacy_autosave_upgraded() {
    let disk = MemoryStore::default();
    disk.put(
        StoreName::State,
        autosave::RECORD_KEY,
        br#"{"images": [{"type": "text", "text": "old"}], "groups": [], "groupCounter": 2, "settings": {}}"#,
    )
    .unwrap();
    let mut editor = Editor::default();
    assert!(editor.recover(&disk).unwrap());
    assert_eq!(editor.pages().len(), 1);
    assert_eq!(editor.pages().current_index(), 0);
    assert_eq!(editor.store().layers().len(), 1);
    assert_eq!(editor.store().group_counter(), 2);
    assert_eq!(editor.store().text_counter(), 0);
}

#[test]
fn archive_missing_one_image() {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    zip.start_file("project.json", options).unwrap();
    zip.write_all(
        br#"{
            "version": 1,
            "pages": [{
                "images": [
                    {"type": "image", "src": "images/p0_0_here.png.png", "fileName": "here.png"},
                    {"type": "image", "src": "images/p0_1_gone.png.png", "fileName": "gone.png"}
                ],
                "groups": [],
                "groupCounter": 0,
                "textCounter": 0
            }],
            "images": [],
            "groups": [],
            "groupCounter": 0,
            "textCounter": 0,
            "settings": {}
        }"#,
    )
    .unwrap();
    zip.start_file("images/p0_0_here.png.png", options).unwrap();
    zip.write_all(&png(3, 3)).unwrap();
    let bytes = zip.finish().unwrap().into_inner();

    let imported = read_archive(Cursor::new(bytes.clone())).unwrap();
    assert_eq!(imported.warnings.len(), 1);
    assert_eq!(imported.warnings[0].path, "images/p0_1_gone.png.png");

    let mut editor = Editor::default();
    let warnings = editor.import_archive(Instant::now(), Cursor::new(bytes)).unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(editor.store().layers().len(), 1);
    assert_eq!(editor.store().layers()[0].name, "here.png");
}
