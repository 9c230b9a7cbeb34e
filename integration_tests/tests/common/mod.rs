#![allow(dead_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use atlas_core::{Engine, EngineEvent, InputEvent, Modifiers, StyleConfig};
use atlas_schema::{CellKey, Document};
use crossbeam_channel::Receiver;

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn load_document(name: &str) -> Result<Document> {
    let path = fixture_path(name);
    Document::from_file(&path).with_context(|| format!("loading fixture {}", path.display()))
}

pub fn engine(name: &str) -> Result<Engine> {
    Ok(Engine::new(load_document(name)?, StyleConfig::builtin()))
}

pub fn key(panel: usize, q: i32, r: i32) -> CellKey {
    CellKey::new(panel, q, r)
}

/// Press, release and (if held) keep the modifiers reported on the pointer.
pub fn click(engine: &mut Engine, cell: CellKey, modifiers: Modifiers) {
    engine.handle(InputEvent::PointerDown {
        cell: Some(cell),
        modifiers,
    });
    engine.handle(InputEvent::click(Some(cell), modifiers));
}

pub fn click_background(engine: &mut Engine) {
    engine.handle(InputEvent::PointerDown {
        cell: None,
        modifiers: Modifiers::empty(),
    });
    engine.handle(InputEvent::click(None, Modifiers::empty()));
}

pub fn double_click(engine: &mut Engine, cell: Option<CellKey>) {
    engine.handle(InputEvent::DoubleClick {
        cell,
        modifiers: Modifiers::empty(),
    });
}

pub fn persistent(engine: &Engine) -> Vec<CellKey> {
    engine.selection().persistent().iter().copied().collect()
}

pub fn drain_names(events: &Receiver<EngineEvent>) -> Vec<&'static str> {
    events.try_iter().map(|event| event.name()).collect()
}
