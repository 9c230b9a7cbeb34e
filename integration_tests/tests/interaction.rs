mod common;

use anyhow::Result;
use atlas_core::{DiagnosticsCapture, Marker, Modifiers};
use atlas_schema::{Document, LinkType, SelectionKind};
use tracing_subscriber::prelude::*;

use common::{click, double_click, drain_names, engine, key, persistent};

#[test]
fn repeated_endpoint_commits_a_cross_panel_flight() -> Result<()> {
    let mut engine = engine("two_panels.json")?;
    let events = engine.subscribe();
    double_click(&mut engine, Some(key(0, 5, 5)));
    double_click(&mut engine, Some(key(1, 1, 1)));
    assert_eq!(engine.links().len(), 4);
    assert!(drain_names(&events).is_empty());

    double_click(&mut engine, Some(key(1, 1, 1)));
    assert_eq!(engine.links().len(), 5);
    let flight = engine.links().links().last().cloned();
    assert!(flight
        .as_ref()
        .is_some_and(|link| link.kind == LinkType::Flight && link.id.starts_with("flight-")));
    assert_eq!(persistent(&engine), vec![key(0, 5, 5), key(1, 1, 1)]);
    assert_eq!(engine.selection().kind(), SelectionKind::Route);
    assert_eq!(drain_names(&events), vec!["selection_changed"]);

    let json = serde_json::to_string(&engine.document())?;
    let reparsed = Document::parse_str(&json)?;
    let wire = reparsed.links.last().cloned();
    assert_eq!(
        wire.map(|link| (link.panel_from, link.panel_to)),
        Some((Some(0), Some(1)))
    );
    Ok(())
}

#[test]
fn shared_start_point_becomes_a_capital() -> Result<()> {
    let mut engine = engine("two_panels.json")?;
    assert!(engine
        .markers()
        .values()
        .all(|marker| *marker == Marker::City));

    for cell in [key(0, 0, 0), key(0, 5, 5), key(0, 5, 5)] {
        double_click(&mut engine, Some(cell));
    }
    let markers = engine.markers();
    assert_eq!(markers.get(&key(0, 0, 0)), Some(&Marker::Capital));
    assert_eq!(markers.get(&key(0, 2, 0)), Some(&Marker::City));
    Ok(())
}

#[test]
fn density_bounds_and_selection_boost() -> Result<()> {
    let mut engine = engine("single_road.json")?;
    let close = |a: Option<f32>, b: f32| a.is_some_and(|a| (a - b).abs() < 1e-5);

    let maps = engine.color_maps();
    assert!(close(maps.alpha_by_node.get(&key(0, 0, 0)).copied(), 0.95));
    assert!(close(maps.alpha_by_node.get(&key(0, 1, 0)).copied(), 0.15));

    click(&mut engine, key(0, 0, 0), Modifiers::empty());
    let maps = engine.color_maps();
    assert!(close(maps.alpha_by_node.get(&key(0, 1, 0)).copied(), 0.32));
    assert!(close(maps.border_width_by_node.get(&key(0, 1, 0)).copied(), 1.6));
    Ok(())
}

#[test]
fn rejected_gestures_are_logged_not_raised() -> Result<()> {
    let (capture, layer) = DiagnosticsCapture::new();
    let subscriber = tracing_subscriber::registry().with(layer);
    tracing::subscriber::with_default(subscriber, || -> Result<()> {
        let mut engine = engine("two_panels.json")?;
        engine.cancel_connect();
        assert!(engine.confirm_recolor(None).is_err());
        double_click(&mut engine, Some(key(0, 0, 0)));
        double_click(&mut engine, Some(key(0, 0, 0)));
        Ok(())
    })?;

    let records = capture.drain();
    let find = |message: &str| records.iter().find(|record| record.message == message);
    assert!(find("connect.cancel_ignored=not_connecting").is_some());
    assert_eq!(
        find("recolor.confirm_rejected").map(|record| record.level.as_str()),
        Some("WARN")
    );
    assert_eq!(
        find("flight.draft_ignored=repeat_start").map(|record| record.target.as_str()),
        Some("atlas::links")
    );
    Ok(())
}
