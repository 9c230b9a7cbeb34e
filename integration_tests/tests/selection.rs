mod common;

use anyhow::Result;
use atlas_core::{InputEvent, Key, Mode, Modifiers};
use atlas_schema::SelectionKind;

use common::{click, click_background, drain_names, engine, key, persistent};

#[test]
fn group_click_floods_the_linked_component() -> Result<()> {
    let mut engine = engine("two_panels.json")?;
    let events = engine.subscribe();

    click(&mut engine, key(0, 1, 0), Modifiers::empty());
    assert_eq!(
        persistent(&engine),
        vec![
            key(0, 0, 0),
            key(0, 1, 0),
            key(0, 2, 0),
            key(0, 3, 0),
            key(0, 4, 0),
            key(1, 0, 0),
            key(1, 1, 0),
            key(1, 1, 1),
        ]
    );
    assert_eq!(engine.selection().kind(), SelectionKind::Group);
    assert_eq!(drain_names(&events), vec!["cell_clicked", "selection_changed"]);

    click(&mut engine, key(0, 0, 0), Modifiers::SHIFT);
    assert!(persistent(&engine).is_empty());
    Ok(())
}

#[test]
fn unlinked_cell_is_a_single_selection() -> Result<()> {
    let mut engine = engine("two_panels.json")?;
    click(&mut engine, key(0, 5, 5), Modifiers::empty());
    assert_eq!(persistent(&engine), vec![key(0, 5, 5)]);
    assert_eq!(engine.selection().kind(), SelectionKind::Single);
    Ok(())
}

#[test]
fn excluded_cell_stays_out_when_the_route_is_reselected() -> Result<()> {
    let mut engine = engine("single_road.json")?;
    click(&mut engine, key(0, 1, 0), Modifiers::CTRL);
    assert_eq!(persistent(&engine), vec![key(0, 0, 0), key(0, 1, 0), key(0, 2, 0)]);

    assert!(engine.remove_single(key(0, 1, 0)));
    assert_eq!(persistent(&engine), vec![key(0, 0, 0), key(0, 2, 0)]);
    let adjacency = engine.links().adjacency(engine.selection().excluded());
    assert!(adjacency
        .get(&key(0, 0, 0))
        .map_or(true, |neighbours| !neighbours.contains(&key(0, 2, 0))));
    assert!(!adjacency.contains_key(&key(0, 1, 0)));

    engine.handle(InputEvent::KeyUp {
        key: Key::Modifier(Modifiers::CTRL),
    });
    assert_eq!(engine.mode(), &Mode::Group);
    engine.use_route_mode();
    click(&mut engine, key(0, 0, 0), Modifiers::empty());
    assert_eq!(persistent(&engine), vec![key(0, 0, 0), key(0, 2, 0)]);

    let mut state = engine.selection().clone();
    state.recompute_from_routes(engine.links());
    let once = state.persistent().clone();
    state.recompute_from_routes(engine.links());
    assert_eq!(state.persistent(), &once);
    Ok(())
}

#[test]
fn explicit_group_switch_clears_exclusions() -> Result<()> {
    let mut engine = engine("single_road.json")?;
    engine.use_route_mode();
    click(&mut engine, key(0, 0, 0), Modifiers::empty());
    engine.remove_single(key(0, 2, 0));
    assert!(!engine.selection().excluded().is_empty());

    engine.use_group_mode();
    assert!(engine.selection().excluded().is_empty());
    assert!(engine.selection().selected_routes().is_empty());
    assert_eq!(persistent(&engine), vec![key(0, 0, 0), key(0, 1, 0)]);

    click_background(&mut engine);
    assert!(persistent(&engine).is_empty());
    Ok(())
}

#[test]
fn additive_route_click_toggles_routes_and_keeps_extras() -> Result<()> {
    let mut engine = engine("two_panels.json")?;
    engine.use_route_mode();
    click(&mut engine, key(0, 5, 5), Modifiers::empty());
    click(&mut engine, key(0, 0, 0), Modifiers::SHIFT);
    assert_eq!(
        persistent(&engine),
        vec![key(0, 0, 0), key(0, 1, 0), key(0, 2, 0), key(0, 5, 5)]
    );

    click(&mut engine, key(0, 3, 0), Modifiers::SHIFT);
    assert!(engine.selection().selected_routes().contains("V1"));
    click(&mut engine, key(0, 0, 0), Modifiers::SHIFT);
    assert_eq!(
        persistent(&engine),
        vec![key(0, 2, 0), key(0, 3, 0), key(0, 4, 0), key(0, 5, 5)]
    );
    Ok(())
}

#[test]
fn route_hover_previews_links_without_emitting() -> Result<()> {
    let mut engine = engine("two_panels.json")?;
    let events = engine.subscribe();
    engine.use_route_mode();
    engine.handle(InputEvent::PointerMove {
        cell: Some(key(0, 0, 0)),
    });
    let preview: Vec<_> = engine.selection().preview().iter().copied().collect();
    assert_eq!(preview, vec![key(0, 0, 0), key(0, 1, 0), key(0, 2, 0)]);
    assert_eq!(engine.selection().hovered(), Some(key(0, 0, 0)));
    assert!(drain_names(&events).is_empty());

    engine.handle(InputEvent::PointerMove { cell: None });
    assert!(engine.selection().preview().is_empty());
    Ok(())
}

#[test]
fn connect_mode_stages_inserts_until_enter() -> Result<()> {
    let mut engine = engine("two_panels.json")?;
    engine.arm_connect();
    click(&mut engine, key(0, 4, 0), Modifiers::empty());
    click(&mut engine, key(0, 5, 0), Modifiers::empty());
    click(&mut engine, key(0, 3, 0), Modifiers::empty());
    assert_eq!(engine.links().get("V1").map(|link| link.points.len()), Some(3));

    engine.handle(InputEvent::KeyDown { key: Key::Enter });
    assert_eq!(engine.mode(), &Mode::Group);
    assert_eq!(
        engine.links().get("V1").map(|link| link.points.clone()),
        Some(vec![key(0, 2, 0), key(0, 3, 0), key(0, 4, 0), key(0, 5, 0)])
    );
    Ok(())
}

#[test]
fn background_click_aborts_connect_without_mutating_the_route() -> Result<()> {
    let mut engine = engine("two_panels.json")?;
    engine.arm_connect();
    click(&mut engine, key(0, 0, 0), Modifiers::empty());
    click(&mut engine, key(0, 0, 5), Modifiers::empty());
    click_background(&mut engine);
    assert_eq!(engine.mode(), &Mode::Group);
    assert_eq!(engine.links().get("R1").map(|link| link.points.len()), Some(3));
    Ok(())
}
