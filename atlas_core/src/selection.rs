use std::collections::BTreeSet;

use atlas_schema::{CellKey, SelectionKind};

use crate::input::Modifiers;
use crate::links::{connected_component, one_hop_star, LinkGraph};
use crate::territory::shift_down;

/// A route being edited in connect mode. Edits stay on `staged` until commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertSession {
    route: String,
    anchor: usize,
    staged: Vec<CellKey>,
}

impl InsertSession {
    /// Start editing `route` with the anchor on `key`; `None` when the route
    /// does not contain `key`.
    pub fn anchored(links: &LinkGraph, route: &str, key: CellKey) -> Option<Self> {
        let link = links.get(route)?;
        let anchor = link.position(key)?;
        Some(Self {
            route: link.id.clone(),
            anchor,
            staged: link.points.clone(),
        })
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn anchor(&self) -> usize {
        self.anchor
    }

    pub fn anchor_key(&self) -> Option<CellKey> {
        self.staged.get(self.anchor).copied()
    }

    pub fn staged(&self) -> &[CellKey] {
        &self.staged
    }

    /// Insert `key` right after the anchor and advance the anchor onto it.
    /// Cells already on the route are skipped.
    pub fn insert_after_anchor(&mut self, key: CellKey) -> bool {
        if self.staged.contains(&key) {
            return false;
        }
        let index = (self.anchor + 1).min(self.staged.len());
        self.staged.insert(index, key);
        self.anchor = index;
        true
    }

    pub fn into_staged(self) -> (String, Vec<CellKey>) {
        (self.route, self.staged)
    }

    pub(crate) fn touches_panel(&self, panel: usize) -> bool {
        self.staged.iter().any(|key| key.panel == panel)
    }

    pub(crate) fn shift_panels(&mut self, removed: usize) {
        for key in &mut self.staged {
            key.panel = shift_down(key.panel, removed);
        }
    }
}

/// Interaction mode. Exactly one is active at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Group,
    /// `latched` when entered from the toolbar rather than a held modifier.
    Route { latched: bool },
    ConnectArmed { latched: bool },
    ConnectActive(InsertSession),
    Focus,
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Group => "group",
            Mode::Route { .. } => "route",
            Mode::ConnectArmed { .. } => "connect_armed",
            Mode::ConnectActive(_) => "connect_active",
            Mode::Focus => "focus",
        }
    }

    pub fn is_route(&self) -> bool {
        matches!(self, Mode::Route { .. })
    }

    pub fn is_connect(&self) -> bool {
        matches!(self, Mode::ConnectArmed { .. } | Mode::ConnectActive(_))
    }

    pub fn session(&self) -> Option<&InsertSession> {
        match self {
            Mode::ConnectActive(session) => Some(session),
            _ => None,
        }
    }

    pub fn session_mut(&mut self) -> Option<&mut InsertSession> {
        match self {
            Mode::ConnectActive(session) => Some(session),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeEvent {
    Modifiers(Modifiers),
    UseGroup,
    UseRoute,
    ArmConnect,
    AnchorChosen(InsertSession),
    Commit,
    Cancel,
    Blur,
    BackgroundClick,
    BackgroundDoubleClick,
}

impl ModeEvent {
    /// Events that return to Group and reset route selection state.
    pub fn resets_to_group(&self) -> bool {
        matches!(
            self,
            ModeEvent::UseGroup
                | ModeEvent::Blur
                | ModeEvent::BackgroundClick
                | ModeEvent::BackgroundDoubleClick
        )
    }
}

/// Next mode for `event`. Side effects are left to the caller.
pub fn transition(mode: Mode, event: ModeEvent) -> Mode {
    match event {
        ModeEvent::Modifiers(held) => {
            if held.focus() {
                return Mode::Focus;
            }
            match mode {
                Mode::ConnectActive(session) => Mode::ConnectActive(session),
                Mode::ConnectArmed { latched: true } => Mode::ConnectArmed { latched: true },
                _ if held.ctrl_like() && held.additive() => Mode::ConnectArmed { latched: false },
                Mode::Route { latched: true } => Mode::Route { latched: true },
                _ if held.ctrl_like() => Mode::Route { latched: false },
                _ if held.is_empty() => Mode::Group,
                Mode::Focus => Mode::Group,
                other => other,
            }
        }
        ModeEvent::UseGroup
        | ModeEvent::Blur
        | ModeEvent::BackgroundClick
        | ModeEvent::BackgroundDoubleClick => Mode::Group,
        ModeEvent::UseRoute => Mode::Route { latched: true },
        ModeEvent::ArmConnect => match mode {
            Mode::ConnectActive(session) => Mode::ConnectActive(session),
            Mode::ConnectArmed { .. } => Mode::Group,
            _ => Mode::ConnectArmed { latched: true },
        },
        ModeEvent::AnchorChosen(session) => match mode {
            Mode::ConnectArmed { .. } => Mode::ConnectActive(session),
            other => other,
        },
        ModeEvent::Commit | ModeEvent::Cancel => match mode {
            Mode::ConnectArmed { .. } | Mode::ConnectActive(_) => Mode::Group,
            other => other,
        },
    }
}

/// Persistent selection plus the ephemeral hover preview.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    persistent: BTreeSet<CellKey>,
    excluded: BTreeSet<CellKey>,
    selected_routes: BTreeSet<String>,
    preview: BTreeSet<CellKey>,
    hovered: Option<CellKey>,
    kind: SelectionKind,
}

impl SelectionState {
    pub fn persistent(&self) -> &BTreeSet<CellKey> {
        &self.persistent
    }

    pub fn excluded(&self) -> &BTreeSet<CellKey> {
        &self.excluded
    }

    pub fn selected_routes(&self) -> &BTreeSet<String> {
        &self.selected_routes
    }

    pub fn preview(&self) -> &BTreeSet<CellKey> {
        &self.preview
    }

    pub fn hovered(&self) -> Option<CellKey> {
        self.hovered
    }

    pub fn kind(&self) -> SelectionKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: SelectionKind) {
        self.kind = kind;
    }

    pub fn is_selected(&self, key: CellKey) -> bool {
        self.persistent.contains(&key)
    }

    /// Persistent becomes the points of the selected routes minus exclusions.
    pub fn recompute_from_routes(&mut self, links: &LinkGraph) {
        self.persistent = self.route_points(links);
    }

    /// Like [`Self::recompute_from_routes`] but keeps previously selected
    /// cells that lie on no selected route.
    pub fn recompute_preserving_extras(&mut self, links: &LinkGraph) {
        self.recompute_keeping_extras(links, &BTreeSet::new());
    }

    /// Points of `released` routes count as route points too, so toggling a
    /// route off removes its cells instead of keeping them as extras.
    fn recompute_keeping_extras(&mut self, links: &LinkGraph, released: &BTreeSet<String>) {
        let route_points = self.route_points(links);
        let covered: BTreeSet<CellKey> = self
            .selected_routes
            .iter()
            .chain(released)
            .filter_map(|id| links.get(id))
            .flat_map(|link| link.points.iter().copied())
            .collect();
        let extras: Vec<CellKey> = self
            .persistent
            .iter()
            .copied()
            .filter(|key| !covered.contains(key))
            .collect();
        self.persistent = route_points;
        self.persistent.extend(extras);
    }

    fn route_points(&self, links: &LinkGraph) -> BTreeSet<CellKey> {
        self.selected_routes
            .iter()
            .filter_map(|id| links.get(id))
            .flat_map(|link| link.points.iter().copied())
            .filter(|key| !self.excluded.contains(key))
            .collect()
    }

    /// Select every route touching the current selection. Only acts when
    /// something is selected and no route is yet.
    pub fn seed_routes_from_persistent(&mut self, links: &LinkGraph) -> bool {
        if self.persistent.is_empty() || !self.selected_routes.is_empty() {
            return false;
        }
        let seeded: BTreeSet<String> = links
            .links()
            .iter()
            .filter(|link| link.points.iter().any(|key| self.persistent.contains(key)))
            .map(|link| link.id.clone())
            .collect();
        if seeded.is_empty() {
            return false;
        }
        self.selected_routes = seeded;
        self.recompute_from_routes(links);
        self.kind = SelectionKind::Route;
        true
    }

    /// Group click: select or toggle the connected component of `key`.
    pub fn select_component(&mut self, links: &LinkGraph, key: CellKey, additive: bool) {
        let adjacency = links.adjacency(&self.excluded);
        let component = connected_component(&adjacency, key);
        for cell in &component {
            self.excluded.remove(cell);
        }
        if additive {
            if component.is_subset(&self.persistent) {
                for cell in &component {
                    self.persistent.remove(cell);
                }
            } else {
                self.persistent.extend(component.iter().copied());
            }
        } else {
            self.selected_routes.clear();
            self.persistent = component.clone();
        }
        self.kind = if component.len() > 1 {
            SelectionKind::Group
        } else {
            SelectionKind::Single
        };
        tracing::debug!(
            target: "atlas::selection",
            kind = self.kind.as_str(),
            size = component.len(),
            additive,
            "selection.changed=group_click"
        );
    }

    /// Route click: select or toggle every route containing `key`. A cell on
    /// no route is selected (or toggled) on its own.
    pub fn select_routes_at(&mut self, links: &LinkGraph, key: CellKey, additive: bool) {
        let routes = links.routes_containing(key);
        if routes.is_empty() {
            if additive {
                if !self.persistent.remove(&key) {
                    self.persistent.insert(key);
                }
            } else {
                self.selected_routes.clear();
                self.persistent = BTreeSet::from([key]);
            }
            self.kind = SelectionKind::Single;
        } else if additive {
            let mut released = BTreeSet::new();
            for id in routes {
                if self.selected_routes.remove(&id) {
                    released.insert(id);
                } else {
                    self.selected_routes.insert(id);
                }
            }
            self.recompute_keeping_extras(links, &released);
            self.kind = SelectionKind::Route;
        } else {
            self.selected_routes = routes;
            self.recompute_from_routes(links);
            self.kind = SelectionKind::Route;
        }
        tracing::debug!(
            target: "atlas::selection",
            routes = self.selected_routes.len(),
            size = self.persistent.len(),
            additive,
            "selection.changed=route_click"
        );
    }

    /// Select a freshly committed route, replacing or toggling.
    pub fn select_committed_route(&mut self, links: &LinkGraph, id: &str, additive: bool) {
        let mut released = BTreeSet::new();
        if additive {
            if self.selected_routes.remove(id) {
                released.insert(id.to_string());
            } else {
                self.selected_routes.insert(id.to_string());
            }
        } else {
            self.selected_routes = BTreeSet::from([id.to_string()]);
        }
        self.recompute_keeping_extras(links, &released);
        self.kind = SelectionKind::Route;
    }

    /// Drop one cell from the selection without touching its routes.
    pub fn remove_single(&mut self, key: CellKey) -> bool {
        let removed = self.persistent.remove(&key);
        if removed {
            self.excluded.insert(key);
        }
        removed
    }

    /// Replace persistent with `keys`, e.g. when re-importing a snapshot.
    pub fn select_keys<I>(&mut self, keys: I, kind: SelectionKind)
    where
        I: IntoIterator<Item = CellKey>,
    {
        self.selected_routes.clear();
        self.persistent = keys.into_iter().collect();
        self.kind = kind;
    }

    /// Explicit return to Group: routes, exclusions and preview go away.
    pub fn reset_to_group(&mut self) {
        self.selected_routes.clear();
        self.excluded.clear();
        self.clear_preview();
    }

    /// Everything cleared, as on a background click.
    pub fn clear_all(&mut self) {
        self.reset_to_group();
        self.persistent.clear();
        self.kind = SelectionKind::Single;
    }

    pub fn set_preview(&mut self, hovered: Option<CellKey>, keys: BTreeSet<CellKey>) {
        self.hovered = hovered;
        self.preview = keys;
    }

    pub fn clear_preview(&mut self) {
        self.hovered = None;
        self.preview.clear();
    }

    /// Hover preview for every mode except Focus, which previews territory.
    pub fn hover_preview(&self, mode: &Mode, links: &LinkGraph, key: CellKey) -> BTreeSet<CellKey> {
        let visible = |ids: BTreeSet<String>| -> BTreeSet<CellKey> {
            ids.iter()
                .filter_map(|id| links.get(id))
                .flat_map(|link| LinkGraph::visible_path(link, &self.excluded, &self.selected_routes))
                .collect()
        };
        match mode {
            Mode::Group | Mode::Focus => {
                connected_component(&links.adjacency(&self.excluded), key)
            }
            Mode::Route { .. } => {
                let starting = links.routes_starting_at(key);
                let mut keys = if starting.is_empty() {
                    visible(links.routes_containing(key))
                } else {
                    visible(starting)
                };
                if let Some(mate) = links.find_endpoint_mate(key) {
                    keys.insert(key);
                    keys.insert(mate);
                }
                keys
            }
            Mode::ConnectArmed { .. } => visible(links.routes_containing(key)),
            Mode::ConnectActive(session) => {
                let staged = session.staged();
                let mut keys: BTreeSet<CellKey> = staged.iter().copied().collect();
                let Some(index) = staged.iter().position(|point| *point == key) else {
                    return keys;
                };
                let last = staged.len().saturating_sub(1);
                if staged.len() >= 2 && (index == 0 || index == last) {
                    keys.insert(if index == 0 { staged[1] } else { staged[last - 1] });
                } else {
                    let adjacency = links.adjacency(&self.excluded);
                    if let Some(anchor) = session.anchor_key() {
                        keys.extend(one_hop_star(&adjacency, anchor));
                    }
                    keys.extend(one_hop_star(&adjacency, key));
                }
                keys
            }
        }
    }

    /// Drop keys on a deleted panel and shift higher panels down. Route ids
    /// no longer present in `links` are forgotten.
    pub fn remove_panel(&mut self, removed: usize, links: &LinkGraph) {
        let shift = |set: &mut BTreeSet<CellKey>| {
            *set = std::mem::take(set)
                .into_iter()
                .filter(|key| key.panel != removed)
                .map(|key| key.with_panel(shift_down(key.panel, removed)))
                .collect();
        };
        shift(&mut self.persistent);
        shift(&mut self.excluded);
        shift(&mut self.preview);
        self.hovered = self
            .hovered
            .filter(|key| key.panel != removed)
            .map(|key| key.with_panel(shift_down(key.panel, removed)));
        self.selected_routes.retain(|id| links.get(id).is_some());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_schema::{Link, LinkType, PathPoint};

    fn road(id: &str, cells: &[(i32, i32)]) -> Link {
        Link {
            id: Some(id.to_string()),
            kind: LinkType::Road,
            path: cells
                .iter()
                .map(|&(q, r)| PathPoint {
                    panel: Some(0),
                    q,
                    r,
                })
                .collect(),
            panel: None,
            panel_from: None,
            panel_to: None,
        }
    }

    fn key(q: i32, r: i32) -> CellKey {
        CellKey::new(0, q, r)
    }

    fn graph() -> LinkGraph {
        LinkGraph::from_links(&[
            road("a", &[(0, 0), (1, 0), (2, 0)]),
            road("b", &[(2, 0), (3, 0)]),
            road("c", &[(5, 5), (6, 5)]),
        ])
    }

    #[test]
    fn modifiers_drive_modes() {
        let route = transition(Mode::Group, ModeEvent::Modifiers(Modifiers::CTRL));
        assert_eq!(route, Mode::Route { latched: false });
        let armed = transition(route, ModeEvent::Modifiers(Modifiers::CTRL | Modifiers::SHIFT));
        assert_eq!(armed, Mode::ConnectArmed { latched: false });
        let focus = transition(armed, ModeEvent::Modifiers(Modifiers::ALT | Modifiers::CTRL));
        assert_eq!(focus, Mode::Focus);
        assert_eq!(
            transition(Mode::Focus, ModeEvent::Modifiers(Modifiers::SHIFT)),
            Mode::Group
        );
        assert_eq!(
            transition(Mode::Route { latched: false }, ModeEvent::Modifiers(Modifiers::empty())),
            Mode::Group
        );
    }

    #[test]
    fn latched_modes_survive_modifier_release() {
        let route = transition(Mode::Group, ModeEvent::UseRoute);
        assert_eq!(
            transition(route, ModeEvent::Modifiers(Modifiers::empty())),
            Mode::Route { latched: true }
        );
        let armed = transition(Mode::Group, ModeEvent::ArmConnect);
        assert_eq!(
            transition(armed.clone(), ModeEvent::Modifiers(Modifiers::empty())),
            armed
        );
        assert_eq!(transition(armed, ModeEvent::ArmConnect), Mode::Group);
    }

    #[test]
    fn connect_session_lifecycle() {
        let links = graph();
        let session = InsertSession::anchored(&links, "a", key(1, 0)).unwrap();
        assert_eq!(
            transition(Mode::Route { latched: false }, ModeEvent::AnchorChosen(session.clone())),
            Mode::Route { latched: false }
        );
        let active = transition(
            Mode::ConnectArmed { latched: false },
            ModeEvent::AnchorChosen(session),
        );
        assert!(matches!(active, Mode::ConnectActive(_)));
        let held = transition(active.clone(), ModeEvent::Modifiers(Modifiers::empty()));
        assert_eq!(held, active);
        assert_eq!(transition(held, ModeEvent::Commit), Mode::Group);
        assert_eq!(transition(Mode::Group, ModeEvent::Cancel), Mode::Group);
        assert!(ModeEvent::BackgroundClick.resets_to_group());
        assert!(!ModeEvent::Modifiers(Modifiers::empty()).resets_to_group());
    }

    #[test]
    fn insert_advances_anchor_and_skips_known_cells() {
        let links = graph();
        let mut session = InsertSession::anchored(&links, "a", key(0, 0)).unwrap();
        assert!(session.insert_after_anchor(key(0, 1)));
        assert!(session.insert_after_anchor(key(0, 2)));
        assert!(!session.insert_after_anchor(key(2, 0)));
        assert_eq!(
            session.staged(),
            &[key(0, 0), key(0, 1), key(0, 2), key(1, 0), key(2, 0)]
        );
        assert_eq!(session.anchor_key(), Some(key(0, 2)));
        // the live route is untouched until commit
        assert_eq!(links.get("a").unwrap().points.len(), 3);
        assert!(InsertSession::anchored(&links, "a", key(9, 9)).is_none());
    }

    #[test]
    fn excluding_a_route_cell_splits_the_selection() {
        let links = LinkGraph::from_links(&[road("r", &[(0, 0), (1, 0), (2, 0)])]);
        let mut selection = SelectionState::default();
        selection.select_routes_at(&links, key(0, 0), false);
        assert_eq!(selection.persistent().len(), 3);

        assert!(selection.remove_single(key(1, 0)));
        selection.recompute_from_routes(&links);
        assert_eq!(
            selection.persistent(),
            &BTreeSet::from([key(0, 0), key(2, 0)])
        );
        let adjacency = links.adjacency(selection.excluded());
        assert!(!adjacency.contains_key(&key(0, 0)));

        let once = selection.persistent().clone();
        selection.recompute_from_routes(&links);
        assert_eq!(selection.persistent(), &once);
    }

    #[test]
    fn group_click_replaces_and_toggles_components() {
        let links = graph();
        let mut selection = SelectionState::default();
        selection.select_component(&links, key(0, 0), false);
        assert_eq!(
            selection.persistent(),
            &BTreeSet::from([key(0, 0), key(1, 0), key(2, 0), key(3, 0)])
        );
        assert_eq!(selection.kind(), SelectionKind::Group);

        selection.select_component(&links, key(5, 5), true);
        assert_eq!(selection.persistent().len(), 6);
        selection.select_component(&links, key(6, 5), true);
        assert_eq!(selection.persistent().len(), 4);

        selection.select_component(&links, key(9, 9), false);
        assert_eq!(selection.persistent(), &BTreeSet::from([key(9, 9)]));
        assert_eq!(selection.kind(), SelectionKind::Single);
    }

    #[test]
    fn group_click_honours_exclusions() {
        let links = graph();
        let mut selection = SelectionState::default();
        selection.select_keys([key(1, 0)], SelectionKind::Single);
        assert!(selection.remove_single(key(1, 0)));
        selection.select_component(&links, key(3, 0), false);
        assert_eq!(
            selection.persistent(),
            &BTreeSet::from([key(2, 0), key(3, 0)])
        );
        assert!(selection.excluded().contains(&key(1, 0)));
    }

    #[test]
    fn removing_an_unselected_cell_leaves_the_graph_whole() {
        let links = LinkGraph::from_links(&[road("r", &[(0, 0), (1, 0), (2, 0)])]);
        let mut selection = SelectionState::default();
        assert!(!selection.remove_single(key(1, 0)));
        assert!(selection.excluded().is_empty());

        selection.select_component(&links, key(0, 0), false);
        assert_eq!(
            selection.persistent(),
            &BTreeSet::from([key(0, 0), key(1, 0), key(2, 0)])
        );
    }

    #[test]
    fn additive_route_click_toggles_routes_and_keeps_extras() {
        let links = graph();
        let mut selection = SelectionState::default();
        selection.select_routes_at(&links, key(9, 9), false);
        selection.select_routes_at(&links, key(5, 5), true);
        assert_eq!(
            selection.persistent(),
            &BTreeSet::from([key(5, 5), key(6, 5), key(9, 9)])
        );
        selection.select_routes_at(&links, key(6, 5), true);
        assert_eq!(selection.persistent(), &BTreeSet::from([key(9, 9)]));
        assert!(selection.selected_routes().is_empty());

        selection.select_routes_at(&links, key(9, 9), true);
        assert!(selection.persistent().is_empty());
    }

    #[test]
    fn shared_cell_selects_every_route_through_it() {
        let links = graph();
        let mut selection = SelectionState::default();
        selection.select_routes_at(&links, key(2, 0), false);
        assert_eq!(
            selection.selected_routes(),
            &BTreeSet::from(["a".to_string(), "b".to_string()])
        );
        assert_eq!(selection.kind(), SelectionKind::Route);
    }

    #[test]
    fn route_membership_wins_over_extras() {
        let links = graph();
        let mut selection = SelectionState::default();
        selection.select_keys([key(1, 0), key(9, 9)], SelectionKind::Single);
        selection.remove_single(key(1, 0));
        selection.select_committed_route(&links, "a", true);
        assert_eq!(
            selection.persistent(),
            &BTreeSet::from([key(0, 0), key(2, 0), key(9, 9)])
        );
    }

    #[test]
    fn seeding_picks_touching_routes_once() {
        let links = graph();
        let mut selection = SelectionState::default();
        assert!(!selection.seed_routes_from_persistent(&links));

        selection.select_keys([key(3, 0)], SelectionKind::Single);
        assert!(selection.seed_routes_from_persistent(&links));
        assert_eq!(
            selection.selected_routes(),
            &BTreeSet::from(["b".to_string()])
        );
        assert_eq!(
            selection.persistent(),
            &BTreeSet::from([key(2, 0), key(3, 0)])
        );
        assert!(!selection.seed_routes_from_persistent(&links));
    }

    #[test]
    fn explicit_group_reset_keeps_persistent() {
        let links = graph();
        let mut selection = SelectionState::default();
        selection.select_routes_at(&links, key(0, 0), false);
        selection.remove_single(key(0, 0));
        selection.set_preview(Some(key(5, 5)), BTreeSet::from([key(5, 5)]));
        selection.reset_to_group();
        assert!(selection.selected_routes().is_empty());
        assert!(selection.excluded().is_empty());
        assert!(selection.preview().is_empty());
        assert_eq!(selection.persistent().len(), 2);

        selection.clear_all();
        assert!(selection.persistent().is_empty());
    }

    #[test]
    fn route_hover_prefers_links_starting_at_the_cell() {
        let links = graph();
        let selection = SelectionState::default();
        let mode = Mode::Route { latched: false };
        assert_eq!(
            selection.hover_preview(&mode, &links, key(2, 0)),
            BTreeSet::from([key(2, 0), key(3, 0), key(1, 0)])
        );
        assert_eq!(
            selection.hover_preview(&mode, &links, key(1, 0)),
            BTreeSet::from([key(0, 0), key(1, 0), key(2, 0)])
        );
        assert_eq!(
            selection.hover_preview(&Mode::Group, &links, key(5, 5)),
            BTreeSet::from([key(5, 5), key(6, 5)])
        );
    }

    #[test]
    fn connect_hover_shows_staged_route_and_stars() {
        let links = graph();
        let selection = SelectionState::default();
        let mut session = InsertSession::anchored(&links, "a", key(0, 0)).unwrap();
        session.insert_after_anchor(key(0, 1));
        let mode = Mode::ConnectActive(session);

        let at_end = selection.hover_preview(&mode, &links, key(2, 0));
        assert_eq!(at_end.len(), 4);

        let inner = selection.hover_preview(&mode, &links, key(1, 0));
        assert!(inner.contains(&key(3, 0)) || inner.contains(&key(2, 0)));
        assert!(inner.contains(&key(0, 1)));

        let elsewhere = selection.hover_preview(&mode, &links, key(7, 7));
        assert_eq!(elsewhere.len(), 4);
    }

    #[test]
    fn panel_removal_shifts_selection() {
        let links = graph();
        let mut selection = SelectionState::default();
        selection.select_keys(
            [CellKey::new(0, 0, 0), CellKey::new(1, 1, 1), CellKey::new(2, 2, 2)],
            SelectionKind::Group,
        );
        selection.remove_panel(1, &links);
        assert_eq!(
            selection.persistent(),
            &BTreeSet::from([CellKey::new(0, 0, 0), CellKey::new(1, 2, 2)])
        );
    }
}
