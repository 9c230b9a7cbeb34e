//! The owned engine instance every host binding talks to.
//!
//! All state lives here: the document panels, derived buckets and claims, the
//! live link graph, selection, mode, focus and the recolor workflow. Input
//! handlers mutate state first and publish events afterwards; they never
//! fail, rejected gestures are logged under `atlas::engine` instead.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use thiserror::Error;

use atlas_schema::{
    CellDetail, CellKey, ColorMaps, Document, Panel, SelectionKind, SelectionSnapshot,
};

use crate::buckets::{BucketIndex, OwnerAliases};
use crate::compose::ComposeContext;
use crate::events::{EngineEvent, EventBus};
use crate::input::{InputEvent, Key, Modifiers};
use crate::links::{DraftStep, FlightDraft, LinkGraph, Marker};
use crate::recolor::{self, PendingEdit, RecolorError, RecolorWorkflow};
use crate::selection::{transition, InsertSession, Mode, ModeEvent, SelectionState};
use crate::snapshot::build_snapshot;
use crate::style_config::StyleConfig;
use crate::territory::{BoundaryEdge, CellCensus, FocusMode, FocusState, PanelFocus, TerritoryIndex};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PanelError {
    #[error("panel index {index} is out of range ({len} panels)")]
    OutOfRange { index: usize, len: usize },
}

pub struct Engine {
    document: Document,
    config: Arc<StyleConfig>,
    aliases: OwnerAliases,
    buckets: BucketIndex,
    territory: TerritoryIndex,
    links: LinkGraph,
    selection: SelectionState,
    mode: Mode,
    focus: FocusState,
    recolor: RecolorWorkflow,
    draft: FlightDraft,
    held: Modifiers,
    events: EventBus,
}

impl Engine {
    /// Take ownership of a loaded document. Its links move into the live
    /// link graph; [`Engine::document`] reassembles the wire form.
    pub fn new(mut document: Document, config: Arc<StyleConfig>) -> Self {
        let links = LinkGraph::from_links(&document.links);
        document.links.clear();
        let aliases = OwnerAliases::default();
        let buckets = BucketIndex::build(&document.subspaces, &aliases);
        let territory = TerritoryIndex::build(&document.subspaces, &aliases);
        tracing::info!(
            target: "atlas::engine",
            title = %document.title,
            panels = document.subspaces.len(),
            links = links.len(),
            "engine.loaded=document"
        );
        Self {
            document,
            config,
            aliases,
            buckets,
            territory,
            links,
            selection: SelectionState::default(),
            mode: Mode::default(),
            focus: FocusState::default(),
            recolor: RecolorWorkflow::default(),
            draft: FlightDraft::default(),
            held: Modifiers::empty(),
            events: EventBus::default(),
        }
    }

    /// Drop every subscriber and all interaction state.
    pub fn dispose(&mut self) {
        self.events.clear();
        self.selection = SelectionState::default();
        self.mode = Mode::default();
        self.focus = FocusState::default();
        self.recolor.clear();
        self.draft.cancel();
        self.held = Modifiers::empty();
        tracing::info!(target: "atlas::engine", "engine.disposed");
    }

    pub fn subscribe(&mut self) -> Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn handle(&mut self, event: InputEvent) {
        match event {
            InputEvent::PointerDown { modifiers, .. } => self.sync_modifiers(modifiers),
            InputEvent::PointerMove { cell } => self.hover(cell),
            InputEvent::PointerUp {
                cell,
                modifiers,
                dragged,
            } => {
                self.sync_modifiers(modifiers);
                if dragged {
                    tracing::trace!(target: "atlas::engine", "click.ignored=drag");
                    return;
                }
                match cell {
                    Some(key) => self.click(key),
                    None => self.background_click(),
                }
            }
            InputEvent::DoubleClick { cell, modifiers } => {
                self.sync_modifiers(modifiers);
                match cell {
                    Some(key) => self.draft_gesture(key),
                    None => self.background_double_click(),
                }
            }
            InputEvent::KeyDown { key } => match key {
                Key::Modifier(modifiers) => self.sync_modifiers(self.held | modifiers),
                Key::Enter => self.commit_connect(),
                Key::Escape => self.escape(),
                Key::Other => {}
            },
            InputEvent::KeyUp { key } => {
                if let Key::Modifier(modifiers) = key {
                    self.sync_modifiers(self.held - modifiers);
                }
            }
            InputEvent::Blur => self.blur(),
        }
    }

    fn sync_modifiers(&mut self, held: Modifiers) {
        if held == self.held {
            return;
        }
        self.held = held;
        if self.apply_mode_event(ModeEvent::Modifiers(held)) {
            self.emit_selection();
        }
    }

    /// Run one transition plus its selection side effects. Returns whether
    /// persistent changed (route seeding).
    fn apply_mode_event(&mut self, event: ModeEvent) -> bool {
        let explicit = !matches!(
            event,
            ModeEvent::Modifiers(_)
                | ModeEvent::AnchorChosen(_)
                | ModeEvent::Commit
                | ModeEvent::Cancel
        );
        let resets = event.resets_to_group();
        let previous = std::mem::take(&mut self.mode);
        let previous_name = previous.name();
        let was_route = previous.is_route();
        self.mode = transition(previous, event);

        if explicit && self.recolor.cancel() {
            tracing::debug!(target: "atlas::engine", "recolor.discarded=mode_switch");
        }
        if resets {
            self.selection.reset_to_group();
        }
        let seeded = self.mode.is_route()
            && !was_route
            && self.selection.seed_routes_from_persistent(&self.links);
        if self.mode.name() != previous_name {
            self.selection.clear_preview();
            tracing::debug!(
                target: "atlas::engine",
                from = previous_name,
                to = self.mode.name(),
                seeded,
                "mode.changed"
            );
        }
        seeded
    }

    fn hover(&mut self, cell: Option<CellKey>) {
        let Some(key) = cell.filter(|key| key.panel < self.document.subspaces.len()) else {
            self.selection.clear_preview();
            return;
        };
        let keys = if matches!(self.mode, Mode::Focus) {
            recolor::focus_preview(&self.buckets, &self.focus, key)
        } else {
            self.selection.hover_preview(&self.mode, &self.links, key)
        };
        self.selection.set_preview(Some(key), keys);
    }

    fn click(&mut self, key: CellKey) {
        if key.panel >= self.document.subspaces.len() {
            tracing::debug!(target: "atlas::engine", cell = %key, "click.ignored=unknown_panel");
            return;
        }
        if matches!(self.mode, Mode::Focus) {
            self.alt_click(key);
            return;
        }

        if self.focus.degrade_to_outline(key.panel) {
            tracing::debug!(target: "atlas::engine", panel = key.panel, "focus.degraded=outline");
        }
        if self.recolor.cancel() {
            tracing::debug!(target: "atlas::engine", "recolor.discarded=click");
        }
        let route_additive = self.held.additive() || self.held.ctrl_like();
        let selection_changed = match self.mode {
            Mode::Group => {
                self.selection
                    .select_component(&self.links, key, self.held.additive());
                true
            }
            Mode::Route { .. } => {
                self.selection
                    .select_routes_at(&self.links, key, route_additive);
                true
            }
            Mode::ConnectArmed { .. } => {
                self.choose_anchor(key);
                false
            }
            Mode::ConnectActive(_) => {
                self.insert_at_anchor(key);
                false
            }
            Mode::Focus => false,
        };

        let detail = self.cell_detail(key);
        self.events.publish(EngineEvent::CellClicked { detail });
        if selection_changed {
            self.emit_selection();
        }
    }

    fn choose_anchor(&mut self, key: CellKey) {
        let session = self
            .links
            .links()
            .iter()
            .find(|link| link.contains(key))
            .and_then(|link| InsertSession::anchored(&self.links, &link.id, key));
        match session {
            Some(session) => {
                tracing::debug!(
                    target: "atlas::engine",
                    route = session.route(),
                    anchor = session.anchor(),
                    "connect.anchored"
                );
                self.apply_mode_event(ModeEvent::AnchorChosen(session));
            }
            None => {
                tracing::debug!(
                    target: "atlas::engine",
                    cell = %key,
                    "connect.anchor_ignored=not_on_route"
                );
            }
        }
    }

    fn insert_at_anchor(&mut self, key: CellKey) {
        let Some(session) = self.mode.session_mut() else {
            return;
        };
        if session.insert_after_anchor(key) {
            tracing::debug!(
                target: "atlas::engine",
                cell = %key,
                anchor = session.anchor(),
                "connect.inserted"
            );
        } else {
            tracing::debug!(target: "atlas::engine", cell = %key, "connect.insert_skipped=on_route");
        }
    }

    fn alt_click(&mut self, key: CellKey) {
        let target = self.buckets.get(key).and_then(|bucket| {
            if bucket.is_conflict() {
                Some(None)
            } else {
                bucket.single_owner().map(|owner| Some(owner.to_string()))
            }
        });
        let kind = match target {
            Some(None) => {
                self.recolor
                    .begin_conflict(&self.buckets, &self.config, key.panel);
                SelectionKind::ConflictPreview
            }
            Some(Some(owner)) => {
                self.recolor
                    .begin_country(&self.buckets, &self.config, key.panel, &owner);
                SelectionKind::CountryPreview
            }
            None => {
                self.recolor.cancel();
                tracing::debug!(
                    target: "atlas::engine",
                    cell = %key,
                    "recolor.begin_ignored=unowned_cell"
                );
                return;
            }
        };
        tracing::debug!(target: "atlas::engine", cell = %key, kind = kind.as_str(), "recolor.pending");
        let empty = BTreeSet::new();
        let keys = self.recolor.pending().keys().unwrap_or(&empty);
        let snapshot = build_snapshot(kind, keys, &self.buckets, &self.aliases, &self.links);
        self.events
            .publish(EngineEvent::SelectionChanged { kind, snapshot });
    }

    fn background_click(&mut self) {
        self.apply_mode_event(ModeEvent::BackgroundClick);
        self.selection.clear_all();
        self.emit_selection();
    }

    fn background_double_click(&mut self) {
        self.apply_mode_event(ModeEvent::BackgroundDoubleClick);
        self.selection.clear_all();
        if !self.draft.is_idle() {
            self.draft.cancel();
            tracing::debug!(target: "atlas::engine", "flight.draft_discarded=background");
        }
        self.focus.clear_focus();
        self.focus.clear_panel_overrides();
        self.emit_selection();
    }

    fn draft_gesture(&mut self, key: CellKey) {
        if key.panel >= self.document.subspaces.len() {
            tracing::debug!(target: "atlas::engine", cell = %key, "flight.ignored=unknown_panel");
            return;
        }
        match self.draft.gesture(key) {
            DraftStep::Started => {
                tracing::debug!(target: "atlas::links", cell = %key, "flight.draft=started");
            }
            DraftStep::Extended => {
                tracing::debug!(
                    target: "atlas::links",
                    cell = %key,
                    points = self.draft.path().len(),
                    "flight.draft=extended"
                );
            }
            DraftStep::Ignored => {
                tracing::debug!(target: "atlas::links", cell = %key, "flight.draft_ignored=repeat_start");
            }
            DraftStep::Commit(path) => {
                let points = path.len();
                let id = self.links.push_flight(path);
                let additive = self.held.additive() || self.held.ctrl_like();
                self.selection
                    .select_committed_route(&self.links, &id, additive);
                tracing::info!(target: "atlas::links", id = %id, points, "flight.committed");
                self.emit_selection();
            }
        }
    }

    fn escape(&mut self) {
        if self.mode.is_connect() {
            self.cancel_connect();
        }
        let discarded = self.recolor.cancel();
        self.focus.clear_focus();
        self.selection.clear_preview();
        if discarded {
            tracing::debug!(target: "atlas::engine", "recolor.discarded=escape");
            self.emit_selection();
        }
    }

    fn blur(&mut self) {
        self.held = Modifiers::empty();
        self.draft.cancel();
        self.apply_mode_event(ModeEvent::Blur);
    }

    pub fn use_group_mode(&mut self) {
        self.apply_mode_event(ModeEvent::UseGroup);
    }

    pub fn use_route_mode(&mut self) {
        if self.apply_mode_event(ModeEvent::UseRoute) {
            self.emit_selection();
        }
    }

    /// Toolbar connect button; toggles off when already armed.
    pub fn arm_connect(&mut self) {
        self.apply_mode_event(ModeEvent::ArmConnect);
    }

    /// Write the staged route edits and return to Group.
    pub fn commit_connect(&mut self) {
        let Some(session) = self.mode.session().cloned() else {
            tracing::debug!(
                target: "atlas::engine",
                mode = self.mode.name(),
                "connect.commit_ignored=no_anchor"
            );
            return;
        };
        self.apply_mode_event(ModeEvent::Commit);
        let (route, staged) = session.into_staged();
        let points = staged.len();
        if let Some(link) = self.links.get_mut(&route) {
            link.points = staged;
        }
        if self.selection.selected_routes().contains(&route) {
            self.selection.recompute_preserving_extras(&self.links);
        }
        tracing::info!(target: "atlas::engine", route = %route, points, "connect.committed");
        self.emit_selection();
    }

    pub fn cancel_connect(&mut self) {
        if !self.mode.is_connect() {
            tracing::debug!(
                target: "atlas::engine",
                mode = self.mode.name(),
                "connect.cancel_ignored=not_connecting"
            );
            return;
        }
        self.apply_mode_event(ModeEvent::Cancel);
        tracing::debug!(target: "atlas::engine", "connect.cancelled");
    }

    pub fn set_owner_aliases(&mut self, aliases: OwnerAliases) {
        self.aliases = aliases;
        self.rebuild();
    }

    pub fn set_country_focus(&mut self, owner: Option<&str>) {
        let owner = self.aliases.normalize_opt(owner);
        let mode = self.focus.mode();
        self.focus.set_focus(owner, mode);
    }

    pub fn set_focus_mode(&mut self, mode: FocusMode) {
        self.focus.set_mode(mode);
    }

    pub fn set_panel_focus(
        &mut self,
        panel: usize,
        owner: Option<&str>,
        mode: FocusMode,
    ) -> Result<(), PanelError> {
        self.check_panel(panel)?;
        let owner = self.aliases.normalize_opt(owner);
        self.focus.set_panel_override(panel, PanelFocus { owner, mode });
        Ok(())
    }

    pub fn set_panel_isolated(&mut self, panel: usize, isolated: bool) -> Result<(), PanelError> {
        self.check_panel(panel)?;
        self.focus.set_isolated(panel, isolated);
        Ok(())
    }

    pub fn add_panel(&mut self, panel: Panel) -> usize {
        self.document.subspaces.push(panel);
        self.rebuild();
        self.document.subspaces.len() - 1
    }

    pub fn rename_panel(&mut self, index: usize, name: &str) -> Result<(), PanelError> {
        self.check_panel(index)?;
        self.document.subspaces[index].name = name.to_string();
        Ok(())
    }

    /// Append an isolated copy of `index` that starts without a focus and
    /// inherits the source's country colors.
    pub fn duplicate_panel(&mut self, index: usize) -> Result<usize, PanelError> {
        self.check_panel(index)?;
        let mut copy = self.document.subspaces[index].clone();
        copy.name = format!("{} Copy", copy.name);
        self.document.subspaces.push(copy);
        let new_index = self.document.subspaces.len() - 1;

        self.focus.set_isolated(new_index, true);
        let mode = self.focus.mode();
        self.focus
            .set_panel_override(new_index, PanelFocus { owner: None, mode });
        self.recolor
            .overrides_mut()
            .duplicate_panel(index, new_index);
        self.rebuild();
        tracing::info!(target: "atlas::engine", from = index, to = new_index, "panel.duplicated");
        Ok(new_index)
    }

    /// Remove a panel and renumber everything that referenced higher panels.
    pub fn delete_panel(&mut self, index: usize) -> Result<(), PanelError> {
        self.check_panel(index)?;
        self.document.subspaces.remove(index);
        let dropped = self.links.remove_panel(index);
        self.selection.remove_panel(index, &self.links);
        self.focus.remove_panel(index);
        self.recolor.remove_panel(index);
        let draft_discarded = self.draft.remove_panel(index);

        let session_lost = match self.mode.session() {
            Some(session) => {
                session.touches_panel(index) || self.links.get(session.route()).is_none()
            }
            None => false,
        };
        if session_lost {
            self.mode = Mode::Group;
        } else if let Some(session) = self.mode.session_mut() {
            session.shift_panels(index);
        }

        self.rebuild();
        tracing::info!(
            target: "atlas::engine",
            panel = index,
            dropped_links = dropped,
            draft_discarded,
            session_lost,
            "panel.deleted"
        );
        self.emit_selection();
        Ok(())
    }

    fn check_panel(&self, index: usize) -> Result<(), PanelError> {
        let len = self.document.subspaces.len();
        if index < len {
            Ok(())
        } else {
            Err(PanelError::OutOfRange { index, len })
        }
    }

    fn rebuild(&mut self) {
        self.buckets = BucketIndex::build(&self.document.subspaces, &self.aliases);
        self.territory = TerritoryIndex::build(&self.document.subspaces, &self.aliases);
    }

    pub fn set_pending_color(&mut self, color: &str) -> bool {
        self.recolor.set_pending_color(color)
    }

    /// Confirm the pending recolor with its own color or with `color`.
    pub fn confirm_recolor(&mut self, color: Option<&str>) -> Result<(), RecolorError> {
        let confirmed = match self.recolor.confirm(color, &self.buckets, &self.config) {
            Ok(confirmed) => confirmed,
            Err(err) => {
                tracing::warn!(target: "atlas::recolor", error = %err, "recolor.confirm_rejected");
                return Err(err);
            }
        };
        let kind = match &confirmed {
            PendingEdit::Conflict(_) => SelectionKind::ConflictPreview,
            _ => SelectionKind::CountryPreview,
        };
        let empty = BTreeSet::new();
        let keys = confirmed.keys().unwrap_or(&empty);
        let snapshot = build_snapshot(kind, keys, &self.buckets, &self.aliases, &self.links);
        self.events
            .publish(EngineEvent::SelectionChanged { kind, snapshot });
        Ok(())
    }

    pub fn cancel_recolor(&mut self) -> bool {
        self.recolor.cancel()
    }

    pub fn set_sync_country_colors(&mut self, sync: bool) {
        self.recolor.set_sync_across_panels(sync);
    }

    /// Replace the selection with `keys`, e.g. from a saved snapshot.
    pub fn select_keys<I>(&mut self, keys: I, kind: SelectionKind)
    where
        I: IntoIterator<Item = CellKey>,
    {
        self.selection.select_keys(keys, kind);
        self.emit_selection();
    }

    pub fn remove_single(&mut self, key: CellKey) -> bool {
        let removed = self.selection.remove_single(key);
        if removed {
            self.emit_selection();
        }
        removed
    }

    pub fn save_selection(&mut self) -> SelectionSnapshot {
        let snapshot = self.selection_snapshot();
        self.events.publish(EngineEvent::SelectionSaved {
            snapshot: snapshot.clone(),
        });
        snapshot
    }

    pub fn request_summary(&mut self) -> SelectionSnapshot {
        let snapshot = self.selection_snapshot();
        self.events.publish(EngineEvent::SummarizeRequested {
            snapshot: snapshot.clone(),
        });
        snapshot
    }

    fn emit_selection(&mut self) {
        let snapshot = self.selection_snapshot();
        self.events.publish(EngineEvent::SelectionChanged {
            kind: snapshot.kind,
            snapshot,
        });
    }

    pub fn selection_snapshot(&self) -> SelectionSnapshot {
        build_snapshot(
            self.selection.kind(),
            self.selection.persistent(),
            &self.buckets,
            &self.aliases,
            &self.links,
        )
    }

    pub fn cell_detail(&self, key: CellKey) -> CellDetail {
        self.buckets
            .cell_detail(key, &self.aliases, &self.document.msu_index)
    }

    pub fn color_maps(&self) -> ColorMaps {
        let mut flight_marks = self.links.flight_endpoints();
        flight_marks.extend(self.draft.endpoint());
        ComposeContext {
            buckets: &self.buckets,
            config: &self.config,
            selection: &self.selection,
            focus: &self.focus,
            recolor: &self.recolor,
            flight_marks: &flight_marks,
        }
        .color_maps()
    }

    pub fn boundaries(&self, panel: usize) -> Vec<BoundaryEdge> {
        self.territory.boundaries(
            panel,
            self.focus.effective(panel),
            self.config.border(),
            self.config.hex().radius(),
        )
    }

    pub fn census(&self, panel: usize) -> CellCensus {
        self.territory.census(panel, &self.buckets)
    }

    pub fn markers(&self) -> BTreeMap<CellKey, Marker> {
        self.links
            .markers(self.selection.excluded(), self.selection.selected_routes())
    }

    /// The document as it stands now, live links included.
    pub fn document(&self) -> Document {
        Document {
            links: self.links.to_links(),
            ..self.document.clone()
        }
    }

    pub fn panels(&self) -> &[Panel] {
        &self.document.subspaces
    }

    pub fn config(&self) -> &StyleConfig {
        &self.config
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn held(&self) -> Modifiers {
        self.held
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn focus(&self) -> &FocusState {
        &self.focus
    }

    pub fn pending(&self) -> &PendingEdit {
        self.recolor.pending()
    }

    pub fn recolor(&self) -> &RecolorWorkflow {
        &self.recolor
    }

    pub fn links(&self) -> &LinkGraph {
        &self.links
    }

    pub fn buckets(&self) -> &BucketIndex {
        &self.buckets
    }

    pub fn draft(&self) -> &FlightDraft {
        &self.draft
    }
}
