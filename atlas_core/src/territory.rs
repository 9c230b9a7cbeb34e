use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use atlas_schema::{CellKey, Panel};

use crate::buckets::{BucketIndex, OwnerAliases};
use crate::coords::{self, DIRECTIONS};
use crate::style_config::BorderConfig;

/// How an active territory focus is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusMode {
    /// Focus territory gets its own fill, everything else is dimmed.
    #[default]
    Filled,
    /// Only the boundary of the focus territory is emphasised.
    Outline,
}

/// Claimed owners per coordinate of one panel.
#[derive(Debug, Clone, Default)]
pub struct PanelClaims {
    claims: BTreeMap<(i32, i32), BTreeSet<String>>,
}

impl PanelClaims {
    pub fn build(panel: &Panel, aliases: &OwnerAliases) -> Self {
        let mut claims: BTreeMap<(i32, i32), BTreeSet<String>> = BTreeMap::new();
        for claim in &panel.claims {
            let Some(owner) = aliases.normalize(&claim.owner) else {
                continue;
            };
            for hex in &claim.hexes {
                claims
                    .entry((hex.q, hex.r))
                    .or_default()
                    .insert(owner.clone());
            }
        }
        Self { claims }
    }

    pub fn owners_at(&self, q: i32, r: i32) -> Option<&BTreeSet<String>> {
        self.claims.get(&(q, r))
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn coords(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.claims.keys().copied()
    }
}

/// One side of a hex separating cells whose claim sets differ.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryEdge {
    pub cell: CellKey,
    pub side: usize,
    pub a: (f64, f64),
    pub b: (f64, f64),
    pub dashed: bool,
    pub focus: bool,
    pub opacity: f32,
}

/// Cell classification used by the territory census.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellCensus {
    pub conflict: usize,
    pub single: usize,
    pub unclaimed: usize,
}

impl CellCensus {
    pub fn total(&self) -> usize {
        self.conflict + self.single + self.unclaimed
    }
}

#[derive(Debug, Clone, Default)]
pub struct TerritoryIndex {
    panels: Vec<PanelClaims>,
}

impl TerritoryIndex {
    pub fn build(panels: &[Panel], aliases: &OwnerAliases) -> Self {
        let panels: Vec<PanelClaims> = panels
            .iter()
            .map(|panel| PanelClaims::build(panel, aliases))
            .collect();
        tracing::debug!(
            target: "atlas::territory",
            panels = panels.len(),
            claimed = panels.iter().map(PanelClaims::len).sum::<usize>(),
            "territory.rebuilt=all"
        );
        Self { panels }
    }

    pub fn panel(&self, panel: usize) -> Option<&PanelClaims> {
        self.panels.get(panel)
    }

    pub fn owners_at(&self, key: CellKey) -> Option<&BTreeSet<String>> {
        self.panels.get(key.panel)?.owners_at(key.q, key.r)
    }

    /// Boundary edges of a panel, deduplicated by corner pair.
    ///
    /// With a focus owner, edges leaving the focus territory are focus edges;
    /// in outline mode all other edges are dropped.
    pub fn boundaries(
        &self,
        panel: usize,
        focus: Option<(&str, FocusMode)>,
        border: &BorderConfig,
        radius: f64,
    ) -> Vec<BoundaryEdge> {
        let Some(claims) = self.panels.get(panel) else {
            return Vec::new();
        };
        let empty = BTreeSet::new();
        let mut focus_edges: BTreeMap<EdgeId, BoundaryEdge> = BTreeMap::new();
        let mut other_edges: BTreeMap<EdgeId, BoundaryEdge> = BTreeMap::new();

        for (&(q, r), current) in &claims.claims {
            for (side, &(dq, dr)) in DIRECTIONS.iter().enumerate() {
                let neighbour = claims.owners_at(q + dq, r + dr).unwrap_or(&empty);
                if current == neighbour {
                    continue;
                }
                let dashed = current.len() > 1 || neighbour.len() > 1;
                let [a, b] = coords::edge_endpoints(q, r, side, radius);
                let id = EdgeId::new(a, b);

                let is_focus = match focus {
                    Some((owner, _)) => current.contains(owner) && !neighbour.contains(owner),
                    None => false,
                };
                let target = if is_focus {
                    &mut focus_edges
                } else {
                    &mut other_edges
                };
                target
                    .entry(id)
                    .and_modify(|edge| edge.dashed |= dashed)
                    .or_insert(BoundaryEdge {
                        cell: CellKey::new(panel, q, r),
                        side,
                        a,
                        b,
                        dashed,
                        focus: is_focus,
                        opacity: 1.0,
                    });
            }
        }

        let other_opacity = match focus {
            None => Some(1.0),
            Some((_, FocusMode::Filled)) => Some(border.alt_other()),
            Some((_, FocusMode::Outline)) => None,
        };

        let mut edges: Vec<BoundaryEdge> = Vec::with_capacity(focus_edges.len() + other_edges.len());
        if let Some(opacity) = other_opacity {
            edges.extend(
                other_edges
                    .into_iter()
                    .filter(|(id, _)| !focus_edges.contains_key(id))
                    .map(|(_, mut edge)| {
                        edge.opacity = opacity;
                        edge
                    }),
            );
        }
        edges.extend(focus_edges.into_values().map(|mut edge| {
            edge.opacity = border.alt_focus();
            edge
        }));
        edges
    }

    /// Classifies every coordinate that carries a claim or a record.
    pub fn census(&self, panel: usize, buckets: &BucketIndex) -> CellCensus {
        let mut owners: BTreeMap<(i32, i32), BTreeSet<&str>> = BTreeMap::new();
        if let Some(claims) = self.panels.get(panel) {
            for (coord, set) in &claims.claims {
                owners
                    .entry(*coord)
                    .or_default()
                    .extend(set.iter().map(String::as_str));
            }
        }
        for bucket in buckets.panel_buckets(panel) {
            owners
                .entry(bucket.key().coord())
                .or_default()
                .extend(bucket.owners().iter().map(String::as_str));
        }

        let mut census = CellCensus::default();
        for set in owners.values() {
            match set.len() {
                0 => census.unclaimed += 1,
                1 => census.single += 1,
                _ => census.conflict += 1,
            }
        }
        census
    }
}

/// Unordered corner pair on the snapped pixel lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct EdgeId((i64, i64), (i64, i64));

impl EdgeId {
    fn new(a: (f64, f64), b: (f64, f64)) -> Self {
        let a = coords::snap_point(a);
        let b = coords::snap_point(b);
        if a <= b {
            EdgeId(a, b)
        } else {
            EdgeId(b, a)
        }
    }
}

/// Focus target of one panel, overriding the global focus there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelFocus {
    pub owner: Option<String>,
    pub mode: FocusMode,
}

/// Global territory focus plus per-panel overrides and isolation flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FocusState {
    owner: Option<String>,
    mode: FocusMode,
    panel_overrides: BTreeMap<usize, PanelFocus>,
    isolated: BTreeSet<usize>,
}

impl FocusState {
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn mode(&self) -> FocusMode {
        self.mode
    }

    pub fn set_focus(&mut self, owner: Option<String>, mode: FocusMode) {
        self.owner = owner;
        self.mode = mode;
    }

    pub fn set_mode(&mut self, mode: FocusMode) {
        self.mode = mode;
    }

    pub fn clear_focus(&mut self) {
        self.owner = None;
    }

    pub fn panel_override(&self, panel: usize) -> Option<&PanelFocus> {
        self.panel_overrides.get(&panel)
    }

    pub fn set_panel_override(&mut self, panel: usize, focus: PanelFocus) {
        self.panel_overrides.insert(panel, focus);
    }

    pub fn clear_panel_overrides(&mut self) {
        self.panel_overrides.clear();
    }

    pub fn is_isolated(&self, panel: usize) -> bool {
        self.isolated.contains(&panel)
    }

    pub fn set_isolated(&mut self, panel: usize, isolated: bool) {
        if isolated {
            self.isolated.insert(panel);
        } else {
            self.isolated.remove(&panel);
        }
    }

    /// Focus in effect for `panel`: its override if present, else the global one.
    pub fn effective(&self, panel: usize) -> Option<(&str, FocusMode)> {
        match self.panel_overrides.get(&panel) {
            Some(local) => local.owner.as_deref().map(|owner| (owner, local.mode)),
            None => self.owner.as_deref().map(|owner| (owner, self.mode)),
        }
    }

    /// Switch a filled focus affecting `panel` to outline. Returns whether
    /// anything changed.
    pub fn degrade_to_outline(&mut self, panel: usize) -> bool {
        if let Some(local) = self.panel_overrides.get_mut(&panel) {
            if local.owner.is_some() && local.mode != FocusMode::Outline {
                local.mode = FocusMode::Outline;
                return true;
            }
        }
        if self.owner.is_some() && self.mode != FocusMode::Outline {
            self.mode = FocusMode::Outline;
            return true;
        }
        false
    }

    /// Drop state of a deleted panel and shift higher panel indices down.
    pub fn remove_panel(&mut self, removed: usize) {
        self.panel_overrides = std::mem::take(&mut self.panel_overrides)
            .into_iter()
            .filter(|(panel, _)| *panel != removed)
            .map(|(panel, focus)| (shift_down(panel, removed), focus))
            .collect();
        self.isolated = std::mem::take(&mut self.isolated)
            .into_iter()
            .filter(|panel| *panel != removed)
            .map(|panel| shift_down(panel, removed))
            .collect();
    }
}

pub(crate) fn shift_down(panel: usize, removed: usize) -> usize {
    if panel > removed {
        panel - 1
    } else {
        panel
    }
}
