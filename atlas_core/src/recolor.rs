//! Territory focus previews and the Alt recolor workflow.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use atlas_schema::CellKey;

use crate::buckets::BucketIndex;
use crate::color::{normalize_color, parse_strict_hex, pick_palette, ColorError, Rgb};
use crate::coords::pixel_center;
use crate::style_config::{RampConfig, StyleConfig};
use crate::territory::{shift_down, FocusState};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecolorError {
    #[error("no recolor edit is pending")]
    NothingPending,
    #[error("invalid override color: {0}")]
    InvalidColor(#[from] ColorError),
}

/// A confirmed color with the per-cell alpha it was confirmed with.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorOverride {
    pub color: Rgb,
    pub alpha_by_key: BTreeMap<CellKey, f32>,
}

impl ColorOverride {
    pub fn covers(&self, key: CellKey) -> bool {
        self.alpha_by_key.contains_key(&key)
    }

    pub fn alpha(&self, key: CellKey) -> Option<f32> {
        self.alpha_by_key.get(&key).copied()
    }

    fn moved_to(&self, panel: usize) -> Self {
        Self {
            color: self.color,
            alpha_by_key: self
                .alpha_by_key
                .iter()
                .map(|(key, alpha)| (key.with_panel(panel), *alpha))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingConflictEdit {
    pub panel: usize,
    pub keys: BTreeSet<CellKey>,
    pub color: Rgb,
    pub alpha_by_key: BTreeMap<CellKey, f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingCountryEdit {
    pub panel: usize,
    pub owner: String,
    /// Also write the color to every other panel holding this owner.
    pub propagate: bool,
    pub keys: BTreeSet<CellKey>,
    pub color: Rgb,
    pub alpha_by_key: BTreeMap<CellKey, f32>,
}

/// At most one recolor edit is pending at a time.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PendingEdit {
    #[default]
    None,
    Conflict(PendingConflictEdit),
    Country(PendingCountryEdit),
}

impl PendingEdit {
    pub fn is_none(&self) -> bool {
        matches!(self, PendingEdit::None)
    }

    pub fn keys(&self) -> Option<&BTreeSet<CellKey>> {
        match self {
            PendingEdit::None => None,
            PendingEdit::Conflict(edit) => Some(&edit.keys),
            PendingEdit::Country(edit) => Some(&edit.keys),
        }
    }

    pub fn color(&self) -> Option<Rgb> {
        match self {
            PendingEdit::None => None,
            PendingEdit::Conflict(edit) => Some(edit.color),
            PendingEdit::Country(edit) => Some(edit.color),
        }
    }

    fn panel(&self) -> Option<usize> {
        match self {
            PendingEdit::None => None,
            PendingEdit::Conflict(edit) => Some(edit.panel),
            PendingEdit::Country(edit) => Some(edit.panel),
        }
    }

    fn set_color(&mut self, color: Rgb) -> bool {
        match self {
            PendingEdit::None => false,
            PendingEdit::Conflict(edit) => {
                edit.color = color;
                true
            }
            PendingEdit::Country(edit) => {
                edit.color = color;
                true
            }
        }
    }

    fn shift_panels(&mut self, removed: usize) {
        let shift = |keys: &mut BTreeSet<CellKey>, alpha: &mut BTreeMap<CellKey, f32>| {
            *keys = keys
                .iter()
                .map(|key| key.with_panel(shift_down(key.panel, removed)))
                .collect();
            *alpha = alpha
                .iter()
                .map(|(key, value)| (key.with_panel(shift_down(key.panel, removed)), *value))
                .collect();
        };
        match self {
            PendingEdit::None => {}
            PendingEdit::Conflict(edit) => {
                edit.panel = shift_down(edit.panel, removed);
                shift(&mut edit.keys, &mut edit.alpha_by_key);
            }
            PendingEdit::Country(edit) => {
                edit.panel = shift_down(edit.panel, removed);
                shift(&mut edit.keys, &mut edit.alpha_by_key);
            }
        }
    }
}

/// Confirmed conflict and country overrides plus the global country colors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideStore {
    conflict: BTreeMap<usize, ColorOverride>,
    country: BTreeMap<(usize, String), ColorOverride>,
    global_country: BTreeMap<String, Rgb>,
}

impl OverrideStore {
    pub fn conflict(&self, panel: usize) -> Option<&ColorOverride> {
        self.conflict.get(&panel)
    }

    pub fn country(&self, panel: usize, owner: &str) -> Option<&ColorOverride> {
        self.country.get(&(panel, owner.to_string()))
    }

    pub fn global_country(&self, owner: &str) -> Option<Rgb> {
        self.global_country.get(owner).copied()
    }

    /// Country color as seen from `panel`: its own override, else the global one.
    pub fn country_color(&self, panel: usize, owner: &str) -> Option<Rgb> {
        self.country(panel, owner)
            .map(|found| found.color)
            .or_else(|| self.global_country(owner))
    }

    pub fn color_by_country(&self) -> BTreeMap<String, String> {
        self.global_country
            .iter()
            .map(|(owner, color)| (owner.clone(), color.to_hex()))
            .collect()
    }

    /// Keyed `"panel|owner"`.
    pub fn color_by_panel_country(&self) -> BTreeMap<String, String> {
        self.country
            .iter()
            .map(|((panel, owner), found)| (format!("{panel}|{owner}"), found.color.to_hex()))
            .collect()
    }

    /// Give panel `to` copies of every override of panel `from`.
    pub fn duplicate_panel(&mut self, from: usize, to: usize) {
        if let Some(found) = self.conflict.get(&from).map(|found| found.moved_to(to)) {
            self.conflict.insert(to, found);
        }
        let copies: Vec<_> = self
            .country
            .iter()
            .filter(|((panel, _), _)| *panel == from)
            .map(|((_, owner), found)| ((to, owner.clone()), found.moved_to(to)))
            .collect();
        self.country.extend(copies);
    }

    pub fn remove_panel(&mut self, removed: usize) {
        self.conflict = std::mem::take(&mut self.conflict)
            .into_iter()
            .filter(|(panel, _)| *panel != removed)
            .map(|(panel, found)| {
                let panel = shift_down(panel, removed);
                (panel, found.moved_to(panel))
            })
            .collect();
        self.country = std::mem::take(&mut self.country)
            .into_iter()
            .filter(|((panel, _), _)| *panel != removed)
            .map(|((panel, owner), found)| {
                let panel = shift_down(panel, removed);
                ((panel, owner), found.moved_to(panel))
            })
            .collect();
    }

    pub fn clear(&mut self) {
        self.conflict.clear();
        self.country.clear();
        self.global_country.clear();
    }
}

/// Linear alpha ramp over `keys` ordered by pixel y, then pixel x.
pub fn alpha_ramp(
    keys: &BTreeSet<CellKey>,
    ramp: &RampConfig,
    radius: f64,
) -> BTreeMap<CellKey, f32> {
    let mut ordered: Vec<(f64, f64, CellKey)> = keys
        .iter()
        .map(|key| {
            let (x, y) = pixel_center(key.q, key.r, radius);
            (y, x, *key)
        })
        .collect();
    ordered.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)).then(a.2.cmp(&b.2)));

    let steps = ordered.len().saturating_sub(1);
    ordered
        .into_iter()
        .enumerate()
        .map(|(index, (_, _, key))| {
            let alpha = if steps == 0 {
                ramp.alpha_end()
            } else {
                let t = index as f32 / steps as f32;
                ramp.alpha_start() + (ramp.alpha_end() - ramp.alpha_start()) * t
            };
            (key, alpha)
        })
        .collect()
}

/// Cells of `owner` in `panel` that are not conflict cells.
pub fn country_keys_without_conflicts(
    buckets: &BucketIndex,
    panel: usize,
    owner: &str,
) -> BTreeSet<CellKey> {
    let conflicts = buckets.conflict_keys_for_owner(panel, owner);
    buckets
        .owner_keys(panel, owner)
        .into_iter()
        .filter(|key| !conflicts.contains(key))
        .collect()
}

/// Density alpha for every non-conflict cell of `owner` in `panel`.
pub fn country_alpha_map(
    buckets: &BucketIndex,
    config: &StyleConfig,
    panel: usize,
    owner: &str,
) -> BTreeMap<CellKey, f32> {
    country_keys_without_conflicts(buckets, panel, owner)
        .into_iter()
        .map(|key| (key, buckets.density_alpha(key, config.opacity())))
        .collect()
}

/// Keys highlighted while hovering `key` with the focus modifier held.
pub fn focus_preview(buckets: &BucketIndex, focus: &FocusState, key: CellKey) -> BTreeSet<CellKey> {
    let Some(bucket) = buckets.get(key) else {
        return BTreeSet::new();
    };
    if bucket.is_conflict() {
        return buckets.conflict_keys(key.panel, Some(bucket.owners()));
    }
    let Some(owner) = bucket.single_owner() else {
        return BTreeSet::from([key]);
    };
    let mut keys = if focus.is_isolated(key.panel) {
        buckets.owner_keys(key.panel, owner)
    } else {
        (0..buckets.panel_count())
            .flat_map(|panel| buckets.owner_keys(panel, owner))
            .collect()
    };
    keys.extend(buckets.conflict_keys_for_owner(key.panel, owner));
    keys
}

/// Confirmed overrides plus the one pending edit.
#[derive(Debug, Clone, Default)]
pub struct RecolorWorkflow {
    overrides: OverrideStore,
    pending: PendingEdit,
    sync_across_panels: bool,
}

impl RecolorWorkflow {
    pub fn overrides(&self) -> &OverrideStore {
        &self.overrides
    }

    pub fn overrides_mut(&mut self) -> &mut OverrideStore {
        &mut self.overrides
    }

    pub fn pending(&self) -> &PendingEdit {
        &self.pending
    }

    pub fn sync_across_panels(&self) -> bool {
        self.sync_across_panels
    }

    /// Whether new country edits propagate to every panel on confirm.
    pub fn set_sync_across_panels(&mut self, sync: bool) {
        self.sync_across_panels = sync;
        if let PendingEdit::Country(edit) = &mut self.pending {
            edit.propagate = sync;
        }
    }

    /// Pending edit for every conflict cell of `panel`.
    pub fn begin_conflict(
        &mut self,
        buckets: &BucketIndex,
        config: &StyleConfig,
        panel: usize,
    ) -> &PendingEdit {
        let keys = buckets.conflict_keys(panel, None);
        let color = self
            .overrides
            .conflict(panel)
            .map(|found| found.color)
            .or_else(|| pick_palette(config.palette(), &format!("conflict:{panel}")))
            .unwrap_or_else(|| config.fills().conflict());
        let alpha_by_key = alpha_ramp(&keys, config.ramp(), config.hex().radius());
        self.pending = PendingEdit::Conflict(PendingConflictEdit {
            panel,
            keys,
            color,
            alpha_by_key,
        });
        &self.pending
    }

    /// Pending edit for the non-conflict territory of `owner` in `panel`.
    pub fn begin_country(
        &mut self,
        buckets: &BucketIndex,
        config: &StyleConfig,
        panel: usize,
        owner: &str,
    ) -> &PendingEdit {
        let keys = country_keys_without_conflicts(buckets, panel, owner);
        let color = self
            .overrides
            .country_color(panel, owner)
            .or_else(|| pick_palette(config.palette(), &format!("country:{panel}:{owner}")))
            .unwrap_or_else(|| config.fills().focus_country());
        let alpha_by_key = country_alpha_map(buckets, config, panel, owner);
        self.pending = PendingEdit::Country(PendingCountryEdit {
            panel,
            owner: owner.to_string(),
            propagate: self.sync_across_panels,
            keys,
            color,
            alpha_by_key,
        });
        &self.pending
    }

    /// Live color adjustment. Unparseable input leaves the preview unchanged.
    pub fn set_pending_color(&mut self, input: &str) -> bool {
        match normalize_color(input) {
            Ok(color) => self.pending.set_color(color),
            Err(err) => {
                tracing::debug!(
                    target: "atlas::recolor",
                    input,
                    error = %err,
                    "recolor.preview_ignored=invalid_color"
                );
                false
            }
        }
    }

    /// Write the pending edit as a permanent override. `color`, when given,
    /// must be a `#rrggbb` literal; on any error nothing changes.
    pub fn confirm(
        &mut self,
        color: Option<&str>,
        buckets: &BucketIndex,
        config: &StyleConfig,
    ) -> Result<PendingEdit, RecolorError> {
        let Some(pending_color) = self.pending.color() else {
            return Err(RecolorError::NothingPending);
        };
        let chosen = match color {
            Some(text) => parse_strict_hex(text.trim())?,
            None => pending_color,
        };

        let confirmed = std::mem::take(&mut self.pending);
        match &confirmed {
            PendingEdit::None => {}
            PendingEdit::Conflict(edit) => {
                self.overrides.conflict.insert(
                    edit.panel,
                    ColorOverride {
                        color: chosen,
                        alpha_by_key: edit.alpha_by_key.clone(),
                    },
                );
            }
            PendingEdit::Country(edit) => {
                self.overrides.country.insert(
                    (edit.panel, edit.owner.clone()),
                    ColorOverride {
                        color: chosen,
                        alpha_by_key: country_alpha_map(buckets, config, edit.panel, &edit.owner),
                    },
                );
                if edit.propagate {
                    self.propagate(buckets, config, &edit.owner, chosen);
                }
            }
        }
        tracing::debug!(
            target: "atlas::recolor",
            color = %chosen,
            panel = confirmed.panel(),
            "recolor.confirmed=override"
        );
        Ok(confirmed)
    }

    fn propagate(&mut self, buckets: &BucketIndex, config: &StyleConfig, owner: &str, color: Rgb) {
        self.overrides.global_country.insert(owner.to_string(), color);
        for panel in 0..buckets.panel_count() {
            if buckets.owner_keys(panel, owner).is_empty() {
                continue;
            }
            self.overrides.country.insert(
                (panel, owner.to_string()),
                ColorOverride {
                    color,
                    alpha_by_key: country_alpha_map(buckets, config, panel, owner),
                },
            );
        }
    }

    /// Discard the pending edit. Returns whether one existed.
    pub fn cancel(&mut self) -> bool {
        !std::mem::take(&mut self.pending).is_none()
    }

    pub fn remove_panel(&mut self, removed: usize) {
        self.overrides.remove_panel(removed);
        if self.pending.panel() == Some(removed) {
            self.pending = PendingEdit::None;
        } else {
            self.pending.shift_panels(removed);
        }
    }

    pub fn clear(&mut self) {
        self.overrides.clear();
        self.pending = PendingEdit::None;
    }
}
