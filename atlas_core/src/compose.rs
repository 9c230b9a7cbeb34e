//! Final fill, alpha and border of every cell.
//!
//! Fill and alpha are resolved through a fixed precedence of pending edits,
//! confirmed overrides, focus state and density; interaction highlighting is
//! then layered on with [`compose_alpha`].

use std::collections::BTreeSet;

use atlas_schema::{CellKey, ColorMaps, Modality};

use crate::buckets::{Bucket, BucketIndex};
use crate::color::Rgb;
use crate::recolor::{PendingEdit, RecolorWorkflow};
use crate::selection::SelectionState;
use crate::style_config::StyleConfig;
use crate::territory::{FocusMode, FocusState};

/// `base + (1 - base) * boost`, clamped to `[0, 1]`.
pub fn compose_alpha(base: f32, boost: f32) -> f32 {
    let base = base.clamp(0.0, 1.0);
    let boost = boost.clamp(0.0, 1.0);
    (base + (1.0 - base) * boost).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellStyle {
    pub fill: Rgb,
    pub alpha: f32,
    pub border_color: Rgb,
    pub border_width: f32,
    pub border_opacity: f32,
}

/// Borrowed view of everything the pipeline reads.
#[derive(Clone, Copy)]
pub struct ComposeContext<'a> {
    pub buckets: &'a BucketIndex,
    pub config: &'a StyleConfig,
    pub selection: &'a SelectionState,
    pub focus: &'a FocusState,
    pub recolor: &'a RecolorWorkflow,
    /// Flight endpoints and the draft's current end; these get the hover boost.
    pub flight_marks: &'a BTreeSet<CellKey>,
}

impl<'a> ComposeContext<'a> {
    pub fn style(&self, bucket: &Bucket) -> CellStyle {
        let key = bucket.key();
        let conflict = bucket.is_conflict();
        let pending = self.recolor.pending();
        let overrides = self.recolor.overrides();
        let owner = bucket.single_owner();

        let pending_conflict = match pending {
            PendingEdit::Conflict(edit) if conflict && edit.keys.contains(&key) => Some(edit),
            _ => None,
        };
        let confirmed_conflict = overrides
            .conflict(key.panel)
            .filter(|found| conflict && found.covers(key));
        let pending_country = match pending {
            PendingEdit::Country(edit) if !conflict && edit.keys.contains(&key) => Some(edit),
            _ => None,
        };
        let confirmed_country = owner
            .and_then(|owner| overrides.country(key.panel, owner))
            .filter(|found| !conflict && found.covers(key));

        let focus = self.focus.effective(key.panel);
        let filled_focus = match focus {
            Some((focus_owner, FocusMode::Filled)) => Some(focus_owner),
            _ => None,
        };
        let in_focus = filled_focus.is_some_and(|focus_owner| bucket.has_owner(focus_owner));

        let override_color = pending_conflict
            .map(|edit| edit.color)
            .or(confirmed_conflict.map(|found| found.color))
            .or(pending_country.map(|edit| edit.color))
            .or(confirmed_country.map(|found| found.color));
        let fill = override_color.unwrap_or_else(|| {
            if in_focus {
                self.config.fills().focus_country()
            } else {
                self.base_fill(bucket)
            }
        });

        let opacity = self.config.opacity();
        let mut base = self.buckets.density_alpha(key, opacity);
        if filled_focus.is_some() && !in_focus {
            base = base.min(opacity.nonfocus());
        }
        let override_alpha = pending_conflict
            .and_then(|edit| edit.alpha_by_key.get(&key).copied())
            .or(confirmed_conflict.and_then(|found| found.alpha(key)))
            .or(confirmed_country.and_then(|found| found.alpha(key)))
            .or(pending_country.and_then(|edit| edit.alpha_by_key.get(&key).copied()));
        if let Some(alpha) = override_alpha {
            base = alpha;
        }

        let selected = self.selection.is_selected(key);
        if !self.selection.persistent().is_empty() && !selected {
            base = base.min(opacity.unselected());
        }

        let alpha = compose_alpha(base, self.boost(key, selected, override_color.is_some()));
        let (border_width, border_opacity) = self.border(key, selected);

        CellStyle {
            fill,
            alpha,
            border_color: self.config.border().default_color(),
            border_width,
            border_opacity,
        }
    }

    fn base_fill(&self, bucket: &Bucket) -> Rgb {
        let fills = self.config.fills();
        let modality_fill = match bucket.modality() {
            Some(Modality::Text) => fills.text(),
            Some(Modality::Image) => fills.image(),
            _ => fills.default_fill(),
        };
        if bucket.is_conflict() {
            return fills.conflict();
        }
        match bucket.single_owner() {
            Some(owner) => self
                .recolor
                .overrides()
                .country_color(bucket.key().panel, owner)
                .unwrap_or(modality_fill),
            None => modality_fill,
        }
    }

    /// Highest applicable interaction boost. Hover outranks every preview
    /// rank, including the preview centre, which is always the hovered key.
    fn boost(&self, key: CellKey, selected: bool, has_override: bool) -> f32 {
        let boost = self.config.boost();
        let hovered = self.selection.hovered() == Some(key);
        let in_preview = self.selection.preview().contains(&key);
        if selected {
            if has_override {
                boost.preview_neighbor()
            } else {
                boost.selected()
            }
        } else if hovered || self.flight_marks.contains(&key) {
            boost.hover()
        } else if in_preview {
            boost.preview_neighbor()
        } else {
            0.0
        }
    }

    fn border(&self, key: CellKey, selected: bool) -> (f32, f32) {
        let border = self.config.border();
        if let PendingEdit::Conflict(edit) = self.recolor.pending() {
            return if edit.keys.contains(&key) {
                (border.selected_width(), border.conflict_selected_opacity())
            } else {
                (border.default_width(), 0.0)
            };
        }
        if selected {
            (border.selected_width(), 1.0)
        } else {
            (border.default_width(), 1.0)
        }
    }

    /// Styles of every bucket of every panel in the external map layout.
    pub fn color_maps(&self) -> ColorMaps {
        let mut maps = ColorMaps::default();
        for bucket in self.buckets.iter() {
            let key = bucket.key();
            let style = self.style(bucket);
            maps.fill_by_node.insert(key, style.fill.to_hex());
            maps.alpha_by_node.insert(key, style.alpha);
            maps.border_color_by_node
                .insert(key, style.border_color.to_hex());
            maps.border_width_by_node.insert(key, style.border_width);
            maps.border_opacity_by_node
                .insert(key, style.border_opacity);
        }
        let overrides = self.recolor.overrides();
        maps.color_by_country = overrides.color_by_country();
        maps.color_by_panel_country = overrides.color_by_panel_country();
        tracing::trace!(
            target: "atlas::compose",
            cells = maps.fill_by_node.len(),
            "compose.color_maps=built"
        );
        maps
    }
}
