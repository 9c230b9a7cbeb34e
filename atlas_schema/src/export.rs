use std::collections::BTreeMap;
use std::fmt;
use std::hash::{BuildHasher, Hasher};

use ahash::RandomState;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::document::{LinkType, Modality, Record};
use crate::key::CellKey;

/// Tag attached to every selection-changed notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionKind {
    #[default]
    Single,
    Group,
    Route,
    ConflictPreview,
    CountryPreview,
}

impl SelectionKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            SelectionKind::Single => "single",
            SelectionKind::Group => "group",
            SelectionKind::Route => "route",
            SelectionKind::ConflictPreview => "conflict-preview",
            SelectionKind::CountryPreview => "country-preview",
        }
    }
}

impl fmt::Display for SelectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One owner slice of a selected cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub key: CellKey,
    pub panel: usize,
    pub q: i32,
    pub r: i32,
    pub owner: Option<String>,
    pub msu_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotEdgeKind {
    Road,
    River,
    Flight,
    Single,
}

impl From<LinkType> for SnapshotEdgeKind {
    fn from(kind: LinkType) -> Self {
        match kind {
            LinkType::Road => SnapshotEdgeKind::Road,
            LinkType::River => SnapshotEdgeKind::River,
            LinkType::Flight => SnapshotEdgeKind::Flight,
        }
    }
}

/// A maximal run of a link inside the selection, or a lone selected point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEdge {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_id: Option<String>,
    pub kind: SnapshotEdgeKind,
    /// Panels touched by the run, ascending.
    pub panels: Vec<usize>,
    pub path: Vec<CellKey>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSnapshot {
    pub kind: SelectionKind,
    pub keys: Vec<CellKey>,
    pub nodes: Vec<SnapshotNode>,
    pub edges: Vec<SnapshotEdge>,
    pub fingerprint: u64,
}

impl SelectionSnapshot {
    pub fn finalize(mut self) -> Self {
        self.fingerprint = fingerprint_snapshot(&self);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Stable content hash of a snapshot, ignoring its stored fingerprint.
pub fn fingerprint_snapshot(snapshot: &SelectionSnapshot) -> u64 {
    let mut clone = snapshot.clone();
    clone.fingerprint = 0;
    let encoded = bincode::serialize(&clone).unwrap_or_default();
    let mut hasher = RandomState::with_seeds(0, 0, 0, 0).build_hasher();
    hasher.write(&encoded);
    hasher.finish()
}

/// Aggregate view of a bucket as shown to collaborators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketSummary {
    pub owners: Vec<String>,
    pub msu_count: usize,
    pub conflict: bool,
    pub modality: Option<Modality>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerGroup {
    pub owner: Option<String>,
    pub items: Vec<Record>,
    pub msu_ids: Vec<String>,
    pub msu: Vec<JsonValue>,
}

/// Payload of a committed cell click.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellDetail {
    pub key: CellKey,
    pub panel: usize,
    pub q: i32,
    pub r: i32,
    pub bucket: BucketSummary,
    pub groups: Vec<OwnerGroup>,
    pub all_msu_ids: Vec<String>,
    pub all_msu: Vec<JsonValue>,
}

impl CellDetail {
    pub fn empty(key: CellKey) -> Self {
        Self {
            key,
            panel: key.panel,
            q: key.q,
            r: key.r,
            bucket: BucketSummary::default(),
            groups: Vec::new(),
            all_msu_ids: Vec::new(),
            all_msu: Vec::new(),
        }
    }
}

/// Flattened per-cell visual state keyed by the external cell key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorMaps {
    pub fill_by_node: BTreeMap<CellKey, String>,
    pub alpha_by_node: BTreeMap<CellKey, f32>,
    pub border_color_by_node: BTreeMap<CellKey, String>,
    pub border_width_by_node: BTreeMap<CellKey, f32>,
    pub border_opacity_by_node: BTreeMap<CellKey, f32>,
    pub color_by_country: BTreeMap<String, String>,
    /// Keyed `"panel|owner"`.
    pub color_by_panel_country: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_uses_kebab_case() {
        let json = serde_json::to_string(&SelectionKind::ConflictPreview).unwrap();
        assert_eq!(json, "\"conflict-preview\"");
        assert_eq!(SelectionKind::CountryPreview.to_string(), "country-preview");
    }

    #[test]
    fn fingerprint_ignores_stored_value() {
        let snapshot = SelectionSnapshot {
            kind: SelectionKind::Group,
            keys: vec![CellKey::new(0, 1, 2)],
            ..SelectionSnapshot::default()
        }
        .finalize();
        let mut tampered = snapshot.clone();
        tampered.fingerprint = 42;
        assert_eq!(fingerprint_snapshot(&tampered), snapshot.fingerprint);

        let other = SelectionSnapshot {
            kind: SelectionKind::Route,
            ..snapshot.clone()
        }
        .finalize();
        assert_ne!(other.fingerprint, snapshot.fingerprint);
    }

    #[test]
    fn color_maps_key_externally() {
        let mut maps = ColorMaps::default();
        maps.fill_by_node
            .insert(CellKey::new(0, -1, 2), "#ffffff".to_string());
        let json = serde_json::to_value(&maps).unwrap();
        assert_eq!(json["fill_by_node"]["0:-1,2"], "#ffffff");
    }
}
