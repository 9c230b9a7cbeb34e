use std::collections::{BTreeMap, BTreeSet};

use atlas_schema::{
    BucketSummary, CellDetail, CellKey, Modality, MsuIndex, OwnerGroup, Panel, Record,
};

use crate::style_config::OpacityConfig;

/// Many-to-one owner id normalisation (`"p0_c1" -> "CN"`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerAliases {
    map: BTreeMap<String, String>,
}

impl OwnerAliases {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(from, to)| (from.into().trim().to_string(), to.into().trim().to_string()))
            .filter(|(from, to)| !from.is_empty() && !to.is_empty())
            .collect();
        Self { map }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Canonical owner id, or `None` for blank ids.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(
            self.map
                .get(trimmed)
                .cloned()
                .unwrap_or_else(|| trimmed.to_string()),
        )
    }

    pub fn normalize_opt(&self, raw: Option<&str>) -> Option<String> {
        raw.and_then(|id| self.normalize(id))
    }
}

/// All records sharing one coordinate of one panel.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    key: CellKey,
    records: Vec<Record>,
    owners: BTreeSet<String>,
    msu_count: usize,
}

impl Bucket {
    fn new(key: CellKey) -> Self {
        Self {
            key,
            records: Vec::new(),
            owners: BTreeSet::new(),
            msu_count: 0,
        }
    }

    fn push(&mut self, record: &Record, aliases: &OwnerAliases) {
        if let Some(owner) = aliases.normalize_opt(record.owner.as_deref()) {
            self.owners.insert(owner);
        }
        self.msu_count += record.msu_ids.len();
        self.records.push(record.clone());
    }

    pub fn key(&self) -> CellKey {
        self.key
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn owners(&self) -> &BTreeSet<String> {
        &self.owners
    }

    pub fn has_owner(&self, owner: &str) -> bool {
        self.owners.contains(owner)
    }

    /// Total MSU ids across records; duplicates count.
    pub fn msu_count(&self) -> usize {
        self.msu_count
    }

    pub fn is_conflict(&self) -> bool {
        self.owners.len() > 1
    }

    pub fn single_owner(&self) -> Option<&str> {
        if self.owners.len() == 1 {
            self.owners.iter().next().map(String::as_str)
        } else {
            None
        }
    }

    pub fn modality(&self) -> Option<Modality> {
        self.records.first().map(|record| record.modality)
    }

    pub fn summary(&self) -> BucketSummary {
        BucketSummary {
            owners: self.owners.iter().cloned().collect(),
            msu_count: self.msu_count,
            conflict: self.is_conflict(),
            modality: self.modality(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PanelBuckets {
    buckets: BTreeMap<(i32, i32), Bucket>,
    max_msu: usize,
}

impl PanelBuckets {
    pub fn build(panel_idx: usize, panel: &Panel, aliases: &OwnerAliases) -> Self {
        let mut buckets: BTreeMap<(i32, i32), Bucket> = BTreeMap::new();
        for record in &panel.records {
            buckets
                .entry((record.q, record.r))
                .or_insert_with(|| Bucket::new(CellKey::new(panel_idx, record.q, record.r)))
                .push(record, aliases);
        }
        let max_msu = buckets.values().map(Bucket::msu_count).max().unwrap_or(0);
        tracing::debug!(
            target: "atlas::buckets",
            panel = panel_idx,
            buckets = buckets.len(),
            max_msu,
            "buckets.rebuilt=panel"
        );
        Self { buckets, max_msu }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn max_msu(&self) -> usize {
        self.max_msu
    }

    pub fn get(&self, q: i32, r: i32) -> Option<&Bucket> {
        self.buckets.get(&(q, r))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.values()
    }
}

/// Per-panel bucket maps for the whole document.
#[derive(Debug, Clone, Default)]
pub struct BucketIndex {
    panels: Vec<PanelBuckets>,
}

impl BucketIndex {
    pub fn build(panels: &[Panel], aliases: &OwnerAliases) -> Self {
        Self {
            panels: panels
                .iter()
                .enumerate()
                .map(|(idx, panel)| PanelBuckets::build(idx, panel, aliases))
                .collect(),
        }
    }

    pub fn panel_count(&self) -> usize {
        self.panels.len()
    }

    pub fn panel(&self, panel: usize) -> Option<&PanelBuckets> {
        self.panels.get(panel)
    }

    pub fn get(&self, key: CellKey) -> Option<&Bucket> {
        self.panels.get(key.panel)?.get(key.q, key.r)
    }

    pub fn is_conflict(&self, key: CellKey) -> bool {
        self.get(key).is_some_and(Bucket::is_conflict)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bucket> {
        self.panels.iter().flat_map(PanelBuckets::iter)
    }

    pub fn panel_buckets(&self, panel: usize) -> impl Iterator<Item = &Bucket> {
        self.panels.get(panel).into_iter().flat_map(PanelBuckets::iter)
    }

    /// Linear density opacity: an empty bucket sits at `msu_max`, the densest
    /// bucket of the panel at `msu_min`.
    pub fn density_alpha(&self, key: CellKey, opacity: &OpacityConfig) -> f32 {
        let Some(panel) = self.panels.get(key.panel) else {
            return opacity.default_alpha();
        };
        let Some(bucket) = panel.get(key.q, key.r) else {
            return opacity.default_alpha();
        };
        if panel.max_msu == 0 {
            return opacity.default_alpha();
        }
        let t = (bucket.msu_count as f32 / panel.max_msu as f32).clamp(0.0, 1.0);
        opacity.msu_max() + (opacity.msu_min() - opacity.msu_max()) * t
    }

    /// Conflict cells of a panel, optionally limited to those sharing at least
    /// one owner with `filter`.
    pub fn conflict_keys(
        &self,
        panel: usize,
        filter: Option<&BTreeSet<String>>,
    ) -> BTreeSet<CellKey> {
        self.panel_buckets(panel)
            .filter(|bucket| bucket.is_conflict())
            .filter(|bucket| match filter {
                Some(owners) => bucket.owners.iter().any(|owner| owners.contains(owner)),
                None => true,
            })
            .map(Bucket::key)
            .collect()
    }

    pub fn conflict_keys_for_owner(&self, panel: usize, owner: &str) -> BTreeSet<CellKey> {
        self.panel_buckets(panel)
            .filter(|bucket| bucket.is_conflict() && bucket.has_owner(owner))
            .map(Bucket::key)
            .collect()
    }

    pub fn owner_keys(&self, panel: usize, owner: &str) -> BTreeSet<CellKey> {
        self.panel_buckets(panel)
            .filter(|bucket| bucket.has_owner(owner))
            .map(Bucket::key)
            .collect()
    }

    /// Full click payload; an unknown coordinate yields an empty detail.
    pub fn cell_detail(
        &self,
        key: CellKey,
        aliases: &OwnerAliases,
        msu_index: &MsuIndex,
    ) -> CellDetail {
        let Some(bucket) = self.get(key) else {
            return CellDetail::empty(key);
        };

        let mut groups: Vec<OwnerGroup> = Vec::new();
        for record in &bucket.records {
            let owner = aliases.normalize_opt(record.owner.as_deref());
            let position = match groups.iter().position(|group| group.owner == owner) {
                Some(position) => position,
                None => {
                    groups.push(OwnerGroup {
                        owner,
                        items: Vec::new(),
                        msu_ids: Vec::new(),
                        msu: Vec::new(),
                    });
                    groups.len() - 1
                }
            };
            let group = &mut groups[position];
            group.items.push(record.clone());
            group.msu_ids.extend(record.msu_ids.iter().cloned());
        }
        for group in &mut groups {
            group.msu = msu_index.resolve(&group.msu_ids);
        }

        let all_msu_ids: Vec<String> = groups
            .iter()
            .flat_map(|group| group.msu_ids.iter().cloned())
            .collect();
        let all_msu = msu_index.resolve(&all_msu_ids);

        CellDetail {
            key,
            panel: key.panel,
            q: key.q,
            r: key.r,
            bucket: bucket.summary(),
            groups,
            all_msu_ids,
            all_msu,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn panel(records: Vec<Record>) -> Panel {
        Panel {
            name: "p".to_string(),
            records,
            claims: Vec::new(),
        }
    }

    #[test]
    fn aliases_collapse_owner_ids() {
        let aliases = OwnerAliases::new([("p0_c1", "CN"), ("p1_c01", "CN")]);
        let index = BucketIndex::build(
            &[panel(vec![
                Record::new(0, 0, Some("p0_c1")),
                Record::new(0, 0, Some(" p1_c01 ")),
                Record::new(1, 0, Some("")),
            ])],
            &aliases,
        );
        let bucket = index.get(CellKey::new(0, 0, 0)).unwrap();
        assert_eq!(bucket.single_owner(), Some("CN"));
        assert!(!bucket.is_conflict());
        assert!(index.get(CellKey::new(0, 1, 0)).unwrap().owners().is_empty());
    }

    #[test]
    fn two_owners_make_a_conflict() {
        let index = BucketIndex::build(
            &[panel(vec![
                Record::new(0, 0, Some("A")),
                Record::new(0, 0, Some("B")),
                Record::new(1, 0, Some("A")),
            ])],
            &OwnerAliases::default(),
        );
        assert!(index.is_conflict(CellKey::new(0, 0, 0)));
        assert!(!index.is_conflict(CellKey::new(0, 1, 0)));
        assert!(!index.is_conflict(CellKey::new(0, 9, 9)));

        let only_c: BTreeSet<String> = ["C".to_string()].into();
        assert!(index.conflict_keys(0, Some(&only_c)).is_empty());
        assert_eq!(index.conflict_keys(0, None).len(), 1);
        assert_eq!(index.owner_keys(0, "A").len(), 2);
    }

    #[test]
    fn msu_count_keeps_duplicates() {
        let index = BucketIndex::build(
            &[panel(vec![
                Record::new(0, 0, Some("A")).with_msus(["m1", "m2"]),
                Record::new(0, 0, Some("A")).with_msus(["m1"]),
            ])],
            &OwnerAliases::default(),
        );
        assert_eq!(index.get(CellKey::new(0, 0, 0)).unwrap().msu_count(), 3);
    }

    #[test]
    fn density_runs_from_opaque_to_transparent() {
        let opacity = OpacityConfig::default();
        let index = BucketIndex::build(
            &[
                panel(vec![
                    Record::new(0, 0, None),
                    Record::new(1, 0, None).with_msus(["a", "b", "c", "d", "e"]),
                ]),
                panel(vec![Record::new(0, 0, None)]),
            ],
            &OwnerAliases::default(),
        );
        assert_eq!(index.density_alpha(CellKey::new(0, 0, 0), &opacity), opacity.msu_max());
        assert!(
            (index.density_alpha(CellKey::new(0, 1, 0), &opacity) - opacity.msu_min()).abs()
                < 1e-6
        );
        assert_eq!(
            index.density_alpha(CellKey::new(1, 0, 0), &opacity),
            opacity.default_alpha()
        );
    }

    #[test]
    fn cell_detail_groups_by_owner() {
        let mut entries = BTreeMap::new();
        entries.insert("m1".to_string(), json!({"text": "one"}));
        entries.insert("m3".to_string(), json!({"text": "three"}));
        let msu_index = MsuIndex::new(entries);
        let index = BucketIndex::build(
            &[panel(vec![
                Record::new(2, 1, Some("B")).with_msus(["m3"]),
                Record::new(2, 1, Some("A")).with_msus(["m1", "m2"]),
                Record::new(2, 1, None),
            ])],
            &OwnerAliases::default(),
        );
        let detail = index.cell_detail(CellKey::new(0, 2, 1), &OwnerAliases::default(), &msu_index);
        assert_eq!(detail.groups.len(), 3);
        assert_eq!(detail.groups[0].owner.as_deref(), Some("B"));
        assert_eq!(detail.groups[1].msu_ids, vec!["m1", "m2"]);
        assert_eq!(detail.groups[1].msu.len(), 1);
        assert_eq!(detail.groups[2].owner, None);
        assert_eq!(detail.all_msu_ids, vec!["m3", "m1", "m2"]);
        assert_eq!(detail.all_msu.len(), 2);
        assert!(detail.bucket.conflict);

        let empty = index.cell_detail(CellKey::new(0, 7, 7), &OwnerAliases::default(), &msu_index);
        assert!(empty.groups.is_empty());
    }
}
