use std::collections::{BTreeMap, BTreeSet};

use atlas_schema::{
    CellKey, SelectionKind, SelectionSnapshot, SnapshotEdge, SnapshotEdgeKind, SnapshotNode,
};

use crate::buckets::{BucketIndex, OwnerAliases};
use crate::links::{LinkGraph, RouteLink};

/// Normalised `{nodes, edges}` export of `keys`. Deterministic for an
/// unchanged selection.
pub fn build_snapshot(
    kind: SelectionKind,
    keys: &BTreeSet<CellKey>,
    buckets: &BucketIndex,
    aliases: &OwnerAliases,
    links: &LinkGraph,
) -> SelectionSnapshot {
    let nodes = keys
        .iter()
        .flat_map(|key| owner_slices(*key, buckets, aliases))
        .collect();

    let mut edges: BTreeMap<String, SnapshotEdge> = BTreeMap::new();
    let mut covered: BTreeSet<CellKey> = BTreeSet::new();
    for link in links.links() {
        for run in selected_runs(link, keys) {
            covered.extend(run.iter().copied());
            let edge = run_edge(link, run);
            let id = if edges.get(&edge.id).is_some_and(|seen| seen.path != edge.path) {
                format!("{}~{}", edge.id, link.id)
            } else {
                edge.id.clone()
            };
            edges.entry(id.clone()).or_insert(SnapshotEdge { id, ..edge });
        }
    }
    for key in keys.iter().filter(|key| !covered.contains(key)) {
        let id = format!("single:{key}");
        edges.insert(
            id.clone(),
            SnapshotEdge {
                id,
                link_id: None,
                kind: SnapshotEdgeKind::Single,
                panels: vec![key.panel],
                path: vec![*key],
            },
        );
    }

    SelectionSnapshot {
        kind,
        keys: keys.iter().copied().collect(),
        nodes,
        edges: edges.into_values().collect(),
        fingerprint: 0,
    }
    .finalize()
}

/// One node per owner present in the bucket, unowned records under `None`.
fn owner_slices(key: CellKey, buckets: &BucketIndex, aliases: &OwnerAliases) -> Vec<SnapshotNode> {
    let node = |owner: Option<String>, msu_ids: Vec<String>| SnapshotNode {
        key,
        panel: key.panel,
        q: key.q,
        r: key.r,
        owner,
        msu_ids,
    };
    let Some(bucket) = buckets.get(key) else {
        return vec![node(None, Vec::new())];
    };
    let mut slices: BTreeMap<Option<String>, Vec<String>> = BTreeMap::new();
    for record in bucket.records() {
        let ids = slices
            .entry(aliases.normalize_opt(record.owner.as_deref()))
            .or_default();
        for id in &record.msu_ids {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
    }
    if slices.is_empty() {
        return vec![node(None, Vec::new())];
    }
    slices
        .into_iter()
        .map(|(owner, msu_ids)| node(owner, msu_ids))
        .collect()
}

/// Maximal runs of consecutive selected points, two or more long.
fn selected_runs<'l>(link: &'l RouteLink, keys: &BTreeSet<CellKey>) -> Vec<&'l [CellKey]> {
    link.points
        .split(|point| !keys.contains(point))
        .filter(|run| run.len() >= 2)
        .collect()
}

fn run_edge(link: &RouteLink, run: &[CellKey]) -> SnapshotEdge {
    let panels: BTreeSet<usize> = run.iter().map(|key| key.panel).collect();
    let (first, last) = (run[0], run[run.len() - 1]);
    SnapshotEdge {
        id: format!("{}:{first}->{last}", link.kind),
        link_id: Some(link.id.clone()),
        kind: link.kind.into(),
        panels: panels.into_iter().collect(),
        path: run.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_schema::{Link, LinkType, Panel, PathPoint, Record};

    fn link(kind: LinkType, points: &[(usize, i32, i32)]) -> Link {
        Link {
            id: None,
            kind,
            path: points
                .iter()
                .map(|&(panel, q, r)| PathPoint {
                    panel: Some(panel),
                    q,
                    r,
                })
                .collect(),
            panel: None,
            panel_from: None,
            panel_to: None,
        }
    }

    fn fixture() -> (BucketIndex, LinkGraph) {
        let panels = vec![
            Panel {
                name: "zero".to_string(),
                records: vec![
                    Record::new(0, 0, Some("A")).with_msus(["m1", "m2"]),
                    Record::new(0, 0, Some("B")).with_msus(["m3"]),
                    Record::new(0, 0, Some("A")).with_msus(["m2", "m4"]),
                    Record::new(1, 0, None).with_msus(["m5"]),
                ],
                claims: Vec::new(),
            },
            Panel {
                name: "one".to_string(),
                records: vec![Record::new(0, 0, Some("A"))],
                claims: Vec::new(),
            },
        ];
        let links = LinkGraph::from_links(&[
            link(LinkType::Road, &[(0, 0, 0), (0, 1, 0), (0, 2, 0), (0, 3, 0)]),
            link(LinkType::Flight, &[(0, 3, 0), (1, 0, 0)]),
        ]);
        (
            BucketIndex::build(&panels, &OwnerAliases::default()),
            links,
        )
    }

    fn keys(list: &[(usize, i32, i32)]) -> BTreeSet<CellKey> {
        list.iter()
            .map(|&(panel, q, r)| CellKey::new(panel, q, r))
            .collect()
    }

    #[test]
    fn conflict_bucket_yields_one_node_per_owner() {
        let (buckets, links) = fixture();
        let selection = keys(&[(0, 0, 0), (0, 2, 0)]);
        let snapshot = build_snapshot(
            SelectionKind::Group,
            &selection,
            &buckets,
            &OwnerAliases::default(),
            &links,
        );
        let owners: Vec<_> = snapshot
            .nodes
            .iter()
            .map(|node| (node.key.to_string(), node.owner.clone(), node.msu_ids.clone()))
            .collect();
        assert_eq!(
            owners,
            vec![
                (
                    "0:0,0".to_string(),
                    Some("A".to_string()),
                    vec!["m1".to_string(), "m2".to_string(), "m4".to_string()]
                ),
                ("0:0,0".to_string(), Some("B".to_string()), vec!["m3".to_string()]),
                ("0:2,0".to_string(), None, Vec::new()),
            ]
        );
    }

    #[test]
    fn runs_break_at_unselected_points() {
        let (buckets, links) = fixture();
        let selection = keys(&[(0, 0, 0), (0, 1, 0), (0, 3, 0), (1, 0, 0), (0, 9, 9)]);
        let snapshot = build_snapshot(
            SelectionKind::Route,
            &selection,
            &buckets,
            &OwnerAliases::default(),
            &links,
        );
        let ids: Vec<&str> = snapshot.edges.iter().map(|edge| edge.id.as_str()).collect();
        insta::assert_snapshot!(ids.join("\n"), @r###"
        flight:0:3,0->1:0,0
        road:0:0,0->0:1,0
        single:0:9,9
        "###);
        let flight = &snapshot.edges[0];
        assert_eq!(flight.panels, vec![0, 1]);
        assert_eq!(flight.link_id.as_deref(), Some("L2"));
    }

    #[test]
    fn rebuilding_from_exported_keys_is_stable() {
        let (buckets, links) = fixture();
        let aliases = OwnerAliases::default();
        let selection = keys(&[(0, 0, 0), (0, 1, 0), (0, 2, 0), (1, 0, 0)]);
        let first = build_snapshot(SelectionKind::Group, &selection, &buckets, &aliases, &links);
        let reimported: BTreeSet<CellKey> = first.keys.iter().copied().collect();
        let second =
            build_snapshot(SelectionKind::Group, &reimported, &buckets, &aliases, &links);
        assert_eq!(first, second);
        assert_ne!(first.fingerprint, 0);
    }
}
