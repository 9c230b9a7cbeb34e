use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::Serialize;

use atlas_schema::{CellKey, Link, LinkType, PathPoint};

use crate::territory::shift_down;

/// Undirected neighbour sets over cell keys.
pub type Adjacency = BTreeMap<CellKey, BTreeSet<CellKey>>;

/// A live link with every path point resolved to its panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteLink {
    pub id: String,
    pub kind: LinkType,
    pub points: Vec<CellKey>,
}

impl RouteLink {
    pub fn contains(&self, key: CellKey) -> bool {
        self.points.contains(&key)
    }

    pub fn position(&self, key: CellKey) -> Option<usize> {
        self.points.iter().position(|point| *point == key)
    }

    pub fn is_start(&self, key: CellKey) -> bool {
        self.points.first() == Some(&key)
    }

    pub fn is_endpoint(&self, key: CellKey) -> bool {
        self.points.first() == Some(&key) || self.points.last() == Some(&key)
    }

    fn touches_panel(&self, panel: usize) -> bool {
        self.points.iter().any(|point| point.panel == panel)
    }

    fn to_link(&self) -> Link {
        let flight = self.kind == LinkType::Flight;
        Link {
            id: Some(self.id.clone()),
            kind: self.kind,
            path: self
                .points
                .iter()
                .map(|point| PathPoint {
                    panel: Some(point.panel),
                    q: point.q,
                    r: point.r,
                })
                .collect(),
            panel: None,
            panel_from: self.points.first().filter(|_| flight).map(|p| p.panel),
            panel_to: self.points.last().filter(|_| flight).map(|p| p.panel),
        }
    }
}

/// City marker derived from how many links start at a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Marker {
    City,
    Capital,
}

/// The live overlay link list plus everything derived from it.
#[derive(Debug, Clone, Default)]
pub struct LinkGraph {
    links: Vec<RouteLink>,
    next_seq: u64,
}

impl LinkGraph {
    pub fn from_links(raw: &[Link]) -> Self {
        let mut graph = LinkGraph::default();
        for link in raw {
            let points = (0..link.path.len())
                .map(|index| {
                    let point = link.path[index];
                    CellKey::new(link.panel_for_point(index), point.q, point.r)
                })
                .collect();
            let id = match link.id.as_deref().map(str::trim) {
                Some(id) if !id.is_empty() && graph.get(id).is_none() => id.to_string(),
                _ => graph.next_id("L"),
            };
            graph.links.push(RouteLink {
                id,
                kind: link.kind,
                points,
            });
        }
        tracing::debug!(
            target: "atlas::links",
            links = graph.links.len(),
            "links.loaded=document"
        );
        graph
    }

    /// Links in wire form with explicit per-point panels.
    pub fn to_links(&self) -> Vec<Link> {
        self.links.iter().map(RouteLink::to_link).collect()
    }

    fn next_id(&mut self, prefix: &str) -> String {
        loop {
            self.next_seq += 1;
            let id = format!("{prefix}{}", self.next_seq);
            if self.get(&id).is_none() {
                return id;
            }
        }
    }

    pub fn links(&self) -> &[RouteLink] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&RouteLink> {
        self.links.iter().find(|link| link.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut RouteLink> {
        self.links.iter_mut().find(|link| link.id == id)
    }

    /// Append a committed flight and return its id.
    pub fn push_flight(&mut self, points: Vec<CellKey>) -> String {
        let id = self.next_id("flight-");
        self.links.push(RouteLink {
            id: id.clone(),
            kind: LinkType::Flight,
            points,
        });
        id
    }

    /// Consecutive path points become undirected edges unless either end is
    /// excluded.
    pub fn adjacency(&self, excluded: &BTreeSet<CellKey>) -> Adjacency {
        let mut adjacency = Adjacency::new();
        for link in &self.links {
            for pair in link.points.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                if a == b || excluded.contains(&a) || excluded.contains(&b) {
                    continue;
                }
                adjacency.entry(a).or_default().insert(b);
                adjacency.entry(b).or_default().insert(a);
            }
        }
        adjacency
    }

    /// Path of `link` as drawn: excluded points are dropped for selected routes.
    pub fn visible_path(
        link: &RouteLink,
        excluded: &BTreeSet<CellKey>,
        selected_routes: &BTreeSet<String>,
    ) -> Vec<CellKey> {
        if selected_routes.contains(&link.id) {
            link.points
                .iter()
                .copied()
                .filter(|point| !excluded.contains(point))
                .collect()
        } else {
            link.points.clone()
        }
    }

    /// Number of drawable links starting at each cell.
    pub fn start_counts(
        &self,
        excluded: &BTreeSet<CellKey>,
        selected_routes: &BTreeSet<String>,
    ) -> BTreeMap<CellKey, usize> {
        let mut counts = BTreeMap::new();
        for link in &self.links {
            let path = Self::visible_path(link, excluded, selected_routes);
            if path.len() < 2 {
                continue;
            }
            *counts.entry(path[0]).or_insert(0) += 1;
        }
        counts
    }

    pub fn markers(
        &self,
        excluded: &BTreeSet<CellKey>,
        selected_routes: &BTreeSet<String>,
    ) -> BTreeMap<CellKey, Marker> {
        self.start_counts(excluded, selected_routes)
            .into_iter()
            .map(|(key, count)| {
                let marker = if count >= 2 {
                    Marker::Capital
                } else {
                    Marker::City
                };
                (key, marker)
            })
            .collect()
    }

    pub fn routes_containing(&self, key: CellKey) -> BTreeSet<String> {
        self.links
            .iter()
            .filter(|link| link.contains(key))
            .map(|link| link.id.clone())
            .collect()
    }

    pub fn routes_starting_at(&self, key: CellKey) -> BTreeSet<String> {
        self.links
            .iter()
            .filter(|link| link.is_start(key))
            .map(|link| link.id.clone())
            .collect()
    }

    pub fn link_contains_node(&self, id: &str, key: CellKey) -> bool {
        self.get(id).is_some_and(|link| link.contains(key))
    }

    pub fn is_start_of_link(&self, id: &str, key: CellKey) -> bool {
        self.get(id).is_some_and(|link| link.is_start(key))
    }

    /// The single neighbour of `key` on the first link where it is an endpoint.
    pub fn find_endpoint_mate(&self, key: CellKey) -> Option<CellKey> {
        self.links
            .iter()
            .filter(|link| link.points.len() >= 2)
            .find_map(|link| {
                let index = link.position(key)?;
                let last = link.points.len() - 1;
                if index == 0 {
                    Some(link.points[1])
                } else if index == last {
                    Some(link.points[last - 1])
                } else {
                    None
                }
            })
    }

    /// Every point of every link containing `key`.
    pub fn line_star_keys(&self, key: CellKey) -> BTreeSet<CellKey> {
        let mut keys = BTreeSet::from([key]);
        for link in self.links.iter().filter(|link| link.contains(key)) {
            keys.extend(link.points.iter().copied());
        }
        keys
    }

    /// First and last points of every flight.
    pub fn flight_endpoints(&self) -> BTreeSet<CellKey> {
        self.links
            .iter()
            .filter(|link| link.kind == LinkType::Flight)
            .flat_map(|link| link.points.first().into_iter().chain(link.points.last()))
            .copied()
            .collect()
    }

    /// Drop links touching `removed` and shift higher panel indices down.
    /// Returns the number of dropped links.
    pub fn remove_panel(&mut self, removed: usize) -> usize {
        let before = self.links.len();
        self.links.retain(|link| !link.touches_panel(removed));
        for link in &mut self.links {
            for point in &mut link.points {
                point.panel = shift_down(point.panel, removed);
            }
        }
        before - self.links.len()
    }
}

pub fn one_hop_star(adjacency: &Adjacency, key: CellKey) -> BTreeSet<CellKey> {
    let mut star = BTreeSet::from([key]);
    if let Some(neighbours) = adjacency.get(&key) {
        star.extend(neighbours.iter().copied());
    }
    star
}

/// Breadth-first connected component containing `start` (always included).
pub fn connected_component(adjacency: &Adjacency, start: CellKey) -> BTreeSet<CellKey> {
    let mut visited = BTreeSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        let Some(neighbours) = adjacency.get(&current) else {
            continue;
        };
        for &next in neighbours {
            if visited.insert(next) {
                queue.push_back(next);
            }
        }
    }
    visited
}

/// Result of feeding one gesture into a [`FlightDraft`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftStep {
    Started,
    Extended,
    Ignored,
    Commit(Vec<CellKey>),
}

/// A flight under construction, staged outside the live link list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlightDraft {
    endpoint: Option<CellKey>,
    path: Vec<CellKey>,
}

impl FlightDraft {
    pub fn is_idle(&self) -> bool {
        self.endpoint.is_none() && self.path.is_empty()
    }

    /// Current end of the draft (the start point before the first hop).
    pub fn endpoint(&self) -> Option<CellKey> {
        self.endpoint
    }

    pub fn path(&self) -> &[CellKey] {
        &self.path
    }

    pub fn gesture(&mut self, here: CellKey) -> DraftStep {
        let Some(current) = self.endpoint else {
            self.endpoint = Some(here);
            self.path.clear();
            return DraftStep::Started;
        };
        if here == current {
            if self.path.len() >= 2 {
                let path = std::mem::take(&mut self.path);
                self.endpoint = None;
                return DraftStep::Commit(path);
            }
            return DraftStep::Ignored;
        }
        if self.path.is_empty() {
            self.path = vec![current, here];
        } else if self.path.last() != Some(&here) {
            self.path.push(here);
        }
        self.endpoint = Some(here);
        DraftStep::Extended
    }

    /// End the draft; yields the path when it has at least two points.
    pub fn finish(&mut self) -> Option<Vec<CellKey>> {
        self.endpoint = None;
        let path = std::mem::take(&mut self.path);
        (path.len() >= 2).then_some(path)
    }

    pub fn cancel(&mut self) {
        self.endpoint = None;
        self.path.clear();
    }

    /// Discards the draft if it touches `removed`, else renumbers it.
    pub fn remove_panel(&mut self, removed: usize) -> bool {
        let touches =
            self.endpoint.is_some_and(|key| key.panel == removed)
                || self.path.iter().any(|key| key.panel == removed);
        if touches {
            self.cancel();
            return true;
        }
        if let Some(endpoint) = &mut self.endpoint {
            endpoint.panel = shift_down(endpoint.panel, removed);
        }
        for key in &mut self.path {
            key.panel = shift_down(key.panel, removed);
        }
        false
    }
}
