use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// A full atlas session as delivered by the loader: panels, links and the
/// global MSU lookup table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Document {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subspaces: Vec<Panel>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub msu_index: MsuIndex,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Panel {
    #[serde(rename = "subspaceName", default)]
    pub name: String,
    #[serde(rename = "hexList", default)]
    pub records: Vec<Record>,
    #[serde(rename = "countries", default)]
    pub claims: Vec<TerritoryClaim>,
}

/// One semantic fragment placed on a hex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Record {
    pub q: i32,
    pub r: i32,
    #[serde(default)]
    pub modality: Modality,
    #[serde(rename = "country_id", default, deserialize_with = "optional_id")]
    #[schemars(with = "Option<String>")]
    pub owner: Option<String>,
    #[serde(default, deserialize_with = "id_list")]
    #[schemars(with = "Vec<String>")]
    pub msu_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl Record {
    pub fn new(q: i32, r: i32, owner: Option<&str>) -> Self {
        Self {
            q,
            r,
            modality: Modality::Text,
            owner: owner.map(str::to_string),
            msu_ids: Vec::new(),
            summary: None,
        }
    }

    pub fn with_msus<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.msu_ids = ids.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TerritoryClaim {
    #[serde(rename = "country_id", default, deserialize_with = "required_id")]
    #[schemars(with = "String")]
    pub owner: String,
    #[serde(default)]
    pub hexes: Vec<HexCoord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HexCoord {
    pub q: i32,
    pub r: i32,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    #[default]
    Road,
    River,
    Flight,
}

impl LinkType {
    pub const fn as_str(self) -> &'static str {
        match self {
            LinkType::Road => "road",
            LinkType::River => "river",
            LinkType::Flight => "flight",
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PathPoint {
    #[serde(rename = "panelIdx", default, skip_serializing_if = "Option::is_none")]
    pub panel: Option<usize>,
    pub q: i32,
    pub r: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Link {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: LinkType,
    #[serde(default)]
    pub path: Vec<PathPoint>,
    #[serde(rename = "panelIdx", default, skip_serializing_if = "Option::is_none")]
    pub panel: Option<usize>,
    #[serde(
        rename = "panelIdxFrom",
        alias = "panelFrom",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub panel_from: Option<usize>,
    #[serde(
        rename = "panelIdxTo",
        alias = "panelTo",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub panel_to: Option<usize>,
}

impl Link {
    /// Panel owning the path point at `index`.
    ///
    /// Falls back from the point itself to the flight endpoint fields, then to
    /// the link-level panel, then to panel 0.
    pub fn panel_for_point(&self, index: usize) -> usize {
        if let Some(panel) = self.path.get(index).and_then(|point| point.panel) {
            return panel;
        }
        if self.kind == LinkType::Flight {
            let last = self.path.len().saturating_sub(1);
            if index == 0 {
                if let Some(panel) = self.panel_from {
                    return panel;
                }
            }
            if index == last {
                if let Some(panel) = self.panel_to {
                    return panel;
                }
            }
        }
        self.panel.unwrap_or(0)
    }

    fn referenced_panels(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.path.len())
            .map(|index| self.panel_for_point(index))
            .chain(self.panel_from)
            .chain(self.panel_to)
    }
}

/// Read-only MSU id to content lookup supplied with the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct MsuIndex(BTreeMap<String, JsonValue>);

impl MsuIndex {
    pub fn new(entries: BTreeMap<String, JsonValue>) -> Self {
        Self(entries)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&JsonValue> {
        self.0.get(id)
    }

    /// Resolve ids in order; unknown ids are skipped.
    pub fn resolve<S: AsRef<str>>(&self, ids: &[S]) -> Vec<JsonValue> {
        ids.iter()
            .filter_map(|id| self.0.get(id.as_ref()).cloned())
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to parse atlas document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read atlas document from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("atlas document failed validation: {}", .0.join("; "))]
    Validation(Vec<String>),
}

impl Document {
    pub fn parse_str(json: &str) -> Result<Self, DocumentError> {
        let document: Document = serde_json::from_str(json)?;
        document.validate()?;
        Ok(document)
    }

    pub fn from_file(path: &Path) -> Result<Self, DocumentError> {
        let contents = fs::read_to_string(path).map_err(|source| DocumentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Document::parse_str(&contents)
    }

    /// Collects every referential problem before failing.
    pub fn validate(&self) -> Result<(), DocumentError> {
        let mut errors = Vec::new();
        let panel_count = self.subspaces.len();

        for (panel_idx, panel) in self.subspaces.iter().enumerate() {
            for claim in &panel.claims {
                if claim.owner.trim().is_empty() {
                    errors.push(format!("panel {panel_idx} has a territory claim without an owner"));
                }
            }
        }

        for (link_idx, link) in self.links.iter().enumerate() {
            let label = link
                .id
                .clone()
                .unwrap_or_else(|| format!("#{link_idx}"));
            if link.path.is_empty() {
                errors.push(format!("link {label} has an empty path"));
                continue;
            }
            if let Some(panel) = link.referenced_panels().find(|panel| *panel >= panel_count) {
                errors.push(format!(
                    "link {label} references panel {panel} but only {panel_count} exist"
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DocumentError::Validation(errors))
        }
    }
}

/// JSON schema for [`Document`], used by fixture validation.
pub fn document_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(Document)
}

fn id_from_value<E: de::Error>(value: JsonValue) -> Result<Option<String>, E> {
    match value {
        JsonValue::Null => Ok(None),
        JsonValue::String(text) => Ok(Some(text)),
        JsonValue::Number(number) => Ok(Some(number.to_string())),
        other => Err(E::custom(format!("unsupported id value {other}"))),
    }
}

fn optional_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<JsonValue>::deserialize(deserializer)?;
    id_from_value(value.unwrap_or(JsonValue::Null))
}

fn required_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    optional_id(deserializer).map(Option::unwrap_or_default)
}

fn id_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let values = Option::<Vec<JsonValue>>::deserialize(deserializer)?.unwrap_or_default();
    let mut ids = Vec::with_capacity(values.len());
    for value in values {
        if let Some(id) = id_from_value(value)? {
            ids.push(id);
        }
    }
    Ok(ids)
}
