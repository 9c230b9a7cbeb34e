use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Global identity of a hex cell: the owning panel plus its axial coordinate.
///
/// The textual form `"panel:q,r"` is only produced at the export boundary via
/// [`fmt::Display`] and read back through [`FromStr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub panel: usize,
    pub q: i32,
    pub r: i32,
}

impl CellKey {
    pub const fn new(panel: usize, q: i32, r: i32) -> Self {
        Self { panel, q, r }
    }

    pub const fn coord(&self) -> (i32, i32) {
        (self.q, self.r)
    }

    pub const fn with_panel(self, panel: usize) -> Self {
        Self { panel, ..self }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{},{}", self.panel, self.q, self.r)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed cell key '{0}' (expected panel:q,r)")]
pub struct CellKeyParseError(pub String);

impl FromStr for CellKey {
    type Err = CellKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || CellKeyParseError(s.to_string());
        let (panel, coord) = s.split_once(':').ok_or_else(malformed)?;
        let (q, r) = coord.split_once(',').ok_or_else(malformed)?;
        Ok(CellKey {
            panel: panel.trim().parse().map_err(|_| malformed())?,
            q: q.trim().parse().map_err(|_| malformed())?,
            r: r.trim().parse().map_err(|_| malformed())?,
        })
    }
}

impl Serialize for CellKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CellKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_external_form() {
        let key: CellKey = "2:-3,4".parse().unwrap();
        assert_eq!(key, CellKey::new(2, -3, 4));
        assert_eq!(key.to_string(), "2:-3,4");
    }

    #[test]
    fn rejects_legacy_pipe_form() {
        assert!("0|1,2".parse::<CellKey>().is_err());
        assert!("0:1".parse::<CellKey>().is_err());
        assert!("x:1,2".parse::<CellKey>().is_err());
    }

    #[test]
    fn serializes_as_string() {
        let json = serde_json::to_string(&CellKey::new(1, 0, -1)).unwrap();
        assert_eq!(json, "\"1:0,-1\"");
        let back: CellKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CellKey::new(1, 0, -1));
    }
}
