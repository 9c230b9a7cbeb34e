//! Data contracts shared by the atlas engine, its tools and collaborators.
//!
//! [`Document`] is what the loader hands over; the export types are what the
//! engine publishes back (selection snapshots, cell details, color maps).

mod document;
mod export;
mod key;

pub use document::{
    document_schema, Document, DocumentError, HexCoord, Link, LinkType, Modality, MsuIndex, Panel,
    PathPoint, Record, TerritoryClaim,
};
pub use export::{
    fingerprint_snapshot, BucketSummary, CellDetail, ColorMaps, OwnerGroup, SelectionKind,
    SelectionSnapshot, SnapshotEdge, SnapshotEdgeKind, SnapshotNode,
};
pub use key::{CellKey, CellKeyParseError};
