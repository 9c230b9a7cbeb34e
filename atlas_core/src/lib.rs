//! Interaction core of the hex-grid semantic atlas.
//!
//! An [`Engine`] owns one loaded [`atlas_schema::Document`] and turns discrete
//! input events into selection, territory focus and recolor state. Hosts read
//! the results back through [`Engine::color_maps`],
//! [`Engine::selection_snapshot`] and the events published to
//! [`Engine::subscribe`] receivers.

pub mod buckets;
pub mod color;
pub mod compose;
pub mod coords;
pub mod diagnostics;
pub mod engine;
pub mod events;
pub mod input;
pub mod links;
pub mod recolor;
pub mod selection;
pub mod snapshot;
pub mod style_config;
pub mod territory;

pub use buckets::{Bucket, BucketIndex, OwnerAliases};
pub use color::{normalize_color, parse_strict_hex, ColorError, Rgb};
pub use compose::{compose_alpha, CellStyle, ComposeContext};
pub use diagnostics::{DiagnosticRecord, DiagnosticsCapture, DiagnosticsLayer};
pub use engine::{Engine, PanelError};
pub use events::{EngineEvent, EventBus};
pub use input::{InputEvent, Key, Modifiers};
pub use links::{DraftStep, FlightDraft, LinkGraph, Marker, RouteLink};
pub use recolor::{PendingEdit, RecolorError, RecolorWorkflow};
pub use selection::{transition, InsertSession, Mode, ModeEvent, SelectionState};
pub use snapshot::build_snapshot;
pub use style_config::{load_style_config_from_env, StyleConfig, StyleConfigError};
pub use territory::{BoundaryEdge, CellCensus, FocusMode, FocusState, PanelFocus};
