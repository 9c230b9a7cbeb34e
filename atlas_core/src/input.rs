//! Pointer and keyboard events fed into [`crate::Engine::handle`].

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use atlas_schema::CellKey;

bitflags! {
    /// Modifier keys held while an event fired.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Modifiers: u8 {
        /// Additive selection.
        const SHIFT = 0b0001;
        /// Route selection.
        const CTRL  = 0b0010;
        /// Territory focus.
        const ALT   = 0b0100;
        /// Route selection on macOS.
        const META  = 0b1000;
    }
}

impl Modifiers {
    pub fn ctrl_like(self) -> bool {
        self.intersects(Modifiers::CTRL | Modifiers::META)
    }

    pub fn additive(self) -> bool {
        self.contains(Modifiers::SHIFT)
    }

    pub fn focus(self) -> bool {
        self.contains(Modifiers::ALT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Enter,
    Escape,
    Modifier(Modifiers),
    Other,
}

/// One discrete input event. `cell` is `None` over empty background.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InputEvent {
    PointerDown {
        cell: Option<CellKey>,
        #[serde(default)]
        modifiers: Modifiers,
    },
    PointerMove {
        cell: Option<CellKey>,
    },
    PointerUp {
        cell: Option<CellKey>,
        #[serde(default)]
        modifiers: Modifiers,
        #[serde(default)]
        dragged: bool,
    },
    DoubleClick {
        cell: Option<CellKey>,
        #[serde(default)]
        modifiers: Modifiers,
    },
    KeyDown {
        key: Key,
    },
    KeyUp {
        key: Key,
    },
    Blur,
}

impl InputEvent {
    /// A committed click on `cell` (or background when `None`).
    pub fn click(cell: Option<CellKey>, modifiers: Modifiers) -> Self {
        InputEvent::PointerUp {
            cell,
            modifiers,
            dragged: false,
        }
    }
}
