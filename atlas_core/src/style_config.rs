use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Deserialize;
use thiserror::Error;

use crate::color::Rgb;

pub const BUILTIN_STYLE_CONFIG: &str = include_str!("data/style_config.json");

/// Environment variable naming an override file for [`StyleConfig`].
pub const STYLE_CONFIG_PATH_ENV: &str = "ATLAS_STYLE_CONFIG_PATH";

/// Every tunable constant of the color and alpha pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    opacity: OpacityConfig,
    boost: BoostConfig,
    fills: FillConfig,
    border: BorderConfig,
    ramp: RampConfig,
    palette: Vec<Rgb>,
    hex: HexConfig,
}

impl StyleConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_STYLE_CONFIG).expect("builtin style config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, StyleConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| StyleConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = StyleConfig::from_json_str(&contents)?;
        Ok(config)
    }

    pub fn opacity(&self) -> &OpacityConfig {
        &self.opacity
    }

    pub fn boost(&self) -> &BoostConfig {
        &self.boost
    }

    pub fn fills(&self) -> &FillConfig {
        &self.fills
    }

    pub fn border(&self) -> &BorderConfig {
        &self.border
    }

    pub fn ramp(&self) -> &RampConfig {
        &self.ramp
    }

    pub fn palette(&self) -> &[Rgb] {
        &self.palette
    }

    pub fn hex(&self) -> &HexConfig {
        &self.hex
    }
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            opacity: OpacityConfig::default(),
            boost: BoostConfig::default(),
            fills: FillConfig::default(),
            border: BorderConfig::default(),
            ramp: RampConfig::default(),
            palette: DEFAULT_PALETTE
                .iter()
                .map(|&(r, g, b)| Rgb::new(r, g, b))
                .collect(),
            hex: HexConfig::default(),
        }
    }
}

const DEFAULT_PALETTE: [(u8, u8, u8); 15] = [
    (0x8c, 0xbf, 0x75),
    (0xe5, 0xc4, 0x5a),
    (0x6f, 0xa8, 0xdc),
    (0xd9, 0x99, 0x70),
    (0x9a, 0x7f, 0xcc),
    (0xe9, 0xa0, 0x8d),
    (0x76, 0xc2, 0xc7),
    (0xa6, 0xd7, 0x85),
    (0xf2, 0xd1, 0x6b),
    (0x89, 0xb4, 0xe0),
    (0x93, 0xb9, 0x6f),
    (0xa7, 0xbc, 0xe3),
    (0xb9, 0xd8, 0xb1),
    (0xe4, 0xb7, 0xb3),
    (0xc0, 0x90, 0xa6),
];

#[derive(Debug, Error)]
pub enum StyleConfigError {
    #[error("failed to parse style config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read style config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpacityConfig {
    msu_min: f32,
    msu_max: f32,
    default: f32,
    nonfocus: f32,
    unselected: f32,
}

impl OpacityConfig {
    /// Alpha of the densest bucket in a panel.
    pub fn msu_min(&self) -> f32 {
        self.msu_min
    }

    /// Alpha of a bucket without MSUs.
    pub fn msu_max(&self) -> f32 {
        self.msu_max
    }

    pub fn default_alpha(&self) -> f32 {
        self.default
    }

    pub fn nonfocus(&self) -> f32 {
        self.nonfocus
    }

    pub fn unselected(&self) -> f32 {
        self.unselected
    }
}

impl Default for OpacityConfig {
    fn default() -> Self {
        Self {
            msu_min: 0.15,
            msu_max: 0.95,
            default: 0.2,
            nonfocus: 0.08,
            unselected: 0.08,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BoostConfig {
    selected: f32,
    hover: f32,
    preview_center: f32,
    preview_neighbor: f32,
}

impl BoostConfig {
    pub fn selected(&self) -> f32 {
        self.selected.clamp(0.0, 1.0)
    }

    pub fn hover(&self) -> f32 {
        self.hover.clamp(0.0, 1.0)
    }

    pub fn preview_center(&self) -> f32 {
        self.preview_center.clamp(0.0, 1.0)
    }

    pub fn preview_neighbor(&self) -> f32 {
        self.preview_neighbor.clamp(0.0, 1.0)
    }
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self {
            selected: 0.2,
            hover: 0.15,
            preview_center: 0.12,
            preview_neighbor: 0.08,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FillConfig {
    text: Rgb,
    image: Rgb,
    default: Rgb,
    conflict: Rgb,
    focus_country: Rgb,
}

impl FillConfig {
    pub fn text(&self) -> Rgb {
        self.text
    }

    pub fn image(&self) -> Rgb {
        self.image
    }

    pub fn default_fill(&self) -> Rgb {
        self.default
    }

    pub fn conflict(&self) -> Rgb {
        self.conflict
    }

    pub fn focus_country(&self) -> Rgb {
        self.focus_country
    }
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            text: Rgb::new(0xdc, 0xdc, 0xdc),
            image: Rgb::new(0xdc, 0xdc, 0xdc),
            default: Rgb::new(0xff, 0xff, 0xff),
            conflict: Rgb::new(0xb0, 0xb0, 0xb0),
            focus_country: Rgb::new(0xfc, 0xfc, 0xfc),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BorderConfig {
    default_color: Rgb,
    default_width: f32,
    selected_width_scale: f32,
    conflict_selected_opacity: f32,
    alt_focus: f32,
    alt_other: f32,
}

impl BorderConfig {
    pub fn default_color(&self) -> Rgb {
        self.default_color
    }

    pub fn default_width(&self) -> f32 {
        self.default_width.max(0.0)
    }

    pub fn selected_width(&self) -> f32 {
        self.default_width() * self.selected_width_scale.max(0.0)
    }

    pub fn conflict_selected_opacity(&self) -> f32 {
        self.conflict_selected_opacity.clamp(0.0, 1.0)
    }

    /// Opacity of boundary edges owned by the focus territory.
    pub fn alt_focus(&self) -> f32 {
        self.alt_focus.clamp(0.0, 1.0)
    }

    /// Opacity of every other boundary edge while a focus is active.
    pub fn alt_other(&self) -> f32 {
        self.alt_other.clamp(0.0, 1.0)
    }
}

impl Default for BorderConfig {
    fn default() -> Self {
        Self {
            default_color: Rgb::new(0x33, 0x33, 0x33),
            default_width: 1.0,
            selected_width_scale: 1.6,
            conflict_selected_opacity: 0.95,
            alt_focus: 1.0,
            alt_other: 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RampConfig {
    alpha_start: f32,
    alpha_end: f32,
}

impl RampConfig {
    pub fn alpha_start(&self) -> f32 {
        self.alpha_start
    }

    pub fn alpha_end(&self) -> f32 {
        self.alpha_end
    }
}

impl Default for RampConfig {
    fn default() -> Self {
        Self {
            alpha_start: 0.65,
            alpha_end: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HexConfig {
    radius: f64,
}

impl HexConfig {
    pub fn radius(&self) -> f64 {
        if self.radius > 0.0 {
            self.radius
        } else {
            HexConfig::default().radius
        }
    }
}

impl Default for HexConfig {
    fn default() -> Self {
        Self { radius: 20.0 }
    }
}

/// Resolve the style config, honouring [`STYLE_CONFIG_PATH_ENV`] when set.
pub fn load_style_config_from_env() -> Arc<StyleConfig> {
    let Some(path) = env::var_os(STYLE_CONFIG_PATH_ENV).map(PathBuf::from) else {
        return StyleConfig::builtin();
    };
    match StyleConfig::from_file(&path) {
        Ok(config) => {
            tracing::info!(
                target: "atlas::config",
                path = %path.display(),
                "style_config.loaded=file"
            );
            Arc::new(config)
        }
        Err(err) => {
            tracing::warn!(
                target: "atlas::config",
                path = %path.display(),
                error = %err,
                "style_config.load_failed=fallback_builtin"
            );
            StyleConfig::builtin()
        }
    }
}
