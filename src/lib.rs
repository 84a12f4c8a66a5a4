//! PixelForge engine: magic-wand selection, the scalar filter pipeline,
//! effect stacks with their render schedule, generated presets and an
//! undoable edit session tying them together.

#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

#[macro_use]
pub mod logger;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod gpu;
pub mod ops;
pub mod session;

pub use canvas::{BlendMode, EngineError, MaskBounds, PixelBuffer, SelectionMask, SelectionMode};
pub use components::effect_stack::{EffectNode, EffectStack};
pub use components::presets::{generate_presets, Preset};
pub use ops::adjustments::{apply_filters, FilterState};
pub use ops::color_metric::ColorMetric;
pub use ops::effects::Primitive;
pub use ops::selection::{MagicWandSettings, SelectionEngine};
pub use session::EditSession;
