// ============================================================================
// PRESETS: deterministic parameter bundles built from category blueprints
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::canvas::BlendMode;
use crate::components::effect_stack::EffectNode;
use crate::ops::adjustments::FilterState;
use crate::ops::effects::Primitive;

/// Presets generated per category when the caller does not say otherwise.
pub const DEFAULT_PRESETS_PER_CATEGORY: usize = 100;

/// A category and the primitives its stacks are built from, in stack order.
pub struct CategoryBlueprint {
    pub category: &'static str,
    pub primitives: &'static [Primitive],
}

pub const CATEGORY_BLUEPRINTS: &[CategoryBlueprint] = &[
    CategoryBlueprint {
        category: "Cinematic",
        primitives: &[
            Primitive::Contrast,
            Primitive::Temperature,
            Primitive::TealOrange,
            Primitive::Vignette,
            Primitive::Grain,
        ],
    },
    CategoryBlueprint {
        category: "Portrait",
        primitives: &[Primitive::Brightness, Primitive::Contrast, Primitive::Saturation, Primitive::Bloom],
    },
    CategoryBlueprint {
        category: "Landscape",
        primitives: &[Primitive::Exposure, Primitive::Saturation, Primitive::Vignette, Primitive::FilmCurve],
    },
    CategoryBlueprint {
        category: "Vintage",
        primitives: &[Primitive::FilmCurve, Primitive::Grain, Primitive::Vignette, Primitive::Temperature],
    },
    CategoryBlueprint {
        category: "Retro CRT",
        primitives: &[
            Primitive::Scanlines,
            Primitive::ChromaticAberration,
            Primitive::Glitch,
            Primitive::Vignette,
        ],
    },
    CategoryBlueprint {
        category: "Dramatic",
        primitives: &[Primitive::Contrast, Primitive::Gamma, Primitive::Bloom, Primitive::TealOrange],
    },
    CategoryBlueprint {
        category: "Experimental",
        primitives: &[
            Primitive::Glitch,
            Primitive::HueRotate,
            Primitive::ChromaticAberration,
            Primitive::Grain,
        ],
    },
    CategoryBlueprint {
        category: "Black & White",
        primitives: &[Primitive::Contrast, Primitive::FilmCurve, Primitive::Grain],
    },
    CategoryBlueprint {
        category: "HDR",
        primitives: &[Primitive::Exposure, Primitive::Contrast, Primitive::Bloom],
    },
    CategoryBlueprint {
        category: "Artistic",
        primitives: &[Primitive::HueRotate, Primitive::Saturation, Primitive::Vignette],
    },
];

/// Filter values a preset sets. Tint is not part of a preset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetControls {
    pub brightness: f32,
    pub contrast: f32,
    pub temperature: f32,
    pub duotone: f32,
    pub bloom: f32,
    pub glitch: f32,
}

impl PresetControls {
    pub fn for_intensity(intensity: f64) -> Self {
        let glitch = if intensity > 0.7 { (intensity - 0.7) * 0.6 } else { 0.0 };
        Self {
            brightness: round3(intensity * 0.2 - 0.05),
            contrast: round3(intensity * 0.45),
            temperature: round3(intensity * 0.3 - 0.15),
            duotone: round3(intensity * 0.35),
            bloom: round3(intensity * 0.4),
            glitch: round3(glitch),
        }
    }

    /// `base` with the six preset fields replaced.
    pub fn apply_to(&self, base: &FilterState) -> FilterState {
        FilterState {
            brightness: self.brightness,
            contrast: self.contrast,
            temperature: self.temperature,
            duotone: self.duotone,
            bloom: self.bloom,
            glitch: self.glitch,
            ..*base
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub id: String,
    pub name: String,
    pub category: String,
    pub stack: Vec<EffectNode>,
    pub controls: PresetControls,
}

/// Build `per_category` presets for each blueprint, intensities `i / n` for
/// `i` in `1..=n`. Ids are derived from category and index, so two calls
/// return identical lists.
pub fn generate_presets(per_category: usize) -> Vec<Preset> {
    let mut presets = Vec::with_capacity(per_category * CATEGORY_BLUEPRINTS.len());
    for blueprint in CATEGORY_BLUEPRINTS {
        let slug = slug(blueprint.category);
        for i in 1..=per_category {
            let intensity = i as f64 / per_category as f64;
            presets.push(Preset {
                id: format!("preset_{}_{}", slug, i),
                name: format!("{} {}", blueprint.category, i),
                category: blueprint.category.to_string(),
                stack: build_stack(blueprint.primitives, intensity, &slug, i),
                controls: PresetControls::for_intensity(intensity),
            });
        }
    }
    crate::log_info!(
        "presets: generated {} ({} per category)",
        presets.len(),
        per_category
    );
    presets
}

fn build_stack(primitives: &[Primitive], intensity: f64, slug: &str, index: usize) -> Vec<EffectNode> {
    primitives
        .iter()
        .enumerate()
        .map(|(k, &primitive)| {
            let blend_mode = if k % 2 == 0 { BlendMode::Normal } else { BlendMode::Screen };
            let amount = round3(0.15 + intensity * (0.8 - k as f64 * 0.03));
            EffectNode::new(primitive)
                .with_id(format!("node_{}_{}_{}_{}", primitive.as_str(), slug, index, k))
                .with_blend_mode(blend_mode)
                .with_amount(amount)
                .with_animated(primitive.is_animated())
        })
        .collect()
}

/// Look a preset up by id or by display name (case-insensitive).
pub fn find_preset<'a>(presets: &'a [Preset], name: &str) -> Option<&'a Preset> {
    presets
        .iter()
        .find(|p| p.id == name || p.name.eq_ignore_ascii_case(name))
}

/// Round to three decimals.
fn round3(v: f64) -> f32 {
    ((v * 1000.0).round() / 1000.0) as f32
}

/// "Black & White" -> "black_white"
fn slug(category: &str) -> String {
    category
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_count_is_empty() {
        assert!(generate_presets(0).is_empty());
    }

    #[test]
    fn generation_is_deterministic() {
        let a = generate_presets(100);
        let b = generate_presets(100);
        assert_eq!(a.len(), 1000);
        assert_eq!(a, b);
    }

    #[test]
    fn names_ids_and_categories() {
        let presets = generate_presets(3);
        assert_eq!(presets.len(), 30);
        assert_eq!(presets[0].name, "Cinematic 1");
        assert_eq!(presets[0].id, "preset_cinematic_1");
        let bw = find_preset(&presets, "black & white 2").map(|p| p.id.as_str());
        assert_eq!(bw, Some("preset_black_white_2"));
        assert_eq!(find_preset(&presets, "preset_hdr_3").map(|p| p.name.as_str()), Some("HDR 3"));
        assert!(find_preset(&presets, "HDR 4").is_none());
    }

    #[test]
    fn stack_amounts_and_blend_alternation() {
        let presets = generate_presets(1);
        let cinematic = &presets[0];
        let amounts: Vec<f32> = cinematic.stack.iter().filter_map(EffectNode::amount).collect();
        assert_eq!(amounts, vec![0.95, 0.92, 0.89, 0.86, 0.83]);
        let modes: Vec<BlendMode> = cinematic.stack.iter().map(|n| n.blend_mode).collect();
        assert_eq!(
            modes,
            vec![BlendMode::Normal, BlendMode::Screen, BlendMode::Normal, BlendMode::Screen, BlendMode::Normal]
        );
        assert_eq!(cinematic.stack[2].id, "node_tealOrange_cinematic_1_2");
        assert!(cinematic.stack.iter().all(|n| n.enabled));
    }

    #[test]
    fn crt_nodes_are_animated() {
        let presets = generate_presets(2);
        let crt = find_preset(&presets, "Retro CRT 1").map(|p| p.stack.clone()).unwrap_or_default();
        let animated: Vec<bool> = crt.iter().map(|n| n.animated).collect();
        assert_eq!(animated, vec![true, false, true, false]);
    }

    #[test]
    fn controls_follow_intensity() {
        let full = PresetControls::for_intensity(1.0);
        assert_eq!(full.brightness, 0.15);
        assert_eq!(full.contrast, 0.45);
        assert_eq!(full.temperature, 0.15);
        assert_eq!(full.duotone, 0.35);
        assert_eq!(full.bloom, 0.4);
        assert_eq!(full.glitch, 0.18);
        assert_eq!(PresetControls::for_intensity(0.5).glitch, 0.0);
        assert_eq!(PresetControls::for_intensity(0.5).temperature, 0.0);
    }

    #[test]
    fn controls_keep_tint() {
        let base = FilterState { tint: 0.4, brightness: -0.9, ..Default::default() };
        let applied = PresetControls::for_intensity(1.0).apply_to(&base);
        assert_eq!(applied.tint, 0.4);
        assert_eq!(applied.brightness, 0.15);
    }
}
