// ============================================================================
// UNIFORM TYPES: plain-old-data blocks a GPU backend uploads as-is
// ============================================================================
//
// Layouts match the WGSL structs in `shaders.rs` field for field. Every
// struct is a multiple of 16 bytes so it can sit in a uniform buffer
// without extra padding rules.
// ============================================================================

use std::collections::BTreeMap;

use bytemuck::{Pod, Zeroable};

use crate::components::render_graph::RenderPass;
use crate::ops::adjustments::FilterState;

/// Global color uniforms for the filter shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FilterUniforms {
    pub brightness: f32,
    /// Contrast slope, `1 + contrast`.
    pub contrast: f32,
    pub saturation: f32,
    /// Degrees.
    pub hue_rotate: f32,
    pub temperature: f32,
    pub vignette: f32,
    pub bloom: f32,
    pub glitch: f32,
    /// Seconds since the session started rendering.
    pub time: f32,
    /// 1.0 when a selection mask is bound, 0.0 otherwise.
    pub mask_mix: f32,
    pub tint: f32,
    pub duotone: f32,
}

impl FilterUniforms {
    /// Build from the merged filter state plus the stack's uniform map
    /// (saturation, hue rotation and vignette live only in the stack).
    pub fn from_filter_state(
        filters: &FilterState,
        stack_uniforms: &BTreeMap<String, f32>,
        time: f32,
        has_mask: bool,
    ) -> Self {
        let get = |key: &str| stack_uniforms.get(key).copied().unwrap_or(0.0);
        Self {
            brightness: filters.brightness,
            contrast: 1.0 + filters.contrast,
            saturation: get("saturation.amount"),
            hue_rotate: get("hueRotate.amount") * 360.0,
            temperature: filters.temperature,
            vignette: get("vignette.amount"),
            bloom: filters.bloom,
            glitch: filters.glitch,
            time,
            mask_mix: if has_mask { 1.0 } else { 0.0 },
            tint: filters.tint,
            duotone: filters.duotone,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Per-pass uniforms: which primitive strength and blend to use.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PassUniforms {
    pub amount: f32,
    /// `BlendMode::to_u8` widened.
    pub blend_mode: u32,
    /// Frame number for animated nodes, 0 otherwise.
    pub frame: u32,
    pub _pad: f32,
}

impl PassUniforms {
    pub fn from_pass(pass: &RenderPass, frame: u32) -> Self {
        Self {
            amount: pass.node.amount().unwrap_or(0.0),
            blend_mode: pass.node.blend_mode.to_u8() as u32,
            frame: if pass.node.animated { frame } else { 0 },
            _pad: 0.0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::BlendMode;
    use crate::components::effect_stack::EffectNode;
    use crate::components::render_graph::build_schedule;
    use crate::ops::effects::Primitive;

    #[test]
    fn blocks_are_16_byte_multiples() {
        assert_eq!(std::mem::size_of::<FilterUniforms>(), 48);
        assert_eq!(std::mem::size_of::<PassUniforms>(), 16);
    }

    #[test]
    fn filter_uniforms_from_state() {
        let filters = FilterState { contrast: 0.25, bloom: 0.5, ..Default::default() };
        let mut map = BTreeMap::new();
        map.insert("hueRotate.amount".to_string(), 0.5);
        let u = FilterUniforms::from_filter_state(&filters, &map, 1.5, true);
        assert_eq!(u.contrast, 1.25);
        assert_eq!(u.hue_rotate, 180.0);
        assert_eq!(u.mask_mix, 1.0);
        assert_eq!(u.as_bytes().len(), 48);
        assert_eq!(&u.as_bytes()[24..28], &0.5f32.to_ne_bytes());
    }

    #[test]
    fn pass_uniforms_only_animate_animated_nodes() {
        let nodes = vec![
            EffectNode::new(Primitive::Scanlines).with_id("s").with_amount(0.3),
            EffectNode::new(Primitive::Vignette)
                .with_id("v")
                .with_amount(0.6)
                .with_blend_mode(BlendMode::Screen),
        ];
        let passes = build_schedule(&nodes);
        let scan = PassUniforms::from_pass(&passes[0], 42);
        let vig = PassUniforms::from_pass(&passes[1], 42);
        assert_eq!(scan.frame, 42);
        assert_eq!(vig.frame, 0);
        assert_eq!(vig.blend_mode, 1);
        assert_eq!(vig.amount, 0.6);
    }
}
