// ============================================================================
// RENDER GRAPH: ping-pong pass schedule for the effect stack
// ============================================================================
//
// Each enabled node becomes one pass. Passes alternate between two
// intermediate buffers: the first reads the source, each later pass reads
// what the previous one wrote, and the last pass writes to the screen.
// `execute_schedule` runs a schedule on the CPU with the same buffer
// rotation a GPU backend would use.
// ============================================================================

use image::{GrayImage, Rgba, RgbaImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::canvas::{blend_pixel, check_mask_dimensions, BlendMode, EngineError, PixelBuffer};
use crate::components::effect_stack::EffectNode;
use crate::ops::effects::render_primitive;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PassInput {
    Source,
    BufferA,
    BufferB,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PassOutput {
    BufferA,
    BufferB,
    Screen,
}

impl PassOutput {
    /// Intermediate buffer slot written by this output, if any.
    fn slot(&self) -> Option<usize> {
        match self {
            PassOutput::BufferA => Some(0),
            PassOutput::BufferB => Some(1),
            PassOutput::Screen => None,
        }
    }
}

/// One draw of the schedule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderPass {
    /// `"<node id>_pass"`
    pub id: String,
    pub input: PassInput,
    pub output: PassOutput,
    pub node: EffectNode,
}

/// Derive the pass schedule for the enabled subset of `nodes`, in order.
pub fn build_schedule(nodes: &[EffectNode]) -> Vec<RenderPass> {
    let mut input = PassInput::Source;
    let mut output = PassOutput::BufferA;

    let mut passes: Vec<RenderPass> = nodes
        .iter()
        .filter(|n| n.enabled)
        .map(|node| {
            let pass = RenderPass {
                id: format!("{}_pass", node.id),
                input,
                output,
                node: node.clone(),
            };
            (input, output) = match output {
                PassOutput::BufferA => (PassInput::BufferA, PassOutput::BufferB),
                _ => (PassInput::BufferB, PassOutput::BufferA),
            };
            pass
        })
        .collect();

    if let Some(last) = passes.last_mut() {
        last.output = PassOutput::Screen;
    }
    passes
}

/// Run `passes` over `source` and return the screen image.
///
/// A pass renders its node's primitive from the pass input and composites the
/// result over that input with the node's blend mode. Channel primitives are
/// already part of the filter state, so their passes copy the input through.
/// Pixels outside `mask` keep the pass input. An empty schedule returns a copy
/// of `source`.
pub fn execute_schedule(
    passes: &[RenderPass],
    source: &PixelBuffer,
    mask: Option<&GrayImage>,
    frame: u32,
) -> Result<RgbaImage, EngineError> {
    if let Some(m) = mask {
        check_mask_dimensions(source, m)?;
    }

    let mut buffers: [Option<RgbaImage>; 2] = [None, None];
    let mut screen: Option<RgbaImage> = None;

    for pass in passes {
        let input = match pass.input {
            PassInput::Source => source,
            PassInput::BufferA => buffers[0].as_ref().unwrap_or(source),
            PassInput::BufferB => buffers[1].as_ref().unwrap_or(source),
        };

        let node = &pass.node;
        let result = if node.primitive.is_filter_channel() {
            input.clone()
        } else {
            let seed = if node.animated { frame } else { 0 };
            let effect = render_primitive(node.primitive, &node.uniforms, input, seed);
            composite_over(input, &effect, node.blend_mode, mask)
        };

        match pass.output.slot() {
            Some(slot) => buffers[slot] = Some(result),
            None => screen = Some(result),
        }
    }

    Ok(screen.unwrap_or_else(|| source.clone()))
}

/// Blend `top` over `base` color-wise (both treated as opaque) and keep the
/// base alpha. Pixels outside `mask` stay as in `base`.
fn composite_over(base: &RgbaImage, top: &RgbaImage, mode: BlendMode, mask: Option<&GrayImage>) -> RgbaImage {
    let w = base.width() as usize;
    if w == 0 || base.height() == 0 {
        return base.clone();
    }
    let stride = w * 4;
    let base_raw = base.as_raw();
    let top_raw = top.as_raw();
    let mask_raw = mask.map(|m| m.as_raw().as_slice());

    let mut out = base.clone();
    out.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        for x in 0..w {
            if let Some(mr) = mask_raw
                && mr[y * w + x] == 0
            {
                continue;
            }
            let pi = y * stride + x * 4;
            let b = Rgba([base_raw[pi], base_raw[pi + 1], base_raw[pi + 2], 255]);
            let t = Rgba([top_raw[pi], top_raw[pi + 1], top_raw[pi + 2], 255]);
            let px = blend_pixel(b, t, mode, 1.0);
            row_out[x * 4..x * 4 + 3].copy_from_slice(&px.0[..3]);
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::effects::{vignette_core, Primitive};
    use image::Luma;

    fn node(id: &str, primitive: Primitive, amount: f32) -> EffectNode {
        EffectNode::new(primitive).with_id(id).with_amount(amount)
    }

    #[test]
    fn single_node_goes_straight_to_screen() {
        let passes = build_schedule(&[node("v", Primitive::Vignette, 0.5)]);
        assert_eq!(passes.len(), 1);
        assert_eq!(passes[0].id, "v_pass");
        assert_eq!(passes[0].input, PassInput::Source);
        assert_eq!(passes[0].output, PassOutput::Screen);
    }

    #[test]
    fn passes_ping_pong_and_skip_disabled() {
        let mut off = node("x", Primitive::Grain, 0.5);
        off.enabled = false;
        let nodes = vec![
            node("a", Primitive::Vignette, 0.5),
            off,
            node("b", Primitive::Grain, 0.5),
            node("c", Primitive::Saturation, 0.5),
            node("d", Primitive::Exposure, 0.5),
        ];
        let passes = build_schedule(&nodes);
        let shape: Vec<(&str, PassInput, PassOutput)> =
            passes.iter().map(|p| (p.id.as_str(), p.input, p.output)).collect();
        assert_eq!(
            shape,
            vec![
                ("a_pass", PassInput::Source, PassOutput::BufferA),
                ("b_pass", PassInput::BufferA, PassOutput::BufferB),
                ("c_pass", PassInput::BufferB, PassOutput::BufferA),
                ("d_pass", PassInput::BufferA, PassOutput::Screen),
            ]
        );
    }

    #[test]
    fn nothing_enabled_means_no_passes() {
        assert!(build_schedule(&[]).is_empty());
        let mut n = node("a", Primitive::Vignette, 0.5);
        n.enabled = false;
        assert!(build_schedule(&[n]).is_empty());
    }

    #[test]
    fn empty_schedule_returns_source() {
        let img = RgbaImage::from_pixel(3, 3, Rgba([9, 8, 7, 255]));
        assert_eq!(execute_schedule(&[], &img, None, 0).unwrap(), img);
    }

    #[test]
    fn channel_passes_copy_through() {
        let img = RgbaImage::from_fn(4, 4, |x, y| Rgba([x as u8 * 50, y as u8 * 50, 3, 255]));
        let passes = build_schedule(&[node("b", Primitive::Brightness, 0.9), node("g", Primitive::Glitch, 1.0)]);
        assert_eq!(execute_schedule(&passes, &img, None, 5).unwrap(), img);
    }

    #[test]
    fn normal_pass_matches_kernel_output() {
        let img = RgbaImage::from_pixel(9, 7, Rgba([180, 160, 140, 255]));
        let passes = build_schedule(&[node("v", Primitive::Vignette, 0.6)]);
        let out = execute_schedule(&passes, &img, None, 0).unwrap();
        assert_eq!(out, vignette_core(&img, 0.6, 1.0));
    }

    #[test]
    fn masked_out_pixels_keep_pass_input() {
        let img = RgbaImage::from_pixel(5, 5, Rgba([200, 200, 200, 255]));
        let mut mask = GrayImage::new(5, 5);
        mask.put_pixel(0, 0, Luma([255]));
        let passes = build_schedule(&[node("v", Primitive::Vignette, 1.0)]);
        let out = execute_schedule(&passes, &img, Some(&mask), 0).unwrap();
        assert!(out.get_pixel(0, 0)[0] < 200);
        assert_eq!(*out.get_pixel(4, 4), Rgba([200, 200, 200, 255]));
    }

    #[test]
    fn screen_blend_never_darkens() {
        let img = RgbaImage::from_fn(6, 6, |x, y| Rgba([x as u8 * 40, y as u8 * 40, 100, 255]));
        let n = node("v", Primitive::Vignette, 1.0).with_blend_mode(BlendMode::Screen);
        let out = execute_schedule(&build_schedule(&[n]), &img, None, 0).unwrap();
        for (a, b) in out.pixels().zip(img.pixels()) {
            assert!(a[0] >= b[0] && a[1] >= b[1] && a[2] >= b[2]);
        }
    }

    #[test]
    fn mask_must_match_source() {
        let img = RgbaImage::new(4, 4);
        let mask = GrayImage::new(2, 2);
        assert!(execute_schedule(&[], &img, Some(&mask), 0).is_err());
    }
}
