// ============================================================================
// GPU SHADERS: WGSL kept inline next to the uniform layouts they read
// ============================================================================

// ============================================================================
// FILTER SHADER: global color channels, one full-screen pass
// ============================================================================
//
// Mirrors `ops::adjustments::apply_filters` in normalized color space.
// `FilterUniforms` in `uniforms.rs` must match the struct below field for
// field.
pub const FILTER_SHADER: &str = r#"
struct FilterUniforms {
    brightness:  f32,
    contrast:    f32,
    saturation:  f32,
    hue_rotate:  f32,
    temperature: f32,
    vignette:    f32,
    bloom:       f32,
    glitch:      f32,
    time:        f32,
    mask_mix:    f32,
    tint:        f32,
    duotone:     f32,
};

@group(0) @binding(0) var source_tex: texture_2d<f32>;
@group(0) @binding(1) var source_samp: sampler;
@group(0) @binding(2) var mask_tex: texture_2d<f32>;
@group(0) @binding(3) var<uniform> u: FilterUniforms;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vi: u32) -> VertexOutput {
    var out: VertexOutput;
    let x = f32((vi << 1u) & 2u);
    let y = f32(vi & 2u);
    out.position = vec4<f32>(x * 2.0 - 1.0, 1.0 - y * 2.0, 0.0, 1.0);
    out.uv = vec2<f32>(x, y);
    return out;
}

fn apply_color_core(c: vec3<f32>, pixel_index: u32) -> vec3<f32> {
    var color = c + vec3<f32>(u.brightness);
    color = (color - vec3<f32>(0.5)) * u.contrast + vec3<f32>(0.5);
    color.r += u.temperature * (40.0 / 255.0);
    color.b -= u.temperature * (40.0 / 255.0);
    color.g += u.tint * (25.0 / 255.0);
    if (u.duotone > 0.0) {
        let l = dot(color, vec3<f32>(0.299, 0.587, 0.114));
        let dark = vec3<f32>(20.0, 40.0, 60.0) / 255.0;
        let light = vec3<f32>(60.0, 180.0, 255.0) / 255.0;
        color = mix(dark, light, l);
    }
    if (u.glitch > 0.01 && pixel_index % 7u == 0u) {
        color.r = min(1.0, color.r + u.glitch * (70.0 / 255.0));
        color.b = max(0.0, color.b - u.glitch * (60.0 / 255.0));
    }
    if (u.bloom > 0.01) {
        color += vec3<f32>(u.bloom * (35.0 / 255.0));
    }
    return clamp(color, vec3<f32>(0.0), vec3<f32>(1.0));
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let dims = textureDimensions(source_tex);
    let px = vec2<u32>(in.position.xy);
    let src = textureSample(source_tex, source_samp, in.uv);
    let selected = textureLoad(mask_tex, px, 0).r;
    let keep = u.mask_mix * (1.0 - step(0.5, selected));
    let filtered = apply_color_core(src.rgb, px.y * dims.x + px.x);
    return vec4<f32>(mix(filtered, src.rgb, keep), src.a);
}
"#;

// ============================================================================
// CRT SCANLINES: per-pass snippet
// ============================================================================
pub const SCANLINES_SNIPPET: &str = r#"
fn apply_scanlines(c: vec3<f32>, uv: vec2<f32>, strength: f32, frame: u32) -> vec3<f32> {
    let scan = sin(uv.y * 1200.0 + f32(frame) * 0.1) * 0.04 * strength;
    return c - vec3<f32>(scan);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_struct_lists_fields_in_upload_order() {
        let fields = [
            "brightness:", "contrast:", "saturation:", "hue_rotate:", "temperature:", "vignette:",
            "bloom:", "glitch:", "time:", "mask_mix:", "tint:", "duotone:",
        ];
        let mut last = 0;
        for field in fields {
            let pos = FILTER_SHADER[last..]
                .find(field)
                .map(|p| p + last)
                .unwrap_or_else(|| panic!("missing {}", field));
            last = pos;
        }
        assert!(SCANLINES_SNIPPET.contains("1200.0"));
    }
}
