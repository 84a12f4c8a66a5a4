// ============================================================================
// GPU MODULE: hooks for a hardware filter backend
// ============================================================================
//
// Nothing here touches a device. The CPU engine produces everything a GPU
// backend needs to upload:
//   shaders.rs   WGSL source for the filter pass and stack snippets
//   uniforms.rs  `bytemuck` uniform blocks built from filter state and passes
// ============================================================================

pub mod shaders;
pub mod uniforms;

pub use uniforms::{FilterUniforms, PassUniforms};
