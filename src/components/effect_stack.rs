use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::canvas::BlendMode;
use crate::components::render_graph::{build_schedule, RenderPass};
use crate::ops::effects::Primitive;

// ============================================================================
// EFFECT NODE
// ============================================================================

/// One entry of the shader stack.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectNode {
    pub id: String,
    pub primitive: Primitive,
    pub enabled: bool,
    pub blend_mode: BlendMode,
    pub uniforms: BTreeMap<String, f32>,
    /// Re-rendered every frame (noise and scanline phase follow the frame).
    pub animated: bool,
}

impl EffectNode {
    /// Enabled node with normal blending, no uniforms and no id yet.
    pub fn new(primitive: Primitive) -> Self {
        Self {
            id: String::new(),
            primitive,
            enabled: true,
            blend_mode: BlendMode::Normal,
            uniforms: BTreeMap::new(),
            animated: primitive.is_animated(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_amount(self, amount: f32) -> Self {
        self.with_uniform("amount", amount)
    }

    pub fn with_uniform(mut self, key: &str, value: f32) -> Self {
        self.uniforms.insert(key.to_string(), value);
        self
    }

    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    pub fn with_animated(mut self, animated: bool) -> Self {
        self.animated = animated;
        self
    }

    pub fn amount(&self) -> Option<f32> {
        self.uniforms.get("amount").copied()
    }

    /// Rough heap footprint, for history accounting.
    pub fn memory_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.id.len()
            + self.uniforms.keys().map(|k| k.len() + std::mem::size_of::<f32>()).sum::<usize>()
    }
}

// ============================================================================
// EFFECT STACK
// ============================================================================

/// Ordered list of effect nodes; order is compositing order.
///
/// Every edit returns the resulting slice. Edits naming an unknown id or an
/// out-of-range index leave the stack as it was.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectStack {
    nodes: Vec<EffectNode>,
}

impl EffectStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[EffectNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&EffectNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn set_stack(&mut self, nodes: Vec<EffectNode>) -> &[EffectNode] {
        self.nodes = nodes;
        &self.nodes
    }

    /// Append `node` under a freshly generated `shader_*` id. Any id already
    /// on `node` is replaced.
    pub fn add_node(&mut self, node: EffectNode) -> &[EffectNode] {
        let id = format!("shader_{}", Uuid::new_v4().simple());
        self.nodes.push(node.with_id(id));
        &self.nodes
    }

    pub fn toggle_node(&mut self, id: &str) -> &[EffectNode] {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) {
            node.enabled = !node.enabled;
        }
        &self.nodes
    }

    pub fn update_uniform(&mut self, id: &str, key: &str, value: f32) -> &[EffectNode] {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) {
            node.uniforms.insert(key.to_string(), value);
        }
        &self.nodes
    }

    pub fn remove_node(&mut self, id: &str) -> &[EffectNode] {
        self.nodes.retain(|n| n.id != id);
        &self.nodes
    }

    /// Move the node at `from` so it ends up at index `to`.
    pub fn reorder(&mut self, from: usize, to: usize) -> &[EffectNode] {
        if from >= self.nodes.len() || to >= self.nodes.len() {
            return &self.nodes;
        }
        let node = self.nodes.remove(from);
        self.nodes.insert(to, node);
        &self.nodes
    }

    /// Flatten enabled nodes into `"<primitive>.<uniform>" -> value`.
    /// On key collisions the later node wins.
    pub fn to_uniform_map(&self) -> BTreeMap<String, f32> {
        let mut map = BTreeMap::new();
        for node in self.nodes.iter().filter(|n| n.enabled) {
            for (key, value) in &node.uniforms {
                map.insert(format!("{}.{}", node.primitive.as_str(), key), *value);
            }
        }
        map
    }

    /// Ping-pong pass schedule for the enabled nodes.
    pub fn render_passes(&self) -> Vec<RenderPass> {
        build_schedule(&self.nodes)
    }

    pub fn memory_size(&self) -> usize {
        self.nodes.iter().map(EffectNode::memory_size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, primitive: Primitive, amount: f32) -> EffectNode {
        EffectNode::new(primitive).with_id(id).with_amount(amount)
    }

    fn ids(nodes: &[EffectNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.id.as_str()).collect()
    }

    fn sample_stack() -> EffectStack {
        let mut stack = EffectStack::new();
        stack.set_stack(vec![
            node("a", Primitive::Vignette, 0.2),
            node("b", Primitive::Grain, 0.4),
            node("c", Primitive::Contrast, 0.1),
            node("d", Primitive::Bloom, 0.3),
        ]);
        stack
    }

    #[test]
    fn add_assigns_fresh_ids() {
        let mut stack = EffectStack::new();
        stack.add_node(EffectNode::new(Primitive::Grain).with_id("ignored"));
        stack.add_node(EffectNode::new(Primitive::Grain));
        let nodes = stack.nodes();
        assert!(nodes[0].id.starts_with("shader_"));
        assert_ne!(nodes[0].id, "ignored");
        assert_ne!(nodes[0].id, nodes[1].id);
    }

    #[test]
    fn reorder_there_and_back_restores_order() {
        let mut stack = sample_stack();
        let before: Vec<String> = stack.nodes().iter().map(|n| n.id.clone()).collect();
        for (i, j) in [(0, 3), (3, 1), (2, 2), (1, 0)] {
            stack.reorder(i, j);
            stack.reorder(j, i);
            assert_eq!(ids(stack.nodes()), before.iter().map(String::as_str).collect::<Vec<_>>());
        }
        assert_eq!(ids(stack.reorder(0, 2)), vec!["b", "c", "a", "d"]);
    }

    #[test]
    fn invalid_edits_are_no_ops() {
        let mut stack = sample_stack();
        let before = stack.clone();
        stack.reorder(0, 4);
        stack.reorder(7, 1);
        stack.toggle_node("missing");
        stack.update_uniform("missing", "amount", 1.0);
        stack.remove_node("missing");
        assert_eq!(stack, before);
    }

    #[test]
    fn toggle_update_and_remove_keep_order() {
        let mut stack = sample_stack();
        stack.toggle_node("b");
        assert!(!stack.get("b").map(|n| n.enabled).unwrap_or(true));
        stack.update_uniform("c", "amount", 0.9);
        assert_eq!(stack.get("c").and_then(EffectNode::amount), Some(0.9));
        assert_eq!(ids(stack.remove_node("a")), vec!["b", "c", "d"]);
    }

    #[test]
    fn uniform_map_skips_disabled_and_last_wins() {
        let mut stack = sample_stack();
        stack.add_node(EffectNode::new(Primitive::Bloom).with_amount(0.7));
        stack.toggle_node("a");
        let map = stack.to_uniform_map();
        assert!(!map.contains_key("vignette.amount"));
        assert_eq!(map.get("grain.amount"), Some(&0.4));
        assert_eq!(map.get("contrast.amount"), Some(&0.1));
        assert_eq!(map.get("bloom.amount"), Some(&0.7));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn animated_defaults_follow_primitive() {
        assert!(EffectNode::new(Primitive::Scanlines).animated);
        assert!(EffectNode::new(Primitive::Glitch).animated);
        assert!(!EffectNode::new(Primitive::Vignette).animated);
    }
}
