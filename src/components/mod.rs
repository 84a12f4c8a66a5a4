pub mod effect_stack;
pub mod history;
pub mod presets;
pub mod render_graph;
