pub mod adjustments;
pub mod color_metric;
pub mod crop;
pub mod effects;
pub mod selection;
