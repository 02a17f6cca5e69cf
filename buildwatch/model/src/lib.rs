pub mod data;
pub mod labels;
pub mod resources;
