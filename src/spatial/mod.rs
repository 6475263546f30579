//! Spatial indexing for proximity and tag-filtered queries

pub mod grid;

pub use grid::SpatialGrid;
