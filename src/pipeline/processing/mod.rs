// Pipeline processing: identity resolution, fusion, rating normalization, and validation

pub mod conflation;
pub mod fusion;
pub mod quality_gate;
pub mod rating;
pub mod title;
pub mod year_cluster;
