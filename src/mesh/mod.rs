//! Procedural test geometry

pub mod lod_sphere;

pub use lod_sphere::{LodMesh, MeshVertex};
