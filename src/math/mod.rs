//! Mathematical utilities for culling and bounds

pub mod aabb;
pub mod sphere;
pub mod frustum;

pub use aabb::Aabb;
pub use sphere::BoundingSphere;
pub use frustum::{Plane, Frustum};
