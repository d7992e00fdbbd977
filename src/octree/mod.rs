mod spatial_octree;
mod tree_codec;
mod force;

pub use spatial_octree::*;
pub use tree_codec::*;
pub use force::*;

#[cfg(test)]
mod force_tests;
