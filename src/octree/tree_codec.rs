//! Pointer-free wire form of a tree.
//!
//! Node references cannot cross a process boundary, so a tree is flattened by
//! post-order traversal into two flat arrays with one 10-entry record per
//! node: the floats carry the box, the center of mass and the total mass, the
//! ints carry the particle count, the particle index (or -1) and the eight
//! child sequence indices (or -1). Children appear strictly before their
//! parent, so every child index is below its parent's and reconstruction is
//! a single forward pass ending at the root.

use bincode::{Decode, Encode};

use crate::errors::SimulationError;
use crate::octree::{CellRegion, OctreeNode, OCTANT_COUNT};

pub const FLOATS_PER_NODE: usize = 10;
pub const INTS_PER_NODE: usize = 10;

/// A flattened tree: the two stride-10 arrays plus the node count. This is
/// the whole wire format; there is no further framing.
///
/// # Examples
///
/// ```
/// use rs_nbody::octree::{CellRegion, FlatTree, OctreeNode};
/// use rs_nbody::particles::Particle;
///
/// let particles = [Particle::new((0.2, 0.1, -0.3), (0.0, 0.0, 0.0), 5.0)];
/// let mut root = OctreeNode::new(CellRegion::cube(-1.4, 1.4));
/// root.insert(0, &particles);
///
/// let flat = FlatTree::serialize(&root).unwrap();
/// assert_eq!(flat.node_count(), 1);
///
/// let rebuilt = flat.deserialize(particles.len()).unwrap();
/// assert_eq!(rebuilt.particle, Some(0));
/// assert_eq!(rebuilt.total_mass, 5.0);
/// ```
#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct FlatTree {
    node_count: usize,
    floats: Vec<f64>,
    ints: Vec<i32>,
}

impl FlatTree {
    /// Flattens a tree. Fails only when the tree is too large for the wire's
    /// `i32` sequence indices or when the finished arrays disagree with the
    /// counted node total.
    pub fn serialize(root: &OctreeNode) -> Result<Self, SimulationError> {
        let mut flat = FlatTree {
            node_count: 0,
            floats: Vec::with_capacity(root.node_count() * FLOATS_PER_NODE),
            ints: Vec::with_capacity(root.node_count() * INTS_PER_NODE),
        };
        flat.flatten(root)?;

        if flat.floats.len() != flat.node_count * FLOATS_PER_NODE
            || flat.ints.len() != flat.node_count * INTS_PER_NODE
        {
            return Err(SimulationError::MalformedFlatTree(format!(
                "record arrays ({} floats, {} ints) disagree with {} counted nodes",
                flat.floats.len(),
                flat.ints.len(),
                flat.node_count
            )));
        }
        Ok(flat)
    }

    fn flatten(&mut self, node: &OctreeNode) -> Result<i32, SimulationError> {
        let mut child_ids = [-1_i32; OCTANT_COUNT];
        if let Some(children) = node.children.as_ref() {
            for (slot, child) in children.iter().enumerate() {
                child_ids[slot] = self.flatten(child)?;
            }
        }

        let id = i32::try_from(self.node_count).map_err(|_| {
            SimulationError::MalformedFlatTree("node count exceeds the wire index range".to_string())
        })?;

        let r = node.region;
        self.floats.extend_from_slice(&[
            r.x_min, r.x_max, r.y_min, r.y_max, r.z_min, r.z_max,
            node.center_x, node.center_y, node.center_z, node.total_mass,
        ]);

        let particle = match node.particle {
            Some(index) => i32::try_from(index).map_err(|_| {
                SimulationError::MalformedFlatTree(format!(
                    "particle index {} exceeds the wire index range",
                    index
                ))
            })?,
            None => -1,
        };
        self.ints.push(node.particle_count as i32);
        self.ints.push(particle);
        self.ints.extend_from_slice(&child_ids);

        self.node_count += 1;
        Ok(id)
    }

    /// Assembles a `FlatTree` from raw wire parts, as received from a
    /// transport. Validation happens in [`FlatTree::deserialize`].
    pub fn from_parts(node_count: usize, floats: Vec<f64>, ints: Vec<i32>) -> Self {
        Self { node_count, floats, ints }
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn floats(&self) -> &[f64] {
        &self.floats
    }

    pub fn ints(&self) -> &[i32] {
        &self.ints
    }

    /// Reconstructs the tree in one forward pass over the records and
    /// returns the root (the last record, since the traversal was
    /// post-order). Leaf particle references are re-bound by index against a
    /// store of `store_len` particles.
    ///
    /// Every size and index is validated before use; malformed input is a
    /// [`SimulationError::MalformedFlatTree`] fault, never an out-of-range
    /// access.
    pub fn deserialize(&self, store_len: usize) -> Result<OctreeNode, SimulationError> {
        if self.node_count == 0 {
            return Err(SimulationError::MalformedFlatTree("empty record sequence".to_string()));
        }
        if self.floats.len() != self.node_count * FLOATS_PER_NODE
            || self.ints.len() != self.node_count * INTS_PER_NODE
        {
            return Err(SimulationError::MalformedFlatTree(format!(
                "record arrays ({} floats, {} ints) disagree with {} declared nodes",
                self.floats.len(),
                self.ints.len(),
                self.node_count
            )));
        }

        let mut nodes: Vec<Option<OctreeNode>> = Vec::with_capacity(self.node_count);

        for i in 0..self.node_count {
            let f = &self.floats[i * FLOATS_PER_NODE..(i + 1) * FLOATS_PER_NODE];
            let record = &self.ints[i * INTS_PER_NODE..(i + 1) * INTS_PER_NODE];

            let particle_count = record[0];
            if particle_count < 0 {
                return Err(SimulationError::MalformedFlatTree(format!(
                    "node {} declares a negative particle count",
                    i
                )));
            }

            let particle = match record[1] {
                -1 => None,
                index if index >= 0 && (index as usize) < store_len => Some(index as usize),
                index => {
                    return Err(SimulationError::MalformedFlatTree(format!(
                        "node {} references particle {} outside a store of {}",
                        i, index, store_len
                    )));
                }
            };

            let child_ids = &record[2..2 + OCTANT_COUNT];
            let children = if child_ids.iter().all(|&c| c == -1) {
                None
            } else {
                let mut taken = Vec::with_capacity(OCTANT_COUNT);
                for &c in child_ids {
                    if c < 0 {
                        return Err(SimulationError::MalformedFlatTree(format!(
                            "internal node {} lists fewer than {} children",
                            i, OCTANT_COUNT
                        )));
                    }
                    if c as usize >= i {
                        return Err(SimulationError::MalformedFlatTree(format!(
                            "child index {} of node {} is not strictly below its parent",
                            c, i
                        )));
                    }
                    match nodes[c as usize].take() {
                        Some(child) => taken.push(child),
                        None => {
                            return Err(SimulationError::MalformedFlatTree(format!(
                                "node {} is claimed as a child more than once",
                                c
                            )));
                        }
                    }
                }
                let slots: [OctreeNode; OCTANT_COUNT] = taken.try_into().map_err(|_| {
                    SimulationError::MalformedFlatTree("octant slot conversion failed".to_string())
                })?;
                Some(Box::new(slots))
            };

            nodes.push(Some(OctreeNode {
                region: CellRegion::new(f[0], f[1], f[2], f[3], f[4], f[5]),
                center_x: f[6],
                center_y: f[7],
                center_z: f[8],
                total_mass: f[9],
                particle_count: particle_count as usize,
                particle,
                children,
            }));
        }

        match nodes.pop() {
            Some(Some(root)) => Ok(root),
            _ => Err(SimulationError::MalformedFlatTree(
                "the final record was claimed as a child and cannot be the root".to_string(),
            )),
        }
    }
}
