// SPDX-License-Identifier: CEPL-1.0
use crate::types::IndexType;
use glam::Mat4;

/// A vertex/index buffer pair, bound together.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry<B> {
    pub vertex: B,
    pub index: B,
    pub index_type: IndexType,
}

/// One drawable, built during asset load and read-only afterwards.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawRecord<B, M> {
    pub transform: Mat4,
    pub geometry: Geometry<B>,
    pub index_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    /// Per-draw immutable state, e.g. the texture set.
    pub material: Option<M>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawCall {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    pub first_instance: u32,
}

impl<B, M> DrawRecord<B, M> {
    pub fn call(&self) -> DrawCall {
        DrawCall {
            index_count: self.index_count,
            instance_count: 1,
            first_index: self.first_index,
            vertex_offset: self.vertex_offset,
            first_instance: 0,
        }
    }
}
