// SPDX-License-Identifier: CEPL-1.0
//! Vertex layout shared by the pipeline and the asset importer.

use crate::types::IndexType;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use lumen_core::LumenError;

/// binding 0, stride 32:
///   location 0: position, 3 x f32
///   location 1: tangent basis (normal, tangent, bitangent), 3 x packed 2-10-10-10 snorm
///   location 2: texcoord, 2 x f32
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub basis: [u32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const STRIDE: u32 = std::mem::size_of::<Vertex>() as u32;
    pub const BASIS_OFFSET: u32 = 12;
    pub const UV_OFFSET: u32 = 24;

    pub fn new(pos: [f32; 3], normal: Vec3, tangent: Vec3, bitangent: Vec3, uv: [f32; 2]) -> Self {
        Self {
            pos,
            basis: [pack_snorm3(normal), pack_snorm3(tangent), pack_snorm3(bitangent)],
            uv,
        }
    }
}

/// One 10-bit signed-normalized component.
#[inline]
pub fn snorm10(v: f32) -> u32 {
    if v >= 1.0 {
        0x1FF
    } else if v <= -1.0 {
        0x3FF
    } else {
        let scaled = v * 511.0;
        let rounded = if scaled >= 0.0 { scaled + 0.5 } else { scaled - 0.5 };
        (rounded.trunc() as i32 as u32) & 0x3FF
    }
}

/// `r << 22 | g << 12 | b << 2`, two-bit alpha left at zero.
#[inline]
pub fn pack_snorm3(v: Vec3) -> u32 {
    (snorm10(v.x) << 22) | (snorm10(v.y) << 12) | (snorm10(v.z) << 2)
}

#[inline]
pub fn texcoord_from_u8(raw: [u8; 2]) -> [f32; 2] {
    [raw[0] as f32 / 255.0, raw[1] as f32 / 255.0]
}

#[inline]
pub fn texcoord_from_u16(raw: [u16; 2]) -> [f32; 2] {
    [raw[0] as f32 / 65535.0, raw[1] as f32 / 65535.0]
}

/// Width of one index in the source encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexWidth {
    U8,
    U16,
    U32,
    U64,
}

impl IndexWidth {
    pub fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            1 => Some(IndexWidth::U8),
            2 => Some(IndexWidth::U16),
            4 => Some(IndexWidth::U32),
            8 => Some(IndexWidth::U64),
            _ => None,
        }
    }

    pub fn bytes(self) -> u64 {
        match self {
            IndexWidth::U8 => 1,
            IndexWidth::U16 => 2,
            IndexWidth::U32 => 4,
            IndexWidth::U64 => 8,
        }
    }

    /// Index type the device buffer ends up with. Byte indices are widened.
    pub fn device_type(self) -> Option<IndexType> {
        match self {
            IndexWidth::U8 | IndexWidth::U16 => Some(IndexType::U16),
            IndexWidth::U32 => Some(IndexType::U32),
            IndexWidth::U64 => None,
        }
    }

    /// First index of an accessor starting `byte_offset` bytes into its view.
    pub fn first_index(self, byte_offset: u64) -> u32 {
        (byte_offset / self.bytes()) as u32
    }
}

/// Converts raw index bytes into device-ready bytes. Byte indices become
/// `u16`; element positions are preserved so `first_index` stays valid.
pub fn device_indices(width: IndexWidth, raw: &[u8]) -> Result<(IndexType, Vec<u8>), LumenError> {
    match width {
        IndexWidth::U8 => {
            let wide: Vec<u16> = raw.iter().map(|&b| b as u16).collect();
            Ok((IndexType::U16, bytemuck::cast_slice::<u16, u8>(&wide).to_vec()))
        }
        IndexWidth::U16 | IndexWidth::U32 => {
            let ty = width.device_type().unwrap_or(IndexType::U32);
            // trailing bytes that do not form a whole index are dropped
            let whole = raw.len() - raw.len() % ty.size() as usize;
            Ok((ty, raw[..whole].to_vec()))
        }
        IndexWidth::U64 => Err(LumenError::Upload(
            "64-bit indices have no device index type".into(),
        )),
    }
}
