// SPDX-License-Identifier: CEPL-1.0
//! Backend-neutral vocabulary. Backends map their native enums onto these;
//! anything without a neutral name round-trips through `Other(raw)`.

use bitflags::bitflags;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Undefined,
    Bgra8Unorm,
    Bgra8Srgb,
    Rgba8Unorm,
    Rgba8Srgb,
    D32Float,
    Other(i32),
}

impl PixelFormat {
    /// Bytes per texel for the formats the uploader accepts.
    pub fn texel_size(self) -> Option<usize> {
        match self {
            PixelFormat::Bgra8Unorm
            | PixelFormat::Bgra8Srgb
            | PixelFormat::Rgba8Unorm
            | PixelFormat::Rgba8Srgb
            | PixelFormat::D32Float => Some(4),
            PixelFormat::Undefined | PixelFormat::Other(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    SrgbNonlinear,
    Other(i32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceFormat {
    pub format: PixelFormat,
    pub color_space: ColorSpace,
}

impl SurfaceFormat {
    pub const BGRA8_SRGB_NONLINEAR: SurfaceFormat = SurfaceFormat {
        format: PixelFormat::Bgra8Unorm,
        color_space: ColorSpace::SrgbNonlinear,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PresentMode {
    Immediate,
    Mailbox,
    Fifo,
    FifoRelaxed,
    Other(i32),
}

impl fmt::Display for PresentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresentMode::Immediate => f.write_str("IMMEDIATE"),
            PresentMode::Mailbox => f.write_str("MAILBOX"),
            PresentMode::Fifo => f.write_str("FIFO"),
            PresentMode::FifoRelaxed => f.write_str("FIFO_RELAXED"),
            PresentMode::Other(raw) => write!(f, "present mode {raw}"),
        }
    }
}

/// Adapter class. Only `Discrete` is preferred by the negotiator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Discrete,
    Integrated,
    Virtual,
    Cpu,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    pub fn size(self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    Undefined,
    TransferDst,
    ShaderReadOnly,
    DepthAttachment,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct QueueCaps: u32 {
        const GRAPHICS = 1 << 0;
        const COMPUTE  = 1 << 1;
        const TRANSFER = 1 << 2;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct MemoryProps: u32 {
        const DEVICE_LOCAL     = 1 << 0;
        const HOST_VISIBLE     = 1 << 1;
        const HOST_COHERENT    = 1 << 2;
        const HOST_CACHED      = 1 << 3;
        const LAZILY_ALLOCATED = 1 << 4;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const TRANSFER_SRC = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        const UNIFORM      = 1 << 2;
        const INDEX        = 1 << 3;
        const VERTEX       = 1 << 4;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const TRANSFER_DST     = 1 << 0;
        const SAMPLED          = 1 << 1;
        const DEPTH_ATTACHMENT = 1 << 2;
    }
}
