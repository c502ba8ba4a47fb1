// SPDX-License-Identifier: CEPL-1.0
//! Translation between the backend-neutral vocabulary and `ash::vk`.

use ash::vk;
use lumen_render::{
    BufferUsage, ColorSpace, DeviceClass, ImageLayout, ImageUsage, IndexType, MemoryProps,
    PixelFormat, PresentMode, QueueCaps, SurfaceFormat,
};

pub fn pixel_format_from_vk(f: vk::Format) -> PixelFormat {
    match f {
        vk::Format::UNDEFINED => PixelFormat::Undefined,
        vk::Format::B8G8R8A8_UNORM => PixelFormat::Bgra8Unorm,
        vk::Format::B8G8R8A8_SRGB => PixelFormat::Bgra8Srgb,
        vk::Format::R8G8B8A8_UNORM => PixelFormat::Rgba8Unorm,
        vk::Format::R8G8B8A8_SRGB => PixelFormat::Rgba8Srgb,
        vk::Format::D32_SFLOAT => PixelFormat::D32Float,
        other => PixelFormat::Other(other.as_raw()),
    }
}

pub fn pixel_format_to_vk(f: PixelFormat) -> vk::Format {
    match f {
        PixelFormat::Undefined => vk::Format::UNDEFINED,
        PixelFormat::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        PixelFormat::Bgra8Srgb => vk::Format::B8G8R8A8_SRGB,
        PixelFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        PixelFormat::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
        PixelFormat::D32Float => vk::Format::D32_SFLOAT,
        PixelFormat::Other(raw) => vk::Format::from_raw(raw),
    }
}

pub fn surface_format_from_vk(f: vk::SurfaceFormatKHR) -> SurfaceFormat {
    SurfaceFormat {
        format: pixel_format_from_vk(f.format),
        color_space: match f.color_space {
            vk::ColorSpaceKHR::SRGB_NONLINEAR => ColorSpace::SrgbNonlinear,
            other => ColorSpace::Other(other.as_raw()),
        },
    }
}

pub fn surface_format_to_vk(f: SurfaceFormat) -> vk::SurfaceFormatKHR {
    vk::SurfaceFormatKHR {
        format: pixel_format_to_vk(f.format),
        color_space: match f.color_space {
            ColorSpace::SrgbNonlinear => vk::ColorSpaceKHR::SRGB_NONLINEAR,
            ColorSpace::Other(raw) => vk::ColorSpaceKHR::from_raw(raw),
        },
    }
}

pub fn present_mode_from_vk(m: vk::PresentModeKHR) -> PresentMode {
    match m {
        vk::PresentModeKHR::IMMEDIATE => PresentMode::Immediate,
        vk::PresentModeKHR::MAILBOX => PresentMode::Mailbox,
        vk::PresentModeKHR::FIFO => PresentMode::Fifo,
        vk::PresentModeKHR::FIFO_RELAXED => PresentMode::FifoRelaxed,
        other => PresentMode::Other(other.as_raw()),
    }
}

pub fn present_mode_to_vk(m: PresentMode) -> vk::PresentModeKHR {
    match m {
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
        PresentMode::Other(raw) => vk::PresentModeKHR::from_raw(raw),
    }
}

pub fn device_class_from_vk(t: vk::PhysicalDeviceType) -> DeviceClass {
    match t {
        vk::PhysicalDeviceType::DISCRETE_GPU => DeviceClass::Discrete,
        vk::PhysicalDeviceType::INTEGRATED_GPU => DeviceClass::Integrated,
        vk::PhysicalDeviceType::VIRTUAL_GPU => DeviceClass::Virtual,
        vk::PhysicalDeviceType::CPU => DeviceClass::Cpu,
        _ => DeviceClass::Other,
    }
}

pub fn queue_caps_from_vk(flags: vk::QueueFlags) -> QueueCaps {
    let mut caps = QueueCaps::empty();
    caps.set(QueueCaps::GRAPHICS, flags.contains(vk::QueueFlags::GRAPHICS));
    caps.set(QueueCaps::COMPUTE, flags.contains(vk::QueueFlags::COMPUTE));
    caps.set(QueueCaps::TRANSFER, flags.contains(vk::QueueFlags::TRANSFER));
    caps
}

pub fn memory_props_from_vk(flags: vk::MemoryPropertyFlags) -> MemoryProps {
    let mut props = MemoryProps::empty();
    props.set(
        MemoryProps::DEVICE_LOCAL,
        flags.contains(vk::MemoryPropertyFlags::DEVICE_LOCAL),
    );
    props.set(
        MemoryProps::HOST_VISIBLE,
        flags.contains(vk::MemoryPropertyFlags::HOST_VISIBLE),
    );
    props.set(
        MemoryProps::HOST_COHERENT,
        flags.contains(vk::MemoryPropertyFlags::HOST_COHERENT),
    );
    props.set(
        MemoryProps::HOST_CACHED,
        flags.contains(vk::MemoryPropertyFlags::HOST_CACHED),
    );
    props.set(
        MemoryProps::LAZILY_ALLOCATED,
        flags.contains(vk::MemoryPropertyFlags::LAZILY_ALLOCATED),
    );
    props
}

pub fn buffer_usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut out = vk::BufferUsageFlags::empty();
    for (ours, theirs) in [
        (BufferUsage::TRANSFER_SRC, vk::BufferUsageFlags::TRANSFER_SRC),
        (BufferUsage::TRANSFER_DST, vk::BufferUsageFlags::TRANSFER_DST),
        (BufferUsage::UNIFORM, vk::BufferUsageFlags::UNIFORM_BUFFER),
        (BufferUsage::INDEX, vk::BufferUsageFlags::INDEX_BUFFER),
        (BufferUsage::VERTEX, vk::BufferUsageFlags::VERTEX_BUFFER),
    ] {
        if usage.contains(ours) {
            out |= theirs;
        }
    }
    out
}

pub fn image_usage_to_vk(usage: ImageUsage) -> vk::ImageUsageFlags {
    let mut out = vk::ImageUsageFlags::empty();
    for (ours, theirs) in [
        (ImageUsage::TRANSFER_DST, vk::ImageUsageFlags::TRANSFER_DST),
        (ImageUsage::SAMPLED, vk::ImageUsageFlags::SAMPLED),
        (
            ImageUsage::DEPTH_ATTACHMENT,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        ),
    ] {
        if usage.contains(ours) {
            out |= theirs;
        }
    }
    out
}

pub fn index_type_to_vk(t: IndexType) -> vk::IndexType {
    match t {
        IndexType::U16 => vk::IndexType::UINT16,
        IndexType::U32 => vk::IndexType::UINT32,
    }
}

/// Layout plus the access mask and stage that touch an image in it.
pub struct LayoutUse {
    pub layout: vk::ImageLayout,
    pub access: vk::AccessFlags,
    pub stage: vk::PipelineStageFlags,
}

pub fn layout_use(layout: ImageLayout) -> LayoutUse {
    match layout {
        ImageLayout::Undefined => LayoutUse {
            layout: vk::ImageLayout::UNDEFINED,
            access: vk::AccessFlags::empty(),
            stage: vk::PipelineStageFlags::TOP_OF_PIPE,
        },
        ImageLayout::TransferDst => LayoutUse {
            layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            access: vk::AccessFlags::TRANSFER_WRITE,
            stage: vk::PipelineStageFlags::TRANSFER,
        },
        ImageLayout::ShaderReadOnly => LayoutUse {
            layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            access: vk::AccessFlags::SHADER_READ,
            stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
        },
        // DEPTH_ATTACHMENT_OPTIMAL is 1.2; the 1.1 equivalent for a
        // stencil-less format is DEPTH_STENCIL_ATTACHMENT_OPTIMAL
        ImageLayout::DepthAttachment => LayoutUse {
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            access: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            stage: vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
                | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
        },
    }
}
