// SPDX-License-Identifier: CEPL-1.0
//! One-shot transfer submissions: the Vulkan side of the staging protocol.

use crate::convert::{buffer_usage_to_vk, image_usage_to_vk, layout_use, pixel_format_to_vk};
use crate::device::Gpu;
use anyhow::{Context, Result};
use ash::vk;
use lumen_core::LumenError;
use lumen_render::{
    BufferUsage, Extent2D, ImageUsage, MemoryClass, PixelFormat, TransferCommand, TransferDevice,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VkBuffer {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
}

impl VkBuffer {
    pub unsafe fn destroy(self, device: &ash::Device) {
        unsafe {
            device.destroy_buffer(self.buffer, None);
            device.free_memory(self.memory, None);
        }
    }
}

/// Device-local image with one full view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VkImage {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub view: vk::ImageView,
    pub aspect: vk::ImageAspectFlags,
}

impl VkImage {
    pub unsafe fn destroy(self, device: &ash::Device) {
        unsafe {
            device.destroy_image_view(self.view, None);
            device.destroy_image(self.image, None);
            device.free_memory(self.memory, None);
        }
    }
}

fn full_range(aspect: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: aspect,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// Records into a fresh primary buffer from `pool`, submits on the single
/// queue and blocks until the queue is idle.
pub struct VkTransfer<'a> {
    pub gpu: &'a Gpu,
    pub pool: vk::CommandPool,
}

impl VkTransfer<'_> {
    unsafe fn record(
        &self,
        cmd: vk::CommandBuffer,
        commands: &[TransferCommand<VkBuffer, VkImage>],
    ) -> Result<()> {
        let d = &self.gpu.device;
        let bi = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            ..Default::default()
        };
        unsafe { d.begin_command_buffer(cmd, &bi) }.context("begin_command_buffer")?;

        for command in commands {
            match *command {
                TransferCommand::CopyBuffer { src, dst, size } => {
                    let region = vk::BufferCopy {
                        src_offset: 0,
                        dst_offset: 0,
                        size,
                    };
                    unsafe {
                        d.cmd_copy_buffer(cmd, src.buffer, dst.buffer, std::slice::from_ref(&region))
                    };
                }
                TransferCommand::Barrier { image, from, to } => {
                    let (old, new) = (layout_use(from), layout_use(to));
                    let barrier = vk::ImageMemoryBarrier {
                        s_type: vk::StructureType::IMAGE_MEMORY_BARRIER,
                        src_access_mask: old.access,
                        dst_access_mask: new.access,
                        old_layout: old.layout,
                        new_layout: new.layout,
                        src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                        dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                        image: image.image,
                        subresource_range: full_range(image.aspect),
                        ..Default::default()
                    };
                    unsafe {
                        d.cmd_pipeline_barrier(
                            cmd,
                            old.stage,
                            new.stage,
                            vk::DependencyFlags::empty(),
                            &[],
                            &[],
                            std::slice::from_ref(&barrier),
                        )
                    };
                }
                TransferCommand::CopyBufferToImage { src, dst, extent } => {
                    let region = vk::BufferImageCopy {
                        buffer_offset: 0,
                        buffer_row_length: 0,
                        buffer_image_height: 0,
                        image_subresource: vk::ImageSubresourceLayers {
                            aspect_mask: dst.aspect,
                            mip_level: 0,
                            base_array_layer: 0,
                            layer_count: 1,
                        },
                        image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
                        image_extent: vk::Extent3D {
                            width: extent.width,
                            height: extent.height,
                            depth: 1,
                        },
                    };
                    unsafe {
                        d.cmd_copy_buffer_to_image(
                            cmd,
                            src.buffer,
                            dst.image,
                            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                            std::slice::from_ref(&region),
                        )
                    };
                }
            }
        }

        unsafe { d.end_command_buffer(cmd) }.context("end_command_buffer")?;
        Ok(())
    }
}

impl TransferDevice for VkTransfer<'_> {
    type Buffer = VkBuffer;
    type Image = VkImage;

    fn create_buffer(&mut self, size: u64, usage: BufferUsage, class: MemoryClass) -> Result<VkBuffer> {
        let (buffer, memory) =
            unsafe { self.gpu.create_buffer_and_memory(size, buffer_usage_to_vk(usage), class) }?;
        Ok(VkBuffer {
            buffer,
            memory,
            size,
        })
    }

    fn create_image(
        &mut self,
        extent: Extent2D,
        format: PixelFormat,
        usage: ImageUsage,
    ) -> Result<VkImage> {
        let d = &self.gpu.device;
        let format = pixel_format_to_vk(format);
        let aspect = if usage.contains(ImageUsage::DEPTH_ATTACHMENT) {
            vk::ImageAspectFlags::DEPTH
        } else {
            vk::ImageAspectFlags::COLOR
        };

        let img_ci = vk::ImageCreateInfo {
            s_type: vk::StructureType::IMAGE_CREATE_INFO,
            image_type: vk::ImageType::TYPE_2D,
            format,
            extent: vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            },
            mip_levels: 1,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: image_usage_to_vk(usage),
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            ..Default::default()
        };
        let image = unsafe { d.create_image(&img_ci, None) }.context("create_image")?;
        let mut out = VkImage {
            image,
            memory: vk::DeviceMemory::null(),
            view: vk::ImageView::null(),
            aspect,
        };

        let res = (|| -> Result<()> {
            let req = unsafe { d.get_image_memory_requirements(image) };
            out.memory = unsafe { self.gpu.allocate(req, MemoryClass::Optimized) }?;
            unsafe { d.bind_image_memory(image, out.memory, 0) }.context("bind_image_memory")?;
            let view_ci = vk::ImageViewCreateInfo {
                s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
                image,
                view_type: vk::ImageViewType::TYPE_2D,
                format,
                subresource_range: full_range(aspect),
                ..Default::default()
            };
            out.view = unsafe { d.create_image_view(&view_ci, None) }.context("create_image_view")?;
            Ok(())
        })();
        match res {
            Ok(()) => Ok(out),
            Err(e) => {
                unsafe { out.destroy(d) };
                Err(e)
            }
        }
    }

    fn write_mapped(&mut self, buffer: VkBuffer, bytes: &[u8]) -> Result<()> {
        if bytes.len() as u64 > buffer.size {
            return Err(LumenError::Upload(format!(
                "{} bytes do not fit a {}-byte buffer",
                bytes.len(),
                buffer.size
            ))
            .into());
        }
        let d = &self.gpu.device;
        unsafe {
            let ptr = d
                .map_memory(buffer.memory, 0, bytes.len() as u64, vk::MemoryMapFlags::empty())
                .context("map_memory")?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr as *mut u8, bytes.len());
            d.unmap_memory(buffer.memory);
        }
        Ok(())
    }

    fn read_mapped(&mut self, buffer: VkBuffer, len: usize) -> Result<Vec<u8>> {
        let len = len.min(buffer.size as usize);
        let d = &self.gpu.device;
        let mut out = vec![0u8; len];
        unsafe {
            let ptr = d
                .map_memory(buffer.memory, 0, len as u64, vk::MemoryMapFlags::empty())
                .context("map_memory")?;
            std::ptr::copy_nonoverlapping(ptr as *const u8, out.as_mut_ptr(), len);
            d.unmap_memory(buffer.memory);
        }
        Ok(out)
    }

    fn submit_and_wait(&mut self, commands: &[TransferCommand<VkBuffer, VkImage>]) -> Result<()> {
        let d = &self.gpu.device;
        let ai = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: self.pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: 1,
            ..Default::default()
        };
        let cmd = unsafe { d.allocate_command_buffers(&ai) }
            .context("allocate_command_buffers(one-shot)")?[0];

        let res = unsafe { self.record(cmd, commands) }.and_then(|()| {
            let si = vk::SubmitInfo {
                s_type: vk::StructureType::SUBMIT_INFO,
                command_buffer_count: 1,
                p_command_buffers: &cmd,
                ..Default::default()
            };
            unsafe {
                d.queue_submit(self.gpu.queue, std::slice::from_ref(&si), vk::Fence::null())
                    .context("queue_submit(one-shot)")?;
                d.queue_wait_idle(self.gpu.queue).context("queue_wait_idle")?;
            }
            Ok(())
        });

        unsafe { d.free_command_buffers(self.pool, std::slice::from_ref(&cmd)) };
        res
    }

    fn destroy_buffer(&mut self, buffer: VkBuffer) {
        unsafe { buffer.destroy(&self.gpu.device) };
    }

    fn destroy_image(&mut self, image: VkImage) {
        unsafe { image.destroy(&self.gpu.device) };
    }
}
