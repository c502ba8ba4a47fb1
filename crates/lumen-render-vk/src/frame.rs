// SPDX-License-Identifier: CEPL-1.0
//! Per-slot GPU objects and the `FrameDevice` that drives them.

use crate::convert::index_type_to_vk;
use crate::device::Gpu;
use crate::pipeline::PipelineState;
use crate::swapchain::SwapchainState;
use crate::transfer::VkBuffer;
use anyhow::{Context, Result};
use ash::khr::swapchain;
use ash::vk;
use lumen_core::LumenError;
use lumen_render::frame::PER_DRAW_UNIFORM_BYTES;
use lumen_render::{Acquire, DrawCall, FrameDevice, Geometry, MemoryClass, PresentStatus};
use tracing::debug;

/// Everything one in-flight frame needs, indexed by slot, plus the
/// per-image present semaphores.
#[derive(Default)]
pub struct FrameSlots {
    pub cmd_bufs: Vec<vk::CommandBuffer>,
    /// Created signaled so the first wait on each slot returns at once.
    pub fences: Vec<vk::Fence>,
    /// Signaled by acquire, waited by the slot's submit.
    pub image_available: Vec<vk::Semaphore>,
    /// Per swap-chain image: signaled by submit, waited by present.
    pub render_finished: Vec<vk::Semaphore>,
    pub acquire_fence: vk::Fence,
    pub uniforms: Vec<VkBuffer>,
    mapped: Vec<*mut u8>,
    pub uniform_bytes: u64,
    pub desc_pool: vk::DescriptorPool,
    pub sets: Vec<vk::DescriptorSet>,
    /// Slot most recently waited on; acquire signals its semaphore.
    current: usize,
}

unsafe fn semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let ci = vk::SemaphoreCreateInfo {
        s_type: vk::StructureType::SEMAPHORE_CREATE_INFO,
        ..Default::default()
    };
    Ok(unsafe { device.create_semaphore(&ci, None) }.context("create_semaphore")?)
}

unsafe fn fence(device: &ash::Device, signaled: bool) -> Result<vk::Fence> {
    let ci = vk::FenceCreateInfo {
        s_type: vk::StructureType::FENCE_CREATE_INFO,
        flags: if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        },
        ..Default::default()
    };
    Ok(unsafe { device.create_fence(&ci, None) }.context("create_fence")?)
}

impl FrameSlots {
    /// Fills slots one object at a time. On error the partially built state
    /// stays in `self` and `destroy` releases it.
    pub unsafe fn create(
        &mut self,
        gpu: &Gpu,
        pool: vk::CommandPool,
        draw_layout: vk::DescriptorSetLayout,
        count: usize,
        uniform_bytes: u64,
    ) -> Result<()> {
        let d = &gpu.device;
        let n = count as u32;

        let ai = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: n,
            ..Default::default()
        };
        self.cmd_bufs = unsafe { d.allocate_command_buffers(&ai) }.context("allocate_command_buffers")?;

        unsafe {
            for _ in 0..count {
                self.fences.push(fence(d, true)?);
                self.image_available.push(semaphore(d)?);
                self.render_finished.push(semaphore(d)?);
            }
            self.acquire_fence = fence(d, false)?;
        }

        self.uniform_bytes = uniform_bytes;
        for _ in 0..count {
            let (buffer, memory) = unsafe {
                gpu.create_buffer_and_memory(
                    uniform_bytes,
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                    MemoryClass::Uniform,
                )
            }?;
            self.uniforms.push(VkBuffer {
                buffer,
                memory,
                size: uniform_bytes,
            });
            // stays mapped until destroy
            let ptr = unsafe { d.map_memory(memory, 0, uniform_bytes, vk::MemoryMapFlags::empty()) }
                .context("map_memory(uniform)")?;
            self.mapped.push(ptr as *mut u8);
        }

        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            descriptor_count: n,
        }];
        let pool_ci = vk::DescriptorPoolCreateInfo {
            s_type: vk::StructureType::DESCRIPTOR_POOL_CREATE_INFO,
            max_sets: n,
            pool_size_count: pool_sizes.len() as u32,
            p_pool_sizes: pool_sizes.as_ptr(),
            ..Default::default()
        };
        self.desc_pool = unsafe { d.create_descriptor_pool(&pool_ci, None) }
            .context("create_descriptor_pool(uniforms)")?;

        let layouts = vec![draw_layout; count];
        let alloc = vk::DescriptorSetAllocateInfo {
            s_type: vk::StructureType::DESCRIPTOR_SET_ALLOCATE_INFO,
            descriptor_pool: self.desc_pool,
            descriptor_set_count: n,
            p_set_layouts: layouts.as_ptr(),
            ..Default::default()
        };
        self.sets = unsafe { d.allocate_descriptor_sets(&alloc) }
            .context("allocate_descriptor_sets(uniforms)")?;

        let infos: Vec<vk::DescriptorBufferInfo> = self
            .uniforms
            .iter()
            .map(|u| vk::DescriptorBufferInfo {
                buffer: u.buffer,
                offset: 0,
                range: PER_DRAW_UNIFORM_BYTES,
            })
            .collect();
        let writes: Vec<vk::WriteDescriptorSet> = self
            .sets
            .iter()
            .zip(&infos)
            .map(|(&set, info)| vk::WriteDescriptorSet {
                s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
                dst_set: set,
                dst_binding: 0,
                descriptor_count: 1,
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
                p_buffer_info: info,
                ..Default::default()
            })
            .collect();
        unsafe { d.update_descriptor_sets(&writes, &[]) };

        debug!("vk: {count} frame slots, {uniform_bytes}-byte uniform arena each");
        Ok(())
    }

    /// A present that reported out-of-date may leave its wait unconsumed,
    /// so the present semaphores are replaced on every swap-chain rebuild.
    /// Requires an idle device.
    pub unsafe fn renew_present_semaphores(&mut self, device: &ash::Device) -> Result<()> {
        unsafe {
            for s in self.render_finished.drain(..) {
                device.destroy_semaphore(s, None);
            }
            for _ in 0..self.fences.len() {
                self.render_finished.push(semaphore(device)?);
            }
        }
        Ok(())
    }

    pub fn slot_count(&self) -> usize {
        self.fences.len()
    }

    /// Blocks until the listed slots' submissions finished. Only slots with
    /// work in flight may be listed; a reset fence with nothing submitted
    /// never signals.
    pub unsafe fn wait_slots(&self, device: &ash::Device, slots: &[usize]) {
        let fences: Vec<vk::Fence> = slots
            .iter()
            .filter_map(|&i| self.fences.get(i).copied())
            .collect();
        if !fences.is_empty() {
            let _ = unsafe { device.wait_for_fences(&fences, true, u64::MAX) };
        }
    }

    pub unsafe fn destroy(&mut self, device: &ash::Device, pool: vk::CommandPool) {
        unsafe {
            if !self.cmd_bufs.is_empty() {
                device.free_command_buffers(pool, &self.cmd_bufs);
            }
            for f in self.fences.drain(..) {
                device.destroy_fence(f, None);
            }
            for s in self.image_available.drain(..).chain(self.render_finished.drain(..)) {
                device.destroy_semaphore(s, None);
            }
            device.destroy_fence(self.acquire_fence, None);
            // the last buffer may have failed to map
            for (i, u) in self.uniforms.drain(..).enumerate() {
                if i < self.mapped.len() {
                    device.unmap_memory(u.memory);
                }
                u.destroy(device);
            }
            device.destroy_descriptor_pool(self.desc_pool, None);
        }
        *self = FrameSlots::default();
    }
}

/// One tick's view of the renderer. Built fresh each tick so it can borrow
/// the long-lived state it records against.
pub struct VkFrameDevice<'a> {
    pub gpu: &'a Gpu,
    pub swapchain_loader: &'a swapchain::Device,
    pub swapchain: &'a SwapchainState,
    pub pipeline: &'a PipelineState,
    pub slots: &'a mut FrameSlots,
    pub clear: [f32; 4],
    /// Bound for draws without a material.
    pub fallback_material: vk::DescriptorSet,
}

impl FrameDevice for VkFrameDevice<'_> {
    type Buffer = VkBuffer;
    type Material = vk::DescriptorSet;

    fn slot_count(&self) -> usize {
        self.slots.slot_count()
    }

    fn wait_slot(&mut self, slot: usize) -> Result<()> {
        let f = self.slots.fences[slot];
        unsafe { self.gpu.device.wait_for_fences(&[f], true, u64::MAX) }
            .context("wait_for_fences(slot)")?;
        self.slots.current = slot;
        Ok(())
    }

    fn acquire(&mut self) -> Result<Acquire> {
        let d = &self.gpu.device;
        let semaphore = self.slots.image_available[self.slots.current];
        let fence = self.slots.acquire_fence;
        let res = unsafe {
            self.swapchain_loader
                .acquire_next_image(self.swapchain.handle, u64::MAX, semaphore, fence)
        };
        match res {
            Ok((image, suboptimal)) => {
                unsafe {
                    d.wait_for_fences(&[fence], true, u64::MAX)
                        .context("wait_for_fences(acquire)")?;
                    d.reset_fences(&[fence]).context("reset_fences(acquire)")?;
                }
                Ok(Acquire::Ready { image, suboptimal })
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquire::OutOfDate),
            Err(e) => Err(e).context("acquire_next_image"),
        }
    }

    fn reset_slot(&mut self, slot: usize) -> Result<()> {
        let d = &self.gpu.device;
        unsafe {
            d.reset_fences(&[self.slots.fences[slot]]).context("reset_fences")?;
            d.reset_command_buffer(self.slots.cmd_bufs[slot], vk::CommandBufferResetFlags::empty())
                .context("reset_command_buffer")?;
        }
        Ok(())
    }

    /// No host-side signal exists for fences, so the reset one is replaced
    /// by a fresh signaled fence.
    fn abandon_slot(&mut self, slot: usize) -> Result<()> {
        let d = &self.gpu.device;
        unsafe {
            d.reset_command_buffer(self.slots.cmd_bufs[slot], vk::CommandBufferResetFlags::empty())
                .context("reset_command_buffer(abandon)")?;
            let replacement = fence(d, true)?;
            d.destroy_fence(std::mem::replace(&mut self.slots.fences[slot], replacement), None);
        }
        debug!("vk: frame slot {slot} abandoned");
        Ok(())
    }

    fn begin_commands(&mut self, slot: usize) -> Result<()> {
        let bi = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            ..Default::default()
        };
        unsafe { self.gpu.device.begin_command_buffer(self.slots.cmd_bufs[slot], &bi) }
            .context("begin_command_buffer")?;
        Ok(())
    }

    fn begin_pass(&mut self, slot: usize, image: u32) {
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];
        let rp_begin = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass: self.pipeline.render_pass,
            framebuffer: self.swapchain.framebuffers[image as usize],
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.swapchain.extent,
            },
            clear_value_count: clear_values.len() as u32,
            p_clear_values: clear_values.as_ptr(),
            ..Default::default()
        };
        unsafe {
            self.gpu.device.cmd_begin_render_pass(
                self.slots.cmd_bufs[slot],
                &rp_begin,
                vk::SubpassContents::INLINE,
            )
        };
    }

    fn bind_pipeline(&mut self, slot: usize) {
        let d = &self.gpu.device;
        let cmd = self.slots.cmd_bufs[slot];
        let extent = self.swapchain.extent;
        // negative height flips y so +Y is up in clip space
        let viewport = vk::Viewport {
            x: 0.0,
            y: extent.height as f32,
            width: extent.width as f32,
            height: -(extent.height as f32),
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        unsafe {
            d.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline.pipeline);
            d.cmd_set_viewport(cmd, 0, &[viewport]);
            d.cmd_set_scissor(cmd, 0, &[scissor]);
        }
    }

    fn bind_geometry(&mut self, slot: usize, geometry: &Geometry<VkBuffer>) {
        let d = &self.gpu.device;
        let cmd = self.slots.cmd_bufs[slot];
        unsafe {
            d.cmd_bind_vertex_buffers(cmd, 0, &[geometry.vertex.buffer], &[0]);
            d.cmd_bind_index_buffer(cmd, geometry.index.buffer, 0, index_type_to_vk(geometry.index_type));
        }
    }

    fn write_uniform(&mut self, slot: usize, offset: u32, bytes: &[u8]) -> Result<()> {
        let end = offset as u64 + bytes.len() as u64;
        if end > self.slots.uniform_bytes {
            return Err(LumenError::Upload(format!(
                "uniform write [{offset}, {end}) exceeds the {}-byte arena",
                self.slots.uniform_bytes
            ))
            .into());
        }
        let base = self.slots.mapped[slot];
        // coherent memory: no flush needed
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), base.add(offset as usize), bytes.len())
        };
        Ok(())
    }

    fn bind_sets(&mut self, slot: usize, dynamic_offset: u32, material: Option<vk::DescriptorSet>) {
        let sets = [
            self.slots.sets[slot],
            material.unwrap_or(self.fallback_material),
        ];
        unsafe {
            self.gpu.device.cmd_bind_descriptor_sets(
                self.slots.cmd_bufs[slot],
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline.layout,
                0,
                &sets,
                &[dynamic_offset],
            )
        };
    }

    fn draw_indexed(&mut self, slot: usize, call: DrawCall) {
        unsafe {
            self.gpu.device.cmd_draw_indexed(
                self.slots.cmd_bufs[slot],
                call.index_count,
                call.instance_count,
                call.first_index,
                call.vertex_offset,
                call.first_instance,
            )
        };
    }

    fn end_and_submit(&mut self, slot: usize, image: u32) -> Result<()> {
        let d = &self.gpu.device;
        let cmd = self.slots.cmd_bufs[slot];
        unsafe {
            d.cmd_end_render_pass(cmd);
            d.end_command_buffer(cmd).context("end_command_buffer")?;
        }

        let wait = [self.slots.image_available[slot]];
        let stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal = [self.slots.render_finished[image as usize]];
        let si = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: wait.len() as u32,
            p_wait_semaphores: wait.as_ptr(),
            p_wait_dst_stage_mask: stages.as_ptr(),
            command_buffer_count: 1,
            p_command_buffers: &cmd,
            signal_semaphore_count: signal.len() as u32,
            p_signal_semaphores: signal.as_ptr(),
            ..Default::default()
        };
        unsafe { d.queue_submit(self.gpu.queue, std::slice::from_ref(&si), self.slots.fences[slot]) }
            .context("queue_submit")?;
        Ok(())
    }

    fn present(&mut self, _slot: usize, image: u32) -> Result<PresentStatus> {
        let wait = [self.slots.render_finished[image as usize]];
        let present = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: wait.len() as u32,
            p_wait_semaphores: wait.as_ptr(),
            swapchain_count: 1,
            p_swapchains: &self.swapchain.handle,
            p_image_indices: &image,
            ..Default::default()
        };
        match unsafe { self.swapchain_loader.queue_present(self.gpu.queue, &present) } {
            Ok(false) => Ok(PresentStatus::Optimal),
            Ok(true) => Ok(PresentStatus::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentStatus::OutOfDate),
            Err(e) => Err(e).context("queue_present"),
        }
    }
}
