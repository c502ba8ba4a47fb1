// SPDX-License-Identifier: CEPL-1.0
pub mod convert;
pub mod device;
pub mod frame;
pub mod instance;
pub mod pipeline;
pub mod probe;
pub mod swapchain;
pub mod transfer;

use anyhow::{Context, Result};
use tracing::{debug, info};

use lumen_core::LumenError;
use lumen_render::frame::PER_DRAW_UNIFORM_BYTES;
use lumen_render::scene::{Camera, Perspective, SceneData};
use lumen_render::{
    check_arena, select_adapter, DrawRecord, Extent2D, FramePipeline, PresentMode, RenderOptions, RenderSize,
    Renderer, Requirements, ResidentScene, SurfaceFormat,
};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use ash::khr::{surface, swapchain as khr_swapchain};
use ash::{vk, Entry, Instance};

use crate::convert::surface_format_to_vk;
use crate::device::Gpu;
use crate::frame::{FrameSlots, VkFrameDevice};
use crate::instance::{create_instance, Validation};
use crate::pipeline::PipelineState;
use crate::probe::VkProbe;
use crate::swapchain::{surface_extent, SwapchainParams, SwapchainState};
use crate::transfer::{VkBuffer, VkImage, VkTransfer};

/// Where build.rs leaves `simple.vert.spv` and `simple.frag.spv`.
pub const SHADER_DIR: &str = env!("OUT_DIR");

pub struct VkRenderer {
    _entry: Entry,
    instance: Instance,
    validation: Option<Validation>,
    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,

    gpu: Gpu,
    swapchain_loader: khr_swapchain::Device,
    surface_format: SurfaceFormat,
    present_mode: PresentMode,

    cmd_pool: vk::CommandPool,
    pipeline: PipelineState,
    swapchain: SwapchainState,
    slots: FrameSlots,

    scene: ResidentScene<VkBuffer, VkImage>,
    materials: Vec<vk::DescriptorSet>,
    draws: Vec<DrawRecord<VkBuffer, vk::DescriptorSet>>,
    camera: Camera,

    frames: FramePipeline,
    clear: [f32; 4],
    size: RenderSize,
    /// Acquire or present reported a mismatch with the surface.
    stale: bool,
    /// Surface extent is zero (minimized).
    paused: bool,
}

// STRICT TEARDOWN ORDER:
// - Wait the fences of submitted slots, then device_wait_idle()
// - Framebuffers, depth images and views BEFORE the render pass and swapchain
// - Pipeline, layouts, sampler, material pool
// - Free command buffers BEFORE destroying their pool
// - Per-slot fences/semaphores and uniform buffers BEFORE device
// - Destroy swapchain BEFORE device
// - Scene buffers/images BEFORE device
// - Messenger and surface AFTER device; instance last.
// Every handle may still be null after a failed build; destroying null is a no-op.
impl Drop for VkRenderer {
    fn drop(&mut self) {
        unsafe {
            let d = &self.gpu.device;
            let in_flight: Vec<usize> = self.frames.submitted().collect();
            self.slots.wait_slots(d, &in_flight);
            d.device_wait_idle().ok();

            self.swapchain.destroy_attachments(d);
            self.pipeline.destroy(d);
            self.slots.destroy(d, self.cmd_pool);
            d.destroy_command_pool(self.cmd_pool, None);
            self.swapchain.destroy(d, &self.swapchain_loader);

            let mut xfer = VkTransfer {
                gpu: &self.gpu,
                pool: vk::CommandPool::null(),
            };
            self.scene.release(&mut xfer);

            self.gpu.device.destroy_device(None);

            if let Some(v) = self.validation.as_mut() {
                v.destroy();
            }
            self.surface_loader.destroy_surface(self.surface, None);
            self.instance.destroy_instance(None);
        }
    }
}

fn default_camera() -> Camera {
    Camera {
        world: glam::Mat4::from_translation(glam::Vec3::new(0.0, 0.0, 3.0)),
        projection: Perspective::default(),
    }
}

unsafe fn build_renderer(
    window: &dyn HasWindowHandle,
    display: &dyn HasDisplayHandle,
    size: RenderSize,
    options: &RenderOptions,
    scene: &SceneData,
) -> Result<VkRenderer> {
    // STRICT ORDER:
    // 1) Instance (WSI extensions + optional validation)
    // 2) Surface from THIS instance
    // 3) Adapter negotiation AGAINST THIS surface
    // 4) Device from the selected adapter and queue family
    // Past (4) the renderer exists and Drop owns cleanup of partial state.
    let dh = display
        .display_handle()
        .map_err(|e| LumenError::platform("display_handle", e))?
        .as_raw();
    let wh = window
        .window_handle()
        .map_err(|e| LumenError::platform("window_handle", e))?
        .as_raw();

    let entry = Entry::linked();
    let (instance, mut validation) = unsafe { create_instance(&entry, dh, options.validation) }?;
    let surface_loader = surface::Instance::new(&entry, &instance);

    let unwind = |validation: &mut Option<Validation>, surface: vk::SurfaceKHR| unsafe {
        surface_loader.destroy_surface(surface, None);
        if let Some(v) = validation.as_mut() {
            v.destroy();
        }
        instance.destroy_instance(None);
    };

    let surface = match unsafe { ash_window::create_surface(&entry, &instance, dh, wh, None) } {
        Ok(s) => s,
        Err(e) => {
            unwind(&mut validation, vk::SurfaceKHR::null());
            return Err(LumenError::platform("create_surface", e).into());
        }
    };

    let negotiated = (|| -> Result<_> {
        let probe = VkProbe {
            instance: &instance,
            surface_loader: &surface_loader,
            surface,
        };
        let req = Requirements::new([khr_swapchain::NAME.to_string_lossy()]);
        let sel = select_adapter(&probe, &req).map_err(LumenError::from)?;
        let gpu = unsafe { Gpu::new(&instance, sel.adapter, sel.queue_family) }?;
        Ok((sel, gpu))
    })();
    let (sel, gpu) = match negotiated {
        Ok(v) => v,
        Err(e) => {
            unwind(&mut validation, surface);
            return Err(e);
        }
    };

    let swapchain_loader = khr_swapchain::Device::new(&instance, &gpu.device);
    let mut r = VkRenderer {
        _entry: entry,
        instance,
        validation,
        surface_loader,
        surface,
        gpu,
        swapchain_loader,
        surface_format: sel.surface_format,
        present_mode: sel.present_mode,
        cmd_pool: vk::CommandPool::null(),
        pipeline: PipelineState::default(),
        swapchain: SwapchainState::default(),
        slots: FrameSlots::default(),
        scene: ResidentScene::default(),
        materials: Vec::new(),
        draws: Vec::new(),
        camera: default_camera(),
        frames: FramePipeline::new(0, 1, 0),
        clear: options.clear_color,
        size,
        stale: false,
        paused: false,
    };
    unsafe { r.finish_setup(options, scene) }?;
    Ok(r)
}

impl VkRenderer {
    unsafe fn finish_setup(&mut self, options: &RenderOptions, scene: &SceneData) -> Result<()> {
        let d = &self.gpu.device;

        // Command pool: one-shot transfers and per-slot buffers, reset per use
        let pool_ci = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            flags: vk::CommandPoolCreateFlags::TRANSIENT
                | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            queue_family_index: self.gpu.queue_family,
            ..Default::default()
        };
        self.cmd_pool = unsafe { d.create_command_pool(&pool_ci, None) }
            .context("create_command_pool")?;

        let color_format = surface_format_to_vk(self.surface_format).format;
        self.pipeline = unsafe { PipelineState::new(d, color_format, &options.shader_dir) }?;

        let want = Extent2D::new(self.size.width, self.size.height);
        let extent = unsafe { surface_extent(&self.surface_loader, self.gpu.phys, self.surface, want) }?;
        if extent.is_empty() {
            return Err(LumenError::platform("create_swapchain", "surface has a zero extent").into());
        }

        let mut xfer = VkTransfer {
            gpu: &self.gpu,
            pool: self.cmd_pool,
        };
        let params = SwapchainParams {
            surface: self.surface,
            format: self.surface_format,
            present_mode: self.present_mode,
            want,
            render_pass: self.pipeline.render_pass,
        };
        unsafe {
            self.swapchain.create(
                &self.surface_loader,
                &self.swapchain_loader,
                &mut xfer,
                &params,
                vk::SwapchainKHR::null(),
            )
        }?;
        let count = self.swapchain.image_count();

        check_arena(options.uniform_bytes, PER_DRAW_UNIFORM_BYTES, self.gpu.ubo_align)?;
        unsafe {
            self.slots.create(
                &self.gpu,
                self.cmd_pool,
                self.pipeline.draw_layout,
                count,
                options.uniform_bytes,
            )
        }?;

        self.scene.upload(&mut xfer, scene).context("scene upload")?;
        let views: Vec<vk::ImageView> = self.scene.textures.iter().map(|t| t.handle.view).collect();
        self.materials = unsafe { self.pipeline.create_materials(d, &views) }?;
        self.draws = self.scene.draw_records(scene, &self.materials)?;
        self.camera = scene.flatten().1.unwrap_or_else(default_camera);

        self.frames = FramePipeline::new(count, self.gpu.ubo_align, options.uniform_bytes);
        self.frames.check_slot_count(self.swapchain.views.len())?;
        debug!("vk: {} draws, {count} frame slots", self.draws.len());
        Ok(())
    }

    /// Retires the chain and rebuilds chain, views, depth and framebuffers
    /// against the surface's current extent. Nothing else is touched.
    unsafe fn rebuild_swapchain(&mut self) -> Result<()> {
        let want = Extent2D::new(self.size.width, self.size.height);
        let extent = unsafe { surface_extent(&self.surface_loader, self.gpu.phys, self.surface, want) }?;
        if extent.is_empty() {
            debug!("vk: surface extent is zero, rendering paused");
            self.paused = true;
            return Ok(());
        }
        self.paused = false;

        let d = &self.gpu.device;
        unsafe { d.device_wait_idle() }.context("device_wait_idle")?;
        self.frames.mark_all_idle();

        // Recreate order:
        // 1) attachments of the old chain go first
        // 2) new chain retires the old handle
        // 3) old handle destroyed whether or not (2) succeeded
        let mut old = std::mem::take(&mut self.swapchain);
        unsafe { old.destroy_attachments(d) };

        let mut xfer = VkTransfer {
            gpu: &self.gpu,
            pool: self.cmd_pool,
        };
        let params = SwapchainParams {
            surface: self.surface,
            format: self.surface_format,
            present_mode: self.present_mode,
            want,
            render_pass: self.pipeline.render_pass,
        };
        let created = unsafe {
            self.swapchain.create(
                &self.surface_loader,
                &self.swapchain_loader,
                &mut xfer,
                &params,
                old.handle,
            )
        };
        unsafe { old.destroy(d, &self.swapchain_loader) };
        created?;

        unsafe { self.slots.renew_present_semaphores(d) }?;
        self.frames.check_slot_count(self.swapchain.views.len())?;
        self.stale = false;
        Ok(())
    }

    fn check_validation(&self) -> Result<()> {
        match self.validation.as_ref().and_then(Validation::take) {
            Some(report) => Err(LumenError::Validation(report).into()),
            None => Ok(()),
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames.frames()
    }
}

impl Renderer for VkRenderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        options: &RenderOptions,
        scene: &SceneData,
    ) -> Result<Self> {
        let r = unsafe { build_renderer(window, display, size, options, scene) }?;
        info!(
            "Vulkan swapchain ready ({}x{}, fmt 0x{:x}, {} slots)",
            r.swapchain.extent.width,
            r.swapchain.extent.height,
            r.swapchain.format.as_raw(),
            r.frames.slot_count()
        );
        r.check_validation()?;
        Ok(r)
    }

    fn resize(&mut self, size: RenderSize) -> Result<()> {
        self.size = size;
        if size.width == 0 || size.height == 0 {
            self.paused = true;
            return Ok(());
        }
        unsafe { self.rebuild_swapchain() }?;
        self.check_validation()
    }

    fn render(&mut self) -> Result<()> {
        if self.stale || self.paused {
            unsafe { self.rebuild_swapchain() }?;
            if self.paused {
                return Ok(());
            }
        }

        let extent = self.swapchain.extent;
        let aspect = extent.width as f32 / extent.height.max(1) as f32;
        let view_proj = self.camera.view_proj(aspect);
        let fallback_material = self
            .materials
            .last()
            .copied()
            .unwrap_or(vk::DescriptorSet::null());

        let mut dev = VkFrameDevice {
            gpu: &self.gpu,
            swapchain_loader: &self.swapchain_loader,
            swapchain: &self.swapchain,
            pipeline: &self.pipeline,
            slots: &mut self.slots,
            clear: self.clear,
            fallback_material,
        };
        let outcome = self.frames.tick(&mut dev, view_proj, &self.draws)?;
        if outcome.needs_rebuild() {
            debug!("vk: {outcome:?}, rebuilding before the next frame");
            self.stale = true;
        }
        self.check_validation()
    }

    fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear = rgba;
    }
}
