// SPDX-License-Identifier: CEPL-1.0
//! Presentation chain plus the per-image attachments that die with it:
//! color views, depth images and framebuffers.

use crate::convert::{present_mode_to_vk, surface_format_to_vk};
use crate::transfer::{VkImage, VkTransfer};
use anyhow::{Context, Result};
use ash::khr::{surface, swapchain};
use ash::vk;
use lumen_core::{CapabilityError, LumenError};
use lumen_render::{
    Extent2D, ImageLayout, ImageUsage, PixelFormat, PresentMode, SurfaceFormat, TransferCommand,
    TransferDevice,
};
use tracing::{debug, info};

/// Triple buffering.
pub const IMAGE_COUNT: u32 = 3;

/// `max == 0` means the surface has no upper bound.
pub fn choose_image_count(min: u32, max: u32) -> Result<u32, CapabilityError> {
    if max != 0 && max < IMAGE_COUNT {
        return Err(CapabilityError::ImageCount {
            requested: IMAGE_COUNT,
            min,
            max,
        });
    }
    Ok(IMAGE_COUNT.max(min))
}

/// The platform's current extent is authoritative; the window size is only
/// a hint for surfaces that leave it to us.
pub fn extent_from_caps(caps: &vk::SurfaceCapabilitiesKHR, want: Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// Current extent of the surface without building anything. Zero while the
/// window is minimized.
pub unsafe fn surface_extent(
    surface_loader: &surface::Instance,
    phys: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    want: Extent2D,
) -> Result<Extent2D> {
    let caps = unsafe { surface_loader.get_physical_device_surface_capabilities(phys, surface) }
        .context("get_physical_device_surface_capabilities")?;
    let e = extent_from_caps(&caps, want);
    Ok(Extent2D::new(e.width, e.height))
}

#[derive(Default)]
pub struct SwapchainState {
    pub handle: vk::SwapchainKHR,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub images: Vec<vk::Image>,
    pub views: Vec<vk::ImageView>,
    pub depth: Vec<VkImage>,
    pub framebuffers: Vec<vk::Framebuffer>,
}

pub struct SwapchainParams {
    pub surface: vk::SurfaceKHR,
    pub format: SurfaceFormat,
    pub present_mode: PresentMode,
    pub want: Extent2D,
    pub render_pass: vk::RenderPass,
}

impl SwapchainState {
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Creates the chain, retiring `old` if non-null, then builds views,
    /// depth and framebuffers. On failure whatever was built is left in
    /// `self` for `destroy`.
    pub unsafe fn create(
        &mut self,
        surface_loader: &surface::Instance,
        swapchain_loader: &swapchain::Device,
        xfer: &mut VkTransfer<'_>,
        params: &SwapchainParams,
        old: vk::SwapchainKHR,
    ) -> Result<()> {
        let phys = xfer.gpu.phys;
        let caps = unsafe {
            surface_loader.get_physical_device_surface_capabilities(phys, params.surface)
        }
        .context("get_physical_device_surface_capabilities")?;

        let count = choose_image_count(caps.min_image_count, caps.max_image_count)?;
        let extent = extent_from_caps(&caps, params.want);
        let sf = surface_format_to_vk(params.format);

        let swap_info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: params.surface,
            min_image_count: count,
            image_format: sf.format,
            image_color_space: sf.color_space,
            image_extent: extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: vk::SharingMode::EXCLUSIVE,
            pre_transform: caps.current_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode: present_mode_to_vk(params.present_mode),
            clipped: vk::TRUE,
            old_swapchain: old,
            ..Default::default()
        };
        self.handle = unsafe { swapchain_loader.create_swapchain(&swap_info, None) }
            .map_err(|e| LumenError::platform("create_swapchain", format!("{e:?}")))?;
        self.format = sf.format;
        self.extent = extent;
        self.images = unsafe { swapchain_loader.get_swapchain_images(self.handle) }
            .context("get_swapchain_images")?;

        unsafe { self.create_attachments(xfer, params.render_pass) }?;
        info!(
            "vk: swap chain {}x{}, {} images, {:?}",
            extent.width,
            extent.height,
            self.images.len(),
            params.present_mode
        );
        Ok(())
    }

    unsafe fn create_attachments(
        &mut self,
        xfer: &mut VkTransfer<'_>,
        render_pass: vk::RenderPass,
    ) -> Result<()> {
        let gpu = xfer.gpu;
        let d = &gpu.device;
        let sub = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };
        for &img in &self.images {
            let iv_info = vk::ImageViewCreateInfo {
                s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
                image: img,
                view_type: vk::ImageViewType::TYPE_2D,
                format: self.format,
                subresource_range: sub,
                ..Default::default()
            };
            let view = unsafe { d.create_image_view(&iv_info, None) }
                .context("create_image_view(swapchain)")?;
            self.views.push(view);
        }

        let extent = Extent2D::new(self.extent.width, self.extent.height);
        for _ in &self.images {
            let depth = xfer.create_image(extent, PixelFormat::D32Float, ImageUsage::DEPTH_ATTACHMENT)?;
            self.depth.push(depth);
        }
        let barriers: Vec<_> = self
            .depth
            .iter()
            .map(|&image| TransferCommand::Barrier {
                image,
                from: ImageLayout::Undefined,
                to: ImageLayout::DepthAttachment,
            })
            .collect();
        xfer.submit_and_wait(&barriers)
            .context("depth layout transition")?;

        for (view, depth) in self.views.iter().zip(&self.depth) {
            let attachments = [*view, depth.view];
            let fb_info = vk::FramebufferCreateInfo {
                s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
                render_pass,
                attachment_count: attachments.len() as u32,
                p_attachments: attachments.as_ptr(),
                width: self.extent.width,
                height: self.extent.height,
                layers: 1,
                ..Default::default()
            };
            let fb = unsafe { d.create_framebuffer(&fb_info, None) }
                .context("create_framebuffer")?;
            self.framebuffers.push(fb);
        }
        debug!("vk: {} framebuffers with depth", self.framebuffers.len());
        Ok(())
    }

    /// Framebuffers, depth and views. The chain itself survives so it can be
    /// handed to the next create as `old`.
    pub unsafe fn destroy_attachments(&mut self, device: &ash::Device) {
        unsafe {
            for fb in self.framebuffers.drain(..) {
                device.destroy_framebuffer(fb, None);
            }
            for depth in self.depth.drain(..) {
                depth.destroy(device);
            }
            for iv in self.views.drain(..) {
                device.destroy_image_view(iv, None);
            }
        }
        self.images.clear();
    }

    pub unsafe fn destroy(&mut self, device: &ash::Device, swapchain_loader: &swapchain::Device) {
        unsafe {
            self.destroy_attachments(device);
            swapchain_loader.destroy_swapchain(self.handle, None);
        }
        self.handle = vk::SwapchainKHR::null();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(current: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 2048,
            },
            ..Default::default()
        }
    }

    #[test]
    fn image_count_is_three_unless_the_surface_forbids_it() {
        assert_eq!(choose_image_count(2, 8), Ok(3));
        assert_eq!(choose_image_count(2, 0), Ok(3));
        assert_eq!(choose_image_count(4, 0), Ok(4));
        assert_eq!(
            choose_image_count(1, 2),
            Err(CapabilityError::ImageCount {
                requested: 3,
                min: 1,
                max: 2
            })
        );
    }

    #[test]
    fn current_extent_wins_over_the_request() {
        let e = extent_from_caps(&caps((800, 600)), Extent2D::new(1024, 768));
        assert_eq!((e.width, e.height), (800, 600));
    }

    #[test]
    fn undefined_extent_clamps_the_request() {
        let e = extent_from_caps(&caps((u32::MAX, u32::MAX)), Extent2D::new(8000, 768));
        assert_eq!((e.width, e.height), (4096, 768));
    }
}
