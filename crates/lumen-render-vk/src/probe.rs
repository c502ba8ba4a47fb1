// SPDX-License-Identifier: CEPL-1.0
use crate::convert::{
    device_class_from_vk, present_mode_from_vk, queue_caps_from_vk, surface_format_from_vk,
};
use ash::khr::surface;
use ash::vk;
use lumen_render::{AdapterProbe, DeviceClass, PresentMode, QueueCaps, SurfaceFormat};
use std::ffi::CStr;
use tracing::debug;

/// Live adapter probe against one surface. Any failed query reads as an
/// empty capability set, which simply disqualifies the adapter.
pub struct VkProbe<'a> {
    pub instance: &'a ash::Instance,
    pub surface_loader: &'a surface::Instance,
    pub surface: vk::SurfaceKHR,
}

impl AdapterProbe for VkProbe<'_> {
    type Adapter = vk::PhysicalDevice;

    fn adapters(&self) -> Vec<vk::PhysicalDevice> {
        unsafe { self.instance.enumerate_physical_devices() }.unwrap_or_else(|e| {
            debug!("enumerate_physical_devices: {e:?}");
            Vec::new()
        })
    }

    fn name(&self, phys: vk::PhysicalDevice) -> String {
        let props = unsafe { self.instance.get_physical_device_properties(phys) };
        unsafe { CStr::from_ptr(props.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }

    fn device_class(&self, phys: vk::PhysicalDevice) -> DeviceClass {
        let props = unsafe { self.instance.get_physical_device_properties(phys) };
        device_class_from_vk(props.device_type)
    }

    fn extensions(&self, phys: vk::PhysicalDevice) -> Vec<String> {
        unsafe { self.instance.enumerate_device_extension_properties(phys) }
            .unwrap_or_default()
            .iter()
            .map(|e| {
                unsafe { CStr::from_ptr(e.extension_name.as_ptr()) }
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }

    fn queue_families(&self, phys: vk::PhysicalDevice) -> Vec<QueueCaps> {
        unsafe {
            self.instance
                .get_physical_device_queue_family_properties(phys)
        }
        .iter()
        .map(|q| queue_caps_from_vk(q.queue_flags))
        .collect()
    }

    fn supports_present(&self, phys: vk::PhysicalDevice, family: u32) -> bool {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_support(phys, family, self.surface)
        }
        .unwrap_or(false)
    }

    fn surface_formats(&self, phys: vk::PhysicalDevice) -> Vec<SurfaceFormat> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_formats(phys, self.surface)
        }
        .unwrap_or_default()
        .into_iter()
        .map(surface_format_from_vk)
        .collect()
    }

    fn present_modes(&self, phys: vk::PhysicalDevice) -> Vec<PresentMode> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(phys, self.surface)
        }
        .unwrap_or_default()
        .into_iter()
        .map(present_mode_from_vk)
        .collect()
    }
}
