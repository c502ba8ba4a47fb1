// SPDX-License-Identifier: CEPL-1.0
use crate::convert::memory_props_from_vk;
use anyhow::{Context, Result};
use ash::khr::swapchain;
use ash::vk;
use lumen_render::{find_memory_type, MemoryClass, MemoryProps};
use tracing::info;

/// The logical device, its single queue and what we learned about the
/// adapter while creating it.
pub struct Gpu {
    pub phys: vk::PhysicalDevice,
    pub device: ash::Device,
    pub queue: vk::Queue,
    pub queue_family: u32,
    pub memory_types: Vec<MemoryProps>,
    pub ubo_align: u64,
}

impl Gpu {
    /// One device, one queue from `queue_family`, swapchain extension on.
    pub unsafe fn new(
        instance: &ash::Instance,
        phys: vk::PhysicalDevice,
        queue_family: u32,
    ) -> Result<Self> {
        let priorities = [1.0_f32];
        let qinfo = vk::DeviceQueueCreateInfo {
            s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
            queue_family_index: queue_family,
            queue_count: 1,
            p_queue_priorities: priorities.as_ptr(),
            ..Default::default()
        };
        let device_exts = [swapchain::NAME.as_ptr()];
        let dinfo = vk::DeviceCreateInfo {
            s_type: vk::StructureType::DEVICE_CREATE_INFO,
            queue_create_info_count: 1,
            p_queue_create_infos: &qinfo,
            enabled_extension_count: device_exts.len() as u32,
            pp_enabled_extension_names: device_exts.as_ptr(),
            ..Default::default()
        };
        let device = unsafe { instance.create_device(phys, &dinfo, None) }
            .context("create_device")?;
        let queue = unsafe { device.get_device_queue(queue_family, 0) };

        let mem = unsafe { instance.get_physical_device_memory_properties(phys) };
        let memory_types = mem.memory_types[..mem.memory_type_count as usize]
            .iter()
            .map(|t| memory_props_from_vk(t.property_flags))
            .collect();
        let limits = unsafe { instance.get_physical_device_properties(phys) }.limits;
        let ubo_align = limits.min_uniform_buffer_offset_alignment.max(1);

        info!("vk: device created, queue family {queue_family}, ubo align {ubo_align}");
        Ok(Self {
            phys,
            device,
            queue,
            queue_family,
            memory_types,
            ubo_align,
        })
    }

    pub fn memory_type(&self, allowed_bits: u32, class: MemoryClass) -> Result<u32> {
        Ok(find_memory_type(&self.memory_types, allowed_bits, class.props())?)
    }

    pub unsafe fn allocate(
        &self,
        req: vk::MemoryRequirements,
        class: MemoryClass,
    ) -> Result<vk::DeviceMemory> {
        let mai = vk::MemoryAllocateInfo {
            s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
            allocation_size: req.size,
            memory_type_index: self.memory_type(req.memory_type_bits, class)?,
            ..Default::default()
        };
        Ok(unsafe { self.device.allocate_memory(&mai, None) }.context("allocate_memory")?)
    }

    pub unsafe fn create_buffer_and_memory(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        class: MemoryClass,
    ) -> Result<(vk::Buffer, vk::DeviceMemory)> {
        let d = &self.device;
        let bci = vk::BufferCreateInfo {
            s_type: vk::StructureType::BUFFER_CREATE_INFO,
            size,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        let buf = unsafe { d.create_buffer(&bci, None) }.context("create_buffer")?;
        let req = unsafe { d.get_buffer_memory_requirements(buf) };
        let mem = match unsafe { self.allocate(req, class) } {
            Ok(m) => m,
            Err(e) => {
                unsafe { d.destroy_buffer(buf, None) };
                return Err(e);
            }
        };
        if let Err(e) = unsafe { d.bind_buffer_memory(buf, mem, 0) } {
            unsafe {
                d.destroy_buffer(buf, None);
                d.free_memory(mem, None);
            }
            return Err(e).context("bind_buffer_memory");
        }
        Ok((buf, mem))
    }
}
