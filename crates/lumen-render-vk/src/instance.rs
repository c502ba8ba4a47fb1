// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use ash::ext::debug_utils as ext_debug;
use ash::{vk, Entry, Instance};
use lumen_core::ValidationReport;
use raw_window_handle::RawDisplayHandle;
use std::ffi::{c_void, CStr};
use std::sync::Mutex;
use tracing::{debug, info, warn};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// First error-severity report since the last `take`.
type ReportSlot = Mutex<Option<ValidationReport>>;

/// Debug-utils messenger plus the slot its callback writes into. The slot
/// is boxed so the pointer handed to the driver stays put.
pub struct Validation {
    loader: ext_debug::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
    slot: Box<ReportSlot>,
}

impl Validation {
    pub fn take(&self) -> Option<ValidationReport> {
        self.slot.lock().ok().and_then(|mut s| s.take())
    }

    /// # Safety
    /// Must run before the owning instance is destroyed.
    pub unsafe fn destroy(&mut self) {
        unsafe {
            self.loader
                .destroy_debug_utils_messenger(self.messenger, None)
        };
        self.messenger = vk::DebugUtilsMessengerEXT::null();
    }
}

unsafe fn c_str_or_empty<'a>(p: *const std::ffi::c_char) -> std::borrow::Cow<'a, str> {
    if p.is_null() {
        return "".into();
    }
    unsafe { CStr::from_ptr(p) }.to_string_lossy()
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() {
        return vk::FALSE;
    }
    let data = unsafe { &*data };
    let message = unsafe { c_str_or_empty(data.p_message) };

    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        let (object_type, handle) = if data.object_count > 0 && !data.p_objects.is_null() {
            let obj = unsafe { &*data.p_objects };
            (format!("{:?}", obj.object_type), obj.object_handle)
        } else {
            ("UNKNOWN".to_string(), 0)
        };
        let report = ValidationReport {
            object_type,
            handle,
            message_id: unsafe { c_str_or_empty(data.p_message_id_name) }.into_owned(),
            message: message.into_owned(),
        };

        let slot = user as *const ReportSlot;
        if slot.is_null() {
            warn!("[vulkan] {report}");
            return vk::FALSE;
        }
        if let Ok(mut pending) = unsafe { &*slot }.lock() {
            match pending.as_ref() {
                Some(_) => warn!("[vulkan] further error: {report}"),
                None => *pending = Some(report),
            }
        }
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!("[vulkan] {message}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        debug!("[vulkan] {message}");
    }
    vk::FALSE
}

unsafe fn has_layer(entry: &Entry, name: &CStr) -> bool {
    unsafe { entry.enumerate_instance_layer_properties() }
        .unwrap_or_default()
        .iter()
        .any(|l| unsafe { CStr::from_ptr(l.layer_name.as_ptr()) } == name)
}

/// Creates a 1.1 instance with the window-system extensions for `display`.
/// With `validation`, the Khronos layer and debug-utils are enabled when
/// the loader offers them.
pub unsafe fn create_instance(
    entry: &Entry,
    display: RawDisplayHandle,
    validation: bool,
) -> Result<(Instance, Option<Validation>)> {
    let app = c"lumen";
    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: app.as_ptr(),
        application_version: 0,
        p_engine_name: app.as_ptr(),
        engine_version: 0,
        api_version: vk::API_VERSION_1_1,
        ..Default::default()
    };

    let required = ash_window::enumerate_required_extensions(display)
        .context("enumerate_required_extensions")?;
    let mut exts = required.to_vec();

    let validation = validation && unsafe { has_layer(entry, VALIDATION_LAYER) };
    let mut layers: Vec<*const std::ffi::c_char> = Vec::new();
    if validation {
        exts.push(ext_debug::NAME.as_ptr());
        layers.push(VALIDATION_LAYER.as_ptr());
    }

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: exts.len() as u32,
        pp_enabled_extension_names: exts.as_ptr(),
        enabled_layer_count: layers.len() as u32,
        pp_enabled_layer_names: layers.as_ptr(),
        ..Default::default()
    };
    let instance =
        unsafe { entry.create_instance(&create_info, None) }.context("create_instance")?;
    info!("vk: instance created (api 1.1, validation={validation})");

    if !validation {
        return Ok((instance, None));
    }

    let slot: Box<ReportSlot> = Box::new(Mutex::new(None));
    let loader = ext_debug::Instance::new(entry, &instance);
    let ci = vk::DebugUtilsMessengerCreateInfoEXT {
        s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
        message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::INFO
            | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        pfn_user_callback: Some(debug_callback),
        p_user_data: &*slot as *const ReportSlot as *mut c_void,
        ..Default::default()
    };
    match unsafe { loader.create_debug_utils_messenger(&ci, None) } {
        Ok(messenger) => Ok((
            instance,
            Some(Validation {
                loader,
                messenger,
                slot,
            }),
        )),
        Err(e) => {
            unsafe { instance.destroy_instance(None) };
            Err(e).context("create_debug_utils_messenger")
        }
    }
}
