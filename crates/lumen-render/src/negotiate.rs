// SPDX-License-Identifier: CEPL-1.0
//! Capability negotiation: pick exactly one adapter that meets every hard
//! requirement, preferring a discrete GPU.

use crate::types::{DeviceClass, PixelFormat, PresentMode, QueueCaps, SurfaceFormat};
use lumen_core::CapabilityError;
use tracing::{debug, info};

/// Read-only view of the adapters a backend can see, queried against one
/// target surface.
pub trait AdapterProbe {
    type Adapter: Copy;

    fn adapters(&self) -> Vec<Self::Adapter>;
    fn name(&self, adapter: Self::Adapter) -> String;
    fn device_class(&self, adapter: Self::Adapter) -> DeviceClass;
    fn extensions(&self, adapter: Self::Adapter) -> Vec<String>;
    fn queue_families(&self, adapter: Self::Adapter) -> Vec<QueueCaps>;
    fn supports_present(&self, adapter: Self::Adapter, family: u32) -> bool;
    fn surface_formats(&self, adapter: Self::Adapter) -> Vec<SurfaceFormat>;
    fn present_modes(&self, adapter: Self::Adapter) -> Vec<PresentMode>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatRequirement {
    Any,
    Exact(SurfaceFormat),
}

#[derive(Clone, Debug)]
pub struct Requirements {
    pub extensions: Vec<String>,
    pub queue_caps: QueueCaps,
    pub surface_format: FormatRequirement,
    pub present_mode: PresentMode,
}

impl Requirements {
    /// The fixed policy: graphics+compute+present, BGRA8 sRGB, mailbox.
    pub fn new(extensions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            extensions: extensions.into_iter().map(Into::into).collect(),
            queue_caps: QueueCaps::GRAPHICS | QueueCaps::COMPUTE,
            surface_format: FormatRequirement::Exact(SurfaceFormat::BGRA8_SRGB_NONLINEAR),
            present_mode: PresentMode::Mailbox,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection<A> {
    pub adapter: A,
    pub name: String,
    pub class: DeviceClass,
    pub queue_family: u32,
    pub surface_format: SurfaceFormat,
    pub present_mode: PresentMode,
}

/// Checks in evaluation order. An adapter rejected later got further.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Unmet {
    Extensions(Vec<String>),
    QueueFamily,
    SurfaceFormat,
    PresentMode,
}

/// Picks the surface format for one adapter. A lone `Undefined` entry means
/// the surface accepts anything.
pub fn choose_surface_format(
    formats: &[SurfaceFormat],
    want: FormatRequirement,
) -> Option<SurfaceFormat> {
    if let [only] = formats {
        if only.format == PixelFormat::Undefined {
            return Some(match want {
                FormatRequirement::Exact(f) => f,
                FormatRequirement::Any => SurfaceFormat::BGRA8_SRGB_NONLINEAR,
            });
        }
    }
    match want {
        FormatRequirement::Exact(f) => formats.iter().copied().find(|&c| c == f),
        FormatRequirement::Any => formats
            .iter()
            .copied()
            .find(|c| c.format != PixelFormat::Undefined),
    }
}

fn evaluate<P: AdapterProbe>(
    probe: &P,
    adapter: P::Adapter,
    req: &Requirements,
) -> Result<(u32, SurfaceFormat), Unmet> {
    let supported = probe.extensions(adapter);
    let missing: Vec<String> = req
        .extensions
        .iter()
        .filter(|e| !supported.iter().any(|s| s == *e))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(Unmet::Extensions(missing));
    }

    let family = probe
        .queue_families(adapter)
        .iter()
        .enumerate()
        .map(|(i, caps)| (i as u32, *caps))
        .find(|&(i, caps)| caps.contains(req.queue_caps) && probe.supports_present(adapter, i))
        .map(|(i, _)| i)
        .ok_or(Unmet::QueueFamily)?;

    let format = choose_surface_format(&probe.surface_formats(adapter), req.surface_format)
        .ok_or(Unmet::SurfaceFormat)?;

    if !probe.present_modes(adapter).contains(&req.present_mode) {
        return Err(Unmet::PresentMode);
    }

    Ok((family, format))
}

/// First qualifying adapter wins unless a qualifying discrete adapter shows
/// up later. When nothing qualifies, the error names the furthest check any
/// adapter reached.
pub fn select_adapter<P: AdapterProbe>(
    probe: &P,
    req: &Requirements,
) -> Result<Selection<P::Adapter>, CapabilityError> {
    let adapters = probe.adapters();
    if adapters.is_empty() {
        return Err(CapabilityError::NoAdapters);
    }

    let mut chosen: Option<Selection<P::Adapter>> = None;
    let mut furthest: Option<Unmet> = None;

    for adapter in adapters {
        let name = probe.name(adapter);
        match evaluate(probe, adapter, req) {
            Ok((queue_family, surface_format)) => {
                let class = probe.device_class(adapter);
                debug!("adapter '{name}' ({class:?}) meets requirements, queue family {queue_family}");
                let candidate = Selection {
                    adapter,
                    name,
                    class,
                    queue_family,
                    surface_format,
                    present_mode: req.present_mode,
                };
                if class == DeviceClass::Discrete {
                    chosen = Some(candidate);
                    break;
                }
                if chosen.is_none() {
                    chosen = Some(candidate);
                }
            }
            Err(unmet) => {
                debug!("adapter '{name}' rejected: {unmet:?}");
                furthest = match furthest {
                    Some(prev) if prev >= unmet => Some(prev),
                    _ => Some(unmet),
                };
            }
        }
    }

    if let Some(sel) = chosen {
        info!(
            "selected adapter '{}' ({:?}), queue family {}",
            sel.name, sel.class, sel.queue_family
        );
        return Ok(sel);
    }

    Err(match furthest {
        Some(Unmet::Extensions(missing)) => CapabilityError::MissingExtensions { missing },
        Some(Unmet::QueueFamily) => CapabilityError::NoQueueFamily,
        Some(Unmet::SurfaceFormat) => CapabilityError::NoSurfaceFormat,
        Some(Unmet::PresentMode) => CapabilityError::NoPresentMode {
            mode: req.present_mode.to_string(),
        },
        None => CapabilityError::NoAdapters,
    })
}
