// SPDX-License-Identifier: CEPL-1.0
mod common;

use common::{MockProbe, SimAdapter, SWAPCHAIN};
use lumen_core::CapabilityError;
use lumen_render::negotiate::{select_adapter, FormatRequirement, Requirements};
use lumen_render::types::{ColorSpace, DeviceClass, PixelFormat, PresentMode, SurfaceFormat};

fn policy() -> Requirements {
    Requirements::new([SWAPCHAIN])
}

fn permutations(items: &[SimAdapter]) -> Vec<Vec<SimAdapter>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut out = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let head = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, head.clone());
            out.push(tail);
        }
    }
    out
}

// ============================================================================
// Selection
// ============================================================================

#[test]
fn discrete_wins_over_earlier_integrated() {
    let probe = MockProbe {
        adapters: vec![
            SimAdapter::capable("no-swapchain", DeviceClass::Discrete).without_swapchain(),
            SimAdapter::capable("igpu", DeviceClass::Integrated),
            SimAdapter::capable("dgpu", DeviceClass::Discrete),
        ],
    };
    let sel = select_adapter(&probe, &policy()).unwrap();
    assert_eq!(sel.name, "dgpu");
    assert_eq!(sel.adapter, 2);
    assert_eq!(sel.class, DeviceClass::Discrete);
    assert_eq!(sel.queue_family, 1);
}

#[test]
fn selection_is_order_independent() {
    let set = [
        SimAdapter::capable("no-swapchain", DeviceClass::Discrete).without_swapchain(),
        SimAdapter::capable("igpu", DeviceClass::Integrated),
        SimAdapter::capable("dgpu", DeviceClass::Discrete),
        SimAdapter::capable("cpu", DeviceClass::Cpu),
    ];
    for order in permutations(&set) {
        let probe = MockProbe { adapters: order };
        let sel = select_adapter(&probe, &policy()).unwrap();
        assert_eq!(sel.name, "dgpu");
        // the same input always yields the same answer
        let again = select_adapter(&probe, &policy()).unwrap();
        assert_eq!(sel, again);
    }
}

#[test]
fn first_qualifying_wins_without_discrete() {
    let probe = MockProbe {
        adapters: vec![
            SimAdapter::capable("igpu-a", DeviceClass::Integrated).with_modes(vec![PresentMode::Fifo]),
            SimAdapter::capable("igpu-b", DeviceClass::Integrated),
            SimAdapter::capable("virt", DeviceClass::Virtual),
        ],
    };
    assert_eq!(select_adapter(&probe, &policy()).unwrap().name, "igpu-b");
}

#[test]
fn lone_undefined_format_is_accepted() {
    let undefined = SurfaceFormat {
        format: PixelFormat::Undefined,
        color_space: ColorSpace::SrgbNonlinear,
    };
    let probe = MockProbe {
        adapters: vec![SimAdapter::capable("igpu", DeviceClass::Integrated).with_formats(vec![undefined])],
    };
    let sel = select_adapter(&probe, &policy()).unwrap();
    assert_eq!(sel.surface_format, SurfaceFormat::BGRA8_SRGB_NONLINEAR);
}

#[test]
fn any_format_takes_first_reported() {
    let rgba = SurfaceFormat {
        format: PixelFormat::Rgba8Srgb,
        color_space: ColorSpace::SrgbNonlinear,
    };
    let probe = MockProbe {
        adapters: vec![SimAdapter::capable("igpu", DeviceClass::Integrated).with_formats(vec![rgba])],
    };
    let mut req = policy();
    assert_eq!(
        select_adapter(&probe, &req).unwrap_err(),
        CapabilityError::NoSurfaceFormat
    );
    req.surface_format = FormatRequirement::Any;
    assert_eq!(select_adapter(&probe, &req).unwrap().surface_format, rgba);
}

// ============================================================================
// Exhaustion
// ============================================================================

#[test]
fn no_adapters_at_all() {
    let probe = MockProbe { adapters: vec![] };
    assert_eq!(
        select_adapter(&probe, &policy()).unwrap_err(),
        CapabilityError::NoAdapters
    );
}

#[test]
fn queue_requirement_is_named() {
    let probe = MockProbe {
        adapters: vec![
            SimAdapter::capable("a", DeviceClass::Discrete).split_queues(),
            SimAdapter::capable("b", DeviceClass::Integrated).split_queues(),
        ],
    };
    assert_eq!(
        select_adapter(&probe, &policy()).unwrap_err(),
        CapabilityError::NoQueueFamily
    );
}

#[test]
fn furthest_check_is_reported() {
    let probe = MockProbe {
        adapters: vec![
            SimAdapter::capable("a", DeviceClass::Discrete).without_swapchain(),
            SimAdapter::capable("b", DeviceClass::Integrated).with_modes(vec![PresentMode::Fifo]),
            SimAdapter::capable("c", DeviceClass::Integrated).split_queues(),
        ],
    };
    let err = select_adapter(&probe, &policy()).unwrap_err();
    assert!(matches!(err, CapabilityError::NoPresentMode { ref mode } if mode == "MAILBOX"));
}

#[test]
fn missing_extensions_are_listed() {
    let probe = MockProbe {
        adapters: vec![SimAdapter::capable("a", DeviceClass::Discrete).without_swapchain()],
    };
    match select_adapter(&probe, &policy()).unwrap_err() {
        CapabilityError::MissingExtensions { missing } => assert_eq!(missing, vec![SWAPCHAIN]),
        other => panic!("unexpected {other:?}"),
    }
}
