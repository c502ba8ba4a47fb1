// SPDX-License-Identifier: CEPL-1.0
use crate::types::MemoryProps;
use lumen_core::CapabilityError;

/// Where an allocation lives, by intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemoryClass {
    /// Host-visible scratch memory; lives for a single upload.
    Staging,
    /// Device-local memory for data that never changes after setup.
    Optimized,
    /// Host-visible memory the CPU rewrites every frame.
    Uniform,
}

impl MemoryClass {
    pub fn props(self) -> MemoryProps {
        match self {
            MemoryClass::Staging | MemoryClass::Uniform => {
                MemoryProps::HOST_VISIBLE | MemoryProps::HOST_COHERENT
            }
            MemoryClass::Optimized => MemoryProps::DEVICE_LOCAL,
        }
    }
}

/// Lowest memory type index allowed by `allowed_bits` whose properties are a
/// superset of `required`.
pub fn find_memory_type(
    types: &[MemoryProps],
    allowed_bits: u32,
    required: MemoryProps,
) -> Result<u32, CapabilityError> {
    types
        .iter()
        .enumerate()
        .take(32)
        .find(|(i, props)| allowed_bits & (1 << i) != 0 && props.contains(required))
        .map(|(i, _)| i as u32)
        .ok_or_else(|| CapabilityError::NoMemoryType {
            allowed_bits,
            required: format!("{required:?}"),
        })
}
