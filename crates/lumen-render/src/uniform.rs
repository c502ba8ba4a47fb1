// SPDX-License-Identifier: CEPL-1.0
//! Dynamic-offset bookkeeping for the per-frame uniform buffer.

use lumen_core::LumenError;

/// Rounds `value` up to a multiple of `align`, which must be a power of two
/// (zero is treated as one).
#[inline]
pub fn align_up(value: u64, align: u64) -> u64 {
    let align = align.max(1);
    debug_assert!(align.is_power_of_two(), "alignment {align} is not a power of two");
    (value + align - 1) & !(align - 1)
}

/// A per-slot arena must hold at least one aligned write of `write` bytes,
/// or no draw fits and the descriptor range outruns the buffer.
pub fn check_arena(capacity: u64, write: u64, align: u64) -> Result<(), LumenError> {
    let min = align_up(write, align);
    if capacity < min {
        return Err(LumenError::Config(format!(
            "uniform_bytes = {capacity} is below one {write}-byte draw at alignment {} ({min} bytes)",
            align.max(1)
        )));
    }
    Ok(())
}

/// Hands out offsets into one slot's uniform buffer. Each reservation
/// starts on a multiple of the device's minimum offset alignment.
#[derive(Clone, Debug)]
pub struct DynamicOffsets {
    align: u64,
    capacity: u64,
    next: u64,
}

impl DynamicOffsets {
    pub fn new(align: u64, capacity: u64) -> Self {
        Self {
            align: align.max(1),
            capacity,
            next: 0,
        }
    }

    pub fn align(&self) -> u64 {
        self.align
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Start of a new frame.
    pub fn reset(&mut self) {
        self.next = 0;
    }

    /// Bytes `count` reservations of `size` occupy from a fresh arena.
    pub fn frame_bytes(&self, count: usize, size: u64) -> u64 {
        match count {
            0 => 0,
            n => (n as u64 - 1) * align_up(size, self.align) + size,
        }
    }

    /// Fails up front when `count` reservations of `size` cannot fit, so a
    /// frame is refused before any per-slot state changes.
    pub fn check_frame(&self, count: usize, size: u64) -> Result<(), LumenError> {
        let needed = self.frame_bytes(count, size);
        let last = needed.saturating_sub(size);
        if needed > self.capacity || last > u32::MAX as u64 {
            return Err(LumenError::Upload(format!(
                "uniform arena overflow: {needed} bytes needed, {} available",
                self.capacity
            )));
        }
        Ok(())
    }

    /// Reserves `size` bytes and returns their offset.
    pub fn reserve(&mut self, size: u64) -> Result<u32, LumenError> {
        let offset = self.next;
        let end = offset + size;
        if end > self.capacity || offset > u32::MAX as u64 {
            return Err(LumenError::Upload(format!(
                "uniform arena overflow: {end} bytes needed, {} available",
                self.capacity
            )));
        }
        self.next = align_up(end, self.align);
        Ok(offset as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_basics() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(64, 64), 64);
        assert_eq!(align_up(65, 64), 128);
        assert_eq!(align_up(7, 0), 7);
    }

    #[test]
    fn offsets_are_aligned_and_increasing() {
        let sizes = [64u64, 4, 100, 64, 1, 255, 256, 64];
        for align in [1u64, 4, 16, 64, 256] {
            let mut arena = DynamicOffsets::new(align, 65535);
            let mut last: Option<u32> = None;
            for &s in &sizes {
                let off = arena.reserve(s).unwrap();
                assert_eq!(off as u64 % align, 0, "offset {off} not aligned to {align}");
                if let Some(prev) = last {
                    assert!(off > prev);
                }
                last = Some(off);
            }
        }
    }

    #[test]
    fn alignment_larger_than_write() {
        let mut arena = DynamicOffsets::new(256, 65535);
        assert_eq!(arena.reserve(64).unwrap(), 0);
        assert_eq!(arena.reserve(64).unwrap(), 256);
        assert_eq!(arena.reserve(64).unwrap(), 512);
        arena.reset();
        assert_eq!(arena.reserve(64).unwrap(), 0);
    }

    #[test]
    fn frame_check_matches_reservations() {
        let mut arena = DynamicOffsets::new(256, 1024);
        assert_eq!(arena.frame_bytes(0, 64), 0);
        assert_eq!(arena.frame_bytes(4, 64), 832);
        assert!(arena.check_frame(4, 64).is_ok());
        let err = arena.check_frame(5, 64).unwrap_err();
        assert!(err.to_string().contains("1088 bytes needed"));

        for _ in 0..4 {
            arena.reserve(64).unwrap();
        }
        assert!(arena.reserve(64).is_err());
    }

    #[test]
    fn arena_must_hold_one_aligned_draw() {
        assert!(check_arena(65535, 64, 256).is_ok());
        assert!(check_arena(256, 64, 256).is_ok());
        assert_eq!(check_arena(0, 64, 256).unwrap_err().kind(), "config");
        assert_eq!(check_arena(128, 64, 256).unwrap_err().kind(), "config");
        assert!(check_arena(64, 64, 0).is_ok());
    }

    #[test]
    fn overflow_is_rejected() {
        let mut arena = DynamicOffsets::new(256, 300);
        arena.reserve(64).unwrap();
        arena.reserve(44).unwrap();
        assert!(arena.reserve(64).is_err());
    }
}
