// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Window and input event source. The renderer side implements
//! [`EventSink`]; [`run`] owns the winit loop and delivers tick, draw, resize
//! and key events to it.

pub use winit;

mod host;

pub use host::run;

use anyhow::Result;
use std::time::Duration;
use winit::keyboard::KeyCode;

#[derive(Clone, Debug)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "lumen".to_string(),
            width: 1024,
            height: 768,
            resizable: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Continue,
    Exit,
}

/// Receiver of window events. Any error stops the loop and is returned
/// from [`run`].
pub trait EventSink {
    /// Once per loop iteration, before `draw`. `dt` is time since the
    /// previous tick.
    fn tick(&mut self, _dt: Duration) -> Result<()> {
        Ok(())
    }

    fn draw(&mut self) -> Result<()>;

    /// New drawable size; either side may be zero while minimized.
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    fn key(&mut self, _key: KeyCode, _pressed: bool) -> Control {
        Control::Continue
    }
}
