// SPDX-License-Identifier: CEPL-1.0
use crate::{Control, EventSink, WindowConfig};
use anyhow::Result;
use lumen_core::LumenError;
use std::time::Instant;
use tracing::{error, info};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

struct Host<S, F> {
    cfg: WindowConfig,
    make: Option<F>,
    // sink before window: it holds a surface for the window and must drop first
    sink: Option<S>,
    window: Option<Window>,
    failure: Option<anyhow::Error>,
    paused: bool,
    last_tick: Instant,
}

impl<S, F> Host<S, F>
where
    S: EventSink,
    F: FnOnce(&Window) -> Result<S>,
{
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("event loop stopping: {err:#}");
        if self.failure.is_none() {
            self.failure = Some(err);
        }
        self.shutdown(event_loop);
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.sink = None;
        self.window = None;
        event_loop.exit();
    }

    fn create(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.cfg.title.clone())
            .with_inner_size(PhysicalSize::new(self.cfg.width, self.cfg.height))
            .with_resizable(self.cfg.resizable);
        let window = event_loop
            .create_window(attrs)
            .map_err(|e| LumenError::platform("create_window", e))?;

        let size = window.inner_size();
        self.paused = size.width == 0 || size.height == 0;
        info!("window {}x{} (paused={})", size.width, size.height, self.paused);

        let Some(make) = self.make.take() else {
            return Ok(());
        };
        self.sink = Some(make(&window)?);
        self.window = Some(window);
        self.last_tick = Instant::now();
        Ok(())
    }
}

impl<S, F> ApplicationHandler for Host<S, F>
where
    S: EventSink,
    F: FnOnce(&Window) -> Result<S>,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        // frame pacing comes from the renderer's fences, so keep polling
        event_loop.set_control_flow(ControlFlow::Poll);
        if self.window.is_none() && self.make.is_some() {
            if let Err(e) = self.create(event_loop) {
                self.fail(event_loop, e);
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        match &self.window {
            Some(window) if window.id() == window_id => {}
            _ => return,
        }
        let Some(sink) = self.sink.as_mut() else {
            return;
        };

        let res = match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.shutdown(event_loop);
                return;
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                let pressed = state == ElementState::Pressed;
                let control = if code == KeyCode::Escape && pressed {
                    Control::Exit
                } else {
                    sink.key(code, pressed)
                };
                if control == Control::Exit {
                    info!("exit requested by key {code:?}");
                    self.shutdown(event_loop);
                }
                return;
            }

            WindowEvent::Resized(size) => {
                let now_paused = size.width == 0 || size.height == 0;
                if now_paused != self.paused {
                    info!("Resized → {}x{} (paused={})", size.width, size.height, now_paused);
                }
                self.paused = now_paused;
                sink.resize(size.width, size.height)
            }

            WindowEvent::RedrawRequested => {
                if self.paused {
                    return;
                }
                let now = Instant::now();
                let dt = now.duration_since(self.last_tick);
                self.last_tick = now;
                sink.tick(dt).and_then(|()| sink.draw())
            }

            _ => Ok(()),
        };

        if let Err(e) = res {
            self.fail(event_loop, e);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if self.paused {
            return;
        }
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }
}

/// Opens the window, builds the sink from it with `make` and runs the event
/// loop until the window closes or the sink fails.
pub fn run<S, F>(cfg: WindowConfig, make: F) -> Result<()>
where
    S: EventSink,
    F: FnOnce(&Window) -> Result<S>,
{
    let event_loop = EventLoop::new().map_err(|e| LumenError::platform("EventLoop::new", e))?;
    let mut host = Host {
        cfg,
        make: Some(make),
        sink: None,
        window: None,
        failure: None,
        paused: false,
        last_tick: Instant::now(),
    };
    event_loop
        .run_app(&mut host)
        .map_err(|e| LumenError::platform("run_app", e))?;

    match host.failure.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
