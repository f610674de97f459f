//! Render thread and frame pacing
//!
//! `RenderContext` owns the render thread and its lifecycle. The thread owns
//! the `App` outright; input comes in through an `InputSource` and finished
//! frames go out through a `FrameSink`, so nothing else is shared.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use crate::app::App;
use crate::input::InputState;
use crate::rasterizer::Framebuffer;
use crate::world::Mesh;

/// Render loop lifecycle: Idle -> Running -> Stopping -> Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoopState {
    Idle = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl LoopState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => LoopState::Idle,
            1 => LoopState::Running,
            2 => LoopState::Stopping,
            _ => LoopState::Stopped,
        }
    }

    fn load(cell: &AtomicU8) -> Self {
        Self::from_u8(cell.load(Ordering::Acquire))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RuntimeError {
    #[error("render loop already started")]
    AlreadyRunning,
    #[error("failed to spawn render thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("render thread panicked")]
    Panicked,
}

/// Where the render thread reads input from
pub trait InputSource: Send {
    /// Next pending snapshot, `None` when there is nothing new
    fn poll(&mut self) -> Option<InputState>;

    /// Meshes loaded by the window side since the last call
    fn take_loaded(&mut self) -> Vec<Mesh> {
        Vec::new()
    }
}

/// Where finished frames go. Returning `false` ends the loop.
pub trait FrameSink: Send {
    fn present(&mut self, frame: &Framebuffer, status: &str) -> bool;
}

/// Fixed-timestep accumulator
#[derive(Debug, Clone)]
pub struct FixedStep {
    step: Duration,
    accumulator: Duration,
}

impl FixedStep {
    pub fn new(step: Duration) -> Self {
        Self {
            step: step.max(Duration::from_micros(1)),
            accumulator: Duration::ZERO,
        }
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    /// Add wall-clock time, return the number of whole ticks to simulate
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        self.accumulator += elapsed;
        let mut ticks = 0;
        while self.accumulator >= self.step {
            self.accumulator -= self.step;
            ticks += 1;
        }
        ticks
    }
}

/// Frames per second, refreshed once a second
#[derive(Debug)]
struct FpsCounter {
    frames: u32,
    since: Instant,
    fps: f32,
}

impl FpsCounter {
    fn new(now: Instant) -> Self {
        Self { frames: 0, since: now, fps: 0.0 }
    }

    /// Count a frame; `true` when a new one-second figure is ready
    fn frame(&mut self, now: Instant) -> bool {
        self.frames += 1;
        let elapsed = now.duration_since(self.since);
        if elapsed < Duration::from_secs(1) {
            return false;
        }
        self.fps = self.frames as f32 / elapsed.as_secs_f32();
        self.frames = 0;
        self.since = now;
        true
    }
}

/// Handle to the render thread
pub struct RenderContext {
    state: Arc<AtomicU8>,
    handle: Option<JoinHandle<App>>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(LoopState::Idle as u8)),
            handle: None,
        }
    }

    pub fn state(&self) -> LoopState {
        LoopState::load(&self.state)
    }

    /// Move `app` onto a new render thread and start the loop
    pub fn start<S, F>(&mut self, app: App, source: S, sink: F) -> Result<(), RuntimeError>
    where
        S: InputSource + 'static,
        F: FrameSink + 'static,
    {
        if self.handle.is_some() || self.state() == LoopState::Running {
            return Err(RuntimeError::AlreadyRunning);
        }

        self.state.store(LoopState::Running as u8, Ordering::Release);
        let state = Arc::clone(&self.state);
        let spawned = thread::Builder::new()
            .name("render".to_string())
            .spawn(move || render_loop(app, source, sink, state));

        match spawned {
            Ok(handle) => {
                log::info!("render loop started");
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.state.store(LoopState::Stopped as u8, Ordering::Release);
                Err(e.into())
            }
        }
    }

    /// Ask the loop to finish, wait for it and hand the app back.
    /// `Ok(None)` if the loop was never started.
    pub fn stop(&mut self) -> Result<Option<App>, RuntimeError> {
        let Some(handle) = self.handle.take() else {
            return Ok(None);
        };

        // The loop may already have ended on its own
        let _ = self.state.compare_exchange(
            LoopState::Running as u8,
            LoopState::Stopping as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );

        let joined = handle.join();
        self.state.store(LoopState::Stopped as u8, Ordering::Release);
        log::info!("render loop stopped");
        joined.map(Some).map_err(|_| RuntimeError::Panicked)
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(e) = self.stop() {
                log::error!("{}", e);
            }
        }
    }
}

fn render_loop<S: InputSource, F: FrameSink>(
    mut app: App,
    mut source: S,
    mut sink: F,
    state: Arc<AtomicU8>,
) -> App {
    let viewport = app.viewport();
    let mut fb = Framebuffer::new(viewport.width, viewport.height);
    let mut clock = FixedStep::new(app.config.tick());
    let dt = clock.step().as_secs_f32();

    // Toggles stay pending until a tick has consumed them
    let mut pending = InputState::new();
    let mut last = Instant::now();
    let mut fps = FpsCounter::new(last);

    while LoopState::load(&state) == LoopState::Running {
        while let Some(input) = source.poll() {
            pending.merge(input);
        }
        for mesh in source.take_loaded() {
            app.add_mesh(mesh);
        }

        let now = Instant::now();
        let ticks = clock.advance(now.duration_since(last));
        last = now;
        for _ in 0..ticks {
            app.update(&pending, dt);
            pending.clear_toggles();
        }

        let stats = app.render(&mut fb);
        if fps.frame(now) {
            log::debug!(
                "{:.1} fps, {} triangles, {} spans",
                fps.fps,
                stats.triangles,
                stats.spans
            );
        }

        if !sink.present(&fb, &app.status_line(fps.fps)) {
            log::info!("frame sink closed");
            break;
        }
    }

    state.store(LoopState::Stopped as u8, Ordering::Release);
    app
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc::{channel, Receiver};
    use crate::config::EngineConfig;
    use crate::input::Toggle;
    use crate::rasterizer::Viewport;

    struct ChannelSource(Receiver<InputState>);

    impl InputSource for ChannelSource {
        fn poll(&mut self) -> Option<InputState> {
            self.0.try_recv().ok()
        }
    }

    /// Counts frames; stops once the status line matches or the cap is hit
    struct CountingSink {
        frames: Arc<AtomicUsize>,
        until: Option<&'static str>,
    }

    impl FrameSink for CountingSink {
        fn present(&mut self, frame: &Framebuffer, status: &str) -> bool {
            assert_eq!(frame.viewport(), Viewport::new(80, 60));
            let n = self.frames.fetch_add(1, Ordering::SeqCst) + 1;
            match self.until {
                Some(pattern) => !status.contains(pattern) && n < 100_000,
                None => true,
            }
        }
    }

    fn small_app() -> App {
        let config = EngineConfig { viewport: Viewport::new(80, 60), ..Default::default() };
        App::new(config, Vec::new())
    }

    #[test]
    fn test_fixed_step_accumulates() {
        let mut clock = FixedStep::new(Duration::from_millis(10));
        assert_eq!(clock.advance(Duration::ZERO), 0);
        assert_eq!(clock.advance(Duration::from_millis(25)), 2);
        assert_eq!(clock.advance(Duration::from_millis(4)), 0);
        assert_eq!(clock.advance(Duration::from_millis(1)), 1);
        assert_eq!(clock.advance(Duration::from_millis(9)), 0);
    }

    #[test]
    fn test_stop_without_start() {
        let mut context = RenderContext::new();
        assert_eq!(context.state(), LoopState::Idle);
        assert!(context.stop().unwrap().is_none());
    }

    #[test]
    fn test_start_then_stop_returns_app() {
        let frames = Arc::new(AtomicUsize::new(0));
        let (_tx, rx) = channel();
        let mut context = RenderContext::new();
        context
            .start(small_app(), ChannelSource(rx), CountingSink { frames: Arc::clone(&frames), until: None })
            .unwrap();
        assert_eq!(context.state(), LoopState::Running);
        assert!(matches!(
            context.start(small_app(), ChannelSource(channel().1), CountingSink { frames: Arc::clone(&frames), until: None }),
            Err(RuntimeError::AlreadyRunning)
        ));

        while frames.load(Ordering::SeqCst) == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        let app = context.stop().unwrap();
        assert!(app.is_some());
        assert_eq!(context.state(), LoopState::Stopped);
    }

    #[test]
    fn test_toggle_survives_until_a_tick_runs() {
        let frames = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = channel();
        tx.send(InputState::new().with_toggle(Toggle::Wireframe)).unwrap();

        let mut context = RenderContext::new();
        context
            .start(small_app(), ChannelSource(rx), CountingSink { frames: Arc::clone(&frames), until: Some("wire") })
            .unwrap();

        // The sink ends the loop itself once the toggle shows up
        while context.state() == LoopState::Running {
            thread::sleep(Duration::from_millis(1));
        }
        let app = context.stop().unwrap().unwrap();
        assert!(app.raster.wireframe);
        assert_eq!(context.state(), LoopState::Stopped);
    }
}
