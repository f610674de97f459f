//! Scanline Engine: software 3D renderer
//!
//! Meshes go through a homogeneous transform pipeline and are drawn by an
//! analytic scanline rasterizer (no depth buffer) into a framebuffer that is
//! blitted to a macroquad window.

/// Version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

use macroquad::prelude::*;
use scanline_engine::app::App;
use scanline_engine::config::EngineConfig;
use scanline_engine::input::{Action, Axis, InputState, Toggle};
use scanline_engine::rasterizer::{DrawMode as RasterMode, Framebuffer};
use scanline_engine::runtime::{FrameSink, InputSource, RenderContext};
use scanline_engine::world;
use std::path::PathBuf;
use std::sync::mpsc::{channel, sync_channel, Receiver, Sender, SyncSender};

const CONFIG_PATH: &str = "assets/engine.ron";

/// Held keys, checked every frame
const HELD_KEYS: [(KeyCode, Action); 14] = [
    (KeyCode::W, Action::MoveForward),
    (KeyCode::S, Action::MoveBack),
    (KeyCode::A, Action::MoveLeft),
    (KeyCode::D, Action::MoveRight),
    (KeyCode::Space, Action::MoveUp),
    (KeyCode::LeftShift, Action::MoveDown),
    (KeyCode::Left, Action::YawLeft),
    (KeyCode::Right, Action::YawRight),
    (KeyCode::Up, Action::PitchUp),
    (KeyCode::Down, Action::PitchDown),
    (KeyCode::Q, Action::RollLeft),
    (KeyCode::E, Action::RollRight),
    (KeyCode::R, Action::FovIncrease),
    (KeyCode::F, Action::FovDecrease),
];

/// One-shot keys
const TOGGLE_KEYS: [(KeyCode, Toggle); 8] = [
    (KeyCode::Key1, Toggle::SetDrawMode(RasterMode::Scanline)),
    (KeyCode::Key2, Toggle::SetDrawMode(RasterMode::Painter)),
    (KeyCode::M, Toggle::Wireframe),
    (KeyCode::N, Toggle::NextMesh),
    (KeyCode::P, Toggle::PreviewRows),
    (KeyCode::X, Toggle::RotateWorld(Axis::X)),
    (KeyCode::Y, Toggle::RotateWorld(Axis::Y)),
    (KeyCode::Z, Toggle::RotateWorld(Axis::Z)),
];

fn config_path() -> PathBuf {
    std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(CONFIG_PATH))
}

/// Runs before the logger exists, so the config is read quietly here and
/// properly in `main`.
fn window_conf() -> Conf {
    let config = EngineConfig::load(config_path()).unwrap_or_default();
    let scale = config.window_scale.max(0.25);
    Conf {
        window_title: format!("Scanline Engine v{}", VERSION),
        window_width: (config.viewport.width as f32 * scale) as i32,
        window_height: (config.viewport.height as f32 * scale) as i32,
        window_resizable: true,
        ..Default::default()
    }
}

/// A finished frame on its way to the window
struct FrameMessage {
    pixels: Vec<u8>,
    width: usize,
    height: usize,
    status: String,
}

struct ChannelInput {
    input: Receiver<InputState>,
    meshes: Receiver<world::Mesh>,
}

impl InputSource for ChannelInput {
    fn poll(&mut self) -> Option<InputState> {
        self.input.try_recv().ok()
    }

    fn take_loaded(&mut self) -> Vec<world::Mesh> {
        self.meshes.try_iter().collect()
    }
}

/// Bounded to one frame, so the render thread never runs ahead of the window
struct ChannelFrames(SyncSender<FrameMessage>);

impl FrameSink for ChannelFrames {
    fn present(&mut self, frame: &Framebuffer, status: &str) -> bool {
        let message = FrameMessage {
            pixels: frame.pixels.clone(),
            width: frame.width,
            height: frame.height,
            status: status.to_string(),
        };
        self.0.send(message).is_ok()
    }
}

fn poll_keys() -> InputState {
    let mut input = InputState::new();
    for (key, action) in HELD_KEYS {
        input.set_held(action, is_key_down(key));
    }
    for (key, toggle) in TOGGLE_KEYS {
        if is_key_pressed(key) {
            input.push_toggle(toggle);
        }
    }
    input
}

fn load_meshes(config: &EngineConfig) -> Vec<world::Mesh> {
    config
        .meshes
        .iter()
        .filter_map(|path| match world::load_mesh(path) {
            Ok(mesh) => Some(mesh),
            Err(e) => {
                log::warn!("skipping {}: {}", path.display(), e);
                None
            }
        })
        .collect()
}

fn save_screenshot(frame: &FrameMessage) {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let fb = Framebuffer {
        pixels: frame.pixels.clone(),
        width: frame.width,
        height: frame.height,
    };
    if let Err(e) = fb.save_png(format!("screenshot-{}.png", secs)) {
        log::error!("screenshot failed: {}", e);
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn prompt_mesh(meshes: &Sender<world::Mesh>) {
    let dialog = rfd::FileDialog::new()
        .add_filter("Mesh", &["txt", "obj"])
        .set_directory("assets/meshes");

    if let Some(path) = dialog.pick_file() {
        match world::load_mesh(&path) {
            Ok(mesh) => {
                let _ = meshes.send(mesh);
            }
            Err(e) => log::error!("failed to load {}: {}", path.display(), e),
        }
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = EngineConfig::load_or_default(config_path());
    let meshes = load_meshes(&config);
    let app = App::new(config, meshes);

    let (input_tx, input_rx) = channel();
    let (mesh_tx, mesh_rx) = channel();
    let (frame_tx, frame_rx) = sync_channel(1);

    let mut context = RenderContext::new();
    let source = ChannelInput { input: input_rx, meshes: mesh_rx };
    if let Err(e) = context.start(app, source, ChannelFrames(frame_tx)) {
        log::error!("{}", e);
        return;
    }

    let mut latest: Option<FrameMessage> = None;

    loop {
        if is_key_pressed(KeyCode::Escape) {
            break;
        }

        if input_tx.send(poll_keys()).is_err() {
            log::warn!("render thread is gone");
            break;
        }

        #[cfg(not(target_arch = "wasm32"))]
        if is_key_pressed(KeyCode::O) {
            prompt_mesh(&mesh_tx);
        }

        if let Some(frame) = frame_rx.try_iter().last() {
            latest = Some(frame);
        }

        clear_background(BLACK);

        if let Some(frame) = &latest {
            if is_key_pressed(KeyCode::F12) {
                save_screenshot(frame);
            }

            let texture = Texture2D::from_rgba8(frame.width as u16, frame.height as u16, &frame.pixels);
            texture.set_filter(FilterMode::Nearest);
            draw_texture_ex(
                &texture,
                0.0,
                0.0,
                WHITE,
                DrawTextureParams {
                    dest_size: Some(vec2(screen_width(), screen_height())),
                    ..Default::default()
                },
            );
            draw_text(&frame.status, 8.0, 20.0, 20.0, WHITE);
        }

        next_frame().await;
    }

    // Unblock a pending send before joining
    drop(frame_rx);
    match context.stop() {
        Ok(Some(app)) => log::info!("exiting with {} meshes loaded", app.meshes().len()),
        Ok(None) => {}
        Err(e) => log::error!("{}", e),
    }
}
