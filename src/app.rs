use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::Vec3;
use winit::{
    application::ApplicationHandler,
    event::{Ime, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow},
    keyboard::PhysicalKey,
    window::{Window, WindowId},
};

use crate::asset::model::Model;
use crate::error::WorldError;
use crate::game::config::{AssetConfig, GameConfig};
use crate::game::gamepad::Gamepad;
use crate::game::input::{ControlEvent, InputState};
use crate::game::player::{integrate, ActionState, Movement, PlayerState};
use crate::render::backend::RenderBackend;
use crate::render::camera;
use crate::render::engine::RenderEngine;
use crate::render::portal::draw_visible;
use crate::render::recorder::Recorder;
use crate::sim::tick::FrameClock;
use crate::world::cache::{Sprite, World};
use crate::world::sector::sector_centroid;
use crate::world::store::SectorStore;

/// Bake textures, sectors and models through `backend`.
///
/// Missing textures and optional models are logged and skipped. A sector
/// that fails to compile or a required model that fails to load aborts.
pub fn build_world<B: RenderBackend + ?Sized>(
    backend: &mut B,
    assets: &AssetConfig,
    store: &SectorStore,
    player_height: f64,
) -> Result<World, WorldError> {
    let mut world = World::new();
    let loaded = world.load_textures(backend, &assets.textures);
    log::info!("loaded {loaded}/{} textures", assets.textures.len());

    world.register_store(backend, store)?;

    for (slot, asset) in assets.models.iter().enumerate() {
        let model = match Model::load(&asset.path) {
            Ok(model) => model,
            Err(e) if asset.required => return Err(e.into()),
            Err(e) => {
                log::warn!("{e}");
                continue;
            }
        };
        world.add_model(backend, slot, &model, asset.color)?;

        let Some(id) = asset.sector else {
            continue;
        };
        let placed = store
            .get(id)
            .and_then(|sector| sector_centroid(sector).map(|c| (sector.floor_height, c)));
        match placed {
            Some((floor, c)) => world.add_sprite(Sprite {
                model: slot,
                position: Vec3::new(c.x, floor + (player_height / 2.0) as f32, c.y),
                scale: asset.scale,
            }),
            None => log::warn!("{}: sector {id} not found, not placed", asset.path.display()),
        }
    }
    Ok(world)
}

/// Simulation and drawing state that does not depend on a window.
pub struct Session {
    pub store: SectorStore,
    pub world: World,
    pub player: PlayerState,
    pub input: InputState,
    pub movement: Movement,
    pub draw_depth: i32,
    pub lighting: bool,
    pub text_input: bool,
}

impl Session {
    pub fn new(config: &GameConfig, store: SectorStore, world: World, now: u32) -> Self {
        let gameplay = &config.gameplay;
        let player = PlayerState::spawn(
            &store,
            gameplay.start_sector,
            gameplay.start_facing,
            gameplay.player_height,
            now,
        );
        Self {
            store,
            world,
            player,
            input: InputState::new(config.key_bindings.clone()),
            movement: gameplay.movement(),
            draw_depth: config.graphics.draw_depth,
            lighting: config.graphics.lighting,
            text_input: false,
        }
    }

    /// Advance the player and apply toggles. Returns the control events
    /// that need the window or event loop (quit, text input).
    pub fn update(&mut self, now: u32, pad: ActionState) -> Vec<ControlEvent> {
        let act = self.input.action_state().merge(pad);
        self.player = integrate(self.player, &act, now, &self.movement);
        log::trace!(
            "player ({:.2}, {:.2}, {:.2}) facing {:.1} tilt {:.1} in sector {}",
            self.player.x,
            self.player.y,
            self.player.z,
            self.player.facing,
            self.player.tilt,
            self.player.current_sector
        );

        let mut pending = Vec::new();
        for event in self.input.take_events() {
            match event {
                ControlEvent::ToggleLighting => {
                    self.lighting = !self.lighting;
                    log::info!("lighting: {}", if self.lighting { "ON" } else { "OFF" });
                }
                ControlEvent::ToggleTextInput => {
                    self.text_input = !self.text_input;
                    log::info!("text input: {}", if self.text_input { "ON" } else { "OFF" });
                    pending.push(event);
                }
                ControlEvent::Quit => pending.push(event),
            }
        }
        pending
    }

    /// Issue one frame's draw calls. Returns the number of sector lists
    /// submitted by the portal traversal.
    pub fn render<B: RenderBackend + ?Sized>(&self, backend: &mut B, aspect: f32) -> usize {
        let view_proj = camera::view_proj(&self.player, aspect);
        backend.set_transform(view_proj);
        backend.set_lighting(self.lighting);
        let submitted = draw_visible(
            &self.store,
            &self.world,
            backend,
            self.player.current_sector,
            self.draw_depth,
        );
        self.world.draw_sprites(backend, view_proj);
        submitted
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeadlessReport {
    pub frames: u32,
    pub last_frame_lists: usize,
    pub commands: usize,
    pub player: PlayerState,
}

/// Bake the world into a [`Recorder`] and run `frames` simulated frames,
/// each `frame_wait_ms` apart, with no input.
pub fn run_headless(config: &GameConfig, store: SectorStore, frames: u32) -> Result<HeadlessReport, WorldError> {
    let mut recorder = Recorder::new();
    let world = build_world(&mut recorder, &config.assets, &store, config.gameplay.player_height)?;
    let mut session = Session::new(config, store, world, 0);
    let aspect = config.graphics.width as f32 / config.graphics.height.max(1) as f32;
    let step = config.graphics.frame_wait_ms.min(u32::MAX as u64) as u32;

    let mut report = HeadlessReport {
        frames,
        last_frame_lists: 0,
        commands: 0,
        player: session.player,
    };
    for frame in 0..frames {
        recorder.clear_frame();
        session.update(frame.wrapping_add(1).wrapping_mul(step), ActionState::default());
        report.last_frame_lists = session.render(&mut recorder, aspect);
        report.commands = recorder.frame.len();
    }
    report.player = session.player;
    log::info!(
        "headless: {frames} frames, {} lists in the last one",
        report.last_frame_lists
    );
    Ok(report)
}

struct Running {
    engine: RenderEngine,
    session: Session,
    gamepad: Gamepad,
    clock: FrameClock,
    next_frame: Instant,
}

pub struct App {
    config: GameConfig,
    store: Option<SectorStore>,
    running: Option<Running>,
    error: Option<WorldError>,
}

impl App {
    pub fn new(config: GameConfig, store: SectorStore) -> Self {
        Self {
            config,
            store: Some(store),
            running: None,
            error: None,
        }
    }

    /// The error that stopped the event loop, if any.
    pub fn take_error(&mut self) -> Option<WorldError> {
        self.error.take()
    }

    fn frame_wait(&self) -> Duration {
        Duration::from_millis(self.config.graphics.frame_wait_ms)
    }

    fn render_frame(&mut self, event_loop: &ActiveEventLoop) {
        let Some(running) = &mut self.running else {
            return;
        };
        let now = running.clock.now_ms();
        running.clock.begin_frame();
        let pad = running.gamepad.poll();

        for event in running.session.update(now, pad) {
            match event {
                ControlEvent::Quit => event_loop.exit(),
                ControlEvent::ToggleTextInput => {
                    running.engine.window().set_ime_allowed(running.session.text_input);
                }
                ControlEvent::ToggleLighting => {}
            }
        }

        running.engine.begin_frame();
        let aspect = running.engine.aspect();
        running.session.render(&mut running.engine, aspect);
        match running.engine.end_frame() {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let (w, h) = (running.engine.width(), running.engine.height());
                running.engine.resize(w, h);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => event_loop.exit(),
            Err(e) => log::error!("render error: {e:?}"),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }
        let Some(store) = self.store.take() else {
            return;
        };
        let graphics = &self.config.graphics;
        let window_attrs = Window::default_attributes()
            .with_title("Hero")
            .with_inner_size(winit::dpi::PhysicalSize::new(graphics.width, graphics.height));
        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .expect("create window"),
        );
        let mut engine = RenderEngine::new(window, graphics.vsync);

        let world = match build_world(
            &mut engine,
            &self.config.assets,
            &store,
            self.config.gameplay.player_height,
        ) {
            Ok(world) => world,
            Err(e) => {
                log::error!("failed to build world: {e}");
                self.error = Some(e);
                event_loop.exit();
                return;
            }
        };

        let clock = FrameClock::new();
        let session = Session::new(&self.config, store, world, clock.now_ms());
        self.running = Some(Running {
            engine,
            session,
            gamepad: Gamepad::new(),
            clock,
            next_frame: Instant::now(),
        });
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(running) = &mut self.running {
                    running.engine.resize(new_size.width, new_size.height);
                }
            }
            WindowEvent::Focused(false) => {
                if let Some(running) = &mut self.running {
                    running.session.input.release_all();
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let (PhysicalKey::Code(code), Some(running)) = (event.physical_key, &mut self.running) {
                    running
                        .session
                        .input
                        .on_key_event(code, event.state.is_pressed(), event.repeat);
                }
            }
            WindowEvent::Ime(Ime::Commit(text)) => {
                log::info!("text input: {text:?}");
            }
            WindowEvent::RedrawRequested => {
                self.render_frame(event_loop);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let wait = self.frame_wait();
        let Some(running) = &mut self.running else {
            return;
        };
        let now = Instant::now();
        if now >= running.next_frame {
            running.next_frame = now + wait;
            running.engine.window().request_redraw();
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(running.next_frame));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::ModelAsset;
    use crate::render::recorder::Command;
    use std::path::PathBuf;
    use winit::keyboard::KeyCode;

    fn bare_config() -> GameConfig {
        let mut config = GameConfig::default();
        config.assets = AssetConfig {
            textures: Vec::new(),
            models: Vec::new(),
            map: None,
        };
        config
    }

    fn session(config: &GameConfig) -> (Recorder, Session) {
        let mut rec = Recorder::new();
        let store = SectorStore::demo();
        let world = build_world(&mut rec, &config.assets, &store, 1.0).unwrap();
        (rec, Session::new(config, store, world, 0))
    }

    #[test]
    fn render_draws_start_sector_first() {
        let config = bare_config();
        let (mut rec, session) = session(&config);
        let first = session.world.compiled(1).unwrap().list;
        let submitted = session.render(&mut rec, 16.0 / 9.0);
        assert_eq!(submitted, 11);
        assert_eq!(rec.calls()[0], first);
        assert!(rec.frame.contains(&Command::SetLighting(true)));
    }

    #[test]
    fn held_forward_moves_player() {
        let config = bare_config();
        let (_, mut session) = session(&config);
        let start = session.player;
        session.input.on_key_event(KeyCode::KeyE, true, false);
        session.update(100, ActionState::default());
        let moved = (session.player.x - start.x).hypot(session.player.y - start.y);
        assert!((moved - 10.0).abs() < 1e-9);
    }

    #[test]
    fn gamepad_state_merges_with_keyboard() {
        let config = bare_config();
        let (_, mut session) = session(&config);
        let start = session.player.facing;
        let pad = ActionState { turn_left: true, ..Default::default() };
        session.update(25, pad);
        assert_ne!(session.player.facing, start);
    }

    #[test]
    fn toggles_are_applied_or_forwarded() {
        let config = bare_config();
        let (_, mut session) = session(&config);
        session.input.on_key_event(KeyCode::KeyL, true, false);
        session.input.on_key_event(KeyCode::Escape, true, false);
        let pending = session.update(0, ActionState::default());
        assert!(!session.lighting);
        assert_eq!(pending, vec![ControlEvent::Quit]);

        session.input.on_key_event(KeyCode::Backquote, true, false);
        let pending = session.update(0, ActionState::default());
        assert!(session.text_input);
        assert_eq!(pending, vec![ControlEvent::ToggleTextInput]);
    }

    #[test]
    fn optional_model_missing_is_skipped() {
        let mut config = bare_config();
        config.assets.models.push(ModelAsset {
            path: PathBuf::from("/nonexistent/teapot.obj"),
            required: false,
            color: [1.0; 4],
            sector: Some(0),
            scale: 0.25,
        });
        let mut rec = Recorder::new();
        let world = build_world(&mut rec, &config.assets, &SectorStore::demo(), 1.0).unwrap();
        assert!(world.sprites().is_empty());

        config.assets.models[0].required = true;
        let err = build_world(&mut rec, &config.assets, &SectorStore::demo(), 1.0).unwrap_err();
        assert!(matches!(err, WorldError::Asset(_)));
    }

    #[test]
    fn model_is_placed_at_sector_centroid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tri.obj");
        std::fs::write(&path, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();

        let mut config = bare_config();
        config.assets.models.push(ModelAsset {
            path,
            required: true,
            color: [1.0, 1.0, 0.0, 1.0],
            sector: Some(0),
            scale: 0.25,
        });
        let (mut rec, session) = session(&config);
        let sprite = session.world.sprites()[0];
        let c = sector_centroid(session.store.get(0).unwrap()).unwrap();
        assert_eq!(sprite.position, Vec3::new(c.x, 0.5, c.y));

        session.render(&mut rec, 1.0);
        let model_list = session.world.model(0).unwrap().list;
        assert_eq!(rec.calls().last(), Some(&model_list));
    }

    #[test]
    fn headless_runs_requested_frames() {
        let mut config = bare_config();
        config.graphics.draw_depth = 0;
        let report = run_headless(&config, SectorStore::demo(), 3).unwrap();
        assert_eq!(report.frames, 3);
        assert_eq!(report.last_frame_lists, 1);
        assert!(report.commands > 0);
        assert_eq!(report.player.last_tick, 45);
    }
}
