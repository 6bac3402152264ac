mod app;
mod asset;
mod error;
mod game;
mod render;
mod sim;
mod world;

use std::process::ExitCode;

use app::App;
use clap::Parser;
use game::config::{Args, GameConfig};
use winit::event_loop::EventLoop;
use world::store::SectorStore;

fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.log_level())
        .parse_default_env()
        .init();
    if args.log_level() == log::LevelFilter::Warn {
        log::warn!("No debugging logs, use --debug or --verbose to see them");
    } else {
        log::warn!("Logging at {} level", args.log_level());
    }

    let mut config = GameConfig::load();
    args.apply(&mut config);

    let store = match &config.assets.map {
        Some(path) => match SectorStore::load(path) {
            Ok(store) => store,
            Err(e) => {
                log::error!("failed to load map: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => SectorStore::demo(),
    };
    store.log_sector(config.gameplay.start_sector);

    if let Some(frames) = args.headless {
        return match app::run_headless(&config, store, frames) {
            Ok(report) => {
                println!(
                    "{} frames, {} sector lists in the last frame, player at ({:.2}, {:.2}) facing {:.1}",
                    report.frames,
                    report.last_frame_lists,
                    report.player.x,
                    report.player.y,
                    report.player.facing
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                log::error!("{e}");
                ExitCode::FAILURE
            }
        };
    }

    let event_loop = EventLoop::new().expect("failed to create event loop");
    let mut app = App::new(config, store);
    event_loop.run_app(&mut app).expect("event loop error");
    match app.take_error() {
        Some(_) => ExitCode::FAILURE,
        None => ExitCode::SUCCESS,
    }
}
