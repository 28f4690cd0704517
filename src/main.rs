//! terrastream - streaming dual-resolution terrain
//!
//! Headless flight driver: moves a viewpoint across the terrain, streams the
//! chunk window around it and attaches Ready chunks to headless render and
//! physics collaborators.

mod config;
mod scene;

use anyhow::{Context, Result};
use config::AppConfig;
use glam::Vec3;
use scene::HeadlessScene;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use std::{env, thread};
use terrastream_core::{SimTick, WorldSeed};
use terrastream_testkit::{EventRecord, JsonlSink, MeshMetricSink};
use terrastream_world::{IdleReport, NoiseOracle, OracleHandle, TerrainStreamer};
use tracing::{info, warn};

/// Upper bound on idle slices spent settling the final window.
const MAX_SETTLE_SLICES: u32 = 10_000;

fn main() -> Result<()> {
    // Initialize tracing with INFO level by default (can be overridden via RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting terrastream v{}", env!("CARGO_PKG_VERSION"));

    let cli = CliOptions::parse(env::args().skip(1));
    let mut app = match cli.config.as_deref() {
        Some(path) => AppConfig::load_from_path(path),
        None => AppConfig::load(),
    };
    cli.apply(&mut app);

    if let Some(path) = cli.dump_config.as_deref() {
        app.save_to_path(path)
            .with_context(|| format!("failed to write config {}", path.display()))?;
        info!(path = %path.display(), "effective config written");
    }

    run(app, &cli)
}

fn run(app: AppConfig, cli: &CliOptions) -> Result<()> {
    let seed = WorldSeed::from_phrase(&app.seed);
    let oracle = OracleHandle::pending();
    let mut streamer = TerrainStreamer::new(app.terrain.clone(), oracle.clone())
        .context("invalid terrain configuration")?;

    // The generator comes up off the main loop; chunks requested meanwhile stay queued.
    let init = {
        let oracle = oracle.clone();
        let seed = seed.clone();
        thread::spawn(move || {
            oracle.install(Arc::new(NoiseOracle::new(seed)));
        })
    };

    let mut events = match cli.events.as_ref() {
        Some(path) => Some(
            JsonlSink::create(path)
                .with_context(|| format!("failed to create event log {}", path.display()))?,
        ),
        None => None,
    };

    let mut scene = HeadlessScene::new(app.terrain.chunk_world_size);
    let heading = app.flight.heading_degrees.to_radians();
    let direction = Vec3::new(heading.cos(), 0.0, heading.sin());
    let start = Instant::now();
    let mut tick = SimTick::ZERO;
    let mut window_moves = 0u64;

    info!(
        seed = %seed,
        ticks = app.flight.ticks,
        render_distance = app.terrain.render_distance,
        "flight started"
    );

    for _ in 0..app.flight.ticks {
        let mut position = direction * app.flight.speed * tick.0 as f32;
        let ground = scene.ground_height(position.x, position.z).unwrap_or(0.0);
        position.y = ground + app.flight.camera_height;

        if let Some(report) = streamer.step(position, &mut scene) {
            window_moves += 1;
            if let Some(sink) = events.as_mut() {
                let centre = streamer
                    .window()
                    .current()
                    .map(|key| key.to_string())
                    .unwrap_or_default();
                let payload = format!(
                    "centre={centre} added={} removed={}",
                    report.added.len(),
                    report.removed.len()
                );
                sink.write(&EventRecord {
                    tick,
                    kind: "window_moved",
                    payload: &payload,
                })?;
            }
        }

        for _ in 0..app.flight.idle_slices_per_tick {
            let report = streamer.run_idle(&mut scene);
            log_idle(events.as_mut(), tick, &report)?;
        }
        log_scene(events.as_mut(), tick, &mut scene)?;
        tick = tick.advance(1);
    }

    if init.join().is_err() {
        warn!("oracle initializer panicked");
    }

    let mut slices = 0;
    while !streamer.is_settled() && slices < MAX_SETTLE_SLICES {
        let report = streamer.run_idle(&mut scene);
        log_idle(events.as_mut(), tick, &report)?;
        slices += 1;
    }
    log_scene(events.as_mut(), tick, &mut scene)?;
    if !streamer.is_settled() {
        warn!(slices, "window did not settle");
    }

    if let Some(sink) = events.as_mut() {
        sink.flush()?;
        info!(events = sink.written(), "event log written");
    }

    if let Some(path) = cli.mesh_metrics.as_ref() {
        let mut sink = MeshMetricSink::create(path)
            .with_context(|| format!("failed to create mesh metrics {}", path.display()))?;
        sink.write(&scene.mesh_metrics())?;
        info!(path = %path.display(), "mesh metrics written");
    }

    let metrics = streamer.metrics();
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        window_moves,
        built = metrics.built,
        cancelled = metrics.cancelled,
        failed = metrics.failed,
        evicted = metrics.evicted,
        attached = scene.attached(),
        attached_total = scene.attached_total(),
        colliders = scene.collider_count(),
        "flight finished"
    );
    Ok(())
}

fn log_idle(sink: Option<&mut JsonlSink>, tick: SimTick, report: &IdleReport) -> Result<()> {
    let Some(sink) = sink else {
        return Ok(());
    };
    for key in &report.failed {
        sink.write(&EventRecord {
            tick,
            kind: "chunk_failed",
            payload: &key.to_string(),
        })?;
    }
    Ok(())
}

fn log_scene(sink: Option<&mut JsonlSink>, tick: SimTick, scene: &mut HeadlessScene) -> Result<()> {
    let drained = scene.drain_events();
    let Some(sink) = sink else {
        return Ok(());
    };
    for event in drained {
        sink.write(&EventRecord {
            tick,
            kind: event.kind(),
            payload: &event.key().to_string(),
        })?;
    }
    Ok(())
}

#[derive(Debug, Default)]
struct CliOptions {
    config: Option<PathBuf>,
    seed: Option<String>,
    ticks: Option<u64>,
    speed: Option<f32>,
    heading: Option<f32>,
    render_distance: Option<i32>,
    events: Option<PathBuf>,
    mesh_metrics: Option<PathBuf>,
    dump_config: Option<PathBuf>,
}

impl CliOptions {
    fn parse<I: Iterator<Item = String>>(mut args: I) -> Self {
        let mut opts = CliOptions::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    if let Some(path) = args.next() {
                        opts.config = Some(PathBuf::from(path));
                    } else {
                        tracing::error!("--config requires a file path");
                    }
                }
                "--seed" => {
                    if let Some(phrase) = args.next() {
                        opts.seed = Some(phrase);
                    } else {
                        tracing::error!("--seed requires a phrase");
                    }
                }
                "--ticks" => {
                    if let Some(raw) = args.next() {
                        match raw.parse::<u64>() {
                            Ok(value) => opts.ticks = Some(value),
                            Err(err) => {
                                tracing::error!(%err, value = %raw, "--ticks must be an integer");
                            }
                        }
                    } else {
                        tracing::error!("--ticks requires an integer");
                    }
                }
                "--speed" => {
                    if let Some(raw) = args.next() {
                        match raw.parse::<f32>() {
                            Ok(value) if value.is_finite() => opts.speed = Some(value),
                            _ => tracing::error!(value = %raw, "--speed must be a finite number"),
                        }
                    } else {
                        tracing::error!("--speed requires a number");
                    }
                }
                "--heading" => {
                    if let Some(raw) = args.next() {
                        match raw.parse::<f32>() {
                            Ok(value) if value.is_finite() => opts.heading = Some(value),
                            _ => tracing::error!(value = %raw, "--heading must be degrees"),
                        }
                    } else {
                        tracing::error!("--heading requires degrees");
                    }
                }
                "--render-distance" => {
                    if let Some(raw) = args.next() {
                        match raw.parse::<i32>() {
                            Ok(value) => opts.render_distance = Some(value),
                            Err(err) => {
                                tracing::error!(
                                    %err,
                                    value = %raw,
                                    "--render-distance must be an integer"
                                );
                            }
                        }
                    } else {
                        tracing::error!("--render-distance requires an integer");
                    }
                }
                "--events" => {
                    if let Some(path) = args.next() {
                        opts.events = Some(PathBuf::from(path));
                    } else {
                        tracing::error!("--events requires a file path");
                    }
                }
                "--mesh-metrics" => {
                    if let Some(path) = args.next() {
                        opts.mesh_metrics = Some(PathBuf::from(path));
                    } else {
                        tracing::error!("--mesh-metrics requires a file path");
                    }
                }
                "--dump-config" => {
                    if let Some(path) = args.next() {
                        opts.dump_config = Some(PathBuf::from(path));
                    } else {
                        tracing::error!("--dump-config requires a file path");
                    }
                }
                other => {
                    tracing::warn!(arg = %other, "ignoring unknown argument");
                }
            }
        }

        opts
    }

    /// Command-line values win over the config file.
    fn apply(&self, app: &mut AppConfig) {
        if let Some(seed) = &self.seed {
            app.seed = seed.clone();
        }
        if let Some(value) = self.render_distance {
            app.terrain.render_distance = value.clamp(0, 16);
        }
        if let Some(value) = self.ticks {
            app.flight.ticks = value;
        }
        if let Some(value) = self.speed {
            app.flight.speed = value;
        }
        if let Some(value) = self.heading {
            app.flight.heading_degrees = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliOptions {
        CliOptions::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_flight_flags() {
        let cli = parse(&[
            "--seed",
            "canyon",
            "--ticks",
            "30",
            "--heading",
            "90",
            "--events",
            "out/events.jsonl",
        ]);
        assert_eq!(cli.seed.as_deref(), Some("canyon"));
        assert_eq!(cli.ticks, Some(30));
        assert_eq!(cli.heading, Some(90.0));
        assert_eq!(cli.events, Some(PathBuf::from("out/events.jsonl")));
        assert!(cli.mesh_metrics.is_none());
    }

    #[test]
    fn bad_values_are_ignored() {
        let cli = parse(&["--ticks", "many", "--speed", "NaN", "--render-distance"]);
        assert!(cli.ticks.is_none());
        assert!(cli.speed.is_none());
        assert!(cli.render_distance.is_none());
    }

    #[test]
    fn overrides_apply_to_config() {
        let cli = parse(&["--render-distance", "40", "--seed", "dunes", "--speed", "8"]);
        let mut app = AppConfig::default();
        cli.apply(&mut app);
        assert_eq!(app.terrain.render_distance, 16);
        assert_eq!(app.seed, "dunes");
        assert_eq!(app.flight.speed, 8.0);
        assert_eq!(app.flight.ticks, AppConfig::default().flight.ticks);
    }
}
