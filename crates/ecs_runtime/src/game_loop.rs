//! Fixed-timestep game loop
//!
//! Wall-clock time is accumulated (scaled by the simulation speed) and spent
//! in fixed-size update steps, at most `max_updates_per_frame` per frame.
//! A backlog beyond that bound is discarded rather than caught up, so a long
//! stall never turns into a burst of updates. Every frame ends with a render
//! whose interpolation factor is the unspent fraction of a step.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::ConfigError;
use crate::core::config::LoopConfig;
use crate::ecs::World;
use crate::foundation::fault;
use crate::foundation::time::Stopwatch;

/// Frames averaged for the reported FPS
const FPS_HISTORY_SIZE: usize = 60;

/// Receiver of the loop's fixed updates and renders
pub trait LoopHandler {
    /// Advance the simulation by one fixed step of `delta_time` seconds
    fn update(&mut self, delta_time: f32);

    /// Present a frame; `interpolation` is in `[0, 1]`
    fn render(&mut self, interpolation: f32);
}

impl LoopHandler for World {
    fn update(&mut self, delta_time: f32) {
        Self::update(self, delta_time);
    }

    fn render(&mut self, interpolation: f32) {
        Self::render(self, interpolation);
    }
}

/// Loop state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoopState {
    /// Not driving frames
    Stopped,
    /// Driving updates and renders
    Running,
    /// Rendering only, simulation frozen
    Paused,
}

/// Loop timing statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoopStats {
    /// Moving average of frames per second
    pub fps: f64,
    /// Wall-clock duration of the last frame in milliseconds
    pub frame_time_ms: f64,
    /// Time spent in updates during the last frame in milliseconds
    pub update_time_ms: f64,
    /// Time spent rendering the last frame in milliseconds
    pub render_time_ms: f64,
    /// Fixed updates run by the last frame
    pub updates_this_frame: u32,
    /// Frames rendered
    pub frame_count: u64,
    /// Fixed updates run
    pub update_count: u64,
}

/// Fixed-timestep driver for a [`LoopHandler`]
#[derive(Debug)]
pub struct GameLoop {
    config: LoopConfig,
    fixed_delta: Duration,
    state: LoopState,
    accumulator: Duration,
    simulated_time: Duration,
    speed: f64,
    last_tick: Option<Instant>,
    stats: LoopStats,
    fps_history: VecDeque<f64>,
}

impl GameLoop {
    /// Create a stopped loop
    pub fn new(config: LoopConfig) -> Result<Self, ConfigError> {
        config.validate().map_err(ConfigError::Invalid)?;
        let fixed_delta = Duration::from_secs(1) / config.target_fps;

        Ok(Self {
            config,
            fixed_delta,
            state: LoopState::Stopped,
            accumulator: Duration::ZERO,
            simulated_time: Duration::ZERO,
            speed: 1.0,
            last_tick: None,
            stats: LoopStats::default(),
            fps_history: VecDeque::with_capacity(FPS_HISTORY_SIZE),
        })
    }

    /// Start driving frames
    pub fn start(&mut self) {
        if self.state == LoopState::Running {
            log::warn!("Game loop already running");
            return;
        }
        log::info!("Game loop starting at {} updates/s", self.config.target_fps);
        self.state = LoopState::Running;
        self.accumulator = Duration::ZERO;
        self.last_tick = Some(Instant::now());
    }

    /// Stop driving frames
    pub fn stop(&mut self) {
        if self.state == LoopState::Stopped {
            return;
        }
        log::info!("Game loop stopping");
        self.state = LoopState::Stopped;
        self.last_tick = None;
    }

    /// Freeze the simulation; frames still render
    pub fn pause(&mut self) {
        if self.state != LoopState::Running {
            return;
        }
        log::info!("Game loop paused");
        self.state = LoopState::Paused;
    }

    /// Resume a paused loop, discarding time accumulated so far
    pub fn resume(&mut self) {
        if self.state != LoopState::Paused {
            return;
        }
        log::info!("Game loop resumed");
        self.state = LoopState::Running;
        self.accumulator = Duration::ZERO;
        self.last_tick = Some(Instant::now());
    }

    /// Pause if running, resume if paused
    pub fn toggle_pause(&mut self) {
        match self.state {
            LoopState::Running => self.pause(),
            LoopState::Paused => self.resume(),
            LoopState::Stopped => {}
        }
    }

    /// Run exactly one fixed update followed by a full render
    ///
    /// Refused while stopped. Works while paused, which is its main use.
    pub fn step(&mut self, handler: &mut impl LoopHandler) -> bool {
        if self.state == LoopState::Stopped {
            log::warn!("Cannot step a stopped game loop");
            return false;
        }

        self.perform_update(handler);
        self.perform_render(handler, 1.0);
        self.stats.frame_count += 1;
        true
    }

    /// Set the simulation speed multiplier; must be positive
    pub fn set_speed(&mut self, speed: f64) -> bool {
        if !(speed > 0.0 && speed.is_finite()) {
            log::warn!("Simulation speed must be positive, got {}", speed);
            return false;
        }
        log::info!("Simulation speed set to {}x", speed);
        self.speed = speed;
        true
    }

    /// Drive one frame using the wall-clock time since the previous tick
    pub fn tick(&mut self, handler: &mut impl LoopHandler) -> u32 {
        let now = Instant::now();
        let elapsed = self.last_tick.map_or(Duration::ZERO, |last| now.duration_since(last));
        self.last_tick = Some(now);
        self.advance(handler, elapsed)
    }

    /// Drive one frame of `elapsed` wall-clock time
    ///
    /// Returns the number of fixed updates run. A stopped loop does nothing.
    pub fn advance(&mut self, handler: &mut impl LoopHandler, elapsed: Duration) -> u32 {
        if self.state == LoopState::Stopped {
            return 0;
        }

        self.record_fps(elapsed);
        self.stats.frame_time_ms = elapsed.as_secs_f64() * 1000.0;

        if self.state == LoopState::Paused {
            self.perform_render(handler, 0.0);
            self.stats.updates_this_frame = 0;
            self.stats.frame_count += 1;
            return 0;
        }

        self.accumulator += elapsed.mul_f64(self.speed);

        let stopwatch = Stopwatch::start_new();
        let mut updates = 0;
        while self.accumulator >= self.fixed_delta && updates < self.config.max_updates_per_frame {
            self.perform_update(handler);
            self.accumulator -= self.fixed_delta;
            updates += 1;
        }

        if self.accumulator > self.fixed_delta * self.config.max_updates_per_frame {
            log::warn!(
                "Game loop fell behind by {:.1} ms, discarding backlog",
                self.accumulator.as_secs_f64() * 1000.0
            );
            self.accumulator = Duration::ZERO;
        }
        self.stats.update_time_ms = stopwatch.elapsed_millis();
        self.stats.updates_this_frame = updates;

        let interpolation = self.interpolation();
        self.perform_render(handler, interpolation);
        self.stats.frame_count += 1;
        updates
    }

    /// Drive `frames` frames of `frame_time` each; returns the updates run
    pub fn run_for(&mut self, handler: &mut impl LoopHandler, frames: u32, frame_time: Duration) -> u64 {
        (0..frames)
            .map(|_| u64::from(self.advance(handler, frame_time)))
            .sum()
    }

    fn perform_update(&mut self, handler: &mut impl LoopHandler) {
        let delta_time = self.fixed_delta.as_secs_f32();
        if let Err(message) = fault::contain(|| handler.update(delta_time)) {
            log::error!("Game loop update failed: {}", message);
        }
        self.simulated_time += self.fixed_delta;
        self.stats.update_count += 1;
    }

    fn perform_render(&mut self, handler: &mut impl LoopHandler, interpolation: f32) {
        let stopwatch = Stopwatch::start_new();
        if let Err(message) = fault::contain(|| handler.render(interpolation)) {
            log::error!("Game loop render failed: {}", message);
        }
        self.stats.render_time_ms = stopwatch.elapsed_millis();
    }

    fn record_fps(&mut self, elapsed: Duration) {
        let seconds = elapsed.as_secs_f64();
        let fps = if seconds > 0.0 { 1.0 / seconds } else { 0.0 };

        if self.fps_history.len() == FPS_HISTORY_SIZE {
            self.fps_history.pop_front();
        }
        self.fps_history.push_back(fps);
        self.stats.fps = (self.fps_history.iter().sum::<f64>() / self.fps_history.len() as f64).round();
    }

    /// Unspent fraction of a fixed step, in `[0, 1]`
    ///
    /// A frame capped by `max_updates_per_frame` can leave more than one step
    /// unspent; that time carries over to the next frame while the render
    /// sees `1.0`.
    pub fn interpolation(&self) -> f32 {
        let fraction = self.accumulator.as_secs_f64() / self.fixed_delta.as_secs_f64();
        fraction.min(1.0) as f32
    }

    /// Current state
    pub const fn state(&self) -> LoopState {
        self.state
    }

    /// Whether the loop is running (not paused or stopped)
    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    /// Whether the loop is paused
    pub fn is_paused(&self) -> bool {
        self.state == LoopState::Paused
    }

    /// Simulation speed multiplier
    pub const fn speed(&self) -> f64 {
        self.speed
    }

    /// Length of one fixed update in seconds
    pub fn fixed_delta_time(&self) -> f32 {
        self.fixed_delta.as_secs_f32()
    }

    /// Simulated time covered by all fixed updates
    pub const fn simulated_time(&self) -> Duration {
        self.simulated_time
    }

    /// Timing statistics
    pub const fn stats(&self) -> &LoopStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[derive(Default)]
    struct Recorder {
        updates: Vec<f32>,
        renders: Vec<f32>,
    }

    impl LoopHandler for Recorder {
        fn update(&mut self, delta_time: f32) {
            self.updates.push(delta_time);
        }

        fn render(&mut self, interpolation: f32) {
            self.renders.push(interpolation);
        }
    }

    fn running_loop(fps: u32, max_updates: u32) -> GameLoop {
        let mut game_loop = GameLoop::new(
            LoopConfig::new()
                .with_target_fps(fps)
                .with_max_updates_per_frame(max_updates),
        )
        .unwrap();
        game_loop.start();
        game_loop
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(matches!(
            GameLoop::new(LoopConfig::new().with_target_fps(0)),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_stopped_loop_does_nothing() {
        let mut game_loop = GameLoop::new(LoopConfig::default()).unwrap();
        let mut recorder = Recorder::default();

        assert_eq!(game_loop.advance(&mut recorder, Duration::from_millis(100)), 0);
        assert!(!game_loop.step(&mut recorder));
        assert!(recorder.updates.is_empty());
        assert!(recorder.renders.is_empty());
    }

    #[test]
    fn test_fixed_steps_and_interpolation() {
        let mut game_loop = running_loop(10, 3);
        let mut recorder = Recorder::default();

        assert_eq!(game_loop.advance(&mut recorder, Duration::from_millis(250)), 2);
        assert_eq!(recorder.updates.len(), 2);
        assert_relative_eq!(recorder.updates[0], 0.1);
        assert_relative_eq!(recorder.renders[0], 0.5, epsilon = 1e-4);

        assert_eq!(game_loop.advance(&mut recorder, Duration::from_millis(50)), 1);
        assert_relative_eq!(recorder.renders[1], 0.0, epsilon = 1e-4);
        assert_eq!(game_loop.stats().update_count, 3);
        assert_eq!(game_loop.stats().frame_count, 2);
    }

    #[test]
    fn test_backlog_is_discarded() {
        let mut game_loop = running_loop(10, 3);
        let mut recorder = Recorder::default();

        assert_eq!(game_loop.advance(&mut recorder, Duration::from_secs(2)), 3);
        assert_relative_eq!(game_loop.interpolation(), 0.0);
        assert_eq!(game_loop.stats().updates_this_frame, 3);
    }

    #[test]
    fn test_capped_frame_renders_at_most_one_step_ahead() {
        let mut game_loop = running_loop(10, 3);
        let mut recorder = Recorder::default();

        // 550 ms leaves 250 ms after three updates, below the discard bound
        assert_eq!(game_loop.advance(&mut recorder, Duration::from_millis(550)), 3);
        assert_eq!(recorder.renders, vec![1.0]);
        assert_relative_eq!(game_loop.interpolation(), 1.0);

        // The leftover is carried, not lost
        assert_eq!(game_loop.advance(&mut recorder, Duration::ZERO), 2);
        assert_relative_eq!(recorder.renders[1], 0.5, epsilon = 1e-4);
        assert!(recorder.renders.iter().all(|value| (0.0..=1.0).contains(value)));
    }

    #[test]
    fn test_speed_scales_accumulation() {
        let mut game_loop = running_loop(10, 5);
        let mut recorder = Recorder::default();

        assert!(!game_loop.set_speed(0.0));
        assert!(!game_loop.set_speed(f64::NAN));
        assert!(game_loop.set_speed(2.0));
        assert_eq!(game_loop.advance(&mut recorder, Duration::from_millis(200)), 4);
        assert_relative_eq!(game_loop.simulated_time().as_secs_f64(), 0.4, epsilon = 1e-9);
    }

    #[test]
    fn test_pause_renders_only_and_step_advances() {
        let mut game_loop = running_loop(10, 3);
        let mut recorder = Recorder::default();

        game_loop.toggle_pause();
        assert!(game_loop.is_paused());
        assert_eq!(game_loop.advance(&mut recorder, Duration::from_millis(500)), 0);
        assert!(recorder.updates.is_empty());
        assert_eq!(recorder.renders, vec![0.0]);

        assert!(game_loop.step(&mut recorder));
        assert_eq!(recorder.updates.len(), 1);
        assert_eq!(recorder.renders, vec![0.0, 1.0]);

        game_loop.toggle_pause();
        assert!(game_loop.is_running());
        game_loop.stop();
        assert_eq!(game_loop.state(), LoopState::Stopped);
    }

    #[test]
    fn test_fps_moving_average() {
        let mut game_loop = running_loop(60, 3);
        let mut recorder = Recorder::default();

        game_loop.run_for(&mut recorder, 10, Duration::from_millis(20));
        assert_relative_eq!(game_loop.stats().fps, 50.0);
        assert_relative_eq!(game_loop.stats().frame_time_ms, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_drives_world_frames() {
        let mut world = World::new();
        world.init();
        let mut game_loop = running_loop(50, 3);

        let updates = game_loop.run_for(&mut world, 5, Duration::from_millis(20));
        assert_eq!(updates, 5);
        assert_eq!(world.frame_count(), 5);
        assert_relative_eq!(world.total_time(), 0.1, epsilon = 1e-6);
    }
}
