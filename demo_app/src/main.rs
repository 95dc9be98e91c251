//! Headless runtime demo
//!
//! Spawns a small asteroid field, lets the movement system integrate it
//! through the fixed-timestep loop, expires debris with a local lifetime
//! system and prints the resulting statistics as RON.
//!
//! Usage: `headless_demo [config.toml|config.ron]`

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use ecs_runtime::foundation::logging;
use ecs_runtime::prelude::*;
use nalgebra::Vector2;

/// Simulated frames to run
const FRAMES: u32 = 180;

/// Simulated seconds left before the entity despawns
#[derive(Debug, Clone, Copy)]
struct Lifetime {
    remaining: f32,
}

impl Component for Lifetime {
    const TYPE: ComponentType = ComponentType::from_static("Lifetime");
}

/// Destroys entities whose lifetime ran out
struct LifetimeSystem {
    expired: u64,
}

impl System for LifetimeSystem {
    fn name(&self) -> &str {
        "LifetimeSystem"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn update(&mut self, world: &mut World, delta_time: f32) -> Result<(), SystemError> {
        for entity in world.query(&[Lifetime::TYPE]) {
            let Some(lifetime) = world.component_mut::<Lifetime>(entity) else {
                continue;
            };
            lifetime.remaining -= delta_time;
            if lifetime.remaining <= 0.0 && world.destroy_entity(entity) {
                self.expired += 1;
            }
        }
        Ok(())
    }

    fn stats(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([("expired".to_string(), self.expired as f64)])
    }
}

fn load_config() -> Result<RuntimeConfig, ConfigError> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading runtime configuration from {}", path);
            RuntimeConfig::load_from_file(&path)?
        }
        None => RuntimeConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn spawn_field(world: &mut World) {
    for i in 0..8_u8 {
        let angle = f32::from(i) * std::f32::consts::FRAC_PI_4;
        world.create_entity_with(
            Some("asteroid"),
            ComponentBundle::new()
                .with_component(Transform::at(angle.cos() * 100.0, angle.sin() * 100.0))
                .with_component(
                    Velocity::new(-angle.sin() * 20.0, angle.cos() * 20.0)
                        .with_angular(0.5)
                        .with_drag(0.05, 0.0),
                ),
        );
    }

    for i in 0..4_u8 {
        world.create_entity_with(
            Some("debris"),
            ComponentBundle::new()
                .with_component(Transform::at(0.0, 0.0))
                .with_component(Velocity::new(f32::from(i) * 10.0, 5.0))
                .with_component(Lifetime {
                    remaining: 0.5 + f32::from(i) * 0.5,
                }),
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    logging::init_with_level(&config.log_level);
    log::info!("Starting headless demo");

    let mut world = World::with_config(&config);
    world.register_system(Box::new(MovementSystem::new()))?;
    world.register_system(Box::new(LifetimeSystem { expired: 0 }))?;

    let destroyed = Rc::new(Cell::new(0_u32));
    let counter = Rc::clone(&destroyed);
    world.on(EventKind::EntityDestroyed, move |_, _| counter.set(counter.get() + 1));

    world.init();
    spawn_field(&mut world);

    if let Some(&first) = world.entities_by_tag("asteroid").first() {
        world.emit_custom(
            TELEPORT_EVENT,
            Teleport {
                entity: first,
                position: Vector2::new(500.0, 500.0),
                rotation: Some(0.0),
            },
        );
    }

    let mut game_loop = GameLoop::new(config.game_loop.clone())?;
    game_loop.start();
    let frame_time = Duration::from_secs(1) / config.game_loop.target_fps;
    let updates = game_loop.run_for(&mut world, FRAMES, frame_time);
    game_loop.stop();

    log::info!(
        "Ran {} updates, {} entities destroyed, {} asteroids remain",
        updates,
        destroyed.get(),
        world.entities_by_tag("asteroid").len()
    );

    let pretty = ron::ser::PrettyConfig::default();
    println!("{}", ron::ser::to_string_pretty(&world.stats(), pretty.clone())?);
    println!("{}", ron::ser::to_string_pretty(game_loop.stats(), pretty)?);

    world.destroy();
    log::info!("Headless demo completed");
    Ok(())
}
