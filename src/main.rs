//! Orbital Drift entry point
//!
//! Builds a small demo universe, steps it and logs every resolved contact.
//! Run with `RUST_LOG=debug` to see each event. An optional first argument
//! names a JSON file with physics settings.

use orbital_drift::sim::{Entity, EntityKind, Outcome, World};
use orbital_drift::{PhysicsSettings, Result, SimError, Vector};

/// Simulated seconds per step call
const STEP_DURATION: f64 = 5.0;
/// Number of step calls in the demo
const STEPS: usize = 24;
/// Hull mass of both demo ships (kg)
const HULL: f64 = 1.0e24;

fn load_settings() -> Result<PhysicsSettings> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .map_err(|e| SimError::argument(format!("cannot read {path}: {e}")))?;
            PhysicsSettings::from_json(&json)
        }
        None => Ok(PhysicsSettings::with_seed(0x5eed)),
    }
}

fn run() -> Result<()> {
    let settings = load_settings()?;
    log::info!("Orbital Drift starting (seed {})", settings.seed);

    let mut world = World::new(settings);
    let universe = world.create_universe(2000.0, 1200.0)?;

    let hunter = Entity::ship(Vector::new(300.0, 600.0), Vector::new(12.0, 0.0), 12.0, 0.0, HULL)?;
    let hunter = world.insert(hunter);
    let drifter =
        Entity::ship(Vector::new(1700.0, 300.0), Vector::new(-20.0, 15.0), 12.0, 2.5, HULL)?;
    let drifter = world.insert(drifter);
    let bodies = [
        hunter,
        drifter,
        world.insert(Entity::asteroid(Vector::new(900.0, 400.0), Vector::new(-8.0, 25.0), 40.0)?),
        world.insert(Entity::asteroid(Vector::new(1200.0, 900.0), Vector::new(30.0, -10.0), 25.0)?),
        world.insert(Entity::planetoid(Vector::new(1000.0, 650.0), Vector::new(4.0, -3.0), 90.0)?),
    ];
    for id in bodies {
        world.attach(id, universe)?;
    }
    for _ in 0..3 {
        let bullet = world.insert(Entity::bullet(Vector::ZERO, Vector::ZERO, 3.0)?);
        world.load_bullet(hunter, bullet)?;
    }

    for step in 0..STEPS {
        // Simple autopilot: aim at the nearest asteroid and fire every few steps
        if world.is_alive(hunter)? && world.universe_of(hunter)?.is_some() {
            if let Some(target) = world.nearest_of_kind(hunter, EntityKind::Asteroid)? {
                let offset = world.position(target)? - world.position(hunter)?;
                let heading = world.entity(hunter)?.orientation().unwrap_or_default();
                world.turn(hunter, offset.to_angle() - heading)?;
            }
            world.set_thruster(hunter, step % 4 == 0)?;
            if step % 6 == 0 {
                if let Some(bullet) = world.fire_bullet(hunter)? {
                    log::info!("Hunter fired {bullet:?}");
                }
            }
        }

        let report = world.step(universe, STEP_DURATION)?;
        for resolved in &report.events {
            match &resolved.outcome {
                Outcome::Reflected { .. } | Outcome::Elastic { .. } => {
                    log::debug!("t+{:.3} {:?}", resolved.at, resolved.outcome)
                }
                outcome => log::info!("t+{:.3} {:?}", resolved.at, outcome),
            }
        }
        log::info!(
            "Step {step}: {} events, {} members, {} deaths",
            report.events.len(),
            world.universe(universe)?.len(),
            report.deaths().len()
        );
    }

    for kind in EntityKind::ALL {
        let alive = world
            .members(universe)?
            .into_iter()
            .filter(|&id| world.kind(id).is_ok_and(|k| k == kind))
            .count();
        log::info!("{alive} {} left", kind.as_str());
    }
    for id in world.members(universe)? {
        let entity = world.entity(id)?;
        log::info!(
            "{} {id:?} at {} moving {} (r = {:.2})",
            entity.kind().as_str(),
            entity.position(),
            entity.velocity(),
            entity.radius()
        );
    }
    log::info!("Pruned {} dead entities", world.prune_dead());
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        log::error!("Demo failed: {e}");
        std::process::exit(1);
    }
}
