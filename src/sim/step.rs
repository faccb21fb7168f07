//! Event-driven stepping
//!
//! A step never ticks. It jumps every member straight to the next predicted
//! contact, resolves it, and repeats until the requested duration is used
//! up. Motion between contacts is exact.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::collision::{CollisionEvent, next_event};
use super::entity::EntityId;
use super::resolve::Outcome;
use super::universe::UniverseId;
use super::world::World;
use crate::error::{Result, SimError};

/// A contact resolved during a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEvent {
    /// Offset from the start of the step
    pub at: f64,
    pub event: CollisionEvent,
    pub outcome: Outcome,
}

/// Everything that happened during one call to `World::step`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub elapsed: f64,
    /// Resolved contacts in the order they happened
    pub events: Vec<ResolvedEvent>,
    /// Planetoids that shrank below the minimum radius
    pub expired: Vec<EntityId>,
    /// The event cap was hit; the tail of the step ran without resolving contacts
    pub truncated: bool,
}

impl StepReport {
    /// Every entity that died during the step
    pub fn deaths(&self) -> Vec<EntityId> {
        let mut dead = Vec::new();
        for resolved in &self.events {
            match &resolved.outcome {
                Outcome::Destroyed { dead: ids, .. } => dead.extend(ids.iter().copied()),
                Outcome::BulletSpent { bullet } => dead.push(*bullet),
                Outcome::Lost { ship } => dead.push(*ship),
                _ => {}
            }
        }
        dead.extend(self.expired.iter().copied());
        dead
    }
}

impl World {
    /// Advance a universe by `duration` using the world's own RNG
    pub fn step(&mut self, universe: UniverseId, duration: f64) -> Result<StepReport> {
        let mut rng = self.rng.clone();
        let report = self.step_with_rng(universe, duration, &mut rng)?;
        self.rng = rng;
        Ok(report)
    }

    /// Advance a universe by `duration`, drawing randomness from `rng`.
    ///
    /// Fails before touching anything if the universe is missing or the
    /// duration is not a finite non-negative number.
    pub fn step_with_rng<R: Rng + ?Sized>(
        &mut self,
        universe: UniverseId,
        duration: f64,
        rng: &mut R,
    ) -> Result<StepReport> {
        self.universe(universe)?;
        if !duration.is_finite() || duration < 0.0 {
            return Err(SimError::argument(format!(
                "step duration must be finite and non-negative, got {duration}"
            )));
        }

        let cap = self.settings.max_events_per_step;
        let mut report = StepReport::default();
        let mut remaining = duration;
        loop {
            let event = match self.universes.get(universe) {
                Some(target) => next_event(&self.entities, target),
                None => CollisionEvent::never(),
            };
            // Also catches the infinite "never" event
            if !(event.time <= remaining) {
                self.advance_members(universe, remaining, rng, &mut report.expired);
                break;
            }
            // Truncated only when a contact inside the step goes unresolved
            if report.events.len() >= cap {
                log::warn!(
                    "Universe {universe:?} hit {cap} events in one step; coasting {remaining}"
                );
                self.advance_members(universe, remaining, rng, &mut report.expired);
                report.truncated = true;
                break;
            }

            self.advance_members(universe, event.time, rng, &mut report.expired);
            remaining -= event.time;

            let outcome = self.resolve(&event, rng);
            if outcome == Outcome::Stale {
                continue;
            }
            let at = duration - remaining;
            log::debug!("t+{at:.6}: {:?} -> {outcome:?}", event.participants);
            report.events.push(ResolvedEvent { at, event, outcome });
        }

        report.elapsed = duration;
        Ok(report)
    }

    /// Move every member by `dt`, then apply thrust and planetoid shrinkage
    fn advance_members<R: Rng + ?Sized>(
        &mut self,
        universe: UniverseId,
        dt: f64,
        rng: &mut R,
        expired: &mut Vec<EntityId>,
    ) {
        let Ok(members) = self.members(universe) else {
            return;
        };
        let mut shrunk = Vec::new();

        for id in &members {
            let Some(entity) = self.entities.get_mut(*id) else {
                continue;
            };
            if entity.drift(dt) {
                shrunk.push(*id);
            }
            let position = entity.position();
            let thrusting = entity.thruster_active();
            let magazine = entity.magazine().to_vec();

            if thrusting && dt > 0.0 {
                self.thrust(*id, dt);
            }
            // Carried bullets ride along with their ship
            for bullet in magazine {
                if let Some(bullet) = self.entities.get_mut(bullet) {
                    let _ = bullet.set_position(position.x, position.y);
                }
            }
        }

        for id in shrunk {
            log::info!("Planetoid {id:?} shrank away");
            self.kill(id, rng);
            expired.push(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vector;
    use crate::settings::PhysicsSettings;
    use crate::sim::collision::Edge;
    use crate::sim::entity::Entity;
    use proptest::prelude::*;
    use rand::RngCore;

    // 2^80: exact in f64 and above the density minimum of a radius-10 ship
    const HULL: f64 = 1_208_925_819_614_629_174_706_176.0;

    /// Every draw is zero, so ranges sample their lower bound
    struct ZeroRng;

    impl RngCore for ZeroRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            dst.fill(0);
        }
    }

    fn setup(settings: PhysicsSettings, width: f64, height: f64) -> (World, UniverseId) {
        let mut world = World::new(settings);
        let universe = world.create_universe(width, height).unwrap();
        (world, universe)
    }

    fn add(world: &mut World, universe: UniverseId, entity: Entity) -> EntityId {
        let id = world.insert(entity);
        world.attach(id, universe).unwrap();
        id
    }

    fn ship(x: f64, y: f64, vx: f64, vy: f64) -> Entity {
        Entity::ship(Vector::new(x, y), Vector::new(vx, vy), 10.0, 0.0, HULL).unwrap()
    }

    fn at(x: f64, y: f64) -> Vector {
        Vector::new(x, y)
    }

    #[test]
    fn test_step_reflects_off_top_edge() {
        let (mut world, universe) = setup(PhysicsSettings::default(), 150.0, 50.0);
        let s = add(&mut world, universe, ship(30.0, 15.0, 15.0, 20.0));

        let report = world.step(universe, 2.0).unwrap();
        assert_eq!(report.elapsed, 2.0);
        assert!(!report.truncated);
        assert_eq!(report.events.len(), 1);
        let resolved = &report.events[0];
        assert!((resolved.at - 1.25).abs() < 1e-12);
        assert_eq!(resolved.outcome, Outcome::Reflected { entity: s, edge: Edge::Top });
        assert!((resolved.event.point.unwrap() - at(48.75, 50.0)).length() < 1e-9);

        assert!((world.position(s).unwrap() - at(60.0, 25.0)).length() < 1e-9);
        assert_eq!(world.velocity(s).unwrap(), Vector::new(15.0, -20.0));
    }

    #[test]
    fn test_step_head_on_ships_swap_velocities() {
        let (mut world, universe) = setup(PhysicsSettings::default(), 1000.0, 1000.0);
        let a = add(&mut world, universe, ship(100.0, 500.0, 10.0, 0.0));
        let b = add(&mut world, universe, ship(170.0, 500.0, -10.0, 0.0));

        let report = world.step(universe, 5.0).unwrap();
        assert_eq!(report.events.len(), 1);
        assert!((report.events[0].at - 2.5).abs() < 1e-12);
        assert!((world.velocity(a).unwrap() - Vector::new(-10.0, 0.0)).length() < 1e-12);
        assert!((world.velocity(b).unwrap() - Vector::new(10.0, 0.0)).length() < 1e-12);
        assert!((world.position(a).unwrap() - at(100.0, 500.0)).length() < 1e-9);
        assert!((world.position(b).unwrap() - at(170.0, 500.0)).length() < 1e-9);
    }

    #[test]
    fn test_step_bullet_runs_out_of_bounces() {
        let (mut world, universe) = setup(PhysicsSettings::default(), 100.0, 100.0);
        let bullet = Entity::bullet(at(50.0, 50.0), Vector::new(100.0, 0.0), 2.0).unwrap();
        let bullet = add(&mut world, universe, bullet);

        let report = world.step(universe, 2.0).unwrap();
        let outcomes: Vec<&Outcome> = report.events.iter().map(|e| &e.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                &Outcome::Reflected { entity: bullet, edge: Edge::Right },
                &Outcome::BulletSpent { bullet },
            ]
        );
        assert!((report.events[0].at - 0.48).abs() < 1e-9);
        assert!((report.events[1].at - 1.44).abs() < 1e-9);
        assert!(!world.is_alive(bullet).unwrap());
        assert!(world.universe(universe).unwrap().is_empty());
        assert_eq!(report.deaths(), vec![bullet]);
    }

    #[test]
    fn test_step_relocates_ship_hitting_planetoid() {
        let (mut world, universe) = setup(PhysicsSettings::default(), 100.0, 100.0);
        let s = add(&mut world, universe, ship(30.0, 50.0, 10.0, 0.0));
        let planet = Entity::planetoid(at(70.0, 50.0), Vector::ZERO, 10.0).unwrap();
        let planet = add(&mut world, universe, planet);

        // Contact at t=2; the zero generator lands the ship at (10, 10)
        let report = world.step_with_rng(universe, 3.0, &mut ZeroRng).unwrap();
        assert_eq!(report.events.len(), 1);
        assert!((report.events[0].at - 2.0).abs() < 1e-9);
        assert_eq!(report.events[0].outcome, Outcome::Relocated { ship: s, to: at(10.0, 10.0) });

        // Coasts from the new spot for the remaining second
        assert!((world.position(s).unwrap() - at(20.0, 10.0)).length() < 1e-9);
        assert_eq!(world.velocity(s).unwrap(), Vector::new(10.0, 0.0));
        assert_eq!(world.universe_of(s).unwrap(), Some(universe));
        assert_eq!(world.members(universe).unwrap().len(), 2);
        assert_eq!(world.position(planet).unwrap(), at(70.0, 50.0));

        // Nothing left pointing at the old spot
        let next = world.next_event(universe).unwrap();
        assert_eq!(next.second(), None);
    }

    #[test]
    fn test_step_ship_catches_own_bullet() {
        let (mut world, universe) = setup(PhysicsSettings::default(), 100.0, 100.0);
        let s = add(&mut world, universe, ship(50.0, 50.0, 0.0, 0.0));
        let bullet = world.insert(Entity::bullet(Vector::ZERO, Vector::ZERO, 2.0).unwrap());
        world.load_bullet(s, bullet).unwrap();
        world.fire_bullet(s).unwrap();

        // Out to the right wall at 98 and back to touch the ship at 62
        let report = world.step(universe, 1.0).unwrap();
        let outcomes: Vec<&Outcome> = report.events.iter().map(|e| &e.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                &Outcome::Reflected { entity: bullet, edge: Edge::Right },
                &Outcome::Reloaded { ship: s, bullet },
            ]
        );
        assert!((report.events[0].at - 0.144).abs() < 1e-9);
        assert!((report.events[1].at - 0.288).abs() < 1e-9);

        assert_eq!(world.members(universe).unwrap(), vec![s]);
        assert_eq!(world.entity(s).unwrap().magazine(), &[bullet]);
        let carried = world.entity(bullet).unwrap();
        assert!(carried.is_alive());
        assert_eq!(carried.universe(), None);
        assert_eq!(carried.bounces(), Some(0));
        assert_eq!(carried.position(), at(50.0, 50.0));
        assert!(report.deaths().is_empty());
    }

    #[test]
    fn test_event_cap_truncates_and_reports() {
        let settings = PhysicsSettings {
            max_events_per_step: 1,
            ..PhysicsSettings::with_seed(3)
        };
        let (mut world, universe) = setup(settings.clone(), 100.0, 100.0);
        let s = add(&mut world, universe, ship(50.0, 50.0, 20.0, 0.0));

        // Walls at t=2 and t=6; only the first is resolved
        let report = world.step(universe, 10.0).unwrap();
        assert!(report.truncated);
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.elapsed, 10.0);
        assert!((world.position(s).unwrap() - at(-70.0, 50.0)).length() < 1e-9);

        // Reaching the cap with nothing else due is not a truncation
        let (mut world, universe) = setup(settings, 100.0, 100.0);
        add(&mut world, universe, ship(50.0, 50.0, 20.0, 0.0));
        let report = world.step(universe, 3.0).unwrap();
        assert_eq!(report.events.len(), 1);
        assert!(!report.truncated);

        // The default cap resolves every wall
        let (mut world, universe) = setup(PhysicsSettings::default(), 100.0, 100.0);
        add(&mut world, universe, ship(50.0, 50.0, 20.0, 0.0));
        let report = world.step(universe, 10.0).unwrap();
        assert!(!report.truncated);
        assert!(report.events.len() >= 2);
    }

    #[test]
    fn test_step_rejects_bad_input_without_side_effects() {
        let (mut world, universe) = setup(PhysicsSettings::default(), 100.0, 100.0);
        let s = add(&mut world, universe, ship(50.0, 50.0, 3.0, 0.0));

        for duration in [f64::NAN, f64::INFINITY, -1.0] {
            let err = world.step(universe, duration).unwrap_err();
            assert!(matches!(err, SimError::InvalidArgument(_)));
        }
        assert_eq!(world.position(s).unwrap(), at(50.0, 50.0));

        world.universes.remove(universe);
        assert!(matches!(world.step(universe, 1.0), Err(SimError::NullReference(_))));
    }

    #[test]
    fn test_zero_duration_step_changes_nothing() {
        let (mut world, universe) = setup(PhysicsSettings::default(), 100.0, 100.0);
        let s = add(&mut world, universe, ship(50.0, 50.0, 3.0, 4.0));
        let report = world.step(universe, 0.0).unwrap();
        assert!(report.events.is_empty());
        assert_eq!(world.position(s).unwrap(), at(50.0, 50.0));
    }

    #[test]
    fn test_thruster_accelerates_along_orientation() {
        let settings = PhysicsSettings {
            thruster_force: HULL,
            ..PhysicsSettings::with_seed(3)
        };
        let (mut world, universe) = setup(settings, 1000.0, 1000.0);
        let s = add(&mut world, universe, ship(500.0, 500.0, 0.0, 0.0));
        world.turn(s, std::f64::consts::FRAC_PI_2).unwrap();
        world.set_thruster(s, true).unwrap();

        world.step(universe, 3.0).unwrap();
        let velocity = world.velocity(s).unwrap();
        assert!(velocity.x.abs() < 1e-9);
        assert!((velocity.y - 3.0).abs() < 1e-9);

        world.set_thruster(s, false).unwrap();
        world.step(universe, 1.0).unwrap();
        assert!((world.velocity(s).unwrap().y - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_planetoid_shrinks_away_during_step() {
        let settings = PhysicsSettings {
            planetoid_shrink_rate: 0.01,
            ..PhysicsSettings::with_seed(3)
        };
        let (mut world, universe) = setup(settings, 1000.0, 1000.0);
        let planet = Entity::planetoid(at(100.0, 500.0), Vector::new(10.0, 0.0), 5.5).unwrap();
        let planet = add(&mut world, universe, planet);

        let report = world.step(universe, 10.0).unwrap();
        assert_eq!(report.expired, vec![planet]);
        assert!(!world.is_alive(planet).unwrap());
        assert!(world.universe(universe).unwrap().is_empty());
    }

    #[test]
    fn test_carried_bullets_follow_ship() {
        let (mut world, universe) = setup(PhysicsSettings::default(), 1000.0, 1000.0);
        let s = add(&mut world, universe, ship(500.0, 500.0, 20.0, -10.0));
        let bullet = world.insert(Entity::bullet(Vector::ZERO, Vector::ZERO, 2.0).unwrap());
        world.load_bullet(s, bullet).unwrap();

        world.step(universe, 4.0).unwrap();
        assert_eq!(world.position(bullet).unwrap(), world.position(s).unwrap());
        assert_eq!(world.universe_of(bullet).unwrap(), None);
    }

    #[test]
    fn test_same_seed_same_history() {
        let run = || {
            let (mut world, universe) = setup(PhysicsSettings::with_seed(11), 400.0, 400.0);
            let s = add(&mut world, universe, ship(100.0, 200.0, 30.0, 0.0));
            let planet = Entity::planetoid(at(200.0, 200.0), Vector::new(-5.0, 2.0), 40.0);
            add(&mut world, universe, planet.unwrap());
            let rock = Entity::asteroid(at(300.0, 300.0), Vector::new(-12.0, -7.0), 15.0);
            add(&mut world, universe, rock.unwrap());
            let report = world.step(universe, 60.0).unwrap();
            (report, world.position(s).unwrap(), world.is_alive(s).unwrap())
        };
        let (first, second) = (run(), run());
        assert!(!first.0.events.is_empty());
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn prop_free_flight_matches_independent_advance(
            vx in -10.0f64..10.0,
            vy in -10.0f64..10.0,
            wx in -10.0f64..10.0,
            wy in -10.0f64..10.0,
            duration in 0.0f64..100.0,
        ) {
            // Too far apart and too far from the edges to touch anything
            let (mut world, universe) = setup(PhysicsSettings::default(), 10_000.0, 10_000.0);
            let a = Entity::asteroid(at(2_000.0, 2_000.0), Vector::new(vx, vy), 10.0).unwrap();
            let b = Entity::asteroid(at(8_000.0, 8_000.0), Vector::new(wx, wy), 10.0).unwrap();
            let mut expected = [a.clone(), b.clone()];
            let ids = [add(&mut world, universe, a), add(&mut world, universe, b)];

            let report = world.step(universe, duration).unwrap();
            prop_assert!(report.events.is_empty());
            for (id, entity) in ids.iter().zip(expected.iter_mut()) {
                entity.advance(duration).unwrap();
                let moved = world.position(*id).unwrap();
                prop_assert!((moved - entity.position()).length() < 1e-9);
            }
        }

        #[test]
        fn prop_die_is_idempotent(calls in 1usize..5) {
            let (mut world, universe) = setup(PhysicsSettings::default(), 100.0, 100.0);
            let s = add(&mut world, universe, ship(50.0, 50.0, 0.0, 0.0));
            for _ in 0..calls {
                world.die(s).unwrap();
                prop_assert_eq!(world.universe_of(s).unwrap(), None);
            }
            prop_assert!(!world.is_alive(s).unwrap());
            prop_assert!(world.universe(universe).unwrap().is_empty());
        }
    }
}
