//! World: owner of every entity and universe
//!
//! Entities and universes live in slot maps and refer to each other by
//! handle only. A universe's membership set is the source of truth; an
//! entity's `universe` field mirrors it and is kept in sync here.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::f64::consts::TAU;

use super::collision::{BoundaryHit, CollisionEvent, boundary_hit, next_event};
use super::entity::{Entity, EntityId, KindState};
use super::kind::EntityKind;
use super::universe::{Universe, UniverseId};
use crate::error::{Result, SimError};
use crate::settings::PhysicsSettings;
use crate::{Vector, polar_to_cartesian};

/// All simulation state (deterministic for a given seed and call sequence)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    pub(crate) entities: SlotMap<EntityId, Entity>,
    pub(crate) universes: SlotMap<UniverseId, Universe>,
    pub(crate) settings: PhysicsSettings,
    /// Random source for relocation and fragmentation when none is injected
    pub(crate) rng: Pcg32,
}

impl Default for World {
    fn default() -> Self {
        Self::new(PhysicsSettings::default())
    }
}

impl World {
    pub fn new(settings: PhysicsSettings) -> Self {
        Self {
            entities: SlotMap::with_key(),
            universes: SlotMap::with_key(),
            rng: Pcg32::seed_from_u64(settings.seed),
            settings,
        }
    }

    pub fn settings(&self) -> &PhysicsSettings {
        &self.settings
    }

    // === Handles ===

    pub fn add_universe(&mut self, universe: Universe) -> UniverseId {
        let mut universe = universe;
        // Membership handles from another world mean nothing here
        universe.clear();
        self.universes.insert_with_key(|key| {
            universe.id = key;
            universe
        })
    }

    pub fn create_universe(&mut self, width: f64, height: f64) -> Result<UniverseId> {
        Ok(self.add_universe(Universe::new(width, height)?))
    }

    /// Take ownership of a standalone entity; it starts detached.
    /// Planetoids adopt the world's shrink rate.
    pub fn insert(&mut self, entity: Entity) -> EntityId {
        let mut entity = entity;
        entity.universe = None;
        entity.set_shrink_rate(self.settings.planetoid_shrink_rate);
        if let Some(magazine) = entity.magazine_mut() {
            magazine.clear();
        }
        entity.stow_in(None);
        self.entities.insert_with_key(|key| {
            entity.id = key;
            entity
        })
    }

    pub fn entity(&self, id: EntityId) -> Result<&Entity> {
        self.entities.get(id).ok_or_else(|| SimError::missing(id))
    }

    pub fn universe(&self, id: UniverseId) -> Result<&Universe> {
        self.universes.get(id).ok_or_else(|| SimError::missing(id))
    }

    fn entity_mut(&mut self, id: EntityId) -> Result<&mut Entity> {
        self.entities.get_mut(id).ok_or_else(|| SimError::missing(id))
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Attached entities of a universe in handle order
    pub fn members(&self, universe: UniverseId) -> Result<Vec<EntityId>> {
        Ok(self.universe(universe)?.members().collect())
    }

    pub fn universe_of(&self, id: EntityId) -> Result<Option<UniverseId>> {
        Ok(self.entity(id)?.universe())
    }

    // === Accessors for adapters ===

    pub fn position(&self, id: EntityId) -> Result<Vector> {
        Ok(self.entity(id)?.position())
    }

    pub fn velocity(&self, id: EntityId) -> Result<Vector> {
        Ok(self.entity(id)?.velocity())
    }

    pub fn radius(&self, id: EntityId) -> Result<f64> {
        Ok(self.entity(id)?.radius())
    }

    pub fn kind(&self, id: EntityId) -> Result<EntityKind> {
        Ok(self.entity(id)?.kind())
    }

    pub fn is_alive(&self, id: EntityId) -> Result<bool> {
        Ok(self.entity(id)?.is_alive())
    }

    pub fn set_position(&mut self, id: EntityId, x: f64, y: f64) -> Result<()> {
        self.entity_mut(id)?.set_position(x, y)
    }

    pub fn set_velocity(&mut self, id: EntityId, vx: f64, vy: f64) -> Result<()> {
        self.entity_mut(id)?.set_velocity(vx, vy);
        Ok(())
    }

    /// Own mass plus, for ships, the mass of every carried bullet
    pub fn total_mass(&self, id: EntityId) -> Result<f64> {
        let entity = self.entity(id)?;
        let carried: f64 = entity
            .magazine()
            .iter()
            .filter_map(|bullet| self.entities.get(*bullet))
            .map(Entity::mass)
            .sum();
        Ok(entity.mass() + carried)
    }

    // === Geometry between handles ===

    fn pair(&self, a: EntityId, b: EntityId) -> Result<(&Entity, &Entity)> {
        Ok((self.entity(a)?, self.entity(b)?))
    }

    pub fn distance_between(&self, a: EntityId, b: EntityId) -> Result<f64> {
        let (a, b) = self.pair(a, b)?;
        a.distance_between(b)
    }

    pub fn overlap(&self, a: EntityId, b: EntityId) -> Result<bool> {
        let (a, b) = self.pair(a, b)?;
        a.overlap(b)
    }

    pub fn overlap_significantly(&self, a: EntityId, b: EntityId) -> Result<bool> {
        let (a, b) = self.pair(a, b)?;
        a.overlap_significantly(b)
    }

    pub fn time_to_collision(&self, a: EntityId, b: EntityId) -> Result<f64> {
        let (a, b) = self.pair(a, b)?;
        a.time_to_collision(b)
    }

    pub fn collision_point(&self, a: EntityId, b: EntityId) -> Result<Option<Vector>> {
        let (a, b) = self.pair(a, b)?;
        a.collision_point(b)
    }

    /// Edge contact of an attached entity; detached entities never hit an edge
    pub fn boundary_collision(&self, id: EntityId) -> Result<BoundaryHit> {
        let entity = self.entity(id)?;
        if !entity.is_alive() {
            return Err(SimError::state(format!("{id:?} is dead")));
        }
        match entity.universe() {
            Some(uid) => Ok(boundary_hit(entity, self.universe(uid)?)),
            None => Ok(BoundaryHit {
                time: f64::INFINITY,
                edge: None,
                center: None,
                point: None,
            }),
        }
    }

    pub fn time_to_boundary(&self, id: EntityId) -> Result<f64> {
        Ok(self.boundary_collision(id)?.time)
    }

    /// Point on the struck edge where the entity touches it, not the entity's
    /// center at that moment (see [`BoundaryHit::center`] for that).
    pub fn boundary_collision_point(&self, id: EntityId) -> Result<Option<Vector>> {
        Ok(self.boundary_collision(id)?.point)
    }

    /// Earliest pending collision in a universe
    pub fn next_event(&self, universe: UniverseId) -> Result<CollisionEvent> {
        Ok(next_event(&self.entities, self.universe(universe)?))
    }

    // === Lifecycle ===

    /// Place a detached entity into a universe.
    ///
    /// The entity must be alive, not carried, inside the bounds and clear of
    /// every member.
    pub fn attach(&mut self, id: EntityId, universe: UniverseId) -> Result<()> {
        let target = self.universe(universe)?;
        let entity = self.entity(id)?;
        if !entity.is_alive() {
            return Err(SimError::state(format!("cannot attach dead {id:?}")));
        }
        if let Some(current) = entity.universe() {
            return Err(SimError::state(format!("{id:?} is already in {current:?}")));
        }
        if let Some(carrier) = entity.carrier() {
            return Err(SimError::state(format!("{id:?} is carried by {carrier:?}")));
        }
        if !entity.position().is_finite() {
            return Err(SimError::geometry(format!(
                "{id:?} has non-finite position {}",
                entity.position()
            )));
        }
        if !target.contains_circle(entity.position(), entity.radius()) {
            return Err(SimError::argument(format!("{id:?} lies outside {universe:?}")));
        }
        for member in target.members() {
            if let Some(other) = self.entities.get(member) {
                if entity.overlap_significantly(other)? {
                    return Err(SimError::argument(format!("{id:?} overlaps {member:?}")));
                }
            }
        }

        if let Some(entity) = self.entities.get_mut(id) {
            entity.universe = Some(universe);
        }
        if let Some(target) = self.universes.get_mut(universe) {
            target.insert(id);
        }
        log::info!("Attached {id:?} to {universe:?}");
        Ok(())
    }

    pub fn detach(&mut self, id: EntityId) -> Result<()> {
        let entity = self.entity_mut(id)?;
        let Some(universe) = entity.universe.take() else {
            return Err(SimError::state(format!("{id:?} is not in a universe")));
        };
        if let Some(target) = self.universes.get_mut(universe) {
            target.remove(id);
        }
        log::info!("Detached {id:?} from {universe:?}");
        Ok(())
    }

    /// Kill an entity. Calling it again is a no-op.
    pub fn die(&mut self, id: EntityId) -> Result<()> {
        self.entity(id)?;
        let mut rng = self.rng.clone();
        self.kill(id, &mut rng);
        self.rng = rng;
        Ok(())
    }

    /// Kill `id`, detach it and clean up whatever it carried or was carried by.
    ///
    /// Returns the asteroids spawned if a large planetoid broke apart.
    pub(crate) fn kill<R: Rng + ?Sized>(&mut self, id: EntityId, rng: &mut R) -> Vec<EntityId> {
        let Some(entity) = self.entities.get_mut(id) else {
            return Vec::new();
        };
        if !entity.is_alive() {
            return Vec::new();
        }
        let universe = entity.universe;
        let state = entity.state.clone();
        let (position, velocity, radius) = (entity.position(), entity.velocity(), entity.radius());
        entity.mark_dead();
        if let Some(magazine) = entity.magazine_mut() {
            magazine.clear();
        }
        entity.stow_in(None);
        if let Some(uid) = universe {
            if let Some(target) = self.universes.get_mut(uid) {
                target.remove(id);
            }
        }
        log::info!("{} {id:?} died", state.kind().as_str());

        match state {
            KindState::Ship { magazine, .. } => {
                for bullet in magazine {
                    self.kill(bullet, rng);
                }
                Vec::new()
            }
            KindState::Bullet {
                carrier: Some(ship),
                ..
            } => {
                if let Some(magazine) = self.entities.get_mut(ship).and_then(Entity::magazine_mut) {
                    magazine.retain(|bullet| *bullet != id);
                }
                Vec::new()
            }
            KindState::Planetoid { .. } => match universe {
                Some(uid) if radius >= self.settings.fragment_min_radius => {
                    self.fragment(uid, position, velocity, radius, rng)
                }
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    /// Split a dead planetoid into two asteroids flying apart along a random axis
    fn fragment<R: Rng + ?Sized>(
        &mut self,
        universe: UniverseId,
        center: Vector,
        velocity: Vector,
        radius: f64,
        rng: &mut R,
    ) -> Vec<EntityId> {
        let direction = polar_to_cartesian(1.0, rng.random_range(0.0..TAU));
        let half = radius / 2.0;
        let speed = velocity.length() * self.settings.fragment_speed_factor;

        let mut spawned = Vec::new();
        for sign in [1.0, -1.0] {
            let offset = direction * (sign * half);
            let outward = direction * (sign * speed);
            let asteroid = match Entity::asteroid(center + offset, outward, half) {
                Ok(asteroid) => asteroid,
                Err(e) => {
                    log::warn!("Fragment rejected: {e}");
                    continue;
                }
            };
            let id = self.insert(asteroid);
            match self.attach(id, universe) {
                Ok(()) => spawned.push(id),
                Err(e) => {
                    log::warn!("Fragment {id:?} discarded: {e}");
                    self.kill(id, rng);
                }
            }
        }
        spawned
    }

    /// Drop dead entities from storage; returns how many were removed
    pub fn prune_dead(&mut self) -> usize {
        let before = self.entities.len();
        self.entities.retain(|_, entity| entity.is_alive());
        before - self.entities.len()
    }

    // === Ship primitives ===

    fn live_ship_mut(&mut self, id: EntityId) -> Result<&mut Entity> {
        let entity = self.entity_mut(id)?;
        if entity.kind() != EntityKind::Ship {
            return Err(SimError::argument(format!("{id:?} is not a ship")));
        }
        if !entity.is_alive() {
            return Err(SimError::state(format!("ship {id:?} is dead")));
        }
        Ok(entity)
    }

    pub fn set_thruster(&mut self, ship: EntityId, on: bool) -> Result<()> {
        self.live_ship_mut(ship)?.set_thruster(on);
        Ok(())
    }

    /// Rotate a ship by `angle` radians
    pub fn turn(&mut self, ship: EntityId, angle: f64) -> Result<()> {
        if !angle.is_finite() {
            return Err(SimError::argument(format!("turn angle must be finite, got {angle}")));
        }
        let entity = self.live_ship_mut(ship)?;
        let orientation = entity.orientation().unwrap_or_default();
        entity.set_orientation(orientation + angle);
        Ok(())
    }

    /// Thrust acceleration of a ship given its current load
    pub fn acceleration(&self, ship: EntityId) -> Result<f64> {
        Ok(self.settings.thruster_force / self.total_mass(ship)?)
    }

    /// Apply `duration` worth of thrust along the ship's orientation
    pub(crate) fn thrust(&mut self, ship: EntityId, duration: f64) {
        let Ok(acceleration) = self.acceleration(ship) else {
            return;
        };
        if let Some(entity) = self.entities.get_mut(ship) {
            let direction = polar_to_cartesian(1.0, entity.orientation().unwrap_or_default());
            let velocity = entity.velocity() + direction * (acceleration * duration);
            entity.set_velocity(velocity.x, velocity.y);
        }
    }

    /// Put a bullet on board a ship.
    ///
    /// A bullet in the ship's own universe is taken out of it first; a bullet
    /// anywhere else is refused.
    pub fn load_bullet(&mut self, ship: EntityId, bullet: EntityId) -> Result<()> {
        let ship_position = self.live_ship_mut(ship)?.position();
        let ship_universe = self.entity(ship)?.universe();

        let entity = self.entity(bullet)?;
        if entity.kind() != EntityKind::Bullet {
            return Err(SimError::argument(format!("{bullet:?} is not a bullet")));
        }
        if !entity.is_alive() {
            return Err(SimError::state(format!("bullet {bullet:?} is dead")));
        }
        if let Some(carrier) = entity.carrier() {
            return Err(SimError::state(format!("{bullet:?} is already carried by {carrier:?}")));
        }
        match entity.universe() {
            None => {}
            Some(uid) if Some(uid) == ship_universe => self.detach(bullet)?,
            Some(uid) => {
                return Err(SimError::state(format!("{bullet:?} is in another universe ({uid:?})")));
            }
        }

        let entity = self.entity_mut(bullet)?;
        entity.stow_in(Some(ship));
        entity.set_position(ship_position.x, ship_position.y)?;
        if let Some(magazine) = self.entities.get_mut(ship).and_then(Entity::magazine_mut) {
            magazine.push(bullet);
        }
        Ok(())
    }

    /// Fire the last loaded bullet along the ship's orientation.
    ///
    /// Returns `None` when the magazine is empty. A bullet that would start
    /// outside the universe dies at once; one that starts inside another body
    /// collides with it immediately.
    pub fn fire_bullet(&mut self, ship: EntityId) -> Result<Option<EntityId>> {
        let bullet_speed = self.settings.bullet_speed;
        let entity = self.live_ship_mut(ship)?;
        let Some(universe) = entity.universe() else {
            return Err(SimError::state(format!("ship {ship:?} is not in a universe")));
        };
        let (center, radius) = (entity.position(), entity.radius());
        let direction = polar_to_cartesian(1.0, entity.orientation().unwrap_or_default());
        let Some(bullet) = entity.magazine_mut().and_then(Vec::pop) else {
            return Ok(None);
        };

        let projectile = self.entity_mut(bullet)?;
        let start = center + direction * (radius + projectile.radius());
        let velocity = direction * bullet_speed;
        projectile.stow_in(None);
        projectile.set_position(start.x, start.y)?;
        projectile.set_velocity(velocity.x, velocity.y);
        let projectile = projectile.clone();

        let target = self.universe(universe)?;
        if !target.contains_circle(projectile.position(), projectile.radius()) {
            log::debug!("Bullet {bullet:?} fired out of bounds");
            let mut rng = self.rng.clone();
            self.kill(bullet, &mut rng);
            self.rng = rng;
            return Ok(Some(bullet));
        }

        let blocker = target.members().find(|member| {
            self.entities
                .get(*member)
                .is_some_and(|other| projectile.overlap_significantly(other).unwrap_or(false))
        });
        match blocker {
            Some(other) => {
                // Enter the universe and resolve the contact right away
                if let Some(entity) = self.entities.get_mut(bullet) {
                    entity.universe = Some(universe);
                }
                if let Some(target) = self.universes.get_mut(universe) {
                    target.insert(bullet);
                }
                let mut rng = self.rng.clone();
                let outcome = self.resolve_pair(bullet, other, &mut rng);
                self.rng = rng;
                log::debug!("Bullet {bullet:?} fired into {other:?}: {outcome:?}");
            }
            None => self.attach(bullet, universe)?,
        }
        Ok(Some(bullet))
    }

    /// Nearest attached entity of `kind` to `from`, measured between surfaces
    pub fn nearest_of_kind(&self, from: EntityId, kind: EntityKind) -> Result<Option<EntityId>> {
        let origin = self.entity(from)?;
        if !origin.is_alive() {
            return Err(SimError::state(format!("{from:?} is dead")));
        }
        let Some(universe) = origin.universe() else {
            return Ok(None);
        };
        let mut best: Option<(f64, EntityId)> = None;
        for member in self.universe(universe)?.members() {
            if member == from {
                continue;
            }
            let Some(other) = self.entities.get(member) else {
                continue;
            };
            if other.kind() != kind {
                continue;
            }
            let distance = origin.distance_between(other)?;
            if best.is_none_or(|(closest, _)| distance < closest) {
                best = Some((distance, member));
            }
        }
        Ok(best.map(|(_, id)| id))
    }
}
