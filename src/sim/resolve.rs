//! Collision resolution
//!
//! Applied once participants have been advanced to the contact instant.
//! Which rule runs is decided by `KindPair::rule`; this module only carries
//! the rules out and keeps universe membership consistent.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::collision::{CollisionEvent, Edge, Participants};
use super::entity::EntityId;
use super::kind::{BoundaryRule, KindPair, PairRule};
use super::world::World;
use crate::Vector;

/// What a resolved collision did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    /// Perpendicular velocity component flipped at an edge
    Reflected { entity: EntityId, edge: Edge },
    /// Bullet used up its bounces on an edge and died
    BulletSpent { bullet: EntityId },
    /// Momentum exchanged between two bodies
    Elastic { first: EntityId, second: EntityId },
    /// Entities that died, plus any asteroids a dying planetoid left behind
    Destroyed {
        dead: Vec<EntityId>,
        fragments: Vec<EntityId>,
    },
    /// Ship caught its own bullet
    Reloaded { ship: EntityId, bullet: EntityId },
    /// Ship thrown to a random free spot
    Relocated { ship: EntityId, to: Vector },
    /// Ship had nowhere free to land and died
    Lost { ship: EntityId },
    /// A participant was already gone
    Stale,
}

impl World {
    pub(crate) fn resolve<R: Rng + ?Sized>(
        &mut self,
        event: &CollisionEvent,
        rng: &mut R,
    ) -> Outcome {
        match event.participants {
            Some(Participants::Boundary { entity, edge }) => {
                self.resolve_boundary(entity, edge, rng)
            }
            Some(Participants::Pair { first, second }) => self.resolve_pair(first, second, rng),
            None => Outcome::Stale,
        }
    }

    fn resolve_boundary<R: Rng + ?Sized>(
        &mut self,
        id: EntityId,
        edge: Edge,
        rng: &mut R,
    ) -> Outcome {
        let Some(entity) = self.entities.get_mut(id).filter(|e| e.is_alive()) else {
            return Outcome::Stale;
        };
        let counted = BoundaryRule::for_kind(entity.kind()) == BoundaryRule::CountedBounce;
        if counted && entity.count_bounce() {
            self.kill(id, rng);
            return Outcome::BulletSpent { bullet: id };
        }
        let velocity = edge.reflect(entity.velocity());
        entity.set_velocity(velocity.x, velocity.y);
        Outcome::Reflected { entity: id, edge }
    }

    pub(crate) fn resolve_pair<R: Rng + ?Sized>(
        &mut self,
        a: EntityId,
        b: EntityId,
        rng: &mut R,
    ) -> Outcome {
        let (Some(first), Some(second)) = (self.entities.get(a), self.entities.get(b)) else {
            return Outcome::Stale;
        };
        if !first.is_alive() || !second.is_alive() {
            return Outcome::Stale;
        }
        let (pair, swapped) = KindPair::new(first.kind(), second.kind());
        let (lead, other) = if swapped { (b, a) } else { (a, b) };

        match pair.rule() {
            PairRule::Elastic => {
                self.elastic(a, b);
                Outcome::Elastic { first: a, second: b }
            }
            PairRule::BothDie => self.destroy(&[a, b], rng),
            PairRule::ReloadOrDestroy => {
                let own = self.entities.get(other).and_then(|bullet| bullet.source()) == Some(lead);
                if own {
                    self.reload(lead, other)
                } else {
                    self.destroy(&[lead, other], rng)
                }
            }
            PairRule::LeadDies => self.destroy(&[lead], rng),
            PairRule::RelocateLead => self.relocate(lead, rng),
        }
    }

    fn destroy<R: Rng + ?Sized>(&mut self, ids: &[EntityId], rng: &mut R) -> Outcome {
        let mut fragments = Vec::new();
        for id in ids {
            fragments.extend(self.kill(*id, rng));
        }
        Outcome::Destroyed {
            dead: ids.to_vec(),
            fragments,
        }
    }

    /// Elastic impulse along the line of centers:
    /// `J = 2·m1·m2·(Δv·Δp) / (σ·(m1 + m2))`, applied as `±J·Δp/(σ·m)`.
    fn elastic(&mut self, a: EntityId, b: EntityId) {
        let (Ok(m1), Ok(m2)) = (self.total_mass(a), self.total_mass(b)) else {
            return;
        };
        let (Some(first), Some(second)) = (self.entities.get(a), self.entities.get(b)) else {
            return;
        };
        let dp = second.position() - first.position();
        let dv = second.velocity() - first.velocity();
        let sigma = first.radius() + second.radius();
        let j = 2.0 * m1 * m2 * dv.dot(dp) / (sigma * (m1 + m2));
        let impulse = dp * j / sigma;
        let v1 = first.velocity() + impulse / m1;
        let v2 = second.velocity() - impulse / m2;

        if let Some(first) = self.entities.get_mut(a) {
            first.set_velocity(v1.x, v1.y);
        }
        if let Some(second) = self.entities.get_mut(b) {
            second.set_velocity(v2.x, v2.y);
        }
    }

    /// Take a ship's own bullet out of the universe and back on board
    fn reload(&mut self, ship: EntityId, bullet: EntityId) -> Outcome {
        let Some(ship_position) = self.entities.get(ship).map(|s| s.position()) else {
            return Outcome::Stale;
        };
        if let Some(projectile) = self.entities.get_mut(bullet) {
            if let Some(uid) = projectile.universe.take() {
                if let Some(universe) = self.universes.get_mut(uid) {
                    universe.remove(bullet);
                }
            }
            projectile.stow_in(Some(ship));
            // Ship positions are finite while attached
            let _ = projectile.set_position(ship_position.x, ship_position.y);
        }
        if let Some(magazine) = self.entities.get_mut(ship).and_then(|s| s.magazine_mut()) {
            magazine.push(bullet);
        }
        Outcome::Reloaded { ship, bullet }
    }

    /// Detach a ship and drop it at a uniformly random spot at least one
    /// radius away from every edge. It dies if that spot is taken.
    fn relocate<R: Rng + ?Sized>(&mut self, ship: EntityId, rng: &mut R) -> Outcome {
        let Some(entity) = self.entities.get_mut(ship) else {
            return Outcome::Stale;
        };
        let Some(uid) = entity.universe.take() else {
            return Outcome::Stale;
        };
        let radius = entity.radius();
        let Some(universe) = self.universes.get_mut(uid) else {
            return Outcome::Stale;
        };
        universe.remove(ship);
        let (width, height) = (universe.width(), universe.height());

        if width - radius <= radius || height - radius <= radius {
            log::warn!("Universe {uid:?} too small to relocate ship {ship:?}");
            self.kill(ship, rng);
            return Outcome::Lost { ship };
        }
        let to = Vector::new(
            rng.random_range(radius..width - radius),
            rng.random_range(radius..height - radius),
        );

        let members: Vec<EntityId> = universe.members().collect();
        let Some(entity) = self.entities.get_mut(ship) else {
            return Outcome::Stale;
        };
        let _ = entity.set_position(to.x, to.y);
        let Some(entity) = self.entities.get(ship) else {
            return Outcome::Stale;
        };
        let clash = members.iter().any(|member| {
            self.entities
                .get(*member)
                .is_some_and(|other| entity.overlap(other).unwrap_or(true))
        });
        if clash {
            log::info!("Ship {ship:?} relocated onto an occupied spot and was lost");
            self.kill(ship, rng);
            return Outcome::Lost { ship };
        }

        if let Some(entity) = self.entities.get_mut(ship) {
            entity.universe = Some(uid);
        }
        if let Some(universe) = self.universes.get_mut(uid) {
            universe.insert(ship);
        }
        log::info!("Ship {ship:?} relocated to {to}");
        Outcome::Relocated { ship, to }
    }
}
