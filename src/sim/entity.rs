//! Entity record and kinematics
//!
//! Every simulated body is one `Entity`: a circle with a position, a
//! velocity capped by its own speed limit, and a per-kind state block.
//! Motion between events is pure linear extrapolation.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use super::kind::EntityKind;
use super::universe::UniverseId;
use crate::consts::*;
use crate::error::{Result, SimError};
use crate::{Vector, normalize_angle, polar_to_cartesian, sphere_volume};

new_key_type! {
    /// Handle of an entity inside a `World`
    pub struct EntityId;
}

/// Kind-specific state carried next to the shared kinematic fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KindState {
    Ship {
        /// Facing direction (radians, [0, 2π))
        orientation: f64,
        /// Mass of the ship without any carried bullets
        hull_mass: f64,
        thruster_active: bool,
        /// Bullets carried on board (detached from every universe)
        magazine: Vec<EntityId>,
    },
    Bullet {
        /// Ship that last fired or loaded this bullet
        source: Option<EntityId>,
        /// Ship currently carrying this bullet
        carrier: Option<EntityId>,
        bounces: u32,
        max_bounces: u32,
    },
    Asteroid,
    Planetoid {
        initial_radius: f64,
        /// Total distance covered, drives the radius shrink
        travelled: f64,
        /// Radius lost per unit of distance travelled
        shrink_rate: f64,
    },
}

impl KindState {
    pub fn kind(&self) -> EntityKind {
        match self {
            KindState::Ship { .. } => EntityKind::Ship,
            KindState::Bullet { .. } => EntityKind::Bullet,
            KindState::Asteroid => EntityKind::Asteroid,
            KindState::Planetoid { .. } => EntityKind::Planetoid,
        }
    }
}

/// A circular rigid body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub(crate) id: EntityId,
    pub(crate) state: KindState,
    position: Vector,
    velocity: Vector,
    radius: f64,
    speed_limit: f64,
    pub(crate) universe: Option<UniverseId>,
    alive: bool,
}

impl Entity {
    fn new(state: KindState, position: Vector, velocity: Vector, radius: f64) -> Result<Self> {
        let kind = state.kind();
        if !radius.is_finite() || radius < kind.min_radius() {
            return Err(SimError::geometry(format!(
                "{} radius must be finite and at least {}, got {radius}",
                kind.as_str(),
                kind.min_radius()
            )));
        }
        let mut entity = Self {
            id: EntityId::default(),
            state,
            position: Vector::ZERO,
            velocity: Vector::ZERO,
            radius,
            speed_limit: MAX_SPEED,
            universe: None,
            alive: true,
        };
        entity.set_position(position.x, position.y)?;
        entity.set_velocity(velocity.x, velocity.y);
        Ok(entity)
    }

    /// A ship; `mass` below the density minimum for its radius is raised to it
    pub fn ship(
        position: Vector,
        velocity: Vector,
        radius: f64,
        orientation: f64,
        mass: f64,
    ) -> Result<Self> {
        if !orientation.is_finite() {
            return Err(SimError::argument(format!(
                "ship orientation must be finite, got {orientation}"
            )));
        }
        let min_mass = SHIP_DENSITY * sphere_volume(radius);
        let hull_mass = if mass.is_finite() && mass > min_mass { mass } else { min_mass };
        Self::new(
            KindState::Ship {
                orientation: normalize_angle(orientation),
                hull_mass,
                thruster_active: false,
                magazine: Vec::new(),
            },
            position,
            velocity,
            radius,
        )
    }

    pub fn bullet(position: Vector, velocity: Vector, radius: f64) -> Result<Self> {
        Self::new(
            KindState::Bullet {
                source: None,
                carrier: None,
                bounces: 0,
                max_bounces: BULLET_MAX_BOUNCES,
            },
            position,
            velocity,
            radius,
        )
    }

    pub fn asteroid(position: Vector, velocity: Vector, radius: f64) -> Result<Self> {
        Self::new(KindState::Asteroid, position, velocity, radius)
    }

    pub fn planetoid(position: Vector, velocity: Vector, radius: f64) -> Result<Self> {
        Self::new(
            KindState::Planetoid {
                initial_radius: radius,
                travelled: 0.0,
                shrink_rate: PLANETOID_SHRINK_RATE,
            },
            position,
            velocity,
            radius,
        )
    }

    /// Lower the speed limit; limits above the universal maximum (or NaN) clamp to it.
    /// The current velocity is re-clamped to the new limit.
    pub fn with_speed_limit(mut self, limit: f64) -> Self {
        self.speed_limit = if limit.is_nan() || limit < 0.0 || limit > MAX_SPEED {
            MAX_SPEED
        } else {
            limit
        };
        let v = self.velocity;
        self.velocity = Vector::ZERO;
        self.set_velocity(v.x, v.y);
        self
    }

    /// Set how fast a planetoid shrinks (no-op for other kinds).
    /// A `World` replaces it with its own rate on insert.
    pub fn with_shrink_rate(mut self, rate: f64) -> Self {
        self.set_shrink_rate(rate);
        self
    }

    /// Set how many boundary hits a bullet takes before dying (no-op for other kinds)
    pub fn with_max_bounces(mut self, max: u32) -> Self {
        if let KindState::Bullet { max_bounces, .. } = &mut self.state {
            *max_bounces = max;
        }
        self
    }

    #[inline]
    pub fn id(&self) -> EntityId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> EntityKind {
        self.state.kind()
    }

    pub fn state(&self) -> &KindState {
        &self.state
    }

    #[inline]
    pub fn position(&self) -> Vector {
        self.position
    }

    #[inline]
    pub fn velocity(&self) -> Vector {
        self.velocity
    }

    /// Effective radius (planetoids shrink as they travel)
    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn speed_limit(&self) -> f64 {
        self.speed_limit
    }

    pub fn universe(&self) -> Option<UniverseId> {
        self.universe
    }

    pub fn is_attached(&self) -> bool {
        self.universe.is_some()
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Ship facing direction
    pub fn orientation(&self) -> Option<f64> {
        match self.state {
            KindState::Ship { orientation, .. } => Some(orientation),
            _ => None,
        }
    }

    /// Bullet bounce counter
    pub fn bounces(&self) -> Option<u32> {
        match self.state {
            KindState::Bullet { bounces, .. } => Some(bounces),
            _ => None,
        }
    }

    /// Ship that fired or loaded this bullet
    pub fn source(&self) -> Option<EntityId> {
        match self.state {
            KindState::Bullet { source, .. } => source,
            _ => None,
        }
    }

    /// Ship currently carrying this bullet
    pub fn carrier(&self) -> Option<EntityId> {
        match self.state {
            KindState::Bullet { carrier, .. } => carrier,
            _ => None,
        }
    }

    /// Bullets on board a ship (empty for other kinds)
    pub fn magazine(&self) -> &[EntityId] {
        match &self.state {
            KindState::Ship { magazine, .. } => magazine,
            _ => &[],
        }
    }

    /// Move the center. Only NaN is rejected; bounds are enforced on attach.
    pub fn set_position(&mut self, x: f64, y: f64) -> Result<()> {
        if x.is_nan() || y.is_nan() {
            return Err(SimError::geometry(format!("position ({x}, {y}) is not a number")));
        }
        self.position = Vector::new(x, y);
        Ok(())
    }

    /// Set the velocity, rescaling it onto the speed limit if it is too fast.
    ///
    /// NaN or infinite components leave the velocity unchanged.
    pub fn set_velocity(&mut self, vx: f64, vy: f64) {
        if !vx.is_finite() || !vy.is_finite() {
            return;
        }
        let velocity = Vector::new(vx, vy);
        if velocity.length() <= self.speed_limit {
            self.velocity = velocity;
        } else {
            let theta = vy.atan2(vx);
            self.velocity = polar_to_cartesian(self.speed_limit, theta);
        }
    }

    /// Linear extrapolation over `duration`.
    ///
    /// A planetoid that shrinks below the minimum radius dies.
    pub fn advance(&mut self, duration: f64) -> Result<()> {
        if !duration.is_finite() {
            return Err(SimError::argument(format!("duration must be finite, got {duration}")));
        }
        if self.drift(duration) {
            self.mark_dead();
        }
        Ok(())
    }

    /// Advance by a duration already known to be finite.
    ///
    /// Returns true when a planetoid just shrank away; its radius stops at
    /// the minimum and the caller decides how it dies.
    pub(crate) fn drift(&mut self, duration: f64) -> bool {
        let step = self.velocity * duration;
        self.position += step;
        let KindState::Planetoid {
            initial_radius,
            travelled,
            shrink_rate,
        } = &mut self.state
        else {
            return false;
        };
        *travelled += step.length();
        let radius = *initial_radius - *shrink_rate * *travelled;
        if radius < MINOR_PLANET_MIN_RADIUS {
            self.radius = MINOR_PLANET_MIN_RADIUS;
            self.alive
        } else {
            self.radius = radius;
            false
        }
    }

    /// Own mass. Ships report their hull; carried bullets are added by `World::total_mass`.
    pub fn mass(&self) -> f64 {
        match self.state {
            KindState::Ship { hull_mass, .. } => hull_mass,
            _ => self.kind().density() * sphere_volume(self.radius),
        }
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.alive {
            Ok(())
        } else {
            Err(SimError::state(format!("{} {:?} is dead", self.kind().as_str(), self.id)))
        }
    }

    /// Signed gap between the two circles along the center line (negative = overlap).
    ///
    /// When one center sits inside the other disk and the larger radius is at
    /// least twice the smaller, the gap is measured from the far side of the
    /// larger circle.
    pub fn distance_between(&self, other: &Entity) -> Result<f64> {
        self.ensure_alive()?;
        other.ensure_alive()?;
        if std::ptr::eq(self, other) {
            return Ok(0.0);
        }
        let centers = (other.position - self.position).length();
        let (large, small) = if self.radius >= other.radius {
            (self.radius, other.radius)
        } else {
            (other.radius, self.radius)
        };
        if centers < large && large >= NESTED_RADIUS_RATIO * small {
            Ok(-(large + centers - small))
        } else {
            Ok(centers - self.radius - other.radius)
        }
    }

    pub fn overlap(&self, other: &Entity) -> Result<bool> {
        Ok(self.distance_between(other)? <= 0.0)
    }

    /// Overlap deeper than 1% of the summed radii
    pub fn overlap_significantly(&self, other: &Entity) -> Result<bool> {
        let tolerance = OVERLAP_TOLERANCE * (self.radius + other.radius);
        Ok(self.distance_between(other)? <= -tolerance)
    }

    /// Time until the two surfaces touch, `f64::INFINITY` if never.
    ///
    /// Asking for a pair that already overlaps significantly is an error.
    pub fn time_to_collision(&self, other: &Entity) -> Result<f64> {
        if self.overlap_significantly(other)? {
            return Err(SimError::argument(format!(
                "{:?} and {:?} already overlap",
                self.id, other.id
            )));
        }
        Ok(self.contact_time(other))
    }

    /// Closed-form time of impact without liveness or overlap checks
    pub(crate) fn contact_time(&self, other: &Entity) -> f64 {
        if std::ptr::eq(self, other) {
            return f64::INFINITY;
        }
        match (self.universe, other.universe) {
            (Some(a), Some(b)) if a == b => {}
            _ => return f64::INFINITY,
        }
        let dp = other.position - self.position;
        let dv = other.velocity - self.velocity;
        let sigma = self.radius + other.radius;
        let dvdp = dv.dot(dp);
        if dvdp >= 0.0 {
            return f64::INFINITY;
        }
        let dvdv = dv.length_squared();
        let d = dvdp * dvdp - dvdv * (dp.length_squared() - sigma * sigma);
        if d <= 0.0 {
            return f64::INFINITY;
        }
        // Touching pairs can come out a hair negative
        (-(dvdp + d.sqrt()) / dvdv).max(0.0)
    }

    /// Where the two surfaces will touch, `None` if they never do
    pub fn collision_point(&self, other: &Entity) -> Result<Option<Vector>> {
        let time = self.time_to_collision(other)?;
        if time.is_infinite() {
            return Ok(None);
        }
        let here = self.position + self.velocity * time;
        let there = other.position + other.velocity * time;
        Ok(Some(tangent_point(here, self.radius, there)))
    }

    pub(crate) fn set_orientation(&mut self, angle: f64) {
        if let KindState::Ship { orientation, .. } = &mut self.state {
            *orientation = normalize_angle(angle);
        }
    }

    pub(crate) fn set_shrink_rate(&mut self, rate: f64) {
        if let KindState::Planetoid { shrink_rate, .. } = &mut self.state {
            *shrink_rate = rate;
        }
    }

    pub(crate) fn set_thruster(&mut self, on: bool) {
        if let KindState::Ship { thruster_active, .. } = &mut self.state {
            *thruster_active = on;
        }
    }

    pub fn thruster_active(&self) -> bool {
        matches!(self.state, KindState::Ship { thruster_active: true, .. })
    }

    pub(crate) fn magazine_mut(&mut self) -> Option<&mut Vec<EntityId>> {
        match &mut self.state {
            KindState::Ship { magazine, .. } => Some(magazine),
            _ => None,
        }
    }

    /// Hand a bullet to `ship`: it is carried, owned by the ship, and its bounces reset
    pub(crate) fn stow_in(&mut self, ship: Option<EntityId>) {
        if let KindState::Bullet {
            source,
            carrier,
            bounces,
            ..
        } = &mut self.state
        {
            if ship.is_some() {
                *source = ship;
            }
            *carrier = ship;
            *bounces = 0;
        }
    }

    /// Count a boundary hit; true once the bullet has used up its bounces
    pub(crate) fn count_bounce(&mut self) -> bool {
        match &mut self.state {
            KindState::Bullet {
                bounces,
                max_bounces,
                ..
            } => {
                *bounces += 1;
                *bounces >= *max_bounces
            }
            _ => false,
        }
    }

    pub(crate) fn mark_dead(&mut self) {
        self.alive = false;
        self.universe = None;
    }
}

/// Point on the first circle's boundary facing the second center
pub(crate) fn tangent_point(center: Vector, radius: f64, toward: Vector) -> Vector {
    let offset = toward - center;
    let length = offset.length();
    if length == 0.0 {
        return center;
    }
    center + offset * (radius / length)
}
