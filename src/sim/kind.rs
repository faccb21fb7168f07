//! Entity kinds and their behaviour tables
//!
//! Each kind is a closed tag carrying its density and minimum radius. Pair
//! behaviour is a symmetric lookup on a normalized kind pair, so adding a
//! kind means adding rows here rather than type checks at every call site.

use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Closed set of simulated body kinds (declaration order is the pair order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Ship,
    Bullet,
    Asteroid,
    Planetoid,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Ship,
        EntityKind::Bullet,
        EntityKind::Asteroid,
        EntityKind::Planetoid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Ship => "ship",
            EntityKind::Bullet => "bullet",
            EntityKind::Asteroid => "asteroid",
            EntityKind::Planetoid => "planetoid",
        }
    }

    /// Mass per unit volume
    pub fn density(&self) -> f64 {
        match self {
            EntityKind::Ship => SHIP_DENSITY,
            EntityKind::Bullet => BULLET_DENSITY,
            EntityKind::Asteroid => ASTEROID_DENSITY,
            EntityKind::Planetoid => PLANETOID_DENSITY,
        }
    }

    /// Smallest radius an entity of this kind may have
    pub fn min_radius(&self) -> f64 {
        match self {
            EntityKind::Ship => SHIP_MIN_RADIUS,
            EntityKind::Bullet => BULLET_MIN_RADIUS,
            EntityKind::Asteroid | EntityKind::Planetoid => MINOR_PLANET_MIN_RADIUS,
        }
    }
}

/// What happens when an entity reaches a universe edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryRule {
    /// Negate the velocity component perpendicular to the edge
    Reflect,
    /// Count the bounce; die at the limit, reflect otherwise
    CountedBounce,
}

impl BoundaryRule {
    pub fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Bullet => BoundaryRule::CountedBounce,
            _ => BoundaryRule::Reflect,
        }
    }
}

/// What happens when two entities touch.
///
/// Rules that treat the participants differently refer to them as `lead`
/// (the lower kind of the normalized pair) and `other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairRule {
    /// Exchange momentum with an elastic impulse
    Elastic,
    /// Both participants die
    BothDie,
    /// Lead ship takes its own bullet back, or both die
    ReloadOrDestroy,
    /// Lead dies, other is unaffected
    LeadDies,
    /// Lead is relocated at random inside the universe
    RelocateLead,
}

/// Unordered pair of kinds, normalized so `lead <= other`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KindPair {
    pub lead: EntityKind,
    pub other: EntityKind,
}

impl KindPair {
    /// Normalize `(a, b)`; the flag is true when `b` became the lead
    pub fn new(a: EntityKind, b: EntityKind) -> (Self, bool) {
        if a <= b {
            (Self { lead: a, other: b }, false)
        } else {
            (Self { lead: b, other: a }, true)
        }
    }

    pub fn rule(&self) -> PairRule {
        use EntityKind::*;
        match (self.lead, self.other) {
            (Ship, Ship) => PairRule::Elastic,
            (Ship, Bullet) => PairRule::ReloadOrDestroy,
            (Ship, Asteroid) => PairRule::LeadDies,
            (Ship, Planetoid) => PairRule::RelocateLead,
            (Bullet, _) => PairRule::BothDie,
            (Asteroid | Planetoid, Asteroid | Planetoid) => PairRule::Elastic,
            // Normalization guarantees lead <= other
            (Asteroid | Planetoid, Ship | Bullet) => PairRule::Elastic,
        }
    }
}
