//! Deterministic simulation module
//!
//! All physics lives here. This module must stay pure and deterministic:
//! - Time advances from contact to contact, never in fixed increments
//! - Seeded or injected RNG only
//! - Stable iteration order (by entity handle)
//! - No rendering or platform dependencies

pub mod collision;
pub mod entity;
pub mod kind;
pub mod resolve;
pub mod step;
pub mod universe;
pub mod world;

pub use collision::{BoundaryHit, CollisionEvent, Edge, Participants, boundary_hit, next_event};
pub use entity::{Entity, EntityId, KindState};
pub use kind::{BoundaryRule, EntityKind, KindPair, PairRule};
pub use resolve::Outcome;
pub use step::{ResolvedEvent, StepReport};
pub use universe::{Universe, UniverseId};
pub use world::World;
