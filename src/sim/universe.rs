//! Bounded rectangular universe
//!
//! The universe owns its membership set. Entities only remember which
//! universe they are in by handle.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use super::entity::EntityId;
use crate::Vector;
use crate::consts::BOUNDARY_TOLERANCE;
use crate::error::{Result, SimError};

new_key_type! {
    /// Handle of a universe inside a `World`
    pub struct UniverseId;
}

/// Rectangle `[0, width] x [0, height]` plus the entities attached to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Universe {
    pub(crate) id: UniverseId,
    width: f64,
    height: f64,
    /// Ordered for deterministic event search
    members: BTreeSet<EntityId>,
}

impl Universe {
    pub fn new(width: f64, height: f64) -> Result<Self> {
        for (name, extent) in [("width", width), ("height", height)] {
            if !extent.is_finite() || extent < 0.0 {
                return Err(SimError::geometry(format!(
                    "universe {name} must be finite and non-negative, got {extent}"
                )));
            }
        }
        Ok(Self {
            id: UniverseId::default(),
            width,
            height,
            members: BTreeSet::new(),
        })
    }

    pub fn id(&self) -> UniverseId {
        self.id
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Attached entities in handle order
    pub fn members(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.members.iter().copied()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.members.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether a circle lies inside the bounds, allowing 1% of its radius past an edge
    pub fn contains_circle(&self, center: Vector, radius: f64) -> bool {
        if !center.is_finite() {
            return false;
        }
        let margin = radius * (1.0 - BOUNDARY_TOLERANCE);
        center.x >= margin
            && center.y >= margin
            && center.x <= self.width - margin
            && center.y <= self.height - margin
    }

    pub(crate) fn insert(&mut self, id: EntityId) -> bool {
        self.members.insert(id)
    }

    pub(crate) fn remove(&mut self, id: EntityId) -> bool {
        self.members.remove(&id)
    }

    pub(crate) fn clear(&mut self) {
        self.members.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_extents() {
        assert!(matches!(Universe::new(f64::NAN, 10.0), Err(SimError::InvalidGeometry(_))));
        assert!(matches!(Universe::new(10.0, f64::INFINITY), Err(SimError::InvalidGeometry(_))));
        assert!(matches!(Universe::new(-1.0, 10.0), Err(SimError::InvalidGeometry(_))));
        assert!(Universe::new(0.0, 0.0).is_ok());
    }

    #[test]
    fn test_contains_circle_with_edge_tolerance() {
        let universe = Universe::new(100.0, 50.0).unwrap();
        assert!(universe.contains_circle(Vector::new(50.0, 25.0), 10.0));
        // Pokes out by 0.5% of its radius
        assert!(universe.contains_circle(Vector::new(9.95, 25.0), 10.0));
        // Pokes out by 5%
        assert!(!universe.contains_circle(Vector::new(9.5, 25.0), 10.0));
        assert!(!universe.contains_circle(Vector::new(50.0, 45.0), 10.0));
        assert!(!universe.contains_circle(Vector::new(f64::INFINITY, 25.0), 10.0));
    }

    #[test]
    fn test_membership_is_a_set() {
        let mut universe = Universe::new(10.0, 10.0).unwrap();
        let id = EntityId::default();
        assert!(universe.insert(id));
        assert!(!universe.insert(id));
        assert_eq!(universe.len(), 1);
        assert!(universe.remove(id));
        assert!(universe.is_empty());
    }
}
