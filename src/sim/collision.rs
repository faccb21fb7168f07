//! Collision prediction
//!
//! Closed-form time of impact between circles and between a circle and the
//! edges of its universe, plus the global search for the earliest event.

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use super::entity::{Entity, EntityId, tangent_point};
use super::universe::Universe;
use crate::Vector;

/// Universe edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Edge {
    /// x = 0
    Left,
    /// x = width
    Right,
    /// y = 0
    Bottom,
    /// y = height
    Top,
}

impl Edge {
    /// Vertical edges flip vx, horizontal edges flip vy
    pub fn reflect(&self, velocity: Vector) -> Vector {
        match self {
            Edge::Left | Edge::Right => Vector::new(-velocity.x, velocity.y),
            Edge::Bottom | Edge::Top => Vector::new(velocity.x, -velocity.y),
        }
    }
}

/// Who takes part in a collision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Participants {
    Pair { first: EntityId, second: EntityId },
    Boundary { entity: EntityId, edge: Edge },
}

/// The next contact: when, between whom, and where.
///
/// `point` is `None` exactly when `time` is infinite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollisionEvent {
    pub time: f64,
    pub participants: Option<Participants>,
    pub point: Option<Vector>,
}

impl CollisionEvent {
    pub fn never() -> Self {
        Self {
            time: f64::INFINITY,
            participants: None,
            point: None,
        }
    }

    pub fn is_never(&self) -> bool {
        self.time.is_infinite()
    }

    pub fn first(&self) -> Option<EntityId> {
        match self.participants? {
            Participants::Pair { first, .. } => Some(first),
            Participants::Boundary { entity, .. } => Some(entity),
        }
    }

    /// `None` for boundary collisions
    pub fn second(&self) -> Option<EntityId> {
        match self.participants? {
            Participants::Pair { second, .. } => Some(second),
            Participants::Boundary { .. } => None,
        }
    }

    pub fn edge(&self) -> Option<Edge> {
        match self.participants? {
            Participants::Boundary { edge, .. } => Some(edge),
            Participants::Pair { .. } => None,
        }
    }
}

/// Predicted contact of one entity with its universe's edges
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryHit {
    pub time: f64,
    pub edge: Option<Edge>,
    /// Entity center at the moment of contact
    pub center: Option<Vector>,
    /// Contact point, on the struck edge
    pub point: Option<Vector>,
}

impl BoundaryHit {
    fn never() -> Self {
        Self {
            time: f64::INFINITY,
            edge: None,
            center: None,
            point: None,
        }
    }
}

/// Time for a center moving at `vel` along one axis to come within `radius` of 0 or `extent`
fn axis_time(pos: f64, vel: f64, radius: f64, extent: f64) -> (f64, bool) {
    if vel > 0.0 {
        (((extent - radius - pos) / vel).max(0.0), true)
    } else if vel < 0.0 {
        (((pos - radius) / -vel).max(0.0), false)
    } else {
        (f64::INFINITY, false)
    }
}

/// Earliest edge contact of `entity` inside `universe`.
///
/// Each axis is solved on its own; an axis with no velocity never hits.
pub fn boundary_hit(entity: &Entity, universe: &Universe) -> BoundaryHit {
    let pos = entity.position();
    let vel = entity.velocity();
    let r = entity.radius();

    let (tx, x_high) = axis_time(pos.x, vel.x, r, universe.width());
    let (ty, y_high) = axis_time(pos.y, vel.y, r, universe.height());

    let (time, edge) = if ty < tx {
        (ty, if y_high { Edge::Top } else { Edge::Bottom })
    } else {
        (tx, if x_high { Edge::Right } else { Edge::Left })
    };
    if time.is_infinite() {
        return BoundaryHit::never();
    }

    let center = pos + vel * time;
    let point = match edge {
        Edge::Left => Vector::new(0.0, center.y),
        Edge::Right => Vector::new(universe.width(), center.y),
        Edge::Bottom => Vector::new(center.x, 0.0),
        Edge::Top => Vector::new(center.x, universe.height()),
    };
    BoundaryHit {
        time,
        edge: Some(edge),
        center: Some(center),
        point: Some(point),
    }
}

/// Contact point of a pair after both advance by `time`
pub(crate) fn pair_contact_point(a: &Entity, b: &Entity, time: f64) -> Vector {
    let here = a.position() + a.velocity() * time;
    let there = b.position() + b.velocity() * time;
    tangent_point(here, a.radius(), there)
}

/// Earliest collision among the members of `universe`.
///
/// Every unordered pair and every member/edge combination is checked in
/// handle order; ties keep the first candidate found.
pub fn next_event(entities: &SlotMap<EntityId, Entity>, universe: &Universe) -> CollisionEvent {
    let members: Vec<&Entity> = universe
        .members()
        .filter_map(|id| entities.get(id))
        .collect();

    let mut best = CollisionEvent::never();

    for (i, a) in members.iter().enumerate() {
        for b in &members[i + 1..] {
            let time = a.contact_time(b);
            if time < best.time {
                best = CollisionEvent {
                    time,
                    participants: Some(Participants::Pair {
                        first: a.id(),
                        second: b.id(),
                    }),
                    point: Some(pair_contact_point(a, b, time)),
                };
            }
        }
    }

    for entity in &members {
        let hit = boundary_hit(entity, universe);
        if let (true, Some(edge)) = (hit.time < best.time, hit.edge) {
            best = CollisionEvent {
                time: hit.time,
                participants: Some(Participants::Boundary {
                    entity: entity.id(),
                    edge,
                }),
                point: hit.point,
            };
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::universe::UniverseId;

    const HULL: f64 = 1.0e25;

    fn universe_with(
        width: f64,
        height: f64,
        bodies: Vec<Entity>,
    ) -> (SlotMap<EntityId, Entity>, Universe, Vec<EntityId>) {
        let mut universes: SlotMap<UniverseId, ()> = SlotMap::with_key();
        let mut universe = Universe::new(width, height).unwrap();
        universe.id = universes.insert(());
        let mut entities = SlotMap::with_key();
        let mut ids = Vec::new();
        for mut body in bodies {
            body.universe = Some(universe.id);
            let id = entities.insert_with_key(|key| {
                body.id = key;
                body
            });
            universe.insert(id);
            ids.push(id);
        }
        (entities, universe, ids)
    }

    fn ship(x: f64, y: f64, vx: f64, vy: f64) -> Entity {
        Entity::ship(Vector::new(x, y), Vector::new(vx, vy), 10.0, 0.0, HULL).unwrap()
    }

    #[test]
    fn test_boundary_scenario() {
        let (entities, universe, ids) =
            universe_with(150.0, 50.0, vec![ship(30.0, 15.0, 15.0, 20.0)]);
        let hit = boundary_hit(&entities[ids[0]], &universe);
        assert!((hit.time - 1.25).abs() < 1e-12);
        assert_eq!(hit.edge, Some(Edge::Top));
        let center = hit.center.unwrap();
        assert!((center - Vector::new(48.75, 40.0)).length() < 1e-12);
        let point = hit.point.unwrap();
        assert!((point - Vector::new(48.75, 50.0)).length() < 1e-12);
    }

    #[test]
    fn test_boundary_left_and_still() {
        let (entities, universe, ids) = universe_with(
            100.0,
            100.0,
            vec![ship(50.0, 50.0, -8.0, 0.0), ship(80.0, 80.0, 0.0, 0.0)],
        );
        let hit = boundary_hit(&entities[ids[0]], &universe);
        assert!((hit.time - 5.0).abs() < 1e-12);
        assert_eq!(hit.edge, Some(Edge::Left));
        assert_eq!(hit.point, Some(Vector::new(0.0, 50.0)));

        let hit = boundary_hit(&entities[ids[1]], &universe);
        assert!(hit.time.is_infinite());
        assert_eq!(hit.point, None);
    }

    #[test]
    fn test_next_event_prefers_earliest() {
        // Pair meets at t=5, the wall is further away
        let (entities, universe, ids) = universe_with(
            1000.0,
            1000.0,
            vec![ship(100.0, 500.0, 10.0, 0.0), ship(170.0, 500.0, 0.0, 0.0)],
        );
        let event = next_event(&entities, &universe);
        assert!((event.time - 5.0).abs() < 1e-9);
        assert_eq!(event.first(), Some(ids[0]));
        assert_eq!(event.second(), Some(ids[1]));
        assert!((event.point.unwrap() - Vector::new(160.0, 500.0)).length() < 1e-9);

        // Wall is closer than the pair
        let (entities, universe, ids) = universe_with(
            120.0,
            1000.0,
            vec![ship(100.0, 500.0, 10.0, 0.0), ship(30.0, 500.0, 0.0, 0.0)],
        );
        let event = next_event(&entities, &universe);
        assert!((event.time - 1.0).abs() < 1e-9);
        assert_eq!(event.first(), Some(ids[0]));
        assert_eq!(event.second(), None);
        assert_eq!(event.edge(), Some(Edge::Right));
    }

    #[test]
    fn test_next_event_never_when_still() {
        let (entities, universe, _) = universe_with(
            100.0,
            100.0,
            vec![ship(20.0, 20.0, 0.0, 0.0), ship(70.0, 70.0, 0.0, 0.0)],
        );
        let event = next_event(&entities, &universe);
        assert!(event.is_never());
        assert_eq!(event.participants, None);
        assert_eq!(event.point, None);
    }

    #[test]
    fn test_edge_reflection() {
        let v = Vector::new(3.0, -4.0);
        assert_eq!(Edge::Left.reflect(v), Vector::new(-3.0, -4.0));
        assert_eq!(Edge::Top.reflect(v), Vector::new(3.0, 4.0));
    }
}
