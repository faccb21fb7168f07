//! Orbital Drift - event-driven universe of circular bodies
//!
//! Core modules:
//! - `sim`: Deterministic simulation (entities, universes, time of impact, stepping)
//! - `settings`: Data-driven physics tuning
//! - `error`: Error taxonomy surfaced to callers
//!
//! Time never advances in fixed increments. Each step jumps straight to the
//! next predicted contact, resolves it, and repeats until the requested
//! duration is used up.

pub mod error;
pub mod settings;
pub mod sim;

pub use error::{ErrorKind, Result, SimError};
pub use settings::PhysicsSettings;

/// 2D vector used for positions and velocities (f64 components)
pub type Vector = glam::DVec2;

/// Physical constants shared by every entity kind
pub mod consts {
    /// Universal speed limit (km/s)
    pub const MAX_SPEED: f64 = 300_000.0;

    /// Minimum radii per kind (km)
    pub const SHIP_MIN_RADIUS: f64 = 10.0;
    pub const BULLET_MIN_RADIUS: f64 = 1.0;
    pub const MINOR_PLANET_MIN_RADIUS: f64 = 5.0;

    /// Densities per kind (kg/km³)
    pub const SHIP_DENSITY: f64 = 1.42e20;
    pub const BULLET_DENSITY: f64 = 7.8e12;
    pub const ASTEROID_DENSITY: f64 = 2.65e12;
    pub const PLANETOID_DENSITY: f64 = 0.917e12;

    /// Boundary reflections a bullet survives by default
    pub const BULLET_MAX_BOUNCES: u32 = 2;
    /// Muzzle speed of a fired bullet (km/s)
    pub const BULLET_SPEED: f64 = 250.0;
    /// Thruster force of every ship (N)
    pub const THRUSTER_FORCE: f64 = 1.1e18;

    /// Planetoid radius lost per km travelled
    pub const PLANETOID_SHRINK_RATE: f64 = 1e-6;
    /// Planetoids at least this large split into asteroids when they die
    pub const FRAGMENT_MIN_RADIUS: f64 = 30.0;
    /// Fragment speed relative to the parent planetoid
    pub const FRAGMENT_SPEED_FACTOR: f64 = 1.5;

    /// Fraction of the summed radii that counts as significant overlap
    pub const OVERLAP_TOLERANCE: f64 = 0.01;
    /// Fraction of the radius an entity may poke past a universe edge
    pub const BOUNDARY_TOLERANCE: f64 = 0.01;
    /// Radius ratio at which nested circles measure from the far boundary
    pub const NESTED_RADIUS_RATIO: f64 = 2.0;

    /// Default cap on contacts resolved in a single step
    pub const MAX_EVENTS_PER_STEP: usize = 100_000;
}

/// Normalize an angle to [0, 2π)
#[inline]
pub fn normalize_angle(angle: f64) -> f64 {
    use std::f64::consts::TAU;
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid can round up to TAU for tiny negative inputs
    if wrapped >= TAU { 0.0 } else { wrapped }
}

/// Convert polar (r, theta) to cartesian (x, y)
#[inline]
pub fn polar_to_cartesian(r: f64, theta: f64) -> Vector {
    Vector::new(r * theta.cos(), r * theta.sin())
}

/// Volume of a sphere with the given radius
#[inline]
pub fn sphere_volume(radius: f64) -> f64 {
    4.0 / 3.0 * std::f64::consts::PI * radius.powi(3)
}
