//! Geometric primitives of a GRTOP scene and the separation test between them.

use cgmath::prelude::*;
use cgmath::Point3;

/// An object with a center and a ground-level radius.
pub trait Disc {
    fn center(&self) -> Point3<f64>;

    fn radius(&self) -> f64;

    /// Area of the disc at ground level.
    fn area(&self) -> f64 {
        std::f64::consts::PI * self.radius() * self.radius()
    }
}

/// Distance between the 3D centers of `a` and `b` minus the sum of their radii.
///
/// Values `<= 0` mean the two objects touch or overlap. The full 3D center distance is used even
/// though the radii describe sizes at ground level.
pub fn separation<A: Disc + ?Sized, B: Disc + ?Sized>(a: &A, b: &B) -> f64 {
    a.center().distance(b.center()) - (a.radius() + b.radius())
}

/// True if `a` and `b` touch or overlap.
pub fn overlaps<A: Disc + ?Sized, B: Disc + ?Sized>(a: &A, b: &B) -> bool {
    separation(a, b) <= 0.
}

/// Aerial origin of a route. Has no extent and is never checked for overlap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaunchingPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl LaunchingPoint {
    pub fn to_vec(&self) -> Vec<f64> {
        vec![self.x, self.y, self.z]
    }

    pub fn center(&self) -> Point3<f64> {
        Point3::new(self.x, self.y, self.z)
    }
}

/// Waypoint shaped as a truncated cone.
///
/// `radius` is the radius at ground level. The waypoint has to be visited between the altitudes
/// `min_z` and `max_z`; the cone is wider at `min_z` than at `max_z`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub radius: f64,
    pub min_z: f64,
    pub max_z: f64,
}

impl Waypoint {
    /// Parse a waypoint from its record. Order is x, y, z, radius, min z, max z.
    pub fn from_vec(v: Vec<f64>) -> Self {
        Waypoint {
            x: v[0],
            y: v[1],
            z: v[2],
            radius: v[3],
            min_z: v[4],
            max_z: v[5],
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        vec![self.x, self.y, self.z, self.radius, self.min_z, self.max_z]
    }
}

impl Disc for Waypoint {
    fn center(&self) -> Point3<f64> {
        Point3::new(self.x, self.y, self.z)
    }

    fn radius(&self) -> f64 {
        self.radius
    }
}

/// Circular landing area at ground level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandingZone {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub radius: f64,
}

impl LandingZone {
    /// Parse a landing zone from its record. Order is x, y, z, radius.
    pub fn from_vec(v: Vec<f64>) -> Self {
        LandingZone {
            x: v[0],
            y: v[1],
            z: v[2],
            radius: v[3],
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        vec![self.x, self.y, self.z, self.radius]
    }
}

impl Disc for LandingZone {
    fn center(&self) -> Point3<f64> {
        Point3::new(self.x, self.y, self.z)
    }

    fn radius(&self) -> f64 {
        self.radius
    }
}

#[cfg(test)]
fn landing(x: f64, y: f64, z: f64, radius: f64) -> LandingZone {
    LandingZone { x, y, z, radius }
}

#[test]
fn test_separation_known_value() {
    let a = landing(0., 0., 0., 1.);
    let b = landing(3., 4., 0., 1.5);
    assert!((separation(&a, &b) - 2.5).abs() < 1e-12);
}

#[test]
fn test_separation_uses_height() {
    let a = landing(0., 0., 0., 1.);
    let b = landing(0., 0., 5., 1.);
    assert!((separation(&a, &b) - 3.).abs() < 1e-12);
}

#[test]
fn test_separation_symmetric() {
    let w = Waypoint {
        x: 120.5,
        y: -3.25,
        z: 0.,
        radius: 17.,
        min_z: 60.,
        max_z: 250.,
    };
    let l = landing(140., 10., 4., 12.);
    assert_eq!(separation(&w, &l), separation(&l, &w));
}

#[test]
fn test_self_separation() {
    let l = landing(31., 77., 2., 13.5);
    assert_eq!(separation(&l, &l), -27.);
}

#[test]
fn test_touching_counts_as_overlap() {
    let a = landing(0., 0., 0., 2.);
    let b = landing(5., 0., 0., 3.);
    assert_eq!(separation(&a, &b), 0.);
    assert!(overlaps(&a, &b));
    let c = landing(5.01, 0., 0., 3.);
    assert!(!overlaps(&a, &c));
}

#[test]
fn test_record_order() {
    let w = Waypoint::from_vec(vec![1., 2., 3., 4., 5., 6.]);
    assert_eq!(w.radius, 4.);
    assert_eq!(w.min_z, 5.);
    assert_eq!(w.to_vec(), vec![1., 2., 3., 4., 5., 6.]);
    let l = LandingZone::from_vec(vec![7., 8., 9., 10.]);
    assert_eq!(l.to_vec(), vec![7., 8., 9., 10.]);
}
