//! Rejection sampling of landing zones that do not overlap previously placed discs.

use cgmath::Point3;
use rand::Rng;
use rstar::RTree;
use tracing::debug;

use crate::config::LandingZoneBounds;
use crate::error::{Error, Result};
use crate::geometry::*;

/// Center and radius of a placed disc, stored in the R-tree by center only.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Footprint(Point3<f64>, f64);

impl Disc for Footprint {
    fn center(&self) -> Point3<f64> {
        self.0
    }

    fn radius(&self) -> f64 {
        self.1
    }
}

impl rstar::Point for Footprint {
    type Scalar = f64;
    const DIMENSIONS: usize = 3;

    fn generate(generator: impl Fn(usize) -> Self::Scalar) -> Self {
        Footprint(Point3::new(generator(0), generator(1), generator(2)), 0.)
    }

    fn nth(&self, index: usize) -> Self::Scalar {
        let Footprint(p, _) = self;
        match index {
            0 => p.x,
            1 => p.y,
            2 => p.z,
            _ => unreachable!(),
        }
    }

    fn nth_mut(&mut self, index: usize) -> &mut Self::Scalar {
        let Footprint(p, _) = self;
        match index {
            0 => &mut p.x,
            1 => &mut p.y,
            2 => &mut p.z,
            _ => unreachable!(),
        }
    }
}

/// Discs that a new landing zone must stay clear of.
///
/// Lookups only visit discs whose centers lie within `r + r_max` of the candidate, where `r_max`
/// is the largest radius stored so far.
pub struct Occupancy {
    tree: RTree<Footprint>,
    max_radius: f64,
    waypoints: usize,
    landing_zones: usize,
    area: f64,
}

impl Default for Occupancy {
    fn default() -> Self {
        Occupancy::new()
    }
}

impl Occupancy {
    pub fn new() -> Self {
        Occupancy {
            tree: RTree::new(),
            max_radius: 0.,
            waypoints: 0,
            landing_zones: 0,
            area: 0.,
        }
    }

    fn insert<D: Disc>(&mut self, disc: &D) {
        self.max_radius = self.max_radius.max(disc.radius());
        self.area += disc.area();
        self.tree.insert(Footprint(disc.center(), disc.radius()));
    }

    pub fn insert_waypoint(&mut self, waypoint: &Waypoint) {
        self.insert(waypoint);
        self.waypoints += 1;
    }

    pub fn insert_landing_zone(&mut self, landing_zone: &LandingZone) {
        self.insert(landing_zone);
        self.landing_zones += 1;
    }

    /// True if `disc` is strictly separated from every stored disc.
    pub fn is_clear<D: Disc>(&self, disc: &D) -> bool {
        // widened so rounding never drops a touching disc from the candidate set
        let reach = (disc.radius() + self.max_radius) * (1. + 1e-9) + 1e-9;
        self.tree
            .locate_within_distance(Footprint(disc.center(), 0.), reach * reach)
            .all(|other| !overlaps(disc, other))
    }

    pub fn num_waypoints(&self) -> usize {
        self.waypoints
    }

    pub fn num_landing_zones(&self) -> usize {
        self.landing_zones
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total ground area of the stored discs.
    pub fn area(&self) -> f64 {
        self.area
    }
}

/// Place `count` landing zones, each clear of everything in `occupancy` including the landing
/// zones placed before it. Accepted landing zones are added to `occupancy`.
///
/// Each landing zone gets at most `max_attempts` candidates; running out fails with
/// [Error::PlacementTimeout].
pub fn place_landing_zones<R: Rng + ?Sized>(
    bounds: &LandingZoneBounds,
    count: usize,
    occupancy: &mut Occupancy,
    max_attempts: usize,
    rng: &mut R,
) -> Result<Vec<LandingZone>> {
    let mut placed = Vec::with_capacity(count);
    for _ in 0..count {
        let mut attempts = 0;
        let landing_zone = loop {
            if attempts == max_attempts {
                let region = bounds.x.width() * bounds.y.width();
                return Err(Error::PlacementTimeout {
                    attempts,
                    placed: placed.len(),
                    waypoints: occupancy.num_waypoints(),
                    landing_zones: occupancy.num_landing_zones(),
                    density: if region > 0. {
                        occupancy.area() / region
                    } else {
                        std::f64::INFINITY
                    },
                });
            }
            attempts += 1;
            let candidate = bounds.sample(rng);
            if occupancy.is_clear(&candidate) {
                break candidate;
            }
        };
        debug!(
            attempts,
            x = landing_zone.x,
            y = landing_zone.y,
            radius = landing_zone.radius,
            "placed landing zone"
        );
        occupancy.insert_landing_zone(&landing_zone);
        placed.push(landing_zone);
    }
    Ok(placed)
}

#[cfg(test)]
fn test_rng() -> rand_chacha::ChaCha8Rng {
    use rand::SeedableRng;
    rand_chacha::ChaCha8Rng::seed_from_u64(1234)
}

#[cfg(test)]
fn bounds(side: f64, radius: (f64, f64)) -> LandingZoneBounds {
    use crate::config::Bounds;
    LandingZoneBounds {
        x: Bounds::new(0., side),
        y: Bounds::new(0., side),
        z: Bounds::new(0., 5.),
        radius: Bounds::new(radius.0, radius.1),
    }
}

#[test]
fn test_occupancy_matches_linear_scan() {
    let mut rng = test_rng();
    let b = bounds(200., (1., 15.));
    let mut occupancy = Occupancy::new();
    let mut stored = Vec::new();
    for _ in 0..60 {
        let l = b.sample(&mut rng);
        occupancy.insert_landing_zone(&l);
        stored.push(l);
    }
    for _ in 0..2000 {
        let candidate = b.sample(&mut rng);
        let expected = stored.iter().all(|s| separation(&candidate, s) > 0.);
        assert_eq!(occupancy.is_clear(&candidate), expected);
    }
}

#[test]
fn test_touching_is_not_clear() {
    let mut occupancy = Occupancy::new();
    occupancy.insert_landing_zone(&LandingZone {
        x: 0.,
        y: 0.,
        z: 0.,
        radius: 2.,
    });
    let touching = LandingZone {
        x: 5.,
        y: 0.,
        z: 0.,
        radius: 3.,
    };
    assert!(!occupancy.is_clear(&touching));
    let apart = LandingZone { x: 5.5, ..touching };
    assert!(occupancy.is_clear(&apart));
}

#[test]
fn test_placed_landing_zones_are_separated() {
    let mut rng = test_rng();
    let b = bounds(300., (5., 20.));
    let mut occupancy = Occupancy::new();
    let waypoints = (0..20)
        .map(|i| Waypoint {
            x: 15. * i as f64,
            y: 150.,
            z: 0.,
            radius: 10.,
            min_z: 50.,
            max_z: 200.,
        })
        .collect::<Vec<_>>();
    for w in &waypoints {
        occupancy.insert_waypoint(w);
    }
    let placed = place_landing_zones(&b, 15, &mut occupancy, 100_000, &mut rng).unwrap();
    assert_eq!(placed.len(), 15);
    assert_eq!(occupancy.num_landing_zones(), 15);
    assert_eq!(occupancy.len(), 35);
    for (i, l) in placed.iter().enumerate() {
        for w in &waypoints {
            assert!(separation(l, w) > 0.);
        }
        for other in &placed[i + 1..] {
            assert!(separation(l, other) > 0.);
        }
    }
}

#[test]
fn test_placement_timeout() {
    let mut rng = test_rng();
    // the landing zone area is a single point covered by a waypoint
    let b = LandingZoneBounds {
        z: crate::config::Bounds::new(0., 0.),
        ..bounds(0., (1., 1.))
    };
    let mut occupancy = Occupancy::new();
    occupancy.insert_waypoint(&Waypoint {
        x: 0.,
        y: 0.,
        z: 0.,
        radius: 10.,
        min_z: 50.,
        max_z: 200.,
    });
    match place_landing_zones(&b, 2, &mut occupancy, 50, &mut rng) {
        Err(Error::PlacementTimeout {
            attempts,
            placed,
            waypoints,
            landing_zones,
            ..
        }) => {
            assert_eq!(attempts, 50);
            assert_eq!(placed, 0);
            assert_eq!(waypoints, 1);
            assert_eq!(landing_zones, 0);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_timeout_reports_progress() {
    let mut rng = test_rng();
    // room for exactly one landing zone
    let b = LandingZoneBounds {
        z: crate::config::Bounds::new(0., 0.),
        ..bounds(0., (1., 1.))
    };
    let mut occupancy = Occupancy::new();
    match place_landing_zones(&b, 3, &mut occupancy, 10, &mut rng) {
        Err(Error::PlacementTimeout {
            placed,
            landing_zones,
            density,
            ..
        }) => {
            assert_eq!(placed, 1);
            assert_eq!(landing_zones, 1);
            assert!(density.is_infinite());
        }
        other => panic!("unexpected {:?}", other),
    }
}
