//! Generator of synthetic instances for the GRTOP routing benchmark.
//!
//! An instance is a launching point, a set of waypoints shaped as truncated cones and a set of
//! landing zones on the ground. Landing zones are placed by rejection sampling so that they never
//! touch a waypoint or another landing zone. A [generate::Generator] sweeps over the number of
//! waypoints, the number of landing zones and a replicate id, and writes one text file per
//! combination.

#[macro_use]
extern crate itertools;

pub mod config;
pub mod error;
pub mod generate;
pub mod geometry;
pub mod instance;
pub mod placement;

pub use config::*;
pub use error::*;
pub use geometry::*;
pub use instance::*;
