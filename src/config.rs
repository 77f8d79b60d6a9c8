//! Size-class profiles: sampling ranges for every field of a scene and the bounds of the sweep.
//!
//! A profile is either one of the built-in presets ([Config::preset]) or read from a TOML file.
//! Ranges are written as two element arrays:
//! ```toml
//! size_class = "L"
//! range_m = 10000.0
//!
//! [waypoint]
//! x = [0.0, 10000.0]
//! radius = [10.0, 25.0]
//! # ...
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Closed interval `[min, max]` a field is sampled from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        Bounds { min, max }
    }

    /// Uniform draw from the interval. A degenerate interval always yields `min`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.min == self.max {
            self.min
        } else {
            rng.gen_range(self.min..=self.max)
        }
    }

    pub fn contains(&self, v: f64) -> bool {
        self.min <= v && v <= self.max
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    fn check(&self, name: &str) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(Error::Config(format!("{} has non-finite bounds", name)));
        }
        if self.min > self.max {
            return Err(Error::Config(format!(
                "{} has min {} greater than max {}",
                name, self.min, self.max
            )));
        }
        if !self.width().is_finite() {
            return Err(Error::Config(format!(
                "{} [{}, {}] is too wide to sample from",
                name, self.min, self.max
            )));
        }
        Ok(())
    }

    fn check_radius(&self, name: &str) -> Result<()> {
        self.check(name)?;
        if self.min < 0. {
            return Err(Error::Config(format!(
                "{} must not be negative (min is {})",
                name, self.min
            )));
        }
        Ok(())
    }

    fn check_within(&self, name: &str, range_m: f64) -> Result<()> {
        self.check(name)?;
        if self.min < 0. || self.max > range_m {
            return Err(Error::Config(format!(
                "{} [{}, {}] leaves the area [0, {}]",
                name, self.min, self.max, range_m
            )));
        }
        Ok(())
    }
}

impl From<[f64; 2]> for Bounds {
    fn from(b: [f64; 2]) -> Self {
        Bounds::new(b[0], b[1])
    }
}

impl From<Bounds> for [f64; 2] {
    fn from(b: Bounds) -> Self {
        [b.min, b.max]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchingBounds {
    pub x: Bounds,
    pub y: Bounds,
    pub z: Bounds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointBounds {
    pub x: Bounds,
    pub y: Bounds,
    pub z: Bounds,
    /// Radius at ground level.
    pub radius: Bounds,
    pub min_z: Bounds,
    pub max_z: Bounds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandingZoneBounds {
    pub x: Bounds,
    pub y: Bounds,
    pub z: Bounds,
    pub radius: Bounds,
}

/// Bounds of the `(replicate, waypoints, landing zones)` sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Replicates are numbered `1..=instances`.
    pub instances: usize,
    pub min_waypoints: usize,
    pub max_waypoints: usize,
    pub step_waypoints: usize,
    pub min_landing_zones: usize,
    pub max_landing_zones: usize,
    pub step_landing_zones: usize,
}

/// Which previously placed discs a new landing zone is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlapScope {
    /// Only the waypoints and landing zones of the instance being generated.
    PerInstance,
    /// Every waypoint and landing zone generated so far in the run.
    Run,
}

impl Default for OverlapScope {
    fn default() -> Self {
        OverlapScope::PerInstance
    }
}

impl FromStr for OverlapScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "per-instance" => Ok(OverlapScope::PerInstance),
            "run" => Ok(OverlapScope::Run),
            other => Err(format!(
                "unknown overlap scope {}, expected per-instance or run",
                other
            )),
        }
    }
}

impl fmt::Display for OverlapScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlapScope::PerInstance => write!(f, "per-instance"),
            OverlapScope::Run => write!(f, "run"),
        }
    }
}

fn default_max_attempts() -> usize {
    1_000_000
}

fn default_altitude_margin() -> f64 {
    30.
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementConfig {
    /// Candidates drawn for a single landing zone before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default)]
    pub scope: OverlapScope,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        PlacementConfig {
            max_attempts: default_max_attempts(),
            scope: OverlapScope::default(),
        }
    }
}

/// One size-class profile. Built once at startup and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Name of the output directory and file prefix, e.g. `S`, `M` or `L`.
    pub size_class: String,
    /// Side length of the square area all x and y coordinates lie in.
    pub range_m: f64,
    /// Smallest allowed gap between a waypoint's `min_z` and `max_z`.
    #[serde(default = "default_altitude_margin")]
    pub altitude_margin: f64,
    /// Fixed RNG seed. Drawn from the OS when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub sweep: SweepConfig,
    #[serde(default)]
    pub placement: PlacementConfig,
    pub launching: LaunchingBounds,
    pub waypoint: WaypointBounds,
    pub landing_zone: LandingZoneBounds,
}

impl Config {
    /// Names of the built-in profiles.
    pub const PRESETS: [&'static str; 3] = ["S", "M", "L"];

    /// Built-in profile for small (`S`), medium (`M`) or large (`L`) areas.
    pub fn preset(name: &str) -> Option<Config> {
        let (range_m, launch_z, sweep) = match name {
            "S" => (
                1000.,
                Bounds::new(500., 600.),
                SweepConfig {
                    instances: 5,
                    min_waypoints: 10,
                    max_waypoints: 10,
                    step_waypoints: 10,
                    min_landing_zones: 1,
                    max_landing_zones: 2,
                    step_landing_zones: 1,
                },
            ),
            "M" => (
                5000.,
                Bounds::new(1000., 2000.),
                SweepConfig {
                    instances: 5,
                    min_waypoints: 10,
                    max_waypoints: 10,
                    step_waypoints: 10,
                    min_landing_zones: 1,
                    max_landing_zones: 2,
                    step_landing_zones: 1,
                },
            ),
            "L" => (
                10000.,
                Bounds::new(4000., 5000.),
                SweepConfig {
                    instances: 5,
                    min_waypoints: 10,
                    max_waypoints: 50,
                    step_waypoints: 10,
                    min_landing_zones: 3,
                    max_landing_zones: 5,
                    step_landing_zones: 1,
                },
            ),
            _ => return None,
        };
        let area = Bounds::new(0., range_m);
        Some(Config {
            size_class: name.to_string(),
            range_m,
            altitude_margin: default_altitude_margin(),
            seed: None,
            sweep,
            placement: PlacementConfig::default(),
            launching: LaunchingBounds {
                x: area,
                y: area,
                z: launch_z,
            },
            waypoint: WaypointBounds {
                x: area,
                y: area,
                z: Bounds::new(0., 0.),
                radius: Bounds::new(10., 25.),
                min_z: Bounds::new(50., 100.),
                max_z: Bounds::new(200., 300.),
            },
            landing_zone: LandingZoneBounds {
                x: area,
                y: area,
                z: Bounds::new(0., 0.),
                radius: Bounds::new(10., 25.),
            },
        })
    }

    /// Read a profile from a TOML file and validate it.
    pub fn from_file(path: &Path) -> Result<Config> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every range and sweep bound. Called before anything is written.
    pub fn validate(&self) -> Result<()> {
        if self.size_class.is_empty()
            || self.size_class == "."
            || self.size_class == ".."
            || self
                .size_class
                .chars()
                .any(|c| std::path::is_separator(c) || c.is_whitespace())
        {
            return Err(Error::Config(format!(
                "size class {:?} is not usable as a directory name",
                self.size_class
            )));
        }
        if !(self.range_m.is_finite() && self.range_m > 0.) {
            return Err(Error::Config(format!(
                "range_m must be positive, got {}",
                self.range_m
            )));
        }

        self.launching.x.check_within("launching.x", self.range_m)?;
        self.launching.y.check_within("launching.y", self.range_m)?;
        self.launching.z.check("launching.z")?;

        self.waypoint.x.check_within("waypoint.x", self.range_m)?;
        self.waypoint.y.check_within("waypoint.y", self.range_m)?;
        self.waypoint.z.check("waypoint.z")?;
        self.waypoint.radius.check_radius("waypoint.radius")?;
        self.waypoint.min_z.check("waypoint.min_z")?;
        self.waypoint.max_z.check("waypoint.max_z")?;
        let margin = self.waypoint.max_z.min - self.waypoint.min_z.max;
        if margin < self.altitude_margin {
            return Err(Error::Config(format!(
                "waypoint altitude bands may be {} high, less than the required margin of {}",
                margin, self.altitude_margin
            )));
        }

        self.landing_zone
            .x
            .check_within("landing_zone.x", self.range_m)?;
        self.landing_zone
            .y
            .check_within("landing_zone.y", self.range_m)?;
        self.landing_zone.z.check("landing_zone.z")?;
        self.landing_zone
            .radius
            .check_radius("landing_zone.radius")?;

        let s = &self.sweep;
        if s.instances == 0 {
            return Err(Error::Config("sweep.instances must be at least 1".into()));
        }
        if s.step_waypoints == 0 || s.step_landing_zones == 0 {
            return Err(Error::Config("sweep steps must be at least 1".into()));
        }
        if s.min_waypoints > s.max_waypoints {
            return Err(Error::Config(format!(
                "sweep.min_waypoints {} is greater than sweep.max_waypoints {}",
                s.min_waypoints, s.max_waypoints
            )));
        }
        if s.min_landing_zones > s.max_landing_zones {
            return Err(Error::Config(format!(
                "sweep.min_landing_zones {} is greater than sweep.max_landing_zones {}",
                s.min_landing_zones, s.max_landing_zones
            )));
        }
        if self.placement.max_attempts == 0 {
            return Err(Error::Config(
                "placement.max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[test]
fn test_presets_are_valid() {
    for name in Config::PRESETS.iter() {
        let config = Config::preset(name).unwrap();
        assert_eq!(config.size_class, *name);
        config.validate().unwrap();
    }
    assert!(Config::preset("XL").is_none());
}

#[test]
fn test_large_preset_values() {
    let config = Config::preset("L").unwrap();
    assert_eq!(config.range_m, 10000.);
    assert_eq!(config.launching.z, Bounds::new(4000., 5000.));
    assert_eq!(config.sweep.max_waypoints, 50);
    assert_eq!(config.sweep.min_landing_zones, 3);
    assert_eq!(config.placement.scope, OverlapScope::PerInstance);
}

#[test]
fn test_toml_round_trip() {
    let mut config = Config::preset("M").unwrap();
    config.seed = Some(7);
    config.placement.scope = OverlapScope::Run;
    let text = config.to_toml().unwrap();
    assert!(text.contains("scope = \"run\""));
    let parsed: Config = toml::from_str(&text).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_toml_defaults() {
    let text = r#"
size_class = "T"
range_m = 100.0

[sweep]
instances = 1
min_waypoints = 2
max_waypoints = 2
step_waypoints = 1
min_landing_zones = 1
max_landing_zones = 1
step_landing_zones = 1

[launching]
x = [0.0, 100.0]
y = [0.0, 100.0]
z = [50.0, 60.0]

[waypoint]
x = [0.0, 100.0]
y = [0.0, 100.0]
z = [0.0, 0.0]
radius = [1.0, 2.0]
min_z = [10.0, 20.0]
max_z = [60.0, 70.0]

[landing_zone]
x = [0.0, 100.0]
y = [0.0, 100.0]
z = [0.0, 5.0]
radius = [1.0, 2.0]
"#;
    let config: Config = toml::from_str(text).unwrap();
    config.validate().unwrap();
    assert_eq!(config.altitude_margin, 30.);
    assert_eq!(config.seed, None);
    assert_eq!(config.placement, PlacementConfig::default());
    assert_eq!(config.landing_zone.z, Bounds::new(0., 5.));
}

#[test]
fn test_validate_rejects_inverted_range() {
    let mut config = Config::preset("S").unwrap();
    config.landing_zone.radius = Bounds::new(25., 10.);
    match config.validate() {
        Err(Error::Config(msg)) => assert!(msg.contains("landing_zone.radius")),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_validate_rejects_overflowing_range() {
    let mut config = Config::preset("S").unwrap();
    config.launching.z = Bounds::new(-1e308, 1e308);
    match config.validate() {
        Err(Error::Config(msg)) => assert!(msg.contains("launching.z")),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_validate_rejects_relative_size_class() {
    for name in [".", "..", "a/b", ""].iter() {
        let mut config = Config::preset("S").unwrap();
        config.size_class = name.to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
    let mut config = Config::preset("S").unwrap();
    config.size_class = "S.v2".to_string();
    config.validate().unwrap();
}

#[test]
fn test_validate_rejects_negative_radius() {
    let mut config = Config::preset("S").unwrap();
    config.waypoint.radius = Bounds::new(-1., 10.);
    assert!(matches!(config.validate(), Err(Error::Config(_))));
}

#[test]
fn test_validate_rejects_small_altitude_margin() {
    let mut config = Config::preset("S").unwrap();
    config.waypoint.min_z = Bounds::new(50., 190.);
    assert!(matches!(config.validate(), Err(Error::Config(_))));
}

#[test]
fn test_validate_rejects_coordinates_outside_area() {
    let mut config = Config::preset("S").unwrap();
    config.landing_zone.x = Bounds::new(0., 2000.);
    assert!(matches!(config.validate(), Err(Error::Config(_))));
}

#[test]
fn test_validate_rejects_bad_sweep() {
    let mut config = Config::preset("L").unwrap();
    config.sweep.step_waypoints = 0;
    assert!(matches!(config.validate(), Err(Error::Config(_))));

    let mut config = Config::preset("L").unwrap();
    config.sweep.min_landing_zones = 6;
    assert!(matches!(config.validate(), Err(Error::Config(_))));

    let mut config = Config::preset("L").unwrap();
    config.size_class = "a/b".to_string();
    assert!(matches!(config.validate(), Err(Error::Config(_))));
}

#[test]
fn test_bounds_sampling() {
    use rand::SeedableRng;
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(3);
    let b = Bounds::new(10., 25.);
    for _ in 0..1000 {
        assert!(b.contains(b.sample(&mut rng)));
    }
    assert_eq!(Bounds::new(0., 0.).sample(&mut rng), 0.);
}

#[test]
fn test_scope_from_str() {
    assert_eq!(
        "per-instance".parse::<OverlapScope>(),
        Ok(OverlapScope::PerInstance)
    );
    assert_eq!("run".parse::<OverlapScope>(), Ok(OverlapScope::Run));
    assert!("global".parse::<OverlapScope>().is_err());
}
