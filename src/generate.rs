//! Sampling of scenes and the sweep that writes one instance file per size combination.
//!
//! Example usage:
//! ```
//! use grtop::*;
//! use grtop::generate::*;
//!
//! let mut config = Config::preset("S").unwrap();
//! config.seed = Some(42);
//! let mut generator = Generator::new(config).unwrap();
//! let id = sweep(generator.config()).next().unwrap();
//! let instance = generator.generate(id).unwrap();
//! assert!(instance.conflicts().is_empty());
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use std::path::{Path, PathBuf};

use crate::config::*;
use crate::error::{Error, Result};
use crate::geometry::*;
use crate::instance::{Instance, InstanceId};
use crate::placement::{place_landing_zones, Occupancy};

pub(crate) fn progress_bar(length: u64, message: &str, verbose: bool) -> ProgressBar {
    if !verbose {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(length);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40}] {pos}/{len} ({eta})")
            .progress_chars("#-"),
    );
    pb.set_message(message);
    pb
}

impl LaunchingBounds {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> LaunchingPoint {
        LaunchingPoint {
            x: self.x.sample(rng),
            y: self.y.sample(rng),
            z: self.z.sample(rng),
        }
    }
}

impl WaypointBounds {
    /// Draw a waypoint. Every field is independent, drawn in record order.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Waypoint {
        Waypoint {
            x: self.x.sample(rng),
            y: self.y.sample(rng),
            z: self.z.sample(rng),
            radius: self.radius.sample(rng),
            min_z: self.min_z.sample(rng),
            max_z: self.max_z.sample(rng),
        }
    }
}

impl LandingZoneBounds {
    /// Draw a landing zone without looking at anything already placed.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> LandingZone {
        LandingZone {
            x: self.x.sample(rng),
            y: self.y.sample(rng),
            z: self.z.sample(rng),
            radius: self.radius.sample(rng),
        }
    }
}

/// All instances of a run in generation order: replicate, then waypoint count, then landing zone
/// count. Combinations with more landing zones than waypoints are left out.
pub fn sweep(config: &Config) -> impl Iterator<Item = InstanceId> {
    let s = config.sweep.clone();
    let size_class = config.size_class.clone();
    iproduct!(
        1..=s.instances,
        (s.min_waypoints..=s.max_waypoints).step_by(s.step_waypoints),
        (s.min_landing_zones..=s.max_landing_zones).step_by(s.step_landing_zones)
    )
    .filter(|&(_, w, l)| w >= l)
    .map(move |(i, w, l)| InstanceId {
        size_class: size_class.clone(),
        waypoints: w,
        landing_zones: l,
        replicate: i,
    })
}

/// Outcome of [Generator::write_all].
#[derive(Debug, Default)]
pub struct RunSummary {
    pub written: Vec<PathBuf>,
    /// Instances given up on. Only filled when the run keeps going after a failure.
    pub failed: Vec<(InstanceId, Error)>,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Created {} instances", self.written.len())?;
        if !self.failed.is_empty() {
            write!(f, ", {} failed", self.failed.len())?;
        }
        Ok(())
    }
}

/// Generates the instances of one size class.
///
/// Owns the random number generator, so a fixed seed gives the same files on every run. With
/// [OverlapScope::Run] it also remembers every disc generated so far.
pub struct Generator<R: Rng = ChaCha8Rng> {
    config: Config,
    rng: R,
    run_occupancy: Occupancy,
}

impl Generator<ChaCha8Rng> {
    /// Validate `config` and seed the generator from `config.seed`, or from the OS if unset.
    pub fn new(config: Config) -> Result<Self> {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self::with_rng(config, rng)
    }
}

impl<R: Rng> Generator<R> {
    pub fn with_rng(config: Config, rng: R) -> Result<Self> {
        config.validate()?;
        Ok(Generator {
            config,
            rng,
            run_occupancy: Occupancy::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Sample one instance: the launching point, `id.waypoints` waypoints, then `id.landing_zones`
    /// landing zones that overlap nothing in the configured scope.
    pub fn generate(&mut self, id: InstanceId) -> Result<Instance> {
        let config = &self.config;
        let rng = &mut self.rng;

        let launching = config.launching.sample(rng);
        let waypoints = (0..id.waypoints)
            .map(|_| config.waypoint.sample(rng))
            .collect::<Vec<_>>();

        let mut local = Occupancy::new();
        let occupancy = match config.placement.scope {
            OverlapScope::PerInstance => &mut local,
            OverlapScope::Run => &mut self.run_occupancy,
        };
        for waypoint in &waypoints {
            occupancy.insert_waypoint(waypoint);
        }
        let landing_zones = place_landing_zones(
            &config.landing_zone,
            id.landing_zones,
            occupancy,
            config.placement.max_attempts,
            rng,
        )?;

        Ok(Instance {
            id: Some(id),
            launching,
            waypoints,
            landing_zones,
        })
    }

    /// Generate every instance of the sweep and write it below `root`, see [InstanceId::path].
    ///
    /// The first failure ends the run unless `keep_going` is set, in which case failed instances
    /// are logged and listed in the summary. Files already in the output directory are left alone;
    /// see [clean_output].
    pub fn write_all(&mut self, root: &Path, keep_going: bool, verbose: bool) -> Result<RunSummary> {
        let dir = root.join(&self.config.size_class);
        std::fs::create_dir_all(&dir)?;
        let stale = stale_instances(&dir)?;
        if !stale.is_empty() {
            warn!(
                dir = %dir.display(),
                count = stale.len(),
                "output directory already holds instance files"
            );
        }

        let ids = sweep(&self.config).collect::<Vec<_>>();
        info!(
            size_class = %self.config.size_class,
            instances = ids.len(),
            scope = %self.config.placement.scope,
            "starting sweep"
        );
        let pb = progress_bar(ids.len() as u64, "Generating instances", verbose);

        let mut summary = RunSummary::default();
        for id in ids {
            let path = id.path(root);
            let result = self.generate(id.clone()).and_then(|instance| -> Result<Instance> {
                if let Err(e) = instance.write_text(&path) {
                    // drop the partial file
                    if let Err(cleanup) = std::fs::remove_file(&path) {
                        warn!(
                            file = %path.display(),
                            error = %cleanup,
                            "could not remove partial instance file"
                        );
                    }
                    return Err(e.into());
                }
                Ok(instance)
            });
            match result {
                Ok(instance) => {
                    info!(
                        file = %path.display(),
                        waypoints = instance.num_waypoints(),
                        landing_zones = instance.num_landing_zones(),
                        "created instance"
                    );
                    summary.written.push(path);
                }
                Err(e) if keep_going => {
                    warn!(instance = %id, error = %e, "skipping instance");
                    summary.failed.push((id, e));
                }
                Err(e) => {
                    pb.finish_and_clear();
                    return Err(e);
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        info!(
            written = summary.written.len(),
            failed = summary.failed.len(),
            "finished sweep"
        );
        Ok(summary)
    }
}

/// Instance files (`*.dat`) in `dir`, sorted by name.
pub fn stale_instances(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut stale = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |ext| ext == "dat") {
            stale.push(path);
        }
    }
    stale.sort();
    Ok(stale)
}

/// Delete the instance files in a size-class directory. Returns how many were removed.
///
/// `dir` must exist. If it holds instance files, `confirmed` must be set or nothing is deleted
/// and [Error::Unconfirmed] is returned.
pub fn clean_output(dir: &Path, confirmed: bool) -> Result<usize> {
    if !dir.is_dir() {
        return Err(Error::MissingDirectory(dir.to_path_buf()));
    }
    let stale = stale_instances(dir)?;
    if !stale.is_empty() && !confirmed {
        return Err(Error::Unconfirmed {
            dir: dir.to_path_buf(),
            count: stale.len(),
        });
    }
    for path in &stale {
        std::fs::remove_file(path)?;
    }
    info!(dir = %dir.display(), removed = stale.len(), "removed old instances");
    Ok(stale.len())
}

#[cfg(test)]
fn seeded(config: Config) -> Generator {
    Generator::with_rng(config, ChaCha8Rng::seed_from_u64(17)).unwrap()
}

/// Tiny profile where every landing zone is drawn at the origin and waypoints stay far away.
#[cfg(test)]
fn single_spot_config() -> Config {
    let mut config = Config::preset("S").unwrap();
    config.size_class = "T".to_string();
    config.sweep = SweepConfig {
        instances: 2,
        min_waypoints: 1,
        max_waypoints: 1,
        step_waypoints: 1,
        min_landing_zones: 1,
        max_landing_zones: 1,
        step_landing_zones: 1,
    };
    config.waypoint.x = Bounds::new(900., 1000.);
    config.waypoint.y = Bounds::new(900., 1000.);
    config.landing_zone = LandingZoneBounds {
        x: Bounds::new(0., 0.),
        y: Bounds::new(0., 0.),
        z: Bounds::new(0., 0.),
        radius: Bounds::new(1., 1.),
    };
    config.placement.max_attempts = 20;
    config
}

#[cfg(test)]
fn id(w: usize, l: usize, i: usize) -> InstanceId {
    InstanceId {
        size_class: "L".to_string(),
        waypoints: w,
        landing_zones: l,
        replicate: i,
    }
}

#[test]
fn test_sweep_large_preset() {
    let config = Config::preset("L").unwrap();
    let ids = sweep(&config).collect::<Vec<_>>();
    // 5 replicates x 5 waypoint counts x 3 landing zone counts, all with w >= l
    assert_eq!(ids.len(), 75);
    assert_eq!(ids[0], id(10, 3, 1));
    assert_eq!(ids[1], id(10, 4, 1));
    assert_eq!(ids[3], id(20, 3, 1));
    assert_eq!(ids[74], id(50, 5, 5));
}

#[test]
fn test_sweep_skips_more_landing_zones_than_waypoints() {
    let mut config = Config::preset("L").unwrap();
    config.sweep = SweepConfig {
        instances: 1,
        min_waypoints: 1,
        max_waypoints: 3,
        step_waypoints: 1,
        min_landing_zones: 1,
        max_landing_zones: 3,
        step_landing_zones: 1,
    };
    let pairs = sweep(&config)
        .map(|id| (id.waypoints, id.landing_zones))
        .collect::<Vec<_>>();
    assert_eq!(pairs, vec![(1, 1), (2, 1), (2, 2), (3, 1), (3, 2), (3, 3)]);
}

#[test]
fn test_sweep_steps_stop_at_max() {
    let mut config = Config::preset("L").unwrap();
    config.sweep = SweepConfig {
        instances: 2,
        min_waypoints: 10,
        max_waypoints: 35,
        step_waypoints: 10,
        min_landing_zones: 3,
        max_landing_zones: 3,
        step_landing_zones: 5,
    };
    let ids = sweep(&config).collect::<Vec<_>>();
    assert_eq!(ids.len(), 6);
    assert!(ids.iter().all(|id| [10, 20, 30].contains(&id.waypoints)));
    assert_eq!(ids.iter().filter(|id| id.replicate == 2).count(), 3);
}

#[test]
fn test_generated_fields_in_range() {
    let config = Config::preset("L").unwrap();
    let mut generator = seeded(config.clone());
    let instance = generator.generate(id(50, 5, 1)).unwrap();

    let lc = &config.launching;
    assert!(lc.x.contains(instance.launching.x));
    assert!(lc.y.contains(instance.launching.y));
    assert!(lc.z.contains(instance.launching.z));

    let wb = &config.waypoint;
    assert_eq!(instance.num_waypoints(), 50);
    for w in &instance.waypoints {
        assert!(wb.x.contains(w.x) && wb.y.contains(w.y) && wb.z.contains(w.z));
        assert!(wb.radius.contains(w.radius));
        assert!(wb.min_z.contains(w.min_z) && wb.max_z.contains(w.max_z));
        assert!(w.max_z - w.min_z >= config.altitude_margin);
    }

    let lb = &config.landing_zone;
    assert_eq!(instance.num_landing_zones(), 5);
    for l in &instance.landing_zones {
        assert!(lb.x.contains(l.x) && lb.y.contains(l.y) && lb.z.contains(l.z));
        assert!(lb.radius.contains(l.radius));
    }
}

#[test]
fn test_generated_landing_zones_do_not_overlap() {
    let mut config = Config::preset("S").unwrap();
    // crowd the area so that rejections actually happen
    config.waypoint.radius = Bounds::new(40., 60.);
    config.landing_zone.radius = Bounds::new(30., 50.);
    let mut generator = seeded(config);
    for replicate in 1..=5 {
        let instance = generator.generate(id(40, 15, replicate)).unwrap();
        for (i, l) in instance.landing_zones.iter().enumerate() {
            for w in &instance.waypoints {
                assert!(separation(l, w) > 0.);
            }
            for other in &instance.landing_zones[i + 1..] {
                assert!(separation(l, other) > 0.);
            }
        }
    }
}

#[test]
fn test_per_instance_scope_forgets_previous_instances() {
    let config = single_spot_config();
    let mut generator = seeded(config.clone());
    let ids = sweep(&config).collect::<Vec<_>>();
    assert_eq!(ids.len(), 2);
    for id in ids {
        let instance = generator.generate(id).unwrap();
        assert_eq!(instance.landing_zones[0].x, 0.);
    }
}

#[test]
fn test_run_scope_remembers_previous_instances() {
    let mut config = single_spot_config();
    config.placement.scope = OverlapScope::Run;
    let mut generator = seeded(config.clone());
    let mut ids = sweep(&config);
    generator.generate(ids.next().unwrap()).unwrap();
    // the only possible spot is taken by the first instance's landing zone
    match generator.generate(ids.next().unwrap()) {
        Err(Error::PlacementTimeout {
            waypoints,
            landing_zones,
            ..
        }) => {
            assert_eq!(waypoints, 2);
            assert_eq!(landing_zones, 1);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_same_seed_same_instances() {
    let mut config = Config::preset("M").unwrap();
    config.seed = Some(99);
    let mut a = Generator::new(config.clone()).unwrap();
    let mut b = Generator::new(config.clone()).unwrap();
    for id in sweep(&config) {
        assert_eq!(a.generate(id.clone()).unwrap(), b.generate(id).unwrap());
    }
}

#[test]
fn test_new_rejects_invalid_config() {
    let mut config = Config::preset("M").unwrap();
    config.sweep.instances = 0;
    assert!(matches!(Generator::new(config), Err(Error::Config(_))));
}

#[test]
fn test_write_all() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::preset("L").unwrap();
    config.sweep.instances = 2;
    config.sweep.max_waypoints = 20;
    let mut generator = seeded(config.clone());
    let summary = generator.write_all(dir.path(), false, false).unwrap();
    let expected = sweep(&config)
        .map(|id| id.path(dir.path()))
        .collect::<Vec<_>>();
    assert_eq!(summary.written, expected);
    assert!(summary.failed.is_empty());

    let mut on_disk = stale_instances(&dir.path().join("L")).unwrap();
    let mut written = summary.written.clone();
    on_disk.sort();
    written.sort();
    assert_eq!(on_disk, written);

    for path in &summary.written {
        let instance = Instance::from_file(path).unwrap();
        let id = instance.id.clone().unwrap();
        assert_eq!(instance.num_waypoints(), id.waypoints);
        assert_eq!(instance.num_landing_zones(), id.landing_zones);
    }
}

#[test]
fn test_write_all_keep_going() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = single_spot_config();
    config.sweep.instances = 1;
    config.sweep.max_waypoints = 2;
    config.sweep.max_landing_zones = 2;
    // (1, 1) and (2, 1) fit, (2, 2) needs a second landing zone at the origin
    let mut generator = seeded(config.clone());
    let summary = generator.write_all(dir.path(), true, false).unwrap();
    assert_eq!(summary.written.len(), 2);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0.landing_zones, 2);
    assert!(!summary.failed[0].0.path(dir.path()).exists());

    let mut generator = seeded(config);
    assert!(matches!(
        generator.write_all(dir.path(), false, false),
        Err(Error::PlacementTimeout { .. })
    ));
}

#[test]
fn test_clean_output() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("L");
    assert!(matches!(
        clean_output(&missing, true),
        Err(Error::MissingDirectory(_))
    ));

    std::fs::create_dir(&missing).unwrap();
    assert_eq!(clean_output(&missing, false).unwrap(), 0);

    std::fs::write(missing.join("grtopL_103_1.dat"), "old").unwrap();
    std::fs::write(missing.join("grtopL_103_2.dat"), "old").unwrap();
    std::fs::write(missing.join("notes.txt"), "keep").unwrap();
    match clean_output(&missing, false) {
        Err(Error::Unconfirmed { count, .. }) => assert_eq!(count, 2),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(stale_instances(&missing).unwrap().len(), 2);

    assert_eq!(clean_output(&missing, true).unwrap(), 2);
    assert!(stale_instances(&missing).unwrap().is_empty());
    assert!(missing.join("notes.txt").exists());
}

#[test]
fn test_write_all_unwritable_instance() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = single_spot_config();
    config.sweep.instances = 1;
    let blocked = sweep(&config).next().unwrap().path(dir.path());
    // a directory where the file should go makes both the write and the cleanup fail
    std::fs::create_dir_all(&blocked).unwrap();

    let mut generator = seeded(config.clone());
    let summary = generator.write_all(dir.path(), true, false).unwrap();
    assert!(summary.written.is_empty());
    assert_eq!(summary.failed.len(), 1);
    assert!(matches!(summary.failed[0].1, Error::IOError(_)));
    assert!(blocked.is_dir());

    let mut generator = seeded(config);
    assert!(matches!(
        generator.write_all(dir.path(), false, false),
        Err(Error::IOError(_))
    ));
}
