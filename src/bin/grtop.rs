extern crate grtop;
extern crate ply_rs;
extern crate structopt;

use grtop::generate::*;
use grtop::*;
use ply_rs::ply::{
    Addable, DefaultElement, ElementDef, Ply, Property, PropertyDef, PropertyType, ScalarType,
};
use ply_rs::writer::Writer;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

#[derive(StructOpt, Debug)]
struct GenerateOpt {
    /// Built-in size class profile: S, M or L. Defaults to L.
    #[structopt(long = "profile")]
    profile: Option<String>,

    /// Read the size class profile from a TOML file instead of using a built-in one. `grtop
    /// profile` prints a starting point.
    #[structopt(long = "config", parse(from_os_str), conflicts_with = "profile")]
    config: Option<PathBuf>,

    /// Name of the size class. Used as output directory and file prefix.
    #[structopt(long = "size-class")]
    size_class: Option<String>,

    /// Directory the size class directory is created in.
    #[structopt(long = "output-dir", default_value = ".", parse(from_os_str))]
    output_dir: PathBuf,

    /// Seed for the random number generator. Runs with the same seed and profile produce the same
    /// files.
    #[structopt(long = "seed")]
    seed: Option<u64>,

    /// Number of replicates of each size combination.
    #[structopt(long = "instances")]
    instances: Option<usize>,

    /// Smallest number of waypoints.
    #[structopt(long = "min-waypoints")]
    min_waypoints: Option<usize>,

    /// Largest number of waypoints.
    #[structopt(long = "max-waypoints")]
    max_waypoints: Option<usize>,

    /// Increment of the number of waypoints.
    #[structopt(long = "step-waypoints")]
    step_waypoints: Option<usize>,

    /// Smallest number of landing zones.
    #[structopt(long = "min-landing-zones")]
    min_landing_zones: Option<usize>,

    /// Largest number of landing zones.
    #[structopt(long = "max-landing-zones")]
    max_landing_zones: Option<usize>,

    /// Increment of the number of landing zones.
    #[structopt(long = "step-landing-zones")]
    step_landing_zones: Option<usize>,

    /// Candidates drawn for a single landing zone before the instance is given up.
    #[structopt(long = "max-attempts")]
    max_attempts: Option<usize>,

    /// Discs a new landing zone must avoid: `per-instance` only looks at the instance being
    /// generated, `run` at everything generated so far.
    #[structopt(long = "scope")]
    scope: Option<OverlapScope>,

    /// Delete the instance files already in the size class directory before generating.
    #[structopt(long = "clean")]
    clean: bool,

    /// Continue with the next instance when one fails. The exit status is still an error.
    #[structopt(long = "keep-going")]
    keep_going: bool,

    /// Only log warnings and hide the progress bar.
    #[structopt(short = "q", long = "quiet")]
    quiet: bool,
}

#[derive(StructOpt, Debug)]
struct CleanOpt {
    /// Size class directory to remove instance files from.
    #[structopt(name = "DIR", parse(from_os_str))]
    dir: PathBuf,

    /// Confirm deletion of the instance files.
    #[structopt(short = "y", long = "yes")]
    yes: bool,
}

#[derive(StructOpt, Debug)]
struct CheckOpt {
    /// Instance files to check.
    #[structopt(name = "FILE", parse(from_os_str), required = true)]
    inputs: Vec<PathBuf>,
}

#[derive(StructOpt, Debug)]
struct PLYOpt {
    /// Input instance file.
    #[structopt(name = "FILE", parse(from_os_str))]
    input: PathBuf,

    /// Output file in .ply format.
    #[structopt(name = "OUT", parse(from_os_str))]
    out: PathBuf,
}

#[derive(StructOpt, Debug)]
struct ProfileOpt {
    /// Built-in profile to print: S, M or L.
    #[structopt(name = "NAME", default_value = "L")]
    name: String,
}

#[derive(StructOpt, Debug)]
#[structopt(
    name = "grtop",
    about = "Tools for generating synthetic GRTOP routing benchmark instances."
)]
enum Opt {
    /// Generate one instance file per combination of waypoint count, landing zone count and
    /// replicate.
    Generate(GenerateOpt),
    /// Delete the instance files in a size class directory.
    Clean(CleanOpt),
    /// Check instance files for overlapping landing zones.
    Check(CheckOpt),
    /// Convert an instance file to a .ply for visualization.
    #[structopt(name = "ply")]
    PLY(PLYOpt),
    /// Print a built-in profile as TOML.
    Profile(ProfileOpt),
}

fn preset(name: &str) -> Result<Config> {
    Config::preset(name).ok_or_else(|| {
        Error::Config(format!(
            "unknown profile {}, expected one of {}",
            name,
            Config::PRESETS.join(", ")
        ))
    })
}

fn run_generate(opt: GenerateOpt) -> Result<()> {
    let mut config = match &opt.config {
        Some(path) => Config::from_file(path)?,
        None => preset(opt.profile.as_deref().unwrap_or("L"))?,
    };

    if let Some(size_class) = opt.size_class {
        config.size_class = size_class;
    }
    if opt.seed.is_some() {
        config.seed = opt.seed;
    }
    let sweep = &mut config.sweep;
    let mut overrides = [
        (opt.instances, &mut sweep.instances),
        (opt.min_waypoints, &mut sweep.min_waypoints),
        (opt.max_waypoints, &mut sweep.max_waypoints),
        (opt.step_waypoints, &mut sweep.step_waypoints),
        (opt.min_landing_zones, &mut sweep.min_landing_zones),
        (opt.max_landing_zones, &mut sweep.max_landing_zones),
        (opt.step_landing_zones, &mut sweep.step_landing_zones),
        (opt.max_attempts, &mut config.placement.max_attempts),
    ];
    for (value, field) in overrides.iter_mut() {
        if let Some(v) = *value {
            **field = v;
        }
    }
    if let Some(scope) = opt.scope {
        config.placement.scope = scope;
    }

    let mut generator = Generator::new(config)?;
    let dir = opt.output_dir.join(&generator.config().size_class);
    if opt.clean && dir.is_dir() {
        let removed = clean_output(&dir, true)?;
        println!("Removed {} old instances from {}", removed, dir.display());
    }

    let summary = generator.write_all(&opt.output_dir, opt.keep_going, !opt.quiet)?;
    println!("{} in {}", summary, dir.display());
    if !summary.failed.is_empty() {
        for (id, e) in &summary.failed {
            eprintln!("{}: {}", id, e);
        }
        return Err(Error::Incomplete {
            failed: summary.failed.len(),
        });
    }
    Ok(())
}

fn run_clean(opt: CleanOpt) -> Result<()> {
    let removed = clean_output(&opt.dir, opt.yes)?;
    println!("Removed {} old instances from {}", removed, opt.dir.display());
    Ok(())
}

fn run_check(opt: CheckOpt) -> Result<()> {
    let mut first_bad = None;
    for path in &opt.inputs {
        let instance = Instance::from_file(path)?;
        let conflicts = instance.conflicts();
        if conflicts.is_empty() {
            println!("{}: {} no overlaps", path.display(), instance);
        } else {
            println!("{}: {}", path.display(), instance);
            for conflict in &conflicts {
                println!("  {}", conflict);
            }
            first_bad.get_or_insert((path.clone(), conflicts.len()));
        }
    }
    match first_bad {
        Some((file, count)) => Err(Error::Overlap { file, count }),
        None => Ok(()),
    }
}

fn vertex(x: f64, y: f64, z: f64, radius: f64, color: [u8; 3]) -> DefaultElement {
    let mut point = DefaultElement::new();
    point.insert("x".to_string(), Property::Float(x as f32));
    point.insert("y".to_string(), Property::Float(y as f32));
    point.insert("z".to_string(), Property::Float(z as f32));
    point.insert("radius".to_string(), Property::Float(radius as f32));
    point.insert("red".to_string(), Property::UChar(color[0]));
    point.insert("green".to_string(), Property::UChar(color[1]));
    point.insert("blue".to_string(), Property::UChar(color[2]));
    point
}

/// Write the scene out to a ply file. The launching point is red, waypoints are green and landing
/// zones are blue.
fn write_scene(path: &std::path::Path, instance: &Instance) -> Result<()> {
    let mut ply = Ply::<DefaultElement>::new();
    let mut point_element = ElementDef::new("vertex".to_string());
    for name in ["x", "y", "z", "radius"].iter() {
        let p = PropertyDef::new(name.to_string(), PropertyType::Scalar(ScalarType::Float));
        point_element.properties.add(p);
    }
    for name in ["red", "green", "blue"].iter() {
        let p = PropertyDef::new(name.to_string(), PropertyType::Scalar(ScalarType::UChar));
        point_element.properties.add(p);
    }
    ply.header.elements.add(point_element);

    let l = &instance.launching;
    let mut vertices = vec![vertex(l.x, l.y, l.z, 0., [255, 0, 0])];
    vertices.extend(
        instance
            .waypoints
            .iter()
            .map(|w| vertex(w.x, w.y, w.z, w.radius, [0, 255, 0])),
    );
    vertices.extend(
        instance
            .landing_zones
            .iter()
            .map(|g| vertex(g.x, g.y, g.z, g.radius, [0, 0, 255])),
    );
    ply.payload.insert("vertex".to_string(), vertices);

    let mut file = BufWriter::new(File::create(path)?);
    let writer = Writer::new();
    writer.write_ply(&mut file, &mut ply)?;
    Ok(())
}

fn run_ply(opt: PLYOpt) -> Result<()> {
    let instance = Instance::from_file(&opt.input)?;
    write_scene(&opt.out, &instance)?;
    println!("Wrote {} to {}", instance, opt.out.display());
    Ok(())
}

fn run_profile(opt: ProfileOpt) -> Result<()> {
    print!("{}", preset(&opt.name)?.to_toml()?);
    Ok(())
}

fn main() {
    let opt = Opt::from_args();

    let default_level = match &opt {
        Opt::Generate(g) if g.quiet => "grtop=warn",
        _ => "grtop=info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match opt {
        Opt::Generate(opt) => run_generate(opt),
        Opt::Clean(opt) => run_clean(opt),
        Opt::Check(opt) => run_check(opt),
        Opt::PLY(opt) => run_ply(opt),
        Opt::Profile(opt) => run_profile(opt),
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
