use itertools::Itertools;
use nom::character::complete::{digit1, line_ending, multispace0, space0, space1};
use nom::combinator::{all_consuming, map_res};
use nom::error::VerboseError;
use nom::multi::count;
use nom::number::complete::double;
use nom::sequence::{preceded, terminated};
use nom::IResult;

use std::fs::File;
use std::io::prelude::*;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::geometry::*;

/// Position of an instance in the sweep.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceId {
    pub size_class: String,
    pub waypoints: usize,
    pub landing_zones: usize,
    /// Replicate number, starting at 1.
    pub replicate: usize,
}

impl InstanceId {
    /// File name `grtop<size class>_<w><l>_<replicate>.dat`. The two counts are written without a
    /// separator.
    pub fn file_name(&self) -> String {
        format!(
            "grtop{}_{}{}_{}.dat",
            self.size_class, self.waypoints, self.landing_zones, self.replicate
        )
    }

    /// Location of the instance file below `root`: `<root>/<size class>/<file name>`.
    pub fn path(&self, root: &Path) -> PathBuf {
        root.join(&self.size_class).join(self.file_name())
    }

    /// Recover the id from a file name. The counts are needed because the name does not say where
    /// the waypoint count ends and the landing zone count starts.
    pub fn from_file_name(
        path: &Path,
        waypoints: usize,
        landing_zones: usize,
    ) -> Option<InstanceId> {
        if path.extension()?.to_str()? != "dat" {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        let mut parts = stem.rsplitn(3, '_');
        let replicate = parts.next()?.parse().ok()?;
        if parts.next()? != format!("{}{}", waypoints, landing_zones) {
            return None;
        }
        let size_class = parts.next()?.strip_prefix("grtop")?;
        if size_class.is_empty() {
            return None;
        }
        Some(InstanceId {
            size_class: size_class.to_string(),
            waypoints,
            landing_zones,
            replicate,
        })
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}{}/{}",
            self.size_class, self.waypoints, self.landing_zones, self.replicate
        )
    }
}

/// A pair of discs that touch or overlap.
#[derive(Debug, Clone, PartialEq)]
pub enum Conflict {
    Waypoint {
        landing_zone: usize,
        waypoint: usize,
        separation: f64,
    },
    LandingZone {
        first: usize,
        second: usize,
        separation: f64,
    },
}

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Conflict::Waypoint {
                landing_zone,
                waypoint,
                separation,
            } => write!(
                f,
                "landing zone {} overlaps waypoint {} (separation {:.2})",
                landing_zone + 1,
                waypoint + 1,
                separation
            ),
            Conflict::LandingZone {
                first,
                second,
                separation,
            } => write!(
                f,
                "landing zone {} overlaps landing zone {} (separation {:.2})",
                first + 1,
                second + 1,
                separation
            ),
        }
    }
}

/// A generated scene: one launching point, the waypoints and the landing zones.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    /// Unknown for files whose name does not follow the naming scheme.
    pub id: Option<InstanceId>,
    pub launching: LaunchingPoint,
    pub waypoints: Vec<Waypoint>,
    pub landing_zones: Vec<LandingZone>,
}

fn record(values: Vec<f64>) -> String {
    values.iter().map(|x| format!("{:.2}", x)).join(" ")
}

type ParseResult<'a, O> = IResult<&'a str, O, VerboseError<&'a str>>;

/// `n` space separated reals making up one line.
fn values(input: &str, n: usize) -> ParseResult<'_, Vec<f64>> {
    let (input, first) = preceded(space0, double)(input)?;
    let (input, mut rest) = count(preceded(space1, double), n - 1)(input)?;
    let (input, _) = preceded(space0, line_ending)(input)?;
    rest.insert(0, first);
    Ok((input, rest))
}

fn count_line(input: &str) -> ParseResult<'_, usize> {
    terminated(
        preceded(space0, map_res(digit1, usize::from_str)),
        preceded(space0, line_ending),
    )(input)
}

fn parse_instance(
    input: &str,
) -> ParseResult<'_, (LaunchingPoint, Vec<Waypoint>, Vec<LandingZone>)> {
    let (input, _) = multispace0(input)?;
    let (input, l) = values(input, 3)?;
    let launching = LaunchingPoint {
        x: l[0],
        y: l[1],
        z: l[2],
    };
    let (input, num_waypoints) = count_line(input)?;
    let (input, waypoints) = count(|i| values(i, 6), num_waypoints)(input)?;
    let (input, num_landing_zones) = count_line(input)?;
    let (input, landing_zones) = count(|i| values(i, 4), num_landing_zones)(input)?;
    let (input, _) = multispace0(input)?;
    Ok((
        input,
        (
            launching,
            waypoints.into_iter().map(Waypoint::from_vec).collect(),
            landing_zones.into_iter().map(LandingZone::from_vec).collect(),
        ),
    ))
}

impl Instance {
    pub fn num_waypoints(&self) -> usize {
        self.waypoints.len()
    }

    pub fn num_landing_zones(&self) -> usize {
        self.landing_zones.len()
    }

    /// Write the instance in the GRTOP text format.
    ///
    /// ```txt
    /// <x> <y> <z>                                  launching point
    /// <w>
    /// <x_1> <y_1> <z_1> <r_1> <minZ_1> <maxZ_1>    waypoints
    /// ...
    /// <l>
    /// <x_1> <y_1> <z_1> <r_1>                      landing zones
    /// ...
    /// ```
    /// Every real is written with two decimals.
    pub fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "{}", record(self.launching.to_vec()))?;
        writeln!(out, "{}", self.waypoints.len())?;
        for waypoint in &self.waypoints {
            writeln!(out, "{}", record(waypoint.to_vec()))?;
        }
        writeln!(out, "{}", self.landing_zones.len())?;
        for landing_zone in &self.landing_zones {
            writeln!(out, "{}", record(landing_zone.to_vec()))?;
        }
        Ok(())
    }

    /// Write the instance to a freshly created file at `path`.
    pub fn write_text(&self, path: &Path) -> std::io::Result<()> {
        let mut file = BufWriter::new(File::create(path)?);
        self.write_to(&mut file)?;
        file.flush()
    }

    /// Parse an instance from the GRTOP text format. See [Instance::write_to].
    pub fn from_str_text(contents: &str) -> Result<Instance> {
        let mut contents = contents.to_string();
        if !contents.ends_with('\n') {
            contents.push('\n');
        }
        let result = all_consuming(parse_instance)(contents.as_str())
            .map(|(_, (launching, waypoints, landing_zones))| Instance {
                id: None,
                launching,
                waypoints,
                landing_zones,
            })
            .map_err(|x| match x {
                nom::Err::Error(e) | nom::Err::Failure(e) => {
                    Error::ParseError(nom::error::convert_error(contents.as_str(), e))
                }
                nom::Err::Incomplete(x) => Error::ParseError(format!("{:?}", x)),
            });
        result
    }

    /// Read an instance file. The id is taken from the file name if it follows the naming scheme.
    pub fn from_file(path: &Path) -> Result<Instance> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        let mut instance = Self::from_str_text(&contents)?;
        instance.id = InstanceId::from_file_name(
            path,
            instance.num_waypoints(),
            instance.num_landing_zones(),
        );
        Ok(instance)
    }

    /// All landing zones that touch or overlap a waypoint or another landing zone.
    pub fn conflicts(&self) -> Vec<Conflict> {
        let mut conflicts = Vec::new();
        for (i, landing_zone) in self.landing_zones.iter().enumerate() {
            for (j, waypoint) in self.waypoints.iter().enumerate() {
                let s = separation(landing_zone, waypoint);
                if s <= 0. {
                    conflicts.push(Conflict::Waypoint {
                        landing_zone: i,
                        waypoint: j,
                        separation: s,
                    });
                }
            }
            for (j, other) in self.landing_zones.iter().enumerate().skip(i + 1) {
                let s = separation(landing_zone, other);
                if s <= 0. {
                    conflicts.push(Conflict::LandingZone {
                        first: i,
                        second: j,
                        separation: s,
                    });
                }
            }
        }
        conflicts
    }
}

impl std::fmt::Display for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "GRTOP instance {}", id)?,
            None => write!(f, "GRTOP instance")?,
        }
        write!(
            f,
            " with {} waypoints and {} landing zones, launching from ({:.2}, {:.2}, {:.2})",
            self.num_waypoints(),
            self.num_landing_zones(),
            self.launching.x,
            self.launching.y,
            self.launching.z
        )
    }
}

#[cfg(test)]
fn small_instance() -> Instance {
    Instance {
        id: Some(InstanceId {
            size_class: "L".to_string(),
            waypoints: 2,
            landing_zones: 1,
            replicate: 4,
        }),
        launching: LaunchingPoint {
            x: 12.3456,
            y: 6789.5,
            z: 4500.,
        },
        waypoints: vec![
            Waypoint {
                x: 1.,
                y: 2.,
                z: 0.,
                radius: 10.5,
                min_z: 55.554,
                max_z: 250.,
            },
            Waypoint {
                x: 500.,
                y: 20.25,
                z: 0.,
                radius: 24.,
                min_z: 99.9,
                max_z: 201.,
            },
        ],
        landing_zones: vec![LandingZone {
            x: 300.,
            y: 300.,
            z: 0.,
            radius: 12.,
        }],
    }
}

#[test]
fn test_file_name() {
    let id = InstanceId {
        size_class: "L".to_string(),
        waypoints: 10,
        landing_zones: 3,
        replicate: 1,
    };
    assert_eq!(id.file_name(), "grtopL_103_1.dat");
    assert_eq!(
        id.path(Path::new("out")),
        Path::new("out").join("L").join("grtopL_103_1.dat")
    );
}

#[test]
fn test_id_from_file_name() {
    let path = Path::new("L/grtopL_103_2.dat");
    let id = InstanceId::from_file_name(path, 10, 3).unwrap();
    assert_eq!(id.size_class, "L");
    assert_eq!(id.replicate, 2);
    assert_eq!(id.file_name(), "grtopL_103_2.dat");
    assert!(InstanceId::from_file_name(path, 10, 4).is_none());
    assert!(InstanceId::from_file_name(Path::new("L/other.dat"), 10, 3).is_none());
    assert!(InstanceId::from_file_name(Path::new("L/grtopL_103_2.txt"), 10, 3).is_none());
}

#[test]
fn test_write_format() {
    let mut out = Vec::new();
    small_instance().write_to(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(
        text,
        "12.35 6789.50 4500.00\n\
         2\n\
         1.00 2.00 0.00 10.50 55.55 250.00\n\
         500.00 20.25 0.00 24.00 99.90 201.00\n\
         1\n\
         300.00 300.00 0.00 12.00\n"
    );
}

#[test]
fn test_parse_recovers_counts() {
    let mut out = Vec::new();
    small_instance().write_to(&mut out).unwrap();
    let parsed = Instance::from_str_text(std::str::from_utf8(&out).unwrap()).unwrap();
    assert_eq!(parsed.num_waypoints(), 2);
    assert_eq!(parsed.num_landing_zones(), 1);
    assert_eq!(parsed.waypoints[1].min_z, 99.9);
    assert_eq!(parsed.landing_zones[0].radius, 12.);
    assert_eq!(parsed.id, None);
}

#[test]
fn test_parse_without_trailing_newline() {
    let text = "1.00 2.00 3.00\n0\n1\n4.00 5.00 0.00 1.50";
    let parsed = Instance::from_str_text(text).unwrap();
    assert_eq!(parsed.num_waypoints(), 0);
    assert_eq!(parsed.landing_zones[0].radius, 1.5);
}

#[test]
fn test_parse_rejects_short_file() {
    let text = "1.00 2.00 3.00\n2\n1.00 2.00 0.00 10.50 55.55 250.00\n1\n";
    assert!(matches!(
        Instance::from_str_text(text),
        Err(Error::ParseError(_))
    ));
}

#[test]
fn test_parse_rejects_wrong_field_count() {
    let text = "1.00 2.00 3.00\n1\n1.00 2.00 0.00 10.50\n0\n";
    assert!(matches!(
        Instance::from_str_text(text),
        Err(Error::ParseError(_))
    ));
}

#[test]
fn test_parse_rejects_trailing_records() {
    let text = "1.00 2.00 3.00\n0\n0\n4.00 5.00 0.00 1.50\n";
    assert!(matches!(
        Instance::from_str_text(text),
        Err(Error::ParseError(_))
    ));
}

#[test]
fn test_conflicts() {
    let mut instance = small_instance();
    assert!(instance.conflicts().is_empty());
    instance.landing_zones.push(LandingZone {
        x: 5.,
        y: 2.,
        z: 0.,
        radius: 3.,
    });
    instance.landing_zones.push(LandingZone {
        x: 310.,
        y: 300.,
        z: 0.,
        radius: 1.,
    });
    let conflicts = instance.conflicts();
    assert_eq!(conflicts.len(), 2);
    assert!(matches!(
        conflicts[0],
        Conflict::LandingZone {
            first: 0,
            second: 2,
            ..
        }
    ));
    assert!(matches!(
        conflicts[1],
        Conflict::Waypoint {
            landing_zone: 1,
            waypoint: 0,
            ..
        }
    ));
}

#[test]
fn test_display() {
    let text = format!("{}", small_instance());
    assert!(text.starts_with("GRTOP instance L/21/4 with 2 waypoints and 1 landing zones"));
}
