use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("could not read profile: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("could not write profile: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("parse error: {0}")]
    ParseError(String),

    /// The rejection sampler gave up on a landing zone.
    #[error(
        "could not place landing zone {} after {attempts} attempts \
         ({waypoints} waypoints and {landing_zones} landing zones in scope, density {density:.4})",
        .placed + 1
    )]
    PlacementTimeout {
        attempts: usize,
        /// Landing zones already accepted for the current instance.
        placed: usize,
        waypoints: usize,
        landing_zones: usize,
        /// Occupied disc area over the area of the landing zone sampling rectangle.
        density: f64,
    },

    #[error("output directory {} does not exist", .0.display())]
    MissingDirectory(PathBuf),

    #[error("{} holds {count} stale instance files, refusing to delete them without confirmation", .dir.display())]
    Unconfirmed { dir: PathBuf, count: usize },

    #[error("{} has {count} overlapping pairs", .file.display())]
    Overlap { file: PathBuf, count: usize },

    #[error("{failed} instances could not be generated")]
    Incomplete { failed: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
