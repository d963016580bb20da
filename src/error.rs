use std::path::PathBuf;

/// Error type for tzgrid operations.
#[derive(Debug, PartialEq)]
pub enum TzGridError {
    /// The queried longitude is outside [-180, 180] degrees.
    LongitudeOutOfBounds(f64),
    /// The queried latitude is outside [-90, 90] degrees.
    LatitudeOutOfBounds(f64),
    /// The requested timezone name or id is not part of the loaded dataset.
    UnknownZone(String),
    /// The dataset violates one of its structural invariants.
    ///
    /// Not recoverable: the engine cannot produce trustworthy answers from a
    /// dataset in this state.
    CorruptData(String),
    /// A dataset file could not be opened, read, or parsed at construction.
    Load { path: PathBuf, reason: String },
}

impl std::fmt::Display for TzGridError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TzGridError::LongitudeOutOfBounds(lon) => {
                write!(f, "longitude {} is out of bounds (-180.0 to 180.0)", lon)
            }
            TzGridError::LatitudeOutOfBounds(lat) => {
                write!(f, "latitude {} is out of bounds (-90.0 to 90.0)", lat)
            }
            TzGridError::UnknownZone(zone) => write!(f, "unknown timezone: {}", zone),
            TzGridError::CorruptData(msg) => write!(f, "corrupt timezone dataset: {}", msg),
            TzGridError::Load { path, reason } => {
                write!(f, "failed to load {}: {}", path.display(), reason)
            }
        }
    }
}

impl std::error::Error for TzGridError {}
