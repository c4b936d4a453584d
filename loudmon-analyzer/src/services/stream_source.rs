//! Channel list loading
//!
//! Reads the headend channel CSV and yields one [`StreamDescriptor`] per
//! usable multicast URL. Each row can carry a low and a high profile URL;
//! low comes first. Only `udp://` URLs are admitted.

use crate::models::{Profile, ProfileSelection, StreamDescriptor};
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const CHANNEL_NAME_COLUMN: &str = "Channel Name";
pub const NODE_COLUMN: &str = "NODE";
pub const LOW_PROFILE_COLUMN: &str = "Lowest Profile MCAST";
pub const HIGH_PROFILE_COLUMN: &str = "Highest Profile MCAST";

/// URL scheme a stream must use to be measured
pub const ADMITTED_SCHEME: &str = "udp://";

/// Channel list errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Channel list not found: {0}")]
    NotFound(PathBuf),

    #[error("Channel list unreadable: {0}")]
    Csv(#[from] csv::Error),

    #[error("Channel list has no '{0}' column")]
    MissingColumn(&'static str),

    #[error("No usable stream URLs for profile selection {0:?}")]
    Empty(ProfileSelection),
}

/// Column positions resolved from the header row
#[derive(Debug)]
struct Columns {
    name: Option<usize>,
    node: Option<usize>,
    low: Option<usize>,
    high: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let find = |wanted: &str| headers.iter().position(|h| h.trim() == wanted);
        Self {
            name: find(CHANNEL_NAME_COLUMN),
            node: find(NODE_COLUMN),
            low: find(LOW_PROFILE_COLUMN),
            high: find(HIGH_PROFILE_COLUMN),
        }
    }

    fn require(&self, selection: ProfileSelection) -> Result<(), SourceError> {
        if selection.includes(Profile::Low) && self.low.is_none() {
            return Err(SourceError::MissingColumn(LOW_PROFILE_COLUMN));
        }
        if selection.includes(Profile::High) && self.high.is_none() {
            return Err(SourceError::MissingColumn(HIGH_PROFILE_COLUMN));
        }
        Ok(())
    }
}

/// Load descriptors from a CSV file; an empty result is an error
pub fn load_descriptors(
    path: &Path,
    selection: ProfileSelection,
) -> Result<Vec<StreamDescriptor>, SourceError> {
    if !path.exists() {
        return Err(SourceError::NotFound(path.to_path_buf()));
    }

    let file = std::fs::File::open(path).map_err(|e| SourceError::Csv(e.into()))?;
    let descriptors = read_descriptors(file, selection)?;

    if descriptors.is_empty() {
        return Err(SourceError::Empty(selection));
    }

    info!(
        path = %path.display(),
        streams = descriptors.len(),
        selection = ?selection,
        "Loaded channel list"
    );
    Ok(descriptors)
}

/// Parse descriptors from any CSV reader
pub fn read_descriptors<R: Read>(
    reader: R,
    selection: ProfileSelection,
) -> Result<Vec<StreamDescriptor>, SourceError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns = Columns::from_headers(csv_reader.headers()?);
    columns.require(selection)?;

    let mut descriptors = Vec::new();
    for (row_idx, row) in csv_reader.records().enumerate() {
        let row = row?;
        let cell = |idx: Option<usize>| idx.and_then(|i| row.get(i)).unwrap_or("").trim();

        let name = cell(columns.name);
        let node = cell(columns.node);

        for (profile, idx) in [(Profile::Low, columns.low), (Profile::High, columns.high)] {
            if !selection.includes(profile) {
                continue;
            }
            let url = cell(idx);
            if !url.starts_with(ADMITTED_SCHEME) {
                debug!(
                    row = row_idx + 2,
                    channel = name,
                    profile = %profile,
                    "Skipping row without usable URL"
                );
                continue;
            }
            descriptors.push(StreamDescriptor::new(name, node, profile, url));
        }
    }

    Ok(descriptors)
}
