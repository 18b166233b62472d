use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use log::{info, warn};

use crate::checkpoint_writer::is_blank;
use crate::error::PipelineError;
use crate::input_loader::{InputRecord, PROPERTY_ID_COL};

/// Property ids already present in the output when the run started.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ResumeState {
    completed: HashSet<String>,
}

impl ResumeState {
    /// An absent, blank (see `is_blank`) or header-only output means a fresh run.
    /// Anything present that cannot be read as a result table is an error.
    pub fn load<P: AsRef<Path>>(output: P) -> Result<Self, PipelineError> {
        let path = output.as_ref();

        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No output file found at {:?}. Starting fresh.", path);
                return Ok(ResumeState::default());
            }
            Err(e) => return Err(e.into()),
        };

        let mut content = Vec::new();
        file.read_to_end(&mut content)?;
        if is_blank(content.as_slice())? {
            info!("Output file {:?} exists but is empty. Starting fresh.", path);
            return Ok(ResumeState::default());
        }

        let malformed = |reason: String| PipelineError::MalformedOutput {
            path: path.to_path_buf(),
            reason,
        };

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_slice());

        let headers = rdr.headers().map_err(|e| malformed(e.to_string()))?.clone();
        let id_idx = headers
            .iter()
            .position(|h| h == PROPERTY_ID_COL)
            .ok_or_else(|| malformed(format!("no `{}` column in header {:?}", PROPERTY_ID_COL, headers)))?;

        let mut completed = HashSet::new();
        for result in rdr.records() {
            let record = result.map_err(|e| malformed(e.to_string()))?;
            let id = record
                .get(id_idx)
                .ok_or_else(|| malformed(format!("row without `{}`", PROPERTY_ID_COL)))?;
            completed.insert(id.to_string());
        }

        if completed.is_empty() {
            info!("Output file {:?} exists but is empty. Starting fresh.", path);
        } else {
            info!(
                "Found existing output file {:?}. Loaded {} already processed IDs.",
                path,
                completed.len()
            );
        }
        Ok(ResumeState { completed })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.completed.contains(id)
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    /// Input rows still to process, in input order. Repeated ids keep their first row only.
    pub fn remaining(&self, records: &[InputRecord]) -> Vec<InputRecord> {
        let mut seen = HashSet::new();
        let mut duplicates = 0usize;
        let remaining: Vec<InputRecord> = records
            .iter()
            .filter(|r| {
                if !seen.insert(r.property_id.as_str()) {
                    duplicates += 1;
                    return false;
                }
                !self.contains(&r.property_id)
            })
            .cloned()
            .collect();

        if duplicates > 0 {
            warn!("Skipped {} input rows with a repeated property_id.", duplicates);
        }
        remaining
    }
}

impl FromIterator<String> for ResumeState {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        ResumeState {
            completed: iter.into_iter().collect(),
        }
    }
}
