use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use log::debug;

use crate::error::PipelineError;
use crate::input_loader::ResultRecord;

/// True when `reader` holds nothing but whitespace. Such an output has no
/// header yet and counts as fresh for both resuming and writing.
pub fn is_blank<R: Read>(reader: R) -> std::io::Result<bool> {
    for byte in BufReader::new(reader).bytes() {
        if !byte?.is_ascii_whitespace() {
            return Ok(false);
        }
    }
    Ok(true)
}

/// How the next batch has to be joined onto what is already on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Existing {
    /// Absent or whitespace only: rewrite from scratch with a header.
    Blank,
    EndsWithNewline,
    /// Last line lacks its terminator; a newline goes in before the rows.
    Unterminated,
}

fn inspect(path: &Path) -> std::io::Result<Existing> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Existing::Blank),
        Err(e) => return Err(e),
    };
    if is_blank(&mut file)? {
        return Ok(Existing::Blank);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(if last[0] == b'\n' {
        Existing::EndsWithNewline
    } else {
        Existing::Unterminated
    })
}

/// Appends finished batches to the output CSV. Holds no state between calls.
#[derive(Debug, Clone)]
pub struct CheckpointWriter {
    path: PathBuf,
}

impl CheckpointWriter {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        CheckpointWriter { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `batch` in a single write. A blank or absent output is
    /// replaced by header plus rows.
    pub fn flush(&self, batch: &[ResultRecord]) -> Result<(), PipelineError> {
        if batch.is_empty() {
            return Ok(());
        }

        let existing = inspect(&self.path)?;

        // Rows are fully serialized before the file is touched.
        let mut bytes = Vec::new();
        if existing == Existing::Unterminated {
            bytes.push(b'\n');
        }
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(existing == Existing::Blank)
            .from_writer(bytes);
        for record in batch {
            wtr.serialize(record)?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| PipelineError::Io(e.into_error()))?;

        let mut options = OpenOptions::new();
        if existing == Existing::Blank {
            options.write(true).create(true).truncate(true);
        } else {
            options.append(true);
        }
        let mut file = options.open(&self.path)?;
        file.write_all(&bytes)?;
        file.sync_data()?;

        debug!("Appended {} rows ({} bytes) to {:?}", batch.len(), bytes.len(), self.path);
        Ok(())
    }
}
