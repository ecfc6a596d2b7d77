use log::{debug, info};
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::types::{AddOutcome, AddStatus};

pub const DEFAULT_DB_FILE: &str = "database.txt";

/// Append-only list of known plates, one per line in a plain text file.
///
/// Nothing is cached: every call goes back to the file, so hand edits are
/// picked up immediately. There is no locking here; callers that may add
/// concurrently have to serialize `add` themselves.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl Default for RecordStore {
    fn default() -> Self {
        RecordStore::new(DEFAULT_DB_FILE)
    }
}

impl RecordStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        RecordStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the file empty if it is missing. Existing content is left alone.
    pub fn initialize(&self) -> io::Result<()> {
        if !self.path.exists() {
            info!("Creating plate database at {:?}", self.path);
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        Ok(())
    }

    /// Every line of the file in order. A missing file is an empty store.
    pub fn load(&self) -> io::Result<Vec<String>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e),
        };
        Ok(content.lines().map(str::to_string).collect())
    }

    /// Appends `plate` unless an identical line is already present.
    pub fn add(&self, plate: &str) -> io::Result<AddOutcome> {
        if self.load()?.iter().any(|p| p == plate) {
            debug!("Plate {} already stored", plate);
            return Ok(AddOutcome {
                status: AddStatus::AlreadyExists,
                message: format!("Plate {} already exists in the database.", plate),
            });
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        // A hand-edited file may lack the final newline.
        let mut line = String::new();
        if !ends_with_newline(&mut file)? {
            line.push('\n');
        }
        line.push_str(plate);
        line.push('\n');
        file.write_all(line.as_bytes())?;

        info!("Stored plate {}", plate);
        Ok(AddOutcome {
            status: AddStatus::Added,
            message: format!("Plate {} added to the database.", plate),
        })
    }
}

fn ends_with_newline(file: &mut fs::File) -> io::Result<bool> {
    let len = file.seek(SeekFrom::End(0))?;
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
