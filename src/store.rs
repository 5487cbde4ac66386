use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use std::{
    fmt::Display,
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use crate::{Error, Result};

/// Name of the lock file created in the data directory while writing.
pub const LOCK_FILE: &str = ".stockroom.lock";

/// The CSV files kept in a data directory.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Log {
    Purchases,
    Sales,
    Inventory,
}

impl Log {
    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Log::Purchases => "bought.csv",
            Log::Sales => "sold.csv",
            Log::Inventory => "inventory.csv",
        }
    }
}

impl Display for Log {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Log::Purchases => "purchases",
            Log::Sales => "sales",
            Log::Inventory => "inventory",
        })
    }
}

/// A row type stored in one of the logs.
///
/// `COLUMNS` is the header row, in the order serde writes the fields.
pub trait Entry: Serialize + DeserializeOwned {
    const LOG: Log;
    const COLUMNS: &'static [&'static str];
}

/// A row type carrying a store-assigned identifier.
pub trait Logged: Entry {
    fn id(&self) -> u64;
}

/// A record that has not been written yet, and so has no id.
pub trait Draft {
    type Record: Logged;

    fn with_id(self, id: u64) -> Self::Record;
}

/// Flat-file storage for the purchase and sale logs and the inventory cache.
///
/// Reads go straight to the files. Writes need a [`StoreLock`], obtained with
/// [`Store::lock`], so two processes sharing a data directory can never
/// interleave id assignment or overwrite each other's files.
#[derive(Clone, Debug)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    /// Creates a store keeping its files in `dir`.
    ///
    /// Nothing is touched on disk until the first write, which creates `dir`
    /// if necessary.
    #[must_use]
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn path(&self, log: Log) -> PathBuf {
        self.dir.join(log.file_name())
    }

    /// Reads every record of `E`'s log, in file order.
    ///
    /// A log that does not exist yet reads as empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] if any row is missing a column or holds a
    /// value that cannot be parsed, and [`Error::Io`] if the file cannot be
    /// read.
    pub fn read_all<E: Entry>(&self) -> Result<Vec<E>> {
        Ok(self.load::<E>()?.map(|(_, rows)| rows).unwrap_or_default())
    }

    /// Takes the exclusive write lock on the data directory.
    ///
    /// The lock never waits: if another process holds it, this fails at once.
    /// A lock file left behind by a process that is no longer running is
    /// removed and the lock taken over.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Locked`] if the lock file already exists, or
    /// [`Error::Io`] if the directory or lock file cannot be created.
    pub fn lock(&self) -> Result<StoreLock<'_>> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        let path = self.dir.join(LOCK_FILE);
        if let Some(lock) = self.try_lock(&path)? {
            return Ok(lock);
        }
        if !holder_is_gone(&path) {
            return Err(Error::Locked(path));
        }
        warn!(path = %path.display(), "removing stale store lock");
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io(path, e)),
        }
        self.try_lock(&path)?.ok_or(Error::Locked(path))
    }

    fn try_lock(&self, path: &Path) -> Result<Option<StoreLock<'_>>> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                let lock = StoreLock {
                    store: self,
                    path: path.to_path_buf(),
                };
                writeln!(file, "{}", std::process::id()).map_err(|e| Error::io(path, e))?;
                debug!(path = %path.display(), "acquired store lock");
                Ok(Some(lock))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    /// Returns the header row and the records of `E`'s log, or `None` if the
    /// log file does not exist.
    fn load<E: Entry>(&self) -> Result<Option<(csv::StringRecord, Vec<E>)>> {
        let path = self.path(E::LOG);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(path, e)),
        };
        let mut rdr = csv::Reader::from_reader(file);
        let headers = rdr.headers().map_err(|e| Error::from_csv(&path, e))?.clone();
        let rows = rdr
            .deserialize()
            .collect::<std::result::Result<Vec<E>, _>>()
            .map_err(|e| Error::from_csv(&path, e))?;
        debug!(log = %E::LOG, rows = rows.len(), "read log");
        Ok(Some((headers, rows)))
    }
}

/// Reports whether the lock file at `path` names a process that has exited.
///
/// An unreadable or empty lock file may belong to a process that has only
/// just created it, so it counts as held.
fn holder_is_gone(path: &Path) -> bool {
    let Ok(content) = fs::read_to_string(path) else {
        return false;
    };
    let Ok(pid) = content.trim().parse::<u32>() else {
        return false;
    };
    pid != std::process::id() && !process_is_running(pid)
}

/// Looks the process up in `/proc`. Without a mounted `/proc` nothing can be
/// said, and the process is assumed to be running.
#[cfg(target_os = "linux")]
fn process_is_running(pid: u32) -> bool {
    let proc = Path::new("/proc");
    !proc.join("self").exists() || proc.join(pid.to_string()).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_is_running(_pid: u32) -> bool {
    true
}

/// Proof of holding the data directory's write lock.
///
/// The lock file is removed when this is dropped.
#[derive(Debug)]
pub struct StoreLock<'a> {
    store: &'a Store,
    path: PathBuf,
}

impl StoreLock<'_> {
    #[must_use]
    pub fn store(&self) -> &Store {
        self.store
    }

    /// Assigns the next id to `draft` and appends it to its log.
    ///
    /// The id is one more than the largest id in the log, or 1 for an empty
    /// log. The whole log is parsed first, so a malformed file is reported
    /// rather than risking a duplicate id. The row is written with a single
    /// append and synced before returning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] if the existing log is malformed or has
    /// unexpected columns, and [`Error::Io`] if it cannot be read or written.
    pub fn append<D: Draft>(&self, draft: D) -> Result<D::Record> {
        let log = <D::Record as Entry>::LOG;
        let columns = <D::Record as Entry>::COLUMNS;
        let path = self.store.path(log);
        let (headers, existing) = self
            .store
            .load::<D::Record>()?
            .unwrap_or_else(|| (csv::StringRecord::new(), Vec::new()));
        let needs_header = headers.is_empty();
        if !needs_header && !headers.iter().eq(columns.iter().copied()) {
            return Err(Error::format(
                &path,
                format!("unexpected columns {headers:?}, expected {columns:?}"),
            ));
        }
        let id = existing.iter().map(Logged::id).max().unwrap_or(0) + 1;
        let record = draft.with_id(id);

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        if needs_header {
            wtr.write_record(columns)
                .map_err(|e| Error::from_csv(&path, e))?;
        }
        wtr.serialize(&record)
            .map_err(|e| Error::from_csv(&path, e))?;
        let row = wtr
            .into_inner()
            .map_err(|e| Error::io(&path, e.into_error()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::io(&path, e))?;
        file.write_all(&row).map_err(|e| Error::io(&path, e))?;
        file.sync_all().map_err(|e| Error::io(&path, e))?;
        info!(%log, id, "appended record");
        Ok(record)
    }

    /// Overwrites `E`'s log with `entries`, in order.
    ///
    /// The new content goes to a temporary file in the data directory which is
    /// then renamed over the log, so readers see either the old file or the
    /// new one, never a partial write.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be written or renamed.
    pub fn replace_all<E: Entry>(&self, entries: &[E]) -> Result<()> {
        let path = self.store.path(E::LOG);
        let dir = &self.store.dir;
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
        {
            let mut wtr = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(tmp.as_file_mut());
            wtr.write_record(E::COLUMNS)
                .map_err(|e| Error::from_csv(&path, e))?;
            for entry in entries {
                wtr.serialize(entry).map_err(|e| Error::from_csv(&path, e))?;
            }
            wtr.flush().map_err(|e| Error::io(&path, e))?;
        }
        tmp.as_file().sync_all().map_err(|e| Error::io(&path, e))?;
        tmp.persist(&path).map_err(|e| Error::io(&path, e.error))?;
        info!(log = %E::LOG, rows = entries.len(), "replaced log");
        Ok(())
    }
}

impl Drop for StoreLock<'_> {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "could not remove store lock");
        }
    }
}
