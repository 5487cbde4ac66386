use chrono::{Local, NaiveDate, TimeDelta};
use tracing::{info, warn};

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use crate::{Error, Result};

/// The date format used everywhere: on the command line and in the logs.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses a `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns [`Error::InvalidDate`] if `input` is not a valid date in that format.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT).map_err(|_| Error::InvalidDate {
        input: input.to_string(),
        expected: "YYYY-MM-DD",
    })
}

/// The shop's notion of "today": the real date shifted by a number of days.
///
/// The real date is captured once, when the clock is created, so everything
/// done with one `Clock` sees the same day even if the command runs across
/// midnight.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Clock {
    real_today: NaiveDate,
    offset_days: i64,
}

impl Clock {
    /// Creates a clock shifted `offset_days` from the local date.
    #[must_use]
    pub fn new(offset_days: i64) -> Self {
        Self::at(Local::now().date_naive(), offset_days)
    }

    /// Creates a clock shifted `offset_days` from `real_today`.
    #[must_use]
    pub fn at(real_today: NaiveDate, offset_days: i64) -> Self {
        Self {
            real_today,
            offset_days,
        }
    }

    /// Returns the virtual today.
    ///
    /// Offsets beyond the representable calendar clamp to its ends.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        TimeDelta::try_days(self.offset_days)
            .and_then(|delta| self.real_today.checked_add_signed(delta))
            .unwrap_or(if self.offset_days < 0 {
                NaiveDate::MIN
            } else {
                NaiveDate::MAX
            })
    }

    #[must_use]
    pub fn offset_days(&self) -> i64 {
        self.offset_days
    }

    /// Reports whether the virtual today differs from the real date.
    #[must_use]
    pub fn is_shifted(&self) -> bool {
        self.today() != self.real_today
    }

    /// Moves the clock `delta_days` forward; negative values move it back.
    pub fn advance(&mut self, delta_days: i64) {
        self.offset_days = self.offset_days.saturating_add(delta_days);
    }

    /// Puts the clock back to the real date.
    pub fn reset(&mut self) {
        self.offset_days = 0;
    }
}

/// Persists a [`Clock`]'s offset between runs, as a plain integer in a text file.
#[derive(Clone, Debug)]
pub struct ClockFile {
    path: PathBuf,
}

impl ClockFile {
    pub const FILE_NAME: &'static str = "time_shift.txt";

    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the clock file kept in the data directory `dir`.
    #[must_use]
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(Self::FILE_NAME))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the persisted offset.
    ///
    /// A missing file means no offset. So does a file that doesn't hold an
    /// integer, though that is logged as a warning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file exists but cannot be read.
    pub fn load_offset(&self) -> Result<i64> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(Error::io(&self.path, e)),
        };
        match content.trim().parse() {
            Ok(offset) => Ok(offset),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable time shift");
                Ok(0)
            }
        }
    }

    /// Loads a clock for the current local date with the persisted offset.
    ///
    /// # Errors
    ///
    /// As for [`ClockFile::load_offset`].
    pub fn load(&self) -> Result<Clock> {
        Ok(Clock::new(self.load_offset()?))
    }

    /// Persists `clock`'s offset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file or its directory cannot be written.
    pub fn save(&self, clock: &Clock) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }
        fs::write(&self.path, clock.offset_days().to_string())
            .map_err(|e| Error::io(&self.path, e))?;
        info!(offset_days = clock.offset_days(), today = %clock.today(), "saved time shift");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn advance_fn_moves_today_by_whole_days() {
        let mut clock = Clock::at(date("2024-01-30"), 0);
        clock.advance(5);
        assert_eq!(clock.today(), date("2024-02-04"));
        assert!(clock.is_shifted());
    }

    #[test]
    fn advance_and_reset_fns_round_trip_to_real_date() {
        let real = date("2024-01-01");
        let mut clock = Clock::at(real, 0);
        clock.advance(5);
        clock.advance(-5);
        assert_eq!(clock.today(), real);
        clock.advance(-40);
        assert_eq!(clock.today(), date("2023-11-22"));
        clock.reset();
        assert_eq!(clock.today(), real);
        assert!(!clock.is_shifted());
    }

    #[test]
    fn today_fn_clamps_huge_offsets() {
        assert_eq!(Clock::at(date("2024-01-01"), i64::MAX).today(), NaiveDate::MAX);
        assert_eq!(Clock::at(date("2024-01-01"), i64::MIN).today(), NaiveDate::MIN);
    }

    #[test]
    fn load_offset_fn_defaults_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let file = ClockFile::in_dir(dir.path());
        assert_eq!(file.load_offset().unwrap(), 0);
        fs::write(file.path(), "soon").unwrap();
        assert_eq!(file.load_offset().unwrap(), 0);
    }

    #[test]
    fn save_fn_persists_offset_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let file = ClockFile::in_dir(dir.path());
        let mut clock = file.load().unwrap();
        clock.advance(-3);
        file.save(&clock).unwrap();
        assert_eq!(fs::read_to_string(file.path()).unwrap(), "-3");

        let mut reloaded = file.load().unwrap();
        assert_eq!(reloaded.offset_days(), -3);
        reloaded.advance(10);
        file.save(&reloaded).unwrap();
        assert_eq!(file.load_offset().unwrap(), 7);
    }

    #[test]
    fn parse_date_fn_rejects_other_formats() {
        assert_eq!(parse_date("2024-01-10").unwrap(), date("2024-01-10"));
        for input in ["10-01-2024", "2024-13-01", "2024-01", "yesterday"] {
            assert!(
                matches!(parse_date(input), Err(Error::InvalidDate { .. })),
                "accepted {input:?}"
            );
        }
    }
}
