use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDateTime;

/// Source of local wall-clock time for naming recordings.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Local wall-clock time now.
pub fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// `YYYY-MM-DD_HHMMSS` for the given local time.
pub fn timestamp_name(now: &NaiveDateTime) -> String {
    now.format("%Y-%m-%d_%H%M%S").to_string()
}

/// How recording files are named.
///
/// With a base name the file is `base + suffix`; otherwise it is
/// `YYYY-MM-DD_HHMMSS + suffix + ".rec"`. Names only resolve to one second,
/// so two starts within the same second reuse (and truncate) the same file.
#[derive(Debug, Clone)]
pub struct FileNaming {
    pub base: Option<String>,
    pub suffix: String,
    /// Directory recordings are created in.
    pub directory: PathBuf,
}

impl FileNaming {
    pub fn new(base: Option<String>, suffix: impl Into<String>) -> Self {
        Self {
            base: base.filter(|b| !b.is_empty()),
            suffix: suffix.into(),
            directory: PathBuf::from("."),
        }
    }

    pub fn in_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    /// File name (without directory) for a recording started at `now`.
    pub fn file_name(&self, now: &NaiveDateTime) -> String {
        match &self.base {
            Some(base) => format!("{base}{}", self.suffix),
            None => format!("{}{}.rec", timestamp_name(now), self.suffix),
        }
    }

    /// Full path for a recording started at `now`.
    pub fn path(&self, now: &NaiveDateTime) -> PathBuf {
        self.directory.join(self.file_name(now))
    }
}

impl Default for FileNaming {
    fn default() -> Self {
        Self::new(None, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn timestamp_name_is_zero_padded() {
        assert_eq!(timestamp_name(&at(10, 5, 3)), "2024-03-01_100503");
        assert_eq!(timestamp_name(&at(0, 0, 0)), "2024-03-01_000000");
    }

    #[test]
    fn default_naming_uses_timestamp_and_rec_extension() {
        let naming = FileNaming::default();
        assert_eq!(naming.file_name(&at(10, 5, 3)), "2024-03-01_100503.rec");
    }

    #[test]
    fn suffix_goes_before_extension() {
        let naming = FileNaming::new(None, "-truck7");
        assert_eq!(naming.file_name(&at(10, 5, 3)), "2024-03-01_100503-truck7.rec");
    }

    #[test]
    fn base_name_ignores_clock() {
        let naming = FileNaming::new(Some("drive".to_string()), ".rec");
        assert_eq!(naming.file_name(&at(1, 2, 3)), "drive.rec");
        assert_eq!(naming.file_name(&at(4, 5, 6)), "drive.rec");
    }

    #[test]
    fn empty_base_counts_as_none() {
        let naming = FileNaming::new(Some(String::new()), "");
        assert_eq!(naming.file_name(&at(10, 5, 3)), "2024-03-01_100503.rec");
    }

    #[test]
    fn path_joins_directory() {
        let naming = FileNaming::default().in_directory("/data/rec");
        assert_eq!(
            naming.path(&at(10, 5, 3)),
            PathBuf::from("/data/rec/2024-03-01_100503.rec")
        );
    }
}
