//! Family naming contract, directory scanning and candidate generation.
//!
//! Every file in one rotation family matches
//! `<dir>/<name>-<YYYY-MM-DD>[.<N>].log[.gz]`. Lock markers append
//! [`LOCK_SUFFIX`] to the target name and symlink staging files append
//! [`SYMLINK_SUFFIX`]; neither ever holds log data and both stay out of all
//! size, age and count calculations.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::clock;

pub const FILE_SUFFIX: &str = ".log";
pub const COMPRESS_SUFFIX: &str = ".gz";
pub const LOCK_SUFFIX: &str = "_lock";
pub const SYMLINK_SUFFIX: &str = "_symlink";

/// One rotation family: every entry under `directory` whose name starts with
/// `<base_name>-`.
#[derive(Debug, Clone)]
pub struct FileFamily {
    directory: PathBuf,
    base_name: String,
}

/// Classification of a family directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyEntry {
    /// `<name>-<date>[.<idx>].log`; index 0 is the unsuffixed base file.
    Log { day: i64, index: u32 },
    /// `<name>-<date>[.<idx>].log.gz`
    Compressed { day: i64, index: u32 },
    LockMarker,
    SymlinkMarker,
}

impl FamilyEntry {
    pub fn is_marker(&self) -> bool {
        matches!(self, FamilyEntry::LockMarker | FamilyEntry::SymlinkMarker)
    }

    /// Embedded calendar day, for data files.
    pub fn day(&self) -> Option<i64> {
        match self {
            FamilyEntry::Log { day, .. } | FamilyEntry::Compressed { day, .. } => Some(*day),
            _ => None,
        }
    }

    /// Embedded (day, index) ordering key, for data files.
    pub fn sort_key(&self) -> Option<(i64, u32)> {
        match self {
            FamilyEntry::Log { day, index } | FamilyEntry::Compressed { day, index } => {
                Some((*day, *index))
            }
            _ => None,
        }
    }
}

impl FileFamily {
    pub fn new(directory: impl Into<PathBuf>, base_name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            base_name: base_name.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Canonical path for a bucket label; index 0 is the unsuffixed form.
    pub fn path_for(&self, label: &str, index: u32) -> PathBuf {
        let file = if index == 0 {
            format!("{}-{}{}", self.base_name, label, FILE_SUFFIX)
        } else {
            format!("{}-{}.{}{}", self.base_name, label, index, FILE_SUFFIX)
        };
        self.directory.join(file)
    }

    /// Classify a directory entry name. `None` for anything outside the
    /// family, including names whose date part does not parse.
    pub fn classify(&self, file_name: &str) -> Option<FamilyEntry> {
        let rest = file_name
            .strip_prefix(self.base_name.as_str())?
            .strip_prefix('-')?;
        if rest.ends_with(LOCK_SUFFIX) {
            return Some(FamilyEntry::LockMarker);
        }
        if rest.ends_with(SYMLINK_SUFFIX) {
            return Some(FamilyEntry::SymlinkMarker);
        }
        let (stem, compressed) = match rest.strip_suffix(COMPRESS_SUFFIX) {
            Some(stem) => (stem, true),
            None => (rest, false),
        };
        let stem = stem.strip_suffix(FILE_SUFFIX)?;
        let (date_part, index) = match stem.split_once('.') {
            Some((date, index)) => (date, index.parse::<u32>().ok()?),
            None => (stem, 0),
        };
        let day = clock::parse_date(date_part)?;
        Some(if compressed {
            FamilyEntry::Compressed { day, index }
        } else {
            FamilyEntry::Log { day, index }
        })
    }

    /// Classify a full path against this family.
    pub fn entry_of(&self, path: &Path) -> Option<FamilyEntry> {
        self.classify(path.file_name()?.to_str()?)
    }

    /// Scan the family directory. A missing directory yields an empty list;
    /// symlinks (the live "current" link) are never family data.
    pub fn scan(&self) -> io::Result<Vec<(PathBuf, FamilyEntry)>> {
        let mut entries = Vec::new();
        let dir = match fs::read_dir(&self.directory) {
            Ok(dir) => dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(entries),
            Err(err) => return Err(err),
        };
        for entry in dir {
            let entry = entry?;
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_symlink() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(kind) = self.classify(name) {
                entries.push((entry.path(), kind));
            }
        }
        Ok(entries)
    }
}

/// Produces collision-free candidate paths for one sink instance.
///
/// Index bookkeeping is owned state, never process-global: two sinks rotate
/// independently, and within one sink an index is never handed out twice for
/// the same bucket.
#[derive(Debug)]
pub struct NameGenerator {
    family: FileFamily,
    bucket: String,
    next_index: u32,
}

impl NameGenerator {
    pub fn new(family: FileFamily) -> Self {
        Self {
            family,
            bucket: String::new(),
            next_index: 1,
        }
    }

    /// Next candidate path for `label`.
    ///
    /// An existing candidate is eligible for reuse (appended to) when
    /// `reuse_below` is non-zero and its size is still under that threshold,
    /// or when `reuse_below` is zero (no size limit configured). `fresh`
    /// callers get a path no existing file occupies, so a forced rotation
    /// never clobbers the natural-schedule file. Candidate indices ascend
    /// strictly from whatever this generator last handed out for the bucket.
    pub fn next_candidate(&mut self, label: &str, reuse_below: u64, fresh: bool) -> PathBuf {
        if self.bucket != label {
            self.bucket = label.to_string();
            self.next_index = 1;
        }

        let base = self.family.path_for(label, 0);
        match fs::metadata(&base) {
            Err(_) => return base,
            Ok(meta) if !fresh && (reuse_below == 0 || meta.len() < reuse_below) => return base,
            Ok(_) => {}
        }

        let mut index = self.next_index;
        loop {
            let candidate = self.family.path_for(label, index);
            let reusable = match fs::metadata(&candidate) {
                Err(_) => true,
                Ok(meta) => !fresh && reuse_below > 0 && meta.len() < reuse_below,
            };
            if reusable {
                self.next_index = index + 1;
                return candidate;
            }
            index += 1;
        }
    }
}
