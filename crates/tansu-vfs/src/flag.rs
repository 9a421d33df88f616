//! Open-mode flags and the decisions they imply.
//!
//! A [`FileFlag`] is one of the fixed mode tokens (`r`, `r+`, `w`, `wx+`,
//! ...). Besides read/write permission it decides what `open` does when the
//! target exists ([`PathExistsAction`]) and when it does not
//! ([`PathNotExistsAction`]). Both tables are total over the mode set.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::EnumString;

use crate::error::{FsError, FsResult};

/// What `open` does when the path already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathExistsAction {
    /// Fail with `EEXIST`.
    Refuse,
    /// Open and truncate to zero length.
    Truncate,
    /// Open with the existing content.
    Reuse,
}

/// What `open` does when the path does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathNotExistsAction {
    /// Fail with `ENOENT`.
    Refuse,
    /// Create a new, empty file.
    Create,
}

/// Parsed open mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
pub enum FileFlag {
    /// `r`: read; fail if missing.
    #[serde(rename = "r")]
    #[strum(serialize = "r")]
    Read,
    /// `rs`: read in synchronous mode.
    #[serde(rename = "rs")]
    #[strum(serialize = "rs")]
    ReadSync,
    /// `r+`: read and write; fail if missing.
    #[serde(rename = "r+")]
    #[strum(serialize = "r+")]
    ReadWrite,
    /// `rs+`: read and write in synchronous mode.
    #[serde(rename = "rs+")]
    #[strum(serialize = "rs+")]
    ReadWriteSync,
    /// `w`: write; truncate or create.
    #[serde(rename = "w")]
    #[strum(serialize = "w")]
    Write,
    /// `wx`: write; fail if present.
    #[serde(rename = "wx", alias = "xw")]
    #[strum(serialize = "wx", serialize = "xw")]
    WriteExclusive,
    /// `w+`: read and write; truncate or create.
    #[serde(rename = "w+")]
    #[strum(serialize = "w+")]
    WriteRead,
    /// `wx+`: read and write; fail if present.
    #[serde(rename = "wx+", alias = "xw+")]
    #[strum(serialize = "wx+", serialize = "xw+")]
    WriteReadExclusive,
    /// `a`: append; create if missing.
    #[serde(rename = "a")]
    #[strum(serialize = "a")]
    Append,
    /// `ax`: append; fail if present.
    #[serde(rename = "ax", alias = "xa")]
    #[strum(serialize = "ax", serialize = "xa")]
    AppendExclusive,
    /// `a+`: read and append; create if missing.
    #[serde(rename = "a+")]
    #[strum(serialize = "a+")]
    AppendRead,
    /// `ax+`: read and append; fail if present.
    #[serde(rename = "ax+", alias = "xa+")]
    #[strum(serialize = "ax+", serialize = "xa+")]
    AppendReadExclusive,
}

impl FileFlag {
    /// Every mode, in declaration order.
    pub const ALL: [FileFlag; 12] = [
        FileFlag::Read,
        FileFlag::ReadSync,
        FileFlag::ReadWrite,
        FileFlag::ReadWriteSync,
        FileFlag::Write,
        FileFlag::WriteExclusive,
        FileFlag::WriteRead,
        FileFlag::WriteReadExclusive,
        FileFlag::Append,
        FileFlag::AppendExclusive,
        FileFlag::AppendRead,
        FileFlag::AppendReadExclusive,
    ];

    /// Parse a mode token, rejecting anything outside the fixed set.
    pub fn parse(mode: &str) -> FsResult<Self> {
        <Self as FromStr>::from_str(mode)
            .map_err(|_| FsError::invalid_argument("", format!("Invalid flag: {mode}")))
    }

    /// Canonical mode token.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFlag::Read => "r",
            FileFlag::ReadSync => "rs",
            FileFlag::ReadWrite => "r+",
            FileFlag::ReadWriteSync => "rs+",
            FileFlag::Write => "w",
            FileFlag::WriteExclusive => "wx",
            FileFlag::WriteRead => "w+",
            FileFlag::WriteReadExclusive => "wx+",
            FileFlag::Append => "a",
            FileFlag::AppendExclusive => "ax",
            FileFlag::AppendRead => "a+",
            FileFlag::AppendReadExclusive => "ax+",
        }
    }

    /// Reads are permitted.
    pub fn is_readable(&self) -> bool {
        let s = self.as_str();
        s.contains('r') || s.contains('+')
    }

    /// Writes are permitted.
    pub fn is_writeable(&self) -> bool {
        let s = self.as_str();
        s.contains('w') || s.contains('a') || s.contains('+')
    }

    /// Existing content is discarded on open.
    pub fn is_truncating(&self) -> bool {
        self.as_str().contains('w')
    }

    /// Writes without an explicit position go to the end.
    pub fn is_appendable(&self) -> bool {
        self.as_str().contains('a')
    }

    /// Every mutation is synced immediately.
    pub fn is_synchronous(&self) -> bool {
        self.as_str().contains('s')
    }

    /// Opening an existing path is an error.
    pub fn is_exclusive(&self) -> bool {
        self.as_str().contains('x')
    }

    /// Decision when the path exists.
    pub fn path_exists_action(&self) -> PathExistsAction {
        if self.is_exclusive() {
            PathExistsAction::Refuse
        } else if self.is_truncating() {
            PathExistsAction::Truncate
        } else {
            PathExistsAction::Reuse
        }
    }

    /// Decision when the path does not exist.
    pub fn path_not_exists_action(&self) -> PathNotExistsAction {
        let read_write_only = matches!(self, FileFlag::ReadWrite | FileFlag::ReadWriteSync);
        if (self.is_writeable() || self.is_appendable()) && !read_write_only {
            PathNotExistsAction::Create
        } else {
            PathNotExistsAction::Refuse
        }
    }
}

impl fmt::Display for FileFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
