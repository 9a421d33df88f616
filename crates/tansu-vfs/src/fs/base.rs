//! Building blocks shared by the blocking and non-blocking default bodies.

use std::collections::VecDeque;

use crate::error::{FsError, FsResult};
use crate::flag::{FileFlag, PathExistsAction, PathNotExistsAction};
use crate::path;
use crate::stats::Stats;

/// Maximum symlinks followed by `realpath`.
pub(crate) const MAX_SYMLINK_HOPS: usize = 40;

/// What `open` should do once the target has been stat'ed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpenPlan {
    /// Open the existing file, optionally truncating it first.
    Existing { truncate: bool },
    /// Create a new file (after checking the parent).
    Create,
}

/// Apply the flag's decision tables to a `stat` outcome.
///
/// Only `ENOENT` counts as "does not exist"; every other stat error is
/// returned unchanged.
pub(crate) fn plan_open(path: &str, flag: FileFlag, stat: FsResult<Stats>) -> FsResult<OpenPlan> {
    match stat {
        Ok(stats) => {
            if stats.is_directory() {
                return Err(FsError::is_a_directory(path));
            }
            match flag.path_exists_action() {
                PathExistsAction::Refuse => Err(FsError::already_exists(path)),
                PathExistsAction::Truncate => Ok(OpenPlan::Existing { truncate: true }),
                PathExistsAction::Reuse => Ok(OpenPlan::Existing { truncate: false }),
            }
        }
        Err(e) if e.is_not_found() => match flag.path_not_exists_action() {
            PathNotExistsAction::Create => Ok(OpenPlan::Create),
            PathNotExistsAction::Refuse => Err(e),
        },
        Err(e) => Err(e),
    }
}

/// A new file may only be created inside an existing directory.
pub(crate) fn check_parent(parent: &str, stat: FsResult<Stats>) -> FsResult<()> {
    let stats = stat?;
    if !stats.is_directory() {
        return Err(FsError::not_a_directory(parent));
    }
    Ok(())
}

pub(crate) fn require_readable(path: &str, flag: FileFlag) -> FsResult<()> {
    if !flag.is_readable() {
        return Err(FsError::invalid_argument(
            path,
            "Flag passed to readFile must allow for reading.",
        ));
    }
    Ok(())
}

pub(crate) fn require_writeable(path: &str, flag: FileFlag) -> FsResult<()> {
    if !flag.is_writeable() {
        return Err(FsError::invalid_argument(
            path,
            "Flag passed to writeFile must allow for writing.",
        ));
    }
    Ok(())
}

pub(crate) fn require_appendable(path: &str, flag: FileFlag) -> FsResult<()> {
    if !flag.is_appendable() {
        return Err(FsError::invalid_argument(
            path,
            "Flag passed to appendFile must allow for appending.",
        ));
    }
    Ok(())
}

/// Size to allocate when reading a whole file.
pub(crate) fn content_len(path: &str, stats: &Stats) -> FsResult<usize> {
    let size = stats.size.unwrap_or(0);
    usize::try_from(size)
        .map_err(|_| FsError::invalid_argument(path, format!("file of {size} bytes is too large")))
}

/// Where a symlink at `link` with `target` points, as an absolute path.
pub(crate) fn link_destination(link: &str, target: &str) -> String {
    path::join(&path::dirname(link), target)
}

/// Segment-by-segment symlink resolution state for `realpath`.
pub(crate) struct LinkWalk {
    origin: String,
    pending: VecDeque<String>,
    resolved: String,
    hops: usize,
}

impl LinkWalk {
    pub(crate) fn new(origin: &str) -> Self {
        Self {
            origin: origin.to_string(),
            pending: path::segments(origin).map(str::to_string).collect(),
            resolved: "/".to_string(),
            hops: 0,
        }
    }

    /// Next prefix to inspect, or `None` when every segment is resolved.
    pub(crate) fn next_candidate(&mut self) -> Option<String> {
        let segment = self.pending.pop_front()?;
        Some(path::join(&self.resolved, &segment))
    }

    /// The candidate is not a link; keep it.
    pub(crate) fn accept(&mut self, candidate: String) {
        self.resolved = candidate;
    }

    /// The candidate is a link to `target`; restart from its destination.
    pub(crate) fn follow(&mut self, candidate: &str, target: &str) -> FsResult<()> {
        self.hops += 1;
        if self.hops > MAX_SYMLINK_HOPS {
            return Err(FsError::invalid_argument(
                &self.origin,
                "too many levels of symbolic links",
            ));
        }
        let destination = link_destination(candidate, target);
        let mut pending: VecDeque<String> =
            path::segments(&destination).map(str::to_string).collect();
        pending.extend(self.pending.drain(..));
        self.pending = pending;
        self.resolved = "/".to_string();
        Ok(())
    }

    pub(crate) fn finish(self) -> String {
        self.resolved
    }
}

/// Combine the result of the work done on a handle with the result of
/// closing it, reporting the first failure.
pub(crate) fn first_error<T>(work: FsResult<T>, close: FsResult<()>) -> FsResult<T> {
    let value = work?;
    close?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_plan_for_every_flag_and_existence() {
        let file = || Ok(Stats::file(Some(3), 0o644));
        let missing = || Err(FsError::not_found("/p"));
        for flag in FileFlag::ALL {
            let exists = plan_open("/p", flag, file());
            match flag.path_exists_action() {
                PathExistsAction::Refuse => {
                    assert_eq!(exists.unwrap_err().code, ErrorCode::AlreadyExists)
                }
                PathExistsAction::Truncate => {
                    assert_eq!(exists.unwrap(), OpenPlan::Existing { truncate: true })
                }
                PathExistsAction::Reuse => {
                    assert_eq!(exists.unwrap(), OpenPlan::Existing { truncate: false })
                }
            }
            let absent = plan_open("/p", flag, missing());
            match flag.path_not_exists_action() {
                PathNotExistsAction::Create => assert_eq!(absent.unwrap(), OpenPlan::Create),
                PathNotExistsAction::Refuse => {
                    assert_eq!(absent.unwrap_err().code, ErrorCode::NotFound)
                }
            }
        }
    }

    #[test]
    fn test_plan_rejects_directories() {
        let err = plan_open("/d", FileFlag::Read, Ok(Stats::directory(0o755))).unwrap_err();
        assert_eq!(err.code, ErrorCode::IsADirectory);
    }

    #[test]
    fn test_plan_propagates_other_stat_errors() {
        let err = plan_open("/p", FileFlag::Write, Err(FsError::io("/p", "offline"))).unwrap_err();
        assert_eq!(err.code, ErrorCode::Io);
        assert_eq!(err.message, "offline");
    }

    #[test]
    fn test_check_parent() {
        assert!(check_parent("/d", Ok(Stats::directory(0o755))).is_ok());
        let err = check_parent("/f", Ok(Stats::file(Some(0), 0o644))).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotADirectory);
        assert_eq!(err.path, "/f");
    }

    #[test]
    fn test_link_destination() {
        assert_eq!(link_destination("/a/link", "target"), "/a/target");
        assert_eq!(link_destination("/a/link", "/abs/t"), "/abs/t");
    }

    #[test]
    fn test_link_walk_follows_and_limits() {
        let mut walk = LinkWalk::new("/a/link/file");
        assert_eq!(walk.next_candidate().unwrap(), "/a");
        walk.accept("/a".to_string());
        let candidate = walk.next_candidate().unwrap();
        assert_eq!(candidate, "/a/link");
        walk.follow(&candidate, "../b").unwrap();
        let mut seen = Vec::new();
        while let Some(candidate) = walk.next_candidate() {
            seen.push(candidate.clone());
            walk.accept(candidate);
        }
        assert_eq!(seen, vec!["/b", "/b/file"]);
        assert_eq!(walk.finish(), "/b/file");

        let mut looping = LinkWalk::new("/l");
        let mut result = Ok(());
        for _ in 0..=MAX_SYMLINK_HOPS {
            let candidate = looping.next_candidate().unwrap();
            result = looping.follow(&candidate, "/l");
            if result.is_err() {
                break;
            }
        }
        assert_eq!(result.unwrap_err().code, ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_first_error_prefers_work_error() {
        let err = first_error::<()>(Err(FsError::io("/p", "read")), Err(FsError::io("/p", "close")))
            .unwrap_err();
        assert_eq!(err.message, "read");
        let err = first_error(Ok(1), Err(FsError::io("/p", "close"))).unwrap_err();
        assert_eq!(err.message, "close");
    }
}
