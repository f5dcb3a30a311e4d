//! Semantic version allocation for spec uploads.
//!
//! Every upload gets the next version after the newest one in the project's
//! history. The default policy bumps the patch number only; minor and major
//! bumps are available through configuration but nothing in the upload flow
//! selects them on its own.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Version assigned to the first upload of a project.
pub const INITIAL_VERSION: &str = "1.0.0";

/// Errors raised by version allocation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VersionError {
    /// A stored version string is not `major.minor.patch` with numeric parts.
    #[error("malformed version '{0}': expected 'major.minor.patch' with numeric parts")]
    Malformed(String),

    /// The component to bump cannot grow any further.
    #[error("version '{0}' cannot be incremented any further")]
    Overflow(String),
}

/// Which component of the version an upload increments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VersionBump {
    /// `x.y.z` -> `x.y.(z+1)`.
    #[default]
    Patch,
    /// `x.y.z` -> `x.(y+1).0`.
    Minor,
    /// `x.y.z` -> `(x+1).0.0`.
    Major,
}

/// A parsed `major.minor.patch` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SemVer {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Patch component.
    pub patch: u64,
}

impl SemVer {
    /// Return the version after `self` under `bump`.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::Overflow`] when the bumped component is
    /// already `u64::MAX`.
    pub fn bumped(self, bump: VersionBump) -> Result<Self, VersionError> {
        let overflow = || VersionError::Overflow(self.to_string());
        Ok(match bump {
            VersionBump::Patch => Self {
                patch: self.patch.checked_add(1).ok_or_else(overflow)?,
                ..self
            },
            VersionBump::Minor => Self {
                minor: self.minor.checked_add(1).ok_or_else(overflow)?,
                patch: 0,
                ..self
            },
            VersionBump::Major => Self {
                major: self.major.checked_add(1).ok_or_else(overflow)?,
                minor: 0,
                patch: 0,
            },
        })
    }
}

impl FromStr for SemVer {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || VersionError::Malformed(s.to_string());
        let mut parts = s.trim().split('.');
        let mut next = || -> Result<u64, VersionError> {
            parts
                .next()
                .and_then(|part| part.parse::<u64>().ok())
                .ok_or_else(malformed)
        };
        let parsed = Self {
            major: next()?,
            minor: next()?,
            patch: next()?,
        };
        if parts.next().is_some() {
            return Err(malformed());
        }
        Ok(parsed)
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Computes the next version string from a project's version history.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionAllocator {
    bump: VersionBump,
}

impl VersionAllocator {
    /// Create an allocator with the given bump policy.
    #[must_use]
    pub const fn new(bump: VersionBump) -> Self {
        Self { bump }
    }

    /// Next version after `history`, which is ordered newest first.
    ///
    /// Only the newest entry is consulted.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::Malformed`] when the newest entry is not a
    /// numeric `major.minor.patch` string, or [`VersionError::Overflow`]
    /// when the bumped component is at its limit.
    pub fn next<S: AsRef<str>>(&self, history: &[S]) -> Result<String, VersionError> {
        let Some(latest) = history.first() else {
            return Ok(INITIAL_VERSION.to_string());
        };
        let current: SemVer = latest.as_ref().parse()?;
        Ok(current.bumped(self.bump)?.to_string())
    }
}

/// Next version under the default patch policy.
///
/// # Errors
///
/// See [`VersionAllocator::next`].
pub fn next_version<S: AsRef<str>>(history: &[S]) -> Result<String, VersionError> {
    VersionAllocator::default().next(history)
}
