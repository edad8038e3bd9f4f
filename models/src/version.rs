//! Four-component game versions (`major.minor.patch.build`).
//!
//! Versions gate launch flags (the admin list needs a server newer than
//! 0.17.0) and decide mod compatibility against the installed base content.

use crate::{ErrorLocation, ModelError};

use std::cmp::Ordering;
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::panic::Location;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const VERSION_PATTERN: &str = r"\d+(?:\.\d+){0,3}";
const COMPONENT_COUNT: usize = 4;

/// "Unknown / not parsed".
pub const NIL_VERSION: Version = Version([0; COMPONENT_COUNT]);

/// Servers strictly newer than this accept `--server-adminlist`.
pub const ADMIN_LIST_MIN_VERSION: Version = Version::new(0, 17, 0, 0);

/// Mods built for 0.18.0 run on 1.0.0, which was a renumbered 0.18 release.
const LEGACY_REQUIRED_VERSION: Version = Version::new(0, 18, 0, 0);
const LEGACY_INSTALLED_VERSION: Version = Version::new(1, 0, 0, 0);

static VERSION_REGEX: OnceLock<Regex> = OnceLock::new();

fn version_regex() -> &'static Regex {
    VERSION_REGEX.get_or_init(|| Regex::new(VERSION_PATTERN).expect("valid regex pattern"))
}

/// Ordering is lexicographic over the components, which is what the derived
/// `Ord` on the backing array gives us. Missing components parse as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version([u16; COMPONENT_COUNT]);

impl Version {
    pub const fn new(major: u16, minor: u16, patch: u16, build: u16) -> Self {
        Self([major, minor, patch, build])
    }

    pub const fn major(&self) -> u16 {
        self.0[0]
    }

    pub const fn minor(&self) -> u16 {
        self.0[1]
    }

    pub const fn patch(&self) -> u16 {
        self.0[2]
    }

    pub const fn build(&self) -> u16 {
        self.0[3]
    }

    pub fn is_nil(&self) -> bool {
        *self == NIL_VERSION
    }

    /// Parse the first dotted numeric sequence found in `text`.
    ///
    /// `"1.1.53"`, `"0.17"` and `"build 1.0.0.1 (x64)"` all parse; text with
    /// no digits, or a component above `u16::MAX`, is a
    /// [`ModelError::VersionParse`].
    #[track_caller]
    pub fn parse(text: &str) -> Result<Self, ModelError> {
        let found = version_regex()
            .find(text)
            .ok_or_else(|| ModelError::VersionParse {
                message: format!("No dotted version found in '{text}'"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        let mut components = [0u16; COMPONENT_COUNT];
        for (slot, part) in components.iter_mut().zip(found.as_str().split('.')) {
            *slot = part.parse::<u16>().map_err(|e| ModelError::VersionParse {
                message: format!("Invalid version component '{part}' in '{text}': {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?;
        }

        Ok(Self(components))
    }

    pub fn equals(&self, other: &Version) -> bool {
        self == other
    }

    /// Strict comparison: the first differing component decides.
    pub fn greater_than(&self, other: &Version) -> bool {
        self.cmp(other) == Ordering::Greater
    }

    /// Whether a mod release requiring `self` can run on `installed` base content.
    pub fn is_compatible_with(&self, installed: &Version) -> bool {
        self.equals(installed)
            || (self.equals(&LEGACY_REQUIRED_VERSION) && installed.equals(&LEGACY_INSTALLED_VERSION))
    }

    /// Whether a server of this version understands `--server-adminlist`.
    pub fn supports_admin_list(&self) -> bool {
        self.greater_than(&ADMIN_LIST_MIN_VERSION)
    }
}

impl Display for Version {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        write!(formatter, "{}.{}.{}", self.major(), self.minor(), self.patch())?;
        if self.build() != 0 {
            write!(formatter, ".{}", self.build())?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = ModelError;

    #[track_caller]
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        Version::parse(&text).map_err(serde::de::Error::custom)
    }
}
