//! Semantic version model.
//!
//! A [`Version`] is `MAJOR.MINOR.PATCH`, optionally followed by a prerelease
//! on one of three channels ([`Channel::Alpha`], [`Channel::Beta`],
//! [`Channel::Rc`]) and opaque build metadata. Versions are values: every
//! bump returns a new one.
//!
//! Accepted grammar (the channel name is case-insensitive):
//!
//! ```text
//! v?MAJOR.MINOR.PATCH(-(alpha|beta|rc)(.N)?)?(+BUILD)?
//! ```
//!
//! Range and constraint syntax (`^1.2`, `~1.2.3`, comparator sets) is not
//! understood.
//!
//! ```
//! use shipmark_core::version::{BumpType, Channel, Version};
//!
//! let current = Version::parse("v1.4.2").unwrap();
//! let next = current.bump(BumpType::Preminor, Channel::Beta).unwrap();
//! assert_eq!(next.to_string(), "1.5.0-beta.1");
//! ```

mod bump;

pub use bump::{BumpOption, BumpType, bump_options};

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

static VERSION_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^v?([0-9]+)\.([0-9]+)\.([0-9]+)(?:-(alpha|beta|rc)(?:\.([0-9]+))?)?(?:\+(.+))?$",
    )
    .ok()
});

/// Errors raised while validating versions and bump arguments.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// The input does not follow the version grammar.
    #[error("invalid version format: {0:?}")]
    InvalidFormat(String),

    /// The bump type is not one of the known kinds.
    #[error("invalid bump type: {0:?}")]
    InvalidBumpType(String),

    /// The prerelease channel is not alpha, beta or rc.
    #[error("invalid prerelease channel: {0:?}")]
    InvalidChannel(String),

    /// A component is already at its maximum and cannot be incremented.
    #[error("cannot {kind} bump {version}: {component} is at its maximum")]
    Overflow {
        /// The version being bumped.
        version: String,
        /// The requested bump.
        kind: BumpType,
        /// Which component overflowed.
        component: &'static str,
    },
}

impl VersionError {
    /// Remediation hints suitable for showing under the error message.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFormat(_) => vec![
                "use MAJOR.MINOR.PATCH, for example 1.2.3".to_string(),
                "a leading v is allowed: v1.2.3".to_string(),
                "prereleases use alpha, beta or rc: 1.2.3-beta.1".to_string(),
                "build metadata follows a plus sign: 1.2.3+build.5".to_string(),
            ],
            Self::InvalidBumpType(_) => vec![format!(
                "valid bump types: {}",
                BumpType::ALL.map(BumpType::as_str).join(", ")
            )],
            Self::InvalidChannel(_) => vec![format!(
                "valid channels: {}",
                Channel::ALL.map(Channel::as_str).join(", ")
            )],
            Self::Overflow { .. } => {
                vec!["set the next version explicitly with `version set`".to_string()]
            }
        }
    }
}

/// Result type alias using [`VersionError`].
pub type VersionResult<T> = Result<T, VersionError>;

// ──── Channel ──────────────────────────────────────────────────────

/// Prerelease channel, ordered by maturity.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Early, unstable builds.
    #[default]
    Alpha,
    /// Feature complete, still being tested.
    Beta,
    /// Release candidate.
    Rc,
}

impl Channel {
    /// Every channel, least mature first.
    pub const ALL: [Self; 3] = [Self::Alpha, Self::Beta, Self::Rc];

    /// Lowercase channel name as it appears in a version string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alpha => "alpha",
            Self::Beta => "beta",
            Self::Rc => "rc",
        }
    }

    /// Maturity rank: alpha 1, beta 2, rc 3.
    pub const fn rank(self) -> u8 {
        match self {
            Self::Alpha => 1,
            Self::Beta => 2,
            Self::Rc => 3,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "alpha" => Ok(Self::Alpha),
            "beta" => Ok(Self::Beta),
            "rc" => Ok(Self::Rc),
            _ => Err(VersionError::InvalidChannel(s.to_string())),
        }
    }
}

// ──── Version ──────────────────────────────────────────────────────

/// Prerelease part of a version: a channel and an optional counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Prerelease {
    /// Release channel.
    pub channel: Channel,
    /// Counter within the channel (`1.0.0-rc.3` has `Some(3)`).
    pub number: Option<u64>,
}

impl Prerelease {
    /// Prerelease on `channel` with the given counter.
    pub const fn new(channel: Channel, number: u64) -> Self {
        Self {
            channel,
            number: Some(number),
        }
    }
}

/// A parsed semantic version.
///
/// Equality is structural and includes build metadata; use
/// [`Version::compare`] for precedence, which ignores it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Patch component.
    pub patch: u64,
    /// Prerelease channel and counter, if any.
    pub pre: Option<Prerelease>,
    /// Build metadata, carried through formatting only.
    pub build: Option<String>,
}

impl Version {
    /// A release version with no prerelease or build metadata.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: None,
            build: None,
        }
    }

    /// Parse a version string, accepting an optional leading `v`.
    pub fn parse(input: &str) -> VersionResult<Self> {
        let invalid = || VersionError::InvalidFormat(input.to_string());
        let caps = VERSION_RE
            .as_ref()
            .and_then(|re| re.captures(input))
            .ok_or_else(invalid)?;

        let number = |idx: usize| -> VersionResult<u64> {
            caps.get(idx)
                .map_or(Ok(0), |m| m.as_str().parse().map_err(|_| invalid()))
        };

        let pre = match caps.get(4) {
            Some(channel) => Some(Prerelease {
                channel: channel.as_str().parse()?,
                number: caps
                    .get(5)
                    .map(|m| m.as_str().parse().map_err(|_| invalid()))
                    .transpose()?,
            }),
            None => None,
        };

        Ok(Self {
            major: number(1)?,
            minor: number(2)?,
            patch: number(3)?,
            pre,
            build: caps.get(6).map(|m| m.as_str().to_string()),
        })
    }

    /// Render the version with `prefix` in front (for example `"v"`).
    pub fn format_with_prefix(&self, prefix: &str) -> String {
        format!("{prefix}{self}")
    }

    /// Whether the version carries a prerelease channel.
    pub const fn is_prerelease(&self) -> bool {
        self.pre.is_some()
    }

    /// Precedence ordering.
    ///
    /// Release components compare numerically; at equal components a release
    /// outranks any prerelease, and prereleases order by channel rank, then
    /// counter (a missing counter counts as 0). Build metadata is ignored.
    pub fn compare(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a
                    .channel
                    .rank()
                    .cmp(&b.channel.rank())
                    .then_with(|| a.number.unwrap_or(0).cmp(&b.number.unwrap_or(0))),
            })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{}", pre.channel)?;
            if let Some(number) = pre.number {
                write!(f, ".{number}")?;
            }
        }
        if let Some(build) = &self.build {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Whether `input` follows the version grammar.
pub fn is_valid(input: &str) -> bool {
    Version::parse(input).is_ok()
}

/// Strip a single leading `v` or `V`.
pub fn clean(input: &str) -> &str {
    input.strip_prefix(['v', 'V']).unwrap_or(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    // ===== Parsing =====

    #[test]
    fn parses_plain_release() {
        let version = v("1.2.3");
        assert_eq!(version, Version::new(1, 2, 3));
    }

    #[test]
    fn parses_prefix_prerelease_and_build() {
        let version = v("v2.0.0-RC.4+sha.abc");
        assert_eq!(version.major, 2);
        assert_eq!(version.pre, Some(Prerelease::new(Channel::Rc, 4)));
        assert_eq!(version.build.as_deref(), Some("sha.abc"));
        assert_eq!(version.to_string(), "2.0.0-rc.4+sha.abc");
    }

    #[test]
    fn parses_channel_without_number() {
        let version = v("1.0.0-beta");
        assert_eq!(
            version.pre,
            Some(Prerelease {
                channel: Channel::Beta,
                number: None
            })
        );
        assert_eq!(version.to_string(), "1.0.0-beta");
    }

    #[test]
    fn rejects_malformed_input() {
        for input in [
            "",
            "1.2",
            "1.2.x",
            "1.2.3-gamma.1",
            "1.2.3-",
            "v",
            " 1.2.3",
            "1.2.3.4",
            "^1.2.3",
        ] {
            assert!(
                matches!(Version::parse(input), Err(VersionError::InvalidFormat(_))),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_overflowing_components() {
        assert!(Version::parse("99999999999999999999.0.0").is_err());
    }

    #[test]
    fn format_is_left_inverse_of_parse() {
        for input in [
            "0.0.0",
            "1.2.3",
            "v10.20.30",
            "1.0.0-alpha.1",
            "V3.1.4-Beta.2+build.9",
            "1.0.0+x",
        ] {
            let parsed = v(input);
            let expected = clean(input).replace("Beta", "beta");
            assert_eq!(parsed.to_string(), expected);
            assert_eq!(v(clean(input)).format_with_prefix(""), expected);
        }
    }

    #[test]
    fn format_with_prefix_prepends() {
        assert_eq!(v("1.2.3-rc.1").format_with_prefix("v"), "v1.2.3-rc.1");
    }

    #[test]
    fn is_valid_and_clean() {
        assert!(is_valid("v1.0.0"));
        assert!(!is_valid("1.0"));
        assert_eq!(clean("v1.0.0"), "1.0.0");
        assert_eq!(clean("V1.0.0"), "1.0.0");
        assert_eq!(clean("vv1.0.0"), "v1.0.0");
        assert_eq!(clean("1.0.0"), "1.0.0");
    }

    #[test]
    fn serializes_as_string() {
        let json = serde_json::to_string(&v("1.2.3-beta.1")).unwrap();
        assert_eq!(json, "\"1.2.3-beta.1\"");
    }

    // ===== Ordering =====

    #[test]
    fn release_beats_any_prerelease() {
        assert_eq!(v("1.0.0").compare(&v("1.0.0-rc.9")), Ordering::Greater);
        assert_eq!(v("1.0.0-rc.9").compare(&v("1.0.0")), Ordering::Less);
    }

    #[test]
    fn channel_rank_orders_before_counter() {
        assert_eq!(
            v("1.0.0-beta.1").compare(&v("1.0.0-alpha.9")),
            Ordering::Greater
        );
        assert_eq!(v("1.0.0-rc.1").compare(&v("1.0.0-beta.5")), Ordering::Greater);
        assert_eq!(
            v("1.0.0-alpha.2").compare(&v("1.0.0-alpha.10")),
            Ordering::Less
        );
    }

    #[test]
    fn missing_counter_compares_as_zero() {
        assert_eq!(v("1.0.0-alpha").compare(&v("1.0.0-alpha.1")), Ordering::Less);
        assert_eq!(v("1.0.0-alpha").compare(&v("1.0.0-alpha.0")), Ordering::Equal);
    }

    #[test]
    fn numeric_components_compare_numerically() {
        assert_eq!(v("1.10.0").compare(&v("1.9.9")), Ordering::Greater);
        assert_eq!(v("2.0.0-alpha.1").compare(&v("1.99.99")), Ordering::Greater);
    }

    #[test]
    fn build_metadata_is_ignored_by_compare() {
        assert_eq!(v("1.0.0+a").compare(&v("1.0.0+b")), Ordering::Equal);
        assert_ne!(v("1.0.0+a"), v("1.0.0+b"));
    }

    // ===== Errors =====

    #[test]
    fn errors_carry_suggestions() {
        let err = Version::parse("nope").unwrap_err();
        assert!(err.to_string().contains("nope"));
        assert!(err.suggestions().iter().any(|s| s.contains("1.2.3")));

        let err = "sideways".parse::<BumpType>().unwrap_err();
        assert!(err.suggestions()[0].contains("prerelease"));

        let err = "gamma".parse::<Channel>().unwrap_err();
        assert_eq!(err, VersionError::InvalidChannel("gamma".to_string()));
        assert!(err.suggestions()[0].contains("alpha, beta, rc"));
    }
}
