//! Bump arithmetic and the ordered option list shown to users.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{Channel, Prerelease, Version, VersionError, VersionResult};

/// Kind of version increment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum BumpType {
    /// Breaking release: `1.4.2` to `2.0.0`.
    Major,
    /// Feature release: `1.4.2` to `1.5.0`.
    Minor,
    /// Fix release: `1.4.2` to `1.4.3`.
    Patch,
    /// Major bump starting a prerelease: `1.4.2` to `2.0.0-alpha.1`.
    Premajor,
    /// Minor bump starting a prerelease: `1.4.2` to `1.5.0-alpha.1`.
    Preminor,
    /// Patch bump starting a prerelease: `1.4.2` to `1.4.3-alpha.1`.
    Prepatch,
    /// Next prerelease on the current channel.
    Prerelease,
}

impl BumpType {
    /// Every bump type, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Major,
        Self::Minor,
        Self::Patch,
        Self::Premajor,
        Self::Preminor,
        Self::Prepatch,
        Self::Prerelease,
    ];

    /// Lowercase name of the bump type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Patch => "patch",
            Self::Premajor => "premajor",
            Self::Preminor => "preminor",
            Self::Prepatch => "prepatch",
            Self::Prerelease => "prerelease",
        }
    }
}

impl fmt::Display for BumpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BumpType {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| VersionError::InvalidBumpType(s.to_string()))
    }
}

impl Version {
    /// Compute the next version.
    ///
    /// `channel` only matters when a new prerelease is started. Build
    /// metadata never survives a bump. Fails with
    /// [`VersionError::Overflow`] when the component to increment is
    /// already `u64::MAX`.
    pub fn bump(&self, kind: BumpType, channel: Channel) -> VersionResult<Self> {
        let Self {
            major,
            minor,
            patch,
            ..
        } = *self;
        let inc = |value: u64, component: &'static str| {
            value.checked_add(1).ok_or_else(|| VersionError::Overflow {
                version: self.to_string(),
                kind,
                component,
            })
        };

        Ok(match kind {
            BumpType::Major => Self::new(inc(major, "major")?, 0, 0),
            BumpType::Minor => Self::new(major, inc(minor, "minor")?, 0),
            BumpType::Patch => Self::new(major, minor, inc(patch, "patch")?),
            BumpType::Premajor => Self::new(inc(major, "major")?, 0, 0).starting(channel),
            BumpType::Preminor => Self::new(major, inc(minor, "minor")?, 0).starting(channel),
            BumpType::Prepatch => Self::new(major, minor, inc(patch, "patch")?).starting(channel),
            BumpType::Prerelease => match self.pre {
                Some(pre) => Self {
                    pre: Some(Prerelease::new(
                        pre.channel,
                        inc(pre.number.unwrap_or(0), "prerelease number")?,
                    )),
                    ..Self::new(major, minor, patch)
                },
                None => Self::new(major, minor, inc(patch, "patch")?).starting(channel),
            },
        })
    }

    const fn starting(mut self, channel: Channel) -> Self {
        self.pre = Some(Prerelease::new(channel, 1));
        self
    }
}

/// One entry of the bump menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BumpOption {
    /// The bump that produces `version`.
    #[serde(rename = "type")]
    pub kind: BumpType,
    /// The resulting version string.
    pub version: String,
}

impl fmt::Display for BumpOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.version)
    }
}

/// Candidate bumps in menu order.
///
/// Patch, minor, major, then their prerelease variants; a trailing
/// `prerelease` entry appears only when `current` is already a prerelease.
/// Callers number these choices, so the order is stable. A bump that would
/// overflow is left out.
pub fn bump_options(current: &Version, channel: Channel) -> Vec<BumpOption> {
    let mut kinds = vec![
        BumpType::Patch,
        BumpType::Minor,
        BumpType::Major,
        BumpType::Prepatch,
        BumpType::Preminor,
        BumpType::Premajor,
    ];
    if current.is_prerelease() {
        kinds.push(BumpType::Prerelease);
    }

    kinds
        .into_iter()
        .filter_map(|kind| {
            let next = current.bump(kind, channel).ok()?;
            Some(BumpOption {
                kind,
                version: next.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn bumped(s: &str, kind: BumpType) -> String {
        v(s).bump(kind, Channel::Alpha).unwrap().to_string()
    }

    #[test]
    fn plain_bumps_zero_lower_fields() {
        assert_eq!(bumped("1.4.2", BumpType::Major), "2.0.0");
        assert_eq!(bumped("1.4.2", BumpType::Minor), "1.5.0");
        assert_eq!(bumped("1.4.2", BumpType::Patch), "1.4.3");
    }

    #[test]
    fn plain_bumps_clear_prerelease_and_build() {
        for kind in [BumpType::Major, BumpType::Minor, BumpType::Patch] {
            let next = v("1.4.2-rc.3+build.7").bump(kind, Channel::Beta).unwrap();
            assert!(next.pre.is_none(), "{kind} kept prerelease");
            assert!(next.build.is_none(), "{kind} kept build");
        }
    }

    #[test]
    fn pre_bumps_start_at_one_on_requested_channel() {
        let current = v("1.4.2");
        assert_eq!(
            current.bump(BumpType::Premajor, Channel::Rc).unwrap().to_string(),
            "2.0.0-rc.1"
        );
        assert_eq!(
            current.bump(BumpType::Preminor, Channel::Beta).unwrap().to_string(),
            "1.5.0-beta.1"
        );
        assert_eq!(
            current.bump(BumpType::Prepatch, Channel::Alpha).unwrap().to_string(),
            "1.4.3-alpha.1"
        );
    }

    #[test]
    fn prerelease_increments_counter_on_same_channel() {
        let next = v("2.0.0-beta.3").bump(BumpType::Prerelease, Channel::Alpha).unwrap();
        assert_eq!(next.to_string(), "2.0.0-beta.4");
    }

    #[test]
    fn prerelease_without_counter_becomes_one() {
        assert_eq!(bumped("2.0.0-rc", BumpType::Prerelease), "2.0.0-rc.1");
    }

    #[test]
    fn prerelease_from_release_bumps_patch() {
        let next = v("1.0.0").bump(BumpType::Prerelease, Channel::Beta).unwrap();
        assert_eq!(next.to_string(), "1.0.1-beta.1");
    }

    #[test]
    fn prepatch_then_prerelease_increments_by_one() {
        for start in ["0.1.0", "1.9.9", "3.0.0-rc.2"] {
            let first = v(start).bump(BumpType::Prepatch, Channel::Alpha).unwrap();
            let second = first.bump(BumpType::Prerelease, Channel::Rc).unwrap();
            assert_eq!(
                (second.major, second.minor, second.patch),
                (first.major, first.minor, first.patch)
            );
            let (a, b) = (first.pre.unwrap(), second.pre.unwrap());
            assert_eq!(a.channel, b.channel);
            assert_eq!(b.number, a.number.map(|n| n + 1));
        }
    }

    #[test]
    fn bump_drops_build_metadata() {
        for kind in BumpType::ALL {
            assert!(v("1.0.0-alpha.1+meta").bump(kind, Channel::Alpha).unwrap().build.is_none());
        }
    }

    #[test]
    fn patch_bump_always_orders_higher() {
        for start in ["0.0.0", "1.2.3", "9.99.999", "1.0.0+build"] {
            let current = v(start);
            let next = current.bump(BumpType::Patch, Channel::Alpha).unwrap();
            assert_eq!(next.compare(&current), std::cmp::Ordering::Greater);
        }
    }

    #[test]
    fn bump_type_parses_case_insensitively() {
        assert_eq!("PreMinor".parse::<BumpType>(), Ok(BumpType::Preminor));
        assert!(matches!(
            "huge".parse::<BumpType>(),
            Err(VersionError::InvalidBumpType(_))
        ));
    }

    #[test]
    fn options_for_release_have_six_entries_in_order() {
        let options = bump_options(&v("1.2.3"), Channel::Beta);
        let kinds: Vec<_> = options.iter().map(|o| o.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BumpType::Patch,
                BumpType::Minor,
                BumpType::Major,
                BumpType::Prepatch,
                BumpType::Preminor,
                BumpType::Premajor,
            ]
        );
        assert_eq!(options[3].version, "1.2.4-beta.1");
    }

    #[test]
    fn options_for_prerelease_end_with_prerelease() {
        let options = bump_options(&v("1.3.0-alpha.2"), Channel::Alpha);
        assert_eq!(options.len(), 7);
        let last = options.last().unwrap();
        assert_eq!(last.kind, BumpType::Prerelease);
        assert_eq!(last.version, "1.3.0-alpha.3");
        assert_eq!(last.to_string(), "prerelease (1.3.0-alpha.3)");
    }

    #[test]
    fn option_serializes_kind_as_type() {
        let option = &bump_options(&v("1.0.0"), Channel::Alpha)[0];
        let json = serde_json::to_value(option).unwrap();
        assert_eq!(json["type"], "patch");
        assert_eq!(json["version"], "1.0.1");
    }

    #[test]
    fn bump_at_component_maximum_is_an_error() {
        let max = u64::MAX;
        let cases = [
            (format!("{max}.0.0"), BumpType::Major, "major"),
            (format!("{max}.0.0"), BumpType::Premajor, "major"),
            (format!("1.{max}.0"), BumpType::Minor, "minor"),
            (format!("1.0.{max}"), BumpType::Patch, "patch"),
            (format!("1.0.{max}"), BumpType::Prerelease, "patch"),
            (format!("1.0.0-rc.{max}"), BumpType::Prerelease, "prerelease number"),
        ];
        for (input, kind, expected) in cases {
            let err = v(&input).bump(kind, Channel::Alpha).unwrap_err();
            match err {
                VersionError::Overflow { component, .. } => assert_eq!(component, expected),
                other => panic!("{input} {kind}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn bump_at_maximum_leaves_other_components_usable() {
        let max = u64::MAX;
        let next = v(&format!("1.0.{max}")).bump(BumpType::Minor, Channel::Alpha);
        assert_eq!(next.unwrap().to_string(), "1.1.0");
    }

    #[test]
    fn options_skip_bumps_that_would_overflow() {
        let options = bump_options(&v(&format!("1.0.{}", u64::MAX)), Channel::Alpha);
        let kinds: Vec<_> = options.iter().map(|o| o.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BumpType::Minor,
                BumpType::Major,
                BumpType::Preminor,
                BumpType::Premajor,
            ]
        );
    }
}
