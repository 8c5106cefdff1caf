//! Conventional commit parsing and grouping.
//!
//! Subjects follow `type(scope)?!?: subject`. A `!` after the type, or a
//! `BREAKING CHANGE:` footer in the body, marks the commit as breaking.
//! Anything else is kept with type [`OTHER`] so callers can still list it.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::config::CommitsConfig;
use crate::git::RawCommit;
use crate::version::BumpType;

/// Type assigned to subjects that are not conventional commits.
pub const OTHER: &str = "other";

/// Group key for breaking changes.
pub const BREAKING: &str = "breaking";

/// Section title for the breaking group.
pub const BREAKING_TITLE: &str = "⚠ BREAKING CHANGES";

/// Canonical group order for changelog sections.
pub const TYPE_ORDER: [&str; 11] = [
    BREAKING, "feat", "fix", "perf", "refactor", "docs", "test", "build", "ci", "chore", "revert",
];

/// Types that do not affect users unless they are breaking.
const INSIGNIFICANT: [&str; 4] = ["chore", "ci", "build", "style"];

static SUBJECT_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\w+)(?:\(([^)]+)\))?(!)?:\s*(.+)$").ok());

static BREAKING_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?im)^BREAKING[ -]CHANGE:\s*(.+)$").ok());

/// Default section titles per commit type.
pub fn default_labels() -> IndexMap<String, String> {
    [
        ("feat", "Features"),
        ("fix", "Bug Fixes"),
        ("docs", "Documentation"),
        ("style", "Styles"),
        ("refactor", "Code Refactoring"),
        ("perf", "Performance Improvements"),
        ("test", "Tests"),
        ("build", "Build System"),
        ("ci", "Continuous Integration"),
        ("chore", "Chores"),
        ("revert", "Reverts"),
    ]
    .into_iter()
    .map(|(kind, title)| (kind.to_string(), title.to_string()))
    .collect()
}

/// A commit classified by the conventional grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedCommit {
    /// Full hash.
    pub hash: String,
    /// Abbreviated hash.
    pub short_hash: String,
    /// Lowercased type, or [`OTHER`].
    #[serde(rename = "type")]
    pub kind: String,
    /// Scope inside the parentheses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Subject without the type prefix.
    pub subject: String,
    /// Message body.
    pub body: String,
    /// Author name.
    pub author: String,
    /// Author date.
    pub date: String,
    /// Whether the commit breaks compatibility.
    pub breaking: bool,
    /// Text of the `BREAKING CHANGE:` footer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breaking_note: Option<String>,
}

impl ParsedCommit {
    /// Whether the commit follows the conventional grammar.
    pub fn is_conventional(&self) -> bool {
        self.kind != OTHER
    }
}

/// Classify one commit.
pub fn parse_commit(raw: RawCommit) -> ParsedCommit {
    let captures = SUBJECT_RE
        .as_ref()
        .and_then(|re| re.captures(&raw.subject));

    let Some(caps) = captures else {
        return ParsedCommit {
            hash: raw.hash,
            short_hash: raw.short_hash,
            kind: OTHER.to_string(),
            scope: None,
            subject: raw.subject,
            body: raw.body,
            author: raw.author,
            date: raw.date,
            breaking: false,
            breaking_note: None,
        };
    };

    let kind = caps[1].to_lowercase();
    let scope = caps.get(2).map(|m| m.as_str().to_string());
    let bang = caps.get(3).is_some();
    let subject = caps[4].to_string();
    let breaking_note = BREAKING_RE
        .as_ref()
        .and_then(|re| re.captures(&raw.body))
        .map(|c| c[1].trim().to_string());

    ParsedCommit {
        hash: raw.hash,
        short_hash: raw.short_hash,
        kind,
        scope,
        subject,
        body: raw.body,
        author: raw.author,
        date: raw.date,
        breaking: bang || breaking_note.is_some(),
        breaking_note,
    }
}

/// Classify a batch of commits, preserving order.
pub fn parse_commits(raw: Vec<RawCommit>) -> Vec<ParsedCommit> {
    let parsed: Vec<ParsedCommit> = raw.into_iter().map(parse_commit).collect();
    debug!(
        total = parsed.len(),
        conventional = parsed.iter().filter(|c| c.is_conventional()).count(),
        "parsed commits"
    );
    parsed
}

/// Classify a batch under the configured conventions.
///
/// With `conventional` off every commit is [`OTHER`]. Without
/// `allow_custom_types`, types missing from [`default_labels`] are [`OTHER`].
pub fn parse_commits_with(raw: Vec<RawCommit>, config: &CommitsConfig) -> Vec<ParsedCommit> {
    let builtin = default_labels();
    parse_commits(raw)
        .into_iter()
        .map(|commit| {
            let custom = !builtin.contains_key(&commit.kind);
            if !config.conventional || (!config.allow_custom_types && custom) {
                demote(commit)
            } else {
                commit
            }
        })
        .collect()
}

fn demote(commit: ParsedCommit) -> ParsedCommit {
    if !commit.is_conventional() {
        return commit;
    }
    let subject = match &commit.scope {
        Some(scope) => format!("{}({scope}): {}", commit.kind, commit.subject),
        None => format!("{}: {}", commit.kind, commit.subject),
    };
    ParsedCommit {
        kind: OTHER.to_string(),
        scope: None,
        subject,
        breaking: false,
        breaking_note: None,
        ..commit
    }
}

/// Commits keyed by group, in insertion order.
pub type CommitGroups<'a> = IndexMap<String, Vec<&'a ParsedCommit>>;

/// Group commits for display.
///
/// Breaking commits form a [`BREAKING`] group first and also appear under
/// their own type. Types without a label, and [`OTHER`], are left out.
pub fn group_by_type<'a>(
    commits: &'a [ParsedCommit],
    labels: &IndexMap<String, String>,
) -> CommitGroups<'a> {
    let mut groups = CommitGroups::new();

    let breaking: Vec<&ParsedCommit> = commits.iter().filter(|c| c.breaking).collect();
    if !breaking.is_empty() {
        groups.insert(BREAKING.to_string(), breaking);
    }

    for commit in commits {
        if !commit.is_conventional() || !labels.contains_key(&commit.kind) {
            continue;
        }
        groups.entry(commit.kind.clone()).or_default().push(commit);
    }
    groups
}

/// Reorder groups by `order`; groups not in `order` follow in their
/// existing order. Empty groups are dropped.
pub fn sort_groups<'a>(groups: CommitGroups<'a>, order: &[&str]) -> CommitGroups<'a> {
    let mut rest = groups;
    let mut sorted = CommitGroups::new();
    for kind in order {
        if let Some(commits) = rest.shift_remove(*kind) {
            sorted.insert((*kind).to_string(), commits);
        }
    }
    sorted.extend(rest);
    sorted.retain(|_, commits| !commits.is_empty());
    sorted
}

/// Section title for a group key.
pub fn group_title<'a>(kind: &'a str, labels: &'a IndexMap<String, String>) -> &'a str {
    if kind == BREAKING {
        BREAKING_TITLE
    } else {
        labels.get(kind).map_or(kind, String::as_str)
    }
}

/// Drop housekeeping commits (`chore`, `ci`, `build`, `style`) unless they
/// are breaking.
pub fn filter_significant(commits: &[ParsedCommit]) -> Vec<&ParsedCommit> {
    commits
        .iter()
        .filter(|c| c.breaking || !INSIGNIFICANT.contains(&c.kind.as_str()))
        .collect()
}

/// Bump implied by a set of commits: breaking means major, a feature means
/// minor, anything else patch.
pub fn suggest_bump(commits: &[ParsedCommit]) -> BumpType {
    if commits.iter().any(|c| c.breaking) {
        BumpType::Major
    } else if commits.iter().any(|c| c.kind == "feat") {
        BumpType::Minor
    } else {
        BumpType::Patch
    }
}

/// Number of commits per type, in first-seen order.
pub fn count_by_type(commits: &[ParsedCommit]) -> IndexMap<String, usize> {
    let mut counts = IndexMap::new();
    for commit in commits {
        *counts.entry(commit.kind.clone()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(subject: &str, body: &str) -> RawCommit {
        RawCommit {
            hash: format!("{:0<40}", subject.len()),
            short_hash: format!("{:0<7}", subject.len()),
            subject: subject.to_string(),
            body: body.to_string(),
            author: "Ada".to_string(),
            date: "2024-05-01".to_string(),
        }
    }

    fn parse(subject: &str) -> ParsedCommit {
        parse_commit(raw(subject, ""))
    }

    // ===== Parsing =====

    #[test]
    fn parses_type_scope_and_subject() {
        let c = parse("feat(parser): support arrays");
        assert_eq!(c.kind, "feat");
        assert_eq!(c.scope.as_deref(), Some("parser"));
        assert_eq!(c.subject, "support arrays");
        assert!(!c.breaking);
    }

    #[test]
    fn type_is_lowercased() {
        assert_eq!(parse("FIX: crash on empty input").kind, "fix");
    }

    #[test]
    fn bang_marks_breaking() {
        let c = parse("refactor!: drop node 16");
        assert!(c.breaking);
        assert_eq!(c.breaking_note, None);
        assert_eq!(c.scope, None);
    }

    #[test]
    fn footer_marks_breaking_with_note() {
        let c = parse_commit(raw(
            "feat: new config loader",
            "Reworks loading.\n\nBREAKING CHANGE: the rc file is no longer read",
        ));
        assert!(c.breaking);
        assert_eq!(c.breaking_note.as_deref(), Some("the rc file is no longer read"));

        let c = parse_commit(raw("fix: x", "BREAKING-CHANGE: hyphenated footer"));
        assert_eq!(c.breaking_note.as_deref(), Some("hyphenated footer"));
    }

    #[test]
    fn non_conventional_subject_is_other() {
        let c = parse("Merge branch 'main' into dev");
        assert_eq!(c.kind, OTHER);
        assert_eq!(c.subject, "Merge branch 'main' into dev");
        assert!(!c.is_conventional());

        let c = parse_commit(raw("Update readme", "BREAKING CHANGE: ignored here"));
        assert!(!c.breaking);
    }

    // ===== Grouping =====

    #[test]
    fn breaking_group_comes_first_and_unlabelled_types_are_dropped() {
        let commits = vec![
            parse("fix: one"),
            parse("feat!: two"),
            parse("wip: three"),
            parse("random subject"),
        ];
        let groups = group_by_type(&commits, &default_labels());
        let keys: Vec<_> = groups.keys().map(String::as_str).collect();
        assert_eq!(keys, vec![BREAKING, "fix", "feat"]);
        assert_eq!(groups[BREAKING][0].subject, "two");
        assert_eq!(groups["feat"].len(), 1);
    }

    #[test]
    fn sort_follows_canonical_order_then_first_seen() {
        let commits = vec![
            parse("docs: a"),
            parse("deps: b"),
            parse("fix: c"),
            parse("feat: d"),
        ];
        let mut labels = default_labels();
        labels.insert("deps".to_string(), "Dependencies".to_string());

        let sorted = sort_groups(group_by_type(&commits, &labels), &TYPE_ORDER);
        let keys: Vec<_> = sorted.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["feat", "fix", "docs", "deps"]);
        assert_eq!(group_title("deps", &labels), "Dependencies");
        assert_eq!(group_title(BREAKING, &labels), BREAKING_TITLE);
        assert_eq!(group_title("unknown", &labels), "unknown");
    }

    #[test]
    fn significant_filter_keeps_breaking_housekeeping() {
        let commits = vec![
            parse("chore: bump deps"),
            parse("ci!: require new runner"),
            parse("style: fmt"),
            parse("fix: real bug"),
            parse("Plain message"),
        ];
        let kept: Vec<_> = filter_significant(&commits)
            .iter()
            .map(|c| c.subject.as_str())
            .collect();
        assert_eq!(kept, vec!["require new runner", "real bug", "Plain message"]);
    }

    #[test]
    fn suggested_bump_tracks_most_significant_change() {
        assert_eq!(suggest_bump(&[parse("fix: a"), parse("docs: b")]), BumpType::Patch);
        assert_eq!(suggest_bump(&[parse("fix: a"), parse("feat: b")]), BumpType::Minor);
        assert_eq!(suggest_bump(&[parse("feat: a"), parse("fix!: b")]), BumpType::Major);
        assert_eq!(suggest_bump(&[]), BumpType::Patch);
    }

    #[test]
    fn conventions_can_be_switched_off() {
        let raw_commits = || vec![raw("feat(ui): button", ""), raw("wip: scratch", "")];

        let parsed = parse_commits_with(raw_commits(), &CommitsConfig::default());
        assert_eq!(parsed[1].kind, "wip");

        let strict = CommitsConfig {
            allow_custom_types: false,
            ..CommitsConfig::default()
        };
        let parsed = parse_commits_with(raw_commits(), &strict);
        assert_eq!(parsed[0].kind, "feat");
        assert_eq!(parsed[1].kind, OTHER);
        assert_eq!(parsed[1].subject, "wip: scratch");

        let off = CommitsConfig {
            conventional: false,
            ..CommitsConfig::default()
        };
        let parsed = parse_commits_with(raw_commits(), &off);
        assert!(parsed.iter().all(|c| !c.is_conventional()));
        assert_eq!(parsed[0].subject, "feat(ui): button");
    }

    #[test]
    fn counts_types_in_first_seen_order() {
        let commits = vec![parse("fix: a"), parse("feat: b"), parse("fix: c")];
        let counts = count_by_type(&commits);
        assert_eq!(counts.into_iter().collect::<Vec<_>>(), vec![
            ("fix".to_string(), 2),
            ("feat".to_string(), 1)
        ]);
    }
}
