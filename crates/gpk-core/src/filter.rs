//! Layered file filtering for package copies.
//!
//! Two independent layers decide what survives a copy:
//!
//! - The **keep layer** applies once, to top-level entries, when the
//!   manifest declares `files`. A fixed set of documentation files and
//!   `package.json` is always kept; bundled dependencies keep
//!   `node_modules/`.
//! - The **ignore layer** is re-evaluated in every directory from the
//!   first ignore file found there (`.gpkignore`, `.yarnignore`,
//!   `.npmignore`, `.gitignore`, in that order), on top of an
//!   always-ignored baseline (VCS metadata, swap files, build
//!   droppings).
//!
//! Patterns are matchBase globs: a pattern without a slash matches the
//! entry name in any directory.

use globset::{GlobBuilder, GlobMatcher};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::LazyLock;

/// Ignore files, in lookup priority order.
pub const IGNORE_FILES: &[&str] = &[".gpkignore", ".yarnignore", ".npmignore", ".gitignore"];

/// Patterns ignored in every directory, overriding user patterns and
/// the keep layer.
const ALWAYS_IGNORE: &[&str] = &[
    ".*.swp",
    "*.swp",
    "._*",
    ".DS_Store",
    ".git",
    ".hg",
    ".svn",
    "config.gypi",
    "CVS",
    "npm-debug.log",
    ".gpkignore",
    ".yarnignore",
    ".npmignore",
    ".gitignore",
];

/// Patterns no user pattern may exclude (case-insensitive).
const NEVER_IGNORE: &[&str] = &[
    "package.json",
    "readme*",
    "license*",
    "licence*",
    "changelog*",
    "history*",
    "notice*",
];

static ALWAYS: LazyLock<Vec<GlobMatcher>> = LazyLock::new(|| {
    ALWAYS_IGNORE
        .iter()
        .filter_map(|p| compile(p, false))
        .collect()
});

static NEVER: LazyLock<Vec<GlobMatcher>> = LazyLock::new(|| {
    NEVER_IGNORE
        .iter()
        .filter_map(|p| compile(p, true))
        .collect()
});

fn compile(pattern: &str, case_insensitive: bool) -> Option<GlobMatcher> {
    GlobBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .literal_separator(false)
        .build()
        .ok()
        .map(|g| g.compile_matcher())
}

/// One parsed ignore/keep rule.
struct Rule {
    matcher: GlobMatcher,
    negated: bool,
    /// Patterns without a slash match the entry name (matchBase);
    /// others match the relative path.
    basename: bool,
}

impl Rule {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let (negated, pattern) = match line.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, line),
        };
        let pattern = pattern.trim_end_matches('/');
        if pattern.is_empty() {
            return None;
        }

        Some(Self {
            matcher: compile(pattern, false)?,
            negated,
            basename: !pattern.contains('/'),
        })
    }

    fn matches(&self, rel: &str, name: &str) -> bool {
        if self.basename {
            self.matcher.is_match(name)
        } else {
            self.matcher.is_match(rel)
        }
    }
}

/// An ordered pattern list with gitignore semantics: the last matching
/// rule decides, negation flips the decision.
#[derive(Default)]
pub struct PatternList {
    rules: Vec<Rule>,
}

impl PatternList {
    /// Parse rule lines. `node_modules` patterns are dropped; the
    /// bundled-dependency classification owns that subtree.
    #[must_use]
    pub fn parse<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let rules = lines
            .into_iter()
            .filter(|line| {
                let trimmed = line.trim().trim_start_matches('!');
                !trimmed.trim_end_matches('/').ends_with("node_modules")
            })
            .filter_map(Rule::parse)
            .collect();
        Self { rules }
    }

    /// The decision of the last matching rule, if any.
    #[must_use]
    pub fn matched(&self, rel: &str, name: &str) -> Option<bool> {
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.matches(rel, name))
            .map(|rule| !rule.negated)
    }
}

fn always_ignored(name: &str) -> bool {
    ALWAYS.iter().any(|m| m.is_match(name))
}

fn never_ignored(name: &str) -> bool {
    NEVER.iter().any(|m| m.is_match(name))
}

/// The keep layer: which top-level entries of a package copy survive.
pub struct KeepSet {
    files: Option<PatternList>,
    keep_node_modules: bool,
}

impl KeepSet {
    /// Build from a manifest's `files` list and bundled dependency set.
    ///
    /// Entries name top-level files or directories; a trailing `/**`
    /// or `/*` selects the directory itself.
    #[must_use]
    pub fn new(files: Option<&[String]>, bundled: &BTreeSet<String>) -> Self {
        let files = files.map(|entries| {
            let normalized: Vec<&str> = entries
                .iter()
                .map(|e| {
                    let e = e.trim_end_matches("/**").trim_end_matches("/*");
                    e.trim_end_matches('/')
                })
                .collect();
            PatternList::parse(normalized)
        });
        Self {
            files,
            keep_node_modules: !bundled.is_empty(),
        }
    }

    /// Whether a top-level entry is kept.
    ///
    /// Always-ignored names lose even against the keep layer; the
    /// never-ignored set and `package.json` always survive.
    #[must_use]
    pub fn keeps(&self, name: &str) -> bool {
        if always_ignored(name) {
            return false;
        }
        if never_ignored(name) {
            return true;
        }
        if name == "node_modules" {
            return self.keep_node_modules;
        }
        match &self.files {
            Some(list) => list.matched(name, name).unwrap_or(false),
            None => true,
        }
    }
}

/// The per-directory ignore layer.
#[derive(Default)]
pub struct DirIgnore {
    user: PatternList,
}

impl DirIgnore {
    /// Read the first existing ignore file in `dir`.
    ///
    /// # Errors
    /// IO failures other than not-found.
    pub fn load(dir: &Path) -> std::io::Result<Self> {
        for candidate in IGNORE_FILES {
            match fs::read_to_string(dir.join(candidate)) {
                Ok(content) => {
                    return Ok(Self {
                        user: PatternList::parse(content.lines()),
                    });
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(Self::default())
    }

    /// Whether the entry `name` at relative path `rel` is ignored.
    #[must_use]
    pub fn ignores(&self, rel: &str, name: &str) -> bool {
        if always_ignored(name) {
            return true;
        }
        if never_ignored(name) {
            return false;
        }
        self.user.matched(rel, name).unwrap_or(false)
    }
}
