//! Path exclusion rules
//!
//! Decides which paths are never watched or copied. Matching is done per
//! path component: if any component names an excluded directory, the path
//! and everything beneath it is excluded.
//!
//! Some projects legitimately ship a directory whose name is otherwise
//! excluded (a bundled library carrying its own `vendor` folder, for
//! instance). Each rule therefore carries an allow-list of parent
//! sequences: when the excluded component is immediately preceded by one
//! of them, the component is kept.
//!
//! Paths are split on both `/` and `\`, so Windows-style relative paths
//! are handled the same on every platform.

use std::path::Path;

/// One exclusion rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExclusionRule {
    /// Component name that triggers exclusion
    pub name: &'static str,
    /// Parent sequences (slash separated) under which `name` is allowed
    pub allowed_under: &'static [&'static str],
}

/// The rule table applied by [`is_excluded`]
pub const EXCLUSION_RULES: &[ExclusionRule] = &[
    ExclusionRule {
        name: ".git",
        allowed_under: &[],
    },
    ExclusionRule {
        name: "vendor",
        allowed_under: &["thirdparty/php-peg/lib"],
    },
];

/// Returns true if `path` (absolute or relative) must not be mirrored
pub fn is_excluded(path: &Path) -> bool {
    is_excluded_with(path, EXCLUSION_RULES)
}

/// Same as [`is_excluded`] with an explicit rule table
pub fn is_excluded_with(path: &Path, rules: &[ExclusionRule]) -> bool {
    let text = path.to_string_lossy();
    let components = split_components(&text);

    components.iter().enumerate().any(|(index, component)| {
        rules
            .iter()
            .filter(|rule| rule.name == *component)
            .any(|rule| !is_allowed(&components[..index], rule))
    })
}

/// Checks whether the components preceding an excluded name end with one of
/// the rule's allowed parent sequences
fn is_allowed(parents: &[&str], rule: &ExclusionRule) -> bool {
    rule.allowed_under.iter().any(|allowed| {
        let allowed = split_components(allowed);
        parents.len() >= allowed.len() && parents[parents.len() - allowed.len()..] == allowed[..]
    })
}

fn split_components(text: &str) -> Vec<&str> {
    text.split(['/', '\\'])
        .filter(|c| !c.is_empty() && *c != ".")
        .collect()
}
