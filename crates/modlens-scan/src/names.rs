//! Filename normalisation and addon-pair heuristics

use std::collections::BTreeSet;
use std::path::Path;

/// Tokens describing a revision of a file rather than its identity
const VARIANT_TOKENS: &[&str] = &[
    "copy", "final", "latest", "new", "old", "updated", "update", "version", "ver",
];

/// Tokens marking a file as an extension of another
const ADDON_KEYWORDS: &[&str] = &[
    "addon",
    "add-on",
    "addons",
    "patch",
    "fix",
    "hotfix",
    "override",
    "compat",
    "compatibility",
];

/// Minimum stem length for the prefix rule
const MIN_PREFIX_LEN: usize = 3;

fn is_separator(c: char) -> bool {
    matches!(c, ' ' | '_' | '-' | '.')
}

fn is_version_token(token: &str) -> bool {
    let digits = token
        .strip_prefix("ver")
        .or_else(|| token.strip_prefix('v'))
        .unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Replace bracketed and parenthesised segments with separators
fn strip_brackets(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());
    let mut depth = 0usize;
    for c in stem.chars() {
        match c {
            '(' | '[' | '{' => {
                depth += 1;
                out.push(' ');
            }
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                out.push(' ');
            }
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Lowercased tokens of a stem, split on space, `_`, `-` and `.`
pub fn tokens(stem: &str) -> Vec<String> {
    stem.to_lowercase()
        .split(is_separator)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalise a file stem so revisions of the same mod compare equal
///
/// Bracketed segments, revision words and version numbers are dropped and the
/// remaining tokens joined with `_`. A stem with nothing left keeps its
/// lowercased form.
pub fn normalize_stem(stem: &str) -> String {
    let lowered = stem.to_lowercase();
    let stripped = strip_brackets(&lowered);
    let kept: Vec<&str> = stripped
        .split(|c: char| is_separator(c) || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .filter(|t| !VARIANT_TOKENS.contains(t) && !is_version_token(t))
        .collect();

    if kept.is_empty() {
        lowered.trim().to_string()
    } else {
        kept.join("_")
    }
}

/// Normalised stem of a file name (extension removed)
pub fn normalize_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map_or_else(|| file_name.to_string(), |s| s.to_string_lossy().into_owned());
    normalize_stem(&stem)
}

fn lower_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn has_keyword(tokens: &[String]) -> bool {
    tokens.iter().any(|t| ADDON_KEYWORDS.contains(&t.as_str()))
        || tokens.windows(2).any(|w| w[0] == "add" && w[1] == "on")
}

/// Whether `b` looks like an addon, patch or compatibility file for `a` (or
/// the other way round)
pub fn is_addon_pair(a: &Path, b: &Path) -> bool {
    let (stem_a, stem_b) = (lower_stem(a), lower_stem(b));
    if stem_a == stem_b {
        return false;
    }
    let (short, long, short_path, long_path) = if stem_a.len() <= stem_b.len() {
        (&stem_a, &stem_b, a, b)
    } else {
        (&stem_b, &stem_a, b, a)
    };

    if short.chars().count() >= MIN_PREFIX_LEN
        && let Some(rest) = long.strip_prefix(short.as_str())
    {
        let rest_tokens = tokens(rest);
        let at_boundary = rest.starts_with(is_separator);
        let same_parent = short_path.parent() == long_path.parent();
        let keyword_glued = ADDON_KEYWORDS.iter().any(|k| {
            rest.strip_prefix(k)
                .is_some_and(|after| after.is_empty() || after.starts_with(is_separator))
        });
        if (same_parent && at_boundary) || has_keyword(&rest_tokens) || keyword_glued {
            return true;
        }
    }

    let short_tokens: BTreeSet<String> = tokens(short).into_iter().collect();
    let long_tokens = tokens(long);
    if short_tokens.is_empty() {
        return false;
    }
    let long_set: BTreeSet<&String> = long_tokens.iter().collect();
    if !short_tokens.iter().all(|t| long_set.contains(t)) {
        return false;
    }
    let extra: Vec<String> = long_tokens
        .into_iter()
        .filter(|t| !short_tokens.contains(t))
        .collect();
    has_keyword(&extra)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_drops_revision_markers() {
        assert_eq!(normalize_name("CoolHair_v2.package"), "coolhair");
        assert_eq!(normalize_name("CoolHair (copy).package"), "coolhair");
        assert_eq!(normalize_name("cool-hair final 1.2.3.package"), "cool_hair");
        assert_eq!(normalize_name("[Creator] Sofa Set - NEW.package"), "sofa_set");
        assert_eq!(normalize_name("a (copy).package"), "a");
    }

    #[test]
    fn test_normalize_keeps_meaningful_tokens() {
        assert_eq!(normalize_name("Vintage Lamp Blue.package"), "vintage_lamp_blue");
        assert_eq!(normalize_stem("version"), "version");
        assert_eq!(normalize_stem("(2)"), "(2)");
    }

    #[test]
    fn test_version_tokens() {
        assert!(is_version_token("v2"));
        assert!(is_version_token("ver10"));
        assert!(is_version_token("2024"));
        assert!(!is_version_token("v"));
        assert!(!is_version_token("vest"));
    }

    #[test]
    fn test_addon_pair_by_keyword() {
        assert!(is_addon_pair(
            Path::new("/mods/base.package"),
            Path::new("/other/base_addon.package")
        ));
        assert!(is_addon_pair(
            Path::new("/a/MoreTraits Patch.package"),
            Path::new("/b/MoreTraits.package")
        ));
        assert!(is_addon_pair(
            Path::new("/a/careers.package"),
            Path::new("/b/careers add-on.package")
        ));
    }

    #[test]
    fn test_addon_pair_same_folder_prefix() {
        assert!(is_addon_pair(
            Path::new("/mods/hair.package"),
            Path::new("/mods/hair_recolors.package")
        ));
        assert!(!is_addon_pair(
            Path::new("/mods/hair.package"),
            Path::new("/elsewhere/hair_recolors.package")
        ));
    }

    #[test]
    fn test_addon_pair_token_superset() {
        assert!(is_addon_pair(
            Path::new("/x/sofa blue.package"),
            Path::new("/y/blue compat sofa.package")
        ));
        assert!(!is_addon_pair(
            Path::new("/x/sofa blue.package"),
            Path::new("/y/blue big sofa.package")
        ));
    }

    #[test]
    fn test_not_addon_pair() {
        assert!(!is_addon_pair(
            Path::new("/a/same.package"),
            Path::new("/b/same.package")
        ));
        assert!(!is_addon_pair(
            Path::new("/a/abc.package"),
            Path::new("/b/abcdef.package")
        ));
        assert!(!is_addon_pair(
            Path::new("/a/lamp.package"),
            Path::new("/b/table.package")
        ));
    }

    #[test]
    fn test_glued_keyword_needs_token_end() {
        assert!(is_addon_pair(
            Path::new("/a/lamp.package"),
            Path::new("/b/lampfix.package")
        ));
        assert!(is_addon_pair(
            Path::new("/a/lamp.package"),
            Path::new("/b/lamppatch_v2.package")
        ));
        assert!(!is_addon_pair(
            Path::new("/a/lamp.package"),
            Path::new("/b/lampfixtures.package")
        ));
        assert!(!is_addon_pair(
            Path::new("/a/desk.package"),
            Path::new("/b/deskpatchwork.package")
        ));
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(stem in "[A-Za-z0-9 _.()\\[\\]-]{0,40}") {
            let once = normalize_stem(&stem);
            prop_assert_eq!(normalize_stem(&once), once);
        }
    }
}
