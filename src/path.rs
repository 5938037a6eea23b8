//! Filesystem-like resolution of resource references against a base directory.
//!
//! Every key in the [`ContentStore`](crate::store::ContentStore) is a normalized path:
//! forward-slash separated, no leading slash, no `.`/`..` or empty segments. The functions
//! here are the only place such keys are produced from arbitrary references.

/// Resolve `reference` against the directory `base` and return a normalized store key.
///
/// `base` is always treated as a directory; callers holding a file path strip the file
/// name first with [`parent_dir`]. A reference starting with `/` ignores `base`.
/// `..` above the root is clamped rather than reported, so the result never starts
/// with a `..` segment. An empty reference yields an empty key.
pub fn resolve(reference: &str, base: &str) -> String {
    if reference.is_empty() {
        return String::new();
    }

    let (mut stack, relative) = match reference.strip_prefix('/') {
        Some(absolute) => (Vec::new(), absolute),
        None => (segments(base).collect::<Vec<_>>(), reference),
    };

    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }

    stack.join("/")
}

/// Directory portion of a normalized file path (`"site/index.html"` -> `"site"`).
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Drop any `?query` or `#fragment` suffix from a reference.
pub fn strip_suffixes(reference: &str) -> &str {
    match reference.find(['?', '#']) {
        Some(idx) => &reference[..idx],
        None => reference,
    }
}

/// Whether a reference points outside the archive: a URL scheme (`https:`, `data:`,
/// `blob:`, `mailto:` ...) or a protocol-relative `//host` reference.
pub fn is_external(reference: &str) -> bool {
    if reference.starts_with("//") {
        return true;
    }

    let Some(colon) = reference.find(':') else {
        return false;
    };
    let scheme = &reference[..colon];
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn segments(base: &str) -> impl Iterator<Item = &str> {
    base.split('/').filter(|s| !s.is_empty() && *s != ".")
}
