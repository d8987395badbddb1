//! Path patterns — compile a route pattern once, match pathnames against it many times.
//!
//! | Pattern              | Example match              | Captured params                 |
//! |----------------------|----------------------------|---------------------------------|
//! | `/users`             | `/users`, `/Users/`        | *(none)*                        |
//! | `/users/:id`         | `/users/42`                | `id → "42"`                     |
//! | `/files/*`           | `/files/docs/readme.txt`   | `wildcard → "docs/readme.txt"`  |
//!
//! With the default [`MatchOptions`] matching ignores case, tolerates a trailing slash and
//! accepts any pathname that *starts* with the pattern at a segment boundary, so `/users`
//! also matches `/users/42`. Which of several matching routes wins is decided by the
//! dispatcher (declaration order), never here.

use percent_encoding::percent_decode_str;

use crate::context::Params;
use crate::error::ConfigError;

/// Name under which a trailing `*` stores the rest of the path.
pub const WILDCARD_PARAM: &str = "wildcard";

/// How patterns are matched against pathnames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchOptions {
    /// Compare static segments case-sensitively.
    pub sensitive: bool,
    /// Treat a trailing slash as significant.
    pub strict: bool,
    /// Require the pattern to consume the whole pathname.
    pub end: bool,
}

impl MatchOptions {
    /// Case-insensitive, trailing slash optional, whole pathname required.
    pub fn exact() -> Self {
        Self {
            end: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Parameter(String),
    Wildcard,
}

/// A compiled route pattern.
///
/// # Examples
///
/// ```
/// use rttp_router::router::pattern::{compile, MatchOptions};
///
/// let matcher = compile("/foos/:fooId", MatchOptions::default()).unwrap();
///
/// let params = matcher.matches("/foos/1").unwrap();
/// assert_eq!(params.get("fooId"), Some("1"));
///
/// // Non-end matching: a longer pathname still matches.
/// assert!(matcher.matches("/foos/1/bars/2").is_some());
/// assert!(matcher.matches("/bars/1").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct PathMatcher {
    pattern: String,
    segments: Vec<Segment>,
    trailing_slash: bool,
    options: MatchOptions,
}

/// Compiles `pattern` into a [`PathMatcher`].
///
/// A pattern starts with `/` and is made of static segments, `:name` captures (letters,
/// digits and `_`) and optionally a final `*`.
///
/// # Errors
///
/// - [`ConfigError::InvalidPattern`] — the pattern is malformed.
/// - [`ConfigError::DuplicateParam`] — the same `:name` appears twice.
pub fn compile(pattern: &str, options: MatchOptions) -> Result<PathMatcher, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidPattern {
        pattern: pattern.to_owned(),
        reason: reason.to_owned(),
    };

    let body = pattern
        .strip_prefix('/')
        .ok_or_else(|| invalid("must start with `/`"))?;
    let (body, trailing_slash) = match body.strip_suffix('/') {
        Some(stripped) => (stripped, true),
        None => (body, false),
    };

    let mut segments = Vec::new();
    if !body.is_empty() {
        for raw in body.split('/') {
            if matches!(segments.last(), Some(Segment::Wildcard)) {
                return Err(invalid("`*` must be the last segment"));
            }
            let segment = if raw.is_empty() {
                return Err(invalid("empty segment"));
            } else if raw == "*" {
                Segment::Wildcard
            } else if let Some(name) = raw.strip_prefix(':') {
                if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(invalid("parameter names may only use letters, digits and `_`"));
                }
                if segments.contains(&Segment::Parameter(name.to_owned())) {
                    return Err(ConfigError::DuplicateParam {
                        pattern: pattern.to_owned(),
                        name: name.to_owned(),
                    });
                }
                Segment::Parameter(name.to_owned())
            } else if raw.contains(['*', ':']) {
                return Err(invalid("`:` and `*` must start a segment of their own"));
            } else {
                Segment::Static(raw.to_owned())
            };
            segments.push(segment);
        }
    }

    Ok(PathMatcher {
        pattern: pattern.to_owned(),
        segments,
        trailing_slash,
        options,
    })
}

/// Returns `true` if `pattern` contains a `:name` capture or a `*` wildcard.
pub fn has_captures(pattern: &str) -> bool {
    pattern
        .split('/')
        .any(|segment| segment.starts_with(':') || segment.contains('*'))
}

impl PathMatcher {
    /// The pattern this matcher was compiled from.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Names of the parameters this pattern captures, in order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Parameter(name) => Some(name.as_str()),
            Segment::Wildcard => Some(WILDCARD_PARAM),
            Segment::Static(_) => None,
        })
    }

    /// Matches `pathname`, returning the captured parameters or `None` when it does not
    /// match. A match without captures is an empty [`Params`], not `None`.
    pub fn matches(&self, pathname: &str) -> Option<Params> {
        let rest = pathname.strip_prefix('/')?;
        let had_trailing_slash = rest.ends_with('/');
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        let parts: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('/').collect()
        };

        let mut params = Params::new();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Static(expected) => {
                    let part = parts.get(i)?;
                    let equal = if self.options.sensitive {
                        *part == expected.as_str()
                    } else {
                        part.eq_ignore_ascii_case(expected)
                    };
                    if !equal {
                        return None;
                    }
                }
                Segment::Parameter(name) => {
                    let part = parts.get(i).filter(|part| !part.is_empty())?;
                    params.insert(name.clone(), decode(part));
                }
                Segment::Wildcard => {
                    let remainder = parts.get(i..).unwrap_or_default().join("/");
                    params.insert(WILDCARD_PARAM, decode(&remainder));
                    return self.slash_ok(had_trailing_slash, true).then_some(params);
                }
            }
        }

        let consumed_all = parts.len() == self.segments.len();
        if self.options.end && !consumed_all {
            return None;
        }
        self.slash_ok(had_trailing_slash, consumed_all)
            .then_some(params)
    }

    // In strict mode a trailing slash on the pattern must be present in the pathname, and
    // an end-anchored pattern without one rejects it.
    fn slash_ok(&self, had_trailing_slash: bool, consumed_all: bool) -> bool {
        if !self.options.strict || !consumed_all {
            return true;
        }
        if self.trailing_slash {
            had_trailing_slash
        } else {
            !(self.options.end && had_trailing_slash)
        }
    }
}

fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loose(pattern: &str) -> PathMatcher {
        compile(pattern, MatchOptions::default()).unwrap()
    }

    fn exact(pattern: &str) -> PathMatcher {
        compile(pattern, MatchOptions::exact()).unwrap()
    }

    // ── compile ───────────────────────────────────────────────────────────────

    #[test]
    fn compile_root() {
        let m = loose("/");
        assert_eq!(m.param_names().count(), 0);
        assert!(m.matches("/").is_some());
    }

    #[test]
    fn compile_collects_param_names() {
        let m = loose("/foos/:fooId/bars/:barId");
        assert_eq!(m.param_names().collect::<Vec<_>>(), vec!["fooId", "barId"]);
        assert_eq!(m.pattern(), "/foos/:fooId/bars/:barId");
    }

    #[test]
    fn compile_rejects_malformed_patterns() {
        for pattern in ["", "foo", "/foo//bar", "/:", "/:bad-name", "/*/more", "/a*b", "/x:y"] {
            assert!(
                matches!(
                    compile(pattern, MatchOptions::default()),
                    Err(ConfigError::InvalidPattern { .. })
                ),
                "{pattern} should be rejected"
            );
        }
    }

    #[test]
    fn compile_rejects_duplicate_params() {
        let err = compile("/a/:id/b/:id", MatchOptions::default()).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateParam { name, .. } if name == "id"));
    }

    #[test]
    fn has_captures_detects_params_and_wildcards() {
        assert!(has_captures("/a/:id"));
        assert!(has_captures("/a/*"));
        assert!(!has_captures("/a/b"));
    }

    // ── matches ───────────────────────────────────────────────────────────────

    #[test]
    fn static_match_and_miss() {
        let m = loose("/users");
        assert!(m.matches("/users").unwrap().is_empty());
        assert!(m.matches("/posts").is_none());
        assert!(m.matches("users").is_none());
    }

    #[test]
    fn matching_ignores_case_by_default() {
        assert!(loose("/Users").matches("/users").is_some());
        let sensitive = compile(
            "/Users",
            MatchOptions {
                sensitive: true,
                ..MatchOptions::default()
            },
        )
        .unwrap();
        assert!(sensitive.matches("/users").is_none());
        assert!(sensitive.matches("/Users").is_some());
    }

    #[test]
    fn trailing_slash_is_optional_by_default() {
        assert!(loose("/users").matches("/users/").is_some());
        assert!(loose("/users/").matches("/users").is_some());
    }

    #[test]
    fn non_end_matches_prefix_at_segment_boundary() {
        let m = loose("/foo");
        assert!(m.matches("/foo/bar").is_some());
        assert!(m.matches("/foobar").is_none());
    }

    #[test]
    fn end_anchored_requires_whole_path() {
        let m = exact("/foo");
        assert!(m.matches("/foo").is_some());
        assert!(m.matches("/foo/").is_some());
        assert!(m.matches("/foo/bar").is_none());
    }

    #[test]
    fn params_capture_one_segment_each() {
        let params = exact("/foos/:fooId/bars/:barId")
            .matches("/foos/1/bars/2")
            .unwrap();
        assert_eq!(params.get("fooId"), Some("1"));
        assert_eq!(params.get("barId"), Some("2"));
        assert!(exact("/foos/:fooId").matches("/foos").is_none());
        assert!(exact("/foos/:fooId").matches("/foos/1/bars").is_none());
    }

    #[test]
    fn params_are_percent_decoded() {
        let params = loose("/tags/:tag").matches("/tags/caf%C3%A9").unwrap();
        assert_eq!(params.get("tag"), Some("café"));
    }

    #[test]
    fn empty_segment_does_not_fill_param() {
        assert!(loose("/a/:id").matches("/a//b").is_none());
    }

    #[test]
    fn wildcard_takes_the_rest() {
        let m = loose("/files/*");
        let params = m.matches("/files/docs/readme.txt").unwrap();
        assert_eq!(params.get(WILDCARD_PARAM), Some("docs/readme.txt"));
        assert_eq!(m.matches("/files").unwrap().get(WILDCARD_PARAM), Some(""));
        assert!(m.matches("/other/readme.txt").is_none());
    }

    #[test]
    fn root_wildcard_matches_everything() {
        let m = exact("/*");
        for path in ["/", "/a", "/a/b/c", "/version.json"] {
            assert!(m.matches(path).is_some(), "{path}");
        }
    }

    #[test]
    fn strict_trailing_slash() {
        let strict = MatchOptions {
            strict: true,
            end: true,
            ..MatchOptions::default()
        };
        let with_slash = compile("/dir/", strict).unwrap();
        assert!(with_slash.matches("/dir/").is_some());
        assert!(with_slash.matches("/dir").is_none());

        let without = compile("/dir", strict).unwrap();
        assert!(without.matches("/dir").is_some());
        assert!(without.matches("/dir/").is_none());
    }
}
