//! A single filename glob pattern with a weight and a case-sensitivity flag.

use once_cell::sync::OnceCell;
use regex::{Regex, RegexBuilder};

use crate::defaults::{DEFAULT_GLOB_CASE_SENSITIVE, DEFAULT_GLOB_WEIGHT};
use crate::error::Result;

/// Characters that make a glob pattern something other than a literal
/// filename or a plain `*.ext` suffix. Mirrors the freedesktop classification
/// rule used to bucket patterns into the repository's three glob indices.
const GLOB_METACHARACTERS: [char; 8] = ['*', '?', '{', '}', '!', '[', ']', '^'];

/// True if `pattern` contains any character that disqualifies it from the
/// literal or extension glob indices.
pub fn contains_glob_metacharacter(pattern: &str) -> bool {
    pattern.contains(&GLOB_METACHARACTERS[..])
}

/// One filename pattern belonging to a [`crate::mime_type::MimeType`].
#[derive(Debug)]
pub struct Glob {
    pattern: String,
    weight: u8,
    case_sensitive: bool,
    compiled: OnceCell<Regex>,
}

impl Glob {
    pub fn new(pattern: impl Into<String>, weight: u8, case_sensitive: bool) -> Self {
        Glob {
            pattern: pattern.into(),
            weight,
            case_sensitive,
            compiled: OnceCell::new(),
        }
    }

    pub fn with_defaults(pattern: impl Into<String>) -> Self {
        Glob::new(pattern, DEFAULT_GLOB_WEIGHT, DEFAULT_GLOB_CASE_SENSITIVE)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn weight(&self) -> u8 {
        self.weight
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Eagerly compiles the backing regex. Called during repository build so
    /// no runtime mutation of a `Glob` is ever needed once the repository is
    /// handed to readers.
    pub fn compile(&self) -> Result<()> {
        self.regex().map(|_| ())
    }

    fn regex(&self) -> Result<&Regex> {
        if let Some(r) = self.compiled.get() {
            return Ok(r);
        }
        let source = glob_to_regex(&self.pattern);
        let regex = RegexBuilder::new(&source)
            .case_insensitive(!self.case_sensitive)
            .build()?;
        Ok(self.compiled.get_or_init(|| regex))
    }

    /// Tests the pattern against a candidate filename. Empty pattern or
    /// filename always fails; matching is whole-string (anchored).
    pub fn matches(&self, filename: &str) -> bool {
        if self.pattern.is_empty() || filename.is_empty() {
            return false;
        }
        match self.regex() {
            Ok(re) => re.is_match(filename),
            Err(_) => false,
        }
    }
}

/// Converts a shell-style glob pattern into an anchored regex source string.
/// `*` becomes `.*`, `?` becomes `.`, bracket expressions `[...]` are passed
/// through untouched (including a leading `!` negation, which is rewritten to
/// the regex convention `^`), and every other character is escaped.
pub fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                let start = i;
                i += 1;
                if i < chars.len() && chars[i] == '!' {
                    i += 1;
                }
                while i < chars.len() && chars[i] != ']' {
                    i += 1;
                }
                if i >= chars.len() {
                    // Unterminated bracket expression: treat '[' as a literal.
                    out.push_str(&regex::escape("["));
                    i = start;
                } else {
                    out.push('[');
                    let mut j = start + 1;
                    if chars.get(j) == Some(&'!') {
                        out.push('^');
                        j += 1;
                    }
                    while j < i {
                        out.push(chars[j]);
                        j += 1;
                    }
                    out.push(']');
                }
            }
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }

    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_any_suffix() {
        let g = Glob::with_defaults("*.txt");
        assert!(g.matches("notes.txt"));
        assert!(!g.matches("notes.txt.bak"));
    }

    #[test]
    fn question_mark_matches_one_char() {
        let g = Glob::with_defaults("file?.log");
        assert!(g.matches("file1.log"));
        assert!(!g.matches("file12.log"));
    }

    #[test]
    fn case_insensitive_by_default() {
        let g = Glob::with_defaults("*.PNG");
        assert!(g.matches("photo.png"));
        assert!(g.matches("photo.PNG"));
    }

    #[test]
    fn case_sensitive_flag_is_honored() {
        let g = Glob::new("*.PNG", 50, true);
        assert!(g.matches("photo.PNG"));
        assert!(!g.matches("photo.png"));
    }

    #[test]
    fn empty_pattern_or_filename_never_matches() {
        assert!(!Glob::with_defaults("").matches("anything"));
        assert!(!Glob::with_defaults("*.txt").matches(""));
    }

    #[test]
    fn bracket_expression_is_preserved() {
        let g = Glob::with_defaults("file[0-9].txt");
        assert!(g.matches("file5.txt"));
        assert!(!g.matches("fileA.txt"));
    }

    #[test]
    fn metacharacter_detection() {
        assert!(!contains_glob_metacharacter("core"));
        assert!(contains_glob_metacharacter("core.*"));
        assert!(contains_glob_metacharacter("a[bc]"));
    }
}
