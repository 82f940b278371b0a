//! A MIME-type record: name, aliases, descriptions, glob/magic rules, and supertypes.

use std::collections::{BTreeMap, HashSet};

use crate::glob::Glob;
use crate::magic::Magic;
use crate::mime_name::Mime;
use crate::repository::Repository;

/// An XML-root hint (`<root-XML namespaceURI="…" localName="…"/>`), used by
/// consumers that sniff XML documents by their root element rather than by
/// byte content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlRootHint {
    pub namespace_uri: String,
    pub local_name: String,
}

/// A single loaded MIME-type record. Supertype edges are stored as bare
/// names and resolved lazily through a [`Repository`], so the record itself
/// never holds an owning reference into the graph it belongs to.
#[derive(Debug)]
pub struct MimeType {
    name: Mime,
    aliases: Vec<Mime>,
    /// Locale (`""` for the language-neutral default) to description text.
    comments: BTreeMap<String, String>,
    acronym: Option<String>,
    expanded_acronym: Option<String>,
    generic_icon: Option<String>,
    xml_roots: Vec<XmlRootHint>,
    super_types: Vec<Mime>,
    globs: Vec<Glob>,
    magics: Vec<Magic>,
}

impl MimeType {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: Mime,
        aliases: Vec<Mime>,
        comments: BTreeMap<String, String>,
        acronym: Option<String>,
        expanded_acronym: Option<String>,
        generic_icon: Option<String>,
        xml_roots: Vec<XmlRootHint>,
        super_types: Vec<Mime>,
        globs: Vec<Glob>,
        magics: Vec<Magic>,
    ) -> Self {
        MimeType {
            name,
            aliases,
            comments,
            acronym,
            expanded_acronym,
            generic_icon,
            xml_roots,
            super_types,
            globs,
            magics,
        }
    }

    pub fn name(&self) -> &Mime {
        &self.name
    }

    pub fn aliases(&self) -> &[Mime] {
        &self.aliases
    }

    pub fn comment(&self, locale: &str) -> Option<&str> {
        self.comments.get(locale).map(String::as_str)
    }

    pub fn default_comment(&self) -> Option<&str> {
        self.comment("")
    }

    /// All `(locale, text)` description pairs, in locale order.
    pub fn comments_iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.comments.iter()
    }

    pub fn acronym(&self) -> Option<&str> {
        self.acronym.as_deref()
    }

    pub fn expanded_acronym(&self) -> Option<&str> {
        self.expanded_acronym.as_deref()
    }

    pub fn generic_icon(&self) -> Option<&str> {
        self.generic_icon.as_deref()
    }

    pub fn xml_roots(&self) -> &[XmlRootHint] {
        &self.xml_roots
    }

    pub fn super_types(&self) -> &[Mime] {
        &self.super_types
    }

    pub fn globs(&self) -> &[Glob] {
        &self.globs
    }

    pub fn magics(&self) -> &[Magic] {
        &self.magics
    }

    /// True if any of this type's own globs match `filename`.
    pub fn matches_filename(&self, filename: &str) -> bool {
        self.globs.iter().any(|g| g.matches(filename))
    }

    /// True if any own magic matches, falling back to a transitively
    /// matching supertype when this type has none of its own. Guards against
    /// supertype cycles with a visited set, since a well-formed database is
    /// acyclic but a hand-built or corrupted one might not be.
    pub fn matches_content(&self, buffer: &[u8], n: usize, repo: &Repository) -> bool {
        self.matches_content_inner(buffer, n, repo, &mut HashSet::new())
    }

    fn matches_content_inner(
        &self,
        buffer: &[u8],
        n: usize,
        repo: &Repository,
        visited: &mut HashSet<String>,
    ) -> bool {
        if !visited.insert(self.name.as_str().to_string()) {
            return false;
        }
        if self.magics.iter().any(|m| m.matches(buffer, n)) {
            return true;
        }
        self.super_types.iter().any(|parent_name| {
            repo.lookup(parent_name.as_str())
                .map(|parent| parent.matches_content_inner(buffer, n, repo, visited))
                .unwrap_or(false)
        })
    }

    /// The highest-priority own [`Magic`] that matches and has priority at
    /// least `min_priority`. Falls back to the best match among supertypes
    /// when this type has no matching magic of its own. Ties within this
    /// type's own magics are broken by first-encountered order.
    pub fn best_magic<'a>(
        &'a self,
        buffer: &[u8],
        n: usize,
        min_priority: i32,
        repo: &'a Repository,
    ) -> Option<&'a Magic> {
        self.best_magic_inner(buffer, n, min_priority, repo, &mut HashSet::new())
    }

    fn best_magic_inner<'a>(
        &'a self,
        buffer: &[u8],
        n: usize,
        min_priority: i32,
        repo: &'a Repository,
        visited: &mut HashSet<String>,
    ) -> Option<&'a Magic> {
        if !visited.insert(self.name.as_str().to_string()) {
            return None;
        }
        let own_best = self
            .magics
            .iter()
            .filter(|m| i32::from(m.priority()) >= min_priority && m.matches(buffer, n))
            .max_by_key(|m| m.priority());
        if let Some(best) = own_best {
            return Some(best);
        }
        for parent_name in &self.super_types {
            if let Some(parent) = repo.lookup(parent_name.as_str()) {
                if let Some(best) =
                    parent.best_magic_inner(buffer, n, min_priority, repo, visited)
                {
                    return Some(best);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::magic::{MagicMatcher, MagicMatcherKind};

    fn mime(name: &str) -> Mime {
        Mime::new(name).unwrap()
    }

    fn magic_matching(byte: u8, priority: u8) -> Magic {
        let matcher = MagicMatcher::new(MagicMatcherKind::Byte, 0, 0, vec![byte], None, Vec::new())
            .unwrap();
        Magic::new(priority, vec![matcher]).unwrap()
    }

    fn mime_type(name: &str, globs: Vec<Glob>, magics: Vec<Magic>, supers: Vec<&str>) -> MimeType {
        MimeType::new(
            mime(name),
            Vec::new(),
            BTreeMap::new(),
            None,
            None,
            None,
            Vec::new(),
            supers.into_iter().map(mime).collect(),
            globs,
            magics,
        )
    }

    #[test]
    fn matches_filename_delegates_to_globs() {
        let t = mime_type(
            "text/plain",
            vec![Glob::with_defaults("*.txt")],
            Vec::new(),
            Vec::new(),
        );
        assert!(t.matches_filename("notes.txt"));
        assert!(!t.matches_filename("notes.bin"));
    }

    #[test]
    fn supertype_fallback_when_own_magics_empty() {
        let parent = mime_type("application/msword", Vec::new(), vec![magic_matching(0xD0, 50)], Vec::new());
        let child = mime_type("application/msword-template", Vec::new(), Vec::new(), vec!["application/msword"]);
        let repo = Repository::from_mime_types(vec![parent, child]).unwrap();
        let child_ref = repo.lookup("application/msword-template").unwrap();
        assert!(child_ref.matches_content(&[0xD0], 1, &repo));
        assert!(!child_ref.matches_content(&[0x00], 1, &repo));
    }

    #[test]
    fn cycle_guard_prevents_infinite_recursion() {
        let a = mime_type("a/a", Vec::new(), Vec::new(), vec!["a/b"]);
        let b = mime_type("a/b", Vec::new(), Vec::new(), vec!["a/a"]);
        let repo = Repository::from_mime_types(vec![a, b]).unwrap();
        let a_ref = repo.lookup("a/a").unwrap();
        // Should terminate rather than recurse forever, and report no match.
        assert!(!a_ref.matches_content(&[0x00], 1, &repo));
    }
}
