//! The in-memory collection of [`MimeType`]s plus the indices and detection
//! algorithms that operate over them.

use std::collections::HashMap;
use std::path::Path;

use log::warn;

use crate::error::Result;
use crate::glob::contains_glob_metacharacter;
use crate::mime_type::MimeType;

/// A (mime-type index, glob index within that type's `globs()`) pair, the
/// unit the glob indices are built from.
type GlobRef = (usize, usize);

/// Collection of [`MimeType`] records plus four derived indices over their
/// globs, and the `max_test_bytes` derived from every magic's reach. Built
/// once, then read-only: see [`crate::singleton`] for the process-wide
/// build-once/read-many lifecycle this is designed for.
#[derive(Debug)]
pub struct Repository {
    mime_types: Vec<MimeType>,
    name_index: HashMap<String, usize>,
    literal_glob_index: HashMap<String, Vec<GlobRef>>,
    extension_glob_index: HashMap<String, Vec<GlobRef>>,
    other_globs: Vec<GlobRef>,
    max_test_bytes: usize,
}

impl Repository {
    /// Builds a repository from an already-parsed list of mime types,
    /// computing indices and `max_test_bytes`, eagerly compiling every glob's
    /// regex, and logging (not failing) on alias/name collisions.
    pub fn from_mime_types(mime_types: Vec<MimeType>) -> Result<Repository> {
        let mut name_index = HashMap::new();
        let mut literal_glob_index: HashMap<String, Vec<GlobRef>> = HashMap::new();
        let mut extension_glob_index: HashMap<String, Vec<GlobRef>> = HashMap::new();
        let mut other_globs = Vec::new();
        let mut max_test_bytes: usize = 0;

        for (mime_idx, mt) in mime_types.iter().enumerate() {
            insert_name(&mut name_index, mt.name().as_str(), mime_idx);
            for alias in mt.aliases() {
                insert_name(&mut name_index, alias.as_str(), mime_idx);
            }

            for (glob_idx, glob) in mt.globs().iter().enumerate() {
                glob.compile()?;
                classify_glob(
                    glob.pattern(),
                    (mime_idx, glob_idx),
                    &mut literal_glob_index,
                    &mut extension_glob_index,
                    &mut other_globs,
                );
            }

            for magic in mt.magics() {
                max_test_bytes = max_test_bytes.max(magic.max_reach() as usize);
            }
        }

        Ok(Repository {
            mime_types,
            name_index,
            literal_glob_index,
            extension_glob_index,
            other_globs,
            max_test_bytes,
        })
    }

    pub fn mime_types(&self) -> &[MimeType] {
        &self.mime_types
    }

    /// The fewest leading bytes a caller must read to make every magic rule
    /// in this repository fully evaluable.
    pub fn max_test_bytes(&self) -> usize {
        self.max_test_bytes
    }

    /// Case-insensitive lookup by name or alias.
    pub fn lookup(&self, name: &str) -> Option<&MimeType> {
        self.name_index
            .get(&name.to_lowercase())
            .map(|&idx| &self.mime_types[idx])
    }

    /// Resolves candidates purely from `path`'s basename, via the literal,
    /// extension, and residual glob indices, applying the weight/length
    /// arbitration rule at each step.
    pub fn detect_by_filename(&self, path: &str) -> Vec<&MimeType> {
        let fname = basename_lower(path);
        let mut arb = Arbitration::new();

        if let Some(candidates) = self.literal_glob_index.get(fname.as_str()) {
            for &(mime_idx, glob_idx) in candidates {
                self.feed(&mut arb, mime_idx, glob_idx);
            }
        }

        for (i, c) in fname.char_indices() {
            if c != '.' {
                continue;
            }
            let ext = &fname[i + 1..];
            if ext.is_empty() {
                continue;
            }
            if let Some(candidates) = self.extension_glob_index.get(ext) {
                for &(mime_idx, glob_idx) in candidates {
                    self.feed(&mut arb, mime_idx, glob_idx);
                }
            }
        }

        for &(mime_idx, glob_idx) in &self.other_globs {
            let glob = &self.mime_types[mime_idx].globs()[glob_idx];
            if glob.matches(&fname) {
                self.feed(&mut arb, mime_idx, glob_idx);
            }
        }

        arb.winners.into_iter().map(|idx| &self.mime_types[idx]).collect()
    }

    fn feed(&self, arb: &mut Arbitration, mime_idx: usize, glob_idx: usize) {
        let glob = &self.mime_types[mime_idx].globs()[glob_idx];
        arb.consider(mime_idx, i32::from(glob.weight()), glob.pattern().len());
    }

    /// Scans every mime type in insertion order, testing only magics whose
    /// priority is at least the current best, and arbitrating on priority
    /// alone (equal priority accumulates, higher priority replaces).
    pub fn detect_by_content(&self, buffer: &[u8], n: usize) -> Vec<&MimeType> {
        let mut winners: Vec<usize> = Vec::new();
        let mut best_priority: i32 = -1;

        for (mime_idx, mt) in self.mime_types.iter().enumerate() {
            let mt_best = mt
                .magics()
                .iter()
                .filter(|m| i32::from(m.priority()) >= best_priority)
                .filter(|m| m.matches(buffer, n))
                .map(|m| i32::from(m.priority()))
                .max();

            let Some(w) = mt_best else { continue };

            if winners.is_empty() || w > best_priority {
                winners.clear();
                winners.push(mime_idx);
                best_priority = w;
            } else if w == best_priority && !winners.contains(&mime_idx) {
                winners.push(mime_idx);
            }
        }

        winners.into_iter().map(|idx| &self.mime_types[idx]).collect()
    }

    /// Combines filename and content evidence: a single filename hit short
    /// circuits unless `always_check_magic`; multiple filename hits are
    /// confirmed (and possibly narrowed) by magic; with no confirmed winner,
    /// a lone filename hit is still returned as the best available signal.
    pub fn detect(
        &self,
        filename: Option<&str>,
        buffer: &[u8],
        n: usize,
        always_check_magic: bool,
    ) -> Vec<&MimeType> {
        let name_list = match filename {
            Some(f) => self.detect_by_filename(f),
            None => Vec::new(),
        };

        if name_list.is_empty() {
            return self.detect_by_content(buffer, n);
        }
        if name_list.len() == 1 && !always_check_magic {
            return name_list;
        }

        let mut confirmed: Vec<&MimeType> = Vec::new();
        let mut best_priority: i32 = -1;

        for &t in &name_list {
            if let Some(magic) = t.best_magic(buffer, n, best_priority, self) {
                let w = i32::from(magic.priority());
                if confirmed.is_empty() || w > best_priority {
                    confirmed.clear();
                    confirmed.push(t);
                    best_priority = w;
                } else if w == best_priority
                    && !confirmed.iter().any(|x| std::ptr::eq(*x, t))
                {
                    confirmed.push(t);
                }
            }
        }

        if !confirmed.is_empty() {
            return confirmed;
        }
        if name_list.len() == 1 {
            return name_list;
        }
        Vec::new()
    }
}

/// Weight/length arbitration shared by every glob-index probe in
/// `detect_by_filename`: higher weight wins outright, equal weight defers to
/// the longer pattern, equal weight and length accumulate distinct types.
struct Arbitration {
    winners: Vec<usize>,
    best_weight: i32,
    best_length: usize,
}

impl Arbitration {
    fn new() -> Self {
        Arbitration {
            winners: Vec::new(),
            best_weight: -1,
            best_length: 0,
        }
    }

    fn consider(&mut self, mime_idx: usize, weight: i32, length: usize) {
        if self.winners.is_empty() {
            self.winners.push(mime_idx);
            self.best_weight = weight;
            self.best_length = length;
        } else if weight > self.best_weight {
            self.winners.clear();
            self.winners.push(mime_idx);
            self.best_weight = weight;
            self.best_length = length;
        } else if weight == self.best_weight {
            if length > self.best_length {
                self.winners.clear();
                self.winners.push(mime_idx);
                self.best_length = length;
            } else if length == self.best_length && !self.winners.contains(&mime_idx) {
                self.winners.push(mime_idx);
            }
        }
    }
}

fn insert_name(index: &mut HashMap<String, usize>, name: &str, mime_idx: usize) {
    let key = name.to_lowercase();
    if let Some(&existing) = index.get(&key) {
        if existing != mime_idx {
            warn!("mime name/alias collision on '{key}', later entry wins");
        }
    }
    index.insert(key, mime_idx);
}

fn classify_glob(
    pattern: &str,
    ref_: GlobRef,
    literal: &mut HashMap<String, Vec<GlobRef>>,
    extension: &mut HashMap<String, Vec<GlobRef>>,
    other: &mut Vec<GlobRef>,
) {
    if let Some(rest) = pattern.strip_prefix("*.") {
        if !rest.is_empty() && !contains_glob_metacharacter(rest) {
            extension.entry(rest.to_string()).or_default().push(ref_);
            return;
        }
    }
    if !contains_glob_metacharacter(pattern) {
        literal.entry(pattern.to_string()).or_default().push(ref_);
    } else {
        other.push(ref_);
    }
}

fn basename_lower(path: &str) -> String {
    let base = Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path);
    base.to_lowercase()
}
