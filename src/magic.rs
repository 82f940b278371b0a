//! Typed byte-pattern matching over a file's leading bytes.

use once_cell::sync::OnceCell;

use crate::defaults::DEFAULT_MAGIC_PRIORITY;
use crate::error::{Error, Result};

/// The eight pattern types the freedesktop `match/@type` grammar supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagicMatcherKind {
    String,
    Byte,
    Host16,
    Host32,
    Big16,
    Big32,
    Little16,
    Little32,
}

impl MagicMatcherKind {
    /// Fixed byte width for numeric kinds; `None` for `String`, which carries
    /// an arbitrary-length literal.
    fn fixed_width(self) -> Option<usize> {
        match self {
            MagicMatcherKind::String => None,
            MagicMatcherKind::Byte => Some(1),
            MagicMatcherKind::Host16 | MagicMatcherKind::Big16 | MagicMatcherKind::Little16 => {
                Some(2)
            }
            MagicMatcherKind::Host32 | MagicMatcherKind::Big32 | MagicMatcherKind::Little32 => {
                Some(4)
            }
        }
    }

    /// Whether this kind, on the current host, reads its stored big-endian
    /// bytes in reverse order. `host16`/`host32` flip based on the native
    /// byte order; the rest are fixed by name.
    fn reversed_on_this_host(self) -> bool {
        match self {
            MagicMatcherKind::Little16 | MagicMatcherKind::Little32 => true,
            MagicMatcherKind::Host16 | MagicMatcherKind::Host32 => {
                cfg!(target_endian = "little")
            }
            _ => false,
        }
    }
}

/// One node in the magic matcher tree. Numeric values are always stored
/// big-endian in `value`/`mask`, regardless of the node's declared endianness;
/// `matches` reverses the comparison order for little/host-on-little-endian
/// kinds instead of re-encoding the stored bytes.
#[derive(Debug)]
pub struct MagicMatcher {
    kind: MagicMatcherKind,
    offset_begin: u32,
    offset_end: u32,
    value: Vec<u8>,
    mask: Option<Vec<u8>>,
    sub_matchers: Vec<MagicMatcher>,
    max_reach: OnceCell<u32>,
}

impl MagicMatcher {
    pub fn new(
        kind: MagicMatcherKind,
        offset_begin: u32,
        offset_end: u32,
        value: Vec<u8>,
        mask: Option<Vec<u8>>,
        sub_matchers: Vec<MagicMatcher>,
    ) -> Result<Self> {
        if offset_begin > offset_end {
            return Err(Error::MalformedDatabase(format!(
                "magic offset range inverted: {offset_begin}:{offset_end}"
            )));
        }
        if value.is_empty() {
            return Err(Error::MalformedDatabase(
                "magic match value must not be empty".into(),
            ));
        }
        if let Some(width) = kind.fixed_width() {
            if value.len() != width {
                return Err(Error::MalformedDatabase(format!(
                    "magic value length {} does not match type width {width}",
                    value.len()
                )));
            }
        }
        if let Some(mask) = &mask {
            if mask.len() != value.len() {
                return Err(Error::MalformedDatabase(
                    "magic mask length must match value length".into(),
                ));
            }
        }
        Ok(MagicMatcher {
            kind,
            offset_begin,
            offset_end,
            value,
            mask,
            sub_matchers,
            max_reach: OnceCell::new(),
        })
    }

    pub fn kind(&self) -> MagicMatcherKind {
        self.kind
    }

    pub fn offset_begin(&self) -> u32 {
        self.offset_begin
    }

    pub fn offset_end(&self) -> u32 {
        self.offset_end
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn mask(&self) -> Option<&[u8]> {
        self.mask.as_deref()
    }

    pub fn sub_matchers(&self) -> &[MagicMatcher] {
        &self.sub_matchers
    }

    /// `offsetEnd + value.len()`, maximized recursively over the subtree.
    /// Computed once and cached, since the tree is immutable post-build.
    pub fn max_reach(&self) -> u32 {
        *self.max_reach.get_or_init(|| {
            let own = self.offset_end + self.value.len() as u32;
            self.sub_matchers
                .iter()
                .map(MagicMatcher::max_reach)
                .fold(own, u32::max)
        })
    }

    /// Tests this node (and, on success, its children) against the first `n`
    /// valid bytes of `buffer`. `n` must not exceed `buffer.len()`.
    pub fn matches(&self, buffer: &[u8], n: usize) -> bool {
        debug_assert!(n <= buffer.len());
        if !self.own_test_matches(buffer, n) {
            return false;
        }
        if self.sub_matchers.is_empty() {
            return true;
        }
        self.sub_matchers
            .iter()
            .any(|child| child.matches(buffer, n))
    }

    fn own_test_matches(&self, buffer: &[u8], n: usize) -> bool {
        let width = self.value.len();
        if width == 0 || width > n {
            return false;
        }
        let last_offset = (n - width) as u32;
        let end = self.offset_end.min(last_offset);
        if self.offset_begin > end {
            return false;
        }
        let reversed = self.kind.reversed_on_this_host();
        for offset in self.offset_begin..=end {
            let start = offset as usize;
            let window = &buffer[start..start + width];
            if self.window_matches(window, reversed) {
                return true;
            }
        }
        false
    }

    fn window_matches(&self, window: &[u8], reversed: bool) -> bool {
        for i in 0..self.value.len() {
            let idx = if reversed { self.value.len() - 1 - i } else { i };
            let byte = window[idx];
            let expected = self.value[i];
            let masked = match &self.mask {
                Some(mask) => byte & mask[i],
                None => byte,
            };
            if masked != expected {
                return false;
            }
        }
        true
    }
}

/// An ordered, non-empty bag of top-level [`MagicMatcher`]s sharing a priority.
#[derive(Debug)]
pub struct Magic {
    priority: u8,
    matchers: Vec<MagicMatcher>,
}

impl Magic {
    pub fn new(priority: u8, matchers: Vec<MagicMatcher>) -> Result<Self> {
        if matchers.is_empty() {
            return Err(Error::MalformedDatabase(
                "magic element must have at least one match".into(),
            ));
        }
        Ok(Magic { priority, matchers })
    }

    pub fn with_default_priority(matchers: Vec<MagicMatcher>) -> Result<Self> {
        Magic::new(DEFAULT_MAGIC_PRIORITY, matchers)
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn matchers(&self) -> &[MagicMatcher] {
        &self.matchers
    }

    /// Any top-level matcher matching is sufficient; priority is advisory
    /// only here, the detector applies it.
    pub fn matches(&self, buffer: &[u8], n: usize) -> bool {
        self.matchers.iter().any(|m| m.matches(buffer, n))
    }

    pub fn max_reach(&self) -> u32 {
        self.matchers
            .iter()
            .map(MagicMatcher::max_reach)
            .max()
            .unwrap_or(0)
    }
}
