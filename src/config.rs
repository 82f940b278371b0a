//! Recognized configuration options. Loading a config file format (TOML,
//! INI, …) is out of scope for this crate; callers build a [`Config`]
//! programmatically or start from [`Config::default`].

use std::path::PathBuf;

use crate::defaults::{DEFAULT_BINARY_MIME, DEFAULT_TEXT_MIME};

/// Options recognized by the repository build/rebuild path and the
/// [`crate::detector`] facade.
#[derive(Debug, Clone)]
pub struct Config {
    /// Ignore any cache and rebuild from the XML database.
    pub rebuild: bool,
    /// Persist the cache after a rebuild. Defaults to `true`, but only takes
    /// effect when a rebuild actually happens.
    pub save: bool,
    /// The detector's default for "always confirm filename hits by magic".
    pub check_magic: bool,
    /// Where to store/load the binary cache. `${user.home}` is substituted
    /// with the current user's home directory.
    pub serialization: Option<String>,
    /// Name, path, or URL of the XML database to load.
    pub database: Option<String>,
    /// Fallback MIME type for content that cannot be identified as text.
    pub default_binary: String,
    /// Fallback MIME type for content that cannot be identified but looks
    /// textual.
    pub default_text: String,
    /// When `true`, an alias colliding with an existing name/alias is a hard
    /// `MalformedDatabase` error instead of a logged warning with
    /// last-loaded-wins semantics. See the "Open Questions" resolution for
    /// alias collisions in DESIGN.md.
    pub strict_aliases: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rebuild: false,
            save: true,
            check_magic: false,
            serialization: None,
            database: None,
            default_binary: DEFAULT_BINARY_MIME.to_string(),
            default_text: DEFAULT_TEXT_MIME.to_string(),
            strict_aliases: false,
        }
    }
}

impl Config {
    /// Resolves `${user.home}` in `serialization` against the `HOME`
    /// (or `USERPROFILE` on Windows) environment variable.
    pub fn resolved_serialization_path(&self) -> Option<PathBuf> {
        let raw = self.serialization.as_ref()?;
        if let Some(rest) = raw.strip_prefix("${user.home}") {
            let home = std::env::var("HOME")
                .or_else(|_| std::env::var("USERPROFILE"))
                .unwrap_or_default();
            Some(PathBuf::from(format!("{home}{rest}")))
        } else {
            Some(PathBuf::from(raw))
        }
    }
}
