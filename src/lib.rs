//! MIME-type identification from filenames and file content, modelled on the
//! freedesktop.org Shared MIME-info specification:
//! <https://specifications.freedesktop.org/shared-mime-info/latest/>
//!
//! The core is a [`Repository`] of [`MimeType`] records, built once from an
//! XML `mime-info` database (or a previously saved binary cache) and then
//! queried read-only through a [`Detector`]. See [`repository`] for the
//! filename/content arbitration rules, and [`magic`] for the byte-pattern
//! matcher tree.

pub mod cache;
pub mod config;
pub mod defaults;
pub mod detector;
pub mod error;
pub mod glob;
pub mod magic;
pub mod mime_name;
pub mod mime_type;
pub mod repository;
pub mod singleton;
pub mod xml;

pub use config::Config;
pub use detector::{Detector, ExternalCommandDetector, RepositoryDetector};
pub use error::Error;
pub use glob::Glob;
pub use magic::{Magic, MagicMatcher, MagicMatcherKind};
pub use mime_name::Mime;
pub use mime_type::MimeType;
pub use repository::Repository;

/// Builds a [`Repository`] from an XML `mime-info` database, optionally
/// saving a binary cache afterwards per `config.save`.
pub fn build_from_xml(xml: &str, config: &Config) -> error::Result<Repository> {
    let mime_types = xml::parse_database(xml)?;
    let repo = Repository::from_mime_types(mime_types)?;
    if config.save {
        if let Some(path) = config.resolved_serialization_path() {
            cache::save_to_path(&path, &repo);
        }
    }
    Ok(repo)
}

/// Loads a repository the way a long-lived process normally would: try the
/// binary cache first (unless `config.rebuild`), falling back to an XML
/// rebuild on a missing or invalid cache.
pub fn load(xml: &str, config: &Config) -> error::Result<Repository> {
    if !config.rebuild {
        if let Some(path) = config.resolved_serialization_path() {
            match cache::load_from_path(&path) {
                Ok(repo) => return Ok(repo),
                Err(e) => {
                    log::warn!("discarding cache, rebuilding from database: {e}");
                }
            }
        }
    }
    build_from_xml(xml, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_from_xml_rejects_malformed_database() {
        let result = build_from_xml("<mime-info><mime-type/></mime-info>", &Config::default());
        assert!(result.is_err());
    }

    #[test]
    fn load_falls_back_to_xml_when_no_cache_path_is_configured() {
        let xml = r#"<mime-info><mime-type type="text/plain"><glob pattern="*.txt"/></mime-type></mime-info>"#;
        let repo = load(xml, &Config { save: false, ..Config::default() }).unwrap();
        assert_eq!(repo.mime_types().len(), 1);
    }
}
