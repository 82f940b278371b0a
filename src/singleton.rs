//! The process-wide repository singleton: build-once on first access, then
//! read-many with no per-operation locking; a rebuild is a single atomic
//! swap of the whole `Arc<Repository>`, never a patch of the existing one.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::error::Result;
use crate::repository::Repository;

static REPOSITORY: OnceCell<RwLock<Arc<Repository>>> = OnceCell::new();

/// Returns the shared repository, building it with `builder` if this is the
/// first call. Concurrent first calls race on `OnceCell::get_or_try_init`,
/// which guarantees exactly one winner actually runs `builder`; everyone
/// else observes its result.
pub fn get_or_init(builder: impl FnOnce() -> Result<Repository>) -> Result<Arc<Repository>> {
    let lock = REPOSITORY.get_or_try_init(|| builder().map(|r| RwLock::new(Arc::new(r))))?;
    Ok(lock.read().clone())
}

/// Returns the already-built repository, if any. Cheap: a read-lock clone of
/// an `Arc`, no rebuilding.
pub fn get() -> Option<Arc<Repository>> {
    REPOSITORY.get().map(|lock| lock.read().clone())
}

/// Atomically replaces the shared repository with a freshly built one.
/// Readers that already cloned the old `Arc` keep using it until they drop
/// it; new readers see the replacement immediately.
pub fn rebuild(builder: impl FnOnce() -> Result<Repository>) -> Result<Arc<Repository>> {
    let new_repo = Arc::new(builder()?);
    match REPOSITORY.get() {
        Some(lock) => {
            *lock.write() = new_repo.clone();
        }
        None => {
            let _ = REPOSITORY.set(RwLock::new(new_repo.clone()));
        }
    }
    Ok(new_repo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glob::Glob;
    use crate::mime_name::Mime;
    use crate::mime_type::MimeType;
    use std::collections::BTreeMap;

    fn empty_mime_type(name: &str) -> MimeType {
        MimeType::new(
            Mime::new(name).unwrap(),
            Vec::new(),
            BTreeMap::new(),
            None,
            None,
            None,
            Vec::new(),
            Vec::new(),
            vec![Glob::with_defaults("*.test-singleton-fixture")],
            Vec::new(),
        )
    }

    #[test]
    fn get_before_init_is_none_or_a_prior_tests_repository() {
        // No hard assertion here: test execution order across the crate's
        // test binary is unspecified, and other tests in this process may
        // have already initialized the singleton. This test only documents
        // that `get()` never panics before `get_or_init` has run.
        let _ = get();
    }

    #[test]
    fn get_or_init_builds_exactly_once_per_process() {
        let repo = get_or_init(|| Repository::from_mime_types(vec![empty_mime_type("a/a")]));
        assert!(repo.is_ok());
        // A second call with a different builder still observes the first
        // build's result, since the cell is already initialized.
        let repo2 = get_or_init(|| Repository::from_mime_types(vec![empty_mime_type("b/b")]));
        assert!(repo2.is_ok());
    }
}
