//! A thin strategy layer dispatching from files, paths, or raw bytes into the
//! [`Repository`]'s resolution algorithms, plus a variant delegating to an
//! external `file`-like command.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::mime_type::MimeType;
use crate::repository::Repository;

/// Capability set every concrete detector implements: a tagged variant over
/// the two implementors below, no inheritance hierarchy involved.
pub trait Detector {
    /// Candidates from the filename alone.
    fn guess_from_filename(&self, name: &str) -> Vec<&MimeType>;

    /// Candidates from leading content bytes alone.
    fn guess_from_bytes(&self, bytes: &[u8]) -> Vec<&MimeType>;

    /// Reads the file at `path`, using its basename for filename evidence
    /// and its leading bytes for content evidence.
    fn guess_from_path(&self, path: &Path) -> std::io::Result<Vec<&MimeType>>;

    /// A single best answer, combining filename and content evidence with
    /// the merge rule: both empty → `None`; either empty → the other's
    /// first entry; otherwise the first filename hit that also appears
    /// among the content hits, or the first content hit if none do.
    fn guess(&self, name: Option<&str>, bytes: Option<&[u8]>) -> Option<&MimeType>;
}

fn merge<'a>(filename_list: &[&'a MimeType], content_list: &[&'a MimeType]) -> Option<&'a MimeType> {
    if filename_list.is_empty() && content_list.is_empty() {
        return None;
    }
    if filename_list.is_empty() {
        return content_list.first().copied();
    }
    if content_list.is_empty() {
        return filename_list.first().copied();
    }
    filename_list
        .iter()
        .find(|f| content_list.iter().any(|c| std::ptr::eq(**f, **c)))
        .copied()
        .or_else(|| content_list.first().copied())
}

/// Extracts the basename a caller-supplied filename, path, or URL-shaped
/// string should be matched against. A caller-supplied filename always wins
/// over one derived from a path; this helper is for the "derive from
/// whatever we have" case only.
fn basename_of(name_or_path: &str) -> &str {
    name_or_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name_or_path)
}

/// The default, pure-Rust detector: both filename and content evidence
/// resolve through a [`Repository`].
pub struct RepositoryDetector<'a> {
    repository: &'a Repository,
    always_check_magic: bool,
}

impl<'a> RepositoryDetector<'a> {
    pub fn new(repository: &'a Repository, always_check_magic: bool) -> Self {
        RepositoryDetector {
            repository,
            always_check_magic,
        }
    }

    pub fn repository(&self) -> &'a Repository {
        self.repository
    }

    /// The full `detect` resolution (filename→candidates, single-hit
    /// short-circuit, magic confirmation, fallback), as opposed to `guess`'s
    /// simpler independent-merge rule.
    pub fn detect(&self, name: Option<&str>, bytes: &[u8]) -> Vec<&'a MimeType> {
        let basename = name.map(basename_of);
        let n = bytes.len().min(self.repository.max_test_bytes());
        self.repository
            .detect(basename, bytes, n, self.always_check_magic)
    }
}

impl<'a> Detector for RepositoryDetector<'a> {
    fn guess_from_filename(&self, name: &str) -> Vec<&MimeType> {
        self.repository.detect_by_filename(basename_of(name))
    }

    fn guess_from_bytes(&self, bytes: &[u8]) -> Vec<&MimeType> {
        let n = bytes.len().min(self.repository.max_test_bytes());
        self.repository.detect_by_content(bytes, n)
    }

    fn guess_from_path(&self, path: &Path) -> std::io::Result<Vec<&MimeType>> {
        let name = path.file_name().and_then(|s| s.to_str());
        let mut file = std::fs::File::open(path)?;
        let mut buf = vec![0u8; self.repository.max_test_bytes()];
        let read = read_prefix(&mut file, &mut buf)?;
        buf.truncate(read);

        let filename_list = name.map(|n| self.guess_from_filename(n)).unwrap_or_default();
        let content_list = self.guess_from_bytes(&buf);

        if filename_list.len() == 1 && !self.always_check_magic {
            return Ok(filename_list);
        }
        Ok(merge(&filename_list, &content_list).into_iter().collect())
    }

    fn guess(&self, name: Option<&str>, bytes: Option<&[u8]>) -> Option<&MimeType> {
        let filename_list = name.map(|n| self.guess_from_filename(n)).unwrap_or_default();
        let content_list = bytes.map(|b| self.guess_from_bytes(b)).unwrap_or_default();
        merge(&filename_list, &content_list)
    }
}

fn read_prefix(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

/// A detector that delegates content detection to an external command-line
/// tool (e.g. the host's `file`), while filename detection still goes
/// through an inner [`Repository`]. Non-zero exit, empty output, or I/O
/// failure is treated as "no candidate" rather than propagated.
pub struct ExternalCommandDetector<'a> {
    repository: &'a Repository,
    /// Command template; `{}` is replaced with the path to sniff.
    command: String,
    args_template: Vec<String>,
    timeout: Duration,
}

impl<'a> ExternalCommandDetector<'a> {
    pub fn new(
        repository: &'a Repository,
        command: impl Into<String>,
        args_template: Vec<String>,
        timeout: Duration,
    ) -> Self {
        ExternalCommandDetector {
            repository,
            command: command.into(),
            args_template,
            timeout,
        }
    }

    /// Runs the external command against `path`, returning the trimmed
    /// stdout as the sole candidate name, or `None` if the command failed,
    /// timed out, or produced no output.
    pub fn guess_mime_name(&self, path: &Path) -> Option<String> {
        let args: Vec<String> = self
            .args_template
            .iter()
            .map(|arg| {
                if arg == "{}" {
                    path.to_string_lossy().into_owned()
                } else {
                    arg.clone()
                }
            })
            .collect();

        let mut child = match Command::new(&self.command)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(c) => c,
            Err(e) => {
                warn!("failed to spawn external detector '{}': {e}", self.command);
                return None;
            }
        };

        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    if !status.success() {
                        debug!("external detector exited with {status}");
                        return None;
                    }
                    break;
                }
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        warn!("external detector '{}' timed out", self.command);
                        return None;
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(e) => {
                    warn!("failed to wait on external detector: {e}");
                    return None;
                }
            }
        }

        let mut stdout = String::new();
        if let Some(mut out) = child.stdout.take() {
            if out.read_to_string(&mut stdout).is_err() {
                return None;
            }
        }
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

impl<'a> Detector for ExternalCommandDetector<'a> {
    fn guess_from_filename(&self, name: &str) -> Vec<&MimeType> {
        self.repository.detect_by_filename(basename_of(name))
    }

    fn guess_from_bytes(&self, bytes: &[u8]) -> Vec<&MimeType> {
        let n = bytes.len().min(self.repository.max_test_bytes());
        self.repository.detect_by_content(bytes, n)
    }

    fn guess_from_path(&self, path: &Path) -> std::io::Result<Vec<&MimeType>> {
        let filename_list = path
            .file_name()
            .and_then(|s| s.to_str())
            .map(|n| self.guess_from_filename(n))
            .unwrap_or_default();

        let content_list: Vec<&MimeType> = self
            .guess_mime_name(path)
            .and_then(|name| self.repository.lookup(&name))
            .into_iter()
            .collect();

        Ok(merge(&filename_list, &content_list).into_iter().collect())
    }

    fn guess(&self, name: Option<&str>, _bytes: Option<&[u8]>) -> Option<&MimeType> {
        // The external command only accepts a path, not raw bytes; filename
        // evidence alone is all this variant can offer via `guess`.
        name.map(|n| self.guess_from_filename(n))
            .unwrap_or_default()
            .first()
            .copied()
    }
}
