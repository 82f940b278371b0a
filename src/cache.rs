//! A hand-rolled binary cache format that serializes a built [`Repository`]
//! so it need not be rebuilt from XML on every process start. In the spirit
//! of the freedesktop `mime.cache` header/offset layout, but caching this
//! crate's own `Repository`, not the system file.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::warn;

use crate::error::{Error, Result};
use crate::glob::Glob;
use crate::magic::{Magic, MagicMatcher, MagicMatcherKind};
use crate::mime_name::Mime;
use crate::mime_type::{MimeType, XmlRootHint};
use crate::repository::Repository;

/// 4-byte magic identifying this format, distinct from the freedesktop
/// `mime.cache` signature so the two are never confused on disk.
const SIGNATURE: &[u8; 4] = b"SMIC";
/// Bumped whenever the on-disk layout changes in a way old readers can't
/// tolerate.
const SERIAL_VERSION: u16 = 1;
/// Bumped for semantic (not layout) changes a reader may want to react to.
const SEMANTIC_VERSION: u16 = 1;

const MATCHER_KINDS: [MagicMatcherKind; 8] = [
    MagicMatcherKind::String,
    MagicMatcherKind::Byte,
    MagicMatcherKind::Host16,
    MagicMatcherKind::Host32,
    MagicMatcherKind::Big16,
    MagicMatcherKind::Big32,
    MagicMatcherKind::Little16,
    MagicMatcherKind::Little32,
];

fn kind_to_index(kind: MagicMatcherKind) -> i32 {
    MATCHER_KINDS.iter().position(|k| *k == kind).unwrap() as i32
}

fn index_to_kind(idx: i32) -> Result<MagicMatcherKind> {
    MATCHER_KINDS
        .get(idx as usize)
        .copied()
        .ok_or_else(|| Error::InvalidCache(format!("invalid matcher type index {idx}")))
}

/// Serializes `repository` to `writer`. Write failures are the caller's
/// concern to surface or swallow; this function always returns the I/O
/// `Result` faithfully. Callers that want "log and ignore" semantics should
/// wrap the call themselves, as [`save_to_path`] does.
pub fn write_cache<W: Write>(writer: &mut W, repository: &Repository) -> Result<()> {
    writer.write_all(SIGNATURE)?;
    writer.write_u16::<BigEndian>(SERIAL_VERSION)?;
    writer.write_u16::<BigEndian>(SEMANTIC_VERSION)?;

    let mime_types = repository.mime_types();
    writer.write_u32::<BigEndian>(mime_types.len() as u32)?;
    for mt in mime_types {
        write_mime_type(writer, mt)?;
    }
    Ok(())
}

/// Writes the cache to `path`, logging (not propagating) any I/O failure:
/// a write failure should never stop a caller that already has a working
/// in-memory repository.
pub fn save_to_path(path: &std::path::Path, repository: &Repository) {
    match std::fs::File::create(path) {
        Ok(mut file) => {
            if let Err(e) = write_cache(&mut file, repository) {
                warn!("failed to write mime cache to {}: {e}", path.display());
            }
        }
        Err(e) => warn!("failed to create mime cache file {}: {e}", path.display()),
    }
}

fn write_string<W: Write>(writer: &mut W, s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    writer.write_u32::<BigEndian>(bytes.len() as u32)?;
    writer.write_all(bytes)?;
    Ok(())
}

fn write_bytes_opt<W: Write>(writer: &mut W, bytes: Option<&[u8]>) -> Result<()> {
    match bytes {
        None => writer.write_i32::<BigEndian>(-1)?,
        Some(b) => {
            writer.write_i32::<BigEndian>(b.len() as i32)?;
            writer.write_all(b)?;
        }
    }
    Ok(())
}

fn write_string_opt<W: Write>(writer: &mut W, s: Option<&str>) -> Result<()> {
    match s {
        None => writer.write_i32::<BigEndian>(-1)?,
        Some(s) => {
            writer.write_i32::<BigEndian>(s.len() as i32)?;
            writer.write_all(s.as_bytes())?;
        }
    }
    Ok(())
}

fn write_mime_type<W: Write>(writer: &mut W, mt: &MimeType) -> Result<()> {
    write_string(writer, mt.name().as_str())?;

    writer.write_u32::<BigEndian>(mt.aliases().len() as u32)?;
    for alias in mt.aliases() {
        write_string(writer, alias.as_str())?;
    }

    let comments: Vec<(&String, &String)> = mt
        .comments_iter()
        .collect();
    writer.write_u32::<BigEndian>(comments.len() as u32)?;
    for (locale, text) in comments {
        write_string(writer, locale)?;
        write_string(writer, text)?;
    }

    write_string_opt(writer, mt.xml_roots().first().map(|r| r.namespace_uri.as_str()))?;
    write_string_opt(writer, mt.xml_roots().first().map(|r| r.local_name.as_str()))?;
    write_string_opt(writer, mt.acronym())?;
    write_string_opt(writer, mt.expanded_acronym())?;
    write_string_opt(writer, mt.generic_icon())?;

    writer.write_u32::<BigEndian>(mt.globs().len() as u32)?;
    for glob in mt.globs() {
        write_glob(writer, glob)?;
    }

    writer.write_u32::<BigEndian>(mt.magics().len() as u32)?;
    for magic in mt.magics() {
        write_magic(writer, magic)?;
    }

    writer.write_u32::<BigEndian>(mt.super_types().len() as u32)?;
    for parent in mt.super_types() {
        write_string(writer, parent.as_str())?;
    }

    Ok(())
}

fn write_glob<W: Write>(writer: &mut W, glob: &Glob) -> Result<()> {
    writer.write_i32::<BigEndian>(i32::from(glob.weight()))?;
    writer.write_u8(glob.case_sensitive() as u8)?;
    write_string(writer, glob.pattern())?;
    Ok(())
}

fn write_magic<W: Write>(writer: &mut W, magic: &Magic) -> Result<()> {
    writer.write_i32::<BigEndian>(i32::from(magic.priority()))?;
    writer.write_u32::<BigEndian>(magic.matchers().len() as u32)?;
    for m in magic.matchers() {
        write_matcher(writer, m)?;
    }
    Ok(())
}

fn write_matcher<W: Write>(writer: &mut W, m: &MagicMatcher) -> Result<()> {
    writer.write_i32::<BigEndian>(kind_to_index(m.kind()))?;
    writer.write_i32::<BigEndian>(m.offset_begin() as i32)?;
    writer.write_i32::<BigEndian>(m.offset_end() as i32)?;
    write_bytes_opt(writer, Some(m.value()))?;
    write_bytes_opt(writer, m.mask())?;
    writer.write_u32::<BigEndian>(m.sub_matchers().len() as u32)?;
    for child in m.sub_matchers() {
        write_matcher(writer, child)?;
    }
    Ok(())
}

/// Reads a cache previously written by [`write_cache`]. A signature
/// mismatch, premature EOF, or an out-of-range matcher type index is
/// reported as [`Error::InvalidCache`]; callers should treat that as a
/// trigger to rebuild from the XML database.
pub fn read_cache<R: Read>(reader: &mut R) -> Result<Repository> {
    let mut sig = [0u8; 4];
    reader
        .read_exact(&mut sig)
        .map_err(|e| Error::InvalidCache(format!("truncated cache: {e}")))?;
    if &sig != SIGNATURE {
        return Err(Error::InvalidCache("bad cache signature".into()));
    }
    let serial = reader
        .read_u16::<BigEndian>()
        .map_err(|e| Error::InvalidCache(format!("truncated cache: {e}")))?;
    let _semantic = reader
        .read_u16::<BigEndian>()
        .map_err(|e| Error::InvalidCache(format!("truncated cache: {e}")))?;
    if serial != SERIAL_VERSION {
        return Err(Error::InvalidCache(format!(
            "unsupported cache serial version {serial}"
        )));
    }

    let count = read_u32(reader)?;
    let mut mime_types = Vec::with_capacity(count as usize);
    for _ in 0..count {
        mime_types.push(read_mime_type(reader)?);
    }

    Repository::from_mime_types(mime_types)
}

pub fn load_from_path(path: &std::path::Path) -> Result<Repository> {
    let mut file = std::fs::File::open(path)?;
    read_cache(&mut file)
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    reader
        .read_u32::<BigEndian>()
        .map_err(|e| Error::InvalidCache(format!("truncated cache: {e}")))
}

fn read_i32<R: Read>(reader: &mut R) -> Result<i32> {
    reader
        .read_i32::<BigEndian>()
        .map_err(|e| Error::InvalidCache(format!("truncated cache: {e}")))
}

fn read_string<R: Read>(reader: &mut R) -> Result<String> {
    let len = read_u32(reader)? as usize;
    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .map_err(|e| Error::InvalidCache(format!("truncated cache: {e}")))?;
    String::from_utf8(buf).map_err(|e| Error::InvalidCache(format!("invalid utf-8: {e}")))
}

fn read_string_opt<R: Read>(reader: &mut R) -> Result<Option<String>> {
    let len = read_i32(reader)?;
    if len < 0 {
        return Ok(None);
    }
    let mut buf = vec![0u8; len as usize];
    reader
        .read_exact(&mut buf)
        .map_err(|e| Error::InvalidCache(format!("truncated cache: {e}")))?;
    Ok(Some(
        String::from_utf8(buf).map_err(|e| Error::InvalidCache(format!("invalid utf-8: {e}")))?,
    ))
}

fn read_bytes_opt<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let len = read_i32(reader)?;
    if len < 0 {
        return Ok(None);
    }
    let mut buf = vec![0u8; len as usize];
    reader
        .read_exact(&mut buf)
        .map_err(|e| Error::InvalidCache(format!("truncated cache: {e}")))?;
    Ok(Some(buf))
}

fn read_mime_type<R: Read>(reader: &mut R) -> Result<MimeType> {
    let name = Mime::new(read_string(reader)?)?;

    let alias_count = read_u32(reader)?;
    let mut aliases = Vec::with_capacity(alias_count as usize);
    for _ in 0..alias_count {
        aliases.push(Mime::new(read_string(reader)?)?);
    }

    let comment_count = read_u32(reader)?;
    let mut comments = BTreeMap::new();
    for _ in 0..comment_count {
        let locale = read_string(reader)?;
        let text = read_string(reader)?;
        comments.insert(locale, text);
    }

    let namespace_uri = read_string_opt(reader)?;
    let local_name = read_string_opt(reader)?;
    let xml_roots = match (namespace_uri, local_name) {
        (Some(namespace_uri), Some(local_name)) => vec![XmlRootHint {
            namespace_uri,
            local_name,
        }],
        _ => Vec::new(),
    };

    let acronym = read_string_opt(reader)?;
    let expanded_acronym = read_string_opt(reader)?;
    let generic_icon = read_string_opt(reader)?;

    let glob_count = read_u32(reader)?;
    let mut globs = Vec::with_capacity(glob_count as usize);
    for _ in 0..glob_count {
        globs.push(read_glob(reader)?);
    }

    let magic_count = read_u32(reader)?;
    let mut magics = Vec::with_capacity(magic_count as usize);
    for _ in 0..magic_count {
        magics.push(read_magic(reader)?);
    }

    let super_count = read_u32(reader)?;
    let mut super_types = Vec::with_capacity(super_count as usize);
    for _ in 0..super_count {
        super_types.push(Mime::new(read_string(reader)?)?);
    }

    Ok(MimeType::new(
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
    ))
}

fn read_glob<R: Read>(reader: &mut R) -> Result<Glob> {
    let weight = read_i32(reader)?;
    if !(0..=100).contains(&weight) {
        return Err(Error::InvalidCache(format!("glob weight out of range: {weight}")));
    }
    let mut case_sensitive_byte = [0u8; 1];
    reader
        .read_exact(&mut case_sensitive_byte)
        .map_err(|e| Error::InvalidCache(format!("truncated cache: {e}")))?;
    let pattern = read_string(reader)?;
    Ok(Glob::new(pattern, weight as u8, case_sensitive_byte[0] != 0))
}

fn read_magic<R: Read>(reader: &mut R) -> Result<Magic> {
    let priority = read_i32(reader)?;
    if !(0..=100).contains(&priority) {
        return Err(Error::InvalidCache(format!(
            "magic priority out of range: {priority}"
        )));
    }
    let count = read_u32(reader)?;
    let mut matchers = Vec::with_capacity(count as usize);
    for _ in 0..count {
        matchers.push(read_matcher(reader)?);
    }
    Magic::new(priority as u8, matchers)
}

fn read_matcher<R: Read>(reader: &mut R) -> Result<MagicMatcher> {
    let kind_idx = read_i32(reader)?;
    let kind = index_to_kind(kind_idx)?;
    let offset_begin = read_i32(reader)?;
    let offset_end = read_i32(reader)?;
    if offset_begin < 0 || offset_end < 0 {
        return Err(Error::InvalidCache("negative offset in cache".into()));
    }
    let value = read_bytes_opt(reader)?
        .ok_or_else(|| Error::InvalidCache("magic match value must not be null".into()))?;
    let mask = read_bytes_opt(reader)?;
    let sub_count = read_u32(reader)?;
    let mut sub_matchers = Vec::with_capacity(sub_count as usize);
    for _ in 0..sub_count {
        sub_matchers.push(read_matcher(reader)?);
    }
    MagicMatcher::new(
        kind,
        offset_begin as u32,
        offset_end as u32,
        value,
        mask,
        sub_matchers,
    )
    .map_err(|e| Error::InvalidCache(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime_type::MimeType;
    use std::io::Cursor;

    fn sample_repository() -> Repository {
        let magic = Magic::new(
            80,
            vec![MagicMatcher::new(
                MagicMatcherKind::String,
                0,
                0,
                b"\x89PNG".to_vec(),
                None,
                Vec::new(),
            )
            .unwrap()],
        )
        .unwrap();
        let mut comments = BTreeMap::new();
        comments.insert("".to_string(), "PNG image".to_string());
        comments.insert("fr".to_string(), "image PNG".to_string());
        let mt = MimeType::new(
            Mime::new("image/png").unwrap(),
            vec![Mime::new("image/x-png").unwrap()],
            comments,
            None,
            None,
            Some("image-png".to_string()),
            Vec::new(),
            Vec::new(),
            vec![Glob::with_defaults("*.png")],
            vec![magic],
        );
        Repository::from_mime_types(vec![mt]).unwrap()
    }

    #[test]
    fn round_trips_a_repository() {
        let repo = sample_repository();
        let mut buf = Vec::new();
        write_cache(&mut buf, &repo).unwrap();

        let mut cursor = Cursor::new(buf);
        let restored = read_cache(&mut cursor).unwrap();

        assert_eq!(restored.mime_types().len(), 1);
        let mt = &restored.mime_types()[0];
        assert_eq!(mt.name().as_str(), "image/png");
        assert_eq!(mt.aliases()[0].as_str(), "image/x-png");
        assert_eq!(mt.default_comment(), Some("PNG image"));
        assert_eq!(mt.generic_icon(), Some("image-png"));
        assert_eq!(restored.max_test_bytes(), repo.max_test_bytes());
        assert!(restored.detect_by_filename("x.png").len() == 1);
        assert!(restored.detect_by_content(b"\x89PNG", 4).len() == 1);
    }

    #[test]
    fn rejects_bad_signature() {
        let mut cursor = Cursor::new(b"XXXX\x00\x01\x00\x01".to_vec());
        assert!(read_cache(&mut cursor).is_err());
    }

    #[test]
    fn rejects_truncated_cache() {
        let repo = sample_repository();
        let mut buf = Vec::new();
        write_cache(&mut buf, &repo).unwrap();
        buf.truncate(buf.len() - 4);
        let mut cursor = Cursor::new(buf);
        assert!(read_cache(&mut cursor).is_err());
    }
}
