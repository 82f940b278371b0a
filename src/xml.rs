//! Parses the freedesktop `mime-info` XML database format into
//! [`MimeType`] records.

use std::collections::BTreeMap;

use log::warn;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::defaults::{DEFAULT_GLOB_CASE_SENSITIVE, DEFAULT_GLOB_WEIGHT, DEFAULT_MAGIC_PRIORITY};
use crate::error::{Error, Result};
use crate::glob::Glob;
use crate::magic::{Magic, MagicMatcher, MagicMatcherKind};
use crate::mime_name::Mime;
use crate::mime_type::{MimeType, XmlRootHint};

/// Parses a complete `<mime-info>` document into its `<mime-type>` records.
/// Aborts the whole load on the first malformed entry; see
/// [`crate::repository`] build helpers for a best-effort variant that skips
/// bad entries instead.
pub fn parse_database(xml: &str) -> Result<Vec<MimeType>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut mime_types = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"mime-type" => {
                mime_types.push(parse_mime_type(&mut reader, &e)?);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(mime_types)
}

fn attr(e: &BytesStart, name: &str) -> Result<Option<String>> {
    for a in e.attributes() {
        let a = a.map_err(|err| Error::MalformedDatabase(format!("bad attribute: {err}")))?;
        if a.key.as_ref() == name.as_bytes() {
            let value = a
                .unescape_value()
                .map_err(|err| Error::MalformedDatabase(format!("bad attribute value: {err}")))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn required_attr(e: &BytesStart, name: &str) -> Result<String> {
    attr(e, name)?.ok_or_else(|| {
        Error::MalformedDatabase(format!(
            "missing required attribute '{name}' on <{}>",
            String::from_utf8_lossy(e.local_name().as_ref())
        ))
    })
}

fn parse_mime_type(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<MimeType> {
    let name = Mime::new(required_attr(start, "type")?)?;

    let mut aliases = Vec::new();
    let mut comments = BTreeMap::new();
    let mut acronym = None;
    let mut expanded_acronym = None;
    let mut generic_icon = None;
    let mut xml_roots: Vec<XmlRootHint> = Vec::new();
    let mut super_types = Vec::new();
    let mut globs = Vec::new();
    let mut magics = Vec::new();

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Empty(e) => match e.local_name().as_ref() {
                b"alias" => aliases.push(Mime::new(required_attr(&e, "type")?)?),
                b"sub-class-of" => super_types.push(Mime::new(required_attr(&e, "type")?)?),
                b"generic-icon" => generic_icon = Some(required_attr(&e, "name")?),
                b"root-XML" => {
                    if xml_roots.is_empty() {
                        xml_roots.push(XmlRootHint {
                            namespace_uri: required_attr(&e, "namespaceURI")?,
                            local_name: required_attr(&e, "localName")?,
                        });
                    }
                }
                b"glob" => globs.push(parse_glob(&e)?),
                _ => {}
            },
            Event::Start(e) => match e.local_name().as_ref() {
                b"comment" => {
                    let locale = attr(&e, "xml:lang")?.unwrap_or_default();
                    let text = read_text(reader)?;
                    comments.insert(locale, text);
                }
                b"acronym" => acronym = Some(read_text(reader)?),
                b"expanded-acronym" => expanded_acronym = Some(read_text(reader)?),
                b"magic" => {
                    let priority = parse_u8_attr(&e, "priority", DEFAULT_MAGIC_PRIORITY)?;
                    let matchers = parse_match_children(reader, b"magic")?;
                    magics.push(Magic::new(priority, matchers)?);
                }
                b"root-XML" => {
                    if xml_roots.is_empty() {
                        xml_roots.push(XmlRootHint {
                            namespace_uri: required_attr(&e, "namespaceURI")?,
                            local_name: required_attr(&e, "localName")?,
                        });
                    }
                    skip_to_end(reader, b"root-XML")?;
                }
                b"glob" => {
                    globs.push(parse_glob(&e)?);
                    skip_to_end(reader, b"glob")?;
                }
                other => {
                    skip_to_end(reader, other)?;
                }
            },
            Event::End(e) if e.local_name().as_ref() == b"mime-type" => break,
            Event::Eof => {
                return Err(Error::MalformedDatabase(
                    "unexpected end of document inside <mime-type>".into(),
                ));
            }
            _ => {}
        }
        buf.clear();
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

fn parse_glob(e: &BytesStart) -> Result<Glob> {
    let pattern = required_attr(e, "pattern")?;
    let weight = parse_u8_attr(e, "weight", DEFAULT_GLOB_WEIGHT)?;
    let case_sensitive = match attr(e, "case-sensitive")? {
        Some(v) => v == "true",
        None => DEFAULT_GLOB_CASE_SENSITIVE,
    };
    Ok(Glob::new(pattern, weight, case_sensitive))
}

fn parse_u8_attr(e: &BytesStart, name: &str, default: u8) -> Result<u8> {
    match attr(e, name)? {
        None => Ok(default),
        Some(v) => v
            .parse::<u32>()
            .ok()
            .filter(|n| *n <= 100)
            .map(|n| n as u8)
            .ok_or_else(|| {
                Error::MalformedDatabase(format!("'{name}' out of range [0,100]: {v}"))
            }),
    }
}

/// Reads nested `<match>` elements until the enclosing element (`magic` or a
/// parent `match`) closes, building the sub-matcher tree recursively.
fn parse_match_children(reader: &mut Reader<&[u8]>, parent_tag: &[u8]) -> Result<Vec<MagicMatcher>> {
    let mut out = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Empty(e) if e.local_name().as_ref() == b"match" => {
                out.push(parse_match(&e, Vec::new())?);
            }
            Event::Start(e) if e.local_name().as_ref() == b"match" => {
                let start = e.clone().into_owned();
                let children = parse_match_children(reader, b"match")?;
                out.push(parse_match(&start, children)?);
            }
            Event::End(e) if e.local_name().as_ref() == parent_tag => break,
            Event::Eof => {
                return Err(Error::MalformedDatabase(
                    "unexpected end of document inside <magic>".into(),
                ));
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn parse_match(e: &BytesStart, sub_matchers: Vec<MagicMatcher>) -> Result<MagicMatcher> {
    let kind = parse_match_type(&required_attr(e, "type")?)?;
    let (offset_begin, offset_end) = parse_offset(&required_attr(e, "offset")?)?;
    let raw_value = required_attr(e, "value")?;
    let value = decode_value(&raw_value, kind)?;
    let mask = match attr(e, "mask")? {
        Some(raw_mask) => Some(decode_mask(&raw_mask, kind, value.len())?),
        None => None,
    };
    MagicMatcher::new(kind, offset_begin, offset_end, value, mask, sub_matchers)
}

fn parse_match_type(s: &str) -> Result<MagicMatcherKind> {
    Ok(match s {
        "string" => MagicMatcherKind::String,
        "byte" => MagicMatcherKind::Byte,
        "host16" => MagicMatcherKind::Host16,
        "host32" => MagicMatcherKind::Host32,
        "big16" => MagicMatcherKind::Big16,
        "big32" => MagicMatcherKind::Big32,
        "little16" => MagicMatcherKind::Little16,
        "little32" => MagicMatcherKind::Little32,
        other => {
            return Err(Error::MalformedDatabase(format!(
                "unknown match type '{other}'"
            )))
        }
    })
}

fn parse_offset(s: &str) -> Result<(u32, u32)> {
    match s.split_once(':') {
        Some((a, b)) => {
            let begin = parse_u32(a)?;
            let end = parse_u32(b)?;
            if begin > end {
                return Err(Error::MalformedDatabase(format!(
                    "invalid offset range '{s}'"
                )));
            }
            Ok((begin, end))
        }
        None => {
            let n = parse_u32(s)?;
            Ok((n, n))
        }
    }
}

fn parse_u32(s: &str) -> Result<u32> {
    s.parse::<u32>()
        .map_err(|_| Error::MalformedDatabase(format!("invalid offset '{s}'")))
}

/// Decodes `match/@value`: C-style string escapes for `string`, the full
/// numeric grammar (decimal / `0x` hex / `0` octal) for numeric types,
/// encoded big-endian to the type's fixed width.
fn decode_value(raw: &str, kind: MagicMatcherKind) -> Result<Vec<u8>> {
    match kind {
        MagicMatcherKind::String => decode_c_string(raw),
        MagicMatcherKind::Byte => {
            let n = parse_numeric_literal(raw)?;
            if n > u32::from(u8::MAX) {
                return Err(Error::MalformedDatabase(format!(
                    "numeric value overflows 8 bits: {raw}"
                )));
            }
            Ok(vec![n as u8])
        }
        MagicMatcherKind::Host16 | MagicMatcherKind::Big16 | MagicMatcherKind::Little16 => {
            let n = parse_numeric_literal(raw)?;
            if n > u32::from(u16::MAX) {
                return Err(Error::MalformedDatabase(format!(
                    "numeric value overflows 16 bits: {raw}"
                )));
            }
            Ok((n as u16).to_be_bytes().to_vec())
        }
        MagicMatcherKind::Host32 | MagicMatcherKind::Big32 | MagicMatcherKind::Little32 => {
            let n = parse_numeric_literal(raw)?;
            Ok(n.to_be_bytes().to_vec())
        }
    }
}

fn decode_mask(raw: &str, kind: MagicMatcherKind, value_len: usize) -> Result<Vec<u8>> {
    match kind {
        MagicMatcherKind::String => {
            let hex = raw.strip_prefix("0x").ok_or_else(|| {
                Error::MalformedDatabase(format!("string mask must be a hex literal: {raw}"))
            })?;
            if hex.len() != value_len * 2 {
                return Err(Error::MalformedDatabase(format!(
                    "string mask length {} does not match value length {value_len}",
                    hex.len()
                )));
            }
            decode_hex(hex)
        }
        _ => decode_value(raw, kind),
    }
}

fn decode_hex(hex: &str) -> Result<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return Err(Error::MalformedDatabase(format!(
            "odd-length hex literal: {hex}"
        )));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| Error::MalformedDatabase(format!("invalid hex byte in: {hex}")))
        })
        .collect()
}

/// Parses the numeric grammar (decimal, `0x…` hex, `0…` octal) shared by
/// numeric `match/@value` and `match/@mask`.
fn parse_numeric_literal(raw: &str) -> Result<u32> {
    let parsed = if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else if raw.len() > 1 && raw.starts_with('0') {
        u32::from_str_radix(&raw[1..], 8)
    } else {
        raw.parse::<u32>()
    };
    parsed.map_err(|_| Error::MalformedDatabase(format!("invalid numeric literal: {raw}")))
}

/// Decodes C-style string escapes: `\n \r \t \xNN \NNN \" \\`.
fn decode_c_string(raw: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(raw.len());
    let bytes: Vec<char> = raw.chars().collect();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(bytes[i].encode_utf8(&mut buf).as_bytes());
            i += 1;
            continue;
        }
        i += 1;
        let Some(&esc) = bytes.get(i) else {
            return Err(Error::MalformedDatabase("trailing backslash in value".into()));
        };
        match esc {
            'n' => {
                out.push(b'\n');
                i += 1;
            }
            'r' => {
                out.push(b'\r');
                i += 1;
            }
            't' => {
                out.push(b'\t');
                i += 1;
            }
            '"' => {
                out.push(b'"');
                i += 1;
            }
            '\\' => {
                out.push(b'\\');
                i += 1;
            }
            'x' => {
                let hex: String = bytes[i + 1..].iter().take(2).collect();
                if hex.len() != 2 {
                    return Err(Error::MalformedDatabase(format!(
                        "incomplete \\x escape in: {raw}"
                    )));
                }
                let byte = u8::from_str_radix(&hex, 16).map_err(|_| {
                    Error::MalformedDatabase(format!("invalid \\x escape in: {raw}"))
                })?;
                out.push(byte);
                i += 1 + hex.len();
            }
            '0'..='7' => {
                let oct: String = bytes[i..]
                    .iter()
                    .take_while(|c| matches!(c, '0'..='7'))
                    .take(3)
                    .collect();
                let value = u16::from_str_radix(&oct, 8).map_err(|_| {
                    Error::MalformedDatabase(format!("invalid octal escape in: {raw}"))
                })?;
                if value > u16::from(u8::MAX) {
                    return Err(Error::MalformedDatabase(format!(
                        "octal escape overflows a byte in: {raw}"
                    )));
                }
                out.push(value as u8);
                i += oct.len();
            }
            other => {
                return Err(Error::MalformedDatabase(format!(
                    "unsupported escape '\\{other}' in: {raw}"
                )));
            }
        }
    }
    Ok(out)
}

fn read_text(reader: &mut Reader<&[u8]>) -> Result<String> {
    let mut buf = Vec::new();
    let mut text = String::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Text(t) => text.push_str(&t.unescape()?),
            Event::CData(t) => text.push_str(&String::from_utf8_lossy(&t.into_inner())),
            Event::End(_) => break,
            Event::Eof => {
                return Err(Error::MalformedDatabase(
                    "unexpected end of document reading text content".into(),
                ));
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(text)
}

/// Skips over an element this loader does not recognize, including any
/// nested elements, so a forward-compatible database doesn't abort the load.
fn skip_to_end(reader: &mut Reader<&[u8]>, tag: &[u8]) -> Result<()> {
    let mut depth = 0usize;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == tag => depth += 1,
            Event::End(e) if e.local_name().as_ref() == tag => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            Event::Eof => {
                warn!("unexpected EOF while skipping unknown element");
                break;
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<mime-info xmlns="http://www.freedesktop.org/standards/shared-mime-info">
  <mime-type type="image/png">
    <comment>PNG image</comment>
    <comment xml:lang="fr">image PNG</comment>
    <glob pattern="*.png"/>
    <magic priority="50">
      <match type="string" offset="0" value="\x89PNG\r\n\x1a\n"/>
    </magic>
  </mime-type>
  <mime-type type="application/msword-template">
    <sub-class-of type="application/msword"/>
    <alias type="application/x-msword-template"/>
    <glob pattern="*.dot" weight="60"/>
  </mime-type>
</mime-info>"#;

    #[test]
    fn parses_basic_database() {
        let types = parse_database(SAMPLE).unwrap();
        assert_eq!(types.len(), 2);
        let png = &types[0];
        assert_eq!(png.name().as_str(), "image/png");
        assert_eq!(png.default_comment(), Some("PNG image"));
        assert_eq!(png.comment("fr"), Some("image PNG"));
        assert_eq!(png.globs().len(), 1);
        assert_eq!(png.magics().len(), 1);
        assert!(png.magics()[0].matches(b"\x89PNG\r\n\x1a\n", 8));
    }

    #[test]
    fn parses_alias_and_supertype() {
        let types = parse_database(SAMPLE).unwrap();
        let dot = &types[1];
        assert_eq!(dot.super_types()[0].as_str(), "application/msword");
        assert_eq!(dot.aliases()[0].as_str(), "application/x-msword-template");
        assert_eq!(dot.globs()[0].weight(), 60);
    }

    #[test]
    fn rejects_unknown_match_type() {
        let xml = r#"<mime-info><mime-type type="a/b">
            <magic priority="50"><match type="weird" offset="0" value="1"/></magic>
        </mime-type></mime-info>"#;
        assert!(parse_database(xml).is_err());
    }

    #[test]
    fn rejects_missing_required_attribute() {
        let xml = r#"<mime-info><mime-type type="a/b">
            <glob/>
        </mime-type></mime-info>"#;
        assert!(parse_database(xml).is_err());
    }

    #[test]
    fn decodes_hex_numeric_value() {
        let xml = r#"<mime-info><mime-type type="a/b">
            <magic priority="50"><match type="big16" offset="0" value="0x1234"/></magic>
        </mime-type></mime-info>"#;
        let types = parse_database(xml).unwrap();
        assert!(types[0].magics()[0].matches(&[0x12, 0x34], 2));
    }

    #[test]
    fn decodes_nested_matches() {
        let xml = r#"<mime-info><mime-type type="a/b">
            <magic priority="50">
              <match type="string" offset="0" value="AB">
                <match type="byte" offset="2" value="1"/>
              </match>
            </magic>
        </mime-type></mime-info>"#;
        let types = parse_database(xml).unwrap();
        assert!(types[0].magics()[0].matches(b"AB\x01", 3));
        assert!(!types[0].magics()[0].matches(b"AB\x02", 3));
    }
}
