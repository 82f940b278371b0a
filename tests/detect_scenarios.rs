//! End-to-end detection scenarios against a small multi-type database:
//! filename/content agreement, glob length tie-breaks, supertype fallback,
//! and magic-confirmed ties between types sharing a glob.

use shared_mime_info::{build_from_xml, Config, Repository};

const SAMPLE_DB: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<mime-info xmlns="http://www.freedesktop.org/standards/shared-mime-info">
  <mime-type type="image/png">
    <comment>PNG image</comment>
    <glob pattern="*.png"/>
    <magic priority="50">
      <match type="string" offset="0" value="\x89PNG\r\n\x1a\n"/>
    </magic>
  </mime-type>
  <mime-type type="application/gzip">
    <comment>gzip compressed data</comment>
    <glob pattern="*.gz"/>
    <magic priority="50">
      <match type="string" offset="0" value="\x1f\x8b\x08"/>
    </magic>
  </mime-type>
  <mime-type type="image/x-gzeps">
    <comment>gzipped encapsulated PostScript</comment>
    <glob pattern="*.eps.gz"/>
    <sub-class-of type="application/gzip"/>
  </mime-type>
  <mime-type type="application/x-compressed-tar">
    <comment>compressed tar archive</comment>
    <glob pattern="*.tar.gz"/>
    <sub-class-of type="application/gzip"/>
  </mime-type>
  <mime-type type="application/zip">
    <comment>zip archive</comment>
    <magic priority="50">
      <match type="string" offset="0" value="PK\x03\x04"/>
    </magic>
  </mime-type>
  <mime-type type="application/vnd.openxmlformats-officedocument.wordprocessingml.document">
    <comment>Word document (OOXML)</comment>
    <glob pattern="*.docx"/>
    <sub-class-of type="application/zip"/>
  </mime-type>
  <mime-type type="application/msword">
    <comment>Word document</comment>
    <magic priority="50">
      <match type="string" offset="0" value="\xd0\xcf\x11\xe0"/>
    </magic>
  </mime-type>
  <mime-type type="application/msword-template">
    <comment>Word template</comment>
    <glob pattern="*.dot"/>
    <sub-class-of type="application/msword"/>
  </mime-type>
  <mime-type type="text/vnd.graphviz">
    <comment>Graphviz DOT file</comment>
    <glob pattern="*.dot"/>
  </mime-type>
  <mime-type type="image/gif">
    <comment>GIF image</comment>
    <glob pattern="*.gif"/>
  </mime-type>
</mime-info>"#;

fn build() -> Repository {
    build_from_xml(
        SAMPLE_DB,
        &Config {
            save: false,
            ..Config::default()
        },
    )
    .unwrap()
}

#[test]
fn png_is_identified_by_name_and_content() {
    let repo = build();
    let png_bytes = b"\x89PNG\r\n\x1a\n";
    assert_eq!(
        repo.detect_by_filename("test.png")[0].name().as_str(),
        "image/png"
    );
    assert_eq!(
        repo.detect_by_content(png_bytes, png_bytes.len())[0]
            .name()
            .as_str(),
        "image/png"
    );
    let result = repo.detect(Some("test.png"), png_bytes, png_bytes.len(), false);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].name().as_str(), "image/png");
}

#[test]
fn eps_gz_beats_plain_gzip_on_filename() {
    let repo = build();
    let gzip_header = b"\x1f\x8b\x08";
    let by_name = repo.detect_by_filename("test.eps.gz");
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].name().as_str(), "image/x-gzeps");

    let by_content = repo.detect_by_content(gzip_header, gzip_header.len());
    assert_eq!(by_content.len(), 1);
    assert_eq!(by_content[0].name().as_str(), "application/gzip");

    let result = repo.detect(Some("test.eps.gz"), gzip_header, gzip_header.len(), false);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].name().as_str(), "image/x-gzeps");
}

#[test]
fn docx_resolves_through_zip_supertype() {
    let repo = build();
    let zip_header = b"PK\x03\x04";
    let result = repo.detect(Some("test.docx"), zip_header, zip_header.len(), false);
    assert_eq!(result.len(), 1);
    assert_eq!(
        result[0].name().as_str(),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    );
}

#[test]
fn tar_gz_beats_gz_via_longest_pattern() {
    let repo = build();
    let by_name = repo.detect_by_filename("test.tar.gz");
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].name().as_str(), "application/x-compressed-tar");
}

#[test]
fn dot_is_disambiguated_by_word_magic() {
    let repo = build();
    let by_name = repo.detect_by_filename("test.dot");
    assert_eq!(by_name.len(), 2);
    let ole2_header = b"\xd0\xcf\x11\xe0";
    let result = repo.detect(Some("test.dot"), ole2_header, ole2_header.len(), false);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].name().as_str(), "application/msword-template");
}

#[test]
fn unknown_extension_falls_back_to_content() {
    let repo = build();
    let png_bytes = b"\x89PNG\r\n\x1a\n";
    let by_name = repo.detect_by_filename("unknown.bin");
    assert!(by_name.is_empty());
    let result = repo.detect(Some("unknown.bin"), png_bytes, png_bytes.len(), false);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].name().as_str(), "image/png");
}

#[test]
fn filename_detection_is_case_insensitive() {
    let repo = build();
    let result = repo.detect_by_filename("IMAGE.GIF");
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].name().as_str(), "image/gif");
}
