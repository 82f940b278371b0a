//! Round-trips a built repository through the binary cache on a real file on
//! disk via `tempfile`, matching how a long-lived process would actually use
//! [`shared_mime_info::load`].

use shared_mime_info::{build_from_xml, cache, Config};

const DB: &str = r#"<mime-info>
  <mime-type type="text/markdown">
    <comment>Markdown document</comment>
    <glob pattern="*.md" weight="60"/>
    <glob pattern="*.markdown"/>
  </mime-type>
  <mime-type type="application/pdf">
    <comment>PDF document</comment>
    <magic priority="50">
      <match type="string" offset="0" value="%PDF-"/>
    </magic>
  </mime-type>
</mime-info>"#;

#[test]
fn cache_round_trips_through_a_real_file() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("mime.cache");

    let original = build_from_xml(DB, &Config { save: false, ..Config::default() }).unwrap();
    cache::save_to_path(&cache_path, &original);

    let restored = cache::load_from_path(&cache_path).unwrap();

    assert_eq!(restored.mime_types().len(), original.mime_types().len());
    assert_eq!(restored.max_test_bytes(), original.max_test_bytes());

    let md = restored.detect_by_filename("notes.md");
    assert_eq!(md.len(), 1);
    assert_eq!(md[0].name().as_str(), "text/markdown");

    let pdf_bytes = b"%PDF-1.7";
    let pdf = restored.detect_by_content(pdf_bytes, pdf_bytes.len());
    assert_eq!(pdf.len(), 1);
    assert_eq!(pdf[0].name().as_str(), "application/pdf");
}

#[test]
fn invalid_cache_signature_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let bogus_path = dir.path().join("bogus.cache");
    std::fs::write(&bogus_path, b"not a cache file at all").unwrap();

    assert!(cache::load_from_path(&bogus_path).is_err());
}
