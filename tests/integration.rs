//! Integration tests for fontmatch
//!
//! Exercise rule parse/build through the public API against real
//! fontconfig-shaped documents, including file load and save.

use std::fs;

use fontmatch::{
    Document, FontMatchRule, FontconfigError, RuleSet, WriteOptions, XmlTree,
};

const USER_CONF: &str = r#"<?xml version="1.0"?>
<!DOCTYPE fontconfig SYSTEM "urn:fontconfig:fonts.dtd">
<fontconfig>
  <match target="pattern">
    <test name="family"><string>Arial</string></test>
    <test name="weight" compare="more_eq"><int>200</int></test>
    <edit name="family" binding="strong" mode="prepend">
      <string>Liberation Sans</string>
      <string>Arimo</string>
    </edit>
  </match>
  <alias>
    <family>serif</family>
    <prefer><family>Noto Serif</family></prefer>
  </alias>
</fontconfig>
"#;

fn first_match(doc: &Document) -> fontmatch::NodeId {
    let root = doc.document_element().expect("root element");
    doc.element_children(root)
        .into_iter()
        .find(|n| doc.tag_name(*n) == Some("match"))
        .expect("match element")
}

// -- Parsing -------------------------------------------------------------------

#[test]
fn test_parse_rule_from_user_conf() {
    let doc = Document::parse(USER_CONF.as_bytes()).unwrap();
    let rule = FontMatchRule::from_node(&doc, first_match(&doc));
    assert_eq!(
        rule,
        FontMatchRule::substitute("Arial", None, ["Liberation Sans", "Arimo"])
    );
}

#[test]
fn test_parse_does_not_modify_document() {
    let doc = Document::parse(USER_CONF.as_bytes()).unwrap();
    let before = doc.to_xml_string(&WriteOptions::preserve()).unwrap();
    let _ = FontMatchRule::from_node(&doc, first_match(&doc));
    let after = doc.to_xml_string(&WriteOptions::preserve()).unwrap();
    assert_eq!(before, USER_CONF);
    assert_eq!(after, USER_CONF);
}

// -- Building ------------------------------------------------------------------

#[test]
fn test_build_appends_after_existing_content() {
    let mut doc = Document::parse(USER_CONF.as_bytes()).unwrap();
    let rule = FontMatchRule::substitute("sans-serif", Some("ja"), ["Noto Sans CJK JP"]);
    let node = rule.build(&mut doc).unwrap().unwrap();

    let root = doc.document_element().unwrap();
    let elements = doc.element_children(root);
    assert_eq!(elements.len(), 3);
    assert_eq!(elements.last().copied(), Some(node));
}

#[test]
fn test_build_output_matches_fontconfig_layout() {
    let mut doc = Document::new_fontconfig();
    FontMatchRule::substitute("Arial", Some("ja"), ["Noto Sans CJK JP", "Noto Sans"])
        .build(&mut doc)
        .unwrap();

    let xml = doc.to_xml_string(&WriteOptions::default()).unwrap();
    let expected = r#"<?xml version="1.0"?>
<!DOCTYPE fontconfig SYSTEM "urn:fontconfig:fonts.dtd">
<fontconfig>
  <match>
    <test name="family">
      <string>Arial</string>
    </test>
    <test name="lang">
      <string>ja</string>
    </test>
    <edit name="family" binding="strong" mode="prepend">
      <string>Noto Sans CJK JP</string>
      <string>Noto Sans</string>
    </edit>
  </match>
</fontconfig>
"#;
    assert_eq!(xml, expected);
}

#[test]
fn test_build_default_language_is_not_written() {
    let mut doc = Document::new_fontconfig();
    FontMatchRule::substitute("Arial", Some("En"), ["Noto Sans"])
        .build(&mut doc)
        .unwrap();
    let xml = doc.to_xml_string(&WriteOptions::default()).unwrap();
    assert!(!xml.contains(r#"name="lang""#));
}

#[test]
fn test_build_without_root_fails() {
    let mut doc = Document::new();
    let err = FontMatchRule::substitute("Arial", None, ["Noto Sans"])
        .build(&mut doc)
        .unwrap_err();
    assert_eq!(
        err,
        FontconfigError::MissingRoot {
            tag: "fontconfig".to_string()
        }
    );
}

#[test]
fn test_built_document_reparses_to_same_rules() {
    let mut doc = Document::new_fontconfig();
    let rules = [
        FontMatchRule::substitute("Arial", None, ["Liberation Sans"]),
        FontMatchRule::substitute("sans-serif", Some("zh-cn"), ["Noto Sans CJK SC", "Noto Sans"]),
    ];
    for rule in &rules {
        rule.build(&mut doc).unwrap();
    }

    let xml = doc.to_xml_string(&WriteOptions::default()).unwrap();
    let reparsed = Document::parse(xml.as_bytes()).unwrap();
    let set = RuleSet::from_document(&reparsed).unwrap();
    assert_eq!(set.rules(), &rules);
}

// -- Files ---------------------------------------------------------------------

const SIMPLE_CONF: &str = r#"<?xml version="1.0"?>
<!DOCTYPE fontconfig SYSTEM "urn:fontconfig:fonts.dtd">
<fontconfig>
  <match>
    <test name="family"><string>Arial</string></test>
    <edit name="family" binding="strong" mode="prepend">
      <string>Liberation Sans</string>
    </edit>
  </match>
  <alias>
    <family>serif</family>
    <prefer><family>Noto Serif</family></prefer>
  </alias>
</fontconfig>
"#;

#[test]
fn test_open_edit_save_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fonts.conf");
    fs::write(&path, SIMPLE_CONF).unwrap();

    let mut doc = Document::open(&path).unwrap();
    let mut set = RuleSet::from_document(&doc).unwrap();
    set.upsert(FontMatchRule::substitute("Arial", None, ["Arimo"]));
    set.write_to_document(&mut doc).unwrap();
    doc.save(&path, &WriteOptions::default()).unwrap();

    let saved = fs::read_to_string(&path).unwrap();
    assert!(saved.starts_with("<?xml version=\"1.0\"?>\n<!DOCTYPE fontconfig"));
    assert!(saved.contains("<alias>"));
    assert!(!saved.contains("Liberation Sans"));

    let reloaded = Document::open(&path).unwrap();
    let set = RuleSet::from_document(&reloaded).unwrap();
    assert_eq!(set.len(), 1);
    assert_eq!(
        set.rules()[0].family_edit,
        Some(vec!["Arimo".to_string()])
    );
}

#[test]
fn test_rule_set_skips_match_with_extra_tests() {
    let doc = Document::parse(USER_CONF.as_bytes()).unwrap();
    let set = RuleSet::from_document(&doc).unwrap();
    assert!(set.is_empty());
}

#[test]
fn test_open_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Document::open(dir.path().join("missing.conf")).unwrap_err();
    assert!(matches!(err, FontconfigError::Io(_)));
}
