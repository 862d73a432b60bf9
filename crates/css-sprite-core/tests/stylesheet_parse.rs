use css_sprite_core::prelude::*;
use css_sprite_core::{GroupingRule, ImportRule};

#[test]
fn parses_rule_kinds() {
    let sheet = Stylesheet::parse(
        r#"@import url("b.css") screen;
           .a, .b { background: url(a.png) no-repeat; WIDTH: 16px }
           @media print { .c { color: red } }
           @font-face { font-family: x; src: url(x.woff) }"#,
    );
    assert_eq!(sheet.rules.len(), 4);

    let RuleTree::Import(ImportRule { href, media, nested }) = &sheet.rules[0] else {
        panic!("expected import");
    };
    assert_eq!(href, "b.css");
    assert_eq!(media, "screen");
    assert!(nested.is_none());

    let RuleTree::Style(a) = &sheet.rules[1] else {
        panic!("expected style rule");
    };
    assert_eq!(a.selector, ".a, .b");
    assert_eq!(a.declaration.get("background"), Some("url(a.png) no-repeat"));
    assert_eq!(a.declaration.get("width"), Some("16px"));

    let RuleTree::Grouping(GroupingRule { condition, children }) = &sheet.rules[2] else {
        panic!("expected grouping rule");
    };
    assert_eq!(condition, "@media print");
    assert_eq!(children.len(), 1);

    let RuleTree::Style(font) = &sheet.rules[3] else {
        panic!("expected declaration-block at-rule");
    };
    assert_eq!(font.selector, "@font-face");
    assert_eq!(font.declaration.get("font-family"), Some("x"));
}

#[test]
fn important_is_kept_in_value() {
    let sheet = Stylesheet::parse(".a { color: red !important }");
    let rule = sheet.style_rule(&[0]).expect("rule");
    assert_eq!(rule.declaration.get("color"), Some("red !important"));
}

#[test]
fn serializes_rules_one_per_line() {
    let sheet = Stylesheet::parse(".a{color:red;width:1px}@media screen{.b{height:2px}}");
    assert_eq!(
        sheet.to_css(),
        ".a {\n  color: red;\n  width: 1px;\n}\n@media screen {\n  .b {\n    height: 2px;\n  }\n}\n"
    );
}

#[test]
fn resolved_imports_are_inlined() {
    let mut sheet = Stylesheet::parse("@import 'x.css'; @import 'y.css' print; .a { color: red }");
    if let RuleTree::Import(imp) = &mut sheet.rules[0] {
        imp.nested = Some(Stylesheet::parse(".n { width: 1px }"));
    }
    assert_eq!(
        sheet.to_css(),
        ".n {\n  width: 1px;\n}\n@import url(\"y.css\") print;\n.a {\n  color: red;\n}\n"
    );
}

#[test]
fn block_less_at_rules_pass_through() {
    let sheet = Stylesheet::parse("@namespace svg url(http://www.w3.org/2000/svg); .a { color: red }");
    assert_eq!(
        sheet.rules[0],
        RuleTree::Statement("@namespace svg url(http://www.w3.org/2000/svg);".into())
    );
}

#[test]
fn from_file_reports_missing_files() {
    let err = Stylesheet::from_file(std::path::Path::new("definitely/missing.css"))
        .expect_err("missing file");
    assert!(matches!(err, SpriteError::Io { .. }));
}
