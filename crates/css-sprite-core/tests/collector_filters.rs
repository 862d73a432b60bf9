use css_sprite_core::prelude::*;
use image::{Rgba, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};

fn png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    RgbaImage::from_pixel(w, h, Rgba([0, 128, 255, 255]))
        .save(&path)
        .expect("write png");
    path
}

fn css(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    fs::write(&path, body).expect("write css");
    path
}

fn collect(cfg: &SpriteConfig, path: &Path) -> (Stylesheet, CollectedImages) {
    let mut sheet = Stylesheet::from_file(path).expect("parse");
    let mut out = CollectedImages::new();
    let mut collector = StyleCollector::new(cfg).expect("collector");
    collector.collect(0, &mut sheet, path, &mut out);
    (sheet, out)
}

fn value<'a>(sheet: &'a Stylesheet, index: usize, name: &str) -> Option<&'a str> {
    sheet.style_rule(&[index])?.declaration.get(name)
}

#[test]
fn only_eligible_declarations_are_collected() {
    let dir = tempfile::tempdir().expect("tempdir");
    png(dir.path(), "a.png", 8, 8);
    let path = css(
        dir.path(),
        "icons.css",
        ".a { background: url(a.png) no-repeat; }
         .b { background: url(a.png) right top no-repeat; }
         .c { background-image: url(a.png); background-repeat: repeat-x; }
         .d { background: url(missing.png) no-repeat; }
         .e { background: url(http://cdn.example.com/a.png); }
         .f { background: url(a.png); background-size: 10px; }
         .g { background-image: url(a.png), url(b.png); }
         .h { background-image: url(a.jpg); }",
    );
    let cfg = SpriteConfig::builder().workspace(dir.path()).build();
    let (sheet, out) = collect(&cfg, &path);

    assert_eq!(out.len(), 1);
    let r = &out.as_slice()[0];
    assert_eq!(r.logical_url, "a.png");
    assert_eq!(
        r.absolute_path,
        fs::canonicalize(dir.path().join("a.png")).expect("canonical")
    );
    assert_eq!(r.declarations, vec![DeclarationRef { sheet: 0, path: vec![0] }]);

    // collected declaration is left expanded for the rewriter
    assert_eq!(value(&sheet, 0, "background"), None);
    assert_eq!(value(&sheet, 0, "background-image"), Some("url(a.png)"));

    // rejected ones keep their original text
    assert_eq!(value(&sheet, 1, "background"), Some("url(a.png) right top no-repeat"));
    assert_eq!(value(&sheet, 2, "background-repeat"), Some("repeat-x"));
    assert_eq!(value(&sheet, 3, "background"), Some("url(missing.png) no-repeat"));
    assert_eq!(value(&sheet, 4, "background"), Some("url(http://cdn.example.com/a.png)"));
    assert_eq!(value(&sheet, 5, "background"), Some("url(a.png)"));
    assert_eq!(value(&sheet, 6, "background-image"), Some("url(a.png), url(b.png)"));
    assert_eq!(value(&sheet, 7, "background-image"), Some("url(a.jpg)"));
}

#[test]
fn longhand_positions_are_restored_on_rejection() {
    let dir = tempfile::tempdir().expect("tempdir");
    png(dir.path(), "a.png", 8, 8);
    let path = css(
        dir.path(),
        "a.css",
        ".a { background-image: url(a.png); background-position: center 0; color: red }",
    );
    let cfg = SpriteConfig::builder().workspace(dir.path()).build();
    let (sheet, out) = collect(&cfg, &path);
    assert!(out.is_empty());
    let rule = sheet.style_rule(&[0]).expect("rule");
    assert_eq!(
        rule.declaration.names().collect::<Vec<_>>(),
        vec!["background-image", "background-position", "color"]
    );
    assert_eq!(rule.declaration.get("background-position"), Some("center 0"));
}

#[test]
fn imports_and_groups_share_one_reference() {
    let dir = tempfile::tempdir().expect("tempdir");
    png(dir.path(), "img/a.png", 8, 8);
    css(
        dir.path(),
        "css/sub/b.css",
        ".b { background: url(../../img/a.png) 0 -10px no-repeat }",
    );
    let path = css(
        dir.path(),
        "css/main.css",
        "@import \"sub/b.css\";
         @media screen { .a { background: url(../img/a.png?v=2) no-repeat } }",
    );
    let cfg = SpriteConfig::builder().workspace(dir.path()).build();
    let (sheet, out) = collect(&cfg, &path);

    assert_eq!(out.len(), 1);
    let r = &out.as_slice()[0];
    assert_eq!(r.logical_url, "../../img/a.png");
    assert_eq!(
        r.declarations,
        vec![
            DeclarationRef { sheet: 0, path: vec![0, 0] },
            DeclarationRef { sheet: 0, path: vec![1, 0] },
        ]
    );
    let RuleTree::Import(imp) = &sheet.rules[0] else {
        panic!("expected import");
    };
    assert!(imp.nested.is_some());
    assert_eq!(
        sheet.style_rule(&[0, 0]).and_then(|r| r.declaration.get("background-position-y")),
        Some("-10px")
    );
}

#[test]
fn import_cycles_terminate() {
    let dir = tempfile::tempdir().expect("tempdir");
    png(dir.path(), "a.png", 4, 4);
    let path = css(
        dir.path(),
        "a.css",
        "@import 'b.css'; .a { background: url(a.png) no-repeat }",
    );
    css(dir.path(), "b.css", "@import 'a.css'; .b { background: url(a.png) no-repeat }");
    let cfg = SpriteConfig::builder().workspace(dir.path()).build();
    let (sheet, out) = collect(&cfg, &path);

    assert_eq!(out.len(), 1);
    assert_eq!(out.as_slice()[0].declarations.len(), 2);
    let RuleTree::Import(outer) = &sheet.rules[0] else {
        panic!("expected import");
    };
    let nested = outer.nested.as_ref().expect("b.css resolved");
    let RuleTree::Import(inner) = &nested.rules[0] else {
        panic!("expected import");
    };
    assert!(inner.nested.is_none());
}

#[test]
fn ignore_globs_and_unsprite_marker() {
    let dir = tempfile::tempdir().expect("tempdir");
    png(dir.path(), "icons/skip1.png", 4, 4);
    png(dir.path(), "icons/keep.png", 4, 4);
    let path = css(
        dir.path(),
        "site.css",
        ".s { background: url(icons/skip1.png) no-repeat }
         .k { background: url(icons/keep.png) no-repeat }
         .u { background: url(icons/keep.png#unsprite) no-repeat }",
    );
    let cfg = SpriteConfig::builder()
        .workspace(dir.path())
        .ignore_image("icons/skip*.png")
        .build();
    let (sheet, out) = collect(&cfg, &path);

    assert_eq!(out.len(), 1);
    assert_eq!(out.as_slice()[0].logical_url, "icons/keep.png");
    assert_eq!(out.as_slice()[0].declarations.len(), 1);
    assert_eq!(value(&sheet, 0, "background"), Some("url(icons/skip1.png) no-repeat"));
    assert_eq!(value(&sheet, 2, "background"), Some("url(icons/keep.png) no-repeat"));
}

#[test]
fn invalid_ignore_glob_is_a_config_error() {
    let cfg = SpriteConfig::builder().ignore_image("a[").build();
    assert!(matches!(
        StyleCollector::new(&cfg),
        Err(SpriteError::InvalidConfig(_))
    ));
}

#[test]
fn important_backgrounds_are_never_sprited() {
    let dir = tempfile::tempdir().expect("tempdir");
    png(dir.path(), "a.png", 8, 8);
    let path = css(
        dir.path(),
        "prio.css",
        ".a { background: url(a.png) no-repeat !important }
         .b { background-image: url(a.png) !important; background-repeat: no-repeat; width: 8px }",
    );
    let cfg = SpriteConfig::builder().workspace(dir.path()).build();
    let (sheet, out) = collect(&cfg, &path);

    assert!(out.is_empty());
    assert_eq!(value(&sheet, 0, "background"), Some("url(a.png) no-repeat !important"));
    let b = sheet.style_rule(&[1]).expect("rule b");
    assert_eq!(
        b.declaration.names().collect::<Vec<_>>(),
        vec!["background-image", "background-repeat", "width"]
    );
    assert_eq!(b.declaration.get("background-image"), Some("url(a.png) !important"));
}

#[test]
fn unresolvable_imports_are_skipped_silently() {
    let dir = tempfile::tempdir().expect("tempdir");
    png(dir.path(), "a.png", 8, 8);
    fs::write(dir.path().join("x.less"), ".x { color: red }").expect("write less");
    let path = css(
        dir.path(),
        "main.css",
        "@import 'nope.css'; @import 'x.less'; .a { background: url(a.png) no-repeat }",
    );
    let cfg = SpriteConfig::builder().workspace(dir.path()).build();
    let (sheet, out) = collect(&cfg, &path);

    assert_eq!(out.len(), 1);
    assert_eq!(
        out.as_slice()[0].declarations,
        vec![DeclarationRef { sheet: 0, path: vec![2] }]
    );
    for (i, href) in [(0, "nope.css"), (1, "x.less")] {
        let RuleTree::Import(imp) = &sheet.rules[i] else {
            panic!("expected import");
        };
        assert_eq!(imp.href, href);
        assert!(imp.nested.is_none());
    }
    let text = sheet.to_css();
    assert!(text.starts_with("@import url(\"nope.css\");\n@import url(\"x.less\");\n"), "{text}");
}

#[test]
fn root_relative_imports_resolve_against_workspace() {
    let dir = tempfile::tempdir().expect("tempdir");
    png(dir.path(), "img/a.png", 8, 8);
    css(dir.path(), "shared/x.css", ".x { background: url(/img/a.png) no-repeat }");
    let path = css(dir.path(), "pages/home.css", "@import '/shared/x.css';");
    let cfg = SpriteConfig::builder().workspace(dir.path()).build();
    let (sheet, out) = collect(&cfg, &path);

    assert_eq!(out.len(), 1);
    assert_eq!(
        out.as_slice()[0].declarations,
        vec![DeclarationRef { sheet: 0, path: vec![0, 0] }]
    );
    let RuleTree::Import(imp) = &sheet.rules[0] else {
        panic!("expected import");
    };
    assert!(imp.nested.is_some());
}
