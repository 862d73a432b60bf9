//! Writes composite references and offsets back into declarations.

use crate::background::leading_integer;
use crate::declaration::Declaration;
use crate::stylesheet::{RuleTree, StyleRule, Stylesheet};

/// Points `decl` at its region of a composite.
///
/// The new offset is the existing offset (leading integer, 0 if absent) minus
/// the placement, written in `px`. Without `shared_image` the declaration gets
/// `background-image: url(name)` and is folded back into a `background`
/// shorthand. With `shared_image` the image comes from a shared rule instead, so
/// `background-image` is removed and only `background-position` is written.
pub fn rewrite_declaration(decl: &mut Declaration, composite: &str, x: u32, y: u32, shared_image: bool) {
    let offset_x = existing_offset(decl, "background-position-x") - i64::from(x);
    let offset_y = existing_offset(decl, "background-position-y") - i64::from(y);
    decl.set("background-position-x", format!("{offset_x}px"));
    decl.set("background-position-y", format!("{offset_y}px"));

    if shared_image {
        decl.remove("background-image");
        decl.join_position();
    } else {
        decl.set("background-image", format!("url({composite})"));
        decl.merge();
    }
}

fn existing_offset(decl: &Declaration, name: &str) -> i64 {
    decl.get(name).and_then(leading_integer).unwrap_or(0)
}

/// Rule carrying the composite's `background-image` for every selector that uses it.
/// Duplicate selectors are listed once.
pub fn shared_image_rule<'a>(selectors: impl IntoIterator<Item = &'a str>, composite: &str) -> StyleRule {
    let mut unique: Vec<&str> = Vec::new();
    for sel in selectors {
        let sel = sel.trim();
        if !sel.is_empty() && !unique.contains(&sel) {
            unique.push(sel);
        }
    }
    let declaration: Declaration = [("background-image", format!("url({composite})"))]
        .into_iter()
        .collect();
    StyleRule::new(unique.join(", "), declaration)
}

/// Inserts `rule` after the sheet's leading `@import`/statement rules, which must
/// stay first to remain valid.
pub fn insert_after_prelude(sheet: &mut Stylesheet, rule: StyleRule) {
    let at = sheet
        .rules
        .iter()
        .position(|r| !matches!(r, RuleTree::Import(_) | RuleTree::Statement(_)))
        .unwrap_or(sheet.rules.len());
    sheet.rules.insert(at, RuleTree::Style(rule));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_subtract_placement_from_existing_position() {
        let mut d: Declaration = [
            ("background-image", "url(a.png)"),
            ("background-position-x", "-4px"),
            ("background-position-y", "2px"),
            ("background-repeat", "no-repeat"),
        ]
        .into_iter()
        .collect();
        rewrite_declaration(&mut d, "s.png", 10, 0, false);
        assert_eq!(d.get("background"), Some("url(s.png) -14px 2px no-repeat"));
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn shared_mode_keeps_longhands_without_image() {
        let mut d: Declaration = [("background-image", "url(a.png)"), ("width", "8px")]
            .into_iter()
            .collect();
        rewrite_declaration(&mut d, "s.png", 0, 16, true);
        assert_eq!(d.get("background-image"), None);
        assert_eq!(d.get("background-position"), Some("0px -16px"));
        assert_eq!(d.get("background"), None);
    }

    #[test]
    fn shared_rule_follows_imports() {
        let mut sheet = Stylesheet::parse("@namespace svg url(http://www.w3.org/2000/svg); .a { color: red }");
        insert_after_prelude(&mut sheet, shared_image_rule([".x", ".y", ".x"], "s.png"));
        let RuleTree::Style(rule) = &sheet.rules[1] else {
            panic!("expected style rule");
        };
        assert_eq!(rule.selector, ".x, .y");
        assert_eq!(rule.declaration.get("background-image"), Some("url(s.png)"));
    }
}
