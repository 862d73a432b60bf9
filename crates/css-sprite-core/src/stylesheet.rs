//! Stylesheet rule tree, parsing (via `cssparser`) and serialization.

use crate::declaration::Declaration;
use crate::error::{Result, SpriteError};
use cssparser::{
    AtRuleParser, BasicParseErrorKind, CowRcStr, DeclarationParser, ParseError, Parser,
    ParserInput, ParserState, QualifiedRuleParser, RuleBodyItemParser, RuleBodyParser,
    StyleSheetParser,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A parsed stylesheet: top-level rules in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stylesheet {
    pub rules: Vec<RuleTree>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleTree {
    Style(StyleRule),
    Import(ImportRule),
    Grouping(GroupingRule),
    /// Block-less at-rule carried through verbatim (`@charset "utf-8";`).
    Statement(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleRule {
    /// Selector list, or the at-rule prelude for `@font-face`/`@page` blocks.
    pub selector: String,
    pub declaration: Declaration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRule {
    pub href: String,
    /// Media query list following the URL, possibly empty.
    pub media: String,
    /// Imported sheet once resolved; serialized inline instead of the `@import`.
    pub nested: Option<Stylesheet>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingRule {
    /// At-rule keyword and prelude, e.g. `@media screen and (min-width: 10px)`.
    pub condition: String,
    pub children: Vec<RuleTree>,
}

impl StyleRule {
    pub fn new(selector: impl Into<String>, declaration: Declaration) -> Self {
        Self {
            selector: selector.into(),
            declaration,
        }
    }
}

impl Stylesheet {
    pub fn parse(css: &str) -> Self {
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        let mut rules_parser = RuleListParser;
        let rules = StyleSheetParser::new(&mut parser, &mut rules_parser)
            .flatten()
            .collect();
        Self { rules }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let css = fs::read_to_string(path).map_err(|e| SpriteError::io(path, e))?;
        Ok(Self::parse(&css))
    }

    /// Resolves a rule path: each step indexes the current rule list, descending
    /// into grouping children and resolved import sheets.
    pub fn rule(&self, path: &[usize]) -> Option<&RuleTree> {
        let (first, rest) = path.split_first()?;
        let mut rule = self.rules.get(*first)?;
        for &step in rest {
            rule = match rule {
                RuleTree::Grouping(g) => g.children.get(step)?,
                RuleTree::Import(ImportRule {
                    nested: Some(sheet),
                    ..
                }) => sheet.rules.get(step)?,
                _ => return None,
            };
        }
        Some(rule)
    }

    pub fn rule_mut(&mut self, path: &[usize]) -> Option<&mut RuleTree> {
        let (first, rest) = path.split_first()?;
        let mut rule = self.rules.get_mut(*first)?;
        for &step in rest {
            rule = match rule {
                RuleTree::Grouping(g) => g.children.get_mut(step)?,
                RuleTree::Import(ImportRule {
                    nested: Some(sheet),
                    ..
                }) => sheet.rules.get_mut(step)?,
                _ => return None,
            };
        }
        Some(rule)
    }

    pub fn style_rule(&self, path: &[usize]) -> Option<&StyleRule> {
        match self.rule(path)? {
            RuleTree::Style(r) => Some(r),
            _ => None,
        }
    }

    pub fn declaration_mut(&mut self, path: &[usize]) -> Option<&mut Declaration> {
        match self.rule_mut(path)? {
            RuleTree::Style(r) => Some(&mut r.declaration),
            _ => None,
        }
    }

    /// Serializes the sheet. Resolved imports are inlined.
    pub fn to_css(&self) -> String {
        let mut out = String::new();
        write_rules(&self.rules, 0, &mut out);
        out
    }
}

fn write_rules(rules: &[RuleTree], depth: usize, out: &mut String) {
    for rule in rules {
        write_rule(rule, depth, out);
    }
}

fn write_rule(rule: &RuleTree, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    match rule {
        RuleTree::Style(r) => {
            out.push_str(&format!("{indent}{} {{\n", r.selector));
            for (name, value) in r.declaration.iter() {
                out.push_str(&format!("{indent}  {name}: {value};\n"));
            }
            out.push_str(&format!("{indent}}}\n"));
        }
        RuleTree::Import(imp) => match &imp.nested {
            Some(sheet) if imp.media.is_empty() => write_rules(&sheet.rules, depth, out),
            Some(sheet) => {
                out.push_str(&format!("{indent}@media {} {{\n", imp.media));
                write_rules(&sheet.rules, depth + 1, out);
                out.push_str(&format!("{indent}}}\n"));
            }
            None if imp.media.is_empty() => {
                out.push_str(&format!("{indent}@import url(\"{}\");\n", imp.href));
            }
            None => {
                out.push_str(&format!(
                    "{indent}@import url(\"{}\") {};\n",
                    imp.href, imp.media
                ));
            }
        },
        RuleTree::Grouping(g) => {
            out.push_str(&format!("{indent}{} {{\n", g.condition));
            write_rules(&g.children, depth + 1, out);
            out.push_str(&format!("{indent}}}\n"));
        }
        RuleTree::Statement(text) => {
            out.push_str(&format!("{indent}{text}\n"));
        }
    }
}

/// At-rules whose block is a declaration list rather than a rule list.
fn has_declaration_block(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "font-face" | "page" | "viewport" | "counter-style" | "property" | "font-palette-values"
    )
}

fn consume_rest<'i>(input: &mut Parser<'i, '_>) -> &'i str {
    let start = input.position();
    while input.next_including_whitespace_and_comments().is_ok() {}
    input.slice_from(start).trim()
}

enum AtPrelude {
    Import { href: String, media: String },
    Block { text: String, declarations: bool },
}

/// Parses rule lists: the top level and the bodies of grouping at-rules.
struct RuleListParser;

impl<'i> AtRuleParser<'i> for RuleListParser {
    type Prelude = AtPrelude;
    type AtRule = RuleTree;
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> std::result::Result<Self::Prelude, ParseError<'i, Self::Error>> {
        if name.eq_ignore_ascii_case("import") {
            let href = String::from(&*input.expect_url_or_string()?);
            let media = consume_rest(input).to_owned();
            return Ok(AtPrelude::Import { href, media });
        }
        let prelude = consume_rest(input);
        let text = if prelude.is_empty() {
            format!("@{}", &*name)
        } else {
            format!("@{} {}", &*name, prelude)
        };
        Ok(AtPrelude::Block {
            text,
            declarations: has_declaration_block(&name),
        })
    }

    fn rule_without_block(
        &mut self,
        prelude: Self::Prelude,
        _start: &ParserState,
    ) -> std::result::Result<Self::AtRule, ()> {
        Ok(match prelude {
            AtPrelude::Import { href, media } => RuleTree::Import(ImportRule {
                href,
                media,
                nested: None,
            }),
            AtPrelude::Block { text, .. } => RuleTree::Statement(format!("{text};")),
        })
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> std::result::Result<Self::AtRule, ParseError<'i, Self::Error>> {
        match prelude {
            AtPrelude::Import { .. } => Err(input.new_error(BasicParseErrorKind::AtRuleBodyInvalid)),
            AtPrelude::Block {
                text,
                declarations: true,
            } => Ok(RuleTree::Style(StyleRule::new(text, parse_declarations(input)))),
            AtPrelude::Block { text, .. } => Ok(RuleTree::Grouping(GroupingRule {
                condition: text,
                children: parse_rule_list(input),
            })),
        }
    }
}

impl<'i> QualifiedRuleParser<'i> for RuleListParser {
    type Prelude = String;
    type QualifiedRule = RuleTree;
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> std::result::Result<Self::Prelude, ParseError<'i, Self::Error>> {
        Ok(consume_rest(input).to_owned())
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> std::result::Result<Self::QualifiedRule, ParseError<'i, Self::Error>> {
        Ok(RuleTree::Style(StyleRule::new(prelude, parse_declarations(input))))
    }
}

impl<'i> DeclarationParser<'i> for RuleListParser {
    type Declaration = RuleTree;
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        _name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
        _declaration_start: &ParserState,
    ) -> std::result::Result<Self::Declaration, ParseError<'i, Self::Error>> {
        Err(input.new_error(BasicParseErrorKind::QualifiedRuleInvalid))
    }
}

impl<'i> RuleBodyItemParser<'i, RuleTree, ()> for RuleListParser {
    fn parse_declarations(&self) -> bool {
        false
    }
    fn parse_qualified(&self) -> bool {
        true
    }
}

fn parse_rule_list(block: &mut Parser) -> Vec<RuleTree> {
    let mut rules_parser = RuleListParser;
    RuleBodyParser::new(block, &mut rules_parser)
        .flatten()
        .collect()
}

/// Parses declaration blocks into `(name, value)` pairs.
struct DeclarationListParser;

impl<'i> DeclarationParser<'i> for DeclarationListParser {
    type Declaration = (String, String);
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
        _declaration_start: &ParserState,
    ) -> std::result::Result<Self::Declaration, ParseError<'i, Self::Error>> {
        let value = consume_rest(input).to_owned();
        Ok((name.to_ascii_lowercase(), value))
    }
}

impl<'i> AtRuleParser<'i> for DeclarationListParser {
    type Prelude = ();
    type AtRule = (String, String);
    type Error = ();
}

impl<'i> QualifiedRuleParser<'i> for DeclarationListParser {
    type Prelude = ();
    type QualifiedRule = (String, String);
    type Error = ();
}

impl<'i> RuleBodyItemParser<'i, (String, String), ()> for DeclarationListParser {
    fn parse_declarations(&self) -> bool {
        true
    }
    fn parse_qualified(&self) -> bool {
        false
    }
}

fn parse_declarations(block: &mut Parser) -> Declaration {
    let mut decl_parser = DeclarationListParser;
    RuleBodyParser::new(block, &mut decl_parser)
        .flatten()
        .collect()
}
