//! Parse Module
//!
//! Template parsing on top of html5ever. html5ever knows nothing about
//! directive syntax, so the source is normalized first:
//!
//! 1. `{{ ... }}` interpolations become `__LZ_EXPR_n__` placeholders and
//!    quoted attribute values become `"__LZ_ATTR_n__"`, which keeps `>` and
//!    `<` inside expressions away from the tokenizer
//! 2. self-closing tags are expanded
//! 3. uppercase tags are marked so their casing survives lowercasing
//!
//! The DOM is then converted into `TemplateChildNode`s with the placeholders
//! restored.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use lazy_static::lazy_static;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

use crate::ast::{
    AttributeNode, CommentNode, DirectiveNode, ElementNode, ElementType, ExpressionNode, InterpolationNode, PropNode, RootNode,
    SimpleExpression, SourceLocation, TemplateChildNode, TextNode,
};
use crate::error::{CompilerError, INVALID_EXPRESSION, PARSE_ERROR};
use crate::js_eval;
use crate::options::CompileOptions;

lazy_static! {
    static ref EXPR_PLACEHOLDER_RE: Regex = Regex::new(r"__LZ_EXPR_(\d+)__").unwrap();
    static ref ATTR_PLACEHOLDER_RE: Regex = Regex::new(r"^__LZ_ATTR_(\d+)__$").unwrap();
    static ref SELF_CLOSING_RE: Regex = Regex::new(r"<([A-Za-z][A-Za-z0-9.\-]*)([^<>]*?)\s*/>").unwrap();
    static ref TAG_OPEN_RE: Regex = Regex::new(r"<([A-Z][A-Za-z0-9.\-]*)(\s|>)").unwrap();
    /// `v-name:arg.mod1.mod2` after shorthand expansion
    static ref DIRECTIVE_RE: Regex = Regex::new(r"^v-([a-z0-9\-]+)(?::(\[[^\]]+\]|[^.]+))?((?:\.[^.]+)*)$").unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

const ORIGINAL_NAME_ATTR: &str = "data-lz-orig-name";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

/// Directives whose values are not plain expressions.
const NON_EXPRESSION_DIRECTIVES: &[&str] = &["on", "for", "slot"];

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE NORMALIZATION
// ═══════════════════════════════════════════════════════════════════════════════

/// A value cut out of the source before html5ever sees it.
#[derive(Debug, Clone)]
struct Extracted {
    text: String,
    location: SourceLocation,
}

#[derive(Debug, Default)]
struct Normalized {
    html: String,
    expressions: HashMap<usize, Extracted>,
    attributes: HashMap<usize, Extracted>,
}

/// 1-based line/column of byte offset `at` in `source`.
fn position(source: &str, at: usize) -> (u32, u32) {
    let before = &source[..at];
    let line = before.matches('\n').count() as u32 + 1;
    let column = match before.rfind('\n') {
        Some(nl) => before[nl + 1..].chars().count() as u32 + 1,
        None => before.chars().count() as u32 + 1,
    };
    (line, column)
}

fn extracted(source: &str, at: usize, text: &str) -> Extracted {
    let (line, column) = position(source, at);
    Extracted {
        text: text.to_string(),
        location: SourceLocation::new(line, column, text),
    }
}

/// Replace interpolations in text and quoted attribute values inside tags
/// with placeholders. Scans the original source so recorded positions are
/// exact. Comments are copied through untouched.
fn extract_values(source: &str, out: &mut Normalized) -> String {
    let mut html = String::with_capacity(source.len());
    let mut in_tag = false;
    let mut i = 0;

    while i < source.len() {
        let rest = &source[i..];
        if !in_tag {
            if rest.starts_with("<!--") {
                let end = rest.find("-->").map(|e| e + 3).unwrap_or(rest.len());
                html.push_str(&rest[..end]);
                i += end;
                continue;
            }
            if rest.starts_with("{{") {
                if let Some(end) = rest.find("}}") {
                    let inner = &rest[2..end];
                    let leading = inner.len() - inner.trim_start().len();
                    let index = out.expressions.len();
                    out.expressions.insert(index, extracted(source, i + 2 + leading, inner.trim()));
                    html.push_str(&format!("__LZ_EXPR_{}__", index));
                    i += end + 2;
                    continue;
                }
            }
            if rest.starts_with('<') && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
                in_tag = true;
            }
        } else if rest.starts_with('>') {
            in_tag = false;
        } else if rest.starts_with(['"', '\'']) {
            let quote = if rest.starts_with('"') { '"' } else { '\'' };
            let close = rest[1..].find(quote).map(|e| e + 1).unwrap_or(rest.len());
            let index = out.attributes.len();
            out.attributes.insert(index, extracted(source, i + 1, &rest[1..close]));
            html.push_str(&format!("\"__LZ_ATTR_{}__\"", index));
            i += (close + 1).min(rest.len());
            continue;
        }

        let ch = rest.chars().next().unwrap_or(' ');
        html.push(ch);
        i += ch.len_utf8();
    }
    html
}

/// html5ever treats `<Panel />` as an opening tag, swallowing following
/// siblings as children. Void elements are left alone: `</br>` would parse
/// as a second `<br>`.
fn convert_self_closing(html: &str) -> String {
    SELF_CLOSING_RE
        .replace_all(html, |caps: &regex::Captures| {
            let tag = &caps[1];
            if VOID_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str()) {
                format!("<{}{}>", tag, &caps[2])
            } else {
                format!("<{}{}></{}>", tag, &caps[2], tag)
            }
        })
        .to_string()
}

/// Mark uppercase tags with their original name; html5ever lowercases tags.
fn mark_component_tags(html: &str) -> String {
    TAG_OPEN_RE
        .replace_all(html, |caps: &regex::Captures| {
            let name = &caps[1];
            format!("<{} {}=\"{}\"{}", name, ORIGINAL_NAME_ATTR, name, &caps[2])
        })
        .to_string()
}

fn normalize(source: &str) -> Normalized {
    let mut out = Normalized::default();
    let html = extract_values(source, &mut out);
    let html = convert_self_closing(&html);
    out.html = mark_component_tags(&html);
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIRECTIVES
// ═══════════════════════════════════════════════════════════════════════════════

/// Expand shorthands (`:x`, `@x`, `#x`) to their `v-` form.
fn expand_shorthand(name: &str) -> Option<String> {
    if name.starts_with("v-") {
        return Some(name.to_string());
    }
    if let Some(rest) = name.strip_prefix(':') {
        return Some(format!("v-bind:{}", rest));
    }
    if let Some(rest) = name.strip_prefix('@') {
        return Some(format!("v-on:{}", rest));
    }
    if let Some(rest) = name.strip_prefix('#') {
        return Some(format!("v-slot:{}", rest));
    }
    None
}

fn parse_directive(raw_name: &str, value: Option<&Extracted>, location: SourceLocation) -> Option<DirectiveNode> {
    let expanded = expand_shorthand(raw_name)?;
    let caps = DIRECTIVE_RE.captures(&expanded)?;

    let name = caps[1].to_string();
    let arg = caps.get(2).map(|m| {
        let text = m.as_str();
        let dynamic = text.starts_with('[') && text.ends_with(']');
        let content = if dynamic { &text[1..text.len() - 1] } else { text };
        ExpressionNode::Simple(SimpleExpression {
            content: content.to_string(),
            is_static: !dynamic,
            location: SourceLocation::new(location.line, location.column, text),
        })
    });
    let modifiers = caps
        .get(3)
        .map(|m| m.as_str().split('.').filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();
    let exp = value
        .filter(|v| !v.text.trim().is_empty())
        .map(|v| ExpressionNode::Simple(SimpleExpression::parsed(&v.text, v.location.clone())));

    Some(DirectiveNode {
        name,
        arg,
        modifiers,
        exp,
        location: SourceLocation::new(location.line, location.column, raw_name),
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// DOM CONVERSION
// ═══════════════════════════════════════════════════════════════════════════════

struct Converter<'a> {
    normalized: &'a Normalized,
    options: &'a CompileOptions,
}

impl Converter<'_> {
    /// Original text of an attribute value. Unquoted values were never
    /// replaced and come back as-is.
    fn attribute_value(&self, raw: &str) -> Option<Extracted> {
        match ATTR_PLACEHOLDER_RE.captures(raw) {
            Some(caps) => {
                let index: usize = caps[1].parse().ok()?;
                self.normalized.attributes.get(&index).cloned()
            }
            None if raw.is_empty() => None,
            None => Some(Extracted {
                text: raw.to_string(),
                location: SourceLocation::new(1, 1, raw),
            }),
        }
    }

    fn check_expression(&self, source: &str, location: &SourceLocation) -> Result<(), CompilerError> {
        if !self.options.validate_expressions {
            return Ok(());
        }
        js_eval::validate_expression(source).map_err(|detail| {
            CompilerError::new(
                INVALID_EXPRESSION,
                &format!("Invalid expression `{}`: {}", source, detail),
                &self.options.file_path,
                location,
            )
        })
    }

    fn children(&self, handle: &Handle) -> Result<Vec<TemplateChildNode>, CompilerError> {
        let mut nodes = Vec::new();
        for child in handle.children.borrow().iter() {
            nodes.extend(self.node(child)?);
        }
        Ok(nodes)
    }

    fn node(&self, handle: &Handle) -> Result<Vec<TemplateChildNode>, CompilerError> {
        match &handle.data {
            NodeData::Document => self.children(handle),
            NodeData::Text { contents } => {
                let text = contents.borrow().to_string();
                self.text(&text)
            }
            NodeData::Comment { contents } => Ok(vec![TemplateChildNode::Comment(CommentNode {
                content: contents.to_string(),
                location: SourceLocation::stub(),
            })]),
            NodeData::Element {
                name,
                attrs,
                template_contents,
                ..
            } => {
                let attributes = attrs.borrow();
                let mut tag = name.local.to_string();
                for attr in attributes.iter() {
                    if &*attr.name.local == ORIGINAL_NAME_ATTR {
                        tag = attr.value.to_string();
                    }
                }

                let mut element = ElementNode::new(tag.clone());
                let mut located = false;
                if tag.chars().next().map(|c| c.is_ascii_uppercase()).unwrap_or(false) || tag.contains('-') {
                    element.tag_type = ElementType::Component;
                }

                for attr in attributes.iter() {
                    let raw_name = attr.name.local.to_string();
                    if raw_name == ORIGINAL_NAME_ATTR {
                        continue;
                    }
                    let value = self.attribute_value(&attr.value);
                    let location = value.as_ref().map(|v| v.location.clone()).unwrap_or_else(SourceLocation::stub);
                    if !located && value.is_some() {
                        element.location = SourceLocation::new(location.line, location.column, "");
                        located = true;
                    }

                    match parse_directive(&raw_name, value.as_ref(), location.clone()) {
                        Some(dir) => {
                            if let Some(exp) = &dir.exp {
                                if !NON_EXPRESSION_DIRECTIVES.contains(&dir.name.as_str()) {
                                    self.check_expression(exp.source(), exp.location())?;
                                }
                            }
                            element.props.push(PropNode::Directive(dir));
                        }
                        None => {
                            let text = value.map(|v| v.text).unwrap_or_else(|| attr.value.to_string());
                            let mut attribute = AttributeNode::new(raw_name, Some(&text));
                            attribute.location = location;
                            element.props.push(PropNode::Attribute(attribute));
                        }
                    }
                }

                // <template> content lives in a separate document fragment
                let contents = template_contents.borrow();
                element.children = match contents.as_ref() {
                    Some(fragment) => self.children(fragment)?,
                    None => self.children(handle)?,
                };
                Ok(vec![TemplateChildNode::Element(element)])
            }
            NodeData::Doctype { .. } | NodeData::ProcessingInstruction { .. } => Ok(vec![]),
        }
    }

    /// Split text on interpolation placeholders. Whitespace-only runs are
    /// dropped and other whitespace is condensed.
    fn text(&self, text: &str) -> Result<Vec<TemplateChildNode>, CompilerError> {
        let mut nodes = Vec::new();
        let mut last_end = 0;
        for caps in EXPR_PLACEHOLDER_RE.captures_iter(text) {
            let Some(m) = caps.get(0) else {
                continue;
            };
            push_text(&mut nodes, &text[last_end..m.start()]);
            let index: usize = caps[1].parse().unwrap_or(usize::MAX);
            if let Some(extracted) = self.normalized.expressions.get(&index) {
                self.check_expression(&extracted.text, &extracted.location)?;
                nodes.push(TemplateChildNode::Interpolation(InterpolationNode {
                    content: ExpressionNode::Simple(SimpleExpression::parsed(
                        &extracted.text,
                        extracted.location.clone(),
                    )),
                    location: extracted.location.clone(),
                }));
            }
            last_end = m.end();
        }
        push_text(&mut nodes, &text[last_end..]);
        Ok(nodes)
    }

    /// html5ever always builds `<html><head/><body/></html>`; flatten the
    /// wrappers so only template content remains.
    fn collect(&self, handle: &Handle, nodes: &mut Vec<TemplateChildNode>) -> Result<(), CompilerError> {
        match &handle.data {
            NodeData::Document => {
                for child in handle.children.borrow().iter() {
                    self.collect(child, nodes)?;
                }
            }
            NodeData::Element { name, .. } if matches!(&*name.local, "html" | "head" | "body") => {
                for child in handle.children.borrow().iter() {
                    self.collect(child, nodes)?;
                }
            }
            NodeData::Doctype { .. } => {}
            _ => nodes.extend(self.node(handle)?),
        }
        Ok(())
    }
}

fn push_text(nodes: &mut Vec<TemplateChildNode>, raw: &str) {
    if raw.trim().is_empty() {
        return;
    }
    nodes.push(TemplateChildNode::Text(TextNode {
        content: WHITESPACE_RE.replace_all(raw, " ").to_string(),
        location: SourceLocation::stub(),
    }));
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAIN PARSING FUNCTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse template markup into a root node.
pub fn parse_template(source: &str, options: &CompileOptions) -> Result<RootNode, CompilerError> {
    let normalized = normalize(source);

    let dom = parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut normalized.html.as_bytes())
        .map_err(|e| {
            CompilerError::new(
                PARSE_ERROR,
                &format!("Failed to parse template: {}", e),
                &options.file_path,
                &SourceLocation::stub(),
            )
        })?;

    let converter = Converter {
        normalized: &normalized,
        options,
    };
    let mut children = Vec::new();
    converter.collect(&dom.document, &mut children)?;

    debug!(
        file = %options.file_path,
        nodes = children.len(),
        interpolations = normalized.expressions.len(),
        "parsed template"
    );
    Ok(RootNode::new(options.file_path.clone(), source, children))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Vec<TemplateChildNode> {
        parse_template(source, &CompileOptions::default()).unwrap().children
    }

    fn first_element(nodes: &[TemplateChildNode]) -> &ElementNode {
        nodes.iter().find_map(|n| n.as_element()).expect("element")
    }

    #[test]
    fn test_directive_forms() {
        let nodes = parse(r#"<div v-lazy-if="a > b" v-show.lazy="open" :title="t" @click="go()" v-else></div>"#);
        let el = first_element(&nodes);
        let names: Vec<&str> = el.props.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["lazy-if", "show", "bind", "on", "else"]);

        let PropNode::Directive(lazy) = &el.props[0] else { panic!() };
        assert_eq!(lazy.exp.as_ref().unwrap().source(), "a > b");
        let PropNode::Directive(show) = &el.props[1] else { panic!() };
        assert_eq!(show.modifiers, vec!["lazy".to_string()]);
        let PropNode::Directive(bind) = &el.props[2] else { panic!() };
        assert_eq!(bind.static_arg(), Some("title"));
        let PropNode::Directive(else_dir) = &el.props[4] else { panic!() };
        assert!(else_dir.exp.is_none());
    }

    #[test]
    fn test_empty_value_has_no_expression() {
        let nodes = parse(r#"<p v-lazy-if=""></p>"#);
        let el = first_element(&nodes);
        let PropNode::Directive(dir) = &el.props[0] else { panic!() };
        assert!(dir.exp.is_none());
    }

    #[test]
    fn test_interpolation_and_text() {
        let nodes = parse("<p>Hello   {{ user.name }}!</p>");
        let el = first_element(&nodes);
        assert_eq!(el.children.len(), 3);
        assert!(matches!(&el.children[0], TemplateChildNode::Text(t) if t.content == "Hello "));
        assert!(matches!(&el.children[1], TemplateChildNode::Interpolation(i) if i.content.source() == "user.name"));
    }

    #[test]
    fn test_components_and_self_closing() {
        let nodes = parse(r#"<Panel v-lazy-if="ok" /><my-card /><span>after</span>"#);
        let elements: Vec<&ElementNode> = nodes.iter().filter_map(|n| n.as_element()).collect();
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0].tag, "Panel");
        assert_eq!(elements[0].tag_type, ElementType::Component);
        assert_eq!(elements[1].tag_type, ElementType::Component);
        assert_eq!(elements[2].tag, "span");
    }

    #[test]
    fn test_template_contents() {
        let nodes = parse(r#"<template v-lazy-if="ok"><b>x</b><i>y</i></template>"#);
        let el = first_element(&nodes);
        assert!(el.is_template());
        assert_eq!(el.children.len(), 2);
    }

    #[test]
    fn test_expression_locations() {
        let nodes = parse("<div>\n  <p v-lazy-if=\"visible\"></p>\n</div>");
        let outer = first_element(&nodes);
        let inner = first_element(&outer.children);
        let PropNode::Directive(dir) = &inner.props[0] else { panic!() };
        let loc = dir.exp.as_ref().unwrap().location();
        assert_eq!(loc.line, 2);
        assert_eq!(loc.column, 17);
    }

    #[test]
    fn test_invalid_expression_is_rejected() {
        let err = parse_template(r#"<p v-lazy-if="a >"></p>"#, &CompileOptions::default()).unwrap_err();
        assert!(err.is(INVALID_EXPRESSION));

        let lenient = CompileOptions {
            validate_expressions: false,
            ..CompileOptions::default()
        };
        assert!(parse_template(r#"<p v-lazy-if="a >"></p>"#, &lenient).is_ok());
    }
}
