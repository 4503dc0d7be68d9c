//! Template IR for the lazy directive compiler.
//!
//! The parser produces `TemplateChildNode` trees, transforms rewrite them in
//! place, and the codegen printer turns the result into a render function.
//! JS codegen nodes (`JsNode`) live next to template nodes because a rewritten
//! element is spliced back into its parent's children as a conditional
//! expression.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

// ═══════════════════════════════════════════════════════════════════════════════
// LOCATIONS & IDENTITY
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
    /// Raw source text this node was parsed from. Empty for synthesized nodes.
    #[serde(default)]
    pub source: String,
}

impl SourceLocation {
    pub fn new(line: u32, column: u32, source: impl Into<String>) -> Self {
        SourceLocation {
            line,
            column,
            source: source.into(),
        }
    }

    /// Location for nodes created by a transform rather than the parser.
    pub fn stub() -> Self {
        SourceLocation {
            line: 1,
            column: 1,
            source: String::new(),
        }
    }
}

static ROOT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identity of one compilation unit. Cache slots are namespaced by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RootId(u64);

impl RootId {
    pub fn next() -> Self {
        RootId(ROOT_ID_COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RUNTIME HELPERS & PATCH FLAGS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuntimeHelper {
    Fragment,
    OpenBlock,
    CreateBlock,
    CreateElementBlock,
    CreateVNode,
    CreateElementVNode,
    CreateComment,
    CreateText,
    ToDisplayString,
    WithDirectives,
    VShow,
    ResolveComponent,
    ResolveDirective,
    WithCtx,
}

impl RuntimeHelper {
    /// Export name in the host runtime.
    pub fn name(&self) -> &'static str {
        match self {
            RuntimeHelper::Fragment => "Fragment",
            RuntimeHelper::OpenBlock => "openBlock",
            RuntimeHelper::CreateBlock => "createBlock",
            RuntimeHelper::CreateElementBlock => "createElementBlock",
            RuntimeHelper::CreateVNode => "createVNode",
            RuntimeHelper::CreateElementVNode => "createElementVNode",
            RuntimeHelper::CreateComment => "createCommentVNode",
            RuntimeHelper::CreateText => "createTextVNode",
            RuntimeHelper::ToDisplayString => "toDisplayString",
            RuntimeHelper::WithDirectives => "withDirectives",
            RuntimeHelper::VShow => "vShow",
            RuntimeHelper::ResolveComponent => "resolveComponent",
            RuntimeHelper::ResolveDirective => "resolveDirective",
            RuntimeHelper::WithCtx => "withCtx",
        }
    }

    /// Local alias used in generated code (`_openBlock`).
    pub fn alias(&self) -> String {
        format!("_{}", self.name())
    }
}

bitflags! {
    /// Reconciler optimization hints attached to vnode calls.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct PatchFlags: u32 {
        const TEXT = 1;
        const CLASS = 1 << 1;
        const STYLE = 1 << 2;
        const PROPS = 1 << 3;
        const FULL_PROPS = 1 << 4;
        const NEED_HYDRATION = 1 << 5;
        /// Children order never changes; single static child wrappers use it.
        const STABLE_FRAGMENT = 1 << 6;
        const KEYED_FRAGMENT = 1 << 7;
        const UNKEYED_FRAGMENT = 1 << 8;
        const NEED_PATCH = 1 << 9;
        const DYNAMIC_SLOTS = 1 << 10;
    }
}

impl Default for PatchFlags {
    fn default() -> Self {
        PatchFlags::empty()
    }
}

impl PatchFlags {
    /// `64 /* STABLE_FRAGMENT */` style rendering used by the printer.
    pub fn describe(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let names: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
        Some(format!("{} /* {} */", self.bits(), names.join(", ")))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ExpressionNode {
    Simple(SimpleExpression),
    Compound(CompoundExpression),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SimpleExpression {
    pub content: String,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompoundExpression {
    pub parts: Vec<CompoundPart>,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum CompoundPart {
    /// Emitted verbatim
    Raw(String),
    Node(ExpressionNode),
}

impl SimpleExpression {
    /// A fresh dynamic expression with no source location.
    pub fn new(content: impl Into<String>) -> Self {
        SimpleExpression {
            content: content.into(),
            is_static: false,
            location: SourceLocation::stub(),
        }
    }

    /// Expression parsed from `source` at `location`.
    pub fn parsed(source: &str, mut location: SourceLocation) -> Self {
        location.source = source.to_string();
        SimpleExpression {
            content: source.to_string(),
            is_static: false,
            location,
        }
    }
}

impl ExpressionNode {
    pub fn simple(content: impl Into<String>) -> Self {
        ExpressionNode::Simple(SimpleExpression::new(content))
    }

    pub fn compound(parts: Vec<CompoundPart>) -> Self {
        ExpressionNode::Compound(CompoundExpression {
            parts,
            location: SourceLocation::stub(),
        })
    }

    pub fn location(&self) -> &SourceLocation {
        match self {
            ExpressionNode::Simple(s) => &s.location,
            ExpressionNode::Compound(c) => &c.location,
        }
    }

    /// Original source text, empty when the node was synthesized.
    pub fn source(&self) -> &str {
        &self.location().source
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            ExpressionNode::Simple(s) => Some(&s.content),
            ExpressionNode::Compound(_) => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPLATE NODES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootNode {
    #[serde(skip, default = "RootId::next")]
    pub id: RootId,
    pub file_path: String,
    pub source: String,
    pub children: Vec<TemplateChildNode>,
    #[serde(default)]
    pub helpers: Vec<RuntimeHelper>,
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub directives: Vec<String>,
    /// Cache slots consumed by lazy directives in this root
    #[serde(default)]
    pub cached: usize,
    #[serde(default)]
    pub transformed: bool,
}

impl RootNode {
    pub fn new(file_path: impl Into<String>, source: impl Into<String>, children: Vec<TemplateChildNode>) -> Self {
        RootNode {
            id: RootId::next(),
            file_path: file_path.into(),
            source: source.into(),
            children,
            helpers: Vec::new(),
            components: Vec::new(),
            directives: Vec::new(),
            cached: 0,
            transformed: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TemplateChildNode {
    Element(ElementNode),
    Text(TextNode),
    Comment(CommentNode),
    Interpolation(InterpolationNode),
    If(IfNode),
    /// An element rewritten into a conditional render expression.
    JsConditional(ConditionalExpression),
}

impl TemplateChildNode {
    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            TemplateChildNode::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut ElementNode> {
        match self {
            TemplateChildNode::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn is_whitespace_or_comment(&self) -> bool {
        match self {
            TemplateChildNode::Comment(_) => true,
            TemplateChildNode::Text(t) => t.content.trim().is_empty(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    #[default]
    Element,
    Component,
    /// Non-rendering `<template>` grouping tag
    Template,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    pub tag: String,
    #[serde(default)]
    pub tag_type: ElementType,
    pub props: Vec<PropNode>,
    pub children: Vec<TemplateChildNode>,
    #[serde(default)]
    pub codegen_node: Option<VNodeCall>,
    #[serde(default)]
    pub location: SourceLocation,
}

impl ElementNode {
    pub fn new(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        let tag_type = if tag == "template" {
            ElementType::Template
        } else {
            ElementType::Element
        };
        ElementNode {
            tag,
            tag_type,
            props: Vec::new(),
            children: Vec::new(),
            codegen_node: None,
            location: SourceLocation::stub(),
        }
    }

    pub fn with_prop(mut self, prop: PropNode) -> Self {
        self.props.push(prop);
        self
    }

    pub fn with_child(mut self, child: TemplateChildNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn is_template(&self) -> bool {
        self.tag_type == ElementType::Template
    }

    pub fn directives(&self) -> impl Iterator<Item = &DirectiveNode> {
        self.props.iter().filter_map(|p| match p {
            PropNode::Directive(d) => Some(d),
            PropNode::Attribute(_) => None,
        })
    }

    pub fn find_directive(&self, name: &str) -> Option<&DirectiveNode> {
        self.directives().find(|d| d.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PropNode {
    Attribute(AttributeNode),
    Directive(DirectiveNode),
}

impl PropNode {
    pub fn name(&self) -> &str {
        match self {
            PropNode::Attribute(a) => &a.name,
            PropNode::Directive(d) => &d.name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttributeNode {
    pub name: String,
    pub value: Option<String>,
    #[serde(default)]
    pub location: SourceLocation,
}

impl AttributeNode {
    pub fn new(name: impl Into<String>, value: Option<&str>) -> Self {
        AttributeNode {
            name: name.into(),
            value: value.map(str::to_string),
            location: SourceLocation::stub(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DirectiveNode {
    /// Name without the `v-` prefix (`lazy-if`, `show`, `bind`)
    pub name: String,
    pub arg: Option<ExpressionNode>,
    #[serde(default)]
    pub modifiers: Vec<String>,
    pub exp: Option<ExpressionNode>,
    #[serde(default)]
    pub location: SourceLocation,
}

impl DirectiveNode {
    pub fn new(name: impl Into<String>) -> Self {
        DirectiveNode {
            name: name.into(),
            arg: None,
            modifiers: Vec::new(),
            exp: None,
            location: SourceLocation::stub(),
        }
    }

    /// Attach an expression as if parsed from `source`.
    pub fn with_exp(mut self, source: &str) -> Self {
        self.exp = Some(ExpressionNode::Simple(SimpleExpression::parsed(
            source,
            SourceLocation::new(1, 1, source),
        )));
        self
    }

    pub fn with_arg(mut self, arg: &str) -> Self {
        self.arg = Some(ExpressionNode::Simple(SimpleExpression {
            content: arg.to_string(),
            is_static: true,
            location: SourceLocation::new(1, 1, arg),
        }));
        self
    }

    pub fn with_modifiers(mut self, modifiers: &[&str]) -> Self {
        self.modifiers = modifiers.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }

    /// Static argument text (`click` for `@click`).
    pub fn static_arg(&self) -> Option<&str> {
        match &self.arg {
            Some(ExpressionNode::Simple(s)) if s.is_static => Some(&s.content),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    pub content: String,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    pub content: String,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpolationNode {
    pub content: ExpressionNode,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IfNode {
    pub branches: Vec<IfBranchNode>,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IfBranchNode {
    /// `None` for the `else` branch
    pub condition: Option<ExpressionNode>,
    pub children: Vec<TemplateChildNode>,
    #[serde(default)]
    pub is_template_if: bool,
    #[serde(default)]
    pub location: SourceLocation,
}

// ═══════════════════════════════════════════════════════════════════════════════
// JS CODEGEN NODES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum JsNode {
    Expression(ExpressionNode),
    Conditional(ConditionalExpression),
    Sequence(SequenceExpression),
    Call(CallExpression),
    VNodeCall(VNodeCall),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalExpression {
    pub test: Box<JsNode>,
    pub consequent: Box<JsNode>,
    pub alternate: Box<JsNode>,
    #[serde(default = "default_true")]
    pub newline: bool,
}

fn default_true() -> bool {
    true
}

impl ConditionalExpression {
    pub fn new(test: JsNode, consequent: JsNode, alternate: JsNode) -> Self {
        ConditionalExpression {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
            newline: true,
        }
    }

    /// Element wrapped by a lazy rewrite: `test ? (flag, Fragment[el]) : comment`.
    pub fn wrapped_element(&self) -> Option<&ElementNode> {
        let JsNode::Sequence(seq) = self.consequent.as_ref() else {
            return None;
        };
        match seq.expressions.last() {
            Some(JsNode::VNodeCall(call)) => call.children.first().and_then(|c| c.as_element()),
            _ => None,
        }
    }

    /// Child slot of the fragment wrapper, so the wrapped element can be
    /// traversed like any other child.
    pub fn wrapped_slot_mut(&mut self) -> Option<&mut TemplateChildNode> {
        let JsNode::Sequence(seq) = self.consequent.as_mut() else {
            return None;
        };
        match seq.expressions.last_mut() {
            Some(JsNode::VNodeCall(call)) => call.children.first_mut(),
            _ => None,
        }
    }

    /// `_lz_if_0` for a test of the form `_cache._lz_if_0 || exp`.
    pub fn lazy_cache_key(&self) -> Option<&str> {
        let JsNode::Expression(ExpressionNode::Compound(test)) = self.test.as_ref() else {
            return None;
        };
        match test.parts.first() {
            Some(CompoundPart::Raw(raw)) => raw.strip_prefix("_cache."),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceExpression {
    pub expressions: Vec<JsNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallExpression {
    pub callee: RuntimeHelper,
    pub arguments: Vec<CallArgument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallArgument {
    /// JS source emitted verbatim (`"lazy-load-placeholder"`, `true`)
    Raw(String),
    Node(JsNode),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum VNodeTag {
    Helper(RuntimeHelper),
    Element(String),
    Component(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum PropEntry {
    Static { name: String, value: String },
    Dynamic { name: String, exp: ExpressionNode },
    /// `onClick: handler`
    Handler { name: String, exp: ExpressionNode },
    /// `v-bind="obj"`
    Spread(ExpressionNode),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeDirective {
    pub name: String,
    /// Built-in directive helper; custom directives resolve by name
    pub helper: Option<RuntimeHelper>,
    pub exp: Option<ExpressionNode>,
    pub arg: Option<String>,
    #[serde(default)]
    pub modifiers: Vec<String>,
}

/// A `createVNode`-family call. For element codegen nodes `children` stays
/// empty and the printer reads the owning element's children instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VNodeCall {
    pub tag: VNodeTag,
    #[serde(default)]
    pub props: Vec<PropEntry>,
    #[serde(default)]
    pub children: Vec<TemplateChildNode>,
    #[serde(default)]
    pub patch_flag: PatchFlags,
    #[serde(default)]
    pub dynamic_props: Vec<String>,
    #[serde(default)]
    pub directives: Vec<RuntimeDirective>,
    pub is_block: bool,
    pub disable_tracking: bool,
    pub is_component: bool,
    #[serde(default)]
    pub location: SourceLocation,
}
