//! Codegen module
//!
//! Prints a transformed `RootNode` as a function-mode render function:
//!
//! ```text
//! const _Vue = Vue
//!
//! return function render(_ctx, _cache) {
//!   with (_ctx) {
//!     const { openBlock: _openBlock, ... } = _Vue
//!
//!     return ...
//!   }
//! }
//! ```

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ast::{
    CallArgument, CallExpression, CompoundPart, ConditionalExpression, ElementNode, ElementType, ExpressionNode,
    IfBranchNode, IfNode, JsNode, PatchFlags, PropEntry, RootNode, RuntimeDirective, RuntimeHelper,
    SequenceExpression, TemplateChildNode, VNodeCall, VNodeTag,
};

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_$][\w$]*$").unwrap();
    static ref MEMBER_PATH: Regex = Regex::new(r"^[A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*$").unwrap();
    static ref NON_WORD: Regex = Regex::new(r"[^\w]").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CodegenResult {
    /// Complete function-mode module body
    pub code: String,
    /// Helper imports and asset resolution lines
    pub preamble: String,
    /// The expression returned by the render function
    pub render: String,
    pub helpers: Vec<RuntimeHelper>,
}

pub fn generate(root: &RootNode) -> CodegenResult {
    let mut printer = Printer::default();
    let render = printer.root(root);

    let mut assets = String::new();
    for component in &root.components {
        let resolve = printer.helper(RuntimeHelper::ResolveComponent);
        assets.push_str(&format!(
            "    const {} = {}({})\n",
            asset_id(component, "component"),
            resolve,
            js_string(component)
        ));
    }
    for directive in &root.directives {
        let resolve = printer.helper(RuntimeHelper::ResolveDirective);
        assets.push_str(&format!(
            "    const {} = {}({})\n",
            asset_id(directive, "directive"),
            resolve,
            js_string(directive)
        ));
    }

    let mut helpers: Vec<RuntimeHelper> = root.helpers.clone();
    for helper in &printer.helpers {
        if !helpers.contains(helper) {
            helpers.push(*helper);
        }
    }
    helpers.sort();

    let mut preamble = String::new();
    if !helpers.is_empty() {
        let imports: Vec<String> = helpers.iter().map(|h| format!("{}: {}", h.name(), h.alias())).collect();
        preamble.push_str(&format!("    const {{ {} }} = _Vue\n", imports.join(", ")));
    }
    preamble.push_str(&assets);

    let code = format!(
        "const _Vue = Vue\n\nreturn function render(_ctx, _cache) {{\n  with (_ctx) {{\n{}\n    return {}\n  }}\n}}",
        preamble, render
    );

    CodegenResult {
        code,
        preamble,
        render,
        helpers,
    }
}

/// JS source of an expression node as the printer emits it.
pub fn expression_source(exp: &ExpressionNode) -> String {
    match exp {
        ExpressionNode::Simple(s) if s.is_static => js_string(&s.content),
        ExpressionNode::Simple(s) => s.content.clone(),
        ExpressionNode::Compound(c) => c
            .parts
            .iter()
            .map(|part| match part {
                CompoundPart::Raw(raw) => raw.clone(),
                CompoundPart::Node(node) => guarded(node),
            })
            .collect(),
    }
}

/// `exp` wrapped in parentheses unless it is a plain identifier or member path.
fn guarded(exp: &ExpressionNode) -> String {
    let source = expression_source(exp);
    match exp {
        ExpressionNode::Simple(s) if s.is_static || MEMBER_PATH.is_match(source.trim()) => source,
        _ => format!("({})", source.trim()),
    }
}

fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s.replace('"', "\\\"")))
}

fn property_key(name: &str) -> String {
    if IDENTIFIER.is_match(name) {
        name.to_string()
    } else {
        js_string(name)
    }
}

/// `my-card` -> `_component_my_card`
pub fn asset_id(name: &str, kind: &str) -> String {
    format!("_{}_{}", kind, NON_WORD.replace_all(name, "_"))
}

fn pad(depth: usize) -> String {
    "  ".repeat(depth)
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRINTER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct Printer {
    helpers: Vec<RuntimeHelper>,
}

impl Printer {
    fn helper(&mut self, helper: RuntimeHelper) -> String {
        if !self.helpers.contains(&helper) {
            self.helpers.push(helper);
        }
        helper.alias()
    }

    fn root(&mut self, root: &RootNode) -> String {
        let depth = 2;
        match root.children.as_slice() {
            [] => "null".to_string(),
            [TemplateChildNode::Element(el)] if !el.is_template() => self.element(el, None, true, depth),
            [single] => self.node(single, depth),
            children => {
                let array = self.child_array(children, depth);
                self.block_fragment(None, array)
            }
        }
    }

    fn node(&mut self, node: &TemplateChildNode, depth: usize) -> String {
        match node {
            TemplateChildNode::Element(el) => self.element(el, None, false, depth),
            TemplateChildNode::Text(text) => {
                format!("{}({})", self.helper(RuntimeHelper::CreateText), js_string(&text.content))
            }
            TemplateChildNode::Comment(comment) => {
                format!("{}({})", self.helper(RuntimeHelper::CreateComment), js_string(&comment.content))
            }
            TemplateChildNode::Interpolation(interp) => {
                let text = self.helper(RuntimeHelper::CreateText);
                let display = self.helper(RuntimeHelper::ToDisplayString);
                format!(
                    "{}({}({}), {})",
                    text,
                    display,
                    expression_source(&interp.content),
                    PatchFlags::TEXT.describe().unwrap_or_default()
                )
            }
            TemplateChildNode::If(if_node) => self.if_node(if_node, depth),
            TemplateChildNode::JsConditional(conditional) => self.conditional(conditional, depth),
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Elements
    // ───────────────────────────────────────────────────────────────────────────

    fn element(&mut self, el: &ElementNode, key: Option<usize>, block: bool, depth: usize) -> String {
        let call = el.codegen_node.clone().unwrap_or_else(|| untransformed_call(el));
        let children = self.element_children(el, &call, depth);
        self.vnode_call(&call, children, key, block || call.is_block)
    }

    fn element_children(&mut self, el: &ElementNode, call: &VNodeCall, depth: usize) -> Option<String> {
        if el.children.is_empty() {
            return None;
        }
        if call.is_component {
            let with_ctx = self.helper(RuntimeHelper::WithCtx);
            let array = self.child_array(&el.children, depth + 1);
            return Some(format!(
                "{{\n{inner}default: {}(() => {}),\n{inner}_: 1 /* STABLE */\n{outer}}}",
                with_ctx,
                array,
                inner = pad(depth + 1),
                outer = pad(depth)
            ));
        }
        let text_only = el
            .children
            .iter()
            .all(|c| matches!(c, TemplateChildNode::Text(_) | TemplateChildNode::Interpolation(_)));
        if text_only {
            let parts: Vec<String> = el
                .children
                .iter()
                .map(|c| match c {
                    TemplateChildNode::Interpolation(interp) => {
                        format!("{}({})", self.helper(RuntimeHelper::ToDisplayString), expression_source(&interp.content))
                    }
                    TemplateChildNode::Text(text) => js_string(&text.content),
                    _ => String::new(),
                })
                .collect();
            return Some(parts.join(" + "));
        }
        Some(self.child_array(&el.children, depth))
    }

    fn child_array(&mut self, children: &[TemplateChildNode], depth: usize) -> String {
        let items: Vec<String> = children
            .iter()
            .map(|child| format!("{}{}", pad(depth + 1), self.node(child, depth + 1)))
            .collect();
        format!("[\n{}\n{}]", items.join(",\n"), pad(depth))
    }

    fn vnode_call(&mut self, call: &VNodeCall, children: Option<String>, key: Option<usize>, block: bool) -> String {
        let tag = match &call.tag {
            VNodeTag::Helper(helper) => self.helper(*helper),
            VNodeTag::Element(tag) => js_string(tag),
            VNodeTag::Component(name) => asset_id(name, "component"),
        };
        let is_component = call.is_component || matches!(call.tag, VNodeTag::Component(_));
        let callee = match (block, is_component) {
            (true, true) => RuntimeHelper::CreateBlock,
            (true, false) => RuntimeHelper::CreateElementBlock,
            (false, true) => RuntimeHelper::CreateVNode,
            (false, false) => RuntimeHelper::CreateElementVNode,
        };
        let callee = self.helper(callee);

        let props = props_object(&call.props, key);
        let dynamic_props = if call.dynamic_props.is_empty() {
            None
        } else {
            let names: Vec<String> = call.dynamic_props.iter().map(|n| js_string(n)).collect();
            Some(format!("[{}]", names.join(", ")))
        };
        let args = nullable_args(vec![Some(tag), props, children, call.patch_flag.describe(), dynamic_props]);

        let mut out = format!("{}({})", callee, args.join(", "));
        if block {
            let open = self.helper(RuntimeHelper::OpenBlock);
            let open_args = if call.disable_tracking { "true" } else { "" };
            out = format!("({}({}), {})", open, open_args, out);
        }
        if !call.directives.is_empty() {
            let with_directives = self.helper(RuntimeHelper::WithDirectives);
            let dirs = self.directive_array(&call.directives);
            out = format!("{}({}, {})", with_directives, out, dirs);
        }
        out
    }

    fn directive_array(&mut self, directives: &[RuntimeDirective]) -> String {
        let entries: Vec<String> = directives
            .iter()
            .map(|dir| {
                let callee = match dir.helper {
                    Some(helper) => self.helper(helper),
                    None => asset_id(&dir.name, "directive"),
                };
                let exp = dir.exp.as_ref().map(expression_source);
                let arg = dir.arg.as_deref().map(js_string);
                let modifiers = if dir.modifiers.is_empty() {
                    None
                } else {
                    let mods: Vec<String> = dir.modifiers.iter().map(|m| format!("{}: true", property_key(m))).collect();
                    Some(format!("{{ {} }}", mods.join(", ")))
                };
                let mut parts = vec![Some(callee), exp, arg, modifiers];
                while matches!(parts.last(), Some(None)) {
                    parts.pop();
                }
                let parts: Vec<String> = parts.into_iter().map(|p| p.unwrap_or_else(|| "void 0".to_string())).collect();
                format!("[{}]", parts.join(", "))
            })
            .collect();
        format!("[{}]", entries.join(", "))
    }

    fn block_fragment(&mut self, key: Option<usize>, children: String) -> String {
        let call = VNodeCall {
            tag: VNodeTag::Helper(RuntimeHelper::Fragment),
            props: Vec::new(),
            children: Vec::new(),
            patch_flag: PatchFlags::STABLE_FRAGMENT,
            dynamic_props: Vec::new(),
            directives: Vec::new(),
            is_block: true,
            disable_tracking: false,
            is_component: false,
            location: Default::default(),
        };
        self.vnode_call(&call, Some(children), key, true)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Conditionals
    // ───────────────────────────────────────────────────────────────────────────

    fn if_node(&mut self, node: &IfNode, depth: usize) -> String {
        self.if_branches(&node.branches, 0, depth)
    }

    fn if_branches(&mut self, branches: &[IfBranchNode], index: usize, depth: usize) -> String {
        let Some(branch) = branches.get(index) else {
            return format!("{}(\"v-if\", true)", self.helper(RuntimeHelper::CreateComment));
        };
        let body = self.branch(branch, index, depth + 1);
        match &branch.condition {
            Some(condition) => {
                let alternate = self.if_branches(branches, index + 1, depth + 1);
                format!(
                    "{}\n{pad}? {}\n{pad}: {}",
                    guarded(condition),
                    body,
                    alternate,
                    pad = pad(depth + 1)
                )
            }
            None => body,
        }
    }

    fn branch(&mut self, branch: &IfBranchNode, key: usize, depth: usize) -> String {
        match branch.children.as_slice() {
            [TemplateChildNode::Element(el)] if !branch.is_template_if && !el.is_template() => {
                self.element(el, Some(key), true, depth)
            }
            children => {
                let array = self.child_array(children, depth);
                self.block_fragment(Some(key), array)
            }
        }
    }

    fn conditional(&mut self, conditional: &ConditionalExpression, depth: usize) -> String {
        let test = match conditional.test.as_ref() {
            JsNode::Expression(exp) => guarded(exp),
            other => format!("({})", self.js(other, depth)),
        };
        let consequent = self.js(&conditional.consequent, depth + 1);
        let alternate = self.js(&conditional.alternate, depth + 1);
        if conditional.newline {
            format!("{}\n{pad}? {}\n{pad}: {}", test, consequent, alternate, pad = pad(depth + 1))
        } else {
            format!("{} ? {} : {}", test, consequent, alternate)
        }
    }

    fn js(&mut self, node: &JsNode, depth: usize) -> String {
        match node {
            JsNode::Expression(exp) => expression_source(exp),
            JsNode::Conditional(conditional) => format!("({})", self.conditional(conditional, depth)),
            JsNode::Sequence(SequenceExpression { expressions }) => {
                let items: Vec<String> = expressions.iter().map(|e| self.js(e, depth)).collect();
                format!("({})", items.join(", "))
            }
            JsNode::Call(CallExpression { callee, arguments }) => {
                let callee = self.helper(*callee);
                let args: Vec<String> = arguments
                    .iter()
                    .map(|arg| match arg {
                        CallArgument::Raw(raw) => raw.clone(),
                        CallArgument::Node(node) => self.js(node, depth),
                    })
                    .collect();
                format!("{}({})", callee, args.join(", "))
            }
            JsNode::VNodeCall(call) => {
                let children = if call.children.is_empty() {
                    None
                } else {
                    Some(self.child_array(&call.children, depth))
                };
                self.vnode_call(call, children, None, call.is_block)
            }
        }
    }
}

/// Codegen node for an element no transform has visited.
fn untransformed_call(el: &ElementNode) -> VNodeCall {
    let tag = match el.tag_type {
        ElementType::Component => VNodeTag::Component(el.tag.clone()),
        ElementType::Element | ElementType::Template => VNodeTag::Element(el.tag.clone()),
    };
    VNodeCall {
        tag,
        props: Vec::new(),
        children: Vec::new(),
        patch_flag: PatchFlags::empty(),
        dynamic_props: Vec::new(),
        directives: Vec::new(),
        is_block: false,
        disable_tracking: false,
        is_component: el.tag_type == ElementType::Component,
        location: el.location.clone(),
    }
}

fn props_object(props: &[PropEntry], key: Option<usize>) -> Option<String> {
    let mut entries = Vec::new();
    if let Some(key) = key {
        entries.push(format!("key: {}", key));
    }
    for prop in props {
        entries.push(match prop {
            PropEntry::Static { name, value } => format!("{}: {}", property_key(name), js_string(value)),
            PropEntry::Dynamic { name, exp } | PropEntry::Handler { name, exp } => {
                format!("{}: {}", property_key(name), expression_source(exp))
            }
            PropEntry::Spread(exp) => format!("...({})", expression_source(exp)),
        });
    }
    if entries.is_empty() {
        None
    } else {
        Some(format!("{{ {} }}", entries.join(", ")))
    }
}

/// Drop trailing `None`s and print the rest, `null` for gaps.
fn nullable_args(mut args: Vec<Option<String>>) -> Vec<String> {
    while matches!(args.last(), Some(None)) {
        args.pop();
    }
    args.into_iter().map(|a| a.unwrap_or_else(|| "null".to_string())).collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guarded_wraps_non_paths() {
        assert_eq!(guarded(&ExpressionNode::simple("user.loggedIn")), "user.loggedIn");
        assert_eq!(guarded(&ExpressionNode::simple("a ? b : c")), "(a ? b : c)");
        assert_eq!(guarded(&ExpressionNode::simple("count > 0")), "(count > 0)");
    }

    #[test]
    fn test_compound_guards_embedded_nodes() {
        let exp = ExpressionNode::compound(vec![
            CompoundPart::Raw("_cache._lz_if_0".into()),
            CompoundPart::Raw(" || ".into()),
            CompoundPart::Node(ExpressionNode::simple("a && b")),
        ]);
        assert_eq!(expression_source(&exp), "_cache._lz_if_0 || (a && b)");
    }

    #[test]
    fn test_nullable_args() {
        let args = nullable_args(vec![Some("\"div\"".into()), None, Some("\"x\"".into()), None, None]);
        assert_eq!(args, vec!["\"div\"", "null", "\"x\""]);
    }

    #[test]
    fn test_asset_id() {
        assert_eq!(asset_id("my-card", "component"), "_component_my_card");
        assert_eq!(asset_id("focus", "directive"), "_directive_focus");
    }

    #[test]
    fn test_empty_root() {
        let root = RootNode::new("t.vue", "", vec![]);
        let out = generate(&root);
        assert_eq!(out.render, "null");
        assert!(out.helpers.is_empty());
        assert!(out.code.contains("return function render(_ctx, _cache)"));
    }
}
