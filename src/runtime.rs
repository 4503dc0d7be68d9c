//! Render interpreter
//!
//! Evaluates a transformed `RootNode` against a JSON state object and
//! produces a virtual node tree. A `RenderInstance` owns the `_cache` slots,
//! so repeated renders of the same instance observe the lazy `shown` flags
//! the way a mounted component would.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::trace;

use crate::ast::{
    CallArgument, CallExpression, ConditionalExpression, ElementNode, ExpressionNode, IfNode, JsNode, PropEntry,
    RootNode, RuntimeDirective, RuntimeHelper, SourceLocation, TemplateChildNode, VNodeCall, VNodeTag,
};
use crate::codegen::expression_source;
use crate::error::{CompilerError, RENDER_ERROR};
use crate::js_eval::{self, Scope};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum VNode {
    Element {
        tag: String,
        attrs: BTreeMap<String, Value>,
        /// False while a `show` directive hides the element
        visible: bool,
        children: Vec<VNode>,
    },
    Fragment { children: Vec<VNode> },
    Comment { content: String },
    Text { content: String },
}

impl VNode {
    /// Depth-first search for the first element with `tag`.
    pub fn find_element(&self, tag: &str) -> Option<&VNode> {
        match self {
            VNode::Element { tag: t, .. } if t == tag => Some(self),
            VNode::Element { children, .. } | VNode::Fragment { children } => {
                children.iter().find_map(|c| c.find_element(tag))
            }
            _ => None,
        }
    }

    pub fn is_visible(&self) -> bool {
        match self {
            VNode::Element { visible, .. } => *visible,
            _ => true,
        }
    }

    pub fn is_comment(&self, content: &str) -> bool {
        matches!(self, VNode::Comment { content: c } if c == content)
    }

    pub fn text_content(&self) -> String {
        match self {
            VNode::Text { content } => content.clone(),
            VNode::Element { children, .. } | VNode::Fragment { children } => {
                children.iter().map(|c| c.text_content()).collect()
            }
            VNode::Comment { .. } => String::new(),
        }
    }
}

/// Find `tag` anywhere in a rendered forest.
pub fn find_element<'a>(nodes: &'a [VNode], tag: &str) -> Option<&'a VNode> {
    nodes.iter().find_map(|n| n.find_element(tag))
}

// ═══════════════════════════════════════════════════════════════════════════════
// RENDER INSTANCE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct RenderInstance {
    cache: Map<String, Value>,
}

impl RenderInstance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&self) -> &Map<String, Value> {
        &self.cache
    }

    /// Whether the lazy slot `key` has been set by a render.
    pub fn is_shown(&self, key: &str) -> bool {
        self.cache.get(key).map(js_eval::truthy).unwrap_or(false)
    }

    pub fn render(&mut self, root: &RootNode, state: &Value) -> Result<Vec<VNode>, CompilerError> {
        let mut renderer = Renderer {
            file: &root.file_path,
            scope: Scope {
                state,
                cache: &mut self.cache,
            },
        };
        let nodes = renderer.children(&root.children)?;
        trace!(file = %root.file_path, nodes = nodes.len(), "rendered");
        Ok(nodes)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RENDERER
// ═══════════════════════════════════════════════════════════════════════════════

struct Renderer<'r> {
    file: &'r str,
    scope: Scope<'r>,
}

impl<'r> Renderer<'r> {
    fn error(&self, message: &str, location: &SourceLocation) -> CompilerError {
        CompilerError::new(RENDER_ERROR, message, self.file, location)
    }

    fn eval(&mut self, exp: &ExpressionNode) -> Result<Value, CompilerError> {
        let source = expression_source(exp);
        js_eval::evaluate(&source, &mut self.scope)
            .map_err(|e| self.error(&format!("Failed to evaluate `{}`: {}", source, e), exp.location()))
    }

    fn children(&mut self, children: &[TemplateChildNode]) -> Result<Vec<VNode>, CompilerError> {
        children.iter().map(|c| self.node(c)).collect()
    }

    fn node(&mut self, node: &TemplateChildNode) -> Result<VNode, CompilerError> {
        match node {
            TemplateChildNode::Element(el) => self.element(el),
            TemplateChildNode::Text(text) => Ok(VNode::Text {
                content: text.content.clone(),
            }),
            TemplateChildNode::Comment(comment) => Ok(VNode::Comment {
                content: comment.content.clone(),
            }),
            TemplateChildNode::Interpolation(interp) => {
                let value = self.eval(&interp.content)?;
                Ok(VNode::Text {
                    content: js_eval::to_display_string(&value),
                })
            }
            TemplateChildNode::If(if_node) => self.if_node(if_node),
            TemplateChildNode::JsConditional(conditional) => self.conditional(conditional),
        }
    }

    fn element(&mut self, el: &ElementNode) -> Result<VNode, CompilerError> {
        let Some(call) = el.codegen_node.as_ref() else {
            return Err(self.error(&format!("<{}> was never transformed", el.tag), &el.location));
        };
        let children = self.children(&el.children)?;
        self.vnode(call, children)
    }

    fn vnode(&mut self, call: &VNodeCall, children: Vec<VNode>) -> Result<VNode, CompilerError> {
        let tag = match &call.tag {
            VNodeTag::Helper(RuntimeHelper::Fragment) => return Ok(VNode::Fragment { children }),
            VNodeTag::Helper(helper) => {
                return Err(self.error(&format!("{} is not a vnode tag", helper.name()), &call.location))
            }
            VNodeTag::Element(tag) | VNodeTag::Component(tag) => tag.clone(),
        };

        let mut attrs = BTreeMap::new();
        for prop in &call.props {
            match prop {
                PropEntry::Static { name, value } => {
                    attrs.insert(name.clone(), Value::String(value.clone()));
                }
                PropEntry::Dynamic { name, exp } => {
                    let value = self.eval(exp)?;
                    attrs.insert(name.clone(), value);
                }
                PropEntry::Spread(exp) => {
                    if let Value::Object(map) = self.eval(exp)? {
                        attrs.extend(map);
                    }
                }
                // handlers never run during render
                PropEntry::Handler { .. } => {}
            }
        }

        let visible = self.visible(&call.directives)?;
        Ok(VNode::Element {
            tag,
            attrs,
            visible,
            children,
        })
    }

    fn visible(&mut self, directives: &[RuntimeDirective]) -> Result<bool, CompilerError> {
        let mut visible = true;
        for dir in directives.iter().filter(|d| d.helper == Some(RuntimeHelper::VShow)) {
            if let Some(exp) = &dir.exp {
                visible &= js_eval::truthy(&self.eval(exp)?);
            }
        }
        Ok(visible)
    }

    fn if_node(&mut self, node: &IfNode) -> Result<VNode, CompilerError> {
        for branch in &node.branches {
            let taken = match &branch.condition {
                Some(condition) => js_eval::truthy(&self.eval(condition)?),
                None => true,
            };
            if taken {
                let mut children = self.children(&branch.children)?;
                return Ok(match children.len() {
                    1 if !branch.is_template_if => children.remove(0),
                    _ => VNode::Fragment { children },
                });
            }
        }
        Ok(VNode::Comment {
            content: "v-if".to_string(),
        })
    }

    fn conditional(&mut self, conditional: &ConditionalExpression) -> Result<VNode, CompilerError> {
        let test = self.value(&conditional.test)?;
        if js_eval::truthy(&test) {
            self.js(&conditional.consequent)
        } else {
            self.js(&conditional.alternate)
        }
    }

    /// JS node evaluated for its value.
    fn value(&mut self, node: &JsNode) -> Result<Value, CompilerError> {
        match node {
            JsNode::Expression(exp) => self.eval(exp),
            JsNode::Sequence(seq) => {
                let mut last = Value::Null;
                for e in &seq.expressions {
                    last = self.value(e)?;
                }
                Ok(last)
            }
            _ => Err(self.error("vnode used where a value was expected", &SourceLocation::stub())),
        }
    }

    /// JS node evaluated for the vnode it produces.
    fn js(&mut self, node: &JsNode) -> Result<VNode, CompilerError> {
        match node {
            JsNode::Conditional(conditional) => self.conditional(conditional),
            JsNode::Sequence(seq) => {
                let Some((last, init)) = seq.expressions.split_last() else {
                    return Err(self.error("empty sequence expression", &SourceLocation::stub()));
                };
                for e in init {
                    self.value(e)?;
                }
                self.js(last)
            }
            JsNode::Call(call) => self.call(call),
            JsNode::VNodeCall(call) => {
                let children = self.children(&call.children)?;
                self.vnode(call, children)
            }
            JsNode::Expression(exp) => Err(self.error(
                &format!("`{}` does not produce a vnode", expression_source(exp)),
                exp.location(),
            )),
        }
    }

    fn call(&mut self, call: &CallExpression) -> Result<VNode, CompilerError> {
        match call.callee {
            RuntimeHelper::CreateComment => {
                let content = match call.arguments.first() {
                    Some(CallArgument::Raw(raw)) => serde_json::from_str::<String>(raw).unwrap_or_else(|_| raw.clone()),
                    _ => String::new(),
                };
                Ok(VNode::Comment { content })
            }
            other => Err(self.error(&format!("cannot render a call to {}", other.name()), &SourceLocation::stub())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CompoundPart, PatchFlags, SequenceExpression};
    use serde_json::json;

    fn call(tag: &str) -> VNodeCall {
        VNodeCall {
            tag: VNodeTag::Element(tag.to_string()),
            props: vec![PropEntry::Static {
                name: "id".to_string(),
                value: "x".to_string(),
            }],
            children: Vec::new(),
            patch_flag: PatchFlags::empty(),
            dynamic_props: Vec::new(),
            directives: Vec::new(),
            is_block: false,
            disable_tracking: false,
            is_component: false,
            location: SourceLocation::stub(),
        }
    }

    #[test]
    fn test_untransformed_element_is_an_error() {
        let root = RootNode::new("t.vue", "", vec![TemplateChildNode::Element(ElementNode::new("div"))]);
        let err = RenderInstance::new().render(&root, &json!({})).unwrap_err();
        assert!(err.is(RENDER_ERROR));
    }

    #[test]
    fn test_conditional_writes_cache() {
        let consequent = JsNode::Sequence(SequenceExpression {
            expressions: vec![
                JsNode::Expression(ExpressionNode::compound(vec![CompoundPart::Raw("_cache.k = true".to_string())])),
                JsNode::VNodeCall(call("p")),
            ],
        });
        let alternate = JsNode::Call(CallExpression {
            callee: RuntimeHelper::CreateComment,
            arguments: vec![CallArgument::Raw("\"hidden\"".to_string())],
        });
        let test = JsNode::Expression(ExpressionNode::compound(vec![
            CompoundPart::Raw("_cache.k".to_string()),
            CompoundPart::Raw(" || ".to_string()),
            CompoundPart::Node(ExpressionNode::simple("open")),
        ]));
        let root = RootNode::new(
            "t.vue",
            "",
            vec![TemplateChildNode::JsConditional(ConditionalExpression::new(test, consequent, alternate))],
        );

        let mut instance = RenderInstance::new();
        let first = instance.render(&root, &json!({ "open": false })).unwrap();
        assert!(first[0].is_comment("hidden"));
        assert!(!instance.is_shown("k"));

        let second = instance.render(&root, &json!({ "open": true })).unwrap();
        assert!(find_element(&second, "p").is_some());
        assert!(instance.is_shown("k"));

        let third = instance.render(&root, &json!({ "open": false })).unwrap();
        assert!(find_element(&third, "p").is_some());
    }

    #[test]
    fn test_text_content() {
        let node = VNode::Element {
            tag: "p".to_string(),
            attrs: BTreeMap::new(),
            visible: true,
            children: vec![
                VNode::Text {
                    content: "a".to_string(),
                },
                VNode::Comment {
                    content: "c".to_string(),
                },
                VNode::Text {
                    content: "b".to_string(),
                },
            ],
        };
        assert_eq!(node.text_content(), "ab");
    }
}
