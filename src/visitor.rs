use crate::ast::{
    ConditionalExpression, ElementNode, IfBranchNode, IfNode, InterpolationNode, JsNode, RootNode, TemplateChildNode,
    TextNode,
};

/// The TemplateVisitor trait is the read-only traversal over transformed
/// template trees.
///
/// Rules:
/// 1. Traversal order is document order and fixed.
/// 2. Implementers override `visit_*` methods to add behavior.
/// 3. Implementers call the matching `walk_*` function to continue into
///    children unless pruning is intended.
pub trait TemplateVisitor {
    fn visit_root(&mut self, root: &RootNode) {
        walk_children(self, &root.children);
    }

    fn visit_node(&mut self, node: &TemplateChildNode) {
        walk_node(self, node);
    }

    fn visit_element(&mut self, element: &ElementNode) {
        walk_children(self, &element.children);
    }

    fn visit_text(&mut self, _text: &TextNode) {}

    fn visit_interpolation(&mut self, _interpolation: &InterpolationNode) {}

    fn visit_if(&mut self, node: &IfNode) {
        walk_if(self, node);
    }

    fn visit_if_branch(&mut self, branch: &IfBranchNode) {
        walk_children(self, &branch.children);
    }

    fn visit_conditional(&mut self, conditional: &ConditionalExpression) {
        walk_conditional(self, conditional);
    }
}

pub fn walk_children<V: TemplateVisitor + ?Sized>(visitor: &mut V, children: &[TemplateChildNode]) {
    for node in children {
        visitor.visit_node(node);
    }
}

pub fn walk_node<V: TemplateVisitor + ?Sized>(visitor: &mut V, node: &TemplateChildNode) {
    match node {
        TemplateChildNode::Element(el) => visitor.visit_element(el),
        TemplateChildNode::Text(text) => visitor.visit_text(text),
        TemplateChildNode::Interpolation(interp) => visitor.visit_interpolation(interp),
        TemplateChildNode::Comment(_) => {}
        TemplateChildNode::If(if_node) => visitor.visit_if(if_node),
        TemplateChildNode::JsConditional(conditional) => visitor.visit_conditional(conditional),
    }
}

pub fn walk_if<V: TemplateVisitor + ?Sized>(visitor: &mut V, node: &IfNode) {
    for branch in &node.branches {
        visitor.visit_if_branch(branch);
    }
}

/// Walks template children reachable from either arm of a conditional.
pub fn walk_conditional<V: TemplateVisitor + ?Sized>(visitor: &mut V, conditional: &ConditionalExpression) {
    walk_js(visitor, &conditional.consequent);
    walk_js(visitor, &conditional.alternate);
}

fn walk_js<V: TemplateVisitor + ?Sized>(visitor: &mut V, node: &JsNode) {
    match node {
        JsNode::Conditional(conditional) => visitor.visit_conditional(conditional),
        JsNode::Sequence(seq) => {
            for e in &seq.expressions {
                walk_js(visitor, e);
            }
        }
        JsNode::VNodeCall(call) => walk_children(visitor, &call.children),
        JsNode::Expression(_) | JsNode::Call(_) => {}
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLECTORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Cache slot keys of every lazy rewrite, in document order.
#[derive(Debug, Default)]
pub struct CacheKeyCollector {
    pub keys: Vec<String>,
}

impl TemplateVisitor for CacheKeyCollector {
    fn visit_conditional(&mut self, conditional: &ConditionalExpression) {
        if let Some(key) = conditional.lazy_cache_key() {
            self.keys.push(key.to_string());
        }
        walk_conditional(self, conditional);
    }
}

pub fn collect_cache_keys(root: &RootNode) -> Vec<String> {
    let mut collector = CacheKeyCollector::default();
    collector.visit_root(root);
    collector.keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CallArgument, CallExpression, CompoundPart, ExpressionNode, RuntimeHelper, SequenceExpression};

    fn lazy(key: &str, inner: TemplateChildNode) -> TemplateChildNode {
        let wrapper = crate::ast::VNodeCall {
            tag: crate::ast::VNodeTag::Helper(RuntimeHelper::Fragment),
            props: Vec::new(),
            children: vec![inner],
            patch_flag: crate::ast::PatchFlags::STABLE_FRAGMENT,
            dynamic_props: Vec::new(),
            directives: Vec::new(),
            is_block: true,
            disable_tracking: false,
            is_component: false,
            location: Default::default(),
        };
        TemplateChildNode::JsConditional(ConditionalExpression::new(
            JsNode::Expression(ExpressionNode::compound(vec![
                CompoundPart::Raw(format!("_cache.{}", key)),
                CompoundPart::Raw(" || ".to_string()),
                CompoundPart::Node(ExpressionNode::simple("ok")),
            ])),
            JsNode::Sequence(SequenceExpression {
                expressions: vec![JsNode::VNodeCall(wrapper)],
            }),
            JsNode::Call(CallExpression {
                callee: RuntimeHelper::CreateComment,
                arguments: vec![CallArgument::Raw("\"p\"".to_string())],
            }),
        ))
    }

    #[test]
    fn test_collects_nested_keys_in_order() {
        let inner = lazy("_lz_if_1", TemplateChildNode::Element(ElementNode::new("span")));
        let outer = lazy(
            "_lz_if_0",
            TemplateChildNode::Element(ElementNode::new("div").with_child(inner)),
        );
        let root = RootNode::new(
            "t.vue",
            "",
            vec![outer, lazy("_lz_if_2", TemplateChildNode::Element(ElementNode::new("p")))],
        );

        assert_eq!(collect_cache_keys(&root), vec!["_lz_if_0", "_lz_if_1", "_lz_if_2"]);
    }

    #[test]
    fn test_plain_tree_has_no_keys() {
        let root = RootNode::new("t.vue", "", vec![TemplateChildNode::Element(ElementNode::new("div"))]);
        assert!(collect_cache_keys(&root).is_empty());
    }
}
