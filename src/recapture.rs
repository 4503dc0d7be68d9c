//! Expression re-capture.
//!
//! Later passes rewrite expression nodes in place and assume each node is
//! used once. A lazy rewrite uses the directive expression twice and moves
//! the element's bindings under a new parent, so every expression that still
//! has its source text is rebuilt as an independent node first.

use crate::ast::{ExpressionNode, PropNode};

/// Fresh simple expression holding `exp`'s source text, or `None` when the
/// node has no recorded source.
pub fn from_source(exp: &ExpressionNode) -> Option<ExpressionNode> {
    let source = exp.source();
    if source.is_empty() {
        return None;
    }
    Some(ExpressionNode::simple(source))
}

/// Swap `slot` for a re-captured copy and hand back the original node.
pub fn recapture(slot: &mut ExpressionNode) -> ExpressionNode {
    match from_source(slot) {
        Some(fresh) => std::mem::replace(slot, fresh),
        None => slot.clone(),
    }
}

/// Re-capture every binding on an element except event handlers. Compound
/// expressions are left alone. Returns how many were rebuilt.
pub fn recapture_bindings(props: &mut [PropNode]) -> usize {
    let mut count = 0;
    for prop in props.iter_mut() {
        let PropNode::Directive(dir) = prop else {
            continue;
        };
        if dir.name == "on" {
            continue;
        }
        let Some(exp) = dir.exp.as_mut() else {
            continue;
        };
        if !matches!(exp, ExpressionNode::Simple(_)) {
            continue;
        }
        if let Some(fresh) = from_source(exp) {
            *exp = fresh;
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AttributeNode, CompoundPart, DirectiveNode, SourceLocation};

    #[test]
    fn test_recapture_returns_original_and_detaches_copy() {
        let mut exp = DirectiveNode::new("lazy-if").with_exp("user.loggedIn").exp.unwrap();
        let original = recapture(&mut exp);

        assert_eq!(original.source(), "user.loggedIn");
        assert_eq!(exp.content(), Some("user.loggedIn"));
        // the copy carries no parser location
        assert_eq!(exp.source(), "");
        assert_eq!(exp.location(), &SourceLocation::stub());
    }

    #[test]
    fn test_recapture_without_source_keeps_node() {
        let mut exp = ExpressionNode::simple("ok");
        let original = recapture(&mut exp);
        assert_eq!(original, exp);
    }

    #[test]
    fn test_bindings_skip_handlers_and_compounds() {
        let mut compound = ExpressionNode::compound(vec![CompoundPart::Raw("a + b".into())]);
        if let ExpressionNode::Compound(c) = &mut compound {
            c.location.source = "a + b".into();
        }
        let mut props = vec![
            PropNode::Attribute(AttributeNode::new("class", Some("card"))),
            PropNode::Directive(DirectiveNode::new("bind").with_arg("title").with_exp("post.title")),
            PropNode::Directive(DirectiveNode::new("on").with_arg("click").with_exp("open(post)")),
            PropNode::Directive(DirectiveNode {
                exp: Some(compound.clone()),
                ..DirectiveNode::new("bind").with_arg("data")
            }),
        ];

        assert_eq!(recapture_bindings(&mut props), 1);

        let PropNode::Directive(bind) = &props[1] else { panic!() };
        assert_eq!(bind.exp.as_ref().unwrap().source(), "");
        let PropNode::Directive(on) = &props[2] else { panic!() };
        assert_eq!(on.exp.as_ref().unwrap().source(), "open(post)");
        let PropNode::Directive(data) = &props[3] else { panic!() };
        assert_eq!(data.exp.as_ref(), Some(&compound));
    }
}
