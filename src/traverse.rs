//! Transform driver.
//!
//! Rules:
//! 1. Node transforms run in registration order on every node. A transform
//!    that replaces the node leaves the replacement in the slot, and the
//!    remaining transforms see the replacement.
//! 2. Children are traversed after all transforms of their parent ran.
//! 3. Exit callbacks run after the children, in reverse registration order.
//! 4. `else` / `else-if` siblings are folded into the preceding `If` node
//!    before they are traversed.

use std::sync::Arc;

use crate::ast::{DirectiveNode, PropNode, RuntimeHelper, TemplateChildNode};
use crate::context::TransformContext;
use crate::error::CompilerError;
use crate::options::RenderMode;
use crate::{element, lazy_if, v_if};

/// Runs once the children of the node it was registered for are done. Gets
/// whatever node occupies the slot at that point.
pub type ExitFn = Box<dyn FnOnce(&mut TemplateChildNode, &mut TransformContext) -> Result<(), CompilerError>>;

pub type TransformResult = Result<Option<ExitFn>, CompilerError>;

pub type NodeTransform = Arc<dyn Fn(&mut TemplateChildNode, &mut TransformContext) -> TransformResult + Send + Sync>;

/// What a structural directive transform did with the directive it was given.
pub enum DirectiveOutcome {
    /// Put the directive back where it was and move on
    Keep,
    /// The directive was handled, optionally with an exit callback
    Consumed(Option<ExitFn>),
}

pub type StructuralFn = fn(&mut TemplateChildNode, DirectiveNode, &mut TransformContext) -> Result<DirectiveOutcome, CompilerError>;

/// Transforms applied on every compile. Directive-extending transforms run
/// ahead of the built-in `if` transform so their fallback `if` directives
/// are still picked up by it.
pub fn default_node_transforms(_mode: RenderMode) -> Vec<NodeTransform> {
    vec![
        lazy_if::transform_lazy_if(),
        v_if::transform_if(),
        element::transform_element(),
    ]
}

pub fn node_transform<F>(f: F) -> NodeTransform
where
    F: Fn(&mut TemplateChildNode, &mut TransformContext) -> TransformResult + Send + Sync + 'static,
{
    Arc::new(f)
}

pub fn exit_fn<F>(f: F) -> ExitFn
where
    F: FnOnce(&mut TemplateChildNode, &mut TransformContext) -> Result<(), CompilerError> + 'static,
{
    Box::new(f)
}

/// Wrap `f` so it is called for every directive whose name satisfies
/// `matches`. The directive is removed from the element before the call.
pub fn structural_directive_transform(matches: fn(&str) -> bool, f: StructuralFn) -> NodeTransform {
    node_transform(move |slot, ctx| run_structural(slot, ctx, matches, f))
}

pub fn run_structural(
    slot: &mut TemplateChildNode,
    ctx: &mut TransformContext,
    matches: fn(&str) -> bool,
    f: StructuralFn,
) -> TransformResult {
    let mut exits: Vec<ExitFn> = Vec::new();
    let mut i = 0;

    loop {
        let Some(el) = slot.as_element_mut() else {
            break;
        };
        let Some(prop) = el.props.get(i) else {
            break;
        };
        let matched = matches!(prop, PropNode::Directive(d) if matches(&d.name));
        if !matched {
            i += 1;
            continue;
        }
        let PropNode::Directive(dir) = el.props.remove(i) else {
            break;
        };

        ctx.reset_node_replaced();
        match f(slot, dir.clone(), ctx)? {
            DirectiveOutcome::Keep => {
                if let Some(el) = slot.as_element_mut() {
                    el.props.insert(i, PropNode::Directive(dir));
                }
                i += 1;
            }
            DirectiveOutcome::Consumed(exit) => exits.extend(exit),
        }
        if ctx.was_node_replaced() {
            break;
        }
    }

    if exits.is_empty() {
        return Ok(None);
    }
    Ok(Some(exit_fn(move |slot, ctx| {
        for exit in exits.into_iter().rev() {
            exit(slot, ctx)?;
        }
        Ok(())
    })))
}

pub fn traverse_node(slot: &mut TemplateChildNode, ctx: &mut TransformContext) -> Result<(), CompilerError> {
    let transforms = ctx.node_transforms();
    let mut exits: Vec<ExitFn> = Vec::new();

    for transform in transforms.iter() {
        ctx.reset_node_replaced();
        if let Some(exit) = transform(slot, ctx)? {
            exits.push(exit);
        }
    }

    match slot {
        TemplateChildNode::Element(el) => {
            ctx.enter_element(&el.tag);
            traverse_children(&mut el.children, ctx)?;
            ctx.exit_element();
        }
        TemplateChildNode::If(if_node) => {
            for branch in if_node.branches.iter_mut() {
                traverse_children(&mut branch.children, ctx)?;
            }
        }
        TemplateChildNode::Interpolation(_) => {
            ctx.helper(RuntimeHelper::ToDisplayString);
        }
        TemplateChildNode::Comment(_) => {
            if !ctx.is_ssr() {
                ctx.helper(RuntimeHelper::CreateComment);
            }
        }
        // Rewritten nodes finish their own subtree through exit callbacks
        TemplateChildNode::JsConditional(_) | TemplateChildNode::Text(_) => {}
    }

    for exit in exits.into_iter().rev() {
        exit(slot, ctx)?;
    }
    Ok(())
}

pub fn traverse_children(children: &mut Vec<TemplateChildNode>, ctx: &mut TransformContext) -> Result<(), CompilerError> {
    let mut i = 0;
    while i < children.len() {
        ctx.set_child_index(i);
        if v_if::attach_else_branch(children, i, ctx)? {
            // the node moved into an earlier If node, `i` already points at its next sibling
            continue;
        }
        traverse_node(&mut children[i], ctx)?;
        i += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ElementNode, RootNode};
    use crate::options::CompileOptions;

    fn keep_everything(_: &mut TemplateChildNode, _: DirectiveNode, _: &mut TransformContext) -> Result<DirectiveOutcome, CompilerError> {
        Ok(DirectiveOutcome::Keep)
    }

    fn drop_directive(_: &mut TemplateChildNode, _: DirectiveNode, _: &mut TransformContext) -> Result<DirectiveOutcome, CompilerError> {
        Ok(DirectiveOutcome::Consumed(None))
    }

    fn element_with(names: &[&str]) -> TemplateChildNode {
        let mut el = ElementNode::new("div");
        for name in names {
            el.props.push(PropNode::Directive(DirectiveNode::new(*name).with_exp("x")));
        }
        TemplateChildNode::Element(el)
    }

    fn prop_names(slot: &TemplateChildNode) -> Vec<String> {
        slot.as_element().unwrap().props.iter().map(|p| p.name().to_string()).collect()
    }

    #[test]
    fn test_keep_leaves_props_in_place() {
        let root = RootNode::new("t.vue", "", vec![]);
        let mut ctx = TransformContext::new(&root, CompileOptions::default());
        let mut slot = element_with(&["show", "bind", "show"]);

        let exit = run_structural(&mut slot, &mut ctx, |n| n == "show", keep_everything).unwrap();
        assert!(exit.is_none());
        assert_eq!(prop_names(&slot), vec!["show", "bind", "show"]);
    }

    #[test]
    fn test_consumed_directives_are_removed() {
        let root = RootNode::new("t.vue", "", vec![]);
        let mut ctx = TransformContext::new(&root, CompileOptions::default());
        let mut slot = element_with(&["show", "bind", "show"]);

        run_structural(&mut slot, &mut ctx, |n| n == "show", drop_directive).unwrap();
        assert_eq!(prop_names(&slot), vec!["bind"]);
    }

    #[test]
    fn test_exit_order_is_reversed() {
        use std::sync::Mutex;
        static LOG: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

        fn first(_: &mut TemplateChildNode, _: &mut TransformContext) -> TransformResult {
            Ok(Some(exit_fn(|_, _| {
                LOG.lock().unwrap().push("first");
                Ok(())
            })))
        }
        fn second(_: &mut TemplateChildNode, _: &mut TransformContext) -> TransformResult {
            Ok(Some(exit_fn(|_, _| {
                LOG.lock().unwrap().push("second");
                Ok(())
            })))
        }

        let root = RootNode::new("t.vue", "", vec![]);
        let transforms: Vec<NodeTransform> = vec![node_transform(first), node_transform(second)];
        let mut ctx = TransformContext::with_node_transforms(&root, CompileOptions::default(), transforms);
        let mut slot = TemplateChildNode::Element(ElementNode::new("div"));
        traverse_node(&mut slot, &mut ctx).unwrap();

        assert_eq!(*LOG.lock().unwrap(), vec!["second", "first"]);
    }
}
