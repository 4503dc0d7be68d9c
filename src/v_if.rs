//! Built-in `if` / `else-if` / `else` handling.
//!
//! An `if` element is replaced by an `If` node holding one branch. Following
//! `else-if` / `else` siblings are moved into that node as extra branches by
//! the traversal driver.

use crate::ast::{
    DirectiveNode, ElementNode, ElementType, ExpressionNode, IfBranchNode, IfNode, PropNode, RuntimeHelper,
    TemplateChildNode,
};
use crate::context::TransformContext;
use crate::error::{CompilerError, ELSE_NO_ADJACENT_IF, IF_NO_EXPRESSION};
use crate::traverse::{self, run_structural, structural_directive_transform, DirectiveOutcome, NodeTransform, TransformResult};

fn is_if(name: &str) -> bool {
    name == "if"
}

fn is_else_branch(name: &str) -> bool {
    name == "else" || name == "else-if"
}

pub fn transform_if() -> NodeTransform {
    structural_directive_transform(is_if, process_if)
}

/// Entry point for other transforms that push an `if` directive onto an
/// element while rendering on the server and need it applied right away.
pub fn ssr_transform_if(slot: &mut TemplateChildNode, ctx: &mut TransformContext) -> TransformResult {
    run_structural(slot, ctx, is_if, process_if)
}

pub fn process_if(
    slot: &mut TemplateChildNode,
    dir: DirectiveNode,
    ctx: &mut TransformContext,
) -> Result<DirectiveOutcome, CompilerError> {
    let condition = branch_condition(&dir, ctx)?;
    let Some(element) = ctx.take_element(slot) else {
        return Ok(DirectiveOutcome::Keep);
    };

    let location = element.location.clone();
    let branch = create_branch(element, Some(condition), ctx);
    if !ctx.is_ssr() {
        // no else branch yet, the printer falls back to a comment vnode
        ctx.helper(RuntimeHelper::CreateComment);
    }
    ctx.replace_node(
        slot,
        TemplateChildNode::If(IfNode {
            branches: vec![branch],
            location,
        }),
    );
    Ok(DirectiveOutcome::Consumed(None))
}

/// Move an `else` / `else-if` element at `index` into the closest preceding
/// `If` node and traverse the new branch. Returns `false` when the node at
/// `index` is not an else branch.
pub fn attach_else_branch(
    children: &mut Vec<TemplateChildNode>,
    index: usize,
    ctx: &mut TransformContext,
) -> Result<bool, CompilerError> {
    let Some(el) = children[index].as_element() else {
        return Ok(false);
    };
    let Some(pos) = el
        .props
        .iter()
        .position(|p| matches!(p, PropNode::Directive(d) if is_else_branch(&d.name)))
    else {
        return Ok(false);
    };

    let mut target = None;
    let mut j = index;
    while j > 0 {
        j -= 1;
        match &children[j] {
            TemplateChildNode::If(_) => {
                target = Some(j);
                break;
            }
            node if node.is_whitespace_or_comment() => continue,
            _ => break,
        }
    }

    let closed = match target.map(|t| &children[t]) {
        Some(TemplateChildNode::If(if_node)) => if_node.branches.last().map(|b| b.condition.is_none()).unwrap_or(false),
        _ => true,
    };
    if closed {
        return Err(ctx.error(
            ELSE_NO_ADJACENT_IF,
            "v-else/v-else-if has no adjacent v-if or v-else-if.",
            &el.location,
        ));
    }
    let Some(target) = target else {
        return Ok(false);
    };

    let TemplateChildNode::Element(mut element) = children.remove(index) else {
        return Ok(false);
    };
    let PropNode::Directive(dir) = element.props.remove(pos) else {
        return Ok(false);
    };
    let condition = if dir.name == "else-if" {
        Some(branch_condition(&dir, ctx)?)
    } else {
        None
    };

    let branch = create_branch(element, condition, ctx);
    let TemplateChildNode::If(if_node) = &mut children[target] else {
        return Ok(false);
    };
    if_node.branches.push(branch);
    if let Some(branch) = if_node.branches.last_mut() {
        traverse::traverse_children(&mut branch.children, ctx)?;
    }
    Ok(true)
}

fn branch_condition(dir: &DirectiveNode, ctx: &TransformContext) -> Result<ExpressionNode, CompilerError> {
    match &dir.exp {
        Some(exp) if exp.content().map(|c| !c.trim().is_empty()).unwrap_or(true) => Ok(exp.clone()),
        _ => Err(ctx.error(IF_NO_EXPRESSION, "v-if/v-else-if is missing expression.", &dir.location)),
    }
}

/// A `<template>` branch contributes its children, anything else contributes
/// itself.
fn create_branch(element: ElementNode, condition: Option<ExpressionNode>, ctx: &mut TransformContext) -> IfBranchNode {
    let location = element.location.clone();
    match element.tag_type {
        ElementType::Template => {
            if !ctx.is_ssr() {
                ctx.helper(RuntimeHelper::Fragment);
            }
            IfBranchNode {
                condition,
                children: element.children,
                is_template_if: true,
                location,
            }
        }
        ElementType::Element | ElementType::Component => {
            if !ctx.is_ssr() {
                ctx.helper(RuntimeHelper::OpenBlock);
                ctx.helper(if element.tag_type == ElementType::Component {
                    RuntimeHelper::CreateBlock
                } else {
                    RuntimeHelper::CreateElementBlock
                });
            }
            IfBranchNode {
                condition,
                children: vec![TemplateChildNode::Element(element)],
                is_template_if: false,
                location,
            }
        }
    }
}
