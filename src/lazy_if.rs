//! Lazy conditional rendering.
//!
//! `v-lazy-if` / `v-lazy-show` / `v-show.lazy` keep an element unrendered
//! until its condition is first true. From then on the element stays mounted
//! and only its visibility follows the condition. The element is rewritten to
//!
//! ```text
//! (_cache._lz_if_0 || exp)
//!   ? (_cache._lz_if_0 = true, (_openBlock(), _createElementBlock(_Fragment, null, [
//!       _withDirectives(<element>, [[_vShow, exp]])
//!     ], 64 /* STABLE_FRAGMENT */)))
//!   : _createCommentVNode("lazy-load-placeholder", true)
//! ```
//!
//! Server rendering and `<template>` elements fall back to a plain `if`.

use tracing::debug;

use crate::ast::{
    CallArgument, CallExpression, CompoundPart, ConditionalExpression, DirectiveNode, ExpressionNode, JsNode,
    PatchFlags, PropNode, RuntimeHelper, SequenceExpression, TemplateChildNode, VNodeCall, VNodeTag,
};
use crate::context::{ContextSnapshot, TransformContext};
use crate::directive;
use crate::error::{CompilerError, LAZY_ON_TEMPLATE};
use crate::recapture;
use crate::traverse::{self, exit_fn, structural_directive_transform, DirectiveOutcome, NodeTransform};
use crate::v_if;

pub fn transform_lazy_if() -> NodeTransform {
    structural_directive_transform(directive::matches_transform, process_lazy_if)
}

pub fn process_lazy_if(
    slot: &mut TemplateChildNode,
    mut dir: DirectiveNode,
    ctx: &mut TransformContext,
) -> Result<DirectiveOutcome, CompilerError> {
    if !directive::is_lazy(&dir) {
        return Ok(DirectiveOutcome::Keep);
    }
    let Some(node) = slot.as_element_mut() else {
        return Ok(DirectiveOutcome::Keep);
    };

    let name = directive::display_name(&dir);
    let Some(exp) = dir.exp.as_mut() else {
        return Err(CompilerError::missing_expression(&name, &ctx.options.file_path, &dir.location));
    };
    let original = recapture::recapture(exp);
    recapture::recapture_bindings(&mut node.props);

    if node.is_template() {
        ctx.warn(
            LAZY_ON_TEMPLATE,
            format!("Directive {} can not be used on <template>, fallback to v-if", name),
            node,
        );
        node.props.push(PropNode::Directive(as_plain(dir, "if")));
        if ctx.is_ssr() {
            return Ok(DirectiveOutcome::Consumed(v_if::ssr_transform_if(slot, ctx)?));
        }
        // the pushed `if` is picked up by the built-in transform
        return Ok(DirectiveOutcome::Consumed(None));
    }

    if ctx.is_ssr() {
        debug!(file = %ctx.options.file_path, directive = %name, tag = %node.tag, "server render, using plain if");
        node.props.push(PropNode::Directive(as_plain(dir, "if")));
        return Ok(DirectiveOutcome::Consumed(v_if::ssr_transform_if(slot, ctx)?));
    }

    rewrite(slot, dir, original, ctx)
}

/// Same directive under `name` with the lazy qualifier removed.
fn as_plain(dir: DirectiveNode, name: &str) -> DirectiveNode {
    DirectiveNode {
        name: name.to_string(),
        modifiers: directive::strip_lazy(&dir.modifiers),
        ..dir
    }
}

fn rewrite(
    slot: &mut TemplateChildNode,
    dir: DirectiveNode,
    original: ExpressionNode,
    ctx: &mut TransformContext,
) -> Result<DirectiveOutcome, CompilerError> {
    let snapshot = ctx.snapshot();
    let Some(mut element) = ctx.take_element(slot) else {
        return Ok(DirectiveOutcome::Keep);
    };

    let key = ctx.allocate_cache_key();
    let flag = format!("_cache.{}", key);
    debug!(file = %ctx.options.file_path, tag = %element.tag, key = %key, "lazy rewrite");

    // visibility keeps following the condition once the element is mounted
    element.props.push(PropNode::Directive(as_plain(dir, "show")));
    let location = element.location.clone();

    ctx.helper(RuntimeHelper::OpenBlock);
    ctx.helper(RuntimeHelper::CreateElementBlock);
    ctx.helper(RuntimeHelper::Fragment);
    let wrapper = VNodeCall {
        tag: VNodeTag::Helper(RuntimeHelper::Fragment),
        props: Vec::new(),
        children: vec![TemplateChildNode::Element(element)],
        patch_flag: PatchFlags::STABLE_FRAGMENT,
        dynamic_props: Vec::new(),
        directives: Vec::new(),
        is_block: true,
        disable_tracking: false,
        is_component: false,
        location,
    };

    let test = JsNode::Expression(ExpressionNode::compound(vec![
        CompoundPart::Raw(flag.clone()),
        CompoundPart::Raw(" || ".to_string()),
        CompoundPart::Node(original),
    ]));
    let consequent = JsNode::Sequence(SequenceExpression {
        expressions: vec![
            JsNode::Expression(ExpressionNode::compound(vec![CompoundPart::Raw(format!("{} = true", flag))])),
            JsNode::VNodeCall(wrapper),
        ],
    });

    ctx.helper(RuntimeHelper::CreateComment);
    let placeholder = serde_json::to_string(&ctx.options.placeholder_comment)
        .unwrap_or_else(|_| "\"\"".to_string());
    let alternate = JsNode::Call(CallExpression {
        callee: RuntimeHelper::CreateComment,
        arguments: vec![CallArgument::Raw(placeholder), CallArgument::Raw("true".to_string())],
    });

    ctx.replace_node(
        slot,
        TemplateChildNode::JsConditional(ConditionalExpression::new(test, consequent, alternate)),
    );

    Ok(DirectiveOutcome::Consumed(Some(exit_fn(move |slot, ctx| {
        finish_rewrite(slot, ctx, snapshot)
    }))))
}

/// Traverse the wrapped element, which left the tree before the driver
/// reached its children. Skipped when it already has a codegen node.
fn finish_rewrite(
    slot: &mut TemplateChildNode,
    ctx: &mut TransformContext,
    snapshot: ContextSnapshot,
) -> Result<(), CompilerError> {
    let TemplateChildNode::JsConditional(conditional) = slot else {
        return Ok(());
    };
    let Some(inner) = conditional.wrapped_slot_mut() else {
        return Ok(());
    };
    let done = inner.as_element().map(|el| el.codegen_node.is_some()).unwrap_or(true);
    if done {
        return Ok(());
    }

    let previous = ctx.restore(snapshot);
    let result = traverse::traverse_node(inner, ctx);
    ctx.restore(previous);
    result
}
