//! Element codegen: turns an element's props into a `VNodeCall` once its
//! children have been transformed.

use crate::ast::{
    DirectiveNode, ElementNode, ElementType, ExpressionNode, PatchFlags, PropEntry, PropNode, RuntimeDirective,
    RuntimeHelper, TemplateChildNode, VNodeCall, VNodeTag,
};
use crate::context::TransformContext;
use crate::traverse::{exit_fn, node_transform, NodeTransform};

/// Directives consumed by structural transforms. If one survives to codegen
/// it is dropped rather than resolved as a user directive.
const STRUCTURAL_DIRECTIVES: &[&str] = &["if", "else", "else-if", "for", "slot", "lazy-if", "lazy-show"];

pub fn transform_element() -> NodeTransform {
    node_transform(|slot, _ctx| {
        if slot.as_element().is_none() {
            return Ok(None);
        }
        Ok(Some(exit_fn(|slot, ctx| {
            if let TemplateChildNode::Element(el) = slot {
                let call = build_vnode_call(el, ctx);
                el.codegen_node = Some(call);
            }
            Ok(())
        })))
    })
}

pub fn build_vnode_call(el: &ElementNode, ctx: &mut TransformContext) -> VNodeCall {
    let is_component = el.tag_type == ElementType::Component;
    let tag = if is_component {
        ctx.add_component(&el.tag);
        ctx.helper(RuntimeHelper::ResolveComponent);
        ctx.helper(RuntimeHelper::CreateVNode);
        VNodeTag::Component(el.tag.clone())
    } else {
        ctx.helper(RuntimeHelper::CreateElementVNode);
        VNodeTag::Element(el.tag.clone())
    };

    let mut props = Vec::new();
    let mut directives = Vec::new();
    let mut dynamic_props = Vec::new();
    let mut patch_flag = PatchFlags::empty();

    for prop in &el.props {
        match prop {
            PropNode::Attribute(attr) => props.push(PropEntry::Static {
                name: attr.name.clone(),
                value: attr.value.clone().unwrap_or_default(),
            }),
            PropNode::Directive(dir) => match dir.name.as_str() {
                "bind" => build_bind(dir, &mut props, &mut dynamic_props, &mut patch_flag),
                "on" => {
                    if let Some(event) = dir.static_arg() {
                        let exp = dir.exp.clone().unwrap_or_else(|| ExpressionNode::simple("() => {}"));
                        props.push(PropEntry::Handler {
                            name: handler_name(event),
                            exp,
                        });
                    }
                }
                "show" => {
                    ctx.helper(RuntimeHelper::WithDirectives);
                    ctx.helper(RuntimeHelper::VShow);
                    directives.push(runtime_directive(dir, Some(RuntimeHelper::VShow)));
                }
                name if STRUCTURAL_DIRECTIVES.contains(&name) => {}
                name => {
                    ctx.helper(RuntimeHelper::WithDirectives);
                    ctx.helper(RuntimeHelper::ResolveDirective);
                    ctx.add_directive(name);
                    directives.push(runtime_directive(dir, None));
                }
            },
        }
    }

    let has_text = el
        .children
        .iter()
        .any(|c| matches!(c, TemplateChildNode::Interpolation(_)));
    let text_only = el
        .children
        .iter()
        .all(|c| matches!(c, TemplateChildNode::Text(_) | TemplateChildNode::Interpolation(_)));
    if has_text && text_only && !is_component {
        patch_flag |= PatchFlags::TEXT;
    }
    if !text_only && el.children.iter().any(|c| matches!(c, TemplateChildNode::Text(_))) {
        ctx.helper(RuntimeHelper::CreateText);
    }
    if is_component && !el.children.is_empty() {
        ctx.helper(RuntimeHelper::WithCtx);
    }
    if !directives.is_empty() && patch_flag.is_empty() {
        patch_flag |= PatchFlags::NEED_PATCH;
    }

    VNodeCall {
        tag,
        props,
        children: Vec::new(),
        patch_flag,
        dynamic_props,
        directives,
        is_block: false,
        disable_tracking: false,
        is_component,
        location: el.location.clone(),
    }
}

fn build_bind(dir: &DirectiveNode, props: &mut Vec<PropEntry>, dynamic_props: &mut Vec<String>, flag: &mut PatchFlags) {
    let Some(exp) = dir.exp.clone() else {
        return;
    };
    let Some(name) = dir.static_arg() else {
        *flag |= PatchFlags::FULL_PROPS;
        props.push(PropEntry::Spread(exp));
        return;
    };
    match name {
        "class" => *flag |= PatchFlags::CLASS,
        "style" => *flag |= PatchFlags::STYLE,
        "key" => {}
        _ => {
            *flag |= PatchFlags::PROPS;
            dynamic_props.push(name.to_string());
        }
    }
    props.push(PropEntry::Dynamic {
        name: name.to_string(),
        exp,
    });
}

fn runtime_directive(dir: &DirectiveNode, helper: Option<RuntimeHelper>) -> RuntimeDirective {
    RuntimeDirective {
        name: dir.name.clone(),
        helper,
        exp: dir.exp.clone(),
        arg: dir.static_arg().map(str::to_string),
        modifiers: dir.modifiers.clone(),
    }
}

/// `click` -> `onClick`, `update:value` -> `onUpdate:value`
fn handler_name(event: &str) -> String {
    let mut chars = event.chars();
    match chars.next() {
        Some(first) => format!("on{}{}", first.to_uppercase(), chars.as_str()),
        None => "on".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AttributeNode, InterpolationNode, RootNode, SourceLocation};
    use crate::options::CompileOptions;

    fn build(el: ElementNode) -> (VNodeCall, Vec<RuntimeHelper>) {
        let root = RootNode::new("t.vue", "", vec![]);
        let mut ctx = TransformContext::new(&root, CompileOptions::default());
        let call = build_vnode_call(&el, &mut ctx);
        (call, ctx.helpers().to_vec())
    }

    #[test]
    fn test_show_becomes_runtime_directive() {
        let el = ElementNode::new("div").with_prop(PropNode::Directive(DirectiveNode::new("show").with_exp("open")));
        let (call, helpers) = build(el);

        assert_eq!(call.directives.len(), 1);
        assert_eq!(call.directives[0].helper, Some(RuntimeHelper::VShow));
        assert_eq!(call.patch_flag, PatchFlags::NEED_PATCH);
        assert!(helpers.contains(&RuntimeHelper::WithDirectives));
        assert!(helpers.contains(&RuntimeHelper::VShow));
    }

    #[test]
    fn test_props_and_flags() {
        let el = ElementNode::new("a")
            .with_prop(PropNode::Attribute(AttributeNode::new("class", Some("link"))))
            .with_prop(PropNode::Directive(DirectiveNode::new("bind").with_arg("href").with_exp("url")))
            .with_prop(PropNode::Directive(DirectiveNode::new("on").with_arg("click").with_exp("go")))
            .with_child(TemplateChildNode::Interpolation(InterpolationNode {
                content: ExpressionNode::simple("label"),
                location: SourceLocation::stub(),
            }));
        let (call, _) = build(el);

        assert_eq!(call.patch_flag, PatchFlags::TEXT | PatchFlags::PROPS);
        assert_eq!(call.dynamic_props, vec!["href".to_string()]);
        assert!(matches!(&call.props[2], PropEntry::Handler { name, .. } if name == "onClick"));
    }

    #[test]
    fn test_custom_directive_is_resolved() {
        let el = ElementNode::new("input").with_prop(PropNode::Directive(DirectiveNode::new("focus")));
        let root = RootNode::new("t.vue", "", vec![]);
        let mut ctx = TransformContext::new(&root, CompileOptions::default());
        let call = build_vnode_call(&el, &mut ctx);
        let mut out = RootNode::new("t.vue", "", vec![]);
        ctx.finish(&mut out);

        assert_eq!(call.directives[0].helper, None);
        assert_eq!(out.directives, vec!["focus".to_string()]);
    }

    #[test]
    fn test_handler_name() {
        assert_eq!(handler_name("click"), "onClick");
        assert_eq!(handler_name("update:value"), "onUpdate:value");
    }
}
