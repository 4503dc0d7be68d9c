//! Directive classification for the lazy conditional family.
//!
//! Accepted spellings: `v-lazy-if`, `v-lazy-show`, `v-show.lazy` and
//! `v-if.lazy`. Plain `if` / `show` are matched too so they can be handed
//! back untouched.

use lazy_static::lazy_static;
use regex::Regex;

use crate::ast::DirectiveNode;

lazy_static! {
    /// Directive names the lazy transform registers for.
    static ref TRANSFORM_PATTERN: Regex = Regex::new(r"^(?:lazy-(?:if|show)|(?:if|show))$").unwrap();
    static ref PREFIX_FORM: Regex = Regex::new(r"^lazy-(?:if|show)$").unwrap();
}

pub const LAZY_MODIFIER: &str = "lazy";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveFamily {
    If,
    ElseIf,
    Else,
    Show,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LazyForm {
    /// `lazy-if`, `lazy-show`
    Prefix,
    /// `if.lazy`, `show.lazy`
    Modifier,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub family: DirectiveFamily,
    pub lazy: Option<LazyForm>,
}

impl Classification {
    pub fn is_lazy(&self) -> bool {
        self.lazy.is_some()
    }
}

/// True when the lazy transform should be invoked for a directive name.
pub fn matches_transform(name: &str) -> bool {
    TRANSFORM_PATTERN.is_match(name)
}

/// Classify a directive of the conditional family. Returns `None` for any
/// other directive.
pub fn classify(dir: &DirectiveNode) -> Option<Classification> {
    let (family, prefixed) = match dir.name.as_str() {
        "if" => (DirectiveFamily::If, false),
        "show" => (DirectiveFamily::Show, false),
        "lazy-if" => (DirectiveFamily::If, true),
        "lazy-show" => (DirectiveFamily::Show, true),
        // else branches never take the lazy qualifier
        "else" => return Some(Classification { family: DirectiveFamily::Else, lazy: None }),
        "else-if" => return Some(Classification { family: DirectiveFamily::ElseIf, lazy: None }),
        _ => return None,
    };

    let lazy = if prefixed {
        Some(LazyForm::Prefix)
    } else if dir.has_modifier(LAZY_MODIFIER) {
        Some(LazyForm::Modifier)
    } else {
        None
    };

    Some(Classification { family, lazy })
}

pub fn is_lazy(dir: &DirectiveNode) -> bool {
    classify(dir).map(|c| c.is_lazy()).unwrap_or(false)
}

/// Name used in diagnostics: `lazy-if` for the prefix form, `show.lazy` for
/// the modifier form.
pub fn display_name(dir: &DirectiveNode) -> String {
    if PREFIX_FORM.is_match(&dir.name) {
        dir.name.clone()
    } else {
        format!("{}.{}", dir.name, LAZY_MODIFIER)
    }
}

/// Modifiers with the lazy qualifier removed, order preserved.
pub fn strip_lazy(modifiers: &[String]) -> Vec<String> {
    modifiers
        .iter()
        .filter(|m| m.as_str() != LAZY_MODIFIER)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_pattern() {
        assert!(matches_transform("lazy-if"));
        assert!(matches_transform("lazy-show"));
        assert!(matches_transform("if"));
        assert!(matches_transform("show"));
        assert!(!matches_transform("else"));
        assert!(!matches_transform("else-if"));
        assert!(!matches_transform("lazy-else"));
        assert!(!matches_transform("showy"));
    }

    #[test]
    fn test_prefix_and_modifier_forms() {
        let prefix = classify(&DirectiveNode::new("lazy-if")).unwrap();
        assert_eq!(prefix.family, DirectiveFamily::If);
        assert_eq!(prefix.lazy, Some(LazyForm::Prefix));

        let modifier = classify(&DirectiveNode::new("show").with_modifiers(&["lazy"])).unwrap();
        assert_eq!(modifier.family, DirectiveFamily::Show);
        assert_eq!(modifier.lazy, Some(LazyForm::Modifier));

        let plain = classify(&DirectiveNode::new("show")).unwrap();
        assert!(!plain.is_lazy());
    }

    #[test]
    fn test_else_never_lazy() {
        let dir = DirectiveNode::new("else-if").with_modifiers(&["lazy"]);
        let c = classify(&dir).unwrap();
        assert_eq!(c.family, DirectiveFamily::ElseIf);
        assert!(!c.is_lazy());
        assert!(classify(&DirectiveNode::new("bind")).is_none());
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(&DirectiveNode::new("lazy-show")), "lazy-show");
        assert_eq!(
            display_name(&DirectiveNode::new("show").with_modifiers(&["lazy"])),
            "show.lazy"
        );
        assert_eq!(
            display_name(&DirectiveNode::new("if").with_modifiers(&["lazy"])),
            "if.lazy"
        );
    }

    #[test]
    fn test_strip_lazy_keeps_order() {
        let mods = vec!["a".to_string(), "lazy".to_string(), "b".to_string()];
        assert_eq!(strip_lazy(&mods), vec!["a".to_string(), "b".to_string()]);
    }
}
