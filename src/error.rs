use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ast::SourceLocation;

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const MISSING_EXPRESSION: &str = "LAZY001";
pub const IF_NO_EXPRESSION: &str = "LAZY002";
pub const ELSE_NO_ADJACENT_IF: &str = "LAZY003";
pub const INVALID_EXPRESSION: &str = "LAZY004";
pub const PARSE_ERROR: &str = "PARSE_ERROR";
pub const RENDER_ERROR: &str = "RENDER_ERROR";

// Warning codes
pub const LAZY_ON_TEMPLATE: &str = "LAZY_W001";

fn get_hint(code: &str) -> Option<&'static str> {
    match code {
        MISSING_EXPRESSION => Some("Lazy directives need a condition, e.g. v-lazy-if=\"visible\"."),
        IF_NO_EXPRESSION => Some("v-if and v-else-if need a condition."),
        ELSE_NO_ADJACENT_IF => {
            Some("v-else and v-else-if must directly follow an element with v-if or v-else-if.")
        }
        INVALID_EXPRESSION => Some("Directive values and interpolations must be JavaScript expressions."),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER ERROR
// ═══════════════════════════════════════════════════════════════════════════════

/// A fatal compile error. Aborts the whole compile pass.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct CompilerError {
    pub code: String,
    pub message: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub hints: Vec<String>,
}

impl CompilerError {
    pub fn new(code: &str, message: &str, file: &str, location: &SourceLocation) -> Self {
        CompilerError {
            code: code.to_string(),
            message: message.to_string(),
            file: file.to_string(),
            line: location.line,
            column: location.column,
            hints: get_hint(code).map(|h| vec![h.to_string()]).unwrap_or_default(),
        }
    }

    /// Directive `name` was written without a value.
    pub fn missing_expression(directive_name: &str, file: &str, location: &SourceLocation) -> Self {
        Self::new(
            MISSING_EXPRESSION,
            &format!("Directive {} requires an expression.", directive_name),
            file,
            location,
        )
    }

    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER WARNING
// ═══════════════════════════════════════════════════════════════════════════════

/// Non-fatal diagnostic. Compilation continues with a fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerWarning {
    pub code: String,
    pub message: String,
    /// Tag of the element the directive sits on
    pub tag: String,
    /// Ancestor tags from the root down to the element's parent
    pub path: Vec<String>,
    pub line: u32,
    pub column: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_expression_message_names_directive() {
        let err = CompilerError::missing_expression("lazy-if", "App.vue", &SourceLocation::stub());
        assert_eq!(err.to_string(), "Directive lazy-if requires an expression.");
        assert!(err.is(MISSING_EXPRESSION));
        assert_eq!(err.file, "App.vue");
        assert_eq!(err.hints.len(), 1);
    }

    #[test]
    fn test_unknown_code_has_no_hints() {
        let err = CompilerError::new(PARSE_ERROR, "bad", "x", &SourceLocation::stub());
        assert!(err.hints.is_empty());
    }
}
