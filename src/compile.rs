//! Compile pipeline: parse → transform → codegen.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span};

use crate::ast::{RootNode, RuntimeHelper};
use crate::codegen;
use crate::context::TransformContext;
use crate::error::{CompilerError, CompilerWarning};
use crate::options::CompileOptions;
use crate::parse::parse_template;
use crate::traverse::traverse_children;
use crate::visitor::collect_cache_keys;

#[cfg(feature = "napi")]
use napi_derive::napi;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOutput {
    pub code: String,
    pub ast: RootNode,
    pub helpers: Vec<RuntimeHelper>,
    pub warnings: Vec<CompilerWarning>,
    /// Cache keys of the lazy rewrites, in document order
    pub cache_slots: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateInput {
    pub file_path: String,
    pub source: String,
}

/// Run the node transforms over a parsed root. Returns the warnings the
/// pass emitted; fatal errors abort the pass.
pub fn transform(root: &mut RootNode, options: &CompileOptions) -> Result<Vec<CompilerWarning>, CompilerError> {
    let mut ctx = TransformContext::new(root, options.clone());
    traverse_children(&mut root.children, &mut ctx)?;
    let warnings = std::mem::take(&mut ctx.warnings);
    ctx.finish(root);
    Ok(warnings)
}

pub fn compile_template(source: &str, options: &CompileOptions) -> Result<CompileOutput, CompilerError> {
    let span = info_span!("compile", file = %options.file_path);
    let _guard = span.enter();

    let mut root = parse_template(source, options)?;
    let warnings = transform(&mut root, options)?;
    let generated = codegen::generate(&root);
    let cache_slots = collect_cache_keys(&root);
    debug!(
        slots = cache_slots.len(),
        warnings = warnings.len(),
        mode = ?options.render_mode(),
        "compiled template"
    );

    Ok(CompileOutput {
        code: generated.code,
        ast: root,
        helpers: generated.helpers,
        warnings,
        cache_slots,
    })
}

/// Compile independent templates in parallel. Every template gets its own
/// root, so the output matches compiling them one by one.
pub fn compile_templates(
    inputs: &[TemplateInput],
    options: &CompileOptions,
) -> Vec<Result<CompileOutput, CompilerError>> {
    inputs
        .par_iter()
        .map(|input| {
            let options = options.clone().with_file_path(input.file_path.clone());
            compile_template(&input.source, &options)
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi]
pub fn compile_template_native(source: String, options_json: Option<String>) -> napi::Result<serde_json::Value> {
    let options: CompileOptions = match options_json {
        Some(json) => serde_json::from_str(&json).map_err(|e| napi::Error::from_reason(e.to_string()))?,
        None => CompileOptions::default(),
    };
    let output = compile_template(&source, &options).map_err(|e| napi::Error::from_reason(e.message))?;
    serde_json::to_value(output).map_err(|e| napi::Error::from_reason(e.to_string()))
}
