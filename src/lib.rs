//! # Lazy conditional rendering compiler
//!
//! Template compiler with the `v-lazy-if` / `v-lazy-show` / `v-show.lazy`
//! structural directives.
//!
//! ## Rendering Invariants
//!
//! 1. **Render once, then toggle**: a lazy element renders a placeholder
//!    comment until its condition is first truthy. From then on it stays
//!    mounted and only its `show` directive follows the condition.
//!
//! 2. **Cache slots**: every lazy site owns one `_cache` slot. Slots are
//!    allocated per root in document order starting at `_lz_if_0`, so the
//!    same input always compiles to the same keys.
//!
//! 3. **Fallbacks**: on `<template>` (with warning `LAZY_W001`) and in
//!    server renders the directive degrades to a plain `v-if`. Server
//!    output never contains a cache flag or a `show` directive.
//!
//! 4. **Passthrough**: plain `v-if` / `v-show` are left to the built-in
//!    transforms untouched.
//!
//! 5. **Missing expression**: a lazy directive without a value aborts the
//!    compile with `LAZY001`.

pub mod ast;
pub mod cache;
pub mod codegen;
pub mod compile;
pub mod context;
pub mod directive;
pub mod element;
pub mod error;
pub mod js_eval;
pub mod lazy_if;
pub mod options;
pub mod parse;
pub mod recapture;
pub mod runtime;
pub mod traverse;
pub mod v_if;
pub mod visitor;


pub use ast::{RootNode, TemplateChildNode};
pub use cache::CompileCache;
pub use codegen::{generate, CodegenResult};
pub use compile::{compile_template, compile_templates, transform, CompileOutput, TemplateInput};
pub use error::{CompilerError, CompilerWarning};
pub use options::{CompileOptions, RenderMode};
pub use parse::parse_template;
pub use runtime::{RenderInstance, VNode};

#[cfg(feature = "napi")]
pub use compile::compile_template_native;
