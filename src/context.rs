//! Per-compile transform state.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::ast::{ElementNode, RootId, RootNode, RuntimeHelper, SourceLocation, TemplateChildNode, TextNode};
use crate::error::{CompilerError, CompilerWarning};
use crate::options::{CompileOptions, RenderMode};
use crate::traverse::{default_node_transforms, NodeTransform};

// ═══════════════════════════════════════════════════════════════════════════════
// CACHE SLOT ALLOCATOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Hands out cache slot indices per root. Indices start at 0 and increase by
/// one per allocation; counters of different roots never interact.
#[derive(Debug, Clone, Default)]
pub struct CacheSlotAllocator {
    next: HashMap<RootId, usize>,
}

impl CacheSlotAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, root: RootId) -> usize {
        let counter = self.next.entry(root).or_insert(0);
        let slot = *counter;
        *counter += 1;
        slot
    }

    /// Number of slots handed out for `root` so far.
    pub fn allocated(&self, root: RootId) -> usize {
        self.next.get(&root).copied().unwrap_or(0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSFORM CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// Traversal position, captured before a node is detached so the traversal
/// can be re-entered for it later.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextSnapshot {
    ancestors: Vec<String>,
    child_index: usize,
}

pub struct TransformContext {
    pub options: CompileOptions,
    pub root: RootId,
    pub ssr: bool,
    pub in_ssr: bool,
    pub slots: CacheSlotAllocator,
    pub warnings: Vec<CompilerWarning>,
    node_transforms: Arc<[NodeTransform]>,
    helpers: Vec<RuntimeHelper>,
    components: Vec<String>,
    directives: Vec<String>,
    ancestors: Vec<String>,
    child_index: usize,
    node_replaced: bool,
}

impl TransformContext {
    pub fn new(root: &RootNode, options: CompileOptions) -> Self {
        let transforms = default_node_transforms(options.render_mode());
        Self::with_node_transforms(root, options, transforms)
    }

    pub fn with_node_transforms(root: &RootNode, options: CompileOptions, transforms: Vec<NodeTransform>) -> Self {
        TransformContext {
            ssr: options.ssr,
            in_ssr: options.in_ssr,
            options,
            root: root.id,
            slots: CacheSlotAllocator::new(),
            warnings: Vec::new(),
            node_transforms: transforms.into(),
            helpers: Vec::new(),
            components: Vec::new(),
            directives: Vec::new(),
            ancestors: Vec::new(),
            child_index: 0,
            node_replaced: false,
        }
    }

    pub fn render_mode(&self) -> RenderMode {
        if self.ssr || self.in_ssr {
            RenderMode::Server
        } else {
            RenderMode::Client
        }
    }

    pub fn is_ssr(&self) -> bool {
        self.render_mode() == RenderMode::Server
    }

    pub fn node_transforms(&self) -> Arc<[NodeTransform]> {
        Arc::clone(&self.node_transforms)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Helpers & assets
    // ───────────────────────────────────────────────────────────────────────────

    /// Register a runtime helper import. Returns its local alias.
    pub fn helper(&mut self, helper: RuntimeHelper) -> String {
        if !self.helpers.contains(&helper) {
            self.helpers.push(helper);
        }
        helper.alias()
    }

    pub fn helpers(&self) -> &[RuntimeHelper] {
        &self.helpers
    }

    pub fn add_component(&mut self, name: &str) {
        if !self.components.iter().any(|c| c == name) {
            self.components.push(name.to_string());
        }
    }

    pub fn add_directive(&mut self, name: &str) {
        if !self.directives.iter().any(|d| d == name) {
            self.directives.push(name.to_string());
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Cache slots
    // ───────────────────────────────────────────────────────────────────────────

    /// Allocate the next cache slot of this root and return its key.
    pub fn allocate_cache_key(&mut self) -> String {
        let slot = self.slots.allocate(self.root);
        let key = format!("{}{}", self.options.cache_key_prefix, slot);
        debug!(file = %self.options.file_path, slot, key = %key, "allocated lazy cache slot");
        key
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Diagnostics
    // ───────────────────────────────────────────────────────────────────────────

    pub fn warn(&mut self, code: &str, message: String, element: &ElementNode) {
        warn!(file = %self.options.file_path, code, tag = %element.tag, "{}", message);
        self.warnings.push(CompilerWarning {
            code: code.to_string(),
            message,
            tag: element.tag.clone(),
            path: self.ancestors.clone(),
            line: element.location.line,
            column: element.location.column,
        });
    }

    pub fn error(&self, code: &str, message: &str, location: &SourceLocation) -> CompilerError {
        CompilerError::new(code, message, &self.options.file_path, location)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Traversal position
    // ───────────────────────────────────────────────────────────────────────────

    pub fn enter_element(&mut self, tag: &str) {
        self.ancestors.push(tag.to_string());
    }

    pub fn exit_element(&mut self) {
        self.ancestors.pop();
    }

    pub fn ancestors(&self) -> &[String] {
        &self.ancestors
    }

    pub fn child_index(&self) -> usize {
        self.child_index
    }

    pub fn set_child_index(&mut self, index: usize) {
        self.child_index = index;
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            ancestors: self.ancestors.clone(),
            child_index: self.child_index,
        }
    }

    /// Reinstate a snapshot, returning the position it replaced.
    pub fn restore(&mut self, snapshot: ContextSnapshot) -> ContextSnapshot {
        ContextSnapshot {
            ancestors: std::mem::replace(&mut self.ancestors, snapshot.ancestors),
            child_index: std::mem::replace(&mut self.child_index, snapshot.child_index),
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Node replacement
    // ───────────────────────────────────────────────────────────────────────────

    /// Put `new_node` where the current node sits in its parent and return
    /// the node it displaced.
    pub fn replace_node(&mut self, slot: &mut TemplateChildNode, new_node: TemplateChildNode) -> TemplateChildNode {
        self.node_replaced = true;
        std::mem::replace(slot, new_node)
    }

    /// Move the current element out of its slot, leaving an empty text node
    /// behind until `replace_node` fills it.
    pub fn take_element(&mut self, slot: &mut TemplateChildNode) -> Option<ElementNode> {
        if slot.as_element().is_none() {
            return None;
        }
        let placeholder = TemplateChildNode::Text(TextNode {
            content: String::new(),
            location: SourceLocation::stub(),
        });
        match std::mem::replace(slot, placeholder) {
            TemplateChildNode::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn was_node_replaced(&self) -> bool {
        self.node_replaced
    }

    pub fn reset_node_replaced(&mut self) {
        self.node_replaced = false;
    }

    /// Copy collected helpers, assets and slot usage onto the root.
    pub fn finish(self, root: &mut RootNode) {
        root.cached = self.slots.allocated(root.id);
        root.helpers = self.helpers;
        root.components = self.components;
        root.directives = self.directives;
        root.transformed = true;
    }
}
