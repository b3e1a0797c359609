//! Template Compiler
//!
//! Walks a host tree depth-first and installs a binding for every directive
//! attribute and every text node holding an interpolation.
//!
//! # Mounting
//!
//! Mounting moves the root's children into a detached fragment, compiles the
//! fragment, and puts the children back in one operation. The root node
//! itself is never replaced. The fragment is reattached even when
//! compilation fails.
//!
//! # Failures
//!
//! A failing directive does not stop the pass. The failure is recorded with
//! the node and expression that caused it, the failing element's subtree is
//! skipped, and compilation continues with its siblings. Every failure of the
//! pass is returned together as [`Error::Compile`]. Bindings that did install
//! on a failing element are torn down again, so the element stays unbound.
//!
//! # Recompilation
//!
//! Nodes that already own bindings are skipped, so compiling the same tree
//! twice installs nothing new.

pub mod binding;
pub mod directive;
pub mod updater;

pub use binding::Binding;
pub use directive::{
    install_interpolation, Directive, DirectiveKind, DirectiveRegistry, Installer, ModelInstaller,
    OnInstaller, RenderInstaller,
};
pub use updater::Updater;

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::dom::{NodeKind, NodeRef};
use crate::error::{Error, Result};
use crate::expr::contains_interpolation;
use crate::vm::ViewModel;

pub struct Compiler<'a> {
    vm: &'a ViewModel,
    installed: usize,
    errors: Vec<Error>,
}

impl<'a> Compiler<'a> {
    pub fn new(vm: &'a ViewModel) -> Self {
        Self {
            vm,
            installed: 0,
            errors: Vec::new(),
        }
    }

    /// Detach `root`'s children, compile them, and reattach them.
    ///
    /// Returns the number of bindings installed.
    pub fn mount(mut self, root: &NodeRef) -> Result<usize> {
        let fragment = root.take_children();
        debug!(root = ?root, children = fragment.len(), "compiling detached fragment");

        self.compile_nodes(&fragment);
        root.append_children(fragment);
        self.finish()
    }

    /// Compile `root`'s children in place.
    pub fn compile(mut self, root: &NodeRef) -> Result<usize> {
        self.compile_nodes(&root.children());
        self.finish()
    }

    fn finish(self) -> Result<usize> {
        debug!(
            bindings = self.installed,
            errors = self.errors.len(),
            "compilation finished"
        );
        if self.errors.is_empty() {
            Ok(self.installed)
        } else {
            Err(Error::Compile(self.errors))
        }
    }

    fn compile_nodes(&mut self, nodes: &[NodeRef]) {
        for node in nodes {
            match node.kind() {
                NodeKind::Element => {
                    if self.compile_element(node) {
                        self.compile_nodes(&node.children());
                    }
                }
                NodeKind::Text => self.compile_text(node),
            }
        }
    }

    /// Install every directive on `node`. Returns whether to descend.
    fn compile_element(&mut self, node: &NodeRef) -> bool {
        let vm = self.vm;
        if vm.is_bound(node.id()) {
            trace!(node = ?node, "already bound");
            return true;
        }

        let prefix = vm.settings().directive_prefix.as_str();
        let mut bindings: SmallVec<[Binding; 2]> = SmallVec::new();
        let mut failed = false;

        for attr in node.attributes() {
            let result = Directive::parse(&attr.name, &attr.value, prefix).and_then(|directive| {
                let Some(directive) = directive else {
                    return Ok(None);
                };
                let installer = vm
                    .registry()
                    .installer(directive.kind)
                    .ok_or_else(|| Error::UnknownDirective(directive.kind.name().to_string()))?;
                installer.install(node, &directive, vm).map(Some)
            });

            match result {
                Ok(Some(binding)) => bindings.push(binding),
                Ok(None) => {}
                Err(err) => {
                    failed = true;
                    self.fail(node, &attr.value, err);
                }
            }
        }

        if failed {
            // Leave the node unbound so the next pass retries and reports it.
            for binding in &bindings {
                binding.teardown();
            }
            return false;
        }
        self.record(node, bindings.into_vec());
        true
    }

    fn compile_text(&mut self, node: &NodeRef) {
        let vm = self.vm;
        if vm.is_bound(node.id()) {
            return;
        }
        let text = node.text_content();
        let (open, close) = &vm.settings().delimiters;
        if !contains_interpolation(&text, (open.as_str(), close.as_str())) {
            return;
        }

        match install_interpolation(node, &text, vm) {
            Ok(binding) => self.record(node, vec![binding]),
            Err(err) => self.fail(node, &text, err),
        }
    }

    fn record(&mut self, node: &NodeRef, bindings: Vec<Binding>) {
        if bindings.is_empty() {
            return;
        }
        debug!(node = ?node, bindings = bindings.len(), "bindings installed");
        self.installed += bindings.len();
        self.vm.record(node.id(), bindings);
    }

    fn fail(&mut self, node: &NodeRef, expression: &str, err: Error) {
        debug!(node = ?node, expression, error = %err, "binding failed");
        self.errors.push(Error::Binding {
            node: format!("{node:?}"),
            expression: expression.to_string(),
            source: Box::new(err),
        });
    }
}
