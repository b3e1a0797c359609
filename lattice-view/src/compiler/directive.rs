//! Directives and their installers.
//!
//! A directive attribute reads `prefix-name` or `prefix-name:argument`. The
//! name selects one of a closed set of binding categories; the registry maps
//! each category to the [`Installer`] that wires it up. Unknown names are an
//! error, never silently skipped.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{trace, warn};

use super::binding::Binding;
use super::updater::Updater;
use crate::dom::{Event, NodeRef};
use crate::error::{Error, Result};
use crate::expr::{Path, Template};
use crate::value::Value;
use crate::vm::ViewModel;

/// Binding categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    /// Two-way value binding (`v-model`).
    Model,
    /// Event binding (`v-on:<event>`).
    On,
    /// Rich-content binding (`v-html`).
    Html,
    /// Plain-text binding: `v-text` and `{{ }}` interpolation.
    Text,
}

impl DirectiveKind {
    pub fn name(self) -> &'static str {
        match self {
            DirectiveKind::Model => "model",
            DirectiveKind::On => "on",
            DirectiveKind::Html => "html",
            DirectiveKind::Text => "text",
        }
    }

    pub fn requires_argument(self) -> bool {
        matches!(self, DirectiveKind::On)
    }
}

impl FromStr for DirectiveKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "model" => Ok(DirectiveKind::Model),
            "on" => Ok(DirectiveKind::On),
            "html" => Ok(DirectiveKind::Html),
            "text" => Ok(DirectiveKind::Text),
            other => Err(Error::UnknownDirective(other.to_string())),
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed directive attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub argument: Option<String>,
    /// Attribute value, trimmed.
    pub expression: String,
}

impl Directive {
    /// Parse an attribute. Attributes without the prefix are not directives
    /// and yield `None`.
    pub fn parse(name: &str, value: &str, prefix: &str) -> Result<Option<Self>> {
        let Some(rest) = name.strip_prefix(prefix) else {
            return Ok(None);
        };

        let (kind, argument) = match rest.split_once(':') {
            Some((kind, argument)) => (kind, Some(argument)),
            None => (rest, None),
        };
        let kind: DirectiveKind = kind.parse()?;
        let argument = argument.filter(|a| !a.is_empty()).map(str::to_string);

        if kind.requires_argument() && argument.is_none() {
            return Err(Error::MissingArgument {
                directive: name.to_string(),
            });
        }

        Ok(Some(Self {
            kind,
            argument,
            expression: value.trim().to_string(),
        }))
    }
}

/// Wires one directive on one node to the view model.
pub trait Installer: Send + Sync {
    fn install(&self, node: &NodeRef, directive: &Directive, vm: &ViewModel) -> Result<Binding>;
}

/// Category to installer table.
#[derive(Clone)]
pub struct DirectiveRegistry {
    installers: IndexMap<DirectiveKind, Arc<dyn Installer>>,
}

impl DirectiveRegistry {
    /// A registry with no installers at all.
    pub fn empty() -> Self {
        Self {
            installers: IndexMap::new(),
        }
    }

    /// Replace the installer for `kind`.
    pub fn register(&mut self, kind: DirectiveKind, installer: Arc<dyn Installer>) {
        self.installers.insert(kind, installer);
    }

    pub fn installer(&self, kind: DirectiveKind) -> Option<Arc<dyn Installer>> {
        self.installers.get(&kind).cloned()
    }

    pub fn kinds(&self) -> impl Iterator<Item = DirectiveKind> + '_ {
        self.installers.keys().copied()
    }
}

impl Default for DirectiveRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(DirectiveKind::Model, Arc::new(ModelInstaller));
        registry.register(DirectiveKind::On, Arc::new(OnInstaller));
        registry.register(DirectiveKind::Html, Arc::new(RenderInstaller(Updater::Html)));
        registry.register(DirectiveKind::Text, Arc::new(RenderInstaller(Updater::Text)));
        registry
    }
}

impl fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.installers.keys()).finish()
    }
}

/// `v-model`: render the path into the node's value, write input back.
pub struct ModelInstaller;

impl Installer for ModelInstaller {
    fn install(&self, node: &NodeRef, directive: &Directive, vm: &ViewModel) -> Result<Binding> {
        let path = Path::parse(&directive.expression)?;
        let mut binding = Binding::new(node.id(), DirectiveKind::Model, path.as_str());

        let target = node.clone();
        let watcher = vm.watch_path(path.clone(), move |value| {
            Updater::Value.apply(target.as_ref(), value);
            Ok(())
        })?;
        Updater::Value.apply(node.as_ref(), &watcher.value());
        binding.push(watcher);

        let vm = vm.downgrade();
        let active = binding.switch();
        node.add_event_listener(
            "input",
            Arc::new(move |event: &Event| {
                if !active.load(Ordering::SeqCst) {
                    return Ok(());
                }
                let Some(vm) = vm.upgrade() else {
                    warn!(expression = path.as_str(), "input after view model was dropped");
                    return Err(Error::Detached);
                };
                trace!(expression = path.as_str(), "write back");
                vm.set_path(&path, event.value())
            }),
        );
        Ok(binding)
    }
}

/// `v-on:<event>`: call a method with the view model as receiver.
pub struct OnInstaller;

impl Installer for OnInstaller {
    fn install(&self, node: &NodeRef, directive: &Directive, vm: &ViewModel) -> Result<Binding> {
        let method = directive.expression.clone();
        let event_name = directive.argument.clone().ok_or_else(|| Error::MissingArgument {
            directive: DirectiveKind::On.name().to_string(),
        })?;

        if !matches!(vm.root().get_untracked(&method)?, Value::Function(_)) {
            return Err(Error::NotCallable(method));
        }

        let binding = Binding::new(node.id(), DirectiveKind::On, method.as_str());
        let vm = vm.downgrade();
        let active = binding.switch();
        node.add_event_listener(
            &event_name,
            Arc::new(move |event: &Event| {
                if !active.load(Ordering::SeqCst) {
                    return Ok(());
                }
                let Some(vm) = vm.upgrade() else {
                    warn!(method = %method, event = event.name(), "event after view model was dropped");
                    return Err(Error::Detached);
                };
                vm.call(&method, event)
            }),
        );
        Ok(binding)
    }
}

/// One-way render of a path through an updater (`v-html`, `v-text`).
pub struct RenderInstaller(pub Updater);

impl Installer for RenderInstaller {
    fn install(&self, node: &NodeRef, directive: &Directive, vm: &ViewModel) -> Result<Binding> {
        let updater = self.0;
        let path = Path::parse(&directive.expression)?;
        let mut binding = Binding::new(node.id(), directive.kind, path.as_str());

        let target = node.clone();
        let watcher = vm.watch_path(path, move |value| {
            updater.apply(target.as_ref(), value);
            Ok(())
        })?;
        updater.apply(node.as_ref(), &watcher.value());
        binding.push(watcher);
        Ok(binding)
    }
}

/// Bind a text node's `{{ }}` template.
///
/// Every placeholder gets its own watcher, and each of them re-renders the
/// whole template from its raw source. A change that touches several
/// placeholders renders once per affected placeholder.
pub fn install_interpolation(node: &NodeRef, text: &str, vm: &ViewModel) -> Result<Binding> {
    let (open, close) = &vm.settings().delimiters;
    let template = Arc::new(Template::parse(text, (open.as_str(), close.as_str()))?);
    let mut binding = Binding::new(node.id(), DirectiveKind::Text, template.source());

    for path in template.expressions() {
        let target = node.clone();
        let template = Arc::clone(&template);
        let root = vm.root_value();
        let tracker = vm.tracker().clone();
        let watcher = vm.watch_path(path.clone(), move |_| {
            let text = template.render(&root, &tracker)?;
            target.set_text_content(&text);
            Ok(())
        })?;
        binding.push(watcher);
    }

    let _paused = vm.tracker().pause();
    node.set_text_content(&template.render(&vm.root_value(), vm.tracker())?);
    Ok(binding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_and_argument() {
        let d = Directive::parse("v-on:click", " greet ", "v-").unwrap().unwrap();
        assert_eq!(d.kind, DirectiveKind::On);
        assert_eq!(d.argument.as_deref(), Some("click"));
        assert_eq!(d.expression, "greet");

        let d = Directive::parse("v-model", "user.name", "v-").unwrap().unwrap();
        assert_eq!(d.kind, DirectiveKind::Model);
        assert!(d.argument.is_none());
    }

    #[test]
    fn plain_attributes_are_not_directives() {
        assert!(Directive::parse("class", "big", "v-").unwrap().is_none());
        assert!(Directive::parse("x-html", "a", "v-").unwrap().is_none());
    }

    #[test]
    fn custom_prefix() {
        let d = Directive::parse("x-html", "a", "x-").unwrap().unwrap();
        assert_eq!(d.kind, DirectiveKind::Html);
    }

    #[test]
    fn unknown_name_is_an_error() {
        let err = Directive::parse("v-show", "a", "v-").unwrap_err();
        assert!(matches!(err, Error::UnknownDirective(ref n) if n == "show"));
    }

    #[test]
    fn event_binding_needs_an_event() {
        for name in ["v-on", "v-on:"] {
            let err = Directive::parse(name, "greet", "v-").unwrap_err();
            assert!(matches!(err, Error::MissingArgument { .. }), "{name}");
        }
    }

    #[test]
    fn default_registry_covers_every_kind() {
        let registry = DirectiveRegistry::default();
        for kind in [
            DirectiveKind::Model,
            DirectiveKind::On,
            DirectiveKind::Html,
            DirectiveKind::Text,
        ] {
            assert!(registry.installer(kind).is_some(), "{kind}");
        }
        assert_eq!(DirectiveRegistry::empty().kinds().count(), 0);
    }

    #[test]
    fn kind_round_trips_through_name() {
        for kind in [DirectiveKind::Model, DirectiveKind::On, DirectiveKind::Html, DirectiveKind::Text] {
            assert_eq!(kind.name().parse::<DirectiveKind>().unwrap(), kind);
        }
    }
}
