//! View Model
//!
//! The composition root. Creating a [`ViewModel`]:
//!
//! 1. observes the data object in place,
//! 2. installs every computed property on the data object as a getter-only
//!    slot,
//! 3. exposes every method on the view model's root object,
//! 4. proxies every data key onto the root object, plus `$data`,
//! 5. compiles the target, if one was given.
//!
//! Template expressions are evaluated against the root object, so they can
//! name data keys, computed properties and methods without a `$data.` prefix.
//!
//! # Example
//!
//! ```rust,ignore
//! use lattice_view::dom::memory::Element;
//! use lattice_view::{Options, ViewModel};
//! use serde_json::json;
//!
//! let app = Element::new("div").text("{{ a }} and {{ b }}");
//! let vm = ViewModel::new(
//!     Options::new()
//!         .target(app.clone())
//!         .data(json!({ "a": 1, "b": 2 })),
//! )?;
//!
//! vm.set("b", 3)?;
//! assert_eq!(app.text_content(), "1 and 3");
//! ```

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::compiler::{Binding, Compiler, DirectiveKind, DirectiveRegistry, Installer};
use crate::config::Settings;
use crate::dom::{Document, Event, NodeId, NodeRef, Target};
use crate::error::{Error, Result};
use crate::expr::{self, Path, Template};
use crate::reactive::{observe, Computed, Object, Slot, Tracker, Watcher};
use crate::value::{Function, Value};

/// Signature of a computed property: called with the view model as receiver.
pub type ComputedFn = dyn Fn(&ViewModel) -> Result<Value> + Send + Sync;

/// Construction input.
pub struct Options {
    target: Option<Target>,
    document: Option<Arc<dyn Document>>,
    data: Value,
    methods: IndexMap<String, Function>,
    computed: IndexMap<String, Arc<ComputedFn>>,
    settings: Settings,
    directives: Vec<(DirectiveKind, Arc<dyn Installer>)>,
}

impl Options {
    pub fn new() -> Self {
        Self {
            target: None,
            document: None,
            data: Value::Object(Object::new()),
            methods: IndexMap::new(),
            computed: IndexMap::new(),
            settings: Settings::default(),
            directives: Vec::new(),
        }
    }

    /// Node to mount on, or a selector resolved through [`Options::document`].
    pub fn target(mut self, target: impl Into<Target>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn document(mut self, document: Arc<dyn Document>) -> Self {
        self.document = Some(document);
        self
    }

    /// The root data object. Must be an object.
    pub fn data(mut self, data: impl Into<Value>) -> Self {
        self.data = data.into();
        self
    }

    pub fn method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&ViewModel, &Event) -> Result<()> + Send + Sync + 'static,
    {
        let name = name.into();
        self.methods
            .insert(name.clone(), Function::new(name.as_str(), method));
        self
    }

    pub fn computed<F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&ViewModel) -> Result<Value> + Send + Sync + 'static,
    {
        self.computed.insert(name.into(), Arc::new(getter));
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the installer for one directive kind.
    pub fn directive(mut self, kind: DirectiveKind, installer: Arc<dyn Installer>) -> Self {
        self.directives.push((kind, installer));
        self
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

/// A mounted (or mountable) view model. Cloning yields another handle.
#[derive(Clone)]
pub struct ViewModel {
    inner: Arc<VmInner>,
}

/// Non-owning handle, held by listeners and computed getters.
#[derive(Clone)]
pub struct WeakViewModel {
    inner: Weak<VmInner>,
}

struct VmInner {
    settings: Settings,
    tracker: Tracker,
    data: Object,
    root: Object,
    registry: DirectiveRegistry,
    document: Option<Arc<dyn Document>>,
    el: Mutex<Option<NodeRef>>,
    bindings: Mutex<IndexMap<NodeId, Vec<Binding>>>,
}

impl ViewModel {
    pub fn new(options: Options) -> Result<Self> {
        let Options {
            target,
            document,
            data,
            methods,
            computed,
            settings,
            directives,
        } = options;

        settings.validate()?;
        let data = match data {
            Value::Object(object) => object,
            other => {
                return Err(Error::InvalidOptions(format!(
                    "data must be an object, got {}",
                    other.type_name()
                )))
            }
        };
        for name in methods.keys().chain(computed.keys()) {
            if data.contains_key(name) {
                return Err(Error::InvalidOptions(format!(
                    "`{name}` is both a data key and a method or computed property"
                )));
            }
        }
        if let Some(name) = methods.keys().find(|name| computed.contains_key(*name)) {
            return Err(Error::InvalidOptions(format!(
                "`{name}` is both a method and a computed property"
            )));
        }

        let mut registry = DirectiveRegistry::default();
        for (kind, installer) in directives {
            registry.register(kind, installer);
        }

        observe(&Value::Object(data.clone()));

        let tracker = Tracker::new();
        let root = Object::new();
        let memoize = settings.memoize_computed;
        let inner = Arc::new_cyclic(|weak: &Weak<VmInner>| {
            for (name, getter) in &computed {
                let vm = WeakViewModel { inner: weak.clone() };
                let getter = Arc::clone(getter);
                let slot = Computed::new(name.as_str(), &tracker, memoize, move || {
                    let vm = vm.upgrade().ok_or(Error::Detached)?;
                    getter(&vm)
                });
                data.define(name.as_str(), Slot::Computed(slot));
            }

            for (name, method) in methods {
                root.define(name, Slot::Constant(Value::Function(method)));
            }
            for key in data.keys() {
                root.define(
                    key.clone(),
                    Slot::Proxy {
                        target: data.clone(),
                        key,
                    },
                );
            }
            root.define("$data", Slot::Constant(Value::Object(data.clone())));

            VmInner {
                settings,
                tracker,
                data,
                root,
                registry,
                document,
                el: Mutex::new(None),
                bindings: Mutex::new(IndexMap::new()),
            }
        });

        let vm = Self { inner };
        debug!(
            keys = vm.inner.data.len(),
            computed = computed.len(),
            root = vm.inner.root.len(),
            "view model created"
        );

        if let Some(target) = target {
            vm.mount(target)?;
        }
        Ok(vm)
    }

    /// Resolve `target` and compile it. Compile failures are reported after
    /// the tree has been reattached; bindings that did install stay live.
    pub fn mount(&self, target: impl Into<Target>) -> Result<usize> {
        let node = target.into().resolve(self.inner.document.as_deref())?;
        *self.inner.el.lock() = Some(node.clone());
        debug!(node = ?node, "mounting");
        Compiler::new(self).mount(&node)
    }

    /// Compile `node`'s children in place. Already bound nodes are skipped.
    pub fn compile(&self, node: &NodeRef) -> Result<usize> {
        Compiler::new(self).compile(node)
    }

    /// The mounted root node.
    pub fn el(&self) -> Option<NodeRef> {
        self.inner.el.lock().clone()
    }

    pub fn data(&self) -> &Object {
        &self.inner.data
    }

    /// The evaluation root: proxies, methods and `$data`.
    pub fn root(&self) -> &Object {
        &self.inner.root
    }

    pub fn tracker(&self) -> &Tracker {
        &self.inner.tracker
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub fn registry(&self) -> &DirectiveRegistry {
        &self.inner.registry
    }

    /// Read a path. Inside a computed getter this registers the computed.
    pub fn get(&self, expression: &str) -> Result<Value> {
        expr::read(&self.root_value(), expression, &self.inner.tracker)
    }

    pub fn set(&self, expression: &str, value: impl Into<Value>) -> Result<()> {
        self.set_path(&Path::parse(expression)?, value.into())
    }

    pub fn set_path(&self, path: &Path, value: Value) -> Result<()> {
        expr::write_path(&self.root_value(), path, value, &self.inner.tracker)
    }

    /// Invoke a method with this view model as receiver.
    pub fn call(&self, method: &str, event: &Event) -> Result<()> {
        match self.inner.root.get_untracked(method)? {
            Value::Function(function) => function.call(self, event),
            _ => Err(Error::NotCallable(method.to_string())),
        }
    }

    /// Watch a path. The watcher lives as long as the returned handle.
    pub fn watch<F>(&self, expression: &str, callback: F) -> Result<Watcher>
    where
        F: Fn(&Value) -> Result<()> + Send + Sync + 'static,
    {
        self.watch_path(Path::parse(expression)?, callback)
    }

    pub fn watch_path<F>(&self, path: Path, callback: F) -> Result<Watcher>
    where
        F: Fn(&Value) -> Result<()> + Send + Sync + 'static,
    {
        Watcher::with_path(&self.inner.tracker, self.root_value(), path, callback)
    }

    /// Resolve a `{{ }}` template against the current data.
    pub fn render(&self, text: &str) -> Result<String> {
        let (open, close) = &self.inner.settings.delimiters;
        let template = Template::parse(text, (open.as_str(), close.as_str()))?;
        let _paused = self.inner.tracker.pause();
        template.render(&self.root_value(), &self.inner.tracker)
    }

    /// The data fields as JSON. Computed properties are not included.
    pub fn snapshot(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.inner.data)?)
    }

    /// Tear down the bindings of `node` and its descendants.
    ///
    /// Returns the number of bindings removed.
    pub fn unmount(&self, node: &NodeRef) -> usize {
        let mut stack = vec![node.clone()];
        let mut removed = Vec::new();
        {
            let mut bindings = self.inner.bindings.lock();
            while let Some(node) = stack.pop() {
                if let Some(list) = bindings.shift_remove(&node.id()) {
                    removed.extend(list);
                }
                stack.extend(node.children());
            }
        }

        for binding in &removed {
            binding.teardown();
        }
        debug!(node = ?node, bindings = removed.len(), "unmounted");
        removed.len()
    }

    pub fn binding_count(&self) -> usize {
        self.inner.bindings.lock().values().map(Vec::len).sum()
    }

    pub fn bindings_for(&self, node: NodeId) -> Vec<Binding> {
        self.inner
            .bindings
            .lock()
            .get(&node)
            .cloned()
            .unwrap_or_default()
    }

    pub fn downgrade(&self) -> WeakViewModel {
        WeakViewModel {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub(crate) fn is_bound(&self, node: NodeId) -> bool {
        self.inner.bindings.lock().contains_key(&node)
    }

    pub(crate) fn record(&self, node: NodeId, bindings: Vec<Binding>) {
        self.inner
            .bindings
            .lock()
            .entry(node)
            .or_default()
            .extend(bindings);
    }

    pub(crate) fn root_value(&self) -> Value {
        Value::Object(self.inner.root.clone())
    }
}

impl WeakViewModel {
    pub fn upgrade(&self) -> Option<ViewModel> {
        self.inner.upgrade().map(|inner| ViewModel { inner })
    }
}

impl fmt::Debug for ViewModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewModel")
            .field("keys", &self.inner.root.keys())
            .field("el", &self.el())
            .field("bindings", &self.binding_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::memory::Element;
    use crate::dom::Node;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_test::traced_test;

    fn vm(data: serde_json::Value) -> ViewModel {
        ViewModel::new(Options::new().data(data)).unwrap()
    }

    #[test]
    fn proxies_every_data_key() {
        let vm = vm(json!({ "a": 1, "user": { "name": "x" } }));
        assert_eq!(vm.get("a").unwrap(), Value::from(1));
        assert_eq!(vm.get("user.name").unwrap(), Value::from("x"));
        assert_eq!(vm.get("$data.user.name").unwrap(), Value::from("x"));

        vm.set("a", 2).unwrap();
        assert_eq!(vm.data().get_untracked("a").unwrap(), Value::from(2));
    }

    #[test]
    fn data_must_be_an_object() {
        let err = ViewModel::new(Options::new().data(3)).unwrap_err();
        assert!(matches!(err, Error::InvalidOptions(_)));
    }

    #[test]
    fn method_cannot_shadow_data() {
        let err = ViewModel::new(
            Options::new()
                .data(json!({ "greet": 1 }))
                .method("greet", |_, _| Ok(())),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidOptions(_)));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let settings = Settings {
            directive_prefix: String::new(),
            ..Settings::default()
        };
        let err = ViewModel::new(Options::new().settings(settings)).unwrap_err();
        assert!(matches!(err, Error::Settings(_)));
    }

    #[test]
    fn computed_reads_through_receiver() {
        let vm = ViewModel::new(
            Options::new()
                .data(json!({ "first": "Ada", "last": "Lovelace" }))
                .computed("full", |vm| {
                    Ok(Value::from(format!("{} {}", vm.get("first")?, vm.get("last")?)))
                }),
        )
        .unwrap();

        assert_eq!(vm.get("full").unwrap(), Value::from("Ada Lovelace"));
        assert!(matches!(vm.set("full", "x"), Err(Error::ReadOnly(_))));
    }

    #[test]
    fn computed_after_drop_is_detached() {
        let vm = ViewModel::new(
            Options::new()
                .data(json!({ "n": 1 }))
                .computed("twice", |vm| vm.get("n")),
        )
        .unwrap();
        let data = vm.data().clone();
        drop(vm);
        assert!(matches!(data.get_untracked("twice"), Err(Error::Detached)));
    }

    #[test]
    fn call_requires_a_method() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let vm = ViewModel::new(
            Options::new()
                .data(json!({ "n": 1 }))
                .method("bump", move |vm, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let n = vm.get("n")?.as_f64().unwrap_or(0.0);
                    vm.set("n", n + 1.0)
                }),
        )
        .unwrap();

        let event = Event::new("click", Element::new("button"));
        vm.call("bump", &event).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(vm.get("n").unwrap(), Value::from(2));
        assert!(matches!(vm.call("n", &event), Err(Error::NotCallable(_))));
    }

    #[test]
    fn render_and_snapshot() {
        let vm = vm(json!({ "a": 1, "b": { "c": "x" } }));
        assert_eq!(vm.render("{{a}}-{{ b.c }}").unwrap(), "1-x");
        assert_eq!(vm.snapshot().unwrap(), json!({ "a": 1, "b": { "c": "x" } }));
    }

    #[traced_test]
    #[test]
    fn mount_later_compiles_target() {
        let vm = vm(json!({ "msg": "hi" }));
        let app = Element::new("div").child(Element::new("p").attr("v-text", "msg"));
        assert!(vm.el().is_none());

        assert_eq!(vm.mount(app.clone()).unwrap(), 1);
        assert_eq!(app.text_content(), "hi");
        assert_eq!(vm.el().unwrap().id(), app.id());
        assert!(logs_contain("view model created"));
        assert!(logs_contain("compilation finished"));
    }

    #[test]
    fn unmount_counts_removed_bindings() {
        let vm = vm(json!({ "a": 1, "b": 2 }));
        let app = Element::new("div")
            .child(Element::new("p").attr("v-html", "a"))
            .text("{{ a }} {{ b }}");
        vm.mount(app.clone()).unwrap();
        assert_eq!(vm.binding_count(), 2);

        let node: NodeRef = app;
        assert_eq!(vm.unmount(&node), 2);
        assert_eq!(vm.binding_count(), 0);
        assert_eq!(vm.data().source("a").unwrap().subscriber_count(), 0);
    }
}
