//! Animation targets and target resolution
//!
//! A [`Target`] is a shared handle to an entity with numeric properties that
//! controllers write into. [`TargetRef`] is what callers pass to `add`; a
//! [`TargetResolver`] turns it into zero or more concrete targets.
//!
//! [`TargetRegistry`] is the default resolver. It understands simple
//! selectors:
//!
//! - `#id` - the target registered under `id` (a bare `id` works too)
//! - `.class` - every target carrying `class`
//! - `*` - every registered target
//! - `a, b` - the union of several selectors
//!
//! Selectors that match nothing resolve to an empty list; that is not an error.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

struct Entity {
    id: String,
    classes: SmallVec<[String; 2]>,
    properties: RefCell<FxHashMap<String, f64>>,
}

/// A shared handle to an animatable entity
///
/// Cloning is cheap; clones refer to the same entity. Equality is identity.
#[derive(Clone)]
pub struct Target(Rc<Entity>);

impl Target {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Rc::new(Entity {
            id: id.into(),
            classes: SmallVec::new(),
            properties: RefCell::new(FxHashMap::default()),
        }))
    }

    /// Create a target carrying the given classes
    pub fn with_classes<I, S>(id: impl Into<String>, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(Rc::new(Entity {
            id: id.into(),
            classes: classes.into_iter().map(Into::into).collect(),
            properties: RefCell::new(FxHashMap::default()),
        }))
    }

    /// Set an initial property value, builder style
    pub fn with_property(self, name: impl Into<String>, value: f64) -> Self {
        self.set_property(name, value);
        self
    }

    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.0.classes.iter().any(|c| c == class)
    }

    pub fn property(&self, name: &str) -> Option<f64> {
        self.0.properties.borrow().get(name).copied()
    }

    pub fn set_property(&self, name: impl Into<String>, value: f64) {
        self.0.properties.borrow_mut().insert(name.into(), value);
    }

    pub fn remove_property(&self, name: &str) -> Option<f64> {
        self.0.properties.borrow_mut().remove(name)
    }

    /// Snapshot of every property, sorted by name
    pub fn properties(&self) -> Vec<(String, f64)> {
        let mut props: Vec<(String, f64)> = self
            .0
            .properties
            .borrow()
            .iter()
            .map(|(name, value)| (name.clone(), *value))
            .collect();
        props.sort_by(|a, b| a.0.cmp(&b.0));
        props
    }

    pub fn ptr_eq(&self, other: &Target) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.0.id)
            .field("classes", &self.0.classes)
            .field("properties", &self.properties())
            .finish()
    }
}

/// A reference to zero or more targets
#[derive(Clone, Debug, PartialEq)]
pub enum TargetRef {
    /// Selector string resolved by the resolver
    Selector(String),
    /// A concrete target
    Entity(Target),
    /// Several references, flattened in order
    List(Vec<TargetRef>),
}

impl From<&str> for TargetRef {
    fn from(selector: &str) -> Self {
        Self::Selector(selector.to_string())
    }
}

impl From<String> for TargetRef {
    fn from(selector: String) -> Self {
        Self::Selector(selector)
    }
}

impl From<Target> for TargetRef {
    fn from(target: Target) -> Self {
        Self::Entity(target)
    }
}

impl<T: Into<TargetRef>> From<Vec<T>> for TargetRef {
    fn from(list: Vec<T>) -> Self {
        Self::List(list.into_iter().map(Into::into).collect())
    }
}

/// Resolves target references into concrete targets
pub trait TargetResolver {
    fn resolve(&self, target: &TargetRef) -> Vec<Target>;
}

/// Default resolver backed by a registry of named targets
#[derive(Default)]
pub struct TargetRegistry {
    targets: RefCell<IndexMap<String, Target>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target under its id, replacing any previous one
    pub fn register(&self, target: Target) -> Target {
        self.targets
            .borrow_mut()
            .insert(target.id().to_string(), target.clone());
        target
    }

    pub fn get(&self, id: &str) -> Option<Target> {
        self.targets.borrow().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.targets.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.borrow().is_empty()
    }

    /// Every registered target, in registration order
    pub fn targets(&self) -> Vec<Target> {
        self.targets.borrow().values().cloned().collect()
    }

    fn select(&self, selector: &str, out: &mut Vec<Target>) {
        for part in selector.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let targets = self.targets.borrow();
            if part == "*" {
                out.extend(targets.values().cloned());
            } else if let Some(class) = part.strip_prefix('.') {
                out.extend(targets.values().filter(|t| t.has_class(class)).cloned());
            } else {
                let id = part.strip_prefix('#').unwrap_or(part);
                out.extend(targets.get(id).cloned());
            }
        }
    }

    fn collect(&self, target: &TargetRef, out: &mut Vec<Target>) {
        match target {
            TargetRef::Selector(selector) => self.select(selector, out),
            TargetRef::Entity(entity) => out.push(entity.clone()),
            TargetRef::List(list) => {
                for item in list {
                    self.collect(item, out);
                }
            }
        }
    }
}

impl TargetResolver for TargetRegistry {
    fn resolve(&self, target: &TargetRef) -> Vec<Target> {
        let mut found = Vec::new();
        self.collect(target, &mut found);

        // Keep the first occurrence of each entity
        let mut unique: Vec<Target> = Vec::with_capacity(found.len());
        for target in found {
            if !unique.iter().any(|seen| seen.ptr_eq(&target)) {
                unique.push(target);
            }
        }
        unique
    }
}
