//! Lookup tracing infrastructure.
//!
//! Provides a trait-based tracing system for attribute resolution. Every hook on
//! [`LookupTracer`] has a no-op default, so [`NoopTracer`] costs nothing beyond a
//! virtual call that does no work.
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | No-op (the default) |
//! | [`StderrTracer`] | Human-readable lookup log to stderr |
//! | [`RecordingTracer`] | Full event recording for tests and post-mortem |
//!
//! # Usage
//!
//! ```
//! use objmodel::{RecordingTracer, Runtime};
//!
//! let tracer = RecordingTracer::new();
//! let rt = Runtime::new().with_tracer(tracer.clone());
//! // ... resolve attributes ...
//! let events = tracer.events();
//! # drop((rt, events));
//! ```

use std::{cell::RefCell, fmt, rc::Rc};

use strum::{Display, IntoStaticStr};

use crate::descriptor::DescriptorKind;

/// The lookup step that produced a resolved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum ResolvedBy {
    /// A class-level data descriptor's `get` (beats the instance store).
    DataDescriptor,
    /// The instance's own value store.
    InstanceValue,
    /// A class-level non-data descriptor's `get`.
    NonDataDescriptor,
    /// A plain class-level value.
    ClassValue,
    /// The `__getattr__` fallback hook.
    FallbackHook,
    /// Type-level access: a data descriptor on the metatype.
    MetaDataDescriptor,
    /// Type-level access: a non-data descriptor on the metatype.
    MetaNonDataDescriptor,
    /// Type-level access: a plain value on the metatype.
    MetaValue,
    /// A `super()` lookup past the starting class.
    Super,
}

/// Trace event recorded by [`RecordingTracer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A class was created with the given MRO (class names, first is the class).
    ClassCreated { name: String, mro: Vec<String> },
    /// An attribute read resolved.
    Resolved {
        /// Name of the type whose MRO was searched.
        owner: String,
        name: String,
        by: ResolvedBy,
    },
    /// An attribute read fell through every step.
    NotFound { owner: String, name: String },
    /// A descriptor's read operation is about to run.
    DescriptorGet { name: String, kind: DescriptorKind },
    /// The fallback hook is about to run.
    Fallback { owner: String, name: String },
    /// A garbage collection pass finished.
    Collected { freed: usize },
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClassCreated { name, mro } => write!(f, "class {name} mro=[{}]", mro.join(", ")),
            Self::Resolved { owner, name, by } => write!(f, "{owner}.{name} <- {by}"),
            Self::NotFound { owner, name } => write!(f, "{owner}.{name} not found"),
            Self::DescriptorGet { name, kind } => write!(f, "{name}: calling {kind} descriptor get"),
            Self::Fallback { owner, name } => write!(f, "{owner}.{name}: calling __getattr__"),
            Self::Collected { freed } => write!(f, "gc freed {freed}"),
        }
    }
}

/// Hooks invoked by the [`Runtime`](crate::Runtime) during class creation and lookup.
///
/// All methods have default no-op implementations. Implementations only
/// override the hooks they care about.
pub trait LookupTracer: fmt::Debug {
    /// Called after a class is allocated with its final MRO.
    #[inline]
    fn on_class_created(&mut self, _name: &str, _mro: &[&str]) {}

    /// Called when an attribute read produced a value.
    #[inline]
    fn on_resolved(&mut self, _owner: &str, _name: &str, _by: ResolvedBy) {}

    /// Called when an attribute read fell through every step.
    #[inline]
    fn on_not_found(&mut self, _owner: &str, _name: &str) {}

    /// Called before a descriptor's read operation runs.
    #[inline]
    fn on_descriptor_get(&mut self, _name: &str, _kind: DescriptorKind) {}

    /// Called before the `__getattr__` fallback hook runs.
    #[inline]
    fn on_fallback(&mut self, _owner: &str, _name: &str) {}

    /// Called after a garbage collection pass.
    #[inline]
    fn on_collect(&mut self, _freed: usize) {}
}

/// Tracer that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl LookupTracer for NoopTracer {}

/// Tracer that writes one line per event to stderr.
#[derive(Debug, Default)]
pub struct StderrTracer {
    /// Suppress descriptor/fallback detail lines and only print outcomes.
    quiet: bool,
}

impl StderrTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only print resolution outcomes and class creation.
    #[must_use]
    pub fn quiet() -> Self {
        Self { quiet: true }
    }
}

impl LookupTracer for StderrTracer {
    fn on_class_created(&mut self, name: &str, mro: &[&str]) {
        eprintln!("[objmodel] class {name} mro=[{}]", mro.join(", "));
    }

    fn on_resolved(&mut self, owner: &str, name: &str, by: ResolvedBy) {
        eprintln!("[objmodel] {owner}.{name} <- {by}");
    }

    fn on_not_found(&mut self, owner: &str, name: &str) {
        eprintln!("[objmodel] {owner}.{name} not found");
    }

    fn on_descriptor_get(&mut self, name: &str, kind: DescriptorKind) {
        if !self.quiet {
            eprintln!("[objmodel]   {name}: {kind} descriptor get");
        }
    }

    fn on_fallback(&mut self, owner: &str, name: &str) {
        if !self.quiet {
            eprintln!("[objmodel]   {owner}.{name}: __getattr__");
        }
    }

    fn on_collect(&mut self, freed: usize) {
        eprintln!("[objmodel] gc freed {freed}");
    }
}

/// Tracer that records every event into a shared log.
///
/// Clones share the same log, so keep one handle and hand a clone to the runtime.
#[derive(Debug, Default, Clone)]
pub struct RecordingTracer {
    events: Rc<RefCell<Vec<TraceEvent>>>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.borrow().clone()
    }

    /// Returns the resolution steps recorded so far, in order.
    #[must_use]
    pub fn resolved_steps(&self) -> Vec<ResolvedBy> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Resolved { by, .. } => Some(*by),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    fn push(&self, event: TraceEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl LookupTracer for RecordingTracer {
    fn on_class_created(&mut self, name: &str, mro: &[&str]) {
        self.push(TraceEvent::ClassCreated {
            name: name.to_owned(),
            mro: mro.iter().map(|s| (*s).to_owned()).collect(),
        });
    }

    fn on_resolved(&mut self, owner: &str, name: &str, by: ResolvedBy) {
        self.push(TraceEvent::Resolved {
            owner: owner.to_owned(),
            name: name.to_owned(),
            by,
        });
    }

    fn on_not_found(&mut self, owner: &str, name: &str) {
        self.push(TraceEvent::NotFound {
            owner: owner.to_owned(),
            name: name.to_owned(),
        });
    }

    fn on_descriptor_get(&mut self, name: &str, kind: DescriptorKind) {
        self.push(TraceEvent::DescriptorGet {
            name: name.to_owned(),
            kind,
        });
    }

    fn on_fallback(&mut self, owner: &str, name: &str) {
        self.push(TraceEvent::Fallback {
            owner: owner.to_owned(),
            name: name.to_owned(),
        });
    }

    fn on_collect(&mut self, freed: usize) {
        self.push(TraceEvent::Collected { freed });
    }
}
