#![doc = include_str!("../../../README.md")]
// first: everything else allocates through it
mod heap;

mod attr;
mod builtins;
mod descriptor;
mod exception;
mod resource;
mod runtime;
pub mod scenario;
pub mod tracer;
mod types;
mod value;

pub use crate::{
    builtins::BuiltinType,
    descriptor::{DescriptorCaps, DescriptorKind},
    exception::{ExcType, RunError, RunResult, SimpleException},
    heap::{HeapId, HeapStats},
    resource::{DEFAULT_MAX_INHERITANCE_DEPTH, DEFAULT_MAX_MRO_LENGTH, DEFAULT_MAX_RECURSION_DEPTH, ResourceLimits},
    runtime::{ClassBuilder, Runtime},
    scenario::{Scenario, ScenarioError, ScenarioReport, load_scenario, run_scenario},
    tracer::{LookupTracer, NoopTracer, RecordingTracer, ResolvedBy, StderrTracer, TraceEvent},
    types::{Args, NativeFn, arg_at},
    value::Value,
};
