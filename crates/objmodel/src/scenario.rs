//! JSON scenario files: declare classes and instances, then check lookups.
//!
//! A scenario is loaded with [`load_scenario`] and run against a fresh
//! [`Runtime`] with [`run_scenario`]. Setup failures (unknown names, classes
//! that cannot be created) abort the run; check failures are collected into
//! the [`ScenarioReport`].
//!
//! ```json
//! {
//!   "classes": [
//!     { "name": "A", "attrs": { "x": { "value": { "int": 1 } } } }
//!   ],
//!   "instances": [{ "name": "a", "class": "A" }],
//!   "checks": [
//!     { "get": { "target": "a", "attr": "x", "expect": { "value": { "int": 1 } } } }
//!   ]
//! }
//! ```
//!
//! Callables are described by a small [`BodySpec`] vocabulary; argument 0 is
//! the receiver for anything called as a method.

use std::fmt;

use ahash::AHashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use strum::IntoEnumIterator;

use crate::{
    builtins::BuiltinType,
    exception::{ExcType, RunError, RunResult},
    runtime::{ClassBuilder, Runtime},
    types::{Args, arg_at},
    value::Value,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub classes: Vec<ClassSpec>,
    #[serde(default)]
    pub instances: Vec<InstanceSpec>,
    #[serde(default)]
    pub checks: Vec<Check>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassSpec {
    pub name: String,
    #[serde(default)]
    pub bases: Vec<String>,
    #[serde(default)]
    pub metaclass: Option<String>,
    #[serde(default = "default_true")]
    pub instance_dict: bool,
    #[serde(default)]
    pub attrs: IndexMap<String, AttrSpec>,
}

/// A literal or a reference to a named class or instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSpec {
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    Class(String),
    Instance(String),
}

/// Behaviour of a scenario-defined callable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodySpec {
    /// Returns a fixed value.
    Returns(ValueSpec),
    /// Returns positional argument `n`.
    Arg(usize),
    /// Returns `args[arg].<attr>`.
    ReadAttr { arg: usize, attr: String },
    /// Performs `args[arg].<attr> = args[value_arg]` and returns `None`.
    WriteAttr { arg: usize, attr: String, value_arg: usize },
    /// Returns `prefix` followed by the string (or repr) of `args[arg]`.
    Concat { prefix: String, arg: usize },
    /// Raises an exception.
    Raise { exc: ExcType, message: String },
    /// Returns the class name of `args[n]`, or its type name when it is not a class.
    NameOf(usize),
}

/// A class-level attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrSpec {
    Value(ValueSpec),
    Function(BodySpec),
    StaticMethod(BodySpec),
    ClassMethod(BodySpec),
    Property {
        #[serde(default)]
        get: Option<BodySpec>,
        #[serde(default)]
        set: Option<BodySpec>,
        #[serde(default)]
        delete: Option<BodySpec>,
    },
    /// An instance of a previously declared class, created with no arguments.
    /// This is how custom descriptors are placed in a namespace.
    New(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceSpec {
    pub name: String,
    pub class: String,
    #[serde(default)]
    pub args: Vec<ValueSpec>,
    /// Assigned with `setattr` after construction, in order.
    #[serde(default)]
    pub attrs: IndexMap<String, ValueSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    Mro {
        class: String,
        expect: Vec<String>,
    },
    CreateFails {
        name: String,
        #[serde(default)]
        bases: Vec<String>,
        #[serde(default)]
        metaclass: Option<String>,
        error: String,
    },
    Get {
        target: String,
        attr: String,
        expect: Expect,
    },
    Call {
        target: String,
        attr: String,
        #[serde(default)]
        args: Vec<ValueSpec>,
        expect: Expect,
    },
    Set {
        target: String,
        attr: String,
        value: ValueSpec,
        #[serde(default)]
        expect_error: Option<String>,
    },
    Delete {
        target: String,
        attr: String,
        #[serde(default)]
        expect_error: Option<String>,
    },
    Super {
        target: String,
        after: String,
        attr: String,
        expect: Expect,
    },
    Isinstance {
        target: String,
        class: String,
        expect: bool,
    },
    Issubclass {
        class: String,
        base: String,
        expect: bool,
    },
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mro { class, .. } => write!(f, "mro {class}"),
            Self::CreateFails { name, .. } => write!(f, "create_fails {name}"),
            Self::Get { target, attr, .. } => write!(f, "get {target}.{attr}"),
            Self::Call { target, attr, .. } => write!(f, "call {target}.{attr}()"),
            Self::Set { target, attr, .. } => write!(f, "set {target}.{attr}"),
            Self::Delete { target, attr, .. } => write!(f, "delete {target}.{attr}"),
            Self::Super { target, after, attr, .. } => write!(f, "super({after}, {target}).{attr}"),
            Self::Isinstance { target, class, .. } => write!(f, "isinstance({target}, {class})"),
            Self::Issubclass { class, base, .. } => write!(f, "issubclass({class}, {base})"),
        }
    }
}

/// Expected outcome of a read or call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expect {
    /// The result equals this value (identity for heap objects).
    Value(ValueSpec),
    /// The result's type has this name, e.g. `"method"`.
    TypeName(String),
    /// The operation fails; matched against [`RunError::kind`].
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub index: usize,
    pub label: String,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioReport {
    pub description: String,
    pub outcomes: Vec<CheckOutcome>,
}

impl ScenarioReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.passed)
    }
}

/// Reasons a scenario could not be loaded or set up.
#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioError {
    Parse(String),
    UnknownName(String),
    Duplicate(String),
    Setup { name: String, error: RunError },
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "invalid scenario: {msg}"),
            Self::UnknownName(name) => write!(f, "unknown name '{name}'"),
            Self::Duplicate(name) => write!(f, "name '{name}' defined twice"),
            Self::Setup { name, error } => write!(f, "setting up '{name}' failed: {error}"),
        }
    }
}

impl std::error::Error for ScenarioError {}

pub fn load_scenario(source: &str) -> Result<Scenario, ScenarioError> {
    serde_json::from_str(source).map_err(|err| ScenarioError::Parse(err.to_string()))
}

/// Creates the scenario's classes and instances in `rt`, then runs every check.
pub fn run_scenario(rt: &mut Runtime, scenario: &Scenario) -> Result<ScenarioReport, ScenarioError> {
    let mut env = Env::new(rt);
    for spec in &scenario.classes {
        let class = build_class(rt, &env, spec)?;
        env.define(&spec.name, class)?;
    }
    for spec in &scenario.instances {
        let instance = build_instance(rt, &env, spec)?;
        env.define(&spec.name, instance)?;
    }

    let mut outcomes = Vec::with_capacity(scenario.checks.len());
    for (index, check) in scenario.checks.iter().enumerate() {
        let (passed, detail) = run_check(rt, &env, check)?;
        outcomes.push(CheckOutcome {
            index,
            label: check.to_string(),
            passed,
            detail,
        });
    }
    Ok(ScenarioReport {
        description: scenario.description.clone(),
        outcomes,
    })
}

/// Names visible to a scenario: the builtin types plus everything it declares.
struct Env {
    names: AHashMap<String, Value>,
}

impl Env {
    fn new(rt: &Runtime) -> Self {
        let names = BuiltinType::iter()
            .map(|builtin| (builtin.to_string(), rt.builtin(builtin)))
            .collect();
        Self { names }
    }

    fn define(&mut self, name: &str, value: Value) -> Result<(), ScenarioError> {
        if self.names.contains_key(name) {
            return Err(ScenarioError::Duplicate(name.to_owned()));
        }
        self.names.insert(name.to_owned(), value);
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<Value, ScenarioError> {
        self.names
            .get(name)
            .cloned()
            .ok_or_else(|| ScenarioError::UnknownName(name.to_owned()))
    }

    fn class(&self, rt: &Runtime, name: &str) -> Result<Value, ScenarioError> {
        let value = self.lookup(name)?;
        if rt.is_class(&value) {
            Ok(value)
        } else {
            Err(ScenarioError::UnknownName(format!("{name} (not a class)")))
        }
    }

    fn value(&self, rt: &Runtime, spec: &ValueSpec) -> Result<Value, ScenarioError> {
        Ok(match spec {
            ValueSpec::None => Value::None,
            ValueSpec::Bool(b) => Value::Bool(*b),
            ValueSpec::Int(n) => Value::Int(*n),
            ValueSpec::Str(s) => Value::from(s.as_str()),
            ValueSpec::Class(name) => self.class(rt, name)?,
            ValueSpec::Instance(name) => {
                let value = self.lookup(name)?;
                if rt.is_class(&value) {
                    return Err(ScenarioError::UnknownName(format!("{name} (not an instance)")));
                }
                value
            }
        })
    }

    fn values(&self, rt: &Runtime, specs: &[ValueSpec]) -> Result<Args, ScenarioError> {
        specs.iter().map(|spec| self.value(rt, spec)).collect()
    }
}

fn setup_error(name: &str) -> impl FnOnce(RunError) -> ScenarioError + '_ {
    move |error| ScenarioError::Setup {
        name: name.to_owned(),
        error,
    }
}

fn build_class(rt: &mut Runtime, env: &Env, spec: &ClassSpec) -> Result<Value, ScenarioError> {
    let mut builder = ClassBuilder::new(&spec.name).instance_dict(spec.instance_dict);
    for base in &spec.bases {
        builder = builder.base(env.class(rt, base)?);
    }
    if let Some(meta) = &spec.metaclass {
        builder = builder.metaclass(env.class(rt, meta)?);
    }
    for (name, attr) in &spec.attrs {
        let value = build_attr(rt, env, name, attr)?;
        builder = builder.attr(name, value);
    }
    builder.build(rt).map_err(setup_error(&spec.name))
}

fn build_instance(rt: &mut Runtime, env: &Env, spec: &InstanceSpec) -> Result<Value, ScenarioError> {
    let class = env.class(rt, &spec.class)?;
    let args = env.values(rt, &spec.args)?;
    let instance = rt.call(&class, args).map_err(setup_error(&spec.name))?;
    for (name, value) in &spec.attrs {
        let value = env.value(rt, value)?;
        rt.setattr(&instance, name, value).map_err(setup_error(&spec.name))?;
    }
    Ok(instance)
}

fn build_attr(rt: &mut Runtime, env: &Env, name: &str, spec: &AttrSpec) -> Result<Value, ScenarioError> {
    Ok(match spec {
        AttrSpec::Value(value) => env.value(rt, value)?,
        AttrSpec::Function(body) => build_function(rt, env, name, body)?,
        AttrSpec::StaticMethod(body) => {
            let func = build_function(rt, env, name, body)?;
            rt.staticmethod(func)
        }
        AttrSpec::ClassMethod(body) => {
            let func = build_function(rt, env, name, body)?;
            rt.classmethod(func)
        }
        AttrSpec::Property { get, set, delete } => {
            let fget = get.as_ref().map(|b| build_function(rt, env, name, b)).transpose()?;
            let fset = set.as_ref().map(|b| build_function(rt, env, name, b)).transpose()?;
            let fdel = delete.as_ref().map(|b| build_function(rt, env, name, b)).transpose()?;
            rt.property(fget, fset, fdel)
        }
        AttrSpec::New(class_name) => {
            let class = env.class(rt, class_name)?;
            rt.call(&class, SmallVec::new()).map_err(setup_error(name))?
        }
    })
}

/// Turns a [`BodySpec`] into a native `function` named `name`.
fn build_function(rt: &mut Runtime, env: &Env, name: &str, body: &BodySpec) -> Result<Value, ScenarioError> {
    let fname = name.to_owned();
    let func = match body.clone() {
        BodySpec::Returns(spec) => {
            let value = env.value(rt, &spec)?;
            rt.function(name, move |_, _| Ok(value.clone()))
        }
        BodySpec::Arg(index) => rt.function(name, move |_, args| arg_at(&args, index, &fname).cloned()),
        BodySpec::ReadAttr { arg, attr } => rt.function(name, move |rt, args| {
            let target = arg_at(&args, arg, &fname)?.clone();
            rt.getattr(&target, &attr)
        }),
        BodySpec::WriteAttr { arg, attr, value_arg } => rt.function(name, move |rt, args| {
            let target = arg_at(&args, arg, &fname)?.clone();
            let value = arg_at(&args, value_arg, &fname)?.clone();
            rt.setattr(&target, &attr, value)?;
            Ok(Value::None)
        }),
        BodySpec::Concat { prefix, arg } => rt.function(name, move |rt, args| {
            let value = arg_at(&args, arg, &fname)?;
            let text = match value.as_str() {
                Some(s) => s.to_owned(),
                None => rt.repr(value),
            };
            Ok(Value::from(format!("{prefix}{text}")))
        }),
        BodySpec::Raise { exc, message } => rt.function(name, move |_, _| Err(exc.msg(message.clone()))),
        BodySpec::NameOf(index) => rt.function(name, move |rt, args| {
            let value = arg_at(&args, index, &fname)?;
            Ok(match rt.class_name(value) {
                Some(class_name) => Value::from(class_name),
                None => Value::from(rt.type_name(value)),
            })
        }),
    };
    Ok(func)
}

fn run_check(rt: &mut Runtime, env: &Env, check: &Check) -> Result<(bool, String), ScenarioError> {
    match check {
        Check::Mro { class, expect } => {
            let class = env.class(rt, class)?;
            let actual = rt.mro_names(&class).map_err(setup_error("mro"))?;
            let passed = &actual == expect;
            Ok((passed, format!("[{}]", actual.join(", "))))
        }
        Check::CreateFails {
            name,
            bases,
            metaclass,
            error,
        } => {
            let mut builder = ClassBuilder::new(name);
            for base in bases {
                builder = builder.base(env.class(rt, base)?);
            }
            if let Some(meta) = metaclass {
                builder = builder.metaclass(env.class(rt, meta)?);
            }
            Ok(match builder.build(rt) {
                Ok(class) => (false, format!("expected {error}, created {}", rt.repr(&class))),
                Err(err) => (err.kind() == error.as_str(), err.to_string()),
            })
        }
        Check::Get { target, attr, expect } => {
            let target = env.lookup(target)?;
            let result = rt.getattr(&target, attr);
            judge(rt, env, &result, expect)
        }
        Check::Call {
            target,
            attr,
            args,
            expect,
        } => {
            let target = env.lookup(target)?;
            let args = env.values(rt, args)?;
            let result = rt.call_method(&target, attr, args);
            judge(rt, env, &result, expect)
        }
        Check::Set {
            target,
            attr,
            value,
            expect_error,
        } => {
            let target = env.lookup(target)?;
            let value = env.value(rt, value)?;
            let result = rt.setattr(&target, attr, value);
            Ok(judge_unit(&result, expect_error.as_deref()))
        }
        Check::Delete {
            target,
            attr,
            expect_error,
        } => {
            let target = env.lookup(target)?;
            let result = rt.delattr(&target, attr);
            Ok(judge_unit(&result, expect_error.as_deref()))
        }
        Check::Super {
            target,
            after,
            attr,
            expect,
        } => {
            let target = env.lookup(target)?;
            let start = env.class(rt, after)?;
            let result = rt.super_getattr(&target, &start, attr);
            judge(rt, env, &result, expect)
        }
        Check::Isinstance { target, class, expect } => {
            let target = env.lookup(target)?;
            let class = env.class(rt, class)?;
            let actual = rt.isinstance(&target, &class).map_err(setup_error("isinstance"))?;
            Ok((actual == *expect, actual.to_string()))
        }
        Check::Issubclass { class, base, expect } => {
            let class = env.class(rt, class)?;
            let base = env.class(rt, base)?;
            let actual = rt.issubclass(&class, &base).map_err(setup_error("issubclass"))?;
            Ok((actual == *expect, actual.to_string()))
        }
    }
}

fn judge(rt: &Runtime, env: &Env, result: &RunResult<Value>, expect: &Expect) -> Result<(bool, String), ScenarioError> {
    Ok(match (expect, result) {
        (Expect::Value(spec), Ok(actual)) => {
            let wanted = env.value(rt, spec)?;
            if *actual == wanted {
                (true, rt.repr(actual))
            } else {
                (false, format!("expected {}, got {}", rt.repr(&wanted), rt.repr(actual)))
            }
        }
        (Expect::TypeName(name), Ok(actual)) => {
            let actual_name = rt.type_name(actual);
            if actual_name == name {
                (true, rt.repr(actual))
            } else {
                (false, format!("expected a '{name}', got {}", rt.repr(actual)))
            }
        }
        (Expect::Error(kind), Err(err)) => (err.kind() == kind.as_str(), err.to_string()),
        (Expect::Error(kind), Ok(actual)) => (false, format!("expected {kind}, got {}", rt.repr(actual))),
        (_, Err(err)) => (false, format!("unexpected error: {err}")),
    })
}

fn judge_unit(result: &RunResult<()>, expect_error: Option<&str>) -> (bool, String) {
    match (result, expect_error) {
        (Ok(()), None) => (true, "ok".to_owned()),
        (Ok(()), Some(kind)) => (false, format!("expected {kind}, succeeded")),
        (Err(err), Some(kind)) => (err.kind() == kind, err.to_string()),
        (Err(err), None) => (false, format!("unexpected error: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_values_and_checks() {
        let scenario = load_scenario(
            r#"{
                "classes": [{ "name": "A", "attrs": { "x": { "value": { "int": 1 } } } }],
                "instances": [{ "name": "a", "class": "A" }],
                "checks": [
                    { "get": { "target": "a", "attr": "x", "expect": { "value": { "int": 1 } } } },
                    { "get": { "target": "a", "attr": "y", "expect": { "error": "AttributeNotFound" } } }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(scenario.classes[0].attrs["x"], AttrSpec::Value(ValueSpec::Int(1)));
        assert!(scenario.classes[0].instance_dict);

        let mut rt = Runtime::new();
        let report = run_scenario(&mut rt, &scenario).unwrap();
        assert!(report.passed(), "{:?}", report.outcomes);
        assert_eq!(report.outcomes[1].label, "get a.y");
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = load_scenario(r#"{ "classes": [{ "name": "A", "colour": "red" }] }"#).unwrap_err();
        assert!(matches!(err, ScenarioError::Parse(_)));
    }

    #[test]
    fn unknown_base_is_a_setup_error() {
        let scenario = load_scenario(r#"{ "classes": [{ "name": "A", "bases": ["Missing"] }] }"#).unwrap();
        let err = run_scenario(&mut Runtime::new(), &scenario).unwrap_err();
        assert_eq!(err, ScenarioError::UnknownName("Missing".to_owned()));
    }

    #[test]
    fn builtin_names_cannot_be_redefined() {
        let scenario = load_scenario(r#"{ "classes": [{ "name": "int" }] }"#).unwrap();
        let err = run_scenario(&mut Runtime::new(), &scenario).unwrap_err();
        assert_eq!(err, ScenarioError::Duplicate("int".to_owned()));
    }
}
