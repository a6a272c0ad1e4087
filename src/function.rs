use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;
use serde_json::{Map, Value as JsonValue};

use crate::error::Error;
use crate::message::Body;
use crate::topic::Bindings;

/// Keyword arguments bound to a function from the config file.
pub type ArgMap = Map<String, JsonValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// A predicate over the current body; gates the chain, never
    /// transforms.
    Rule,
    /// Transforms the current body into the next one.
    Converter,
}

pub type RuleFn = Arc<dyn Fn(&Body, &Invocation<'_>) -> anyhow::Result<bool> + Send + Sync>;
pub type ConverterFn = Arc<dyn Fn(Body, &Invocation<'_>) -> anyhow::Result<Body> + Send + Sync>;

#[derive(Clone)]
pub enum Callable {
    Rule(RuleFn),
    Converter(ConverterFn),
}

impl Callable {
    pub fn kind(&self) -> FunctionKind {
        match self {
            Callable::Rule(_) => FunctionKind::Rule,
            Callable::Converter(_) => FunctionKind::Converter,
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable::{:?}", self.kind())
    }
}

/// Declared parameter metadata for a registered function.
///
/// `required` and `optional` name the arguments the config may bind; the
/// two flags declare the special parameters the pipeline injects at
/// invocation time.
#[derive(Debug, Clone, Default)]
pub struct ParamSpec {
    required: Vec<String>,
    optional: Vec<String>,
    source_topic: bool,
    matches: bool,
}

impl ParamSpec {
    /// A function taking only the message body.
    pub fn none() -> Self {
        Self::default()
    }

    /// Required config arguments, in declaration order.
    pub fn required<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Config arguments with a default, which may be left unset.
    pub fn with_optional<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional = names.into_iter().map(Into::into).collect();
        self
    }

    /// Declares that the callable wants the concrete source topic
    /// injected.
    pub fn with_source_topic(mut self) -> Self {
        self.source_topic = true;
        self
    }

    /// Declares that the callable wants the wildcard bindings injected.
    pub fn with_matches(mut self) -> Self {
        self.matches = true;
        self
    }
}

/// Everything a function invocation may read besides the body itself:
/// the bound config arguments and, when declared, the injected special
/// parameters.
pub struct Invocation<'a> {
    args: &'a ArgMap,
    source_topic: Option<&'a str>,
    matches: Option<&'a Bindings>,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(
        args: &'a ArgMap,
        source_topic: Option<&'a str>,
        matches: Option<&'a Bindings>,
    ) -> Self {
        Self {
            args,
            source_topic,
            matches,
        }
    }

    /// A bound config argument by name.
    pub fn arg(&self, name: &str) -> Option<&JsonValue> {
        self.args.get(name)
    }

    /// The concrete topic the message arrived on. `None` unless the
    /// function declared `with_source_topic`.
    pub fn source_topic(&self) -> Option<&str> {
        self.source_topic
    }

    /// The wildcard bindings extracted from the source topic. `None`
    /// unless the function declared `with_matches`.
    pub fn matches(&self) -> Option<&Bindings> {
        self.matches
    }
}

/// A registered function: name, callable and declared parameters.
#[derive(Debug, Clone)]
pub struct FunctionSpec {
    name: String,
    callable: Callable,
    params: ParamSpec,
}

impl FunctionSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FunctionKind {
        self.callable.kind()
    }
}

/// A mapping from function name to registered function. Mutated only
/// during startup; processors are built from a `snapshot()` so later
/// registrations never affect them.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionSpec>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the built-in format converters.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::convert::register_builtins(&mut registry)
            .expect("builtin names are unique in an empty registry");
        registry
    }

    /// Registers a rule: a predicate gating the chain.
    pub fn rule<F>(&mut self, name: &str, params: ParamSpec, f: F) -> Result<(), Error>
    where
        F: Fn(&Body, &Invocation<'_>) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.insert(FunctionSpec {
            name: name.to_string(),
            callable: Callable::Rule(Arc::new(f)),
            params,
        })
    }

    /// Registers a converter: a transformation of the body.
    pub fn converter<F>(&mut self, name: &str, params: ParamSpec, f: F) -> Result<(), Error>
    where
        F: Fn(Body, &Invocation<'_>) -> anyhow::Result<Body> + Send + Sync + 'static,
    {
        self.insert(FunctionSpec {
            name: name.to_string(),
            callable: Callable::Converter(Arc::new(f)),
            params,
        })
    }

    fn insert(&mut self, spec: FunctionSpec) -> Result<(), Error> {
        log::info!("registering function {}", spec.name);
        if self.functions.contains_key(&spec.name) {
            return Err(Error::DuplicateName(spec.name));
        }
        self.functions.insert(spec.name.clone(), spec);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FunctionSpec> {
        self.functions.get(name)
    }

    /// An independent copy of the current mapping.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Copies every function of `other` into this registry; name
    /// collisions are an error regardless of kind.
    pub fn merge(&mut self, other: &FunctionRegistry) -> Result<(), Error> {
        for spec in other.functions.values() {
            self.insert(spec.clone())?;
        }
        Ok(())
    }

    /// A copy of the process-wide default registry.
    pub fn global_snapshot() -> Self {
        GLOBAL_REGISTRY.lock().unwrap().snapshot()
    }
}

lazy_static! {
    static ref GLOBAL_REGISTRY: Mutex<FunctionRegistry> = Mutex::new(FunctionRegistry::new());
}

/// Registers a rule in the process-wide default registry.
pub fn rule<F>(name: &str, params: ParamSpec, f: F) -> Result<(), Error>
where
    F: Fn(&Body, &Invocation<'_>) -> anyhow::Result<bool> + Send + Sync + 'static,
{
    GLOBAL_REGISTRY.lock().unwrap().rule(name, params, f)
}

/// Registers a converter in the process-wide default registry.
pub fn converter<F>(name: &str, params: ParamSpec, f: F) -> Result<(), Error>
where
    F: Fn(Body, &Invocation<'_>) -> anyhow::Result<Body> + Send + Sync + 'static,
{
    GLOBAL_REGISTRY.lock().unwrap().converter(name, params, f)
}

/// A configured instance of a registered function: the callable plus the
/// arguments bound from the config and the special-parameter injection
/// flags.
#[derive(Debug, Clone)]
pub struct FunctionBinding {
    name: String,
    callable: Callable,
    args: ArgMap,
    inject_source_topic: bool,
    inject_matches: bool,
}

impl FunctionBinding {
    /// Binds config arguments to a registered function.
    ///
    /// Every required parameter must be given, every given argument must
    /// be declared, and optional parameters may be left unset.
    pub fn bind(spec: &FunctionSpec, args: ArgMap) -> Result<Self, Error> {
        for name in args.keys() {
            if !spec.params.required.contains(name) && !spec.params.optional.contains(name) {
                return Err(Error::UnexpectedArgument {
                    function: spec.name.clone(),
                    argument: name.clone(),
                });
            }
        }

        let given = args
            .keys()
            .filter(|name| spec.params.required.contains(name))
            .count();
        if given != spec.params.required.len() {
            return Err(Error::ArityMismatch {
                function: spec.name.clone(),
                expected: spec.params.required.len(),
                given,
            });
        }

        Ok(Self {
            name: spec.name.clone(),
            callable: spec.callable.clone(),
            args,
            inject_source_topic: spec.params.source_topic,
            inject_matches: spec.params.matches,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FunctionKind {
        self.callable.kind()
    }

    pub(crate) fn callable(&self) -> &Callable {
        &self.callable
    }

    /// Builds the invocation context, injecting the special parameters
    /// the function declared.
    pub(crate) fn invocation<'a>(
        &'a self,
        source_topic: &'a str,
        matches: &'a Bindings,
    ) -> Invocation<'a> {
        Invocation::new(
            &self.args,
            self.inject_source_topic.then_some(source_topic),
            self.inject_matches.then_some(matches),
        )
    }
}
