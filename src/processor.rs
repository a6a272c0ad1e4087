use log::{error, warn};

use crate::config::{MessageFormat, ProcessorConfig};
use crate::convert;
use crate::error::Error;
use crate::function::{ArgMap, Callable, FunctionBinding, FunctionRegistry};
use crate::message::{Body, Message, RoutedMessage};
use crate::topic::{Bindings, TopicPattern};

/// Processes messages arriving on one source pattern: matches the topic,
/// threads the payload through the function chain, and expands the
/// terminal product into outbound messages.
#[derive(Debug)]
pub struct SingleSourceProcessor {
    name: String,
    source: TopicPattern,
    chain: Vec<FunctionBinding>,
    default_sink: Option<TopicPattern>,
}

impl SingleSourceProcessor {
    pub fn new(
        name: &str,
        chain: Vec<FunctionBinding>,
        source: TopicPattern,
        default_sink: Option<TopicPattern>,
    ) -> Self {
        Self {
            name: format!("{name}@{}", source.rule()),
            source,
            chain,
            default_sink,
        }
    }

    pub fn source(&self) -> &TopicPattern {
        &self.source
    }

    /// Runs the full pipeline for one inbound message. Returns an empty
    /// list when the topic does not match this source or the chain drops
    /// the message.
    pub fn process(&self, source_topic: &str, body: Body) -> Vec<Message> {
        let concrete = match TopicPattern::new(source_topic) {
            Ok(topic) => topic,
            Err(err) => {
                warn!("{}: unusable inbound topic: {err}", self.name);
                return Vec::new();
            }
        };

        let bindings = match self.source.matches(&concrete) {
            Some(bindings) => bindings,
            None => return Vec::new(),
        };

        match self.run_chain(body, &concrete, &bindings) {
            Some(terminal) => self.expand(&concrete, terminal),
            None => Vec::new(),
        }
    }

    /// Threads the body through the chain. `None` means the message is
    /// dropped: a rule rejected it, a function failed, or a routed
    /// message was produced before the last function.
    fn run_chain(
        &self,
        input: Body,
        concrete: &TopicPattern,
        bindings: &Bindings,
    ) -> Option<Body> {
        let mut body = input;
        for binding in &self.chain {
            if body.is_routed() {
                // A routed message is a terminal product; only the last
                // function of a chain may produce one.
                error!(
                    "{}: dropping routed message: `{}` would run after it",
                    self.name,
                    binding.name()
                );
                return None;
            }

            let invocation = binding.invocation(concrete.rule(), bindings);
            match binding.callable() {
                Callable::Rule(f) => match f(&body, &invocation) {
                    Ok(true) => {}
                    Ok(false) => return None,
                    Err(err) => {
                        error!(
                            "{}: rule `{}` failed to execute: {err:#}",
                            self.name,
                            binding.name()
                        );
                        return None;
                    }
                },
                Callable::Converter(f) => {
                    body = match f(body, &invocation) {
                        Ok(next) => next,
                        Err(err) => {
                            error!(
                                "{}: converter `{}` failed to execute: {err:#}",
                                self.name,
                                binding.name()
                            );
                            return None;
                        }
                    };
                }
            }
        }
        Some(body)
    }

    fn expand(&self, source: &TopicPattern, terminal: Body) -> Vec<Message> {
        let mut messages = Vec::new();
        match terminal {
            Body::Routed(routed) => {
                self.expand_routed(source, self.default_sink.as_ref(), routed, &mut messages)
            }
            body => messages.push(Message::new(
                self.resolve_sink(source, self.default_sink.as_ref()),
                body,
            )),
        }
        messages
    }

    /// Expands a routed envelope depth-first, left-to-right. Inside a
    /// nested envelope the enclosing route stands in for the default
    /// sink.
    fn expand_routed(
        &self,
        source: &TopicPattern,
        default_sink: Option<&TopicPattern>,
        routed: RoutedMessage,
        out: &mut Vec<Message>,
    ) {
        match routed {
            RoutedMessage::Dict(entries) => {
                for (route, item) in entries {
                    if let Some(route) = self.parse_route(&route) {
                        self.emit(source, Some(&route), item, out);
                    }
                }
            }
            RoutedMessage::List(items) => {
                for item in items {
                    self.emit(source, default_sink, item, out);
                }
            }
            RoutedMessage::RouteMany(route, items) => {
                if let Some(route) = self.parse_route(&route) {
                    for item in items {
                        self.emit(source, Some(&route), item, out);
                    }
                }
            }
            RoutedMessage::RouteOne(route, item) => {
                if let Some(route) = self.parse_route(&route) {
                    self.emit(source, Some(&route), *item, out);
                }
            }
        }
    }

    fn emit(
        &self,
        source: &TopicPattern,
        route: Option<&TopicPattern>,
        item: Body,
        out: &mut Vec<Message>,
    ) {
        match item {
            Body::Routed(nested) => self.expand_routed(source, route, nested, out),
            body => out.push(Message::new(self.resolve_sink(source, route), body)),
        }
    }

    fn parse_route(&self, route: &str) -> Option<TopicPattern> {
        match TopicPattern::new(route) {
            Ok(topic) => Some(topic),
            Err(err) => {
                warn!("{}: ignoring routed branch: {err}", self.name);
                None
            }
        }
    }

    fn resolve_sink(
        &self,
        source: &TopicPattern,
        template: Option<&TopicPattern>,
    ) -> Option<TopicPattern> {
        let template = template?;
        match self.source.compose(source, template) {
            Ok(sink) => Some(sink),
            Err(err) => {
                error!("{}: cannot compose sink topic: {err}", self.name);
                None
            }
        }
    }
}

/// A named fan-in over several source patterns sharing one function
/// chain and one default sink. The first source whose processing yields
/// output wins.
#[derive(Debug)]
pub struct Processor {
    name: String,
    processors: Vec<SingleSourceProcessor>,
}

impl Processor {
    pub fn new(
        name: &str,
        chain: Vec<FunctionBinding>,
        sources: Vec<TopicPattern>,
        sink: Option<TopicPattern>,
    ) -> Self {
        let processors = sources
            .into_iter()
            .map(|source| SingleSourceProcessor::new(name, chain.clone(), source, sink.clone()))
            .collect();
        Self {
            name: name.to_string(),
            processors,
        }
    }

    /// Builds a processor from a validated config entry, resolving every
    /// function against `registry` and wiring in the input decoder and
    /// output encoder the declared formats call for.
    pub fn from_config(
        config: &ProcessorConfig,
        registry: &FunctionRegistry,
    ) -> Result<Self, Error> {
        let mut chain = Vec::new();

        let decoder = match config.input_format {
            MessageFormat::Binary => None,
            MessageFormat::String => Some(convert::BINARY_TO_STRING),
            MessageFormat::Json => Some(convert::BINARY_TO_JSON),
        };
        if let Some(name) = decoder {
            chain.push(bind(registry, name, ArgMap::new())?);
        }

        for function in &config.function {
            chain.push(bind(registry, &function.name, function.arguments.clone())?);
        }

        let encoder = config.output_format.and_then(|format| match format {
            MessageFormat::Binary => None,
            MessageFormat::String => Some(convert::STRING_TO_BINARY),
            MessageFormat::Json => Some(convert::JSON_TO_BINARY),
        });
        if let Some(name) = encoder {
            chain.push(bind(registry, name, ArgMap::new())?);
        }

        Ok(Self::new(
            config.name(),
            chain,
            config.source.clone(),
            config.sink.clone(),
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The source patterns of this processor, in declaration order.
    pub fn source_topics(&self) -> impl Iterator<Item = &TopicPattern> + '_ {
        self.processors.iter().map(SingleSourceProcessor::source)
    }

    /// Delegates to the first single-source processor that produces a
    /// non-empty result.
    pub fn process(&self, source_topic: &str, body: Body) -> Vec<Message> {
        for processor in &self.processors {
            let messages = processor.process(source_topic, body.clone());
            if !messages.is_empty() {
                return messages;
            }
        }
        Vec::new()
    }
}

fn bind(registry: &FunctionRegistry, name: &str, args: ArgMap) -> Result<FunctionBinding, Error> {
    let spec = registry
        .get(name)
        .ok_or_else(|| Error::UnknownFunction(name.to_string()))?;
    FunctionBinding::bind(spec, args)
}
