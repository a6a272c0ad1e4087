//! Shared fixtures: a registry of dummy rules and converters exercising
//! every chain behavior, and helpers to assemble processors the way the
//! config layer would.
#![allow(dead_code)]

use anyhow::Context;
use mqtt_processor::{
    ArgMap, Body, FunctionBinding, FunctionRegistry, ParamSpec, RoutedMessage,
    SingleSourceProcessor, TopicPattern,
};

fn take_text(body: Body) -> anyhow::Result<String> {
    match body {
        Body::Text(text) => Ok(text),
        other => anyhow::bail!("expected a text body, got {other:?}"),
    }
}

fn concat(
    tag: &'static str,
) -> impl Fn(Body, &mqtt_processor::Invocation<'_>) -> anyhow::Result<Body> + Send + Sync + 'static
{
    move |body, _| Ok(Body::Text(format!("{}{tag}", take_text(body)?)))
}

/// The built-ins plus every dummy function the pipeline tests use.
pub fn fixture_registry() -> FunctionRegistry {
    let mut registry = FunctionRegistry::with_builtins();

    registry
        .rule("dummy_rule_false", ParamSpec::none(), |_, _| Ok(false))
        .unwrap();
    registry
        .rule("dummy_rule_true", ParamSpec::none(), |_, _| Ok(true))
        .unwrap();
    registry
        .rule("dummy_rule_failing", ParamSpec::none(), |_, _| {
            anyhow::bail!("rule blew up")
        })
        .unwrap();
    registry
        .converter("dummy_str_concat1", ParamSpec::none(), concat("<concat1>"))
        .unwrap();
    registry
        .converter("dummy_str_concat2", ParamSpec::none(), concat("<concat2>"))
        .unwrap();
    registry
        .converter("dummy_str_failing", ParamSpec::none(), |_, _| {
            anyhow::bail!("converter blew up")
        })
        .unwrap();
    registry
        .converter(
            "dummy_str_concat_with_params",
            ParamSpec::required(["a", "b"]),
            |body, invocation| {
                let a = invocation
                    .arg("a")
                    .and_then(|v| v.as_i64())
                    .context("argument `a`")?;
                let b = invocation
                    .arg("b")
                    .and_then(|v| v.as_i64())
                    .context("argument `b`")?;
                Ok(Body::Text(format!(
                    "{}<concat-a+b={a}+{b}={}>",
                    take_text(body)?,
                    a + b
                )))
            },
        )
        .unwrap();
    registry
        .converter("dummy_json_scale", ParamSpec::none(), |body, _| {
            let Body::Json(mut value) = body else {
                anyhow::bail!("expected a json body");
            };
            if let Some(val) = value.get("val").and_then(|v| v.as_i64()) {
                value["val"] = (val * 10).into();
            }
            Ok(Body::Json(value))
        })
        .unwrap();

    registry
        .converter("dummy_routed_dict", ParamSpec::none(), |body, _| {
            let text = take_text(body)?;
            Ok(RoutedMessage::dict([(
                "dict/routed/destination/topic",
                format!("{text}<dict-routed>"),
            )])
            .into())
        })
        .unwrap();
    registry
        .converter("dummy_routed_dict_multiple", ParamSpec::none(), |body, _| {
            let text = take_text(body)?;
            Ok(RoutedMessage::dict([
                (
                    "multiroute-dict/routed/destination/topic1",
                    format!("{text}<multiroute-dict1>"),
                ),
                (
                    "multiroute-dict/routed/destination/topic2",
                    format!("{text}<multiroute-dict2>"),
                ),
                (
                    "multiroute-dict/routed/destination/topic3",
                    format!("{text}<multiroute-dict3>"),
                ),
            ])
            .into())
        })
        .unwrap();
    registry
        .converter("dummy_routed_list", ParamSpec::none(), |body, _| {
            let text = take_text(body)?;
            Ok(RoutedMessage::list([
                format!("{text}<routed_list-msg1>"),
                format!("{text}<routed_list-msg2>"),
                format!("{text}<routed_list-msg3>"),
            ])
            .into())
        })
        .unwrap();
    registry
        .converter(
            "dummy_routed_tuple_containing_multiple",
            ParamSpec::none(),
            |body, _| {
                let text = take_text(body)?;
                Ok(RoutedMessage::route_many(
                    "tuple-of-lists/routed/destination/topic",
                    [
                        format!("{text}<routed_tuple_of_lists-msg1>"),
                        format!("{text}<routed_tuple_of_lists-msg2>"),
                        format!("{text}<routed_tuple_of_lists-msg3>"),
                    ],
                )
                .into())
            },
        )
        .unwrap();
    registry
        .converter(
            "dummy_routed_tuple_containing_single",
            ParamSpec::none(),
            |body, _| {
                let text = take_text(body)?;
                Ok(RoutedMessage::route_one(
                    "tuple/routed/destination/topic",
                    format!("{text}<routed-tuple>"),
                )
                .into())
            },
        )
        .unwrap();

    registry
        .converter(
            "dummy_routed_dict_hierarchical",
            ParamSpec::none(),
            |body, _| {
                let text = take_text(body)?;
                Ok(RoutedMessage::dict([(
                    "dict/routed/destination/topic",
                    RoutedMessage::list([
                        format!("{text}<dict-hierarchical1>"),
                        format!("{text}<dict-hierarchical2>"),
                    ]),
                )])
                .into())
            },
        )
        .unwrap();
    registry
        .converter(
            "dummy_routed_dict_multiple_hierarchical",
            ParamSpec::none(),
            |body, _| {
                let text = take_text(body)?;
                Ok(RoutedMessage::dict([
                    (
                        "multiroute-dict/routed/destination/topic1",
                        RoutedMessage::list([
                            format!("{text}<hierarchical-dict-multiple1-1>"),
                            format!("{text}<hierarchical-dict-multiple1-2>"),
                        ]),
                    ),
                    (
                        "multiroute-dict/routed/destination/topic2",
                        RoutedMessage::list([
                            format!("{text}<hierarchical-dict-multiple2-1>"),
                            format!("{text}<hierarchical-dict-multiple2-2>"),
                        ]),
                    ),
                ])
                .into())
            },
        )
        .unwrap();

    registry
}

/// Binds the named functions with no arguments, in order.
pub fn chain(registry: &FunctionRegistry, names: &[&str]) -> Vec<FunctionBinding> {
    names
        .iter()
        .map(|name| {
            FunctionBinding::bind(
                registry.get(name).unwrap_or_else(|| panic!("{name}")),
                ArgMap::new(),
            )
            .unwrap()
        })
        .collect()
}

pub fn topic(rule: &str) -> TopicPattern {
    TopicPattern::new(rule).expect(rule)
}

/// A single-source processor on `<name>/source` → `<name>/sink`.
pub fn single_processor(
    name: &str,
    registry: &FunctionRegistry,
    functions: &[&str],
) -> (SingleSourceProcessor, TopicPattern, TopicPattern) {
    let source = topic(&format!("{name}/source"));
    let sink = topic(&format!("{name}/sink"));
    let processor = SingleSourceProcessor::new(
        name,
        chain(registry, functions),
        source.clone(),
        Some(sink.clone()),
    );
    (processor, source, sink)
}

/// Same, but without a default sink.
pub fn single_processor_without_sink(
    name: &str,
    registry: &FunctionRegistry,
    functions: &[&str],
) -> (SingleSourceProcessor, TopicPattern) {
    let source = topic(&format!("{name}/source"));
    let processor =
        SingleSourceProcessor::new(name, chain(registry, functions), source.clone(), None);
    (processor, source)
}
