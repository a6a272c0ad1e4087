use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::topic::TopicPattern;

/// A message payload at some point in a processor chain.
///
/// Payloads enter as `Bytes`, are reshaped by converters, and leave as
/// whatever the last converter produced. `Routed` is a terminal product:
/// it may only be produced by the final function of a chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Bytes(Vec<u8>),
    Text(String),
    Json(JsonValue),
    Routed(RoutedMessage),
}

impl Body {
    pub fn is_routed(&self) -> bool {
        matches!(self, Body::Routed(_))
    }

    /// Encodes a terminal body for publishing.
    pub fn to_wire(&self) -> anyhow::Result<Vec<u8>> {
        match self {
            Body::Bytes(bytes) => Ok(bytes.clone()),
            Body::Text(text) => Ok(text.clone().into_bytes()),
            Body::Json(value) => Ok(serde_json::to_vec(value)?),
            Body::Routed(_) => anyhow::bail!("a routed message has no wire form"),
        }
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<JsonValue> for Body {
    fn from(value: JsonValue) -> Self {
        Body::Json(value)
    }
}

impl From<RoutedMessage> for Body {
    fn from(routed: RoutedMessage) -> Self {
        Body::Routed(routed)
    }
}

/// An envelope produced by a converter to fan one input out into
/// zero-or-more outbound messages, with or without explicit routes.
///
/// Any contained body may itself be `Body::Routed`; expansion recurses
/// depth-first, with the enclosing route standing in for the default
/// sink inside the nested envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutedMessage {
    /// Route string to body; iteration preserves insertion order.
    Dict(IndexMap<String, Body>),
    /// Bodies destined for the default sink.
    List(Vec<Body>),
    /// One route, many bodies.
    RouteMany(String, Vec<Body>),
    /// One route, one body.
    RouteOne(String, Box<Body>),
}

impl RoutedMessage {
    pub fn dict<K, B>(entries: impl IntoIterator<Item = (K, B)>) -> Self
    where
        K: Into<String>,
        B: Into<Body>,
    {
        RoutedMessage::Dict(
            entries
                .into_iter()
                .map(|(route, body)| (route.into(), body.into()))
                .collect(),
        )
    }

    pub fn list<B: Into<Body>>(items: impl IntoIterator<Item = B>) -> Self {
        RoutedMessage::List(items.into_iter().map(Into::into).collect())
    }

    pub fn route_many<B: Into<Body>>(
        route: impl Into<String>,
        items: impl IntoIterator<Item = B>,
    ) -> Self {
        RoutedMessage::RouteMany(route.into(), items.into_iter().map(Into::into).collect())
    }

    pub fn route_one(route: impl Into<String>, body: impl Into<Body>) -> Self {
        RoutedMessage::RouteOne(route.into(), Box::new(body.into()))
    }
}

/// An outbound message. `sink_topic == None` means there is nowhere to
/// publish to; the dispatcher drops such messages.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub sink_topic: Option<TopicPattern>,
    pub body: Body,
}

impl Message {
    pub fn new(sink_topic: Option<TopicPattern>, body: Body) -> Self {
        Self { sink_topic, body }
    }
}
