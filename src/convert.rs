//! Built-in format converters. They live in the registry like any other
//! converter; `input_format` and `output_format` in the config resolve to
//! these names.

use anyhow::{bail, Context};

use crate::error::Error;
use crate::function::{FunctionRegistry, Invocation, ParamSpec};
use crate::message::Body;

pub const BINARY_TO_STRING: &str = "binary_to_string";
pub const BINARY_TO_JSON: &str = "binary_to_json";
pub const STRING_TO_BINARY: &str = "string_to_binary";
pub const JSON_TO_BINARY: &str = "json_to_binary";

/// Registers the built-in converters into `registry`.
pub fn register_builtins(registry: &mut FunctionRegistry) -> Result<(), Error> {
    registry.converter(
        BINARY_TO_STRING,
        ParamSpec::none().with_optional(["encoding"]),
        binary_to_string,
    )?;
    registry.converter(BINARY_TO_JSON, ParamSpec::none(), binary_to_json)?;
    registry.converter(
        STRING_TO_BINARY,
        ParamSpec::none().with_optional(["encoding"]),
        string_to_binary,
    )?;
    registry.converter(JSON_TO_BINARY, ParamSpec::none(), json_to_binary)?;
    Ok(())
}

fn encoding(invocation: &Invocation<'_>) -> anyhow::Result<()> {
    let encoding = match invocation.arg("encoding") {
        None => return Ok(()),
        Some(value) => value
            .as_str()
            .context("`encoding` argument must be a string")?,
    };
    if !matches!(encoding, "utf8" | "utf-8") {
        bail!("unsupported encoding `{encoding}`");
    }
    Ok(())
}

fn variant(body: &Body) -> &'static str {
    match body {
        Body::Bytes(_) => "binary",
        Body::Text(_) => "string",
        Body::Json(_) => "json",
        Body::Routed(_) => "routed",
    }
}

fn binary_to_string(body: Body, invocation: &Invocation<'_>) -> anyhow::Result<Body> {
    encoding(invocation)?;
    match body {
        Body::Bytes(bytes) => Ok(Body::Text(String::from_utf8(bytes)?)),
        other => bail!("binary_to_string expects a binary payload, got {}", variant(&other)),
    }
}

fn binary_to_json(body: Body, _: &Invocation<'_>) -> anyhow::Result<Body> {
    match body {
        Body::Bytes(bytes) => Ok(Body::Json(serde_json::from_slice(&bytes)?)),
        other => bail!("binary_to_json expects a binary payload, got {}", variant(&other)),
    }
}

fn string_to_binary(body: Body, invocation: &Invocation<'_>) -> anyhow::Result<Body> {
    encoding(invocation)?;
    match body {
        Body::Text(text) => Ok(Body::Bytes(text.into_bytes())),
        other => bail!("string_to_binary expects a string payload, got {}", variant(&other)),
    }
}

fn json_to_binary(body: Body, _: &Invocation<'_>) -> anyhow::Result<Body> {
    match body {
        Body::Json(value) => Ok(Body::Bytes(serde_json::to_vec(&value)?)),
        // Mirrors serializing a bare string value.
        Body::Text(text) => Ok(Body::Bytes(serde_json::to_vec(&text)?)),
        other => bail!("json_to_binary expects a json payload, got {}", variant(&other)),
    }
}
