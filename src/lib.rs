//! A configurable MQTT message-processing pipeline.
//!
//! Processors are declared in a YAML file: each one subscribes to one or
//! more source topic patterns, threads every matching payload through a
//! chain of registered functions, and republishes the results on sink
//! topics composed from the source topic's wildcard bindings.
//!
//! ```no_run
//! use mqtt_processor::*;
//!
//! fn main() -> Result<(), Error> {
//!     // A converter transforms the message body; a rule gates it.
//!     converter("tag", ParamSpec::none(), |body, _| match body {
//!         Body::Text(text) => Ok(Body::Text(format!("{text} (seen)"))),
//!         other => Ok(other),
//!     })?;
//!
//!     // Reads MQTT_HOST and friends, loads CONFIG_FILE, then serves.
//!     run()
//! }
//! ```
//!
//! Topic patterns use `{wN}` to match a single level and `{WN}` to match
//! one or more levels; bindings captured from the source topic are
//! substituted into the sink template:
//!
//! ```yaml
//! processors:
//!   - source: sensors/{w1}/temperature
//!     sink: aggregated/{w1}
//!     function: tag
//!     input_format: string
//! ```

mod app;
mod client;
mod config;
mod convert;
mod dispatch;
mod error;
mod function;
mod message;
mod processor;
mod topic;

pub use app::*;
pub use client::*;
pub use config::*;
pub use convert::register_builtins;
pub use dispatch::*;
pub use error::*;
pub use function::*;
pub use message::*;
pub use processor::*;
pub use topic::*;
