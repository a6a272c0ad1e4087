//! A minimal bridge: registers one converter and serves the pipeline
//! described by CONFIG_FILE against the broker at MQTT_HOST.
//!
//! With a config like
//!
//! ```yaml
//! processors:
//!   - source: sensors/{w1}/raw
//!     sink: sensors/{w1}/scaled
//!     function: scale_val
//! ```
//!
//! a payload `{"val": 3}` published on `sensors/kitchen/raw` comes back
//! as `{"val": 30}` on `sensors/kitchen/scaled`.
use mqtt_processor::*;

fn main() -> Result<(), Error> {
    converter("scale_val", ParamSpec::none(), |body, _| {
        let Body::Json(mut value) = body else {
            anyhow::bail!("scale_val expects a json payload");
        };
        if let Some(val) = value.get("val").and_then(|v| v.as_i64()) {
            value["val"] = (val * 10).into();
        }
        Ok(Body::Json(value))
    })?;

    run()
}
