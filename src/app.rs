use std::env;
use std::path::PathBuf;

use log::{debug, error, info};

use crate::client::{MqttClient, MqttParams};
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::Error;
use crate::function::FunctionRegistry;

/// Runtime parameters taken from the environment.
#[derive(Debug, Clone)]
pub struct EnvParams {
    pub mqtt: MqttParams,
    pub config_file: PathBuf,
    pub log_level: String,
}

impl EnvParams {
    pub fn from_env() -> Result<Self, Error> {
        let host = env::var("MQTT_HOST").map_err(|_| Error::MissingEnv("MQTT_HOST"))?;
        let port = match env::var("MQTT_PORT") {
            Err(_) => 1883,
            Ok(port) => port.parse().map_err(|_| {
                Error::InvalidConfig(format!("MQTT_PORT `{port}` is not a port number"))
            })?,
        };
        let client_id = env::var("MQTT_CLIENT_ID")
            .unwrap_or_else(|_| format!("MqttProcessor-{}", rand::random::<u16>()));

        Ok(Self {
            mqtt: MqttParams {
                client_id,
                host,
                port,
                username: env::var("MQTT_USERNAME").ok(),
                password: env::var("MQTT_PASSWORD").ok(),
            },
            config_file: env::var("CONFIG_FILE")
                .unwrap_or_else(|_| "config.yaml".to_string())
                .into(),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "warn".to_string()),
        })
    }
}

/// Runs the pipeline with the functions registered in the process-wide
/// default registry. Register everything before calling this; the
/// registry is frozen once processors are built.
pub fn run() -> Result<(), Error> {
    run_with_registry(FunctionRegistry::global_snapshot())
}

/// Runs the pipeline with an explicit set of user functions. Blocks
/// until the connection thread goes away.
pub fn run_with_registry(user_functions: FunctionRegistry) -> Result<(), Error> {
    let env = EnvParams::from_env()?;
    init_logging(&env.log_level);

    let mut registry = FunctionRegistry::with_builtins();
    registry.merge(&user_functions)?;

    let config = Config::load(&env.config_file)?;
    let dispatcher = Dispatcher::from_config(&config, &registry)?;

    let mut client = MqttClient::connect(&env.mqtt);
    let ingress = client
        .subscriber()
        .expect("a fresh client has its subscriber");

    for filter in dispatcher.subscriptions() {
        client.subscribe(&filter)?;
    }

    info!("processing messages");
    while let Ok(inbound) = ingress.recv_blocking() {
        for message in dispatcher.on_message(&inbound.topic, &inbound.payload) {
            let sink = match &message.sink_topic {
                Some(sink) => sink,
                None => {
                    debug!("dropping message without a sink topic");
                    continue;
                }
            };
            match message.body.to_wire() {
                Ok(payload) => {
                    debug!("sending message to {sink}");
                    client.publish(sink.rule(), payload, inbound.qos, inbound.retain)?;
                }
                Err(err) => error!("cannot encode message for {sink}: {err:#}"),
            }
        }
    }
    Ok(())
}

fn init_logging(level: &str) {
    // LOG_LEVEL also accepts the WARNING/CRITICAL spellings.
    let level = match level.to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" => "error".to_string(),
        other => other.to_string(),
    };
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(level),
    )
    .try_init();
}
