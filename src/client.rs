use std::time::Duration;

use async_channel::{unbounded, Receiver, Sender};
use log::{error, info};
use rumqttc::{Client, ConnectReturnCode, Connection, Event, MqttOptions, Packet, Publish, QoS};

use crate::error::Error;

/// Broker connection parameters, usually taken from the environment.
#[derive(Debug, Clone)]
pub struct MqttParams {
    pub client_id: String,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// A thin MQTT client: the connection is driven on a background thread
/// and every inbound publish is forwarded into a channel.
pub struct MqttClient {
    client: Client,
    subscriber: Option<Receiver<Publish>>,
}

impl MqttClient {
    /// Creates the client and starts the connection thread.
    pub fn connect(params: &MqttParams) -> Self {
        let mut options = MqttOptions::new(&params.client_id, &params.host, params.port);
        options.set_keep_alive(Duration::from_secs(5));
        if let (Some(username), Some(password)) = (&params.username, &params.password) {
            options.set_credentials(username, password);
        }

        let (client, connection) = Client::new(options, 64);
        let (tx, rx) = unbounded();
        std::thread::spawn(move || drive(connection, tx));

        Self {
            client,
            subscriber: Some(rx),
        }
    }

    /// The channel of inbound messages for topics this client subscribed
    /// to. Yields the receiver the first time, `None` afterwards.
    pub fn subscriber(&mut self) -> Option<Receiver<Publish>> {
        self.subscriber.take()
    }

    pub fn subscribe(&self, filter: &str) -> Result<(), Error> {
        self.client.subscribe(filter, QoS::AtMostOnce)?;
        Ok(())
    }

    pub fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    ) -> Result<(), Error> {
        self.client.publish(topic, qos, retain, payload)?;
        Ok(())
    }
}

/// Pumps connection events until the subscriber side goes away. rumqttc
/// reconnects on the next iteration after an error.
fn drive(mut connection: Connection, tx: Sender<Publish>) {
    for event in connection.iter() {
        match event {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    info!("MQTT client connected");
                } else {
                    error!("MQTT client connection failed with code {:?}", ack.code);
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if tx.send_blocking(publish).is_err() {
                    return;
                }
            }
            Ok(_) => {}
            Err(err) => {
                error!("MQTT connection error: {err}");
                std::thread::sleep(Duration::from_secs(1));
            }
        }
    }
}
