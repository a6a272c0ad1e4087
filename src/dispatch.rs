use indexmap::IndexSet;
use log::debug;

use crate::config::Config;
use crate::error::Error;
use crate::function::FunctionRegistry;
use crate::message::{Body, Message};
use crate::processor::Processor;

/// Owns every configured processor and presents the two entry points the
/// transport loop needs: which filters to subscribe to, and what to do
/// with an inbound message.
pub struct Dispatcher {
    processors: Vec<Processor>,
}

impl Dispatcher {
    pub fn new(processors: Vec<Processor>) -> Self {
        Self { processors }
    }

    pub fn from_config(config: &Config, registry: &FunctionRegistry) -> Result<Self, Error> {
        let processors = config
            .processors
            .iter()
            .map(|processor| Processor::from_config(processor, registry))
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(Self::new(processors))
    }

    pub fn processors(&self) -> &[Processor] {
        &self.processors
    }

    /// The de-duplicated union of every source's subscription filter, in
    /// declaration order.
    pub fn subscriptions(&self) -> Vec<String> {
        let mut filters = IndexSet::new();
        for processor in &self.processors {
            for topic in processor.source_topics() {
                filters.insert(topic.subscription_filter());
            }
        }
        filters.into_iter().collect()
    }

    /// Feeds one inbound message to every processor in declaration order
    /// and concatenates their outputs.
    pub fn on_message(&self, topic: &str, payload: &[u8]) -> Vec<Message> {
        debug!("received message at {topic}");
        let mut outbound = Vec::new();
        for processor in &self.processors {
            outbound.extend(processor.process(topic, Body::Bytes(payload.to_vec())));
        }
        outbound
    }
}
