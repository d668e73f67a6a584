//! Kafka transport bindings
//!
//! `rdkafka`-backed implementations of the [`Sink`] and [`Poll`] seams,
//! plus the topic-administration step the CLI runs before a test. The
//! blocking `BaseProducer`/`BaseConsumer` clients fit the harness model:
//! one sequential publish driver and one dedicated thread per poll worker.

use crate::config::KafkaConfig;
use crate::poll::Poll;
use crate::sink::Sink;
use crate::{HarnessError, Result};
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::producer::{BaseProducer, BaseRecord, Producer};
use rdkafka::Message;
use std::time::Duration;
use tracing::{info, warn};

/// Bounded blocking interval for one consumer fetch.
const FETCH_TIMEOUT: Duration = Duration::from_millis(100);

/// Outstanding deliveries are flushed for at most this long at close.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Producer-side binding: one `BaseProducer` publishing keyed string
/// payloads to the run topic.
pub struct KafkaSink {
    producer: BaseProducer,
    topic: String,
}

impl KafkaSink {
    pub fn connect(config: &KafkaConfig, topic: &str) -> Result<Self> {
        let producer: BaseProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", "5000")
            .create()?;
        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }
}

impl Sink for KafkaSink {
    fn publish(&self, message: &str) -> Result<()> {
        self.producer
            .send(BaseRecord::to(&self.topic).key(message).payload(message))
            .map_err(|(e, _)| HarnessError::Kafka(e))?;
        // Serve pending delivery callbacks without blocking the driver.
        self.producer.poll(Duration::ZERO);
        Ok(())
    }

    fn close(&mut self) {
        if let Err(e) = self.producer.flush(CLOSE_FLUSH_TIMEOUT) {
            warn!(error = %e, "producer flush failed at close");
        }
    }
}

/// Consumer-side binding: one `BaseConsumer` in the shared run group,
/// fetching with a bounded timeout.
pub struct KafkaPoll {
    consumer: BaseConsumer,
}

impl KafkaPoll {
    pub fn connect(config: &KafkaConfig, topic: &str, group_id: &str) -> Result<Self> {
        let consumer: BaseConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .create()?;
        consumer.subscribe(&[topic])?;
        Ok(Self { consumer })
    }
}

impl Poll for KafkaPoll {
    fn fetch(&mut self) -> Result<Option<String>> {
        match self.consumer.poll(FETCH_TIMEOUT) {
            None => Ok(None),
            Some(Err(e)) => Err(HarnessError::Kafka(e)),
            Some(Ok(message)) => Ok(message
                .payload()
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())),
        }
    }

    fn close(&mut self) {
        // Best effort: leave the group so rebalancing does not wait for a
        // session timeout.
        self.consumer.unsubscribe();
    }
}

/// Creates the run topic with the configured partition count and
/// replication factor 1. Fatal if the broker rejects it.
pub fn ensure_topic(config: &KafkaConfig, topic: &str) -> Result<()> {
    let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
        .set("bootstrap.servers", &config.brokers)
        .create()?;
    let spec = NewTopic::new(topic, config.partitions, TopicReplication::Fixed(1));
    let results =
        futures::executor::block_on(admin.create_topics(&[spec], &AdminOptions::new()))?;
    for result in results {
        match result {
            Ok(name) => info!(topic = %name, partitions = config.partitions, "created topic"),
            Err((name, code)) => {
                return Err(HarnessError::Setup(format!(
                    "failed to create topic {}: {}",
                    name, code
                )))
            }
        }
    }
    Ok(())
}

/// A name unique enough for one run; fresh topics and consumer groups keep
/// runs from observing each other's messages.
pub fn unique_name(prefix: &str) -> String {
    format!("{}-{}", prefix, chrono::Utc::now().timestamp_millis())
}
