use clap::Parser;
use roundtrip::kafka::{self, KafkaPoll, KafkaSink};
use roundtrip::{
    HarnessConfig, KafkaConfig, LogObserver, Poll, Result, RunController, Sink,
};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "roundtrip")]
#[command(about = "End-to-end roundtrip correctness harness for Kafka-compatible brokers")]
struct Args {
    /// Bootstrap servers (host:port, comma-separated)
    #[arg(long)]
    brokers: Option<String>,

    /// Run topic (defaults to a fresh uniquely named topic)
    #[arg(long)]
    topic: Option<String>,

    /// Consumer group id (defaults to a fresh uniquely named group)
    #[arg(long)]
    group_id: Option<String>,

    /// Partition count for the run topic
    #[arg(long)]
    partitions: Option<i32>,

    /// Number of producer sinks
    #[arg(long)]
    sinks: Option<usize>,

    /// Number of poll worker threads
    #[arg(long)]
    poll_workers: Option<usize>,

    /// Publish phase length in seconds
    #[arg(long)]
    publish_secs: Option<u64>,

    /// Drain stall threshold in seconds
    #[arg(long)]
    stall_secs: Option<u64>,

    /// Skip topic creation (use an existing topic)
    #[arg(long)]
    no_create_topic: bool,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(parse_log_level(&args.log_level))
        .init();

    let mut config = HarnessConfig::from_env()?;
    if let Some(sinks) = args.sinks {
        config.sink_count = sinks;
    }
    if let Some(workers) = args.poll_workers {
        config.poll_worker_count = workers;
    }
    if let Some(secs) = args.publish_secs {
        config.publish_duration_ms = secs * 1000;
    }
    if let Some(secs) = args.stall_secs {
        config.stall_timeout_ms = secs * 1000;
    }

    let mut kafka_config = KafkaConfig::from_env();
    if let Some(brokers) = args.brokers {
        kafka_config.brokers = brokers;
    }
    if let Some(topic) = args.topic {
        kafka_config.topic = Some(topic);
    }
    if let Some(group_id) = args.group_id {
        kafka_config.group_id = Some(group_id);
    }
    if let Some(partitions) = args.partitions {
        kafka_config.partitions = partitions;
    }

    let topic = kafka_config
        .topic
        .clone()
        .unwrap_or_else(|| kafka::unique_name("roundtrip"));
    let group_id = kafka_config
        .group_id
        .clone()
        .unwrap_or_else(|| kafka::unique_name("roundtrip-group"));

    info!(brokers = %kafka_config.brokers, topic = %topic, group = %group_id, "starting roundtrip run");
    info!(
        sinks = config.sink_count,
        poll_workers = config.poll_worker_count,
        publish_ms = config.publish_duration_ms,
        stall_ms = config.stall_timeout_ms,
        "run parameters"
    );

    if args.no_create_topic {
        warn!("skipping topic creation");
    } else {
        kafka::ensure_topic(&kafka_config, &topic)?;
    }

    let sink_config = kafka_config.clone();
    let sink_topic = topic.clone();
    let poll_config = kafka_config.clone();
    let poll_topic = topic.clone();
    let poll_group = group_id.clone();

    let mut controller = RunController::new(
        config,
        move || Ok(Box::new(KafkaSink::connect(&sink_config, &sink_topic)?) as Box<dyn Sink>),
        move || {
            Ok(Box::new(KafkaPoll::connect(&poll_config, &poll_topic, &poll_group)?)
                as Box<dyn Poll>)
        },
    )?;

    let report = controller.run(&mut LogObserver)?;
    controller.dispose();

    if report.success() {
        info!("Test run SUCCEEDED.");
        Ok(())
    } else {
        error!(unseen = report.unseen.len(), "Test run FAILED.");
        std::process::exit(1);
    }
}

fn parse_log_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => {
            warn!("Invalid log level '{}', defaulting to 'info'", level);
            tracing::Level::INFO
        }
    }
}
