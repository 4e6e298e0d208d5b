use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use pubsink_core::{
    LogSink, MEM_SCHEMA, PUBSUB_SCHEMA, Schema, Settings, SinkRegistry, SinkWriter,
    default_schemas,
};
use pubsink_mem::{Broker, Emulator};
use tokio::task::JoinSet;
use tracing::info;
use tracing::instrument::WithSubscriber;

use crate::setup_tracing;

const EMULATOR_RECORDS: usize = 10;
const RECEIVE_WAIT: Duration = Duration::from_secs(5);

/// Log `count` records through the sink opened for `url`. For `mem` URLs the records are also
/// read back from the topic.
pub(super) async fn run_basic(
    settings: Settings,
    url: &str,
    count: usize,
) -> Result<(), Box<dyn Error>> {
    let registry = SinkRegistry::init(settings, default_schemas())?;
    let sink = Arc::new(registry.open(url).await?);
    let mut subscription = (sink.config().schema == MEM_SCHEMA)
        .then(|| Broker::shared().subscribe(&sink.config().topic))
        .transpose()?;

    let dispatch = setup_tracing::with_sink(SinkWriter::new(Arc::clone(&sink)));
    async {
        for seq in 0..count {
            info!(seq, "basic log record");
        }
    }
    .with_subscriber(dispatch)
    .await;

    if let Some(subscription) = subscription.as_mut() {
        let received = subscription.drain(count, RECEIVE_WAIT).await;
        info!(topic = subscription.topic(), received = received.len(), "Read back log records");
    }
    sink.close().await?;
    info!(url, count, "Published log records");
    Ok(())
}

/// Log concurrently to a topic of an in-process service emulator, reached through an endpoint
/// override, and print every record the emulator received.
pub(super) async fn run_emulator(
    settings: Settings,
    project_id: &str,
    topic: &str,
) -> Result<(), Box<dyn Error>> {
    let emulator = Emulator::new();
    let registry = SinkRegistry::init(
        settings,
        [Schema::service(PUBSUB_SCHEMA, Arc::new(emulator.clone()))],
    )?;

    let mut subscription = emulator.subscribe(project_id, topic);
    let url = format!(
        "{PUBSUB_SCHEMA}://projects/{project_id}/topics/{topic}?srvAddr={}",
        emulator.addr()
    );
    let sink = Arc::new(registry.open(&url).await?);

    let dispatch = setup_tracing::with_sink(SinkWriter::new(Arc::clone(&sink)));
    let mut tasks = JoinSet::new();
    for seq in 0..EMULATOR_RECORDS {
        tasks.spawn(
            async move {
                info!(seq, "concurrent log record");
            }
            .with_subscriber(dispatch.clone()),
        );
    }
    while let Some(result) = tasks.join_next().await {
        result?;
    }

    let received = subscription.drain(EMULATOR_RECORDS, RECEIVE_WAIT).await;
    sink.close().await?;

    for record in &received {
        println!("{}", String::from_utf8_lossy(record).trim_end());
    }
    info!(
        project_id,
        topic,
        sent = EMULATOR_RECORDS,
        received = received.len(),
        "Emulator received log records"
    );
    Ok(())
}
