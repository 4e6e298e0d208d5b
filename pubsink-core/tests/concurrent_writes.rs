use std::sync::Arc;
use std::time::Duration;

use pubsink_core::{LogSink, PUBSUB_SCHEMA, Schema, Settings, Sink, SinkRegistry, SinkWriter};
use pubsink_mem::{Broker, Emulator, Subscription};
use tracing::info;

const RECORDS: usize = 10;

fn registry(broker: &Broker, emulator: &Emulator) -> SinkRegistry {
    SinkRegistry::init(
        Settings::default(),
        [
            Schema::topic("mem", Arc::new(broker.clone())),
            Schema::service(PUBSUB_SCHEMA, Arc::new(emulator.clone())),
        ],
    )
    .unwrap()
}

/// Write from `RECORDS` tasks at once and collect what the subscription receives.
async fn write_concurrently(sink: Arc<Sink>, mut subscription: Subscription) -> Vec<String> {
    let handles: Vec<_> = (0..RECORDS)
        .map(|i| {
            let sink = Arc::clone(&sink);
            tokio::spawn(async move {
                let record = format!("{{\"seq\":{i}}}\n");
                assert_eq!(sink.write(record.as_bytes()).unwrap(), record.len());
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let messages = subscription.drain(RECORDS, Duration::from_secs(2)).await;
    sink.close().await.unwrap();

    let mut received: Vec<String> = messages
        .iter()
        .map(|m| String::from_utf8(m.to_vec()).unwrap())
        .collect();
    received.sort();
    received
}

fn expected() -> Vec<String> {
    let mut expected: Vec<String> = (0..RECORDS).map(|i| format!("{{\"seq\":{i}}}\n")).collect();
    expected.sort();
    expected
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writes_to_mem_topic() {
    let broker = Broker::new();
    let emulator = Emulator::new();
    let registry = registry(&broker, &emulator);

    let subscription = broker.subscribe("app/logs").unwrap();
    let sink = Arc::new(registry.open("mem://app/logs").await.unwrap());

    assert_eq!(write_concurrently(sink, subscription).await, expected());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writes_to_emulated_service() {
    let broker = Broker::new();
    let emulator = Emulator::new();
    let registry = registry(&broker, &emulator);

    let subscription = emulator.subscribe("proj", "logs");
    let url = format!(
        "pubsub://projects/proj/topics/logs?srvAddr={}",
        emulator.addr()
    );
    let sink = Arc::new(registry.open(&url).await.unwrap());

    assert_eq!(write_concurrently(sink, subscription).await, expected());
}

#[tokio::test]
async fn independent_sinks_on_one_topic() {
    let broker = Broker::new();
    let emulator = Emulator::new();
    let registry = registry(&broker, &emulator);

    let mut subscription = broker.subscribe("shared").unwrap();
    let first = registry.open("mem://shared").await.unwrap();
    let second = registry.open("mem://shared").await.unwrap();

    first.close().await.unwrap();
    assert!(second.write(b"still open").is_ok());
    assert!(first.write(b"closed").is_err());

    let messages = subscription.drain(1, Duration::from_secs(1)).await;
    assert_eq!(messages.len(), 1);
    second.close().await.unwrap();
}

#[tokio::test]
async fn tracing_records_reach_the_topic() {
    let broker = Broker::new();
    let emulator = Emulator::new();
    let registry = registry(&broker, &emulator);

    let mut subscription = broker.subscribe("json").unwrap();
    let sink = Arc::new(registry.open("mem://json").await.unwrap());

    let subscriber = tracing_subscriber::fmt()
        .json()
        .flatten_event(true)
        .with_writer(SinkWriter::new(Arc::clone(&sink)))
        .finish();
    tracing::subscriber::with_default(subscriber, || {
        for seq in 0..3 {
            info!(seq, "record");
        }
    });

    let messages = subscription.drain(3, Duration::from_secs(1)).await;
    assert_eq!(messages.len(), 3);
    let mut seqs: Vec<i64> = messages
        .iter()
        .map(|m| {
            let record: serde_json::Value = serde_json::from_slice(m).unwrap();
            assert_eq!(record["message"], "record");
            record["seq"].as_i64().unwrap()
        })
        .collect();
    seqs.sort_unstable();
    assert_eq!(seqs, vec![0, 1, 2]);

    sink.close().await.unwrap();
}
