//! Redis Streams integration tests.

use std::time::Duration;

use jumpclip_models::{Job, JobMessage, JobTarget, RenderOptions};
use jumpclip_queue::{DeadLetterSink, MessageQueue, QueueConfig, RedisJobQueue};

fn test_queue(suffix: &str, visibility: Duration, max_receives: u32) -> RedisJobQueue {
    dotenvy::dotenv().ok();
    let base = QueueConfig::from_env();
    let config = QueueConfig {
        stream_name: format!("jumpclip:test:{}", suffix),
        dlq_stream_name: format!("jumpclip:test:{}:dlq", suffix),
        consumer_group: format!("jumpclip-test-{}", suffix),
        consumer_name: "test-consumer".to_string(),
        visibility_timeout: visibility,
        max_receives,
        ..base
    };
    RedisJobQueue::new(config).expect("Failed to create queue")
}

fn message_body() -> String {
    let job = Job::queued("test_user", JobTarget::session("s1"), RenderOptions::default());
    JobMessage::for_job(&job).to_json().expect("serialize message")
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_send_receive_ack() {
    let queue = test_queue("ack", Duration::from_secs(30), 3);
    queue.init().await.expect("Failed to initialize queue");

    let body = message_body();
    let id = queue.send(&body).await.expect("Failed to send");

    let delivery = queue
        .receive(Duration::from_secs(1))
        .await
        .expect("Failed to receive")
        .expect("message expected");
    assert_eq!(delivery.id, id);
    assert_eq!(delivery.body, body);
    assert_eq!(delivery.receive_count, 1);

    queue.ack(&delivery).await.expect("Failed to ack");
    assert!(queue
        .receive(Duration::from_millis(100))
        .await
        .expect("Failed to receive")
        .is_none());
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_redelivery_then_dead_letter() {
    let queue = test_queue("dlq", Duration::from_millis(100), 2);
    queue.init().await.expect("Failed to initialize queue");

    let body = message_body();
    queue.send(&body).await.expect("Failed to send");

    let first = queue.receive(Duration::from_secs(1)).await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    let second = queue.receive(Duration::from_secs(1)).await.unwrap().unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.receive_count, 2);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(queue.receive(Duration::from_millis(100)).await.unwrap().is_none());

    let dead = queue.dead_letters(10).await.expect("Failed to list dead letters");
    let entry = dead.iter().find(|d| d.body == body).expect("dead letter present");
    assert_eq!(entry.receive_count, 2);
    queue
        .remove_dead_letter(&entry.id)
        .await
        .expect("Failed to remove dead letter");
}
