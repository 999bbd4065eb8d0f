use domain::{Field, FieldValue, LogLevel, Point, Tag, Warning, WarningRecovery};
use dsdk_sender::{
    BrokerSender, DataSender, MemoryClient, SenderError, SenderOptions, SenderState,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

fn options() -> SenderOptions {
    SenderOptions {
        reconnect_interval: Duration::from_millis(20),
        max_reconnect_attempts: None,
        publish_retries: 2,
        retry_backoff: Duration::ZERO,
    }
}

fn sender(options: SenderOptions) -> BrokerSender<MemoryClient> {
    BrokerSender::new(MemoryClient::new(), "p1", options)
}

fn point() -> Point {
    Point {
        device_id: "dev-1".to_string(),
        child_device_id: None,
        table_id: "meter".to_string(),
        time_ms: 1_700_000_000_000,
        fields: vec![Field {
            tag: Arc::new(Tag::new("ua")),
            value: FieldValue::Float(12.5),
        }],
        field_types: HashMap::new(),
    }
}

async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[tokio::test]
async fn start_is_idempotent_and_stop_returns_to_stopped() {
    let sender = sender(options());
    assert_eq!(sender.state(), SenderState::Stopped);
    assert!(!sender.is_running());

    sender.start().await.expect("start");
    sender.start().await.expect("start again");
    assert_eq!(sender.state(), SenderState::Running);
    assert!(sender.is_running());
    assert_eq!(sender.client().connect_count(), 1);

    sender.stop().await.expect("stop");
    assert_eq!(sender.state(), SenderState::Stopped);
    assert!(!sender.is_running());
}

#[tokio::test]
async fn write_log_while_not_running_raises_typed_error() {
    let sender = sender(options());
    let err = sender
        .write_log("meter", "dev-1", LogLevel::Warn, "door open")
        .await
        .expect_err("not running");
    assert_eq!(err.table_id, "meter");
    assert_eq!(err.device_id, "dev-1");
    assert_eq!(err.level, LogLevel::Warn);
    assert_eq!(err.message, "door open");
    assert!(sender.client().published().is_empty());
}

#[tokio::test]
async fn write_point_publishes_on_data_routing_key() {
    let sender = sender(options());
    sender.start().await.expect("start");
    sender.write_point(&point()).await.expect("write");

    let published = sender.client().published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].routing_key, "data.p1.meter.dev-1");
    assert_eq!(published[0].key, "dev-1");
    let body: serde_json::Value = serde_json::from_slice(&published[0].payload).expect("json");
    assert_eq!(body["deviceId"], "dev-1");
    assert_eq!(body["table"], "meter");
    assert_eq!(body["values"]["ua"], 12.5);
}

#[tokio::test]
async fn write_point_before_start_is_not_connected() {
    let sender = sender(options());
    assert_eq!(
        sender.write_point(&point()).await,
        Err(SenderError::NotConnected)
    );
}

#[tokio::test]
async fn logs_warnings_and_recoveries_use_their_own_keys() {
    let sender = sender(options());
    sender.start().await.expect("start");
    sender
        .write_log("meter", "dev-1", LogLevel::Info, "run ok")
        .await
        .expect("log");
    let warning = Warning {
        warning_id: "w-1".to_string(),
        level: 2,
        type_id: "over_voltage".to_string(),
        sub_type_id: None,
        description: "ua above limit".to_string(),
        fields: BTreeMap::from([("ua".to_string(), FieldValue::Float(260.0))]),
        table_id: "meter".to_string(),
        device_id: "dev-1".to_string(),
        child_device_id: None,
        rule_id: "r-1".to_string(),
        time_ms: 1,
    };
    sender.send_warning(&warning).await.expect("warning");
    let recovery = WarningRecovery {
        warning_ids: vec!["w-1".to_string()],
        table_id: "meter".to_string(),
        device_id: "dev-1".to_string(),
        child_device_id: None,
        rule_id: "r-1".to_string(),
        values: BTreeMap::new(),
        recovered_at_ms: 2,
    };
    sender.recover_warning(&recovery).await.expect("recovery");

    let keys: Vec<String> = sender
        .client()
        .published()
        .into_iter()
        .map(|message| message.routing_key)
        .collect();
    assert_eq!(
        keys,
        vec![
            "logs.p1.info.meter.dev-1".to_string(),
            "warning.p1.meter.dev-1".to_string(),
            "recovery.p1.meter.dev-1".to_string(),
        ]
    );
}

#[tokio::test]
async fn publish_retries_are_bounded() {
    let sender = sender(options());
    sender.start().await.expect("start");

    sender.client().fail_next_publishes(2);
    sender.write_point(&point()).await.expect("third attempt succeeds");
    assert_eq!(sender.client().published().len(), 1);

    sender.client().fail_next_publishes(3);
    let err = sender.write_point(&point()).await.expect_err("retries exhausted");
    assert!(matches!(err, SenderError::Publish(_)));
    assert_eq!(sender.client().published().len(), 1);
}

#[tokio::test]
async fn write_points_keeps_order() {
    let sender = sender(options());
    sender.start().await.expect("start");
    let mut second = point();
    second.device_id = "dev-2".to_string();
    sender
        .write_points(&[point(), second])
        .await
        .expect("batch");
    let keys: Vec<String> = sender
        .client()
        .published()
        .into_iter()
        .map(|message| message.routing_key)
        .collect();
    assert_eq!(keys, vec!["data.p1.meter.dev-1", "data.p1.meter.dev-2"]);
}

#[tokio::test]
async fn supervisor_reconnects_after_connection_loss() {
    let sender = sender(options());
    sender.start().await.expect("start");

    sender.client().drop_connection();
    assert!(!sender.is_running());
    assert_eq!(sender.state(), SenderState::Running);
    assert!(
        sender
            .write_log("meter", "dev-1", LogLevel::Info, "while down")
            .await
            .is_err()
    );

    assert!(wait_until(|| sender.is_running()).await, "reconnected");
    assert_eq!(sender.client().connect_count(), 2);
    sender.stop().await.expect("stop");
}

#[tokio::test]
async fn repeated_reconnect_failures_stop_the_sender() {
    let sender = sender(SenderOptions {
        max_reconnect_attempts: Some(2),
        ..options()
    });
    sender.start().await.expect("start");
    let mut state = sender.subscribe_state();

    sender.client().refuse_connect(true);
    sender.client().drop_connection();
    tokio::time::timeout(
        Duration::from_secs(2),
        state.wait_for(|state| *state == SenderState::Stopped),
    )
    .await
    .expect("fatal loss within timeout")
    .expect("state channel open");
    assert!(!sender.is_running());

    sender.client().refuse_connect(false);
    sender.start().await.expect("restart");
    assert!(sender.is_running());
    sender.stop().await.expect("stop");
}

#[tokio::test]
async fn failed_start_leaves_sender_stopped() {
    let sender = sender(options());
    sender.client().refuse_connect(true);
    let err = sender.start().await.expect_err("refused");
    assert!(matches!(err, SenderError::Connect(_)));
    assert_eq!(sender.state(), SenderState::Stopped);
}
