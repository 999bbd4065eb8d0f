use dsdk_telemetry::{
    TelemetryMetrics, init_tracing, metrics, record_command_rejected, record_field_discarded,
    record_point_written,
};

#[test]
fn fresh_metrics_start_at_zero() {
    let metrics = TelemetryMetrics::new();
    assert_eq!(metrics.snapshot(), Default::default());
}

#[test]
fn record_functions_increment_global_counters() {
    let before = metrics().snapshot();
    record_point_written();
    record_field_discarded();
    record_field_discarded();
    record_command_rejected();
    let after = metrics().snapshot();
    // 其他测试可能并发累加，只断言下界
    assert!(after.points_written >= before.points_written + 1);
    assert!(after.fields_discarded >= before.fields_discarded + 2);
    assert!(after.commands_rejected >= before.commands_rejected + 1);
}

#[test]
fn init_tracing_twice_is_harmless() {
    init_tracing();
    init_tracing();
}
