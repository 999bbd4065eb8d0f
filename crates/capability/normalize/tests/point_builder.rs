use domain::{DeviceInfo, FieldType, FieldValue, Tag, TagRange, ValueMapping};
use dsdk_normalize::{BuildError, HandlerChain, PointBuilder, PointRequest};
use dsdk_registry::{MetadataRegistry, RegistryError, RegistrySnapshot};
use std::sync::Arc;

fn builder() -> PointBuilder {
    let meter_tags = vec![
        Tag::new("ua")
            .with_data_type(FieldType::Float)
            .with_mapping(ValueMapping::new(-5000.0, 5000.0, -50.0, 50.0)),
        Tag::new("state").with_data_type(FieldType::Int),
        Tag::new("temp").with_range(TagRange::new(0.0, 100.0, "discard")),
        Tag::new("bad").with_range(TagRange::new(0.0, 1.0, "clip")),
    ];
    let snapshot = RegistrySnapshot::from_devices(vec![
        DeviceInfo::new("dev-1", "meter", "inst", meter_tags).expect("device"),
        DeviceInfo::new("gw-1", "meter", "inst", vec![Tag::new("ua")]).expect("device"),
        DeviceInfo::new("gw-1", "gateway", "inst", vec![Tag::new("online")]).expect("device"),
    ])
    .expect("snapshot");
    let registry = Arc::new(MetadataRegistry::new());
    registry.replace(snapshot).expect("install");
    PointBuilder::new(registry, Arc::new(HandlerChain::standard()))
}

#[test]
fn build_resolves_table_and_keeps_supplied_order() {
    let point = builder()
        .build(
            PointRequest::new("dev-1")
                .at(1_700_000_000_000)
                .value("state", 1i64)
                .value("ua", 1000i64),
        )
        .expect("build")
        .expect("point");
    assert_eq!(point.table_id, "meter");
    assert_eq!(point.time_ms, 1_700_000_000_000);
    let order: Vec<&str> = point.fields.iter().map(|f| f.tag_id()).collect();
    assert_eq!(order, vec!["state", "ua"]);
    assert_eq!(point.field("ua"), Some(&FieldValue::Float(10.0)));
    assert_eq!(point.field_types.get("state"), Some(&FieldType::Int));
    assert_eq!(point.field_types.get("ua"), Some(&FieldType::Float));
}

#[test]
fn discarded_fields_are_omitted() {
    let point = builder()
        .build(
            PointRequest::new("dev-1")
                .value("temp", 180.0)
                .value("state", 0i64),
        )
        .expect("build")
        .expect("point");
    assert_eq!(point.fields.len(), 1);
    assert!(point.field("temp").is_none());
}

#[test]
fn all_fields_discarded_yields_nothing_to_publish() {
    let out = builder()
        .build(PointRequest::new("dev-1").value("temp", -1.0))
        .expect("build");
    assert!(out.is_none());
}

#[test]
fn zero_matching_tags_is_an_error() {
    let err = builder()
        .build(PointRequest::new("dev-1").value("nope", 1i64))
        .expect_err("no tags");
    assert_eq!(
        err,
        BuildError::NoMatchingTags {
            table_id: "meter".to_string(),
            device_id: "dev-1".to_string(),
        }
    );
}

#[test]
fn unknown_device_is_a_resolution_error() {
    let err = builder()
        .build(PointRequest::new("dev-404").value("ua", 1i64))
        .expect_err("unknown");
    assert_eq!(
        err,
        BuildError::Registry(RegistryError::DeviceNotFound("dev-404".to_string()))
    );
}

#[test]
fn ambiguous_device_needs_table() {
    let builder = builder();
    let err = builder
        .build(PointRequest::new("gw-1").value("online", true))
        .expect_err("ambiguous");
    assert!(matches!(
        err,
        BuildError::Registry(RegistryError::AmbiguousDevice { .. })
    ));
    let point = builder
        .build(
            PointRequest::new("gw-1")
                .in_table("gateway")
                .child("sub-7")
                .value("online", true),
        )
        .expect("build")
        .expect("point");
    assert_eq!(point.table_id, "gateway");
    assert_eq!(point.child_device_id.as_deref(), Some("sub-7"));
    assert_eq!(point.field("online"), Some(&FieldValue::Bool(true)));
}

#[test]
fn handler_config_error_propagates() {
    let err = builder()
        .build(PointRequest::new("dev-1").value("bad", 0.5))
        .expect_err("config");
    assert!(matches!(err, BuildError::Handler(_)));
}

#[test]
fn zero_time_means_now() {
    let point = builder()
        .build(PointRequest::new("dev-1").value("state", 1i64))
        .expect("build")
        .expect("point");
    assert!(point.time_ms > 1_600_000_000_000);
}

#[test]
fn non_finite_value_without_handlers_never_reaches_point() {
    let out = builder()
        .build(
            PointRequest::new("dev-1")
                .value("state", f64::NAN)
                .value("ua", 0i64),
        )
        .expect("build")
        .expect("point");
    assert!(out.field("state").is_none());
    assert_eq!(out.field("ua"), Some(&FieldValue::Float(0.0)));
}

#[test]
fn infinite_readings_never_become_full_scale_values() {
    let builder = builder();
    for raw in [
        FieldValue::Float(f64::INFINITY),
        FieldValue::Float(f64::NEG_INFINITY),
        FieldValue::from("inf"),
    ] {
        let point = builder
            .build(
                PointRequest::new("dev-1")
                    .value("ua", raw.clone())
                    .value("state", 1i64),
            )
            .expect("build")
            .expect("point");
        assert!(point.field("ua").is_none(), "raw {:?} leaked through", raw);
        assert_eq!(point.fields.len(), 1);
    }

    let out = builder
        .build(PointRequest::new("dev-1").value("ua", f64::INFINITY))
        .expect("build");
    assert!(out.is_none());
}
