use domain::{DeviceInfo, Tag};
use dsdk_registry::{MetadataRegistry, RegistryError, RegistrySnapshot};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn generation(n: usize) -> RegistrySnapshot {
    let tag_count = n % 3 + 1;
    let devices = ["dev-1", "dev-2", "dev-3"].into_iter().map(|device_id| {
        let tags = (0..tag_count)
            .map(|i| Tag::new(format!("tag-{}", i)))
            .collect();
        DeviceInfo::new(device_id, "meter", format!("gen-{}", n), tags).expect("device")
    });
    RegistrySnapshot::from_devices(devices).expect("snapshot")
}

fn generation_of(info: &DeviceInfo) -> usize {
    info.instance_id
        .strip_prefix("gen-")
        .and_then(|n| n.parse().ok())
        .expect("generation")
}

#[test]
fn replace_rejects_empty_snapshot_and_keeps_state() {
    let registry = MetadataRegistry::new();
    registry.replace(generation(0)).expect("install");
    let err = registry
        .replace(RegistrySnapshot::default())
        .expect_err("empty");
    assert_eq!(err, RegistryError::EmptySnapshot);
    assert_eq!(registry.device_count(), 3);
    assert!(registry.lookup("dev-1").is_ok());
}

#[test]
fn lookup_by_id_requires_unambiguous_device() {
    let registry = MetadataRegistry::new();
    let snapshot = RegistrySnapshot::from_devices(vec![
        DeviceInfo::new("dev-1", "meter", "i", vec![Tag::new("ua")]).expect("device"),
        DeviceInfo::new("dev-1", "breaker", "i", vec![Tag::new("state")]).expect("device"),
        DeviceInfo::new("dev-2", "meter", "i", vec![Tag::new("ua")]).expect("device"),
    ])
    .expect("snapshot");
    registry.replace(snapshot).expect("install");

    assert!(matches!(
        registry.lookup("dev-1"),
        Err(RegistryError::AmbiguousDevice { .. })
    ));
    let breaker = registry.lookup_in("breaker", "dev-1").expect("breaker");
    assert!(breaker.tag("state").is_some());
    assert_eq!(registry.lookup("dev-2").expect("dev-2").table_id, "meter");
    assert_eq!(
        registry.lookup("dev-9"),
        Err(RegistryError::DeviceNotFound("dev-9".to_string()))
    );
    assert!(matches!(
        registry.lookup_in("breaker", "dev-2"),
        Err(RegistryError::DeviceNotInTable { .. })
    ));
    let meters: Vec<String> = registry
        .devices_in_table("meter")
        .iter()
        .map(|d| d.device_id.clone())
        .collect();
    assert_eq!(meters, vec!["dev-1".to_string(), "dev-2".to_string()]);
}

#[test]
fn concurrent_readers_never_see_a_mixed_snapshot() {
    let registry = Arc::new(MetadataRegistry::new());
    registry.replace(generation(0)).expect("install");
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let registry = registry.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                let mut observed = 0usize;
                loop {
                    let snapshot = registry.snapshot();
                    let first = snapshot.lookup("dev-1").expect("dev-1");
                    let gen_first = generation_of(&first);
                    for device_id in ["dev-2", "dev-3"] {
                        let other = snapshot.lookup(device_id).expect("device");
                        assert_eq!(generation_of(&other), gen_first);
                    }
                    assert_eq!(first.tag_count(), gen_first % 3 + 1);

                    let single = registry.lookup("dev-2").expect("dev-2");
                    assert_eq!(single.tag_count(), generation_of(&single) % 3 + 1);
                    observed += 1;
                    if done.load(Ordering::Relaxed) {
                        break;
                    }
                }
                observed
            })
        })
        .collect();

    for n in 1..500 {
        registry.replace(generation(n)).expect("install");
    }
    done.store(true, Ordering::Relaxed);
    for reader in readers {
        assert!(reader.join().expect("reader") > 0);
    }
    assert_eq!(generation_of(&registry.lookup("dev-1").expect("dev-1")), 499);
}
