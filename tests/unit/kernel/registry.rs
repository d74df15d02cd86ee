use super::*;
use crate::device::host::HostDevice;
use crate::device::synthetic::SyntheticPipeline;

fn full_device() -> HostDevice {
    let mut device = HostDevice::new("registry");
    SyntheticPipeline::new(1).install(&mut device);
    device
}

#[test]
fn resolves_every_stage_in_order() {
    let mut device = full_device();
    let registry = StageRegistry::load(&mut device, &RequestedFeatures::default()).unwrap();
    for stage in SplitStage::ALL {
        assert_eq!(registry.handle(stage).name(), stage.name());
    }
    assert_eq!(registry.max_closure(), 64);
}

#[test]
fn missing_stage_fails_closed() {
    let mut device = full_device();
    device.remove_program("shadow_blocked");
    let err = StageRegistry::load(&mut device, &RequestedFeatures::default()).unwrap_err();
    assert!(matches!(err, SplitError::Unsupported(_)));
    assert!(
        err.to_string()
            .contains("failed to load kernel_shadow_blocked")
    );
}

#[test]
fn unsupported_features_fail_on_first_stage() {
    let mut device = full_device().with_supported_features(RequestedFeatures {
        use_volume: false,
        ..RequestedFeatures::all()
    });
    let features = RequestedFeatures {
        use_volume: true,
        ..RequestedFeatures::default()
    };
    let err = StageRegistry::load(&mut device, &features).unwrap_err();
    assert!(err.to_string().contains("kernel_path_init"));
}

#[test]
fn registry_keeps_requested_features() {
    let mut device = full_device();
    let features = RequestedFeatures {
        max_closure: 8,
        use_hair: true,
        ..RequestedFeatures::default()
    };
    let registry = StageRegistry::load(&mut device, &features).unwrap();
    assert_eq!(registry.features(), &features);
    assert_eq!(registry.max_closure(), 8);
}
