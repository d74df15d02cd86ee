use super::*;

#[test]
fn build_options_list_enabled_paths_only() {
    let f = RequestedFeatures {
        max_closure: 8,
        use_volume: true,
        use_hair: true,
        ..RequestedFeatures::default()
    };
    let opts = f.build_options();
    assert!(opts.starts_with("-D__MAX_CLOSURE__=8"));
    assert!(opts.contains("-D__VOLUME__"));
    assert!(opts.contains("-D__HAIR__"));
    assert!(!opts.contains("__SUBSURFACE__"));
}

#[test]
fn subset_respects_flags_and_closure_bound() {
    let all = RequestedFeatures {
        max_closure: 64,
        use_volume: true,
        use_subsurface: true,
        ..RequestedFeatures::default()
    };
    let want = RequestedFeatures {
        max_closure: 16,
        use_volume: true,
        ..RequestedFeatures::default()
    };
    assert!(want.is_subset_of(&all));
    assert!(!all.is_subset_of(&want));

    let too_many = RequestedFeatures {
        max_closure: 65,
        ..RequestedFeatures::default()
    };
    assert!(!too_many.is_subset_of(&all));
}

#[test]
fn json_uses_defaults_for_missing_fields() {
    let f = RequestedFeatures::from_json_str(r#"{"use_volume": true}"#).unwrap();
    assert!(f.use_volume);
    assert_eq!(f.max_closure, RequestedFeatures::default().max_closure);
    assert!(RequestedFeatures::from_json_str("{").is_err());
}
