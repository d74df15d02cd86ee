use super::*;

#[test]
fn defaults_match_the_reference_scheduler() {
    let o = SchedulerOpts::default();
    assert_eq!(o.path_iterations_per_burst, 16);
    assert_eq!(o.initial_num_samples, 1);
    assert_eq!(o.rolling_alpha, 0.1);
    assert_eq!(o.max_time_multiplier, 10);
    assert_eq!(o.cancel_grace_factor, 0.0);
    assert!(o.validate().is_ok());
}

#[test]
fn partial_json_fills_defaults() {
    let o = SchedulerOpts::from_json_str(
        r#"{"path_iterations_per_burst": 4, "element_sizes": {"ray": 64}}"#,
    )
    .unwrap();
    assert_eq!(o.path_iterations_per_burst, 4);
    assert_eq!(o.element_sizes.ray, 64);
    assert_eq!(o.element_sizes.intersection, ElementSizes::default().intersection);
    assert_eq!(o.max_time_multiplier, 10);
}

#[test]
fn invalid_values_are_config_errors() {
    for bad in [
        r#"{"path_iterations_per_burst": 0}"#,
        r#"{"initial_num_samples": 0}"#,
        r#"{"rolling_alpha": 0.0}"#,
        r#"{"rolling_alpha": 1.5}"#,
        r#"{"max_time_multiplier": 0}"#,
        r#"{"cancel_grace_factor": -1.0}"#,
        r#"{"work_pool_size": 0}"#,
        r#"{"element_sizes": {"ray": 0}}"#,
        "not json",
    ] {
        let err = SchedulerOpts::from_json_str(bad).unwrap_err();
        assert!(
            err.to_string().contains("configuration error:"),
            "{bad}: {err}"
        );
    }
}

#[test]
fn schema_carries_sizes_and_debug_flag() {
    let o = SchedulerOpts {
        debug_data: true,
        ..SchedulerOpts::default()
    };
    let s = o.schema();
    assert!(s.debug_data);
    assert_eq!(s.sizes, ElementSizes::default());
}

#[test]
fn missing_file_is_reported_with_path() {
    let err = SchedulerOpts::from_path(Path::new("/nonexistent/opts.json")).unwrap_err();
    assert!(err.to_string().contains("/nonexistent/opts.json"));
}
