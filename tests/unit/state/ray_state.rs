use super::*;

#[test]
fn all_inactive_converges() {
    let snap = StatusSnapshot::new(4096);
    assert_eq!(snap.convergence().unwrap(), Convergence::Converged);
    // Repeated checks on the same snapshot give the same answer.
    assert_eq!(snap.convergence().unwrap(), Convergence::Converged);
}

#[test]
fn single_active_lane_keeps_batch_open() {
    let mut snap = StatusSnapshot::new(16);
    snap.as_mut_bytes()[9] = RayState::Active.as_byte();
    assert_eq!(
        snap.convergence().unwrap(),
        Convergence::Pending { first_busy: 9 }
    );
}

#[test]
fn intermediate_states_and_flags_are_not_inactive() {
    let mut snap = StatusSnapshot::new(3);
    snap.as_mut_bytes()[0] = RayState::HitBackground.as_byte();
    assert!(matches!(
        snap.convergence().unwrap(),
        Convergence::Pending { first_busy: 0 }
    ));

    let mut snap = StatusSnapshot::new(3);
    let mut b = RayState::Inactive.as_byte();
    add_flag(&mut b, RAY_SHADOW_RAY_CAST_DL);
    snap.as_mut_bytes()[2] = b;
    assert!(matches!(
        snap.convergence().unwrap(),
        Convergence::Pending { first_busy: 2 }
    ));
}

#[test]
fn invalid_lane_is_a_device_error() {
    let mut snap = StatusSnapshot::new(8);
    snap.as_mut_bytes()[5] = RayState::Invalid.as_byte();
    let err = snap.convergence().unwrap_err();
    assert!(err.to_string().contains("invalid ray state"));
}

#[test]
fn flags_round_trip_on_a_byte() {
    let mut b = RayState::Active.as_byte();
    add_flag(&mut b, RAY_SHADOW_RAY_CAST_AO);
    assert!(has_flag(b, RAY_SHADOW_RAY_CAST_AO));
    assert!(!has_flag(b, RAY_SHADOW_RAY_CAST_DL));
    assert_eq!(RayState::from_byte(b), Some(RayState::Active));
    remove_flag(&mut b, RAY_SHADOW_RAY_CAST_AO);
    assert!(is_state(b, RayState::Active));
}

#[test]
fn unknown_nibbles_do_not_decode() {
    assert_eq!(RayState::from_byte(0x0E), None);
    assert_eq!(RayState::from_byte(0x07), Some(RayState::Invalid));
}

#[test]
fn count_reports_exact_matches() {
    let mut snap = StatusSnapshot::new(5);
    snap.as_mut_bytes()[0] = RayState::Active.as_byte();
    snap.as_mut_bytes()[1] = RayState::Active.as_byte();
    assert_eq!(snap.count(RayState::Active), 2);
    assert_eq!(snap.count(RayState::Inactive), 3);
}
