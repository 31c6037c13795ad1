//! Drives whole sessions over the mock backend.

use std::{fs, path::PathBuf};

use openni_rust::{
    CalibrationState, CalibrationStatus, Error, Position, Session, Settings, TrackingEvent,
    error::STATUS_NODE_NOT_FOUND,
    mock::{Call, MockBackend, MockFrame},
};

/// Working directory with `SamplesConfig.xml` in it.
fn workdir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("openni-rust-session-{name}-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("SamplesConfig.xml"), "<OpenNI/>").unwrap();
    dir
}

fn skeleton_session(name: &str, backend: MockBackend) -> Session<MockBackend> {
    let mut session = Session::new(backend);
    session
        .init_skeleton(&Settings::with_base_dir(workdir(name)))
        .unwrap();
    session.backend_mut().clear_calls();
    session
}

fn new_users(users: impl IntoIterator<Item = u32>) -> Vec<TrackingEvent> {
    users.into_iter().map(TrackingEvent::NewUser).collect()
}

fn complete(user: u32, status: CalibrationStatus) -> TrackingEvent {
    TrackingEvent::CalibrationComplete { user, status }
}

#[test]
fn new_users_wait_for_the_pose_when_required() {
    let mut session = skeleton_session("pose", MockBackend::new().with_pose("Psi"));
    session.backend_mut().push_update(new_users([1, 2, 3]));

    session.skeleton_head_position().unwrap();

    let expected: Vec<Call> = [1, 2, 3]
        .into_iter()
        .map(|user| Call::StartPoseDetection {
            pose: "Psi".to_string(),
            user,
        })
        .collect();
    assert_eq!(session.backend().commands(), expected);
}

#[test]
fn new_users_are_calibrated_directly_without_pose() {
    let mut session = skeleton_session("no-pose", MockBackend::new());
    session.backend_mut().push_update(new_users([4, 5]));

    session.skeleton_head_position().unwrap();

    assert_eq!(
        session.backend().commands(),
        vec![
            Call::RequestCalibration { user: 4, force: true },
            Call::RequestCalibration { user: 5, force: true },
        ]
    );
}

#[test]
fn full_calibration_with_pose() {
    let mut session = skeleton_session("full", MockBackend::new().with_pose("Psi"));
    let backend = session.backend_mut();
    backend.set_joint_position(1, Position::new(-12.5, 80.0, 2100.0));
    backend.push_update(new_users([1]));
    backend.push_update(vec![
        TrackingEvent::PoseDetected {
            user: 1,
            pose: "Psi".to_string(),
        },
        TrackingEvent::CalibrationStarted(1),
    ]);
    backend.push_update(vec![complete(1, CalibrationStatus::Ok)]);

    for _ in 0..3 {
        session.skeleton_head_position().unwrap();
    }

    assert_eq!(
        session.backend().commands(),
        vec![
            Call::StartPoseDetection {
                pose: "Psi".to_string(),
                user: 1
            },
            Call::StopPoseDetection(1),
            Call::RequestCalibration { user: 1, force: true },
            Call::StartTracking(1),
        ]
    );
    assert_eq!(
        session.skeleton().user_state(1),
        Some(CalibrationState::Tracking)
    );

    let joints = session.skeleton_head_position().unwrap();
    assert_eq!(joints.len(), 1);
    assert!(joints[0].tracked);
    assert_eq!(joints[0].position, Position::new(-12.5, 80.0, 2100.0));
}

#[test]
fn failed_calibration_is_retried_once() {
    for (name, backend, retry) in [
        (
            "retry-pose",
            MockBackend::new().with_pose("Psi"),
            Call::StartPoseDetection {
                pose: "Psi".to_string(),
                user: 9,
            },
        ),
        (
            "retry-direct",
            MockBackend::new(),
            Call::RequestCalibration { user: 9, force: true },
        ),
    ] {
        let mut session = skeleton_session(name, backend);
        session.backend_mut().push_update(new_users([9]));
        session.skeleton_head_position().unwrap();
        session.backend_mut().clear_calls();

        session
            .backend_mut()
            .push_update(vec![complete(9, CalibrationStatus::Torso)]);
        session.skeleton_head_position().unwrap();

        assert_eq!(session.backend().commands(), vec![retry]);
    }
}

#[test]
fn manual_abort_stops_calibration() {
    let mut session = skeleton_session("abort", MockBackend::new());
    session.backend_mut().push_update(new_users([2]));
    session.skeleton_head_position().unwrap();
    session.backend_mut().clear_calls();

    session
        .backend_mut()
        .push_update(vec![complete(2, CalibrationStatus::ManualAbort)]);
    let joints = session.skeleton_head_position().unwrap();

    assert!(session.backend().commands().is_empty());
    assert_eq!(session.skeleton().user_state(2), Some(CalibrationState::Failed));
    assert!(!joints[0].tracked);
}

#[test]
fn lost_users_are_forgotten() {
    let mut session = skeleton_session("lost", MockBackend::new());
    session.backend_mut().push_update(new_users([3]));
    session.backend_mut().push_update(vec![TrackingEvent::LostUser(3)]);

    session.skeleton_head_position().unwrap();
    let joints = session.skeleton_head_position().unwrap();

    assert!(joints.is_empty());
    assert_eq!(session.skeleton().user_state(3), None);
}

#[test]
fn depth_resolution_and_point() {
    let mut backend = MockBackend::new();
    backend.push_frame(MockFrame::from_fn(10, 640, 480, |_, _| 0));
    backend.push_frame(MockFrame::from_fn(11, 640, 480, |x, y| (x + y) as u16));
    backend.push_frame(MockFrame::from_fn(12, 640, 480, |x, y| (x * y % 4096) as u16));

    let mut session = Session::new(backend);
    session.init_depth().unwrap();

    assert_eq!(session.depth_resolution().unwrap().to_array(), [640, 480]);

    let reading = session.depth_point(17, 401).unwrap();
    assert_eq!(reading.depth_mm, 418);
    assert_eq!(reading.frame_id, 11);

    let reading = session.depth_middle().unwrap();
    assert_eq!(reading.depth_mm, (320 * 240 % 4096) as u16);
    assert_eq!(session.depth().last_frame_id(), Some(12));
}

#[test]
fn repeated_init_depth_releases_previous_handles() {
    let mut session = Session::new(MockBackend::new());

    session.init_depth().unwrap();
    assert_eq!(session.backend().live_handles(), 2);

    session.init_depth().unwrap();
    assert_eq!(session.backend().live_handles(), 2);
    assert_eq!(session.backend().released_handles(), 2);

    session.depth_close();
    session.depth_close();
    assert_eq!(session.backend().live_handles(), 0);
    assert_eq!(session.backend().released_handles(), 4);
}

#[test]
fn repeated_init_skeleton_releases_previous_handles() {
    let settings = Settings::with_base_dir(workdir("repeat"));
    let mut session = Session::new(MockBackend::new());

    session.init_skeleton(&settings).unwrap();
    session.init_skeleton(&settings).unwrap();
    assert_eq!(session.backend().live_handles(), 3);
    assert_eq!(session.backend().released_handles(), 3);
}

#[test]
fn only_one_pipeline_is_active() {
    let settings = Settings::with_base_dir(workdir("exclusive"));
    let mut session = Session::new(MockBackend::new());

    session.init_depth().unwrap();
    session.init_skeleton(&settings).unwrap();
    assert!(!session.depth().is_open());
    assert!(session.skeleton().is_open());
    assert!(matches!(
        session.depth_middle(),
        Err(Error::NotInitialized("depth"))
    ));

    session.init_depth().unwrap();
    assert!(!session.skeleton().is_open());
    assert_eq!(session.backend().live_handles(), 2);
}

#[test]
fn parent_config_is_preferred() {
    let root = std::env::temp_dir().join(format!("openni-rust-session-prefer-{}", std::process::id()));
    fs::create_dir_all(root.join("Config")).unwrap();
    fs::create_dir_all(root.join("bin")).unwrap();
    fs::write(root.join("Config/SamplesConfig.xml"), "<OpenNI/>").unwrap();
    fs::write(root.join("bin/SamplesConfig.xml"), "<OpenNI/>").unwrap();

    let mut session = Session::new(MockBackend::new());
    session
        .init_skeleton(&Settings::with_base_dir(root.join("bin")))
        .unwrap();

    match &session.backend().calls()[0] {
        Call::InitContextFromFile(path) => {
            assert_eq!(path, &root.join("bin").join("../Config/SamplesConfig.xml"))
        }
        call => panic!("unexpected first call {call:?}"),
    }
}

#[test]
fn missing_config_reports_node_not_found() {
    let root = std::env::temp_dir().join(format!("openni-rust-session-missing-{}", std::process::id()));
    fs::create_dir_all(root.join("bin")).unwrap();

    let mut session = Session::new(MockBackend::new());
    let err = session
        .init_skeleton(&Settings::with_base_dir(root.join("bin")))
        .unwrap_err();

    assert_eq!(err.status(), STATUS_NODE_NOT_FOUND);
    assert!(session.backend().calls().is_empty());
}
