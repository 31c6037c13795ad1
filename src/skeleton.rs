//! Skeleton pipeline: a context created from the XML configuration, a user generator with skeleton tracking, and the calibration of every detected user.

use log::{error, info, warn};

use crate::{
    calibration::{CalibrationState, Command, PosePolicy, UserId, UserTracker},
    config::{locate_config, Settings},
    error::{check, Error, Result, SdkResult},
    frame::{Position, UserJoint},
    sdk::{Backend, Capability, ConfigLoadError, ScriptContext},
};

/// Handles of the skeleton pipeline and the calibration state of its users.
pub struct SkeletonPipeline<B: Backend> {
    context: Option<B::Context>,
    script: Option<B::Node>,
    user_generator: Option<B::Node>,
    tracker: UserTracker,
    settings: Settings,
}

impl<B: Backend> Default for SkeletonPipeline<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> SkeletonPipeline<B> {
    pub fn new() -> Self {
        Self {
            context: None,
            script: None,
            user_generator: None,
            tracker: UserTracker::default(),
            settings: Settings::default(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.user_generator.is_some()
    }

    /// Whether calibration waits for a pose, as reported by the SDK during `init()`.
    pub fn pose_policy(&self) -> &PosePolicy {
        self.tracker.policy()
    }

    /// Calibration state of `user`, `None` for unknown or lost users.
    pub fn user_state(&self, user: UserId) -> Option<CalibrationState> {
        self.tracker.state(user)
    }

    /**
    Releases anything opened before and sets up skeleton tracking:

    1. locates the XML configuration (`settings.config_candidates`, first existing file wins) and creates the context from it,
    2. uses the user generator declared in the file or creates one,
    3. registers the user, calibration and (if the SDK requires a pose for calibration) pose callbacks,
    4. selects `settings.profile` and starts generating.

    On failure the handles created so far stay with the pipeline until `close()`.
    */
    pub fn init(&mut self, backend: &mut B, settings: &Settings) -> Result<()> {
        self.close(backend);
        self.settings = settings.clone();

        let path = locate_config(&settings.config_candidates).inspect_err(|err| {
            error!("{err}. Aborting.");
        })?;

        let ScriptContext { context, script } = match backend.init_context_from_file(&path) {
            Ok(script_context) => script_context,
            Err(ConfigLoadError::Nodes { status, detail }) => {
                error!("{detail}");
                return Err(Error::ConfigLoad { status, detail });
            }
            Err(ConfigLoadError::Sdk(source)) => return check(Err(source), "Open"),
        };
        self.context = Some(context);
        self.script = Some(script);

        let user_generator = match backend.find_existing_user_generator(context) {
            Ok(node) => node,
            Err(_) => check(
                backend.create_user_generator(context),
                "Find user generator",
            )?,
        };
        self.user_generator = Some(user_generator);

        if !backend.is_capability_supported(user_generator, Capability::Skeleton) {
            let err = Error::Unsupported("supplied user generator doesn't support skeleton");
            error!("{err}");
            return Err(err);
        }

        check(
            backend.register_user_callbacks(user_generator),
            "Register to user callbacks",
        )?;
        check(
            backend.register_calibration_start(user_generator),
            "Register to calibration start",
        )?;
        check(
            backend.register_calibration_complete(user_generator),
            "Register to calibration complete",
        )?;

        let policy = if backend.need_pose_for_calibration(user_generator) {
            if !backend.is_capability_supported(user_generator, Capability::PoseDetection) {
                let err = Error::Unsupported("pose required, but not supported");
                error!("{err}");
                return Err(err);
            }
            check(
                backend.register_pose_detected(user_generator),
                "Register to Pose Detected",
            )?;
            let pose = check(
                backend.calibration_pose(user_generator),
                "Get calibration pose",
            )?;
            info!("calibration requires pose {pose}");
            PosePolicy::Required(pose)
        } else {
            PosePolicy::NotRequired
        };
        self.tracker = UserTracker::new(policy);

        check(
            backend.set_skeleton_profile(user_generator, settings.profile),
            "Set skeleton profile",
        )?;

        check(backend.start_generating_all(context), "StartGenerating")?;

        info!("skeleton pipeline started");
        Ok(())
    }

    /// Waits for the next update of the user generator and returns, for each of at most `settings.max_users` users, the position of `settings.joint` (the torso by default). Users not tracked yet report `Position::ZERO`.
    ///
    /// Calibration events fired during the update are handled before the positions are read.
    pub fn head_position(&mut self, backend: &mut B) -> Result<Vec<UserJoint>> {
        let (Some(context), Some(user_generator)) = (self.context, self.user_generator) else {
            return Err(Error::NotInitialized("skeleton"));
        };

        if let Err(err) =
            backend.wait_one_update_all(context, user_generator, self.settings.update_timeout)
        {
            error!("{err}");
            return Err(err);
        }

        self.dispatch_events(backend, user_generator);

        let users = check(
            backend.users(user_generator, self.settings.max_users),
            "Get users",
        )?;

        let mut joints = Vec::with_capacity(users.len());
        for user in users {
            if !backend.is_tracking(user_generator, user) {
                joints.push(UserJoint {
                    user,
                    tracked: false,
                    position: Position::ZERO,
                    confidence: 0.0,
                });
                continue;
            }
            let joint = check(
                backend.skeleton_joint(user_generator, user, self.settings.joint),
                "Get skeleton joint",
            )?;
            joints.push(UserJoint {
                user,
                tracked: true,
                position: joint.position,
                confidence: joint.confidence,
            });
        }
        Ok(joints)
    }

    /// Releases the script node, the user generator, and the context, in that order. Does nothing if nothing is open.
    pub fn close(&mut self, backend: &mut B) {
        if let Some(script) = self.script.take() {
            backend.release_node(script);
        }
        if let Some(user_generator) = self.user_generator.take() {
            backend.release_node(user_generator);
        }
        if let Some(context) = self.context.take() {
            backend.release_context(context);
            info!("skeleton pipeline closed");
        }
        self.tracker.clear();
    }

    // private functions_______________________________________________________

    /// Runs the queued callback events through the calibration state machine and carries out the resulting commands. Failing commands are logged, the affected user is picked up again by its next event.
    fn dispatch_events(&mut self, backend: &mut B, user_generator: B::Node) {
        for event in backend.drain_events() {
            for command in self.tracker.apply(&event) {
                if let Err(err) = execute(backend, user_generator, &command) {
                    warn!("{command:?} failed: {err}");
                }
            }
        }
    }
}

fn execute<B: Backend>(
    backend: &mut B,
    user_generator: B::Node,
    command: &Command,
) -> SdkResult<()> {
    match command {
        Command::StartPoseDetection { pose, user } => {
            backend.start_pose_detection(user_generator, pose, *user)
        }
        Command::StopPoseDetection(user) => backend.stop_pose_detection(user_generator, *user),
        Command::RequestCalibration(user) => {
            backend.request_calibration(user_generator, *user, true)
        }
        Command::StartTracking(user) => backend.start_tracking(user_generator, *user),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        calibration::{CalibrationStatus, TrackingEvent},
        error::STATUS_NODE_NOT_FOUND,
        mock::{Call, MockBackend, Op},
        sdk::SkeletonProfile,
    };
    use std::{fs, path::PathBuf};

    /// A working directory containing `SamplesConfig.xml`.
    fn config_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "openni-rust-skeleton-{name}-{}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("SamplesConfig.xml"), "<OpenNI/>").unwrap();
        dir
    }

    fn open(
        name: &str,
        mut backend: MockBackend,
    ) -> (MockBackend, SkeletonPipeline<MockBackend>, Result<()>) {
        let settings = Settings::with_base_dir(config_dir(name));
        let mut pipeline = SkeletonPipeline::new();
        let result = pipeline.init(&mut backend, &settings);
        (backend, pipeline, result)
    }

    #[test]
    fn init_registers_callbacks_and_starts_generating() {
        let (backend, pipeline, result) = open("init", MockBackend::new());
        result.unwrap();
        assert!(pipeline.is_open());
        assert_eq!(pipeline.pose_policy(), &PosePolicy::NotRequired);

        let calls = backend.calls();
        assert!(matches!(calls[0], Call::InitContextFromFile(_)));
        assert!(matches!(
            &calls[1..],
            [
                Call::FindExistingUserGenerator,
                Call::RegisterUserCallbacks,
                Call::RegisterCalibrationStart,
                Call::RegisterCalibrationComplete,
                Call::SetSkeletonProfile(SkeletonProfile::All),
                Call::StartGeneratingAll(_),
            ]
        ));
        // context, script node, user generator
        assert_eq!(backend.live_handles(), 3);
    }

    #[test]
    fn init_with_pose_registers_pose_callback() {
        let (backend, pipeline, result) = open("pose", MockBackend::new().with_pose("Psi"));
        result.unwrap();
        assert_eq!(pipeline.pose_policy(), &PosePolicy::Required("Psi".to_string()));
        assert!(backend.calls().contains(&Call::RegisterPoseDetected));
    }

    #[test]
    fn user_generator_is_created_when_none_exists() {
        let mut backend = MockBackend::new();
        backend.existing_user_generator = false;
        let (backend, _, result) = open("create", backend);
        result.unwrap();
        assert!(backend.calls().contains(&Call::CreateUserGenerator));
    }

    #[test]
    fn failed_user_generator_creation() {
        let mut backend = MockBackend::new();
        backend.existing_user_generator = false;
        backend.fail(Op::CreateUserGenerator, 0x10010);
        let (_, _, result) = open("create-fails", backend);
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Find user generator failed: mock status 0x10010");
    }

    #[test]
    fn missing_skeleton_capability() {
        let backend = MockBackend::new().without_capability(Capability::Skeleton);
        let (backend, _, result) = open("no-skeleton", backend);
        assert!(matches!(result, Err(Error::Unsupported(_))));
        assert!(!backend.calls().contains(&Call::RegisterUserCallbacks));
    }

    #[test]
    fn pose_required_without_pose_detection() {
        let backend = MockBackend::new()
            .with_pose("Psi")
            .without_capability(Capability::PoseDetection);
        let (backend, _, result) = open("no-pose", backend);
        assert_eq!(result.unwrap_err().status(), 1);
        assert!(!backend.calls().contains(&Call::RegisterPoseDetected));
    }

    #[test]
    fn failed_registration_stops_init() {
        let mut backend = MockBackend::new();
        backend.fail(Op::RegisterCalibrationStart, 0x10004);
        let (backend, _, result) = open("register", backend);
        let err = result.unwrap_err();
        assert_eq!(err.status(), 0x10004);
        assert!(err.to_string().starts_with("Register to calibration start failed"));
        assert!(!backend.calls().contains(&Call::RegisterCalibrationComplete));
    }

    #[test]
    fn malformed_config_reports_sdk_errors() {
        let mut backend = MockBackend::new();
        backend.fail_config(ConfigLoadError::Nodes {
            status: 0x1000c,
            detail: "Depth: Can't create any node of the requested type!".to_string(),
        });
        let (backend, pipeline, result) = open("malformed", backend);
        match result {
            Err(Error::ConfigLoad { status, detail }) => {
                assert_eq!(status, 0x1000c);
                assert!(detail.contains("Depth"));
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert!(!pipeline.is_open());
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn missing_config_is_node_not_found() {
        let dir = std::env::temp_dir().join(format!("openni-rust-empty-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let mut backend = MockBackend::new();
        let mut pipeline = SkeletonPipeline::new();

        let err = pipeline
            .init(&mut backend, &Settings::with_base_dir(&dir))
            .unwrap_err();
        assert_eq!(err.status(), STATUS_NODE_NOT_FOUND);
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn tracked_users_report_their_joint() {
        let (mut backend, mut pipeline, result) = open("track", MockBackend::new());
        result.unwrap();
        backend.set_joint_position(1, Position::new(10.0, 20.0, 1500.0));
        backend.push_update(vec![TrackingEvent::NewUser(1), TrackingEvent::NewUser(2)]);
        backend.push_update(vec![TrackingEvent::CalibrationComplete {
            user: 1,
            status: CalibrationStatus::Ok,
        }]);

        let joints = pipeline.head_position(&mut backend).unwrap();
        assert_eq!(joints.len(), 2);
        assert!(joints.iter().all(|j| !j.tracked && j.position == Position::ZERO));
        assert_eq!(pipeline.user_state(1), Some(CalibrationState::Calibrating));

        let joints = pipeline.head_position(&mut backend).unwrap();
        assert_eq!(joints[0].user, 1);
        assert!(joints[0].tracked);
        assert_eq!(joints[0].position.to_array(), [10.0, 20.0, 1500.0]);
        assert_eq!(joints[1].user, 2);
        assert!(!joints[1].tracked);
        assert_eq!(pipeline.user_state(1), Some(CalibrationState::Tracking));
    }

    #[test]
    fn user_slots_are_capped() {
        let (mut backend, mut pipeline, _) = open("cap", MockBackend::new());
        backend.push_update((1..=20).map(TrackingEvent::NewUser).collect());

        let joints = pipeline.head_position(&mut backend).unwrap();
        assert_eq!(joints.len(), 15);
    }

    #[test]
    fn close_releases_in_order() {
        let (mut backend, mut pipeline, _) = open("close", MockBackend::new());
        backend.clear_calls();

        pipeline.close(&mut backend);
        pipeline.close(&mut backend);
        assert!(matches!(
            backend.calls(),
            [Call::ReleaseNode(_), Call::ReleaseNode(_), Call::ReleaseContext(_)]
        ));
        assert_eq!(backend.live_handles(), 0);
    }
}
