//! An in-memory [`Backend`] to drive the pipelines without a sensor.
//!
//! Frames and callback events are queued up front and handed out one update at a time. Every call is recorded, handles are counted, and any operation can be made to fail.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    calibration::{TrackingEvent, UserId},
    error::{Error, Result, SdkError, SdkResult},
    frame::{DepthFrame, Position, Resolution},
    sdk::{
        Backend, Capability, ConfigLoadError, Joint, JointPosition, ScriptContext, SkeletonProfile,
    },
};

/// Status the mock reports for a node type that does not exist, like `XN_STATUS_NO_NODE_PRESENT`.
pub const MOCK_NO_NODE_PRESENT: u32 = 0x1000c;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MockHandle(pub u32);

/// Operations that can be made to fail with [`MockBackend::fail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    InitContext,
    InitContextFromFile,
    StartGeneratingAll,
    Wait,
    CreateDepthGenerator,
    CreateUserGenerator,
    RegisterUserCallbacks,
    RegisterCalibrationStart,
    RegisterCalibrationComplete,
    RegisterPoseDetected,
    SetSkeletonProfile,
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    InitContext,
    InitContextFromFile(PathBuf),
    ReleaseContext(MockHandle),
    StartGeneratingAll(MockHandle),
    Wait(MockHandle),
    CreateDepthGenerator,
    FindExistingUserGenerator,
    CreateUserGenerator,
    ReleaseNode(MockHandle),
    RegisterUserCallbacks,
    RegisterCalibrationStart,
    RegisterCalibrationComplete,
    RegisterPoseDetected,
    SetSkeletonProfile(SkeletonProfile),
    StartPoseDetection { pose: String, user: UserId },
    StopPoseDetection(UserId),
    RequestCalibration { user: UserId, force: bool },
    StartTracking(UserId),
}
impl Call {
    /// Whether this call is a per-user command of the calibration state machine.
    pub fn is_command(&self) -> bool {
        matches!(
            self,
            Call::StartPoseDetection { .. }
                | Call::StopPoseDetection(_)
                | Call::RequestCalibration { .. }
                | Call::StartTracking(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockFrame {
    pub frame_id: u32,
    pub resolution: Resolution,
    pub pixels: Vec<u16>,
}
impl MockFrame {
    /// A frame where every pixel holds `f(x, y)`.
    pub fn from_fn(frame_id: u32, width: u32, height: u32, f: impl Fn(u32, u32) -> u16) -> Self {
        let pixels = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();
        Self {
            frame_id,
            resolution: Resolution::new(width, height),
            pixels,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Callbacks {
    User,
    CalibrationStart,
    CalibrationComplete,
    PoseDetected,
}

#[derive(Debug)]
pub struct MockBackend {
    next_handle: u32,
    live: HashSet<MockHandle>,
    released: usize,
    calls: Vec<Call>,
    failures: HashMap<Op, SdkError>,
    wait_error: Option<Error>,
    config_error: Option<ConfigLoadError>,

    frames: VecDeque<MockFrame>,
    current_frame: Option<MockFrame>,
    updates: VecDeque<Vec<TrackingEvent>>,
    pending: Vec<TrackingEvent>,
    registered: HashSet<Callbacks>,

    /// Capabilities every user generator reports.
    pub capabilities: HashSet<Capability>,
    /// Whether the configuration file already declares a user generator.
    pub existing_user_generator: bool,
    pub need_pose: bool,
    pub pose: String,
    users: Vec<UserId>,
    tracked: HashSet<UserId>,
    joints: HashMap<UserId, Position>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// A backend with skeleton and pose detection support that does not require a pose.
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            live: HashSet::new(),
            released: 0,
            calls: Vec::new(),
            failures: HashMap::new(),
            wait_error: None,
            config_error: None,
            frames: VecDeque::new(),
            current_frame: None,
            updates: VecDeque::new(),
            pending: Vec::new(),
            registered: HashSet::new(),
            capabilities: HashSet::from([Capability::Skeleton, Capability::PoseDetection]),
            existing_user_generator: true,
            need_pose: false,
            pose: "Psi".to_string(),
            users: Vec::new(),
            tracked: HashSet::new(),
            joints: HashMap::new(),
        }
    }

    /// Requires users to hold `pose` before calibration.
    pub fn with_pose(mut self, pose: &str) -> Self {
        self.need_pose = true;
        self.pose = pose.to_string();
        self
    }

    pub fn without_capability(mut self, capability: Capability) -> Self {
        self.capabilities.remove(&capability);
        self
    }

    /// Queues a frame handed out by the next update. Without queued frames the last one is kept.
    pub fn push_frame(&mut self, frame: MockFrame) {
        self.frames.push_back(frame);
    }

    /// Queues the callback events fired during the next update.
    pub fn push_update(&mut self, events: Vec<TrackingEvent>) {
        self.updates.push_back(events);
    }

    /// Position reported for `user`'s joints once the user is tracked.
    pub fn set_joint_position(&mut self, user: UserId, position: Position) {
        self.joints.insert(user, position);
    }

    /// Makes every following call of `op` fail with `status`.
    pub fn fail(&mut self, op: Op, status: u32) {
        self.failures
            .insert(op, SdkError::new(status, status_string(status)));
    }

    /// Makes the next update fail with `error`.
    pub fn fail_next_wait(&mut self, error: Error) {
        self.wait_error = Some(error);
    }

    /// Makes loading the configuration file fail with `error`.
    pub fn fail_config(&mut self, error: ConfigLoadError) {
        self.config_error = Some(error);
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Calibration commands issued so far.
    pub fn commands(&self) -> Vec<Call> {
        self.calls.iter().filter(|c| c.is_command()).cloned().collect()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of contexts and nodes not yet released.
    pub fn live_handles(&self) -> usize {
        self.live.len()
    }

    pub fn released_handles(&self) -> usize {
        self.released
    }

    // private functions_______________________________________________________

    fn check(&self, op: Op) -> SdkResult<()> {
        match self.failures.get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn allocate(&mut self) -> MockHandle {
        let handle = MockHandle(self.next_handle);
        self.next_handle += 1;
        self.live.insert(handle);
        handle
    }

    fn release(&mut self, handle: MockHandle) {
        if self.live.remove(&handle) {
            self.released += 1;
        }
    }

    fn is_registered(&self, event: &TrackingEvent) -> bool {
        let callbacks = match event {
            TrackingEvent::NewUser(_) | TrackingEvent::LostUser(_) => Callbacks::User,
            TrackingEvent::PoseDetected { .. } => Callbacks::PoseDetected,
            TrackingEvent::CalibrationStarted(_) => Callbacks::CalibrationStart,
            TrackingEvent::CalibrationComplete { .. } => Callbacks::CalibrationComplete,
        };
        self.registered.contains(&callbacks)
    }

    fn register(&mut self, op: Op, callbacks: Callbacks, call: Call) -> SdkResult<()> {
        self.calls.push(call);
        self.check(op)?;
        self.registered.insert(callbacks);
        Ok(())
    }
}

/// Status description of the mock, in place of the SDK's status string table.
pub fn status_string(status: u32) -> String {
    match status {
        0 => "OK".to_string(),
        MOCK_NO_NODE_PRESENT => "Can't create any node of the requested type!".to_string(),
        status => format!("mock status {status:#x}"),
    }
}

impl Backend for MockBackend {
    type Context = MockHandle;
    type Node = MockHandle;

    fn init_context(&mut self) -> SdkResult<MockHandle> {
        self.calls.push(Call::InitContext);
        self.check(Op::InitContext)?;
        Ok(self.allocate())
    }

    fn init_context_from_file(
        &mut self,
        path: &Path,
    ) -> std::result::Result<ScriptContext<MockHandle, MockHandle>, ConfigLoadError> {
        self.calls.push(Call::InitContextFromFile(path.to_path_buf()));
        if let Some(err) = self.config_error.clone() {
            return Err(err);
        }
        self.check(Op::InitContextFromFile)
            .map_err(ConfigLoadError::Sdk)?;
        let context = self.allocate();
        let script = self.allocate();
        Ok(ScriptContext { context, script })
    }

    fn release_context(&mut self, context: MockHandle) {
        self.calls.push(Call::ReleaseContext(context));
        self.release(context);
        self.registered.clear();
        self.pending.clear();
    }

    fn start_generating_all(&mut self, context: MockHandle) -> SdkResult<()> {
        self.calls.push(Call::StartGeneratingAll(context));
        self.check(Op::StartGeneratingAll)
    }

    fn wait_one_update_all(
        &mut self,
        _context: MockHandle,
        node: MockHandle,
        _timeout: Option<Duration>,
    ) -> Result<()> {
        self.calls.push(Call::Wait(node));
        if let Some(err) = self.wait_error.take() {
            return Err(err);
        }
        self.check(Op::Wait)
            .map_err(|err| Error::sdk("UpdateData", err))?;

        if let Some(frame) = self.frames.pop_front() {
            self.current_frame = Some(frame);
        }
        if let Some(events) = self.updates.pop_front() {
            for event in events {
                match event {
                    TrackingEvent::NewUser(user) => self.users.push(user),
                    TrackingEvent::LostUser(user) => {
                        self.users.retain(|u| *u != user);
                        self.tracked.remove(&user);
                    }
                    _ => (),
                }
                if self.is_registered(&event) {
                    self.pending.push(event);
                }
            }
        }
        Ok(())
    }

    fn create_depth_generator(&mut self, _context: MockHandle) -> SdkResult<MockHandle> {
        self.calls.push(Call::CreateDepthGenerator);
        self.check(Op::CreateDepthGenerator)?;
        Ok(self.allocate())
    }

    fn find_existing_user_generator(&mut self, _context: MockHandle) -> SdkResult<MockHandle> {
        self.calls.push(Call::FindExistingUserGenerator);
        if self.existing_user_generator {
            Ok(self.allocate())
        } else {
            Err(SdkError::new(
                MOCK_NO_NODE_PRESENT,
                status_string(MOCK_NO_NODE_PRESENT),
            ))
        }
    }

    fn create_user_generator(&mut self, _context: MockHandle) -> SdkResult<MockHandle> {
        self.calls.push(Call::CreateUserGenerator);
        self.check(Op::CreateUserGenerator)?;
        Ok(self.allocate())
    }

    fn release_node(&mut self, node: MockHandle) {
        self.calls.push(Call::ReleaseNode(node));
        self.release(node);
    }

    fn is_capability_supported(&self, _node: MockHandle, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    fn depth_frame(&self, _node: MockHandle) -> SdkResult<DepthFrame<'_>> {
        let frame = self
            .current_frame
            .as_ref()
            .ok_or_else(|| SdkError::new(0x10001, "no depth data"))?;
        Ok(DepthFrame {
            frame_id: frame.frame_id,
            resolution: frame.resolution,
            pixels: &frame.pixels,
        })
    }

    fn register_user_callbacks(&mut self, _node: MockHandle) -> SdkResult<()> {
        self.register(
            Op::RegisterUserCallbacks,
            Callbacks::User,
            Call::RegisterUserCallbacks,
        )
    }

    fn register_calibration_start(&mut self, _node: MockHandle) -> SdkResult<()> {
        self.register(
            Op::RegisterCalibrationStart,
            Callbacks::CalibrationStart,
            Call::RegisterCalibrationStart,
        )
    }

    fn register_calibration_complete(&mut self, _node: MockHandle) -> SdkResult<()> {
        self.register(
            Op::RegisterCalibrationComplete,
            Callbacks::CalibrationComplete,
            Call::RegisterCalibrationComplete,
        )
    }

    fn register_pose_detected(&mut self, _node: MockHandle) -> SdkResult<()> {
        self.register(
            Op::RegisterPoseDetected,
            Callbacks::PoseDetected,
            Call::RegisterPoseDetected,
        )
    }

    fn drain_events(&mut self) -> Vec<TrackingEvent> {
        std::mem::take(&mut self.pending)
    }

    fn need_pose_for_calibration(&self, _node: MockHandle) -> bool {
        self.need_pose
    }

    fn calibration_pose(&self, _node: MockHandle) -> SdkResult<String> {
        Ok(self.pose.clone())
    }

    fn set_skeleton_profile(
        &mut self,
        _node: MockHandle,
        profile: SkeletonProfile,
    ) -> SdkResult<()> {
        self.calls.push(Call::SetSkeletonProfile(profile));
        self.check(Op::SetSkeletonProfile)
    }

    fn users(&self, _node: MockHandle, max: usize) -> SdkResult<Vec<UserId>> {
        Ok(self.users.iter().take(max).copied().collect())
    }

    fn is_tracking(&self, _node: MockHandle, user: UserId) -> bool {
        self.tracked.contains(&user)
    }

    fn skeleton_joint(
        &self,
        _node: MockHandle,
        user: UserId,
        _joint: Joint,
    ) -> SdkResult<JointPosition> {
        Ok(JointPosition {
            position: self.joints.get(&user).copied().unwrap_or_default(),
            confidence: 1.0,
        })
    }

    fn start_pose_detection(&mut self, _node: MockHandle, pose: &str, user: UserId) -> SdkResult<()> {
        self.calls.push(Call::StartPoseDetection {
            pose: pose.to_string(),
            user,
        });
        Ok(())
    }

    fn stop_pose_detection(&mut self, _node: MockHandle, user: UserId) -> SdkResult<()> {
        self.calls.push(Call::StopPoseDetection(user));
        Ok(())
    }

    fn request_calibration(&mut self, _node: MockHandle, user: UserId, force: bool) -> SdkResult<()> {
        self.calls.push(Call::RequestCalibration { user, force });
        Ok(())
    }

    fn start_tracking(&mut self, _node: MockHandle, user: UserId) -> SdkResult<()> {
        self.calls.push(Call::StartTracking(user));
        self.tracked.insert(user);
        Ok(())
    }
}
