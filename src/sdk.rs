//! The boundary to the middleware. Both pipelines only talk to the SDK through [`Backend`], implemented natively by `native::OpenNi` (feature `openni`) and in memory by [`crate::mock::MockBackend`].

use std::{path::Path, time::Duration};

use crate::{
    calibration::{TrackingEvent, UserId},
    error::{Result, SdkError, SdkResult},
    frame::{DepthFrame, Position},
};

/// Optional features of a production node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Skeleton,
    PoseDetection,
}

/// Which joints the skeleton capability tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkeletonProfile {
    None,
    #[default]
    All,
    Upper,
    Lower,
    HeadHands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Joint {
    Head,
    Neck,
    #[default]
    Torso,
    Waist,
    LeftShoulder,
    LeftElbow,
    LeftHand,
    RightShoulder,
    RightElbow,
    RightHand,
    LeftHip,
    LeftKnee,
    LeftFoot,
    RightHip,
    RightKnee,
    RightFoot,
}

/// Position of a joint and the SDK's confidence in it (0 to 1).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointPosition {
    pub position: Position,
    pub confidence: f32,
}

/// Failure to create a context from an XML configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLoadError {
    /// The file was read but the nodes it describes could not be created. `detail` is the SDK's rendering of the enumeration errors.
    Nodes { status: u32, detail: String },
    Sdk(SdkError),
}

/// A context created from a configuration file, together with the script node that owns the nodes declared in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptContext<C, N> {
    pub context: C,
    pub script: N,
}

/// The middleware calls the pipelines rely on. Handles are owned by the caller and must be released with `release_node`/`release_context`, dependents before the context that owns them.
pub trait Backend {
    type Context: Copy + std::fmt::Debug;
    type Node: Copy + std::fmt::Debug;

    // context _______________________________________________________________

    fn init_context(&mut self) -> SdkResult<Self::Context>;

    fn init_context_from_file(
        &mut self,
        path: &Path,
    ) -> std::result::Result<ScriptContext<Self::Context, Self::Node>, ConfigLoadError>;

    fn release_context(&mut self, context: Self::Context);

    fn start_generating_all(&mut self, context: Self::Context) -> SdkResult<()>;

    /// Blocks until `node` has new data, then updates all nodes of `context`. Callbacks registered on the nodes fire during this call and queue their events for [`Backend::drain_events`]. With `timeout = None` the call blocks until data arrives.
    fn wait_one_update_all(
        &mut self,
        context: Self::Context,
        node: Self::Node,
        timeout: Option<Duration>,
    ) -> Result<()>;

    // nodes _________________________________________________________________

    fn create_depth_generator(&mut self, context: Self::Context) -> SdkResult<Self::Node>;

    fn find_existing_user_generator(&mut self, context: Self::Context) -> SdkResult<Self::Node>;

    fn create_user_generator(&mut self, context: Self::Context) -> SdkResult<Self::Node>;

    fn release_node(&mut self, node: Self::Node);

    fn is_capability_supported(&self, node: Self::Node, capability: Capability) -> bool;

    /// Depth map of the latest update of the depth node.
    fn depth_frame(&self, node: Self::Node) -> SdkResult<DepthFrame<'_>>;

    // callbacks _____________________________________________________________

    fn register_user_callbacks(&mut self, node: Self::Node) -> SdkResult<()>;

    fn register_calibration_start(&mut self, node: Self::Node) -> SdkResult<()>;

    fn register_calibration_complete(&mut self, node: Self::Node) -> SdkResult<()>;

    fn register_pose_detected(&mut self, node: Self::Node) -> SdkResult<()>;

    /// Events queued by the registered callbacks since the last call, oldest first.
    fn drain_events(&mut self) -> Vec<TrackingEvent>;

    // skeleton and pose detection ___________________________________________

    fn need_pose_for_calibration(&self, node: Self::Node) -> bool;

    fn calibration_pose(&self, node: Self::Node) -> SdkResult<String>;

    fn set_skeleton_profile(&mut self, node: Self::Node, profile: SkeletonProfile)
    -> SdkResult<()>;

    /// Ids of at most `max` users currently known to the node.
    fn users(&self, node: Self::Node, max: usize) -> SdkResult<Vec<UserId>>;

    fn is_tracking(&self, node: Self::Node, user: UserId) -> bool;

    fn skeleton_joint(
        &self,
        node: Self::Node,
        user: UserId,
        joint: Joint,
    ) -> SdkResult<JointPosition>;

    fn start_pose_detection(&mut self, node: Self::Node, pose: &str, user: UserId)
    -> SdkResult<()>;

    fn stop_pose_detection(&mut self, node: Self::Node, user: UserId) -> SdkResult<()>;

    fn request_calibration(&mut self, node: Self::Node, user: UserId, force: bool)
    -> SdkResult<()>;

    fn start_tracking(&mut self, node: Self::Node, user: UserId) -> SdkResult<()>;
}
