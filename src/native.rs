//! [`Backend`] on top of the OpenNI 1.x C library.

use std::{
    ffi::{CStr, CString},
    os::raw::{c_char, c_void},
    path::Path,
    ptr,
    sync::Mutex,
    thread::sleep,
    time::{Duration, Instant},
};

use openni_sys as sys;
use sys::XN_STATUS_OK as OK;

use crate::{
    calibration::{CalibrationStatus, TrackingEvent, UserId},
    error::{Error, Result, SdkError, SdkResult, STATUS_ERROR},
    frame::{DepthFrame, Position, Resolution},
    sdk::{
        Backend, Capability, ConfigLoadError, Joint, JointPosition, ScriptContext, SkeletonProfile,
    },
};

/// Events pushed by the callbacks, the callback cookie points to it.
type EventQueue = Mutex<Vec<TrackingEvent>>;

/// Raw OpenNI context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context(*mut sys::XnContext);

/// Raw OpenNI production node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node(sys::XnNodeHandle);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Callbacks {
    User,
    CalibrationStart,
    CalibrationComplete,
    PoseDetected,
}

struct Registration {
    node: sys::XnNodeHandle,
    callbacks: Callbacks,
    handle: sys::XnCallbackHandle,
}

/// The OpenNI runtime. Callbacks fire on the thread calling `wait_one_update_all()`.
pub struct OpenNi {
    events: *mut EventQueue,
    registrations: Vec<Registration>,
}

impl Default for OpenNi {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenNi {
    pub fn new() -> Self {
        Self {
            events: Box::into_raw(Box::new(Mutex::new(Vec::new()))),
            registrations: Vec::new(),
        }
    }

    fn cookie(&self) -> *mut c_void {
        self.events.cast()
    }

    fn unregister(&mut self, node: sys::XnNodeHandle) {
        let (released, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.registrations)
            .into_iter()
            .partition(|r| r.node == node);
        self.registrations = kept;
        for registration in released {
            unregister(&registration);
        }
    }

    fn push_registration(&mut self, node: Node, callbacks: Callbacks, handle: sys::XnCallbackHandle) {
        self.registrations.push(Registration {
            node: node.0,
            callbacks,
            handle,
        });
    }
}

impl Drop for OpenNi {
    fn drop(&mut self) {
        for registration in std::mem::take(&mut self.registrations) {
            unregister(&registration);
        }
        // no callback can reach the queue any more
        unsafe { drop(Box::from_raw(self.events)) };
    }
}

fn unregister(registration: &Registration) {
    let Registration {
        node,
        callbacks,
        handle,
    } = *registration;
    unsafe {
        match callbacks {
            Callbacks::User => sys::xnUnregisterUserCallbacks(node, handle),
            Callbacks::CalibrationStart => sys::xnUnregisterFromCalibrationStart(node, handle),
            Callbacks::CalibrationComplete => {
                sys::xnUnregisterFromCalibrationComplete(node, handle)
            }
            Callbacks::PoseDetected => sys::xnUnregisterFromPoseDetected(node, handle),
        }
    }
}

/// The SDK's description of `status`.
pub fn status_string(status: sys::XnStatus) -> String {
    let message = unsafe { sys::xnGetStatusString(status) };
    if message.is_null() {
        return format!("unknown status {status:#x}");
    }
    unsafe { CStr::from_ptr(message) }
        .to_string_lossy()
        .into_owned()
}

fn sdk_error(status: sys::XnStatus) -> SdkError {
    SdkError::new(status, status_string(status))
}

fn ok(status: sys::XnStatus) -> SdkResult<()> {
    match status {
        OK => Ok(()),
        status => Err(sdk_error(status)),
    }
}

fn c_string(s: &str) -> SdkResult<CString> {
    CString::new(s).map_err(|_| SdkError::new(STATUS_ERROR, format!("{s:?} contains NUL")))
}

/// Reads a NUL-terminated string the SDK wrote into `buffer`.
fn from_buffer(buffer: &[u8]) -> String {
    CStr::from_bytes_until_nul(buffer)
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Renders the enumeration errors collected while creating the nodes of a configuration file.
fn render_errors(errors: *const sys::XnEnumerationErrors) -> String {
    let mut buffer = [0u8; 1024];
    let len = buffer.len() as u32;
    let ptr: *mut c_char = buffer.as_mut_ptr().cast();
    unsafe { sys::xnEnumerationErrorsToString(errors, ptr, len) };
    from_buffer(&buffer)
}

// callbacks __________________________________________________________________

unsafe fn push(cookie: *mut c_void, event: TrackingEvent) {
    let queue = unsafe { &*(cookie as *const EventQueue) };
    // a poisoned queue only loses this event, never unwind into C
    if let Ok(mut queue) = queue.lock() {
        queue.push(event);
    }
}

unsafe extern "C" fn on_new_user(_node: sys::XnNodeHandle, user: sys::XnUserID, cookie: *mut c_void) {
    unsafe { push(cookie, TrackingEvent::NewUser(user)) }
}

unsafe extern "C" fn on_lost_user(
    _node: sys::XnNodeHandle,
    user: sys::XnUserID,
    cookie: *mut c_void,
) {
    unsafe { push(cookie, TrackingEvent::LostUser(user)) }
}

unsafe extern "C" fn on_pose_detected(
    _node: sys::XnNodeHandle,
    pose: *const c_char,
    user: sys::XnUserID,
    cookie: *mut c_void,
) {
    let pose = if pose.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(pose) }
            .to_string_lossy()
            .into_owned()
    };
    unsafe { push(cookie, TrackingEvent::PoseDetected { user, pose }) }
}

unsafe extern "C" fn on_calibration_start(
    _node: sys::XnNodeHandle,
    user: sys::XnUserID,
    cookie: *mut c_void,
) {
    unsafe { push(cookie, TrackingEvent::CalibrationStarted(user)) }
}

unsafe extern "C" fn on_calibration_complete(
    _node: sys::XnNodeHandle,
    user: sys::XnUserID,
    status: sys::XnCalibrationStatus,
    cookie: *mut c_void,
) {
    let status = CalibrationStatus::from_raw(status);
    unsafe { push(cookie, TrackingEvent::CalibrationComplete { user, status }) }
}

// conversions ________________________________________________________________

fn capability_name(capability: Capability) -> *const c_char {
    match capability {
        Capability::Skeleton => sys::XN_CAPABILITY_SKELETON.as_ptr().cast(),
        Capability::PoseDetection => sys::XN_CAPABILITY_POSE_DETECTION.as_ptr().cast(),
    }
}

fn raw_profile(profile: SkeletonProfile) -> sys::XnSkeletonProfile {
    match profile {
        SkeletonProfile::None => sys::XN_SKEL_PROFILE_NONE,
        SkeletonProfile::All => sys::XN_SKEL_PROFILE_ALL,
        SkeletonProfile::Upper => sys::XN_SKEL_PROFILE_UPPER,
        SkeletonProfile::Lower => sys::XN_SKEL_PROFILE_LOWER,
        SkeletonProfile::HeadHands => sys::XN_SKEL_PROFILE_HEAD_HANDS,
    }
}

fn raw_joint(joint: Joint) -> sys::XnSkeletonJoint {
    match joint {
        Joint::Head => sys::XN_SKEL_HEAD,
        Joint::Neck => sys::XN_SKEL_NECK,
        Joint::Torso => sys::XN_SKEL_TORSO,
        Joint::Waist => sys::XN_SKEL_WAIST,
        Joint::LeftShoulder => sys::XN_SKEL_LEFT_SHOULDER,
        Joint::LeftElbow => sys::XN_SKEL_LEFT_ELBOW,
        Joint::LeftHand => sys::XN_SKEL_LEFT_HAND,
        Joint::RightShoulder => sys::XN_SKEL_RIGHT_SHOULDER,
        Joint::RightElbow => sys::XN_SKEL_RIGHT_ELBOW,
        Joint::RightHand => sys::XN_SKEL_RIGHT_HAND,
        Joint::LeftHip => sys::XN_SKEL_LEFT_HIP,
        Joint::LeftKnee => sys::XN_SKEL_LEFT_KNEE,
        Joint::LeftFoot => sys::XN_SKEL_LEFT_FOOT,
        Joint::RightHip => sys::XN_SKEL_RIGHT_HIP,
        Joint::RightKnee => sys::XN_SKEL_RIGHT_KNEE,
        Joint::RightFoot => sys::XN_SKEL_RIGHT_FOOT,
    }
}

fn raw_bool(b: bool) -> sys::XnBool {
    if b { sys::TRUE } else { sys::FALSE }
}

impl Backend for OpenNi {
    type Context = Context;
    type Node = Node;

    fn init_context(&mut self) -> SdkResult<Context> {
        let mut context = ptr::null_mut();
        ok(unsafe { sys::xnInit(&mut context) })?;
        Ok(Context(context))
    }

    fn init_context_from_file(
        &mut self,
        path: &Path,
    ) -> std::result::Result<ScriptContext<Context, Node>, ConfigLoadError> {
        let path = c_string(&path.to_string_lossy()).map_err(ConfigLoadError::Sdk)?;

        let mut errors = ptr::null_mut();
        ok(unsafe { sys::xnEnumerationErrorsAllocate(&mut errors) })
            .map_err(ConfigLoadError::Sdk)?;

        let mut context = ptr::null_mut();
        let mut script = ptr::null_mut();
        let status =
            unsafe { sys::xnInitFromXmlFileEx(path.as_ptr(), &mut context, errors, &mut script) };

        let result = if status == OK {
            Ok(ScriptContext {
                context: Context(context),
                script: Node(script),
            })
        } else {
            let detail = render_errors(errors);
            if detail.is_empty() {
                Err(ConfigLoadError::Sdk(sdk_error(status)))
            } else {
                Err(ConfigLoadError::Nodes { status, detail })
            }
        };
        unsafe { sys::xnEnumerationErrorsFree(errors) };
        result
    }

    fn release_context(&mut self, context: Context) {
        unsafe { sys::xnContextRelease(context.0) };
        self.drain_events();
    }

    fn start_generating_all(&mut self, context: Context) -> SdkResult<()> {
        ok(unsafe { sys::xnStartGeneratingAll(context.0) })
    }

    fn wait_one_update_all(
        &mut self,
        context: Context,
        node: Node,
        timeout: Option<Duration>,
    ) -> Result<()> {
        if let Some(timeout) = timeout {
            let start = Instant::now();
            let mut timestamp = 0u64;
            while unsafe { sys::xnIsNewDataAvailable(node.0, &mut timestamp) } == sys::FALSE {
                if start.elapsed() >= timeout {
                    return Err(Error::Timeout(timeout));
                }
                sleep(Duration::from_millis(1));
            }
        }
        ok(unsafe { sys::xnWaitOneUpdateAll(context.0, node.0) })
            .map_err(|err| Error::sdk("UpdateData", err))
    }

    fn create_depth_generator(&mut self, context: Context) -> SdkResult<Node> {
        let mut node = ptr::null_mut();
        ok(unsafe {
            sys::xnCreateDepthGenerator(context.0, &mut node, ptr::null_mut(), ptr::null_mut())
        })?;
        Ok(Node(node))
    }

    fn find_existing_user_generator(&mut self, context: Context) -> SdkResult<Node> {
        let mut node = ptr::null_mut();
        ok(unsafe {
            sys::xnFindExistingRefNodeByType(context.0, sys::XN_NODE_TYPE_USER, &mut node)
        })?;
        Ok(Node(node))
    }

    fn create_user_generator(&mut self, context: Context) -> SdkResult<Node> {
        let mut node = ptr::null_mut();
        ok(unsafe {
            sys::xnCreateUserGenerator(context.0, &mut node, ptr::null_mut(), ptr::null_mut())
        })?;
        Ok(Node(node))
    }

    fn release_node(&mut self, node: Node) {
        self.unregister(node.0);
        unsafe { sys::xnProductionNodeRelease(node.0) };
    }

    fn is_capability_supported(&self, node: Node, capability: Capability) -> bool {
        unsafe { sys::xnIsCapabilitySupported(node.0, capability_name(capability)) != sys::FALSE }
    }

    fn depth_frame(&self, node: Node) -> SdkResult<DepthFrame<'_>> {
        let mut mode = sys::XnMapOutputMode::default();
        ok(unsafe { sys::xnGetMapOutputMode(node.0, &mut mode) })?;
        let resolution = Resolution::new(mode.nXRes, mode.nYRes);

        let data = unsafe { sys::xnGetDepthMap(node.0) };
        if data.is_null() {
            return Err(SdkError::new(STATUS_ERROR, "depth map is NULL"));
        }
        // valid until the next update, which needs `&mut self`
        let pixels = unsafe { std::slice::from_raw_parts(data, resolution.to_pixel_count()) };

        Ok(DepthFrame {
            frame_id: unsafe { sys::xnGetFrameID(node.0) },
            resolution,
            pixels,
        })
    }

    fn register_user_callbacks(&mut self, node: Node) -> SdkResult<()> {
        let mut handle = ptr::null_mut();
        ok(unsafe {
            sys::xnRegisterUserCallbacks(
                node.0,
                Some(on_new_user),
                Some(on_lost_user),
                self.cookie(),
                &mut handle,
            )
        })?;
        self.push_registration(node, Callbacks::User, handle);
        Ok(())
    }

    fn register_calibration_start(&mut self, node: Node) -> SdkResult<()> {
        let mut handle = ptr::null_mut();
        ok(unsafe {
            sys::xnRegisterToCalibrationStart(
                node.0,
                Some(on_calibration_start),
                self.cookie(),
                &mut handle,
            )
        })?;
        self.push_registration(node, Callbacks::CalibrationStart, handle);
        Ok(())
    }

    fn register_calibration_complete(&mut self, node: Node) -> SdkResult<()> {
        let mut handle = ptr::null_mut();
        ok(unsafe {
            sys::xnRegisterToCalibrationComplete(
                node.0,
                Some(on_calibration_complete),
                self.cookie(),
                &mut handle,
            )
        })?;
        self.push_registration(node, Callbacks::CalibrationComplete, handle);
        Ok(())
    }

    fn register_pose_detected(&mut self, node: Node) -> SdkResult<()> {
        let mut handle = ptr::null_mut();
        ok(unsafe {
            sys::xnRegisterToPoseDetected(
                node.0,
                Some(on_pose_detected),
                self.cookie(),
                &mut handle,
            )
        })?;
        self.push_registration(node, Callbacks::PoseDetected, handle);
        Ok(())
    }

    fn drain_events(&mut self) -> Vec<TrackingEvent> {
        let queue = unsafe { &*self.events };
        match queue.lock() {
            Ok(mut queue) => std::mem::take(&mut *queue),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    fn need_pose_for_calibration(&self, node: Node) -> bool {
        unsafe { sys::xnNeedPoseForSkeletonCalibration(node.0) != sys::FALSE }
    }

    fn calibration_pose(&self, node: Node) -> SdkResult<String> {
        let mut buffer = [0u8; sys::XN_MAX_NAME_LENGTH];
        let ptr: *mut c_char = buffer.as_mut_ptr().cast();
        ok(unsafe { sys::xnGetSkeletonCalibrationPose(node.0, ptr) })?;
        Ok(from_buffer(&buffer))
    }

    fn set_skeleton_profile(&mut self, node: Node, profile: SkeletonProfile) -> SdkResult<()> {
        ok(unsafe { sys::xnSetSkeletonProfile(node.0, raw_profile(profile)) })
    }

    fn users(&self, node: Node, max: usize) -> SdkResult<Vec<UserId>> {
        let max = max.min(u16::MAX as usize);
        let mut users = vec![0; max];
        let mut count = max as u16;
        ok(unsafe { sys::xnGetUsers(node.0, users.as_mut_ptr(), &mut count) })?;
        users.truncate(count as usize);
        Ok(users)
    }

    fn is_tracking(&self, node: Node, user: UserId) -> bool {
        unsafe { sys::xnIsSkeletonTracking(node.0, user) != sys::FALSE }
    }

    fn skeleton_joint(&self, node: Node, user: UserId, joint: Joint) -> SdkResult<JointPosition> {
        let mut transformation = sys::XnSkeletonJointTransformation::default();
        ok(unsafe {
            sys::xnGetSkeletonJoint(node.0, user, raw_joint(joint), &mut transformation)
        })?;
        let sys::XnSkeletonJointPosition {
            position,
            fConfidence: confidence,
        } = transformation.position;
        Ok(JointPosition {
            position: Position::new(position.X, position.Y, position.Z),
            confidence,
        })
    }

    fn start_pose_detection(&mut self, node: Node, pose: &str, user: UserId) -> SdkResult<()> {
        let pose = c_string(pose)?;
        ok(unsafe { sys::xnStartPoseDetection(node.0, pose.as_ptr(), user) })
    }

    fn stop_pose_detection(&mut self, node: Node, user: UserId) -> SdkResult<()> {
        ok(unsafe { sys::xnStopPoseDetection(node.0, user) })
    }

    fn request_calibration(&mut self, node: Node, user: UserId, force: bool) -> SdkResult<()> {
        ok(unsafe { sys::xnRequestSkeletonCalibration(node.0, user, raw_bool(force)) })
    }

    fn start_tracking(&mut self, node: Node, user: UserId) -> SdkResult<()> {
        ok(unsafe { sys::xnStartSkeletonTracking(node.0, user) })
    }
}
