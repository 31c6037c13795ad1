/*!
# openni-sys

Raw declarations for the part of the OpenNI 1.x C API (`XnOpenNI.h`, `XnPrdNode.h`) used by `openni-rust`: context lifecycle, production nodes, the depth map, and the user generator with its skeleton and pose detection capabilities.
*/

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

use std::os::raw::{c_char, c_int, c_void};

pub type XnStatus = u32;
pub type XnBool = c_int;
pub type XnUInt16 = u16;
pub type XnUInt32 = u32;
pub type XnUInt64 = u64;
pub type XnUserID = u32;
pub type XnDepthPixel = u16;
pub type XnProductionNodeType = i32;
pub type XnSkeletonProfile = c_int;
pub type XnSkeletonJoint = c_int;
pub type XnCalibrationStatus = c_int;

pub const XN_STATUS_OK: XnStatus = 0;
pub const TRUE: XnBool = 1;
pub const FALSE: XnBool = 0;

/// Maximal length of a node, pose or capability name, including the terminating NUL.
pub const XN_MAX_NAME_LENGTH: usize = 80;

pub const XN_NODE_TYPE_DEPTH: XnProductionNodeType = 2;
pub const XN_NODE_TYPE_USER: XnProductionNodeType = 6;

pub const XN_CAPABILITY_SKELETON: &[u8] = b"User::Skeleton\0";
pub const XN_CAPABILITY_POSE_DETECTION: &[u8] = b"User::PoseDetection\0";

pub const XN_SKEL_PROFILE_NONE: XnSkeletonProfile = 1;
pub const XN_SKEL_PROFILE_ALL: XnSkeletonProfile = 2;
pub const XN_SKEL_PROFILE_UPPER: XnSkeletonProfile = 3;
pub const XN_SKEL_PROFILE_LOWER: XnSkeletonProfile = 4;
pub const XN_SKEL_PROFILE_HEAD_HANDS: XnSkeletonProfile = 5;

pub const XN_SKEL_HEAD: XnSkeletonJoint = 1;
pub const XN_SKEL_NECK: XnSkeletonJoint = 2;
pub const XN_SKEL_TORSO: XnSkeletonJoint = 3;
pub const XN_SKEL_WAIST: XnSkeletonJoint = 4;
pub const XN_SKEL_LEFT_SHOULDER: XnSkeletonJoint = 6;
pub const XN_SKEL_LEFT_ELBOW: XnSkeletonJoint = 7;
pub const XN_SKEL_LEFT_HAND: XnSkeletonJoint = 9;
pub const XN_SKEL_RIGHT_SHOULDER: XnSkeletonJoint = 12;
pub const XN_SKEL_RIGHT_ELBOW: XnSkeletonJoint = 13;
pub const XN_SKEL_RIGHT_HAND: XnSkeletonJoint = 15;
pub const XN_SKEL_LEFT_HIP: XnSkeletonJoint = 17;
pub const XN_SKEL_LEFT_KNEE: XnSkeletonJoint = 18;
pub const XN_SKEL_LEFT_FOOT: XnSkeletonJoint = 20;
pub const XN_SKEL_RIGHT_HIP: XnSkeletonJoint = 21;
pub const XN_SKEL_RIGHT_KNEE: XnSkeletonJoint = 22;
pub const XN_SKEL_RIGHT_FOOT: XnSkeletonJoint = 24;

pub const XN_CALIBRATION_STATUS_OK: XnCalibrationStatus = 0;
pub const XN_CALIBRATION_STATUS_NO_USER: XnCalibrationStatus = 1;
pub const XN_CALIBRATION_STATUS_ARM: XnCalibrationStatus = 2;
pub const XN_CALIBRATION_STATUS_LEG: XnCalibrationStatus = 3;
pub const XN_CALIBRATION_STATUS_HEAD: XnCalibrationStatus = 4;
pub const XN_CALIBRATION_STATUS_TORSO: XnCalibrationStatus = 5;
pub const XN_CALIBRATION_STATUS_TOP_FOV: XnCalibrationStatus = 6;
pub const XN_CALIBRATION_STATUS_SIDE_FOV: XnCalibrationStatus = 7;
pub const XN_CALIBRATION_STATUS_POSE: XnCalibrationStatus = 8;
pub const XN_CALIBRATION_STATUS_MANUAL_ABORT: XnCalibrationStatus = 9;
pub const XN_CALIBRATION_STATUS_MANUAL_RESET: XnCalibrationStatus = 10;
pub const XN_CALIBRATION_STATUS_TIMEOUT_FAIL: XnCalibrationStatus = 11;

#[repr(C)]
pub struct XnContext {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XnInternalNodeData {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XnEnumerationErrors {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XnNodeQuery {
    _private: [u8; 0],
}

pub type XnNodeHandle = *mut XnInternalNodeData;
pub type XnCallbackHandle = *mut c_void;

#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct XnMapOutputMode {
    pub nXRes: XnUInt32,
    pub nYRes: XnUInt32,
    pub nFPS: XnUInt32,
}

#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct XnVector3D {
    pub X: f32,
    pub Y: f32,
    pub Z: f32,
}

#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct XnMatrix3X3 {
    pub elements: [f32; 9],
}

#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct XnSkeletonJointPosition {
    pub position: XnVector3D,
    pub fConfidence: f32,
}

#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct XnSkeletonJointOrientation {
    pub orientation: XnMatrix3X3,
    pub fConfidence: f32,
}

#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct XnSkeletonJointTransformation {
    pub position: XnSkeletonJointPosition,
    pub orientation: XnSkeletonJointOrientation,
}

pub type XnUserHandler =
    Option<unsafe extern "C" fn(hNode: XnNodeHandle, user: XnUserID, pCookie: *mut c_void)>;

pub type XnCalibrationStart =
    Option<unsafe extern "C" fn(hNode: XnNodeHandle, user: XnUserID, pCookie: *mut c_void)>;

pub type XnCalibrationComplete = Option<
    unsafe extern "C" fn(
        hNode: XnNodeHandle,
        user: XnUserID,
        calibrationError: XnCalibrationStatus,
        pCookie: *mut c_void,
    ),
>;

pub type XnPoseDetectionCallback = Option<
    unsafe extern "C" fn(
        hNode: XnNodeHandle,
        strPose: *const c_char,
        user: XnUserID,
        pCookie: *mut c_void,
    ),
>;

unsafe extern "C" {
    // context
    pub fn xnInit(ppContext: *mut *mut XnContext) -> XnStatus;
    pub fn xnInitFromXmlFileEx(
        strFileName: *const c_char,
        ppContext: *mut *mut XnContext,
        pErrors: *mut XnEnumerationErrors,
        phScriptNode: *mut XnNodeHandle,
    ) -> XnStatus;
    pub fn xnContextRelease(pContext: *mut XnContext);
    pub fn xnStartGeneratingAll(pContext: *mut XnContext) -> XnStatus;
    pub fn xnWaitOneUpdateAll(pContext: *mut XnContext, hNode: XnNodeHandle) -> XnStatus;
    pub fn xnFindExistingRefNodeByType(
        pContext: *mut XnContext,
        type_: XnProductionNodeType,
        phNode: *mut XnNodeHandle,
    ) -> XnStatus;

    // production nodes
    pub fn xnProductionNodeRelease(hNode: XnNodeHandle);
    pub fn xnIsCapabilitySupported(hInstance: XnNodeHandle, strCapabilityName: *const c_char)
        -> XnBool;
    pub fn xnIsNewDataAvailable(hInstance: XnNodeHandle, pnTimestamp: *mut XnUInt64) -> XnBool;
    pub fn xnGetFrameID(hInstance: XnNodeHandle) -> XnUInt32;
    pub fn xnGetMapOutputMode(hInstance: XnNodeHandle, pOutputMode: *mut XnMapOutputMode)
        -> XnStatus;

    // depth generator
    pub fn xnCreateDepthGenerator(
        pContext: *mut XnContext,
        phDepthGenerator: *mut XnNodeHandle,
        pQuery: *mut XnNodeQuery,
        pErrors: *mut XnEnumerationErrors,
    ) -> XnStatus;
    pub fn xnGetDepthMap(hInstance: XnNodeHandle) -> *mut XnDepthPixel;

    // user generator
    pub fn xnCreateUserGenerator(
        pContext: *mut XnContext,
        phUserGenerator: *mut XnNodeHandle,
        pQuery: *mut XnNodeQuery,
        pErrors: *mut XnEnumerationErrors,
    ) -> XnStatus;
    pub fn xnGetUsers(hInstance: XnNodeHandle, pUsers: *mut XnUserID, pnUsers: *mut XnUInt16)
        -> XnStatus;
    pub fn xnRegisterUserCallbacks(
        hInstance: XnNodeHandle,
        NewUserCB: XnUserHandler,
        LostUserCB: XnUserHandler,
        pCookie: *mut c_void,
        phCallback: *mut XnCallbackHandle,
    ) -> XnStatus;
    pub fn xnUnregisterUserCallbacks(hInstance: XnNodeHandle, hCallback: XnCallbackHandle);

    // skeleton capability
    pub fn xnIsSkeletonTracking(hInstance: XnNodeHandle, user: XnUserID) -> XnBool;
    pub fn xnGetSkeletonJoint(
        hInstance: XnNodeHandle,
        user: XnUserID,
        eJoint: XnSkeletonJoint,
        pJoint: *mut XnSkeletonJointTransformation,
    ) -> XnStatus;
    pub fn xnSetSkeletonProfile(hInstance: XnNodeHandle, eProfile: XnSkeletonProfile) -> XnStatus;
    pub fn xnRequestSkeletonCalibration(
        hInstance: XnNodeHandle,
        user: XnUserID,
        bForce: XnBool,
    ) -> XnStatus;
    pub fn xnStartSkeletonTracking(hInstance: XnNodeHandle, user: XnUserID) -> XnStatus;
    pub fn xnNeedPoseForSkeletonCalibration(hInstance: XnNodeHandle) -> XnBool;
    pub fn xnGetSkeletonCalibrationPose(hInstance: XnNodeHandle, strPose: *mut c_char) -> XnStatus;
    pub fn xnRegisterToCalibrationStart(
        hInstance: XnNodeHandle,
        handler: XnCalibrationStart,
        pCookie: *mut c_void,
        phCallback: *mut XnCallbackHandle,
    ) -> XnStatus;
    pub fn xnUnregisterFromCalibrationStart(hInstance: XnNodeHandle, hCallback: XnCallbackHandle);
    pub fn xnRegisterToCalibrationComplete(
        hInstance: XnNodeHandle,
        handler: XnCalibrationComplete,
        pCookie: *mut c_void,
        phCallback: *mut XnCallbackHandle,
    ) -> XnStatus;
    pub fn xnUnregisterFromCalibrationComplete(
        hInstance: XnNodeHandle,
        hCallback: XnCallbackHandle,
    );

    // pose detection capability
    pub fn xnStartPoseDetection(
        hInstance: XnNodeHandle,
        strPose: *const c_char,
        user: XnUserID,
    ) -> XnStatus;
    pub fn xnStopPoseDetection(hInstance: XnNodeHandle, user: XnUserID) -> XnStatus;
    pub fn xnRegisterToPoseDetected(
        hInstance: XnNodeHandle,
        handler: XnPoseDetectionCallback,
        pCookie: *mut c_void,
        phCallback: *mut XnCallbackHandle,
    ) -> XnStatus;
    pub fn xnUnregisterFromPoseDetected(hInstance: XnNodeHandle, hCallback: XnCallbackHandle);

    // errors
    pub fn xnGetStatusString(Status: XnStatus) -> *const c_char;
    pub fn xnEnumerationErrorsAllocate(ppErrors: *mut *mut XnEnumerationErrors) -> XnStatus;
    pub fn xnEnumerationErrorsFree(pErrors: *const XnEnumerationErrors);
    pub fn xnEnumerationErrorsToString(
        pErrors: *const XnEnumerationErrors,
        csBuffer: *mut c_char,
        nSize: XnUInt32,
    ) -> XnStatus;
}
