#![doc = include_str!("../README.md")]
// #![warn(missing_docs)]

pub mod calibration;
pub mod config;
pub mod depth;
pub mod error;
pub mod frame;
pub mod mock;
#[cfg(feature = "openni")]
pub mod native;
pub mod sdk;
pub mod session;
pub mod skeleton;

pub use crate::{
    calibration::{CalibrationState, CalibrationStatus, PosePolicy, TrackingEvent, UserId},
    config::Settings,
    error::{Error, Result, SdkError, Status},
    frame::{DepthReading, Position, Resolution, UserJoint},
    sdk::{Backend, Joint, SkeletonProfile},
    session::Session,
};
