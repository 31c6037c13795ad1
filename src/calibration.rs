//! Per-user calibration driven by the user generator's callbacks.
//!
//! The SDK reports new and lost users, detected poses, and the start and end of skeleton calibration. Each event moves the user through
//!
//! `Uncalibrated -> PoseRequested (if a pose is required) -> Calibrating -> Tracking`
//!
//! and may ask the SDK to act (start pose detection, request calibration, start tracking). Failed calibrations are retried unless they were aborted manually.

use std::collections::HashMap;

use log::{info, warn};

/// Id the SDK assigns to a detected user.
pub type UserId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalibrationState {
    #[default]
    Uncalibrated,
    PoseRequested,
    Calibrating,
    Tracking,
    /// Calibration was aborted manually, no further attempts are made.
    Failed,
}

/// Outcome of a calibration attempt as reported by the SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationStatus {
    Ok,
    NoUser,
    Arm,
    Leg,
    Head,
    Torso,
    TopFov,
    SideFov,
    Pose,
    ManualAbort,
    ManualReset,
    TimeoutFail,
    Other(i32),
}
impl CalibrationStatus {
    pub fn from_raw(status: i32) -> Self {
        match status {
            0 => Self::Ok,
            1 => Self::NoUser,
            2 => Self::Arm,
            3 => Self::Leg,
            4 => Self::Head,
            5 => Self::Torso,
            6 => Self::TopFov,
            7 => Self::SideFov,
            8 => Self::Pose,
            9 => Self::ManualAbort,
            10 => Self::ManualReset,
            11 => Self::TimeoutFail,
            other => Self::Other(other),
        }
    }
}

/// Callback events of the user generator, in the order they fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingEvent {
    NewUser(UserId),
    LostUser(UserId),
    PoseDetected { user: UserId, pose: String },
    CalibrationStarted(UserId),
    CalibrationComplete {
        user: UserId,
        status: CalibrationStatus,
    },
}
impl TrackingEvent {
    pub fn user(&self) -> UserId {
        match self {
            TrackingEvent::NewUser(user)
            | TrackingEvent::LostUser(user)
            | TrackingEvent::CalibrationStarted(user) => *user,
            TrackingEvent::PoseDetected { user, .. }
            | TrackingEvent::CalibrationComplete { user, .. } => *user,
        }
    }
}

/// Request to the SDK resulting from a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartPoseDetection { pose: String, user: UserId },
    StopPoseDetection(UserId),
    /// Always forced, cancelling a calibration already running for the user.
    RequestCalibration(UserId),
    StartTracking(UserId),
}

/// Whether the user must hold a pose before calibration can start.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PosePolicy {
    #[default]
    NotRequired,
    Required(String),
}
impl PosePolicy {
    /// Next step to get `user` calibrated: wait for the pose or calibrate right away.
    fn begin(&self, user: UserId) -> (CalibrationState, Command) {
        match self {
            PosePolicy::Required(pose) => (
                CalibrationState::PoseRequested,
                Command::StartPoseDetection {
                    pose: pose.clone(),
                    user,
                },
            ),
            PosePolicy::NotRequired => (
                CalibrationState::Calibrating,
                Command::RequestCalibration(user),
            ),
        }
    }
}

/// Applies `event` to a user currently in `state`. Returns the user's next state and the commands to send to the SDK, in order.
pub fn transition(
    state: CalibrationState,
    event: &TrackingEvent,
    policy: &PosePolicy,
) -> (CalibrationState, Vec<Command>) {
    match event {
        TrackingEvent::NewUser(user) => {
            let (next, command) = policy.begin(*user);
            (next, vec![command])
        }
        TrackingEvent::LostUser(_) => (state, Vec::new()),
        TrackingEvent::PoseDetected { user, .. } => (
            CalibrationState::Calibrating,
            vec![
                Command::StopPoseDetection(*user),
                Command::RequestCalibration(*user),
            ],
        ),
        TrackingEvent::CalibrationStarted(_) => (CalibrationState::Calibrating, Vec::new()),
        TrackingEvent::CalibrationComplete { user, status } => match status {
            CalibrationStatus::Ok => (
                CalibrationState::Tracking,
                vec![Command::StartTracking(*user)],
            ),
            CalibrationStatus::ManualAbort => (CalibrationState::Failed, Vec::new()),
            _ => {
                let (next, command) = policy.begin(*user);
                (next, vec![command])
            }
        },
    }
}

/// Calibration states of all users known to one user generator.
#[derive(Debug, Default)]
pub struct UserTracker {
    policy: PosePolicy,
    users: HashMap<UserId, CalibrationState>,
}
impl UserTracker {
    pub fn new(policy: PosePolicy) -> Self {
        Self {
            policy,
            users: HashMap::new(),
        }
    }

    pub fn policy(&self) -> &PosePolicy {
        &self.policy
    }

    /// State of `user`, `None` if the user is unknown or was lost.
    pub fn state(&self, user: UserId) -> Option<CalibrationState> {
        self.users.get(&user).copied()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Applies one event and returns the commands the SDK has to carry out.
    pub fn apply(&mut self, event: &TrackingEvent) -> Vec<Command> {
        let user = event.user();
        log_event(event);

        let state = self.state(user).unwrap_or_default();
        let (next, commands) = transition(state, event, &self.policy);

        // ids are recycled by the SDK, a lost user starts over when seen again
        if let TrackingEvent::LostUser(_) = event {
            self.users.remove(&user);
        } else {
            self.users.insert(user, next);
        }
        commands
    }

    pub fn clear(&mut self) {
        self.users.clear();
    }
}

fn log_event(event: &TrackingEvent) {
    match event {
        TrackingEvent::NewUser(user) => info!("new user {user}"),
        TrackingEvent::LostUser(user) => info!("lost user {user}"),
        TrackingEvent::PoseDetected { user, pose } => {
            info!("pose {pose} detected for user {user}")
        }
        TrackingEvent::CalibrationStarted(user) => info!("calibration started for user {user}"),
        TrackingEvent::CalibrationComplete { user, status } => match status {
            CalibrationStatus::Ok => info!("calibration complete, start tracking user {user}"),
            CalibrationStatus::ManualAbort => {
                warn!("calibration failed for user {user}: manual abort, no further attempts")
            }
            status => warn!("calibration failed for user {user}: {status:?}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn psi() -> PosePolicy {
        PosePolicy::Required("Psi".to_string())
    }

    #[test]
    fn new_user_starts_pose_detection_when_pose_is_required() {
        let (next, commands) = transition(
            CalibrationState::Uncalibrated,
            &TrackingEvent::NewUser(1),
            &psi(),
        );
        assert_eq!(next, CalibrationState::PoseRequested);
        assert_eq!(
            commands,
            vec![Command::StartPoseDetection {
                pose: "Psi".to_string(),
                user: 1
            }]
        );
    }

    #[test]
    fn new_user_requests_calibration_without_pose() {
        let (next, commands) = transition(
            CalibrationState::Uncalibrated,
            &TrackingEvent::NewUser(4),
            &PosePolicy::NotRequired,
        );
        assert_eq!(next, CalibrationState::Calibrating);
        assert_eq!(commands, vec![Command::RequestCalibration(4)]);
    }

    #[test]
    fn detected_pose_stops_detection_then_calibrates() {
        let event = TrackingEvent::PoseDetected {
            user: 2,
            pose: "Psi".to_string(),
        };
        let (next, commands) = transition(CalibrationState::PoseRequested, &event, &psi());
        assert_eq!(next, CalibrationState::Calibrating);
        assert_eq!(
            commands,
            vec![Command::StopPoseDetection(2), Command::RequestCalibration(2)]
        );
    }

    #[test]
    fn successful_calibration_starts_tracking_once() {
        for policy in [psi(), PosePolicy::NotRequired] {
            let event = TrackingEvent::CalibrationComplete {
                user: 3,
                status: CalibrationStatus::Ok,
            };
            let (next, commands) = transition(CalibrationState::Calibrating, &event, &policy);
            assert_eq!(next, CalibrationState::Tracking);
            assert_eq!(commands, vec![Command::StartTracking(3)]);
        }
    }

    #[test]
    fn failed_calibration_retries_once() {
        let failures = [
            CalibrationStatus::NoUser,
            CalibrationStatus::Arm,
            CalibrationStatus::Torso,
            CalibrationStatus::ManualReset,
            CalibrationStatus::TimeoutFail,
            CalibrationStatus::Other(42),
        ];
        for status in failures {
            let event = TrackingEvent::CalibrationComplete { user: 5, status };

            let (next, commands) = transition(CalibrationState::Calibrating, &event, &psi());
            assert_eq!(next, CalibrationState::PoseRequested);
            assert_eq!(
                commands,
                vec![Command::StartPoseDetection {
                    pose: "Psi".to_string(),
                    user: 5
                }]
            );

            let (next, commands) =
                transition(CalibrationState::Calibrating, &event, &PosePolicy::NotRequired);
            assert_eq!(next, CalibrationState::Calibrating);
            assert_eq!(commands, vec![Command::RequestCalibration(5)]);
        }
    }

    #[test]
    fn manual_abort_is_terminal() {
        let event = TrackingEvent::CalibrationComplete {
            user: 6,
            status: CalibrationStatus::ManualAbort,
        };
        for policy in [psi(), PosePolicy::NotRequired] {
            let (next, commands) = transition(CalibrationState::Calibrating, &event, &policy);
            assert_eq!(next, CalibrationState::Failed);
            assert!(commands.is_empty());
        }
    }

    #[test]
    fn calibration_start_and_lost_user_issue_nothing() {
        let (next, commands) = transition(
            CalibrationState::Calibrating,
            &TrackingEvent::CalibrationStarted(7),
            &psi(),
        );
        assert_eq!(next, CalibrationState::Calibrating);
        assert!(commands.is_empty());

        let (next, commands) = transition(
            CalibrationState::Tracking,
            &TrackingEvent::LostUser(7),
            &psi(),
        );
        assert_eq!(next, CalibrationState::Tracking);
        assert!(commands.is_empty());
    }

    #[test]
    fn raw_status_codes() {
        assert_eq!(CalibrationStatus::from_raw(0), CalibrationStatus::Ok);
        assert_eq!(CalibrationStatus::from_raw(9), CalibrationStatus::ManualAbort);
        assert_eq!(CalibrationStatus::from_raw(11), CalibrationStatus::TimeoutFail);
        assert_eq!(CalibrationStatus::from_raw(99), CalibrationStatus::Other(99));
    }

    #[test]
    fn tracker_follows_a_user_to_tracking_and_forgets_lost_users() {
        let mut tracker = UserTracker::new(psi());

        tracker.apply(&TrackingEvent::NewUser(1));
        assert_eq!(tracker.state(1), Some(CalibrationState::PoseRequested));

        tracker.apply(&TrackingEvent::PoseDetected {
            user: 1,
            pose: "Psi".to_string(),
        });
        tracker.apply(&TrackingEvent::CalibrationStarted(1));
        assert_eq!(tracker.state(1), Some(CalibrationState::Calibrating));

        let commands = tracker.apply(&TrackingEvent::CalibrationComplete {
            user: 1,
            status: CalibrationStatus::Ok,
        });
        assert_eq!(commands, vec![Command::StartTracking(1)]);
        assert_eq!(tracker.state(1), Some(CalibrationState::Tracking));

        tracker.apply(&TrackingEvent::LostUser(1));
        assert_eq!(tracker.state(1), None);
        assert!(tracker.is_empty());
    }
}
