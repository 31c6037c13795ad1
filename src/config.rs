//! Settings of the pipelines and discovery of the XML configuration file.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use log::info;

use crate::{
    error::{Error, Result},
    sdk::{Joint, SkeletonProfile},
};

/// Configuration file next to the samples of an OpenNI installation, relative to the working directory.
pub const SAMPLE_XML_PATH: &str = "../Config/SamplesConfig.xml";
/// Configuration file in the working directory.
pub const SAMPLE_XML_PATH_LOCAL: &str = "SamplesConfig.xml";

/// Maximum number of user slots reported by `SkeletonPipeline::head_position()`.
pub const MAX_USERS: usize = 15;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// XML configuration candidates, probed in order.
    pub config_candidates: Vec<PathBuf>,
    pub max_users: usize,
    /// Maximum time to wait for the next update, `None` blocks until data arrives.
    pub update_timeout: Option<Duration>,
    /// Joint reported per user.
    pub joint: Joint,
    pub profile: SkeletonProfile,
}
impl Default for Settings {
    fn default() -> Self {
        Self {
            config_candidates: vec![
                PathBuf::from(SAMPLE_XML_PATH),
                PathBuf::from(SAMPLE_XML_PATH_LOCAL),
            ],
            max_users: MAX_USERS,
            update_timeout: None,
            joint: Joint::Torso,
            profile: SkeletonProfile::All,
        }
    }
}
impl Settings {
    /// Default settings looking for the configuration file relative to `dir` instead of the working directory.
    pub fn with_base_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            config_candidates: vec![dir.join(SAMPLE_XML_PATH), dir.join(SAMPLE_XML_PATH_LOCAL)],
            ..Self::default()
        }
    }

    pub fn update_timeout(mut self, timeout: Duration) -> Self {
        self.update_timeout = Some(timeout);
        self
    }

    pub fn joint(mut self, joint: Joint) -> Self {
        self.joint = joint;
        self
    }
}

/// Returns the first of `candidates` that exists.
pub fn locate_config(candidates: &[PathBuf]) -> Result<PathBuf> {
    for path in candidates {
        // unreadable parent directories count as missing
        if path.try_exists().unwrap_or(false) {
            info!("reading config from: '{}'", path.display());
            return Ok(path.clone());
        }
    }
    Err(Error::ConfigNotFound {
        candidates: candidates.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::STATUS_NODE_NOT_FOUND;
    use std::fs;

    /// Creates `<tmp>/<name>/bin` as working directory and `<tmp>/<name>/Config` as its sibling.
    fn layout(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("openni-rust-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join("bin")).unwrap();
        fs::create_dir_all(root.join("Config")).unwrap();
        root
    }

    #[test]
    fn parent_config_wins_over_local() {
        let root = layout("both");
        fs::write(root.join("Config/SamplesConfig.xml"), "<OpenNI/>").unwrap();
        fs::write(root.join("bin/SamplesConfig.xml"), "<OpenNI/>").unwrap();

        let settings = Settings::with_base_dir(root.join("bin"));
        let found = locate_config(&settings.config_candidates).unwrap();
        assert_eq!(found, root.join("bin").join(SAMPLE_XML_PATH));

        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn local_config_is_the_fallback() {
        let root = layout("local");
        fs::write(root.join("bin/SamplesConfig.xml"), "<OpenNI/>").unwrap();

        let settings = Settings::with_base_dir(root.join("bin"));
        let found = locate_config(&settings.config_candidates).unwrap();
        assert_eq!(found, root.join("bin").join(SAMPLE_XML_PATH_LOCAL));

        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn missing_config_is_node_not_found() {
        let root = layout("none");

        let settings = Settings::with_base_dir(root.join("bin"));
        let err = locate_config(&settings.config_candidates).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { ref candidates } if candidates.len() == 2));
        assert_eq!(err.status(), STATUS_NODE_NOT_FOUND);

        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert_eq!(
            settings.config_candidates,
            vec![
                PathBuf::from("../Config/SamplesConfig.xml"),
                PathBuf::from("SamplesConfig.xml")
            ]
        );
        assert_eq!(settings.max_users, 15);
        assert_eq!(settings.update_timeout, None);
        assert_eq!(settings.joint, Joint::Torso);
        assert_eq!(settings.profile, SkeletonProfile::All);
    }
}
