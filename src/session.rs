use crate::{
    config::Settings,
    depth::DepthPipeline,
    error::Result,
    frame::{DepthReading, Resolution, UserJoint},
    sdk::Backend,
    skeleton::SkeletonPipeline,
};

/**
The caller-facing entry point: one backend with a depth and a skeleton pipeline.

Only one pipeline is active at a time. Initializing either pipeline first closes both, since both open the same sensor through separate contexts. Dropping the session closes whatever is still open.

```no_run
# #[cfg(feature = "openni")]
# fn run() -> Result<(), openni_rust::Error> {
use openni_rust::{native::OpenNi, Session, Settings};

let mut session = Session::new(OpenNi::new());
session.init_skeleton(&Settings::default())?;
loop {
    for joint in session.skeleton_head_position()? {
        println!("user {}: {:?}", joint.user, joint.position);
    }
}
# }
```
*/
pub struct Session<B: Backend> {
    backend: B,
    depth: DepthPipeline<B>,
    skeleton: SkeletonPipeline<B>,
}

impl<B: Backend> Session<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            depth: DepthPipeline::new(),
            skeleton: SkeletonPipeline::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn depth(&self) -> &DepthPipeline<B> {
        &self.depth
    }

    pub fn skeleton(&self) -> &SkeletonPipeline<B> {
        &self.skeleton
    }

    // depth __________________________________________________________________

    /// Closes both pipelines and starts the depth pipeline.
    pub fn init_depth(&mut self) -> Result<()> {
        self.depth_close();
        self.skeleton_close();
        self.depth.init(&mut self.backend)
    }

    /// Same as [`Session::init_depth`], with reads giving up after `settings.update_timeout`.
    pub fn init_depth_with(&mut self, settings: &Settings) -> Result<()> {
        self.depth.set_update_timeout(settings.update_timeout);
        self.init_depth()
    }

    pub fn depth_middle(&mut self) -> Result<DepthReading> {
        self.depth.middle(&mut self.backend)
    }

    pub fn depth_point(&mut self, x: u32, y: u32) -> Result<DepthReading> {
        self.depth.point(&mut self.backend, x, y)
    }

    pub fn depth_resolution(&mut self) -> Result<Resolution> {
        self.depth.resolution(&mut self.backend)
    }

    pub fn depth_close(&mut self) {
        self.depth.close(&mut self.backend);
    }

    // skeleton _______________________________________________________________

    /// Closes both pipelines and starts the skeleton pipeline.
    pub fn init_skeleton(&mut self, settings: &Settings) -> Result<()> {
        self.depth_close();
        self.skeleton_close();
        self.skeleton.init(&mut self.backend, settings)
    }

    pub fn skeleton_head_position(&mut self) -> Result<Vec<UserJoint>> {
        self.skeleton.head_position(&mut self.backend)
    }

    pub fn skeleton_close(&mut self) {
        self.skeleton.close(&mut self.backend);
    }
}

impl<B: Backend> Drop for Session<B> {
    fn drop(&mut self) {
        self.depth_close();
        self.skeleton_close();
    }
}
