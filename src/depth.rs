//! Depth pipeline: a context with a single depth generator, read one pixel (or the resolution) per update.

use std::time::Duration;

use log::{error, info};

use crate::{
    error::{check, Error, Result},
    frame::{DepthFrame, DepthReading, Resolution},
    sdk::Backend,
};

/// Handles of the depth pipeline. All reads block until the depth generator delivers a new frame.
pub struct DepthPipeline<B: Backend> {
    context: Option<B::Context>,
    depth: Option<B::Node>,
    frame_id: Option<u32>,
    update_timeout: Option<Duration>,
}

impl<B: Backend> Default for DepthPipeline<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> DepthPipeline<B> {
    pub fn new() -> Self {
        Self {
            context: None,
            depth: None,
            frame_id: None,
            update_timeout: None,
        }
    }

    /// Maximum time a read waits for the next frame, `None` to wait forever.
    pub fn set_update_timeout(&mut self, timeout: Option<Duration>) {
        self.update_timeout = timeout;
    }

    pub fn is_open(&self) -> bool {
        self.depth.is_some()
    }

    /// Frame id of the last frame read, `None` before the first read.
    pub fn last_frame_id(&self) -> Option<u32> {
        self.frame_id
    }

    /// Releases anything opened before, then opens a context, creates a depth generator, and starts generating. On failure the handles created so far stay with the pipeline until `close()`.
    pub fn init(&mut self, backend: &mut B) -> Result<()> {
        self.close(backend);

        let context = check(backend.init_context(), "Initialize context")?;
        self.context = Some(context);

        let depth = check(
            backend.create_depth_generator(context),
            "Create depth generator",
        )?;
        self.depth = Some(depth);

        check(backend.start_generating_all(context), "StartGeneratingAll")?;

        info!("depth pipeline started");
        Ok(())
    }

    /// Depth in the middle of the next frame.
    pub fn middle(&mut self, backend: &mut B) -> Result<DepthReading> {
        let frame = self.next_frame(backend)?;
        let (x, y) = frame.resolution.center();
        read_pixel(&frame, x, y)
    }

    /// Depth at pixel `(x, y)` of the next frame.
    pub fn point(&mut self, backend: &mut B, x: u32, y: u32) -> Result<DepthReading> {
        let frame = self.next_frame(backend)?;
        read_pixel(&frame, x, y)
    }

    /// Resolution of the next frame.
    pub fn resolution(&mut self, backend: &mut B) -> Result<Resolution> {
        Ok(self.next_frame(backend)?.resolution)
    }

    /// Releases the depth generator, then the context. Does nothing if nothing is open.
    pub fn close(&mut self, backend: &mut B) {
        if let Some(depth) = self.depth.take() {
            backend.release_node(depth);
        }
        if let Some(context) = self.context.take() {
            backend.release_context(context);
            info!("depth pipeline closed");
        }
        self.frame_id = None;
    }

    // private functions_______________________________________________________

    /// Waits for the next depth frame and records its id.
    fn next_frame<'b>(&mut self, backend: &'b mut B) -> Result<DepthFrame<'b>> {
        let (Some(context), Some(depth)) = (self.context, self.depth) else {
            return Err(Error::NotInitialized("depth"));
        };

        if let Err(err) = backend.wait_one_update_all(context, depth, self.update_timeout) {
            error!("{err}");
            return Err(err);
        }

        let backend: &'b B = backend;
        let frame = check(backend.depth_frame(depth), "Get depth metadata")?;
        self.frame_id = Some(frame.frame_id);
        Ok(frame)
    }
}

fn read_pixel(frame: &DepthFrame<'_>, x: u32, y: u32) -> Result<DepthReading> {
    let depth_mm = frame.at(x, y).ok_or(Error::OutOfBounds {
        x,
        y,
        width: frame.resolution.width(),
        height: frame.resolution.height(),
    })?;
    Ok(DepthReading {
        frame_id: frame.frame_id,
        depth_mm,
    })
}
