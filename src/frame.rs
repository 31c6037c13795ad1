//! Frame data handed out by the pipelines.

use crate::calibration::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    width: u32,
    height: u32,
}
impl Resolution {
    pub const fn new(w: u32, h: u32) -> Self {
        Self {
            width: w,
            height: h,
        }
    }
    pub const fn width(&self) -> u32 {
        self.width
    }
    pub const fn height(&self) -> u32 {
        self.height
    }
    pub fn to_array(&self) -> [u32; 2] {
        [self.width, self.height]
    }
    pub fn to_tuple(&self) -> (u32, u32) {
        (self.width, self.height)
    }
    pub const fn to_pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
    /// Pixel in the middle of the frame, rounded down.
    pub const fn center(&self) -> (u32, u32) {
        (self.width / 2, self.height / 2)
    }
}

/// Depth map of the latest update. `pixels` holds depths in mm, row by row.
#[derive(Debug, Clone, Copy)]
pub struct DepthFrame<'a> {
    pub frame_id: u32,
    pub resolution: Resolution,
    pub pixels: &'a [u16],
}
impl DepthFrame<'_> {
    /// Depth at pixel `(x, y)`, `None` if the pixel lies outside the frame.
    pub fn at(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.resolution.width || y >= self.resolution.height {
            return None;
        }
        let i = y as usize * self.resolution.width as usize + x as usize;
        self.pixels.get(i).copied()
    }
}

/// Depth of a single pixel together with the frame it was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthReading {
    pub frame_id: u32,
    pub depth_mm: u16,
}

/// Position in real world coordinates (mm) as reported by the skeleton capability.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}
impl Position {
    pub const ZERO: Position = Position::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
    pub fn to_array(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

/// Joint position of one user slot. Users not (yet) tracked report `Position::ZERO`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserJoint {
    pub user: UserId,
    pub tracked: bool,
    pub position: Position,
    pub confidence: f32,
}
