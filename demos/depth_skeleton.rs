/*!
Opens a sensor with OpenNI and prints what one of the two pipelines reads: the depth in the middle of the frame, or the torso position of every user in the scene.
*/

use std::{io::Write, time::Instant};

use clap::{Parser, Subcommand};
use log::LevelFilter;
use openni_rust::{native::OpenNi, Session, Settings};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

#[derive(Parser)]
#[command(about = "Reads depth or skeleton data from an OpenNI sensor")]
struct Args {
    #[command(subcommand)]
    pipeline: Pipeline,

    /// Number of frames to read before shutting down
    #[arg(long, default_value_t = 300)]
    frames: u64,

    /// Log lifecycle and calibration events
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Pipeline {
    /// Depth in the middle of the frame, or at --x/--y
    Depth {
        #[arg(long, requires = "y")]
        x: Option<u32>,
        #[arg(long, requires = "x")]
        y: Option<u32>,
    },
    /// Torso position of every user
    Skeleton,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };
    TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto)?;

    let mut session = Session::new(OpenNi::new());

    match args.pipeline {
        Pipeline::Depth { x, y } => {
            session.init_depth()?;
            let resolution = session.depth_resolution()?;
            println!("resolution: {}x{}", resolution.width(), resolution.height());

            let mut counter = Counter::new(30);
            for _ in 0..args.frames {
                let reading = match (x, y) {
                    (Some(x), Some(y)) => session.depth_point(x, y)?,
                    _ => session.depth_middle()?,
                };
                counter.tick(&format!("depth: {:5} mm", reading.depth_mm));
            }
            session.depth_close();
        }
        Pipeline::Skeleton => {
            session.init_skeleton(&Settings::default())?;

            let mut counter = Counter::new(30);
            for _ in 0..args.frames {
                let joints = session.skeleton_head_position()?;
                let info = joints
                    .iter()
                    .map(|j| {
                        let [x, y, z] = j.position.to_array();
                        format!("user {}: ({x:7.1}, {y:7.1}, {z:7.1})", j.user)
                    })
                    .collect::<Vec<_>>()
                    .join("  ");
                counter.tick(&info);
            }
            session.skeleton_close();
        }
    }
    println!();

    Ok(())
}

/// Prints `info` with fps and frame count every `info_interval`th frame.
struct Counter {
    count: u64,
    now: Instant,
    info_interval: u64,
}
impl Counter {
    fn new(info_interval: u64) -> Self {
        Self {
            count: 0,
            now: Instant::now(),
            info_interval,
        }
    }

    fn tick(&mut self, info: &str) {
        self.count += 1;
        if self.count % self.info_interval == 0 {
            let elapsed = self.now.elapsed().as_secs_f64();
            self.now = Instant::now();
            print!(
                "  fps: {:.1}  frame: {}  {}\r",
                self.info_interval as f64 / elapsed,
                self.count,
                info
            );
            let _ = std::io::stdout().flush();
        }
    }
}
