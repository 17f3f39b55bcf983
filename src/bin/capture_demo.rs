//! capture_demo - pull frames from a capture source through the acquisition node

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use frameflow::config::{KEY_FPS, KEY_HEIGHT, KEY_SOURCE, KEY_WIDTH};
use frameflow::{FrameAcquisitionNode, Node, NodeConfig, NodeData};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Capture source: camera index, video file path, or stub:// URI.
    #[arg(long, default_value = "stub://demo?frames=65")]
    source: String,
    /// Number of frames to pull before teardown.
    #[arg(long, default_value_t = 30)]
    frames: u64,
    #[arg(long, default_value_t = 640)]
    width: u32,
    #[arg(long, default_value_t = 480)]
    height: u32,
    #[arg(long, default_value_t = 30)]
    fps: u32,
    /// Optional JSON config file; flags above override its keys.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let base = match &args.config {
        Some(path) => NodeConfig::from_file(path)?,
        None => NodeConfig::new("capture-demo"),
    };
    let config = base
        .with(KEY_SOURCE, args.source.as_str())
        .with(KEY_WIDTH, args.width)
        .with(KEY_HEIGHT, args.height)
        .with(KEY_FPS, args.fps);

    let mut node = FrameAcquisitionNode::new(config);
    node.setup()?;

    for _ in 0..args.frames {
        match node.invoke(NodeData::Empty) {
            Ok(NodeData::Frame(record)) => println!(
                "frame {:>5}  {}x{}x{}  t={}",
                record.frame_id,
                record.shape.width,
                record.shape.height,
                record.shape.channels,
                record.timestamp_s
            ),
            Ok(NodeData::Empty) => {}
            Err(err) => {
                eprintln!("stopping: {}", err);
                break;
            }
        }
    }

    node.teardown();

    println!("-- metrics --");
    for (name, value) in node.metrics().iter() {
        println!("{} = {}", name, value);
    }
    Ok(())
}
