use anyhow::{bail, Result};
use clap::Parser;
use human_tracker::prelude::*;
use log::{info, warn};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Tracks persons over a directory of frames and saves the annotated frames
#[derive(Parser)]
struct Args {
    /// ONNX detection model
    #[arg(long)]
    model: PathBuf,

    /// Optional network configuration with the input size
    #[arg(long)]
    config: Option<PathBuf>,

    /// Class names, one per line
    #[arg(long)]
    classes: PathBuf,

    /// Directory with the frames, processed in the file name order
    #[arg(long)]
    input: PathBuf,

    /// Directory for the annotated frames
    #[arg(long)]
    output: PathBuf,

    /// Stop after the number of seconds
    #[arg(long)]
    seconds: Option<u64>,

    /// Treat detections with IoU below the threshold as new objects
    #[arg(long, value_parser = unit_interval)]
    iou: Option<f32>,

    /// Assign detections to tracks one-to-one, requires --iou
    #[arg(long)]
    hungarian: bool,

    #[arg(long, default_value_t = 0.5, value_parser = unit_interval)]
    conf: f32,

    #[arg(long, default_value_t = 0.4, value_parser = unit_interval)]
    nms: f32,
}

/// Parses a threshold within `[0, 1]`
fn unit_interval(s: &str) -> Result<f32, String> {
    let value = s
        .parse::<f32>()
        .map_err(|e| format!("`{}` is not a number: {}", s, e))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{} is not within [0, 1]", value))
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let association = match (args.iou, args.hungarian) {
        (None, false) => AssociationPolicy::AnyOverlap,
        (Some(t), false) => AssociationPolicy::IoU(t),
        (Some(t), true) => AssociationPolicy::Hungarian(t),
        (None, true) => bail!("--hungarian requires --iou"),
    };

    let paths = match &args.config {
        Some(config) => ModelPaths::new(&args.model, config, &args.classes),
        None => ModelPaths::without_config(&args.model, &args.classes),
    };
    let detector_options = DetectorOptions::default()
        .confidence_threshold(args.conf)
        .nms_threshold(args.nms);
    let options = HumanDetectorTrackerOptions::default().association(association);
    let mut tracker = HumanDetectorTracker::new(&paths, detector_options, options)?;

    let mut frames = std::fs::read_dir(&args.input)?
        .map(|e| e.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    frames.retain(|p| p.is_file());
    frames.sort();
    std::fs::create_dir_all(&args.output)?;

    let budget = args.seconds.map(Duration::from_secs);
    let started = Instant::now();

    for path in frames {
        if budget.map(|b| started.elapsed() >= b).unwrap_or(false) {
            info!("Time budget is exhausted");
            break;
        }

        let mut frame = match image::open(&path) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        let now = Instant::now();
        let humans = tracker.process_frame(&mut frame)?;
        info!(
            "{}: {} humans, {} ms",
            path.display(),
            humans.len(),
            now.elapsed().as_millis()
        );

        if let Some(name) = path.file_name() {
            frame.save(args.output.join(name))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{unit_interval, Args};
    use clap::Parser;

    #[test]
    fn thresholds() {
        assert_eq!(unit_interval("0.25"), Ok(0.25));
        assert_eq!(unit_interval("1"), Ok(1.0));
        assert!(unit_interval("1.5").is_err());
        assert!(unit_interval("-0.1").is_err());
        assert!(unit_interval("NaN").is_err());
        assert!(unit_interval("high").is_err());
    }

    #[test]
    fn out_of_range_arguments_rejected() {
        let base = [
            "image_sequence",
            "--model",
            "yolo.onnx",
            "--classes",
            "coco.names",
            "--input",
            "frames",
            "--output",
            "annotated",
        ];
        let args = Args::try_parse_from(base).unwrap();
        assert_eq!(args.conf, 0.5);
        assert_eq!(args.nms, 0.4);

        for bad in [["--conf", "1.5"], ["--nms", "-1"], ["--iou", "2"]] {
            let res = Args::try_parse_from(base.iter().chain(bad.iter()));
            assert!(res.is_err(), "{:?}", bad);
        }
    }
}
