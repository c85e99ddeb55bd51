// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # Roboframe CLI
//!
//! Create a new bag from an existing one, replacing the frame ids of the
//! requested topics.
//!
//! ## Usage
//!
//! ```sh
//! # One frame id for every topic
//! roboframe -i in.bag -o out.bag -f base_link -t /imu /velodyne_points
//!
//! # One frame id per topic
//! roboframe -i in.bag -o out.bag -f imu_link laser -t /imu /scan
//!
//! # Mapping from a TOML file, compressed output
//! roboframe -i in.bag -o out.bag -c frames.toml --compression lz4
//! ```

mod common;

use std::path::PathBuf;
use std::process;
use std::time::Instant;

use anyhow::Context;
use clap::{ArgAction, Parser};
use serde::Serialize;
use tracing::info;

use common::{format_duration, init_logging, ProgressBar, Result};
use roboframe::io::formats::bag::DEFAULT_CHUNK_THRESHOLD;
use roboframe::{
    BagRewriter, Compression, FrameIdConfig, FrameIdMapping, RewriteOptions, RewriteStats,
    WriterOptions,
};

/// Replace header frame ids of selected topics in a ROS1 bag.
#[derive(Parser, Clone, Debug)]
#[command(name = "roboframe")]
#[command(
    about = "Create a new bagfile from an existing one replacing the frame ids of requested topics",
    long_about = None
)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "ArcheBase")]
struct Cli {
    /// Input bagfile
    #[arg(short = 'i', long = "input", value_name = "INPUT_BAGFILE")]
    input: PathBuf,

    /// Output bagfile
    #[arg(short = 'o', long = "output", value_name = "OUTPUT_BAGFILE")]
    output: PathBuf,

    /// Desired frame ids. With one frame id, all topics are changed to it;
    /// with more, one topic per frame id is expected.
    #[arg(
        short = 'f',
        long = "frame-id",
        value_name = "FRAME_ID",
        num_args = 1..,
        required_unless_present = "config"
    )]
    frame_ids: Vec<String>,

    /// Topic(s) to change
    #[arg(
        short = 't',
        long = "topics",
        value_name = "TOPIC",
        num_args = 1..,
        required_unless_present = "config"
    )]
    topics: Vec<String>,

    /// TOML file with the topic to frame id mapping
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        conflicts_with_all = ["frame_ids", "topics"]
    )]
    config: Option<PathBuf>,

    /// Chunk compression of the output (none, bz2, lz4)
    #[arg(long, value_name = "FORMAT", default_value = "none")]
    compression: Compression,

    /// Uncompressed chunk size of the output in bytes
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_CHUNK_THRESHOLD)]
    chunk_size: usize,

    /// Entries buffered between the reader thread and the writer (0 = single thread, at most 4096)
    #[arg(long, value_name = "N", default_value_t = 0)]
    pipeline_depth: usize,

    /// Print statistics as JSON
    #[arg(long)]
    json: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    quiet: bool,
}

/// Machine-readable run report.
#[derive(Serialize)]
struct Report<'a> {
    input: String,
    output: String,
    mapping: Vec<(&'a str, &'a str)>,
    stats: &'a RewriteStats,
    elapsed_ms: u128,
}

fn resolve_mapping(cli: &Cli) -> Result<FrameIdMapping> {
    match &cli.config {
        Some(path) => {
            let config = FrameIdConfig::from_file(path)?;
            Ok(config.to_mapping()?)
        }
        None => Ok(FrameIdMapping::resolve(&cli.topics, &cli.frame_ids)?),
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let mapping = resolve_mapping(&cli)?;

    let progress = ProgressBar::new(!cli.quiet && !cli.json);
    let progress_cb = progress.clone();
    let options = RewriteOptions::default()
        .with_pipeline_depth(cli.pipeline_depth)
        .with_writer(WriterOptions {
            compression: cli.compression,
            chunk_threshold: cli.chunk_size,
        })
        .with_progress(move |p| progress_cb.update(p));

    let started = Instant::now();
    let mut rewriter = BagRewriter::with_options(mapping, options);
    let stats = match rewriter.rewrite(&cli.input, &cli.output) {
        Ok(stats) => stats,
        Err(e) => {
            progress.abandon();
            return Err(e).with_context(|| {
                format!(
                    "Failed to rewrite {} into {}",
                    cli.input.display(),
                    cli.output.display()
                )
            });
        }
    };
    let elapsed = started.elapsed();
    progress.finish_with_message(format!("done in {}", format_duration(elapsed)));

    if cli.json {
        let report = Report {
            input: cli.input.display().to_string(),
            output: cli.output.display().to_string(),
            mapping: rewriter.mapping().iter().collect(),
            stats: &stats,
            elapsed_ms: elapsed.as_millis(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        info!(
            "Wrote {} messages on {} connections in {} ({} rewritten, {} without header, {} untouched)",
            stats.message_count,
            stats.connection_count,
            format_duration(elapsed),
            stats.rewritten_count,
            stats.unsupported_count,
            stats.untouched_count
        );
    }

    Ok(())
}

fn main() {
    let result = run();

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
