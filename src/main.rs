// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "survey-camera")]
#[command(about = "Geotagged, watermarked field-survey capture")]
#[command(version = survey_camera::constants::app_info::version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Capture a photo into a session
    Photo {
        /// Session the capture belongs to
        #[arg(short, long)]
        session: String,

        /// Location text stamped when resolution fails
        #[arg(short, long)]
        location: Option<String>,

        /// Import an existing image instead of using a camera
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Use the front-facing camera
        #[arg(long)]
        front: bool,
    },

    /// Record a video into a session
    Record {
        /// Session the recording belongs to
        #[arg(short, long)]
        session: String,

        /// Recording duration in seconds
        #[arg(short, long, default_value = "10")]
        duration: u64,

        /// Location text stored with the recording
        #[arg(short, long)]
        location: Option<String>,

        /// Use the front-facing camera
        #[arg(long)]
        front: bool,
    },

    /// List stored sessions
    Sessions,

    /// Delete a session and its media records
    DeleteSession {
        /// Session name
        name: String,
    },

    /// Re-index a session folder and open it in the default viewer
    Gallery {
        /// Session name
        session: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=survey_camera=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => cli::list_cameras(),
        Commands::Photo {
            session,
            location,
            input,
            front,
        } => cli::take_photo(session, location, input, front),
        Commands::Record {
            session,
            duration,
            location,
            front,
        } => cli::record_video(session, duration, location, front),
        Commands::Sessions => cli::list_sessions(),
        Commands::DeleteSession { name } => cli::delete_session(name),
        Commands::Gallery { session } => cli::open_gallery(session),
    }
}
