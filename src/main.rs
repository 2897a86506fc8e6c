mod config;
mod console;
mod handlers;
mod log_store;
mod openai;
mod orchestrator;
mod sanitizer;
mod types;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_ENGINE;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::Config;
use crate::console::Console;
use crate::orchestrator::{Orchestrator, OutputMode};
use crate::types::{AudioSubmission, CallContext, ImageSubmission};

#[derive(Debug, Parser)]
#[command(about = "Score ShowGrid submissions with an LLM judge")]
struct Args {
    /// Authenticated user id recorded in the scoring log
    #[arg(long, env = "SHOWGRID_USER_ID", global = true)]
    user_id: Option<String>,

    /// Print the normalized result as JSON instead of a score card
    #[arg(long, default_value_t = false, global = true, conflicts_with = "quiet")]
    json: bool,

    /// Print nothing but logs; the exit code reports success
    #[arg(long, default_value_t = false, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Score a challenge image
    ScoreImage {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        category: Option<String>,
        /// Publicly reachable image URL
        #[arg(long, conflicts_with = "image_file", required_unless_present = "image_file")]
        image_url: Option<String>,
        /// Local image, sent inline as base64
        #[arg(long)]
        image_file: Option<PathBuf>,
    },
    /// Score a voice story chapter
    ScoreAudio {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long, conflicts_with = "transcript_file")]
        transcript: Option<String>,
        #[arg(long)]
        transcript_file: Option<PathBuf>,
        #[arg(long, required_unless_present_any = ["transcript", "transcript_file"])]
        audio_url: Option<String>,
    },
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    // logging
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter_layer).with_writer(std::io::stderr).init();

    tracing::info!("Starting ShowGrid judge");

    let output = output_mode(&args);
    let orchestrator = match Config::load().and_then(|config| Orchestrator::new(config, output)) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            tracing::error!("Startup failed: {:#}", e);
            Console::display_error(&e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let ctx = match args.user_id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
        Some(uid) => CallContext::authenticated(uid),
        None => CallContext::anonymous(),
    };

    let outcome = match args.command {
        Command::ScoreImage { title, description, category, image_url, image_file } => {
            let image_base64 = match image_file {
                Some(path) => {
                    let bytes = tokio::fs::read(&path)
                        .await
                        .with_context(|| format!("failed to read image {}", path.display()))?;
                    Some(BASE64_ENGINE.encode(bytes))
                }
                None => None,
            };
            let submission = ImageSubmission {
                image_url,
                image_base64,
                challenge_title: title,
                challenge_description: description,
                challenge_category: category,
            };
            orchestrator.score_image(&ctx, &submission).await
        }
        Command::ScoreAudio { title, description, transcript, transcript_file, audio_url } => {
            let transcript = match transcript_file {
                Some(path) => Some(
                    tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("failed to read transcript {}", path.display()))?,
                ),
                None => transcript,
            };
            let submission = AudioSubmission {
                transcript,
                audio_url,
                chapter_title: title,
                chapter_description: description,
            };
            orchestrator.score_audio(&ctx, &submission).await
        }
    };

    match outcome {
        Ok(result) => {
            tracing::info!("Scoring finished (overall {:.1})", result.overall_score);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::error!(status = e.status_code(), "Scoring failed: {}", e);
            Console::display_handler_error(&e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn output_mode(args: &Args) -> OutputMode {
    if args.quiet {
        OutputMode::Quiet
    } else if args.json {
        OutputMode::Json
    } else {
        OutputMode::Card
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_flags_select_mode() {
        fn parse(extra: &[&'static str]) -> Args {
            let mut argv = vec!["showgrid_judge", "score-audio", "--title", "t", "--description", "d", "--transcript", "x"];
            argv.extend_from_slice(extra);
            Args::try_parse_from(argv).unwrap()
        }
        assert_eq!(output_mode(&parse(&[])), OutputMode::Card);
        assert_eq!(output_mode(&parse(&["--json"])), OutputMode::Json);
        assert_eq!(output_mode(&parse(&["--quiet"])), OutputMode::Quiet);
        assert!(
            Args::try_parse_from(["showgrid_judge", "--json", "--quiet", "score-audio", "--title", "t", "--description", "d", "--transcript", "x"])
                .is_err()
        );
    }
}
