use anyhow::Error;
use colored::*;

use crate::handlers::HandlerError;
use crate::openai::ChatError;
use crate::sanitizer::ParseError;
use crate::types::{Rubric, ScoreResult};

const RULE_TOP: &str = "┌─────────────────────────────────────────────────────────────";
const RULE_BOTTOM: &str = "└─────────────────────────────────────────────────────────────\n";

pub fn display_loading(rubric: Rubric) {
    println!(
        "{}",
        format!("🔄 Sending {} submission to the judge...", rubric).blue().italic()
    );
}

fn colored_score(score: f64) -> ColoredString {
    let text = format!("{:>4.1}", score);
    if score >= 8.0 {
        text.bright_green().bold()
    } else if score >= 5.0 {
        text.bright_yellow().bold()
    } else {
        text.bright_red().bold()
    }
}

fn score_bar(score: f64) -> String {
    let filled = score.round().clamp(0.0, 10.0) as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
}

pub fn display_score(title: &str, rubric: Rubric, result: &ScoreResult) {
    println!("\n{}", format!("🏆 {} Evaluation", capitalize(&rubric.to_string())).bright_cyan().bold());
    println!("{}", RULE_TOP.cyan());
    println!("{} {}", "│ 🎯 Title:".cyan(), title.bright_white().bold());

    println!("{}", "│ ── Criteria:".cyan());
    // rubric order, not map order
    for name in rubric.criteria() {
        if let Some(score) = result.criteria.get(*name) {
            println!(
                "│   {:<18} {} {}",
                name.replace('_', " ").white(),
                colored_score(*score),
                score_bar(*score).cyan()
            );
        }
    }
    println!(
        "{} {}",
        "│ ⭐ Overall:".cyan(),
        colored_score(result.overall_score)
    );
    if let Some(grade) = &result.grade {
        println!("{} {}", "│ 🅰️  Grade:".cyan(), grade.bright_white().bold());
    }

    println!("{}", "│ 💬 Feedback:".cyan());
    for line in result.feedback.lines() {
        println!("│   {}", line.white());
    }

    if !result.highlights.is_empty() {
        println!("{}", "│ ✨ Highlights:".cyan());
        for item in &result.highlights {
            println!("│   {} {}", "✔".bright_green(), item.white());
        }
    }
    if !result.improvements.is_empty() {
        println!("{}", "│ 🛠️  Improvements:".cyan());
        for item in &result.improvements {
            println!("│   {} {}", "➜".bright_yellow(), item.white());
        }
    }
    println!("{}", RULE_BOTTOM.cyan());
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn display_error(error: &Error) {
    if let Some(handler_error) = error.downcast_ref::<HandlerError>() {
        display_handler_error(handler_error);
    } else if let Some(chat_error) = error.downcast_ref::<ChatError>() {
        display_chat_error(chat_error, &chat_error.user_message());
        println!();
    } else {
        println!(
            "{} {}",
            "❌ Error:".bright_red().bold(),
            error.to_string().red()
        );
        println!(
            "{}",
            "Please check your configuration and try again.\n".red()
        );
    }
}

pub fn display_handler_error(error: &HandlerError) {
    let user_message = error.user_message();
    match error {
        HandlerError::Unauthenticated => {
            println!("{}", user_message.bright_red().bold());
            println!(
                "{}",
                "💡 Tip: Pass --user-id or set SHOWGRID_USER_ID.".red()
            );
        }
        HandlerError::MissingCredential => {
            println!("{}", user_message.bright_red().bold());
            println!(
                "{}",
                "💡 Tip: Add OPENAI_API_KEY to your environment or .env file.".red()
            );
        }
        HandlerError::InvalidArgument(_) => {
            println!("{}", user_message.bright_yellow().bold());
        }
        HandlerError::Upstream(chat_error) => display_chat_error(chat_error, &user_message),
        HandlerError::Parse(parse_error) => {
            println!("{}", user_message.bright_magenta().bold());
            if let ParseError::MalformedJson { snippet, .. } = parse_error {
                println!("{} {}", "   reply:".magenta(), snippet.white());
            }
            println!(
                "{}",
                "💡 Tip: The judge's reply was rejected. Running the request again usually helps."
                    .magenta()
            );
        }
    }
    println!();
}

fn display_chat_error(error: &ChatError, user_message: &str) {
    match error {
        ChatError::ServerBusy | ChatError::Timeout { .. } => {
            println!("{}", user_message.bright_yellow().bold());
            println!(
                "{}",
                "💡 Tip: The model provider might be overloaded. Try again later.".yellow()
            );
        }
        ChatError::NetworkError { .. } => {
            println!("{}", user_message.bright_red().bold());
            println!(
                "{}",
                "💡 Tip: Check your internet connection and OPENAI_BASE_URL.".red()
            );
        }
        ChatError::ApiError { status, .. } => {
            println!("{}", user_message.bright_red().bold());
            match *status {
                401 => println!(
                    "{}",
                    "💡 Tip: Check your OPENAI_API_KEY environment variable.".red()
                ),
                400 => println!(
                    "{}",
                    "💡 Tip: Make sure the image URL is publicly reachable.".red()
                ),
                _ => {}
            }
        }
        ChatError::InvalidResponse { .. } | ChatError::ConfigError { .. } => {
            println!("{}", user_message.bright_magenta().bold());
        }
    }
}
