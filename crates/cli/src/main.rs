//! Enrollment CLI - Command-line interface for the Enrollment Engine

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9630";

#[derive(Parser)]
#[command(name = "enroll")]
#[command(about = "Enrollment Engine CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "ENROLLMENT_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue an enrollment request
    Submit {
        /// Student ID
        #[arg(short, long)]
        student: i64,

        /// Course offering ID
        #[arg(short, long)]
        course: i64,

        /// Caller-supplied correlation ID
        #[arg(long)]
        correlation_id: Option<String>,

        /// Block until the job finishes
        #[arg(short, long)]
        wait: bool,
    },

    /// Drop an enrollment (promotes the head of the waitlist)
    Drop {
        /// Enrollment ID
        enrollment_id: i64,

        /// Student who owns the enrollment
        #[arg(short, long)]
        student: i64,
    },

    /// Show the state of a job
    Status {
        /// Job ID
        job_id: String,

        /// Wait up to this many milliseconds for the job to finish
        #[arg(short, long)]
        wait: Option<u64>,
    },

    /// Cancel a job that has not been picked up yet
    Cancel {
        /// Job ID
        job_id: String,
    },

    /// Show the waitlist of a course
    Waitlist {
        /// Course offering ID
        course_id: i64,
    },

    /// Show queue statistics
    Stats,

    /// Move a failed job back to the queue
    Retry {
        /// Job ID
        job_id: String,
    },

    /// Purge old completed and failed jobs
    Clean,
}

/// Wait used by `submit --wait` (server caps long polls at 30s)
const SUBMIT_WAIT_MS: u64 = 30_000;

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize, Tabled)]
struct SubmitResult {
    job_id: String,
    state: String,
    enqueued_at: i64,
    estimated_wait_secs: i64,
}

#[derive(Deserialize)]
struct WaitlistResult {
    entries: Vec<WaitlistRow>,
}

#[derive(Deserialize, Tabled)]
struct WaitlistRow {
    position: i32,
    student_id: i64,
    enrollment_id: i64,
    since: i64,
}

#[derive(Tabled)]
struct Field {
    field: String,
    value: String,
}

impl Field {
    fn new(field: &str, value: impl ToString) -> Self {
        Self {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

async fn call_rpc(url: &str, method: &str, params: Value) -> Result<Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

/// Render a JSON scalar without quotes; null becomes "-"
fn display(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn print_status(status: &Value) {
    let state = display(&status["state"]);
    let colored_state = match state.as_str() {
        "completed" => state.green().bold(),
        "failed" => state.red().bold(),
        "stalled" => state.yellow().bold(),
        _ => state.cyan().bold(),
    };
    println!("{} {}", "Job".bold(), display(&status["job_id"]));
    println!("  {} {}", "State:".bold(), colored_state);
    println!();

    let mut rows = vec![
        Field::new("student_id", display(&status["student_id"])),
        Field::new("course_id", display(&status["course_id"])),
        Field::new(
            "attempts",
            format!(
                "{}/{}",
                display(&status["attempts"]),
                display(&status["max_attempts"])
            ),
        ),
        Field::new("enqueued_at", display(&status["enqueued_at"])),
    ];
    if !status["jobs_ahead"].is_null() {
        rows.push(Field::new("jobs_ahead", display(&status["jobs_ahead"])));
    }
    if let Some(outcome) = status["outcome"].as_object() {
        rows.push(Field::new("enrollment_id", display(&outcome["enrollment_id"])));
        rows.push(Field::new("enrollment", display(&outcome["status"])));
        if let Some(position) = outcome.get("waitlist_position").filter(|v| !v.is_null()) {
            rows.push(Field::new("waitlist_position", display(position)));
        }
    }
    if let Some(failure) = status["failure"].as_object() {
        rows.push(Field::new("failure", display(&failure["kind"])));
        rows.push(Field::new("reason", display(&failure["reason"])));
    }
    if !status["last_error"].is_null() {
        rows.push(Field::new("last_error", display(&status["last_error"])));
    }
    if !status["finished_at"].is_null() {
        rows.push(Field::new("finished_at", display(&status["finished_at"])));
    }

    println!("{}", Table::new(rows));
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Submit {
            student,
            course,
            correlation_id,
            wait,
        } => {
            let params = json!({
                "student_id": student,
                "course_id": course,
                "correlation_id": correlation_id,
            });

            let result = call_rpc(&cli.rpc_url, "enrollment.submit.v1", params).await?;
            let submitted: SubmitResult = serde_json::from_value(result)?;
            let job_id = submitted.job_id.clone();

            println!("{}", "✓ Enrollment request queued".green().bold());
            println!();
            println!("{}", Table::new(vec![submitted]));

            if wait {
                println!();
                let params = json!({ "job_id": job_id, "wait_ms": SUBMIT_WAIT_MS });
                let status = call_rpc(&cli.rpc_url, "enrollment.status.v1", params).await?;
                print_status(&status);
            }
        }

        Commands::Drop {
            enrollment_id,
            student,
        } => {
            let params = json!({
                "enrollment_id": enrollment_id,
                "student_id": student,
            });

            let result = call_rpc(&cli.rpc_url, "enrollment.drop.v1", params).await?;

            println!(
                "{}",
                format!("✓ Enrollment {} dropped", enrollment_id).green().bold()
            );
            match result["promoted"].as_object() {
                Some(promoted) => println!(
                    "  {} student {} (enrollment {}) promoted from the waitlist",
                    "↑".green(),
                    display(&promoted["student_id"]),
                    display(&promoted["enrollment_id"])
                ),
                None => println!("  ○ Waitlist empty, seat released"),
            }
        }

        Commands::Status { job_id, wait } => {
            let params = json!({ "job_id": job_id, "wait_ms": wait });
            let status = call_rpc(&cli.rpc_url, "enrollment.status.v1", params).await?;
            print_status(&status);
        }

        Commands::Cancel { job_id } => {
            let params = json!({ "job_id": job_id });

            call_rpc(&cli.rpc_url, "enrollment.cancel.v1", params).await?;

            println!("{}", format!("✓ Job {} cancelled", job_id).green().bold());
        }

        Commands::Waitlist { course_id } => {
            let params = json!({ "course_id": course_id });
            let result = call_rpc(&cli.rpc_url, "enrollment.waitlist.v1", params).await?;
            let waitlist: WaitlistResult = serde_json::from_value(result)?;

            println!("{}", format!("Waitlist for course {}", course_id).cyan().bold());
            println!();
            if waitlist.entries.is_empty() {
                println!("{}", "No students waiting".yellow());
            } else {
                println!("{}", Table::new(waitlist.entries));
            }
        }

        Commands::Stats => {
            println!("{}", "Queue Status".cyan().bold());
            println!();

            match call_rpc(&cli.rpc_url, "admin.stats.v1", json!([])).await {
                Ok(stats) => {
                    println!("  {} {}", "RPC URL:".bold(), cli.rpc_url);
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    println!();
                    println!("  {} {}", "Total Jobs:".bold(), stats["total"]);
                    println!("  {} {}", "Waiting:".bold(), stats["waiting"]);
                    println!("  {} {}", "Delayed:".bold(), stats["delayed"]);
                    println!("  {} {}", "Active:".bold(), stats["active"]);
                    println!("  {} {}", "Stalled:".bold(), stats["stalled"]);
                    println!("  {} {}", "Completed:".bold(), stats["completed"]);
                    println!("  {} {}", "Failed:".bold(), stats["failed"]);
                    println!();
                    println!("  {} {} seconds", "Uptime:".bold(), stats["uptime_seconds"]);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }

        Commands::Retry { job_id } => {
            let params = json!({ "job_id": job_id });
            let result = call_rpc(&cli.rpc_url, "admin.retry.v1", params).await?;

            println!(
                "{}",
                format!("✓ Job {} requeued ({})", job_id, display(&result["state"]))
                    .green()
                    .bold()
            );
        }

        Commands::Clean => {
            println!("{}", "Purging finished jobs...".cyan().bold());
            println!();

            match call_rpc(&cli.rpc_url, "admin.clean.v1", json!([])).await {
                Ok(result) => {
                    println!("  {} {} completed jobs deleted", "✓".green(), result["completed"]);
                    println!("  {} {} failed jobs deleted", "✓".green(), result["failed"]);
                }
                Err(e) => {
                    println!("  {} Clean failed: {}", "✗".red(), e);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_submit_with_wait() {
        let cli = Cli::try_parse_from(["enroll", "submit", "-s", "7", "-c", "42", "--wait"]).unwrap();
        match cli.command {
            Commands::Submit {
                student,
                course,
                wait,
                correlation_id,
            } => {
                assert_eq!(student, 7);
                assert_eq!(course, 42);
                assert!(wait);
                assert!(correlation_id.is_none());
            }
            _ => panic!("expected submit"),
        }
    }

    #[test]
    fn test_display_strips_quotes_and_nulls() {
        assert_eq!(display(&json!("waiting")), "waiting");
        assert_eq!(display(&json!(3)), "3");
        assert_eq!(display(&Value::Null), "-");
    }
}
