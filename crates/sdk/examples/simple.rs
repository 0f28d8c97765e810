//! Simple SDK Example
//!
//! Queues an enrollment, waits for the outcome and prints the waitlist.
//!
//! # Usage
//!
//! 1. Start the daemon:
//!    ```bash
//!    cargo run --package enrollment-daemon
//!    ```
//!
//! 2. Run this example:
//!    ```bash
//!    cargo run --example simple -- <student_id> <course_id>
//!    ```

use enrollment_sdk::{EnrollmentClient, EnrollmentStatus, SubmitRequest};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let student_id: i64 = args.next().as_deref().unwrap_or("1").parse()?;
    let course_id: i64 = args.next().as_deref().unwrap_or("10").parse()?;

    println!("Enrollment SDK - Simple Example");
    println!("===============================\n");

    // 1. Connect to daemon
    println!("1. Connecting to daemon...");
    let client = EnrollmentClient::connect("http://127.0.0.1:9630").await?;
    println!("   ✓ Connected\n");

    // 2. Submit
    println!("2. Submitting enrollment request...");
    let receipt = match client
        .submit(SubmitRequest {
            student_id,
            course_id,
            correlation_id: Some("simple-example".to_string()),
        })
        .await
    {
        Ok(receipt) => receipt,
        Err(e) if e.is_already_active() => {
            println!("   ⚠ A request for this course is already queued");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    println!("   ✓ Job queued:");
    println!("     - ID: {}", receipt.job_id);
    println!("     - Estimated wait: {}s\n", receipt.estimated_wait_secs);

    // 3. Wait for the outcome
    println!("3. Waiting for the outcome...");
    let status = client
        .wait_for_terminal(&receipt.job_id, Duration::from_secs(60))
        .await?;

    match (&status.outcome, &status.failure) {
        (Some(outcome), _) => match outcome.status {
            EnrollmentStatus::Confirmed => {
                println!("   ✓ Confirmed (enrollment {})", outcome.enrollment_id)
            }
            EnrollmentStatus::Waitlisted => println!(
                "   ○ Waitlisted at position {}",
                outcome.waitlist_position.unwrap_or_default()
            ),
            other => println!("   ✗ Ended as {:?}", other),
        },
        (None, Some(failure)) => println!("   ✗ {}: {}", failure.kind, failure.reason),
        (None, None) => println!("   ? No outcome recorded"),
    }
    println!();

    // 4. Waitlist
    println!("4. Fetching waitlist...");
    let waitlist = client.waitlist(course_id).await?;
    for entry in &waitlist.entries {
        println!("     #{} student {}", entry.position, entry.student_id);
    }
    if waitlist.entries.is_empty() {
        println!("     (empty)");
    }

    println!("\n✓ Example completed successfully!");

    Ok(())
}
