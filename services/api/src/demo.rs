use crate::infra::EnrollmentStack;
use clap::Args;
use enrollment_intake::config::{BracketConfig, ProcessingConfig};
use enrollment_intake::error::AppError;
use enrollment_intake::workflows::enrollment::{
    BracketAdminError, CachePolicy, EnrollmentRequest, NewAgeBracket,
};
use std::time::Duration;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Applicant age to submit. Brackets 13-19 and 20-30 are registered first.
    #[arg(long, default_value_t = 25)]
    pub(crate) age: u32,
    /// Applicant name.
    #[arg(long, default_value = "Jane")]
    pub(crate) name: String,
    /// Simulated processing delay per message, in milliseconds.
    #[arg(long, default_value_t = 0)]
    pub(crate) delay_ms: u64,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        age,
        name,
        delay_ms,
    } = args;

    let stack = EnrollmentStack::in_memory(
        &BracketConfig {
            cache_policy: CachePolicy::Lazy,
        },
        &ProcessingConfig {
            delay: Duration::from_millis(delay_ms),
            visibility_timeout: Duration::ZERO,
            ..ProcessingConfig::default()
        },
    );

    println!("Enrollment intake demo");
    for (min_age, max_age) in [(13, 19), (20, 30)] {
        let bracket = NewAgeBracket::new(min_age, max_age).map_err(BracketAdminError::from)?;
        let created = stack.api.brackets.create_bracket(bracket)?;
        println!("- age group {} registered: {min_age}-{max_age}", created.id);
    }

    let request = EnrollmentRequest {
        name,
        age,
        cpf: "000.000.000-00".to_string(),
    };
    let accepted = match stack.api.intake.request(request) {
        Ok(accepted) => accepted,
        Err(err) if err.is_validation() => {
            println!("\nRequest rejected: {err}");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };
    println!(
        "\nEnrollment {} accepted with status {}",
        accepted.enrollment_id,
        accepted.status.label()
    );
    println!("Queue depth after publish: {}", stack.queue.depth()?);

    match stack.consumer.poll_once().await? {
        Some(report) => {
            println!(
                "\nConsumer batch: {} processed, {} failed",
                report.items_successfully_processed.len(),
                report.batch_item_failures.len()
            );
            let rendered = serde_json::to_string_pretty(&report)
                .unwrap_or_else(|err| format!("<unrenderable report: {err}>"));
            println!("{rendered}");
        }
        None => println!("\nConsumer found no visible messages"),
    }

    let record = stack.api.intake.status(&accepted.enrollment_id)?;
    println!(
        "\nFinal status for {} ({}, age {}): {}",
        record.id,
        record.name,
        record.age,
        record.status.label()
    );

    Ok(())
}
