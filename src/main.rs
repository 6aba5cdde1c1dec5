//! gradx CLI
//!
//! Entry point for the `gradx` command-line tool.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::{Arc, Mutex, PoisonError};

use clap::{Args, Parser, Subcommand};
use gradx_client::config::{user_config_path, PROJECT_CONFIG};
use gradx_client::{
    logging, Batch, EffectiveConfig, Exercise, ExerciseSubmission, GradingClient, GradingError,
    GradingResult, HttpTransport, Job, PollOptions, PollTarget,
};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gradx")]
#[command(about = "Submit work to a grading service and wait for its reports", version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Path to project config file (default: ./gradx.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Wait between two report fetches, in milliseconds
    #[arg(long, global = true)]
    step_ms: Option<u64>,

    /// Fetch budget of a single-report poll
    #[arg(long, global = true)]
    attempts: Option<u32>,

    /// Fetch budget of a full batch poll
    #[arg(long, global = true)]
    retry: Option<u32>,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Log every request and poll attempt
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit one answer and wait for its mark
    Answer {
        #[command(flatten)]
        exercise: ExerciseArgs,

        /// Answer file; the file name is sent along with the content
        #[arg(conflicts_with = "text", required_unless_present = "text")]
        file: Option<PathBuf>,

        /// Inline answer text, sent under the exercise's inline file name
        #[arg(long)]
        text: Option<String>,

        /// Return after submission without polling
        #[arg(long)]
        no_wait: bool,
    },

    /// Submit a tar archive of answers and wait for the batch report
    Batch {
        #[command(flatten)]
        exercise: ExerciseArgs,

        /// Tar archive with one file or directory per student
        archive: PathBuf,

        /// Stop at the first partial report
        #[arg(long)]
        partial: bool,
    },

    /// Submit a new exercise archive and wait for the author report
    Exercise {
        /// Exercise archive
        archive: PathBuf,
    },

    /// Upload an exercises-set description for a campaign
    ExercisesSet {
        /// Campaign name
        #[arg(long)]
        campaign: String,

        /// Description file
        file: PathBuf,
    },

    /// Show the effective configuration
    Config,
}

#[derive(Args)]
struct ExerciseArgs {
    /// Exercise name
    #[arg(long, short = 'e')]
    exercise: String,

    /// Deployment token of the exercise
    #[arg(long = "cookie")]
    safecookie: Option<String>,

    /// File name used for inline answers
    #[arg(long)]
    inline_file_name: Option<String>,
}

impl ExerciseArgs {
    fn exercise(&self) -> Exercise {
        let mut exercise = Exercise::new(&self.exercise);
        if let Some(cookie) = &self.safecookie {
            exercise = exercise.with_safecookie(cookie);
        }
        if let Some(name) = &self.inline_file_name {
            exercise = exercise.with_inline_file_name(name);
        }
        exercise
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.global.verbose);

    let json = cli.global.json;
    let result = run(cli).await;
    match result {
        Ok(output) => print_output(&output, json),
        Err(e) => {
            if json {
                let error = json!({
                    "error": e.to_string(),
                    "kind": format!("{:?}", e.failure_kind()),
                    "exit_code": e.exit_code(),
                });
                println!("{}", error);
            } else {
                eprintln!("Error: {}", e);
            }
            process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> GradingResult<Value> {
    let json = cli.global.json;
    let config = load_config(&cli.global)?;
    let transport = HttpTransport::new(config.endpoints())?;
    let client = GradingClient::with_defaults(Arc::new(transport), config.poll_defaults());
    let options = PollOptions::new().with_progress(|index, target| {
        log_attempt(index, target);
    });

    match cli.command {
        Commands::Answer {
            exercise,
            file,
            text,
            no_wait,
        } => {
            let exercise = exercise.exercise();
            // clap requires --text whenever no file is given
            let job = match file {
                Some(path) => client.send_file_answer(&exercise, path).await?,
                None => {
                    let text = text.unwrap_or_default();
                    client.send_string_answer(&exercise, &text).await?
                }
            };
            if no_wait {
                return Ok(job_summary(&job));
            }
            let job = client.get_job_report(&job, &options).await?;
            Ok(job_summary(&job))
        }
        Commands::Batch {
            exercise,
            archive,
            partial,
        } => {
            let batch = client.send_batch(&exercise.exercise(), archive).await?;
            if partial {
                let batch = client.get_batch_report(&batch, &options).await?;
                return Ok(batch_summary(&batch));
            }
            let batch = client
                .get_final_batch_report(&batch, &progressive_options(json))
                .await?;
            Ok(batch_summary(&batch))
        }
        Commands::Exercise { archive } => {
            let submission = client.submit_new_exercise(archive).await?;
            let submission = client.get_exercise_report(&submission, &options).await?;
            let submission = client.get_pseudojob_reports(&submission, &options).await?;
            Ok(exercise_summary(&submission))
        }
        Commands::ExercisesSet { campaign, file } => {
            let set = client.upload_exercises_set(&campaign, file).await?;
            Ok(json!({"campaign": set.campaign, "document": set.document}))
        }
        Commands::Config => serde_json::to_value(&config)
            .map_err(|e| GradingError::Protocol(format!("cannot render configuration: {}", e))),
    }
}

fn log_attempt(index: u32, target: PollTarget<'_>) {
    tracing::info!(attempt = index + 1, handle = %target.label(), "waiting for report");
}

/// Options that print every partial batch report that shows progress; the
/// complete report is printed by the caller.
fn progressive_options(json: bool) -> PollOptions {
    let last = Mutex::new(None);
    PollOptions::new().with_progress(move |index, target| {
        log_attempt(index, target);
        let PollTarget::Batch(batch) = target else {
            return;
        };
        if batch.is_complete() || batch.jobs().is_empty() {
            return;
        }
        let progress = (batch.finishedjobs(), batch.seen());
        let mut last = last.lock().unwrap_or_else(PoisonError::into_inner);
        if *last != Some(progress) {
            *last = Some(progress);
            print_output(&batch_summary(batch), json);
        }
    })
}

fn load_config(global: &GlobalArgs) -> GradingResult<EffectiveConfig> {
    let user = user_config_path();
    let project = global
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG));

    let mut poll = serde_json::Map::new();
    if let Some(step) = global.step_ms {
        poll.insert("step_ms".to_string(), json!(step));
    }
    if let Some(attempts) = global.attempts {
        poll.insert("attempts".to_string(), json!(attempts));
    }
    if let Some(retry) = global.retry {
        poll.insert("retry".to_string(), json!(retry));
    }
    let cli = (!poll.is_empty()).then(|| json!({ "poll": poll }));

    Ok(EffectiveConfig::build(
        user.as_deref(),
        Some(Path::new(&project)),
        cli,
    )?)
}

fn job_summary(job: &Job) -> Value {
    json!({
        "jobid": job.jobid(),
        "name": job.name(),
        "personid": job.personid(),
        "state": job.state().as_str(),
        "mark": job.mark(),
        "total_mark": job.total_mark(),
        "problem": job.problem(),
    })
}

fn batch_summary(batch: &Batch) -> Value {
    let jobs: Vec<Value> = batch
        .jobs()
        .snapshot()
        .iter()
        .map(|(key, job)| {
            let mut summary = job_summary(job);
            summary["key"] = json!(key);
            summary
        })
        .collect();
    json!({
        "batchid": batch.batchid(),
        "state": batch.state().as_str(),
        "finishedjobs": batch.finishedjobs(),
        "totaljobs": batch.totaljobs(),
        "jobs": jobs,
    })
}

fn exercise_summary(submission: &ExerciseSubmission) -> Value {
    let pseudojobs: Vec<Value> = submission
        .pseudojobs()
        .snapshot()
        .iter()
        .map(|(_, job)| job_summary(job))
        .collect();
    json!({
        "exerciseid": submission.exerciseid(),
        "safecookie": submission.safecookie(),
        "state": submission.state().as_str(),
        "pseudojobs": pseudojobs,
    })
}

fn print_output(output: &Value, json: bool) {
    if json {
        println!("{}", output);
        return;
    }
    match output {
        Value::Object(fields) => {
            for (key, value) in fields {
                match value {
                    Value::Null => {}
                    Value::String(s) => println!("{}: {}", key, s),
                    other => println!("{}: {}", key, other),
                }
            }
        }
        other => println!("{}", other),
    }
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
    fn test_answer_needs_file_or_text() {
        assert!(Cli::try_parse_from(["gradx", "answer", "-e", "min"]).is_err());
        assert!(Cli::try_parse_from(["gradx", "answer", "-e", "min", "a.c", "--text", "x"]).is_err());

        let cli = Cli::try_parse_from(["gradx", "answer", "-e", "min", "--text", "x"]).unwrap();
        match cli.command {
            Commands::Answer { file, text, .. } => {
                assert!(file.is_none());
                assert_eq!(text.as_deref(), Some("x"));
            }
            _ => panic!("expected answer"),
        }
    }

    #[test]
    fn test_batch_partial_flag() {
        let cli = Cli::try_parse_from(["gradx", "batch", "-e", "min", "--partial", "all.tgz"]).unwrap();
        assert!(matches!(cli.command, Commands::Batch { partial: true, .. }));
    }
}
