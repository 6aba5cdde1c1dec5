//! gradx - client for a remote grading service
//!
//! Submits student answers, batches of answers and new exercises to the
//! grading service, then polls the service's static storage until the
//! corresponding reports are published. Every submission yields a shared
//! handle that accumulates what the service said about it.
//!
//! ```no_run
//! # async fn demo() -> gradx_client::GradingResult<()> {
//! use std::sync::Arc;
//! use gradx_client::{Exercise, GradingClient, HttpTransport, PollOptions};
//! use gradx_client::host::EndpointConfig;
//!
//! let transport = HttpTransport::new(EndpointConfig::default())?;
//! let client = GradingClient::new(Arc::new(transport));
//! let exercise = Exercise::new("min").with_safecookie("C00KIE");
//!
//! let job = client.send_file_answer(&exercise, "min.c").await?;
//! let job = client.get_job_report(&job, &PollOptions::default()).await?;
//! println!("{:?}", job.mark());
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod cache;
pub mod config;
pub mod error;
pub mod handle;
pub mod host;
pub mod logging;
pub mod mock;
pub mod poll;
pub mod submit;

pub use artifact::{Artifact, ContentLoader};
pub use cache::JobsCache;
pub use config::{ConfigError, EffectiveConfig};
pub use error::{FailureKind, GradingError, GradingResult};
pub use handle::{Acceptance, Batch, Exercise, ExerciseSubmission, ExercisesSet, Job};
pub use host::{GradingClient, HttpTransport, MockTransport, Transport, TransportError};
pub use poll::{PollDefaults, PollObserver, PollOptions, PollState, PollTarget};
