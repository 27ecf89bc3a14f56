pub mod config;
pub mod error;
pub mod job;
pub mod progress;
pub mod stability;
pub mod report;
pub mod encoder;
pub mod orchestrator;
pub mod dispatch;
pub mod scan;
pub mod watch;
pub mod logging;

pub use config::WatchConfig;
pub use dispatch::{DispatchOutcome, Dispatcher, FileProcessor, InFlightSet};
pub use encoder::{Encoder, EncoderVersion, PresetCheck};
pub use error::{EncodeFailure, WatchError};
pub use job::EncodeJob;
pub use orchestrator::{Orchestrator, ProcessOutcome};
pub use report::{ConsoleReporter, NullReporter, Reporter};
