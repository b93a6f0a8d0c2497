pub mod engine;
pub mod equality;
pub mod executor;
pub mod log;
pub mod path_filter;
pub mod planner;
pub mod scheduler;
pub mod sink;

pub use engine::{Extractor, ExtractorOptions, DEFAULT_WORKERS};
pub use equality::{DestinationFileState, EqualityOracle, EqualityVerdict};
pub use executor::{ExtractionExecutor, RetryPolicy};
pub use self::log::{ExtractionLog, ExtractionRecord, ExtractionStatus};
pub use path_filter::PathFilter;
pub use planner::{ContainerSummary, EstimatedDuration};
pub use scheduler::{ExtractionProgress, ExtractionTask, ProgressObserver, Scheduler};
pub use sink::CsvLogSink;
