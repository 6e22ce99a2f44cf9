//! The three-stage export pipeline.
//!
//! ```text
//! ReportStore cursor ──Pipe<Report>──▶ FanOutPool ──Pipe<ReportLine>──▶ CsvSink ──▶ ReportStream
//!      (source)                     (pool_size workers)                (single)
//! ```
//!
//! Every hop holds at most one item, so a slow reader of the [`ReportStream`]
//! throttles the whole chain down to the storage cursor. Each stage closes
//! its output (normally or with its error) when it stops, and every blocking
//! operation observes the export's cancellation token.

mod fan_out;
mod guard;
mod output;
mod pipe;
mod sink;
mod source;

pub use fan_out::FanOutPool;
pub use output::ReportStream;
pub use pipe::Pipe;
pub use sink::{CsvSink, SinkSummary, CSV_HEADER};

pub(crate) use output::{output_stream, OutputCloser};
pub(crate) use source::run_source;
