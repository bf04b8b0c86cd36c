//! Model export and metric reporting
//!
//! A fitted workflow is written inside a checksummed envelope, either as
//! bincode or as JSON. Metric tables go out as CSV through polars.

mod report;
mod serializer;

pub use report::{metrics_frame, write_csv, write_metrics_csv, MetricRow};
pub use serializer::{export_workflow, load_workflow, ModelMetadata, SerializationFormat, SerializedModel};
