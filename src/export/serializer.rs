//! Model artifact serialization

use crate::error::{FraudlabError, Result};
use crate::workflow::FittedWorkflow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::info;

/// Serialization format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializationFormat {
    /// Binary format using bincode (efficient)
    #[default]
    Binary,
    /// JSON format (portable, human-readable)
    Json,
}

/// Descriptive information stored next to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub name: String,
    pub version: String,
    pub trained_at: Option<DateTime<Utc>>,
    /// Raw input columns the workflow expects
    pub input_columns: Vec<String>,
    pub target_name: String,
    pub model_type: String,
    pub hyperparameters: BTreeMap<String, f64>,
    /// Held-out metrics at export time
    pub metrics: BTreeMap<String, f64>,
    pub extra: BTreeMap<String, String>,
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self {
            name: "fraud_model".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            trained_at: None,
            input_columns: Vec::new(),
            target_name: String::new(),
            model_type: "unknown".to_string(),
            hyperparameters: BTreeMap::new(),
            metrics: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }
}

impl ModelMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Metadata describing `workflow`: inputs, target, family and hyperparameters
    pub fn for_workflow(name: impl Into<String>, workflow: &FittedWorkflow) -> Self {
        let spec = workflow.spec();
        Self {
            name: name.into(),
            trained_at: workflow.diagnostics().map(|d| d.fitted_at),
            input_columns: workflow
                .recipe()
                .input_schema()
                .columns
                .iter()
                .map(|(c, _)| c.clone())
                .collect(),
            target_name: workflow.target_name().to_string(),
            model_type: spec.family.name().to_string(),
            hyperparameters: spec
                .params
                .keys()
                .filter_map(|&p| spec.value(p).map(|v| (p.name().to_string(), v)))
                .collect(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn add_metric(mut self, key: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }

    pub fn add_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// On-disk envelope around the encoded workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedModel {
    /// Magic bytes for format detection
    pub magic: [u8; 4],
    pub format_version: u32,
    pub metadata: ModelMetadata,
    /// bincode encoding of the fitted workflow
    pub model_data: Vec<u8>,
    /// FNV-1a hash of `model_data`
    pub checksum: u64,
}

impl SerializedModel {
    pub const MAGIC: [u8; 4] = *b"FRLB";
    pub const VERSION: u32 = 1;

    pub fn new(metadata: ModelMetadata, model_data: Vec<u8>) -> Self {
        let checksum = Self::compute_checksum(&model_data);
        Self {
            magic: Self::MAGIC,
            format_version: Self::VERSION,
            metadata,
            model_data,
            checksum,
        }
    }

    fn compute_checksum(data: &[u8]) -> u64 {
        const FNV_OFFSET: u64 = 14695981039346656037;
        const FNV_PRIME: u64 = 1099511628211;

        let mut hash = FNV_OFFSET;
        for byte in data {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash
    }

    pub fn verify_checksum(&self) -> bool {
        Self::compute_checksum(&self.model_data) == self.checksum
    }

    fn verify(&self) -> Result<()> {
        if self.magic != Self::MAGIC {
            return Err(FraudlabError::SerializationError(
                "not a fraudlab model artifact (bad magic bytes)".to_string(),
            ));
        }
        if self.format_version != Self::VERSION {
            return Err(FraudlabError::SerializationError(format!(
                "unsupported artifact version {} (expected {})",
                self.format_version,
                Self::VERSION
            )));
        }
        if !self.verify_checksum() {
            return Err(FraudlabError::SerializationError(
                "checksum verification failed - file may be corrupted".to_string(),
            ));
        }
        Ok(())
    }
}

/// Write a fitted workflow and its metadata to `path`
pub fn export_workflow(
    workflow: &FittedWorkflow,
    path: impl AsRef<Path>,
    metadata: &ModelMetadata,
    format: SerializationFormat,
) -> Result<()> {
    let path = path.as_ref();
    let model_data = bincode::serialize(workflow)?;
    let envelope = SerializedModel::new(metadata.clone(), model_data);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    match format {
        SerializationFormat::Binary => bincode::serialize_into(&mut writer, &envelope)?,
        SerializationFormat::Json => serde_json::to_writer_pretty(&mut writer, &envelope)?,
    }
    writer.flush()?;

    info!(
        path = %path.display(),
        format = ?format,
        bytes = envelope.model_data.len(),
        reduced = workflow.is_reduced(),
        "Model exported"
    );
    Ok(())
}

/// Read an artifact written by [`export_workflow`]; the format is detected
pub fn load_workflow(path: impl AsRef<Path>) -> Result<(FittedWorkflow, ModelMetadata)> {
    let path = path.as_ref();
    let mut bytes = Vec::new();
    BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;

    let is_json = bytes.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'{');
    let envelope: SerializedModel = if is_json {
        serde_json::from_slice(&bytes)?
    } else {
        bincode::deserialize(&bytes)?
    };
    envelope.verify()?;

    let workflow: FittedWorkflow = bincode::deserialize(&envelope.model_data)?;
    info!(path = %path.display(), model = %envelope.metadata.model_type, "Model loaded");
    Ok((workflow, envelope.metadata))
}
