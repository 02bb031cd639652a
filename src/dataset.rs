use crate::error::AssemblyError;
use crate::model::config::{CodecConfig, GridShape};
use crate::model::score::PartRecord;
use anyhow::{Result, anyhow};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

pub const FORMAT_VERSION: u32 = 1;

/// Everything encoded from one source file, plus the grid shape it was encoded with.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Dataset {
    pub format_version: u32,
    pub shape: GridShape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub parts: Vec<PartRecord>,
}

impl Dataset {
    pub fn new(config: &CodecConfig, source: Option<String>, parts: Vec<PartRecord>) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            shape: config.shape(),
            source,
            parts,
        }
    }

    pub fn measure_count(&self) -> usize {
        self.parts.iter().map(|part| part.measures.len()).sum()
    }

    /// Fails unless the dataset's grids were produced with the same shape `config` decodes with.
    pub fn check_compatible(&self, config: &CodecConfig) -> Result<(), AssemblyError> {
        let codec = config.shape();
        if self.shape != codec {
            return Err(AssemblyError::ConfigMismatch {
                dataset: self.shape.to_string(),
                codec: codec.to_string(),
            });
        }
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref()).map_err(|e| {
            anyhow!(
                "Failed to create dataset {}: {}",
                path.as_ref().display(),
                e
            )
        })?;

        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)
            .map_err(|e| anyhow!("Failed to serialize dataset: {}", e))?;
        writer.flush()?;

        debug!(
            "Saved {} part(s), {} measure(s) to {}",
            self.parts.len(),
            self.measure_count(),
            path.as_ref().display()
        );
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(|e| {
            anyhow!(
                "Failed to open dataset {}: {}",
                path.as_ref().display(),
                e
            )
        })?;

        let dataset: Dataset = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| anyhow!("Failed to parse dataset {}: {}", path.as_ref().display(), e))?;

        if dataset.format_version != FORMAT_VERSION {
            return Err(anyhow!(
                "Unsupported dataset format version {} (expected {})..!",
                dataset.format_version,
                FORMAT_VERSION
            ));
        }

        Ok(dataset)
    }
}
