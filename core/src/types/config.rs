use crate::error::{DcmwError, Result};
use crate::protocol::ProtocolTemplate;
use std::path::Path;

/// Configuration of a pipeline run
///
/// Loaded from TOML; every key is optional.
///
/// ```toml
/// threads = 4
///
/// [[template.requirements]]
/// label = "T2"
/// category = "T2W"
/// ```
///
/// # Example
///
/// ```
/// use dcmw_core::PipelineConfig;
///
/// let config = PipelineConfig::default().with_threads(4);
/// assert_eq!(config.threads, Some(4));
/// assert_eq!(config.template.requirements.len(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Default, serde::Deserialize)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Worker threads; `None` uses one per core
    pub threads: Option<usize>,

    /// Requirements a study must meet to be a full protocol
    pub template: ProtocolTemplate,
}

impl PipelineConfig {
    /// Parses a configuration from TOML text
    ///
    /// # Example
    ///
    /// ```
    /// use dcmw_core::PipelineConfig;
    ///
    /// let config = PipelineConfig::from_toml_str("threads = 2").unwrap();
    /// assert_eq!(config.threads, Some(2));
    ///
    /// assert!(PipelineConfig::from_toml_str("threads = 0").is_err());
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Builder: Set the number of worker threads
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Builder: Set the protocol template
    pub fn with_template(mut self, template: ProtocolTemplate) -> Self {
        self.template = template;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.threads == Some(0) {
            return Err(DcmwError::Config("threads must be at least 1".to_string()));
        }
        if let Some(requirement) = self
            .template
            .requirements
            .iter()
            .find(|r| r.label.trim().is_empty())
        {
            return Err(DcmwError::Config(format!(
                "protocol requirement for {} has an empty label",
                requirement.category
            )));
        }
        Ok(())
    }
}
