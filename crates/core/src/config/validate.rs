use std::collections::HashSet;

use super::{types::Config, ConfigError};
use crate::client::HostType;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - At least one transfer may run at a time
/// - Source display names are non-empty and unique
/// - Section names are unique per source and every section has a local folder
/// - Protocol-specific required fields are present
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.downloads.max_concurrent == 0 {
        return Err(ConfigError::ValidationError(
            "downloads.max_concurrent must be at least 1".to_string(),
        ));
    }

    let mut source_names = HashSet::new();
    for source in &config.sources {
        if source.display_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "source display_name cannot be empty".to_string(),
            ));
        }
        if !source_names.insert(source.display_name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate source display_name: {}",
                source.display_name
            )));
        }
        if source.root_uri.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "source '{}' has no root_uri",
                source.display_name
            )));
        }

        match source.host_type {
            HostType::Smb if source.share_name.is_empty() => {
                return Err(ConfigError::ValidationError(format!(
                    "smb source '{}' requires share_name",
                    source.display_name
                )));
            }
            HostType::Custom if source.table_columns.filename_header.is_empty() => {
                return Err(ConfigError::ValidationError(format!(
                    "custom source '{}' requires table_columns.filename_header",
                    source.display_name
                )));
            }
            _ => {}
        }

        let mut section_names = HashSet::new();
        let mut missing_folders = Vec::new();
        for section in &source.sections {
            if !section_names.insert(section.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate section '{}' in source '{}'",
                    section.name, source.display_name
                )));
            }
            if section.local_directory.as_os_str().is_empty() {
                missing_folders.push(section.name.clone());
            }
            if source.host_type == HostType::Romm && section.romm_platform_id.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "romm section '{}' requires romm_platform_id",
                    section.name
                )));
            }
        }

        if !missing_folders.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "sections without local_directory: {}",
                missing_folders.join(", ")
            )));
        }
    }

    Ok(())
}
