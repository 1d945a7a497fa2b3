//! Testing utilities and mock implementations.
//!
//! [`MockCatalogClient`] stands in for every remote protocol, so browsing,
//! downloading and post-processing can be tested without real hosts.

mod mock_client;

pub use mock_client::{MockCatalogClient, MockClientFactory};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::io::{Cursor, Write};

    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use crate::catalog::CatalogItem;
    use crate::config::{Section, Source};
    use crate::client::HostType;

    /// A catalog file entry with a size and date.
    pub fn item(filename: &str) -> CatalogItem {
        CatalogItem {
            file_size: "1.0M".to_string(),
            last_modified: "2024-01-01 12:00".to_string(),
            ..CatalogItem::new(filename)
        }
    }

    /// A RomM entry carrying its rom id.
    pub fn romm_item(filename: &str, id: u64) -> CatalogItem {
        CatalogItem {
            source_id: Some(id.to_string()),
            ..item(filename)
        }
    }

    /// A source with no sections and no credentials.
    pub fn source(host_type: HostType, root_uri: &str) -> Source {
        Source {
            display_name: format!("Test {}", host_type),
            host_type,
            root_uri: root_uri.to_string(),
            port: 0,
            username: String::new(),
            password: String::new(),
            share_name: String::new(),
            extension_filters: vec![],
            table_columns: Default::default(),
            source_replacements: Default::default(),
            filters: Default::default(),
            sections: vec![],
        }
    }

    /// A section downloading into `local_directory`.
    pub fn section(name: &str, host_subdirectory: &str, local_directory: &std::path::Path) -> Section {
        Section {
            name: name.to_string(),
            host_subdirectory: host_subdirectory.to_string(),
            local_directory: local_directory.to_path_buf(),
            ..Default::default()
        }
    }

    /// Build an in-memory zip archive from `(name, content)` entries.
    ///
    /// Names ending in `/` become directory entries.
    pub fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, content) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(content).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }
}
