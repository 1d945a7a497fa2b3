//! Display names and classification tags for listed items.

use std::collections::HashMap;
use std::path::Path;

use super::types::CatalogItem;

/// Trailing parenthesised tag of a name: `"Game Boy Advance (GBA)"` -> `GBA`.
pub fn extract_tag(name: &str) -> Option<String> {
    let trimmed = name.trim_end().trim_end_matches('/').trim_end();
    let inner = trimmed.strip_suffix(')')?;
    let open = inner.rfind('(')?;
    let tag = inner[open + 1..].trim();
    if tag.is_empty() {
        None
    } else {
        Some(tag.to_string())
    }
}

/// Arcade short names mapped to human titles.
///
/// Loaded from a TSV file where each line is `rom file<TAB>display name`.
#[derive(Debug, Clone, Default)]
pub struct ArcadeNames {
    names: HashMap<String, String>,
}

impl ArcadeNames {
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let names = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| {
                let mut parts = line.split('\t');
                let rom = parts.next()?.trim();
                let display = parts.next()?.trim();
                Some((rom.to_string(), display.to_string()))
            })
            .collect();
        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Look up by exact filename, then by stem.
    pub fn lookup(&self, filename: &str) -> Option<&str> {
        self.names
            .get(filename)
            .or_else(|| self.names.get(super::types::file_stem(filename)))
            .map(String::as_str)
    }
}

/// Fill in display names and directory tags.
pub fn apply_display_names(items: &mut [CatalogItem], arcade: Option<&ArcadeNames>) {
    for item in items.iter_mut() {
        if let Some(mapped) = arcade.and_then(|names| names.lookup(&item.filename)) {
            item.display_name = mapped.to_string();
        } else if item.display_name.is_empty() {
            item.display_name = if item.is_directory {
                item.filename.trim_end_matches('/').to_string()
            } else {
                item.stem().trim().to_string()
            };
        }

        if item.is_directory && item.tag.is_none() {
            item.tag = extract_tag(&item.filename);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_tag() {
        assert_eq!(extract_tag("Game Boy Advance (GBA)"), Some("GBA".to_string()));
        assert_eq!(extract_tag("Sony PlayStation (PS)/"), Some("PS".to_string()));
        assert_eq!(extract_tag("Arcade"), None);
        assert_eq!(extract_tag("Broken ()"), None);
    }

    #[test]
    fn test_arcade_names_parse_and_lookup() {
        let names = ArcadeNames::parse("sf2.zip\tStreet Fighter II\n\n  mslug\tMetal Slug  \nbadline\n");
        assert_eq!(names.len(), 2);
        assert_eq!(names.lookup("sf2.zip"), Some("Street Fighter II"));
        assert_eq!(names.lookup("mslug.zip"), Some("Metal Slug"));
        assert_eq!(names.lookup("kof98.zip"), None);
    }

    #[test]
    fn test_apply_display_names() {
        let arcade = ArcadeNames::parse("sf2.zip\tStreet Fighter II");
        let mut items = vec![
            CatalogItem::new("sf2.zip"),
            CatalogItem::new("Tetris (World).gb"),
            CatalogItem {
                is_directory: true,
                ..CatalogItem::new("Nintendo 64 (N64)/")
            },
        ];

        apply_display_names(&mut items, Some(&arcade));

        assert_eq!(items[0].display_name, "Street Fighter II");
        assert_eq!(items[1].display_name, "Tetris (World)");
        assert_eq!(items[1].tag, None);
        assert_eq!(items[2].display_name, "Nintendo 64 (N64)");
        assert_eq!(items[2].tag.as_deref(), Some("N64"));
    }
}
