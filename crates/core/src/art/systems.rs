//! Platform tag to libretro thumbnail system names.

use std::collections::HashMap;
use std::path::Path;

use super::ArtError;

const BUILTIN: &[(&str, &str)] = &[
    ("A26", "Atari - 2600"),
    ("A52", "Atari - 5200"),
    ("A78", "Atari - 7800"),
    ("ARCADE", "MAME"),
    ("CPS1", "FBNeo - Arcade Games"),
    ("CPS2", "FBNeo - Arcade Games"),
    ("CPS3", "FBNeo - Arcade Games"),
    ("FBN", "FBNeo - Arcade Games"),
    ("FC", "Nintendo - Nintendo Entertainment System"),
    ("FDS", "Nintendo - Family Computer Disk System"),
    ("GB", "Nintendo - Game Boy"),
    ("GBA", "Nintendo - Game Boy Advance"),
    ("GBC", "Nintendo - Game Boy Color"),
    ("GG", "Sega - Game Gear"),
    ("LYNX", "Atari - Lynx"),
    ("MAME", "MAME"),
    ("MD", "Sega - Mega Drive - Genesis"),
    ("MDMSU", "Sega - 32X"),
    ("MSX", "Microsoft - MSX"),
    ("N64", "Nintendo - Nintendo 64"),
    ("NDS", "Nintendo - Nintendo DS"),
    ("NEOGEO", "SNK - Neo Geo"),
    ("NES", "Nintendo - Nintendo Entertainment System"),
    ("NGP", "SNK - Neo Geo Pocket"),
    ("NGPC", "SNK - Neo Geo Pocket Color"),
    ("PCE", "NEC - PC Engine - TurboGrafx 16"),
    ("PCECD", "NEC - PC Engine CD - TurboGrafx-CD"),
    ("PKM", "Nintendo - Pokemon Mini"),
    ("PS", "Sony - PlayStation"),
    ("PSP", "Sony - PlayStation Portable"),
    ("SATURN", "Sega - Saturn"),
    ("SEGACD", "Sega - Mega-CD - Sega CD"),
    ("SFC", "Nintendo - Super Nintendo Entertainment System"),
    ("SG1000", "Sega - SG-1000"),
    ("SMS", "Sega - Master System - Mark III"),
    ("SNES", "Nintendo - Super Nintendo Entertainment System"),
    ("SUPA", "Nintendo - Super Nintendo Entertainment System"),
    ("VB", "Nintendo - Virtual Boy"),
    ("WS", "Bandai - WonderSwan"),
    ("WSC", "Bandai - WonderSwan Color"),
];

/// Resolves a platform tag such as `GBA` to the thumbnail repository's
/// system directory.
#[derive(Debug, Clone)]
pub struct SystemsMap {
    systems: HashMap<String, String>,
}

impl Default for SystemsMap {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SystemsMap {
    pub fn builtin() -> Self {
        Self {
            systems: BUILTIN
                .iter()
                .map(|(tag, system)| (tag.to_string(), system.to_string()))
                .collect(),
        }
    }

    /// Built-in table with entries from a JSON object file layered on top.
    pub fn with_overrides(path: &Path) -> Result<Self, ArtError> {
        let content = std::fs::read_to_string(path)?;
        let overrides: HashMap<String, String> = serde_json::from_str(&content)
            .map_err(|e| ArtError::InvalidMapping(format!("{}: {}", path.display(), e)))?;
        let mut map = Self::builtin();
        map.systems.extend(overrides);
        Ok(map)
    }

    /// Exact tag first, then its uppercase form.
    pub fn system(&self, tag: &str) -> Option<&str> {
        self.systems
            .get(tag)
            .or_else(|| self.systems.get(&tag.to_uppercase()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}
