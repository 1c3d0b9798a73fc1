use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::random::Random;
use crate::Result;

/// Slot number of the first entry in a location's spawn table.
pub const FIRST_SLOT: u8 = 0x0d;

const SCREEN_WIDTH: u16 = 256;
const SCREEN_HEIGHT: u16 = 240;
const TILE_SIZE: u16 = 16;
const SCREEN_TILE_ROWS: u16 = 15;

/// Parsed view of the ROM that the shuffle passes read and write.
///
/// The binary layout lives elsewhere; here the ROM is an object graph that
/// round-trips through a JSON snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rom {
    pub locations: Vec<Location>,
    #[serde(default)]
    pub objects: BTreeMap<u8, ObjectData>,
    #[serde(default)]
    pub npcs: BTreeMap<u8, NpcData>,
}

impl Rom {
    pub fn from_json(text: &str) -> Result<Rom> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Rom> {
        let text = fs::read_to_string(path)?;
        Rom::from_json(&text)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn location(&self, id: u8) -> Option<&Location> {
        self.locations.iter().find(|l| l.id == id)
    }
}

/// Static data for a monster or boss object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectData {
    pub id: u8,
    #[serde(default)]
    pub name: String,
    /// Sprite memory base; distinct ids with the same base alias each other.
    pub base: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monster_class: Option<String>,
    /// Sprite palette indices (2 and/or 3) the object and its children use.
    #[serde(default)]
    pub palettes: Vec<u8>,
}

impl ObjectData {
    pub fn uses_palette(&self, index: u8) -> bool {
        self.palettes.contains(&index)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NpcData {
    pub id: u8,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub palettes: Vec<u8>,
}

impl NpcData {
    pub fn uses_palette(&self, index: u8) -> bool {
        self.palettes.contains(&index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpawnKind {
    Monster { id: u8 },
    Npc { id: u8 },
    Boss { id: u8 },
    Chest {
        id: u8,
        #[serde(default)]
        invisible: bool,
    },
    ShootingWall,
    Other { id: u8 },
}

impl SpawnKind {
    pub fn monster_id(&self) -> Option<u8> {
        match *self {
            SpawnKind::Monster { id } => Some(id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spawn {
    #[serde(flatten)]
    pub kind: SpawnKind,
    pub x: u16,
    pub y: u16,
    #[serde(default)]
    pub pattern_bank: u8,
    #[serde(default = "default_used")]
    pub used: bool,
}

fn default_used() -> bool {
    true
}

impl Spawn {
    pub fn new(kind: SpawnKind, x: u16, y: u16) -> Self {
        Self {
            kind,
            x,
            y,
            pattern_bank: 0,
            used: true,
        }
    }

    /// Screen byte: high nibble is the screen row, low nibble the column.
    pub fn screen(&self) -> u8 {
        let sx = (self.x / SCREEN_WIDTH) as u8 & 0x0f;
        let sy = (self.y / SCREEN_HEIGHT) as u8 & 0x0f;
        (sy << 4) | sx
    }

    /// Tile byte within the screen: high nibble row, low nibble column.
    pub fn tile(&self) -> u8 {
        let tx = ((self.x % SCREEN_WIDTH) / TILE_SIZE) as u8 & 0x0f;
        let ty = ((self.y % SCREEN_HEIGHT) / TILE_SIZE) as u8 & 0x0f;
        (ty << 4) | tx
    }

    pub fn set_screen_tile(&mut self, screen: u8, tile: u8) {
        self.x = (screen & 0x0f) as u16 * SCREEN_WIDTH + (tile & 0x0f) as u16 * TILE_SIZE;
        self.y = (screen >> 4) as u16 * SCREEN_HEIGHT + (tile >> 4) as u16 * TILE_SIZE;
    }

    /// Moves the spawn by whole tiles, clamping at the map origin.
    pub fn nudge(&mut self, dx: i8, dy: i8) {
        let shift = |v: u16, d: i8| -> u16 {
            (v as i32 + d as i32 * TILE_SIZE as i32).clamp(0, u16::MAX as i32) as u16
        };
        self.x = shift(self.x, dx);
        self.y = shift(self.y, dy);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Location {
    pub id: u8,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub spawns: Vec<Spawn>,
    #[serde(default)]
    pub sprite_patterns: Option<[u8; 2]>,
    #[serde(default)]
    pub sprite_palettes: Option<[u8; 2]>,
    /// Legal monster positions (`screen << 8 | tile`) for the map-aware placer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub monster_tiles: Vec<u16>,
}

impl Location {
    pub fn slot_spawn(&self, slot: u8) -> Option<&Spawn> {
        let idx = slot.checked_sub(FIRST_SLOT)? as usize;
        self.spawns.get(idx)
    }

    pub fn slot_spawn_mut(&mut self, slot: u8) -> Option<&mut Spawn> {
        let idx = slot.checked_sub(FIRST_SLOT)? as usize;
        self.spawns.get_mut(idx)
    }

    /// Builds a placer over this location's legal monster tiles. Positions
    /// already held by non-monster spawns are never handed out.
    pub fn monster_placer(&self, random: &mut Random) -> MonsterPlacer {
        let mut candidates = self.monster_tiles.clone();
        random.shuffle(&mut candidates);
        let taken = self
            .spawns
            .iter()
            .filter(|s| s.used && s.kind.monster_id().is_none())
            .map(|s| ((s.screen() as u16) << 8) | s.tile() as u16)
            .collect();
        MonsterPlacer { candidates, taken }
    }
}

/// Hands out monster positions for a randomized map.
#[derive(Debug, Clone)]
pub struct MonsterPlacer {
    candidates: Vec<u16>,
    taken: BTreeSet<u16>,
}

impl MonsterPlacer {
    const MIN_DISTANCE: i32 = 3;

    fn tile_coords(pos: u16) -> (i32, i32) {
        let screen = (pos >> 8) as u8;
        let tile = (pos & 0xff) as u8;
        let x = (screen & 0x0f) as i32 * 16 + (tile & 0x0f) as i32;
        let y = (screen >> 4) as i32 * SCREEN_TILE_ROWS as i32 + (tile >> 4) as i32;
        (x, y)
    }

    fn crowded(&self, pos: u16) -> bool {
        let (x, y) = Self::tile_coords(pos);
        self.taken.iter().any(|&t| {
            let (tx, ty) = Self::tile_coords(t);
            (tx - x).abs().max((ty - y).abs()) < Self::MIN_DISTANCE
        })
    }

    /// Next free position, or `None` once the map has no room left.
    pub fn place(&mut self) -> Option<u16> {
        let idx = self.candidates.iter().position(|&p| !self.crowded(p))?;
        let pos = self.candidates.remove(idx);
        self.taken.insert(pos);
        Some(pos)
    }
}
