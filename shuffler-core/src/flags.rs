use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while parsing a flag string such as `"Mrt Tp Wm"`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlagError {
    #[error("flag group '{group}' does not start with an upper-case letter")]
    MissingGroup { group: String },

    #[error("unknown flag '{group}{flag}'")]
    Unknown { group: char, flag: char },
}

/// The subset of randomiser flags the monster and graphics passes query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagSet {
    shuffle_monsters: bool,
    shuffle_tower_monsters: bool,
    shuffle_sprite_palettes: bool,
    randomize_maps: bool,
}

impl FlagSet {
    pub fn shuffle_monsters(&self) -> bool {
        self.shuffle_monsters
    }

    pub fn shuffle_tower_monsters(&self) -> bool {
        self.shuffle_tower_monsters
    }

    pub fn shuffle_sprite_palettes(&self) -> bool {
        self.shuffle_sprite_palettes
    }

    pub fn randomize_maps(&self) -> bool {
        self.randomize_maps
    }

    fn set(&mut self, group: char, flag: char) -> Result<(), FlagError> {
        match (group, flag) {
            ('M', 'r') => self.shuffle_monsters = true,
            ('M', 't') => self.shuffle_tower_monsters = true,
            ('T', 'p') => self.shuffle_sprite_palettes = true,
            ('W', 'm') => self.randomize_maps = true,
            _ => return Err(FlagError::Unknown { group, flag }),
        }
        Ok(())
    }
}

impl FromStr for FlagSet {
    type Err = FlagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flags = FlagSet::default();
        for group in s.split_whitespace() {
            let mut chars = group.chars();
            let letter = match chars.next() {
                Some(c) if c.is_ascii_uppercase() => c,
                _ => {
                    return Err(FlagError::MissingGroup {
                        group: group.to_string(),
                    })
                }
            };
            let mut any = false;
            for flag in chars {
                flags.set(letter, flag)?;
                any = true;
            }
            if !any {
                return Err(FlagError::MissingGroup {
                    group: group.to_string(),
                });
            }
        }
        Ok(flags)
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut groups: Vec<String> = Vec::new();

        let mut m = String::new();
        if self.shuffle_monsters {
            m.push('r');
        }
        if self.shuffle_tower_monsters {
            m.push('t');
        }
        if !m.is_empty() {
            groups.push(format!("M{m}"));
        }
        if self.shuffle_sprite_palettes {
            groups.push("Tp".to_string());
        }
        if self.randomize_maps {
            groups.push("Wm".to_string());
        }

        write!(f, "{}", groups.join(" "))
    }
}
