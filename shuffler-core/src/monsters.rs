use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::rom::ObjectData;
use crate::{Result, ShufflerError};

/// Pixel correction applied when a flyer lands in a slot authored for a
/// ground monster: the spawn moves by `dx`/`dy` whole tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NonFlyer {
    pub slot: u8,
    pub dx: i8,
    pub dy: i8,
}

/// Location-level hardware requirements that are not expressed by any spawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixedSlots {
    #[serde(default)]
    pub pat0: Option<u8>,
    #[serde(default)]
    pub pat1: Option<u8>,
    #[serde(default)]
    pub pal2: Option<u8>,
    #[serde(default)]
    pub pal3: Option<u8>,
}

impl FixedSlots {
    pub const NONE: FixedSlots = FixedSlots {
        pat0: None,
        pat1: None,
        pal2: None,
        pal3: None,
    };
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonsterAdjustment {
    #[serde(default)]
    pub max_flyers: u8,
    #[serde(default)]
    pub non_flyers: Cow<'static, [NonFlyer]>,
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub tower: bool,
    #[serde(default)]
    pub fixed_slots: FixedSlots,
}

impl MonsterAdjustment {
    pub const NONE: MonsterAdjustment = MonsterAdjustment {
        max_flyers: 0,
        non_flyers: Cow::Borrowed(&[]),
        skip: false,
        tower: false,
        fixed_slots: FixedSlots::NONE,
    };

    pub fn non_flyer(&self, slot: u8) -> Option<&NonFlyer> {
        self.non_flyers.iter().find(|n| n.slot == slot)
    }

    pub fn is_non_flyer_slot(&self, slot: u8) -> bool {
        self.non_flyer(slot).is_some()
    }
}

macro_rules! nf {
    ($slot:expr, $dx:expr, $dy:expr) => {
        NonFlyer { slot: $slot, dx: $dx, dy: $dy }
    };
}

const fn flyers(max_flyers: u8) -> MonsterAdjustment {
    MonsterAdjustment {
        max_flyers,
        ..MonsterAdjustment::NONE
    }
}

const SKIP: MonsterAdjustment = MonsterAdjustment {
    skip: true,
    ..MonsterAdjustment::NONE
};

const TOWER: MonsterAdjustment = MonsterAdjustment {
    tower: true,
    ..MonsterAdjustment::NONE
};

/// Per-location shuffle rules, keyed by location id.
pub const MONSTER_ADJUSTMENTS: &[(u8, MonsterAdjustment)] = &[
    // Valley of Wind: the windmill needs its own page.
    (0x03, MonsterAdjustment {
        max_flyers: 2,
        fixed_slots: FixedSlots { pat1: Some(0x60), ..FixedSlots::NONE },
        ..MonsterAdjustment::NONE
    }),
    // Sealed Cave 4
    (0x07, MonsterAdjustment {
        non_flyers: Cow::Borrowed(&[nf!(0x0f, -3, 0), nf!(0x10, 0, -10), nf!(0x11, 4, 0)]),
        ..MonsterAdjustment::NONE
    }),
    // Cordel Plain West / East
    (0x14, flyers(2)),
    (0x15, flyers(2)),
    // Swamp
    (0x1a, MonsterAdjustment {
        max_flyers: 2,
        non_flyers: Cow::Borrowed(&[
            nf!(0x10, 0, 4),
            nf!(0x11, 0, 5),
            nf!(0x12, 0, 4),
            nf!(0x13, 0, 5),
            nf!(0x14, 0, 4),
            nf!(0x15, 0, 4),
        ]),
        fixed_slots: FixedSlots { pat1: Some(0x4f), pal3: Some(0x23), ..FixedSlots::NONE },
        ..MonsterAdjustment::NONE
    }),
    // Amazones
    (0x1b, SKIP),
    // Mt Sabre West
    (0x20, flyers(1)),
    (0x21, flyers(1)),
    (0x27, MonsterAdjustment {
        non_flyers: Cow::Borrowed(&[nf!(0x0d, 16, 0), nf!(0x0e, -16, 0)]),
        ..MonsterAdjustment::NONE
    }),
    // Mt Sabre North
    (0x28, flyers(1)),
    (0x29, flyers(1)),
    // Waterfall Valley North / South
    (0x40, MonsterAdjustment {
        max_flyers: 2,
        non_flyers: Cow::Borrowed(&[nf!(0x13, -16, 12), nf!(0x14, 10, 5)]),
        ..MonsterAdjustment::NONE
    }),
    (0x41, MonsterAdjustment {
        max_flyers: 2,
        non_flyers: Cow::Borrowed(&[nf!(0x15, -6, 0)]),
        ..MonsterAdjustment::NONE
    }),
    // Lime Tree Valley
    (0x42, MonsterAdjustment {
        non_flyers: Cow::Borrowed(&[nf!(0x0d, 8, 0), nf!(0x0e, 8, -8)]),
        ..MonsterAdjustment::NONE
    }),
    // Kirisa Meadow
    (0x47, MonsterAdjustment {
        max_flyers: 1,
        non_flyers: Cow::Borrowed(&[nf!(0x0d, -8, -8)]),
        ..MonsterAdjustment::NONE
    }),
    // Fog Lamp Cave 3
    (0x4a, MonsterAdjustment {
        max_flyers: 1,
        non_flyers: Cow::Borrowed(&[nf!(0x0e, 0, 4), nf!(0x0f, -3, 0), nf!(0x10, 4, 0)]),
        ..MonsterAdjustment::NONE
    }),
    (0x4c, flyers(1)),
    // Waterfall Cave 4
    (0x57, MonsterAdjustment {
        fixed_slots: FixedSlots { pat1: Some(0x4d), ..FixedSlots::NONE },
        ..MonsterAdjustment::NONE
    }),
    // Tower floors
    (0x58, TOWER),
    (0x59, TOWER),
    (0x5a, TOWER),
    (0x5b, TOWER),
    (0x5c, TOWER),
    // Angry Sea
    (0x60, MonsterAdjustment {
        max_flyers: 2,
        skip: true,
        fixed_slots: FixedSlots { pat1: Some(0x52), pal3: Some(0x08), ..FixedSlots::NONE },
        ..MonsterAdjustment::NONE
    }),
    // Underground Channel
    (0x64, SKIP),
    // Evil Spirit Island
    (0x68, MonsterAdjustment {
        fixed_slots: FixedSlots { pat1: Some(0x52), pal3: Some(0x08), ..FixedSlots::NONE },
        ..MonsterAdjustment::NONE
    }),
    (0x69, MonsterAdjustment {
        max_flyers: 1,
        non_flyers: Cow::Borrowed(&[nf!(0x17, 6, 4), nf!(0x18, 6, -5)]),
        ..MonsterAdjustment::NONE
    }),
    (0x6a, flyers(1)),
    // Sabera Palace
    (0x6c, MonsterAdjustment {
        max_flyers: 1,
        non_flyers: Cow::Borrowed(&[nf!(0x17, 24, 0)]),
        ..MonsterAdjustment::NONE
    }),
    (0x6d, MonsterAdjustment {
        max_flyers: 1,
        non_flyers: Cow::Borrowed(&[nf!(0x11, 0, 16), nf!(0x1b, 0, 0), nf!(0x1c, 0, 6)]),
        ..MonsterAdjustment::NONE
    }),
    // Goa Valley
    (0x78, flyers(1)),
    // Mt Hydra
    (0x7c, MonsterAdjustment {
        max_flyers: 1,
        non_flyers: Cow::Borrowed(&[nf!(0x15, 84, -39)]),
        ..MonsterAdjustment::NONE
    }),
    (0x84, MonsterAdjustment {
        non_flyers: Cow::Borrowed(&[nf!(0x12, -1, 0), nf!(0x13, 1, 0), nf!(0x14, -1, 0)]),
        ..MonsterAdjustment::NONE
    }),
    // Styx
    (0x88, flyers(1)),
    (0x89, flyers(1)),
    (0x8a, MonsterAdjustment {
        max_flyers: 1,
        non_flyers: Cow::Borrowed(&[
            nf!(0x0d, 0, 7),
            nf!(0x0e, 0, 0),
            nf!(0x0f, 3, 7),
            nf!(0x10, 6, 0),
            nf!(0x11, -16, 11),
        ]),
        ..MonsterAdjustment::NONE
    }),
    // Oasis Cave Entrance
    (0x8f, SKIP),
    // Desert 1 / Oasis Cave / Desert 2
    (0x90, MonsterAdjustment {
        max_flyers: 2,
        non_flyers: Cow::Borrowed(&[nf!(0x14, -3, -11), nf!(0x15, 16, 0)]),
        ..MonsterAdjustment::NONE
    }),
    (0x91, MonsterAdjustment {
        max_flyers: 2,
        non_flyers: Cow::Borrowed(&[nf!(0x18, 14, 0), nf!(0x19, -16, 4)]),
        ..MonsterAdjustment::NONE
    }),
    (0x98, MonsterAdjustment {
        max_flyers: 2,
        non_flyers: Cow::Borrowed(&[nf!(0x14, 6, -6), nf!(0x15, -16, 0)]),
        ..MonsterAdjustment::NONE
    }),
    // Pyramid
    (0x9e, flyers(2)),
    (0xa2, MonsterAdjustment {
        max_flyers: 1,
        non_flyers: Cow::Borrowed(&[nf!(0x12, 11, 0), nf!(0x13, 0, 6)]),
        ..MonsterAdjustment::NONE
    }),
    (0xa5, SKIP),
    // Draygon 2
    (0xa6, SKIP),
    // Goa Fortress
    (0xa8, SKIP),
    (0xa9, MonsterAdjustment {
        max_flyers: 2,
        non_flyers: Cow::Borrowed(&[nf!(0x16, 0, -2), nf!(0x17, 0, 2)]),
        ..MonsterAdjustment::NONE
    }),
    (0xaa, SKIP),
    (0xad, MonsterAdjustment {
        max_flyers: 2,
        non_flyers: Cow::Borrowed(&[nf!(0x18, 8, 0), nf!(0x19, -8, 0)]),
        ..MonsterAdjustment::NONE
    }),
    (0xaf, MonsterAdjustment {
        non_flyers: Cow::Borrowed(&[nf!(0x0d, 0, 0), nf!(0x0e, 0, 0), nf!(0x13, -38, 59)]),
        ..MonsterAdjustment::NONE
    }),
    (0xb4, MonsterAdjustment {
        max_flyers: 2,
        non_flyers: Cow::Borrowed(&[nf!(0x11, 0, 6), nf!(0x12, 6, 0)]),
        ..MonsterAdjustment::NONE
    }),
    // Portoa Palace entry
    (0xd7, SKIP),
];

/// Monsters that fly; capped per location by `max_flyers`.
pub const FLYERS: &[u8] = &[0x59, 0x5c, 0x6e, 0x6f, 0x81, 0x8a, 0xa3, 0xc4];

/// Flying sprites that do not count against the flyer cap but still prefer
/// slots with an offset.
pub const MOTHS_AND_BATS: &[u8] = &[0x55, 0x5d, 0x7c, 0xbc, 0xc1];

/// Monster ids that are never moved: platforms, harmless robots and a few
/// objects that glitch when relocated.
pub const UNTOUCHED_MONSTERS: &[u8] = &[0x7e, 0x7f, 0x83, 0x8d, 0x8e, 0x8f, 0x9f, 0xa6];

pub fn is_flyer(id: u8) -> bool {
    FLYERS.contains(&id)
}

pub fn is_moth_or_bat(id: u8) -> bool {
    MOTHS_AND_BATS.contains(&id)
}

pub fn is_untouched(id: u8) -> bool {
    UNTOUCHED_MONSTERS.contains(&id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MonsterKind {
    Monster,
    Boss,
    Projectile,
}

use MonsterKind::{Boss, Monster, Projectile};

/// Objects subject to difficulty scaling. Only `Monster` entries enter the
/// shuffle pool.
pub const SCALED_MONSTERS: &[(u8, MonsterKind, &str)] = &[
    (0x3f, Projectile, "Sorceror shot"),
    (0x4b, Boss, "Wraith??"),
    (0x4f, Monster, "Wraith"),
    (0x50, Monster, "Blue Slime"),
    (0x51, Monster, "Weretiger"),
    (0x52, Monster, "Green Jelly"),
    (0x53, Monster, "Red Slime"),
    (0x54, Monster, "Rock Golem"),
    (0x55, Monster, "Blue Bat"),
    (0x56, Monster, "Green Wyvern"),
    (0x57, Boss, "Vampire"),
    (0x58, Monster, "Orc"),
    (0x59, Monster, "Red Flying Swamp Insect"),
    (0x5a, Monster, "Blue Mushroom"),
    (0x5b, Monster, "Swamp Tomato"),
    (0x5c, Monster, "Flying Meadow Insect"),
    (0x5d, Monster, "Swamp Plant"),
    (0x5e, Boss, "Insect"),
    (0x5f, Monster, "Large Blue Slime"),
    (0x60, Monster, "Ice Zombie"),
    (0x61, Monster, "Green Living Rock"),
    (0x62, Monster, "Green Spider"),
    (0x63, Monster, "Red/Purple Wyvern"),
    (0x64, Monster, "Draygonia Soldier"),
    (0x65, Monster, "Ice Entity"),
    (0x66, Monster, "Red Living Rock"),
    (0x67, Monster, "Ice Golem"),
    (0x68, Boss, "Kelbesque"),
    (0x69, Monster, "Giant Red Slime"),
    (0x6a, Monster, "Troll"),
    (0x6b, Monster, "Red Jelly"),
    (0x6c, Monster, "Medusa"),
    (0x6d, Monster, "Red Crab"),
    (0x6e, Monster, "Medusa Head"),
    (0x6f, Monster, "Evil Bird"),
    (0x71, Monster, "Red/Purple Mushroom"),
    (0x72, Monster, "Violet Earth Entity"),
    (0x73, Monster, "Mimic"),
    (0x74, Monster, "Red Spider"),
    (0x75, Monster, "Fishman"),
    (0x76, Monster, "Jellyfish"),
    (0x77, Monster, "Kraken"),
    (0x78, Monster, "Dark Green Wyvern"),
    (0x79, Monster, "Sand Monster"),
    (0x7b, Monster, "Wraith Shadow 1"),
    (0x7c, Monster, "Killer Moth"),
    (0x7d, Boss, "Sabera"),
    (0x80, Monster, "Draygonia Archer"),
    (0x81, Monster, "Evil Bomber Bird"),
    (0x82, Monster, "Lavaman/blob"),
    (0x84, Monster, "Lizardman (w/ flail)"),
    (0x85, Monster, "Giant Eye"),
    (0x86, Monster, "Salamander"),
    (0x87, Monster, "Sorceror"),
    (0x88, Boss, "Mado"),
    (0x89, Monster, "Draygonia Knight"),
    (0x8a, Monster, "Devil"),
    (0x8b, Boss, "Kelbesque 2"),
    (0x8c, Monster, "Wraith Shadow 2"),
    (0x90, Boss, "Sabera 2"),
    (0x91, Monster, "Tarantula"),
    (0x92, Monster, "Skeleton"),
    (0x93, Boss, "Mado 2"),
    (0x94, Monster, "Purple Giant Eye"),
    (0x95, Monster, "Black Knight (w/ flail)"),
    (0x96, Monster, "Scorpion"),
    (0x97, Boss, "Karmine"),
    (0x98, Monster, "Sandman/blob"),
    (0x99, Monster, "Mummy"),
    (0x9a, Monster, "Tomb Guardian"),
    (0x9b, Boss, "Draygon"),
    (0x9e, Monster, "Vampire Bat"),
    (0xa0, Monster, "Ground Sentry (1)"),
    (0xa1, Monster, "Tower Defense Mech (2)"),
    (0xa2, Monster, "Tower Sentinel"),
    (0xa3, Monster, "Air Sentry"),
    (0xa5, Boss, "Vampire 2"),
    (0xa7, Boss, "Draygon 2"),
    (0xa8, Monster, "Ground Sentry (2)"),
    (0xa9, Monster, "Tower Defense Mech (2)"),
    (0xac, Monster, "Wraith Shadow 3"),
    (0xad, Monster, "Wraith Shadow 4"),
    (0xbc, Monster, "Mummy Bat"),
    (0xc1, Monster, "Stone Bat"),
    (0xc4, Monster, "Lava Bird"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonsterStats {
    pub kind: MonsterKind,
    pub name: &'static str,
}

impl MonsterStats {
    /// Flat id -> stats map. Any object sharing sprite memory (`base`) with a
    /// listed id inherits that entry unless it has one of its own.
    pub fn resolve(objects: &BTreeMap<u8, ObjectData>) -> BTreeMap<u8, MonsterStats> {
        let mut stats: BTreeMap<u8, MonsterStats> = SCALED_MONSTERS
            .iter()
            .map(|&(id, kind, name)| (id, MonsterStats { kind, name }))
            .collect();

        let mut by_base: BTreeMap<u16, MonsterStats> = BTreeMap::new();
        for &(id, kind, name) in SCALED_MONSTERS {
            if let Some(object) = objects.get(&id) {
                by_base
                    .entry(object.base)
                    .or_insert(MonsterStats { kind, name });
            }
        }

        for (&id, object) in objects {
            if stats.contains_key(&id) {
                continue;
            }
            if let Some(entry) = by_base.get(&object.base) {
                stats.insert(id, entry.clone());
            }
        }

        stats
    }
}

static NO_ADJUSTMENT: MonsterAdjustment = MonsterAdjustment::NONE;

/// Compiled-in adjustment table with optional per-location overrides.
#[derive(Debug, Clone)]
pub struct Adjustments {
    entries: BTreeMap<u8, MonsterAdjustment>,
}

impl Default for Adjustments {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Adjustments {
    pub fn builtin() -> Self {
        Self {
            entries: MONSTER_ADJUSTMENTS.iter().cloned().collect(),
        }
    }

    pub fn get(&self, location: u8) -> &MonsterAdjustment {
        self.entries.get(&location).unwrap_or(&NO_ADJUSTMENT)
    }

    pub fn insert(&mut self, location: u8, adjustment: MonsterAdjustment) {
        self.entries.insert(location, adjustment);
    }

    /// Replaces entries with those from a JSON object keyed by location id.
    /// Unknown keys inside an entry are rejected.
    pub fn apply_overrides_json(&mut self, text: &str) -> Result<()> {
        let overrides: BTreeMap<u8, MonsterAdjustment> = serde_json::from_str(text)
            .map_err(|e| ShufflerError::Adjustment(e.to_string()))?;
        self.entries.extend(overrides);
        Ok(())
    }

    pub fn load_overrides(&mut self, path: &Path) -> Result<()> {
        let text = fs::read_to_string(path)?;
        self.apply_overrides_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjustment_ids_are_unique_and_sorted() {
        for pair in MONSTER_ADJUSTMENTS.windows(2) {
            assert!(pair[0].0 < pair[1].0, "{:02x} before {:02x}", pair[0].0, pair[1].0);
        }
    }

    #[test]
    fn non_flyer_slots_are_unique_per_location() {
        for (id, adj) in MONSTER_ADJUSTMENTS {
            let mut slots: Vec<u8> = adj.non_flyers.iter().map(|n| n.slot).collect();
            slots.sort_unstable();
            slots.dedup();
            assert_eq!(slots.len(), adj.non_flyers.len(), "location {:02x}", id);
        }
    }

    #[test]
    fn unknown_location_has_no_adjustment() {
        let adjustments = Adjustments::builtin();
        assert_eq!(adjustments.get(0xff), &MonsterAdjustment::NONE);
        assert!(adjustments.get(0x1b).skip);
        assert!(adjustments.get(0x59).tower);
    }

    #[test]
    fn override_replaces_entry() {
        let mut adjustments = Adjustments::builtin();
        adjustments
            .apply_overrides_json(
                r#"{"26": {"max_flyers": 0, "non_flyers": [{"slot": 16, "dx": 1, "dy": 2}]}}"#,
            )
            .unwrap();
        let swamp = adjustments.get(0x1a);
        assert_eq!(swamp.max_flyers, 0);
        assert_eq!(swamp.non_flyer(0x10), Some(&NonFlyer { slot: 0x10, dx: 1, dy: 2 }));
        assert_eq!(swamp.fixed_slots, FixedSlots::NONE);
    }

    #[test]
    fn override_with_unknown_key_is_fatal() {
        let mut adjustments = Adjustments::builtin();
        let err = adjustments
            .apply_overrides_json(r#"{"3": {"maxFlyers": 2}}"#)
            .unwrap_err();
        assert!(matches!(err, ShufflerError::Adjustment(_)));
    }

    #[test]
    fn aliases_share_stats_by_base() {
        let mut objects = BTreeMap::new();
        objects.insert(0x50, ObjectData { id: 0x50, base: 0x100, ..Default::default() });
        objects.insert(0xe0, ObjectData { id: 0xe0, base: 0x100, ..Default::default() });
        objects.insert(0xe1, ObjectData { id: 0xe1, base: 0x200, ..Default::default() });
        let stats = MonsterStats::resolve(&objects);
        assert_eq!(stats.get(&0xe0).map(|s| s.name), Some("Blue Slime"));
        assert!(!stats.contains_key(&0xe1));
        assert_eq!(stats.get(&0x51).map(|s| s.kind), Some(MonsterKind::Monster));
    }
}
