use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fmt;

use crate::constraint::Constraint;
use crate::flags::FlagSet;
use crate::graphics::Graphics;
use crate::monsters::{
    is_flyer, is_moth_or_bat, is_untouched, Adjustments, MonsterAdjustment, MonsterKind,
    MonsterStats,
};
use crate::random::Random;
use crate::report::ShuffleTrace;
use crate::rom::{Location, MonsterPlacer, ObjectData, Rom, SpawnKind, FIRST_SLOT};
use crate::{Result, ShufflerError};

/// Flyers are only looked for among this many pool entries when priming a
/// location's flyer quota.
const FLYER_SCAN_WINDOW: usize = 40;

/// Object id written into slots nothing could be placed in.
pub const NEUTRAL_OBJECT: u8 = 0xb0;

/// NPC id of the sleeping Kensu, who leaves a chest behind.
const SLEEPING_KENSU: u8 = 0x6b;

/// Chest ids from here on are mimics.
const FIRST_MIMIC: u8 = 0x70;

/// One monster taken out of a vanilla spawn, with the graphics it had there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolMonster {
    pub id: u8,
    pub pat: u8,
    pub pal2: Option<u8>,
    pub pal3: Option<u8>,
    pub pat_bank: u8,
}

impl fmt::Display for PoolMonster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x} (page {:02x} bank {}", self.id, self.pat, self.pat_bank)?;
        if let Some(p) = self.pal2 {
            write!(f, " pal2 {:02x}", p)?;
        }
        if let Some(p) = self.pal3 {
            write!(f, " pal3 {:02x}", p)?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone)]
struct PoolLocation {
    id: u8,
    slots: Vec<u8>,
}

/// Collects every shuffleable monster spawn and redistributes them across
/// locations under each location's sprite constraints.
pub struct MonsterPool<'a> {
    flags: FlagSet,
    adjustments: &'a Adjustments,
    stats: BTreeMap<u8, MonsterStats>,
    monsters: Vec<PoolMonster>,
    used: Vec<PoolMonster>,
    locations: Vec<PoolLocation>,
}

impl<'a> MonsterPool<'a> {
    pub fn new(flags: FlagSet, adjustments: &'a Adjustments, stats: BTreeMap<u8, MonsterStats>) -> Self {
        Self {
            flags,
            adjustments,
            stats,
            monsters: Vec::new(),
            used: Vec::new(),
            locations: Vec::new(),
        }
    }

    pub fn monsters(&self) -> &[PoolMonster] {
        &self.monsters
    }

    /// Slots collected for a location, if it has been populated.
    pub fn slots(&self, location: u8) -> Option<&[u8]> {
        self.locations
            .iter()
            .find(|l| l.id == location)
            .map(|l| l.slots.as_slice())
    }

    fn is_shuffleable(&self, id: u8, objects: &BTreeMap<u8, ObjectData>) -> bool {
        if is_untouched(id) || !objects.contains_key(&id) {
            return false;
        }
        matches!(self.stats.get(&id), Some(s) if s.kind == MonsterKind::Monster)
    }

    /// Records the location's shuffleable monsters and the slots they came
    /// from. Nothing is modified.
    pub fn populate(&mut self, rom: &Rom, location: &Location, trace: &mut dyn ShuffleTrace) {
        let adjustment = self.adjustments.get(location.id);
        let skip = adjustment.skip
            || (adjustment.tower && !self.flags.shuffle_tower_monsters())
            || location.sprite_patterns.is_none()
            || location.sprite_palettes.is_none();

        let mut monsters = Vec::new();
        let mut slots = Vec::new();

        if let (false, Some(patterns), Some(palettes)) =
            (skip, location.sprite_patterns, location.sprite_palettes)
        {
            for (slot, spawn) in (FIRST_SLOT..=u8::MAX).zip(location.spawns.iter()) {
                if !spawn.used {
                    continue;
                }
                let Some(id) = spawn.kind.monster_id() else {
                    continue;
                };
                if !self.is_shuffleable(id, &rom.objects) {
                    continue;
                }
                let Some(object) = rom.objects.get(&id) else {
                    continue;
                };
                let pat_bank = spawn.pattern_bank & 1;
                monsters.push(PoolMonster {
                    id,
                    pat: patterns[pat_bank as usize],
                    pal2: object.uses_palette(2).then_some(palettes[0]),
                    pal3: object.uses_palette(3).then_some(palettes[1]),
                    pat_bank,
                });
                trace.record(&format!("start-{:02x}", id), format!("${:02x}", location.id));
                slots.push(slot);
            }
        }

        if monsters.is_empty() || adjustment.skip {
            slots.clear();
        }
        self.locations.push(PoolLocation {
            id: location.id,
            slots,
        });
        self.monsters.extend(monsters);
    }

    /// Shuffles location order and the pool, then fills every location in
    /// turn. Fails only when a location's fixed sprites are incompatible.
    pub fn shuffle(
        &mut self,
        rom: &mut Rom,
        random: &mut Random,
        graphics: &Graphics,
        trace: &mut dyn ShuffleTrace,
    ) -> Result<()> {
        self.trace_order("pre-shuffle", trace);
        random.shuffle(&mut self.locations);
        random.shuffle(&mut self.monsters);
        self.trace_order("post-shuffle", trace);

        info!(
            "shuffling {} monsters across {} locations",
            self.monsters.len(),
            self.locations.len()
        );

        while let Some(entry) = self.locations.pop() {
            let Some(index) = rom.locations.iter().position(|l| l.id == entry.id) else {
                continue;
            };
            self.fill_location(rom, index, entry.slots, random, graphics, trace)?;
        }
        Ok(())
    }

    fn trace_order(&self, stage: &str, trace: &mut dyn ShuffleTrace) {
        let key = format!("{} locations", stage);
        for l in &self.locations {
            trace.record(&key, format!("${:02x}", l.id));
        }
        let key = format!("{} monsters", stage);
        for m in &self.monsters {
            trace.record(&key, format!("{:02x}", m.id));
        }
    }

    /// Constraint implied by everything at the location that is not being
    /// reassigned.
    fn fixed_constraint(
        &self,
        location: &Location,
        slots: &[u8],
        graphics: &Graphics,
    ) -> Result<Constraint> {
        let adjustment = self.adjustments.get(location.id);
        let mut constraint = Constraint::for_location(adjustment);

        for (slot, spawn) in (FIRST_SLOT..=u8::MAX).zip(location.spawns.iter()) {
            if !spawn.used || slots.contains(&slot) {
                continue;
            }
            let mut required = Vec::new();
            match spawn.kind {
                SpawnKind::Chest { invisible: true, .. } => {}
                SpawnKind::Chest { id, .. } if id < FIRST_MIMIC => {
                    required.push(Constraint::treasure_chest())
                }
                SpawnKind::Chest { .. } => required.push(Constraint::mimic()),
                SpawnKind::Npc { id } => {
                    required.push(graphics.get_npc_constraint(location.id, id));
                    if id == SLEEPING_KENSU {
                        required.push(Constraint::kensu_chest());
                    }
                }
                SpawnKind::Boss { id } => {
                    required.push(graphics.get_boss_constraint(location.id, id))
                }
                SpawnKind::Monster { id } => {
                    required.push(graphics.get_fixed_monster_constraint(location.id, id))
                }
                SpawnKind::ShootingWall => required.push(Constraint::shooting_wall()),
                SpawnKind::Other { .. } => {}
            }
            for c in required {
                constraint = constraint.meet(&c, true).map_err(|source| {
                    ShufflerError::Constraint {
                        location: location.id,
                        slot,
                        source,
                    }
                })?;
            }
        }

        Ok(constraint)
    }

    fn fill_location(
        &mut self,
        rom: &mut Rom,
        index: usize,
        slots: Vec<u8>,
        random: &mut Random,
        graphics: &Graphics,
        trace: &mut dyn ShuffleTrace,
    ) -> Result<()> {
        let Rom {
            locations, objects, ..
        } = rom;
        let location = &mut locations[index];
        let (Some(_), Some(palettes)) = (location.sprite_patterns, location.sprite_palettes) else {
            return Ok(());
        };

        let key = format!("${:02x}", location.id);
        let adjustment = self.adjustments.get(location.id);
        let constraint = self.fixed_constraint(location, &slots, graphics)?;
        trace.record(&key, format!("Initial pass: {}", constraint));
        debug!("location {}: fixed sprites need {}", key, constraint);

        let placer = if !slots.is_empty() && self.flags.randomize_maps() {
            Some(location.monster_placer(random))
        } else {
            None
        };
        let had_slots = !slots.is_empty();

        let mut fill = LocationFill {
            location,
            objects,
            graphics,
            adjustment,
            constraint,
            flyers: adjustment.max_flyers,
            classes: BTreeMap::new(),
            slots,
            placer,
            palettes,
            shuffle_palettes: self.flags.shuffle_sprite_palettes(),
            key,
        };

        if fill.flyers > 0 && !fill.slots.is_empty() {
            let mut i = 0;
            while i < FLYER_SCAN_WINDOW.min(self.monsters.len()) {
                let m = self.monsters[i];
                if is_flyer(m.id) && fill.try_add(&m, trace) {
                    self.monsters.remove(i);
                }
                i += 1;
            }
        }

        let mut i = 0;
        while i < self.monsters.len() && !fill.slots.is_empty() {
            let m = self.monsters[i];
            if fill.try_add(&m, trace) {
                self.monsters.remove(i);
                if !is_flyer(m.id) {
                    self.used.push(m);
                }
            } else {
                i += 1;
            }
        }

        // Monsters placed earlier may appear again here.
        let mut i = 0;
        while i < self.used.len() && !fill.slots.is_empty() {
            let m = self.used[i];
            if fill.try_add(&m, trace) {
                let m = self.used.remove(i);
                self.used.push(m);
            } else {
                i += 1;
            }
        }

        let LocationFill {
            location,
            constraint,
            slots,
            key,
            ..
        } = fill;

        // Without slots nothing moved here, so the tables stay as they are.
        let constraint = if had_slots {
            constraint
        } else {
            match Constraint::current(location) {
                Some(current) => constraint.meet(&current, true).unwrap_or(constraint),
                None => constraint,
            }
        };
        constraint.fix(location, random);

        if !slots.is_empty() {
            warn!(
                "Failed to fill location {:02x}: {} remaining",
                location.id,
                slots.len()
            );
            trace.record(&key, format!("Failed to fill: {} remaining", slots.len()));
            for slot in slots {
                if let Some(spawn) = location.slot_spawn_mut(slot) {
                    spawn.x = 0;
                    spawn.y = 0;
                    spawn.kind = SpawnKind::Monster { id: NEUTRAL_OBJECT };
                    spawn.used = false;
                }
            }
        }

        graphics.configure(location);
        Ok(())
    }
}

/// Running state while one location's slots are being filled.
struct LocationFill<'r> {
    location: &'r mut Location,
    objects: &'r BTreeMap<u8, ObjectData>,
    graphics: &'r Graphics,
    adjustment: &'r MonsterAdjustment,
    constraint: Constraint,
    flyers: u8,
    /// monster class -> the id standing in for it here
    classes: BTreeMap<String, u8>,
    slots: Vec<u8>,
    placer: Option<MonsterPlacer>,
    /// sprite palettes the location has before this pass
    palettes: [u8; 2],
    shuffle_palettes: bool,
    key: String,
}

impl LocationFill<'_> {
    fn try_add(&mut self, m: &PoolMonster, trace: &mut dyn ShuffleTrace) -> bool {
        if self.slots.is_empty() {
            return false;
        }

        let objects = self.objects;
        let class = objects.get(&m.id).and_then(|o| o.monster_class.as_deref());
        if let Some(class) = class {
            if matches!(self.classes.get(class), Some(&rep) if rep != m.id) {
                return false;
            }
        }

        let flyer = is_flyer(m.id);
        let moth = is_moth_or_bat(m.id);
        if flyer && self.flyers == 0 {
            return false;
        }

        let c = self.graphics.get_monster_constraint(self.location.id, m.id);
        let meet = self
            .constraint
            .try_meet_holding(&c, self.palettes)
            .or_else(|| {
                let open = self.constraint.pal2().is_any() && self.constraint.pal3().is_any();
                if self.shuffle_palettes && open {
                    self.constraint.try_meet(&c)
                } else {
                    None
                }
            });
        let Some(meet) = meet else {
            return false;
        };

        let pos = match self.placer.as_mut() {
            Some(placer) => match placer.place() {
                Some(pos) => Some(pos),
                None => return false,
            },
            None => None,
        };

        trace.record(&self.key, format!("  Adding {}: {}", m, meet));
        self.constraint = meet;
        if let Some(class) = class {
            self.classes.insert(class.to_string(), m.id);
        }
        if flyer {
            self.flyers -= 1;
        }

        let adjustment = self.adjustment;
        let eligible = if flyer || moth {
            self.slots
                .iter()
                .position(|&s| adjustment.is_non_flyer_slot(s))
        } else {
            self.slots
                .iter()
                .position(|&s| !adjustment.is_non_flyer_slot(s))
        }
        .unwrap_or(0);
        let slot = self.slots.remove(eligible);

        trace.record(&format!("mon-{:02x}", m.id), self.key.clone());
        if let Some(spawn) = self.location.slot_spawn_mut(slot) {
            if let Some(pos) = pos {
                spawn.set_screen_tile((pos >> 8) as u8, (pos & 0xff) as u8);
            } else if let Some(offset) = adjustment.non_flyer(slot) {
                spawn.nudge(offset.dx, offset.dy);
            }
            spawn.kind = SpawnKind::Monster { id: m.id };
            trace.record(&self.key, format!("    slot {:02x}: {:?}", slot, spawn));
        }
        true
    }
}
