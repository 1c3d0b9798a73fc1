use std::collections::{BTreeMap, BTreeSet};

use crate::constraint::Constraint;
use crate::monsters::is_untouched;
use crate::random::Random;
use crate::rom::{Location, Rom, SpawnKind};

/// Where a sprite was found in the vanilla data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placement {
    bank: u8,
    page: u8,
    pal2: Option<u8>,
    pal3: Option<u8>,
}

/// Every page and palette a monster has been drawn with anywhere.
#[derive(Debug, Clone, Default)]
struct SpriteUsage {
    pages: BTreeSet<u8>,
    uses_pal2: bool,
    uses_pal3: bool,
    pal2: BTreeSet<u8>,
    pal3: BTreeSet<u8>,
}

/// Sprite compatibility model derived from the vanilla ROM.
#[derive(Debug, Clone, Default)]
pub struct Graphics {
    monsters: BTreeMap<u8, SpriteUsage>,
    monster_at: BTreeMap<(u8, u8), Placement>,
    npc_at: BTreeMap<(u8, u8), Placement>,
    boss_at: BTreeMap<(u8, u8), Placement>,
    monster_palettes: BTreeSet<u8>,
    /// vanilla palette -> shuffled palette, for reassigned monsters only
    palette_map: BTreeMap<u8, u8>,
}

impl Graphics {
    pub fn new(rom: &Rom) -> Self {
        let mut graphics = Graphics::default();

        for location in &rom.locations {
            let (Some(patterns), Some(palettes)) =
                (location.sprite_patterns, location.sprite_palettes)
            else {
                continue;
            };

            for spawn in location.spawns.iter().filter(|s| s.used) {
                let bank = spawn.pattern_bank & 1;
                let placement = |uses2: bool, uses3: bool| Placement {
                    bank,
                    page: patterns[bank as usize],
                    pal2: uses2.then_some(palettes[0]),
                    pal3: uses3.then_some(palettes[1]),
                };

                match spawn.kind {
                    SpawnKind::Monster { id } => {
                        let (uses2, uses3) = rom
                            .objects
                            .get(&id)
                            .map(|o| (o.uses_palette(2), o.uses_palette(3)))
                            .unwrap_or((false, false));
                        let p = placement(uses2, uses3);
                        graphics.monster_at.entry((location.id, id)).or_insert(p);

                        let usage = graphics.monsters.entry(id).or_default();
                        usage.pages.insert(p.page);
                        usage.uses_pal2 |= uses2;
                        usage.uses_pal3 |= uses3;
                        if let Some(v) = p.pal2 {
                            usage.pal2.insert(v);
                            graphics.monster_palettes.insert(v);
                        }
                        if let Some(v) = p.pal3 {
                            usage.pal3.insert(v);
                            graphics.monster_palettes.insert(v);
                        }
                    }
                    SpawnKind::Npc { id } => {
                        let (uses2, uses3) = rom
                            .npcs
                            .get(&id)
                            .map(|n| (n.uses_palette(2), n.uses_palette(3)))
                            .unwrap_or((false, false));
                        graphics
                            .npc_at
                            .entry((location.id, id))
                            .or_insert(placement(uses2, uses3));
                    }
                    SpawnKind::Boss { id } => {
                        let (uses2, uses3) = rom
                            .objects
                            .get(&id)
                            .map(|o| (o.uses_palette(2), o.uses_palette(3)))
                            .unwrap_or((false, false));
                        graphics
                            .boss_at
                            .entry((location.id, id))
                            .or_insert(placement(uses2, uses3));
                    }
                    _ => {}
                }
            }
        }

        graphics
    }

    fn placement_constraint(p: &Placement, remap: impl Fn(u8) -> u8) -> Constraint {
        let mut c = Constraint::ALL.with_pattern(p.bank as usize, [p.page]);
        if let Some(v) = p.pal2 {
            c = c.with_pal2([remap(v)]);
        }
        if let Some(v) = p.pal3 {
            c = c.with_pal3([remap(v)]);
        }
        c
    }

    fn remap(&self, id: u8, palette: u8) -> u8 {
        if is_untouched(id) {
            return palette;
        }
        self.palette_map.get(&palette).copied().unwrap_or(palette)
    }

    /// Requirement for drawing monster `id` at a location after it has been
    /// reassigned there.
    ///
    /// A monster seen at this location in the vanilla data keeps that
    /// placement's page and palettes. Elsewhere it may use any page it was
    /// ever drawn from, in either slot. Palettes go through the shuffle from
    /// [`Graphics::shuffle_palettes`].
    pub fn get_monster_constraint(&self, location: u8, id: u8) -> Constraint {
        let remap = |v: u8| self.remap(id, v);
        if let Some(p) = self.monster_at.get(&(location, id)) {
            return Self::placement_constraint(p, remap);
        }
        let Some(usage) = self.monsters.get(&id) else {
            return Constraint::ALL;
        };
        let mut c = Constraint::ALL
            .with_pattern(0, usage.pages.iter().copied())
            .with_pattern(1, usage.pages.iter().copied());
        if usage.uses_pal2 {
            c = c.with_pal2(usage.pal2.iter().map(|&v| remap(v)));
        }
        if usage.uses_pal3 {
            c = c.with_pal3(usage.pal3.iter().map(|&v| remap(v)));
        }
        c
    }

    /// Requirement of a monster that stays where the vanilla data put it.
    /// Palettes are never shuffled for these.
    pub fn get_fixed_monster_constraint(&self, location: u8, id: u8) -> Constraint {
        self.monster_at
            .get(&(location, id))
            .map(|p| Self::placement_constraint(p, |v| v))
            .unwrap_or(Constraint::ALL)
    }

    pub fn get_npc_constraint(&self, location: u8, id: u8) -> Constraint {
        self.npc_at
            .get(&(location, id))
            .map(|p| Self::placement_constraint(p, |v| v))
            .unwrap_or(Constraint::ALL)
    }

    pub fn get_boss_constraint(&self, location: u8, id: u8) -> Constraint {
        self.boss_at
            .get(&(location, id))
            .map(|p| Self::placement_constraint(p, |v| v))
            .unwrap_or(Constraint::ALL)
    }

    /// Draws a permutation of the palette values monsters are drawn with.
    /// It applies to reassigned monsters only; fixed sprites, NPCs and bosses
    /// keep their vanilla palettes.
    pub fn shuffle_palettes(&mut self, random: &mut Random) {
        let values: Vec<u8> = self.monster_palettes.iter().copied().collect();
        let mut shuffled = values.clone();
        random.shuffle(&mut shuffled);
        self.palette_map = values.into_iter().zip(shuffled).collect();
    }

    /// Points every monster, NPC and boss spawn at the pattern slot holding
    /// its page, after the location's patterns have been fixed.
    pub fn configure(&self, location: &mut Location) {
        let Some(patterns) = location.sprite_patterns else {
            return;
        };
        let location_id = location.id;

        for spawn in location.spawns.iter_mut() {
            let accepts = |page: u8| -> bool {
                match spawn.kind {
                    SpawnKind::Monster { id } => self
                        .monsters
                        .get(&id)
                        .map_or(true, |u| u.pages.contains(&page)),
                    SpawnKind::Npc { id } => self
                        .npc_at
                        .get(&(location_id, id))
                        .map_or(true, |p| p.page == page),
                    SpawnKind::Boss { id } => self
                        .boss_at
                        .get(&(location_id, id))
                        .map_or(true, |p| p.page == page),
                    _ => true,
                }
            };

            let bank = (spawn.pattern_bank & 1) as usize;
            if accepts(patterns[bank]) {
                continue;
            }
            if accepts(patterns[bank ^ 1]) {
                spawn.pattern_bank = (bank ^ 1) as u8;
            }
        }
    }
}
