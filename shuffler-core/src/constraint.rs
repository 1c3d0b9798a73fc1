use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use crate::monsters::MonsterAdjustment;
use crate::random::Random;
use crate::rom::Location;

/// Pattern page holding the treasure chest tiles.
pub const CHEST_PATTERN_PAGE: u8 = 0x5e;
/// Palette the mimic body is drawn with.
pub const MIMIC_PALETTE: u8 = 0x1c;
/// Pattern page holding the shooting-wall turret tiles.
pub const SHOOTING_WALL_PATTERN_PAGE: u8 = 0x4f;

/// Upper bound on undecided either-slot pattern requirements when searching
/// for a slot assignment. Two slots can never satisfy more distinct pages.
const MAX_FLOATING: usize = 12;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConstraintError {
    #[error("cannot meet {ours} with {theirs}")]
    Unsatisfiable { ours: String, theirs: String },
}

/// Admissible values for one hardware slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admissible {
    Any,
    Only(BTreeSet<u8>),
}

impl Admissible {
    pub fn only(value: u8) -> Self {
        Admissible::Only(BTreeSet::from([value]))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Admissible::Any)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Admissible::Only(s) if s.is_empty())
    }

    pub fn contains(&self, value: u8) -> bool {
        match self {
            Admissible::Any => true,
            Admissible::Only(s) => s.contains(&value),
        }
    }

    pub fn singleton(&self) -> Option<u8> {
        match self {
            Admissible::Only(s) if s.len() == 1 => s.iter().next().copied(),
            _ => None,
        }
    }

    fn meet(&self, other: &Admissible) -> Admissible {
        match (self, other) {
            (Admissible::Any, x) | (x, Admissible::Any) => x.clone(),
            (Admissible::Only(a), Admissible::Only(b)) => {
                Admissible::Only(a.intersection(b).copied().collect())
            }
        }
    }

    fn meet_set(&self, set: &BTreeSet<u8>) -> Admissible {
        self.meet(&Admissible::Only(set.clone()))
    }

    fn overlaps(&self, set: &BTreeSet<u8>) -> bool {
        match self {
            Admissible::Any => !set.is_empty(),
            Admissible::Only(s) => s.iter().any(|v| set.contains(v)),
        }
    }

    fn within(&self, set: &BTreeSet<u8>) -> bool {
        match self {
            Admissible::Any => false,
            Admissible::Only(s) => s.is_subset(set),
        }
    }
}

impl fmt::Display for Admissible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Admissible::Any => write!(f, "all"),
            Admissible::Only(s) => write_set(f, s),
        }
    }
}

fn write_set(f: &mut fmt::Formatter<'_>, set: &BTreeSet<u8>) -> fmt::Result {
    let parts: Vec<String> = set.iter().map(|v| format!("{:02x}", v)).collect();
    write!(f, "[{}]", parts.join(", "))
}

/// Sprite hardware requirements for one location: two pattern-table pages
/// and the two sprite palettes.
///
/// Besides the four positional slots a constraint carries "floating" pattern
/// requirements: sets of pages of which at least one must end up in *either*
/// pattern slot. Monsters float because the spawn's pattern bank bit can
/// point at whichever slot holds their page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pat: [Admissible; 2],
    pal2: Admissible,
    pal3: Admissible,
    float: Vec<BTreeSet<u8>>,
}

impl Default for Constraint {
    fn default() -> Self {
        Constraint::ALL
    }
}

impl Constraint {
    pub const ALL: Constraint = Constraint {
        pat: [Admissible::Any, Admissible::Any],
        pal2: Admissible::Any,
        pal3: Admissible::Any,
        float: Vec::new(),
    };

    pub fn treasure_chest() -> Constraint {
        Constraint::ALL.with_float([CHEST_PATTERN_PAGE])
    }

    pub fn mimic() -> Constraint {
        Constraint::treasure_chest().with_pal2([MIMIC_PALETTE])
    }

    /// The chest left behind when the sleeping Kensu wakes up.
    pub fn kensu_chest() -> Constraint {
        Constraint::treasure_chest()
    }

    pub fn shooting_wall() -> Constraint {
        Constraint::ALL.with_float([SHOOTING_WALL_PATTERN_PAGE])
    }

    /// Starting constraint for a location: its fixed slots, if any.
    pub fn for_location(adjustment: &MonsterAdjustment) -> Constraint {
        let fixed = &adjustment.fixed_slots;
        let mut c = Constraint::ALL;
        if let Some(p) = fixed.pat0 {
            c = c.with_pattern(0, [p]);
        }
        if let Some(p) = fixed.pat1 {
            c = c.with_pattern(1, [p]);
        }
        if let Some(p) = fixed.pal2 {
            c = c.with_pal2([p]);
        }
        if let Some(p) = fixed.pal3 {
            c = c.with_pal3([p]);
        }
        c
    }

    pub fn with_pattern<I: IntoIterator<Item = u8>>(mut self, bank: usize, pages: I) -> Self {
        self.pat[bank & 1] = Admissible::Only(pages.into_iter().collect());
        self
    }

    pub fn with_float<I: IntoIterator<Item = u8>>(mut self, pages: I) -> Self {
        self.float.push(pages.into_iter().collect());
        self
    }

    pub fn with_pal2<I: IntoIterator<Item = u8>>(mut self, values: I) -> Self {
        self.pal2 = Admissible::Only(values.into_iter().collect());
        self
    }

    pub fn with_pal3<I: IntoIterator<Item = u8>>(mut self, values: I) -> Self {
        self.pal3 = Admissible::Only(values.into_iter().collect());
        self
    }

    pub fn pat0(&self) -> &Admissible {
        &self.pat[0]
    }

    pub fn pat1(&self) -> &Admissible {
        &self.pat[1]
    }

    pub fn pal2(&self) -> &Admissible {
        &self.pal2
    }

    pub fn pal3(&self) -> &Admissible {
        &self.pal3
    }

    pub fn floating(&self) -> &[BTreeSet<u8>] {
        &self.float
    }

    /// The location's current sprite tables as a fully bound constraint.
    pub fn current(location: &Location) -> Option<Constraint> {
        let [p0, p1] = location.sprite_patterns?;
        let [q2, q3] = location.sprite_palettes?;
        Some(
            Constraint::ALL
                .with_pattern(0, [p0])
                .with_pattern(1, [p1])
                .with_pal2([q2])
                .with_pal3([q3]),
        )
    }

    /// Intersects two constraints, failing loudly when the result is empty.
    ///
    /// With `exact` the other constraint's pattern slots are intersected
    /// positionally. Without it they become floating requirements, so the
    /// other sprite may sit in either pattern slot.
    pub fn meet(&self, other: &Constraint, exact: bool) -> Result<Constraint, ConstraintError> {
        self.combine(other, exact)
            .ok_or_else(|| ConstraintError::Unsatisfiable {
                ours: self.to_string(),
                theirs: other.to_string(),
            })
    }

    /// Non-exact meet used while searching. Palette slots this constraint
    /// leaves open are handed to whatever `other` asks for.
    pub fn try_meet(&self, other: &Constraint) -> Option<Constraint> {
        self.combine(other, false)
    }

    /// Like [`Constraint::try_meet`], but palette slots this constraint leaves
    /// open stay on `palettes`, the values the location has now.
    pub fn try_meet_holding(&self, other: &Constraint, palettes: [u8; 2]) -> Option<Constraint> {
        let hold = |ours: &Admissible, theirs: &Admissible, value: u8| match (ours, theirs) {
            (Admissible::Any, Admissible::Only(s)) => {
                Admissible::Only(s.iter().copied().filter(|&v| v == value).collect())
            }
            _ => theirs.clone(),
        };
        let held = Constraint {
            pal2: hold(&self.pal2, &other.pal2, palettes[0]),
            pal3: hold(&self.pal3, &other.pal3, palettes[1]),
            ..other.clone()
        };
        self.combine(&held, false)
    }

    fn combine(&self, other: &Constraint, exact: bool) -> Option<Constraint> {
        let mut out = self.clone();
        if exact {
            out.pat[0] = self.pat[0].meet(&other.pat[0]);
            out.pat[1] = self.pat[1].meet(&other.pat[1]);
        } else {
            for slot in &other.pat {
                if let Admissible::Only(s) = slot {
                    out.float.push(s.clone());
                }
            }
        }
        out.float.extend(other.float.iter().cloned());
        out.pal2 = self.pal2.meet(&other.pal2);
        out.pal3 = self.pal3.meet(&other.pal3);
        if out.normalize() {
            Some(out)
        } else {
            None
        }
    }

    /// Simplifies floating requirements and reports whether the constraint
    /// can still be satisfied.
    fn normalize(&mut self) -> bool {
        loop {
            if self.pat.iter().any(Admissible::is_empty)
                || self.pal2.is_empty()
                || self.pal3.is_empty()
            {
                return false;
            }

            let mut kept: Vec<BTreeSet<u8>> = Vec::with_capacity(self.float.len());
            for f in self.float.drain(..) {
                if f.is_empty() {
                    return false;
                }
                if kept.iter().any(|k| k.is_subset(&f)) {
                    continue;
                }
                kept.retain(|k| !f.is_subset(k));
                kept.push(f);
            }
            self.float = kept;

            let mut changed = false;
            let mut i = 0;
            while i < self.float.len() {
                let f = &self.float[i];
                if self.pat.iter().any(|p| p.within(f)) {
                    self.float.remove(i);
                    continue;
                }
                let hosts: Vec<usize> = (0..2).filter(|&b| self.pat[b].overlaps(f)).collect();
                match hosts.as_slice() {
                    [] => return false,
                    [b] => {
                        let b = *b;
                        self.pat[b] = self.pat[b].meet_set(f);
                        self.float.remove(i);
                        changed = true;
                    }
                    _ => i += 1,
                }
            }

            if !changed {
                break;
            }
        }

        !self.assignments().is_empty()
    }

    /// Every way of distributing the floating requirements over the two
    /// pattern slots that leaves both slots non-empty, as bitmasks (bit set
    /// means slot 1).
    fn assignments(&self) -> Vec<u32> {
        let k = self.float.len();
        if k > MAX_FLOATING {
            return Vec::new();
        }
        (0..(1u32 << k))
            .filter(|&mask| {
                let slots = self.assign(mask);
                !slots[0].is_empty() && !slots[1].is_empty()
            })
            .collect()
    }

    fn assign(&self, mask: u32) -> [Admissible; 2] {
        let mut slots = self.pat.clone();
        for (i, f) in self.float.iter().enumerate() {
            let b = ((mask >> i) & 1) as usize;
            slots[b] = slots[b].meet_set(f);
        }
        slots
    }

    /// Commits the constraint to concrete values and writes them onto the
    /// location. Slots left completely open keep the location's value.
    pub fn fix(&self, location: &mut Location, random: &mut Random) {
        let options = self.assignments();
        let mask = if options.len() > 1 {
            random.pick(&options).copied().unwrap_or(0)
        } else {
            options.first().copied().unwrap_or(0)
        };
        let [pat0, pat1] = self.assign(mask);

        let mut choose = |slot: &Admissible, current: Option<u8>| -> Option<u8> {
            match slot {
                Admissible::Any => current,
                Admissible::Only(s) if s.len() == 1 => s.iter().next().copied(),
                Admissible::Only(s) => {
                    let values: Vec<u8> = s.iter().copied().collect();
                    random.pick(&values).copied().or(current)
                }
            }
        };

        let patterns = location.sprite_patterns;
        let p0 = choose(&pat0, patterns.map(|p| p[0]));
        let p1 = choose(&pat1, patterns.map(|p| p[1]));
        if p0.is_some() || p1.is_some() {
            location.sprite_patterns = Some([p0.unwrap_or(0), p1.unwrap_or(0)]);
        }

        let palettes = location.sprite_palettes;
        let q2 = choose(&self.pal2, palettes.map(|p| p[0]));
        let q3 = choose(&self.pal3, palettes.map(|p| p[1]));
        if q2.is_some() || q3.is_some() {
            location.sprite_palettes = Some([q2.unwrap_or(0), q3.unwrap_or(0)]);
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.pat[0], self.pat[1], self.pal2, self.pal3)?;
        for s in &self.float {
            write!(f, " ~")?;
            write_set(f, s)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(patterns: [u8; 2], palettes: [u8; 2]) -> Location {
        Location {
            sprite_patterns: Some(patterns),
            sprite_palettes: Some(palettes),
            ..Default::default()
        }
    }

    #[test]
    fn self_meet_is_idempotent() {
        let c = Constraint::ALL
            .meet(
                &Constraint::ALL
                    .with_pattern(0, [0x50, 0x52])
                    .with_float([0x60, 0x61])
                    .with_pal3([0x08]),
                true,
            )
            .unwrap();
        assert_eq!(c.meet(&c, true).unwrap(), c);
        assert_eq!(c.meet(&c, false).unwrap(), c);
    }

    #[test]
    fn exact_meet_conflict_is_an_error() {
        let a = Constraint::ALL.with_pattern(1, [0x50]);
        let b = Constraint::ALL.with_pattern(1, [0x52]);
        assert!(matches!(
            a.meet(&b, true),
            Err(ConstraintError::Unsatisfiable { .. })
        ));
        assert!(a.try_meet(&b).is_some());
    }

    #[test]
    fn float_fills_the_free_slot() {
        let c = Constraint::ALL
            .with_pattern(0, [0x50])
            .meet(&Constraint::ALL.with_float([0x52]), true)
            .unwrap();
        assert_eq!(c.pat1(), &Admissible::only(0x52));
        assert!(c.floating().is_empty());
    }

    #[test]
    fn third_page_does_not_fit() {
        let c = Constraint::ALL
            .try_meet(&Constraint::ALL.with_float([0x50]))
            .and_then(|c| c.try_meet(&Constraint::ALL.with_float([0x52])))
            .unwrap();
        assert!(c.try_meet(&Constraint::ALL.with_float([0x54])).is_none());
        assert!(c.try_meet(&Constraint::ALL.with_float([0x50, 0x54])).is_some());
    }

    #[test]
    fn pinned_palette_conflict_is_rejected() {
        let c = Constraint::ALL.with_pal2([0x10]);
        let m = Constraint::ALL.with_float([0x50]).with_pal2([0x11]);
        assert!(c.try_meet(&m).is_none());
        assert!(c.try_meet_holding(&m, [0x11, 0x20]).is_none());
    }

    #[test]
    fn open_palettes_are_held_to_the_location() {
        let m = Constraint::ALL.with_float([0x50]).with_pal2([0x11, 0x12]);
        assert!(Constraint::ALL.try_meet_holding(&m, [0x10, 0x20]).is_none());

        let held = Constraint::ALL.try_meet_holding(&m, [0x12, 0x20]).unwrap();
        assert_eq!(held.pal2(), &Admissible::only(0x12));
        assert!(held.pal3().is_any());

        let free = Constraint::ALL.try_meet(&m).unwrap();
        assert_eq!(free.pal2(), m.pal2());
    }

    #[test]
    fn current_pins_every_slot() {
        let loc = location([0x50, 0x5e], [0x10, 0x20]);
        let c = Constraint::treasure_chest()
            .meet(&Constraint::current(&loc).unwrap(), true)
            .unwrap();
        assert!(c.floating().is_empty());
        let mut out = loc.clone();
        c.fix(&mut out, &mut Random::new(4));
        assert_eq!(out.sprite_patterns, loc.sprite_patterns);
        assert_eq!(out.sprite_palettes, loc.sprite_palettes);
        assert!(Constraint::current(&Location::default()).is_none());
    }

    #[test]
    fn fix_writes_singletons_and_keeps_open_slots() {
        let c = Constraint::ALL
            .with_pattern(1, [0x60])
            .with_pal3([0x22]);
        let mut loc = location([0x50, 0x51], [0x10, 0x11]);
        c.fix(&mut loc, &mut Random::new(1));
        assert_eq!(loc.sprite_patterns, Some([0x50, 0x60]));
        assert_eq!(loc.sprite_palettes, Some([0x10, 0x22]));
    }

    #[test]
    fn fix_picks_from_remaining_candidates() {
        let c = Constraint::ALL
            .try_meet(&Constraint::ALL.with_float([0x50, 0x52]))
            .unwrap();
        let mut loc = location([0x44, 0x45], [0, 0]);
        c.fix(&mut loc, &mut Random::new(9));
        let [p0, p1] = loc.sprite_patterns.unwrap();
        assert!([0x50, 0x52].contains(&p0) || [0x50, 0x52].contains(&p1));
    }

    #[test]
    fn for_location_uses_fixed_slots() {
        let mut adj = MonsterAdjustment::NONE;
        adj.fixed_slots.pat1 = Some(0x60);
        adj.fixed_slots.pal3 = Some(0x23);
        let c = Constraint::for_location(&adj);
        assert_eq!(c.pat1(), &Admissible::only(0x60));
        assert_eq!(c.pal3(), &Admissible::only(0x23));
        assert!(c.pat0().is_any());
    }
}
