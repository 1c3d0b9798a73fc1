use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

pub mod constraint;
pub mod flags;
pub mod graphics;
pub mod monsters;
pub mod pool;
pub mod random;
pub mod report;
pub mod rom;

pub use constraint::{Admissible, Constraint, ConstraintError};
pub use flags::{FlagError, FlagSet};
pub use graphics::Graphics;
pub use monsters::{Adjustments, MonsterAdjustment, MonsterStats};
pub use pool::MonsterPool;
pub use random::Random;
pub use report::{Report, ShuffleTrace};
pub use rom::Rom;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShufflerSettings {
    pub seed: u64,
    pub flags: String,
    pub debug: bool,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    #[serde(default)]
    pub adjustments_path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ShufflerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("flag error: {0}")]
    Flags(#[from] FlagError),
    #[error("location {location:02x} slot {slot:02x}: {source}")]
    Constraint {
        location: u8,
        slot: u8,
        #[source]
        source: ConstraintError,
    },
    #[error("adjustment error: {0}")]
    Adjustment(String),
}

pub type Result<T> = std::result::Result<T, ShufflerError>;

/// Runs the palette and monster passes over `rom` in place.
///
/// Every draw comes from `random`, so the same ROM, flags and seed always
/// give the same result.
pub fn shuffle_rom(
    rom: &mut Rom,
    flags: FlagSet,
    adjustments: &Adjustments,
    random: &mut Random,
    trace: &mut dyn ShuffleTrace,
) -> Result<()> {
    let mut graphics = Graphics::new(rom);

    if flags.shuffle_sprite_palettes() {
        info!("shuffling monster palettes");
        graphics.shuffle_palettes(random);
    }

    if flags.shuffle_monsters() {
        let stats = MonsterStats::resolve(&rom.objects);
        let mut pool = MonsterPool::new(flags, adjustments, stats);
        for location in &rom.locations {
            pool.populate(rom, location, trace);
        }
        debug!("monster pool holds {} entries", pool.monsters().len());
        pool.shuffle(rom, random, &graphics, trace)?;
    }

    Ok(())
}

pub fn run(settings: ShufflerSettings) -> Result<()> {
    if !settings.input_path.exists() {
        return Err(ShufflerError::Config(format!(
            "Input path does not exist: {}",
            settings.input_path.display()
        )));
    }

    let flags: FlagSet = settings.flags.parse()?;

    if !settings.output_path.exists() {
        fs::create_dir_all(&settings.output_path)?;
    }

    // Each seed gets its own subfolder so runs never overwrite each other.
    let out_root = settings
        .output_path
        .join(format!("Shuffler_{}", settings.seed));
    if !out_root.exists() {
        fs::create_dir_all(&out_root)?;
    }

    info!("loading {}", settings.input_path.display());
    let mut rom = Rom::load(&settings.input_path)?;

    let mut adjustments = Adjustments::builtin();
    if let Some(path) = &settings.adjustments_path {
        info!("applying adjustment overrides from {}", path.display());
        adjustments.load_overrides(path)?;
    }

    info!("seed {} flags {}", settings.seed, flags);
    let mut random = Random::new(settings.seed);
    let mut report = Report::new();
    shuffle_rom(&mut rom, flags, &adjustments, &mut random, &mut report)?;

    let rom_path = out_root.join("rom.json");
    rom.save(&rom_path)?;
    info!("wrote {}", rom_path.display());

    if settings.debug {
        let mut log = String::new();
        log.push_str(&format!("seed: {}\n", settings.seed));
        log.push_str(&format!("flags: {}\n\n", flags));
        log.push_str(&report.to_text());
        fs::write(out_root.join("spoiler_log.txt"), log)?;
        fs::write(out_root.join("shuffle_report.json"), report.to_json()?)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rom::{Location, ObjectData, Spawn, SpawnKind};

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("shuffler-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_rom() -> Rom {
        let mut rom = Rom::default();
        for id in [0x50, 0x51] {
            rom.objects.insert(id, ObjectData { id, base: id as u16, ..Default::default() });
        }
        for (id, monster) in [(0x20u8, 0x50u8), (0x21, 0x51)] {
            rom.locations.push(Location {
                id,
                spawns: vec![Spawn::new(SpawnKind::Monster { id: monster }, 32, 32)],
                sprite_patterns: Some([0x50, 0x52]),
                sprite_palettes: Some([0x10, 0x20]),
                ..Default::default()
            });
        }
        rom
    }

    #[test]
    fn run_rejects_missing_input() {
        let out = temp_dir("missing");
        let settings = ShufflerSettings {
            seed: 1,
            flags: "Mr".into(),
            debug: false,
            input_path: out.join("nope.json"),
            output_path: out.clone(),
            adjustments_path: None,
        };
        assert!(matches!(run(settings), Err(ShufflerError::Config(_))));
    }

    #[test]
    fn run_rejects_bad_flags() {
        let out = temp_dir("flags");
        let input = out.join("rom.json");
        sample_rom().save(&input).unwrap();
        let settings = ShufflerSettings {
            seed: 1,
            flags: "Mq".into(),
            debug: false,
            input_path: input,
            output_path: out,
            adjustments_path: None,
        };
        assert!(matches!(run(settings), Err(ShufflerError::Flags(_))));
    }

    #[test]
    fn run_writes_seed_folder_and_debug_logs() {
        let out = temp_dir("run");
        let input = out.join("input.json");
        sample_rom().save(&input).unwrap();
        let settings = ShufflerSettings {
            seed: 42,
            flags: "Mr".into(),
            debug: true,
            input_path: input,
            output_path: out.clone(),
            adjustments_path: None,
        };
        run(settings).unwrap();

        let root = out.join("Shuffler_42");
        let rom = Rom::load(&root.join("rom.json")).unwrap();
        assert_eq!(rom.locations.len(), 2);
        let log = fs::read_to_string(root.join("spoiler_log.txt")).unwrap();
        assert!(log.starts_with("seed: 42\nflags: Mr\n"));
        assert!(log.contains("start-50: $20"));
        assert!(root.join("shuffle_report.json").exists());
    }

    #[test]
    fn shuffle_rom_without_monster_flag_leaves_spawns() {
        let mut rom = sample_rom();
        let before = rom.to_json().unwrap();
        shuffle_rom(
            &mut rom,
            "Tp".parse().unwrap(),
            &Adjustments::builtin(),
            &mut Random::new(3),
            &mut (),
        )
        .unwrap();
        assert_eq!(rom.to_json().unwrap(), before);
    }
}
