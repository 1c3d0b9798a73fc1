use clap::Parser;
use log::info;
use std::path::{Path, PathBuf};

use shuffler_core::{run, Adjustments, ShufflerSettings};

#[derive(Debug, Parser)]
#[command(name = "monster-shuffler", version, about = "Monster placement shuffler")]
struct Args {
    #[arg(long, required_unless_present = "check_adjustments")]
    input: Option<PathBuf>,

    #[arg(long, required_unless_present = "check_adjustments")]
    output: Option<PathBuf>,

    #[arg(long, required_unless_present = "check_adjustments")]
    seed: Option<u64>,

    /// Flag string, e.g. "Mrt Tp Wm".
    #[arg(long, default_value = "Mr")]
    flags: String,

    /// JSON file of per-location adjustment overrides.
    #[arg(long, value_name = "FILE")]
    adjustments: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Parse an adjustment override file and exit without shuffling.
    #[arg(long, value_name = "FILE", hide = true)]
    check_adjustments: Option<PathBuf>,
}

fn check_adjustments(path: &Path) -> shuffler_core::Result<String> {
    let mut adjustments = Adjustments::builtin();
    adjustments.load_overrides(path)?;
    Ok(format!("{} parsed cleanly", path.display()))
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Some(path) = args.check_adjustments.as_ref() {
        match check_adjustments(path) {
            Ok(message) => println!("{message}"),
            Err(err) => {
                eprintln!("Error: {err}");
                std::process::exit(1);
            }
        }
        return;
    }

    let (Some(seed), Some(input_path), Some(output_path)) = (args.seed, args.input, args.output)
    else {
        eprintln!("Error: --input, --output and --seed are required");
        std::process::exit(2);
    };

    let settings = ShufflerSettings {
        seed,
        flags: args.flags,
        debug: args.debug,
        input_path,
        output_path,
        adjustments_path: args.adjustments,
    };

    info!("shuffling seed {} with flags \"{}\"", settings.seed, settings.flags);
    if let Err(err) = run(settings) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn check_mode_reports_a_clean_file() {
        let path = std::env::temp_dir().join(format!("shuffler-cli-check-{}.json", std::process::id()));
        fs::write(&path, r#"{"32": {"max_flyers": 1}}"#).unwrap();
        let message = check_adjustments(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert!(message.ends_with("parsed cleanly"));
    }

    #[test]
    fn check_mode_rejects_unknown_keys() {
        let path = std::env::temp_dir().join(format!("shuffler-cli-reject-{}.json", std::process::id()));
        fs::write(&path, r#"{"32": {"maxFlyer": 2}}"#).unwrap();
        let result = check_adjustments(&path);
        fs::remove_file(&path).unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn check_mode_needs_no_other_arguments() {
        let args = Args::try_parse_from(["Shuffler-CLI", "--check-adjustments", "o.json"]).unwrap();
        assert!(args.input.is_none());
        assert_eq!(args.check_adjustments, Some(PathBuf::from("o.json")));
    }
}
