use eframe::egui;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use shuffler_core::{run as run_shuffler, ShufflerSettings};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GuiConfig {
    input_path: String,
    output_path: String,
    #[serde(default)]
    adjustments_path: String,
}

fn config_path() -> Option<PathBuf> {
    let mut base = dirs::config_dir().or_else(dirs::data_dir)?;
    base.push("Shuffler");
    base.push("gui_config.json");
    Some(base)
}

fn load_config() -> GuiConfig {
    if let Some(path) = config_path() {
        if let Ok(data) = fs::read_to_string(&path) {
            if let Ok(cfg) = serde_json::from_str::<GuiConfig>(&data) {
                return cfg;
            }
        }
    }
    GuiConfig::default()
}

fn save_config(cfg: &GuiConfig) {
    if let Some(path) = config_path() {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(data) = serde_json::to_string_pretty(cfg) {
            let _ = fs::write(path, data);
        }
    }
}

fn pick_json_file(current: &str) -> Option<PathBuf> {
    let mut dialog = rfd::FileDialog::new().add_filter("JSON", &["json"]);
    if let Some(dir) = PathBuf::from(current.trim()).parent() {
        if dir.exists() {
            dialog = dialog.set_directory(dir);
        }
    }
    dialog.pick_file()
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum ConfigTab {
    General,
    Monsters,
    Graphics,
}

struct ShufflerApp {
    current_tab: ConfigTab,
    input_path: String,
    output_path: String,
    adjustments_path: String,
    seed_text: String,

    shuffle_monsters: bool,
    shuffle_tower_monsters: bool,
    shuffle_sprite_palettes: bool,
    randomize_maps: bool,
    debug: bool,

    is_running: bool,
    log: String,
    result_rx: Option<mpsc::Receiver<String>>,
}

impl Default for ShufflerApp {
    fn default() -> Self {
        let seed = rand::thread_rng().gen::<u64>();
        let mut cfg = load_config();

        if cfg.output_path.is_empty() {
            if let Some(mut base) = dirs::document_dir().or_else(dirs::data_dir) {
                base.push("ShufflerOutput");
                cfg.output_path = base.display().to_string();
            }
        }

        Self {
            current_tab: ConfigTab::General,
            input_path: cfg.input_path,
            output_path: cfg.output_path,
            adjustments_path: cfg.adjustments_path,
            seed_text: seed.to_string(),

            shuffle_monsters: true,
            shuffle_tower_monsters: false,
            shuffle_sprite_palettes: false,
            randomize_maps: false,
            debug: false,

            is_running: false,
            log: String::new(),
            result_rx: None,
        }
    }
}

impl ShufflerApp {
    fn flag_string(&self) -> String {
        let mut groups = Vec::new();
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
        groups.join(" ")
    }

    fn push_log(&mut self, line: &str) {
        if !self.log.is_empty() {
            self.log.push('\n');
        }
        self.log.push_str(line);
    }

    fn start_run(&mut self) {
        let seed = self
            .seed_text
            .trim()
            .parse::<u64>()
            .unwrap_or_else(|_| rand::thread_rng().gen::<u64>());

        save_config(&GuiConfig {
            input_path: self.input_path.clone(),
            output_path: self.output_path.clone(),
            adjustments_path: self.adjustments_path.clone(),
        });

        let adjustments = self.adjustments_path.trim();
        let settings = ShufflerSettings {
            seed,
            flags: self.flag_string(),
            debug: self.debug,
            input_path: PathBuf::from(self.input_path.trim()),
            output_path: PathBuf::from(self.output_path.trim()),
            adjustments_path: (!adjustments.is_empty()).then(|| PathBuf::from(adjustments)),
        };

        let (tx, rx) = mpsc::channel();
        self.result_rx = Some(rx);
        self.is_running = true;
        self.push_log(&format!(
            "Starting shuffler with seed {} and flags \"{}\"...",
            seed, settings.flags
        ));

        thread::spawn(move || {
            let message = match run_shuffler(settings) {
                Ok(()) => format!("Shuffler finished. Output is in Shuffler_{}.", seed),
                Err(e) => format!("Shuffler error: {}", e),
            };
            let _ = tx.send(message);
        });
    }
}

impl eframe::App for ShufflerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let finished: Vec<String> = self
            .result_rx
            .as_ref()
            .map(|rx| rx.try_iter().collect())
            .unwrap_or_default();
        for msg in finished {
            self.push_log(&msg);
            self.is_running = false;
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.selectable_value(&mut self.current_tab, ConfigTab::General, "General");
                ui.selectable_value(&mut self.current_tab, ConfigTab::Monsters, "Monsters");
                ui.selectable_value(&mut self.current_tab, ConfigTab::Graphics, "Graphics");
            });

            ui.separator();

            match self.current_tab {
                ConfigTab::General => {
                    ui.horizontal(|ui| {
                        ui.label("ROM snapshot:");
                        ui.text_edit_singleline(&mut self.input_path);
                        if ui.button("Browse...").clicked() {
                            if let Some(path) = pick_json_file(&self.input_path) {
                                self.input_path = path.display().to_string();
                            }
                        }
                    });

                    ui.horizontal(|ui| {
                        ui.label("Output path:");
                        ui.text_edit_singleline(&mut self.output_path);
                        if ui.button("Browse...").clicked() {
                            let mut dialog = rfd::FileDialog::new();
                            if !self.output_path.trim().is_empty() {
                                dialog = dialog.set_directory(self.output_path.trim());
                            }
                            if let Some(path) = dialog.pick_folder() {
                                self.output_path = path.display().to_string();
                            }
                        }
                    });

                    ui.horizontal(|ui| {
                        ui.label("Seed:");
                        ui.text_edit_singleline(&mut self.seed_text);

                        if ui.button("Random seed").clicked() {
                            let seed = rand::thread_rng().gen::<u64>();
                            self.seed_text = seed.to_string();
                        }
                    });

                    ui.checkbox(&mut self.debug, "Write spoiler log and shuffle report");
                }
                ConfigTab::Monsters => {
                    ui.label("Monster placement:");
                    ui.checkbox(&mut self.shuffle_monsters, "Shuffle monsters between locations");
                    ui.add_enabled(
                        self.shuffle_monsters,
                        egui::Checkbox::new(
                            &mut self.shuffle_tower_monsters,
                            "Include tower floors",
                        ),
                    );
                    ui.add_enabled(
                        self.shuffle_monsters,
                        egui::Checkbox::new(
                            &mut self.randomize_maps,
                            "Place monsters on random walkable tiles",
                        ),
                    );

                    ui.separator();
                    ui.horizontal(|ui| {
                        ui.label("Adjustment overrides:");
                        ui.text_edit_singleline(&mut self.adjustments_path);
                        if ui.button("Browse...").clicked() {
                            if let Some(path) = pick_json_file(&self.adjustments_path) {
                                self.adjustments_path = path.display().to_string();
                            }
                        }
                    });
                }
                ConfigTab::Graphics => {
                    ui.label("Sprite graphics:");
                    ui.checkbox(
                        &mut self.shuffle_sprite_palettes,
                        "Shuffle monster sprite palettes",
                    );
                }
            }

            ui.separator();

            let flags = self.flag_string();
            ui.label(format!("Flags: {}", if flags.is_empty() { "(none)" } else { flags.as_str() }));

            if ui
                .add_enabled(!self.is_running && !flags.is_empty(), egui::Button::new("Run shuffler"))
                .clicked()
            {
                self.start_run();
            }

            ui.separator();
            ui.label("Log:");
            egui::ScrollArea::vertical()
                .id_source("log_scroll")
                .show(ui, |ui| {
                    ui.monospace(&self.log);
                });
        });

        if self.is_running {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}

fn main() -> eframe::Result<()> {
    let native_options = eframe::NativeOptions::default();
    eframe::run_native(
        "Monster Shuffler",
        native_options,
        Box::new(|cc| {
            cc.egui_ctx.set_visuals(egui::Visuals::dark());

            let mut style = (*cc.egui_ctx.style()).clone();
            style.visuals.override_text_color = Some(egui::Color32::from_rgb(240, 240, 240));
            cc.egui_ctx.set_style(style);

            Box::new(ShufflerApp::default())
        }),
    )
}
