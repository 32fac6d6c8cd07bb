//! # Guitar Trainer GUI
//!
//! The practice front-end for the trainer core: renders the current
//! exercise with per-note feedback, owns the capture session, and drives
//! the arbitration state machine from a display-refresh tick.
//!
//! ## Architecture
//! - **Main Thread**: Iced application with dark theme
//! - **Audio Thread**: owned by the core capture session
//! - **Communication**: readings drained from the session on every tick
//! - **Updates**: 60 FPS continuous updates via subscription system

mod ui;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use iced::{Element, Subscription, Theme};
use serde::{Deserialize, Serialize};

use trainer_core::arbiter::{NoteArbiter, RunSummary};
use trainer_core::audio::{
    list_input_devices, CaptureSession, InputDevice, InputSelection,
};
use trainer_core::exercise::{exercise_by_id, Exercise, EXERCISES};
use trainer_core::prefs::{load_input_selection, store_input_selection, PreferenceStore};
use trainer_core::PitchReading;
use ui::session_view::create_session_view;

/// File the preference store persists to, in the working directory.
const PREFERENCES_FILE: &str = "trainer_settings.json";

/// Main entry point for the trainer application.
pub fn main() -> iced::Result {
    eprintln!("[MAIN] Starting guitar trainer...");
    let result = iced::application("Guitar Trainer", TrainerApp::update, TrainerApp::view)
        .subscription(TrainerApp::subscription)
        .theme(TrainerApp::theme)
        .run();
    eprintln!("[MAIN] Application finished with result: {:?}", result);
    result
}

/// Application message types for the Iced GUI framework.
#[derive(Debug, Clone)]
pub enum Message {
    /// An exercise was chosen from the catalogue.
    ExercisePicked(ExerciseChoice),
    /// An input device was chosen from the picker.
    DevicePicked(DeviceChoice),
    /// Start or stop the capture session.
    ToggleListening,
    /// Give up on the current note.
    SkipNote,
    /// Restart the current exercise from the top.
    ResetRun,
    /// Timer tick for real-time updates.
    Tick,
}

/// One entry of the exercise picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseChoice {
    pub id: &'static str,
    pub title: &'static str,
}

impl fmt::Display for ExerciseChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title)
    }
}

/// One entry of the device picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceChoice {
    SystemDefault,
    Named(String),
}

impl DeviceChoice {
    fn selection(&self) -> InputSelection {
        match self {
            DeviceChoice::SystemDefault => InputSelection::SystemDefault,
            DeviceChoice::Named(id) => InputSelection::Device(id.clone()),
        }
    }

    fn from_selection(selection: &InputSelection) -> DeviceChoice {
        match selection {
            InputSelection::SystemDefault => DeviceChoice::SystemDefault,
            InputSelection::Device(id) => DeviceChoice::Named(id.clone()),
        }
    }
}

impl fmt::Display for DeviceChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceChoice::SystemDefault => f.write_str("Default Microphone"),
            DeviceChoice::Named(name) => f.write_str(name),
        }
    }
}

/// Main application state.
pub struct TrainerApp {
    pub session: CaptureSession,
    pub arbiter: NoteArbiter,
    pub exercise: &'static Exercise,
    pub devices: Vec<InputDevice>,
    pub selection: InputSelection,
    preferences: JsonFilePreferences,
    /// Inline capture error, shown without touching exercise progress.
    pub error: Option<String>,
    pub last_reading: Option<PitchReading>,
    /// Set once when the run completes; cleared by reset or a new
    /// exercise.
    pub finished: Option<RunSummary>,
}

impl Default for TrainerApp {
    fn default() -> Self {
        eprintln!("[MAIN] Creating TrainerApp...");
        let preferences = JsonFilePreferences::open(PREFERENCES_FILE);
        let selection = load_input_selection(&preferences);

        let devices = match list_input_devices() {
            Ok(devices) => devices,
            Err(e) => {
                eprintln!("[MAIN] Device enumeration failed: {}", e);
                Vec::new()
            }
        };

        let exercise = &EXERCISES[0];
        TrainerApp {
            session: CaptureSession::new(),
            arbiter: NoteArbiter::new(exercise),
            exercise,
            devices,
            selection,
            preferences,
            error: None,
            last_reading: None,
            finished: None,
        }
    }
}

impl TrainerApp {
    fn update(&mut self, message: Message) {
        match message {
            Message::Tick => {
                let now = Instant::now();
                for reading in self.session.drain_readings() {
                    self.arbiter.handle_reading(reading.frequency, now);
                    self.last_reading = Some(reading);
                }
                self.arbiter.tick(now);
                self.settle_completion();
            }
            Message::ExercisePicked(choice) => {
                if let Some(exercise) = exercise_by_id(choice.id) {
                    eprintln!("[MAIN] Switching to exercise '{}'", exercise.id);
                    self.exercise = exercise;
                    self.arbiter = NoteArbiter::new(exercise);
                    self.finished = None;
                    self.last_reading = None;
                }
            }
            Message::DevicePicked(choice) => {
                let selection = choice.selection();
                if selection == self.selection {
                    return;
                }
                eprintln!("[MAIN] Input device changed to {}", choice);
                self.selection = selection;
                store_input_selection(&mut self.preferences, &self.selection);

                // Switching mid-session restarts capture on the new
                // device; a failure is shown inline and the exercise
                // progress is left untouched.
                if self.session.is_listening() {
                    self.error = None;
                    if let Err(e) = self.session.start(&self.selection) {
                        self.error = Some(format!("{}", e));
                    }
                }
            }
            Message::ToggleListening => {
                if self.session.is_listening() {
                    self.session.stop();
                } else {
                    self.error = None;
                    if let Err(e) = self.session.start(&self.selection) {
                        self.error = Some(format!("{}", e));
                    }
                }
            }
            Message::SkipNote => {
                if self.finished.is_none() {
                    self.arbiter.skip(Instant::now());
                    self.settle_completion();
                }
            }
            Message::ResetRun => {
                self.arbiter.reset();
                self.finished = None;
                self.last_reading = None;
            }
        }
    }

    /// On completion, report the final score and release the microphone.
    fn settle_completion(&mut self) {
        if self.arbiter.is_complete() && self.finished.is_none() {
            let summary = self.arbiter.summary();
            eprintln!(
                "[MAIN] Exercise '{}' finished: {}/{} correct",
                self.exercise.id, summary.correct, summary.total
            );
            self.finished = Some(summary);
            self.session.stop();
        }
    }

    fn view(&self) -> Element<'_, Message> {
        create_session_view(self)
    }

    /// Timer subscription firing every 16ms (60 FPS) so pitch readings
    /// and pending arbitration deadlines are serviced continuously.
    fn subscription(&self) -> Subscription<Message> {
        iced::time::every(std::time::Duration::from_millis(16)).map(|_| Message::Tick)
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

// --- Preference persistence ---

/// On-disk payload of the preference store.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PreferenceFile {
    values: BTreeMap<String, String>,
}

/// JSON-file-backed preference store.
///
/// Every change is written through immediately; a missing or malformed
/// file simply starts empty.
pub struct JsonFilePreferences {
    path: PathBuf,
    file: PreferenceFile,
}

impl JsonFilePreferences {
    pub fn open(path: impl Into<PathBuf>) -> JsonFilePreferences {
        let path = path.into();
        let file = match std::fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
                eprintln!("[MAIN] Ignoring malformed preference file: {}", e);
                PreferenceFile::default()
            }),
            Err(_) => PreferenceFile::default(),
        };
        JsonFilePreferences { path, file }
    }

    fn persist(&self) {
        match serde_json::to_string_pretty(&self.file) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.path, json) {
                    eprintln!("[MAIN] Error saving preferences: {}", e);
                }
            }
            Err(e) => eprintln!("[MAIN] Error serializing preferences: {}", e),
        }
    }
}

impl PreferenceStore for JsonFilePreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.file.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.file
            .values
            .insert(key.to_string(), value.to_string());
        self.persist();
    }

    fn clear(&mut self, key: &str) {
        if self.file.values.remove(key).is_some() {
            self.persist();
        }
    }
}
