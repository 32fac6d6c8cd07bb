//! # Session View Module
//!
//! Builds the practice screen: exercise and device pickers, the note row
//! with per-note feedback colors, progress, the pitch readout, and the
//! session controls.

use iced::widget::{button, column, container, pick_list, progress_bar, row, text, Space};
use iced::{Alignment, Color, Element, Length};

use trainer_core::notation::{staff_model, NoteClassifications, StaffModel};

use crate::{DeviceChoice, ExerciseChoice, Message, TrainerApp};
use trainer_core::audio::SessionState;
use trainer_core::exercise::EXERCISES;

fn correct_color() -> Color {
    Color::from_rgb(0.35, 0.8, 0.45)
}

fn incorrect_color() -> Color {
    Color::from_rgb(0.9, 0.35, 0.35)
}

fn attempting_color() -> Color {
    Color::from_rgb(0.95, 0.75, 0.3)
}

fn current_color() -> Color {
    Color::from_rgb(0.45, 0.7, 1.0)
}

fn neutral_color() -> Color {
    Color::from_rgb(0.85, 0.85, 0.85)
}

fn dim_color() -> Color {
    Color::from_rgb(0.6, 0.6, 0.6)
}

/// Feedback color of one note cell.
fn note_color(index: usize, model: &StaffModel<'_>) -> Color {
    let NoteClassifications {
        correct,
        incorrect,
        attempting,
    } = &model.classifications;
    if correct.contains(&index) {
        correct_color()
    } else if incorrect.contains(&index) {
        incorrect_color()
    } else if attempting.contains(&index) {
        attempting_color()
    } else if index == model.current_index {
        current_color()
    } else {
        neutral_color()
    }
}

/// Creates the complete practice screen.
pub fn create_session_view(app: &TrainerApp) -> Element<'_, Message> {
    let tracker = app.arbiter.tracker();
    let model = staff_model(app.exercise, tracker);

    let title = text(app.exercise.title).size(28);
    let description = text(app.exercise.description).size(14).color(dim_color());

    // --- Pickers ---
    let exercise_options: Vec<ExerciseChoice> = EXERCISES
        .iter()
        .map(|exercise| ExerciseChoice {
            id: exercise.id,
            title: exercise.title,
        })
        .collect();
    let selected_exercise = ExerciseChoice {
        id: app.exercise.id,
        title: app.exercise.title,
    };

    let mut device_options = vec![DeviceChoice::SystemDefault];
    device_options.extend(
        app.devices
            .iter()
            .map(|device| DeviceChoice::Named(device.id.clone())),
    );
    let selected_device = DeviceChoice::from_selection(&app.selection);

    let pickers = row![
        pick_list(exercise_options, Some(selected_exercise), Message::ExercisePicked),
        Space::with_width(10),
        pick_list(device_options, Some(selected_device), Message::DevicePicked),
    ]
    .align_y(Alignment::Center);

    // --- Note row with feedback colors ---
    let mut notes_row = row![].spacing(14).align_y(Alignment::End);
    for (index, note) in model.notes.iter().enumerate() {
        let marker = if index == model.current_index && app.finished.is_none() {
            "^"
        } else {
            " "
        };
        let cell = column![
            text(note.label()).size(22).color(note_color(index, &model)),
            text(marker).size(14).color(current_color()),
        ]
        .align_x(Alignment::Center);
        notes_row = notes_row.push(cell);
    }

    let progress = column![
        progress_bar(0.0..=100.0, tracker.progress_percent())
            .height(Length::Fixed(8.0)),
        text(format!("{} / {}", tracker.index(), tracker.total_notes()))
            .size(14)
            .color(dim_color()),
    ]
    .spacing(4);

    // --- Pitch readout ---
    let heard = match &app.last_reading {
        Some(reading) => match (&reading.note, reading.frequency) {
            (Some(note), Some(frequency)) => {
                format!("Heard: {} ({:.1} Hz)", note.label(), frequency)
            }
            _ => "Heard: silence".to_string(),
        },
        None => "Heard: nothing yet".to_string(),
    };
    let target = match tracker.current_note() {
        Some(note) if app.finished.is_none() => format!("Target: {}", note.label()),
        _ => "Target: done".to_string(),
    };
    let mut readout = row![
        text(target).size(18),
        Space::with_width(20),
        text(heard).size(18).color(dim_color()),
    ]
    .align_y(Alignment::Center);
    if app.arbiter.attempts() > 0 {
        readout = readout.push(Space::with_width(20));
        readout = readout.push(
            text(format!("Attempts: {}", app.arbiter.attempts()))
                .size(16)
                .color(attempting_color()),
        );
    }

    // --- Session controls and status ---
    let listen_label = if app.session.is_listening() {
        "Stop Listening"
    } else {
        "Start Listening"
    };
    let controls = row![
        button(listen_label).on_press(Message::ToggleListening),
        Space::with_width(10),
        button("Skip Note").on_press_maybe(
            app.finished.is_none().then_some(Message::SkipNote)
        ),
        Space::with_width(10),
        button("Restart").on_press(Message::ResetRun),
    ]
    .align_y(Alignment::Center);

    let status: Element<'_, Message> = match app.session.state() {
        SessionState::Listening { device_label } => {
            text(format!("Listening on {}", device_label))
                .size(14)
                .color(dim_color())
                .into()
        }
        SessionState::Stopped => text("Microphone off")
            .size(14)
            .color(dim_color())
            .into(),
        SessionState::Failed { message } => text(format!("Input error: {}", message))
            .size(14)
            .color(incorrect_color())
            .into(),
    };

    let error_line: Element<'_, Message> = match &app.error {
        Some(message) => text(message.clone())
            .size(14)
            .color(incorrect_color())
            .into(),
        None => Space::with_height(0).into(),
    };

    // --- Score / completion ---
    let score: Element<'_, Message> = match app.finished {
        Some(summary) => text(format!(
            "Complete! {} / {} correct ({:.0}%)",
            summary.correct,
            summary.total,
            summary.accuracy_percent()
        ))
        .size(20)
        .color(correct_color())
        .into(),
        None => text(format!(
            "Score: {} / {} correct",
            tracker.correct_count(),
            tracker.index()
        ))
        .size(16)
        .into(),
    };

    let content = column![
        title,
        description,
        Space::with_height(10),
        pickers,
        Space::with_height(20),
        notes_row,
        Space::with_height(10),
        progress,
        Space::with_height(20),
        readout,
        Space::with_height(20),
        controls,
        status,
        error_line,
        Space::with_height(10),
        score,
    ]
    .spacing(6)
    .padding(20)
    .align_x(Alignment::Center);

    container(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .into()
}
