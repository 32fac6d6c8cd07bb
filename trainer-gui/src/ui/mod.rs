//! # UI Module
//!
//! View-building code for the trainer's single practice screen.

pub mod session_view;
