#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the soil map toolchain.
//!
//! [`AnalysisProgressBar`] renders analysis progress with `indicatif`, and
//! [`init_logger`] routes `log` output through the same
//! [`MultiProgress`] so log lines never tear a redrawing bar.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use soil_map_analysis::ProgressCallback;

pub use indicatif::MultiProgress;

/// An `indicatif` bar driven by analysis progress reports.
pub struct AnalysisProgressBar {
    bar: ProgressBar,
}

impl AnalysisProgressBar {
    /// Adds a percentage bar to `multi`.
    #[must_use]
    pub fn new(multi: &MultiProgress) -> Self {
        let bar = multi.add(ProgressBar::new(100));
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} {wide_bar:.green/dim} {percent:>3}% {msg} [{elapsed_precise}]",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
        );
        Self { bar }
    }

    /// The bar as a shareable [`ProgressCallback`].
    #[must_use]
    pub fn callback(&self) -> Arc<dyn ProgressCallback> {
        Arc::new(Self {
            bar: self.bar.clone(),
        })
    }

    /// Stops the bar and leaves `message` in its place.
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Stops the bar and removes it from the terminal.
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for AnalysisProgressBar {
    fn report(&self, current: u64, total: u64, message: &str) {
        if self.bar.length() != Some(total) {
            self.bar.set_length(total);
        }
        self.bar.set_position(current);
        self.bar.set_message(message.to_string());
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge` so that
/// `log::info!` and friends are suspended while progress bars redraw.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok(); // Already set in tests

    log::set_max_level(level);

    multi
}
