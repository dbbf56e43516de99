// src/seed/warnings.rs

//! Warning accumulator

use tracing::{error, warn};

/// Non-fatal advisories produced while resolving a seed
///
/// Sealed once the snap set is complete; nothing may be added after that.
#[derive(Debug, Default)]
pub struct Warnings {
    messages: Vec<String>,
    sealed: bool,
}

impl Warnings {
    pub fn push(&mut self, message: String) {
        debug_assert!(
            !self.sealed,
            "seed writer warning after completion: {message}"
        );
        if self.sealed {
            error!("Dropping seed writer warning after completion: {}", message);
            return;
        }
        warn!("{}", message);
        self.messages.push(message);
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}
