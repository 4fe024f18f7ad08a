use crate::backend::EventPump;
use crate::warn_once;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::tty::IsTty;
use std::io::Write;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldTrigger {
    /// Exit on any keypress.
    AnyKey,
    /// Exit on Enter only.
    Enter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoldPrompt {
    /// Print a message derived from the trigger.
    Default,
    Silent,
    Message(String),
}

#[derive(Debug, Clone)]
pub struct HoldOptions {
    /// Slice handed to the GUI event pump between checks.
    pub poll: Duration,
    pub trigger: HoldTrigger,
    pub prompt: HoldPrompt,
    /// Return immediately when stdin is not a terminal, so batch runs and
    /// tests never block.
    pub only_if_tty: bool,
}

impl Default for HoldOptions {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(50),
            trigger: HoldTrigger::AnyKey,
            prompt: HoldPrompt::Default,
            only_if_tty: true,
        }
    }
}

/// Keep toolkit windows alive at the end of a terminal-run process.
///
/// Cooperative poll: pump the GUI event loop for a short slice, check for a
/// keypress, check for zero open windows, and exit on whichever condition
/// triggers first. Runs on the thread that owns the event loop; the bounded
/// slice keeps the toolkit responsive throughout.
pub fn hold_windows(pump: &mut dyn EventPump, options: &HoldOptions) {
    if options.only_if_tty && !std::io::stdin().is_tty() {
        log::debug!("stdin is not a terminal; not holding windows");
        return;
    }

    if pump.open_window_count() == 0 {
        return;
    }

    match &options.prompt {
        HoldPrompt::Silent => {}
        HoldPrompt::Default => {
            let message = match options.trigger {
                HoldTrigger::AnyKey => "Press any key to exit...",
                HoldTrigger::Enter => "Press Enter to exit...",
            };
            print_prompt(message);
        }
        HoldPrompt::Message(message) => print_prompt(message),
    }

    // Raw mode makes single keypresses visible without a newline. When it
    // cannot be entered (redirected stdin, odd terminals) the loop degrades
    // to waiting for all windows to close.
    let raw = RawModeGuard::acquire();

    loop {
        if pump.open_window_count() == 0 {
            break;
        }
        if raw.active && key_pressed(options.trigger) {
            break;
        }
        pump.pump(options.poll);
    }
}

fn print_prompt(message: &str) {
    println!("{}", message);
    let _ = std::io::stdout().flush();
}

fn key_pressed(trigger: HoldTrigger) -> bool {
    loop {
        match event::poll(Duration::ZERO) {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                warn_once(
                    "hold:key-poll",
                    &format!("Keypress polling unavailable ({}); waiting for windows to close", e),
                );
                return false;
            }
        }
        match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => match trigger {
                HoldTrigger::AnyKey => return true,
                HoldTrigger::Enter if key.code == KeyCode::Enter => return true,
                HoldTrigger::Enter => {}
            },
            Ok(_) => {}
            Err(_) => return false,
        }
    }
}

struct RawModeGuard {
    active: bool,
}

impl RawModeGuard {
    fn acquire() -> Self {
        match enable_raw_mode() {
            Ok(()) => Self { active: true },
            Err(e) => {
                warn_once(
                    "hold:raw-mode",
                    &format!("Could not enter raw terminal mode ({}); keypress exit disabled", e),
                );
                Self { active: false }
            }
        }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.active {
            let _ = disable_raw_mode();
        }
    }
}
