//! Confirmation prompts and the clock used to name generations.

use std::io::{self, BufRead, Write};
use std::time::{SystemTime, UNIX_EPOCH};

/// Asks the operator to approve a destructive action.
pub trait Confirm {
    /// Shows `prompt` and returns whether the answer was yes.
    fn confirm(&mut self, prompt: &str) -> io::Result<bool>;
}

/// Prompts on stdout and reads one line from stdin; only `y`/`Y` confirms.
#[derive(Debug, Default)]
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(prompt.as_bytes())?;
        stdout.flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(is_yes(&answer))
    }
}

pub(crate) fn is_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

/// Seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::is_yes;

    #[test]
    fn only_y_confirms() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" Y "));
        assert!(!is_yes("yes"));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
    }
}
