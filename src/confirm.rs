//! Operator confirmation capability.
//!
//! The pipeline asks two yes/no questions: whether to redownload a chapter
//! whose image directory already exists, and whether to overwrite an existing
//! exchange document. Both go through [`Confirm`] so the stages can be driven
//! by a terminal, by a `--yes`/`--no` flag, or by a test double.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

/// Answers a yes/no question. `true` means the operator agreed.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Convenience alias matching the type stored in [`crate::config::SessionConfig`].
pub type ConfirmHandle = Arc<dyn Confirm>;

/// Always gives the same answer. Backs `--yes` / `--no`.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Confirm for FixedAnswer {
    fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}

/// Asks on stderr and reads one line from stdin.
///
/// Anything other than an affirmative answer (including EOF) is a refusal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        let mut stderr = io::stderr();
        let _ = write!(stderr, "{prompt} [y/N]: ");
        let _ = stderr.flush();

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => false,
            Ok(_) => is_affirmative(&line),
        }
    }
}

/// Ask `confirm` on the blocking pool so a terminal read never stalls the
/// async runtime. A panicking implementation counts as a refusal.
pub async fn ask(confirm: &ConfirmHandle, prompt: String) -> bool {
    let confirm = Arc::clone(confirm);
    tokio::task::spawn_blocking(move || confirm.confirm(&prompt))
        .await
        .unwrap_or(false)
}

/// `y`, `yes`, `s` and `si` (any case) are affirmative.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "y" | "yes" | "s" | "si" | "sí"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affirmative_answers() {
        for a in ["y", "Y", "yes", " s\n", "SI", "sí"] {
            assert!(is_affirmative(a), "{a:?} should be affirmative");
        }
        for a in ["", "n", "no", "maybe", "yess"] {
            assert!(!is_affirmative(a), "{a:?} should be a refusal");
        }
    }

    #[test]
    fn fixed_answer_ignores_prompt() {
        assert!(FixedAnswer(true).confirm("overwrite?"));
        assert!(!FixedAnswer(false).confirm("overwrite?"));
    }

    /// Records the thread it was asked on.
    struct ThreadRecorder(std::sync::Mutex<Option<std::thread::ThreadId>>);

    impl Confirm for ThreadRecorder {
        fn confirm(&self, _prompt: &str) -> bool {
            *self.0.lock().unwrap() = Some(std::thread::current().id());
            true
        }
    }

    #[tokio::test]
    async fn ask_runs_off_the_runtime_thread() {
        let recorder = Arc::new(ThreadRecorder(std::sync::Mutex::new(None)));
        let handle: ConfirmHandle = recorder.clone();

        assert!(ask(&handle, "redownload?".into()).await);
        let asked_on = recorder.0.lock().unwrap().expect("confirm was called");
        assert_ne!(asked_on, std::thread::current().id());
    }

    #[tokio::test]
    async fn ask_relays_the_answer() {
        let no: ConfirmHandle = Arc::new(FixedAnswer(false));
        assert!(!ask(&no, "overwrite?".into()).await);
    }

    #[test]
    fn arc_dyn_confirm_works() {
        let c: ConfirmHandle = Arc::new(FixedAnswer(true));
        assert!(c.confirm("redownload?"));
    }
}
