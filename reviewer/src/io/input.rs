//! Sources of corrected request text for the re-ask loop.

use std::io::{BufRead, Write};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};

/// What the run needs from the caller when the repository URL is unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRequest {
    /// Message explaining why new input is needed.
    pub prompt: String,
    /// Input that was rejected.
    pub previous_input: String,
    /// 1-based attempt number of this request.
    pub attempt: u32,
    pub max_attempts: u32,
}

/// Supplies corrected input. `Ok(None)` means nothing is available right now
/// and the run should suspend.
pub trait InputSource: Send + Sync {
    fn request_input(&self, request: &InputRequest) -> Result<Option<String>>;
}

/// Never has input; every re-ask suspends the run.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInput;

impl InputSource for NoInput {
    fn request_input(&self, _request: &InputRequest) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Hands out a single queued answer, then behaves like [`NoInput`].
///
/// Used by `resume --input`.
#[derive(Debug, Default)]
pub struct OnceInput {
    answer: Mutex<Option<String>>,
}

impl OnceInput {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: Mutex::new(Some(answer.into())),
        }
    }
}

impl InputSource for OnceInput {
    fn request_input(&self, _request: &InputRequest) -> Result<Option<String>> {
        let mut answer = self
            .answer
            .lock()
            .map_err(|_| anyhow!("input lock poisoned"))?;
        Ok(answer.take())
    }
}

/// Prompts on stderr and reads one line from stdin. EOF or a blank line
/// yields `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinInput;

impl InputSource for StdinInput {
    fn request_input(&self, request: &InputRequest) -> Result<Option<String>> {
        let mut stderr = std::io::stderr().lock();
        writeln!(
            stderr,
            "{} (attempt {}/{})",
            request.prompt, request.attempt, request.max_attempts
        )
        .context("write prompt")?;
        stderr.flush().context("flush prompt")?;

        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .context("read stdin")?;
        let line = line.trim();
        Ok((!line.is_empty()).then(|| line.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> InputRequest {
        InputRequest {
            prompt: "need a url".to_string(),
            previous_input: "x".to_string(),
            attempt: 1,
            max_attempts: 3,
        }
    }

    #[test]
    fn once_input_answers_a_single_time() {
        let input = OnceInput::new("https://github.com/org/repo");
        assert_eq!(
            input.request_input(&request()).expect("first").as_deref(),
            Some("https://github.com/org/repo")
        );
        assert_eq!(input.request_input(&request()).expect("second"), None);
    }

    #[test]
    fn no_input_always_suspends() {
        assert_eq!(NoInput.request_input(&request()).expect("input"), None);
    }
}
