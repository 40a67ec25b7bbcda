use crate::student::{is_valid_mark, MARK_MAX, MARK_MIN};
use log::warn;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("input closed")]
    Closed,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Line-oriented prompts over any reader/writer pair. Every answer is trimmed.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn output(&mut self) -> &mut W {
        &mut self.output
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.output
    }

    pub fn say(&mut self, text: impl AsRef<str>) -> io::Result<()> {
        writeln!(self.output, "{}", text.as_ref())
    }

    /// `Ok(None)` when the line is not valid UTF-8; callers re-prompt.
    fn read_answer(&mut self, prompt: &str) -> Result<Option<String>, InputError> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;
        let mut buf = Vec::new();
        if self.input.read_until(b'\n', &mut buf)? == 0 {
            return Err(InputError::Closed);
        }
        match String::from_utf8(buf) {
            Ok(line) => Ok(Some(line.trim().to_string())),
            Err(_) => {
                warn!("discarded input line that is not valid UTF-8");
                Ok(None)
            }
        }
    }

    pub fn read_non_empty(&mut self, prompt: &str) -> Result<String, InputError> {
        loop {
            match self.read_answer(prompt)? {
                Some(v) if !v.is_empty() => return Ok(v),
                _ => self.say("Cannot be empty!")?,
            }
        }
    }

    pub fn read_int(&mut self, prompt: &str) -> Result<i64, InputError> {
        loop {
            match self.read_answer(prompt)?.map(|v| v.parse::<i64>()) {
                Some(Ok(v)) => return Ok(v),
                _ => self.say("Enter a valid number!")?,
            }
        }
    }

    pub fn read_mark(&mut self, prompt: &str) -> Result<f64, InputError> {
        loop {
            let Some(Ok(v)) = self.read_answer(prompt)?.map(|v| v.parse::<f64>()) else {
                self.say("Enter a valid number!")?;
                continue;
            };
            if is_valid_mark(v) {
                return Ok(v);
            }
            self.say(format!("Enter between {}-{}", MARK_MIN, MARK_MAX))?;
        }
    }
}
