// Interactive terminal prompt around the narrowing engine
use super::{apply_suggestion, NarrowingEngine, Selection, Suggestion};
use crate::error::{Result, SsoError};
use crossterm::{
    cursor::{MoveToColumn, MoveUp},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    queue,
    style::{Attribute, Print, SetAttribute},
    terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType},
};
use std::io::{self, Write};

const MAX_VISIBLE: usize = 10;
const PROMPT: &str = "Select a role> ";

/// Input line, suggestion list and highlight, independent of the terminal
#[derive(Debug, Default)]
pub struct PromptState {
    pub input: String,
    pub suggestions: Vec<Suggestion>,
    pub highlighted: usize,
}

impl PromptState {
    pub fn new(engine: &NarrowingEngine) -> Self {
        let mut state = Self::default();
        state.refresh(engine);
        state
    }

    fn refresh(&mut self, engine: &NarrowingEngine) {
        self.suggestions = engine.suggest(&self.input);
        self.highlighted = 0;
    }

    fn accept_highlighted(&mut self, engine: &NarrowingEngine) -> bool {
        match self.suggestions.get(self.highlighted) {
            Some(suggestion) => {
                self.input = apply_suggestion(&self.input, suggestion);
                self.refresh(engine);
                true
            }
            None => false,
        }
    }

    /// Apply one key press. Returns the outcome once the prompt is finished.
    pub fn handle_key(&mut self, engine: &NarrowingEngine, key: KeyEvent) -> Option<Result<Selection>> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(Ok(Selection::Cancelled));
        }

        match key.code {
            KeyCode::Esc => return Some(Ok(Selection::Cancelled)),
            KeyCode::Enter => match engine.resolve(&self.input) {
                Ok(selection) => return Some(Ok(selection)),
                Err(e) => {
                    if !self.accept_highlighted(engine) {
                        return Some(Err(e));
                    }
                }
            },
            KeyCode::Tab => {
                self.accept_highlighted(engine);
            }
            KeyCode::Down => {
                if !self.suggestions.is_empty() {
                    self.highlighted = (self.highlighted + 1) % self.suggestions.len();
                }
            }
            KeyCode::Up => {
                if !self.suggestions.is_empty() {
                    self.highlighted = self
                        .highlighted
                        .checked_sub(1)
                        .unwrap_or(self.suggestions.len() - 1);
                }
            }
            KeyCode::Backspace => {
                self.input.pop();
                self.refresh(engine);
            }
            KeyCode::Char(c) => {
                self.input.push(c);
                self.refresh(engine);
            }
            _ => {}
        }
        None
    }

    /// Visible suggestions with descriptions aligned on character width
    fn suggestion_lines(&self) -> Vec<String> {
        let visible = &self.suggestions[..self.suggestions.len().min(MAX_VISIBLE)];
        let width = visible
            .iter()
            .map(|s| s.text.chars().count())
            .max()
            .unwrap_or(0);
        visible
            .iter()
            .map(|s| format!("  {:width$}  {}", s.text, s.description, width = width))
            .collect()
    }

    fn cursor_column(&self) -> u16 {
        u16::try_from(PROMPT.chars().count() + self.input.chars().count()).unwrap_or(u16::MAX)
    }

    fn render(&self, out: &mut impl Write) -> io::Result<()> {
        queue!(
            out,
            MoveToColumn(0),
            Clear(ClearType::FromCursorDown),
            Print(PROMPT),
            Print(&self.input)
        )?;

        let lines = self.suggestion_lines();
        for (i, line) in lines.iter().enumerate() {
            queue!(out, Print("\r\n"))?;
            if i == self.highlighted {
                queue!(out, SetAttribute(Attribute::Reverse), Print(line), SetAttribute(Attribute::Reset))?;
            } else {
                queue!(out, Print(line))?;
            }
        }

        if !lines.is_empty() {
            queue!(out, MoveUp(u16::try_from(lines.len()).unwrap_or(u16::MAX)))?;
        }
        let column = self.cursor_column();
        queue!(out, MoveToColumn(column))?;
        out.flush()
    }
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        enable_raw_mode().map_err(SsoError::Io)?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Run the prompt on the terminal until a role is chosen or it is cancelled.
/// Drawn on stderr so stdout stays clean for `eval`.
pub fn run(engine: &NarrowingEngine) -> Result<Selection> {
    let mut state = PromptState::new(engine);
    let mut out = io::stderr();

    let result = {
        let _raw = RawModeGuard::enable()?;
        loop {
            state.render(&mut out).map_err(SsoError::Io)?;
            if let Event::Key(key) = event::read().map_err(SsoError::Io)? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some(result) = state.handle_key(engine, key) {
                    break result;
                }
            }
        }
    };

    queue!(out, MoveToColumn(0), Clear(ClearType::FromCursorDown)).map_err(SsoError::Io)?;
    out.flush().map_err(SsoError::Io)?;
    result
}
