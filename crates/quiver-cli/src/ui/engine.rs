//! Slot frame: one terminal row per package argument.
//!
//! The frame reserves its rows once, remembers the top-left corner and
//! redraws rows relative to it, so concurrent slots can update in any order
//! without scrolling the terminal.

use std::io::{Result, Stdout, Write, stdout};

use crossterm::{
    QueueableCommand,
    cursor::{MoveDown, MoveToColumn, MoveUp, RestorePosition, SavePosition},
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};

/// A colored run of text within one row.
pub type Segment<'a> = (&'a str, Color);

pub struct SlotFrame {
    out: Stdout,
    rows: u16,
    anchored: bool,
}

impl SlotFrame {
    pub fn new(rows: u16) -> Self {
        Self {
            out: stdout(),
            rows,
            anchored: false,
        }
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    /// Whether the rows have been reserved on screen.
    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    fn anchor(&mut self) -> Result<()> {
        for _ in 0..self.rows {
            writeln!(self.out)?;
        }
        self.out
            .queue(MoveUp(self.rows))?
            .queue(MoveToColumn(0))?
            .queue(SavePosition)?;
        self.anchored = true;
        Ok(())
    }

    /// Replace the contents of `row` with `segments`, cut to `width` columns.
    pub fn draw(&mut self, row: u16, segments: &[Segment<'_>], width: usize) -> Result<()> {
        if row >= self.rows {
            return Ok(());
        }
        if !self.anchored {
            self.anchor()?;
        }

        self.out.queue(RestorePosition)?;
        if row > 0 {
            self.out.queue(MoveDown(row))?;
        }
        self.out.queue(MoveToColumn(0))?;

        let mut left = width;
        for (text, color) in segments {
            if left == 0 {
                break;
            }
            let cut: String = text.chars().take(left).collect();
            left -= cut.chars().count();
            self.out
                .queue(SetForegroundColor(*color))?
                .queue(Print(cut))?;
        }
        self.out
            .queue(ResetColor)?
            .queue(Clear(ClearType::UntilNewLine))?
            .queue(RestorePosition)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()
    }

    /// Leave the cursor on the line below the frame.
    pub fn finish(&mut self) -> Result<()> {
        if !self.anchored {
            return Ok(());
        }
        self.out.queue(RestorePosition)?;
        if self.rows > 0 {
            self.out.queue(MoveDown(self.rows))?;
        }
        self.out.queue(MoveToColumn(0))?;
        self.anchored = false;
        self.out.flush()
    }
}
