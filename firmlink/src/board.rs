//! Pin layout of the controlled board.

use std::fmt;
use std::ops::RangeInclusive;

use crate::error::{Error, Result};

/// Digital and analog pin ranges a board accepts commands for.
///
/// Analog pins are addressed by their digital alias (A0 is 14 on an Uno).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardLayout {
    /// Digital pins available for output.
    pub digital: RangeInclusive<u8>,
    /// Analog pins, numbered by digital alias.
    pub analog: RangeInclusive<u8>,
}

impl Default for BoardLayout {
    fn default() -> Self {
        Self::uno()
    }
}

impl BoardLayout {
    /// Arduino Uno: D2..D13 (D0/D1 carry the serial link) plus A0..A5 as 14..19.
    pub fn uno() -> Self {
        Self {
            digital: 2..=13,
            analog: 14..=19,
        }
    }

    /// Whether the pin belongs to either range.
    pub fn contains(&self, pin: u8) -> bool {
        self.digital
            .contains(&pin)
            || self
                .analog
                .contains(&pin)
    }

    /// Reject pins outside the layout with `InvalidPin`.
    pub fn validate(&self, pin: u8) -> Result<u8> {
        if self.contains(pin) {
            Ok(pin)
        } else {
            Err(Error::InvalidPin {
                pin,
                allowed: self.to_string(),
            })
        }
    }

    /// Display label: `D13` for digital pins, `A0` for analog aliases.
    pub fn label(&self, pin: u8) -> Option<String> {
        if self
            .digital
            .contains(&pin)
        {
            Some(format!("D{pin}"))
        } else if self
            .analog
            .contains(&pin)
        {
            Some(format!(
                "A{}",
                pin - self
                    .analog
                    .start()
            ))
        } else {
            None
        }
    }
}

impl fmt::Display for BoardLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "digital {}-{} or analog {}-{}",
            self.digital
                .start(),
            self.digital
                .end(),
            self.analog
                .start(),
            self.analog
                .end()
        )
    }
}
