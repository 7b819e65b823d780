//! Before/now sampling of the slave's digital input lines.

use relaylink_protocol::INPUT_LINE_COUNT;

/// Two consecutive samples of the input lines.
///
/// Each validated frame shifts the current sample into `before` and decodes
/// the new status bitmask into `now`, giving the display layer an edge view
/// of every line.
#[derive(Debug, Default, Clone, Copy)]
pub struct InputShiftRegister {
    before: [bool; INPUT_LINE_COUNT],
    now: [bool; INPUT_LINE_COUNT],
}

impl InputShiftRegister {
    /// All lines low in both samples.
    pub fn new() -> Self {
        InputShiftRegister::default()
    }

    /// Shift in the status bitmask of a validated frame.
    ///
    /// Returns `(index, before, now)` for every line whose state changed
    /// between the two samples, lowest line first.
    pub fn update(&mut self, status: u8) -> Vec<(usize, bool, bool)> {
        self.before = self.now;
        for (i, line) in self.now.iter_mut().enumerate() {
            *line = (status >> i) & 0x01 != 0;
        }

        (0..INPUT_LINE_COUNT)
            .filter(|&i| self.before[i] != self.now[i])
            .map(|i| (i, self.before[i], self.now[i]))
            .collect()
    }

    /// Sample from the previous validated frame.
    pub fn before(&self) -> &[bool; INPUT_LINE_COUNT] {
        &self.before
    }

    /// Sample from the latest validated frame.
    pub fn now(&self) -> &[bool; INPUT_LINE_COUNT] {
        &self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consecutive_samples() {
        let mut reg = InputShiftRegister::new();

        reg.update(0b0000_0001);
        reg.update(0b0000_0011);

        let mut before = [false; INPUT_LINE_COUNT];
        before[0] = true;
        let mut now = [false; INPUT_LINE_COUNT];
        now[0] = true;
        now[1] = true;

        assert_eq!(reg.before(), &before);
        assert_eq!(reg.now(), &now);
    }

    #[test]
    fn test_update_reports_only_changed_lines() {
        let mut reg = InputShiftRegister::new();

        let changes = reg.update(0b0000_0101);
        assert_eq!(changes, vec![(0, false, true), (2, false, true)]);

        // Same bitmask again: nothing changed.
        assert_eq!(reg.update(0b0000_0101), vec![]);

        // Line 2 falls.
        assert_eq!(reg.update(0b0000_0001), vec![(2, true, false)]);
    }
}
