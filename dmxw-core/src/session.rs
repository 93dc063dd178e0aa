//! Test-Session des Testers (HMI und Output-Prozessor halten je eine)
//!
//! Zustand ändert sich nur über [`TestSession::set_state`]. Test-Auswahl
//! und Kanal-Selektion sind nur im Zustand STOPPED erlaubt.

use core::fmt;

use crate::consts::{MAX_CHANNEL_VALUE, NUM_CHAN_DMXW, NUM_CHANS_ONBOARD};
use crate::types::{TestAck, TestOutput, TestState, TestType};

const CHANNEL_SLOTS: usize = NUM_CHAN_DMXW as usize + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionError {
    BadParm,
    BadState,
}

impl From<SessionError> for TestAck {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::BadParm => TestAck::BadParm,
            SessionError::BadState => TestAck::BadState,
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", TestAck::from(*self))
    }
}

/// Operation eines `TSTCMD_SELECT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SelectOp {
    Add,
    Remove,
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSession {
    state: TestState,
    output: TestOutput,
    test_type: TestType,
    // Index = Kanalnummer, Index 0 bleibt unbenutzt
    selected: [bool; CHANNEL_SLOTS],
    values: [u8; CHANNEL_SLOTS],
    sweep_chan: u8,
}

impl Default for TestSession {
    fn default() -> Self {
        Self::new()
    }
}

impl TestSession {
    pub const fn new() -> Self {
        Self {
            state: TestState::Stopped,
            output: TestOutput::NoOutput,
            test_type: TestType::Disabled,
            selected: [false; CHANNEL_SLOTS],
            values: [0; CHANNEL_SLOTS],
            sweep_chan: 0,
        }
    }

    pub fn state(&self) -> TestState {
        self.state
    }

    pub fn output(&self) -> TestOutput {
        self.output
    }

    pub fn test_type(&self) -> TestType {
        self.test_type
    }

    /// Höchste Kanalnummer für den gewählten Ausgang
    pub fn channel_limit(&self) -> u8 {
        match self.output {
            TestOutput::Onboard => NUM_CHANS_ONBOARD,
            _ => NUM_CHAN_DMXW,
        }
    }

    pub fn is_selected(&self, chan: u8) -> bool {
        self.selected.get(chan as usize).copied().unwrap_or(false)
    }

    pub fn value(&self, chan: u8) -> u8 {
        self.values.get(chan as usize).copied().unwrap_or(0)
    }

    pub fn selected(&self) -> impl Iterator<Item = u8> + '_ {
        (1..=NUM_CHAN_DMXW).filter(|&c| self.is_selected(c))
    }

    /// Setzt den Zustand, immer erfolgreich
    ///
    /// STOPPED setzt Ausgang und Testtyp zurück.
    pub fn set_state(&mut self, state: TestState) {
        self.state = state;
        if state == TestState::Stopped {
            self.output = TestOutput::NoOutput;
            self.test_type = TestType::Disabled;
            self.sweep_chan = 0;
        }
        debug!("session: state {}", state as u8);
    }

    pub fn set_test(&mut self, output: TestOutput, test_type: TestType) -> Result<(), SessionError> {
        if self.state != TestState::Stopped {
            return Err(SessionError::BadState);
        }
        // Pixel-Strip hängt am Onboard-Ausgang
        if test_type == TestType::Pixel && output != TestOutput::Onboard {
            return Err(SessionError::BadParm);
        }
        self.output = output;
        self.test_type = test_type;

        let limit = self.channel_limit();
        for chan in limit + 1..=NUM_CHAN_DMXW {
            self.deselect(chan);
        }
        Ok(())
    }

    pub fn select(&mut self, op: SelectOp, channels: &[u8]) -> Result<(), SessionError> {
        if self.state != TestState::Stopped {
            return Err(SessionError::BadState);
        }
        let limit = self.channel_limit();
        if op != SelectOp::Clear && channels.iter().any(|&c| c == 0 || c > limit) {
            return Err(SessionError::BadParm);
        }

        match op {
            SelectOp::Add => channels.iter().for_each(|&c| self.selected[c as usize] = true),
            SelectOp::Remove => channels.iter().for_each(|&c| self.deselect(c)),
            SelectOp::Clear => (1..=NUM_CHAN_DMXW).for_each(|c| self.deselect(c)),
        }
        Ok(())
    }

    fn deselect(&mut self, chan: u8) {
        if let Some(slot) = self.selected.get_mut(chan as usize) {
            *slot = false;
            self.values[chan as usize] = 0;
        }
    }

    /// Setzt Werte für selektierte Kanäle, in jedem Zustand erlaubt
    ///
    /// Alle Paare werden geprüft, bevor einer übernommen wird.
    pub fn set_values(&mut self, pairs: &[(u8, u8)]) -> Result<(), SessionError> {
        if pairs.is_empty() || pairs.iter().any(|&(c, _)| !self.is_selected(c)) {
            return Err(SessionError::BadParm);
        }
        for &(chan, value) in pairs {
            self.values[chan as usize] = value;
        }
        Ok(())
    }

    /// Nächster Schritt eines CHAN_SWEEP Tests
    ///
    /// Der nächste selektierte Kanal geht auf Vollausschlag, alle anderen
    /// auf 0. Liefert den aktiven Kanal, `None` wenn kein Sweep läuft.
    pub fn sweep_step(&mut self) -> Option<u8> {
        if self.state != TestState::Running || self.test_type != TestType::ChanSweep {
            return None;
        }
        let next = self
            .selected()
            .find(|&c| c > self.sweep_chan)
            .or_else(|| self.selected().next())?;

        for chan in 1..=NUM_CHAN_DMXW {
            if self.is_selected(chan) {
                self.values[chan as usize] = if chan == next { MAX_CHANNEL_VALUE } else { 0 };
            }
        }
        self.sweep_chan = next;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(output: TestOutput, test_type: TestType, channels: &[u8]) -> TestSession {
        let mut session = TestSession::new();
        session.set_test(output, test_type).unwrap();
        session.select(SelectOp::Add, channels).unwrap();
        session.set_state(TestState::Running);
        session
    }

    #[test]
    fn test_initial_state() {
        let session = TestSession::new();
        assert_eq!(session.state(), TestState::Stopped);
        assert_eq!(session.output(), TestOutput::NoOutput);
        assert_eq!(session.test_type(), TestType::Disabled);
        assert_eq!(session.selected().count(), 0);
    }

    #[test]
    fn test_stop_resets_from_every_state() {
        for state in [TestState::Stopped, TestState::Paused, TestState::Running] {
            let mut session = running(TestOutput::Dmxw, TestType::Manual, &[1]);
            session.set_state(state);
            session.set_state(TestState::Stopped);
            assert_eq!(session.output(), TestOutput::NoOutput);
            assert_eq!(session.test_type(), TestType::Disabled);
        }
    }

    #[test]
    fn test_set_test_requires_stopped() {
        let mut session = running(TestOutput::Dmxw, TestType::Manual, &[1]);
        let before = session.clone();
        assert_eq!(
            session.set_test(TestOutput::Onboard, TestType::ChanSweep),
            Err(SessionError::BadState)
        );
        assert_eq!(session, before);
    }

    #[test]
    fn test_select_requires_stopped() {
        let mut session = running(TestOutput::Dmxw, TestType::Manual, &[1]);
        session.set_state(TestState::Paused);
        assert_eq!(session.select(SelectOp::Add, &[2]), Err(SessionError::BadState));
        assert!(!session.is_selected(2));
    }

    #[test]
    fn test_select_validates_range() {
        let mut session = TestSession::new();
        session.set_test(TestOutput::Onboard, TestType::Manual).unwrap();
        assert_eq!(session.select(SelectOp::Add, &[1, 6]), Err(SessionError::BadParm));
        assert!(!session.is_selected(1));
        session.select(SelectOp::Add, &[1, 5]).unwrap();
        assert_eq!(session.select(SelectOp::Add, &[0]), Err(SessionError::BadParm));
    }

    #[test]
    fn test_values_only_for_selected() {
        let mut session = running(TestOutput::Dmxw, TestType::Manual, &[3, 4]);
        assert_eq!(session.set_values(&[]), Err(SessionError::BadParm));
        assert_eq!(session.set_values(&[(3, 10), (5, 20)]), Err(SessionError::BadParm));
        // Nichts wurde teilweise übernommen
        assert_eq!(session.value(3), 0);
        session.set_values(&[(3, 10), (4, 20)]).unwrap();
        assert_eq!(session.value(4), 20);
    }

    #[test]
    fn test_deselect_zeroes_value() {
        let mut session = TestSession::new();
        session.select(SelectOp::Add, &[7]).unwrap();
        session.set_values(&[(7, 99)]).unwrap();
        session.select(SelectOp::Remove, &[7]).unwrap();
        assert_eq!(session.value(7), 0);
        session.select(SelectOp::Add, &[7, 8]).unwrap();
        session.select(SelectOp::Clear, &[]).unwrap();
        assert_eq!(session.selected().count(), 0);
    }

    #[test]
    fn test_switch_to_onboard_drops_high_channels() {
        let mut session = TestSession::new();
        session.select(SelectOp::Add, &[2, 30]).unwrap();
        session.set_test(TestOutput::Onboard, TestType::Manual).unwrap();
        assert!(session.is_selected(2));
        assert!(!session.is_selected(30));
    }

    #[test]
    fn test_pixel_needs_onboard() {
        let mut session = TestSession::new();
        assert_eq!(
            session.set_test(TestOutput::Dmxw, TestType::Pixel),
            Err(SessionError::BadParm)
        );
        session.set_test(TestOutput::Onboard, TestType::Pixel).unwrap();
    }

    #[test]
    fn test_sweep_cycles_selection() {
        let mut session = running(TestOutput::Dmxw, TestType::ChanSweep, &[2, 5, 9]);
        assert_eq!(session.sweep_step(), Some(2));
        assert_eq!(session.value(2), 255);
        assert_eq!(session.sweep_step(), Some(5));
        assert_eq!((session.value(2), session.value(5)), (0, 255));
        assert_eq!(session.sweep_step(), Some(9));
        assert_eq!(session.sweep_step(), Some(2));

        session.set_state(TestState::Paused);
        assert_eq!(session.sweep_step(), None);
    }
}
