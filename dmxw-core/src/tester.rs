//! Die beiden Seiten des Testers
//!
//! - [`OutputProcessor`]: empfängt Frames, führt Kommandos aus, quittiert
//! - [`HmiLink`]: sendet Kommandos, spiegelt die Session, erkennt Neustarts

use heapless::Vec;

use crate::consts::{NUM_CHAN_DMXW, NUM_CHANS_ONBOARD, PIXEL_DELAY_CHAN};
use crate::dispatch::{TestEffect, dispatch_test_command};
use crate::frame::{self, FeedResult, Frame, FrameBytes, FrameDecoder, FrameError};
use crate::ipc::{
    ChannelList, MAX_VALUE_PAIRS, SequenceCounter, TestCommand, ValueList, following,
};
use crate::logic::output_level;
use crate::mapping::PinMapping;
use crate::packet::{Command, Packet, RunValues};
use crate::session::{SelectOp, TestSession};
use crate::traits::{PinIo, PixelRenderer};
use crate::types::{Address, NodeId, TestAck, TestOutput, TestState, TestType};

pub const ONBOARD_CHANS: usize = NUM_CHANS_ONBOARD as usize;

/// Obergrenze für [`HmiLink::restore_commands`]
pub const RESTORE_COMMANDS: usize = 5 + (NUM_CHAN_DMXW as usize).div_ceil(MAX_VALUE_PAIRS);

fn ack_frame(seq: &mut SequenceCounter, cmd: u8, code: TestAck) -> Option<FrameBytes> {
    let payload = TestCommand::Ack { cmd, code }.encode();
    frame::encode(seq.next(), &payload).ok()
}

// ============================================================================
// Output-Prozessor
// ============================================================================

/// Ausführende Seite des Testers
///
/// Nach dem Start wird jedes Kommando mit `OutReboot` beantwortet, bis ein
/// `TSTCMD_INIT` kommt.
pub struct OutputProcessor<P, X> {
    decoder: FrameDecoder,
    session: TestSession,
    rebooted: bool,
    tx_seq: SequenceCounter,
    last_rx_seq: Option<u8>,
    // Kommando-Code + Quittung der letzten Anfrage
    last_ack: Option<(u8, FrameBytes)>,
    onboard: [PinMapping; ONBOARD_CHANS],
    pins: P,
    pixels: X,
}

impl<P: PinIo, X: PixelRenderer> OutputProcessor<P, X> {
    pub fn new(onboard: [PinMapping; ONBOARD_CHANS], pins: P, pixels: X) -> Self {
        Self {
            decoder: FrameDecoder::new(),
            session: TestSession::new(),
            rebooted: true,
            tx_seq: SequenceCounter::new(),
            last_rx_seq: None,
            last_ack: None,
            onboard,
            pins,
            pixels,
        }
    }

    pub fn session(&self) -> &TestSession {
        &self.session
    }

    pub fn is_rebooted(&self) -> bool {
        self.rebooted
    }

    pub fn pins(&self) -> &P {
        &self.pins
    }

    pub fn pixels(&self) -> &X {
        &self.pixels
    }

    /// Verarbeitet ein empfangenes Byte, liefert ggf. die Quittung
    pub fn feed(&mut self, byte: u8) -> Option<FrameBytes> {
        match self.decoder.feed(byte) {
            FeedResult::Incomplete => None,
            FeedResult::Frame(frame) => self.on_frame(frame),
            FeedResult::Error(FrameError::ChecksumMismatch { seq, cmd }) => {
                warn!("tester: corrupted frame seq {}", seq);
                ack_frame(&mut self.tx_seq, cmd, TestAck::Corrupted)
            }
            FeedResult::Error(_) => {
                debug!("tester: framing error, resyncing");
                None
            }
        }
    }

    /// UART-Puffer ist leer
    pub fn idle(&mut self) {
        self.decoder.idle();
    }

    fn on_frame(&mut self, frame: Frame) -> Option<FrameBytes> {
        let cmd = frame.payload.first().copied().unwrap_or_default();

        if self.last_rx_seq == Some(frame.seq) {
            if let Some((last_cmd, ack)) = &self.last_ack {
                if *last_cmd == cmd {
                    debug!("tester: duplicate seq {}, repeating ack", frame.seq);
                    return Some(ack.clone());
                }
            }
        }
        if let Some(last) = self.last_rx_seq {
            if frame.seq != following(last) {
                warn!("tester: sequence gap {} -> {}", last, frame.seq);
            }
        }
        self.last_rx_seq = Some(frame.seq);

        // Nach dem Neustart zählt nur ein gültiges INIT
        let code = match TestCommand::decode(&frame.payload) {
            Ok(TestCommand::Init) => self.execute(&TestCommand::Init),
            _ if self.rebooted => TestAck::OutReboot,
            Err(_) => TestAck::BadParm,
            Ok(command) => self.execute(&command),
        };
        let ack = ack_frame(&mut self.tx_seq, cmd, code)?;
        self.last_ack = Some((cmd, ack.clone()));
        Some(ack)
    }

    fn execute(&mut self, command: &TestCommand) -> TestAck {
        let outcome = dispatch_test_command(&mut self.session, command);
        match outcome.effect {
            Some(TestEffect::Reset) => {
                self.rebooted = false;
                info!("tester: session initialised");
                self.all_off();
            }
            Some(TestEffect::StateChanged(TestState::Stopped)) => self.all_off(),
            Some(TestEffect::StateChanged(_)) | Some(TestEffect::OutputsChanged) => {
                self.refresh_outputs()
            }
            Some(TestEffect::PixelConfig(length)) => self.pixels.configure(length),
            None => {}
        }
        outcome.ack
    }

    /// Schreibt die Onboard-Kanäle, solange ein Onboard-Test läuft
    fn refresh_outputs(&mut self) {
        if self.session.state() != TestState::Running
            || self.session.output() != TestOutput::Onboard
        {
            return;
        }
        let pixel_test = self.session.test_type() == TestType::Pixel;
        for chan in 1..=NUM_CHANS_ONBOARD {
            let value = self.session.value(chan);
            if pixel_test && chan == PIXEL_DELAY_CHAN {
                self.pixels.set_delay(value);
                continue;
            }
            let mapping = self.onboard[chan as usize - 1];
            if let Some(pin) = mapping.out_pin {
                let level = output_level(value, mapping.is_analog, false);
                if self.pins.write_pin(pin, level).is_err() {
                    warn!("tester: onboard pin {} failed", pin);
                }
            }
        }
    }

    fn all_off(&mut self) {
        for mapping in self.onboard {
            if let Some(pin) = mapping.out_pin {
                let _ = self.pins.write_pin(pin, output_level(0, mapping.is_analog, false));
            }
        }
        self.pixels.clear();
    }

    /// Nächster Schritt eines laufenden Kanal-Sweeps
    pub fn sweep_tick(&mut self) -> Option<u8> {
        let chan = self.session.sweep_step()?;
        self.refresh_outputs();
        Some(chan)
    }

    /// `CMD_RUN` Broadcast, solange ein DMXW-Test nicht gestoppt ist
    pub fn run_packet(&self) -> Option<Packet> {
        if self.session.state() == TestState::Stopped || self.session.output() != TestOutput::Dmxw {
            return None;
        }
        let values: RunValues = (1..=NUM_CHAN_DMXW).map(|c| self.session.value(c)).collect();
        Some(Packet::new(NodeId::GATEWAY, Address::Broadcast, Command::Run(values)))
    }
}

// ============================================================================
// HMI
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HmiError {
    /// Es wartet noch ein Kommando auf seine Quittung
    Busy,
    /// Lokale Prüfung gegen die gespiegelte Session fehlgeschlagen
    Invalid(TestAck),
    Frame(FrameError),
}

impl core::fmt::Display for HmiError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HmiError::Busy => f.write_str("command still pending"),
            HmiError::Invalid(ack) => write!(f, "command invalid: {}", ack),
            HmiError::Frame(_) => f.write_str("command does not fit a frame"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HmiEvent {
    /// Quittiert und in die gespiegelte Session übernommen
    Acked(TestCommand),
    Rejected { command: TestCommand, code: TestAck },
    /// Frame kam beschädigt an, [`HmiLink::resend`] wiederholt ihn
    Corrupted(u8),
    /// Output-Prozessor wurde neu gestartet, siehe [`HmiLink::restore_commands`]
    PeerRebooted,
}

#[derive(Debug, Clone)]
struct Pending {
    command: TestCommand,
    frame: FrameBytes,
}

/// Sendende Seite des Testers
#[derive(Debug, Clone, Default)]
pub struct HmiLink {
    mirror: TestSession,
    decoder: FrameDecoder,
    tx_seq: SequenceCounter,
    pending: Option<Pending>,
    peer_rebooted: bool,
}

impl HmiLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zuletzt quittierter Stand des Output-Prozessors
    pub fn session(&self) -> &TestSession {
        &self.mirror
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn peer_rebooted(&self) -> bool {
        self.peer_rebooted
    }

    /// Prüft ein Kommando lokal und kodiert es als Frame
    pub fn send(&mut self, command: TestCommand) -> Result<FrameBytes, HmiError> {
        if self.pending.is_some() {
            return Err(HmiError::Busy);
        }
        let mut scratch = self.mirror.clone();
        let outcome = dispatch_test_command(&mut scratch, &command);
        if outcome.ack != TestAck::Ok {
            return Err(HmiError::Invalid(outcome.ack));
        }

        let frame = frame::encode(self.tx_seq.next(), &command.encode()).map_err(HmiError::Frame)?;
        self.pending = Some(Pending {
            command,
            frame: frame.clone(),
        });
        Ok(frame)
    }

    /// Wiederholt das ausstehende Kommando mit derselben Sequenznummer
    pub fn resend(&self) -> Option<FrameBytes> {
        self.pending.as_ref().map(|p| p.frame.clone())
    }

    /// Gibt das Warten auf eine Quittung auf (Timeout beim Aufrufer)
    pub fn abandon(&mut self) -> Option<TestCommand> {
        self.pending.take().map(|p| p.command)
    }

    pub fn feed(&mut self, byte: u8) -> Option<HmiEvent> {
        let FeedResult::Frame(frame) = self.decoder.feed(byte) else {
            return None;
        };
        match TestCommand::decode(&frame.payload) {
            Ok(TestCommand::Ack { cmd, code }) => self.on_ack(cmd, code),
            _ => {
                debug!("hmi: ignoring non-ack frame");
                None
            }
        }
    }

    pub fn idle(&mut self) {
        self.decoder.idle();
    }

    fn on_ack(&mut self, cmd: u8, code: TestAck) -> Option<HmiEvent> {
        if code == TestAck::OutReboot {
            warn!("hmi: output processor rebooted");
            self.peer_rebooted = true;
            self.pending = None;
            return Some(HmiEvent::PeerRebooted);
        }
        if self.pending.as_ref()?.command.code() != cmd {
            debug!("hmi: stale ack for cmd {}", cmd);
            return None;
        }
        if code == TestAck::Corrupted {
            return Some(HmiEvent::Corrupted(cmd));
        }

        let pending = self.pending.take()?;
        if code != TestAck::Ok {
            return Some(HmiEvent::Rejected {
                command: pending.command,
                code,
            });
        }
        dispatch_test_command(&mut self.mirror, &pending.command);
        if pending.command == TestCommand::Init {
            self.peer_rebooted = false;
        }
        Some(HmiEvent::Acked(pending.command))
    }

    /// Kommandos, die die Session auf einem frisch gestarteten
    /// Output-Prozessor wiederherstellen
    ///
    /// Kanal-Werte ungleich 0 folgen der Auswahl in Blöcken zu
    /// [`MAX_VALUE_PAIRS`], der Zustand kommt zuletzt.
    pub fn restore_commands(&self) -> Vec<TestCommand, RESTORE_COMMANDS> {
        let session = &self.mirror;
        let channels: ChannelList = session.selected().collect();
        let mut commands = Vec::new();
        for command in [
            TestCommand::Init,
            TestCommand::State(TestState::Stopped),
            TestCommand::Test {
                output: session.output(),
                test_type: session.test_type(),
            },
            TestCommand::Select {
                op: SelectOp::Add,
                channels,
            },
        ] {
            let _ = commands.push(command);
        }

        let mut pairs = ValueList::new();
        for chan in session.selected().filter(|&c| session.value(c) != 0) {
            if pairs.is_full() {
                let _ = commands.push(TestCommand::Value(core::mem::take(&mut pairs)));
            }
            let _ = pairs.push((chan, session.value(chan)));
        }
        if !pairs.is_empty() {
            let _ = commands.push(TestCommand::Value(pairs));
        }

        let _ = commands.push(TestCommand::State(session.state()));
        commands
    }
}
