//! Kommando-Auswertung (CommandDispatcher)
//!
//! - [`NodeDispatcher`]: Funk-Kommandos einer Node gegen ihre Registry
//! - [`dispatch_test_command`]: Tester-Kommandos gegen eine [`TestSession`]

use crate::ipc::TestCommand;
use crate::link::{LinkError, WirelessLink};
use crate::mapping::{NodeRegistry, PortTable, channel_index};
use crate::packet::{ChannelReport, Command, Packet, PacketError};
use crate::session::{SessionError, TestSession};
use crate::traits::{Beacon, Clock, MappingStore, PinIo, RadioTransport, StoreError};
use crate::types::{AckCode, Address, NodeId, PinWrite, TestAck, TestState};

// ============================================================================
// Node-Rolle
// ============================================================================

/// Antwort einer Node an einen Absender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub to: NodeId,
    pub command: Command,
}

/// Führt Funk-Kommandos auf einer Node aus
///
/// Besitzt die Registry und die Hardware-Kollaborateure. Unicast-Anfragen
/// werden beantwortet (außer `CMD_RUN`), Broadcasts nie.
pub struct NodeDispatcher<P, S, B> {
    id: NodeId,
    registry: NodeRegistry,
    pins: P,
    store: S,
    beacon: B,
}

impl<P: PinIo, S: MappingStore, B: Beacon> NodeDispatcher<P, S, B> {
    pub fn new(id: NodeId, ports: PortTable, pins: P, store: S, beacon: B) -> Self {
        Self {
            id,
            registry: NodeRegistry::new(ports),
            pins,
            store,
            beacon,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn pins(&self) -> &P {
        &self.pins
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn beacon(&self) -> &B {
        &self.beacon
    }

    pub fn beacon_mut(&mut self) -> &mut B {
        &mut self.beacon
    }

    pub fn pins_mut(&mut self) -> &mut P {
        &mut self.pins
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Stellt gespeicherte Zuordnungen wieder her
    ///
    /// `Ok(false)` wenn noch nie gespeichert wurde.
    pub fn startup(&mut self) -> Result<bool, StoreError> {
        let Some(image) = self.store.load()? else {
            info!("node {}: no stored mappings", self.id.get());
            return Ok(false);
        };
        self.registry.restore(&image)?;
        let writes = self.registry.outputs();
        if self.write_all(writes).is_err() {
            warn!("node {}: restoring outputs failed", self.id.get());
        }
        info!("node {}: mappings restored", self.id.get());
        Ok(true)
    }

    /// Wartet auf ein Paket, führt es aus und sendet die Antwort
    ///
    /// Liefert `false` bei Timeout.
    pub async fn poll<R: RadioTransport, C: Clock>(
        &mut self,
        link: &mut WirelessLink<R, C>,
        timeout_ms: u32,
    ) -> Result<bool, LinkError> {
        let Some(incoming) = link.receive(timeout_ms).await else {
            return Ok(false);
        };
        if let Some(reply) = self.process(incoming) {
            link.send(Address::Node(reply.to), reply.command).await?;
        }
        Ok(true)
    }

    /// Wertet ein empfangenes Paket oder einen quittierbaren Fehler aus
    pub fn process(&mut self, incoming: Result<Packet, PacketError>) -> Option<Reply> {
        match incoming {
            Ok(packet) => self.handle(&packet),
            Err(err) => {
                let (src, dest, cmd, code) = err.reply()?;
                if dest != Address::Node(self.id) {
                    return None;
                }
                warn!("node {}: rejecting cmd {}", self.id.get(), cmd);
                Some(Reply {
                    to: src,
                    command: Command::Ack { cmd, code },
                })
            }
        }
    }

    pub fn handle(&mut self, packet: &Packet) -> Option<Reply> {
        if !packet.dest.includes(self.id) {
            return None;
        }
        let response = self.execute(&packet.command)?;
        match packet.dest {
            Address::Broadcast => None,
            Address::Node(_) => Some(Reply {
                to: packet.src,
                command: response,
            }),
        }
    }

    fn execute(&mut self, command: &Command) -> Option<Command> {
        let result = match command {
            Command::Run(values) => {
                let writes = self.registry.apply_run(values);
                if self.write_all(writes).is_err() {
                    warn!("node {}: run update failed", self.id.get());
                }
                return None;
            }
            Command::Ack { .. } | Command::Pong | Command::Chan(_) => return None,
            Command::Ping => return Some(Command::Pong),
            Command::Echo { chan } => {
                if channel_index(*chan).is_none() {
                    Err(AckCode::EDmxw)
                } else {
                    self.sample_input(*chan);
                    let report = self
                        .registry
                        .describe(*chan)
                        .unwrap_or(ChannelReport::unassigned(*chan));
                    return Some(Command::Chan(report));
                }
            }
            Command::Map {
                chan,
                port,
                logarithmic,
            } => self.map(*chan, *port, *logarithmic),
            Command::MapRemove { chan } => self.unmap(*chan),
            Command::ClearAll => {
                let result = self.off();
                self.registry.clear_all();
                result
            }
            Command::Locate => self.beacon.locate().map_err(|_| AckCode::Err),
            Command::Off => self.off(),
            Command::Port { port, value } => match self.registry.set_port_value(*port, *value) {
                Ok(write) => self.write_all([write]),
                Err(err) => Err(err.into()),
            },
            Command::Ctrl { chan, value } => match self.registry.set_channel_value(*chan, *value) {
                Ok(write) => self.write_all(write),
                Err(err) => Err(err.into()),
            },
            Command::Test => {
                info!("node {}: test command", self.id.get());
                Ok(())
            }
            Command::Save => {
                let image = self.registry.image();
                self.store.save(&image).map_err(|_| AckCode::Err)
            }
        };

        let code = match result {
            Ok(()) => AckCode::Ok,
            Err(code) => code,
        };
        Some(Command::Ack {
            cmd: command.code(),
            code,
        })
    }

    /// Schlägt ein Pin-Schreibvorgang fehl, bleibt die Registry unverändert
    /// und der alte Port bekommt seinen Wert zurück.
    fn map(&mut self, chan: u8, port: u8, logarithmic: bool) -> Result<(), AckCode> {
        let snapshot = self.registry.clone();
        let result = self.apply_map(chan, port, logarithmic);
        if result.is_err() && self.registry != snapshot {
            warn!("node {}: map of channel {} rolled back", self.id.get(), chan);
            self.registry = snapshot;
            if let Some(previous) = self.registry.lookup(chan).filter(|p| p.is_output)
                && let Ok(write) = self.registry.set_port_value(previous.port, previous.value)
            {
                let _ = self.write_all([write]);
            }
        }
        result
    }

    fn apply_map(&mut self, chan: u8, port: u8, logarithmic: bool) -> Result<(), AckCode> {
        let previous = self.registry.lookup(chan);
        let is_output = self.registry.ports().is_output(port);
        self.registry
            .assign_port(chan, port, is_output, logarithmic)?;

        if let Some(previous) = previous.filter(|p| p.port != port && p.is_output) {
            let write = self.registry.set_port_value(previous.port, 0)?;
            self.write_all([write])?;
        }
        let value = self.registry.lookup(chan).map_or(0, |m| m.value);
        let write = self.registry.set_channel_value(chan, value)?;
        self.write_all(write)
    }

    fn unmap(&mut self, chan: u8) -> Result<(), AckCode> {
        match self.registry.clear_channel(chan)? {
            Some(removed) if removed.is_output => {
                let write = self.registry.set_port_value(removed.port, 0)?;
                self.write_all([write])
            }
            _ => Ok(()),
        }
    }

    /// Liest den Pin eines Eingangs-Kanals in die Registry
    fn sample_input(&mut self, chan: u8) {
        let Some(mapping) = self.registry.lookup(chan).filter(|m| !m.is_output) else {
            return;
        };
        let Some(pin) = self.registry.ports().get(mapping.port).and_then(|p| p.in_pin) else {
            return;
        };
        match self.pins.read_pin(pin) {
            Ok(value) => {
                let _ = self.registry.set_channel_value(chan, value);
            }
            Err(_) => warn!("node {}: reading pin {} failed", self.id.get(), pin),
        }
    }

    fn off(&mut self) -> Result<(), AckCode> {
        let writes = self.registry.off();
        self.write_all(writes)
    }

    fn write_all(&mut self, writes: impl IntoIterator<Item = PinWrite>) -> Result<(), AckCode> {
        let mut result = Ok(());
        for write in writes {
            if self.pins.write_pin(write.pin, write.value).is_err() {
                warn!("node {}: writing pin {} failed", self.id.get(), write.pin);
                result = Err(AckCode::EPort);
            }
        }
        result
    }
}

// ============================================================================
// Output-Prozessor-Rolle
// ============================================================================

/// Nebenwirkung eines angenommenen Tester-Kommandos
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TestEffect {
    /// `TSTCMD_INIT`: Session neu
    Reset,
    StateChanged(TestState),
    /// Selektion oder Werte geändert
    OutputsChanged,
    PixelConfig(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TestOutcome {
    pub ack: TestAck,
    pub effect: Option<TestEffect>,
}

impl TestOutcome {
    fn ok(effect: Option<TestEffect>) -> Self {
        Self {
            ack: TestAck::Ok,
            effect,
        }
    }

    fn rejected(err: SessionError) -> Self {
        Self {
            ack: err.into(),
            effect: None,
        }
    }
}

/// Wendet ein Tester-Kommando auf eine Session an
///
/// Abgelehnte Kommandos lassen die Session unverändert.
pub fn dispatch_test_command(session: &mut TestSession, command: &TestCommand) -> TestOutcome {
    let result = match command {
        TestCommand::Init => {
            *session = TestSession::new();
            Ok(Some(TestEffect::Reset))
        }
        TestCommand::State(state) => {
            session.set_state(*state);
            Ok(Some(TestEffect::StateChanged(*state)))
        }
        TestCommand::Test { output, test_type } => {
            session.set_test(*output, *test_type).map(|_| None)
        }
        TestCommand::Select { op, channels } => session
            .select(*op, channels)
            .map(|_| Some(TestEffect::OutputsChanged)),
        TestCommand::Value(pairs) => session
            .set_values(pairs)
            .map(|_| Some(TestEffect::OutputsChanged)),
        TestCommand::PixCfg(length) => Ok(Some(TestEffect::PixelConfig(*length))),
        // Quittungen sind keine Anfragen
        TestCommand::Ack { .. } => Err(SessionError::BadParm),
    };

    match result {
        Ok(effect) => TestOutcome::ok(effect),
        Err(err) => TestOutcome::rejected(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TestOutput, TestType};

    #[test]
    fn test_test_command_rejected_while_running() {
        let mut session = TestSession::new();
        session.set_state(TestState::Running);
        let before = session.clone();

        let outcome = dispatch_test_command(
            &mut session,
            &TestCommand::Test {
                output: TestOutput::Dmxw,
                test_type: TestType::Manual,
            },
        );
        assert_eq!(outcome.ack, TestAck::BadState);
        assert_eq!(outcome.effect, None);
        assert_eq!(session, before);
    }

    #[test]
    fn test_init_resets_session() {
        let mut session = TestSession::new();
        session.set_test(TestOutput::Dmxw, TestType::Manual).unwrap();
        session.set_state(TestState::Paused);

        let outcome = dispatch_test_command(&mut session, &TestCommand::Init);
        assert_eq!(outcome, TestOutcome::ok(Some(TestEffect::Reset)));
        assert_eq!(session, TestSession::new());
    }

    #[test]
    fn test_ack_is_not_a_request() {
        let mut session = TestSession::new();
        let outcome = dispatch_test_command(
            &mut session,
            &TestCommand::Ack {
                cmd: 1,
                code: TestAck::Ok,
            },
        );
        assert_eq!(outcome.ack, TestAck::BadParm);
    }
}
