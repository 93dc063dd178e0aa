//! In-Memory Mocks für die Kollaborateure des Cores
//!
//! Jeder Mock zeichnet auf, was passiert ist, und kann über ein
//! `fail_next_*` Flag einen einzelnen Fehler liefern.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use dmxw_core::mapping::MapImage;
use dmxw_core::packet::PacketBytes;
use dmxw_core::traits::{BeaconError, PinError, RadioError, StoreError};
use dmxw_core::{
    Beacon, CancelSignal, Clock, MappingStore, NodeId, PinIo, PinMapping, PinValue, PixelRenderer,
    PortTable, RadioTransport,
};

pub fn node(id: u8) -> NodeId {
    NodeId::new(id).unwrap()
}

// ============================================================================
// Mock Clock
// ============================================================================

/// Zeit läuft nur, wenn ein Test (oder das Radio) sie weiterdreht
#[derive(Clone, Default)]
pub struct MockClock {
    now: Rc<Cell<u64>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

// ============================================================================
// Mock Radio
// ============================================================================

type Responder = Box<dyn FnMut(&[u8]) -> Option<PacketBytes>>;

/// Zeichnet gesendete Pakete auf und liefert Pakete aus einer Inbox
///
/// Ein optionaler Responder beantwortet jedes gesendete Paket (z.B. eine
/// echte `NodeDispatcher` Instanz hinter der Funkstrecke).
#[derive(Default)]
pub struct MockRadio {
    pub sent: Vec<Vec<u8>>,
    pub inbox: VecDeque<PacketBytes>,
    pub fail_next_send: bool,
    /// Antworten, die noch verloren gehen
    pub drop_replies: usize,
    /// Zeit, die jeder Empfang kostet
    pub receive_cost_ms: u64,
    pub clock: Option<MockClock>,
    responder: Option<Responder>,
}

impl MockRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: MockClock, receive_cost_ms: u64) -> Self {
        Self {
            clock: Some(clock),
            receive_cost_ms,
            ..Self::default()
        }
    }

    pub fn respond_with(&mut self, responder: impl FnMut(&[u8]) -> Option<PacketBytes> + 'static) {
        self.responder = Some(Box::new(responder));
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.inbox.push_back(PacketBytes::from_slice(bytes).unwrap());
    }
}

impl RadioTransport for MockRadio {
    async fn send(&mut self, bytes: &[u8]) -> Result<(), RadioError> {
        if self.fail_next_send {
            self.fail_next_send = false;
            return Err(RadioError::SendFailed);
        }
        self.sent.push(bytes.to_vec());

        if let Some(responder) = self.responder.as_mut() {
            if let Some(reply) = responder(bytes) {
                if self.drop_replies > 0 {
                    self.drop_replies -= 1;
                } else {
                    self.inbox.push_back(reply);
                }
            }
        }
        Ok(())
    }

    async fn receive(&mut self, _timeout_ms: u32) -> Option<PacketBytes> {
        if let Some(clock) = &self.clock {
            clock.advance(self.receive_cost_ms);
        }
        self.inbox.pop_front()
    }
}

// ============================================================================
// Mock Pins
// ============================================================================

#[derive(Default)]
pub struct MockPins {
    pub writes: Vec<(u8, PinValue)>,
    pub levels: HashMap<u8, PinValue>,
    pub fail_next_write: bool,
}

impl MockPins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self, pin: u8) -> Option<PinValue> {
        self.levels.get(&pin).copied()
    }
}

impl PinIo for MockPins {
    fn write_pin(&mut self, pin: u8, value: PinValue) -> Result<(), PinError> {
        if self.fail_next_write {
            self.fail_next_write = false;
            return Err(PinError::WriteFailed);
        }
        self.writes.push((pin, value));
        self.levels.insert(pin, value);
        Ok(())
    }

    fn read_pin(&mut self, pin: u8) -> Result<u8, PinError> {
        match self.levels.get(&pin) {
            Some(PinValue::Digital(on)) => Ok(if *on { 255 } else { 0 }),
            Some(PinValue::Pwm(value)) => Ok(*value),
            None => Err(PinError::UnknownPin(pin)),
        }
    }
}

// ============================================================================
// Mock Store
// ============================================================================

#[derive(Default)]
pub struct MockStore {
    pub bytes: Option<Vec<u8>>,
    pub save_count: usize,
    pub fail_next_save: bool,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MappingStore for MockStore {
    fn save(&mut self, image: &MapImage) -> Result<(), StoreError> {
        if self.fail_next_save {
            self.fail_next_save = false;
            return Err(StoreError::Io);
        }
        self.bytes = Some(image.as_bytes().to_vec());
        self.save_count += 1;
        Ok(())
    }

    fn load(&mut self) -> Result<Option<MapImage>, StoreError> {
        self.bytes
            .as_deref()
            .map(MapImage::from_bytes)
            .transpose()
    }
}

// ============================================================================
// Mock Beacon / Renderer
// ============================================================================

#[derive(Default)]
pub struct MockBeacon {
    pub locate_count: usize,
    pub busy: bool,
}

impl Beacon for MockBeacon {
    fn locate(&mut self) -> Result<(), BeaconError> {
        if self.busy {
            return Err(BeaconError::Busy);
        }
        self.locate_count += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct MockRenderer {
    pub length: Option<u16>,
    pub delay: Option<u8>,
    pub clear_count: usize,
}

impl PixelRenderer for MockRenderer {
    fn configure(&mut self, length: u16) {
        self.length = Some(length);
    }

    fn set_delay(&mut self, value: u8) {
        self.delay = Some(value);
    }

    fn clear(&mut self) {
        self.clear_count += 1;
    }
}

// ============================================================================
// Cancel
// ============================================================================

/// Löst nach `n` Abfragen aus
pub struct CancelAfter(Cell<u32>);

impl CancelAfter {
    pub fn new(checks: u32) -> Self {
        Self(Cell::new(checks))
    }
}

impl CancelSignal for CancelAfter {
    fn is_cancelled(&self) -> bool {
        let left = self.0.get();
        if left == 0 {
            return true;
        }
        self.0.set(left - 1);
        false
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Port 0/1: digital (Pin 4, 5), Port 2: PWM auf Pin 6, Port 3: digital auf
/// Pin 6 (Konflikt mit Port 2), Port 4: Eingang auf Pin 7
pub fn port_table() -> PortTable {
    PortTable::from_slice(&[
        PinMapping::digital_out(4),
        PinMapping::digital_out(5),
        PinMapping::analog_out(6).with_conflict(3),
        PinMapping::digital_out(6).with_conflict(2),
        PinMapping::digital_in(7),
    ])
}

pub type MockNode = dmxw_core::NodeDispatcher<MockPins, MockStore, MockBeacon>;

pub fn mock_node(id: u8) -> MockNode {
    MockNode::new(
        node(id),
        port_table(),
        MockPins::new(),
        MockStore::new(),
        MockBeacon::default(),
    )
}

/// Radio, hinter dem eine echte Node antwortet
pub fn radio_to(target: Rc<RefCell<MockNode>>) -> MockRadio {
    let mut radio = MockRadio::new();
    radio.respond_with(move |bytes| {
        let packet = dmxw_core::Packet::decode(bytes);
        let reply = target.borrow_mut().process(packet)?;
        let me = target.borrow().id();
        Some(dmxw_core::Packet::new(me, reply.to, reply.command).encode())
    });
    radio
}
