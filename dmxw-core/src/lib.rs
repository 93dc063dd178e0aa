//! DMXW Core - Protokolle, Zuordnungen und Zustandsautomaten
//!
//! Diese Crate enthält KEINE Hardware-Dependencies.
//! Funk, Pins, Flash und Pixel-Strip kommen über die Traits in [`traits`].

#![no_std]

// Muss zuerst kommen, damit die Logging-Makros überall sichtbar sind
#[macro_use]
mod fmt;

pub mod consts;
pub mod dispatch;
pub mod frame;
pub mod gateway;
pub mod ipc;
pub mod link;
pub mod logic;
pub mod mapping;
pub mod packet;
pub mod session;
pub mod tester;
pub mod traits;
pub mod types;

// Re-exports für einfachen Zugriff
pub use dispatch::{NodeDispatcher, Reply, TestEffect, TestOutcome, dispatch_test_command};
pub use frame::{FeedResult, Frame, FrameDecoder, FrameError, RxState};
pub use gateway::{Gateway, GatewayError};
pub use ipc::{SequenceCounter, TestCommand};
pub use link::{LinkConfig, LinkError, WirelessLink};
pub use logic::{output_level, perceptual, wheel};
pub use mapping::{
    GatewayMapping, GatewayRegistry, MapError, MapImage, NodeMapping, NodeRegistry, PinMapping,
    PortTable,
};
pub use packet::{ChannelReport, Command, Packet, PacketError};
pub use session::{SelectOp, SessionError, TestSession};
pub use tester::{HmiEvent, HmiLink, OutputProcessor};
pub use traits::{
    Beacon, CancelSignal, Clock, MappingStore, NeverCancel, PinIo, PixelRenderer, RadioTransport,
};
pub use types::{AckCode, Address, NodeId, PinValue, PinWrite, TestAck, TestOutput, TestState, TestType};
