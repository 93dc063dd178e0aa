//! Kommandos zwischen HMI und Output-Prozessor
//!
//! Die Nutzdaten eines Frames beginnen mit dem Kommando-Code, danach
//! folgen die Argumente. Mehrbyte-Werte sind big-endian.

use core::fmt;

use heapless::Vec;

use crate::consts::*;
use crate::frame::Payload;
use crate::session::SelectOp;
use crate::types::{TestAck, TestOutput, TestState, TestType};

/// Kanäle pro `TSTCMD_SELECT` (Code, Operation, Anzahl, Liste)
pub const MAX_SELECT_CHANS: usize = MAX_SERIAL_BUF_LEN - 3;

/// Paare pro `TSTCMD_VALUE` (Code, Anzahl, Paare)
pub const MAX_VALUE_PAIRS: usize = (MAX_SERIAL_BUF_LEN - 2) / 2;

pub type ChannelList = Vec<u8, MAX_SELECT_CHANS>;
pub type ValueList = Vec<(u8, u8), MAX_VALUE_PAIRS>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestCommand {
    Init,
    State(TestState),
    Test {
        output: TestOutput,
        test_type: TestType,
    },
    Select {
        op: SelectOp,
        channels: ChannelList,
    },
    Value(ValueList),
    /// Länge des Pixel-Strips
    PixCfg(u16),
    Ack {
        cmd: u8,
        code: TestAck,
    },
}

/// Nutzdaten, die sich nicht als Kommando lesen lassen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IpcError {
    Empty,
    UnknownCommand(u8),
    BadArguments(u8),
}

impl IpcError {
    /// Kommando-Code für die Quittung
    pub fn code(&self) -> u8 {
        match *self {
            IpcError::Empty => TSTCMD_UNDEF,
            IpcError::UnknownCommand(code) | IpcError::BadArguments(code) => code,
        }
    }
}

impl fmt::Display for IpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpcError::Empty => f.write_str("empty command"),
            IpcError::UnknownCommand(code) => write!(f, "unknown test command {}", code),
            IpcError::BadArguments(code) => write!(f, "bad arguments for test command {}", code),
        }
    }
}

impl SelectOp {
    pub const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            SELECT_ADD => Some(SelectOp::Add),
            SELECT_DEL => Some(SelectOp::Remove),
            SELECT_CLR => Some(SelectOp::Clear),
            _ => None,
        }
    }

    pub const fn to_u8(self) -> u8 {
        match self {
            SelectOp::Add => SELECT_ADD,
            SelectOp::Remove => SELECT_DEL,
            SelectOp::Clear => SELECT_CLR,
        }
    }
}

impl TestCommand {
    pub fn code(&self) -> u8 {
        match self {
            TestCommand::Init => TSTCMD_INIT,
            TestCommand::State(_) => TSTCMD_STATE,
            TestCommand::Test { .. } => TSTCMD_TEST,
            TestCommand::Select { .. } => TSTCMD_SELECT,
            TestCommand::Value(_) => TSTCMD_VALUE,
            TestCommand::PixCfg(_) => TSTCMD_PIXCFG,
            TestCommand::Ack { .. } => TSTCMD_ACK,
        }
    }

    pub fn encode(&self) -> Payload {
        let mut out = Payload::new();
        // Listen sind so begrenzt, dass alles in MAX_SERIAL_BUF_LEN passt
        let mut put = |byte: u8| {
            let _ = out.push(byte);
        };
        put(self.code());
        match self {
            TestCommand::Init => {}
            TestCommand::State(state) => put(*state as u8),
            TestCommand::Test { output, test_type } => {
                put(*output as u8);
                put(*test_type as u8);
            }
            TestCommand::Select { op, channels } => {
                put(op.to_u8());
                put(channels.len() as u8);
                channels.iter().for_each(|&c| put(c));
            }
            TestCommand::Value(pairs) => {
                put(pairs.len() as u8);
                for &(chan, value) in pairs {
                    put(chan);
                    put(value);
                }
            }
            TestCommand::PixCfg(length) => {
                let [hi, lo] = length.to_be_bytes();
                put(hi);
                put(lo);
            }
            TestCommand::Ack { cmd, code } => {
                put(*cmd);
                put(*code as u8);
            }
        }
        out
    }

    pub fn decode(payload: &[u8]) -> Result<TestCommand, IpcError> {
        let (&code, args) = payload.split_first().ok_or(IpcError::Empty)?;
        let bad = IpcError::BadArguments(code);

        let command = match (code, args) {
            (TSTCMD_INIT, []) => TestCommand::Init,
            (TSTCMD_STATE, &[state]) => TestCommand::State(TestState::from_u8(state).ok_or(bad)?),
            (TSTCMD_TEST, &[output, test_type]) => TestCommand::Test {
                output: TestOutput::from_u8(output).ok_or(bad)?,
                test_type: TestType::from_u8(test_type).ok_or(bad)?,
            },
            (TSTCMD_SELECT, &[op, count, ref list @ ..]) => {
                if list.len() != count as usize {
                    return Err(bad);
                }
                TestCommand::Select {
                    op: SelectOp::from_u8(op).ok_or(bad)?,
                    channels: ChannelList::from_slice(list).map_err(|_| bad)?,
                }
            }
            (TSTCMD_VALUE, &[count, ref list @ ..]) => {
                if list.len() != 2 * count as usize {
                    return Err(bad);
                }
                let mut pairs = ValueList::new();
                for pair in list.chunks_exact(2) {
                    pairs.push((pair[0], pair[1])).map_err(|_| bad)?;
                }
                TestCommand::Value(pairs)
            }
            (TSTCMD_PIXCFG, &[hi, lo]) => TestCommand::PixCfg(u16::from_be_bytes([hi, lo])),
            (TSTCMD_ACK, &[cmd, ack]) => TestCommand::Ack {
                cmd,
                code: TestAck::from_u8(ack).ok_or(bad)?,
            },
            (
                TSTCMD_INIT | TSTCMD_STATE | TSTCMD_TEST | TSTCMD_SELECT | TSTCMD_VALUE
                | TSTCMD_PIXCFG | TSTCMD_ACK,
                _,
            ) => return Err(bad),
            _ => return Err(IpcError::UnknownCommand(code)),
        };
        Ok(command)
    }
}

/// Sequenznummern für ausgehende Frames
///
/// Läuft bei 256 über und überspringt 254 (STX ist als SEQ reserviert).
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter {
    next: u8,
}

impl SequenceCounter {
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    pub fn next(&mut self) -> u8 {
        let seq = self.next;
        self.next = following(seq);
        seq
    }
}

/// Nachfolger einer Sequenznummer
pub fn following(seq: u8) -> u8 {
    match seq.wrapping_add(1) {
        CHAR_STX => CHAR_STX.wrapping_add(1),
        next => next,
    }
}
