// Beacon und Pixel-Strip als Kommando-Quellen für den LED-Task
//
// Beide schreiben nur in den LED-Channel, die LEDs selbst gehören dem Task.

use core::sync::atomic::Ordering;

use defmt::warn;
use dmxw_core::traits::{Beacon, BeaconError, PixelRenderer};

use crate::tasks::led::LOCATING;
use crate::{LedCommand, LedCommandSender};

/// Locator-Beacon über die Onboard-LED
pub struct LedBeacon {
    commands: LedCommandSender,
}

impl LedBeacon {
    pub fn new(commands: LedCommandSender) -> Self {
        Self { commands }
    }
}

impl Beacon for LedBeacon {
    fn locate(&mut self) -> Result<(), BeaconError> {
        if LOCATING.load(Ordering::Acquire) {
            return Err(BeaconError::Busy);
        }
        self.commands
            .try_send(LedCommand::Locate)
            .map_err(|_| BeaconError::Busy)
    }
}

/// Pixel-Strip des Testers
pub struct LedPixels {
    commands: LedCommandSender,
}

impl LedPixels {
    pub fn new(commands: LedCommandSender) -> Self {
        Self { commands }
    }

    fn post(&self, command: LedCommand) {
        if self.commands.try_send(command).is_err() {
            warn!("pixels: command queue full, dropping {}", command);
        }
    }
}

impl PixelRenderer for LedPixels {
    fn configure(&mut self, length: u16) {
        self.post(LedCommand::Configure(length));
    }

    fn set_delay(&mut self, value: u8) {
        self.post(LedCommand::Delay(value));
    }

    fn clear(&mut self) {
        self.post(LedCommand::Clear);
    }
}
