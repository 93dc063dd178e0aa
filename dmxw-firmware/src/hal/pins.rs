// GPIO und LEDC hinter dem PinIo Trait
//
// Jeder physische Pin hat genau einen Treiber. Ports, die sich einen Pin
// teilen (digital und PWM), schreiben auf denselben Treiber.

use dmxw_core::PinValue;
use dmxw_core::consts::MAX_PORTS;
use dmxw_core::traits::{PinError, PinIo};
use esp_hal::gpio::{Input, Output};
use esp_hal::ledc::LowSpeed;
use esp_hal::ledc::channel::{Channel, ChannelHW};
use heapless::Vec;

/// Treiber eines physischen Pins
pub enum PinDriver<'d> {
    Digital(Output<'d>),
    /// LEDC Kanal mit 8-Bit Duty
    Pwm(Channel<'d, LowSpeed>),
    Input(Input<'d>),
}

/// Pin-Nummer → Treiber
pub struct GpioPins<'d> {
    drivers: Vec<(u8, PinDriver<'d>), MAX_PORTS>,
}

impl<'d> GpioPins<'d> {
    pub fn new() -> Self {
        Self {
            drivers: Vec::new(),
        }
    }

    /// Registriert den Treiber für `pin`, überzählige werden verworfen
    pub fn with(mut self, pin: u8, driver: PinDriver<'d>) -> Self {
        if self.drivers.push((pin, driver)).is_err() {
            defmt::warn!("pins: no slot left for pin {}", pin);
        }
        self
    }

    fn driver(&mut self, pin: u8) -> Result<&mut PinDriver<'d>, PinError> {
        self.drivers
            .iter_mut()
            .find(|(p, _)| *p == pin)
            .map(|(_, driver)| driver)
            .ok_or(PinError::UnknownPin(pin))
    }
}

impl Default for GpioPins<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl PinIo for GpioPins<'_> {
    fn write_pin(&mut self, pin: u8, value: PinValue) -> Result<(), PinError> {
        match (self.driver(pin)?, value) {
            (PinDriver::Digital(output), PinValue::Digital(on)) => output.set_level(on.into()),
            (PinDriver::Digital(output), PinValue::Pwm(duty)) => {
                output.set_level((duty >= 128).into())
            }
            (PinDriver::Pwm(channel), value) => {
                let duty = match value {
                    PinValue::Digital(true) => 255,
                    PinValue::Digital(false) => 0,
                    PinValue::Pwm(duty) => duty,
                };
                channel.set_duty_hw(duty as u32)
            }
            (PinDriver::Input(_), _) => return Err(PinError::WriteFailed),
        }
        Ok(())
    }

    fn read_pin(&mut self, pin: u8) -> Result<u8, PinError> {
        match self.driver(pin)? {
            PinDriver::Input(input) => Ok(if input.is_high() { 255 } else { 0 }),
            PinDriver::Digital(output) => Ok(if output.is_set_high() { 255 } else { 0 }),
            PinDriver::Pwm(_) => Err(PinError::UnknownPin(pin)),
        }
    }
}
