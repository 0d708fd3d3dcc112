//! [`MotorDriver`] implementation for the Raspberry Pi

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::plat::{Direction, Track};
use log::{debug, info};
use rppal::{
    gpio::{Gpio, InputPin, Level, OutputPin},
    pwm::{Channel, Polarity, Pwm},
};

use super::{check_frequency, DriverError, MotorDriver, Params};
use crate::drive_ctrl::{Microstepping, TrackPair};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Pins of one DRV8825 stepper driver board.
struct TrackPins {
    dir: OutputPin,
    forward_level: Level,
    sleep: OutputPin,
    mode: [OutputPin; 3],
    fault: InputPin,
    step: Pwm,
}

/// Motor driver using the Raspberry Pi's GPIO and hardware PWM peripherals.
pub struct RpiDriver {
    tracks: TrackPair<TrackPins>,
    status_led: OutputPin,
    duty_cycle: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RpiDriver {
    /// Claim all pins and PWM channels and light the status LED.
    ///
    /// The step signals start disabled and both drivers asleep.
    pub fn new(params: &Params) -> Result<Self, DriverError> {
        let gpio = Gpio::new().map_err(config_err)?;

        let tracks = TrackPair::new(
            TrackPins::new(&gpio, params, 0)?,
            TrackPins::new(&gpio, params, 1)?,
        );

        let mut status_led = gpio.get(params.status_led_pin)
            .map_err(config_err)?
            .into_output();
        status_led.set_high();

        info!("Raspberry Pi motor driver initialised");

        Ok(Self {
            tracks,
            status_led,
            duty_cycle: params.step_duty_cycle,
        })
    }
}

impl TrackPins {
    fn new(gpio: &Gpio, params: &Params, idx: usize) -> Result<Self, DriverError> {
        let output = |pin: u8| -> Result<OutputPin, DriverError> {
            let mut p = gpio.get(pin).map_err(config_err)?.into_output();
            p.set_low();
            Ok(p)
        };

        let channel = match params.step_pwm_channels[idx] {
            0 => Channel::Pwm0,
            1 => Channel::Pwm1,
            c => return Err(DriverError::ConfigurationError(
                format!("PWM channel {} does not exist", c)
            ))
        };

        let step = Pwm::with_frequency(
            channel,
            1000.0,
            params.step_duty_cycle,
            Polarity::Normal,
            false
        ).map_err(config_err)?;

        Ok(Self {
            dir: output(params.dir_pins[idx])?,
            forward_level: if params.forward_level_high[idx] { Level::High } else { Level::Low },
            sleep: output(params.sleep_pins[idx])?,
            mode: [
                output(params.m0_pins[idx])?,
                output(params.m1_pins[idx])?,
                output(params.m2_pins[idx])?,
            ],
            fault: gpio.get(params.fault_pins[idx]).map_err(config_err)?.into_input(),
            step,
        })
    }
}

impl MotorDriver for RpiDriver {
    fn set_direction_and_microstepping(
        &mut self,
        track: Track,
        dir: Direction,
        microsteps: Microstepping
    ) -> Result<(), DriverError> {
        let pins = self.tracks.get_mut(track);

        let level = match dir {
            Direction::Forward => pins.forward_level,
            Direction::Backward => match pins.forward_level {
                Level::High => Level::Low,
                Level::Low => Level::High,
            },
        };
        pins.dir.write(level);

        for (pin, high) in pins.mode.iter_mut().zip(microsteps.mode_pins().iter()) {
            pin.write(if *high { Level::High } else { Level::Low });
        }

        Ok(())
    }

    fn set_step_frequency(&mut self, track: Track, freq_hz: f64) -> Result<(), DriverError> {
        check_frequency(freq_hz)?;

        let duty_cycle = self.duty_cycle;
        let pins = self.tracks.get_mut(track);

        if freq_hz == 0.0 {
            pins.sleep.set_low();
            pins.step.disable().map_err(pwm_err)?;
        }
        else {
            pins.sleep.set_high();
            pins.step.set_frequency(freq_hz, duty_cycle).map_err(pwm_err)?;
            pins.step.enable().map_err(pwm_err)?;
        }

        Ok(())
    }

    fn read_fault(&self, track: Track) -> Result<bool, DriverError> {
        Ok(self.tracks.get(track).fault.is_low())
    }

    fn shutdown(&mut self) -> Result<(), DriverError> {
        self.status_led.set_low();

        let mut result = Ok(());
        for pins in [&mut self.tracks.left, &mut self.tracks.right].iter_mut() {
            pins.sleep.set_low();
            if let Err(e) = pins.step.disable() {
                result = Err(pwm_err(e));
            }
        }

        debug!("Raspberry Pi motor driver shut down");

        result
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn config_err<E: std::fmt::Display>(e: E) -> DriverError {
    DriverError::ConfigurationError(e.to_string())
}

fn pwm_err(e: rppal::pwm::Error) -> DriverError {
    DriverError::Pwm(e.to_string())
}
