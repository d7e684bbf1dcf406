//! Simulated test stand.
//!
//! A first-order motor model behind both ports: the ESC command sets a
//! steady-state speed, the rotor approaches it with a fixed time constant,
//! and thrust/torque/current follow the speed.  Used by the simulator binary
//! and by the integration tests.

use crate::app::ports::{ActuatorPort, Measurement, SensorChannel, SensorPort};
use crate::channel::{ChannelId, Protocol};
use crate::error::SensorError;

use super::output_bank::OutputBank;

/// Plant constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorModel {
    /// Command at which the rotor starts turning (µs).
    pub idle_command: f64,
    /// Steady-state RPM gained per µs above `idle_command`.
    pub rpm_per_unit: f64,
    /// Speed time constant (seconds).
    pub time_constant: f64,
    /// Thrust = coeff · rpm².
    pub thrust_coeff: f64,
    /// Torque = coeff · thrust.
    pub torque_coeff: f64,
    pub supply_voltage: f64,
    /// Current = coeff · rpm³.
    pub current_coeff: f64,
}

impl Default for MotorModel {
    fn default() -> Self {
        Self {
            idle_command: 1050.0,
            rpm_per_unit: 10.0,
            time_constant: 0.3,
            thrust_coeff: 3.0e-8,
            torque_coeff: 0.02,
            supply_voltage: 16.0,
            current_coeff: 5.0e-11,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimBench {
    model: MotorModel,
    motor: ChannelId,
    outputs: OutputBank,
    speed: f64,
    thrust_offset: f64,
    sensor_fault: bool,
}

impl SimBench {
    pub fn new(model: MotorModel, motor: ChannelId, protocol: Protocol) -> Self {
        Self {
            model,
            motor,
            outputs: OutputBank::new(protocol),
            speed: 0.0,
            thrust_offset: 0.0,
            sensor_fault: false,
        }
    }

    /// Integrate the plant over `dt` seconds.
    pub fn advance(&mut self, dt: f64) {
        if !(dt.is_finite() && dt > 0.0) {
            return;
        }
        let m = &self.model;
        let target = self
            .outputs
            .value(self.motor)
            .map_or(0.0, |cmd| ((cmd - m.idle_command) * m.rpm_per_unit).max(0.0));
        let alpha = if m.time_constant > 0.0 {
            1.0 - (-dt / m.time_constant).exp()
        } else {
            1.0
        };
        self.speed += (target - self.speed) * alpha;
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn thrust(&self) -> f64 {
        self.model.thrust_coeff * self.speed * self.speed - self.thrust_offset
    }

    pub fn outputs(&self) -> &OutputBank {
        &self.outputs
    }

    /// Make subsequent reads fail (or succeed again).
    pub fn set_sensor_fault(&mut self, fault: bool) {
        self.sensor_fault = fault;
    }
}

impl SensorPort for SimBench {
    fn read(&mut self, _sample_count: u32) -> Result<Measurement, SensorError> {
        if self.sensor_fault {
            return Err(SensorError::Unavailable);
        }
        let m = &self.model;
        let thrust = self.thrust();
        Ok(Measurement::new()
            .with(SensorChannel::MotorSpeed, self.speed)
            .with(SensorChannel::Thrust, thrust)
            .with(SensorChannel::Torque, m.torque_coeff * thrust)
            .with(SensorChannel::Voltage, m.supply_voltage)
            .with(SensorChannel::Current, m.current_coeff * self.speed.powi(3)))
    }

    fn tare(&mut self) {
        self.thrust_offset = self.model.thrust_coeff * self.speed * self.speed;
    }
}

impl ActuatorPort for SimBench {
    fn write(&mut self, channels: &[ChannelId], values: &[f64]) {
        self.outputs.write(channels, values);
    }
}
