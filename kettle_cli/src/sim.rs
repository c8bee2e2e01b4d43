//! Plant model behind the simulated backend.
//!
//! The simulated load cell reports whatever raw value the plant last set.
//! Water flows at `flow_g_per_s` while the pump relay is on and the servo
//! has reached the kettle angle.

use kettle_core::Appliance;
use kettle_hardware::{SimulatedLoadCell, SimulatedOutputs};

pub struct Plant {
    cell: SimulatedLoadCell,
    outputs: SimulatedOutputs,
    grams: f32,
    flow_g_per_s: f32,
    kettle_deg: u8,
    last_ms: Option<u32>,
}

impl Plant {
    pub fn new(
        cell: SimulatedLoadCell,
        outputs: SimulatedOutputs,
        start_g: f32,
        flow_g_per_s: f32,
        kettle_deg: u8,
    ) -> Self {
        Self {
            cell,
            outputs,
            grams: start_g,
            flow_g_per_s,
            kettle_deg,
            last_ms: None,
        }
    }

    pub fn grams(&self) -> f32 {
        self.grams
    }

    /// Integrate flow up to `now` and publish the load as a raw count using
    /// the appliance's current factor and tare offset.
    pub fn advance(&mut self, now: u32, app: &Appliance) {
        let dt_ms = self
            .last_ms
            .map_or(0, |last| now.wrapping_sub(last).min(1_000));
        self.last_ms = Some(now);

        let levels = self.outputs.levels();
        if levels.pump && levels.servo_angle == self.kettle_deg {
            self.grams += self.flow_g_per_s * dt_ms as f32 / 1_000.0;
        }

        let weight = app.controller().weight();
        let factor = weight.factor();
        let counts = (f64::from(self.grams) / f64::from(factor)).round();
        let raw = (counts + f64::from(weight.tare_offset()))
            .clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32;
        self.cell.set_raw(raw);
    }
}
