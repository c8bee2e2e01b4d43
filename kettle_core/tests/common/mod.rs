#![allow(dead_code)]

use std::sync::Arc;

use kettle_core::calibration::RECORD_LEN;
use kettle_core::{Appliance, ApplianceCfg, CalibrationRecord, MemoryLog, ModeKind};
use kettle_hardware::{MemoryStore, OutputLevels, SimulatedButton, SimulatedLoadCell, SimulatedOutputs};

/// Exact in binary floating point: raw = grams * 2.
pub const FACTOR: f32 = 0.5;
pub const TICK_MS: u32 = 100;

pub fn raw_for(grams: f32) -> i32 {
    (grams / FACTOR) as i32
}

pub fn calibrated(empty_g: f32) -> CalibrationRecord {
    CalibrationRecord {
        empty_weight_g: empty_g,
        factor: FACTOR,
        calibrated: true,
        factor_calibrated: true,
        tare_offset: 0,
    }
}

pub fn image_with(record: Option<CalibrationRecord>) -> Vec<u8> {
    let mut image = vec![0xFF; 512];
    if let Some(rec) = record {
        image[..RECORD_LEN].copy_from_slice(&rec.encode());
    }
    image
}

/// Simulated appliance with handles on every peripheral.
pub struct Rig {
    pub app: Appliance,
    pub cell: SimulatedLoadCell,
    pub button: SimulatedButton,
    pub out: SimulatedOutputs,
    pub store: MemoryStore,
    pub log: Arc<MemoryLog>,
    pub now: u32,
    /// Raw counts the load cell reads with nothing on it.
    pub bias: i32,
}

impl Rig {
    /// Factor calibrated, empty kettle of 400 g on the scale.
    pub fn new() -> Self {
        Self::build(Some(calibrated(400.0)), 400.0, ApplianceCfg::default())
    }

    pub fn build(record: Option<CalibrationRecord>, start_g: f32, cfg: ApplianceCfg) -> Self {
        let cell = SimulatedLoadCell::new(raw_for(start_g));
        let button = SimulatedButton::new();
        let out = SimulatedOutputs::new();
        let store = MemoryStore::from_image(image_with(record));
        let log = Arc::new(MemoryLog::new());
        let now = 1_000;
        let app = Appliance::builder()
            .with_load_cell(cell.clone())
            .with_button(button.clone())
            .with_actuators(out.clone())
            .with_store(store.clone())
            .with_config(cfg)
            .with_log(log.clone())
            .build(now)
            .expect("build appliance");
        Self {
            app,
            cell,
            button,
            out,
            store,
            log,
            now,
            bias: 0,
        }
    }

    /// Power-cycle: a fresh appliance on the same load cell and store.
    pub fn reboot(&self) -> Self {
        let button = SimulatedButton::new();
        let out = SimulatedOutputs::new();
        let log = Arc::new(MemoryLog::new());
        let app = Appliance::builder()
            .with_load_cell(self.cell.clone())
            .with_button(button.clone())
            .with_actuators(out.clone())
            .with_store(self.store.clone())
            .with_log(log.clone())
            .build(self.now)
            .expect("rebuild appliance");
        Self {
            app,
            cell: self.cell.clone(),
            button,
            out,
            store: self.store.clone(),
            log,
            now: self.now,
            bias: self.bias,
        }
    }

    pub fn set_grams(&self, grams: f32) {
        self.cell.set_raw(raw_for(grams) + self.bias);
    }

    pub fn tick(&mut self) {
        self.now = self.now.wrapping_add(TICK_MS);
        self.app.tick(self.now);
    }

    pub fn ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }

    pub fn run_ms(&mut self, ms: u32) {
        self.ticks((ms / TICK_MS) as usize);
    }

    /// Tick until `pred` holds, at most `max` ticks. Returns whether it held.
    pub fn tick_until(&mut self, max: usize, mut pred: impl FnMut(&Rig) -> bool) -> bool {
        for _ in 0..max {
            self.tick();
            if pred(self) {
                return true;
            }
        }
        false
    }

    /// `n` short presses, then enough quiet time for the series to resolve.
    pub fn click(&mut self, n: usize) {
        for _ in 0..n {
            self.button.press();
            self.ticks(3);
            self.button.release();
            self.ticks(2);
        }
        self.ticks(5);
    }

    pub fn hold_button(&mut self, ms: u32) {
        self.button.press();
        self.run_ms(ms);
        self.button.release();
        self.ticks(2);
    }

    pub fn mode(&self) -> ModeKind {
        self.app.mode()
    }

    pub fn levels(&self) -> OutputLevels {
        self.out.levels()
    }

    pub fn beeps(&self) -> u32 {
        self.out.levels().buzzer_edges
    }

    /// Let the median window settle on the current raw level.
    pub fn settle(&mut self) {
        self.ticks(5);
    }
}
