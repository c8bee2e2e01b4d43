//! Persisted calibration record and its non-volatile store.
//!
//! Layout at the configured base address (little-endian floats):
//!
//! | offset | len | field                                   |
//! |--------|-----|-----------------------------------------|
//! | 0      | 1   | validity sentinel (`0xAA`)              |
//! | 1      | 1   | tare-stored flag (`0xAA` when set)      |
//! | 2      | 2   | reserved, written as 0                  |
//! | 4      | 4   | empty kettle weight, grams (`f32`)      |
//! | 8      | 4   | raw-to-gram factor (`f32`)              |
//! | 12     | 1   | factor-calibrated flag (`0xAA` when set)|
//! | 13     | 4   | tare offset, raw counts (`i32`)         |
//!
//! A missing or mismatched sentinel decodes as "uncalibrated, defaults".
//! Both calibrated values are measured against the tared zero, so the
//! offset is stored with them; an image written without it reads as a
//! zero offset.

use kettle_traits::NvStore;

use crate::error::StoreError;
use crate::hw_error::map_store_error;

pub const SENTINEL: u8 = 0xAA;
pub const RECORD_LEN: usize = 17;

const TARE_FLAG_AT: usize = 1;
const EMPTY_AT: usize = 4;
const FACTOR_AT: usize = 8;
const FLAG_AT: usize = 12;
const TARE_AT: usize = 13;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationRecord {
    pub empty_weight_g: f32,
    pub factor: f32,
    /// An empty-kettle weight has been measured.
    pub calibrated: bool,
    /// The factor came from a known-mass calibration, not the default.
    pub factor_calibrated: bool,
    /// Raw reading of the empty scale; subtracted before the factor.
    pub tare_offset: i32,
}

fn usable_factor(f: f32) -> bool {
    f.is_finite() && f > 0.0
}

impl CalibrationRecord {
    pub fn defaults(default_factor: f32) -> Self {
        Self {
            empty_weight_g: 0.0,
            factor: default_factor,
            calibrated: false,
            factor_calibrated: false,
            tare_offset: 0,
        }
    }

    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut buf = [0u8; RECORD_LEN];
        buf[0] = SENTINEL;
        buf[EMPTY_AT..EMPTY_AT + 4].copy_from_slice(&self.empty_weight_g.to_le_bytes());
        buf[FACTOR_AT..FACTOR_AT + 4].copy_from_slice(&self.factor.to_le_bytes());
        buf[FLAG_AT] = if self.factor_calibrated { SENTINEL } else { 0 };
        if self.tare_offset != 0 {
            buf[TARE_FLAG_AT] = SENTINEL;
            buf[TARE_AT..TARE_AT + 4].copy_from_slice(&self.tare_offset.to_le_bytes());
        }
        buf
    }

    /// Decode a stored image. Fields that fail their sanity check fall back
    /// to the default individually; a bad sentinel discards the whole record.
    pub fn decode(buf: &[u8; RECORD_LEN], default_factor: f32) -> Self {
        if buf[0] != SENTINEL {
            return Self::defaults(default_factor);
        }
        let word = |at: usize| [buf[at], buf[at + 1], buf[at + 2], buf[at + 3]];
        let read_f32 = |at: usize| f32::from_le_bytes(word(at));

        let mut empty = read_f32(EMPTY_AT);
        if !empty.is_finite() || empty < 0.0 {
            empty = 0.0;
        }
        let stored_factor = read_f32(FACTOR_AT);
        let factor_ok = usable_factor(stored_factor);
        Self {
            empty_weight_g: empty,
            factor: if factor_ok { stored_factor } else { default_factor },
            calibrated: empty > 0.0,
            factor_calibrated: factor_ok && buf[FLAG_AT] == SENTINEL,
            tare_offset: if buf[TARE_FLAG_AT] == SENTINEL {
                i32::from_le_bytes(word(TARE_AT))
            } else {
                0
            },
        }
    }
}

/// The record's home in an `NvStore` image.
pub struct CalibrationStore {
    store: Box<dyn NvStore>,
    base_addr: usize,
}

impl CalibrationStore {
    pub fn new(store: Box<dyn NvStore>, base_addr: usize) -> Self {
        Self { store, base_addr }
    }

    pub fn base_addr(&self) -> usize {
        self.base_addr
    }

    pub fn load(&mut self, default_factor: f32) -> Result<CalibrationRecord, StoreError> {
        let mut buf = [0u8; RECORD_LEN];
        self.store
            .read(self.base_addr, &mut buf)
            .map_err(|e| map_store_error(e.as_ref()))?;
        Ok(CalibrationRecord::decode(&buf, default_factor))
    }

    /// Write and commit in one step.
    pub fn save(&mut self, record: &CalibrationRecord) -> Result<(), StoreError> {
        self.store
            .write(self.base_addr, &record.encode())
            .map_err(|e| map_store_error(e.as_ref()))?;
        self.store.commit().map_err(|e| map_store_error(e.as_ref()))
    }

    /// Invalidate the stored record. The next boot loads defaults.
    pub fn erase(&mut self, default_factor: f32) -> Result<(), StoreError> {
        let mut buf = CalibrationRecord::defaults(default_factor).encode();
        buf[0] = 0;
        self.store
            .write(self.base_addr, &buf)
            .map_err(|e| map_store_error(e.as_ref()))?;
        self.store.commit().map_err(|e| map_store_error(e.as_ref()))
    }
}
