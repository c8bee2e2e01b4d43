//! Weight acquisition, filtering and calibration.
//!
//! `WeightChannel` owns the load cell and the calibration store. Each
//! `update` consumes at most one conversion: it is converted to grams,
//! checked against the last accepted filtered value, and pushed into a
//! median window. Consumers only ever see the filtered weight.
//!
//! Outlier policy: a sample further than `outlier_jump_g` from the
//! reference is dropped and the tick still reports success. If the next
//! `outlier_reseed_after` samples all agree on a new level (within the jump
//! band of the first of them), the window is re-seeded there, so a real
//! step such as placing a kettle on an empty scale is eventually followed.

use std::collections::VecDeque;
use std::sync::Arc;

use kettle_traits::LoadCell;

use crate::calibration::{CalibrationRecord, CalibrationStore};
use crate::config::ScaleCfg;
use crate::error::{CalibrationError, StoreError};
use crate::hw_error::is_not_ready;
use crate::logger::{ControlEvent, EventLog};
use crate::util::has_exceeded;

/// Fixed-capacity window answering its median.
#[derive(Debug, Clone)]
pub struct MedianWindow {
    buf: VecDeque<f32>,
    cap: usize,
    scratch: Vec<f32>,
}

impl MedianWindow {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            buf: VecDeque::with_capacity(cap),
            cap,
            scratch: Vec::with_capacity(cap),
        }
    }

    pub fn push(&mut self, v: f32) {
        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(v);
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Median of the window; the mean of the two middle values for an
    /// even count.
    pub fn median(&mut self) -> Option<f32> {
        if self.buf.is_empty() {
            return None;
        }
        self.scratch.clear();
        self.scratch.extend(self.buf.iter().copied());
        self.scratch.sort_by(f32::total_cmp);
        let n = self.scratch.len();
        let mid = n / 2;
        if n % 2 == 1 {
            Some(self.scratch[mid])
        } else {
            Some((self.scratch[mid - 1] + self.scratch[mid]) / 2.0)
        }
    }
}

/// `weight >= empty - hysteresis`.
#[inline]
pub fn kettle_present(weight_g: f32, empty_g: f32, hysteresis_g: f32) -> bool {
    weight_g >= empty_g - hysteresis_g
}

fn median_i32(values: &mut [i32]) -> Option<i32> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        let s = i64::from(values[mid - 1]) + i64::from(values[mid]);
        Some((s / 2) as i32)
    }
}

fn usable_factor(f: f32) -> bool {
    f.is_finite() && f > 0.0
}

pub struct WeightChannel {
    cell: Box<dyn LoadCell>,
    store: CalibrationStore,
    cfg: ScaleCfg,
    record: CalibrationRecord,
    window: MedianWindow,
    /// Last accepted filtered value; the outlier reference.
    filtered: Option<f32>,
    /// What consumers read: the filtered weight, or 0 after a missed tick.
    current: f32,
    fresh: bool,
    rejected_run: u32,
    reject_anchor: f32,
    last_raw: Option<i32>,
    last_unfiltered: f32,
    raw_history: VecDeque<i32>,
    raw_cap: usize,
    last_conversion_at: u32,
    stable_ref: f32,
    stable_since: u32,
    log: Arc<dyn EventLog + Send + Sync>,
}

impl WeightChannel {
    /// Load the persisted record. A store failure is logged and the
    /// channel starts from defaults.
    pub fn open(
        cell: Box<dyn LoadCell>,
        mut store: CalibrationStore,
        cfg: ScaleCfg,
        log: Arc<dyn EventLog + Send + Sync>,
        now: u32,
    ) -> Self {
        let record = match store.load(cfg.default_factor) {
            Ok(r) => r,
            Err(e) => {
                log.record(ControlEvent::PersistFailed {
                    error: e.to_string(),
                });
                CalibrationRecord::defaults(cfg.default_factor)
            }
        };
        let raw_cap = cfg.factor_samples.max(cfg.median_window).max(1);
        Self {
            cell,
            store,
            cfg,
            record,
            window: MedianWindow::new(cfg.median_window),
            filtered: None,
            current: 0.0,
            fresh: false,
            rejected_run: 0,
            reject_anchor: 0.0,
            last_raw: None,
            last_unfiltered: 0.0,
            raw_history: VecDeque::with_capacity(raw_cap),
            raw_cap,
            last_conversion_at: now,
            stable_ref: 0.0,
            stable_since: now,
            log,
        }
    }

    fn to_grams(&self, raw: i32) -> f32 {
        let net = (i64::from(raw) - i64::from(self.record.tare_offset)) as f32;
        let g = net * self.record.factor;
        if g.is_finite() { g.max(0.0) } else { 0.0 }
    }

    fn mark_missing(&mut self) {
        self.fresh = false;
        self.current = 0.0;
    }

    /// Consume one conversion if the cell has one.
    ///
    /// Returns false when no conversion was available; the reported weight
    /// then reads 0 until the next successful tick. A dropped outlier still
    /// returns true.
    pub fn update(&mut self, now: u32) -> bool {
        if !self.cell.available() {
            self.mark_missing();
            return false;
        }
        let raw = match self.cell.read() {
            Ok(r) => r,
            Err(e) => {
                if !is_not_ready(e.as_ref()) {
                    self.log.record(ControlEvent::SensorReadFailed {
                        error: e.to_string(),
                    });
                }
                self.mark_missing();
                return false;
            }
        };

        self.last_conversion_at = now;
        self.last_raw = Some(raw);
        if self.raw_history.len() == self.raw_cap {
            self.raw_history.pop_front();
        }
        self.raw_history.push_back(raw);

        let grams = self.to_grams(raw);
        self.last_unfiltered = grams;
        self.fresh = true;

        match self.filtered {
            Some(reference) if (grams - reference).abs() > self.cfg.outlier_jump_g => {
                if self.rejected_run > 0
                    && (grams - self.reject_anchor).abs() <= self.cfg.outlier_jump_g
                {
                    self.rejected_run += 1;
                } else {
                    self.rejected_run = 1;
                    self.reject_anchor = grams;
                }
                if self.rejected_run >= self.cfg.outlier_reseed_after {
                    self.window.clear();
                    self.window.push(grams);
                    self.filtered = Some(grams);
                    self.rejected_run = 0;
                    self.log
                        .record(ControlEvent::FilterReseeded { level_g: grams });
                } else {
                    self.log.record(ControlEvent::OutlierDropped {
                        sample_g: grams,
                        filtered_g: reference,
                    });
                }
            }
            _ => {
                self.rejected_run = 0;
                self.window.push(grams);
                self.filtered = self.window.median();
            }
        }

        self.current = self.filtered.unwrap_or(grams);
        if (self.current - self.stable_ref).abs() >= self.cfg.stable_band_g {
            self.stable_ref = self.current;
            self.stable_since = now;
        }
        true
    }

    // ── readings ─────────────────────────────────────────────────────────

    pub fn current_weight(&self) -> f32 {
        self.current
    }

    /// Whether the last `update` produced a conversion.
    pub fn has_fresh_sample(&self) -> bool {
        self.fresh
    }

    /// Raw conversion of this tick, if any.
    pub fn fresh_raw(&self) -> Option<i32> {
        if self.fresh { self.last_raw } else { None }
    }

    /// Last raw conversion ever read.
    pub fn raw_reading(&self) -> Option<i32> {
        self.last_raw
    }

    /// Calibrated value of the last conversion before outlier rejection
    /// and filtering.
    pub fn unfiltered_weight(&self) -> f32 {
        self.last_unfiltered
    }

    /// The weight has stayed within `stable_band_g` for longer than `stable_ms`.
    pub fn is_weight_stable(&self, now: u32) -> bool {
        has_exceeded(now, self.stable_since, self.cfg.stable_ms)
    }

    /// Last accepted filtered weight. Unlike [`current_weight`](Self::current_weight)
    /// it is kept across ticks without a conversion. `None` until the first
    /// conversion after open or a filter restart.
    pub fn last_known_weight(&self) -> Option<f32> {
        self.filtered
    }

    /// Presence judged on [`last_known_weight`](Self::last_known_weight).
    pub fn last_known_presence(&self) -> Option<bool> {
        self.filtered.map(|w| {
            kettle_present(w, self.record.empty_weight_g, self.cfg.kettle_hysteresis_g)
        })
    }

    pub fn is_kettle_present(&self) -> bool {
        kettle_present(
            self.current,
            self.record.empty_weight_g,
            self.cfg.kettle_hysteresis_g,
        )
    }

    /// No conversion for longer than `sensor_timeout_ms`.
    pub fn sensor_silent(&self, now: u32) -> bool {
        has_exceeded(now, self.last_conversion_at, self.cfg.sensor_timeout_ms)
    }

    // ── calibration state ────────────────────────────────────────────────

    /// Fills are allowed only with a calibrated factor.
    pub fn is_ready(&self) -> bool {
        self.record.factor_calibrated
    }

    pub fn is_calibrated(&self) -> bool {
        self.record.calibrated
    }

    pub fn empty_weight(&self) -> f32 {
        self.record.empty_weight_g
    }

    pub fn factor(&self) -> f32 {
        self.record.factor
    }

    pub fn record(&self) -> CalibrationRecord {
        self.record
    }

    pub fn tare_offset(&self) -> i32 {
        self.record.tare_offset
    }

    pub fn config(&self) -> &ScaleCfg {
        &self.cfg
    }

    fn restart_filter(&mut self) {
        self.window.clear();
        self.filtered = None;
        self.rejected_run = 0;
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        self.store.save(&self.record).inspect_err(|e| {
            self.log.record(ControlEvent::PersistFailed {
                error: e.to_string(),
            });
        })
    }

    // ── calibration procedures ───────────────────────────────────────────

    /// Zero the scale on the median of the most recent raw conversions and
    /// persist the offset with the record. Returns false when nothing has
    /// been read yet. A failed commit is logged; the new zero still applies.
    pub fn tare(&mut self) -> bool {
        let n = self.cfg.median_window.max(1);
        let mut recent: Vec<i32> = self.raw_history.iter().rev().take(n).copied().collect();
        let Some(offset) = median_i32(&mut recent) else {
            return false;
        };
        self.record.tare_offset = offset;
        self.restart_filter();
        self.log.record(ControlEvent::TareCompleted { offset });
        let _ = self.persist();
        true
    }

    /// Store `grams` as the empty-kettle weight if it lies strictly inside
    /// the plausible range.
    pub fn calibrate_empty(&mut self, grams: f32) -> Result<(), CalibrationError> {
        let (min, max) = (self.cfg.empty_min_g, self.cfg.empty_max_g);
        if !(grams > min && grams < max) {
            return Err(CalibrationError::InvalidCalibrationWeight { grams, min, max });
        }
        self.record.empty_weight_g = grams;
        self.record.calibrated = true;
        self.log.record(ControlEvent::EmptyWeightCalibrated { grams });
        self.persist()?;
        Ok(())
    }

    /// Derive the factor from the recent raw window with `known_g` on the
    /// scale, apply it and persist it.
    pub fn calibrate_factor(&mut self, known_g: f32) -> Result<f32, CalibrationError> {
        let mut session = FactorCalibration::new(known_g, self.cfg.factor_samples)?;
        let start = self.raw_history.len().saturating_sub(self.cfg.factor_samples);
        for raw in self.raw_history.iter().skip(start) {
            session.feed(*raw);
        }
        let factor = session.propose(self.record.tare_offset)?;
        self.apply_factor(factor)?;
        Ok(factor)
    }

    /// Install a confirmed factor and persist it.
    pub fn apply_factor(&mut self, factor: f32) -> Result<(), CalibrationError> {
        if !usable_factor(factor) {
            return Err(CalibrationError::DegenerateFactor(factor));
        }
        self.record.factor = factor;
        self.record.factor_calibrated = true;
        self.restart_filter();
        self.log.record(ControlEvent::FactorCalibrated { factor });
        self.persist()?;
        Ok(())
    }

    /// Back to factory defaults, in memory and in the store.
    pub fn reset_calibration(&mut self) -> Result<(), StoreError> {
        self.record = CalibrationRecord::defaults(self.cfg.default_factor);
        self.restart_filter();
        self.log.record(ControlEvent::CalibrationReset);
        self.store
            .erase(self.cfg.default_factor)
            .inspect_err(|e| {
                self.log.record(ControlEvent::PersistFailed {
                    error: e.to_string(),
                });
            })
    }

    /// Forget the calibrated factor; the empty weight is kept.
    pub fn reset_factor(&mut self) -> Result<(), StoreError> {
        self.record.factor = self.cfg.default_factor;
        self.record.factor_calibrated = false;
        self.restart_filter();
        self.log.record(ControlEvent::FactorReset);
        self.persist()
    }
}

/// Non-blocking known-mass factor calibration.
///
/// Feed it one raw conversion per tick; once `samples` have arrived,
/// [`propose`](Self::propose) yields the factor. Nothing is applied until
/// the caller hands the value to [`WeightChannel::apply_factor`].
#[derive(Debug, Clone)]
pub struct FactorCalibration {
    known_g: f32,
    wanted: usize,
    sum: i64,
    count: usize,
}

impl FactorCalibration {
    pub fn new(known_g: f32, samples: usize) -> Result<Self, CalibrationError> {
        if !(known_g.is_finite() && known_g > 0.0) {
            return Err(CalibrationError::InvalidKnownWeight(known_g));
        }
        Ok(Self {
            known_g,
            wanted: samples.max(1),
            sum: 0,
            count: 0,
        })
    }

    /// Returns true once enough samples have been collected.
    pub fn feed(&mut self, raw: i32) -> bool {
        if self.count < self.wanted {
            self.sum += i64::from(raw);
            self.count += 1;
        }
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.count >= self.wanted
    }

    pub fn samples(&self) -> usize {
        self.count
    }

    pub fn known_grams(&self) -> f32 {
        self.known_g
    }

    pub fn mean_raw(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum as f64 / self.count as f64)
    }

    /// `known / (mean_raw - offset)` over whatever has been collected.
    pub fn propose(&self, offset: i32) -> Result<f32, CalibrationError> {
        let mean = self.mean_raw().ok_or(CalibrationError::NoSamples)?;
        let net = mean - f64::from(offset);
        let factor = (f64::from(self.known_g) / net) as f32;
        if usable_factor(factor) {
            Ok(factor)
        } else {
            Err(CalibrationError::DegenerateFactor(factor))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_even_window_averages_middle_pair() {
        let mut w = MedianWindow::new(4);
        for v in [10.0, 40.0, 20.0, 30.0] {
            w.push(v);
        }
        assert_eq!(w.median(), Some(25.0));
        w.push(1_000.0);
        assert_eq!(w.len(), 4);
        assert_eq!(w.median(), Some(35.0));
    }

    #[test]
    fn empty_window_has_no_median() {
        assert_eq!(MedianWindow::new(3).median(), None);
    }

    #[test]
    fn factor_session_needs_samples_and_a_positive_mass() {
        assert!(matches!(
            FactorCalibration::new(0.0, 4),
            Err(CalibrationError::InvalidKnownWeight(_))
        ));
        let mut s = FactorCalibration::new(500.0, 4).unwrap();
        assert!(matches!(s.propose(0), Err(CalibrationError::NoSamples)));
        for _ in 0..3 {
            assert!(!s.feed(1_000_000));
        }
        assert!(s.feed(1_000_000));
        assert!(s.feed(5), "extra samples are ignored");
        let f = s.propose(0).unwrap();
        assert!((f - 0.0005).abs() < 1e-9);
    }

    #[test]
    fn factor_below_tare_is_degenerate() {
        let mut s = FactorCalibration::new(500.0, 1).unwrap();
        s.feed(100);
        assert!(matches!(
            s.propose(200),
            Err(CalibrationError::DegenerateFactor(_))
        ));
    }

    #[test]
    fn presence_boundary() {
        assert!(kettle_present(380.0, 400.0, 20.0));
        assert!(!kettle_present(379.9, 400.0, 20.0));
    }
}
