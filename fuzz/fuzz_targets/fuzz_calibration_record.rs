#![no_main]
use kettle_core::calibration::{CalibrationRecord, RECORD_LEN};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some(image) = data.get(..RECORD_LEN) else {
        return;
    };
    let Ok(buf) = <[u8; RECORD_LEN]>::try_from(image) else {
        return;
    };
    let rec = CalibrationRecord::decode(&buf, 0.000_42);
    assert!(rec.factor.is_finite() && rec.factor > 0.0);
    assert!(rec.empty_weight_g.is_finite() && rec.empty_weight_g >= 0.0);

    // Whatever decoded must survive a re-encode unchanged.
    let again = CalibrationRecord::decode(&rec.encode(), 0.000_42);
    assert_eq!(again.factor.to_bits(), rec.factor.to_bits());
    assert_eq!(again.factor_calibrated, rec.factor_calibrated);
    assert_eq!(again.tare_offset, rec.tare_offset);
});
