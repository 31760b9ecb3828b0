#![no_main]
use doorctl_core::CalibrationRecord;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Stored bytes come from flash or disk and may be anything.
    if let Ok(rec) = CalibrationRecord::decode(data) {
        assert!(rec.validate().is_ok());
        assert_eq!(CalibrationRecord::decode(&rec.encode()), Ok(rec));
    }
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(rec) = text.parse::<CalibrationRecord>() {
            assert!(!rec.open.intersects(&rec.closed));
        }
    }
});
