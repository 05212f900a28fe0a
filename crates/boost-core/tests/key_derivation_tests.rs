//! Key derivation against fixed and mock reports

use std::sync::Arc;
use std::thread;

use boost_core::{
    format_address_hex, parse_address_hex, ErrorCode, KeyDerivationEngine, KeyResult,
};
use boost_tdx::{
    AttestationClient, MockAttestation, MockFailure, Report, Result as TdxResult, DIGEST_LEN,
    REPORT_DATA_LEN,
};
use proptest::prelude::*;

/// Backend whose reports always carry the same report data.
struct FixedReport {
    report_data: [u8; REPORT_DATA_LEN],
}

impl AttestationClient for FixedReport {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn get_report(&self, _extra_data: &[u8]) -> TdxResult<Report> {
        let mut raw = vec![0u8; 1024];
        raw[128..192].copy_from_slice(&self.report_data);
        Report::from_tdreport(raw)
    }

    fn extend_register(&self, _index: u8, _digest: &[u8; DIGEST_LEN]) -> TdxResult<()> {
        Ok(())
    }

    fn report_to_quote(&self, report: &Report) -> TdxResult<Vec<u8>> {
        Ok(report.as_bytes().to_vec())
    }
}

fn engine_with(report_data: [u8; REPORT_DATA_LEN]) -> KeyDerivationEngine {
    KeyDerivationEngine::new(Arc::new(FixedReport { report_data }))
}

#[test]
fn test_all_zero_report_data() {
    let mut engine = engine_with([0u8; REPORT_DATA_LEN]);
    let result = KeyResult::from(engine.derive());

    assert_eq!(result.status, ErrorCode::Success);
    assert_eq!(
        result.address_hex.as_deref(),
        Some("0x3bd7e02b296758ab2640eef478ac54b9a889c090")
    );
}

#[test]
fn test_hashed_report_data_vector() {
    let mut report_data = [0u8; REPORT_DATA_LEN];
    report_data[..32].fill(0xAB);

    let mut engine = engine_with(report_data);
    assert_eq!(
        engine.address_only().unwrap(),
        "0xdaac54b3221a303e6c7c90cf1513868fe8508553"
    );
    assert!(engine.scratch_is_clear());
}

#[test]
fn test_report_data_changes_the_key() {
    let mut a = engine_with([0u8; REPORT_DATA_LEN]);
    let mut data = [0u8; REPORT_DATA_LEN];
    data[63] = 1;
    let mut b = engine_with(data);

    assert_ne!(a.derive().unwrap().address, b.derive().unwrap().address);
}

#[test]
fn test_scratch_cleared_on_success_and_failure() {
    let mock = Arc::new(MockAttestation::new());
    let mut engine = KeyDerivationEngine::new(mock.clone());

    assert!(engine.derive().is_ok());
    assert!(engine.scratch_is_clear());

    mock.fail_next(MockFailure::Report);
    let result = KeyResult::from(engine.derive());
    assert_eq!(result.status, ErrorCode::TdxReport);
    assert_eq!(result.status.as_i32(), -1);
    assert!(result.public_key.is_none());
    assert!(engine.scratch_is_clear());
}

#[test]
fn test_independent_engines_run_concurrently() {
    let handles: Vec<_> = (0..4)
        .map(|_| {
            thread::spawn(|| {
                let mut engine = KeyDerivationEngine::new(Arc::new(MockAttestation::new()));
                engine.derive().unwrap().address_hex
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(
            handle.join().unwrap(),
            "0x3bd7e02b296758ab2640eef478ac54b9a889c090"
        );
    }
}

#[test]
fn test_result_never_carries_private_key() {
    let mut engine = engine_with([0u8; REPORT_DATA_LEN]);
    let json = serde_json::to_string(&KeyResult::from(engine.derive())).unwrap();
    assert!(!json.contains("799e21d4649dfd6ddf39adaf01f5f1cc0fc9261b1649ee1d26df3ea01e44e684"));
    assert!(!json.contains("private"));
}

proptest! {
    #[test]
    fn address_hex_round_trips(address in any::<[u8; 20]>()) {
        let text = format_address_hex(&address).unwrap();
        prop_assert_eq!(text.len(), 42);
        prop_assert_eq!(parse_address_hex(&text).unwrap(), address);
        prop_assert_eq!(parse_address_hex(&text.to_uppercase()).unwrap(), address);
    }

    #[test]
    fn wrong_length_addresses_rejected(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        prop_assume!(bytes.len() != 20);
        let err = format_address_hex(&bytes).unwrap_err();
        prop_assert_eq!(err.code(), ErrorCode::InvalidParam);
    }
}
