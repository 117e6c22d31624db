use proxypay::config::{Environment, ProxypaySettings, DEFAULT_REFERENCE_UUID_KEY, SANDBOX_BASE_URL};
use proxypay::fees::ReferenceFees;
use rust_decimal_macros::dec;
use std::collections::HashMap;

fn load(pairs: &[(&str, &str)]) -> ProxypaySettings {
    let env: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ProxypaySettings::from_lookup(|k| env.get(k).cloned()).expect("settings")
}

#[test]
fn defaults_apply_when_only_credentials_are_set() {
    let s = load(&[("PROXYPAY_PRIVATE_KEY", "k"), ("PROXYPAY_ENTITY", "10001")]);
    assert_eq!(s.environment, Environment::Production);
    assert_eq!(s.reference_lifetime_days, 1);
    assert_eq!(s.reference_uuid_key, DEFAULT_REFERENCE_UUID_KEY);
    assert!(!s.accept_unrecognized_payment);
    assert_eq!(s.proxypay_fee.percentage, dec!(0.5));
    assert_eq!(s.proxypay_fee.min_amount, dec!(50));
    assert_eq!(s.proxypay_fee.max_amount, dec!(1000));
    assert_eq!(s.bank_fee.percentage, dec!(0));
}

#[test]
fn sandbox_uses_sandbox_base_url() {
    let s = load(&[
        ("PROXYPAY_PRIVATE_KEY", "k"),
        ("PROXYPAY_ENTITY", "10001"),
        ("PROXYPAY_ENV", "sandbox"),
    ]);
    assert_eq!(s.base_url(), SANDBOX_BASE_URL);
}

#[test]
fn configured_schedules_drive_reference_fees() {
    let s = load(&[
        ("PROXYPAY_PRIVATE_KEY", "k"),
        ("PROXYPAY_ENTITY", "10001"),
        ("PROXYPAY_FEE_PERCENTAGE", "1"),
        ("PROXYPAY_FEE_MIN_AMOUNT", "0"),
        ("PROXYPAY_FEE_MAX_AMOUNT", "0"),
        ("PROXYPAY_BANK_FEE_NAME", "BAI"),
        ("PROXYPAY_BANK_FEE_PERCENTAGE", "0.25"),
        ("PROXYPAY_BANK_FEE_MIN_AMOUNT", "100"),
    ]);

    let fees = ReferenceFees::compute(dec!(20000), &s.proxypay_fee, &s.bank_fee);
    assert_eq!(fees.proxypay_fee.fee, dec!(200));
    assert_eq!(fees.bank_fee.name.as_deref(), Some("BAI"));
    assert_eq!(fees.bank_fee.fee_amount, dec!(50));
    assert_eq!(fees.bank_fee.fee, dec!(100));
    assert_eq!(fees.bank_fee.applied_min_amount, Some(dec!(100)));
    assert_eq!(fees.fees_expense(), dec!(300));
    assert_eq!(fees.net_amount(), dec!(19700));
}
