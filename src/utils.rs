//! Utility functions shared by the tool handlers

use std::str::FromStr;
use std::sync::OnceLock;

use ethers_core::types::Address;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Number, Value};
use validator::{Validate, ValidationError};

use crate::error::ToolError;

/// Deserializes tool arguments into `T` and runs its validation rules.
///
/// A missing arguments object is treated as `{}` so that tools without
/// required parameters can be called bare.
pub fn parse_params<T>(args: Value) -> Result<T, ToolError>
where
    T: DeserializeOwned + Validate,
{
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    let params: T = serde_json::from_value(args).map_err(|e| ToolError::invalid(e.to_string()))?;
    params
        .validate()
        .map_err(|e| ToolError::invalid(e.to_string()))?;
    Ok(params)
}

/// Seconds since the Unix epoch, used for every signed time field.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Renders a numeric parameter for a query string. Integral values print
/// without a fractional part, so `1700000000.0` becomes `1700000000`.
pub fn number_param(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Validator for `0x`-prefixed 20-byte hex addresses.
pub fn validate_evm_address(address: &str) -> Result<(), ValidationError> {
    if is_evm_address(address) {
        Ok(())
    } else {
        let mut err = ValidationError::new("evm_address");
        err.message = Some("must be a 0x-prefixed 40 character hex address".into());
        Err(err)
    }
}

pub fn is_evm_address(address: &str) -> bool {
    address.len() == 42 && address.starts_with("0x") && Address::from_str(address).is_ok()
}

/// Returns the first `0x` + 40 hex digit match in free text, as a regex
/// scan would: a longer hex run yields its leading 40 digits.
pub fn find_evm_address(text: &str) -> Option<String> {
    static ADDRESS: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = ADDRESS
        .get_or_init(|| Regex::new(r"0x[0-9a-fA-F]{40}").ok())
        .as_ref()?;
    pattern.find(text).map(|m| m.as_str().to_string())
}

/// Case-insensitive address comparison.
pub fn same_address(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finds_address_inside_error_text() {
        let text = "WALLET_EXISTS: wallet 0x52908400098527886E0F7030069857D2E4169EE7 already stored";
        assert_eq!(
            find_evm_address(text).as_deref(),
            Some("0x52908400098527886E0F7030069857D2E4169EE7")
        );
    }

    #[test]
    fn ignores_short_hex_runs() {
        assert_eq!(find_evm_address("tx 0xdeadbeef failed"), None);
        assert_eq!(find_evm_address("no address here"), None);
    }

    #[test]
    fn long_hex_run_yields_its_leading_address() {
        let text = format!("WALLET_EXISTS: wallet=0x{}{}", "a".repeat(40), "b");
        assert_eq!(find_evm_address(&text), Some(format!("0x{}", "a".repeat(40))));

        let hash = format!("0x{}", "c".repeat(64));
        assert_eq!(find_evm_address(&hash), Some(format!("0x{}", "c".repeat(40))));
    }

    #[test]
    fn first_of_several_addresses_wins() {
        let text = format!("0x{} then 0x{}", "1".repeat(40), "2".repeat(40));
        assert_eq!(find_evm_address(&text), Some(format!("0x{}", "1".repeat(40))));
    }

    #[test]
    fn numeric_params_render_like_js() {
        let render = |v: Value| number_param(&serde_json::from_value::<Number>(v).unwrap());
        assert_eq!(render(json!(1700000000)), "1700000000");
        assert_eq!(render(json!(1700000000.0)), "1700000000");
        assert_eq!(render(json!(1700003600.5)), "1700003600.5");
        assert_eq!(render(json!(-3)), "-3");
    }

    #[test]
    fn address_validation() {
        assert!(is_evm_address("0x52908400098527886e0f7030069857d2e4169ee7"));
        assert!(!is_evm_address("52908400098527886e0f7030069857d2e4169ee7"));
        assert!(!is_evm_address("0x1234"));
        assert!(!is_evm_address("0xzz908400098527886e0f7030069857d2e4169ee7"));
    }
}
