use common_crypto::proxy_hash;
use common_money::NormalizedMoney;

/// Integrity hash binding the proxy key, request number and amount to the cent.
///
/// `base64(md5(proxy_key || request_number || amount))` with the amount rendered
/// as `0.00`. Recomputed for every request.
pub fn sign(proxy_key: &str, request_number: &str, amount: &NormalizedMoney) -> String {
    let amount = amount.to_string();
    proxy_hash(&[proxy_key, request_number, &amount])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_documentation_vector() {
        let amount = NormalizedMoney::parse("142.9").unwrap();
        assert_eq!(sign("665916ba-1505-41bc-97f4-895ef7", "F-2291099", &amount), "78fWArE8O2uhENbaEjzT+g==");
    }

    #[test]
    fn amount_is_rendered_with_two_decimals() {
        let amount = NormalizedMoney::parse("100").unwrap();
        assert_eq!(sign("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "ubc-1-7", &amount), "VntJp2hiLYwoKdpx3cSp5Q==");
        let amount = NormalizedMoney::parse("442.1").unwrap();
        assert_eq!(sign("0123456789abcdef0123456789abcd", "ubc-3-1", &amount), "QHstg0WxenxVdYMiaUvRSw==");
    }

    #[test]
    fn cent_changes_change_the_hash() {
        let key = "0123456789abcdef0123456789abcd";
        let a = sign(key, "ubc-3-1", &NormalizedMoney::from_cents(44210));
        let b = sign(key, "ubc-3-1", &NormalizedMoney::from_cents(44211));
        assert_ne!(a, b);
    }
}
