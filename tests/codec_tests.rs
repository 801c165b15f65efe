//! Codec tests: amount decimal rendering/parsing, webcash string round
//! trips, and the secret → public hash relation.

use webcash_wallet::{Amount, Hash256, ParseError, PublicWebcash, SecretWebcash};

const SK_HEX: &str = "0f6a1356f6e00a4f61ce20c1b3dd6218f3aa5fae5b5c220ae930b776fb9ce68e";
// SHA-256 over the 64 hex characters of SK_HEX.
const PK_HEX: &str = "aa7234949bf927c311da719edf92505870524951d151e123c054eade3cc4c7e6";

#[test]
fn test_amount_display() {
    assert_eq!(Amount(0).to_string(), "0");
    assert_eq!(Amount(3_000_000).to_string(), "0.03");
    assert_eq!(Amount(100_000_000).to_string(), "1");
    assert_eq!(Amount(150_000_000).to_string(), "1.5");
    assert_eq!(Amount(1).to_string(), "0.00000001");
    assert_eq!(Amount(-150_000_000).to_string(), "-1.5");
    assert_eq!(Amount(i64::MAX).to_string(), "92233720368.54775807");
}

#[test]
fn test_amount_parse_round_trip() {
    for raw in [
        0,
        1,
        3_000_000,
        100_000_000,
        150_000_000,
        -150_000_000,
        i64::MAX,
    ] {
        let amount = Amount(raw);
        assert_eq!(amount.to_string().parse::<Amount>(), Ok(amount));
    }
}

#[test]
fn test_amount_parse_rejects_deviations() {
    for bad in [
        "", "-", "+1", " 1", "1 ", "01", "1.", ".5", "1..5", "1.123456789", "1e5", "0x10", "1,5",
        "92233720369", "92233720368.54775808",
    ] {
        assert_eq!(bad.parse::<Amount>(), Err(ParseError::BadAmount), "{bad:?}");
    }
}

#[test]
fn test_amount_parse_accepts_zero_forms() {
    assert_eq!("0".parse::<Amount>(), Ok(Amount(0)));
    assert_eq!("0.1".parse::<Amount>(), Ok(Amount(10_000_000)));
    assert_eq!("0.00000001".parse::<Amount>(), Ok(Amount(1)));
}

#[test]
fn test_amount_checked_sum_overflow() {
    assert_eq!(
        Amount::checked_sum([Amount(i64::MAX), Amount(1)]),
        None
    );
    assert_eq!(
        Amount::checked_sum([Amount(2), Amount(3)]),
        Some(Amount(5))
    );
}

#[test]
fn test_secret_webcash_round_trip() {
    let webcash = SecretWebcash {
        sk: SK_HEX.to_owned(),
        amount: Amount(150_000_000),
    };
    let text = webcash.to_string();
    assert_eq!(text, format!("e1.5:secret:{SK_HEX}"));
    assert_eq!(text.parse::<SecretWebcash>().unwrap(), webcash);
}

#[test]
fn test_public_webcash_round_trip() {
    let public = PublicWebcash {
        hash: Hash256::from_hex(PK_HEX).unwrap(),
        amount: Amount(1),
    };
    let text = public.to_string();
    assert_eq!(text, format!("e0.00000001:public:{PK_HEX}"));
    assert_eq!(text.parse::<PublicWebcash>().unwrap(), public);
}

#[test]
fn test_webcash_parse_rejects_deviations() {
    let upper = SK_HEX.to_uppercase();
    for bad in [
        format!("e1:public:{SK_HEX}"),
        format!("E1:secret:{SK_HEX}"),
        format!("1:secret:{SK_HEX}"),
        format!("e01:secret:{SK_HEX}"),
        format!("e1:secret:{upper}"),
        format!("e1:secret:{}", &SK_HEX[..63]),
        format!("e1:secret:{SK_HEX}0"),
        format!("e1:token:{SK_HEX}"),
        "e1:secret".to_owned(),
        String::new(),
    ] {
        assert_eq!(
            bad.parse::<SecretWebcash>(),
            Err(ParseError::BadWebcash),
            "{bad:?}"
        );
    }
    assert!(format!("e1:secret:{SK_HEX}").parse::<PublicWebcash>().is_err());
}

#[test]
fn test_negative_amount_serializes_as_zero() {
    let webcash = SecretWebcash {
        sk: SK_HEX.to_owned(),
        amount: Amount(-5),
    };
    assert_eq!(webcash.to_string(), format!("e0:secret:{SK_HEX}"));
}

#[test]
fn test_public_hash_is_sha256_of_secret_characters() {
    let secret = SecretWebcash {
        sk: SK_HEX.to_owned(),
        amount: Amount(1),
    };
    let public = PublicWebcash::from_secret(&secret);
    assert_eq!(public.hash, Hash256::from_hex(PK_HEX).unwrap());
    assert_eq!(public.hash, Hash256::digest(SK_HEX.as_bytes()));
    assert_eq!(public.amount, secret.amount);
}

#[test]
fn test_hash256_byte_access() {
    let hash = Hash256::from_hex(PK_HEX).unwrap();
    assert_eq!(hash.as_bytes().len(), Hash256::LEN);
    assert_eq!(hash.iter().count(), 32);
    assert_eq!(hash.to_string(), PK_HEX);
    assert_eq!(Hash256::from_slice(hash.as_bytes()), Some(hash));
    assert_eq!(Hash256::from_slice(&[0u8; 31]), None);
}
