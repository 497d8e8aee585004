//! Ethereum-style addresses for secp256k1 public keys

use alloy_primitives::{Address, keccak256};
use k256::{PublicKey, elliptic_curve::sec1::ToEncodedPoint};

/// Derive the address of a SEC1-encoded secp256k1 public key.
///
/// Accepts 65-byte uncompressed and 33-byte compressed points. Returns `None` for any
/// other encoding or for bytes that are not a point on the curve.
pub fn key_address(pubkey: &[u8]) -> Option<Address> {
    match pubkey.len() {
        65 if pubkey[0] == 0x04 => Some(address_of_uncompressed(pubkey)),
        33 => {
            let point = PublicKey::from_sec1_bytes(pubkey).ok()?.to_encoded_point(false);
            Some(address_of_uncompressed(point.as_bytes()))
        }
        _ => None,
    }
}

fn address_of_uncompressed(pubkey: &[u8]) -> Address {
    Address::from_slice(&keccak256(&pubkey[1..])[12..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, hex};

    // secp256k1 generator point, the public key of secret key 1
    const G_UNCOMPRESSED: [u8; 65] = hex!(
        "0479be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        "483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8"
    );
    const G_COMPRESSED: [u8; 33] =
        hex!("0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798");

    #[test]
    fn test_uncompressed_key_address() {
        assert_eq!(
            key_address(&G_UNCOMPRESSED),
            Some(address!("0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"))
        );
    }

    #[test]
    fn test_compressed_matches_uncompressed() {
        assert_eq!(key_address(&G_COMPRESSED), key_address(&G_UNCOMPRESSED));
    }

    #[test]
    fn test_unsupported_encodings() {
        assert_eq!(key_address(&[0x04; 64]), None);
        assert_eq!(key_address(&[0x05; 65]), None);
        // x coordinate above the field modulus
        let mut off_curve = [0xff; 33];
        off_curve[0] = 0x02;
        assert_eq!(key_address(&off_curve), None);
    }
}
