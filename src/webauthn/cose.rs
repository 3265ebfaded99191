//! Credential public keys.
//!
//! WebAuthn registrations store the key as a COSE_Key CBOR map. Keys migrated
//! from the old U2F registration flow are raw uncompressed P-256 points
//! (`0x04 | x | y`, 65 bytes). Both decode into a [`PublicKey`].

use ciborium::value::Value;
use p256::ecdsa::{signature::Verifier as _, Signature as P256Signature, VerifyingKey as P256VerifyingKey};
use rsa::pkcs1v15::{Signature as RsaSignature, VerifyingKey as RsaVerifyingKey};
use rsa::{BigUint, RsaPublicKey};
use sha2::Sha256;

const KTY: i128 = 1;
const ALG: i128 = 3;
const EC2_CRV: i128 = -1;
const EC2_X: i128 = -2;
const EC2_Y: i128 = -3;
const RSA_N: i128 = -1;
const RSA_E: i128 = -2;

const KTY_EC2: i128 = 2;
const KTY_RSA: i128 = 3;
const ALG_ES256: i128 = -7;
const ALG_RS256: i128 = -257;
const CRV_P256: i128 = 1;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("public key is not valid CBOR")]
    Cbor,
    #[error("public key is missing field {0}")]
    MissingField(i128),
    #[error("unsupported key type kty={kty} alg={alg}")]
    Unsupported { kty: i128, alg: i128 },
    #[error("public key material is invalid")]
    InvalidKey,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature encoding is invalid")]
    Encoding,
    #[error("signature does not verify")]
    Mismatch,
}

#[derive(Debug, Clone)]
pub enum PublicKey {
    /// ES256
    P256(P256VerifyingKey),
    /// RS256
    Rsa(RsaPublicKey),
}

impl PublicKey {
    pub fn from_stored(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() == 65 && bytes[0] == 0x04 {
            let vk = P256VerifyingKey::from_sec1_bytes(bytes).map_err(|_| KeyError::InvalidKey)?;
            return Ok(PublicKey::P256(vk));
        }
        Self::from_cose(bytes)
    }

    pub fn from_cose(bytes: &[u8]) -> Result<Self, KeyError> {
        let value: Value = ciborium::from_reader(bytes).map_err(|_| KeyError::Cbor)?;
        let map = value.as_map().ok_or(KeyError::Cbor)?;

        let kty = map_get_int(map, KTY).ok_or(KeyError::MissingField(KTY))?;
        let alg = map_get_int(map, ALG).ok_or(KeyError::MissingField(ALG))?;

        match (kty, alg) {
            (KTY_EC2, ALG_ES256) => {
                let crv = map_get_int(map, EC2_CRV).ok_or(KeyError::MissingField(EC2_CRV))?;
                if crv != CRV_P256 {
                    return Err(KeyError::Unsupported { kty, alg });
                }
                let x = map_get_bytes(map, EC2_X).ok_or(KeyError::MissingField(EC2_X))?;
                let y = map_get_bytes(map, EC2_Y).ok_or(KeyError::MissingField(EC2_Y))?;
                if x.len() != 32 || y.len() != 32 {
                    return Err(KeyError::InvalidKey);
                }

                let mut point = Vec::with_capacity(65);
                point.push(0x04);
                point.extend_from_slice(x);
                point.extend_from_slice(y);

                let vk = P256VerifyingKey::from_sec1_bytes(&point).map_err(|_| KeyError::InvalidKey)?;
                Ok(PublicKey::P256(vk))
            }
            (KTY_RSA, ALG_RS256) => {
                let n = map_get_bytes(map, RSA_N).ok_or(KeyError::MissingField(RSA_N))?;
                let e = map_get_bytes(map, RSA_E).ok_or(KeyError::MissingField(RSA_E))?;
                let key = RsaPublicKey::new(BigUint::from_bytes_be(n), BigUint::from_bytes_be(e))
                    .map_err(|_| KeyError::InvalidKey)?;
                Ok(PublicKey::Rsa(key))
            }
            _ => Err(KeyError::Unsupported { kty, alg }),
        }
    }

    /// Verify `signature` over `message`. Both algorithms hash with SHA-256.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), SignatureError> {
        match self {
            PublicKey::P256(vk) => {
                let sig = P256Signature::from_der(signature).map_err(|_| SignatureError::Encoding)?;
                vk.verify(message, &sig).map_err(|_| SignatureError::Mismatch)
            }
            PublicKey::Rsa(key) => {
                let vk = RsaVerifyingKey::<Sha256>::new(key.clone());
                let sig = RsaSignature::try_from(signature).map_err(|_| SignatureError::Encoding)?;
                vk.verify(message, &sig).map_err(|_| SignatureError::Mismatch)
            }
        }
    }
}

fn map_get_int(map: &[(Value, Value)], key: i128) -> Option<i128> {
    map.iter().find_map(|(k, v)| match (k, v) {
        (Value::Integer(ki), Value::Integer(vi)) if i128::from(*ki) == key => Some(i128::from(*vi)),
        _ => None,
    })
}

fn map_get_bytes(map: &[(Value, Value)], key: i128) -> Option<&[u8]> {
    map.iter().find_map(|(k, v)| match (k, v) {
        (Value::Integer(ki), Value::Bytes(b)) if i128::from(*ki) == key => Some(b.as_slice()),
        _ => None,
    })
}
