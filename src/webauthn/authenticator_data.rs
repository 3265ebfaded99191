//! Parsing of the authenticatorData structure returned with an assertion.
//!
//! Layout (big-endian): `rpIdHash[32] | flags[1] | signCount[4] | ...`.
//! Attested credential data and extensions may follow; an assertion only
//! needs the fixed 37-byte prefix.

/// User present
pub const FLAG_UP: u8 = 0x01;

pub const MIN_LEN: usize = 37;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorData {
    pub rp_id_hash: [u8; 32],
    pub flags: u8,
    pub sign_count: u32,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("authenticator data is {0} bytes, need at least {MIN_LEN}")]
pub struct TruncatedAuthenticatorData(pub usize);

impl AuthenticatorData {
    pub fn parse(data: &[u8]) -> Result<Self, TruncatedAuthenticatorData> {
        if data.len() < MIN_LEN {
            return Err(TruncatedAuthenticatorData(data.len()));
        }

        let mut rp_id_hash = [0u8; 32];
        rp_id_hash.copy_from_slice(&data[..32]);
        let flags = data[32];
        let sign_count = u32::from_be_bytes([data[33], data[34], data[35], data[36]]);

        Ok(Self {
            rp_id_hash,
            flags,
            sign_count,
        })
    }

    pub fn user_present(&self) -> bool {
        self.flags & FLAG_UP != 0
    }
}
