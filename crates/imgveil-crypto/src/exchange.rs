//! Ephemeral P-256 key agreement.
//!
//! The server holds one [`EphemeralKeyPair`] per session and the client
//! generates its own. Each side runs ECDH with the other's public key and
//! feeds the x-coordinate through HKDF to reach the same chunk key. Only
//! public keys are ever transmitted.

use p256::PublicKey;
use p256::ecdh::EphemeralSecret;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::cipher::ChunkCipher;
use crate::error::CryptoError;
use crate::kdf::derive_chunk_key;

/// Length of an uncompressed SEC1 P-256 point.
pub const PUBLIC_KEY_SIZE: usize = 65;

/// Length of the raw ECDH shared secret.
pub const SHARED_SECRET_SIZE: usize = 32;

/// An ephemeral P-256 key pair.
pub struct EphemeralKeyPair {
    secret: EphemeralSecret,
    public: PublicKey,
}

impl Default for EphemeralKeyPair {
    fn default() -> Self {
        Self::generate()
    }
}

impl std::fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralKeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

impl EphemeralKeyPair {
    /// Generate a fresh key pair from the OS RNG.
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random(&mut OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Uncompressed SEC1 encoding of our public key (`0x04 || X || Y`),
    /// the same layout WebCrypto exports as `raw`.
    pub fn public_bytes(&self) -> Vec<u8> {
        self.public.to_encoded_point(false).as_bytes().to_vec()
    }

    /// Run ECDH against a peer public key in SEC1 form (compressed or
    /// uncompressed).
    pub fn shared_secret(
        &self,
        peer_public: &[u8],
    ) -> Result<Zeroizing<[u8; SHARED_SECRET_SIZE]>, CryptoError> {
        let peer = parse_public_key(peer_public)?;
        let shared = self.secret.diffie_hellman(&peer);
        let mut out = Zeroizing::new([0u8; SHARED_SECRET_SIZE]);
        out.copy_from_slice(shared.raw_secret_bytes());
        Ok(out)
    }

    /// Complete the agreement and return a cipher keyed for this peer.
    pub fn agree(&self, peer_public: &[u8]) -> Result<ChunkCipher, CryptoError> {
        let secret = self.shared_secret(peer_public)?;
        let key = derive_chunk_key(secret.as_slice())?;
        Ok(ChunkCipher::new(&key))
    }
}

fn parse_public_key(bytes: &[u8]) -> Result<PublicKey, CryptoError> {
    PublicKey::from_sec1_bytes(bytes).map_err(|_| {
        CryptoError::InvalidKeyMaterial(format!(
            "expected a P-256 SEC1 point, got {} bytes",
            bytes.len()
        ))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn public_key_is_uncompressed_sec1() {
        let kp = EphemeralKeyPair::generate();
        let public = kp.public_bytes();
        assert_eq!(public.len(), PUBLIC_KEY_SIZE);
        assert_eq!(public[0], 0x04);
    }

    #[test]
    fn ecdh_shared_secret_is_symmetric() {
        let server = EphemeralKeyPair::generate();
        let client = EphemeralKeyPair::generate();

        let s = server.shared_secret(&client.public_bytes()).unwrap();
        let c = client.shared_secret(&server.public_bytes()).unwrap();

        assert_eq!(*s, *c);
    }

    #[test]
    fn both_sides_derive_identical_keys() {
        let server = EphemeralKeyPair::generate();
        let client = EphemeralKeyPair::generate();

        let s = derive_chunk_key(server.shared_secret(&client.public_bytes()).unwrap().as_slice())
            .unwrap();
        let c = derive_chunk_key(client.shared_secret(&server.public_bytes()).unwrap().as_slice())
            .unwrap();

        assert_eq!(s.as_bytes(), c.as_bytes());
    }

    #[test]
    fn agreed_ciphers_interoperate() {
        let server = EphemeralKeyPair::generate();
        let client = EphemeralKeyPair::generate();

        let server_cipher = server.agree(&client.public_bytes()).unwrap();
        let client_cipher = client.agree(&server.public_bytes()).unwrap();

        let sealed = server_cipher.encrypt(b"chunk zero").unwrap();
        assert_eq!(client_cipher.open(&sealed).unwrap(), b"chunk zero");
    }

    #[test]
    fn shared_secret_is_repeatable() {
        let server = EphemeralKeyPair::generate();
        let client = EphemeralKeyPair::generate();
        let peer = client.public_bytes();

        let first = server.shared_secret(&peer).unwrap();
        let second = server.shared_secret(&peer).unwrap();
        assert_eq!(*first, *second);
    }

    #[test]
    fn compressed_peer_key_is_accepted() {
        let server = EphemeralKeyPair::generate();
        let client = EphemeralKeyPair::generate();

        let compressed = PublicKey::from_sec1_bytes(&client.public_bytes())
            .unwrap()
            .to_encoded_point(true);
        assert_eq!(compressed.as_bytes().len(), 33);

        let a = server.shared_secret(compressed.as_bytes()).unwrap();
        let b = server.shared_secret(&client.public_bytes()).unwrap();
        assert_eq!(*a, *b);
    }

    #[test]
    fn different_clients_get_different_keys() {
        let server = EphemeralKeyPair::generate();
        let a = EphemeralKeyPair::generate();
        let b = EphemeralKeyPair::generate();

        let sa = server.shared_secret(&a.public_bytes()).unwrap();
        let sb = server.shared_secret(&b.public_bytes()).unwrap();
        assert_ne!(*sa, *sb);
    }

    #[test]
    fn wrong_length_key_is_rejected() {
        let server = EphemeralKeyPair::generate();
        let result = server.agree(&[0x04u8; 16]);
        assert!(matches!(result, Err(CryptoError::InvalidKeyMaterial(_))));
    }

    #[test]
    fn off_curve_point_is_rejected() {
        let server = EphemeralKeyPair::generate();
        let mut bogus = vec![0x04u8];
        bogus.extend_from_slice(&[0xFFu8; 64]);
        let result = server.shared_secret(&bogus);
        assert!(matches!(result, Err(CryptoError::InvalidKeyMaterial(_))));
    }

    #[test]
    fn empty_key_is_rejected() {
        let server = EphemeralKeyPair::generate();
        assert!(matches!(
            server.shared_secret(&[]),
            Err(CryptoError::InvalidKeyMaterial(_))
        ));
    }
}
