// src/crypto/gcm.rs
//! Incremental AES-256-GCM (NIST SP 800-38D) over arbitrary chunk boundaries
//!
//! The one-shot AEAD APIs need the whole message in memory. Blobs are streamed,
//! so GCM is assembled from its parts: CTR keystream starting at inc32(J0),
//! GHASH over the ciphertext, and the tag mask E(K, J0). No AAD is used.
//!
//! Output is bit-compatible with any standard AES-256-GCM implementation given
//! the same key, 96-bit IV and empty AAD.

use aes::cipher::{BlockEncrypt, KeyInit, KeyIvInit, StreamCipher};
use aes::{Aes256, Block};
use ghash::universal_hash::UniversalHash;
use ghash::GHash;
use subtle::ConstantTimeEq;

use crate::consts::{GCM_MAX_PLAINTEXT, IV_LEN, KEY_LEN, TAG_LEN};
use crate::error::{CoreError, Result};

type Aes256Ctr32 = ctr::Ctr32BE<Aes256>;

const BLOCK_LEN: usize = 16;

struct GcmCore {
    ctr: Aes256Ctr32,
    ghash: GHash,
    tag_mask: Block,
    pending: [u8; BLOCK_LEN],
    pending_len: usize,
    processed: u64,
}

impl GcmCore {
    fn new(key: &[u8; KEY_LEN], iv: &[u8; IV_LEN]) -> Self {
        let cipher = Aes256::new(key.into());

        let mut h = Block::default();
        cipher.encrypt_block(&mut h);
        let ghash = <GHash as KeyInit>::new(&h);

        // J0 = IV || 0^31 || 1
        let mut j0 = [0u8; BLOCK_LEN];
        j0[..IV_LEN].copy_from_slice(iv);
        j0[BLOCK_LEN - 1] = 1;

        let mut tag_mask = Block::from(j0);
        cipher.encrypt_block(&mut tag_mask);

        // Payload keystream starts at inc32(J0)
        let mut counter = j0;
        counter[BLOCK_LEN - 1] = 2;
        let ctr = Aes256Ctr32::new(key.into(), &counter.into());

        Self {
            ctr,
            ghash,
            tag_mask,
            pending: [0u8; BLOCK_LEN],
            pending_len: 0,
            processed: 0,
        }
    }

    fn reserve(&mut self, len: usize) -> Result<()> {
        let next = self
            .processed
            .checked_add(len as u64)
            .ok_or(CoreError::InputTooLarge)?;
        if next > GCM_MAX_PLAINTEXT {
            return Err(CoreError::InputTooLarge);
        }
        self.processed = next;
        Ok(())
    }

    /// Feed ciphertext into GHASH, carrying partial blocks across calls
    fn absorb(&mut self, mut data: &[u8]) {
        if self.pending_len > 0 {
            let take = (BLOCK_LEN - self.pending_len).min(data.len());
            self.pending[self.pending_len..self.pending_len + take].copy_from_slice(&data[..take]);
            self.pending_len += take;
            data = &data[take..];
            if self.pending_len < BLOCK_LEN {
                return;
            }
            self.ghash.update_padded(&self.pending);
            self.pending_len = 0;
        }

        let whole = data.len() - data.len() % BLOCK_LEN;
        if whole > 0 {
            self.ghash.update_padded(&data[..whole]);
        }

        let rest = &data[whole..];
        self.pending[..rest.len()].copy_from_slice(rest);
        self.pending_len = rest.len();
    }

    fn tag(mut self) -> [u8; TAG_LEN] {
        if self.pending_len > 0 {
            self.ghash.update_padded(&self.pending[..self.pending_len]);
        }

        // len(A) || len(C), both in bits; A is always empty
        let mut lengths = [0u8; BLOCK_LEN];
        lengths[8..].copy_from_slice(&(self.processed * 8).to_be_bytes());
        self.ghash.update_padded(&lengths);

        let s = self.ghash.finalize();
        let mut tag = [0u8; TAG_LEN];
        for (i, out) in tag.iter_mut().enumerate() {
            *out = s[i] ^ self.tag_mask[i];
        }
        tag
    }
}

/// Streaming encryptor: the tag only exists once [`finish`](Self::finish) runs
pub struct GcmEncryptor(GcmCore);

impl GcmEncryptor {
    pub fn new(key: &[u8; KEY_LEN], iv: &[u8; IV_LEN]) -> Self {
        Self(GcmCore::new(key, iv))
    }

    /// Encrypt `buf` in place
    pub fn update(&mut self, buf: &mut [u8]) -> Result<()> {
        self.0.reserve(buf.len())?;
        self.0.ctr.apply_keystream(buf);
        self.0.absorb(buf);
        Ok(())
    }

    pub fn finish(self) -> [u8; TAG_LEN] {
        self.0.tag()
    }
}

/// Streaming decryptor bound to the expected tag before any input is consumed
///
/// Plaintext produced by [`update`](Self::update) is unauthenticated until
/// [`finish`](Self::finish) returns `Ok`; callers must stage it accordingly.
pub struct GcmDecryptor {
    core: GcmCore,
    expected_tag: [u8; TAG_LEN],
}

impl GcmDecryptor {
    pub fn new(key: &[u8; KEY_LEN], iv: &[u8; IV_LEN], expected_tag: [u8; TAG_LEN]) -> Self {
        Self {
            core: GcmCore::new(key, iv),
            expected_tag,
        }
    }

    /// Decrypt `buf` in place
    pub fn update(&mut self, buf: &mut [u8]) -> Result<()> {
        self.core.reserve(buf.len())?;
        self.core.absorb(buf);
        self.core.ctr.apply_keystream(buf);
        Ok(())
    }

    pub fn finish(self) -> Result<()> {
        let computed = self.core.tag();
        if bool::from(computed[..].ct_eq(&self.expected_tag[..])) {
            Ok(())
        } else {
            Err(CoreError::CryptoIntegrity)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encrypt_all(key: &[u8; 32], iv: &[u8; 12], data: &[u8], chunk: usize) -> (Vec<u8>, [u8; 16]) {
        let mut out = data.to_vec();
        let mut enc = GcmEncryptor::new(key, iv);
        for piece in out.chunks_mut(chunk.max(1)) {
            enc.update(piece).unwrap();
        }
        (out, enc.finish())
    }

    // NIST GCM test case 13: zero key, zero IV, empty plaintext
    #[test]
    fn test_nist_case_13_empty_plaintext() {
        let (ct, tag) = encrypt_all(&[0u8; 32], &[0u8; 12], b"", 16);
        assert!(ct.is_empty());
        assert_eq!(hex::encode(tag), "530f8afbc74536b9a963b4f1c4cb738b");
    }

    // NIST GCM test case 14: zero key, zero IV, one zero block
    #[test]
    fn test_nist_case_14_single_block() {
        let (ct, tag) = encrypt_all(&[0u8; 32], &[0u8; 12], &[0u8; 16], 16);
        assert_eq!(hex::encode(&ct), "cea7403d4d606b6e074ec5d3baf39d18");
        assert_eq!(hex::encode(tag), "d0d1c8a799996bf0265b98b5d48ab919");
    }

    #[test]
    fn test_chunking_does_not_change_output() {
        let key = [7u8; 32];
        let iv = [9u8; 12];
        let data: Vec<u8> = (0..1000u32).map(|i| (i * 31 % 251) as u8).collect();

        let reference = encrypt_all(&key, &iv, &data, data.len());
        for chunk in [1, 3, 15, 16, 17, 64, 999] {
            assert_eq!(encrypt_all(&key, &iv, &data, chunk), reference, "chunk {chunk}");
        }
    }

    #[test]
    fn test_decryptor_rejects_wrong_tag() {
        let key = [1u8; 32];
        let iv = [2u8; 12];
        let (mut ct, mut tag) = encrypt_all(&key, &iv, b"attack at dawn", 5);
        tag[0] ^= 0x01;

        let mut dec = GcmDecryptor::new(&key, &iv, tag);
        dec.update(&mut ct).unwrap();
        assert!(matches!(dec.finish(), Err(CoreError::CryptoIntegrity)));
    }
}
