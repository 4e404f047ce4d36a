//! Hybrid RSA/AES artifact cipher
//!
//! Every artifact gets a fresh 128-bit AES session key and IV. The session
//! key is wrapped with the storage public key and stored in front of the
//! ciphertext, so only the holder of the storage private key can read the
//! artifact back.
//!
//! ## Artifact Layout
//!
//! ```text
//! offset 0    : 256 bytes  RSA PKCS#1 v1.5 wrapped session key
//! offset 256  : 16 bytes   IV
//! offset 272  : N bytes    AES-128-CBC ciphertext, PKCS#7 padded
//! ```
//!
//! Bulk data is processed in [`SEGMENT_SIZE`] segments, so memory use is
//! bounded regardless of input size.
//!
//! ## Integrity
//!
//! CBC carries no authentication tag. Flipping a ciphertext byte outside
//! the final two blocks goes undetected and garbles the corresponding
//! plaintext. Only the session key header and the final padding are
//! checked.

use std::path::Path;
use std::sync::Arc;

use aes::Aes128;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument};
use zeroize::Zeroizing;

use crate::error::{CipherFault, CryptoResult};
use crate::keypair::{StorageKeyPair, WRAPPED_KEY_SIZE};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Size of the AES session key in bytes (128 bits)
pub const SESSION_KEY_SIZE: usize = 16;

/// Size of the CBC initialization vector in bytes
pub const IV_SIZE: usize = 16;

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// Size of the artifact header (wrapped key + IV)
pub const HEADER_SIZE: usize = WRAPPED_KEY_SIZE + IV_SIZE;

/// Bulk data is read, transformed and written in segments of this size
pub const SEGMENT_SIZE: usize = 8192;

/// Exact artifact length for a plaintext of the given length
///
/// PKCS#7 always pads, so a plaintext that is already block aligned gains a
/// full padding block.
pub fn artifact_len(plaintext_len: u64) -> u64 {
    HEADER_SIZE as u64 + (plaintext_len / BLOCK_SIZE as u64 + 1) * BLOCK_SIZE as u64
}

/// Byte counts of one encrypt or decrypt pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferStats {
    /// Bytes consumed from the input
    pub input_len: u64,
    /// Bytes written to the output
    pub output_len: u64,
}

/// Hybrid cipher bound to one storage key pair
#[derive(Debug, Clone)]
pub struct HybridCipher {
    keys: Arc<StorageKeyPair>,
}

impl HybridCipher {
    /// Create a cipher using the given key pair
    pub fn new(keys: Arc<StorageKeyPair>) -> Self {
        Self { keys }
    }

    /// The key pair this cipher wraps session keys with
    pub fn keys(&self) -> &Arc<StorageKeyPair> {
        &self.keys
    }

    /// Encrypt everything `reader` yields into an artifact written to `writer`
    pub async fn encrypt_stream<R, W>(&self, mut reader: R, mut writer: W) -> CryptoResult<TransferStats>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut session_key = Zeroizing::new([0u8; SESSION_KEY_SIZE]);
        let mut iv = [0u8; IV_SIZE];
        rand::rng().fill_bytes(&mut *session_key);
        rand::rng().fill_bytes(&mut iv);

        let wrapped = self.keys.wrap_session_key(session_key.as_slice())?;
        writer.write_all(&wrapped).await?;
        writer.write_all(&iv).await?;

        let mut encryptor = Aes128CbcEnc::new_from_slices(session_key.as_slice(), &iv)
            .map_err(|_| CipherFault::InvalidSessionKey(session_key.len()))?;

        // One extra block of headroom for the final padding
        let mut buf = Zeroizing::new(vec![0u8; SEGMENT_SIZE + BLOCK_SIZE]);
        let mut stats = TransferStats {
            input_len: 0,
            output_len: HEADER_SIZE as u64,
        };

        loop {
            let filled = read_full(&mut reader, &mut buf[..SEGMENT_SIZE]).await?;
            stats.input_len += filled as u64;

            if filled < SEGMENT_SIZE {
                let ciphertext = encryptor
                    .encrypt_padded_mut::<Pkcs7>(&mut buf[..], filled)
                    .map_err(|_| CipherFault::BadPadding)?;
                writer.write_all(ciphertext).await?;
                stats.output_len += ciphertext.len() as u64;
                break;
            }

            for block in buf[..SEGMENT_SIZE].chunks_exact_mut(BLOCK_SIZE) {
                encryptor.encrypt_block_mut(GenericArray::from_mut_slice(block));
            }
            writer.write_all(&buf[..SEGMENT_SIZE]).await?;
            stats.output_len += SEGMENT_SIZE as u64;
        }

        writer.flush().await?;
        Ok(stats)
    }

    /// Decrypt an artifact from `reader`, writing the plaintext to `writer`
    ///
    /// The final ciphertext block is held back until end of input so the
    /// padding can be checked and stripped.
    pub async fn decrypt_stream<R, W>(&self, mut reader: R, mut writer: W) -> CryptoResult<TransferStats>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut wrapped = [0u8; WRAPPED_KEY_SIZE];
        let n = read_full(&mut reader, &mut wrapped).await?;
        if n < WRAPPED_KEY_SIZE {
            return Err(CipherFault::TruncatedHeader {
                expected: HEADER_SIZE,
                actual: n,
            }
            .into());
        }

        let mut iv = [0u8; IV_SIZE];
        let n = read_full(&mut reader, &mut iv).await?;
        if n < IV_SIZE {
            return Err(CipherFault::TruncatedHeader {
                expected: HEADER_SIZE,
                actual: WRAPPED_KEY_SIZE + n,
            }
            .into());
        }

        let session_key = self.keys.unwrap_session_key(&wrapped)?;
        if session_key.len() != SESSION_KEY_SIZE {
            return Err(CipherFault::InvalidSessionKey(session_key.len()).into());
        }

        let mut decryptor = Aes128CbcDec::new_from_slices(&session_key, &iv)
            .map_err(|_| CipherFault::InvalidSessionKey(session_key.len()))?;

        let mut buf = Zeroizing::new(vec![0u8; SEGMENT_SIZE + BLOCK_SIZE]);
        // Bytes carried over from the previous segment (0 or one block)
        let mut pending = 0usize;
        let mut stats = TransferStats {
            input_len: HEADER_SIZE as u64,
            output_len: 0,
        };

        loop {
            let filled = read_full(&mut reader, &mut buf[pending..pending + SEGMENT_SIZE]).await?;
            stats.input_len += filled as u64;
            let available = pending + filled;

            if filled < SEGMENT_SIZE {
                if available == 0 || available % BLOCK_SIZE != 0 {
                    return Err(CipherFault::IllegalBlockSize(stats.input_len - HEADER_SIZE as u64).into());
                }
                let plaintext = decryptor
                    .decrypt_padded_mut::<Pkcs7>(&mut buf[..available])
                    .map_err(|_| CipherFault::BadPadding)?;
                writer.write_all(plaintext).await?;
                stats.output_len += plaintext.len() as u64;
                break;
            }

            let ready = available - BLOCK_SIZE;
            for block in buf[..ready].chunks_exact_mut(BLOCK_SIZE) {
                decryptor.decrypt_block_mut(GenericArray::from_mut_slice(block));
            }
            writer.write_all(&buf[..ready]).await?;
            stats.output_len += ready as u64;

            buf.copy_within(ready..available, 0);
            pending = BLOCK_SIZE;
        }

        writer.flush().await?;
        Ok(stats)
    }

    /// Encrypt the file at `plain_path` into a new artifact at `out_path`
    ///
    /// The output is synced to disk before returning.
    #[instrument(skip_all, fields(plain = %plain_path.display(), out = %out_path.display()))]
    pub async fn encrypt_file(&self, plain_path: &Path, out_path: &Path) -> CryptoResult<TransferStats> {
        let reader = File::open(plain_path).await?;
        let mut writer = File::create(out_path).await?;

        let stats = self.encrypt_stream(reader, &mut writer).await?;
        writer.sync_all().await?;

        debug!(
            plaintext_len = stats.input_len,
            artifact_len = stats.output_len,
            "Encrypted artifact"
        );
        Ok(stats)
    }

    /// Decrypt the artifact at `enc_path` into a plaintext file at `out_path`
    #[instrument(skip_all, fields(artifact = %enc_path.display(), out = %out_path.display()))]
    pub async fn decrypt_file(&self, enc_path: &Path, out_path: &Path) -> CryptoResult<TransferStats> {
        let reader = File::open(enc_path).await?;
        let mut writer = File::create(out_path).await?;

        let stats = self.decrypt_stream(reader, &mut writer).await?;

        debug!(
            artifact_len = stats.input_len,
            plaintext_len = stats.output_len,
            "Decrypted artifact"
        );
        Ok(stats)
    }
}

/// Read until `buf` is full or the reader is exhausted
///
/// Returns the number of bytes read; less than `buf.len()` only at end of
/// input.
pub async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
