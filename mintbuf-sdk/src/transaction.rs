//! Solana legacy transaction codec for Anchor instructions.
//!
//! Only the parts needed to submit `add_to_buffer` are implemented:
//!
//! * Anchor discriminators: `sha256("{namespace}:{name}")[..8]`
//! * Borsh encoding of the instruction arguments (via `borsh` derives)
//! * Legacy message compilation (header, account keys, recent blockhash,
//!   compiled instructions) with compact-u16 length prefixes
//! * Ed25519 signing with the authority keypair
//!
//! The wire format of a signed transaction is:
//!
//! ```text
//! compact_u16(num_signatures) || signature[64]* || message
//! ```

use crate::pubkey::{PUBKEY_BYTES, Pubkey};
use borsh::BorshSerialize;
use ring::signature::{ED25519, Ed25519KeyPair, KeyPair, UnparsedPublicKey};
use std::fmt;
use std::str::FromStr;

/// Maximum serialized size of a transaction accepted by the cluster.
pub const PACKET_DATA_SIZE: usize = 1232;

/// Length of an Ed25519 signature.
pub const SIGNATURE_BYTES: usize = 64;

/// Errors produced while building or signing transactions.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("keypair must be {expected} bytes, got {got}")]
    KeypairLength { expected: usize, got: usize },
    #[error("keypair rejected: public key does not match seed")]
    KeypairRejected,
    #[error("keypair file is not a JSON byte array: {0}")]
    KeypairJson(#[from] serde_json::Error),
    #[error("missing signer for required account {0}")]
    MissingSigner(Pubkey),
    #[error("length {0} does not fit in compact-u16")]
    LengthOverflow(usize),
    #[error("too many accounts in message: {0}")]
    TooManyAccounts(usize),
    #[error("serialized transaction is {0} bytes, limit is {PACKET_DATA_SIZE}")]
    TooLarge(usize),
    #[error("invalid signature encoding: {0}")]
    InvalidSignature(String),
    #[error("instruction encoding failed: {0}")]
    Encoding(#[from] std::io::Error),
}

impl From<ring::error::KeyRejected> for TransactionError {
    fn from(_: ring::error::KeyRejected) -> Self {
        Self::KeypairRejected
    }
}

// ---------------------------------------------------------------------------
// Anchor + Borsh encoding
// ---------------------------------------------------------------------------

/// Compute an Anchor discriminator, e.g. `("global", "add_to_buffer")` for an
/// instruction or `("account", "State")` for an account.
pub fn anchor_discriminator(namespace: &str, name: &str) -> [u8; 8] {
    let preimage = format!("{namespace}:{name}");
    let digest = ring::digest::digest(&ring::digest::SHA256, preimage.as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest.as_ref()[..8]);
    out
}

/// Append `len` as a Solana compact-u16 (7 bits per byte, high bit = more).
pub fn write_compact_u16(out: &mut Vec<u8>, len: usize) -> Result<(), TransactionError> {
    let mut value = u16::try_from(len).map_err(|_| TransactionError::LengthOverflow(len))?;
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return Ok(());
        }
        out.push(byte | 0x80);
    }
}

// ---------------------------------------------------------------------------
// Keys and signatures
// ---------------------------------------------------------------------------

/// An Ed25519 keypair in the Solana CLI layout (`seed[32] || pubkey[32]`).
pub struct Keypair {
    inner: Ed25519KeyPair,
    pubkey: Pubkey,
}

impl Keypair {
    /// Build from the 64-byte `seed || pubkey` layout.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransactionError> {
        if bytes.len() != 2 * PUBKEY_BYTES {
            return Err(TransactionError::KeypairLength {
                expected: 2 * PUBKEY_BYTES,
                got: bytes.len(),
            });
        }
        let (seed, public) = bytes.split_at(PUBKEY_BYTES);
        let inner = Ed25519KeyPair::from_seed_and_public_key(seed, public)?;
        let pubkey = Pubkey::try_from_slice(inner.public_key().as_ref())
            .map_err(|_| TransactionError::KeypairRejected)?;
        Ok(Self { inner, pubkey })
    }

    /// Parse a keypair file as written by `solana-keygen` (a JSON array of
    /// 64 numbers).
    pub fn from_json_array(json: &str) -> Result<Self, TransactionError> {
        let bytes: Vec<u8> = serde_json::from_str(json)?;
        Self::from_bytes(&bytes)
    }

    /// Derive a keypair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, TransactionError> {
        let inner = Ed25519KeyPair::from_seed_unchecked(seed)?;
        let pubkey = Pubkey::try_from_slice(inner.public_key().as_ref())
            .map_err(|_| TransactionError::KeypairRejected)?;
        Ok(Self { inner, pubkey })
    }

    pub fn pubkey(&self) -> Pubkey {
        self.pubkey
    }

    pub fn sign(&self, message: &[u8]) -> TxSignature {
        let sig = self.inner.sign(message);
        let mut out = [0u8; SIGNATURE_BYTES];
        out.copy_from_slice(sig.as_ref());
        TxSignature(out)
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("pubkey", &self.pubkey)
            .finish_non_exhaustive()
    }
}

/// A transaction signature. The first signature of a transaction is its id.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxSignature([u8; SIGNATURE_BYTES]);

impl TxSignature {
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_BYTES] {
        &self.0
    }

    /// Check this signature over `message` against `signer`.
    pub fn verify(&self, signer: &Pubkey, message: &[u8]) -> bool {
        UnparsedPublicKey::new(&ED25519, signer.as_bytes())
            .verify(message, &self.0)
            .is_ok()
    }
}

impl FromStr for TxSignature {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| TransactionError::InvalidSignature(e.to_string()))?;
        let array: [u8; SIGNATURE_BYTES] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| TransactionError::InvalidSignature(format!("{} bytes", bytes.len())))?;
        Ok(Self(array))
    }
}

impl fmt::Display for TxSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for TxSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxSignature({self})")
    }
}

impl serde::Serialize for TxSignature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ---------------------------------------------------------------------------
// Instructions and messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn writable(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    pub fn readonly(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

/// Arguments of the program's `add_to_buffer` instruction, in declaration
/// order.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize)]
pub struct AddToBufferArgs<'a> {
    pub metadata_uri: &'a str,
    pub name: &'a str,
    pub symbol: &'a str,
    pub seller_fee_basis_points: u16,
}

/// Build `add_to_buffer(metadata_uri, name, symbol, seller_fee_basis_points)`
/// with accounts `[state (writable), authority (signer)]`.
pub fn add_to_buffer_instruction(
    program_id: Pubkey,
    state: Pubkey,
    authority: Pubkey,
    args: &AddToBufferArgs<'_>,
) -> Result<Instruction, TransactionError> {
    let mut data = anchor_discriminator("global", "add_to_buffer").to_vec();
    args.serialize(&mut data)?;
    Ok(Instruction {
        program_id,
        accounts: vec![
            AccountMeta::writable(state, false),
            AccountMeta::readonly(authority, true),
        ],
        data,
    })
}

/// A compiled legacy message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub num_required_signatures: u8,
    pub num_readonly_signed: u8,
    pub num_readonly_unsigned: u8,
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: [u8; 32],
    pub instructions: Vec<CompiledInstruction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

impl Message {
    /// Compile `instructions` with `payer` as the fee payer.
    ///
    /// Keys are ordered signer+writable, signer+readonly, writable,
    /// readonly; the payer is always first.
    pub fn compile(
        instructions: &[Instruction],
        payer: Pubkey,
        recent_blockhash: [u8; 32],
    ) -> Result<Self, TransactionError> {
        // (key, is_signer, is_writable), merged by key.
        let mut metas: Vec<(Pubkey, bool, bool)> = vec![(payer, true, true)];
        let mut merge = |key: Pubkey, signer: bool, writable: bool| {
            match metas.iter_mut().find(|(k, _, _)| *k == key) {
                Some(entry) => {
                    entry.1 |= signer;
                    entry.2 |= writable;
                }
                None => metas.push((key, signer, writable)),
            }
        };
        for ix in instructions {
            for meta in &ix.accounts {
                merge(meta.pubkey, meta.is_signer, meta.is_writable);
            }
        }
        for ix in instructions {
            merge(ix.program_id, false, false);
        }

        // Stable sort keeps the payer first among signer+writable keys.
        metas.sort_by_key(|(_, signer, writable)| match (signer, writable) {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        });
        if metas.len() > usize::from(u8::MAX) {
            return Err(TransactionError::TooManyAccounts(metas.len()));
        }

        let count = |f: fn(&(Pubkey, bool, bool)) -> bool| metas.iter().filter(|m| f(m)).count() as u8;
        let num_required_signatures = count(|m| m.1);
        let num_readonly_signed = count(|m| m.1 && !m.2);
        let num_readonly_unsigned = count(|m| !m.1 && !m.2);
        let account_keys: Vec<Pubkey> = metas.into_iter().map(|(k, _, _)| k).collect();

        let index_of = |key: &Pubkey| -> u8 {
            // Every key was merged above, and the list fits in a u8.
            account_keys.iter().position(|k| k == key).unwrap_or_default() as u8
        };
        let instructions = instructions
            .iter()
            .map(|ix| CompiledInstruction {
                program_id_index: index_of(&ix.program_id),
                accounts: ix.accounts.iter().map(|m| index_of(&m.pubkey)).collect(),
                data: ix.data.clone(),
            })
            .collect();

        Ok(Self {
            num_required_signatures,
            num_readonly_signed,
            num_readonly_unsigned,
            account_keys,
            recent_blockhash,
            instructions,
        })
    }

    pub fn serialize(&self) -> Result<Vec<u8>, TransactionError> {
        let mut out = vec![
            self.num_required_signatures,
            self.num_readonly_signed,
            self.num_readonly_unsigned,
        ];
        write_compact_u16(&mut out, self.account_keys.len())?;
        for key in &self.account_keys {
            out.extend_from_slice(key.as_bytes());
        }
        out.extend_from_slice(&self.recent_blockhash);
        write_compact_u16(&mut out, self.instructions.len())?;
        for ix in &self.instructions {
            out.push(ix.program_id_index);
            write_compact_u16(&mut out, ix.accounts.len())?;
            out.extend_from_slice(&ix.accounts);
            write_compact_u16(&mut out, ix.data.len())?;
            out.extend_from_slice(&ix.data);
        }
        Ok(out)
    }

    /// Keys that must sign, in signature order.
    pub fn signer_keys(&self) -> &[Pubkey] {
        &self.account_keys[..usize::from(self.num_required_signatures)]
    }
}

/// A fully signed transaction, ready for `sendTransaction`.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub signatures: Vec<TxSignature>,
    pub message: Message,
    message_bytes: Vec<u8>,
}

impl Transaction {
    /// Sign `message` with `signers`; every required signer must be present.
    pub fn sign(message: Message, signers: &[&Keypair]) -> Result<Self, TransactionError> {
        let message_bytes = message.serialize()?;
        let signatures = message
            .signer_keys()
            .iter()
            .map(|key| {
                signers
                    .iter()
                    .find(|kp| kp.pubkey() == *key)
                    .map(|kp| kp.sign(&message_bytes))
                    .ok_or(TransactionError::MissingSigner(*key))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            signatures,
            message,
            message_bytes,
        })
    }

    /// The transaction id (first signature).
    pub fn id(&self) -> Option<TxSignature> {
        self.signatures.first().copied()
    }

    pub fn message_bytes(&self) -> &[u8] {
        &self.message_bytes
    }

    pub fn serialize(&self) -> Result<Vec<u8>, TransactionError> {
        let mut out = Vec::with_capacity(PACKET_DATA_SIZE);
        write_compact_u16(&mut out, self.signatures.len())?;
        for sig in &self.signatures {
            out.extend_from_slice(sig.as_bytes());
        }
        out.extend_from_slice(&self.message_bytes);
        if out.len() > PACKET_DATA_SIZE {
            return Err(TransactionError::TooLarge(out.len()));
        }
        Ok(out)
    }

    /// Padded standard base64, the `sendTransaction` wire encoding.
    pub fn to_base64(&self) -> Result<String, TransactionError> {
        Ok(fast32::base64::RFC4648.encode(&self.serialize()?))
    }
}
