//! Candidate key generation and serialization.
//!
//! [`EntityFactory::new_candidate`] draws a fresh Ed25519 key,
//! [`Candidate::fingerprint`] is its v4 OpenPGP fingerprint, the string
//! that gets scored, and [`EntityFactory::serialize`] renders accepted
//! candidates as armored certificates with a self-signed user ID, passing
//! the private block through the configured [`Encryptor`] if there is one.

pub mod encryptor;
pub mod fingerprint;

pub use encryptor::{EncryptionError, Encryptor, PgpRecipientEncryptor, XChaChaEncryptor};

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ed25519_dalek::SigningKey;
use rand_core::{OsRng, RngCore};
use sequoia_openpgp::packet::key::{Key4, PrimaryRole, SecretParts};
use sequoia_openpgp::packet::signature::SignatureBuilder;
use sequoia_openpgp::packet::{Key, UserID};
use sequoia_openpgp::serialize::SerializeInto;
use sequoia_openpgp::types::{KeyFlags, SignatureType};
use sequoia_openpgp::{Cert, Packet};
use thiserror::Error;

use crate::models::Identity;

#[derive(Debug, Error)]
pub enum EntityError {
    #[error("key material generation failed: {0}")]
    Generation(String),

    #[error("system clock is outside the OpenPGP timestamp range")]
    Clock,

    #[error("OpenPGP encoding failed: {0}")]
    OpenPgp(#[from] anyhow::Error),

    #[error("armored output is not UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("private key encryption failed: {0}")]
    Encryption(#[from] EncryptionError),
}

/// A freshly generated, not yet evaluated key pair.
///
/// Owned by one worker at a time and moved between stages, never shared.
pub struct Candidate {
    key: Key<SecretParts, PrimaryRole>,
    fingerprint: String,
    created_at: u32,
    identity: Arc<Identity>,
}

impl std::fmt::Debug for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Candidate")
            .field("fingerprint", &self.fingerprint)
            .field("created_at", &self.created_at)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl Candidate {
    /// Build a candidate from a known seed. Used for reproducible keys.
    pub fn from_seed(
        seed: [u8; 32],
        created_at: u32,
        identity: Arc<Identity>,
    ) -> Result<Self, EntityError> {
        let signing_key = SigningKey::from_bytes(&seed);
        let ctime = UNIX_EPOCH + Duration::from_secs(u64::from(created_at));
        let key: Key<SecretParts, PrimaryRole> = Key::from(
            Key4::<SecretParts, PrimaryRole>::import_secret_ed25519(signing_key.as_bytes(), ctime)?,
        );
        let fingerprint = fingerprint::of_key(&key);
        Ok(Self {
            key,
            fingerprint,
            created_at,
            identity,
        })
    }

    pub fn created_at(&self) -> u32 {
        self.created_at
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Full 40-character uppercase hex v4 fingerprint.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Certificate made of the primary key, the user ID and its positive
    /// self-certification. Secret material stays attached.
    fn certificate(&self) -> Result<Cert, EntityError> {
        let bare = Cert::from_packets(std::iter::once(Packet::SecretKey(self.key.clone())))?;
        let mut signer = self.key.clone().into_keypair()?;

        let user_id = UserID::from(self.identity.user_id());
        let template = SignatureBuilder::new(SignatureType::PositiveCertification)
            .set_signature_creation_time(self.key.creation_time())?
            .set_key_flags(KeyFlags::empty().set_certification().set_signing())?
            .set_primary_userid(true)?;
        // bind() adds the issuer and issuer fingerprint subpackets
        let binding = user_id.bind(&mut signer, &bare, template)?;

        let packets = vec![
            Packet::SecretKey(self.key.clone()),
            Packet::from(user_id),
            Packet::from(binding),
        ];
        Ok(Cert::from_packets(packets.into_iter())?)
    }
}

/// Armored key blocks of one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmoredKey {
    pub public_key: String,
    /// Armored private block, or its ciphertext when encrypting.
    pub private_key: String,
}

/// Creates candidates for one identity and renders the accepted ones.
#[derive(Clone)]
pub struct EntityFactory {
    identity: Arc<Identity>,
    encryptor: Option<Arc<dyn Encryptor>>,
}

impl std::fmt::Debug for EntityFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityFactory")
            .field("identity", &self.identity)
            .field("encrypting", &self.encryptor.is_some())
            .finish()
    }
}

impl EntityFactory {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity: Arc::new(identity),
            encryptor: None,
        }
    }

    pub fn with_encryptor(mut self, encryptor: Arc<dyn Encryptor>) -> Self {
        self.encryptor = Some(encryptor);
        self
    }

    pub fn is_encrypting(&self) -> bool {
        self.encryptor.is_some()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Generate a new key pair stamped with the current time.
    pub fn new_candidate(&self) -> Result<Candidate, EntityError> {
        let mut seed = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|e| EntityError::Generation(e.to_string()))?;
        let created_at = current_timestamp()?;
        Candidate::from_seed(seed, created_at, Arc::clone(&self.identity))
    }

    /// Render both key blocks. An encryption failure aborts the whole
    /// serialization so the caller can drop the candidate.
    pub fn serialize(&self, candidate: &Candidate) -> Result<ArmoredKey, EntityError> {
        let cert = candidate.certificate()?;
        let public_key = String::from_utf8(cert.armored().to_vec()?)?;
        let mut private_key = String::from_utf8(cert.as_tsk().armored().to_vec()?)?;
        if let Some(encryptor) = &self.encryptor {
            private_key = encryptor.encrypt(&private_key)?;
        }

        Ok(ArmoredKey {
            public_key,
            private_key,
        })
    }
}

fn current_timestamp() -> Result<u32, EntityError> {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| EntityError::Clock)?
        .as_secs();
    u32::try_from(secs).map_err(|_| EntityError::Clock)
}
