use std::io::{Cursor, Read};

use ciborium::value::Value;
use coset::{iana, AsCborValue, CborSerializable, CoseKey, RegisteredLabelWithPrivate};

use crate::{
    authenticator::{Aaguid, Flags},
    crypto::sha256,
};


/// The authenticator data structure encodes contextual bindings made by the authenticator: the RP
/// ID the credential is scoped to, whether the user was present and verified, the signature
/// counter and, at registration, the new credential itself.
///
/// The Relying Party receives it as bytes, both inside the attestation object and as the signed
/// part of an assertion. Parsing keeps the original bytes of the credential public key so they can
/// be stored exactly as the authenticator produced them.
///
/// <https://w3c.github.io/webauthn/#sctn-authenticator-data>
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatorData {
    /// SHA-256 hash of the RP ID the credential is scoped to.
    rp_id_hash: [u8; 32],

    /// The flags representing the information of this credential. See [Flags] for more information.
    pub flags: Flags,

    /// Signature counter, 32-bit unsigned big-endian integer. Authenticators without a counter
    /// always send `0`.
    pub counter: u32,

    /// An optional [AttestedCredentialData], if present, the [Flags::AT] needs to be set to true.
    pub attested_credential_data: Option<AttestedCredentialData>,

    /// Extension-defined authenticator data, a CBOR map. It is only checked to be a map since no
    /// extension is requested.
    pub extensions: Option<Value>,
}

/// Because CoseError does not implement `From` for either `ciborium::de::Error<E>` or `std::io::Error`...
fn io_error<E>(_: E) -> coset::CoseError {
    coset::CoseError::DecodeFailed(ciborium::de::Error::Io(coset::EndOfFile))
}

impl AuthenticatorData {
    /// hash len (32 bytes) + flags (1 byte) + counter (4 bytes)
    const MIN_LEN: usize = 37;

    /// Create a new AuthenticatorData object for an RP ID and a counter, with no flags set.
    pub fn new(rp_id: &str, counter: u32) -> Self {
        Self {
            rp_id_hash: sha256(rp_id.as_bytes()),
            flags: Flags::default(),
            counter,
            attested_credential_data: None,
            extensions: None,
        }
    }

    /// Add an [`AttestedCredentialData`] to the authenticator data.
    ///
    /// This sets the [`Flags::AT`] value as well.
    pub fn set_attested_credential_data(mut self, acd: AttestedCredentialData) -> Self {
        self.attested_credential_data = Some(acd);
        self.set_flags(Flags::AT)
    }

    /// Set additional [`Flags`] to the authenticator data.
    pub fn set_flags(mut self, flags: Flags) -> Self {
        self.flags |= flags;
        self
    }

    /// Get read access to the RP ID hash
    pub fn rp_id_hash(&self) -> &[u8] {
        &self.rp_id_hash
    }

    /// Decode an Authenticator data from a byte slice
    ///
    /// Fails if the data is truncated, if the attested credential data or extensions announced by
    /// the flags cannot be decoded, or if bytes remain after them.
    pub fn from_slice(v: &[u8]) -> coset::Result<Self> {
        if v.len() < Self::MIN_LEN {
            return Err(io_error(()));
        }

        let (rp_id_hash, v) = v.split_at(32);
        let (flag_byte, v) = v.split_at(1);
        let (counter, v) = v.split_at(4);

        let rp_id_hash: [u8; 32] = rp_id_hash.try_into().map_err(io_error)?;
        let counter: [u8; 4] = counter.try_into().map_err(io_error)?;
        let flags = Flags::from(flag_byte[0]);

        let mut managed_reader = Cursor::new(v);
        let attested_credential_data = flags
            .contains(Flags::AT)
            .then(|| AttestedCredentialData::from_reader(&mut managed_reader))
            .transpose()?;
        let extensions = flags
            .contains(Flags::ED)
            .then(|| {
                let value: Value =
                    ciborium::de::from_reader(&mut managed_reader).map_err(io_error)?;
                if value.is_map() {
                    Ok(value)
                } else {
                    Err(coset::CoseError::UnexpectedItem("non-map", "extensions map"))
                }
            })
            .transpose()?;

        if usize::try_from(managed_reader.position()).ok() != Some(v.len()) {
            return Err(coset::CoseError::ExtraneousData);
        }

        Ok(AuthenticatorData {
            rp_id_hash,
            flags,
            counter: u32::from_be_bytes(counter),
            attested_credential_data,
            extensions,
        })
    }

    /// Encode an authenticator data to its byte representation.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut flags = self.flags;
        flags.set(Flags::AT, self.attested_credential_data.is_some());
        flags.set(Flags::ED, self.extensions.is_some());

        let mut bytes = Vec::with_capacity(Self::MIN_LEN);
        bytes.extend_from_slice(&self.rp_id_hash);
        bytes.push(flags.into());
        bytes.extend_from_slice(&self.counter.to_be_bytes());
        if let Some(acd) = &self.attested_credential_data {
            acd.write_to(&mut bytes);
        }
        if let Some(extensions) = &self.extensions {
            // writing into a Vec only fails if the allocation does
            let _ = ciborium::ser::into_writer(extensions, &mut bytes);
        }
        bytes
    }
}

/// Attested credential data is a variable-length byte array added to the authenticator data when
/// generating an attestation object for a credential
///
/// <https://w3c.github.io/webauthn/#attested-credential-data>
#[derive(Debug, Clone, PartialEq)]
pub struct AttestedCredentialData {
    /// The AAGUID of the authenticator.
    pub aaguid: Aaguid,

    /// The credential ID whose length is prepended to the byte array. This is not public as it
    /// should not be modifiable to be longer than a u16.
    credential_id: Vec<u8>,

    /// The credential public key, decoded.
    key: CoseKey,

    /// The credential public key exactly as encoded by the authenticator, in COSE_Key format as
    /// defined in Section 7 of [RFC9052].
    ///
    /// [RFC9052]: https://www.rfc-editor.org/rfc/rfc9052
    key_bytes: Vec<u8>,
}

impl AttestedCredentialData {
    /// Create a new [AttestedCredentialData]
    ///
    /// # Error
    /// Returns an error if the length of `credential_id` cannot be represented by a u16 or if the
    /// key cannot be encoded.
    pub fn new(aaguid: Aaguid, credential_id: Vec<u8>, key: CoseKey) -> coset::Result<Self> {
        u16::try_from(credential_id.len())
            .map_err(|_| coset::CoseError::OutOfRangeIntegerValue)?;
        let key_bytes = key.clone().to_vec()?;

        Ok(Self {
            aaguid,
            credential_id,
            key,
            key_bytes,
        })
    }

    /// Get read access to the credential ID,
    pub fn credential_id(&self) -> &[u8] {
        &self.credential_id
    }

    /// The decoded credential public key.
    pub fn key(&self) -> &CoseKey {
        &self.key
    }

    /// The COSE encoding of the credential public key, as received.
    pub fn key_bytes(&self) -> &[u8] {
        &self.key_bytes
    }

    /// The algorithm the key declares in its `alg` (3) parameter, if it is a registered one.
    pub fn algorithm(&self) -> Option<iana::Algorithm> {
        match self.key.alg {
            Some(RegisteredLabelWithPrivate::Assigned(alg)) => Some(alg),
            _ => None,
        }
    }

    fn write_to(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&self.aaguid.0);
        // the constructors bound the length to a u16
        let len = u16::try_from(self.credential_id.len()).unwrap_or(u16::MAX);
        bytes.extend_from_slice(&len.to_be_bytes());
        bytes.extend_from_slice(&self.credential_id);
        bytes.extend_from_slice(&self.key_bytes);
    }

    fn from_reader(reader: &mut Cursor<&[u8]>) -> coset::Result<Self> {
        let mut aaguid = [0; 16];
        reader.read_exact(&mut aaguid).map_err(io_error)?;
        let aaguid = Aaguid(aaguid);

        let mut cred_len = [0; 2];
        reader.read_exact(&mut cred_len).map_err(io_error)?;
        let cred_len: usize = u16::from_be_bytes(cred_len).into();

        let mut credential_id = vec![0; cred_len];
        reader.read_exact(&mut credential_id).map_err(io_error)?;

        let key_start = usize::try_from(reader.position()).map_err(io_error)?;
        let cose_val: Value = ciborium::de::from_reader(&mut *reader).map_err(io_error)?;
        let key_end = usize::try_from(reader.position()).map_err(io_error)?;
        let key_bytes = reader
            .get_ref()
            .get(key_start..key_end)
            .ok_or(coset::CoseError::ExtraneousData)?
            .to_vec();
        let key = CoseKey::from_cbor_value(cose_val)?;

        Ok(Self {
            aaguid,
            credential_id,
            key,
            key_bytes,
        })
    }
}
