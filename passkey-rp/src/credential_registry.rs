use std::{collections::BTreeSet, sync::Arc};

use coset::iana::{self, EnumI64};
use dashmap::{mapref::entry::Entry, DashMap};
use passkey_rp_types::{
    authenticator::Aaguid,
    rand::random_vec,
    webauthn::{AuthenticatorTransport, PublicKeyCredentialDescriptor},
    Bytes,
};
use serde::{Serialize, Serializer};

use crate::StoreError;

#[cfg(test)]
mod tests;

/// Length of generated user handles, in bytes.
pub const USER_HANDLE_LEN: usize = 16;

/// A registered authenticator binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// The ID chosen by the authenticator, unique across all accounts.
    pub credential_id: Bytes,
    /// The COSE encoded public key as the authenticator sent it.
    pub public_key: Bytes,
    /// The key's signature algorithm.
    #[serde(serialize_with = "algorithm_as_i64")]
    pub algorithm: iana::Algorithm,
    /// The last signature counter seen, `0` for authenticators without one.
    pub signature_counter: u32,
    /// Transports reported at registration. Only ever used as hints.
    pub transports: BTreeSet<AuthenticatorTransport>,
    /// The AAGUID from the attested credential data.
    pub aaguid: Aaguid,
    /// Whether the user was verified at registration.
    pub user_verified: bool,
}

fn algorithm_as_i64<S: Serializer>(alg: &iana::Algorithm, ser: S) -> Result<S::Ok, S::Error> {
    ser.serialize_i64(alg.to_i64())
}

impl Credential {
    /// This credential as an entry of `excludeCredentials` or `allowCredentials`.
    pub fn descriptor(&self) -> PublicKeyCredentialDescriptor {
        let transports: Vec<_> = self.transports.iter().copied().collect();
        PublicKeyCredentialDescriptor::public_key(self.credential_id.clone(), &transports)
    }
}

/// An identity and the credentials registered to it, in registration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// The caller supplied name of the principal.
    pub identity: String,
    /// The opaque handle sent as `user.id`, never the identity itself.
    pub user_handle: Bytes,
    /// The registered credentials.
    pub credentials: Vec<Credential>,
}

impl Account {
    /// A new account with a random user handle and no credentials.
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            user_handle: random_vec(USER_HANDLE_LEN).into(),
            credentials: Vec::new(),
        }
    }

    /// Look up one of the account's credentials.
    pub fn credential(&self, credential_id: &[u8]) -> Option<&Credential> {
        self.credentials
            .iter()
            .find(|c| c.credential_id.as_slice() == credential_id)
    }
}

/// The outcome of [`CredentialRegistry::compare_and_update_counter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterUpdate {
    /// The stored counter still held the observed value and now holds the new one.
    Applied,
    /// Another update got there first. The stored counter is now the greater of `stored` and the
    /// new value.
    Conflict {
        /// The counter found in the store.
        stored: u32,
    },
}

/// Durable mapping of identities to accounts and their credentials.
#[async_trait::async_trait]
pub trait CredentialRegistry {
    /// Fetch the identity's account, creating an empty one if there is none.
    async fn get_or_create_account(&self, identity: &str) -> Result<Account, StoreError>;

    /// Fetch the identity's account without creating it.
    async fn get_account(&self, identity: &str) -> Result<Account, StoreError>;

    /// The identity's credentials, empty for unknown identities.
    async fn list_credentials(&self, identity: &str) -> Result<Vec<Credential>, StoreError>;

    /// Register a credential to an existing account.
    ///
    /// Fails with [`StoreError::DuplicateCredential`] if the ID is registered to any identity. The
    /// check and the insertion are atomic.
    async fn add_credential(&self, identity: &str, credential: Credential)
        -> Result<(), StoreError>;

    /// Look up one of the identity's credentials.
    async fn find_credential(
        &self,
        identity: &str,
        credential_id: &[u8],
    ) -> Result<Credential, StoreError>;

    /// Overwrite a credential's signature counter.
    async fn update_counter(
        &self,
        identity: &str,
        credential_id: &[u8],
        new_counter: u32,
    ) -> Result<(), StoreError>;

    /// Set the counter to `new` only if it still equals `observed`. On a mismatch the counter is
    /// raised to `new` if that is greater, so it never moves backwards.
    async fn compare_and_update_counter(
        &self,
        identity: &str,
        credential_id: &[u8],
        observed: u32,
        new: u32,
    ) -> Result<CounterUpdate, StoreError>;

    /// A snapshot of every account, ordered by identity.
    async fn accounts(&self) -> Result<Vec<Account>, StoreError>;
}

/// In-memory [`CredentialRegistry`].
///
/// Accounts live in a sharded map keyed by identity. A second map indexes every credential ID to
/// its owner so uniqueness holds across accounts.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    accounts: DashMap<String, Account>,
    credential_owners: DashMap<Bytes, String>,
}

impl MemoryRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CredentialRegistry for MemoryRegistry {
    async fn get_or_create_account(&self, identity: &str) -> Result<Account, StoreError> {
        let account = self
            .accounts
            .entry(identity.to_owned())
            .or_insert_with(|| {
                log::info!("creating account for {identity}");
                Account::new(identity)
            })
            .value()
            .clone();
        Ok(account)
    }

    async fn get_account(&self, identity: &str) -> Result<Account, StoreError> {
        self.accounts
            .get(identity)
            .map(|account| account.value().clone())
            .ok_or(StoreError::NotFound)
    }

    async fn list_credentials(&self, identity: &str) -> Result<Vec<Credential>, StoreError> {
        Ok(self
            .accounts
            .get(identity)
            .map(|account| account.credentials.clone())
            .unwrap_or_default())
    }

    async fn add_credential(
        &self,
        identity: &str,
        credential: Credential,
    ) -> Result<(), StoreError> {
        if !self.accounts.contains_key(identity) {
            return Err(StoreError::NotFound);
        }

        // claim the ID first, the owner index is the source of truth for uniqueness
        match self.credential_owners.entry(credential.credential_id.clone()) {
            Entry::Occupied(_) => return Err(StoreError::DuplicateCredential),
            Entry::Vacant(vacant) => {
                vacant.insert(identity.to_owned());
            }
        }

        match self.accounts.get_mut(identity) {
            Some(mut account) => {
                account.credentials.push(credential);
                Ok(())
            }
            None => {
                self.credential_owners.remove(&credential.credential_id);
                Err(StoreError::NotFound)
            }
        }
    }

    async fn find_credential(
        &self,
        identity: &str,
        credential_id: &[u8],
    ) -> Result<Credential, StoreError> {
        self.accounts
            .get(identity)
            .and_then(|account| account.credential(credential_id).cloned())
            .ok_or(StoreError::NotFound)
    }

    async fn update_counter(
        &self,
        identity: &str,
        credential_id: &[u8],
        new_counter: u32,
    ) -> Result<(), StoreError> {
        let mut account = self.accounts.get_mut(identity).ok_or(StoreError::NotFound)?;
        let credential = account
            .credentials
            .iter_mut()
            .find(|c| c.credential_id.as_slice() == credential_id)
            .ok_or(StoreError::NotFound)?;
        credential.signature_counter = new_counter;
        Ok(())
    }

    async fn compare_and_update_counter(
        &self,
        identity: &str,
        credential_id: &[u8],
        observed: u32,
        new: u32,
    ) -> Result<CounterUpdate, StoreError> {
        let mut account = self.accounts.get_mut(identity).ok_or(StoreError::NotFound)?;
        let credential = account
            .credentials
            .iter_mut()
            .find(|c| c.credential_id.as_slice() == credential_id)
            .ok_or(StoreError::NotFound)?;

        let stored = credential.signature_counter;
        if stored == observed {
            credential.signature_counter = new;
            Ok(CounterUpdate::Applied)
        } else {
            credential.signature_counter = stored.max(new);
            Ok(CounterUpdate::Conflict { stored })
        }
    }

    async fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        let mut accounts: Vec<Account> = self
            .accounts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        accounts.sort_by(|a, b| a.identity.cmp(&b.identity));
        Ok(accounts)
    }
}

#[async_trait::async_trait]
impl<R> CredentialRegistry for Arc<R>
where
    R: CredentialRegistry + Send + Sync,
{
    async fn get_or_create_account(&self, identity: &str) -> Result<Account, StoreError> {
        self.as_ref().get_or_create_account(identity).await
    }

    async fn get_account(&self, identity: &str) -> Result<Account, StoreError> {
        self.as_ref().get_account(identity).await
    }

    async fn list_credentials(&self, identity: &str) -> Result<Vec<Credential>, StoreError> {
        self.as_ref().list_credentials(identity).await
    }

    async fn add_credential(
        &self,
        identity: &str,
        credential: Credential,
    ) -> Result<(), StoreError> {
        self.as_ref().add_credential(identity, credential).await
    }

    async fn find_credential(
        &self,
        identity: &str,
        credential_id: &[u8],
    ) -> Result<Credential, StoreError> {
        self.as_ref().find_credential(identity, credential_id).await
    }

    async fn update_counter(
        &self,
        identity: &str,
        credential_id: &[u8],
        new_counter: u32,
    ) -> Result<(), StoreError> {
        self.as_ref()
            .update_counter(identity, credential_id, new_counter)
            .await
    }

    async fn compare_and_update_counter(
        &self,
        identity: &str,
        credential_id: &[u8],
        observed: u32,
        new: u32,
    ) -> Result<CounterUpdate, StoreError> {
        self.as_ref()
            .compare_and_update_counter(identity, credential_id, observed, new)
            .await
    }

    async fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        self.as_ref().accounts().await
    }
}
