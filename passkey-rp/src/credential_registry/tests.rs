use std::sync::Arc;

use super::*;

fn credential(id: &[u8], counter: u32) -> Credential {
    Credential {
        credential_id: id.into(),
        public_key: vec![0xa5].into(),
        algorithm: iana::Algorithm::ES256,
        signature_counter: counter,
        transports: [AuthenticatorTransport::Usb, AuthenticatorTransport::Nfc]
            .into_iter()
            .collect(),
        aaguid: Aaguid::new_empty(),
        user_verified: true,
    }
}

#[tokio::test]
async fn get_or_create_is_idempotent() {
    let registry = MemoryRegistry::new();
    let first = registry
        .get_or_create_account("alice")
        .await
        .expect("memory registry is available");
    let second = registry
        .get_or_create_account("alice")
        .await
        .expect("memory registry is available");

    assert_eq!(first, second);
    assert_eq!(first.user_handle.len(), USER_HANDLE_LEN);
    assert_ne!(first.user_handle.as_slice(), b"alice");
    assert_eq!(registry.accounts().await.map(|a| a.len()), Ok(1));
}

#[tokio::test]
async fn get_account_does_not_create() {
    let registry = MemoryRegistry::new();
    assert_eq!(
        registry.get_account("alice").await,
        Err(StoreError::NotFound)
    );
    assert_eq!(registry.list_credentials("alice").await, Ok(Vec::new()));
    assert_eq!(registry.accounts().await, Ok(Vec::new()));
}

#[tokio::test]
async fn added_credentials_can_be_found() {
    let registry = MemoryRegistry::new();
    registry.get_or_create_account("alice").await.expect("available");

    registry
        .add_credential("alice", credential(&[1], 0))
        .await
        .expect("new credential");
    registry
        .add_credential("alice", credential(&[2], 0))
        .await
        .expect("new credential");

    let listed = registry.list_credentials("alice").await.expect("available");
    let ids: Vec<&[u8]> = listed.iter().map(|c| c.credential_id.as_slice()).collect();
    assert_eq!(ids, [&[1u8][..], &[2u8][..]]);

    assert_eq!(
        registry.find_credential("alice", &[2]).await,
        Ok(credential(&[2], 0))
    );
    assert_eq!(
        registry.find_credential("alice", &[3]).await,
        Err(StoreError::NotFound)
    );
    assert_eq!(
        registry.find_credential("bob", &[1]).await,
        Err(StoreError::NotFound)
    );
}

#[tokio::test]
async fn credential_ids_are_unique_across_accounts() {
    let registry = MemoryRegistry::new();
    registry.get_or_create_account("alice").await.expect("available");
    registry.get_or_create_account("bob").await.expect("available");

    registry
        .add_credential("alice", credential(&[7; 16], 0))
        .await
        .expect("new credential");

    assert_eq!(
        registry.add_credential("alice", credential(&[7; 16], 0)).await,
        Err(StoreError::DuplicateCredential)
    );
    assert_eq!(
        registry.add_credential("bob", credential(&[7; 16], 0)).await,
        Err(StoreError::DuplicateCredential)
    );
    assert_eq!(registry.list_credentials("bob").await, Ok(Vec::new()));
}

#[tokio::test]
async fn adding_to_a_missing_account_fails() {
    let registry = MemoryRegistry::new();
    assert_eq!(
        registry.add_credential("alice", credential(&[1], 0)).await,
        Err(StoreError::NotFound)
    );

    // the id was not claimed by the failed attempt
    registry.get_or_create_account("bob").await.expect("available");
    assert_eq!(
        registry.add_credential("bob", credential(&[1], 0)).await,
        Ok(())
    );
}

#[tokio::test]
async fn update_counter_overwrites() {
    let registry = MemoryRegistry::new();
    registry.get_or_create_account("alice").await.expect("available");
    registry
        .add_credential("alice", credential(&[1], 5))
        .await
        .expect("new credential");

    registry
        .update_counter("alice", &[1], 9)
        .await
        .expect("credential exists");
    assert_eq!(
        registry
            .find_credential("alice", &[1])
            .await
            .map(|c| c.signature_counter),
        Ok(9)
    );
    assert_eq!(
        registry.update_counter("alice", &[2], 9).await,
        Err(StoreError::NotFound)
    );
}

#[tokio::test]
async fn compare_and_update_counter() {
    let registry = MemoryRegistry::new();
    registry.get_or_create_account("alice").await.expect("available");
    registry
        .add_credential("alice", credential(&[1], 5))
        .await
        .expect("new credential");

    assert_eq!(
        registry.compare_and_update_counter("alice", &[1], 5, 6).await,
        Ok(CounterUpdate::Applied)
    );

    // a stale observation reports the stored value and never lowers it
    assert_eq!(
        registry.compare_and_update_counter("alice", &[1], 5, 4).await,
        Ok(CounterUpdate::Conflict { stored: 6 })
    );
    assert_eq!(
        registry
            .find_credential("alice", &[1])
            .await
            .map(|c| c.signature_counter),
        Ok(6)
    );

    // a stale observation with a greater value still raises it
    assert_eq!(
        registry.compare_and_update_counter("alice", &[1], 5, 8).await,
        Ok(CounterUpdate::Conflict { stored: 6 })
    );
    assert_eq!(
        registry
            .find_credential("alice", &[1])
            .await
            .map(|c| c.signature_counter),
        Ok(8)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_counter_commits_apply_once() {
    let registry = Arc::new(MemoryRegistry::new());
    registry.get_or_create_account("alice").await.expect("available");
    registry
        .add_credential("alice", credential(&[1], 4))
        .await
        .expect("new credential");

    // stored N-1 = 4, racing N+1 = 6 and N = 5
    let handles: Vec<_> = [6, 5]
        .into_iter()
        .map(|new| {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .compare_and_update_counter("alice", &[1], 4, new)
                    .await
            })
        })
        .collect();

    let mut applied = 0;
    for handle in handles {
        if handle.await.expect("task did not panic") == Ok(CounterUpdate::Applied) {
            applied += 1;
        }
    }

    assert_eq!(applied, 1);
    assert_eq!(
        registry
            .find_credential("alice", &[1])
            .await
            .map(|c| c.signature_counter),
        Ok(6)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_registrations_insert_once() {
    let registry = Arc::new(MemoryRegistry::new());
    for identity in ["alice", "bob", "carol", "dave"] {
        registry.get_or_create_account(identity).await.expect("available");
    }

    let handles: Vec<_> = ["alice", "bob", "carol", "dave"]
        .into_iter()
        .map(|identity| {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .add_credential(identity, credential(&[9; 32], 0))
                    .await
            })
        })
        .collect();

    let mut inserted = 0;
    for handle in handles {
        if handle.await.expect("task did not panic").is_ok() {
            inserted += 1;
        }
    }
    assert_eq!(inserted, 1);

    let total: usize = registry
        .accounts()
        .await
        .expect("available")
        .iter()
        .map(|account| account.credentials.len())
        .sum();
    assert_eq!(total, 1);
}

#[test]
fn descriptors_carry_the_transports() {
    let descriptor = credential(&[1, 2], 0).descriptor();
    assert_eq!(&descriptor.id[..], &[1, 2]);
    assert_eq!(
        descriptor.transports,
        Some(vec![AuthenticatorTransport::Usb, AuthenticatorTransport::Nfc])
    );

    let mut bare = credential(&[3], 0);
    bare.transports.clear();
    assert_eq!(bare.descriptor().transports, None);
}
