//! End-to-end exercises of `TransferEngine` against an in-memory store,
//! covering invariants 6-9 and scenarios S1-S6.

mod support;

use std::sync::Arc;

use chrono::Utc;
use ledger_api::crypto::ckks::{self, KeyGenerator, Params, PublicKey, SecretKey};
use ledger_api::crypto::ecdsa::{self, SigningKey};
use ledger_api::engine::TransferEngine;
use ledger_api::error::LedgerError;
use ledger_api::models::{CkksKeyEntry, EcdsaKeyEntry, SwitchingKeyEntry, TransactionBuilder, User};
use ledger_api::store::Store;
use ledger_api::verify;
use rand_chacha::ChaCha20Rng;
use rand_chacha::rand_core::SeedableRng;
use support::MemoryStore;
use uuid::Uuid;

struct Identity {
    id: Uuid,
    ckks_pk: PublicKey,
    ckks_sk: SecretKey,
    ecdsa_sk: SigningKey,
}

async fn register(
    store: &Arc<MemoryStore>,
    params: &Params,
    rng: &mut ChaCha20Rng,
    name: &str,
    initial_balance: f64,
) -> Identity {
    let id = Uuid::new_v4();
    let (ckks_pk, ckks_sk) = KeyGenerator::key_pair(params, rng);
    let ecdsa_sk = ecdsa::generate_signing_key();
    let ecdsa_pk = *ecdsa_sk.verifying_key();

    let now = Utc::now();
    let user = User {
        id,
        name: name.to_string(),
        ckks_keys: vec![CkksKeyEntry {
            id: Uuid::new_v4(),
            user_id: id,
            public_key: ckks::encode_public_key(&ckks_pk).unwrap(),
        }],
        ecdsa_keys: vec![EcdsaKeyEntry {
            id: Uuid::new_v4(),
            user_id: id,
            public_key: ecdsa::encode_public_key(&ecdsa_pk).unwrap(),
        }],
        created_at: now,
        updated_at: now,
    };

    let balance_ct = ckks::encrypt(params, &ckks_pk, initial_balance, rng);
    store.put_user(&user, ckks::encode_ct(&balance_ct).unwrap()).await.unwrap();

    Identity {
        id,
        ckks_pk,
        ckks_sk,
        ecdsa_sk,
    }
}

async fn register_swk(store: &Arc<MemoryStore>, params: &Params, rng: &mut ChaCha20Rng, a: &Identity, b: &Identity) {
    let swk = KeyGenerator::switching_key(params, &a.ckks_sk, &b.ckks_sk, rng);
    store
        .put_switching_key(&SwitchingKeyEntry {
            id: Uuid::new_v4(),
            user_in: a.id,
            user_out: b.id,
            pk_in: None,
            pk_out: None,
            key_material: ckks::encode_switching_key(&swk).unwrap(),
        })
        .await
        .unwrap();
}

fn fixture() -> (Arc<MemoryStore>, Params, ChaCha20Rng) {
    (Arc::new(MemoryStore::new()), Params::preset(), ChaCha20Rng::seed_from_u64(1))
}

async fn decrypted_balance(store: &Arc<MemoryStore>, params: &Params, identity: &Identity) -> f64 {
    let bytes = store.get_balance(identity.id).await.unwrap();
    let ct = ckks::decode_ct(&bytes).unwrap();
    ckks::decrypt(params, &identity.ckks_sk, &ct)
}

#[tokio::test]
async fn s1_happy_sender_pk_transfer() {
    let (store, params, mut rng) = fixture();
    let alice = register(&store, &params, &mut rng, "alice", 100.0).await;
    let bob = register(&store, &params, &mut rng, "bob", 50.0).await;
    register_swk(&store, &params, &mut rng, &alice, &bob).await;
    register_swk(&store, &params, &mut rng, &bob, &alice).await;

    let engine = TransferEngine::new(store.clone(), params);

    let ct = ckks::encrypt(engine.params(), &alice.ckks_pk, 42.50, &mut rng);
    let ct_bytes = ckks::encode_ct(&ct).unwrap();
    let sig = ecdsa::sign(&alice.ecdsa_sk, &ct_bytes);

    let mut builder = TransactionBuilder::new(alice.id, bob.id);
    builder.set_ct_sender(ct_bytes);
    builder.set_sig_ct_sender(sig, alice.id);

    let record = engine.create_by_sender_pk(builder.finish()).await.unwrap();

    assert_eq!(record.confirming_phase.to_string(), "confirmed");
    assert!(record.is_valid);
    assert!((decrypted_balance(&store, &params, &alice).await - 57.50).abs() < 0.02);
    assert!((decrypted_balance(&store, &params, &bob).await - 92.50).abs() < 0.02);
}

#[tokio::test]
async fn s2_happy_receipt_pk_transfer_requires_confirm() {
    let (store, params, mut rng) = fixture();
    let alice = register(&store, &params, &mut rng, "alice", 100.0).await;
    let bob = register(&store, &params, &mut rng, "bob", 50.0).await;
    register_swk(&store, &params, &mut rng, &alice, &bob).await;
    register_swk(&store, &params, &mut rng, &bob, &alice).await;

    let engine = TransferEngine::new(store.clone(), params);

    let ct = ckks::encrypt(engine.params(), &bob.ckks_pk, 10.0, &mut rng);
    let ct_bytes = ckks::encode_ct(&ct).unwrap();
    let sig = ecdsa::sign(&alice.ecdsa_sk, &ct_bytes);

    let mut builder = TransactionBuilder::new(alice.id, bob.id);
    builder.set_ct_receipt(ct_bytes);
    builder.set_sig_ct_receipt(sig, alice.id);

    let created = engine.create_by_receipt_pk(builder.finish()).await.unwrap();
    assert_eq!(created.confirming_phase.to_string(), "unconfirmed");
    assert!((decrypted_balance(&store, &params, &alice).await - 100.0).abs() < 0.02);
    assert!((decrypted_balance(&store, &params, &bob).await - 50.0).abs() < 0.02);

    let accept_msg = ecdsa::accept_message(&created.ct_sender);
    let accept_sig = ecdsa::sign(&bob.ecdsa_sk, &accept_msg);

    let confirmed = engine.confirm(created.uuid, accept_sig).await.unwrap();
    assert_eq!(confirmed.confirming_phase.to_string(), "confirmed");
    assert!((decrypted_balance(&store, &params, &alice).await - 90.0).abs() < 0.02);
    assert!((decrypted_balance(&store, &params, &bob).await - 60.0).abs() < 0.02);
}

#[tokio::test]
async fn s3_bad_signature_is_rejected_and_balances_unchanged() {
    let (store, params, mut rng) = fixture();
    let alice = register(&store, &params, &mut rng, "alice", 100.0).await;
    let bob = register(&store, &params, &mut rng, "bob", 50.0).await;
    register_swk(&store, &params, &mut rng, &alice, &bob).await;
    register_swk(&store, &params, &mut rng, &bob, &alice).await;

    let engine = TransferEngine::new(store.clone(), params);

    let ct = ckks::encrypt(engine.params(), &alice.ckks_pk, 42.50, &mut rng);
    let ct_bytes = ckks::encode_ct(&ct).unwrap();
    let mut sig = ecdsa::sign(&alice.ecdsa_sk, &ct_bytes);
    let last = sig.len() - 1;
    sig[last] ^= 0xFF;

    let mut builder = TransactionBuilder::new(alice.id, bob.id);
    builder.set_ct_sender(ct_bytes);
    builder.set_sig_ct_sender(sig, alice.id);

    let err = engine.create_by_sender_pk(builder.finish()).await.unwrap_err();
    assert!(matches!(err, LedgerError::Unauthorized(_)));
    assert!((decrypted_balance(&store, &params, &alice).await - 100.0).abs() < 0.02);
    assert!((decrypted_balance(&store, &params, &bob).await - 50.0).abs() < 0.02);
}

#[tokio::test]
async fn s4_missing_switching_key_surfaces_not_found() {
    let (store, params, mut rng) = fixture();
    let alice = register(&store, &params, &mut rng, "alice", 100.0).await;
    let bob = register(&store, &params, &mut rng, "bob", 50.0).await;
    register_swk(&store, &params, &mut rng, &alice, &bob).await;
    // swk bob->alice intentionally not registered

    let engine = TransferEngine::new(store.clone(), params);

    let ct = ckks::encrypt(engine.params(), &alice.ckks_pk, 10.0, &mut rng);
    let ct_bytes = ckks::encode_ct(&ct).unwrap();
    let sig = ecdsa::sign(&alice.ecdsa_sk, &ct_bytes);

    let mut builder = TransactionBuilder::new(alice.id, bob.id);
    builder.set_ct_receipt(ct_bytes);
    builder.set_sig_ct_receipt(sig, alice.id);

    let err = engine.create_by_receipt_pk(builder.finish()).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
}

#[tokio::test]
async fn s5_confirm_on_wrong_phase_is_protocol_error() {
    let (store, params, mut rng) = fixture();
    let alice = register(&store, &params, &mut rng, "alice", 100.0).await;
    let bob = register(&store, &params, &mut rng, "bob", 50.0).await;
    register_swk(&store, &params, &mut rng, &alice, &bob).await;
    register_swk(&store, &params, &mut rng, &bob, &alice).await;

    let engine = TransferEngine::new(store.clone(), params);

    let ct = ckks::encrypt(engine.params(), &alice.ckks_pk, 42.50, &mut rng);
    let ct_bytes = ckks::encode_ct(&ct).unwrap();
    let sig = ecdsa::sign(&alice.ecdsa_sk, &ct_bytes);

    let mut builder = TransactionBuilder::new(alice.id, bob.id);
    builder.set_ct_sender(ct_bytes);
    builder.set_sig_ct_sender(sig, alice.id);

    let confirmed = engine.create_by_sender_pk(builder.finish()).await.unwrap();

    let bogus_sig = ecdsa::sign(&bob.ecdsa_sk, b"anything");
    let err = engine.confirm(confirmed.uuid, bogus_sig).await.unwrap_err();
    assert!(matches!(err, LedgerError::Protocol(_)));
}

#[tokio::test]
async fn s6_idempotent_registration_preserves_zero_balance() {
    let (store, params, mut rng) = fixture();
    let id = Uuid::new_v4();
    let (ckks_pk, ckks_sk) = KeyGenerator::key_pair(&params, &mut rng);
    let ecdsa_sk = ecdsa::generate_signing_key();
    let now = Utc::now();

    let user = User {
        id,
        name: "alice".to_string(),
        ckks_keys: vec![CkksKeyEntry {
            id: Uuid::new_v4(),
            user_id: id,
            public_key: ckks::encode_public_key(&ckks_pk).unwrap(),
        }],
        ecdsa_keys: vec![EcdsaKeyEntry {
            id: Uuid::new_v4(),
            user_id: id,
            public_key: ecdsa::encode_public_key(&*ecdsa_sk.verifying_key()).unwrap(),
        }],
        created_at: now,
        updated_at: now,
    };

    let zero_ct = ckks::encrypt(&params, &ckks_pk, 0.0, &mut rng);
    let zero_bytes = ckks::encode_ct(&zero_ct).unwrap();

    store.put_user(&user, zero_bytes.clone()).await.unwrap();
    // Second registration with a different (nonzero) initial balance payload
    // must not clobber the existing balance row.
    let other_ct = ckks::encrypt(&params, &ckks_pk, 999.0, &mut rng);
    store
        .put_user(&user, ckks::encode_ct(&other_ct).unwrap())
        .await
        .unwrap();

    let stored_bytes = store.get_balance(id).await.unwrap();
    let stored_ct = ckks::decode_ct(&stored_bytes).unwrap();
    let decoded = ckks::decrypt(&params, &ckks_sk, &stored_ct);
    assert!((decoded - 0.0).abs() < 0.01);
}

#[tokio::test]
async fn verify_dispatcher_rejects_unknown_configuration() {
    let (store, params, mut rng) = fixture();
    let alice = register(&store, &params, &mut rng, "alice", 10.0).await;
    let bob = register(&store, &params, &mut rng, "bob", 10.0).await;

    let builder = TransactionBuilder::new(alice.id, bob.id);
    let err = verify::classify_and_verify(builder.record(), store.as_ref())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Protocol(_)));
}
