//! Payment-method construction for the host RPC (spec §4.5).
//!
//! Two variants, both opaque to the engine's own logic beyond construction: an
//! ephemeral-account payment (a signed request against a host-held balance) and a
//! contract-revision payment (a signed mutation of a file contract's proof outputs).
//! Wire structs derive Borsh, the same fixed-layout binary encoding the teacher's
//! `solad_client::Upload`/`ShardInfo` structs use for their own host-compatible wire
//! formats.

use borsh::{BorshDeserialize, BorshSerialize};
use ed25519_dalek::{Signer, SigningKey};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::types::{Currency, Hash256, PublicKey, Signature};

/// Request body for `PayByEphemeralAccount`.
///
/// The `account` field appears twice in the signed hash (see [`pay_by_ephemeral_account`])
/// by design — preserved bit-exactly for wire compatibility with existing hosts, not a
/// bug in this crate. `priority` is always zero; no constructor exposes a way to set it.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PayByEphemeralAccountRequest {
    pub account: PublicKey,
    pub expiry: u64,
    pub amount: Currency,
    pub nonce: [u8; 8],
    pub signature: Signature,
    pub priority: i64,
}

/// Builds and signs a `PayByEphemeralAccount` request.
///
/// The signed hash covers `(account, expiry, account, nonce)` in that order — `account`
/// is hashed twice. This matches a quirk observed on the wire and must not be "fixed"
/// (spec §9 open questions); a single-occurrence hash would not interoperate with hosts
/// expecting the duplicate.
pub fn pay_by_ephemeral_account(
    account: PublicKey,
    amount: Currency,
    expiry: u64,
    signing_key: &SigningKey,
) -> PayByEphemeralAccountRequest {
    let mut nonce = [0u8; 8];
    OsRng.fill_bytes(&mut nonce);

    let mut hasher = Sha256::new();
    hasher.update(account.as_bytes());
    hasher.update(expiry.to_le_bytes());
    hasher.update(account.as_bytes());
    hasher.update(nonce);
    let hash: [u8; 32] = hasher.finalize().into();

    let signature: Signature = signing_key.sign(&hash).into();

    PayByEphemeralAccountRequest {
        account,
        expiry,
        amount,
        nonce,
        signature,
        priority: 0,
    }
}

/// Request body for `PayByContract`. `host_signature` is left zeroed here; the host
/// fills it in on response.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PayByContractRequest {
    pub contract_id: Hash256,
    pub new_revision_number: u64,
    pub new_valid_proof_values: Vec<Currency>,
    pub new_missed_proof_values: Vec<Currency>,
    pub refund_account: PublicKey,
    pub signature: Signature,
    pub host_signature: Signature,
}

/// A single proof output slot within a contract revision: index 0 is always the renter,
/// index 1 the host, matching the layout `PayByContract` mutates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProofOutput {
    pub value: Currency,
}

/// The mutable file-contract revision `PayByContract` reallocates value within.
///
/// `valid_proof_outputs` and `missed_proof_outputs` must each have at least two entries
/// (renter at index 0, host at index 1); a shorter revision is a caller bug, not a
/// recoverable condition, so accessors panic rather than returning `Result`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractRevision {
    pub contract_id: Hash256,
    pub revision_number: u64,
    pub valid_proof_outputs: Vec<ProofOutput>,
    pub missed_proof_outputs: Vec<ProofOutput>,
    /// Block height at which the contract's storage window ends; the sighash parameter
    /// covering this revision.
    pub window_end: u64,
}

fn sighash(revision: &ContractRevision) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(revision.contract_id.0);
    hasher.update(revision.revision_number.to_le_bytes());
    for output in &revision.valid_proof_outputs {
        hasher.update(output.value.to_le_bytes());
    }
    for output in &revision.missed_proof_outputs {
        hasher.update(output.value.to_le_bytes());
    }
    hasher.update(revision.window_end.to_le_bytes());
    hasher.finalize().into()
}

/// Builds a `PayByContract` request, mutating `revision` in place on success.
///
/// Fails (returning `false` and leaving `revision` untouched) if either the renter's
/// valid or missed payout is less than `amount`. On success, moves `amount` from the
/// renter's output to the host's in both proof-output arrays, increments the revision
/// number by one, and signs the covered hash with `signing_key`.
pub fn pay_by_contract(
    revision: &mut ContractRevision,
    amount: Currency,
    refund_account: PublicKey,
    signing_key: &SigningKey,
) -> (PayByContractRequest, bool) {
    let renter_valid = revision.valid_proof_outputs[0].value;
    let renter_missed = revision.missed_proof_outputs[0].value;

    if renter_valid < amount || renter_missed < amount {
        let request = PayByContractRequest {
            contract_id: revision.contract_id,
            new_revision_number: revision.revision_number,
            new_valid_proof_values: revision.valid_proof_outputs.iter().map(|o| o.value).collect(),
            new_missed_proof_values: revision
                .missed_proof_outputs
                .iter()
                .map(|o| o.value)
                .collect(),
            refund_account,
            signature: Signature([0u8; 64]),
            host_signature: Signature([0u8; 64]),
        };
        return (request, false);
    }

    revision.valid_proof_outputs[0].value -= amount;
    revision.valid_proof_outputs[1].value += amount;
    revision.missed_proof_outputs[0].value -= amount;
    revision.missed_proof_outputs[1].value += amount;
    revision.revision_number += 1;

    let hash = sighash(revision);
    let signature: Signature = signing_key.sign(&hash).into();

    let request = PayByContractRequest {
        contract_id: revision.contract_id,
        new_revision_number: revision.revision_number,
        new_valid_proof_values: revision.valid_proof_outputs.iter().map(|o| o.value).collect(),
        new_missed_proof_values: revision.missed_proof_outputs.iter().map(|o| o.value).collect(),
        refund_account,
        signature,
        host_signature: Signature([0u8; 64]),
    };
    (request, true)
}

/// A constructed, ready-to-send payment: the closed sum of the two variants this
/// protocol supports (spec §9 — preferred over a virtual `PaymentMethod` hierarchy
/// since the variant set itself is closed, unlike `HostSession` implementations).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentMethod {
    EphemeralAccount(PayByEphemeralAccountRequest),
    Contract(PayByContractRequest),
}
