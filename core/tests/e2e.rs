use sha2::{Digest, Sha256};
use xescrow_core::{
    generate, Amount, Condition, ConditionError, ConditionPair, EscrowError, EscrowRecord,
    EscrowState, Fulfillment, LedgerTime, Preimage, Result,
};

fn assert_err<T, E>(res: Result<T>, expected: E)
where
    E: std::fmt::Debug + PartialEq<E>,
    EscrowError: Into<E> + PartialEq<E>,
{
    match res {
        Err(e) => assert_eq!(e.into(), expected),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn condition_commits_to_preimage() {
    for _ in 0..16 {
        let pair = generate().unwrap();
        let condition = hex::decode(pair.condition_hex()).unwrap();
        let fulfillment = hex::decode(pair.fulfillment_hex()).unwrap();
        assert_eq!(condition.len(), 39);
        assert_eq!(fulfillment.len(), 36);
        assert_eq!(pair.condition_hex().len(), 78);
        assert_eq!(pair.fulfillment_hex().len(), 72);

        // hash embedded in the condition == SHA256(preimage embedded in the fulfillment)
        let preimage = &fulfillment[4..];
        assert_eq!(hex::encode_upper(preimage), pair.preimage_hex());
        assert_eq!(&condition[4..36], Sha256::digest(preimage).as_slice());
    }
}

#[test]
fn zero_preimage_regression() {
    let pair = ConditionPair::from_preimage(Preimage::from_bytes([0u8; 32]));
    let digest = hex::encode_upper(Sha256::digest([0u8; 32]));
    assert_eq!(pair.condition_hex(), format!("A0258020{}810120", digest));
    assert_eq!(
        pair.fulfillment_hex(),
        format!("A0228020{}", "0".repeat(64))
    );

    let condition: Condition = pair.condition_hex().parse().unwrap();
    let fulfillment: Fulfillment = pair.fulfillment_hex().parse().unwrap();
    assert_eq!(condition.fingerprint().as_slice(), hex::decode(digest).unwrap());
    assert_eq!(fulfillment.preimage().as_bytes(), &[0u8; 32]);
    assert!(fulfillment.verify(&condition).is_ok());
}

#[test]
fn wrong_fulfillment_rejected() {
    let pair = generate().unwrap();
    let other = generate().unwrap();
    assert_eq!(
        other.fulfillment.verify(&pair.condition),
        Err(ConditionError::PreimageMismatch)
    );
}

#[test]
fn escrow_lifecycle() {
    let pair = generate().unwrap();
    let mut escrow = EscrowRecord {
        owner: "rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe".into(),
        destination: "rGWrZyQqhTp9Xu7G5Pkayo7bXjH4k4QYpf".into(),
        amount: Amount::xrp("1").unwrap(),
        offer_sequence: 5,
        condition: Some(pair.condition),
        finish_after: Some(LedgerTime::from_secs(100)),
        cancel_after: None,
        state: EscrowState::Created,
    };

    // Created -> finish before the gate
    assert_err(
        escrow.ensure_finishable(LedgerTime::from_secs(99)),
        EscrowError::GateNotElapsed {
            now: LedgerTime::from_secs(99),
            not_before: LedgerTime::from_secs(100),
        },
    );

    assert_err(
        escrow.ensure_finishable(LedgerTime::from_secs(100)),
        EscrowError::GateNotElapsed {
            now: LedgerTime::from_secs(100),
            not_before: LedgerTime::from_secs(100),
        },
    );

    // Created -> completed
    escrow.ensure_finishable(LedgerTime::from_secs(101)).unwrap();
    assert_eq!(escrow.complete().unwrap(), EscrowState::Completed);

    // Completing or canceling again should result in invalid state
    assert_err(escrow.complete(), EscrowError::InvalidState);
    assert_err(escrow.cancel(), EscrowError::InvalidState);
}
