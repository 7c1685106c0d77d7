use super::{AggregationError, GasCommitment, SignerContribution, SignerKind, UpperLimits};
use crate::UserOperation;
use alloy::primitives::{Address, Bytes, Signature, B256, U256};

/// Length of the upper-limit header.
const HEADER_LEN: usize = 96;

/// Length of one signature slot.
const SLOT_LEN: usize = 65;

/// A set of owner signatures combined into the single blob a threshold
/// account verifies.
///
/// The encoded format is as follows:
/// - `[0..32)`: upper limit on `preVerificationGas`
/// - `[32..64)`: upper limit on `maxFeePerGas`
/// - `[64..96)`: upper limit on `maxPriorityFeePerGas`
/// - `k` slots of 65 bytes, one per contribution, in order:
///   - EOA: `r ‖ s ‖ v`, with `v` of 27 or 28, plus 32 when the signature
///     commits to actual gas values.
///   - contract: `pad32(signer) ‖ offset ‖ v`, with `v` of 0, plus 32 when
///     the signature commits to actual gas values. The offset is counted
///     from byte 96.
/// - contract payloads, each `len ‖ bytes`, at their slot's offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedSignature {
    upper_limits: UpperLimits,
    contributions: Vec<SignerContribution>,
}

impl AggregatedSignature {
    /// Combine contributions, keeping their order. All contributions must
    /// share one commitment mode.
    pub fn new(
        upper_limits: UpperLimits,
        contributions: Vec<SignerContribution>,
    ) -> Result<Self, AggregationError> {
        let first = contributions.first().ok_or(AggregationError::Empty)?;
        if let Some(odd) = contributions.iter().find(|c| c.commitment != first.commitment) {
            return Err(AggregationError::MixedCommitments {
                expected: first.commitment,
                found: odd.commitment,
                signer: odd.signer,
            });
        }
        Ok(Self { upper_limits, contributions })
    }

    /// The upper limits.
    pub const fn upper_limits(&self) -> &UpperLimits {
        &self.upper_limits
    }

    /// The contributions, in slot order.
    pub fn contributions(&self) -> &[SignerContribution] {
        &self.contributions
    }

    /// The shared commitment mode.
    pub fn commitment(&self) -> GasCommitment {
        self.contributions.first().map(|c| c.commitment).unwrap_or_default()
    }

    /// The signers, in slot order.
    pub fn signers(&self) -> impl Iterator<Item = Address> + '_ {
        self.contributions.iter().map(|c| c.signer)
    }

    /// Reorder the contributions by ascending signer address.
    pub fn sorted_by_signer(mut self) -> Self {
        self.contributions.sort_by_key(|c| c.signer);
        self
    }

    /// Encode into the on-chain format.
    pub fn encode(&self) -> Result<Bytes, AggregationError> {
        let k = self.contributions.len();
        let mut out = Vec::with_capacity(HEADER_LEN + SLOT_LEN * k);
        let mut payloads = Vec::new();
        self.upper_limits.write_into(&mut out);

        let mut offset = SLOT_LEN * k;
        for contribution in &self.contributions {
            let v_offset = contribution.commitment.v_offset();
            match contribution.kind {
                SignerKind::Eoa => {
                    let signature = Signature::from_raw(&contribution.signature).map_err(|_| {
                        AggregationError::MalformedEoaSignature { signer: contribution.signer }
                    })?;
                    let mut slot = signature.as_bytes();
                    slot[64] += v_offset;
                    out.extend_from_slice(&slot);
                }
                SignerKind::Contract => {
                    out.extend_from_slice(contribution.signer.into_word().as_slice());
                    out.extend_from_slice(&U256::from(offset).to_be_bytes::<32>());
                    out.push(v_offset);

                    let len = contribution.signature.len();
                    payloads.extend_from_slice(&U256::from(len).to_be_bytes::<32>());
                    payloads.extend_from_slice(&contribution.signature);
                    offset += 32 + len;
                }
            }
        }

        out.extend_from_slice(&payloads);
        Ok(out.into())
    }

    /// Decode `k` slots without recovering EOA signers.
    pub fn decode(bytes: &[u8], k: usize) -> Result<SplitSignature, AggregationError> {
        let needed = SLOT_LEN.saturating_mul(k).saturating_add(HEADER_LEN);
        if bytes.len() < needed {
            return Err(AggregationError::Truncated { needed, len: bytes.len() });
        }
        let upper_limits = UpperLimits::read_from(bytes)
            .ok_or(AggregationError::Truncated { needed, len: bytes.len() })?;
        let data = &bytes[HEADER_LEN..];

        let slots = (0..k)
            .map(|index| decode_slot(data, index))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SplitSignature { upper_limits, slots })
    }

    /// Split an encoded blob of `k` slots back into contributions, recovering
    /// each EOA signer from the operation hash it committed to.
    pub fn split(
        bytes: &[u8],
        k: usize,
        op: &UserOperation,
        entry_point: Address,
        chain_id: u64,
    ) -> Result<Self, AggregationError> {
        Self::decode(bytes, k)?.recover(op, entry_point, chain_id)
    }
}

/// One decoded signature slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureSlot {
    /// How the signature is verified.
    pub kind: SignerKind,
    /// What the signature commits to.
    pub commitment: GasCommitment,
    /// The signer, for contract slots. EOA signers need recovery.
    pub signer: Option<Address>,
    /// The signature. For EOAs, `v` is normalized to 27 or 28.
    pub signature: Bytes,
}

/// An aggregated signature decoded into its header and slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSignature {
    /// The upper limits from the header.
    pub upper_limits: UpperLimits,
    /// The slots, in order.
    pub slots: Vec<SignatureSlot>,
}

impl SplitSignature {
    /// Recover EOA signers and rebuild the aggregate.
    pub fn recover(
        self,
        op: &UserOperation,
        entry_point: Address,
        chain_id: u64,
    ) -> Result<AggregatedSignature, AggregationError> {
        let actual_hash = op.hash(entry_point, chain_id);
        let limited_hash = self.upper_limits.apply_to(op.clone()).hash(entry_point, chain_id);

        let contributions = self
            .slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| -> Result<SignerContribution, AggregationError> {
                let signer = match slot.signer {
                    Some(signer) => signer,
                    None => {
                        let hash: B256 = match slot.commitment {
                            GasCommitment::UpperBound => limited_hash,
                            GasCommitment::Actual => actual_hash,
                        };
                        Signature::from_raw(&slot.signature)
                            .and_then(|sig| sig.recover_address_from_msg(hash.as_slice()))
                            .map_err(|_| AggregationError::Recovery { index })?
                    }
                };
                Ok(SignerContribution {
                    signer,
                    signature: slot.signature,
                    kind: slot.kind,
                    commitment: slot.commitment,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        AggregatedSignature::new(self.upper_limits, contributions)
    }
}

fn decode_slot(data: &[u8], index: usize) -> Result<SignatureSlot, AggregationError> {
    let slot = &data[index * SLOT_LEN..(index + 1) * SLOT_LEN];
    let v = slot[64];
    let (kind, commitment) = match v {
        0 => (SignerKind::Contract, GasCommitment::UpperBound),
        32 => (SignerKind::Contract, GasCommitment::Actual),
        27 | 28 => (SignerKind::Eoa, GasCommitment::UpperBound),
        59 | 60 => (SignerKind::Eoa, GasCommitment::Actual),
        _ => return Err(AggregationError::UnknownSlot { index, v }),
    };

    match kind {
        SignerKind::Eoa => {
            let mut signature = slot.to_vec();
            signature[64] -= commitment.v_offset();
            Ok(SignatureSlot { kind, commitment, signer: None, signature: signature.into() })
        }
        SignerKind::Contract => {
            let signer = Address::from_slice(&slot[12..32]);
            let raw_offset = U256::from_be_slice(&slot[32..64]);
            let bad_offset = || AggregationError::BadOffset { index, offset: raw_offset };

            let offset: usize = raw_offset.try_into().map_err(|_| bad_offset())?;
            let start = offset.checked_add(32).ok_or_else(bad_offset)?;
            let len_word = data.get(offset..start).ok_or_else(bad_offset)?;
            let len: usize = U256::from_be_slice(len_word).try_into().map_err(|_| bad_offset())?;
            let signature = data
                .get(start..start.checked_add(len).ok_or_else(bad_offset)?)
                .ok_or_else(bad_offset)?;

            Ok(SignatureSlot {
                kind,
                commitment,
                signer: Some(signer),
                signature: Bytes::copy_from_slice(signature),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test_utils::TEST_SIGNERS, FeeEstimate, GasEstimate, PendingOperation};
    use alloy::signers::SignerSync;
    use userop_constants::EntryPointVersion;

    const ENTRY_POINT: Address = Address::repeat_byte(0xe7);
    const CHAIN_ID: u64 = 31337;

    fn op() -> UserOperation {
        let mut op = PendingOperation::new(
            EntryPointVersion::V07,
            Address::repeat_byte(0xac),
            U256::from(3),
            Bytes::from_static(&[0xde, 0xad]),
        );
        op.set_gas(&GasEstimate::new(U256::from(50_000), U256::from(80_000), U256::from(21_000)));
        op.set_fees(FeeEstimate::new(U256::from(30), U256::from(2)));
        op.resolve().unwrap()
    }

    fn limits() -> UpperLimits {
        UpperLimits::new(U256::from(25_000), U256::from(40), U256::from(3))
    }

    fn eoa(index: usize, op: &UserOperation, commitment: GasCommitment) -> SignerContribution {
        let signer = &TEST_SIGNERS[index];
        let hash = limits().committed_hash(op, commitment, ENTRY_POINT, CHAIN_ID);
        let signature = signer.sign_message_sync(hash.as_slice()).unwrap();
        SignerContribution::eoa(
            signer.address(),
            signature.as_bytes().to_vec().into(),
            commitment,
        )
    }

    #[test]
    fn split_reproduces_contributions_in_order() {
        let op = op();
        let a = eoa(0, &op, GasCommitment::UpperBound);
        let b = SignerContribution::contract(
            Address::repeat_byte(0x0c),
            Bytes::from_static(&[1, 2, 3, 4, 5]),
            GasCommitment::UpperBound,
        );
        let aggregate = AggregatedSignature::new(limits(), vec![a.clone(), b.clone()]).unwrap();
        let encoded = aggregate.encode().unwrap();

        let split = AggregatedSignature::split(&encoded, 2, &op, ENTRY_POINT, CHAIN_ID).unwrap();
        assert_eq!(split.upper_limits(), &limits());
        assert_eq!(split.contributions(), &[a, b]);
    }

    #[test]
    fn actual_commitment_marks_v() {
        let op = op();
        let a = eoa(1, &op, GasCommitment::Actual);
        let c = SignerContribution::contract(
            Address::repeat_byte(0x0c),
            Bytes::from_static(&[9]),
            GasCommitment::Actual,
        );
        let encoded = AggregatedSignature::new(limits(), vec![a.clone(), c]).unwrap().encode().unwrap();

        assert_eq!(encoded[HEADER_LEN + 64], a.signature[64] + 32);
        assert_eq!(encoded[HEADER_LEN + SLOT_LEN + 64], 32);

        let split = AggregatedSignature::split(&encoded, 2, &op, ENTRY_POINT, CHAIN_ID).unwrap();
        assert_eq!(split.contributions()[0], a);
        assert_eq!(split.commitment(), GasCommitment::Actual);
    }

    #[test]
    fn contract_payload_layout() {
        let first = Bytes::from_static(&[0xaa; 3]);
        let second = Bytes::from_static(&[0xbb; 2]);
        let aggregate = AggregatedSignature::new(
            UpperLimits::default(),
            vec![
                SignerContribution::contract(Address::repeat_byte(1), first.clone(), GasCommitment::UpperBound),
                SignerContribution::contract(Address::repeat_byte(2), second.clone(), GasCommitment::UpperBound),
            ],
        )
        .unwrap();
        let encoded = aggregate.encode().unwrap();
        assert_eq!(encoded.len(), HEADER_LEN + 2 * SLOT_LEN + 32 + 3 + 32 + 2);

        let data = &encoded[HEADER_LEN..];
        // first slot: padded signer, then offset 130
        assert_eq!(&data[12..32], Address::repeat_byte(1).as_slice());
        assert_eq!(U256::from_be_slice(&data[32..64]), U256::from(130));
        // second slot points past the first payload and its length word
        assert_eq!(U256::from_be_slice(&data[SLOT_LEN + 32..SLOT_LEN + 64]), U256::from(165));
        assert_eq!(U256::from_be_slice(&data[165..197]), U256::from(2));
        assert_eq!(&data[197..199], second.as_ref());

        let split = AggregatedSignature::decode(&encoded, 2).unwrap();
        assert_eq!(split.slots[0].signature, first);
        assert_eq!(split.slots[1].signature, second);
        assert_eq!(split.slots[1].signer, Some(Address::repeat_byte(2)));
    }

    #[test]
    fn rejects_mixed_commitments() {
        let op = op();
        let err = AggregatedSignature::new(
            limits(),
            vec![eoa(0, &op, GasCommitment::UpperBound), eoa(1, &op, GasCommitment::Actual)],
        )
        .unwrap_err();
        assert!(matches!(err, AggregationError::MixedCommitments { .. }));
        assert_eq!(AggregatedSignature::new(limits(), vec![]), Err(AggregationError::Empty));
    }

    #[test]
    fn rejects_bad_blobs() {
        let op = op();
        let encoded = AggregatedSignature::new(limits(), vec![eoa(0, &op, GasCommitment::UpperBound)])
            .unwrap()
            .encode()
            .unwrap();

        assert!(matches!(
            AggregatedSignature::decode(&encoded, 2),
            Err(AggregationError::Truncated { .. })
        ));

        let mut corrupt = encoded.to_vec();
        corrupt[HEADER_LEN + 64] = 5;
        assert_eq!(
            AggregatedSignature::decode(&corrupt, 1).unwrap_err(),
            AggregationError::UnknownSlot { index: 0, v: 5 }
        );

        // A contract slot whose offset points past the end of memory.
        let mut blob = vec![0u8; HEADER_LEN + SLOT_LEN];
        let offset = U256::from(usize::MAX - 8);
        blob[HEADER_LEN + 32..HEADER_LEN + 64].copy_from_slice(&offset.to_be_bytes::<32>());
        assert_eq!(
            AggregatedSignature::decode(&blob, 1).unwrap_err(),
            AggregationError::BadOffset { index: 0, offset }
        );

        let short = SignerContribution::eoa(
            Address::ZERO,
            Bytes::from_static(&[1; 64]),
            GasCommitment::UpperBound,
        );
        assert!(matches!(
            AggregatedSignature::new(limits(), vec![short]).unwrap().encode(),
            Err(AggregationError::MalformedEoaSignature { .. })
        ));
    }

    #[test]
    fn sorting_by_signer() {
        let op = op();
        let contributions: Vec<_> =
            (0..3).map(|i| eoa(i, &op, GasCommitment::UpperBound)).collect();
        let sorted = AggregatedSignature::new(limits(), contributions).unwrap().sorted_by_signer();
        let signers: Vec<_> = sorted.signers().collect();
        let mut expected = signers.clone();
        expected.sort();
        assert_eq!(signers, expected);
    }
}
