use crate::{OperationState, Paymaster, PipelineError};
use alloy::primitives::{Address, Bytes};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::{debug, instrument};
use userop_bundler::{GasOverrides, SponsorshipRequest, SponsorshipResponse};
use userop_constants::DEFAULT_SPONSORSHIP_CACHE_CAPACITY;
use userop_types::{
    FeeOptions, OperationFingerprint, OperationOverrides, PendingOperation, Sponsorship,
    SponsorshipOverride, SponsorshipPolicy,
};

/// A small LRU of paymaster responses keyed by operation fingerprint.
///
/// The stub sponsorship request made while building an operation returns
/// gas, fees and paymaster data in one round trip. The response is kept
/// here so the final sponsorship stage can reuse it instead of asking
/// again. An entry is removed once consumed.
#[derive(Debug)]
pub struct SponsorshipCache {
    entries: Mutex<VecDeque<(OperationFingerprint, SponsorshipResponse)>>,
    capacity: usize,
}

impl Default for SponsorshipCache {
    fn default() -> Self {
        Self::new(DEFAULT_SPONSORSHIP_CACHE_CAPACITY)
    }
}

impl SponsorshipCache {
    /// Create a cache holding at most `capacity` responses.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { entries: Mutex::new(VecDeque::with_capacity(capacity)), capacity }
    }

    /// Store a response, evicting the least recently used entry when full.
    pub fn insert(&self, fingerprint: OperationFingerprint, response: SponsorshipResponse) {
        let mut entries = self.entries.lock();
        entries.retain(|(key, _)| *key != fingerprint);
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back((fingerprint, response));
    }

    /// Read a response without consuming it. Marks the entry as recently
    /// used.
    pub fn peek(&self, fingerprint: &OperationFingerprint) -> Option<SponsorshipResponse> {
        let mut entries = self.entries.lock();
        let index = entries.iter().position(|(key, _)| key == fingerprint)?;
        let entry = entries.remove(index)?;
        let response = entry.1.clone();
        entries.push_back(entry);
        Some(response)
    }

    /// Remove and return a response.
    pub fn take(&self, fingerprint: &OperationFingerprint) -> Option<SponsorshipResponse> {
        let mut entries = self.entries.lock();
        let index = entries.iter().position(|(key, _)| key == fingerprint)?;
        entries.remove(index).map(|(_, response)| response)
    }

    /// The number of stored responses.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// The sponsorship stage of one pipeline run.
///
/// Makes the stub request while the operation is built, and the final
/// request (or cache lookup) once gas and fees are known. Both are skipped
/// when no policy applies or the caller overrides the sponsorship.
#[derive(Debug)]
pub struct SponsorshipStage<'a, P> {
    paymaster: &'a P,
    policy: Option<&'a SponsorshipPolicy>,
    entry_point: Address,
    fee_options: &'a FeeOptions,
    cache: SponsorshipCache,
}

impl<'a, P> SponsorshipStage<'a, P> {
    /// Create a stage with an empty cache.
    pub fn new(
        paymaster: &'a P,
        policy: Option<&'a SponsorshipPolicy>,
        entry_point: Address,
        fee_options: &'a FeeOptions,
    ) -> Self {
        Self { paymaster, policy, entry_point, fee_options, cache: SponsorshipCache::default() }
    }

    /// Get the cache.
    pub const fn cache(&self) -> &SponsorshipCache {
        &self.cache
    }

    /// The sponsorship to use without asking the paymaster, if any.
    pub fn bypass(&self, op: &PendingOperation, overrides: &OperationOverrides) -> Option<Sponsorship> {
        match &overrides.sponsorship {
            Some(SponsorshipOverride::Fixed(sponsorship)) => Some(sponsorship.clone()),
            Some(SponsorshipOverride::SelfSponsored) => Some(Sponsorship::none(op.version())),
            None if self.policy.is_none() => Some(Sponsorship::none(op.version())),
            None => None,
        }
    }

    fn request(
        &self,
        policy: &SponsorshipPolicy,
        op: &PendingOperation,
        dummy_signature: &Bytes,
        overrides: &OperationOverrides,
    ) -> Result<SponsorshipRequest, PipelineError> {
        Ok(SponsorshipRequest {
            policy_id: policy.policy_id.clone(),
            entry_point: self.entry_point,
            user_operation: op.to_placeholder()?,
            dummy_signature: dummy_signature.clone(),
            overrides: GasOverrides::from_overrides(overrides, self.fee_options),
        })
    }
}

impl<P> SponsorshipStage<'_, P>
where
    P: Paymaster + Sync,
{
    async fn round_trip(
        &self,
        op: &PendingOperation,
        dummy_signature: &Bytes,
        overrides: &OperationOverrides,
        stage: OperationState,
    ) -> Result<Option<SponsorshipResponse>, PipelineError> {
        let Some(policy) = self.policy else { return Ok(None) };
        let request = self.request(policy, op, dummy_signature, overrides)?;
        self.paymaster
            .request_sponsorship(&request)
            .await
            .map(Some)
            .map_err(PipelineError::stage(stage))
    }

    /// Issue the stub request and cache the response. Returns the
    /// sponsorship to attach while gas is estimated.
    #[instrument(skip_all, fields(fingerprint = %op.fingerprint()))]
    pub async fn stub(
        &self,
        op: &PendingOperation,
        dummy_signature: &Bytes,
        overrides: &OperationOverrides,
    ) -> Result<Sponsorship, PipelineError> {
        if let Some(sponsorship) = self.bypass(op, overrides) {
            debug!(sponsored = sponsorship.is_sponsored(), "sponsorship bypassed");
            return Ok(sponsorship);
        }
        match self.round_trip(op, dummy_signature, overrides, OperationState::Building).await? {
            Some(response) => {
                let sponsorship = response.sponsorship.clone();
                self.cache.insert(op.fingerprint(), response);
                Ok(sponsorship)
            }
            None => Ok(Sponsorship::none(op.version())),
        }
    }

    /// Resolve the final sponsorship. Reuses and clears the cached stub
    /// response for the same fingerprint, or asks the paymaster again with
    /// the operation's resolved fees pinned.
    #[instrument(skip_all, fields(fingerprint = %op.fingerprint()))]
    pub async fn finalize(
        &self,
        op: &PendingOperation,
        dummy_signature: &Bytes,
        overrides: &OperationOverrides,
    ) -> Result<SponsorshipOutcome, PipelineError> {
        if let Some(sponsorship) = self.bypass(op, overrides) {
            return Ok(SponsorshipOutcome::Bypassed(sponsorship));
        }
        if let Some(response) = self.cache.take(&op.fingerprint()) {
            debug!("sponsorship cache hit");
            return Ok(SponsorshipOutcome::Cached(response));
        }
        debug!("sponsorship cache miss");
        let pinned = match op.fees() {
            Some(fees) => overrides.clone().with_fees(fees),
            None => overrides.clone(),
        };
        Ok(match self.round_trip(op, dummy_signature, &pinned, OperationState::Sponsored).await? {
            Some(response) => SponsorshipOutcome::Fetched(response),
            None => SponsorshipOutcome::Bypassed(Sponsorship::none(op.version())),
        })
    }
}

/// How the final sponsorship was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SponsorshipOutcome {
    /// No paymaster was asked.
    Bypassed(Sponsorship),
    /// The stub response was reused.
    Cached(SponsorshipResponse),
    /// The paymaster was asked again, after gas and fees were resolved.
    Fetched(SponsorshipResponse),
}

impl SponsorshipOutcome {
    /// The sponsorship to attach.
    pub const fn sponsorship(&self) -> &Sponsorship {
        match self {
            Self::Bypassed(sponsorship) => sponsorship,
            Self::Cached(response) | Self::Fetched(response) => &response.sponsorship,
        }
    }
}

/// A [`Paymaster`] for senders that never use sponsorship.
///
/// Requests fail, so pair it with a configuration that has no policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSponsorship;

/// Returned by [`NoSponsorship`] for every request.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("no paymaster is configured")]
pub struct NoPaymasterError;

impl Paymaster for NoSponsorship {
    type Error = NoPaymasterError;

    async fn request_sponsorship(
        &self,
        _request: &SponsorshipRequest,
    ) -> Result<SponsorshipResponse, Self::Error> {
        Err(NoPaymasterError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;
    use userop_constants::EntryPointVersion;

    fn fingerprint(nonce: u64) -> OperationFingerprint {
        OperationFingerprint::new(Address::repeat_byte(0xac), U256::from(nonce), &[])
    }

    fn response(tag: u8) -> SponsorshipResponse {
        SponsorshipResponse {
            gas: None,
            fees: None,
            sponsorship: Sponsorship::V06 { paymaster_and_data: Bytes::from(vec![tag; 20]) },
        }
    }

    #[test]
    fn take_consumes() {
        let cache = SponsorshipCache::default();
        cache.insert(fingerprint(0), response(1));

        assert_eq!(cache.peek(&fingerprint(0)), Some(response(1)));
        assert_eq!(cache.take(&fingerprint(0)), Some(response(1)));
        assert_eq!(cache.take(&fingerprint(0)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = SponsorshipCache::new(2);
        cache.insert(fingerprint(0), response(0));
        cache.insert(fingerprint(1), response(1));
        // touch 0 so 1 is the oldest
        cache.peek(&fingerprint(0));
        cache.insert(fingerprint(2), response(2));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.peek(&fingerprint(1)), None);
        assert_eq!(cache.peek(&fingerprint(0)), Some(response(0)));
        assert_eq!(cache.peek(&fingerprint(2)), Some(response(2)));
    }

    #[test]
    fn reinsert_replaces() {
        let cache = SponsorshipCache::new(2);
        cache.insert(fingerprint(0), response(0));
        cache.insert(fingerprint(0), response(9));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.take(&fingerprint(0)), Some(response(9)));
    }

    #[test]
    fn bypass_rules() {
        let policy = SponsorshipPolicy::new("policy");
        let options = FeeOptions::default();
        let op = PendingOperation::new(EntryPointVersion::V07, Address::ZERO, U256::ZERO, Bytes::new());

        let unsponsored = SponsorshipStage::new(&NoSponsorship, None, Address::ZERO, &options);
        assert_eq!(
            unsponsored.bypass(&op, &OperationOverrides::new()),
            Some(Sponsorship::none(EntryPointVersion::V07))
        );

        let sponsored = SponsorshipStage::new(&NoSponsorship, Some(&policy), Address::ZERO, &options);
        assert_eq!(sponsored.bypass(&op, &OperationOverrides::new()), None);
        let opted_out = OperationOverrides::new().with_sponsorship(SponsorshipOverride::SelfSponsored);
        assert_eq!(
            sponsored.bypass(&op, &opted_out),
            Some(Sponsorship::none(EntryPointVersion::V07))
        );
    }
}
