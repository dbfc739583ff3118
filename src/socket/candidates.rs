//! Ordering of resolved addresses into connection candidates.

use crate::base::neterror::NetError;
use crate::dns::ResolvedAddress;

/// One address to attempt, borrowed from the resolved list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub address: &'a ResolvedAddress,
    /// Position in the raw resolved list.
    pub raw_index: usize,
}

/// The ordered set of addresses a race will attempt.
///
/// Built from the raw resolved list by dropping excluded addresses, moving
/// addresses that match a preferred entry to the front (in preferred-list
/// order), and then, unless pinned, appending the rest in resolver order.
#[derive(Clone, Debug)]
pub struct CandidateSet<'a> {
    candidates: Vec<Candidate<'a>>,
    raw_len: usize,
}

impl<'a> CandidateSet<'a> {
    /// Builds the attempt order.
    ///
    /// Fails with [`NetError::NoCandidates`] when nothing is left to attempt.
    pub fn build(
        raw: &'a [ResolvedAddress],
        preferred: &[ResolvedAddress],
        excluded: &[ResolvedAddress],
        pin_to_preferred: bool,
    ) -> Result<Self, NetError> {
        let mut taken: Vec<bool> = raw
            .iter()
            .map(|address| excluded.iter().any(|ex| ex.same_address(address)))
            .collect();

        let mut candidates = Vec::new();
        candidates
            .try_reserve_exact(raw.len())
            .map_err(|_| NetError::OutOfMemory)?;

        for pref in preferred {
            for (raw_index, address) in raw.iter().enumerate() {
                if !taken[raw_index] && pref.same_address(address) {
                    taken[raw_index] = true;
                    candidates.push(Candidate { address, raw_index });
                }
            }
        }

        if !pin_to_preferred {
            for (raw_index, address) in raw.iter().enumerate() {
                if !taken[raw_index] {
                    candidates.push(Candidate { address, raw_index });
                }
            }
        }

        if candidates.is_empty() {
            tracing::debug!(
                raw = raw.len(),
                excluded = excluded.len(),
                pinned = pin_to_preferred,
                "no usable candidates"
            );
            return Err(NetError::NoCandidates);
        }

        Ok(Self {
            candidates,
            raw_len: raw.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Always false for a successfully built set.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Length of the resolved list the set was built from, before exclusion.
    pub fn raw_len(&self) -> usize {
        self.raw_len
    }

    pub fn get(&self, index: usize) -> Option<&Candidate<'a>> {
        self.candidates.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate<'a>> {
        self.candidates.iter()
    }
}

impl<'a> std::ops::Index<usize> for CandidateSet<'a> {
    type Output = Candidate<'a>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.candidates[index]
    }
}
