//! Small Bloom filter used by the discoverer to suppress duplicate
//! `on_endpoint_found` callbacks for the same advertisement observed across
//! multiple scan passes (SPEC_FULL.md data-model supplement).
//!
//! Grounded in `cpp/core_v2/internal/mediums/bloom_filter.h`: a fixed-size
//! bit array with a handful of independent hash repetitions derived from a
//! single 32-bit hash, rather than pulling in a generic crate for something
//! this small.

const HASHER_REPETITIONS: usize = 5;

#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: Vec<bool>,
}

impl BloomFilter {
    pub fn with_capacity_bytes(capacity_bytes: usize) -> Self {
        Self {
            bits: vec![false; capacity_bytes * 8],
        }
    }

    pub fn insert(&mut self, value: &str) {
        for hash in self.hashes(value) {
            let len = self.bits.len();
            self.bits[hash % len] = true;
        }
    }

    pub fn possibly_contains(&self, value: &str) -> bool {
        self.hashes(value)
            .into_iter()
            .all(|hash| self.bits[hash % self.bits.len()])
    }

    /// Derives `HASHER_REPETITIONS` independent-enough hash values from one
    /// 32-bit FNV-1a hash, using Kirsch-Mitzenmacher double hashing.
    fn hashes(&self, value: &str) -> Vec<usize> {
        let h1 = fnv1a(value, 0x811c_9dc5);
        let h2 = fnv1a(value, 0xcbf2_9ce4);
        (0..HASHER_REPETITIONS)
            .map(|i| h1.wrapping_add((i as u32).wrapping_mul(h2)) as usize)
            .collect()
    }
}

fn fnv1a(value: &str, seed: u32) -> u32 {
    let mut hash = seed;
    for byte in value.as_bytes() {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserted_values_are_found() {
        let mut filter = BloomFilter::with_capacity_bytes(64);
        filter.insert("E0AB:deviceA");
        assert!(filter.possibly_contains("E0AB:deviceA"));
    }

    #[test]
    fn unrelated_values_are_usually_absent() {
        let mut filter = BloomFilter::with_capacity_bytes(256);
        for i in 0..20 {
            filter.insert(&format!("endpoint-{i}"));
        }
        assert!(!filter.possibly_contains("never-inserted"));
    }
}
