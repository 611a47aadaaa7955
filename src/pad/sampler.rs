use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::SwanError;

/// One line of a PAD list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PadEntry {
    pub path: String,
    pub client: String,
    pub attack_type: Option<String>,
}

/// Size of one bucket, absolute or relative to the pool it is cut from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Amount {
    Count(usize),
    Ratio(f64),
}

impl Amount {
    fn is_zero(&self) -> bool {
        match *self {
            Amount::Count(count) => count == 0,
            Amount::Ratio(ratio) => ratio <= 0.0,
        }
    }
}

/// Turns the amounts of one split into slot counts, in bucket order.
///
/// Ratios are rounded on their running total rather than one by one, so
/// ratios summing to at most 1 never ask for more than the pool holds.
struct Apportion {
    pool: usize,
    ratio: f64,
    ratio_slots: usize,
}

impl Apportion {
    fn new(pool: usize) -> Self {
        Self {
            pool,
            ratio: 0.0,
            ratio_slots: 0,
        }
    }

    fn slots(&mut self, amount: Amount) -> usize {
        match amount {
            Amount::Count(count) => count,
            Amount::Ratio(ratio) => {
                self.ratio += ratio;
                let end = (self.ratio * self.pool as f64).round() as usize;
                let slots = end.saturating_sub(self.ratio_slots);
                self.ratio_slots = self.ratio_slots.max(end);
                slots
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub train: Amount,
    pub dev: Amount,
    pub eval: Amount,
}

impl Split {
    pub const fn ratios(train: f64, dev: f64, eval: f64) -> Self {
        Self {
            train: Amount::Ratio(train),
            dev: Amount::Ratio(dev),
            eval: Amount::Ratio(eval),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PadBuckets {
    pub train: Vec<PadEntry>,
    pub dev: Vec<PadEntry>,
    pub eval: Vec<PadEntry>,
}

impl PadBuckets {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &[PadEntry])> + '_ {
        [
            ("train", self.train.as_slice()),
            ("dev", self.dev.as_slice()),
            ("eval", self.eval.as_slice()),
        ]
        .into_iter()
    }
}

/// Candidate recordings of one PAD protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PadPools {
    /// Real recordings from the primary sessions.
    pub real: Vec<PadEntry>,
    /// Real recordings from the other sessions; always appended to eval.
    pub remainder: Vec<PadEntry>,
    pub attack: Vec<PadEntry>,
}

/// One resampled repetition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PadSplit {
    pub real: PadBuckets,
    pub attack: PadBuckets,
}

fn cut(
    protocol: &str,
    kind: &str,
    pool: &[PadEntry],
    split: &Split,
    rng: &mut ChaCha8Rng,
) -> Result<PadBuckets, SwanError> {
    let mut shuffled = pool.to_vec();
    shuffled.shuffle(rng);

    let mut apportion = Apportion::new(pool.len());
    let mut start = 0;
    let mut take = |bucket: &str, amount: Amount| -> Result<Vec<PadEntry>, SwanError> {
        // An empty pool never satisfies a bucket that asks for something.
        let requested = match apportion.slots(amount) {
            0 if shuffled.is_empty() && !amount.is_zero() => 1,
            slots => slots,
        };
        let end = start + requested;
        if end > shuffled.len() {
            return Err(SwanError::InsufficientPoolSize {
                protocol: protocol.to_string(),
                bucket: format!("{} {}", kind, bucket),
                requested,
                available: shuffled.len() - start,
            });
        }
        let mut slice = shuffled[start..end].to_vec();
        slice.sort();
        start = end;
        Ok(slice)
    };

    Ok(PadBuckets {
        train: take("train", split.train)?,
        dev: take("dev", split.dev)?,
        eval: take("eval", split.eval)?,
    })
}

/// Draws repetition `k`. The generator is seeded with `seed + k`, real
/// recordings are shuffled first and attacks second.
pub fn sample(
    protocol: &str,
    pools: &PadPools,
    real: &Split,
    attack: &Split,
    seed: u64,
    k: usize,
) -> Result<PadSplit, SwanError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(k as u64));

    let mut real_buckets = cut(protocol, "real", &pools.real, real, &mut rng)?;
    real_buckets.eval.extend(pools.remainder.iter().cloned());
    real_buckets.eval.sort();

    let attack_buckets = cut(protocol, "attack", &pools.attack, attack, &mut rng)?;

    Ok(PadSplit {
        real: real_buckets,
        attack: attack_buckets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(prefix: &str, count: usize, attack: Option<&str>) -> Vec<PadEntry> {
        (0..count)
            .map(|i| PadEntry {
                path: format!("{}/{:04}", prefix, i),
                client: format!("IDIAP_{:05}", i % 10 + 1),
                attack_type: attack.map(str::to_string),
            })
            .collect()
    }

    fn pools() -> PadPools {
        PadPools {
            real: entries("real", 100, None),
            remainder: entries("remainder", 40, None),
            attack: entries("attack", 60, Some("PA.F.1")),
        }
    }

    const SPLIT: Split = Split::ratios(0.5, 0.2, 0.3);

    #[test]
    fn test_eval_includes_remainder() {
        let split = sample("pad-voice", &pools(), &SPLIT, &SPLIT, 7, 0).unwrap();
        assert_eq!(split.real.train.len(), 50);
        assert_eq!(split.real.dev.len(), 20);
        assert_eq!(split.real.eval.len(), 30 + 40);
        assert_eq!(split.attack.train.len(), 30);
        assert_eq!(split.attack.dev.len(), 12);
        assert_eq!(split.attack.eval.len(), 18);
    }

    #[test]
    fn test_buckets_are_disjoint() {
        let split = sample("pad-voice", &pools(), &SPLIT, &SPLIT, 7, 3).unwrap();
        let mut all: Vec<_> = split.real.iter().flat_map(|(_, e)| e.to_vec()).collect();
        let total = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), total);
    }

    #[test]
    fn test_sampling_is_deterministic() {
        let first = sample("pad-voice", &pools(), &SPLIT, &SPLIT, 42, 1).unwrap();
        let second = sample("pad-voice", &pools(), &SPLIT, &SPLIT, 42, 1).unwrap();
        assert_eq!(first, second);

        let other = sample("pad-voice", &pools(), &SPLIT, &SPLIT, 42, 2).unwrap();
        assert_ne!(first.real.train, other.real.train);
    }

    #[test]
    fn test_counts_and_shortfall() {
        let counts = Split {
            train: Amount::Count(40),
            dev: Amount::Count(30),
            eval: Amount::Count(30),
        };
        let split = sample("pad-voice", &pools(), &counts, &SPLIT, 0, 0).unwrap();
        assert_eq!(split.real.eval.len(), 70);

        let greedy = Split {
            eval: Amount::Count(31),
            ..counts
        };
        assert_eq!(
            sample("pad-voice", &pools(), &greedy, &SPLIT, 0, 0),
            Err(SwanError::InsufficientPoolSize {
                protocol: "pad-voice".to_string(),
                bucket: "real eval".to_string(),
                requested: 31,
                available: 30,
            })
        );
    }

    #[test]
    fn test_ratios_fill_every_pool_size() {
        for size in 1..=50 {
            let pools = PadPools {
                real: entries("real", size, None),
                remainder: Vec::new(),
                attack: entries("attack", size, Some("PA.F.1")),
            };
            let split = sample("pad-voice", &pools, &SPLIT, &SPLIT, 3, 0)
                .unwrap_or_else(|e| panic!("pool of {}: {}", size, e));
            for buckets in [&split.real, &split.attack] {
                let total: usize = buckets.iter().map(|(_, e)| e.len()).sum();
                assert_eq!(total, size, "pool of {}", size);
            }
        }

        let split = sample("pad-voice", &pools(), &SPLIT, &SPLIT, 0, 0).unwrap();
        assert_eq!(split.real.train.len(), 50);

        // Ratios above 1 still overrun the pool.
        let greedy = Split::ratios(0.6, 0.3, 0.3);
        assert!(matches!(
            sample("pad-voice", &pools(), &greedy, &SPLIT, 0, 0),
            Err(SwanError::InsufficientPoolSize { .. })
        ));
    }

    #[test]
    fn test_empty_pool_fails() {
        let pools = PadPools {
            real: entries("real", 10, None),
            remainder: Vec::new(),
            attack: Vec::new(),
        };
        assert_eq!(
            sample("pad-face", &pools, &SPLIT, &SPLIT, 0, 0),
            Err(SwanError::InsufficientPoolSize {
                protocol: "pad-face".to_string(),
                bucket: "attack train".to_string(),
                requested: 1,
                available: 0,
            })
        );

        // Nothing asked of an empty pool is fine.
        let nothing = Split::ratios(0.0, 0.0, 0.0);
        let split = sample("pad-face", &pools, &SPLIT, &nothing, 0, 0).unwrap();
        assert!(split.attack.eval.is_empty());
    }
}
