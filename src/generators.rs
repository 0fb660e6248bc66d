use num_bigint::BigInt;

use crate::sequence::{Generator, IndexFunction, TermSource};

pub fn naturals() -> TermSource {
    TermSource {
        generator: Some(Generator::new(|| (1u64..).map(BigInt::from))),
        index_function: Some(IndexFunction::new(|n| (n >= 1).then(|| BigInt::from(n)))),
    }
}

pub fn primes() -> TermSource {
    TermSource {
        generator: Some(Generator::new(|| Primes::default().map(BigInt::from))),
        index_function: Some(IndexFunction::new(nth_prime)),
    }
}

fn nth_prime(n: i64) -> Option<BigInt> {
    let skip = usize::try_from(n.checked_sub(1)?).ok()?;
    Primes::default().nth(skip).map(BigInt::from)
}

#[derive(Debug, Default)]
struct Primes {
    found: Vec<u64>,
    candidate: u64,
}

impl Iterator for Primes {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        loop {
            let candidate = self.candidate.max(2);
            self.candidate = candidate.checked_add(1)?;
            let is_prime = self
                .found
                .iter()
                .take_while(|&&p| p * p <= candidate)
                .all(|&p| candidate % p != 0);
            if is_prime {
                self.found.push(candidate);
                return Some(candidate);
            }
        }
    }
}
