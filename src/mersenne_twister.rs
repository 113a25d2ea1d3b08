//! The 64-bit Mersenne Twister (MT19937-64)
//!
//! Only used to derive the fixed Zobrist keys, so the exact output sequence
//! matters more than speed: a given seed must always produce the same keys.

use rand_core::{impls, RngCore, SeedableRng};

const STATE_SIZE: usize = 312;
const SHIFT_SIZE: usize = 156;
const MATRIX_A: u64 = 0xB502_6F5A_A966_19E9;
const UPPER_MASK: u64 = 0xFFFF_FFFF_8000_0000;
const LOWER_MASK: u64 = 0x7FFF_FFFF;

#[derive(Clone)]
pub struct MersenneTwister64 {
    state: [u64; STATE_SIZE],
    index: usize,
}

impl MersenneTwister64 {
    pub fn new(seed: u64) -> Self {
        let mut state = [0; STATE_SIZE];
        state[0] = seed;
        for i in 1..STATE_SIZE {
            state[i] = 6_364_136_223_846_793_005u64
                .wrapping_mul(state[i - 1] ^ (state[i - 1] >> 62))
                .wrapping_add(i as u64);
        }
        Self {
            state,
            // force a twist on the first draw
            index: STATE_SIZE,
        }
    }

    fn twist(&mut self) {
        for i in 0..STATE_SIZE {
            let x = (self.state[i] & UPPER_MASK) | (self.state[(i + 1) % STATE_SIZE] & LOWER_MASK);
            let mut x_a = x >> 1;
            if x & 1 != 0 {
                x_a ^= MATRIX_A;
            }
            self.state[i] = self.state[(i + SHIFT_SIZE) % STATE_SIZE] ^ x_a;
        }
        self.index = 0;
    }

    pub fn generate(&mut self) -> u64 {
        if self.index >= STATE_SIZE {
            self.twist();
        }

        let mut y = self.state[self.index];
        y ^= (y >> 29) & 0x5555_5555_5555_5555;
        y ^= (y << 17) & 0x71D6_7FFF_EDA6_0000;
        y ^= (y << 37) & 0xFFF7_EEE0_0000_0000;
        y ^= y >> 43;

        self.index += 1;
        y
    }
}

impl RngCore for MersenneTwister64 {
    fn next_u32(&mut self) -> u32 {
        (self.generate() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.generate()
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        impls::fill_bytes_via_next(self, dst)
    }
}

impl SeedableRng for MersenneTwister64 {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u64::from_le_bytes(seed))
    }

    fn seed_from_u64(state: u64) -> Self {
        Self::new(state)
    }
}
