/// Cheap anti-collision jitter: two multiply-with-carry generators folded
/// with a running sum of live timer samples. Not suitable for key material.
#[derive(Debug, Clone)]
pub struct Jitter {
    v1: u32,
    v2: u32,
    seed: u32,
}

impl Jitter {
    pub fn new(seed: u32) -> Self {
        Self {
            v1: 0x52f7_d319,
            v2: 0x6e28_014a,
            seed,
        }
    }

    /// Returns a value in `[0, range)`; `range == 0` yields 0.
    pub fn next(&mut self, range: u32, timer: u32) -> u32 {
        self.seed = self.seed.wrapping_add(timer);

        // MWC generators, combined period 1014595583
        self.v1 = 36969u32
            .wrapping_mul(self.v1 & 0xFFFF)
            .wrapping_add(self.v1 >> 16);
        self.v2 = 30963u32
            .wrapping_mul(self.v2 & 0xFFFF)
            .wrapping_add(self.v2 >> 16);

        if range == 0 {
            return 0;
        }
        ((self.v1 << 16) ^ self.v2 ^ self.seed) % range
    }
}
