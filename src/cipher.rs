// XXTEA ("corrected block TEA") over whole beacon frames.
//
// Frame bytes are taken as big-endian 32-bit words so tags of either
// endianness agree on the ciphertext.

/// Number of 32-bit cipher blocks in one beacon frame.
pub const CIPHER_BLOCK_COUNT: usize = 4;
pub const CIPHER_FRAME_SIZE: usize = CIPHER_BLOCK_COUNT * 4;

const DELTA: u32 = 0x9E37_79B9;

/// Symmetric in-place block cipher; the same key encrypts and decrypts.
pub trait BlockCipher {
    fn encrypt_blocks(&self, blocks: &mut [u32]);
    fn decrypt_blocks(&self, blocks: &mut [u32]);

    fn encrypt_frame(&self, frame: &mut [u8; CIPHER_FRAME_SIZE]) {
        let mut blocks = to_blocks(frame);
        self.encrypt_blocks(&mut blocks);
        from_blocks(&blocks, frame);
    }

    fn decrypt_frame(&self, frame: &mut [u8; CIPHER_FRAME_SIZE]) {
        let mut blocks = to_blocks(frame);
        self.decrypt_blocks(&mut blocks);
        from_blocks(&blocks, frame);
    }
}

fn to_blocks(frame: &[u8; CIPHER_FRAME_SIZE]) -> [u32; CIPHER_BLOCK_COUNT] {
    let mut blocks = [0u32; CIPHER_BLOCK_COUNT];
    for (block, chunk) in blocks.iter_mut().zip(frame.chunks_exact(4)) {
        *block = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    blocks
}

fn from_blocks(blocks: &[u32; CIPHER_BLOCK_COUNT], frame: &mut [u8; CIPHER_FRAME_SIZE]) {
    for (block, chunk) in blocks.iter().zip(frame.chunks_exact_mut(4)) {
        chunk.copy_from_slice(&block.to_be_bytes());
    }
}

#[derive(Debug, Clone)]
pub struct Xxtea {
    key: [u32; 4],
}

impl Xxtea {
    pub fn new(key: [u32; 4]) -> Self {
        Self { key }
    }

    #[inline]
    fn mx(&self, sum: u32, y: u32, z: u32, p: usize, e: usize) -> u32 {
        ((z >> 5 ^ y << 2).wrapping_add(y >> 3 ^ z << 4))
            ^ ((sum ^ y).wrapping_add(self.key[(p & 3) ^ e] ^ z))
    }
}

impl BlockCipher for Xxtea {
    fn encrypt_blocks(&self, v: &mut [u32]) {
        let n = v.len();
        if n < 2 {
            return;
        }

        let mut rounds = 6 + 52 / n;
        let mut sum: u32 = 0;
        let mut z = v[n - 1];
        while rounds > 0 {
            sum = sum.wrapping_add(DELTA);
            let e = ((sum >> 2) & 3) as usize;
            for p in 0..n {
                let y = v[(p + 1) % n];
                v[p] = v[p].wrapping_add(self.mx(sum, y, z, p, e));
                z = v[p];
            }
            rounds -= 1;
        }
    }

    fn decrypt_blocks(&self, v: &mut [u32]) {
        let n = v.len();
        if n < 2 {
            return;
        }

        let mut rounds = 6 + 52 / n;
        let mut sum = (rounds as u32).wrapping_mul(DELTA);
        let mut y = v[0];
        while rounds > 0 {
            let e = ((sum >> 2) & 3) as usize;
            for p in (0..n).rev() {
                let z = if p > 0 { v[p - 1] } else { v[n - 1] };
                v[p] = v[p].wrapping_sub(self.mx(sum, y, z, p, e));
                y = v[p];
            }
            sum = sum.wrapping_sub(DELTA);
            rounds -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_KEY;

    #[test]
    fn reference_vector_zero_key() {
        let cipher = Xxtea::new([0; 4]);
        let mut v = [0u32, 0];
        cipher.encrypt_blocks(&mut v);
        assert_eq!(v, [0x0537_04ab, 0x575d_8c80]);
        cipher.decrypt_blocks(&mut v);
        assert_eq!(v, [0, 0]);
    }

    #[test]
    fn known_answer_with_default_key() {
        let cipher = Xxtea::new(DEFAULT_KEY);
        let mut v = [0u32, 1, 2, 3];
        cipher.encrypt_blocks(&mut v);
        assert_eq!(v, [0xde03_76d8, 0xc87a_c36c, 0x3c18_2fcf, 0x6a3c_143b]);
    }

    #[test]
    fn frame_round_trip() {
        let cipher = Xxtea::new(DEFAULT_KEY);
        let plain: [u8; CIPHER_FRAME_SIZE] = core::array::from_fn(|i| i as u8 * 17);
        let mut frame = plain;
        cipher.encrypt_frame(&mut frame);
        assert_ne!(frame, plain);
        cipher.decrypt_frame(&mut frame);
        assert_eq!(frame, plain);
    }

    #[test]
    fn frame_words_are_big_endian() {
        let cipher = Xxtea::new(DEFAULT_KEY);
        // words [0, 1, 2, 3]
        let mut frame = [0u8; CIPHER_FRAME_SIZE];
        frame[7] = 1;
        frame[11] = 2;
        frame[15] = 3;
        cipher.encrypt_frame(&mut frame);
        assert_eq!(&frame[..4], &0xde03_76d8u32.to_be_bytes());
        assert_eq!(&frame[12..], &0x6a3c_143bu32.to_be_bytes());
    }

    #[test]
    fn wrong_key_does_not_decrypt() {
        let plain = [0x55u8; CIPHER_FRAME_SIZE];
        let mut frame = plain;
        Xxtea::new(DEFAULT_KEY).encrypt_frame(&mut frame);
        Xxtea::new([1, 2, 3, 4]).decrypt_frame(&mut frame);
        assert_ne!(frame, plain);
    }
}
