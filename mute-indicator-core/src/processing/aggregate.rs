/// Bytes per signed 16-bit sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Normalize a signed 16-bit sample to `[-1.0, 1.0)`.
#[inline]
pub fn normalize_i16(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

/// Arithmetic mean of the normalized amplitudes in a 16-bit LE PCM buffer.
///
/// Channels are not separated; every sample counts once. A trailing odd
/// byte is ignored. Returns `None` when the buffer holds no complete sample.
pub fn pcm16_mean(bytes: &[u8]) -> Option<f32> {
    let chunks = bytes.chunks_exact(BYTES_PER_SAMPLE);
    let count = chunks.len();
    if count == 0 {
        return None;
    }

    let sum: f32 = chunks
        .map(|pair| normalize_i16(i16::from_le_bytes([pair[0], pair[1]])))
        .sum();

    Some(sum / count as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn to_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn normalize_range() {
        assert_eq!(normalize_i16(0), 0.0);
        assert_eq!(normalize_i16(i16::MIN), -1.0);
        assert!(normalize_i16(i16::MAX) < 1.0);
        assert_relative_eq!(normalize_i16(16384), 0.5);
    }

    #[test]
    fn mean_of_constant_buffer() {
        let bytes = to_bytes(&[16384; 480]);
        assert_relative_eq!(pcm16_mean(&bytes).unwrap(), 0.5);
    }

    #[test]
    fn mean_cancels_symmetric_signal() {
        let bytes = to_bytes(&[8192, -8192, 8192, -8192]);
        assert_relative_eq!(pcm16_mean(&bytes).unwrap(), 0.0);
    }

    #[test]
    fn mean_reads_little_endian() {
        // 0x0100 = 256 little-endian, 0x0001 would be big-endian
        let bytes = [0x00, 0x01];
        assert_relative_eq!(pcm16_mean(&bytes).unwrap(), 256.0 / 32768.0);
    }

    #[test]
    fn trailing_odd_byte_is_ignored() {
        let mut bytes = to_bytes(&[-16384, -16384]);
        bytes.push(0x7f);
        assert_relative_eq!(pcm16_mean(&bytes).unwrap(), -0.5);
    }

    #[test]
    fn empty_buffer_has_no_mean() {
        assert_eq!(pcm16_mean(&[]), None);
        assert_eq!(pcm16_mean(&[0x12]), None);
    }
}
