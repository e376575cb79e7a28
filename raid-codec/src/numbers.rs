use crate::{Decode, DecodeError, Encode, EncodeError, Endianness};

macro_rules! impl_encode_decode {
    ($($t:ty),*) => {
        $(
            impl Encode for $t {
                fn encode(&self, endianness: Endianness, target: &mut [u8]) -> Result<usize, EncodeError> {
                    const SIZE: usize = core::mem::size_of::<$t>();
                    if target.len() < SIZE {
                        return Err(EncodeError::BufferTooSmall);
                    }
                    let bytes = match endianness {
                        Endianness::Little => self.to_le_bytes(),
                        Endianness::Big => self.to_be_bytes(),
                    };
                    target[..SIZE].copy_from_slice(&bytes);
                    Ok(SIZE)
                }
            }

            impl Decode for $t {
                fn decode(endianness: Endianness, input: &[u8]) -> Result<(Self, usize), DecodeError> {
                    const SIZE: usize = core::mem::size_of::<$t>();
                    if input.len() < SIZE {
                        return Err(DecodeError::BufferTooSmall);
                    }
                    let mut bytes = [0u8; SIZE];
                    bytes.copy_from_slice(&input[..SIZE]);
                    let value = match endianness {
                        Endianness::Little => <$t>::from_le_bytes(bytes),
                        Endianness::Big => <$t>::from_be_bytes(bytes),
                    };
                    Ok((value, SIZE))
                }
            }
        )*
    };
}

impl_encode_decode!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128);

impl<const N: usize> Encode for [u8; N] {
    fn encode(&self, _endianness: Endianness, target: &mut [u8]) -> Result<usize, EncodeError> {
        if target.len() < N {
            return Err(EncodeError::BufferTooSmall);
        }
        target[..N].copy_from_slice(self);
        Ok(N)
    }
}

impl<const N: usize> Decode for [u8; N] {
    fn decode(_endianness: Endianness, input: &[u8]) -> Result<(Self, usize), DecodeError> {
        if input.len() < N {
            return Err(DecodeError::BufferTooSmall);
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&input[..N]);
        Ok((out, N))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_integers() {
        let mut buf = [0u8; 8];
        let n = 0x0102_0304_0506_0708u64.encode(Endianness::Little, &mut buf).unwrap();
        assert_eq!(n, 8);
        let (back, consumed) = u64::decode(Endianness::Little, &buf).unwrap();
        assert_eq!(consumed, 8);
        assert_eq!(back, 0x0102_0304_0506_0708u64);
    }

    #[test]
    fn rejects_short_buffer() {
        let buf = [0u8; 2];
        assert_eq!(u32::decode(Endianness::Little, &buf), Err(DecodeError::BufferTooSmall));
    }
}
