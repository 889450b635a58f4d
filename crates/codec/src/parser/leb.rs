use super::{fail, PResult, ParseWasmBinary, Span};
use crate::DecodeErrorKind;

// LEB128 with the bounds the binary format puts on it: at most ceil(N / 7)
// bytes, and any bits of the final byte past the N-bit payload must be zero
// (unsigned) or copies of the sign bit (signed).
macro_rules! parse_leb128 {
    ($type:ident, signed) => {
        impl<'a> ParseWasmBinary<'a> for $type {
            fn from_wasm_bytes(input: Span<'a>) -> PResult<'a, Self> {
                use nom::bytes::complete::{take, take_till};

                let start = input;
                let (input, leb_bytes) = take_till(|xs| xs & 0x80 == 0)(input)?;
                let (input, last) = take(1usize)(input)?;

                let max_bytes = divrem::DivCeil::div_ceil($type::BITS, 7) as usize;
                if leb_bytes.len() + 1 > max_bytes {
                    return fail(start, DecodeErrorKind::IntegerTooLong);
                }

                let mut result: $type = 0;
                let mut shift = 0;
                for xs in leb_bytes.fragment().iter() {
                    result |= ((xs & 0x7f) as $type) << shift;
                    shift += 7;
                }

                let last = last.fragment()[0];
                let payload = last & 0x7f;
                if leb_bytes.len() + 1 == max_bytes {
                    let remaining = $type::BITS - shift;
                    let extension = payload >> (remaining - 1);
                    if extension != 0 && extension != (0x7f >> (remaining - 1)) {
                        return fail(start, DecodeErrorKind::IntegerTooLarge);
                    }
                }

                result |= (payload as $type) << shift;
                shift += 7;
                if shift < $type::BITS && (last & 0x40) == 0x40 {
                    result |= !0 << shift;
                }

                Ok((input, result))
            }
        }
    };

    ($type:ident, unsigned) => {
        impl<'a> ParseWasmBinary<'a> for $type {
            fn from_wasm_bytes(input: Span<'a>) -> PResult<'a, Self> {
                use nom::bytes::complete::{take, take_till};

                let start = input;
                let (input, leb_bytes) = take_till(|xs| xs & 0x80 == 0)(input)?;
                let (input, last) = take(1usize)(input)?;

                let max_bytes = divrem::DivCeil::div_ceil($type::BITS, 7) as usize;
                if leb_bytes.len() + 1 > max_bytes {
                    return fail(start, DecodeErrorKind::IntegerTooLong);
                }

                let mut result: $type = 0;
                let mut shift = 0;
                for xs in leb_bytes.fragment().iter() {
                    result |= ((xs & 0x7f) as $type) << shift;
                    shift += 7;
                }

                let payload = last.fragment()[0] & 0x7f;
                if leb_bytes.len() + 1 == max_bytes && payload >> ($type::BITS - shift) != 0 {
                    return fail(start, DecodeErrorKind::IntegerTooLarge);
                }
                result |= (payload as $type) << shift;

                Ok((input, result))
            }
        }
    };
}

parse_leb128!(u32, unsigned);
parse_leb128!(i32, signed);
parse_leb128!(i64, signed);
