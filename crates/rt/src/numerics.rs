use num::{Float, PrimInt, Signed, Unsigned};

use crate::Trap;

#[inline]
pub(crate) fn div_s<T: PrimInt + Signed>(a: T, b: T) -> Result<T, Trap> {
    if b.is_zero() {
        return Err(Trap::IntegerDivideByZero);
    }
    if a == T::min_value() && b == -T::one() {
        return Err(Trap::IntegerOverflow);
    }
    Ok(a / b)
}

#[inline]
pub(crate) fn div_u<T: PrimInt + Unsigned>(a: T, b: T) -> Result<T, Trap> {
    if b.is_zero() {
        return Err(Trap::IntegerDivideByZero);
    }
    Ok(a / b)
}

#[inline]
pub(crate) fn rem_s<T: PrimInt + Signed>(a: T, b: T) -> Result<T, Trap> {
    if b.is_zero() {
        return Err(Trap::IntegerDivideByZero);
    }
    // MIN % -1 overflows in Rust, but the remainder is 0 either way.
    if b == -T::one() {
        return Ok(T::zero());
    }
    Ok(a % b)
}

#[inline]
pub(crate) fn rem_u<T: PrimInt + Unsigned>(a: T, b: T) -> Result<T, Trap> {
    if b.is_zero() {
        return Err(Trap::IntegerDivideByZero);
    }
    Ok(a % b)
}

#[inline]
pub(crate) fn fmin<F: Float>(a: F, b: F) -> F {
    if a.is_nan() || b.is_nan() {
        return a + b;
    }
    if a.is_zero() && b.is_zero() {
        return if a.is_sign_negative() { a } else { b };
    }
    a.min(b)
}

#[inline]
pub(crate) fn fmax<F: Float>(a: F, b: F) -> F {
    if a.is_nan() || b.is_nan() {
        return a + b;
    }
    if a.is_zero() && b.is_zero() {
        return if a.is_sign_positive() { a } else { b };
    }
    a.max(b)
}

/// Round to the nearest integer, ties to even.
#[inline]
pub(crate) fn nearest<F: Float>(a: F) -> F {
    let two = F::one() + F::one();
    if (a - a.trunc()).abs() == two.recip() {
        (a / two).round() * two
    } else {
        a.round()
    }
}

macro_rules! trunc_to_int {
    ($($name:ident($f:ty) -> $i:ty, ($lower:literal, $upper:literal);)*) => {
        $(
            /// Truncate toward zero; the bounds are the nearest representable
            /// values just outside the target range.
            #[inline]
            pub(crate) fn $name(x: $f) -> Result<$i, Trap> {
                if x.is_nan() {
                    return Err(Trap::InvalidConversionToInteger);
                }
                if !(x > $lower && x < $upper) {
                    return Err(Trap::IntegerOverflow);
                }
                Ok(x as $i)
            }
        )*
    };
}

trunc_to_int! {
    i32_trunc_f32(f32) -> i32, (-2147483904.0, 2147483648.0);
    u32_trunc_f32(f32) -> u32, (-1.0, 4294967296.0);
    i32_trunc_f64(f64) -> i32, (-2147483649.0, 2147483648.0);
    u32_trunc_f64(f64) -> u32, (-1.0, 4294967296.0);
    i64_trunc_f32(f32) -> i64, (-9223373136366403584.0, 9223372036854775808.0);
    u64_trunc_f32(f32) -> u64, (-1.0, 18446744073709551616.0);
    i64_trunc_f64(f64) -> i64, (-9223372036854777856.0, 9223372036854775808.0);
    u64_trunc_f64(f64) -> u64, (-1.0, 18446744073709551616.0);
}
