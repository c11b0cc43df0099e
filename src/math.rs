//! Float helpers that core doesn't provide under no_std.

/// Clears the sign bit.
#[inline]
pub fn abs(value: f32) -> f32 {
    f32::from_bits(value.to_bits() & 0x7FFF_FFFF)
}

/// Rounds to the nearest integer, halves away from zero. Design unit coordinates always round
/// this way.
#[inline]
pub fn round_half_away(value: f32) -> i32 {
    if value >= 0.0 {
        (value + 0.5) as i32
    } else {
        (value - 0.5) as i32
    }
}

/// Newton's method square root. The seed comes from halving the exponent bits, which lands close
/// enough that four refinement steps cover f32 precision.
pub fn sqrt(value: f32) -> f32 {
    if value <= 0.0 {
        return 0.0;
    }
    let mut guess = f32::from_bits((value.to_bits() >> 1) + 0x1FC0_0000);
    for _ in 0..4 {
        guess = 0.5 * (guess + value / guess);
    }
    guess
}
