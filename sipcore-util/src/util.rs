#[inline(always)]
pub fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

#[inline(always)]
pub fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t')
}

#[inline(always)]
pub fn is_newline(c: u8) -> bool {
    matches!(c, b'\r' | b'\n')
}

#[inline(always)]
pub fn not_comma_or_newline(c: u8) -> bool {
    !matches!(c, b',' | b'\r' | b'\n')
}

#[inline(always)]
pub fn is_alphabetic(c: u8) -> bool {
    c.is_ascii_alphabetic()
}

#[inline(always)]
pub fn is_alphanumeric(c: u8) -> bool {
    c.is_ascii_alphanumeric()
}

#[inline(always)]
pub fn is_valid_port(v: u32) -> bool {
    v <= 65535
}

/// `token` chars per RFC 3261 §25.1, minus the ones already covered by
/// `is_alphanumeric`.
#[inline(always)]
pub fn is_token_extra(c: u8) -> bool {
    matches!(
        c,
        b'-' | b'.' | b'!' | b'%' | b'*' | b'_' | b'+' | b'`' | b'\'' | b'~'
    )
}

#[inline(always)]
pub fn is_token(c: u8) -> bool {
    is_alphanumeric(c) || is_token_extra(c)
}
