//! Decoding of vm_flags style attribute words.
//!
//! Each hex digit of the word owns a four entry table. The same weight means
//! a different attribute depending on the digit it sits in: weight 1 is `rd`
//! in digit 0 but `rr` in digit 4. The mnemonics are the ones the kernel
//! prints on the `VmFlags:` line of `/proc/<pid>/smaps`.

use std::fmt;

// Only the low 32 bits carry flags we have names for.
pub const DECODED_DIGITS: usize = 8;

const WEIGHTS_PER_DIGIT: usize = 4;

// Indexed by digit position, least significant first. Within a digit the
// weights are listed in the order they are checked.
static FLAG_TABLE: [[(u8, &str); WEIGHTS_PER_DIGIT]; DECODED_DIGITS] = [
    [(8, "sh"), (4, "ex"), (2, "wr"), (1, "rd")],
    [(8, "ms"), (4, "me"), (2, "mw"), (1, "mr")],
    [(8, "dw"), (4, "pf"), (2, "um"), (1, "gd")],
    [(8, "sr"), (4, "io"), (2, "lo"), (1, "uw")],
    // VM_LOCKONFAULT has no mnemonic in older kernels; "lf" is ours.
    [(8, "lf"), (4, "de"), (2, "dc"), (1, "rr")],
    [(8, "sf"), (4, "ht"), (2, "nr"), (1, "ac")],
    [(8, "sd"), (4, "dd"), (2, "wf"), (1, "ar")],
    [(8, "mm"), (4, "nh"), (2, "hg"), (1, "mg")],
];

/// A decoded flag: its mnemonic, the digit it came from and the weight it
/// took out of that digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagToken {
    pub code: &'static str,
    pub digit: usize,
    pub weight: u8,
}

impl FlagToken {
    /// The bit this token stands for in the full word.
    pub fn bit(&self) -> u64 {
        u64::from(self.weight) << (4 * self.digit)
    }
}

impl fmt::Display for FlagToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code)
    }
}

/// The word in hex, every digit kept, including the ones `decode` skips.
pub fn raw_hex(word: u64) -> String {
    format!("{:x}", word)
}

/// Hex digits of `word`, least significant first. Zero has one digit.
fn digits(word: u64) -> impl Iterator<Item = u8> {
    let count = std::cmp::max(1, (64 - word.leading_zeros() as usize + 3) / 4);
    (0..count).map(move |pos| ((word >> (4 * pos)) & 0xf) as u8)
}

/// Splits `word` into flag tokens, digit 0 first and, inside a digit,
/// heaviest weight first. Digits past `DECODED_DIGITS` are not decoded.
pub fn decode(word: u64) -> Vec<FlagToken> {
    let mut tokens = Vec::new();
    for (digit, value) in digits(word).take(DECODED_DIGITS).enumerate() {
        let mut remaining = value;
        for &(weight, code) in FLAG_TABLE[digit].iter() {
            if remaining >= weight {
                tokens.push(FlagToken { code, digit, weight });
                remaining -= weight;
            }
        }
    }
    tokens
}

/// Space separated mnemonics of `word`, empty when no known flag is set.
pub fn describe(word: u64) -> String {
    decode(word)
        .iter()
        .map(|token| token.code)
        .collect::<Vec<&str>>()
        .join(" ")
}

/// The bit a mnemonic stands for, if it is one we know.
pub fn bit_for(code: &str) -> Option<u64> {
    FLAG_TABLE.iter().enumerate().find_map(|(digit, entries)| {
        entries
            .iter()
            .find(|&&(_, name)| name == code)
            .map(|&(weight, _)| u64::from(weight) << (4 * digit))
    })
}

/// Rebuilds a flag word from mnemonics such as the smaps `VmFlags:` list.
/// Unknown mnemonics are skipped.
pub fn word_from_codes<'a, I>(codes: I) -> u64
where
    I: IntoIterator<Item = &'a str>,
{
    codes.into_iter().fold(0, |word, code| match bit_for(code) {
        Some(bit) => word | bit,
        None => {
            trace!("Skipping unknown flag mnemonic {}", code);
            word
        }
    })
}
