use core::fmt;

#[cfg(feature = "std")]
extern crate std;

/// Longest code any table may assign
pub const MAX_CODE_LEN: usize = 12;
const MAX_ENTRIES: usize = 64;
const NO_LIT: u8 = 0xff;
const CONTROL_SLOTS: usize = 10;

/// Shortest back-reference the format can express
pub const MIN_MATCH: usize = 3;
/// Width of the back-reference length field
pub const LEN_BITS: u32 = 5;
/// Longest back-reference the format can express
pub const MAX_MATCH: usize = MIN_MATCH + (1 << LEN_BITS) - 1;
/// Width of a near back-reference distance
pub const NEAR_BITS: u32 = 6;
/// Width of a far back-reference distance
pub const FAR_BITS: u32 = 11;
/// Distances up to this value use the near form
pub const NEAR_WINDOW: usize = 1 << NEAR_BITS;
/// Furthest back a back-reference may reach
pub const MAX_DISTANCE: usize = NEAR_WINDOW + (1 << FAR_BITS);
/// Width of the repeat count field
pub const REPEAT_BITS: u32 = 4;
/// Largest count a single repeat can express
pub const MAX_REPEAT: usize = 1 << REPEAT_BITS;

/// Selects which code table is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Lowercase letters and the punctuation that dominates markup
    Lower = 0,
    /// Uppercase letters
    Upper = 1,
    /// Digits and punctuation
    Sym = 2,
}
impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Lower, Mode::Upper, Mode::Sym];
}

/// Something a code can stand for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    /// A byte from the active table
    Lit(u8),
    /// Make the given mode active
    Switch(Mode),
    /// Read the next token only from the given mode's table
    Shift(Mode),
    /// Length and distance fields follow
    BackRef,
    /// Count field follows, repeats the previous byte
    Repeat,
    /// A verbatim 8-bit byte follows
    Raw,
    End,
}
impl Token {
    const fn control_slot(self) -> Option<usize> {
        match self {
            Token::Lit(_) => None,
            Token::Switch(m) => Some(m as usize),
            Token::Shift(m) => Some(3 + m as usize),
            Token::BackRef => Some(6),
            Token::Repeat => Some(7),
            Token::Raw => Some(8),
            Token::End => Some(9),
        }
    }
}

/// A code word, right-aligned in `bits`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Code {
    pub bits: u16,
    pub len: u8,
}
impl Code {
    const NONE: Code = Code { bits: 0, len: 0 };

    fn is_prefix_of(self, other: Code) -> bool {
        self.len <= other.len && other.bits >> (other.len - self.len) == self.bits
    }
}

/// One canonical prefix code, built at compile time from (token, length) pairs
///
/// Entries must be listed in non-decreasing length order. Codes are handed out
/// in that order the same way canonical Huffman codes are, so the table only
/// needs the number of codes of each length to be decoded.
pub struct CodeTable {
    mode: Mode,
    tokens: &'static [(Token, u8)],
    codes: [Code; MAX_ENTRIES],
    counts: [u16; MAX_CODE_LEN + 1],
    max_len: usize,
    lits: [u8; 128],
    controls: [Code; CONTROL_SLOTS],
}

impl CodeTable {
    const fn build(mode: Mode, tokens: &'static [(Token, u8)]) -> Self {
        assert!(!tokens.is_empty() && tokens.len() <= MAX_ENTRIES);

        let mut codes = [Code::NONE; MAX_ENTRIES];
        let mut counts = [0u16; MAX_CODE_LEN + 1];
        let mut lits = [NO_LIT; 128];
        let mut controls = [Code::NONE; CONTROL_SLOTS];
        let mut seen = [false; CONTROL_SLOTS];

        let mut next: u32 = 0;
        let mut prev_len: u8 = 0;
        let mut i = 0;
        while i < tokens.len() {
            let (token, len) = tokens[i];
            assert!(len >= 1 && (len as usize) <= MAX_CODE_LEN, "code length out of range");
            assert!(len >= prev_len, "table must be sorted by code length");
            next <<= (len - prev_len) as u32;
            prev_len = len;

            let code = Code {
                bits: next as u16,
                len,
            };
            codes[i] = code;
            counts[len as usize] += 1;

            match token.control_slot() {
                None => {
                    let c = match token {
                        Token::Lit(c) => c,
                        _ => panic!("only literals lack a control slot"),
                    };
                    assert!(c < 128, "non-ASCII bytes go through Raw");
                    assert!(lits[c as usize] == NO_LIT, "duplicate literal");
                    lits[c as usize] = i as u8;
                }
                Some(slot) => {
                    assert!(!seen[slot], "duplicate control code");
                    seen[slot] = true;
                    controls[slot] = code;
                }
            }

            next += 1;
            i += 1;
        }

        // Kraft sum of exactly one: every bit string resolves to some token
        assert!(next == 1 << prev_len, "code table is not complete");

        let mut slot = 0;
        while slot < CONTROL_SLOTS {
            let own = slot == mode as usize || slot == 3 + mode as usize;
            assert!(seen[slot] != own, "table has wrong set of control codes");
            slot += 1;
        }

        Self {
            mode,
            tokens,
            codes,
            counts,
            max_len: prev_len as usize,
            lits,
            controls,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Code for a literal byte, if this table has one
    pub fn literal(&self, c: u8) -> Option<Code> {
        match self.lits.get(c as usize) {
            Some(&idx) if idx != NO_LIT => Some(self.codes[idx as usize]),
            _ => None,
        }
    }

    pub fn has_literal(&self, c: u8) -> bool {
        self.literal(c).is_some()
    }

    /// Code for a control token
    ///
    /// Every table carries every control except switching or shifting to its
    /// own mode, which is checked when the table is built. Asking for one of
    /// those yields a zero-length code.
    pub fn control(&self, token: Token) -> Code {
        match token.control_slot() {
            Some(slot) => self.controls[slot],
            None => Code::NONE,
        }
    }

    /// Code for any token
    pub fn code(&self, token: Token) -> Option<Code> {
        match token {
            Token::Lit(c) => self.literal(c),
            _ => Some(self.control(token)).filter(|code| code.len != 0),
        }
    }

    /// Resolve one token, pulling bits from `next_bit` one at a time
    ///
    /// Only as many bits as the matching code is long are pulled.
    pub fn decode_with<E>(
        &self,
        mut next_bit: impl FnMut() -> Result<u16, E>,
    ) -> Result<Token, E> {
        // code: bits read so far; first: first canonical code of this length;
        // index: position of that code in `tokens`
        let mut code: u16 = 0;
        let mut first: u16 = 0;
        let mut index: usize = 0;
        let mut len = 1;
        loop {
            code |= next_bit()?;
            let count = self.counts[len];
            if code - first < count || len == self.max_len {
                return Ok(self.tokens[index + (code - first) as usize].0);
            }
            index += count as usize;
            first = (first + count) << 1;
            code <<= 1;
            len += 1;
        }
    }

    /// Iterate over every (token, code) pair in canonical order
    pub fn entries(&self) -> impl Iterator<Item = (Token, Code)> + '_ {
        self.tokens
            .iter()
            .zip(self.codes.iter())
            .map(|(&(token, _), &code)| (token, code))
    }
}

use Mode::{Lower, Sym, Upper};
use Token::{BackRef, End, Lit, Raw, Repeat, Shift, Switch};

#[rustfmt::skip]
const LOWER_TOKENS: &[(Token, u8)] = &[
    (Lit(b'a'), 4), (Lit(b'e'), 4), (Lit(b'i'), 4), (Lit(b'n'), 4), (Lit(b't'), 4),
    (Lit(b' '), 5), (Lit(b'c'), 5), (Lit(b'd'), 5), (Lit(b'l'), 5), (Lit(b'o'), 5),
    (Lit(b'p'), 5), (Lit(b'r'), 5), (Lit(b's'), 5), (Lit(b'u'), 5), (Lit(b'<'), 5),
    (Lit(b'>'), 5), (Lit(b'='), 5), (Lit(b'\''), 5), (BackRef, 5), (Lit(b'b'), 6),
    (Lit(b'f'), 6), (Lit(b'g'), 6), (Lit(b'h'), 6), (Lit(b'm'), 6), (Lit(b'v'), 6),
    (Lit(b'w'), 6), (Lit(b'x'), 6), (Lit(b'y'), 6), (Lit(b'"'), 6), (Lit(b'/'), 6),
    (Lit(b'.'), 6), (Switch(Sym), 6), (Lit(b'k'), 7), (Lit(b'z'), 7),
    (Shift(Sym), 7), (Shift(Upper), 7), (Lit(b'q'), 8), (Switch(Upper), 8),
    (Repeat, 8), (Lit(b'j'), 9), (Raw, 10), (End, 10),
];

#[rustfmt::skip]
const UPPER_TOKENS: &[(Token, u8)] = &[
    (Lit(b'E'), 4), (Lit(b'T'), 4), (Switch(Lower), 4), (Lit(b'A'), 5), (Lit(b'B'), 5),
    (Lit(b'C'), 5), (Lit(b'D'), 5), (Lit(b'F'), 5), (Lit(b'G'), 5), (Lit(b'H'), 5),
    (Lit(b'I'), 5), (Lit(b'L'), 5), (Lit(b'M'), 5), (Lit(b'N'), 5), (Lit(b'O'), 5),
    (Lit(b'P'), 5), (Lit(b'R'), 5), (Lit(b'S'), 5), (Lit(b'U'), 5), (Lit(b'V'), 5),
    (Lit(b'W'), 5), (Lit(b'Y'), 5), (Lit(b' '), 5), (Switch(Sym), 5), (BackRef, 5),
    (Lit(b'J'), 6), (Lit(b'K'), 6), (Lit(b'Q'), 6), (Lit(b'X'), 6), (Lit(b'Z'), 6),
    (Shift(Lower), 6), (Shift(Sym), 7), (Repeat, 7), (Raw, 7), (End, 7),
];

#[rustfmt::skip]
const SYM_TOKENS: &[(Token, u8)] = &[
    (Lit(b'\''), 4), (Lit(b';'), 4), (Lit(b'<'), 4), (Lit(b'='), 4), (Lit(b'>'), 4),
    (Switch(Lower), 4), (BackRef, 4), (Lit(b'0'), 5), (Lit(b'"'), 5), (Lit(b'('), 5),
    (Lit(b')'), 5), (Lit(b'-'), 5), (Lit(b'.'), 5), (Lit(b'/'), 5), (Lit(b':'), 5),
    (Lit(b'{'), 5), (Lit(b'}'), 5), (Lit(b' '), 5), (Lit(b'1'), 6), (Lit(b'2'), 6),
    (Lit(b'#'), 6), (Lit(b','), 6), (Lit(b'\n'), 6), (Shift(Lower), 6), (Lit(b'3'), 7),
    (Lit(b'4'), 7), (Lit(b'5'), 7), (Lit(b'%'), 7), (Lit(b'+'), 7), (Switch(Upper), 7),
    (Shift(Upper), 7), (Repeat, 7), (Lit(b'6'), 8), (Lit(b'8'), 8), (Lit(b'9'), 8),
    (Lit(b'!'), 8), (Lit(b'&'), 8), (Lit(b'?'), 8), (Lit(b'['), 8), (Lit(b'\\'), 8),
    (Lit(b']'), 8), (End, 8), (Lit(b'7'), 9), (Lit(b'$'), 9), (Lit(b'*'), 9), (Lit(b'@'), 9),
    (Lit(b'^'), 9), (Lit(b'_'), 9), (Lit(b'`'), 9), (Lit(b'|'), 9), (Lit(b'~'), 9),
    (Lit(b'\t'), 9), (Lit(b'\r'), 9), (Raw, 9),
];

static LOWER_TABLE: CodeTable = CodeTable::build(Lower, LOWER_TOKENS);
static UPPER_TABLE: CodeTable = CodeTable::build(Upper, UPPER_TOKENS);
static SYM_TABLE: CodeTable = CodeTable::build(Sym, SYM_TOKENS);

/// The table used while `mode` is active
pub fn table(mode: Mode) -> &'static CodeTable {
    match mode {
        Lower => &LOWER_TABLE,
        Upper => &UPPER_TABLE,
        Sym => &SYM_TABLE,
    }
}

/// Find the table a byte should be encoded from when the active table lacks it
///
/// Tables are tried in the order lower, symbol, upper. Returns `None` for bytes
/// no table carries; those are sent with [Token::Raw].
pub fn find_literal(c: u8) -> Option<(Mode, Code)> {
    [Lower, Sym, Upper]
        .into_iter()
        .find_map(|mode| table(mode).literal(c).map(|code| (mode, code)))
}

/// Table self-test failures
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TableError {
    /// One code is a prefix of another in the same table
    NotPrefixFree {
        mode: Mode,
        shorter: Token,
        longer: Token,
    },
    /// The codes do not cover every bit string
    Incomplete { mode: Mode },
    /// Decoding a token's own code produced something else
    Unresolved { mode: Mode, token: Token },
}
impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::NotPrefixFree {
                mode,
                shorter,
                longer,
            } => write!(
                f,
                "{:?} table: code for {:?} is a prefix of {:?}",
                mode, shorter, longer
            ),
            TableError::Incomplete { mode } => write!(f, "{:?} table is not complete", mode),
            TableError::Unresolved { mode, token } => {
                write!(f, "{:?} table: code for {:?} does not decode to it", mode, token)
            }
        }
    }
}
#[cfg(feature = "std")]
impl std::error::Error for TableError {}

/// Check the tables the encoder and decoder share
///
/// Most of this is already enforced when the tables are built, but firmware can
/// call this at start-up to catch a table edit that slipped past review.
pub fn verify_tables() -> Result<(), TableError> {
    for mode in Mode::ALL {
        let table = table(mode);

        let kraft: u32 = table
            .entries()
            .map(|(_, code)| 1u32 << (MAX_CODE_LEN - code.len as usize))
            .sum();
        if kraft != 1 << MAX_CODE_LEN {
            return Err(TableError::Incomplete { mode });
        }

        for (a, code_a) in table.entries() {
            for (b, code_b) in table.entries() {
                if a != b && code_a.is_prefix_of(code_b) {
                    return Err(TableError::NotPrefixFree {
                        mode,
                        shorter: a,
                        longer: b,
                    });
                }
            }

            // feed the code back in, refusing to hand out more bits than it has
            let mut taken = 0;
            let decoded = table.decode_with(|| {
                if taken == code_a.len {
                    return Err(());
                }
                taken += 1;
                Ok((code_a.bits >> (code_a.len - taken)) & 1)
            });
            if decoded != Ok(a) || taken != code_a.len {
                return Err(TableError::Unresolved { mode, token: a });
            }
        }
    }
    Ok(())
}
