use rand::Rng;

use crate::models::quiz::{InviteCode, QuizMode};

/// Characters drawn for the code suffix.
pub const CODE_ALPHABET: &[u8] = b"ABCDEF0123456789";

/// Wider suffix alphabet of quizzes published from a template.
pub const TEMPLATE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const ANONYMOUS_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ANONYMOUS_ID_LEN: usize = 9;

/// Random invite code for `mode`. Uniqueness is checked by the caller when
/// it claims the quiz path.
pub fn generate(mode: QuizMode) -> InviteCode {
    generate_from(mode, CODE_ALPHABET)
}

/// Same as [`generate`], drawing the suffix from `alphabet` (upper-case
/// alphanumerics only).
pub fn generate_from(mode: QuizMode, alphabet: &[u8]) -> InviteCode {
    let mut rng = rand::rng();
    let suffix: String = (0..InviteCode::SUFFIX_LEN)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())] as char)
        .collect();

    InviteCode::from_suffix(mode, &suffix)
}

/// Creator id for free quizzes made without a wallet: `NW-` + 9 base36 chars.
pub fn anonymous_creator_id() -> String {
    let mut rng = rand::rng();
    let id: String = (0..ANONYMOUS_ID_LEN)
        .map(|_| ANONYMOUS_ALPHABET[rng.random_range(0..ANONYMOUS_ALPHABET.len())] as char)
        .collect();
    format!("NW-{}", id)
}
