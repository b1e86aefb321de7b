//! Default usernames, passwords and e-mail addresses for generated accounts.

use chrono::NaiveDate;
use rand::Rng;

pub const WALI_EMAIL_DOMAIN: &str = "wali.tahfidz.sch.id";
pub const GURU_EMAIL_DOMAIN: &str = "tahfidz.sch.id";

const RECOVERY_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Student default password: birth date as `YYYY-MM-DD`.
pub fn student_password(tanggal_lahir: NaiveDate) -> String {
    tanggal_lahir.format("%Y-%m-%d").to_string()
}

/// Parent default password: the child's birth date as `DDMMYYYY`.
pub fn parent_password(tanggal_lahir_anak: NaiveDate) -> String {
    tanggal_lahir_anak.format("%d%m%Y").to_string()
}

/// First word of a name, lowercased, letters only.
fn first_word_key(name: &str) -> Option<String> {
    let word: String = name
        .split_whitespace()
        .next()?
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    (!word.is_empty()).then_some(word)
}

/// `budi.12345@wali.tahfidz.sch.id`, or empty when the name has no usable letters.
pub fn wali_email(nama_wali: &str, nis: &str) -> String {
    match first_word_key(nama_wali) {
        Some(first) if !nis.trim().is_empty() => {
            format!("{first}.{}@{WALI_EMAIL_DOMAIN}", nis.trim())
        }
        _ => String::new(),
    }
}

/// `guru.ahmad@tahfidz.sch.id`, or empty when the name has no usable letters.
pub fn guru_email(nama: &str) -> String {
    first_word_key(nama)
        .map(|first| format!("guru.{first}@{GURU_EMAIL_DOMAIN}"))
        .unwrap_or_default()
}

/// Next teacher username after the highest existing `G<nnn>`.
pub fn next_guru_username<'a>(existing: impl IntoIterator<Item = &'a str>) -> String {
    let highest = existing
        .into_iter()
        .filter_map(|u| u.strip_prefix('G').or_else(|| u.strip_prefix('g')))
        .filter_map(|digits| digits.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("G{:03}", highest + 1)
}

/// Seven digits plus one uppercase letter at a random position, e.g. `482A9133`.
pub fn mixed_password() -> String {
    let mut rng = rand::rng();
    let mut chars: Vec<char> = (0..7)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect();
    let letter = char::from(rng.random_range(b'A'..=b'Z'));
    chars.insert(rng.random_range(0..=chars.len()), letter);
    chars.into_iter().collect()
}

/// Fresh recovery code `XXXX-XXXX-XXXX` over an alphabet without 0/O/1/I.
pub fn recovery_code() -> String {
    let mut rng = rand::rng();
    (0..3)
        .map(|_| {
            (0..4)
                .map(|_| char::from(RECOVERY_ALPHABET[rng.random_range(0..RECOVERY_ALPHABET.len())]))
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Uppercase and drop whitespace so hand-typed codes compare equal.
pub fn normalize_recovery_code(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn birth_date_passwords() {
        let d = NaiveDate::from_ymd_opt(2008, 3, 9).unwrap();
        assert_eq!(student_password(d), "2008-03-09");
        assert_eq!(parent_password(d), "09032008");
    }

    #[test]
    fn generated_emails() {
        assert_eq!(wali_email("Budi Santoso", "12345"), "budi.12345@wali.tahfidz.sch.id");
        assert_eq!(wali_email("H. Ahmad", "777"), "h.777@wali.tahfidz.sch.id");
        assert_eq!(wali_email("   ", "12345"), "");
        assert_eq!(wali_email("Budi", ""), "");
        assert_eq!(guru_email("Ahmad Fauzi"), "guru.ahmad@tahfidz.sch.id");
        assert_eq!(guru_email("123"), "");
    }

    #[test]
    fn guru_username_sequence() {
        assert_eq!(next_guru_username([]), "G001");
        assert_eq!(next_guru_username(["G001", "G009", "admin", "G003"]), "G010");
        assert_eq!(next_guru_username(["G999"]), "G1000");
    }

    #[test]
    fn mixed_password_shape() {
        for _ in 0..50 {
            let p = mixed_password();
            assert_eq!(p.len(), 8);
            assert_eq!(p.chars().filter(char::is_ascii_uppercase).count(), 1);
            assert_eq!(p.chars().filter(char::is_ascii_digit).count(), 7);
        }
    }

    #[test]
    fn recovery_code_shape() {
        let code = recovery_code();
        assert_eq!(code.len(), 14);
        let groups: Vec<&str> = code.split('-').collect();
        assert_eq!(groups.len(), 3);
        assert!(groups.iter().all(|g| g.len() == 4));
        assert!(!code.contains('O') && !code.contains('0') && !code.contains('I'));
        assert_eq!(normalize_recovery_code(" abcd-efgh-jkmn "), "ABCD-EFGH-JKMN");
    }
}
