//! Qur'an reference data and memorization progress.
//!
//! Positions are addressed by `(surah, ayah)`; internally every ayah also has a
//! 1-based global index across the whole mushaf (1..=6236) which makes juz
//! boundaries simple ranges.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::models::hafalan::{Hafalan, SurahTambahan};

pub const SURAH_COUNT: usize = 114;
pub const JUZ_COUNT: usize = 30;
pub const TOTAL_AYAH: u32 = 6236;

/// Ayah count per surah, index 0 = Al-Fatihah.
pub const SURAH_VERSES: [u16; SURAH_COUNT] = [
    7, 286, 200, 176, 120, 165, 206, 75, 129, 109, 123, 111, 43, 52, 99, 128, 111, 110, 98, 135,
    112, 78, 118, 64, 77, 227, 93, 88, 69, 60, 34, 30, 73, 54, 45, 83, 182, 88, 75, 85, 54, 53,
    89, 59, 37, 35, 38, 29, 18, 45, 60, 49, 62, 55, 78, 96, 29, 22, 24, 13, 14, 11, 11, 18, 12,
    12, 30, 52, 52, 44, 28, 28, 20, 56, 40, 31, 50, 40, 46, 42, 29, 19, 36, 25, 22, 17, 19, 26,
    30, 20, 15, 21, 11, 8, 8, 19, 5, 8, 8, 11, 11, 8, 3, 9, 5, 4, 7, 3, 6, 3, 5, 4, 5, 6,
];

/// First `(surah, ayah)` of every juz, index 0 = juz 1.
pub const JUZ_STARTS: [(u16, u16); JUZ_COUNT] = [
    (1, 1),
    (2, 142),
    (2, 253),
    (3, 93),
    (4, 24),
    (4, 148),
    (5, 82),
    (6, 111),
    (7, 88),
    (8, 41),
    (9, 93),
    (11, 6),
    (12, 53),
    (15, 1),
    (17, 1),
    (18, 75),
    (21, 1),
    (23, 1),
    (25, 21),
    (27, 56),
    (29, 46),
    (33, 31),
    (36, 28),
    (39, 32),
    (41, 47),
    (46, 1),
    (51, 31),
    (58, 1),
    (67, 1),
    (78, 1),
];

/// Canonical transliterated names, index 0 = surah 1.
pub const SURAH_NAMES: [&str; SURAH_COUNT] = [
    "Al-Fatihah", "Al-Baqarah", "Ali 'Imran", "An-Nisa'", "Al-Ma'idah", "Al-An'am", "Al-A'raf",
    "Al-Anfal", "At-Taubah", "Yunus", "Hud", "Yusuf", "Ar-Ra'd", "Ibrahim", "Al-Hijr", "An-Nahl",
    "Al-Isra'", "Al-Kahf", "Maryam", "Taha", "Al-Anbiya'", "Al-Hajj", "Al-Mu'minun", "An-Nur",
    "Al-Furqan", "Asy-Syu'ara", "An-Naml", "Al-Qasas", "Al-Ankabut", "Ar-Rum", "Luqman",
    "As-Sajdah", "Al-Ahzab", "Saba'", "Fatir", "Yasin", "As-Saffat", "Sad", "Az-Zumar", "Ghafir",
    "Fussilat", "Asy-Syura", "Az-Zukhruf", "Ad-Dukhan", "Al-Jasiyah", "Al-Ahqaf", "Muhammad",
    "Al-Fath", "Al-Hujurat", "Qaf", "Az-Zariyat", "At-Tur", "An-Najm", "Al-Qamar", "Ar-Rahman",
    "Al-Waqi'ah", "Al-Hadid", "Al-Mujadilah", "Al-Hasyr", "Al-Mumtahanah", "As-Saff",
    "Al-Jumu'ah", "Al-Munafiqun", "At-Taghabun", "At-Talaq", "At-Tahrim", "Al-Mulk", "Al-Qalam",
    "Al-Haqqah", "Al-Ma'arij", "Nuh", "Al-Jinn", "Al-Muzzammil", "Al-Muddassir", "Al-Qiyamah",
    "Al-Insan", "Al-Mursalat", "An-Naba", "An-Nazi'at", "Abasa", "At-Takwir", "Al-Infitar",
    "Al-Mutaffifin", "Al-Insyiqaq", "Al-Buruj", "At-Tariq", "Al-A'la", "Al-Ghasyiyah", "Al-Fajr",
    "Al-Balad", "Asy-Syams", "Al-Lail", "Ad-Duha", "Asy-Syarh", "At-Tin", "Al-Alaq", "Al-Qadr",
    "Al-Bayyinah", "Az-Zalzalah", "Al-Adiyat", "Al-Qari'ah", "At-Takasur", "Al-Asr",
    "Al-Humazah", "Al-Fil", "Quraisy", "Al-Ma'un", "Al-Kausar", "Al-Kafirun", "An-Nasr",
    "Al-Lahab", "Al-Ikhlas", "Al-Falaq", "An-Nas",
];

/// Spelling variants seen in teacher input, keyed like [`name_key`].
const SURAH_ALIASES: &[(&str, u16)] = &[
    ("alfatiha", 1),
    ("albaqara", 2),
    ("attawbah", 9),
    ("baraah", 9),
    ("baniisrail", 17),
    ("thaha", 20),
    ("thoha", 20),
    ("yaasiin", 36),
    ("yasiin", 36),
    ("yasin", 36),
    ("shad", 38),
    ("almukmin", 40),
    ("fushshilat", 41),
    ("aljatsiyah", 45),
    ("adzdzariyat", 51),
    ("arrahmaan", 55),
    ("alhashr", 59),
    ("ashshaff", 61),
    ("almuzammil", 73),
    ("almudatsir", 74),
    ("almuddatstsir", 74),
    ("alghashiyah", 88),
    ("alinsyirah", 94),
    ("alamnasyrah", 94),
    ("alaadiyat", 100),
    ("attakatsur", 102),
    ("alkautsar", 108),
    ("alkafiruun", 109),
    ("alikhlash", 112),
    ("annaas", 114),
];

/// `SURAH_OFFSETS[s]` = number of ayah before surah `s + 1`.
static SURAH_OFFSETS: LazyLock<[u32; SURAH_COUNT + 1]> = LazyLock::new(|| {
    let mut offsets = [0u32; SURAH_COUNT + 1];
    for (i, verses) in SURAH_VERSES.iter().enumerate() {
        offsets[i + 1] = offsets[i] + u32::from(*verses);
    }
    offsets
});

/// Inclusive global-index bounds of every juz.
static JUZ_BOUNDS: LazyLock<[(u32, u32); JUZ_COUNT]> = LazyLock::new(|| {
    let starts: Vec<u32> = JUZ_STARTS
        .iter()
        .map(|(s, a)| SURAH_OFFSETS[usize::from(*s) - 1] + u32::from(*a))
        .collect();
    let mut bounds = [(0u32, 0u32); JUZ_COUNT];
    for i in 0..JUZ_COUNT {
        let end = starts.get(i + 1).map(|next| next - 1).unwrap_or(TOTAL_AYAH);
        bounds[i] = (starts[i], end);
    }
    bounds
});

static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+\.\s*)?(.+?)\s*\(?(\d+)\s*[-–]\s*(\d+)\)?$").expect("surah range regex")
});

static NAME_ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+\.\s*)?(.+?)$").expect("surah name regex"));

/// Number of ayah in a surah.
pub fn verses_in_surah(surah: u16) -> Option<u16> {
    SURAH_VERSES.get(usize::from(surah).checked_sub(1)?).copied()
}

/// Canonical name of a surah.
pub fn surah_name(surah: u16) -> Option<&'static str> {
    SURAH_NAMES.get(usize::from(surah).checked_sub(1)?).copied()
}

/// Number of ayah in a juz.
pub fn verses_in_juz(juz: u8) -> Option<u32> {
    let (start, end) = JUZ_BOUNDS.get(usize::from(juz).checked_sub(1)?)?;
    Some(end - start + 1)
}

/// Lowercase ASCII letters and digits only: "Ali 'Imran" -> "aliimran".
fn name_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Title-case each dash/space separated word and join with `-`: "al baqarah" -> "Al-Baqarah".
pub fn normalize_surah_name(name: &str) -> String {
    name.split(|c: char| c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join("-")
}

/// Resolve a surah name (any case, common transliterations) or a plain number.
pub fn surah_number(name: &str) -> Option<u16> {
    let trimmed = name.trim();
    if let Ok(n) = trimmed.parse::<u16>() {
        return (1..=SURAH_COUNT as u16).contains(&n).then_some(n);
    }

    let key = name_key(trimmed);
    if key.is_empty() {
        return None;
    }

    SURAH_NAMES
        .iter()
        .position(|canonical| name_key(canonical) == key)
        .map(|i| i as u16 + 1)
        .or_else(|| {
            SURAH_ALIASES
                .iter()
                .find(|(alias, _)| *alias == key)
                .map(|(_, n)| *n)
        })
}

/// Global index of an ayah, or `None` when the position does not exist.
pub fn global_index(surah: u16, ayah: u16) -> Option<u32> {
    let verses = verses_in_surah(surah)?;
    if ayah == 0 || ayah > verses {
        return None;
    }
    Some(SURAH_OFFSETS[usize::from(surah) - 1] + u32::from(ayah))
}

/// Juz containing the given ayah.
pub fn juz_of(surah: u16, ayah: u16) -> Option<u8> {
    let index = global_index(surah, ayah)?;
    JUZ_BOUNDS
        .iter()
        .position(|(start, end)| (*start..=*end).contains(&index))
        .map(|i| i as u8 + 1)
}

/// Every juz touched by an ayah range of one surah, ascending.
pub fn juzs_in_range(surah: u16, from: u16, to: u16) -> Vec<u8> {
    match (juz_of(surah, from), juz_of(surah, to)) {
        (Some(a), Some(b)) if a <= b => (a..=b).collect(),
        (Some(a), Some(b)) => (b..=a).collect(),
        (Some(a), None) | (None, Some(a)) => vec![a],
        (None, None) => Vec::new(),
    }
}

/// One surah entry parsed from free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSurah {
    pub surah_number: u16,
    pub surah_name: String,
    pub ayat_mulai: Option<u16>,
    pub ayat_selesai: Option<u16>,
}

/// Split on commas that are not inside parentheses.
fn split_top_level(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

/// Parse free text such as `"Al-Baqarah 1-5, An-Naba (1-40)"` or `"1. Al-Fatihah"`.
///
/// Entries whose surah cannot be resolved are skipped. A leading `"N. "` is used
/// as the surah number when the name itself is unknown.
pub fn parse_surah_range(input: &str) -> Vec<ParsedSurah> {
    let mut results = Vec::new();

    for entry in split_top_level(input).into_iter().map(str::trim) {
        if entry.is_empty() {
            continue;
        }

        if let Some(caps) = RANGE_RE.captures(entry) {
            let name = caps[2].trim().to_string();
            let number = surah_number(&name).or_else(|| prefix_number(caps.get(1)));
            let start = caps[3].parse::<u16>().ok();
            let end = caps[4].parse::<u16>().ok();
            if let Some(surah_number) = number {
                results.push(ParsedSurah {
                    surah_number,
                    surah_name: name,
                    ayat_mulai: start,
                    ayat_selesai: end,
                });
            }
        } else if let Some(caps) = NAME_ONLY_RE.captures(entry) {
            let name = caps[2].trim().to_string();
            if let Some(surah_number) = surah_number(&name).or_else(|| prefix_number(caps.get(1))) {
                results.push(ParsedSurah {
                    surah_number,
                    surah_name: name,
                    ayat_mulai: None,
                    ayat_selesai: None,
                });
            }
        }
    }

    results
}

fn prefix_number(prefix: Option<regex::Match<'_>>) -> Option<u16> {
    let digits: String = prefix?.as_str().chars().filter(char::is_ascii_digit).collect();
    let n = digits.parse::<u16>().ok()?;
    (1..=SURAH_COUNT as u16).contains(&n).then_some(n)
}

/// An inclusive ayah range inside one surah.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AyahRange {
    pub surah: u16,
    pub from: u16,
    pub to: u16,
}

impl AyahRange {
    pub fn new(surah: u16, from: u16, to: u16) -> Self {
        Self { surah, from, to }
    }

    /// Whole surah.
    pub fn surah(surah: u16) -> Option<Self> {
        verses_in_surah(surah).map(|v| Self::new(surah, 1, v))
    }

    /// Global index bounds after clamping to the surah; `None` if nothing remains.
    fn global_bounds(&self) -> Option<(u32, u32)> {
        let verses = verses_in_surah(self.surah)?;
        let from = self.from.max(1);
        let to = self.to.min(verses);
        if from > to {
            return None;
        }
        Some((global_index(self.surah, from)?, global_index(self.surah, to)?))
    }
}

fn to_range(surah_number: Option<i32>, surah: &str, mulai: i32, selesai: i32) -> Option<AyahRange> {
    let number = surah_number
        .and_then(|n| u16::try_from(n).ok())
        .filter(|n| (1..=SURAH_COUNT as u16).contains(n))
        .or_else(|| surah_number_from_text(surah))?;
    let from = u16::try_from(mulai).ok()?;
    let to = u16::try_from(selesai).ok()?;
    Some(AyahRange::new(number, from, to))
}

fn surah_number_from_text(text: &str) -> Option<u16> {
    surah_number(text).or_else(|| parse_surah_range(text).first().map(|p| p.surah_number))
}

/// Every ayah range recorded by a hafalan row, primary surah first.
pub fn ranges_of(hafalan: &Hafalan) -> Vec<AyahRange> {
    let primary = to_range(
        hafalan.surah_number,
        &hafalan.surah,
        hafalan.ayat_mulai,
        hafalan.ayat_selesai,
    );
    primary
        .into_iter()
        .chain(hafalan.surah_tambahan.0.iter().filter_map(tambahan_range))
        .collect()
}

fn tambahan_range(item: &SurahTambahan) -> Option<AyahRange> {
    to_range(item.surah_number, &item.surah, item.ayat_mulai, item.ayat_selesai)
}

/// Coverage of one juz.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JuzProgress {
    pub juz: u8,
    pub covered_ayat: u32,
    pub total_ayat: u32,
    /// Percent covered, one decimal.
    pub progress: f64,
}

/// Coverage of all 30 juz plus aggregates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub juz_progress: Vec<JuzProgress>,
    /// Sum of per-juz coverage fractions, two decimals.
    pub total_juz: f64,
    /// Juz with any coverage.
    pub highest_juz_achieved: u32,
    /// Juz covered completely.
    pub completed_juz_count: u32,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Merge juz-relative intervals that overlap or touch, then count covered ayah.
fn covered_count(mut intervals: Vec<(u32, u32)>) -> u32 {
    intervals.sort_unstable();
    let mut merged: Vec<(u32, u32)> = Vec::with_capacity(intervals.len());
    for (start, end) in intervals {
        match merged.last_mut() {
            Some(last) if start <= last.1 + 1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged.iter().map(|(s, e)| e - s + 1).sum()
}

/// Per-juz coverage for a set of memorized ranges. Overlapping ranges count once.
pub fn calculate_juz_progress(ranges: &[AyahRange]) -> ProgressSummary {
    let mut intervals: Vec<Vec<(u32, u32)>> = vec![Vec::new(); JUZ_COUNT];

    for (lo, hi) in ranges.iter().filter_map(AyahRange::global_bounds) {
        for (i, (start, end)) in JUZ_BOUNDS.iter().enumerate() {
            if hi < *start || lo > *end {
                continue;
            }
            let from = lo.max(*start) - start + 1;
            let to = hi.min(*end) - start + 1;
            intervals[i].push((from, to));
        }
    }

    let juz_progress: Vec<JuzProgress> = intervals
        .into_iter()
        .enumerate()
        .map(|(i, list)| {
            let (start, end) = JUZ_BOUNDS[i];
            let total = end - start + 1;
            let covered = covered_count(list);
            JuzProgress {
                juz: i as u8 + 1,
                covered_ayat: covered,
                total_ayat: total,
                progress: round_to(f64::from(covered) / f64::from(total) * 100.0, 1),
            }
        })
        .collect();

    let total_juz = round_to(
        juz_progress
            .iter()
            .map(|p| f64::from(p.covered_ayat) / f64::from(p.total_ayat))
            .sum(),
        2,
    );

    ProgressSummary {
        highest_juz_achieved: juz_progress.iter().filter(|p| p.covered_ayat > 0).count() as u32,
        completed_juz_count: juz_progress
            .iter()
            .filter(|p| p.covered_ayat == p.total_ayat)
            .count() as u32,
        juz_progress,
        total_juz,
    }
}

/// Juz in progress for dashboards: non-zero only, highest progress first, ties by juz number.
pub fn dashboard_juz_progress(progress: &[JuzProgress], limit: usize) -> Vec<JuzProgress> {
    let mut active: Vec<JuzProgress> = progress.iter().filter(|p| p.progress > 0.0).cloned().collect();
    active.sort_by(|a, b| {
        b.progress
            .total_cmp(&a.progress)
            .then_with(|| a.juz.cmp(&b.juz))
    });
    active.truncate(limit);
    active
}

/// Whether a student may register for tasmi'.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TasmiEligibility {
    pub is_eligible: bool,
    pub completed_juz: u32,
    pub target_juz: i32,
    pub remaining_juz: u32,
    pub message: String,
}

/// Eligible once the number of fully memorized juz reaches the school-year target.
pub fn tasmi_eligibility(completed_juz: u32, target_juz: i32) -> TasmiEligibility {
    if target_juz <= 0 {
        return TasmiEligibility {
            is_eligible: false,
            completed_juz,
            target_juz,
            remaining_juz: 0,
            message: "Konfigurasi target tidak valid".to_string(),
        };
    }

    let target = target_juz as u32;
    if completed_juz >= target {
        TasmiEligibility {
            is_eligible: true,
            completed_juz,
            target_juz,
            remaining_juz: 0,
            message: format!("Siap Mendaftar (Sudah {completed_juz} Juz selesai 100%)"),
        }
    } else {
        let remaining = target - completed_juz;
        TasmiEligibility {
            is_eligible: false,
            completed_juz,
            target_juz,
            remaining_juz: remaining,
            message: format!(
                "Belum Siap. Butuh {remaining} Juz lagi untuk diselesaikan 100% (Target: {target_juz} Juz)"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_tables_are_consistent() {
        let total: u32 = SURAH_VERSES.iter().map(|v| u32::from(*v)).sum();
        assert_eq!(total, TOTAL_AYAH);
        let juz_total: u32 = (1..=30).map(|j| verses_in_juz(j).unwrap()).sum();
        assert_eq!(juz_total, TOTAL_AYAH);
        assert_eq!(verses_in_juz(1), Some(148));
        assert_eq!(verses_in_juz(30), Some(564));
        assert_eq!(verses_in_juz(0), None);
        assert_eq!(verses_in_juz(31), None);
    }

    #[test]
    fn surah_lookup_variants() {
        assert_eq!(surah_number("Al-Baqarah"), Some(2));
        assert_eq!(surah_number("al baqarah"), Some(2));
        assert_eq!(surah_number("ALI IMRAN"), Some(3));
        assert_eq!(surah_number("Ali 'Imran"), Some(3));
        assert_eq!(surah_number("An-Nisa"), Some(4));
        assert_eq!(surah_number("yaasiin"), Some(36));
        assert_eq!(surah_number("114"), Some(114));
        assert_eq!(surah_number("115"), None);
        assert_eq!(surah_number("Bukan Surah"), None);
        assert_eq!(surah_number(""), None);
    }

    #[test]
    fn normalize_names() {
        assert_eq!(normalize_surah_name("al-baqarah"), "Al-Baqarah");
        assert_eq!(normalize_surah_name("AN  NABA"), "An-Naba");
    }

    #[test]
    fn juz_lookup_at_boundaries() {
        assert_eq!(juz_of(1, 1), Some(1));
        assert_eq!(juz_of(2, 141), Some(1));
        assert_eq!(juz_of(2, 142), Some(2));
        assert_eq!(juz_of(77, 50), Some(29));
        assert_eq!(juz_of(78, 1), Some(30));
        assert_eq!(juz_of(114, 6), Some(30));
        assert_eq!(juz_of(114, 7), None);
        assert_eq!(juz_of(0, 1), None);
        assert_eq!(juzs_in_range(2, 100, 260), vec![1, 2, 3]);
        assert_eq!(juzs_in_range(36, 1, 10), vec![22]);
    }

    #[test]
    fn parse_ranges() {
        let parsed = parse_surah_range("Al-Baqarah 1-5, An-Naba (1-40)");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].surah_number, 2);
        assert_eq!((parsed[0].ayat_mulai, parsed[0].ayat_selesai), (Some(1), Some(5)));
        assert_eq!(parsed[1].surah_number, 78);
        assert_eq!(parsed[1].ayat_selesai, Some(40));

        let name_only = parse_surah_range("1. Al-Fatihah");
        assert_eq!(name_only[0].surah_number, 1);
        assert_eq!(name_only[0].ayat_mulai, None);

        let by_prefix = parse_surah_range("67. Tabarak 1-30");
        assert_eq!(by_prefix[0].surah_number, 67);

        assert!(parse_surah_range("Entah 1-5").is_empty());
    }

    #[test]
    fn full_first_juz_is_complete() {
        let ranges = [AyahRange::new(1, 1, 7), AyahRange::new(2, 1, 141)];
        let summary = calculate_juz_progress(&ranges);
        let juz1 = &summary.juz_progress[0];
        assert_eq!(juz1.covered_ayat, 148);
        assert_eq!(juz1.progress, 100.0);
        assert_eq!(summary.completed_juz_count, 1);
        assert_eq!(summary.highest_juz_achieved, 1);
        assert_eq!(summary.total_juz, 1.0);
    }

    #[test]
    fn overlapping_and_adjacent_ranges_merge() {
        let ranges = [
            AyahRange::new(2, 1, 5),
            AyahRange::new(2, 6, 10),
            AyahRange::new(2, 3, 8),
        ];
        let summary = calculate_juz_progress(&ranges);
        assert_eq!(summary.juz_progress[0].covered_ayat, 10);
        assert_eq!(summary.juz_progress[0].progress, 6.8);
    }

    #[test]
    fn range_spanning_juz_is_split() {
        // Al-Baqarah 100-160 crosses from juz 1 into juz 2.
        let summary = calculate_juz_progress(&[AyahRange::new(2, 100, 160)]);
        assert_eq!(summary.juz_progress[0].covered_ayat, 42);
        assert_eq!(summary.juz_progress[1].covered_ayat, 19);
        assert_eq!(summary.highest_juz_achieved, 2);
        assert_eq!(summary.completed_juz_count, 0);
    }

    #[test]
    fn juz_amma_complete() {
        let ranges: Vec<AyahRange> = (78..=114).filter_map(AyahRange::surah).collect();
        let summary = calculate_juz_progress(&ranges);
        assert_eq!(summary.juz_progress[29].covered_ayat, 564);
        assert_eq!(summary.completed_juz_count, 1);
    }

    #[test]
    fn out_of_range_ayah_is_clamped() {
        let summary = calculate_juz_progress(&[AyahRange::new(1, 1, 500), AyahRange::new(200, 1, 5)]);
        assert_eq!(summary.juz_progress[0].covered_ayat, 7);
        assert_eq!(summary.highest_juz_achieved, 1);
    }

    #[test]
    fn dashboard_orders_by_progress_then_juz() {
        let ranges = [
            AyahRange::new(78, 1, 40),
            AyahRange::new(67, 1, 30),
            AyahRange::new(1, 1, 7),
        ];
        let summary = calculate_juz_progress(&ranges);
        let top = dashboard_juz_progress(&summary.juz_progress, 5);
        assert_eq!(top.iter().map(|p| p.juz).collect::<Vec<_>>(), vec![30, 29, 1]);
        assert_eq!(dashboard_juz_progress(&summary.juz_progress, 1).len(), 1);
    }

    #[test]
    fn eligibility_rules() {
        let ok = tasmi_eligibility(3, 3);
        assert!(ok.is_eligible);
        assert_eq!(ok.message, "Siap Mendaftar (Sudah 3 Juz selesai 100%)");

        let short = tasmi_eligibility(1, 3);
        assert!(!short.is_eligible);
        assert_eq!(short.remaining_juz, 2);
        assert_eq!(
            short.message,
            "Belum Siap. Butuh 2 Juz lagi untuk diselesaikan 100% (Target: 3 Juz)"
        );

        let invalid = tasmi_eligibility(10, 0);
        assert!(!invalid.is_eligible);
        assert_eq!(invalid.message, "Konfigurasi target tidak valid");
    }
}
