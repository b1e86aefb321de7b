//! Class reports: period resolution and per-student recaps built from
//! attendance marks and graded deposits.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use uuid::Uuid;
use validator::Validate;

use super::presensi::PresensiStatus;
use crate::error::SimtaqError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Harian,
    #[default]
    Bulanan,
    Semesteran,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PeriodeShortcut {
    BulanIni,
    BulanLalu,
    SemesterIni,
}

/// Inclusive date range of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPeriod {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}

impl ReportPeriod {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, SimtaqError> {
        if from > to {
            return Err(SimtaqError::validation(
                "Tanggal mulai tidak boleh setelah tanggal selesai",
            ));
        }
        Ok(Self { from, to })
    }

    pub fn day(date: NaiveDate) -> Self {
        Self { from: date, to: date }
    }

    pub fn month_of(date: NaiveDate) -> Self {
        let from = first_of_month(date);
        Self {
            from,
            to: from + Months::new(1) - Days::new(1),
        }
    }

    /// January-June or July-December.
    pub fn semester_of(date: NaiveDate) -> Self {
        let january = date - Days::new(u64::from(date.ordinal0()));
        let from = if date.month() <= 6 { january } else { january + Months::new(6) };
        Self {
            from,
            to: from + Months::new(6) - Days::new(1),
        }
    }

    pub fn for_view(mode: ViewMode, date: NaiveDate) -> Self {
        match mode {
            ViewMode::Harian => Self::day(date),
            ViewMode::Bulanan => Self::month_of(date),
            ViewMode::Semesteran => Self::semester_of(date),
        }
    }

    pub fn from_shortcut(shortcut: PeriodeShortcut, today: NaiveDate) -> Self {
        match shortcut {
            PeriodeShortcut::BulanIni => Self::month_of(today),
            PeriodeShortcut::BulanLalu => Self::month_of(first_of_month(today) - Days::new(1)),
            PeriodeShortcut::SemesterIni => Self::semester_of(today),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

/// Key of the semester containing `date`: `2025-1` (Jan-Jun) or `2025-2` (Jul-Dec).
pub fn semester_key(date: NaiveDate) -> String {
    format!("{}-{}", date.year(), if date.month() <= 6 { 1 } else { 2 })
}

pub fn performance_level(score: f64) -> &'static str {
    match score {
        s if s >= 90.0 => "Outstanding performance",
        s if s >= 85.0 => "Excellent performance",
        s if s >= 80.0 => "Very good performance",
        s if s >= 75.0 => "Good performance",
        s if s >= 70.0 => "Satisfactory performance",
        _ => "Needs improvement",
    }
}

// ---------------------------------------------------------------------------
// Query rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RosterEntry {
    pub siswa_id: Uuid,
    pub nama: String,
    pub nis: String,
    pub latest_juz_achieved: i32,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AttendanceMark {
    pub siswa_id: Uuid,
    pub tanggal: NaiveDate,
    pub status: PresensiStatus,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GradedDeposit {
    pub siswa_id: Uuid,
    pub tanggal: NaiveDate,
    pub juz: i32,
    pub surah: String,
    pub tajwid: f64,
    pub kelancaran: f64,
    pub makhraj: f64,
    pub adab: f64,
    pub nilai_akhir: f64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CatatanSemester {
    pub id: Uuid,
    pub siswa_id: Uuid,
    pub guru_id: Uuid,
    pub semester: String,
    pub catatan: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CatatanSemesterRequest {
    pub siswa_id: Uuid,
    /// Any date inside the semester; today when absent.
    pub tanggal: Option<NaiveDate>,
    #[validate(length(min = 1, max = 2000, message = "Catatan wajib diisi (maksimal 2000 karakter)"))]
    pub catatan: String,
}

// ---------------------------------------------------------------------------
// Recap
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceCounts {
    pub hadir: i64,
    pub izin: i64,
    pub sakit: i64,
    pub alfa: i64,
}

impl AttendanceCounts {
    fn add(&mut self, status: PresensiStatus) {
        match status {
            PresensiStatus::Hadir => self.hadir += 1,
            PresensiStatus::Izin => self.izin += 1,
            PresensiStatus::Sakit => self.sakit += 1,
            PresensiStatus::Alfa => self.alfa += 1,
        }
    }

    fn merge(&mut self, other: &AttendanceCounts) {
        self.hadir += other.hadir;
        self.izin += other.izin;
        self.sakit += other.sakit;
        self.alfa += other.alfa;
    }

    pub fn total(&self) -> i64 {
        self.hadir + self.izin + self.sakit + self.alfa
    }
}

/// Component means, rounded to whole numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreMeans {
    pub tajwid: Option<f64>,
    pub kelancaran: Option<f64>,
    pub makhraj: Option<f64>,
    pub adab: Option<f64>,
    pub nilai_akhir: Option<f64>,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0u32), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / f64::from(n))
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

impl ScoreMeans {
    fn of(deposits: &[&GradedDeposit]) -> Self {
        let component = |f: fn(&GradedDeposit) -> f64| mean(deposits.iter().map(|d| f(d))).map(f64::round);
        Self {
            tajwid: component(|d| d.tajwid),
            kelancaran: component(|d| d.kelancaran),
            makhraj: component(|d| d.makhraj),
            adab: component(|d| d.adab),
            nilai_akhir: component(|d| d.nilai_akhir),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecap {
    pub siswa_id: Uuid,
    pub nama: String,
    pub nis: String,
    pub kehadiran: AttendanceCounts,
    pub jumlah_setoran: i64,
    pub rata_rata: ScoreMeans,
    /// `Juz 30 - An-Naba` of the latest deposit in the period.
    pub setoran_terakhir: Option<String>,
    pub juz_tercapai: i32,
    pub target_tercapai: bool,
    pub performa: Option<&'static str>,
    pub catatan_semester: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecapSummary {
    pub jumlah_siswa: i64,
    /// Distinct dates with any attendance mark.
    pub total_pertemuan: i64,
    pub kehadiran: AttendanceCounts,
    pub total_setoran: i64,
    pub rata_nilai: Option<f64>,
    pub rata_juz: f64,
    pub siswa_tercapai: i64,
    pub persen_tercapai: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRecap {
    pub periode: ReportPeriod,
    pub target_juz: i32,
    pub siswa: Vec<StudentRecap>,
    pub summary: RecapSummary,
}

pub struct RecapInput<'a> {
    pub roster: &'a [RosterEntry],
    pub attendance: &'a [AttendanceMark],
    pub deposits: &'a [GradedDeposit],
    pub target_juz: i32,
    /// Count a deposit only when the student is marked HADIR on its date.
    pub scores_require_presence: bool,
}

pub fn build_class_recap(periode: ReportPeriod, input: RecapInput<'_>) -> ClassRecap {
    let attendance: Vec<&AttendanceMark> = input
        .attendance
        .iter()
        .filter(|a| periode.contains(a.tanggal))
        .collect();
    let present: HashSet<(Uuid, NaiveDate)> = attendance
        .iter()
        .filter(|a| a.status == PresensiStatus::Hadir)
        .map(|a| (a.siswa_id, a.tanggal))
        .collect();

    let mut deposits_by_siswa: HashMap<Uuid, Vec<&GradedDeposit>> = HashMap::new();
    for d in input.deposits.iter().filter(|d| periode.contains(d.tanggal)) {
        if input.scores_require_presence && !present.contains(&(d.siswa_id, d.tanggal)) {
            continue;
        }
        deposits_by_siswa.entry(d.siswa_id).or_default().push(d);
    }
    let mut counts_by_siswa: HashMap<Uuid, AttendanceCounts> = HashMap::new();
    for a in &attendance {
        counts_by_siswa.entry(a.siswa_id).or_default().add(a.status);
    }

    let mut roster: Vec<&RosterEntry> = input.roster.iter().collect();
    roster.sort_by_key(|r| r.nama.to_lowercase());

    let siswa: Vec<StudentRecap> = roster
        .into_iter()
        .map(|r| {
            let deposits = deposits_by_siswa.remove(&r.siswa_id).unwrap_or_default();
            let rata_rata = ScoreMeans::of(&deposits);
            let setoran_terakhir = deposits
                .iter()
                .max_by_key(|d| d.tanggal)
                .map(|d| format!("Juz {} - {}", d.juz, d.surah));
            StudentRecap {
                siswa_id: r.siswa_id,
                nama: r.nama.clone(),
                nis: r.nis.clone(),
                kehadiran: counts_by_siswa.get(&r.siswa_id).copied().unwrap_or_default(),
                jumlah_setoran: deposits.len() as i64,
                rata_rata,
                setoran_terakhir,
                juz_tercapai: r.latest_juz_achieved,
                target_tercapai: r.latest_juz_achieved >= input.target_juz,
                performa: rata_rata.nilai_akhir.map(performance_level),
                catatan_semester: None,
            }
        })
        .collect();

    let summary = summarize(&siswa, &attendance);
    ClassRecap {
        periode,
        target_juz: input.target_juz,
        siswa,
        summary,
    }
}

fn summarize(siswa: &[StudentRecap], attendance: &[&AttendanceMark]) -> RecapSummary {
    let jumlah_siswa = siswa.len() as i64;
    let mut kehadiran = AttendanceCounts::default();
    for s in siswa {
        kehadiran.merge(&s.kehadiran);
    }
    let meetings: BTreeSet<NaiveDate> = attendance.iter().map(|a| a.tanggal).collect();
    let siswa_tercapai = siswa.iter().filter(|s| s.target_tercapai).count() as i64;
    let persen_tercapai = if jumlah_siswa > 0 {
        round_to(siswa_tercapai as f64 * 100.0 / jumlah_siswa as f64, 1)
    } else {
        0.0
    };

    RecapSummary {
        jumlah_siswa,
        total_pertemuan: meetings.len() as i64,
        kehadiran,
        total_setoran: siswa.iter().map(|s| s.jumlah_setoran).sum(),
        rata_nilai: mean(siswa.iter().filter_map(|s| s.rata_rata.nilai_akhir)).map(|v| round_to(v, 1)),
        rata_juz: mean(siswa.iter().map(|s| f64::from(s.juz_tercapai)))
            .map(|v| round_to(v, 1))
            .unwrap_or(0.0),
        siswa_tercapai,
        persen_tercapai,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn student(nama: &str, juz: i32) -> RosterEntry {
        RosterEntry {
            siswa_id: Uuid::new_v4(),
            nama: nama.into(),
            nis: format!("{juz:04}"),
            latest_juz_achieved: juz,
        }
    }

    fn deposit(siswa_id: Uuid, tanggal: NaiveDate, nilai: f64) -> GradedDeposit {
        GradedDeposit {
            siswa_id,
            tanggal,
            juz: 30,
            surah: "An-Naba".into(),
            tajwid: nilai,
            kelancaran: nilai,
            makhraj: nilai,
            adab: nilai,
            nilai_akhir: nilai,
        }
    }

    fn mark(siswa_id: Uuid, tanggal: NaiveDate, status: PresensiStatus) -> AttendanceMark {
        AttendanceMark { siswa_id, tanggal, status }
    }

    #[test]
    fn periods() {
        let d = date(2025, 2, 14);
        assert_eq!(ReportPeriod::month_of(d), ReportPeriod { from: date(2025, 2, 1), to: date(2025, 2, 28) });
        assert_eq!(ReportPeriod::semester_of(d), ReportPeriod { from: date(2025, 1, 1), to: date(2025, 6, 30) });
        assert_eq!(
            ReportPeriod::semester_of(date(2024, 11, 3)),
            ReportPeriod { from: date(2024, 7, 1), to: date(2024, 12, 31) }
        );
        assert_eq!(
            ReportPeriod::from_shortcut(PeriodeShortcut::BulanLalu, date(2025, 1, 10)),
            ReportPeriod { from: date(2024, 12, 1), to: date(2024, 12, 31) }
        );
        assert_eq!(ReportPeriod::for_view(ViewMode::Harian, d), ReportPeriod::day(d));
        assert!(ReportPeriod::new(date(2025, 3, 2), date(2025, 3, 1)).is_err());
    }

    #[test]
    fn semester_keys() {
        assert_eq!(semester_key(date(2025, 6, 30)), "2025-1");
        assert_eq!(semester_key(date(2025, 7, 1)), "2025-2");
    }

    #[test]
    fn performance_thresholds() {
        assert_eq!(performance_level(90.0), "Outstanding performance");
        assert_eq!(performance_level(84.9), "Very good performance");
        assert_eq!(performance_level(70.0), "Satisfactory performance");
        assert_eq!(performance_level(12.0), "Needs improvement");
    }

    #[test]
    fn recap_counts_and_means() {
        let zaid = student("Zaid", 3);
        let aisyah = student("aisyah", 1);
        let periode = ReportPeriod::month_of(date(2025, 3, 1));
        let attendance = vec![
            mark(zaid.siswa_id, date(2025, 3, 3), PresensiStatus::Hadir),
            mark(zaid.siswa_id, date(2025, 3, 4), PresensiStatus::Sakit),
            mark(aisyah.siswa_id, date(2025, 3, 3), PresensiStatus::Alfa),
            // outside the period
            mark(aisyah.siswa_id, date(2025, 4, 1), PresensiStatus::Hadir),
        ];
        let deposits = vec![
            deposit(zaid.siswa_id, date(2025, 3, 3), 80.0),
            deposit(zaid.siswa_id, date(2025, 3, 10), 85.0),
            deposit(aisyah.siswa_id, date(2025, 2, 27), 99.0),
        ];
        let recap = build_class_recap(
            periode,
            RecapInput {
                roster: &[zaid.clone(), aisyah.clone()],
                attendance: &attendance,
                deposits: &deposits,
                target_juz: 3,
                scores_require_presence: false,
            },
        );

        let names: Vec<_> = recap.siswa.iter().map(|s| s.nama.as_str()).collect();
        assert_eq!(names, ["aisyah", "Zaid"]);

        let z = &recap.siswa[1];
        assert_eq!(z.kehadiran, AttendanceCounts { hadir: 1, izin: 0, sakit: 1, alfa: 0 });
        assert_eq!(z.jumlah_setoran, 2);
        // 82.5 rounds half away from zero
        assert_eq!(z.rata_rata.nilai_akhir, Some(83.0));
        assert_eq!(z.performa, Some("Very good performance"));
        assert!(z.target_tercapai);

        let a = &recap.siswa[0];
        assert_eq!(a.jumlah_setoran, 0);
        assert_eq!(a.rata_rata, ScoreMeans::default());
        assert_eq!(a.performa, None);

        let s = &recap.summary;
        assert_eq!(s.jumlah_siswa, 2);
        assert_eq!(s.total_pertemuan, 2);
        assert_eq!(s.kehadiran.total(), 3);
        assert_eq!(s.total_setoran, 2);
        assert_eq!(s.rata_nilai, Some(83.0));
        assert_eq!(s.rata_juz, 2.0);
        assert_eq!((s.siswa_tercapai, s.persen_tercapai), (1, 50.0));
    }

    #[test]
    fn daily_scores_need_presence() {
        let zaid = student("Zaid", 1);
        let day = date(2025, 3, 3);
        let attendance = vec![mark(zaid.siswa_id, day, PresensiStatus::Izin)];
        let deposits = vec![deposit(zaid.siswa_id, day, 90.0)];
        let input = |require| RecapInput {
            roster: std::slice::from_ref(&zaid),
            attendance: &attendance,
            deposits: &deposits,
            target_juz: 3,
            scores_require_presence: require,
        };

        let strict = build_class_recap(ReportPeriod::day(day), input(true));
        assert_eq!(strict.siswa[0].jumlah_setoran, 0);
        let loose = build_class_recap(ReportPeriod::day(day), input(false));
        assert_eq!(loose.siswa[0].jumlah_setoran, 1);
    }

    #[test]
    fn empty_class() {
        let recap = build_class_recap(
            ReportPeriod::day(date(2025, 1, 1)),
            RecapInput {
                roster: &[],
                attendance: &[],
                deposits: &[],
                target_juz: 3,
                scores_require_presence: false,
            },
        );
        assert_eq!(recap.summary.persen_tercapai, 0.0);
        assert_eq!(recap.summary.rata_nilai, None);
        assert_eq!(recap.summary.rata_juz, 0.0);
    }
}
