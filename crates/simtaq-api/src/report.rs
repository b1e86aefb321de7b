//! Report and result-sheet PDFs, plus CSV export of report tables.
//!
//! Pages are filled top-down by a cursor. Tables repeat their header row on
//! every page and clip cell text to the column width, so a row is always one
//! line high.

use axum::{
    body::Body,
    http::header,
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use printpdf::{Line, PdfDocument, PdfDocumentReference, PdfLayerReference, Point};
use serde::Deserialize;
use simtaq_common::{
    config::SchoolConfig,
    error::SimtaqError,
    models::{
        laporan::{ClassRecap, ReportPeriod},
        tasmi::TasmiDetail,
    },
};

use crate::certificate::{draw_line, format_tanggal, mm, text_width, Align, Face, Fonts, PageRect};
use crate::routes::uploads::sanitize_filename;

const MARGIN: f32 = 36.0;
const BODY_SIZE: f32 = 9.0;
const ROW_HEIGHT: f32 = 15.0;
const CELL_PAD: f32 = 3.0;
const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    /// A4 width and height in points.
    fn dimensions(self) -> (f32, f32) {
        match self {
            Orientation::Portrait => (595.28, 841.89),
            Orientation::Landscape => (841.89, 595.28),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Pdf,
    Csv,
}

pub struct Column {
    pub title: &'static str,
    /// Share of the table width, relative to the other columns.
    pub weight: f32,
    pub align: Align,
}

const fn col(title: &'static str, weight: f32, align: Align) -> Column {
    Column { title, weight, align }
}

pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn widths(&self, total: f32) -> Vec<f32> {
        let sum: f32 = self.columns.iter().map(|c| c.weight).sum();
        self.columns
            .iter()
            .map(|c| if sum > 0.0 { total * c.weight / sum } else { 0.0 })
            .collect()
    }
}

/// Everything printed on one report.
pub struct Report {
    pub school: String,
    pub title: String,
    pub orientation: Orientation,
    /// Label / value lines under the title.
    pub meta: Vec<(String, String)>,
    pub table: Table,
    pub summary: Vec<(String, String)>,
    /// Heading and free text printed after the summary.
    pub note: Option<(String, String)>,
    pub place_date: Option<String>,
}

/// `text` shortened with `...` so it fits `width` at `size`.
pub fn clip(text: &str, face: Face, size: f32, width: f32) -> String {
    if text_width(text, face, size) <= width {
        return text.to_string();
    }
    let budget = width - text_width(ELLIPSIS, face, size);
    let mut used = 0.0;
    let mut out = String::new();
    let mut buf = [0u8; 4];
    for c in text.chars() {
        let w = text_width(c.encode_utf8(&mut buf), face, size);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    let mut out = out.trim_end().to_string();
    out.push_str(ELLIPSIS);
    out
}

/// Greedy word wrap to `width`. Words longer than a line are clipped.
pub fn wrap(text: &str, face: Face, size: f32, width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if line.is_empty() { word.to_string() } else { format!("{line} {word}") };
            if text_width(&candidate, face, size) <= width {
                line = candidate;
                continue;
            }
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            line = clip(word, face, size, width);
        }
        lines.push(line);
    }
    lines
}

struct Writer {
    doc: PdfDocumentReference,
    fonts: Fonts,
    width: f32,
    height: f32,
    layer: PdfLayerReference,
    /// Top of the next line, points from the page bottom.
    cursor: f32,
}

impl Writer {
    fn new(title: &str, orientation: Orientation) -> anyhow::Result<Self> {
        let (width, height) = orientation.dimensions();
        let (doc, page, layer) = PdfDocument::new(title, mm(width), mm(height), "Laporan");
        let fonts = Fonts::builtin(&doc)?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            fonts,
            width,
            height,
            layer,
            cursor: height - MARGIN,
        })
    }

    fn content_width(&self) -> f32 {
        self.width - 2.0 * MARGIN
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(mm(self.width), mm(self.height), "Laporan");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.cursor = self.height - MARGIN;
    }

    /// Break the page unless `space` fits above the bottom margin. True on a break.
    fn reserve(&mut self, space: f32) -> bool {
        if self.cursor - space < MARGIN {
            self.new_page();
            return true;
        }
        false
    }

    fn text_at(&self, text: &str, face: Face, size: f32, x: f32, w: f32, baseline: f32, align: Align) {
        let rect = PageRect { x, y: 0.0, w, h: 0.0 };
        draw_line(&self.layer, &self.fonts, text, face, size, rect, baseline, align);
    }

    fn line(&mut self, text: &str, face: Face, size: f32, align: Align) {
        let height = size * 1.5;
        self.reserve(height);
        let text = clip(text, face, size, self.content_width());
        self.text_at(&text, face, size, MARGIN, self.content_width(), self.cursor - size, align);
        self.cursor -= height;
    }

    fn gap(&mut self, points: f32) {
        self.cursor -= points;
    }

    fn rule(&mut self) {
        let y = mm(self.cursor);
        self.layer.set_outline_thickness(0.5);
        self.layer.add_line(Line {
            points: vec![
                (Point::new(mm(MARGIN), y), false),
                (Point::new(mm(self.width - MARGIN), y), false),
            ],
            is_closed: false,
        });
    }

    fn pairs(&mut self, pairs: &[(String, String)]) {
        let label_width = pairs
            .iter()
            .map(|(label, _)| text_width(label, Face::Regular, BODY_SIZE))
            .fold(0.0, f32::max)
            + 12.0;
        for (label, value) in pairs {
            let height = BODY_SIZE * 1.6;
            self.reserve(height);
            let baseline = self.cursor - BODY_SIZE;
            self.text_at(label, Face::Regular, BODY_SIZE, MARGIN, label_width, baseline, Align::Left);
            let value_width = self.content_width() - label_width;
            let value = clip(&format!(": {value}"), Face::Bold, BODY_SIZE, value_width);
            self.text_at(&value, Face::Bold, BODY_SIZE, MARGIN + label_width, value_width, baseline, Align::Left);
            self.cursor -= height;
        }
    }

    fn row<'a>(&mut self, table: &Table, widths: &[f32], cells: impl Iterator<Item = &'a str>, face: Face) {
        let baseline = self.cursor - ROW_HEIGHT + 4.5;
        let mut x = MARGIN;
        for ((cell, column), width) in cells.zip(&table.columns).zip(widths) {
            let inner = (width - 2.0 * CELL_PAD).max(0.0);
            let text = clip(cell, face, BODY_SIZE, inner);
            self.text_at(&text, face, BODY_SIZE, x + CELL_PAD, inner, baseline, column.align);
            x += width;
        }
        self.cursor -= ROW_HEIGHT;
    }

    fn header(&mut self, table: &Table, widths: &[f32]) {
        self.rule();
        self.row(table, widths, table.columns.iter().map(|c| c.title), Face::Bold);
        self.rule();
    }

    fn table(&mut self, table: &Table) {
        let widths = table.widths(self.content_width());
        self.reserve(ROW_HEIGHT * 2.0);
        self.header(table, &widths);
        for cells in &table.rows {
            if self.reserve(ROW_HEIGHT) {
                self.header(table, &widths);
            }
            self.row(table, &widths, cells.iter().map(String::as_str), Face::Regular);
        }
        self.rule();
    }

    fn finish(self) -> anyhow::Result<Vec<u8>> {
        Ok(self.doc.save_to_bytes()?)
    }
}

pub fn render(report: &Report) -> anyhow::Result<Vec<u8>> {
    let mut w = Writer::new(&report.title, report.orientation)?;

    w.line(&report.school, Face::Bold, 13.0, Align::Center);
    w.line(&report.title, Face::Bold, 11.0, Align::Center);
    w.gap(4.0);
    w.rule();
    w.gap(8.0);
    w.pairs(&report.meta);
    w.gap(6.0);

    if report.table.rows.is_empty() {
        w.line("Tidak ada data pada periode ini.", Face::Regular, BODY_SIZE, Align::Left);
    } else {
        w.table(&report.table);
    }

    if !report.summary.is_empty() {
        w.gap(10.0);
        w.line("Ringkasan", Face::Bold, 10.0, Align::Left);
        w.pairs(&report.summary);
    }

    if let Some((heading, text)) = &report.note {
        w.gap(10.0);
        w.line(heading, Face::Bold, 10.0, Align::Left);
        let width = w.content_width();
        for line in wrap(text, Face::Regular, BODY_SIZE, width) {
            w.line(&line, Face::Regular, BODY_SIZE, Align::Left);
        }
    }

    if let Some(place_date) = &report.place_date {
        w.gap(18.0);
        w.line(place_date, Face::Regular, BODY_SIZE, Align::Right);
    }

    w.finish()
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Hafalan,
    Kehadiran,
    Rekap,
}

impl ReportKind {
    pub fn title(self) -> &'static str {
        match self {
            ReportKind::Hafalan => "Laporan Hafalan Siswa",
            ReportKind::Kehadiran => "Laporan Kehadiran dan Penilaian",
            ReportKind::Rekap => "Rekap Tahfidz Kelas",
        }
    }

    fn slug(self) -> &'static str {
        match self {
            ReportKind::Hafalan => "Hafalan",
            ReportKind::Kehadiran => "Kehadiran",
            ReportKind::Rekap => "Rekap",
        }
    }
}

fn score(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.0}")).unwrap_or_else(|| "-".into())
}

pub fn period_label(periode: ReportPeriod) -> String {
    if periode.from == periode.to {
        format_tanggal(periode.from)
    } else {
        format!("{} s.d. {}", format_tanggal(periode.from), format_tanggal(periode.to))
    }
}

pub fn place_date(school: &SchoolConfig, date: NaiveDate) -> String {
    match school.city.trim() {
        "" => format_tanggal(date),
        city => format!("{city}, {}", format_tanggal(date)),
    }
}

pub fn recap_table(kind: ReportKind, recap: &ClassRecap) -> Table {
    use Align::{Center, Left};

    let with_notes = recap.siswa.iter().any(|s| s.catatan_semester.is_some());
    let mut columns = vec![col("No", 3.0, Center), col("NIS", 8.0, Left), col("Nama", 18.0, Left)];
    match kind {
        ReportKind::Hafalan => columns.extend([
            col("Setoran", 6.0, Center),
            col("Setoran Terakhir", 18.0, Left),
            col("Juz", 4.0, Center),
            col("Rata-rata", 6.0, Center),
            col("Target", 7.0, Center),
        ]),
        ReportKind::Kehadiran => columns.extend([
            col("H", 3.0, Center),
            col("I", 3.0, Center),
            col("S", 3.0, Center),
            col("A", 3.0, Center),
            col("Tajwid", 6.0, Center),
            col("Kelancaran", 7.0, Center),
            col("Makhraj", 6.0, Center),
            col("Adab", 5.0, Center),
            col("Nilai", 5.0, Center),
        ]),
        ReportKind::Rekap => columns.extend([
            col("H", 3.0, Center),
            col("I", 3.0, Center),
            col("S", 3.0, Center),
            col("A", 3.0, Center),
            col("Setoran", 6.0, Center),
            col("Nilai", 5.0, Center),
            col("Juz", 4.0, Center),
            col("Performa", 15.0, Left),
        ]),
    }
    if with_notes {
        columns.push(col("Catatan", 20.0, Left));
    }

    let rows = recap
        .siswa
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let mut row = vec![(i + 1).to_string(), s.nis.clone(), s.nama.clone()];
            let k = &s.kehadiran;
            match kind {
                ReportKind::Hafalan => row.extend([
                    s.jumlah_setoran.to_string(),
                    s.setoran_terakhir.clone().unwrap_or_else(|| "-".into()),
                    s.juz_tercapai.to_string(),
                    score(s.rata_rata.nilai_akhir),
                    if s.target_tercapai { "Tercapai" } else { "Belum" }.to_string(),
                ]),
                ReportKind::Kehadiran => row.extend([
                    k.hadir.to_string(),
                    k.izin.to_string(),
                    k.sakit.to_string(),
                    k.alfa.to_string(),
                    score(s.rata_rata.tajwid),
                    score(s.rata_rata.kelancaran),
                    score(s.rata_rata.makhraj),
                    score(s.rata_rata.adab),
                    score(s.rata_rata.nilai_akhir),
                ]),
                ReportKind::Rekap => row.extend([
                    k.hadir.to_string(),
                    k.izin.to_string(),
                    k.sakit.to_string(),
                    k.alfa.to_string(),
                    s.jumlah_setoran.to_string(),
                    score(s.rata_rata.nilai_akhir),
                    s.juz_tercapai.to_string(),
                    s.performa.unwrap_or("-").to_string(),
                ]),
            }
            if with_notes {
                row.push(s.catatan_semester.clone().unwrap_or_default());
            }
            row
        })
        .collect();

    Table { columns, rows }
}

pub fn recap_summary(recap: &ClassRecap) -> Vec<(String, String)> {
    let s = &recap.summary;
    let k = &s.kehadiran;
    vec![
        ("Jumlah siswa".into(), s.jumlah_siswa.to_string()),
        ("Jumlah pertemuan".into(), s.total_pertemuan.to_string()),
        (
            "Kehadiran".into(),
            format!("Hadir {}, Izin {}, Sakit {}, Alfa {}", k.hadir, k.izin, k.sakit, k.alfa),
        ),
        ("Total setoran".into(), s.total_setoran.to_string()),
        ("Rata-rata nilai".into(), s.rata_nilai.map(|v| format!("{v:.1}")).unwrap_or_else(|| "-".into())),
        ("Rata-rata juz".into(), format!("{:.1}", s.rata_juz)),
        (
            format!("Mencapai target {} juz", recap.target_juz),
            format!("{} siswa ({:.1}%)", s.siswa_tercapai, s.persen_tercapai),
        ),
    ]
}

pub fn class_report(
    kind: ReportKind,
    kelas_nama: &str,
    recap: &ClassRecap,
    school: &SchoolConfig,
    printed_on: NaiveDate,
) -> Report {
    Report {
        school: school.name.clone(),
        title: kind.title().to_string(),
        orientation: Orientation::Landscape,
        meta: vec![
            ("Kelas".into(), kelas_nama.to_string()),
            ("Periode".into(), period_label(recap.periode)),
        ],
        table: recap_table(kind, recap),
        summary: recap_summary(recap),
        note: None,
        place_date: Some(place_date(school, printed_on)),
    }
}

pub fn report_filename(kind: ReportKind, kelas_nama: &str, periode: ReportPeriod, ext: &str) -> String {
    sanitize_filename(&format!(
        "Laporan_{}_{}_{}_{}.{ext}",
        kind.slug(),
        kelas_nama.trim(),
        periode.from.format("%Y%m%d"),
        periode.to.format("%Y%m%d"),
    ))
}

pub fn tasmi_rekap_table(rows: &[TasmiDetail]) -> Table {
    use Align::{Center, Left};

    let columns = vec![
        col("No", 3.0, Center),
        col("Nama", 16.0, Left),
        col("Kelas", 8.0, Left),
        col("Jumlah Juz", 6.0, Center),
        col("Juz Diuji", 10.0, Left),
        col("Tanggal Ujian", 10.0, Center),
        col("Kelancaran", 7.0, Center),
        col("Tajwid", 6.0, Center),
        col("Adab", 5.0, Center),
        col("Irama", 5.0, Center),
        col("Nilai Akhir", 7.0, Center),
        col("Predikat", 9.0, Left),
    ];
    let rows = rows
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let t = &d.tasmi;
            vec![
                (i + 1).to_string(),
                d.siswa_nama.clone(),
                d.kelas_nama.clone().unwrap_or_else(|| "-".into()),
                t.jumlah_hafalan.to_string(),
                t.juz_yang_ditasmi.clone(),
                t.tanggal_ujian.map(|d| d.format("%d/%m/%Y").to_string()).unwrap_or_else(|| "-".into()),
                score(t.nilai_kelancaran),
                score(t.nilai_tajwid),
                score(t.nilai_adab),
                score(t.nilai_irama),
                t.nilai_akhir.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".into()),
                t.predikat.clone().unwrap_or_else(|| "-".into()),
            ]
        })
        .collect();
    Table { columns, rows }
}

/// Mean final score of graded rows, two decimals.
pub fn tasmi_average(rows: &[TasmiDetail]) -> Option<f64> {
    let scores: Vec<f64> = rows.iter().filter_map(|d| d.tasmi.nilai_akhir).collect();
    if scores.is_empty() {
        return None;
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    Some((mean * 100.0).round() / 100.0)
}

/// Result sheet of one graded exam.
pub fn tasmi_result_report(
    detail: &TasmiDetail,
    school: &SchoolConfig,
    printed_on: NaiveDate,
) -> Result<Report, SimtaqError> {
    let t = &detail.tasmi;
    let nilai_akhir = t
        .nilai_akhir
        .ok_or_else(|| SimtaqError::validation("Nilai belum tersedia. Selesaikan penilaian terlebih dahulu."))?;

    let table = Table {
        columns: vec![
            col("No", 3.0, Align::Center),
            col("Komponen Penilaian", 20.0, Align::Left),
            col("Nilai", 6.0, Align::Center),
        ],
        rows: [
            ("Kelancaran", t.nilai_kelancaran),
            ("Tajwid", t.nilai_tajwid),
            ("Adab", t.nilai_adab),
            ("Irama", t.nilai_irama),
        ]
        .into_iter()
        .enumerate()
        .map(|(i, (label, value))| vec![(i + 1).to_string(), label.to_string(), score(value)])
        .collect(),
    };

    let status = match t.is_passed {
        Some(true) => "LULUS",
        Some(false) => "TIDAK LULUS",
        None => "-",
    };

    Ok(Report {
        school: school.name.clone(),
        title: "Laporan Hasil Ujian Tasmi' Al-Qur'an".into(),
        orientation: Orientation::Portrait,
        meta: vec![
            ("Nama".into(), detail.siswa_nama.clone()),
            ("NIS".into(), detail.siswa_nis.clone()),
            ("Kelas".into(), detail.kelas_nama.clone().unwrap_or_else(|| "-".into())),
            ("Guru Pembimbing".into(), detail.guru_pengampu_nama.clone()),
            ("Penguji".into(), detail.guru_penguji_nama.clone().unwrap_or_else(|| "-".into())),
            ("Juz yang Ditasmi'".into(), t.juz_yang_ditasmi.clone()),
            ("Jumlah Hafalan".into(), format!("{} juz", t.jumlah_hafalan)),
            (
                "Tanggal Ujian".into(),
                t.tanggal_ujian.map(format_tanggal).unwrap_or_else(|| "-".into()),
            ),
        ],
        table,
        summary: vec![
            ("Nilai Akhir".into(), format!("{nilai_akhir:.2}")),
            ("Predikat".into(), t.predikat.clone().unwrap_or_else(|| "-".into())),
            ("Status".into(), status.into()),
        ],
        note: t
            .catatan_penguji
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| ("Catatan Penguji".to_string(), c.to_string())),
        place_date: Some(place_date(school, printed_on)),
    })
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

pub fn to_csv(table: &Table) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(table.columns.iter().map(|c| c.title))?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("CSV buffer flush failed: {}", e.error()))
}

pub fn attachment(bytes: Vec<u8>, content_type: &'static str, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        Body::from(bytes),
    )
        .into_response()
}

pub fn pdf_attachment(bytes: Vec<u8>, filename: &str) -> Response {
    attachment(bytes, "application/pdf", filename)
}

pub fn csv_attachment(bytes: Vec<u8>, filename: &str) -> Response {
    attachment(bytes, "text/csv; charset=utf-8", filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use simtaq_common::models::{
        laporan::{build_class_recap, AttendanceMark, GradedDeposit, RecapInput, RosterEntry},
        presensi::PresensiStatus,
        tasmi::{Tasmi, TasmiStatus},
    };
    use uuid::Uuid;

    fn school() -> SchoolConfig {
        SchoolConfig {
            name: "MAN 1 Bandar Lampung".into(),
            city: "Bandar Lampung".into(),
            default_target_juz: 3,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn recap(students: usize) -> ClassRecap {
        let roster: Vec<RosterEntry> = (0..students)
            .map(|i| RosterEntry {
                siswa_id: Uuid::new_v4(),
                nama: format!("Siswa {i:03}"),
                nis: format!("{:05}", 10000 + i),
                latest_juz_achieved: (i % 5) as i32,
            })
            .collect();
        let day = date(2025, 3, 3);
        let attendance: Vec<AttendanceMark> = roster
            .iter()
            .map(|r| AttendanceMark { siswa_id: r.siswa_id, tanggal: day, status: PresensiStatus::Hadir })
            .collect();
        let deposits: Vec<GradedDeposit> = roster
            .iter()
            .map(|r| GradedDeposit {
                siswa_id: r.siswa_id,
                tanggal: day,
                juz: 30,
                surah: "An-Naba".into(),
                tajwid: 80.0,
                kelancaran: 85.0,
                makhraj: 90.0,
                adab: 95.0,
                nilai_akhir: 87.5,
            })
            .collect();
        build_class_recap(
            ReportPeriod::month_of(day),
            RecapInput {
                roster: &roster,
                attendance: &attendance,
                deposits: &deposits,
                target_juz: 3,
                scores_require_presence: false,
            },
        )
    }

    fn graded_tasmi(nilai: Option<f64>) -> TasmiDetail {
        let now = Utc::now();
        TasmiDetail {
            tasmi: Tasmi {
                id: Uuid::new_v4(),
                siswa_id: Uuid::new_v4(),
                kelas_id: None,
                guru_pengampu_id: Uuid::new_v4(),
                guru_verifikasi_id: None,
                guru_penguji_id: None,
                jumlah_hafalan: 3,
                juz_yang_ditasmi: "28, 29, 30".into(),
                jam_tasmi: "08:00".into(),
                tanggal_tasmi: date(2025, 6, 1),
                tanggal_ujian: Some(date(2025, 6, 3)),
                catatan: None,
                catatan_penolakan: None,
                status_pendaftaran: TasmiStatus::Selesai,
                nilai_kelancaran: nilai,
                nilai_tajwid: nilai,
                nilai_adab: nilai,
                nilai_irama: nilai,
                nilai_akhir: nilai,
                predikat: Some("Mumtaz".into()),
                is_passed: nilai.map(|n| n >= 70.0),
                catatan_penguji: Some("Bacaan lancar, perhatikan mad thabi'i pada juz 29.".into()),
                published_at: None,
                tanggal_daftar: now,
                updated_at: now,
            },
            siswa_nama: "Aisyah Putri".into(),
            siswa_nis: "12345".into(),
            kelas_nama: Some("XII IPA 1".into()),
            guru_pengampu_nama: "Ust. Ahmad".into(),
            guru_penguji_nama: Some("Ust. Hasan".into()),
        }
    }

    #[test]
    fn clipping_fits_the_width() {
        assert_eq!(clip("Aisyah", Face::Regular, 9.0, 200.0), "Aisyah");
        let long = "Muhammad Abdurrahman Al-Fatih Nurhidayatullah";
        let clipped = clip(long, Face::Regular, 9.0, 80.0);
        assert!(clipped.ends_with(ELLIPSIS));
        assert!(text_width(&clipped, Face::Regular, 9.0) <= 80.0);
    }

    #[test]
    fn wrapping_keeps_lines_within_width() {
        let text = "Bacaan sudah lancar dan tartil. Perlu memperbaiki panjang pendek mad pada beberapa ayat.";
        let lines = wrap(text, Face::Regular, 9.0, 120.0);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| text_width(l, Face::Regular, 9.0) <= 120.0));
        assert_eq!(lines.join(" "), text);
    }

    #[test]
    fn column_widths_fill_the_table() {
        let table = recap_table(ReportKind::Kehadiran, &recap(1));
        let widths = table.widths(700.0);
        assert!((widths.iter().sum::<f32>() - 700.0).abs() < 0.01);
        assert_eq!(widths.len(), table.columns.len());
    }

    #[test]
    fn tables_follow_the_report_kind() {
        let r = recap(2);
        for kind in [ReportKind::Hafalan, ReportKind::Kehadiran, ReportKind::Rekap] {
            let table = recap_table(kind, &r);
            assert_eq!(table.rows.len(), 2);
            assert!(table.rows.iter().all(|row| row.len() == table.columns.len()), "{kind:?}");
        }
        let hafalan = recap_table(ReportKind::Hafalan, &r);
        assert_eq!(hafalan.rows[0][4], "Juz 30 - An-Naba");
        // 87.5 rounds to 88
        assert_eq!(hafalan.rows[0][6], "88");
    }

    #[test]
    fn semester_notes_add_a_column() {
        let mut r = recap(2);
        r.siswa[1].catatan_semester = Some("Istiqamah".into());
        let table = recap_table(ReportKind::Rekap, &r);
        assert_eq!(table.columns.last().map(|c| c.title), Some("Catatan"));
        assert_eq!(table.rows[0].last().map(String::as_str), Some(""));
        assert_eq!(table.rows[1].last().map(String::as_str), Some("Istiqamah"));
    }

    #[test]
    fn long_reports_span_pages() {
        let r = recap(120);
        let short = render(&class_report(ReportKind::Rekap, "XII A", &recap(3), &school(), date(2025, 3, 31))).unwrap();
        let long = render(&class_report(ReportKind::Rekap, "XII A", &r, &school(), date(2025, 3, 31))).unwrap();
        assert!(short.starts_with(b"%PDF"));
        assert!(long.len() > short.len());
    }

    #[test]
    fn labels_and_filenames() {
        assert_eq!(period_label(ReportPeriod::day(date(2025, 6, 3))), "3 Juni 2025");
        assert_eq!(
            period_label(ReportPeriod::month_of(date(2025, 6, 3))),
            "1 Juni 2025 s.d. 30 Juni 2025"
        );
        assert_eq!(
            report_filename(ReportKind::Hafalan, "XII IPA 1", ReportPeriod::month_of(date(2025, 6, 3)), "pdf"),
            "Laporan_Hafalan_XII_IPA_1_20250601_20250630.pdf"
        );
        assert_eq!(place_date(&school(), date(2025, 6, 3)), "Bandar Lampung, 3 Juni 2025");
    }

    #[test]
    fn result_sheet_needs_a_final_score() {
        let err = tasmi_result_report(&graded_tasmi(None), &school(), date(2025, 6, 4));
        assert!(matches!(err, Err(SimtaqError::Validation { .. })));

        let report = tasmi_result_report(&graded_tasmi(Some(92.0)), &school(), date(2025, 6, 4)).unwrap();
        assert_eq!(report.orientation, Orientation::Portrait);
        assert_eq!(report.summary[0].1, "92.00");
        assert_eq!(report.summary[2].1, "LULUS");
        assert!(report.note.is_some());
        assert!(render(&report).unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn tasmi_recap_rows_and_average() {
        let rows = vec![graded_tasmi(Some(90.0)), graded_tasmi(Some(75.5))];
        let table = tasmi_rekap_table(&rows);
        assert_eq!(table.rows[1][10], "75.50");
        assert_eq!(table.rows[0][5], "03/06/2025");
        assert_eq!(tasmi_average(&rows), Some(82.75));
        assert_eq!(tasmi_average(&[]), None);
    }

    #[test]
    fn csv_export_has_header_and_rows() {
        let table = recap_table(ReportKind::Kehadiran, &recap(2));
        let text = String::from_utf8(to_csv(&table).unwrap()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("No,NIS,Nama,H,I,S,A"));
        assert!(lines[1].starts_with("1,10000,Siswa 000,1,0,0,0"));
    }

    #[test]
    fn attachment_headers() {
        let response = pdf_attachment(vec![b'%'], "Laporan.pdf");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Laporan.pdf\""
        );
    }
}
