//! Criterion microbenchmarks for simtaq-api hot paths.
//!
//! Run with:
//!   cargo bench -p simtaq-api
//!
//! HTML reports are written to `target/criterion/`.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use simtaq_api::cache::TtlCache;
use simtaq_api::certificate::{self, CertificateData, Face, PageLayout, PaperSize, CAPAIAN_BOX, NAME_BOX};
use simtaq_common::quran::{self, AyahRange};
use std::time::Duration;

// ── Juz progress ──────────────────────────────────────────────────────────────

/// A student who has memorized juz 30 plus a scattering of Al-Baqarah.
fn sample_ranges(extra: usize) -> Vec<AyahRange> {
    let mut ranges: Vec<AyahRange> = (78..=114).filter_map(AyahRange::surah).collect();
    ranges.extend((0..extra).map(|i| {
        let from = (i as u16 * 7) % 280 + 1;
        AyahRange::new(2, from, from + 5)
    }));
    ranges
}

fn bench_juz_progress(c: &mut Criterion) {
    let mut group = c.benchmark_group("quran/calculate_juz_progress");
    for extra in [0usize, 50, 500] {
        let ranges = sample_ranges(extra);
        group.bench_with_input(BenchmarkId::from_parameter(ranges.len()), &ranges, |b, ranges| {
            b.iter(|| quran::calculate_juz_progress(black_box(ranges)))
        });
    }
    group.finish();
}

fn bench_parse_surah_range(c: &mut Criterion) {
    let input = "Al-Baqarah 1-5, An-Naba (1-40), Al Mulk, Yasin 1-83, Ar-Rahman (1-78)";
    c.bench_function("quran/parse_surah_range", |b| {
        b.iter(|| quran::parse_surah_range(black_box(input)))
    });
}

// ── Dashboard cache ───────────────────────────────────────────────────────────

fn bench_cache(c: &mut Criterion) {
    let cache = TtlCache::new(Duration::from_secs(300));
    for i in 0..200 {
        cache.set(format!("guru:stats:{i}"), json!({ "totalSiswa": i, "penilaianBulanIni": i * 3 }));
    }

    c.bench_function("cache/get_hit", |b| b.iter(|| cache.get(black_box("guru:stats:42"))));
    c.bench_function("cache/get_miss", |b| b.iter(|| cache.get(black_box("guru:stats:none"))));
    c.bench_function("cache/set_then_invalidate", |b| {
        b.iter(|| {
            cache.set("admin:stats", json!({ "totalSiswa": 120 }));
            cache.invalidate(black_box("admin:stats"));
        })
    });
}

// ── Certificate layout ────────────────────────────────────────────────────────

fn bench_fit_font_size(c: &mut Criterion) {
    let layout = PageLayout::new(PaperSize::A4);
    let name_width = layout.rect(NAME_BOX).w;
    let capaian_width = layout.rect(CAPAIAN_BOX).w;

    c.bench_function("certificate/fit_name", |b| {
        b.iter(|| {
            certificate::fit_font_size(
                black_box("Muhammad Abdurrahman Al-Fatih Nurhidayatullah"),
                Face::Bold,
                name_width,
                certificate::NAME_FONT,
            )
        })
    });
    c.bench_function("certificate/fit_capaian", |b| {
        b.iter(|| {
            certificate::fit_font_size(
                black_box("Telah menyelesaikan Tahfidzul Qur'an Juz 28, 29, 30 dengan predikat Mumtaz"),
                Face::Regular,
                capaian_width,
                certificate::CAPAIAN_FONT,
            )
        })
    });
}

fn bench_render_plain(c: &mut Criterion) {
    let data = CertificateData {
        nama_siswa: "Ahmad Fauzan".into(),
        capaian: "Telah menyelesaikan Tahfidzul Qur'an Juz 30 dengan predikat Mumtaz".into(),
        kota: "Bandar Lampung".into(),
        tanggal: chrono::NaiveDate::from_ymd_opt(2025, 6, 14),
        certificate_number: Some("CERT/TASMI/20250614/0001".into()),
        ..Default::default()
    };

    c.bench_function("certificate/render_without_template", |b| {
        b.iter(|| certificate::render(black_box(&data), PaperSize::A4).unwrap())
    });
}

criterion_group!(
    benches,
    bench_juz_progress,
    bench_parse_surah_range,
    bench_cache,
    bench_fit_font_size,
    bench_render_plain,
);
criterion_main!(benches);
