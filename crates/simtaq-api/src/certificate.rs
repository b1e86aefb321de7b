//! Certificate PDF rendering.
//!
//! Layout is defined on a 932x661 reference canvas (the size templates are
//! designed at) and scaled uniformly onto a landscape page, centered.
//! Text uses the PDF built-in Helvetica faces; widths come from their AFM
//! metrics so names can be shrunk to fit their box.

use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use printpdf::{
    image_crate::{self, DynamicImage, GenericImageView, Rgb as PixelRgb, RgbImage},
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Pt, Rgb,
};
use serde::Deserialize;
use simtaq_common::error::SimtaqError;
use std::sync::Arc;

pub const CANVAS_WIDTH: f32 = 932.0;
pub const CANVAS_HEIGHT: f32 = 661.0;

/// A rectangle on the reference canvas, origin top-left, in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

const fn canvas_box(x: f32, y: f32, w: f32, h: f32) -> CanvasBox {
    CanvasBox { x, y, w, h }
}

pub const NAME_BOX: CanvasBox = canvas_box(177.0, 287.0, 586.0, 103.0);
pub const CAPAIAN_BOX: CanvasBox = canvas_box(175.0, 393.0, 589.0, 33.0);
pub const PLACE_DATE_BOX: CanvasBox = canvas_box(548.0, 503.0, 271.0, 29.0);
pub const LEFT_SIGNER_BOX: CanvasBox = canvas_box(132.0, 539.0, 271.0, 117.0);
pub const RIGHT_SIGNER_BOX: CanvasBox = canvas_box(546.0, 535.0, 271.0, 117.0);

/// Font size range (max, min) in canvas units.
pub const NAME_FONT: (f32, f32) = (40.0, 20.0);
pub const CAPAIAN_FONT: (f32, f32) = (18.0, 12.0);
const FONT_STEP: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaperSize {
    #[default]
    A4,
    F4,
}

impl PaperSize {
    /// Landscape width and height in points.
    pub fn dimensions(&self) -> (f32, f32) {
        match self {
            PaperSize::A4 => (841.89, 595.28),
            PaperSize::F4 => (935.43, 595.28),
        }
    }
}

/// A rectangle on the PDF page in points, origin bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// Mapping from canvas pixels to page points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub page_width: f32,
    pub page_height: f32,
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl PageLayout {
    pub fn new(paper: PaperSize) -> Self {
        let (page_width, page_height) = paper.dimensions();
        let scale = (page_width / CANVAS_WIDTH).min(page_height / CANVAS_HEIGHT);
        Self {
            page_width,
            page_height,
            scale,
            offset_x: (page_width - CANVAS_WIDTH * scale) / 2.0,
            offset_y: (page_height - CANVAS_HEIGHT * scale) / 2.0,
        }
    }

    pub fn rect(&self, b: CanvasBox) -> PageRect {
        let w = b.w * self.scale;
        let h = b.h * self.scale;
        let top = self.offset_y + b.y * self.scale;
        PageRect {
            x: self.offset_x + b.x * self.scale,
            y: self.page_height - top - h,
            w,
            h,
        }
    }

    /// The whole canvas on the page.
    pub fn canvas(&self) -> PageRect {
        self.rect(canvas_box(0.0, 0.0, CANVAS_WIDTH, CANVAS_HEIGHT))
    }
}

// Helvetica / Helvetica-Bold AFM advance widths for ASCII 32..=126, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556, 556,
    556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, 1015, 667, 667, 722, 722, 667,
    611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667,
    667, 611, 278, 278, 278, 469, 556, 333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500,
    222, 833, 556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556, 556,
    556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, 975, 722, 722, 722, 722, 667,
    611, 778, 722, 278, 556, 722, 611, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667,
    667, 611, 333, 278, 333, 584, 556, 333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556,
    278, 889, 611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    Regular,
    Bold,
}

/// Width of `text` at `size`, in the same unit as `size`.
pub fn text_width(text: &str, face: Face, size: f32) -> f32 {
    let table = match face {
        Face::Regular => &HELVETICA_WIDTHS,
        Face::Bold => &HELVETICA_BOLD_WIDTHS,
    };
    let units: u32 = text
        .chars()
        .map(|c| match c as u32 {
            code @ 32..=126 => u32::from(table[(code - 32) as usize]),
            _ => 556,
        })
        .sum();
    units as f32 * size / 1000.0
}

/// Largest size in `max..=min` (0.5 steps) at which `text` fits `width`; `min` when nothing fits.
pub fn fit_font_size(text: &str, face: Face, width: f32, (max, min): (f32, f32)) -> f32 {
    let mut size = max;
    while size > min {
        if text_width(text, face, size) <= width {
            return size;
        }
        size -= FONT_STEP;
    }
    min
}

const BULAN: [&str; 12] = [
    "Januari", "Februari", "Maret", "April", "Mei", "Juni", "Juli", "Agustus", "September", "Oktober",
    "November", "Desember",
];

/// `3 Juni 2025`
pub fn format_tanggal(date: NaiveDate) -> String {
    format!("{} {} {}", date.day(), BULAN[date.month0() as usize], date.year())
}

#[derive(Debug, Clone, Default)]
pub struct SignerBlock {
    pub jabatan: String,
    pub nama: String,
    pub nip: Option<String>,
    /// Signature image bytes (PNG or JPEG).
    pub ttd: Option<Vec<u8>>,
}

/// Everything printed on one certificate.
#[derive(Debug, Clone, Default)]
pub struct CertificateData {
    pub nama_siswa: String,
    pub capaian: String,
    pub kota: String,
    pub tanggal: Option<NaiveDate>,
    pub certificate_number: Option<String>,
    pub signer_kiri: Option<SignerBlock>,
    pub signer_kanan: Option<SignerBlock>,
    /// Background template image bytes, shared across a batch.
    pub template: Option<Arc<[u8]>>,
}

impl CertificateData {
    pub fn validate(&self) -> Result<(), SimtaqError> {
        let mut missing = Vec::new();
        if self.nama_siswa.trim().is_empty() {
            missing.push("nama_siswa");
        }
        if self.capaian.trim().is_empty() {
            missing.push("capaian");
        }
        if missing.is_empty() {
            return Ok(());
        }
        Err(SimtaqError::validation_with(
            format!("Data sertifikat tidak lengkap: {}", missing.join(", ")),
            serde_json::json!({ "missingFields": missing }),
        ))
    }

    pub fn place_date(&self) -> Option<String> {
        let date = self.tanggal?;
        Some(if self.kota.trim().is_empty() {
            format_tanggal(date)
        } else {
            format!("{}, {}", self.kota.trim(), format_tanggal(date))
        })
    }
}

/// Run a PDF builder on the blocking pool; printpdf documents are not `Send`.
pub async fn render_blocking<F>(build: F) -> Result<Vec<u8>, SimtaqError>
where
    F: FnOnce() -> anyhow::Result<Vec<u8>> + Send + 'static,
{
    tokio::task::spawn_blocking(build)
        .await
        .map_err(SimtaqError::internal)?
        .map_err(SimtaqError::Internal)
}

pub async fn render_pdf(data: CertificateData, paper: PaperSize) -> Result<Vec<u8>, SimtaqError> {
    data.validate()?;
    render_blocking(move || render(&data, paper)).await
}

/// One page per certificate. Callers validate each entry first.
pub async fn render_batch_pdf(pages: Vec<CertificateData>, paper: PaperSize) -> Result<Vec<u8>, SimtaqError> {
    render_blocking(move || render_many(&pages, paper)).await
}

pub(crate) fn mm(pt: f32) -> Mm {
    Mm::from(Pt(pt))
}

/// Flatten transparency onto white so signatures keep a clean background.
fn decode_image(bytes: &[u8]) -> anyhow::Result<DynamicImage> {
    let rgba = image_crate::load_from_memory(bytes)?.to_rgba8();
    let (w, h) = rgba.dimensions();
    let mut rgb = RgbImage::new(w, h);
    for (x, y, px) in rgba.enumerate_pixels() {
        let alpha = f32::from(px[3]) / 255.0;
        let blend = |c: u8| (f32::from(c) * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        rgb.put_pixel(x, y, PixelRgb([blend(px[0]), blend(px[1]), blend(px[2])]));
    }
    Ok(DynamicImage::ImageRgb8(rgb))
}

/// Draw an image stretched to `rect`, preserving aspect ratio when `contain`.
fn place_image(layer: &PdfLayerReference, image: &DynamicImage, rect: PageRect, contain: bool) {
    let (iw, ih) = (image.width() as f32, image.height() as f32);
    if iw <= 0.0 || ih <= 0.0 {
        return;
    }
    // at 72 dpi one image pixel is one point
    let (mut sx, mut sy) = (rect.w / iw, rect.h / ih);
    let (mut x, mut y) = (rect.x, rect.y);
    if contain {
        let s = sx.min(sy);
        x += (rect.w - iw * s) / 2.0;
        y += (rect.h - ih * s) / 2.0;
        sx = s;
        sy = s;
    }
    Image::from_dynamic_image(image).add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(mm(x)),
            translate_y: Some(mm(y)),
            scale_x: Some(sx),
            scale_y: Some(sy),
            dpi: Some(72.0),
            ..Default::default()
        },
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

pub(crate) struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

impl Fonts {
    pub(crate) fn builtin(doc: &PdfDocumentReference) -> anyhow::Result<Self> {
        Ok(Self {
            regular: doc.add_builtin_font(BuiltinFont::Helvetica)?,
            bold: doc.add_builtin_font(BuiltinFont::HelveticaBold)?,
        })
    }

    fn get(&self, face: Face) -> &IndirectFontRef {
        match face {
            Face::Regular => &self.regular,
            Face::Bold => &self.bold,
        }
    }
}

/// Write one line in `rect`, baseline at `baseline` points from the rect bottom.
#[allow(clippy::too_many_arguments)]
pub(crate) fn draw_line(
    layer: &PdfLayerReference,
    fonts: &Fonts,
    text: &str,
    face: Face,
    size_pt: f32,
    rect: PageRect,
    baseline: f32,
    align: Align,
) {
    let width = text_width(text, face, size_pt);
    let x = match align {
        Align::Left => rect.x,
        Align::Center => rect.x + (rect.w - width) / 2.0,
        Align::Right => rect.x + rect.w - width,
    };
    layer.use_text(text, size_pt, mm(x), mm(rect.y + baseline), fonts.get(face));
}

/// Vertically centered single line.
fn draw_centered(
    layer: &PdfLayerReference,
    fonts: &Fonts,
    text: &str,
    face: Face,
    size_pt: f32,
    rect: PageRect,
    align: Align,
) {
    // cap height of Helvetica is ~0.72 em
    let baseline = (rect.h - size_pt * 0.72) / 2.0;
    draw_line(layer, fonts, text, face, size_pt, rect, baseline, align);
}

fn draw_signer(
    layer: &PdfLayerReference,
    fonts: &Fonts,
    layout: &PageLayout,
    signer: &SignerBlock,
    area: CanvasBox,
) -> anyhow::Result<()> {
    let rect = layout.rect(area);
    let size = 11.0 * layout.scale;
    let line = size * 1.25;

    draw_line(layer, fonts, &signer.jabatan, Face::Regular, size, rect, rect.h - line, Align::Center);

    if let Some(bytes) = &signer.ttd {
        let image = decode_image(bytes)?;
        let sig = PageRect {
            x: rect.x + rect.w * 0.2,
            y: rect.y + line * 2.2,
            w: rect.w * 0.6,
            h: rect.h - line * 3.6,
        };
        place_image(layer, &image, sig, true);
    }

    let nip_line = signer.nip.as_deref().filter(|n| !n.trim().is_empty());
    let name_baseline = if nip_line.is_some() { line * 1.1 } else { line * 0.4 };
    draw_line(layer, fonts, &signer.nama, Face::Bold, size, rect, name_baseline, Align::Center);
    if let Some(nip) = nip_line {
        draw_line(layer, fonts, &format!("NIP. {nip}"), Face::Regular, size, rect, line * 0.2, Align::Center);
    }
    Ok(())
}

/// Render a certificate to PDF bytes.
pub fn render(data: &CertificateData, paper: PaperSize) -> anyhow::Result<Vec<u8>> {
    render_many(std::slice::from_ref(data), paper)
}

/// Render certificates into one document, one page each.
pub fn render_many(pages: &[CertificateData], paper: PaperSize) -> anyhow::Result<Vec<u8>> {
    let first = pages.first().context("no certificate to render")?;
    let layout = PageLayout::new(paper);
    let title = match pages.len() {
        1 => format!("Sertifikat {}", first.nama_siswa.trim()),
        n => format!("Sertifikat ({n} lembar)"),
    };
    let (doc, page, layer) = PdfDocument::new(title, mm(layout.page_width), mm(layout.page_height), "Sertifikat");
    let fonts = Fonts::builtin(&doc)?;

    // batches share one template; decode it once
    let mut decoded: Option<(Arc<[u8]>, DynamicImage)> = None;
    for (i, data) in pages.iter().enumerate() {
        let layer = if i == 0 {
            doc.get_page(page).get_layer(layer)
        } else {
            let (page, layer) = doc.add_page(mm(layout.page_width), mm(layout.page_height), "Sertifikat");
            doc.get_page(page).get_layer(layer)
        };

        let template = match &data.template {
            Some(bytes) => {
                let cached = matches!(&decoded, Some((key, _)) if Arc::ptr_eq(key, bytes));
                if !cached {
                    decoded = Some((bytes.clone(), decode_image(bytes)?));
                }
                decoded.as_ref().map(|(_, image)| image)
            }
            None => None,
        };
        draw_certificate(&layer, &fonts, &layout, data, template)?;
    }

    Ok(doc.save_to_bytes()?)
}

fn draw_certificate(
    layer: &PdfLayerReference,
    fonts: &Fonts,
    layout: &PageLayout,
    data: &CertificateData,
    template: Option<&DynamicImage>,
) -> anyhow::Result<()> {
    if let Some(image) = template {
        place_image(layer, image, layout.canvas(), false);
    }

    layer.set_fill_color(Color::Rgb(Rgb::new(0.1, 0.1, 0.1, None)));

    let nama = data.nama_siswa.trim();
    let size = fit_font_size(nama, Face::Bold, NAME_BOX.w, NAME_FONT);
    draw_centered(layer, fonts, nama, Face::Bold, size * layout.scale, layout.rect(NAME_BOX), Align::Center);

    let capaian = data.capaian.trim();
    let size = fit_font_size(capaian, Face::Regular, CAPAIAN_BOX.w, CAPAIAN_FONT);
    draw_centered(
        layer,
        fonts,
        capaian,
        Face::Regular,
        size * layout.scale,
        layout.rect(CAPAIAN_BOX),
        Align::Center,
    );

    if let Some(place_date) = data.place_date() {
        let size = fit_font_size(&place_date, Face::Regular, PLACE_DATE_BOX.w, (13.0, 9.0));
        draw_centered(
            layer,
            fonts,
            &place_date,
            Face::Regular,
            size * layout.scale,
            layout.rect(PLACE_DATE_BOX),
            Align::Right,
        );
    }

    if let Some(signer) = &data.signer_kiri {
        draw_signer(layer, fonts, layout, signer, LEFT_SIGNER_BOX)?;
    }
    if let Some(signer) = &data.signer_kanan {
        draw_signer(layer, fonts, layout, signer, RIGHT_SIGNER_BOX)?;
    }

    if let Some(number) = &data.certificate_number {
        let rect = layout.rect(canvas_box(0.0, 20.0, CANVAS_WIDTH, 16.0));
        draw_centered(layer, fonts, number, Face::Regular, 9.0 * layout.scale, rect, Align::Center);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn a4_layout_is_height_bound_and_centered() {
        let layout = PageLayout::new(PaperSize::A4);
        let expected = (841.89 / 932.0f32).min(595.28 / 661.0);
        assert!(approx(layout.scale, expected));
        assert!(approx(layout.offset_x * 2.0 + CANVAS_WIDTH * layout.scale, 841.89));
        assert!(approx(layout.offset_y * 2.0 + CANVAS_HEIGHT * layout.scale, 595.28));
    }

    #[test]
    fn f4_layout_centers_horizontally() {
        let layout = PageLayout::new(PaperSize::F4);
        assert!(approx(layout.scale, 595.28 / 661.0));
        assert!(layout.offset_x > 0.0);
        assert!(approx(layout.offset_y, 0.0));
    }

    #[test]
    fn boxes_flip_to_pdf_origin() {
        let layout = PageLayout::new(PaperSize::F4);
        let canvas = layout.canvas();
        assert!(approx(canvas.y, 0.0));
        assert!(approx(canvas.h, 595.28));

        let name = layout.rect(NAME_BOX);
        let top_from_page_top = layout.page_height - (name.y + name.h);
        assert!(approx(top_from_page_top, 287.0 * layout.scale));
        assert!(approx(name.x, layout.offset_x + 177.0 * layout.scale));
    }

    #[test]
    fn font_fitting() {
        assert_eq!(fit_font_size("Aisyah", Face::Bold, NAME_BOX.w, NAME_FONT), 40.0);

        let long = "Muhammad Abdurrahman Al-Fatih Nasrullah";
        let size = fit_font_size(long, Face::Bold, NAME_BOX.w, NAME_FONT);
        assert!(size < 40.0 && size >= 20.0);
        assert!(text_width(long, Face::Bold, size) <= NAME_BOX.w);
        assert_eq!((size * 2.0).fract(), 0.0);

        let absurd = "W".repeat(200);
        assert_eq!(fit_font_size(&absurd, Face::Regular, CAPAIAN_BOX.w, CAPAIAN_FONT), 12.0);
    }

    #[test]
    fn indonesian_dates() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
        assert_eq!(format_tanggal(date), "3 Juni 2025");

        let data = CertificateData {
            kota: "Bandar Lampung".into(),
            tanggal: Some(date),
            ..Default::default()
        };
        assert_eq!(data.place_date().as_deref(), Some("Bandar Lampung, 3 Juni 2025"));
    }

    #[test]
    fn name_and_capaian_are_required() {
        let data = CertificateData {
            nama_siswa: "Aisyah".into(),
            ..Default::default()
        };
        assert!(matches!(data.validate(), Err(SimtaqError::Validation { .. })));
    }

    #[test]
    fn renders_pdf_without_template() {
        let data = CertificateData {
            nama_siswa: "Aisyah Putri".into(),
            capaian: "Telah menyelesaikan Tasmi' 3 Juz dengan predikat Mumtaz".into(),
            kota: "Bandar Lampung".into(),
            tanggal: NaiveDate::from_ymd_opt(2025, 6, 3),
            certificate_number: Some("CERT/TASMI/20250603/0001".into()),
            signer_kiri: Some(SignerBlock {
                jabatan: "Kepala Madrasah".into(),
                nama: "H. Ahmad Fauzi".into(),
                nip: Some("197001011995031001".into()),
                ttd: None,
            }),
            ..Default::default()
        };
        let bytes = render(&data, PaperSize::A4).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn batch_renders_one_page_per_certificate() {
        let pages: Vec<CertificateData> = ["Aisyah", "Zaid", "Fatimah"]
            .into_iter()
            .map(|nama| CertificateData {
                nama_siswa: nama.into(),
                capaian: "Telah menyelesaikan Tahfidzul Qur'an Juz 30".into(),
                ..Default::default()
            })
            .collect();
        let batch = render_many(&pages, PaperSize::F4).unwrap();
        let single = render(&pages[0], PaperSize::F4).unwrap();
        assert!(batch.starts_with(b"%PDF"));
        assert!(batch.len() > single.len());
        assert!(render_many(&[], PaperSize::A4).is_err());
    }
}
