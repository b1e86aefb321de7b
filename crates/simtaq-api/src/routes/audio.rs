//! Recitation audio proxy.
//!
//! Browsers cannot always reach the audio CDNs directly (CORS, mixed content),
//! so the server fetches the ayah MP3 and streams it back. Providers are tried
//! in order until one answers 2xx.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use simtaq_common::{
    error::{SimtaqError, SimtaqResult},
    quran,
};
use std::sync::Arc;

use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/audio/proxy", get(proxy))
}

#[derive(Debug, Deserialize)]
pub struct AudioQuery {
    surah: Option<String>,
    ayah: Option<String>,
    reciter: Option<String>,
}

/// Folder names on verses.quran.com for the reciters everyayah.com names differently.
fn quran_com_reciter(reciter: &str) -> &'static str {
    match reciter {
        "Abdurrahmaan_As-Sudais_192kbps" => "Abdurrahman_As-Sudais",
        "Mishari_Rashid_al_Afasy_128kbps" => "MishariAlafasy",
        _ => "AbdulBaset/Mujawwad",
    }
}

/// Candidate URLs for one ayah, in fallback order.
pub fn provider_urls(reciter: &str, surah: u16, ayah: u16) -> [(&'static str, String); 2] {
    let file = format!("{surah:03}{ayah:03}.mp3");
    [
        ("everyayah", format!("https://everyayah.com/data/{reciter}/{file}")),
        (
            "quran.com",
            format!("https://verses.quran.com/{}/mp3/{file}", quran_com_reciter(reciter)),
        ),
    ]
}

fn valid_reciter(reciter: &str) -> bool {
    !reciter.is_empty()
        && reciter.len() <= 64
        && reciter
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !reciter.contains("..")
}

/// Parse and range-check `surah` / `ayah`.
pub fn parse_ayah(surah: Option<&str>, ayah: Option<&str>) -> SimtaqResult<(u16, u16)> {
    let (Some(surah), Some(ayah)) = (surah, ayah) else {
        return Err(SimtaqError::validation("Parameter surah dan ayah wajib diisi"));
    };
    let invalid = || SimtaqError::validation("Nomor surah atau ayat tidak valid");
    let surah: u16 = surah.trim().parse().map_err(|_| invalid())?;
    let ayah: u16 = ayah.trim().parse().map_err(|_| invalid())?;
    match quran::verses_in_surah(surah) {
        Some(count) if ayah >= 1 && ayah <= count => Ok((surah, ayah)),
        _ => Err(invalid()),
    }
}

/// GET /api/audio/proxy?surah=&ayah=&reciter=
async fn proxy(State(state): State<Arc<AppState>>, Query(query): Query<AudioQuery>) -> SimtaqResult<Response> {
    let (surah, ayah) = parse_ayah(query.surah.as_deref(), query.ayah.as_deref())?;
    let default_reciter = &simtaq_common::config::get().audio.default_reciter;
    let reciter = query
        .reciter
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(default_reciter);
    if !valid_reciter(reciter) {
        return Err(SimtaqError::validation("Nama qari tidak valid"));
    }

    for (provider, url) in provider_urls(reciter, surah, ayah) {
        match state.http.get(&url).send().await {
            Ok(upstream) if upstream.status().is_success() => {
                tracing::debug!(provider, surah, ayah, "Serving recitation audio");
                let mut response = Body::from_stream(upstream.bytes_stream()).into_response();
                let headers = response.headers_mut();
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("audio/mpeg"));
                headers.insert(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("public, max-age=31536000, immutable"),
                );
                headers.insert("x-audio-provider", HeaderValue::from_static(provider));
                return Ok(response);
            }
            Ok(upstream) => {
                tracing::debug!(provider, status = %upstream.status(), "Audio provider miss");
            }
            Err(e) => {
                tracing::warn!(provider, error = %e, "Audio provider unreachable");
            }
        }
    }

    Err(SimtaqError::not_found("Audio"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_url_format() {
        let [(first, everyayah), (second, quran_com)] = provider_urls("Abdul_Basit_Murattal_192kbps", 1, 7);
        assert_eq!(first, "everyayah");
        assert_eq!(everyayah, "https://everyayah.com/data/Abdul_Basit_Murattal_192kbps/001007.mp3");
        assert_eq!(second, "quran.com");
        assert_eq!(quran_com, "https://verses.quran.com/AbdulBaset/Mujawwad/mp3/001007.mp3");

        let [_, (_, alafasy)] = provider_urls("Mishari_Rashid_al_Afasy_128kbps", 114, 6);
        assert_eq!(alafasy, "https://verses.quran.com/MishariAlafasy/mp3/114006.mp3");
    }

    #[test]
    fn ayah_parameters_are_checked() {
        assert_eq!(parse_ayah(Some("2"), Some("286")).unwrap(), (2, 286));
        assert!(parse_ayah(Some("2"), Some("287")).is_err());
        assert!(parse_ayah(Some("115"), Some("1")).is_err());
        assert!(parse_ayah(Some("1"), Some("0")).is_err());
        assert!(parse_ayah(None, Some("1")).is_err());
        assert!(parse_ayah(Some("abc"), Some("1")).is_err());
    }

    #[test]
    fn reciter_names_cannot_escape_the_path() {
        assert!(valid_reciter("Abdul_Basit_Murattal_192kbps"));
        assert!(!valid_reciter("../../etc"));
        assert!(!valid_reciter("a/b"));
        assert!(!valid_reciter(""));
    }
}
