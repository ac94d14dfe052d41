use axum::Json;
use serde::Serialize;

use crate::core::stt::languages_by_name;

#[derive(Debug, Serialize)]
pub struct LanguageInfo {
    pub code: &'static str,
    pub name: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LanguagesResponse {
    pub languages: Vec<LanguageInfo>,
    pub total: usize,
}

/// Transcription languages sorted by name
pub async fn list_languages() -> Json<LanguagesResponse> {
    let languages: Vec<LanguageInfo> = languages_by_name()
        .into_iter()
        .map(|(code, name)| LanguageInfo { code, name })
        .collect();

    Json(LanguagesResponse {
        total: languages.len(),
        languages,
    })
}
