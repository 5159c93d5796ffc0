// src/middleware/i18n.rs

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

pub const SUPPORTED_LANGUAGES: [&str; 3] = ["en", "es", "pt"];

// Extrator de idioma a partir do Accept-Language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale(pub String);

impl Locale {
    /// Primeiro idioma suportado da lista, ou "en".
    pub fn from_header(value: Option<&str>) -> Self {
        let lang = value
            .map(accept_language::parse)
            .unwrap_or_default()
            .into_iter()
            // "pt-BR" -> "pt"
            .map(|tag| tag.split('-').next().unwrap_or(&tag).to_lowercase())
            .find(|lang| SUPPORTED_LANGUAGES.contains(&lang.as_str()))
            .unwrap_or_else(|| "en".to_string());
        Locale(lang)
    }
}

impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok());
        Ok(Locale::from_header(header_value))
    }
}
