// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

// Nosso tipo de erro único. Cada variante vira um código estável para o cliente.
#[derive(Debug, Error)]
pub enum AppError {
    // Falha do `validator` nos payloads HTTP
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    // Regra de negócio: entrada referencialmente inválida (item inexistente, arquivado...)
    #[error("{0}")]
    InvalidInput(String),

    #[error(
        "Estoque insuficiente para '{item_name}': solicitado {requested} (total do item somando todas as linhas), disponível {available}"
    )]
    InsufficientStock {
        item_id: Uuid,
        item_name: String,
        /// Total pedido para o item: linhas repetidas do mesmo item são somadas.
        requested: i64,
        available: i32,
    },

    #[error("Já existe um item '{name}' com a qualidade '{quality_tier}'")]
    DuplicateItem { name: String, quality_tier: String },

    #[error("O item {0} possui transações registradas; arquive-o em vez de excluir")]
    ItemHasHistory(Uuid),

    #[error("{entity} {id} não encontrado(a)")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Nome de usuário já existe")]
    UsernameAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("{0}")]
    Forbidden(String),

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        AppError::NotFound { entity, id }
    }

    /// Código estável exposto ao cliente (não muda com a mensagem).
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) | AppError::InvalidInput(_) => "VALIDATION_ERROR",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::DuplicateItem { .. } | AppError::UsernameAlreadyExists => "CONFLICT",
            AppError::ItemHasHistory(_) => "HAS_HISTORY",
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::InvalidCredentials | AppError::InvalidToken => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::DatabaseError(_) => "PERSISTENCE_ERROR",
            AppError::InternalServerError(_)
            | AppError::BcryptError(_)
            | AppError::JwtError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::InsufficientStock { .. }
            | AppError::DuplicateItem { .. }
            | AppError::UsernameAlreadyExists
            | AppError::ItemHasHistory(_) => StatusCode::CONFLICT,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::InvalidCredentials | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_)
            | AppError::JwtError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let body = match &self {
            // Retorna todos os detalhes da validação, campo a campo.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                json!({
                    "error": "Um ou mais campos são inválidos.",
                    "code": code,
                    "details": details,
                })
            }
            AppError::InsufficientStock {
                item_id,
                item_name,
                requested,
                available,
            } => json!({
                "error": self.to_string(),
                "code": code,
                "details": {
                    "itemId": item_id,
                    "itemName": item_name,
                    "requested": requested,
                    "available": available,
                    "deficit": requested - i64::from(*available),
                },
            }),
            _ if status.is_server_error() => {
                // O `tracing` loga a mensagem detalhada; o cliente recebe a genérica.
                tracing::error!("Erro Interno do Servidor: {:?}", self);
                json!({ "error": "Ocorreu um erro inesperado.", "code": code })
            }
            _ => json!({ "error": self.to_string(), "code": code }),
        };

        (status, Json(body)).into_response()
    }
}
