// src/middleware/rbac.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use std::marker::PhantomData;

use crate::{common::error::AppError, middleware::auth::AuthenticatedUser};

/// 1. O Trait que define o que é uma Permissão
pub trait PermissionDef: Send + Sync + 'static {
    fn slug() -> &'static str;
}

/// 2. O Extractor (Guardião)
pub struct RequirePermission<T>(pub PhantomData<T>);

// 3. Confere o cargo do usuário contra a tabela estática de permissões
impl<T, S> FromRequestParts<S> for RequirePermission<T>
where
    T: PermissionDef,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(user) = parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(AppError::InvalidToken)?;

        let required_perm = T::slug();
        if !user.role.grants(required_perm) {
            tracing::debug!("Acesso negado: {} sem '{}'", user.username, required_perm);
            return Err(AppError::Forbidden(format!(
                "Você precisa da permissão '{}' para realizar esta ação.",
                required_perm
            )));
        }

        Ok(RequirePermission(PhantomData))
    }
}

// ---
// DEFINIÇÃO DAS PERMISSÕES (TIPOS)
// ---

macro_rules! permission {
    ($name:ident, $slug:literal) => {
        pub struct $name;
        impl PermissionDef for $name {
            fn slug() -> &'static str {
                $slug
            }
        }
    };
}

permission!(PermInventoryRead, "inventory:read");
permission!(PermInventoryWrite, "inventory:write");
permission!(PermInventoryDelete, "inventory:delete");
permission!(PermLossesWrite, "losses:write");
permission!(PermLossesDelete, "losses:delete");
permission!(PermTransactionsRead, "transactions:read");
permission!(PermTransactionsWrite, "transactions:write");
permission!(PermTransactionsDelete, "transactions:delete");
permission!(PermReportsRead, "reports:read");
permission!(PermAuditRead, "audit:read");
permission!(PermUsersWrite, "users:write");
