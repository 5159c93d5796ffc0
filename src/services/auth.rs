// src/services/auth.rs

use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::{
    common::error::AppError,
    db::UserRepository,
    models::auth::{Claims, Role, User},
};

#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    jwt_secret: String,
}

impl AuthService {
    pub fn new(user_repo: UserRepository, jwt_secret: String) -> Self {
        Self {
            user_repo,
            jwt_secret,
        }
    }

    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<User, AppError> {
        // bcrypt é caro: roda fora do executor async
        let password_clone = password.to_owned();
        let hashed_password =
            tokio::task::spawn_blocking(move || hash(&password_clone, bcrypt::DEFAULT_COST))
                .await
                .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;

        self.user_repo
            .create_user(username.trim(), &hashed_password, role)
            .await
    }

    pub async fn login_user(&self, username: &str, password: &str) -> Result<String, AppError> {
        let user = self
            .user_repo
            .find_by_username(username.trim())
            .await?
            .filter(|u| u.is_active)
            .ok_or(AppError::InvalidCredentials)?;

        let password_clone = password.to_owned();
        let password_hash_clone = user.password_hash.clone();

        // Executa a verificação em um thread separado
        let is_password_valid =
            tokio::task::spawn_blocking(move || verify(&password_clone, &password_hash_clone))
                .await
                .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;

        if !is_password_valid {
            return Err(AppError::InvalidCredentials);
        }

        tracing::info!("🔑 Login de {}", user.username);
        self.create_token(&user)
    }

    /// Valida o token e recarrega o usuário: o cargo vale o do banco, não o do token.
    pub async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let claims = decode_claims(token, &self.jwt_secret)?;

        self.user_repo
            .find_by_id(claims.sub)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AppError::InvalidToken)
    }

    /// Cria o administrador inicial quando a tabela de usuários está vazia.
    pub async fn bootstrap_admin(&self, username: &str, password: &str) -> Result<bool, AppError> {
        if self.user_repo.count_users().await? > 0 {
            return Ok(false);
        }
        let admin = self.create_user(username, password, Role::Admin).await?;
        tracing::info!("👤 Administrador inicial '{}' criado", admin.username);
        Ok(true)
    }

    fn create_token(&self, user: &User) -> Result<String, AppError> {
        issue_token(user, &self.jwt_secret)
    }
}

pub fn issue_token(user: &User, secret: &str) -> Result<String, AppError> {
    let now = Utc::now();
    let expires_at = now + chrono::Duration::days(7);

    let claims = Claims {
        sub: user.id,
        role: user.role,
        exp: expires_at.timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?)
}

pub fn decode_claims(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::InvalidToken)
}
