use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

use crate::{model::role::Role, models::Claims};

fn now() -> usize {
    Utc::now().timestamp().max(0) as usize
}

/// Who a token is issued to.
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub user_id: u64,
    pub email: String,
    pub role: Role,
    pub admin_id: u64,
    pub employee_id: Option<u64>,
}

impl TokenSubject {
    pub fn admin(admin_id: u64, email: impl Into<String>) -> Self {
        Self {
            user_id: admin_id,
            email: email.into(),
            role: Role::Admin,
            admin_id,
            employee_id: None,
        }
    }

    pub fn employee(employee_id: u64, admin_id: u64, email: impl Into<String>) -> Self {
        Self {
            user_id: employee_id,
            email: email.into(),
            role: Role::Employee,
            admin_id,
            employee_id: Some(employee_id),
        }
    }
}

pub fn generate_token(
    subject: &TokenSubject,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    let iat = now();
    let claims = Claims {
        sub: subject.email.clone(),
        user_id: subject.user_id,
        role: subject.role.id(),
        admin_id: subject.admin_id,
        employee_id: subject.employee_id,
        iat,
        exp: iat + ttl,
        jti: Uuid::new_v4().to_string(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, claims))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-with-enough-length";

    #[test]
    fn round_trip_keeps_tenant_and_role() {
        let subject = TokenSubject::employee(7, 1, "john@acme.test");
        let (token, issued) = generate_token(&subject, SECRET, 600).unwrap();

        let claims = verify_token(&token, SECRET).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.admin_id, 1);
        assert_eq!(claims.employee_id, Some(7));
        assert_eq!(Role::from_id(claims.role), Some(Role::Employee));
        assert_eq!(claims.jti, issued.jti);
        assert_eq!(claims.exp, claims.iat + 600);
    }

    #[test]
    fn admin_subject_is_its_own_tenant() {
        let subject = TokenSubject::admin(3, "owner@acme.test");
        assert_eq!(subject.admin_id, 3);
        assert_eq!(subject.employee_id, None);
    }

    #[test]
    fn each_token_gets_a_fresh_jti() {
        let subject = TokenSubject::admin(1, "owner@acme.test");
        let (_, a) = generate_token(&subject, SECRET, 60).unwrap();
        let (_, b) = generate_token(&subject, SECRET, 60).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn rejects_wrong_secret() {
        let (token, _) = generate_token(&TokenSubject::admin(1, "a@b.c"), SECRET, 60).unwrap();
        assert!(verify_token(&token, "another-secret-entirely").is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let claims = Claims {
            sub: "a@b.c".into(),
            user_id: 1,
            role: Role::Admin.id(),
            admin_id: 1,
            employee_id: None,
            iat: now() - 7200,
            exp: now() - 3600,
            jti: "expired".into(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(verify_token(&token, SECRET).is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(verify_token("not-a-jwt", SECRET).is_err());
    }
}
