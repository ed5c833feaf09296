use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::{AuthUser, GlobalUser, JwtClaims, Role, TenantUser};

type HmacSha256 = Hmac<Sha256>;

/// Validates an HMAC-SHA256 JWT and resolves the bearer into an
/// [`AuthUser`]. Tokens carrying a `tenant` claim land in the tenant
/// realm; tokens without one are global-realm identities. Issuance is
/// someone else's job; this only checks what arrives.
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<AuthUser, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err("Invalid token format".to_string());
    }

    let header_b64 = parts[0];
    let claims_b64 = parts[1];
    let signature_b64 = parts[2];

    let signature = match URL_SAFE_NO_PAD.decode(signature_b64) {
        Ok(sig) => sig,
        Err(e) => {
            debug!("Failed to decode signature: {}", e);
            return Err("Invalid signature encoding".to_string());
        }
    };

    let signing_input = format!("{}.{}", header_b64, claims_b64);

    let mut mac = match HmacSha256::new_from_slice(jwt_secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return Err("Failed to create HMAC".to_string()),
    };
    mac.update(signing_input.as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err("Invalid token signature".to_string());
    }

    let claims_json = match URL_SAFE_NO_PAD.decode(claims_b64) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(json_str) => json_str,
            Err(_) => return Err("Invalid claims encoding".to_string()),
        },
        Err(_) => return Err("Invalid claims encoding".to_string()),
    };

    let claims: JwtClaims = match serde_json::from_str(&claims_json) {
        Ok(c) => c,
        Err(e) => {
            debug!("Failed to parse claims: {}", e);
            return Err("Invalid claims format".to_string());
        }
    };

    if let Some(exp) = claims.exp {
        let now = Utc::now().timestamp() as u64;
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err("Token expired".to_string());
        }
    }

    let id = Uuid::parse_str(&claims.sub).map_err(|_| "Invalid subject claim".to_string())?;

    let role_raw = claims.role.as_deref().unwrap_or("patient");
    let role = Role::parse(role_raw).ok_or_else(|| format!("Unknown role: {}", role_raw))?;

    let created_at = claims
        .iat
        .and_then(|timestamp| Utc.timestamp_opt(timestamp as i64, 0).single());

    let user = match claims.tenant {
        Some(tenant) => AuthUser::Tenant(TenantUser {
            id,
            tenant,
            email: claims.email,
            role,
            created_at,
        }),
        None => AuthUser::Global(GlobalUser {
            id,
            email: claims.email,
            role,
            created_at,
        }),
    };

    debug!("Token validated successfully for user: {}", user.id());
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

    fn sign(header_b64: &str, claims_b64: &str, secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.{}", header_b64, claims_b64).as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    fn make_token(claims: serde_json::Value, secret: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(claims.to_string());
        let signature = sign(&header, &body, secret);
        format!("{}.{}.{}", header, body, signature)
    }

    #[test]
    fn accepts_tenant_token() {
        let id = Uuid::new_v4();
        let token = make_token(
            json!({"sub": id.to_string(), "role": "doctor", "tenant": "clinic_42"}),
            SECRET,
        );

        let user = validate_token(&token, SECRET).unwrap();
        assert_eq!(user.id(), id);
        assert_eq!(user.role(), Role::Doctor);
        assert_eq!(user.tenant(), Some("clinic_42"));
    }

    #[test]
    fn token_without_tenant_claim_is_global() {
        let token = make_token(
            json!({"sub": Uuid::new_v4().to_string(), "role": "admin"}),
            SECRET,
        );

        let user = validate_token(&token, SECRET).unwrap();
        assert_eq!(user.tenant(), None);
    }

    #[test]
    fn rejects_forged_signature() {
        let token = make_token(
            json!({"sub": Uuid::new_v4().to_string(), "role": "staff", "tenant": "clinic_42"}),
            "wrong-secret",
        );

        assert!(validate_token(&token, SECRET).is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let token = make_token(
            json!({"sub": Uuid::new_v4().to_string(), "role": "staff", "exp": 1}),
            SECRET,
        );

        assert_eq!(validate_token(&token, SECRET).unwrap_err(), "Token expired");
    }

    #[test]
    fn rejects_unknown_role_and_bad_subject() {
        let bad_role = make_token(
            json!({"sub": Uuid::new_v4().to_string(), "role": "superuser"}),
            SECRET,
        );
        assert!(validate_token(&bad_role, SECRET).is_err());

        let bad_sub = make_token(json!({"sub": "not-a-uuid", "role": "staff"}), SECRET);
        assert!(validate_token(&bad_sub, SECRET).is_err());
    }
}
