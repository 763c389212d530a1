use http::{HeaderMap, header};

use modgate_provider_core::{GateError, ReservedCode};

pub trait AuthProvider: Send + Sync {
    fn authenticate(&self, headers: &HeaderMap) -> Result<(), GateError>;
}

#[derive(Debug, Default)]
pub struct NoopAuth;

impl AuthProvider for NoopAuth {
    fn authenticate(&self, _headers: &HeaderMap) -> Result<(), GateError> {
        Ok(())
    }
}

/// Single shared key. Only its hash is kept, and the comparison runs in
/// constant time.
#[derive(Debug, Clone)]
pub struct StaticKeyAuth {
    key_hash: blake3::Hash,
}

impl StaticKeyAuth {
    pub fn new(key: &str) -> Self {
        Self {
            key_hash: blake3::hash(key.as_bytes()),
        }
    }
}

impl AuthProvider for StaticKeyAuth {
    fn authenticate(&self, headers: &HeaderMap) -> Result<(), GateError> {
        let Some(key) = extract_api_key(headers) else {
            return Err(GateError::Rejected(ReservedCode::InvalidAuthKey));
        };
        // blake3::Hash equality is constant-time.
        if blake3::hash(key.as_bytes()) != self.key_hash {
            return Err(GateError::Rejected(ReservedCode::InvalidAuthKey));
        }
        Ok(())
    }
}

/// `Authorization: Bearer <key>`; a bare value is taken as the key itself.
pub fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let key = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    (!key.is_empty()).then_some(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_and_bare_keys() {
        assert_eq!(extract_api_key(&headers("Bearer secret")), Some("secret"));
        assert_eq!(extract_api_key(&headers("secret")), Some("secret"));
        assert_eq!(extract_api_key(&headers("Bearer ")), None);
        assert_eq!(extract_api_key(&HeaderMap::new()), None);
    }

    #[test]
    fn static_key_accepts_only_match() {
        let auth = StaticKeyAuth::new("secret");
        assert!(auth.authenticate(&headers("Bearer secret")).is_ok());
        for bad in ["Bearer nope", "Bearer secret2", "Basic secret"] {
            assert!(matches!(
                auth.authenticate(&headers(bad)),
                Err(GateError::Rejected(ReservedCode::InvalidAuthKey))
            ));
        }
        assert!(auth.authenticate(&HeaderMap::new()).is_err());
    }
}
