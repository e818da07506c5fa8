use std::collections::BTreeMap;

use crate::settings::{check_authorization_params, AuthSettings, ResponseMode, ResponseType};

/// Parameters the engine owns; callers may not override them
const RESERVED: &[&str] = &[
    "client_id",
    "redirect_uri",
    "state",
    "nonce",
    "code_challenge",
    "code_challenge_method",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid authorization parameter `{name}`: {message}")]
pub struct ParamsError {
    pub name: String,
    pub message: String,
}

impl ParamsError {
    fn new(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

/// Everything sent to the authorization endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationParams {
    pub client_id: String,
    pub redirect_uri: String,
    pub response_type: ResponseType,
    pub response_mode: ResponseMode,
    pub scope: String,
    pub state: String,
    pub nonce: Option<String>,
    pub code_challenge: Option<String>,
    pub max_age: Option<u64>,
    pub extra: BTreeMap<String, String>,
}

/// Response type, mode, scope, `max_age` and extras after merging caller
/// overrides over configured defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedParams {
    pub response_type: ResponseType,
    pub response_mode: ResponseMode,
    pub scope: String,
    pub max_age: Option<u64>,
    pub extra: BTreeMap<String, String>,
}

impl ResolvedParams {
    /// Merge `overrides` over the configured defaults, caller values
    /// winning, then re-check the combination.
    ///
    /// A response type override without a mode picks that type's default
    /// mode.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A reserved protocol parameter is overridden
    /// - `response_type`, `response_mode` or `max_age` cannot be parsed
    /// - The merged combination is inconsistent or `scope` lacks `openid`
    /// - The merged response type needs a code exchange but no
    ///   `client_secret` is configured
    pub fn merge(
        settings: &AuthSettings,
        overrides: &BTreeMap<String, String>,
    ) -> Result<Self, ParamsError> {
        let defaults = &settings.authorization_params;
        let mut extra = defaults.extra.clone();
        let mut response_type = defaults.response_type;
        let mut response_mode = None;
        let mut scope = defaults.scope.clone();
        let mut max_age = None;

        for (name, value) in overrides {
            match name.as_str() {
                reserved if RESERVED.contains(&reserved) => {
                    return Err(ParamsError::new(name, "is set by the login flow"));
                }
                "response_type" => {
                    response_type = ResponseType::parse(value)
                        .ok_or_else(|| ParamsError::new(name, format!("unsupported value \"{value}\"")))?;
                }
                "response_mode" => {
                    response_mode = Some(
                        ResponseMode::parse(value)
                            .ok_or_else(|| ParamsError::new(name, format!("unsupported value \"{value}\"")))?,
                    );
                }
                "scope" => scope.clone_from(value),
                "max_age" => {
                    max_age = Some(
                        value
                            .parse::<u64>()
                            .map_err(|_| ParamsError::new(name, "must be a non-negative integer"))?,
                    );
                }
                _ => {
                    extra.insert(name.clone(), value.clone());
                }
            }
        }

        if max_age.is_none() {
            if let Some(configured) = extra.remove("max_age") {
                max_age = Some(
                    configured
                        .parse::<u64>()
                        .map_err(|_| ParamsError::new("max_age", "must be a non-negative integer"))?,
                );
            }
        }

        let response_mode = match response_mode {
            Some(mode) => mode,
            None if overrides.contains_key("response_type") => response_type.default_mode(),
            None => defaults.response_mode,
        };

        check_authorization_params(response_type, response_mode, &scope).map_err(|e| {
            ParamsError::new("authorization_params", e.to_string())
        })?;
        if response_type.includes_code() && settings.client_secret.is_none() {
            return Err(ParamsError::new(
                "response_type",
                format!(
                    "\"{}\" needs a configured client_secret",
                    response_type.as_str()
                ),
            ));
        }

        Ok(Self {
            response_type,
            response_mode,
            scope,
            max_age,
            extra,
        })
    }
}

impl AuthorizationParams {
    /// Name/value pairs in the order they should appear in the URL
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("client_id".to_string(), self.client_id.clone()),
            ("redirect_uri".to_string(), self.redirect_uri.clone()),
            ("response_type".to_string(), self.response_type.as_str().to_string()),
            ("response_mode".to_string(), self.response_mode.as_str().to_string()),
            ("scope".to_string(), self.scope.clone()),
            ("state".to_string(), self.state.clone()),
        ];
        if let Some(nonce) = &self.nonce {
            pairs.push(("nonce".to_string(), nonce.clone()));
        }
        if let Some(challenge) = &self.code_challenge {
            pairs.push(("code_challenge".to_string(), challenge.clone()));
            pairs.push(("code_challenge_method".to_string(), "S256".to_string()));
        }
        if let Some(max_age) = self.max_age {
            pairs.push(("max_age".to_string(), max_age.to_string()));
        }
        pairs.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{RawSettings, SecretSetting};

    fn settings(response_type: Option<&str>) -> AuthSettings {
        let mut raw = RawSettings {
            secret: Some(SecretSetting::One("params-test-secret".to_string())),
            base_url: Some("https://app.example.com".to_string()),
            issuer_base_url: Some("https://op.example.com".to_string()),
            client_id: Some("client-1".to_string()),
            client_secret: Some("client-secret".to_string()),
            ..RawSettings::default()
        };
        raw.authorization_params.response_type = response_type.map(ToString::to_string);
        raw.authorization_params
            .extra
            .insert("audience".to_string(), "https://api".to_string());
        raw.validate().unwrap()
    }

    fn overrides(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_without_overrides() {
        let resolved = ResolvedParams::merge(&settings(None), &BTreeMap::new()).unwrap();
        assert_eq!(resolved.response_type, ResponseType::IdToken);
        assert_eq!(resolved.response_mode, ResponseMode::FormPost);
        assert_eq!(resolved.extra.get("audience").map(String::as_str), Some("https://api"));
    }

    #[test]
    fn test_caller_values_take_precedence() {
        let resolved = ResolvedParams::merge(
            &settings(None),
            &overrides(&[("scope", "openid email"), ("audience", "https://other"), ("max_age", "30")]),
        )
        .unwrap();
        assert_eq!(resolved.scope, "openid email");
        assert_eq!(resolved.extra.get("audience").map(String::as_str), Some("https://other"));
        assert_eq!(resolved.max_age, Some(30));
    }

    #[test]
    fn test_response_type_override_picks_its_mode() {
        let resolved =
            ResolvedParams::merge(&settings(None), &overrides(&[("response_type", "code")])).unwrap();
        assert_eq!(resolved.response_type, ResponseType::Code);
        assert_eq!(resolved.response_mode, ResponseMode::Query);
    }

    #[test]
    fn test_overrides_revalidated() {
        let settings = settings(Some("code"));
        assert!(ResolvedParams::merge(&settings, &overrides(&[("scope", "email")])).is_err());
        assert!(
            ResolvedParams::merge(&settings, &overrides(&[("response_mode", "form_post")])).is_err()
        );
        assert!(ResolvedParams::merge(&settings, &overrides(&[("max_age", "-1")])).is_err());
        assert_eq!(
            ResolvedParams::merge(&settings, &overrides(&[("state", "chosen")]))
                .unwrap_err()
                .name,
            "state"
        );
    }

    #[test]
    fn test_code_override_requires_client_secret() {
        let mut raw = RawSettings {
            secret: Some(SecretSetting::One("params-test-secret".to_string())),
            base_url: Some("https://app.example.com".to_string()),
            issuer_base_url: Some("https://op.example.com".to_string()),
            client_id: Some("client-1".to_string()),
            client_secret: None,
            ..RawSettings::default()
        };
        raw.id_token_signing_alg = Some("RS256".to_string());
        let public_client = raw.validate().unwrap();

        assert!(ResolvedParams::merge(&public_client, &BTreeMap::new()).is_ok());
        for response_type in ["code", "code id_token"] {
            let err = ResolvedParams::merge(
                &public_client,
                &overrides(&[("response_type", response_type)]),
            )
            .unwrap_err();
            assert_eq!(err.name, "response_type");
        }
    }

    #[test]
    fn test_pairs_include_pkce_method() {
        let params = AuthorizationParams {
            client_id: "client-1".to_string(),
            redirect_uri: "https://app.example.com/callback".to_string(),
            response_type: ResponseType::Code,
            response_mode: ResponseMode::Query,
            scope: "openid".to_string(),
            state: "s".to_string(),
            nonce: None,
            code_challenge: Some("c".to_string()),
            max_age: None,
            extra: BTreeMap::new(),
        };
        let pairs = params.to_pairs();
        assert!(pairs.contains(&("code_challenge_method".to_string(), "S256".to_string())));
        assert!(!pairs.iter().any(|(k, _)| k == "nonce"));
    }
}
