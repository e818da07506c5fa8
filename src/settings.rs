use actix_web::cookie::SameSite;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_SESSION_NAME: &str = "appSession";
pub const DEFAULT_ROLLING_DURATION: u64 = 86_400;
pub const DEFAULT_ABSOLUTE_DURATION: u64 = 604_800;
pub const DEFAULT_SCOPE: &str = "openid profile email";
pub const DEFAULT_CLOCK_TOLERANCE: u64 = 60;
pub const DEFAULT_SIGNING_ALG: &str = "RS256";
pub const DEFAULT_TRANSACTION_COOKIE: &str = "auth_verification";
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5000;
pub const MIN_SECRET_LENGTH: usize = 8;

/// Registered claims stripped from the user record before it is stored
pub const DEFAULT_CLAIM_FILTER: &[&str] = &[
    "aud", "iss", "iat", "exp", "nbf", "nonce", "azp", "auth_time", "s_hash", "at_hash",
    "c_hash",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration for `{field}`: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: basic_toml::Error,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

// ===============================
// RAW (USER-SUPPLIED) SETTINGS
// ===============================

/// One secret or a rotation list, newest first
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SecretSetting {
    One(String),
    Many(Vec<String>),
}

/// A duration in seconds, or `false` to disable it
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum DurationSetting {
    Seconds(u64),
    Flag(bool),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSettings {
    pub secret: Option<SecretSetting>,
    pub base_url: Option<String>,
    pub issuer_base_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub session: RawSessionSettings,
    pub authorization_params: RawAuthorizationParams,
    pub identity_claim_filter: Option<Vec<String>>,
    pub clock_tolerance: Option<u64>,
    pub id_token_signing_alg: Option<String>,
    pub routes: RawRoutes,
    pub idp_logout: Option<bool>,
    pub legacy_same_site_cookie: Option<bool>,
    pub transaction_cookie_name: Option<String>,
    /// Milliseconds
    pub http_timeout: Option<u64>,
    pub error_on_required_auth: Option<bool>,
    pub gate: RawGateSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSessionSettings {
    pub name: Option<String>,
    pub rolling: Option<bool>,
    pub rolling_duration: Option<DurationSetting>,
    pub absolute_duration: Option<DurationSetting>,
    pub cookie: RawCookieSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawCookieSettings {
    pub domain: Option<String>,
    pub path: Option<String>,
    pub http_only: Option<bool>,
    pub secure: Option<bool>,
    pub same_site: Option<String>,
    pub transient: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawAuthorizationParams {
    pub response_type: Option<String>,
    pub response_mode: Option<String>,
    pub scope: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawRoutes {
    pub login: Option<String>,
    pub logout: Option<String>,
    pub callback: Option<String>,
    pub post_logout_redirect: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawGateSettings {
    pub api_prefixes: Option<Vec<String>>,
    pub exempt_prefixes: Option<Vec<String>>,
}

// ===============================
// VALIDATED SETTINGS
// ===============================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    IdToken,
    CodeIdToken,
    Code,
}

impl ResponseType {
    /// Parse a space-separated response type; token order does not matter.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts: Vec<&str> = value.split_whitespace().collect();
        parts.sort_unstable();
        parts.dedup();
        match parts.as_slice() {
            ["id_token"] => Some(Self::IdToken),
            ["code", "id_token"] => Some(Self::CodeIdToken),
            ["code"] => Some(Self::Code),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IdToken => "id_token",
            Self::CodeIdToken => "code id_token",
            Self::Code => "code",
        }
    }

    #[must_use]
    pub const fn includes_code(self) -> bool {
        matches!(self, Self::Code | Self::CodeIdToken)
    }

    #[must_use]
    pub const fn includes_id_token(self) -> bool {
        matches!(self, Self::IdToken | Self::CodeIdToken)
    }

    /// `form_post` for anything returning an ID token, `query` for plain code
    #[must_use]
    pub const fn default_mode(self) -> ResponseMode {
        match self {
            Self::Code => ResponseMode::Query,
            Self::IdToken | Self::CodeIdToken => ResponseMode::FormPost,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    Query,
    FormPost,
}

impl ResponseMode {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "query" => Some(Self::Query),
            "form_post" => Some(Self::FormPost),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::FormPost => "form_post",
        }
    }
}

/// Session lifetime policy. Durations are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryPolicy {
    Rolling {
        rolling_duration: u64,
        absolute_duration: Option<u64>,
    },
    Absolute {
        absolute_duration: u64,
    },
}

#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub domain: Option<String>,
    pub path: String,
    pub http_only: bool,
    /// `None` follows the request scheme
    pub secure: Option<bool>,
    pub same_site: SameSite,
    pub transient: bool,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub name: String,
    pub expiry: ExpiryPolicy,
    pub cookie: CookieSettings,
}

#[derive(Debug, Clone)]
pub struct AuthorizationDefaults {
    pub response_type: ResponseType,
    pub response_mode: ResponseMode,
    pub scope: String,
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Routes {
    pub login: String,
    pub logout: String,
    pub callback: String,
    pub post_logout_redirect: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GateSettings {
    pub api_prefixes: Vec<String>,
    pub exempt_prefixes: Vec<String>,
}

/// Fully defaulted, cross-checked configuration. Built once at startup and
/// shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub secrets: Vec<String>,
    pub base_url: Url,
    pub issuer_base_url: Url,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub session: SessionSettings,
    pub authorization_params: AuthorizationDefaults,
    pub identity_claim_filter: Vec<String>,
    pub clock_tolerance: u64,
    pub id_token_signing_alg: String,
    pub routes: Routes,
    pub idp_logout: bool,
    pub legacy_same_site_cookie: bool,
    pub transaction_cookie_name: String,
    pub http_timeout: Duration,
    pub error_on_required_auth: bool,
    pub gate: GateSettings,
}

impl AuthSettings {
    /// Initialize logging, load from files and environment, then validate.
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file cannot be read or parsed, or if
    /// the resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        init_logging();
        RawSettings::load()?.validate()
    }

    /// Absolute callback URL registered with the provider
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        self.absolute_url(&self.routes.callback)
    }

    /// Where the browser lands after logout when no override is given
    #[must_use]
    pub fn post_logout_redirect(&self) -> String {
        self.routes
            .post_logout_redirect
            .as_deref()
            .map_or_else(|| self.base_url.to_string(), |target| self.absolute_url(target))
    }

    /// Resolve a path or URL against `base_url`
    #[must_use]
    pub fn absolute_url(&self, target: &str) -> String {
        self.base_url
            .join(target)
            .map_or_else(|_| target.to_string(), |url| url.to_string())
    }
}

fn is_hmac_alg(alg: &str) -> bool {
    alg.to_ascii_uppercase().starts_with("HS")
}

/// Check a response type, mode and scope combination.
///
/// Run at startup for the defaults and again for every login that overrides
/// them.
///
/// # Errors
///
/// Returns an error if:
/// - `scope` does not contain `openid`
/// - `response_type` is `code` and `response_mode` is not `query`
/// - `response_type` returns an ID token and `response_mode` is not `form_post`
pub fn check_authorization_params(
    response_type: ResponseType,
    response_mode: ResponseMode,
    scope: &str,
) -> Result<(), ConfigError> {
    if !scope.split_whitespace().any(|s| s == "openid") {
        return Err(ConfigError::invalid(
            "authorization_params.scope",
            "must contain \"openid\"",
        ));
    }
    match (response_type, response_mode) {
        (ResponseType::Code, ResponseMode::Query)
        | (ResponseType::IdToken | ResponseType::CodeIdToken, ResponseMode::FormPost) => Ok(()),
        (ResponseType::Code, _) => Err(ConfigError::invalid(
            "authorization_params.response_mode",
            "must be \"query\" when response_type is \"code\"",
        )),
        _ => Err(ConfigError::invalid(
            "authorization_params.response_mode",
            format!(
                "must be \"form_post\" when response_type is \"{}\"",
                response_type.as_str()
            ),
        )),
    }
}

impl RawSettings {
    /// Load raw settings. Priority, highest first:
    /// 1. Environment variables
    /// 2. `Settings.toml` in `$OIDC_SESSION_SECRETS_DIR`
    /// 3. `Settings.toml` in the current directory
    /// 4. Defaults
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file exists but cannot be read or parsed
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Self::load_base_settings()?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    fn load_base_settings() -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        let default_path = PathBuf::from("Settings.toml");
        if default_path.exists() {
            settings = Self::from_file(&default_path)?;
            log::info!("Loaded base settings from {}", default_path.display());
        }

        if let Ok(secrets_dir) = std::env::var("OIDC_SESSION_SECRETS_DIR") {
            let secrets_path = Path::new(&secrets_dir).join("Settings.toml");
            if secrets_path.exists() {
                settings = Self::from_file(&secrets_path)?;
                log::info!("Overriding settings from {}", secrets_path.display());
            } else {
                log::info!(
                    "OIDC_SESSION_SECRETS_DIR set but no Settings.toml found at: {}",
                    secrets_path.display()
                );
            }
        }

        Ok(settings)
    }

    /// Parse a single TOML settings file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML for
    /// this schema
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        basic_toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Some(secrets) = env_value("SECRET") {
            let list: Vec<String> = secrets
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if !list.is_empty() {
                self.secret = Some(SecretSetting::Many(list));
            }
        }
        apply_string_override("BASE_URL", &mut self.base_url);
        apply_string_override("CLIENT_ID", &mut self.client_id);
        apply_string_override("CLIENT_SECRET", &mut self.client_secret);
        apply_string_override("ISSUER_BASE_URL", &mut self.issuer_base_url);
        apply_string_override("SESSION_NAME", &mut self.session.name);
        apply_string_override(
            "RESPONSE_TYPE",
            &mut self.authorization_params.response_type,
        );
    }

    /// Apply defaults and cross-field rules, producing the immutable record.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first offending field
    pub fn validate(self) -> Result<AuthSettings, ConfigError> {
        let secrets = validate_secrets(self.secret)?;
        let base_url = parse_http_url("base_url", self.base_url.as_deref())?;
        let issuer_base_url = parse_http_url("issuer_base_url", self.issuer_base_url.as_deref())?;

        let client_id = self
            .client_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ConfigError::invalid("client_id", "is required"))?;
        let client_secret = self.client_secret.filter(|s| !s.is_empty());

        let session = validate_session(self.session, &base_url)?;
        let authorization_params = validate_authorization_params(self.authorization_params)?;

        let id_token_signing_alg = self
            .id_token_signing_alg
            .unwrap_or_else(|| DEFAULT_SIGNING_ALG.to_string());
        if id_token_signing_alg.eq_ignore_ascii_case("none") {
            return Err(ConfigError::invalid(
                "id_token_signing_alg",
                "unsigned ID tokens (\"none\") are not accepted",
            ));
        }

        if client_secret.is_none() {
            if authorization_params.response_type.includes_code() {
                return Err(ConfigError::invalid(
                    "client_secret",
                    format!(
                        "is required for response_type \"{}\"",
                        authorization_params.response_type.as_str()
                    ),
                ));
            }
            if is_hmac_alg(&id_token_signing_alg) {
                return Err(ConfigError::invalid(
                    "client_secret",
                    format!("is required for id_token_signing_alg \"{id_token_signing_alg}\""),
                ));
            }
        }

        let routes = validate_routes(self.routes)?;

        let http_timeout_ms = self.http_timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT_MS);
        if http_timeout_ms == 0 {
            return Err(ConfigError::invalid("http_timeout", "must be positive"));
        }

        let transaction_cookie_name = self
            .transaction_cookie_name
            .unwrap_or_else(|| DEFAULT_TRANSACTION_COOKIE.to_string());
        validate_cookie_name("transaction_cookie_name", &transaction_cookie_name)?;

        let gate = GateSettings {
            api_prefixes: self
                .gate
                .api_prefixes
                .unwrap_or_else(|| vec!["/api".to_string()]),
            exempt_prefixes: self.gate.exempt_prefixes.unwrap_or_default(),
        };

        Ok(AuthSettings {
            secrets,
            base_url,
            issuer_base_url,
            client_id,
            client_secret,
            session,
            authorization_params,
            identity_claim_filter: self.identity_claim_filter.unwrap_or_else(|| {
                DEFAULT_CLAIM_FILTER.iter().map(ToString::to_string).collect()
            }),
            clock_tolerance: self.clock_tolerance.unwrap_or(DEFAULT_CLOCK_TOLERANCE),
            id_token_signing_alg,
            routes,
            idp_logout: self.idp_logout.unwrap_or(false),
            legacy_same_site_cookie: self.legacy_same_site_cookie.unwrap_or(true),
            transaction_cookie_name,
            http_timeout: Duration::from_millis(http_timeout_ms),
            error_on_required_auth: self.error_on_required_auth.unwrap_or(false),
            gate,
        })
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn apply_string_override(env_var: &str, target: &mut Option<String>) {
    if let Some(value) = env_value(env_var) {
        *target = Some(value);
    }
}

fn validate_secrets(secret: Option<SecretSetting>) -> Result<Vec<String>, ConfigError> {
    let secrets = match secret {
        Some(SecretSetting::One(s)) => vec![s],
        Some(SecretSetting::Many(list)) => list,
        None => Vec::new(),
    };
    if secrets.is_empty() {
        return Err(ConfigError::invalid("secret", "at least one secret is required"));
    }
    if let Some(short) = secrets.iter().position(|s| s.len() < MIN_SECRET_LENGTH) {
        return Err(ConfigError::invalid(
            "secret",
            format!("secret #{short} must be at least {MIN_SECRET_LENGTH} characters"),
        ));
    }
    Ok(secrets)
}

fn parse_http_url(field: &'static str, value: Option<&str>) -> Result<Url, ConfigError> {
    let value = value.ok_or_else(|| ConfigError::invalid(field, "is required"))?;
    let url = Url::parse(value)
        .map_err(|e| ConfigError::invalid(field, format!("is not a valid URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::invalid(field, "must be an absolute http(s) URL"));
    }
    Ok(url)
}

fn validate_cookie_name(field: &'static str, name: &str) -> Result<(), ConfigError> {
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b));
    if valid {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, "is not a valid cookie name"))
    }
}

fn validate_session(raw: RawSessionSettings, base_url: &Url) -> Result<SessionSettings, ConfigError> {
    let name = raw.name.unwrap_or_else(|| DEFAULT_SESSION_NAME.to_string());
    validate_cookie_name("session.name", &name)?;

    let rolling = raw.rolling.unwrap_or(true);
    let absolute = match raw.absolute_duration {
        None => Some(DEFAULT_ABSOLUTE_DURATION),
        Some(DurationSetting::Flag(false)) => None,
        Some(DurationSetting::Seconds(0)) => {
            return Err(ConfigError::invalid(
                "session.absolute_duration",
                "must be positive, or false to disable it",
            ))
        }
        Some(DurationSetting::Seconds(secs)) => Some(secs),
        Some(DurationSetting::Flag(true)) => {
            return Err(ConfigError::invalid(
                "session.absolute_duration",
                "must be a number of seconds or false",
            ))
        }
    };

    let expiry = if rolling {
        let rolling_duration = match raw.rolling_duration {
            None => DEFAULT_ROLLING_DURATION,
            Some(DurationSetting::Seconds(secs)) if secs > 0 => secs,
            Some(_) => {
                return Err(ConfigError::invalid(
                    "session.rolling_duration",
                    "must be a positive number of seconds when session.rolling is true",
                ))
            }
        };
        ExpiryPolicy::Rolling {
            rolling_duration,
            absolute_duration: absolute,
        }
    } else {
        if matches!(raw.rolling_duration, Some(DurationSetting::Seconds(_) | DurationSetting::Flag(true))) {
            return Err(ConfigError::invalid(
                "session.rolling_duration",
                "must be false or unset when session.rolling is false",
            ));
        }
        let absolute_duration = absolute.ok_or_else(|| {
            ConfigError::invalid(
                "session.absolute_duration",
                "is required when session.rolling is false",
            )
        })?;
        ExpiryPolicy::Absolute { absolute_duration }
    };

    let same_site = match raw.cookie.same_site.as_deref() {
        None => SameSite::Lax,
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "lax" => SameSite::Lax,
            "strict" => SameSite::Strict,
            "none" => SameSite::None,
            _ => {
                return Err(ConfigError::invalid(
                    "session.cookie.same_site",
                    format!("unknown value \"{value}\", expected Lax, Strict or None"),
                ))
            }
        },
    };
    if same_site == SameSite::None && raw.cookie.secure == Some(false) {
        return Err(ConfigError::invalid(
            "session.cookie.same_site",
            "SameSite=None requires a secure cookie",
        ));
    }
    if raw.cookie.secure == Some(false) && base_url.scheme() == "https" {
        log::warn!("session.cookie.secure is false but base_url uses https");
    }

    let path = raw.cookie.path.unwrap_or_else(|| "/".to_string());
    if !path.starts_with('/') {
        return Err(ConfigError::invalid("session.cookie.path", "must start with '/'"));
    }

    Ok(SessionSettings {
        name,
        expiry,
        cookie: CookieSettings {
            domain: raw.cookie.domain.filter(|d| !d.is_empty()),
            path,
            http_only: raw.cookie.http_only.unwrap_or(true),
            secure: raw.cookie.secure,
            same_site,
            transient: raw.cookie.transient.unwrap_or(false),
        },
    })
}

fn validate_authorization_params(
    raw: RawAuthorizationParams,
) -> Result<AuthorizationDefaults, ConfigError> {
    let response_type = match raw.response_type.as_deref() {
        None => ResponseType::IdToken,
        Some(value) => ResponseType::parse(value).ok_or_else(|| {
            ConfigError::invalid(
                "authorization_params.response_type",
                format!("unsupported value \"{value}\""),
            )
        })?,
    };
    let response_mode = match raw.response_mode.as_deref() {
        None => response_type.default_mode(),
        Some(value) => ResponseMode::parse(value).ok_or_else(|| {
            ConfigError::invalid(
                "authorization_params.response_mode",
                format!("unsupported value \"{value}\""),
            )
        })?,
    };
    let scope = raw.scope.unwrap_or_else(|| DEFAULT_SCOPE.to_string());
    check_authorization_params(response_type, response_mode, &scope)?;

    Ok(AuthorizationDefaults {
        response_type,
        response_mode,
        scope,
        extra: raw.extra,
    })
}

fn validate_routes(raw: RawRoutes) -> Result<Routes, ConfigError> {
    let routes = Routes {
        login: raw.login.unwrap_or_else(|| "/login".to_string()),
        logout: raw.logout.unwrap_or_else(|| "/logout".to_string()),
        callback: raw.callback.unwrap_or_else(|| "/callback".to_string()),
        post_logout_redirect: raw.post_logout_redirect,
    };
    for (field, value) in [
        ("routes.login", &routes.login),
        ("routes.logout", &routes.logout),
        ("routes.callback", &routes.callback),
    ] {
        if !value.starts_with('/') {
            return Err(ConfigError::invalid(field, "must be a path starting with '/'"));
        }
    }
    Ok(routes)
}

/// Initialize `env_logger`; a second call is a no-op.
pub fn init_logging() {
    if env_logger::try_init().is_err() {
        log::debug!("Logger already initialized");
    }
}
