use std::sync::Arc;

use crate::models::{now_epoch, Session};
use crate::request::AuthRequest;
use crate::response::ResponseWriter;
use crate::session::codec::SessionCodec;
use crate::settings::AuthSettings;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to encode session: {0}")]
    Encode(String),
}

impl From<anyhow::Error> for SessionError {
    fn from(err: anyhow::Error) -> Self {
        Self::Encode(err.to_string())
    }
}

/// Shared, immutable entry point to the session store.
///
/// Cheap to clone; hand one to every request and call
/// [`SessionManager::for_request`].
#[derive(Debug, Clone)]
pub struct SessionManager {
    settings: Arc<AuthSettings>,
    codec: Arc<SessionCodec>,
}

impl SessionManager {
    #[must_use]
    pub fn new(settings: Arc<AuthSettings>) -> Self {
        let codec = Arc::new(SessionCodec::new(&settings));
        Self { settings, codec }
    }

    #[must_use]
    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    #[must_use]
    pub fn codec(&self) -> &SessionCodec {
        &self.codec
    }

    /// Request-scoped view, evaluated against the current clock
    #[must_use]
    pub fn for_request(&self, req: &AuthRequest) -> RequestSession {
        self.for_request_at(req, now_epoch())
    }

    /// Request-scoped view evaluated at `now` (epoch seconds)
    #[must_use]
    pub fn for_request_at(&self, req: &AuthRequest, now: i64) -> RequestSession {
        RequestSession {
            codec: Arc::clone(&self.codec),
            request: req.clone(),
            now,
            state: CacheState::Unloaded,
            pending: PendingWrite::None,
            saved: false,
            decodes: 0,
        }
    }
}

#[derive(Debug)]
enum CacheState {
    Unloaded,
    Loaded(Option<Session>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingWrite {
    None,
    Write,
    Delete,
}

/// Memoized session for a single request.
///
/// The cookie is decoded at most once, on first access, and the response
/// is written at most once, by [`RequestSession::save`]. Never share one
/// across requests.
#[derive(Debug)]
pub struct RequestSession {
    codec: Arc<SessionCodec>,
    request: AuthRequest,
    now: i64,
    state: CacheState,
    pending: PendingWrite,
    saved: bool,
    decodes: usize,
}

impl RequestSession {
    // ===============================
    // READ
    // ===============================

    /// The current session, decoding the request cookies on first call
    pub fn get(&mut self) -> Option<&Session> {
        self.load();
        match &self.state {
            CacheState::Loaded(session) => session.as_ref(),
            CacheState::Unloaded => None,
        }
    }

    pub fn is_authenticated(&mut self) -> bool {
        self.get().is_some()
    }

    /// Times the request cookies were decoded; never more than one
    #[must_use]
    pub const fn decode_count(&self) -> usize {
        self.decodes
    }

    #[must_use]
    pub const fn now(&self) -> i64 {
        self.now
    }

    #[must_use]
    pub fn request(&self) -> &AuthRequest {
        &self.request
    }

    fn load(&mut self) {
        if !matches!(self.state, CacheState::Unloaded) {
            return;
        }
        self.decodes += 1;
        let decoded = self.codec.decode(&self.request, self.now);
        match decoded {
            Some(decoded) => {
                if decoded.renew {
                    log::debug!("Scheduling rolling renewal of the session cookie");
                    self.pending = PendingWrite::Write;
                }
                self.state = CacheState::Loaded(Some(decoded.session));
            }
            None => {
                if self.codec.is_present(&self.request) {
                    log::debug!("Discarding unusable session cookie");
                    self.pending = PendingWrite::Delete;
                }
                self.state = CacheState::Loaded(None);
            }
        }
    }

    // ===============================
    // WRITE
    // ===============================

    /// Replace the session; written on [`RequestSession::save`]
    pub fn set(&mut self, session: Session) {
        self.state = CacheState::Loaded(Some(session));
        self.pending = PendingWrite::Write;
    }

    /// Drop the session and expire every cookie carrying it
    pub fn delete(&mut self) {
        self.state = CacheState::Loaded(None);
        self.pending = PendingWrite::Delete;
    }

    /// Re-issue the current session without changing it
    pub fn touch(&mut self) {
        if self.get().is_some() {
            self.pending = PendingWrite::Write;
        }
    }

    /// Write pending changes to `res`. Returns whether anything was written.
    ///
    /// Only the first call writes; later calls are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be encrypted
    pub fn save(&mut self, res: &mut dyn ResponseWriter) -> Result<bool, SessionError> {
        if self.saved {
            log::debug!("Session already saved for this request");
            return Ok(false);
        }
        self.saved = true;

        match self.pending {
            PendingWrite::None => Ok(false),
            PendingWrite::Delete => {
                for cookie in self.codec.clear(&self.request) {
                    res.set_cookie(cookie);
                }
                Ok(true)
            }
            PendingWrite::Write => {
                let CacheState::Loaded(Some(session)) = &self.state else {
                    return Ok(false);
                };
                for cookie in self.codec.encode(session, &self.request, self.now)? {
                    res.set_cookie(cookie);
                }
                Ok(true)
            }
        }
    }
}
