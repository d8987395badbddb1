//! Per-request response handle with an explicit send state.
//!
//! A handler either returns a [`Response`] for the HTTP layer to send, or writes one itself
//! through the [`ResponseWriter`] it finds in its context. The dispatcher consults
//! [`ResponseWriter::state`] to tell the second case apart from "not handled".

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Headers, Response};
use crate::Error;

/// Whether a response has been written for the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    /// Nothing has been sent yet; headers may still be staged.
    Pending,
    /// A response was handed to [`ResponseWriter::send`].
    Sent,
}

#[derive(Debug)]
struct Slot {
    state: ResponseState,
    staged: Headers,
    response: Option<Response>,
}

/// A cloneable handle to the response of a single request.
///
/// All clones share one slot, so the HTTP layer, middleware and the handler observe the
/// same [`ResponseState`]. The handle is created per request and dropped with it.
///
/// # Examples
///
/// ```
/// use rttp_router::http::{Response, ResponseState, ResponseWriter, StatusCode};
///
/// let res = ResponseWriter::new();
/// res.set_header("X-Trace", "abc").unwrap();
/// res.send(Response::text(StatusCode::Ok, "done")).unwrap();
///
/// assert_eq!(res.state(), ResponseState::Sent);
/// let sent = res.take().unwrap();
/// assert_eq!(sent.headers().get("x-trace"), Some("abc"));
/// ```
#[derive(Debug, Clone)]
pub struct ResponseWriter {
    slot: Arc<Mutex<Slot>>,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseWriter {
    /// Creates a writer in the [`ResponseState::Pending`] state.
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                state: ResponseState::Pending,
                staged: Headers::new(),
                response: None,
            })),
        }
    }

    // A panicking handler must not wedge the HTTP layer, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the current state.
    pub fn state(&self) -> ResponseState {
        self.lock().state
    }

    /// Shorthand for `state() == ResponseState::Sent`.
    pub fn is_sent(&self) -> bool {
        self.state() == ResponseState::Sent
    }

    /// Stages a header that will be added to whichever response is eventually sent,
    /// unless that response sets the same header itself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadySent`] once the response has been sent.
    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) -> Result<(), Error> {
        let mut slot = self.lock();
        if slot.state == ResponseState::Sent {
            return Err(Error::AlreadySent);
        }
        slot.staged.set(name, value);
        Ok(())
    }

    /// Returns a copy of the headers staged so far.
    pub fn staged_headers(&self) -> Headers {
        self.lock().staged.clone()
    }

    /// Sends `response`, moving the writer to [`ResponseState::Sent`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadySent`] if a response was already sent.
    pub fn send(&self, mut response: Response) -> Result<(), Error> {
        let mut slot = self.lock();
        if slot.state == ResponseState::Sent {
            return Err(Error::AlreadySent);
        }
        response.headers_mut().fill_from(&slot.staged);
        slot.response = Some(response);
        slot.state = ResponseState::Sent;
        Ok(())
    }

    /// Removes the sent response so the HTTP layer can write it out.
    ///
    /// The state stays [`ResponseState::Sent`].
    pub fn take(&self) -> Option<Response> {
        self.lock().response.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::StatusCode;

    #[test]
    fn starts_pending() {
        let res = ResponseWriter::new();
        assert_eq!(res.state(), ResponseState::Pending);
        assert!(!res.is_sent());
        assert!(res.take().is_none());
    }

    #[test]
    fn clones_share_state() {
        let res = ResponseWriter::new();
        let handle = res.clone();
        handle.send(Response::new(StatusCode::NoContent)).unwrap();
        assert!(res.is_sent());
        assert_eq!(res.take().unwrap().status(), StatusCode::NoContent);
    }

    #[test]
    fn second_send_is_rejected() {
        let res = ResponseWriter::new();
        res.send(Response::new(StatusCode::Ok)).unwrap();
        let err = res.send(Response::new(StatusCode::Accepted)).unwrap_err();
        assert!(matches!(err, Error::AlreadySent));
        assert_eq!(res.take().unwrap().status(), StatusCode::Ok);
    }

    #[test]
    fn staged_headers_do_not_override_response_headers() {
        let res = ResponseWriter::new();
        res.set_header("Content-Type", "text/html").unwrap();
        res.set_header("X-Staged", "1").unwrap();
        res.send(Response::text(StatusCode::Ok, "hi")).unwrap();

        let sent = res.take().unwrap();
        assert_eq!(sent.headers().get("content-type"), Some("text/plain"));
        assert_eq!(sent.headers().get("x-staged"), Some("1"));
        assert!(res.set_header("X-Late", "1").is_err());
    }
}
