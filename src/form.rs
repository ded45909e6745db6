//! Decoded form values.
//!
//! Every request gets its query string decoded, and `POST`, `PUT` and `PATCH`
//! requests sent as `application/x-www-form-urlencoded` get their body decoded
//! too. Decoding is strict: a stray `%`, a `;` separator or a `Content-Type`
//! that is not a valid media type makes the whole request a
//! `400 Bad Request` before any resource sees it.

use std::collections::HashMap;

use http::header::CONTENT_TYPE;
use http::request::Parts;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Why a query string or form body could not be decoded.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FormError {
    #[error("invalid percent escape at byte {at}")]
    InvalidEscape { at: usize },

    #[error("invalid semicolon separator at byte {at}")]
    Semicolon { at: usize },

    #[error("content-type header is not visible ASCII")]
    ContentType,

    #[error("content-type header is not a valid media type")]
    MediaType,
}

/// Form values keyed by name. A name may carry several values, kept in the
/// order they were received: body values first, then query values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Form {
    values: HashMap<String, Vec<String>>,
}

impl Form {
    /// Decodes one `application/x-www-form-urlencoded` string.
    pub fn parse(input: &str) -> Result<Self, FormError> {
        let mut form = Self::default();
        form.extend_encoded(input.as_bytes())?;
        Ok(form)
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name)?.first().map(String::as_str)
    }

    /// Every value for `name`, in arrival order. Empty if the name is absent.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.values.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    fn extend_encoded(&mut self, input: &[u8]) -> Result<(), FormError> {
        validate(input)?;
        for (name, value) in url::form_urlencoded::parse(input) {
            self.values.entry(name.into_owned()).or_default().push(value.into_owned());
        }
        Ok(())
    }
}

/// Decodes the form values of one request.
pub(crate) fn from_request(parts: &Parts, body: &[u8]) -> Result<Form, FormError> {
    let mut form = Form::default();

    if carries_form_body(parts)? {
        form.extend_encoded(body)?;
    }
    if let Some(query) = parts.uri.query() {
        form.extend_encoded(query.as_bytes())?;
    }

    Ok(form)
}

fn carries_form_body(parts: &Parts) -> Result<bool, FormError> {
    if !matches!(parts.method, http::Method::POST | http::Method::PUT | http::Method::PATCH) {
        return Ok(false);
    }
    let Some(value) = parts.headers.get(CONTENT_TYPE) else {
        return Ok(false);
    };
    let value = value.to_str().map_err(|_| FormError::ContentType)?;
    if value.trim().is_empty() {
        return Ok(false);
    }
    Ok(media_type(value)?.eq_ignore_ascii_case(FORM_URLENCODED))
}

/// Checks `type/subtype *(; name=value)` and returns the `type/subtype` part.
///
/// Values are tokens or quoted strings. A trailing `;` is accepted.
fn media_type(value: &str) -> Result<&str, FormError> {
    let (kind, mut params) = value.split_once(';').unwrap_or((value, ""));
    let kind = kind.trim();
    let well_formed = match kind.split_once('/') {
        Some((main, sub)) => is_token(main) && is_token(sub),
        None => is_token(kind),
    };
    if !well_formed {
        return Err(FormError::MediaType);
    }

    loop {
        params = params.trim_start();
        if params.is_empty() {
            return Ok(kind);
        }
        let (name, rest) = params.split_once('=').ok_or(FormError::MediaType)?;
        if !is_token(name.trim_end()) {
            return Err(FormError::MediaType);
        }
        let rest = rest.trim_start();
        let rest = match rest.strip_prefix('"') {
            Some(quoted) => skip_quoted(quoted)?,
            None => {
                let end = rest.find(|c: char| !is_token_char(c)).unwrap_or(rest.len());
                if end == 0 {
                    return Err(FormError::MediaType);
                }
                &rest[end..]
            }
        };
        let rest = rest.trim_start();
        params = match rest.strip_prefix(';') {
            Some(next) => next,
            None if rest.is_empty() => rest,
            None => return Err(FormError::MediaType),
        };
    }
}

/// Skips past the closing quote of a quoted string whose opening quote is gone.
fn skip_quoted(input: &str) -> Result<&str, FormError> {
    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok(&input[i + 1..]),
            '\\' => {
                chars.next().ok_or(FormError::MediaType)?;
            }
            _ => {}
        }
    }
    Err(FormError::MediaType)
}

fn is_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_token_char)
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_graphic() && !"()<>@,;:\\\"/[]?=".contains(c)
}

fn validate(input: &[u8]) -> Result<(), FormError> {
    let mut i = 0;
    while i < input.len() {
        match input[i] {
            b';' => return Err(FormError::Semicolon { at: i }),
            b'%' => {
                let escape = input.get(i + 1..i + 3);
                if !escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
                    return Err(FormError::InvalidEscape { at: i });
                }
                i += 3;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    Ok(())
}
