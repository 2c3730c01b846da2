//! Hot Rod connection URIs.
//!
//! Format: `hotrod[s]://[user[:password]@]host[:port][,host[:port]]*[?key=value&...]`
//!
//! `hotrods` turns on TLS. Query parameters are client properties; the
//! `infinispan.client.hotrod.` prefix may be omitted.

use std::str::FromStr;

use super::types::ServerAddress;
use crate::error::ClientError;
use crate::properties::keys;

/// A parsed Hot Rod URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotRodUri {
    pub ssl: bool,
    pub servers: Vec<ServerAddress>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Query parameters as fully-qualified property names.
    pub properties: Vec<(String, String)>,
}

impl FromStr for HotRodUri {
    type Err = ClientError;

    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ClientError::InvalidUri {
            uri: uri.to_string(),
            reason: reason.to_string(),
        };

        let (scheme, rest) = uri
            .trim()
            .split_once("://")
            .ok_or_else(|| invalid("missing scheme"))?;
        let ssl = match scheme.to_ascii_lowercase().as_str() {
            "hotrod" => false,
            "hotrods" => true,
            _ => return Err(invalid("scheme must be hotrod or hotrods")),
        };

        let (location, query) = match rest.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (rest, None),
        };
        let location = location.trim_end_matches('/');

        let (userinfo, hosts) = match location.rsplit_once('@') {
            Some((userinfo, hosts)) => (Some(userinfo), hosts),
            None => (None, location),
        };

        let (username, password) = match userinfo {
            Some(info) => {
                let (user, pass) = match info.split_once(':') {
                    Some((user, pass)) => (user, Some(pass)),
                    None => (info, None),
                };
                let user = percent_decode(user).ok_or_else(|| invalid("bad escape in user"))?;
                let pass = pass
                    .map(|p| percent_decode(p).ok_or_else(|| invalid("bad escape in password")))
                    .transpose()?;
                (Some(user).filter(|u| !u.is_empty()), pass)
            }
            None => (None, None),
        };

        let servers = hosts
            .split(',')
            .filter(|h| !h.trim().is_empty())
            .map(|h| ServerAddress::parse(h).map_err(|_| invalid("bad server address")))
            .collect::<Result<Vec<_>, _>>()?;
        if servers.is_empty() {
            return Err(invalid("no servers"));
        }

        let mut properties = Vec::new();
        for pair in query.into_iter().flat_map(|q| q.split('&')) {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = percent_decode(key).ok_or_else(|| invalid("bad escape in query"))?;
            let value = percent_decode(value).ok_or_else(|| invalid("bad escape in query"))?;
            let key = if key.starts_with(keys::PREFIX) {
                key
            } else {
                format!("{}{}", keys::PREFIX, key)
            };
            properties.push((key, value));
        }

        Ok(Self {
            ssl,
            servers,
            username,
            password,
            properties,
        })
    }
}

/// Decode `%XX` escapes. Returns `None` on a malformed escape or invalid UTF-8.
fn percent_decode(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = raw.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
