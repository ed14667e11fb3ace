use crate::base::neterror::NetError;
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use std::str::FromStr;

/// A header multimap that strictly preserves insertion order.
/// Used while assembling outgoing requests so defaults land before
/// caller-supplied headers.
#[derive(Debug, Clone, Default)]
pub struct OrderedHeaderMap {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl OrderedHeaderMap {
    pub fn new() -> Self {
        Self {
            headers: Vec::new(),
        }
    }

    /// Replace all values for `name` with `value`, keeping the position of
    /// the first existing entry. Appends if `name` is new.
    pub fn insert(&mut self, name: &str, value: &str) -> Result<(), NetError> {
        let (name, value) = parse_pair(name, value)?;
        self.insert_typed(name, value);
        Ok(())
    }

    pub fn insert_typed(&mut self, name: HeaderName, value: HeaderValue) {
        match self.headers.iter().position(|(n, _)| *n == name) {
            Some(idx) => {
                self.headers[idx].1 = value;
                let mut seen = 0usize;
                self.headers.retain(|(n, _)| {
                    if *n != name {
                        return true;
                    }
                    seen += 1;
                    seen == 1
                });
            }
            None => self.headers.push((name, value)),
        }
    }

    /// Add another value for `name` without touching existing ones.
    pub fn append(&mut self, name: &str, value: &str) -> Result<(), NetError> {
        let (name, value) = parse_pair(name, value)?;
        self.headers.push((name, value));
        Ok(())
    }

    pub fn append_typed(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.push((name, value));
    }

    pub fn remove(&mut self, name: &str) {
        if let Ok(target) = HeaderName::from_str(name) {
            self.headers.retain(|(n, _)| *n != target);
        }
    }

    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        let target = HeaderName::from_str(name).ok()?;
        self.headers
            .iter()
            .find(|(n, _)| *n == target)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
        self.headers.iter().map(|(n, v)| (n, v))
    }

    /// Consumes the map and returns a standard http::HeaderMap.
    /// Note: http::HeaderMap preserves insertion order per name.
    pub fn to_header_map(self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in self.headers {
            map.append(name, value);
        }
        map
    }
}

fn parse_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), NetError> {
    let name = HeaderName::from_str(name).map_err(|_| NetError::InvalidHeader)?;
    let value = HeaderValue::from_str(value).map_err(|_| NetError::InvalidHeader)?;
    Ok((name, value))
}
