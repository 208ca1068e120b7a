//! Incoming request data for route handlers

use crate::value::Value;
use std::collections::BTreeMap;

/// Everything a route handler can see about the request that triggered it,
/// apart from the method and path which the router supplies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    /// Query string values; a repeated key keeps every value in order
    pub query: BTreeMap<String, Vec<String>>,
    /// Parsed request body
    pub body: Option<Value>,
    pub headers: BTreeMap<String, String>,
    /// Authenticated principal, as established by the host
    pub auth: Option<Value>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.entry(name.into()).or_default().push(value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_auth(mut self, principal: Value) -> Self {
        self.auth = Some(principal);
        self
    }

    /// Parse `a=1&b=2&b=3` into query values
    pub fn with_query_string(mut self, query: &str) -> Self {
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            self = self.with_query(name, value);
        }
        self
    }

    /// First value given for `name`
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// The raw query as an object. Repeated keys become arrays of strings.
    pub fn query_object(&self) -> Value {
        Value::object(self.query.iter().map(|(name, values)| {
            let value = match values.as_slice() {
                [single] => Value::string(single.clone()),
                many => Value::Array(many.iter().cloned().map(Value::String).collect()),
            };
            (name.clone(), value)
        }))
    }

    pub fn headers_object(&self) -> Value {
        Value::object(
            self.headers
                .iter()
                .map(|(name, value)| (name.clone(), Value::string(value.clone()))),
        )
    }
}
