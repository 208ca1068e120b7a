//! Matching concrete request paths against route templates

use crate::ast::{HttpMethod, Route};
use regex::Regex;
use std::collections::BTreeMap;

/// A compiled `/users/:id` style template
#[derive(Debug, Clone)]
pub struct RoutePattern {
    template: String,
    regex: Regex,
    param_names: Vec<String>,
    /// Number of literal segments; more specific templates win
    literal_segments: usize,
}

impl RoutePattern {
    pub fn compile(template: &str) -> Result<Self, regex::Error> {
        let mut pattern = String::from("^");
        let mut param_names = Vec::new();
        let mut literal_segments = 0;

        for segment in normalize(template).split('/').filter(|s| !s.is_empty()) {
            pattern.push('/');
            match segment.strip_prefix(':') {
                Some(name) => {
                    pattern.push_str("([^/]+)");
                    param_names.push(name.to_string());
                }
                None => {
                    pattern.push_str(&regex::escape(segment));
                    literal_segments += 1;
                }
            }
        }
        if param_names.is_empty() && literal_segments == 0 {
            pattern.push('/');
        }
        pattern.push('$');

        Ok(Self {
            template: template.to_string(),
            regex: Regex::new(&pattern)?,
            param_names,
            literal_segments,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Path parameters of `path`, or `None` when it does not match
    pub fn match_path(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let captures = self.regex.captures(normalize(path))?;
        Some(
            self.param_names
                .iter()
                .enumerate()
                .filter_map(|(i, name)| {
                    captures
                        .get(i + 1)
                        .map(|m| (name.clone(), m.as_str().to_string()))
                })
                .collect(),
        )
    }
}

/// Strip the query string and a trailing slash
fn normalize(path: &str) -> &str {
    let path = path.split('?').next().unwrap_or(path);
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

#[derive(Debug, Clone)]
struct Entry {
    method: HttpMethod,
    key: String,
    pattern: RoutePattern,
}

/// Result of looking up a concrete request
#[derive(Debug, Clone, PartialEq)]
pub enum RouteMatch {
    Found {
        /// Registry key of the matched route, see [`Route::dispatch_key`]
        key: String,
        params: BTreeMap<String, String>,
    },
    /// The path matches at least one route, but none for this method
    MethodNotAllowed { allowed: Vec<HttpMethod> },
    NotFound,
}

/// All routes of a module, ready for dispatch
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<Entry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build<'a>(routes: impl IntoIterator<Item = &'a Route>) -> Result<Self, regex::Error> {
        let mut table = Self::new();
        for route in routes {
            table.insert(route)?;
        }
        Ok(table)
    }

    pub fn insert(&mut self, route: &Route) -> Result<(), regex::Error> {
        let key = route.dispatch_key();
        self.entries.retain(|entry| entry.key != key);
        self.entries.push(Entry {
            method: route.method,
            key,
            pattern: RoutePattern::compile(&route.path)?,
        });
        Ok(())
    }

    /// Find the most specific route for `method` and `path`
    pub fn lookup(&self, method: HttpMethod, path: &str) -> RouteMatch {
        let mut best: Option<(&Entry, BTreeMap<String, String>)> = None;
        let mut allowed = Vec::new();

        for entry in &self.entries {
            let Some(params) = entry.pattern.match_path(path) else {
                continue;
            };
            if entry.method != method {
                if !allowed.contains(&entry.method) {
                    allowed.push(entry.method);
                }
                continue;
            }
            let better = best
                .as_ref()
                .map_or(true, |(current, _)| {
                    entry.pattern.literal_segments > current.pattern.literal_segments
                });
            if better {
                best = Some((entry, params));
            }
        }

        match best {
            Some((entry, params)) => RouteMatch::Found {
                key: entry.key.clone(),
                params,
            },
            None if !allowed.is_empty() => {
                allowed.sort();
                RouteMatch::MethodNotAllowed { allowed }
            }
            None => RouteMatch::NotFound,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
