use crate::http::error::RouteError;
use crate::http::request::Request;
use crate::http::response::{EXCEPTION_ERROR, Response};
use once_cell::sync::Lazy;
use regex::Regex;
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// What a route runs. Anything it wants to send goes through the response;
/// an `Err` (or a panic) becomes a 500 carrying its message.
pub type Behavior = Box<dyn Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync>;

static PARAM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{(?P<name>[A-Za-z0-9_]+|\*)\}$").expect("parameter pattern compiles"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// `{name}`: any single segment, bound to `name`.
    Dynamic(String),
    /// `{*}`: the rest of the path, zero or more segments.
    Variadic,
}

pub struct Route {
    pattern: String,
    segments: Vec<Segment>,
    behavior: Behavior,
}

impl Route {
    pub fn new<F>(pattern: &str, behavior: F) -> Result<Route, RouteError>
    where
        F: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Ok(Route {
            pattern: pattern.to_string(),
            segments: parse_pattern(pattern)?,
            behavior: Box::new(behavior),
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    fn is_variadic(&self) -> bool {
        self.segments.last() == Some(&Segment::Variadic)
    }

    fn fixed_segments(&self) -> &[Segment] {
        if self.is_variadic() {
            &self.segments[..self.segments.len() - 1]
        } else {
            &self.segments
        }
    }

    /// Every pattern segment is a literal equal to the matching path segment.
    pub fn matches_exactly(&self, path: &[String]) -> bool {
        self.segments.len() == path.len()
            && self.segments.iter().zip(path).all(|(segment, actual)| {
                matches!(segment, Segment::Literal(literal) if literal == actual)
            })
    }

    /// How well `path` fits this route; 0 means it does not match at all.
    ///
    /// A compatible length scores 1, each equal literal 2 more and each
    /// dynamic segment 1 more. A differing literal rejects the route. The
    /// variadic tail takes any number of trailing segments and adds nothing.
    pub fn score(&self, path: &[String]) -> u32 {
        let fixed = self.fixed_segments();
        let length_fits = if self.is_variadic() {
            path.len() >= fixed.len()
        } else {
            path.len() == fixed.len()
        };
        if !length_fits {
            return 0;
        }

        let mut count = 1;
        for (segment, actual) in fixed.iter().zip(path) {
            match segment {
                Segment::Literal(literal) if literal == actual => count += 2,
                Segment::Literal(_) => return 0,
                Segment::Dynamic(_) => count += 1,
                Segment::Variadic => {}
            }
        }
        count
    }

    /// Bind path parameters and the variadic tail into `request`, then run the
    /// behavior. Failures never escape; they end up in `response` as a 500.
    pub fn invoke(&self, request: &mut Request, response: &mut Response) {
        let mut params = Vec::new();
        let mut varargs = Vec::new();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Dynamic(name) => {
                    if let Some(actual) = request.segments().get(i) {
                        params.push((name.clone(), actual.clone()));
                    }
                }
                Segment::Variadic => varargs.extend(request.segments().iter().skip(i).cloned()),
                Segment::Literal(_) => {}
            }
        }
        request.merge_params(params);
        request.merge_varargs(varargs);

        let request = &*request;
        match panic::catch_unwind(AssertUnwindSafe(|| (self.behavior)(request, response))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => response.error(500, e.to_string(), &format_args!("{:#}", e)),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                response.error(500, message, &format_args!("route {} panicked", self.pattern));
            }
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .field("segments", &self.segments)
            .finish_non_exhaustive()
    }
}

fn parse_pattern(pattern: &str) -> Result<Vec<Segment>, RouteError> {
    let raw: Vec<&str> = pattern.trim().split('/').filter(|s| !s.is_empty()).collect();
    let mut names = HashSet::new();
    let mut segments = Vec::with_capacity(raw.len());

    for (i, s) in raw.iter().enumerate() {
        if !s.starts_with('{') && !s.ends_with('}') {
            segments.push(Segment::Literal(s.to_string()));
            continue;
        }

        let name = PARAM_RE
            .captures(s)
            .and_then(|capt| capt.name("name"))
            .ok_or_else(|| RouteError::InvalidParameter(s.to_string()))?
            .as_str();

        if name == "*" {
            if i != raw.len() - 1 {
                return Err(RouteError::VariadicNotLast(pattern.to_string()));
            }
            segments.push(Segment::Variadic);
        } else {
            if !names.insert(name) {
                return Err(RouteError::DuplicateParameter(name.to_string()));
            }
            segments.push(Segment::Dynamic(name.to_string()));
        }
    }
    Ok(segments)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        EXCEPTION_ERROR.to_string()
    }
}
