//! Trie implementation backing [`Router`].
//!
//! Each node represents one path segment and owns its literal children, an
//! optional typed-parameter child, an optional remainder child, the
//! middlewares registered at its path, and (for terminal nodes) the route's
//! method table. Matching walks the tree segment by segment; shared
//! prefixes are stored once, and lookup cost is proportional to the path
//! length, not the number of routes.

use std::collections::HashMap;
use std::fmt;

use http::Method;
use smallvec::SmallVec;
use tracing::{info, warn};

use crate::wire::QueryMap;
use crate::middleware::{HandlerFn, MiddlewareFn};

const DEFAULT_CAPTURE_COUNT_MAX: usize = 8;

/// A positional value extracted from a typed template parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Capture<'b> {
    Int(i64),
    Float(f64),
    Str(&'b str),
}

impl<'b> Capture<'b> {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Capture::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Capture::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&'b str> {
        match self {
            Capture::Str(v) => Some(v),
            _ => None,
        }
    }
}

/// Captures in traversal order, inline up to the default capture limit.
pub type Captures<'b> = SmallVec<[Capture<'b>; 8]>;

/// Route registration error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// A different parameter type is already registered at this position.
    ParamTypeConflict {
        template: String,
        segment: String,
    },
    /// `%r` must be the final template segment.
    RemainderNotLast {
        template: String,
    },
    /// The template declares more captures than the configured maximum.
    TooManyCaptures {
        template: String,
        max: usize,
    },
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterError::ParamTypeConflict { template, segment } => write!(
                f,
                "template '{template}' conflicts with an existing parameter type at '{segment}'"
            ),
            RouterError::RemainderNotLast { template } => {
                write!(f, "template '{template}' has segments after %r")
            }
            RouterError::TooManyCaptures { template, max } => {
                write!(f, "template '{template}' declares more than {max} captures")
            }
        }
    }
}

impl std::error::Error for RouterError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamKind {
    Int,
    Float,
    Str,
}

impl ParamKind {
    fn marker(&self) -> &'static str {
        match self {
            ParamKind::Int => "%i",
            ParamKind::Float => "%f",
            ParamKind::Str => "%s",
        }
    }

    fn parse<'b>(&self, segment: &'b str) -> Option<Capture<'b>> {
        match self {
            ParamKind::Int => {
                if !segment.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                if segment.len() > 1 && segment.starts_with('0') {
                    return None;
                }
                segment.parse::<i64>().ok().map(Capture::Int)
            }
            ParamKind::Float => {
                let mut parts = segment.splitn(2, '.');
                let int_part = parts.next().unwrap_or("");
                if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                if let Some(frac) = parts.next() {
                    if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
                        return None;
                    }
                }
                segment.parse::<f64>().ok().map(Capture::Float)
            }
            ParamKind::Str => {
                if segment.is_empty() {
                    None
                } else {
                    Some(Capture::Str(segment))
                }
            }
        }
    }
}

#[derive(Debug)]
struct Route<S> {
    methods: HashMap<Method, HandlerFn<S>>,
}

impl<S> Default for Route<S> {
    fn default() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }
}

struct Node<S> {
    literals: HashMap<String, Node<S>>,
    param: Option<(ParamKind, Box<Node<S>>)>,
    remainder: Option<Box<Node<S>>>,
    middlewares: Vec<MiddlewareFn<S>>,
    route: Option<Route<S>>,
}

impl<S> Node<S> {
    fn new() -> Self {
        Self {
            literals: HashMap::new(),
            param: None,
            remainder: None,
            middlewares: Vec::new(),
            route: None,
        }
    }
}

/// The tuple a successful match returns: the matched route plus the
/// middlewares that apply, ancestors first, the terminal node's own last.
pub struct RouteBundle<'r, S> {
    route: &'r Route<S>,
    middlewares: SmallVec<[MiddlewareFn<S>; 4]>,
}

impl<'r, S> RouteBundle<'r, S> {
    /// Handler for the given method, if the route serves it.
    pub fn handler(&self, method: &Method) -> Option<HandlerFn<S>> {
        self.route.methods.get(method).copied()
    }

    /// Applicable middlewares in execution order.
    pub fn middlewares(&self) -> &[MiddlewareFn<S>] {
        &self.middlewares
    }
}

enum TemplateSegment<'t> {
    Literal(&'t str),
    Param(ParamKind),
    Remainder,
}

/// Path-segment trie mapping request targets to handlers and middleware
/// stacks. `S` is the shared application state type threaded into every
/// [`Context`](crate::Context); the router itself stores only `fn`
/// pointers, so it is freely shareable across worker threads.
pub struct Router<S> {
    root: Node<S>,
    capture_count_max: usize,
}

impl<S> Default for Router<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Router<S> {
    pub fn new() -> Self {
        Self {
            root: Node::new(),
            capture_count_max: DEFAULT_CAPTURE_COUNT_MAX,
        }
    }

    /// Override the per-template capture limit.
    pub fn with_capture_count_max(mut self, max: usize) -> Self {
        self.capture_count_max = max;
        self
    }

    /// Register a handler for `method` at `template`.
    ///
    /// Registering the same method twice at one template replaces the
    /// previous handler.
    pub fn add(
        &mut self,
        method: Method,
        template: &str,
        handler: HandlerFn<S>,
    ) -> Result<(), RouterError> {
        let node = self.node_for_template(template)?;
        let route = node.route.get_or_insert_with(Route::default);
        if route.methods.insert(method.clone(), handler).is_some() {
            warn!(method = %method, template = template, "replaced existing route handler");
        } else {
            info!(method = %method, template = template, "route registered");
        }
        Ok(())
    }

    /// Attach a middleware at `template`. It applies to every route at or
    /// below that path, running before middlewares registered deeper in
    /// the tree.
    pub fn middleware(
        &mut self,
        template: &str,
        middleware: MiddlewareFn<S>,
    ) -> Result<(), RouterError> {
        let node = self.node_for_template(template)?;
        node.middlewares.push(middleware);
        Ok(())
    }

    /// Match a request target.
    ///
    /// The query string, if any, is split off and parsed into `queries`
    /// before matching; captures are appended to `captures` in traversal
    /// order. Returns `None` when no route matches (a 404 at the engine
    /// level; a matched route lacking the request method is the engine's
    /// 405).
    pub fn lookup<'r, 'b>(
        &'r self,
        target: &'b str,
        captures: &mut Captures<'b>,
        queries: &mut QueryMap<'b>,
    ) -> Option<RouteBundle<'r, S>> {
        let (path, query) = match target.find('?') {
            Some(i) => (&target[..i], Some(&target[i + 1..])),
            None => (target, None),
        };
        if let Some(query) = query {
            queries.parse(query);
        }

        let mut middlewares: SmallVec<[MiddlewareFn<S>; 4]> = SmallVec::new();
        middlewares.extend(self.root.middlewares.iter().copied());

        let mut node = &self.root;
        let mut rest = path;
        loop {
            while let Some(stripped) = rest.strip_prefix('/') {
                rest = stripped;
            }
            if rest.is_empty() {
                if node.route.is_some() {
                    break;
                }
                // An empty suffix still satisfies a remainder child.
                if let Some(child) = &node.remainder {
                    captures.push(Capture::Str(""));
                    middlewares.extend(child.middlewares.iter().copied());
                    node = child.as_ref();
                    break;
                }
                break;
            }

            let (segment, tail) = match rest.find('/') {
                Some(i) => (&rest[..i], &rest[i..]),
                None => (rest, ""),
            };

            if let Some(child) = node.literals.get(segment) {
                middlewares.extend(child.middlewares.iter().copied());
                node = child;
                rest = tail;
                continue;
            }

            if let Some((kind, child)) = &node.param {
                if let Some(capture) = kind.parse(segment) {
                    captures.push(capture);
                    middlewares.extend(child.middlewares.iter().copied());
                    node = child.as_ref();
                    rest = tail;
                    continue;
                }
            }

            if let Some(child) = &node.remainder {
                captures.push(Capture::Str(rest));
                middlewares.extend(child.middlewares.iter().copied());
                node = child.as_ref();
                break;
            }

            return None;
        }

        let route = node.route.as_ref()?;
        Some(RouteBundle { route, middlewares })
    }

    fn node_for_template(&mut self, template: &str) -> Result<&mut Node<S>, RouterError> {
        let segments = parse_template(template, self.capture_count_max)?;
        let mut node = &mut self.root;
        for segment in segments {
            node = match segment {
                TemplateSegment::Literal(s) => node
                    .literals
                    .entry(s.to_string())
                    .or_insert_with(Node::new),
                TemplateSegment::Param(kind) => {
                    let (existing, child) =
                        node.param.get_or_insert_with(|| (kind, Box::new(Node::new())));
                    if *existing != kind {
                        return Err(RouterError::ParamTypeConflict {
                            template: template.to_string(),
                            segment: existing.marker().to_string(),
                        });
                    }
                    child.as_mut()
                }
                TemplateSegment::Remainder => node
                    .remainder
                    .get_or_insert_with(|| Box::new(Node::new()))
                    .as_mut(),
            };
        }
        Ok(node)
    }
}

fn parse_template(
    template: &str,
    capture_count_max: usize,
) -> Result<Vec<TemplateSegment<'_>>, RouterError> {
    let mut segments = Vec::new();
    let mut captures = 0usize;
    let mut saw_remainder = false;

    for raw in template.split('/') {
        if raw.is_empty() {
            continue;
        }
        if saw_remainder {
            return Err(RouterError::RemainderNotLast {
                template: template.to_string(),
            });
        }
        let segment = match raw {
            "%i" => {
                captures += 1;
                TemplateSegment::Param(ParamKind::Int)
            }
            "%f" => {
                captures += 1;
                TemplateSegment::Param(ParamKind::Float)
            }
            "%s" => {
                captures += 1;
                TemplateSegment::Param(ParamKind::Str)
            }
            "%r" => {
                captures += 1;
                saw_remainder = true;
                TemplateSegment::Remainder
            }
            literal => TemplateSegment::Literal(literal),
        };
        segments.push(segment);
    }

    if captures > capture_count_max {
        return Err(RouterError::TooManyCaptures {
            template: template.to_string(),
            max: capture_count_max,
        });
    }

    Ok(segments)
}
