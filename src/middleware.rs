//! Middleware chain execution.
//!
//! A route's middleware stack runs in registration order, ancestors before
//! the route's own. Each middleware receives the context and a [`Next`]
//! holding the rest of the chain; it either calls `next.run()` (possibly
//! decorating the result) or short-circuits by returning its own respond,
//! in which case the handler never runs.

use crate::context::Context;
use crate::error::Error;
use crate::wire::Respond;

/// Terminal request handler.
pub type HandlerFn<S> = for<'a, 'b> fn(&'a Context<'b, S>) -> Result<Respond<'b>, Error>;

/// A single middleware stage.
pub type MiddlewareFn<S> =
    for<'a, 'b> fn(&'a Context<'b, S>, Next<'a, 'b, S>) -> Result<Respond<'b>, Error>;

/// The residual of the middleware chain plus the terminal handler,
/// invokable once to produce a respond.
pub struct Next<'a, 'b, S> {
    ctx: &'a Context<'b, S>,
    middlewares: &'a [MiddlewareFn<S>],
    handler: HandlerFn<S>,
}

impl<'a, 'b, S> Next<'a, 'b, S> {
    pub(crate) fn new(
        ctx: &'a Context<'b, S>,
        middlewares: &'a [MiddlewareFn<S>],
        handler: HandlerFn<S>,
    ) -> Self {
        Self {
            ctx,
            middlewares,
            handler,
        }
    }

    /// Run the rest of the chain: the first remaining middleware, or the
    /// handler once the chain is exhausted.
    pub fn run(self) -> Result<Respond<'b>, Error> {
        match self.middlewares.split_first() {
            Some((middleware, rest)) => middleware(
                self.ctx,
                Next {
                    ctx: self.ctx,
                    middlewares: rest,
                    handler: self.handler,
                },
            ),
            None => (self.handler)(self.ctx),
        }
    }
}
