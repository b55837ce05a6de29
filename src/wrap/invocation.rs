//! Argument concatenation and scope binding shared by the wrappers.

/// A fully resolved call: the receiver plus the final argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation<S, A> {
    /// Receiver the function is applied against
    scope: S,
    /// Bound arguments followed by the call's own arguments
    arguments: Vec<A>,
}

impl<S, A: Clone> Invocation<S, A> {
    /// Create an invocation, prepending `bound` to the call's arguments.
    pub fn new(scope: S, bound: &[A], arguments: Vec<A>) -> Self {
        Self {
            scope,
            arguments: concat_arguments(bound, arguments),
        }
    }
}

impl<S, A> Invocation<S, A> {
    /// The receiver of this invocation.
    pub fn scope(&self) -> &S {
        &self.scope
    }

    /// The concatenated argument list.
    pub fn arguments(&self) -> &[A] {
        &self.arguments
    }

    /// Apply `function` to this invocation's scope and arguments.
    pub fn apply<F, R>(&self, function: &F) -> R
    where
        F: Fn(&S, &[A]) -> R + ?Sized,
    {
        function(&self.scope, &self.arguments)
    }
}

/// Concatenate bound arguments and call arguments, bound first.
pub fn concat_arguments<A: Clone>(bound: &[A], arguments: Vec<A>) -> Vec<A> {
    if bound.is_empty() {
        return arguments;
    }

    let mut all = Vec::with_capacity(bound.len() + arguments.len());
    all.extend_from_slice(bound);
    all.extend(arguments);
    all
}
