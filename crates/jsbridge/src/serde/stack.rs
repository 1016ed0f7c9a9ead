use crate::JSValue;

use super::{CodingPath, PathSegment};

/// The coding path and container stack of one encoding or decoding scope.
///
/// A scope may start below the root (super encoders and decoders): `base_depth`
/// is the length of the path it was created at. There is one container per
/// path level of the scope, so a new container can be pushed exactly when
/// `containers.len() == path.len() - base_depth`.
#[derive(Debug, Default)]
pub(crate) struct CodingState<'js> {
    path: CodingPath,
    containers: Vec<JSValue<'js>>,
    base_depth: usize,
}

/// Coders exposing their [`CodingState`] to [`scoped`].
pub(crate) trait HasCodingState<'js> {
    fn coding_state(&mut self) -> &mut CodingState<'js>;
}

impl<'js> CodingState<'js> {
    pub(crate) fn new(path: CodingPath) -> Self {
        Self {
            base_depth: path.len(),
            path,
            containers: Vec::new(),
        }
    }

    pub(crate) fn path(&self) -> &CodingPath {
        &self.path
    }

    /// Number of containers currently on the stack.
    pub(crate) fn len(&self) -> usize {
        self.containers.len()
    }

    pub(crate) fn can_accept_new_container(&self) -> bool {
        self.containers.len() == self.path.len() - self.base_depth
    }

    /// Pushes `container` for the current path level.
    ///
    /// # Panics
    ///
    /// When a container was already pushed at this level, which means a value
    /// tried to store twice.
    pub(crate) fn push_container(&mut self, container: JSValue<'js>) {
        assert!(
            self.can_accept_new_container(),
            "attempt to push a new container at {} without a matching coding path entry",
            self.path
        );
        if container.as_inner().is_object() {
            tracing::trace!(path = %self.path, kind = container.type_name(), "push container");
        }
        self.containers.push(container);
    }

    pub(crate) fn pop_container(&mut self) -> Option<JSValue<'js>> {
        self.containers.pop()
    }

    pub(crate) fn top(&self) -> Option<&JSValue<'js>> {
        self.containers.last()
    }

    /// The container pushed at the current path level, if any.
    pub(crate) fn current(&self) -> Option<&JSValue<'js>> {
        if self.containers.len() > self.path.len() - self.base_depth {
            self.containers.last()
        } else {
            None
        }
    }

    /// Enters `segment` and pushes `container` for it. Frames outliving a
    /// single call are popped with [`Self::pop_frame`].
    pub(crate) fn push_frame(&mut self, segment: PathSegment, container: JSValue<'js>) {
        self.path.push(segment);
        self.push_container(container);
    }

    pub(crate) fn pop_frame(&mut self) {
        self.containers.pop();
        self.path.pop();
    }
}

/// Runs `f` with `segment` pushed onto the coding path.
///
/// The path and the container stack are restored to their previous lengths
/// on every exit, including early returns through `?`.
pub(crate) fn scoped<'js, S, R>(
    coder: &mut S,
    segment: PathSegment,
    f: impl FnOnce(&mut S) -> R,
) -> R
where
    S: HasCodingState<'js>,
{
    let state = coder.coding_state();
    let path_len = state.path.len();
    let containers_len = state.containers.len();
    state.path.push(segment);

    let result = f(coder);

    let state = coder.coding_state();
    state.containers.truncate(containers_len);
    while state.path.len() > path_len {
        state.path.pop();
    }
    result
}
