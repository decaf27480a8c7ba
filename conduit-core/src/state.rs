/// Trait alias for types that can serve as CONDUIT application state.
///
/// The user's state type is used directly as the Axum router state.
/// It must be `Clone + Send + Sync + 'static`.
pub trait ConduitState: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> ConduitState for T {}
