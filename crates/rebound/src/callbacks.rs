// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use futures_util::future::BoxFuture;

/// Generates a cloneable, thread-safe wrapper around a user-provided closure.
///
/// The wrapper stores the closure in an `Arc<dyn Fn ...>`, so cloning is cheap and the
/// closure can be captured by a run snapshot without borrowing the builder.
///
/// ```rust,ignore
/// define_fn_wrapper!(pub(crate) RetryIf<E>(Fn(error: &E) -> bool));
/// ```
macro_rules! define_fn_wrapper {
    ($(#[$meta:meta])* $vis:vis $name:ident<$($generics:ident),*>(Fn($($param_name:ident: $param_ty:ty),*) -> $return_ty:ty)) => {
        $(#[$meta])*
        $vis struct $name<$($generics),*>(std::sync::Arc<dyn Fn($($param_ty),*) -> $return_ty + Send + Sync>);

        impl<$($generics),*> $name<$($generics),*> {
            pub(crate) fn new<F>(f: F) -> Self
            where
                F: Fn($($param_ty),*) -> $return_ty + Send + Sync + 'static,
            {
                Self(std::sync::Arc::new(f))
            }

            pub(crate) fn call(&self, $($param_name: $param_ty),*) -> $return_ty {
                (self.0)($($param_name),*)
            }
        }

        impl<$($generics),*> Clone for $name<$($generics),*> {
            fn clone(&self) -> Self {
                Self(std::sync::Arc::clone(&self.0))
            }
        }

        impl<$($generics),*> std::fmt::Debug for $name<$($generics),*> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name)).finish_non_exhaustive()
            }
        }
    };

    ($(#[$meta:meta])* $vis:vis $name:ident(Fn($($param_name:ident: $param_ty:ty),*) -> $return_ty:ty)) => {
        $(#[$meta])*
        $vis struct $name(std::sync::Arc<dyn Fn($($param_ty),*) -> $return_ty + Send + Sync>);

        impl $name {
            pub(crate) fn new<F>(f: F) -> Self
            where
                F: Fn($($param_ty),*) -> $return_ty + Send + Sync + 'static,
            {
                Self(std::sync::Arc::new(f))
            }

            pub(crate) fn call(&self, $($param_name: $param_ty),*) -> $return_ty {
                (self.0)($($param_name),*)
            }
        }

        impl Clone for $name {
            fn clone(&self) -> Self {
                Self(std::sync::Arc::clone(&self.0))
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name)).finish_non_exhaustive()
            }
        }
    };
}

define_fn_wrapper!(pub(crate) Operation<T, E>(Fn() -> BoxFuture<'static, Result<T, E>>));
define_fn_wrapper!(pub(crate) RetryIf<E>(Fn(error: &E) -> bool));
define_fn_wrapper!(
    /// A caller-supplied delay recurrence, see [`DelayStrategy::custom`][crate::DelayStrategy::custom].
    pub NextDelay(Fn(current: Duration) -> Duration)
);

impl<E> RetryIf<E> {
    pub(crate) fn always() -> Self {
        Self::new(|_| true)
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use futures_util::FutureExt;

    use super::*;

    #[test]
    fn static_assertions() {
        static_assertions::assert_impl_all!(Operation<String, String>: Send, Sync, Debug, Clone);
        static_assertions::assert_impl_all!(RetryIf<String>: Send, Sync, Debug, Clone);
        static_assertions::assert_impl_all!(NextDelay: Send, Sync, Debug, Clone);
    }

    #[test]
    fn retry_if_always_accepts() {
        let predicate = RetryIf::<String>::always();

        assert!(predicate.call(&"anything".to_string()));
    }

    #[test]
    fn next_delay_call_and_debug() {
        let next = NextDelay::new(|current| current * 3);

        assert_eq!(next.call(Duration::from_millis(10)), Duration::from_millis(30));
        assert_eq!(format!("{next:?}"), "NextDelay { .. }");
    }

    #[tokio::test]
    async fn operation_clones_share_closure() {
        let operation = Operation::<u32, String>::new(|| async { Ok::<u32, String>(42) }.boxed());
        let cloned = operation.clone();

        assert_eq!(operation.call().await, Ok(42));
        assert_eq!(cloned.call().await, Ok(42));
    }
}
