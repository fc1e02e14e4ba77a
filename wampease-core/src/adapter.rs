//! Argument adapter between positional callbacks and WAMP payloads
//!
//! WAMP hands every event and invocation to its handler as one positional
//! list (plus a keyword dictionary). Callers would rather write
//! `|(a, b): (i64, i64)| ...` than index into a list, so this module converts
//! between the two shapes:
//!
//! - [`FromArgs`] spreads an inbound `Vec<Value>` into a typed tuple
//! - [`IntoArgs`] packs an outbound tuple into a `Vec<Value>`
//! - [`procedure`] and [`event_handler`] wrap typed closures into the
//!   handler shapes the [`Session`](crate::Session) expects
//!
//! Spreading is lenient in the same way positional calls usually are:
//! missing trailing positions read as `null` (so `Option<T>` parameters work)
//! and surplus positions are ignored.
//!
//! # Examples
//!
//! ```rust
//! use wampease_core::adapter::{procedure, FromArgs, IntoArgs};
//! use serde_json::json;
//!
//! let (a, b): (i64, String) = FromArgs::from_args(vec![json!(2), json!("x")]).unwrap();
//! assert_eq!((a, b.as_str()), (2, "x"));
//!
//! let packed = ("Hola", "Mundo").into_args().unwrap();
//! assert_eq!(packed, vec![json!("Hola"), json!("Mundo")]);
//!
//! let add2 = procedure(|(n,): (i64,)| async move { Ok(n + 2) });
//! # let _ = add2;
//! ```

use crate::types::{Event, Invocation};
use crate::{Error, Result};
use futures::future::{self, BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Handler invoked for every event on a subscription
pub type EventHandler = Arc<dyn Fn(Event) -> BoxFuture<'static, ()> + Send + Sync>;

/// Handler invoked for every call to a registered procedure
pub type ProcedureHandler =
    Arc<dyn Fn(Invocation) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Conversion from a positional argument list into callback parameters
pub trait FromArgs: Sized {
    /// Spread `args` into `Self`
    fn from_args(args: Vec<Value>) -> Result<Self>;
}

/// Conversion from call parameters into a positional argument list
pub trait IntoArgs {
    /// Pack `self` into positional arguments
    fn into_args(self) -> Result<Vec<Value>>;
}

impl FromArgs for Vec<Value> {
    fn from_args(args: Vec<Value>) -> Result<Self> {
        Ok(args)
    }
}

impl FromArgs for () {
    fn from_args(_args: Vec<Value>) -> Result<Self> {
        Ok(())
    }
}

impl IntoArgs for Vec<Value> {
    fn into_args(self) -> Result<Vec<Value>> {
        Ok(self)
    }
}

impl IntoArgs for () {
    fn into_args(self) -> Result<Vec<Value>> {
        Ok(Vec::new())
    }
}

fn take_arg<T: DeserializeOwned>(
    args: &mut std::vec::IntoIter<Value>,
    position: usize,
) -> Result<T> {
    let value = args.next().unwrap_or(Value::Null);
    serde_json::from_value(value)
        .map_err(|e| Error::InvalidArgument(format!("argument at position {position}: {e}")))
}

macro_rules! impl_tuple_args {
    ($($ty:ident => $idx:tt),+) => {
        impl<$($ty: DeserializeOwned),+> FromArgs for ($($ty,)+) {
            fn from_args(args: Vec<Value>) -> Result<Self> {
                let mut args = args.into_iter();
                Ok(($(take_arg::<$ty>(&mut args, $idx)?,)+))
            }
        }

        impl<$($ty: Serialize),+> IntoArgs for ($($ty,)+) {
            fn into_args(self) -> Result<Vec<Value>> {
                Ok(vec![$(serde_json::to_value(&self.$idx)?),+])
            }
        }
    };
}

impl_tuple_args!(A => 0);
impl_tuple_args!(A => 0, B => 1);
impl_tuple_args!(A => 0, B => 1, C => 2);
impl_tuple_args!(A => 0, B => 1, C => 2, D => 3);
impl_tuple_args!(A => 0, B => 1, C => 2, D => 3, E => 4);
impl_tuple_args!(A => 0, B => 1, C => 2, D => 3, E => 4, G => 5);

/// Adapt a positional procedure into a [`ProcedureHandler`]
///
/// The invocation's arguments are spread into `T`; a spreading failure is
/// returned to the caller as the call's error. The returned value is
/// serialized as the call result.
pub fn procedure<T, F, Fut, R>(f: F) -> ProcedureHandler
where
    T: FromArgs + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
    R: Serialize + Send + 'static,
{
    Arc::new(move |invocation: Invocation| match T::from_args(invocation.args) {
        Ok(args) => {
            let fut = f(args);
            async move {
                let result = fut.await?;
                Ok(serde_json::to_value(result)?)
            }
            .boxed()
        }
        Err(e) => future::ready(Err(e)).boxed(),
    })
}

/// Adapt a positional event callback into an [`EventHandler`]
///
/// Events whose arguments cannot be spread into `T` are logged and dropped.
pub fn event_handler<T, F, Fut>(f: F) -> EventHandler
where
    T: FromArgs + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |event: Event| match T::from_args(event.args) {
        Ok(args) => f(args).boxed(),
        Err(e) => {
            tracing::warn!(
                topic = %event.details.topic,
                error = %e,
                "Dropping event with undecodable arguments"
            );
            future::ready(()).boxed()
        }
    })
}

/// Wrap a closure that wants the whole [`Invocation`] (kwargs and details)
pub fn raw_procedure<F, Fut>(f: F) -> ProcedureHandler
where
    F: Fn(Invocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(move |invocation| f(invocation).boxed())
}

/// Wrap a closure that wants the whole [`Event`] (kwargs and details)
pub fn raw_event_handler<F, Fut>(f: F) -> EventHandler
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |event| f(event).boxed())
}
