use crate::core::context::Context;
use crate::core::descriptor::{compatible, Signature, TypeDescriptor};
use crate::core::error::{Error, ExecutionError};
use crate::core::sync_impl::{AsAny, NodeValue};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

/// The boundary every function satisfies to take part in a graph, a pipeline or a stage.
///
/// Requests and responses cross the boundary as [`NodeValue`]s; the descriptors state
/// what the callable actually expects and produces so connections can be checked
/// before anything runs.
pub trait Callable: AsAny + Send + Sync {
    fn call(&self, ctx: &Context, req: NodeValue) -> Result<NodeValue, ExecutionError>;

    fn request_type(&self) -> TypeDescriptor;

    fn response_type(&self) -> TypeDescriptor;

    fn signature(&self) -> Signature {
        Signature::classify(&self.request_type(), &self.response_type())
    }
}

/// Shared handle to an erased callable.
pub type AnyCallable = Arc<dyn Callable>;

/// Lifts a typed function into the erased [`Callable`] contract.
///
/// The request is deserialized into `Req` before the call and the response serialized
/// from `Res` after it.
pub struct FnCallable<Req, Res, F> {
    f: F,
    request_type: TypeDescriptor,
    response_type: TypeDescriptor,
    _types: PhantomData<fn(Req) -> Res>,
}

impl<Req, Res, F> FnCallable<Req, Res, F>
where
    Req: DeserializeOwned + 'static,
    Res: Serialize + 'static,
    F: Fn(&Context, Req) -> Result<Res, ExecutionError> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            request_type: TypeDescriptor::of::<Req>(),
            response_type: TypeDescriptor::of::<Res>(),
            _types: PhantomData,
        }
    }

    /// Overrides the declared request descriptor, e.g. to declare a pointer form.
    ///
    /// Fails when `descriptor` is not compatible with `Req`.
    pub fn with_request_type(mut self, descriptor: TypeDescriptor) -> Result<Self, Error> {
        self.request_type = declared("request", descriptor, TypeDescriptor::of::<Req>())?;
        Ok(self)
    }

    /// Overrides the declared response descriptor. Fails when it is not compatible with `Res`.
    pub fn with_response_type(mut self, descriptor: TypeDescriptor) -> Result<Self, Error> {
        self.response_type = declared("response", descriptor, TypeDescriptor::of::<Res>())?;
        Ok(self)
    }

    pub fn into_any(self) -> AnyCallable {
        Arc::new(self)
    }
}

impl<Req, Res, F> Callable for FnCallable<Req, Res, F>
where
    Req: DeserializeOwned + 'static,
    Res: Serialize + 'static,
    F: Fn(&Context, Req) -> Result<Res, ExecutionError> + Send + Sync + 'static,
{
    fn call(&self, ctx: &Context, req: NodeValue) -> Result<NodeValue, ExecutionError> {
        let req: Req = serde_json::from_value(req)?;
        let res = (self.f)(ctx, req)?;
        Ok(serde_json::to_value(res)?)
    }

    fn request_type(&self) -> TypeDescriptor {
        self.request_type
    }

    fn response_type(&self) -> TypeDescriptor {
        self.response_type
    }
}

/// Shorthand for `FnCallable::new(f).into_any()`.
pub fn callable<Req, Res, F>(f: F) -> AnyCallable
where
    Req: DeserializeOwned + 'static,
    Res: Serialize + 'static,
    F: Fn(&Context, Req) -> Result<Res, ExecutionError> + Send + Sync + 'static,
{
    FnCallable::new(f).into_any()
}

/// A callable over raw [`NodeValue`]s, declared as taking and returning `any`.
pub fn dynamic<F>(f: F) -> AnyCallable
where
    F: Fn(&Context, NodeValue) -> Result<NodeValue, ExecutionError> + Send + Sync + 'static,
{
    FnCallable::new(f).into_any()
}

/// Checks a declared descriptor against the type the callable actually handles.
pub(crate) fn declared(
    side: &str,
    descriptor: TypeDescriptor,
    actual: TypeDescriptor,
) -> Result<TypeDescriptor, Error> {
    if compatible(&descriptor, &actual) {
        Ok(descriptor)
    } else {
        Err(Error::Configuration(format!(
            "declared {side} type {descriptor} does not match {actual}"
        )))
    }
}
