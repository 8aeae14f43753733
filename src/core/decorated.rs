use crate::core::callable::{AnyCallable, Callable};
use crate::core::context::Context;
use crate::core::descriptor::TypeDescriptor;
use crate::core::error::ExecutionError;
use crate::core::sync_impl::NodeValue;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

pub(crate) type CoreFn<Req, Res> =
    Arc<dyn Fn(&Context, Req) -> Result<Res, ExecutionError> + Send + Sync>;

type TransformFn<T> = Arc<dyn Fn(&Context, T) -> Result<T, ExecutionError> + Send + Sync>;

#[derive(Clone)]
enum DecoratorKind<T> {
    Typed(TransformFn<T>),
    Erased(AnyCallable),
}

/// A request or response transform applied around the core function.
///
/// Typed decorators are checked by the compiler. Erased decorators are any
/// [`Callable`]; their declared descriptors are checked when the owning
/// [`DecoratedCallable`] is built.
#[derive(Clone)]
pub struct Decorator<T> {
    kind: DecoratorKind<T>,
}

impl<T> Decorator<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Context, T) -> Result<T, ExecutionError> + Send + Sync + 'static,
    {
        Self {
            kind: DecoratorKind::Typed(Arc::new(f)),
        }
    }

    pub fn from_callable(callable: AnyCallable) -> Self {
        Self {
            kind: DecoratorKind::Erased(callable),
        }
    }

    /// Declared `(request, response)` descriptors, only known for erased decorators.
    pub(crate) fn declared_types(&self) -> Option<(TypeDescriptor, TypeDescriptor)> {
        match &self.kind {
            DecoratorKind::Typed(_) => None,
            DecoratorKind::Erased(callable) => {
                Some((callable.request_type(), callable.response_type()))
            }
        }
    }

    fn apply(&self, ctx: &Context, value: T) -> Result<T, ExecutionError> {
        match &self.kind {
            DecoratorKind::Typed(f) => f(ctx, value),
            DecoratorKind::Erased(callable) => {
                let res = callable.call(ctx, serde_json::to_value(value)?)?;
                Ok(serde_json::from_value(res)?)
            }
        }
    }
}

/// Rewrites the error of a failed call. Receives the original request.
#[derive(Clone)]
pub struct ExceptionDecorator<Req> {
    f: Arc<dyn Fn(&Context, &Req, ExecutionError) -> ExecutionError + Send + Sync>,
}

impl<Req> ExceptionDecorator<Req> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Context, &Req, ExecutionError) -> ExecutionError + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }

    fn apply(&self, ctx: &Context, req: &Req, err: ExecutionError) -> ExecutionError {
        (self.f)(ctx, req, err)
    }
}

/// A core function wrapped with request, response and exception decorators.
///
/// Built by [`DecoratedCallableBuilder`](crate::core::builder::DecoratedCallableBuilder)
/// and immutable afterwards. A call runs, in order:
/// 1. every request decorator, in list order
/// 2. the core function
/// 3. every response decorator, in list order
/// 4. on error, every exception decorator, in list order
///
/// Steps 1-3 stop at the first error. With fault containment enabled, a panic in
/// steps 1-3 is returned as [`ExecutionError::ContainedFault`] and skips step 4.
pub struct DecoratedCallable<Req, Res> {
    pub(crate) function: CoreFn<Req, Res>,
    pub(crate) request_decorators: Vec<Decorator<Req>>,
    pub(crate) response_decorators: Vec<Decorator<Res>>,
    pub(crate) exception_decorators: Vec<ExceptionDecorator<Req>>,
    pub(crate) fault_containment: bool,
    pub(crate) request_type: TypeDescriptor,
    pub(crate) response_type: TypeDescriptor,
}

impl<Req, Res> DecoratedCallable<Req, Res>
where
    Req: Serialize + DeserializeOwned + Clone + Send + 'static,
    Res: Serialize + DeserializeOwned + Send + 'static,
{
    pub fn call(&self, ctx: &Context, req: Req) -> Result<Res, ExecutionError> {
        let original = if self.exception_decorators.is_empty() {
            None
        } else {
            Some(req.clone())
        };

        let result = if self.fault_containment {
            match panic::catch_unwind(AssertUnwindSafe(|| self.invoke(ctx, req))) {
                Ok(result) => result,
                Err(payload) => {
                    let fault = fault_message(payload.as_ref());
                    log::error!("Contained fault at call boundary: {}", fault);
                    return Err(ExecutionError::ContainedFault(fault));
                }
            }
        } else {
            self.invoke(ctx, req)
        };

        match (result, original) {
            (Err(err), Some(original)) => Err(self
                .exception_decorators
                .iter()
                .fold(err, |err, decorator| decorator.apply(ctx, &original, err))),
            (result, _) => result,
        }
    }

    fn invoke(&self, ctx: &Context, mut req: Req) -> Result<Res, ExecutionError> {
        for decorator in &self.request_decorators {
            req = decorator.apply(ctx, req)?;
        }

        let mut res = (self.function)(ctx, req)?;

        for decorator in &self.response_decorators {
            res = decorator.apply(ctx, res)?;
        }
        Ok(res)
    }

    pub fn fault_containment(&self) -> bool {
        self.fault_containment
    }

    /// Erases the request and response types so the callable can join a graph.
    pub fn into_any(self) -> AnyCallable {
        Arc::new(self)
    }
}

impl<Req, Res> Callable for DecoratedCallable<Req, Res>
where
    Req: Serialize + DeserializeOwned + Clone + Send + 'static,
    Res: Serialize + DeserializeOwned + Send + 'static,
{
    fn call(&self, ctx: &Context, req: NodeValue) -> Result<NodeValue, ExecutionError> {
        let req: Req = serde_json::from_value(req)?;
        let res = DecoratedCallable::call(self, ctx, req)?;
        Ok(serde_json::to_value(res)?)
    }

    fn request_type(&self) -> TypeDescriptor {
        self.request_type
    }

    fn response_type(&self) -> TypeDescriptor {
        self.response_type
    }
}

/// Text of a caught panic payload.
pub(crate) fn fault_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown fault".to_string()
    }
}
