use crate::core::callable::declared;
use crate::core::context::Context;
use crate::core::decorated::{CoreFn, DecoratedCallable, Decorator, ExceptionDecorator};
use crate::core::descriptor::{compatible, TypeDescriptor};
use crate::core::error::{Error, ExecutionError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Assembles a [`DecoratedCallable`] and validates it once at [`build`](Self::build).
///
/// `build` consumes the builder, so a validated callable can never be reconfigured.
pub struct DecoratedCallableBuilder<Req, Res> {
    function: Option<CoreFn<Req, Res>>,
    request_decorators: Vec<Decorator<Req>>,
    response_decorators: Vec<Decorator<Res>>,
    exception_decorators: Vec<ExceptionDecorator<Req>>,
    fault_containment: bool,
    request_type: Option<TypeDescriptor>,
    response_type: Option<TypeDescriptor>,
}

impl<Req, Res> Default for DecoratedCallableBuilder<Req, Res> {
    fn default() -> Self {
        Self {
            function: None,
            request_decorators: Vec::new(),
            response_decorators: Vec::new(),
            exception_decorators: Vec::new(),
            fault_containment: false,
            request_type: None,
            response_type: None,
        }
    }
}

impl<Req, Res> DecoratedCallableBuilder<Req, Res>
where
    Req: Serialize + DeserializeOwned + Clone + Send + 'static,
    Res: Serialize + DeserializeOwned + Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn func<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context, Req) -> Result<Res, ExecutionError> + Send + Sync + 'static,
    {
        self.function = Some(Arc::new(f));
        self
    }

    pub fn request_decorators(mut self, decorators: Vec<Decorator<Req>>) -> Self {
        self.request_decorators = decorators;
        self
    }

    pub fn response_decorators(mut self, decorators: Vec<Decorator<Res>>) -> Self {
        self.response_decorators = decorators;
        self
    }

    pub fn exception_decorators(mut self, decorators: Vec<ExceptionDecorator<Req>>) -> Self {
        self.exception_decorators = decorators;
        self
    }

    pub fn fault_containment(mut self, enabled: bool) -> Self {
        self.fault_containment = enabled;
        self
    }

    /// Declares the request descriptor, when it differs from `Req` itself.
    pub fn request_type(mut self, descriptor: TypeDescriptor) -> Self {
        self.request_type = Some(descriptor);
        self
    }

    /// Declares the response descriptor, when it differs from `Res` itself.
    pub fn response_type(mut self, descriptor: TypeDescriptor) -> Self {
        self.response_type = Some(descriptor);
        self
    }

    pub fn build(self) -> Result<DecoratedCallable<Req, Res>, Error> {
        let function = self
            .function
            .ok_or_else(|| Error::Configuration("function is not set".to_string()))?;

        let request_type = match self.request_type {
            Some(descriptor) => declared("request", descriptor, TypeDescriptor::of::<Req>())?,
            None => TypeDescriptor::of::<Req>(),
        };
        let response_type = match self.response_type {
            Some(descriptor) => declared("response", descriptor, TypeDescriptor::of::<Res>())?,
            None => TypeDescriptor::of::<Res>(),
        };

        validate_decorators("request_decorators", &self.request_decorators, &request_type)?;
        validate_decorators("response_decorators", &self.response_decorators, &response_type)?;

        log::debug!(
            "Built decorated callable {} -> {} ({} request, {} response, {} exception decorators)",
            request_type,
            response_type,
            self.request_decorators.len(),
            self.response_decorators.len(),
            self.exception_decorators.len()
        );

        Ok(DecoratedCallable {
            function,
            request_decorators: self.request_decorators,
            response_decorators: self.response_decorators,
            exception_decorators: self.exception_decorators,
            fault_containment: self.fault_containment,
            request_type,
            response_type,
        })
    }
}

/// Every erased decorator must map the boundary type onto itself.
fn validate_decorators<T>(
    list: &'static str,
    decorators: &[Decorator<T>],
    boundary: &TypeDescriptor,
) -> Result<(), Error>
where
    T: Serialize + DeserializeOwned + 'static,
{
    for (index, decorator) in decorators.iter().enumerate() {
        let Some((input, output)) = decorator.declared_types() else {
            continue;
        };

        if !boundary.is_void() && (input.is_void() || output.is_void()) {
            return Err(Error::Configuration(format!(
                "{list}[{index}] has a void boundary and cannot transform a value"
            )));
        }
        for found in [input, output] {
            if !compatible(&found, boundary) {
                return Err(Error::DecoratorTypeMismatch {
                    list,
                    index,
                    expected: *boundary,
                    found,
                });
            }
        }
    }
    Ok(())
}
