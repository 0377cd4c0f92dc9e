//! # Function Wrappers
//!
//! Adapters that put a [`TokenBucket`] in front of an ordinary function or
//! closure. Every call first acquires a token; only then is the wrapped
//! function invoked, and its return value comes back untouched.
//!
//! ```text
//!     limited.call(args)
//!          │
//!          ▼
//!     acquire(blocking, timeout) ──false──► Err(RateLimitExceeded)  (f not called)
//!          │ true
//!          ▼
//!     Ok(f(args...))   ← value, Result, or panic passes through as-is
//! ```
//!
//! Arguments are passed as a tuple so one generic adapter covers any arity
//! from zero to six: `limited.call(())`, `limited.call((x,))`,
//! `limited.call((x, y))`.

use super::{
    config::{AcquireOptions, BucketConfig},
    core::TokenBucket,
    error::{ConfigError, RateLimitExceeded},
};
use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A callable that accepts its arguments as the tuple `Args`.
///
/// Implemented for every `Fn` of up to six arguments.
pub trait Invoke<Args> {
    /// Return type of the callable.
    type Output;

    /// Calls `self` with the unpacked tuple.
    fn invoke(&self, args: Args) -> Self::Output;
}

/// An async callable that accepts its arguments as the tuple `Args`.
///
/// Implemented for every `Fn` of up to six arguments that returns a future.
pub trait InvokeAsync<Args> {
    /// Output of the returned future.
    type Output;
    /// The future produced by one call.
    type Future: Future<Output = Self::Output>;

    /// Calls `self` with the unpacked tuple.
    fn invoke(&self, args: Args) -> Self::Future;
}

macro_rules! impl_invoke {
    ($($ty:ident $var:ident),*) => {
        impl<Func, Ret, $($ty,)*> Invoke<($($ty,)*)> for Func
        where
            Func: Fn($($ty),*) -> Ret,
        {
            type Output = Ret;

            #[inline]
            fn invoke(&self, ($($var,)*): ($($ty,)*)) -> Ret {
                (self)($($var),*)
            }
        }

        impl<Func, Fut, $($ty,)*> InvokeAsync<($($ty,)*)> for Func
        where
            Func: Fn($($ty),*) -> Fut,
            Fut: Future,
        {
            type Output = Fut::Output;
            type Future = Fut;

            #[inline]
            fn invoke(&self, ($($var,)*): ($($ty,)*)) -> Fut {
                (self)($($var),*)
            }
        }
    };
}

impl_invoke!();
impl_invoke!(A a);
impl_invoke!(A a, B b);
impl_invoke!(A a, B b, C c);
impl_invoke!(A a, B b, C c, D d);
impl_invoke!(A a, B b, C c, D d, E e);
impl_invoke!(A a, B b, C c, D d, E e, G g);

fn default_name<F>() -> Cow<'static, str> {
    Cow::Borrowed(std::any::type_name::<F>())
}

fn refusal(name: &str, limiter: &TokenBucket, options: &AcquireOptions) -> RateLimitExceeded {
    let retry_after = limiter.time_until_available();
    let timeout = if options.blocking {
        options.timeout
    } else {
        None
    };

    // Non-blocking refusals are routine; a wait that ran out is not
    if let Some(budget) = timeout.filter(|t| !t.is_zero()) {
        warn!(
            "Rate limit exceeded for {} after waiting up to {:?} ({:.2} tokens/s, burst {})",
            name,
            budget,
            limiter.rate(),
            limiter.capacity()
        );
    } else {
        debug!("Refused {} without waiting, retry after {:?}", name, retry_after);
    }

    RateLimitExceeded {
        name: name.to_owned(),
        timeout,
        retry_after,
    }
}

/// A function gated by a token bucket.
///
/// # Example
///
/// ```rust
/// use tollbooth::wrap;
///
/// fn lookup(id: u32, verbose: bool) -> String {
///     format!("record #{} (verbose: {})", id, verbose)
/// }
///
/// let limited = wrap(lookup, 2.0, 2.0).unwrap().named("lookup");
///
/// assert_eq!(limited.call((1, false)).unwrap(), "record #1 (verbose: false)");
/// assert_eq!(limited.bucket().stats().allowed, 1);
/// ```
#[derive(Clone)]
pub struct RateLimited<F> {
    func: F,
    bucket: Arc<TokenBucket>,
    options: AcquireOptions,
    name: Cow<'static, str>,
}

/// Wraps `func` behind a new bucket of `rate` tokens/second and burst
/// `capacity`, waiting up to 30 seconds per call.
///
/// # Errors
///
/// Returns [`ConfigError`] if the bucket parameters are invalid.
pub fn wrap<F>(func: F, rate: f64, capacity: f64) -> Result<RateLimited<F>, ConfigError> {
    let bucket = TokenBucket::with_config(BucketConfig::new(rate, capacity))?;
    Ok(RateLimited::new(func, Arc::new(bucket)))
}

/// Wraps `func` behind an existing, possibly shared bucket.
pub fn wrap_with<F>(func: F, bucket: Arc<TokenBucket>, options: AcquireOptions) -> RateLimited<F> {
    RateLimited::new(func, bucket).with_options(options)
}

impl<F> RateLimited<F> {
    /// Wraps `func` behind `bucket` with default [`AcquireOptions`].
    pub fn new(func: F, bucket: Arc<TokenBucket>) -> Self {
        Self {
            func,
            bucket,
            options: AcquireOptions::default(),
            name: default_name::<F>(),
        }
    }

    /// Replaces the waiting policy.
    pub fn with_options(mut self, options: AcquireOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the name reported in [`RateLimitExceeded`].
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// The bucket guarding this function, for inspecting statistics.
    pub fn bucket(&self) -> &Arc<TokenBucket> {
        &self.bucket
    }

    /// Name reported when a call is refused.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current waiting policy.
    pub fn options(&self) -> AcquireOptions {
        self.options
    }

    /// The wrapped function.
    pub fn inner(&self) -> &F {
        &self.func
    }

    /// Acquires a token, then calls the wrapped function.
    ///
    /// Returns `Err(RateLimitExceeded)` without calling it if no token was
    /// obtained under the configured [`AcquireOptions`].
    pub fn call<Args>(&self, args: Args) -> Result<F::Output, RateLimitExceeded>
    where
        F: Invoke<Args>,
    {
        if !self.bucket.acquire(self.options.blocking, self.options.timeout) {
            return Err(refusal(&self.name, &self.bucket, &self.options));
        }
        Ok(self.func.invoke(args))
    }

    /// Like [`call`](Self::call) for functions returning `Result`, folding the
    /// refusal into the function's own error type.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tollbooth::{wrap, AcquireOptions, RateLimitExceeded};
    ///
    /// #[derive(Debug, PartialEq)]
    /// enum ApiError {
    ///     NotFound,
    ///     Throttled,
    /// }
    ///
    /// impl From<RateLimitExceeded> for ApiError {
    ///     fn from(_: RateLimitExceeded) -> Self {
    ///         ApiError::Throttled
    ///     }
    /// }
    ///
    /// let get = wrap(|id: u32| if id == 0 { Err(ApiError::NotFound) } else { Ok(id) }, 1.0, 2.0)
    ///     .unwrap()
    ///     .with_options(AcquireOptions::non_blocking());
    ///
    /// assert_eq!(get.try_call((7,)), Ok(7));
    /// assert_eq!(get.try_call((0,)), Err(ApiError::NotFound));
    /// assert_eq!(get.try_call((7,)), Err(ApiError::Throttled));
    /// ```
    pub fn try_call<Args, T, E>(&self, args: Args) -> Result<T, E>
    where
        F: Invoke<Args, Output = Result<T, E>>,
        E: From<RateLimitExceeded>,
    {
        self.call(args)?
    }
}

impl<F> fmt::Debug for RateLimited<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimited")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("bucket", &self.bucket)
            .finish()
    }
}

/// An async function gated by a token bucket.
///
/// Waiting happens through [`TokenBucket::acquire_async`], so the task
/// yields while tokens accrue.
///
/// # Example
///
/// ```rust
/// use tollbooth::wrap_async;
///
/// async fn fetch(page: u32) -> Result<String, std::io::Error> {
///     Ok(format!("page {}", page))
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let limited = wrap_async(fetch, 5.0, 3.0).unwrap();
/// let body = limited.call((1,)).await.unwrap().unwrap();
/// assert_eq!(body, "page 1");
/// # }
/// ```
#[derive(Clone)]
pub struct AsyncRateLimited<F> {
    func: F,
    bucket: Arc<TokenBucket>,
    options: AcquireOptions,
    name: Cow<'static, str>,
}

/// Async twin of [`wrap`].
///
/// # Errors
///
/// Returns [`ConfigError`] if the bucket parameters are invalid.
pub fn wrap_async<F>(func: F, rate: f64, capacity: f64) -> Result<AsyncRateLimited<F>, ConfigError> {
    let bucket = TokenBucket::with_config(BucketConfig::new(rate, capacity))?;
    Ok(AsyncRateLimited::new(func, Arc::new(bucket)))
}

/// Async twin of [`wrap_with`].
pub fn wrap_async_with<F>(
    func: F,
    bucket: Arc<TokenBucket>,
    options: AcquireOptions,
) -> AsyncRateLimited<F> {
    AsyncRateLimited::new(func, bucket).with_options(options)
}

impl<F> AsyncRateLimited<F> {
    /// Wraps `func` behind `bucket` with default [`AcquireOptions`].
    pub fn new(func: F, bucket: Arc<TokenBucket>) -> Self {
        Self {
            func,
            bucket,
            options: AcquireOptions::default(),
            name: default_name::<F>(),
        }
    }

    /// Replaces the waiting policy. A non-blocking policy fails at once when
    /// no token is banked.
    pub fn with_options(mut self, options: AcquireOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the name reported in [`RateLimitExceeded`].
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// The bucket guarding this function.
    pub fn bucket(&self) -> &Arc<TokenBucket> {
        &self.bucket
    }

    /// Name reported when a call is refused.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current waiting policy.
    pub fn options(&self) -> AcquireOptions {
        self.options
    }

    /// Acquires a token asynchronously, then calls and awaits the wrapped
    /// function.
    pub async fn call<Args>(
        &self,
        args: Args,
    ) -> Result<<F as InvokeAsync<Args>>::Output, RateLimitExceeded>
    where
        F: InvokeAsync<Args>,
    {
        let timeout = if self.options.blocking {
            self.options.timeout
        } else {
            Some(Duration::ZERO)
        };
        if !self.bucket.acquire_async(timeout).await {
            return Err(refusal(&self.name, &self.bucket, &self.options));
        }
        Ok(self.func.invoke(args).await)
    }

    /// Async counterpart of [`RateLimited::try_call`].
    pub async fn try_call<Args, T, E>(&self, args: Args) -> Result<T, E>
    where
        F: InvokeAsync<Args, Output = Result<T, E>>,
        E: From<RateLimitExceeded>,
    {
        self.call(args).await?
    }
}

impl<F> fmt::Debug for AsyncRateLimited<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncRateLimited")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("bucket", &self.bucket)
            .finish()
    }
}
