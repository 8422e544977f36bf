/// Derives the client key for a request.
///
/// The key is the stable identity the per-client budget is charged to: a
/// peer address, an API key, a tenant id. Implementations must return `None`
/// rather than an empty string when a request carries no usable identity;
/// the service rejects both the same way.
pub trait KeyExtractor<Req> {
    /// Returns the client key for `req`, or `None` if one cannot be derived.
    fn extract(&self, req: &Req) -> Option<String>;
}

impl<Req, F> KeyExtractor<Req> for F
where
    F: Fn(&Req) -> Option<String>,
{
    fn extract(&self, req: &Req) -> Option<String> {
        self(req)
    }
}

/// Keys requests by the client address in the `x-forwarded-for` header.
///
/// Uses the first (client-most) entry. Only meaningful behind a proxy you
/// trust to set the header.
#[cfg(feature = "axum")]
#[derive(Clone, Copy, Debug, Default)]
pub struct ForwardedForKey;

#[cfg(feature = "axum")]
impl<B> KeyExtractor<http::Request<B>> for ForwardedForKey {
    fn extract(&self, req: &http::Request<B>) -> Option<String> {
        let forwarded = req.headers().get("x-forwarded-for")?.to_str().ok()?;
        let client = forwarded.split(',').next()?.trim();
        (!client.is_empty()).then(|| client.to_string())
    }
}
