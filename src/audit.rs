/// Audit macro for logging token issuance and other security events.
///
/// This macro wraps `tracing::info!` and automatically adds `audit=true`,
/// `auditType="token"` and the current request's endpoint, host and method.
///
/// # Examples
///
/// ```ignore
/// audit!(kid = %kid, "issued token");
/// ```
#[macro_export]
macro_rules! audit {
    ($($arg:tt)+) => {
        $crate::middleware::with_request_info(|ctx| {
            tracing::info!(
                audit = true,
                auditType = "token",
                endpoint = %ctx.endpoint,
                host = %ctx.host,
                httpMethod = %ctx.method,
                $($arg)+
            )
        })
    };
}
