use tracing::Span;
use uuid::Uuid;

/// Per-request scope: the tenant every read/write is bound to and the
/// correlation id stamped on every log line.
#[derive(Debug, Clone)]
pub struct RequestContext {
    tenant_id: Uuid,
    correlation_id: String,
}

impl RequestContext {
    /// Builds a context from the authenticated tenant and the inbound
    /// correlation header. A missing or blank header gets a fresh id.
    pub fn new(tenant_id: Uuid, correlation_id: Option<&str>) -> Self {
        let correlation_id = match correlation_id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Uuid::now_v7().to_string(),
        };
        Self {
            tenant_id,
            correlation_id,
        }
    }

    /// Context for operator-initiated work that is not bound to a tenant yet
    /// (provisioning, seeding from files).
    pub fn background() -> Self {
        Self::new(Uuid::nil(), None)
    }

    /// Same correlation, different tenant.
    pub fn for_tenant(&self, tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            correlation_id: self.correlation_id.clone(),
        }
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn span(&self, operation: &'static str) -> Span {
        tracing::info_span!(
            "presence",
            operation,
            tenant_id = %self.tenant_id,
            correlation_id = %self.correlation_id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_inbound_correlation_id() {
        let tenant = Uuid::now_v7();
        let ctx = RequestContext::new(tenant, Some("abc-123"));
        assert_eq!(ctx.correlation_id(), "abc-123");
        assert_eq!(ctx.tenant_id(), tenant);
    }

    #[test]
    fn generates_correlation_id_for_blank_header() {
        let ctx = RequestContext::new(Uuid::now_v7(), Some("   "));
        assert!(Uuid::parse_str(ctx.correlation_id()).is_ok());
    }

    #[test]
    fn for_tenant_keeps_correlation() {
        let ctx = RequestContext::background();
        let tenant = Uuid::now_v7();
        let scoped = ctx.for_tenant(tenant);
        assert_eq!(scoped.correlation_id(), ctx.correlation_id());
        assert_eq!(scoped.tenant_id(), tenant);
        assert!(ctx.tenant_id().is_nil());
    }
}
