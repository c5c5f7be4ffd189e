use async_trait::async_trait;

use super::{PaymentError, PaymentGateway, PaymentInit, PaymentOutcome, PaymentRequest};

/// Gateway that approves every payment on the spot.
#[derive(Debug, Clone)]
pub struct StubGateway {
    name: &'static str,
}

impl StubGateway {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn initialize(&self, request: &PaymentRequest) -> Result<PaymentInit, PaymentError> {
        tracing::info!(
            gateway = self.name,
            reference = %request.reference,
            amount = %request.amount,
            "Payment approved without charging"
        );
        Ok(PaymentInit::Completed {
            reference: request.reference.clone(),
        })
    }

    async fn verify(&self, reference: &str) -> Result<PaymentOutcome, PaymentError> {
        Ok(PaymentOutcome::Success {
            reference: reference.to_string(),
        })
    }
}
