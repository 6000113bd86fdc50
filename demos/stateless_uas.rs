use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use sipcore::handler::HandlerAction;
use sipcore::message::{Request, Response, StatusCode, StatusLine};
use sipcore::{Endpoint, SipHandler};
use tracing::Level;
use tracing_subscriber::fmt::time::ChronoLocal;

/// Answers every out-of-dialog request with 501, the way a transaction-only
/// responder that never forms a dialog would. CANCEL/ACK are handled by the
/// transaction layer itself and never reach a handler.
struct NotImplementedService;

#[async_trait]
impl SipHandler for NotImplementedService {
    fn name(&self) -> &str {
        "stateless-uas"
    }

    async fn on_request(&self, _request: &Request) -> HandlerAction {
        HandlerAction::Respond(Response::new(StatusLine::from_code(StatusCode::NOT_IMPLEMENTED)))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_max_level(Level::TRACE)
        .with_env_filter("sipcore=trace")
        .with_timer(ChronoLocal::new(String::from("%H:%M:%S%.3f")))
        .init();

    let endpoint = Endpoint::builder().handler(Arc::new(NotImplementedService)).build().await?;

    println!("listening on {}", endpoint.local_addr());
    endpoint.run().await?;
    Ok(())
}
