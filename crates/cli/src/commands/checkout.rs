//! `agroshop checkout`

use std::time::Duration;

use agroshop_core::CartItemId;
use agroshop_storefront::Storefront;
use agroshop_storefront::checkout::{CheckoutState, SubmitOutcome};
use agroshop_storefront::error::StorefrontError;
use tracing::{info, warn};

use super::cart::render;
use super::money;

/// Extra time allowed for the post-checkout refresh beyond its delay.
const REFRESH_GRACE: Duration = Duration::from_secs(15);

/// Select every line except `exclude`, initiate payment and wait for the
/// refreshed cart.
///
/// # Errors
///
/// Returns the cart or checkout error that stopped the flow.
pub async fn run(
    storefront: &Storefront,
    phone: &str,
    exclude: &[CartItemId],
) -> Result<(), StorefrontError> {
    let cart = storefront.cart();
    let checkout = storefront.checkout();
    let currency = storefront.config().currency;

    cart.fetch().await?;
    for item in exclude {
        cart.set_selected(*item, false)?;
    }

    checkout.begin()?;
    let summary = checkout.summary();
    info!(
        "Paying {total} for {count} line(s)",
        total = money(summary.total, currency),
        count = summary.selected_count,
    );

    match checkout.submit(phone).await? {
        SubmitOutcome::Initiated {
            checkout_request_id,
        } => {
            info!(%checkout_request_id, "Payment prompt sent, confirm it on your phone");
        }
        SubmitOutcome::AlreadySubmitting => {
            warn!("A checkout is already being submitted");
            return Ok(());
        }
    }

    let mut state = checkout.subscribe();
    let wait = storefront.config().checkout.refresh_delay + REFRESH_GRACE;
    match tokio::time::timeout(wait, state.wait_for(|s| *s == CheckoutState::Idle)).await {
        Ok(Ok(_)) => render(&cart.snapshot(), currency),
        Ok(Err(_)) | Err(_) => warn!("Cart refresh after checkout did not finish"),
    }
    Ok(())
}
